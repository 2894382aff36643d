//! JSON API over the checkout flow and the order list.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::catalog::CatalogCache;
use crate::checkout::{
    CartSummary, CheckoutSession, CheckoutStep, Confirmation, CustomerForm, OrderPlacement, PincodeCheck,
    PincodeValidator, PincodeWatcher, PlaceOrderError, SessionError,
};
use crate::config::AppConfig;
use crate::domain::aggregates::{CustomerInfo, Order, OrderError, OrderStatus, PaymentStatus, Product};
use crate::domain::value_objects::{Money, OrderNumber};
use crate::notify::{EmailSender, NotificationDispatcher};
use crate::store::{RecordStore, StoreError};
use crate::StorefrontError;

struct SessionEntry {
    session: Arc<Mutex<CheckoutSession>>,
    touched: Instant,
}

/// Live checkout sessions, each behind its own lock.
///
/// A session untouched for `idle` is dropped on the next sweep.
pub struct SessionRegistry {
    idle: Duration,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(idle: Duration) -> Self { Self { idle, sessions: RwLock::new(HashMap::new()) } }

    pub async fn insert(&self, session: CheckoutSession) -> Arc<Mutex<CheckoutSession>> {
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, SessionEntry { session: handle.clone(), touched: Instant::now() });
        handle
    }

    /// Looks up a session and marks it as used.
    pub async fn get(&self, id: Uuid) -> Result<Arc<Mutex<CheckoutSession>>, StorefrontError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or(StorefrontError::SessionNotFound)?;
        entry.touched = Instant::now();
        Ok(entry.session.clone())
    }

    pub async fn remove(&self, id: Uuid) -> bool { self.sessions.write().await.remove(&id).is_some() }

    pub async fn count(&self) -> usize { self.sessions.read().await.len() }

    /// Drops idle sessions, skipping any a request currently holds. Returns how many went.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, e| now.duration_since(e.touched) < self.idle || e.session.try_lock().is_err());
        before - sessions.len()
    }

    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(idle_secs = self.idle.as_secs(), "Sweeping idle checkout sessions");
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let evicted = self.sweep().await;
                if evicted > 0 { debug!(evicted, "Dropped idle checkout sessions"); }
            }
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub catalog: Arc<CatalogCache>,
    pub pincodes: Arc<PincodeValidator>,
    pub placement: Arc<OrderPlacement>,
    pub events: EventBus,
    pub sessions: Arc<SessionRegistry>,
    pub pincode_debounce: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, sender: Arc<dyn EmailSender>, events: EventBus, config: &AppConfig) -> Self {
        let pincodes = Arc::new(PincodeValidator::new(store.clone(), config.settings_ttl));
        let notifier = Arc::new(NotificationDispatcher::new(sender, store.clone(), config.messages.clone()));
        let placement = Arc::new(OrderPlacement::new(store.clone(), pincodes.clone(), notifier, events.clone()));
        Self {
            catalog: Arc::new(CatalogCache::new(store.clone())),
            store,
            pincodes,
            placement,
            events,
            sessions: Arc::new(SessionRegistry::new(config.session_idle)),
            pincode_debounce: config.pincode_debounce,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "doorstep-orders"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/pincodes/:code", get(check_pincode))
        .route("/api/v1/sessions", post(create_session))
        .route("/api/v1/sessions/:id", get(get_session).delete(end_session))
        .route("/api/v1/sessions/:id/cart", post(add_to_cart))
        .route("/api/v1/sessions/:id/cart/:product_id", put(set_quantity).delete(remove_from_cart))
        .route("/api/v1/sessions/:id/checkout", post(begin_checkout))
        .route("/api/v1/sessions/:id/details", post(enter_details))
        .route("/api/v1/sessions/:id/back", post(back_to_browsing))
        .route("/api/v1/sessions/:id/phone", put(phone_input))
        .route("/api/v1/sessions/:id/pincode", put(pincode_input))
        .route("/api/v1/sessions/:id/orders", post(place_order))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/:number", get(get_order))
        .route("/api/v1/orders/:number/status", put(update_order_status))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<std::collections::BTreeMap<String, String>>,
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::SessionNotFound | Self::ProductNotFound | Self::OrderNotFound | Self::Storage(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Session(SessionError::WrongStep { .. }) | Self::Form(_) | Self::Order(OrderError::InvalidTransition { .. } | OrderError::PaymentReversal) => StatusCode::CONFLICT,
            Self::Session(_) | Self::Order(_) => StatusCode::BAD_REQUEST,
            Self::PlaceOrder(e) => match e {
                PlaceOrderError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PlaceOrderError::EmptyCart => StatusCode::BAD_REQUEST,
                PlaceOrderError::WrongStep(_) => StatusCode::CONFLICT,
                PlaceOrderError::Customer(_) | PlaceOrderError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() { tracing::error!(error = %self, "Request failed"); }
        let fields = match &self {
            Self::PlaceOrder(PlaceOrderError::Validation(f)) => Some(f.clone()),
            _ => None,
        };
        (status, Json(ErrorBody { error: self.to_string(), fields })).into_response()
    }
}

type ApiResult<T> = crate::Result<T>;

// =============================================================================
// Views
// =============================================================================

#[derive(Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub step: CheckoutStep,
    pub cart: CartSummary,
    pub form: CustomerForm,
    pub pincode_check: Option<PincodeCheck>,
    pub confirmation: Option<Confirmation>,
}

impl SessionView {
    fn of(s: &CheckoutSession) -> Self {
        Self {
            id: s.id(),
            step: s.step(),
            cart: s.summary(),
            form: s.form.clone(),
            pincode_check: s.pincode_watcher().and_then(PincodeWatcher::latest),
            confirmation: s.confirmation().cloned(),
        }
    }
}

#[derive(Serialize)]
pub struct PlacedOrderView {
    pub order_number: OrderNumber,
    pub total: Money,
    pub warnings: Vec<String>,
}

// =============================================================================
// Catalog
// =============================================================================

async fn list_products(State(s): State<AppState>) -> Json<Vec<Product>> {
    Json(s.catalog.products().await.as_ref().clone())
}

async fn check_pincode(State(s): State<AppState>, Path(code): Path<String>) -> Json<PincodeCheck> {
    Json(s.pincodes.validate(&code).await)
}

// =============================================================================
// Sessions
// =============================================================================

async fn create_session(State(s): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let session = CheckoutSession::new().with_pincode_watcher(PincodeWatcher::new(s.pincodes.clone(), s.pincode_debounce));
    let handle = s.sessions.insert(session).await;
    let view = SessionView::of(&*handle.lock().await);
    (StatusCode::CREATED, Json(view))
}

async fn get_session(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<SessionView>> {
    let handle = s.sessions.get(id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionView::of(&session)))
}

async fn end_session(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    if s.sessions.remove(id).await { Ok(StatusCode::NO_CONTENT) } else { Err(StorefrontError::SessionNotFound) }
}

/// Locks the session, applies `f`, and answers with the updated session.
async fn with_session<F>(s: &AppState, id: Uuid, f: F) -> ApiResult<Json<SessionView>>
where
    F: FnOnce(&mut CheckoutSession) -> Result<(), StorefrontError>,
{
    let handle = s.sessions.get(id).await?;
    let mut session = handle.lock().await;
    f(&mut session)?;
    Ok(Json(SessionView::of(&session)))
}

#[derive(Debug, Deserialize)] pub struct AddToCartRequest { pub product_id: i64, pub quantity: Option<i64> }
#[derive(Debug, Deserialize)] pub struct QuantityRequest { pub quantity: i64 }
#[derive(Debug, Deserialize)] pub struct PhoneRequest { pub phone: String }
#[derive(Debug, Deserialize)] pub struct PincodeRequest { pub pincode: String }

async fn add_to_cart(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<AddToCartRequest>) -> ApiResult<Json<SessionView>> {
    let product = s.catalog.product(r.product_id).await.ok_or(StorefrontError::ProductNotFound)?;
    with_session(&s, id, |session| Ok(session.add_to_cart(&product, r.quantity.unwrap_or(1))?)).await
}

async fn set_quantity(State(s): State<AppState>, Path((id, product_id)): Path<(Uuid, i64)>, Json(r): Json<QuantityRequest>) -> ApiResult<Json<SessionView>> {
    with_session(&s, id, |session| Ok(session.set_quantity(product_id, r.quantity)?)).await
}

async fn remove_from_cart(State(s): State<AppState>, Path((id, product_id)): Path<(Uuid, i64)>) -> ApiResult<Json<SessionView>> {
    with_session(&s, id, |session| {
        session.remove_from_cart(product_id)?;
        Ok(())
    }).await
}

async fn begin_checkout(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<SessionView>> {
    with_session(&s, id, |session| Ok(session.begin_checkout()?)).await
}

async fn enter_details(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<SessionView>> {
    with_session(&s, id, |session| Ok(session.enter_details()?)).await
}

async fn back_to_browsing(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<SessionView>> {
    with_session(&s, id, |session| Ok(session.back_to_browsing()?)).await
}

async fn phone_input(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<PhoneRequest>) -> ApiResult<Json<SessionView>> {
    let handle = s.sessions.get(id).await?;
    let mut session = handle.lock().await;
    s.placement.customers().on_phone_input(&mut session.form, &r.phone).await?;
    Ok(Json(SessionView::of(&session)))
}

async fn pincode_input(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<PincodeRequest>) -> ApiResult<Json<SessionView>> {
    with_session(&s, id, |session| {
        session.form.info.pincode = r.pincode.trim().to_string();
        if let Some(watcher) = session.pincode_watcher() { watcher.input(&r.pincode); }
        Ok(())
    }).await
}

async fn place_order(State(s): State<AppState>, Path(id): Path<Uuid>, Json(info): Json<CustomerInfo>) -> ApiResult<(StatusCode, Json<PlacedOrderView>)> {
    let handle = s.sessions.get(id).await?;
    let mut session = handle.lock().await;
    let placed = s.placement.place_order(&mut session, info).await?;
    Ok((StatusCode::CREATED, Json(PlacedOrderView {
        warnings: placed.notifications.warnings(),
        order_number: placed.order_number,
        total: placed.total,
    })))
}

// =============================================================================
// Orders
// =============================================================================

async fn list_orders(State(s): State<AppState>) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(s.store.list_orders().await?))
}

async fn get_order(State(s): State<AppState>, Path(number): Path<String>) -> ApiResult<Json<Order>> {
    s.store.find_order(&OrderNumber::from(number)).await?.map(Json).ok_or(StorefrontError::OrderNotFound)
}

#[derive(Debug, Deserialize)] pub struct StatusRequest { pub status: Option<OrderStatus>, pub payment_status: Option<PaymentStatus> }

async fn update_order_status(State(s): State<AppState>, Path(number): Path<String>, Json(r): Json<StatusRequest>) -> ApiResult<Json<Order>> {
    let mut order = s.store.find_order(&OrderNumber::from(number)).await?.ok_or(StorefrontError::OrderNotFound)?;
    if let Some(next) = r.status { order.transition(next)?; }
    if let Some(payment) = r.payment_status { order.set_payment_status(payment)?; }
    s.store.save_order_status(&order).await?;
    s.events.publish(order.take_events()).await;
    Ok(Json(order))
}
