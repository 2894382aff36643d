//! Postgres record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use std::str::FromStr;

use super::{RecordStore, SiteSettings, StoreError};
use crate::domain::aggregates::{Customer, CustomerInfo, Order, OrderItem, OrderStatus, PaymentStatus, Product};
use crate::domain::value_objects::{Money, OrderNumber};

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(db.message().to_string()),
            sqlx::Error::RowNotFound => StoreError::NotFound(e.to_string()),
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64, name: String, price: Decimal, weight: String, image_url: Option<String>, stock: i32,
    is_bestseller: bool, is_new: bool, is_active: bool, description: Option<String>, sort_order: i32,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product {
            id: r.id, name: r.name, price: Money::new(r.price), weight: r.weight, image_url: r.image_url,
            stock: u32::try_from(r.stock).unwrap_or(0),
            is_bestseller: r.is_bestseller, is_new: r.is_new, is_active: r.is_active,
            description: r.description.unwrap_or_default(), sort_order: r.sort_order,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    phone: String, name: String, email: Option<String>, address: String, pincode: String,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(r: CustomerRow) -> Self {
        Customer { phone: r.phone, name: r.name, email: r.email, address: r.address, pincode: r.pincode, created_at: r.created_at, updated_at: r.updated_at }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_number: String, customer_name: String, customer_phone: String, customer_email: Option<String>,
    customer_address: String, customer_pincode: String, items: Json<Vec<OrderItem>>, total: Decimal,
    status: String, payment_status: String, order_date: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(r: OrderRow) -> Result<Self, StoreError> {
        Ok(Order {
            order_number: OrderNumber::from(r.order_number),
            customer_name: r.customer_name,
            customer_phone: r.customer_phone,
            customer_email: r.customer_email,
            customer_address: r.customer_address,
            customer_pincode: r.customer_pincode,
            items: r.items.0,
            total: Money::new(r.total),
            status: OrderStatus::from_str(&r.status).map_err(|e| StoreError::Backend(e.to_string()))?,
            payment_status: PaymentStatus::from_str(&r.payment_status).map_err(|e| StoreError::Backend(e.to_string()))?,
            order_date: r.order_date,
            events: vec![],
        })
    }
}

const ORDER_COLUMNS: &str = "order_number, customer_name, customer_phone, customer_email, customer_address, customer_pincode, items, total, status, payment_status, order_date";

#[async_trait]
impl RecordStore for PgStore {
    async fn active_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT id, name, price, weight, image_url, stock, is_bestseller, is_new, is_active, description, sort_order FROM products WHERE is_active ORDER BY sort_order, id")
            .fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn settings(&self) -> Result<SiteSettings, StoreError> {
        let row: Option<(String, Option<String>)> = sqlx::query_as("SELECT serviceable_pincodes, support_phone FROM site_settings ORDER BY id LIMIT 1")
            .fetch_optional(&self.pool).await?;
        Ok(row.map(|(serviceable_pincodes, support_phone)| SiteSettings { serviceable_pincodes, support_phone }).unwrap_or_default())
    }

    async fn admin_email(&self) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT email FROM admin_users WHERE role = 'admin' ORDER BY created_at LIMIT 1")
            .fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.0))
    }

    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE phone = $1")
            .bind(phone).fetch_optional(&self.pool).await?;
        Ok(row.map(Customer::from))
    }

    async fn upsert_customer(&self, info: &CustomerInfo) -> Result<Customer, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>("INSERT INTO customers (phone, name, email, address, pincode, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) ON CONFLICT (phone) DO UPDATE SET name = EXCLUDED.name, email = EXCLUDED.email, address = EXCLUDED.address, pincode = EXCLUDED.pincode, updated_at = NOW() RETURNING *")
            .bind(&info.phone).bind(&info.name).bind(info.email()).bind(&info.address).bind(&info.pincode)
            .fetch_one(&self.pool).await?;
        Ok(row.into())
    }

    async fn create_order(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(&format!("INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"))
            .bind(order.order_number.as_str()).bind(&order.customer_name).bind(&order.customer_phone).bind(&order.customer_email)
            .bind(&order.customer_address).bind(&order.customer_pincode).bind(Json(&order.items)).bind(order.total.amount())
            .bind(order.status.as_str()).bind(order.payment_status.as_str()).bind(order.order_date)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn find_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"))
            .bind(order_number.as_str()).fetch_optional(&self.pool).await?
            .map(Order::try_from).transpose()
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY order_date DESC"))
            .fetch_all(&self.pool).await?
            .into_iter().map(Order::try_from).collect()
    }

    async fn save_order_status(&self, order: &Order) -> Result<(), StoreError> {
        let done = sqlx::query("UPDATE orders SET status = $2, payment_status = $3 WHERE order_number = $1")
            .bind(order.order_number.as_str()).bind(order.status.as_str()).bind(order.payment_status.as_str())
            .execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound(format!("order {}", order.order_number))); }
        Ok(())
    }
}
