//! Email senders: hosted HTTP API and a log-only fallback.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::{EmailError, EmailSender, EmailTemplate, TemplateParams};

/// Credentials for a hosted transactional-email API.
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub endpoint: String,
    pub service_id: String,
    pub public_key: String,
    pub operator_template: String,
    pub customer_template: String,
}

/// Sends templated mail through a hosted email API over HTTPS.
#[derive(Clone)]
pub struct HttpEmailSender {
    client: reqwest::Client,
    config: EmailConfig,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams,
}

impl HttpEmailSender {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }

    fn request(&self, template: EmailTemplate, recipient: &str, params: &TemplateParams) -> SendRequest<'_> {
        let mut template_params = params.clone();
        template_params.insert("to_email".into(), recipient.to_string());
        SendRequest {
            service_id: &self.config.service_id,
            template_id: self.template_id(template),
            user_id: &self.config.public_key,
            template_params,
        }
    }

    fn template_id(&self, template: EmailTemplate) -> &str {
        match template {
            EmailTemplate::OperatorAlert => &self.config.operator_template,
            EmailTemplate::CustomerConfirmation => &self.config.customer_template,
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, template: EmailTemplate, recipient: &str, params: &TemplateParams) -> Result<(), EmailError> {
        let body = self.request(template, recipient, params);
        let response = self.client.post(&self.config.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::Api { status: status.as_u16(), message });
        }
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, template: EmailTemplate, recipient: &str, params: &TemplateParams) -> Result<(), EmailError> {
        info!(?template, recipient, subject = params.get("subject").map(String::as_str).unwrap_or_default(), "Email delivery not configured, logging message");
        Ok(())
    }
}
