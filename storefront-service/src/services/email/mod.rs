//! Transactional email.
//!
//! [`EmailService`] renders storefront templates and hands them to a
//! [`Mailer`]: SMTP through `lettre` when email is enabled, or a logging
//! mailer otherwise.

pub mod templates;

use crate::config::EmailConfig;
use crate::models::{GiftCard, Order};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::sync::Arc;
use templates::Rendered;

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
}

impl EmailMessage {
    fn from_rendered(to: &str, rendered: Rendered) -> Self {
        Self {
            to: to.to_string(),
            reply_to: None,
            subject: rendered.subject,
            body_text: rendered.text,
            body_html: rendered.html,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError>;

    fn is_enabled(&self) -> bool;
}

pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, AppError> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address).parse()?;
        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { from, transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError> {
        let to: Mailbox = email.to.parse()?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject);
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(reply_to.parse()?);
        }

        let message = builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(email.body_text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(email.body_html.clone()),
                ),
        )?;

        self.transport.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Stands in for SMTP when email is disabled: logs what would be sent.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email disabled, message logged instead of sent"
        );
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    store_inbox: String,
    frontend_url: String,
}

impl EmailService {
    pub fn from_config(config: &EmailConfig, frontend_url: &str) -> Result<Self, AppError> {
        let mailer: Arc<dyn Mailer> = if config.enabled {
            Arc::new(SmtpMailer::new(config)?)
        } else {
            tracing::warn!("Email disabled; outgoing mail will only be logged");
            Arc::new(LogMailer)
        };
        Ok(Self::with_mailer(mailer, &config.store_inbox, frontend_url))
    }

    pub fn with_mailer(mailer: Arc<dyn Mailer>, store_inbox: &str, frontend_url: &str) -> Self {
        Self {
            mailer,
            store_inbox: store_inbox.to_string(),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.mailer.is_enabled()
    }

    async fn deliver(&self, to: &str, rendered: Rendered) -> Result<(), AppError> {
        self.mailer
            .send(&EmailMessage::from_rendered(to, rendered))
            .await
    }

    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        to: &str,
        first_name: &str,
    ) -> Result<(), AppError> {
        let rendered = templates::order_confirmation(order, first_name, &self.frontend_url);
        self.deliver(to, rendered).await
    }

    pub async fn send_shipping_notification(&self, order: &Order, to: &str) -> Result<(), AppError> {
        self.deliver(to, templates::shipping_notification(order)).await
    }

    pub async fn send_delivery_notification(&self, order: &Order, to: &str) -> Result<(), AppError> {
        let rendered = templates::delivery_notification(order, &self.frontend_url);
        self.deliver(to, rendered).await
    }

    pub async fn send_welcome(&self, to: &str, first_name: &str) -> Result<(), AppError> {
        self.deliver(to, templates::welcome(first_name, &self.frontend_url))
            .await
    }

    pub async fn send_gift_card(&self, card: &GiftCard) -> Result<(), AppError> {
        let rendered = templates::gift_card(card, &self.frontend_url);
        self.deliver(&card.recipient_email, rendered).await
    }

    pub async fn send_test(&self, to: &str) -> Result<(), AppError> {
        self.deliver(to, templates::test_message()).await
    }

    /// Forward a contact form submission to the store inbox with the
    /// sender as reply-to.
    pub async fn forward_contact(
        &self,
        name: &str,
        email: &str,
        subject: &str,
        order_number: Option<&str>,
        message: &str,
    ) -> Result<(), AppError> {
        let rendered = templates::contact_form(name, email, subject, order_number, message);
        let mut outgoing = EmailMessage::from_rendered(&self.store_inbox, rendered);
        outgoing.reply_to = Some(email.to_string());
        self.mailer.send(&outgoing).await
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Mailer that keeps every message in memory.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &EmailMessage) -> Result<(), AppError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;

    #[tokio::test]
    async fn contact_form_goes_to_store_inbox_with_reply_to() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = EmailService::with_mailer(mailer.clone(), "hello@artisio.test", "http://shop/");

        service
            .forward_contact("Ada", "ada@example.com", "Wholesale", None, "Hello")
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "hello@artisio.test");
        assert_eq!(sent[0].reply_to.as_deref(), Some("ada@example.com"));
        assert_eq!(sent[0].subject, "Contact form: Wholesale");
    }

    #[tokio::test]
    async fn welcome_uses_trimmed_frontend_url() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = EmailService::with_mailer(mailer.clone(), "inbox@x.test", "http://shop/");

        service.send_welcome("ada@example.com", "Ada").await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert!(sent[0].body_html.contains("href=\"http://shop\""));
        assert!(sent[0].body_text.starts_with("Hi Ada"));
    }

    #[tokio::test]
    async fn log_mailer_never_fails() {
        let service = EmailService::with_mailer(Arc::new(LogMailer), "inbox@x.test", "http://shop");
        assert!(!service.is_enabled());
        assert!(service.send_test("nobody@example.com").await.is_ok());
    }
}
