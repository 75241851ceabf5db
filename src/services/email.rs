//! Transactional email over SMTP via lettre.
//!
//! Sends run on spawned tasks; failures are logged and never reach the caller.
//! Without SMTP configuration the service logs each message instead.

use lettre::{
    message::header::ContentType,
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;
use uuid::Uuid;

use crate::config::EmailConfig;
use crate::domain::aggregates::{OrderStatus, ProductStatus};
use crate::domain::value_objects::Role;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// One line of an order summary email.
#[derive(Debug, Clone)]
pub struct SummaryLine {
    pub name: String,
    pub quantity: i32,
    pub line_total: Decimal,
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
}

impl EmailService {
    /// # Errors
    ///
    /// Returns error if the SMTP relay address is invalid.
    pub fn new(config: Option<&EmailConfig>) -> Result<Self, SmtpError> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();
        Ok(Self { mailer: Some(mailer), from_address: config.from_address.clone() })
    }

    /// A service that only logs outgoing mail.
    pub fn disabled() -> Self {
        Self { mailer: None, from_address: "no-reply@localhost".into() }
    }

    pub fn role_otp(&self, to: &str, code: &str, role: Role, ttl_minutes: i64) {
        self.dispatch(
            to,
            "Your verification code",
            format!("Your code to activate your {role} account is {code}.\n\nIt expires in {ttl_minutes} minutes."),
        );
    }

    pub fn password_reset(&self, to: &str, token: &str) {
        self.dispatch(
            to,
            "Reset your password",
            format!("Use this token to reset your password:\n\n{token}\n\nIt expires in one hour. If you did not ask for this, ignore this email."),
        );
    }

    pub fn order_placed(&self, to: &str, checkout_id: Uuid, lines: &[SummaryLine], total: Decimal, currency: &str) {
        let mut body = format!("Thanks for your order! Reference {checkout_id}\n\n");
        body.push_str(&render_lines(lines, currency));
        body.push_str(&format!("\nTotal: {total} {currency}\n"));
        self.dispatch(to, "Order confirmation", body);
    }

    pub fn seller_new_order(&self, to: &str, order_id: Uuid, lines: &[SummaryLine], total: Decimal, currency: &str) {
        let mut body = format!("You have a new order {order_id}.\n\n");
        body.push_str(&render_lines(lines, currency));
        body.push_str(&format!("\nOrder total: {total} {currency}\n"));
        self.dispatch(to, "New order received", body);
    }

    pub fn order_status(&self, to: &str, order_id: Uuid, status: OrderStatus) {
        self.dispatch(to, "Order update", format!("Order {order_id} is now {status:?}."));
    }

    pub fn product_status(&self, to: &str, product_name: &str, status: ProductStatus, reason: Option<&str>) {
        let mut body = format!("Your product \"{product_name}\" was {status:?}.");
        if let Some(reason) = reason {
            body.push_str(&format!("\n\nReason: {reason}"));
        }
        self.dispatch(to, "Product review result", body);
    }

    fn dispatch(&self, to: &str, subject: &str, body: String) {
        let Some(mailer) = self.mailer.clone() else {
            tracing::info!(to, subject, body = %body, "Email (SMTP disabled)");
            return;
        };
        let message = match self.build(to, subject, body) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, to, "Could not build email");
                return;
            }
        };
        let to = to.to_string();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(message).await {
                tracing::warn!(error = %e, to = %to, "Email delivery failed");
            }
        });
    }

    fn build(&self, to: &str, subject: &str, body: String) -> Result<Message, EmailError> {
        Ok(Message::builder()
            .from(self.from_address.parse().map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?)
            .to(to.parse().map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?)
    }
}

fn render_lines(lines: &[SummaryLine], currency: &str) -> String {
    lines.iter().map(|l| format!("  {} x{}  {} {currency}\n", l.name, l.quantity, l.line_total)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lines() {
        let lines = vec![SummaryLine { name: "Kettle".into(), quantity: 2, line_total: Decimal::new(3998, 2) }];
        assert_eq!(render_lines(&lines, "USD"), "  Kettle x2  39.98 USD\n");
    }

    #[test]
    fn test_build_rejects_bad_address() {
        let service = EmailService::disabled();
        assert!(matches!(service.build("not an email", "s", "b".into()), Err(EmailError::InvalidAddress(_))));
        assert!(service.build("buyer@example.com", "s", "b".into()).is_ok());
    }
}
