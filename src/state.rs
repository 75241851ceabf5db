//! Shared application state handed to every handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::TokenKeys;
use crate::config::AppConfig;
use crate::services::{EmailService, EventPublisher};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub tokens: TokenKeys,
    pub email: EmailService,
    pub events: EventPublisher,
}

impl AppState {
    pub fn new(db: PgPool, config: AppConfig, email: EmailService, events: EventPublisher) -> Self {
        let tokens = TokenKeys::new(&config.jwt);
        Self { db, config: Arc::new(config), tokens, email, events }
    }

    pub fn currency(&self) -> &str { &self.config.currency }
}
