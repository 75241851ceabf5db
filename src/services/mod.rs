//! Checkout plus the side channels that run after a request's transaction commits.
pub mod checkout;
pub mod email;
pub mod events;

pub use email::{EmailError, EmailService};
pub use events::EventPublisher;
