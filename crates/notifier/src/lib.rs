//! # Violation Notifier
//!
//! Delivers captured violation frames and their metadata to a backend
//! API. Handles bearer-token authentication with refresh-on-401,
//! exponential-backoff retries for transient transport failures, and a
//! pooled HTTP client shared across uploads. Also carries a best-effort
//! broadcast notifier for plain status messages.

mod broadcast;
mod error;
mod sender;
mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use broadcast::BroadcastNotifier;
pub use error::{AuthError, SenderError};
pub use sender::{SenderConfig, ViolationRecord, ViolationSender};
pub use token::{Credentials, TokenManager};
