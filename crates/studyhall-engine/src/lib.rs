//! Message synchronization and interaction state for one chat session.
//!
//! [`session::ChatSession`] merges fetched history with the live push stream,
//! keeps reaction/pin/bookmark/helpful-vote ledgers keyed by message id,
//! projects read receipts, indexes reply threads and feeds the content
//! classifier in the background. Network access goes through the
//! [`transport::ChatTransport`] and [`classify::Classifier`] collaborators.

pub mod classify;
pub mod config;
pub mod error;
pub mod ledger;
pub mod receipts;
pub mod search;
pub mod session;
pub mod store;
pub mod threads;
pub mod transport;

pub use classify::{ClassifyError, Classifier};
pub use config::EngineConfig;
pub use error::{SessionError, TransportError};
pub use session::ChatSession;
pub use transport::{ChatTransport, LiveFeed};
