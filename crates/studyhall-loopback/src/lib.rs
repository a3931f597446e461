//! In-process stand-ins for the network collaborators of a chat session.
//!
//! [`hub::LoopbackHub`] plays the backend: it assigns message ids, keeps
//! per-session history and read receipts, and fans live events out to every
//! subscriber. [`classifier::KeywordClassifier`] labels messages from simple
//! keyword rules. Both can be told to fail, for exercising error paths.

pub mod classifier;
pub mod hub;

pub use classifier::KeywordClassifier;
pub use hub::LoopbackHub;
