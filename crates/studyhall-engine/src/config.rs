use std::str::FromStr;

use anyhow::{Context, Result};
use uuid::Uuid;

use studyhall_types::models::Participant;

/// Readers drawn on a single message before the rest collapse into "+N".
pub const DEFAULT_RECEIPT_CAP: usize = 5;

/// Messages requested from the transport when a session opens.
pub const DEFAULT_HISTORY_LIMIT: u32 = 200;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub session_id: Uuid,
    /// The local user: author of sends, voter for toggles.
    pub user: Participant,
    pub receipt_cap: usize,
    pub history_limit: u32,
}

impl EngineConfig {
    pub fn new(session_id: Uuid, user: Participant) -> Self {
        Self {
            session_id,
            user,
            receipt_cap: DEFAULT_RECEIPT_CAP,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Read config from `STUDYHALL_*` environment variables.
    /// Missing ids get fresh random ones so a bare run still works.
    pub fn from_env() -> Result<Self> {
        let session_id = env_or("STUDYHALL_SESSION_ID", Uuid::new_v4)?;
        let user_id = env_or("STUDYHALL_USER_ID", Uuid::new_v4)?;
        let username = std::env::var("STUDYHALL_USERNAME").unwrap_or_else(|_| "me".into());
        let avatar = std::env::var("STUDYHALL_AVATAR").ok().filter(|s| !s.is_empty());
        let receipt_cap = env_or("STUDYHALL_RECEIPT_CAP", || DEFAULT_RECEIPT_CAP)?;
        let history_limit = env_or("STUDYHALL_HISTORY_LIMIT", || DEFAULT_HISTORY_LIMIT)?;

        Ok(Self {
            session_id,
            user: Participant {
                id: user_id,
                username,
                avatar,
            },
            receipt_cap,
            history_limit: history_limit.min(1000),
        })
    }
}

fn env_or<T, F>(key: &str, default: F) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: FnOnce() -> T,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_defaults() {
        let cfg = EngineConfig::new(Uuid::from_u128(1), Participant::new(Uuid::from_u128(2), "ana"));
        assert_eq!(cfg.receipt_cap, DEFAULT_RECEIPT_CAP);
        assert_eq!(cfg.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn env_or_falls_back_when_unset() {
        let value: usize = env_or("STUDYHALL_TEST_SURELY_UNSET_KEY", || 7).unwrap();
        assert_eq!(value, 7);
    }
}
