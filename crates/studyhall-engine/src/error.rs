use uuid::Uuid;

/// Failure reported by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The backend could not be reached or did not answer.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but refused the operation.
    #[error("rejected by transport: {0}")]
    Rejected(String),

    /// The backend has no message with this id.
    #[error("message not found on transport: {0}")]
    NotFound(Uuid),
}

/// Errors returned by [`crate::session::ChatSession`] commands.
/// None of them is fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("message body can't be empty")]
    EmptyBody,

    #[error("reaction emoji can't be empty")]
    EmptyReaction,

    #[error("no message with id {0} in this session")]
    UnknownMessage(Uuid),

    #[error("session is closed")]
    Closed,

    /// The send did not complete. `draft` is the text handed back to the composer.
    #[error("failed to send message: {source}")]
    SendFailed {
        draft: String,
        #[source]
        source: TransportError,
    },

    #[error("{op} failed: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: TransportError,
    },
}

impl SessionError {
    pub(crate) fn transport(op: &'static str, source: TransportError) -> Self {
        Self::Transport { op, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        let err = SessionError::transport("edit", TransportError::Unavailable("timeout".into()));
        assert_eq!(err.to_string(), "edit failed: transport unavailable: timeout");
    }

    #[test]
    fn send_failure_keeps_draft() {
        let err = SessionError::SendFailed {
            draft: "see you at 5".into(),
            source: TransportError::Rejected("rate limited".into()),
        };
        assert_eq!(
            err.to_string(),
            "failed to send message: rejected by transport: rate limited"
        );
        match err {
            SessionError::SendFailed { draft, .. } => assert_eq!(draft, "see you at 5"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
