use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use studyhall_types::models::Classification;

use crate::ledger::CascadeDelete;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("classifier failed: {0}")]
pub struct ClassifyError(pub String);

/// External content classifier.
#[async_trait]
pub trait Classifier: Send + Sync + 'static {
    async fn classify(&self, body: &str) -> Result<Classification, ClassifyError>;
}

/// Run the classifier, degrading any failure to `General`.
pub async fn classify_or_general(
    classifier: &dyn Classifier,
    message_id: Uuid,
    body: &str,
) -> Classification {
    match classifier.classify(body).await {
        Ok(label) => label,
        Err(e) => {
            debug!("Classification of {} failed, leaving unlabeled: {}", message_id, e);
            Classification::General
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    Labeled(Classification),
}

/// Memoized labels by message id. An id is classified at most once.
#[derive(Debug, Default)]
pub struct ClassificationCache {
    slots: HashMap<Uuid, Slot>,
}

impl ClassificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a message as observed. Returns true the first time only;
    /// that caller owns dispatching the classifier.
    pub fn begin(&mut self, message_id: Uuid) -> bool {
        if self.slots.contains_key(&message_id) {
            return false;
        }
        self.slots.insert(message_id, Slot::Pending);
        true
    }

    /// Apply a classifier result. Ignored unless the id is still pending,
    /// so a result for a deleted message never resurrects it.
    pub fn resolve(&mut self, message_id: Uuid, label: Classification) -> bool {
        match self.slots.get_mut(&message_id) {
            Some(slot) if *slot == Slot::Pending => {
                *slot = Slot::Labeled(label);
                true
            }
            _ => false,
        }
    }

    /// The label to show, if any. Pending and `General` both read as `None`.
    pub fn label_of(&self, message_id: Uuid) -> Option<Classification> {
        match self.slots.get(&message_id) {
            Some(Slot::Labeled(label)) => label.visible(),
            _ => None,
        }
    }

    pub fn is_pending(&self, message_id: Uuid) -> bool {
        matches!(self.slots.get(&message_id), Some(Slot::Pending))
    }

    pub fn knows(&self, message_id: Uuid) -> bool {
        self.slots.contains_key(&message_id)
    }
}

impl CascadeDelete for ClassificationCache {
    fn forget_message(&mut self, message_id: Uuid) -> bool {
        self.slots.remove(&message_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSG: Uuid = Uuid::from_u128(7);

    struct Failing;

    #[async_trait]
    impl Classifier for Failing {
        async fn classify(&self, _body: &str) -> Result<Classification, ClassifyError> {
            Err(ClassifyError("model offline".into()))
        }
    }

    #[test]
    fn begin_only_once_per_id() {
        let mut cache = ClassificationCache::new();
        assert!(cache.begin(MSG));
        assert!(!cache.begin(MSG));
        assert!(cache.is_pending(MSG));

        assert!(cache.resolve(MSG, Classification::Question));
        assert!(!cache.begin(MSG));
        assert_eq!(cache.label_of(MSG), Some(Classification::Question));
    }

    #[test]
    fn general_reads_as_absent() {
        let mut cache = ClassificationCache::new();
        cache.begin(MSG);
        cache.resolve(MSG, Classification::General);
        assert_eq!(cache.label_of(MSG), None);
        assert!(!cache.is_pending(MSG));
    }

    #[test]
    fn late_result_after_delete_is_dropped() {
        let mut cache = ClassificationCache::new();
        cache.begin(MSG);
        cache.forget_message(MSG);

        assert!(!cache.resolve(MSG, Classification::Urgent));
        assert!(!cache.knows(MSG));
        assert_eq!(cache.label_of(MSG), None);
    }

    #[test]
    fn second_result_does_not_overwrite() {
        let mut cache = ClassificationCache::new();
        cache.begin(MSG);
        cache.resolve(MSG, Classification::Resource);
        assert!(!cache.resolve(MSG, Classification::Urgent));
        assert_eq!(cache.label_of(MSG), Some(Classification::Resource));
    }

    #[tokio::test]
    async fn classifier_failure_degrades_to_general() {
        let label = classify_or_general(&Failing, MSG, "anything").await;
        assert_eq!(label, Classification::General);
    }
}
