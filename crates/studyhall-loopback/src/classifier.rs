use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use studyhall_engine::{ClassifyError, Classifier};
use studyhall_types::models::Classification;

const URGENT_MARKERS: &[&str] = &["urgent", "asap", "emergency", "deadline today", "!!!"];
const LINK_MARKERS: &[&str] = &["http://", "https://", "www."];
const ANSWER_MARKERS: &[&str] = &["answer:", "a:", "the answer is", "solution:"];
const QUESTION_WORDS: &[&str] = &[
    "how", "what", "why", "when", "where", "who", "which", "can", "could", "does", "is", "should",
];

/// Rule-based stand-in for the content classifier.
///
/// Rules are checked in order: urgent, resource, answer, question. Anything
/// else is `General`. Bodies containing a configured failure marker make the
/// call fail instead.
#[derive(Clone, Default)]
pub struct KeywordClassifier {
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
    fail_marker: Option<String>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail any body containing `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// Number of classify calls made so far, across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn label(body: &str) -> Classification {
        let text = body.trim().to_lowercase();

        if URGENT_MARKERS.iter().any(|m| text.contains(m)) {
            return Classification::Urgent;
        }
        if LINK_MARKERS.iter().any(|m| text.contains(m)) {
            return Classification::Resource;
        }
        if ANSWER_MARKERS
            .iter()
            .any(|m| text.starts_with(m) || (m.len() > 2 && text.contains(m)))
        {
            return Classification::Answer;
        }

        let first_word = text
            .split(|c: char| !c.is_alphanumeric())
            .find(|w| !w.is_empty())
            .unwrap_or_default();
        if text.ends_with('?') || QUESTION_WORDS.contains(&first_word) {
            return Classification::Question;
        }

        Classification::General
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, body: &str) -> Result<Classification, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(marker) = &self.fail_marker {
            if body.contains(marker.as_str()) {
                return Err(ClassifyError(format!("refused body containing {marker:?}")));
            }
        }

        let label = Self::label(body);
        trace!("Classified {:?} as {}", body, label);
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_rules() {
        assert_eq!(KeywordClassifier::label("URGENT: exam moved"), Classification::Urgent);
        assert_eq!(
            KeywordClassifier::label("slides at https://example.org/week3"),
            Classification::Resource
        );
        assert_eq!(KeywordClassifier::label("Answer: it's 42"), Classification::Answer);
        assert_eq!(KeywordClassifier::label("how do I submit"), Classification::Question);
        assert_eq!(KeywordClassifier::label("ready for friday?"), Classification::Question);
        assert_eq!(KeywordClassifier::label("thanks all"), Classification::General);
    }

    #[test]
    fn question_word_must_lead() {
        // whole first word only
        assert_eq!(KeywordClassifier::label("this works now"), Classification::General);
        assert_eq!(KeywordClassifier::label("is it due monday"), Classification::Question);
    }

    #[tokio::test]
    async fn failure_marker_and_call_count() {
        let classifier = KeywordClassifier::new().failing_on("#nolabel");
        assert!(classifier.classify("what's up #nolabel").await.is_err());
        assert_eq!(classifier.classify("what's up").await, Ok(Classification::Question));

        let clone = classifier.clone();
        clone.classify("hi").await.unwrap();
        assert_eq!(classifier.calls(), 3);
    }
}
