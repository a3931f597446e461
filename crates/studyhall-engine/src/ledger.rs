//! Per-message annotation maps: reactions, pins, bookmarks and helpful votes.
//!
//! All of them are keyed by message id with toggle semantics per
//! (user, message) pair, and all drop their entries for a message through
//! [`CascadeDelete`] when that message is removed.

use std::collections::HashMap;

use uuid::Uuid;

use studyhall_types::api::ReactionGroup;

/// Hook run for every annotation map when a message leaves the store.
pub trait CascadeDelete {
    /// Drop everything keyed by `message_id`. Returns whether anything was removed.
    fn forget_message(&mut self, message_id: Uuid) -> bool;
}

// -- Reactions --

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReactionEntry {
    emoji: String,
    voters: Vec<Uuid>,
}

/// message id -> emoji entries, in the order each emoji was first used.
/// An entry whose voter set becomes empty is removed.
#[derive(Debug, Default)]
pub struct ReactionLedger {
    entries: HashMap<Uuid, Vec<ReactionEntry>>,
}

impl ReactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle: removes the vote if present, adds it if not.
    /// Returns true if the vote was added.
    pub fn toggle(&mut self, message_id: Uuid, user_id: Uuid, emoji: &str) -> bool {
        if self.has_vote(message_id, user_id, emoji) {
            self.remove(message_id, user_id, emoji);
            false
        } else {
            self.add(message_id, user_id, emoji);
            true
        }
    }

    /// Set-semantics add. Returns false if the vote already existed.
    pub fn add(&mut self, message_id: Uuid, user_id: Uuid, emoji: &str) -> bool {
        let entries = self.entries.entry(message_id).or_default();
        match entries.iter_mut().find(|e| e.emoji == emoji) {
            Some(entry) if entry.voters.contains(&user_id) => false,
            Some(entry) => {
                entry.voters.push(user_id);
                true
            }
            None => {
                entries.push(ReactionEntry {
                    emoji: emoji.to_string(),
                    voters: vec![user_id],
                });
                true
            }
        }
    }

    /// Set-semantics remove. Returns false if there was no such vote.
    pub fn remove(&mut self, message_id: Uuid, user_id: Uuid, emoji: &str) -> bool {
        let Some(entries) = self.entries.get_mut(&message_id) else {
            return false;
        };
        let Some(idx) = entries.iter().position(|e| e.emoji == emoji) else {
            return false;
        };

        let voters = &mut entries[idx].voters;
        let before = voters.len();
        voters.retain(|v| *v != user_id);
        let removed = voters.len() != before;

        if voters.is_empty() {
            entries.remove(idx);
        }
        if entries.is_empty() {
            self.entries.remove(&message_id);
        }
        removed
    }

    pub fn has_vote(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> bool {
        self.entries
            .get(&message_id)
            .and_then(|entries| entries.iter().find(|e| e.emoji == emoji))
            .is_some_and(|e| e.voters.contains(&user_id))
    }

    /// Load a reaction summary that arrived with a history message.
    pub fn seed(&mut self, message_id: Uuid, groups: &[ReactionGroup]) {
        for group in groups {
            for user_id in &group.user_ids {
                self.add(message_id, *user_id, &group.emoji);
            }
        }
    }

    pub fn groups(&self, message_id: Uuid) -> Vec<ReactionGroup> {
        self.entries
            .get(&message_id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| ReactionGroup {
                        emoji: e.emoji.clone(),
                        count: e.voters.len(),
                        user_ids: e.voters.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CascadeDelete for ReactionLedger {
    fn forget_message(&mut self, message_id: Uuid) -> bool {
        self.entries.remove(&message_id).is_some()
    }
}

// -- Pins, bookmarks, helpful votes --

/// message id -> users who toggled it on, in toggle order.
#[derive(Debug, Default)]
pub struct ToggleLedger {
    marks: HashMap<Uuid, Vec<Uuid>>,
}

impl ToggleLedger {
    /// Returns true if the mark is now set.
    pub fn toggle(&mut self, message_id: Uuid, user_id: Uuid) -> bool {
        let users = self.marks.entry(message_id).or_default();
        let set = match users.iter().position(|u| *u == user_id) {
            Some(idx) => {
                users.remove(idx);
                false
            }
            None => {
                users.push(user_id);
                true
            }
        };
        if users.is_empty() {
            self.marks.remove(&message_id);
        }
        set
    }

    pub fn has(&self, message_id: Uuid, user_id: Uuid) -> bool {
        self.marks
            .get(&message_id)
            .is_some_and(|users| users.contains(&user_id))
    }

    pub fn count(&self, message_id: Uuid) -> usize {
        self.marks.get(&message_id).map_or(0, Vec::len)
    }

    pub fn contains_message(&self, message_id: Uuid) -> bool {
        self.marks.contains_key(&message_id)
    }

}

impl CascadeDelete for ToggleLedger {
    fn forget_message(&mut self, message_id: Uuid) -> bool {
        self.marks.remove(&message_id).is_some()
    }
}

/// A message is pinned while at least one member has it pinned.
#[derive(Debug, Default)]
pub struct PinSet(ToggleLedger);

impl PinSet {
    pub fn toggle(&mut self, message_id: Uuid, user_id: Uuid) -> bool {
        self.0.toggle(message_id, user_id)
    }

    pub fn is_pinned(&self, message_id: Uuid) -> bool {
        self.0.contains_message(message_id)
    }
}

impl CascadeDelete for PinSet {
    fn forget_message(&mut self, message_id: Uuid) -> bool {
        self.0.forget_message(message_id)
    }
}

/// Bookmarks are private: only the bookmarking user sees them.
#[derive(Debug, Default)]
pub struct BookmarkSet(ToggleLedger);

impl BookmarkSet {
    pub fn toggle(&mut self, message_id: Uuid, user_id: Uuid) -> bool {
        self.0.toggle(message_id, user_id)
    }

    pub fn is_bookmarked(&self, message_id: Uuid, user_id: Uuid) -> bool {
        self.0.has(message_id, user_id)
    }
}

impl CascadeDelete for BookmarkSet {
    fn forget_message(&mut self, message_id: Uuid) -> bool {
        self.0.forget_message(message_id)
    }
}

#[derive(Debug, Default)]
pub struct HelpfulVoteLedger(ToggleLedger);

impl HelpfulVoteLedger {
    pub fn toggle(&mut self, message_id: Uuid, user_id: Uuid) -> bool {
        self.0.toggle(message_id, user_id)
    }

    pub fn voted(&self, message_id: Uuid, user_id: Uuid) -> bool {
        self.0.has(message_id, user_id)
    }

    pub fn count(&self, message_id: Uuid) -> usize {
        self.0.count(message_id)
    }
}

impl CascadeDelete for HelpfulVoteLedger {
    fn forget_message(&mut self, message_id: Uuid) -> bool {
        self.0.forget_message(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSG: Uuid = Uuid::from_u128(1);
    const ANA: Uuid = Uuid::from_u128(10);
    const BO: Uuid = Uuid::from_u128(11);

    #[test]
    fn reaction_toggle_twice_restores_state() {
        let mut ledger = ReactionLedger::new();
        ledger.add(MSG, BO, "🎉");
        let before = ledger.groups(MSG);

        assert!(ledger.toggle(MSG, ANA, "👍"));
        assert!(!ledger.toggle(MSG, ANA, "👍"));
        assert_eq!(ledger.groups(MSG), before);

        assert!(ledger.toggle(MSG, ANA, "🎉"));
        assert!(!ledger.toggle(MSG, ANA, "🎉"));
        assert_eq!(ledger.groups(MSG), before);
    }

    #[test]
    fn empty_reaction_entry_is_removed() {
        let mut ledger = ReactionLedger::new();
        ledger.toggle(MSG, ANA, "👍");
        ledger.toggle(MSG, ANA, "👍");

        assert!(ledger.groups(MSG).is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn user_counted_once_per_emoji() {
        let mut ledger = ReactionLedger::new();
        assert!(ledger.add(MSG, ANA, "👍"));
        assert!(!ledger.add(MSG, ANA, "👍"));
        assert!(ledger.add(MSG, BO, "👍"));
        assert!(ledger.add(MSG, ANA, "❤️"));

        let groups = ledger.groups(MSG);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].emoji, "👍");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].user_ids, vec![ANA, BO]);
        assert_eq!(groups[1].count, 1);
    }

    #[test]
    fn remove_of_absent_vote_is_noop() {
        let mut ledger = ReactionLedger::new();
        assert!(!ledger.remove(MSG, ANA, "👍"));
        ledger.add(MSG, BO, "👍");
        assert!(!ledger.remove(MSG, ANA, "👍"));
        assert_eq!(ledger.groups(MSG)[0].count, 1);
    }

    #[test]
    fn seed_from_history_summary() {
        let mut ledger = ReactionLedger::new();
        ledger.seed(
            MSG,
            &[ReactionGroup {
                emoji: "👀".into(),
                count: 2,
                user_ids: vec![ANA, BO, ANA],
            }],
        );
        assert_eq!(ledger.groups(MSG)[0].count, 2);
    }

    #[test]
    fn cascade_clears_all_ledgers() {
        let mut reactions = ReactionLedger::new();
        let mut pins = PinSet::default();
        let mut bookmarks = BookmarkSet::default();
        let mut helpful = HelpfulVoteLedger::default();

        reactions.toggle(MSG, ANA, "👍");
        pins.toggle(MSG, ANA);
        bookmarks.toggle(MSG, ANA);
        helpful.toggle(MSG, BO);

        assert!(reactions.forget_message(MSG));
        assert!(pins.forget_message(MSG));
        assert!(bookmarks.forget_message(MSG));
        assert!(helpful.forget_message(MSG));

        assert!(reactions.groups(MSG).is_empty());
        assert!(!pins.is_pinned(MSG));
        assert!(!bookmarks.is_bookmarked(MSG, ANA));
        assert_eq!(helpful.count(MSG), 0);
        assert!(!helpful.forget_message(MSG));
    }

    #[test]
    fn pin_stays_while_any_member_pins() {
        let mut pins = PinSet::default();
        assert!(pins.toggle(MSG, ANA));
        assert!(pins.toggle(MSG, BO));
        assert!(!pins.toggle(MSG, ANA));
        assert!(pins.is_pinned(MSG));
        assert!(!pins.toggle(MSG, BO));
        assert!(!pins.is_pinned(MSG));
    }

    #[test]
    fn helpful_votes_count_distinct_users() {
        let mut helpful = HelpfulVoteLedger::default();
        helpful.toggle(MSG, ANA);
        helpful.toggle(MSG, BO);
        assert_eq!(helpful.count(MSG), 2);
        assert!(helpful.voted(MSG, ANA));
        helpful.toggle(MSG, ANA);
        assert_eq!(helpful.count(MSG), 1);
    }
}
