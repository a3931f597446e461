use uuid::Uuid;

use studyhall_types::models::Message;

use crate::store::MessageStore;

/// Replies to `parent_id`, oldest first by creation time. A parent that is
/// not in the store has no thread; its orphaned replies stay in the main list.
///
/// Recomputed from the store on every call. Optimistic sends and live
/// arrivals interleave, so store order is not used here; the sort is stable,
/// which keeps equal timestamps in store order.
pub fn replies_of(store: &MessageStore, parent_id: Uuid) -> Vec<Message> {
    if !store.contains(parent_id) {
        return vec![];
    }
    let mut replies: Vec<Message> = store
        .ordered_view()
        .iter()
        .filter(|m| m.reply_to == Some(parent_id))
        .cloned()
        .collect();
    replies.sort_by_key(|m| m.created_at);
    replies
}

/// Number of replies to `parent_id`, for thread badges.
pub fn reply_count(store: &MessageStore, parent_id: Uuid) -> usize {
    if !store.contains(parent_id) {
        return 0;
    }
    store
        .ordered_view()
        .iter()
        .filter(|m| m.reply_to == Some(parent_id))
        .count()
}
