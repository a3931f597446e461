use studyhall_types::models::Message;

use crate::store::MessageStore;

/// Case-insensitive substring match over body and author name, in store order.
/// An empty (or all-whitespace) query matches nothing.
pub fn search(store: &MessageStore, query: &str) -> Vec<Message> {
    if query.trim().is_empty() {
        return vec![];
    }
    let needle = query.to_lowercase();

    store
        .ordered_view()
        .iter()
        .filter(|m| {
            m.body.to_lowercase().contains(&needle)
                || m.author_username.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::message;

    fn store() -> MessageStore {
        let mut store = MessageStore::new();
        store.append(message(1, "Hello there"));
        store.append(message(2, "unrelated"));
        let mut by_hello = message(3, "nothing to see");
        by_hello.author_username = "HelloKitty".into();
        store.append(by_hello);
        store
    }

    #[test]
    fn empty_query_matches_nothing() {
        let store = store();
        assert!(search(&store, "").is_empty());
        assert!(search(&store, "   ").is_empty());
    }

    #[test]
    fn matches_body_and_author_case_insensitively() {
        let ids: Vec<u128> = search(&store(), "hello").iter().map(|m| m.id.as_u128()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn no_match() {
        assert!(search(&store(), "quantum").is_empty());
    }
}
