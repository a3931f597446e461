use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use studyhall_engine::{ChatSession, EngineConfig};
use studyhall_loopback::{KeywordClassifier, LoopbackHub};
use studyhall_types::models::Participant;

async fn join(hub: &LoopbackHub, session_id: Uuid, user: &Participant) -> ChatSession {
    ChatSession::open(
        EngineConfig::new(session_id, user.clone()),
        Arc::new(hub.clone()),
        Arc::new(KeywordClassifier::new()),
    )
    .await
    .unwrap()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test]
async fn messages_edits_and_receipts_flow_between_members() {
    let hub = LoopbackHub::new();
    let session_id = Uuid::new_v4();
    let ana = Participant::new(Uuid::new_v4(), "Ana");
    let bo = Participant::new(Uuid::new_v4(), "Bo");

    let ana_view = join(&hub, session_id, &ana).await;
    let bo_view = join(&hub, session_id, &bo).await;

    let question = ana_view.send_message("Is the quiz open-book?", None).await.unwrap();
    settle().await;
    assert_eq!(bo_view.message(question.id).unwrap().author_username, "Ana");

    let answer = bo_view
        .send_message("Answer: yes, notes allowed", Some(question.id))
        .await
        .unwrap();
    bo_view.mark_read(answer.id).await.unwrap();
    settle().await;
    ana_view.mark_read(answer.id).await.unwrap();
    settle().await;

    // both members see the same order and thread
    let order = |s: &ChatSession| s.current_messages().iter().map(|m| m.id).collect::<Vec<_>>();
    assert_eq!(order(&ana_view), order(&bo_view));
    assert_eq!(ana_view.replies_of(question.id).len(), 1);

    // every reader has moved on to the answer
    assert!(ana_view.receipt_of(question.id).readers.is_empty());
    assert_eq!(bo_view.receipt_of(answer.id).readers, vec![ana.clone()]);
    assert_eq!(ana_view.receipt_of(answer.id).readers, vec![bo.clone()]);

    ana_view.edit_message(question.id, "Is the quiz open-book? (week 3)").await.unwrap();
    settle().await;
    let seen_by_bo = bo_view.message(question.id).unwrap();
    assert!(seen_by_bo.edited);
    assert!(seen_by_bo.body.ends_with("(week 3)"));

    ana_view.delete_message(question.id).await.unwrap();
    settle().await;
    assert!(bo_view.message(question.id).is_none());
    assert!(bo_view.replies_of(question.id).is_empty());
}

#[tokio::test]
async fn late_joiner_loads_history_and_receipts() {
    let hub = LoopbackHub::new();
    let session_id = Uuid::new_v4();
    let ana = Participant::new(Uuid::new_v4(), "Ana");
    let cy = Participant::new(Uuid::new_v4(), "Cy");

    let ana_view = join(&hub, session_id, &ana).await;
    let first = ana_view.send_message("slides: https://example.org/s3", None).await.unwrap();
    let second = ana_view.send_message("see you thursday", None).await.unwrap();
    ana_view.mark_read(second.id).await.unwrap();

    let cy_view = join(&hub, session_id, &cy).await;
    assert_eq!(cy_view.current_messages().len(), 2);
    assert_eq!(cy_view.readers_of(second.id), vec![ana.clone()]);
    assert!(cy_view.readers_of(first.id).is_empty());

    // Ana's own pointer is hidden from Ana, and nobody else has read yet
    assert!(ana_view.receipt_of(second.id).sent);
}
