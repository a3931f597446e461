use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use studyhall_engine::{ChatSession, EngineConfig};
use studyhall_loopback::{KeywordClassifier, LoopbackHub};
use studyhall_types::api::TimelineItem;
use studyhall_types::models::Participant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyhall=debug,studyhall_engine=debug,studyhall_loopback=debug".into()),
        )
        .init();

    let config = EngineConfig::from_env()?;
    let session_id = config.session_id;

    // Backend with a bit of history from two classmates
    let hub = LoopbackHub::new();
    hub.set_latency(Some(Duration::from_millis(20))).await;
    let priya = Participant::new(Uuid::new_v4(), "Priya");
    let tomas = Participant::new(Uuid::new_v4(), "Tomas");

    let intro = hub
        .post_as(session_id, &priya, "Welcome to the week 3 study group!", None)
        .await;
    let question = hub
        .post_as(session_id, &tomas, "How do we submit the lab report?", None)
        .await;
    hub.read_as(&priya, session_id, question.id).await;

    let classifier = KeywordClassifier::new().with_delay(Duration::from_millis(50));
    let session = ChatSession::open(config, Arc::new(hub.clone()), Arc::new(classifier)).await?;

    // Live traffic while the session is open
    hub.post_as(
        session_id,
        &priya,
        "Answer: upload it at https://lms.example/week3",
        Some(question.id),
    )
    .await;
    hub.react_as(session_id, intro.id, tomas.id, "👋").await;

    session.set_draft("Thanks, that worked?");
    let mine = session.send_draft(None).await?;
    session.toggle_reaction(intro.id, "👋")?;
    session.toggle_pin(question.id)?;
    session.mark_read(mine.id).await?;

    hub.fail_next_sends(1).await;
    session.set_draft("this one will bounce");
    if let Err(e) = session.send_draft(None).await {
        warn!("{} (draft restored: {:?})", e, session.draft());
    }

    hub.read_as(&tomas, session_id, mine.id).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    for item in session.timeline() {
        match item {
            TimelineItem::DaySeparator(day) => info!("---- {} ----", day),
            TimelineItem::Message(msg) => {
                let label = session
                    .classification_of(msg.id)
                    .map(|l| format!(" [{}]", l))
                    .unwrap_or_default();
                let receipt = session.receipt_of(msg.id);
                info!(
                    "{}: {}{} | reactions={} readers={} sent={}",
                    msg.author_username,
                    msg.body,
                    label,
                    serde_json::to_string(&msg.reactions)?,
                    receipt.total_readers(),
                    receipt.sent,
                );
            }
        }
    }

    info!(
        "Thread under {:?}: {} replies, pinned: {}",
        question.body,
        session.reply_count(question.id),
        session.pinned().len()
    );

    session.close();
    Ok(())
}
