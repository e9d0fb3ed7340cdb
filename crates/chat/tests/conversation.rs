//! Drives a whole conversation through the session and view the way the
//! shell does, mixing reply modes and a forced failure.

use murmur::chat::{EntryPhase, MessageView, RenderedEntry, Role, SubmitOutcome};
use murmur::session::ChatSession;
use murmur::settings::{ChatSettings, ReplyMode, SettingsStore};
use murmur_llm::{FixedRoll, REQUEST_FAILED_MESSAGE};
use pretty_assertions::assert_eq;

fn switch_mode(session: &ChatSession, mode: ReplyMode) {
    let settings = ChatSettings {
        reply_mode: mode,
        ..(*session.settings()).clone()
    };
    session.update_settings(settings).expect("persist settings");
}

fn user(content: &str) -> RenderedEntry {
    RenderedEntry::Message {
        from: Role::User,
        content: content.to_string(),
    }
}

fn assistant(content: &str) -> RenderedEntry {
    RenderedEntry::Message {
        from: Role::Assistant,
        content: content.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn failed_reply_does_not_disturb_its_siblings() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = SettingsStore::new(dir.path().join("settings.json"));
    store.apply(ChatSettings {
        reply_mode: ReplyMode::Streaming,
        reply_delay_ms: 1_000,
        chunk_interval_ms: 50,
        stream_text: "one two three".to_string(),
        ..ChatSettings::default()
    });
    // A roll of zero is always below the failure probability.
    let mut session = ChatSession::new(store, Box::new(FixedRoll(0.0)));

    assert!(matches!(
        session.submit_message("first"),
        SubmitOutcome::Accepted { .. }
    ));
    switch_mode(&session, ReplyMode::Deferred);
    session.submit_message("second");
    switch_mode(&session, ReplyMode::Streaming);
    session.submit_message("third");
    assert_eq!(session.submit_message("  "), SubmitOutcome::Rejected);
    assert_eq!(session.log().len(), 6);

    let mut view = MessageView::default();
    let mut redraws = 0;
    while view.has_outstanding(session.log()) {
        view.next_change(session.log()).await;
        view.render(session.log());
        redraws += 1;
    }
    assert!(redraws >= 3);

    assert_eq!(
        view.render(session.log()),
        vec![
            user("first"),
            assistant("one two three "),
            user("second"),
            RenderedEntry::Failure {
                message: REQUEST_FAILED_MESSAGE.to_string(),
            },
            user("third"),
            assistant("one two three "),
        ]
    );

    let phases = session
        .log()
        .snapshot()
        .iter()
        .map(|entry| view.phase(entry))
        .collect::<Vec<_>>();
    assert_eq!(
        phases,
        vec![
            EntryPhase::Resolved,
            EntryPhase::SettledOk,
            EntryPhase::Resolved,
            EntryPhase::SettledError,
            EntryPhase::Resolved,
            EntryPhase::SettledOk,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn log_order_follows_submission_not_settlement() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = SettingsStore::new(dir.path().join("settings.json"));
    store.apply(ChatSettings {
        reply_mode: ReplyMode::Deferred,
        reply_delay_ms: 2_000,
        chunk_interval_ms: 10,
        stream_text: "quick".to_string(),
        ..ChatSettings::default()
    });
    let mut session = ChatSession::new(store, Box::new(FixedRoll(1.0)));

    session.submit_message("slow");
    switch_mode(&session, ReplyMode::Streaming);
    session.submit_message("fast");

    let mut view = MessageView::new("...");
    let mut saw_fast_before_slow = false;
    while view.has_outstanding(session.log()) {
        view.next_change(session.log()).await;
        let rendered = view.render(session.log());
        if rendered[3] == assistant("quick ")
            && matches!(rendered[1], RenderedEntry::Placeholder { .. })
        {
            saw_fast_before_slow = true;
        }
    }

    assert!(saw_fast_before_slow);
    assert_eq!(
        view.render(session.log()),
        vec![
            user("slow"),
            assistant("I don't know"),
            user("fast"),
            assistant("quick "),
        ]
    );
}
