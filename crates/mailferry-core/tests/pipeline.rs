//! End-to-end ingestion tests.
//!
//! These run the real Maildir source, snapshot builder and `SQLite` store
//! against a temporary Maildir.

#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use mailferry_core::{
    CheckpointBook, CheckpointRepository, ConfigError, DocumentId, DocumentStore, ImportStatus,
    ImportSummary, MaildirSource, Scheduler, Selector, SelectorKind, SessionCredentials, Settings,
    SinkError, SourceId, SourceSettings, SourceStatus,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()
}

fn session() -> SessionCredentials {
    SessionCredentials::new("account-1", "zebra orbit lantern")
}

fn write_message(root: &Path, dir: &str, name: &str, message_id: &str, subject: &str, body: &str) {
    let contents = format!(
        "Message-ID: <{message_id}>\r\n\
         Subject: {subject}\r\n\
         Date: Fri, 01 Mar 2024 09:30:00 +0000\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         \r\n\
         {body}\r\n"
    );
    fs::write(root.join(dir).join(name), contents).unwrap();
}

fn sample_maildir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for sub in ["cur", "new", "tmp"] {
        fs::create_dir(dir.path().join(sub)).unwrap();
    }
    write_message(
        dir.path(),
        "cur",
        "1709285400.1001.host:2,FS",
        "msg-1@example.com",
        "Quarterly report",
        "<h1>Q1</h1><p>Revenue is up.</p>",
    );
    write_message(
        dir.path(),
        "cur",
        "1709285400.1002.host:2,S",
        "msg-2@example.com",
        "Lunch?",
        "<p>Noon works.</p>",
    );
    write_message(
        dir.path(),
        "new",
        "1709285400.1003.host",
        "msg-3@example.com",
        "Newsletter",
        "<p>Unread and unflagged.</p>",
    );
    dir
}

fn source_for(maildir: &Path) -> MaildirSource {
    MaildirSource::new(maildir).with_id(SourceId::new("work"))
}

#[tokio::test]
async fn test_flagged_mail_lands_in_store_once() {
    let maildir = sample_maildir();
    let store = Arc::new(DocumentStore::in_memory(&session()).await.unwrap());

    let mut scheduler = Scheduler::new(store.clone(), CheckpointBook::new(Duration::days(14)));
    scheduler.add_source(source_for(maildir.path()), Selector::Flagged);

    let report = scheduler.tick(now()).await;
    assert_eq!(
        report.sources[0].status,
        SourceStatus::Fetched {
            selected: 1,
            built: 1
        }
    );
    assert_eq!(
        report.import,
        ImportStatus::Imported(ImportSummary {
            created: 1,
            ..ImportSummary::default()
        })
    );

    let id = DocumentId::for_source("msg-1@example.com");
    let stored = store.get(id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Quarterly report");
    assert_eq!(stored.source, "msg-1@example.com");
    assert!(!stored.blocks.is_empty());

    // A restart without persisted checkpoints fetches the same window again;
    // the message maps to the same id and is updated in place.
    let mut restarted = Scheduler::new(store.clone(), CheckpointBook::new(Duration::days(14)));
    restarted.add_source(source_for(maildir.path()), Selector::Flagged);
    let again = restarted.tick(now() + Duration::minutes(1)).await;

    assert_eq!(
        again.import,
        ImportStatus::Imported(ImportSummary {
            updated: 1,
            ..ImportSummary::default()
        })
    );
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(store.get(id).await.unwrap().unwrap().revision, 2);
}

#[tokio::test]
async fn test_persisted_checkpoints_survive_restart() {
    let maildir = sample_maildir();
    let state = tempfile::tempdir().unwrap();
    let checkpoint_db = state.path().join("checkpoints.db");
    let checkpoint_db = checkpoint_db.to_str().unwrap();
    let store = Arc::new(DocumentStore::in_memory(&session()).await.unwrap());

    {
        let repository = CheckpointRepository::new(checkpoint_db).await.unwrap();
        let book = CheckpointBook::hydrate(Duration::days(14), repository)
            .await
            .unwrap();
        let mut scheduler = Scheduler::new(store.clone(), book);
        scheduler.add_source(source_for(maildir.path()), Selector::All);
        let report = scheduler.tick(now()).await;
        assert_eq!(report.snapshots, 3);
    }

    let repository = CheckpointRepository::new(checkpoint_db).await.unwrap();
    let book = CheckpointBook::hydrate(Duration::days(14), repository)
        .await
        .unwrap();
    assert_eq!(book.get(&SourceId::new("work")), Some(now()));

    let mut scheduler = Scheduler::new(store.clone(), book);
    scheduler.add_source(source_for(maildir.path()), Selector::All);
    let report = scheduler.tick(now() + Duration::hours(1)).await;

    assert_eq!(report.sources[0].window.start, now());
    assert_eq!(report.snapshots, 0);
    assert_eq!(report.import, ImportStatus::Empty);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_missing_maildir_is_retried() {
    let state = tempfile::tempdir().unwrap();
    let missing = state.path().join("not-yet-mounted");
    let store = Arc::new(DocumentStore::in_memory(&session()).await.unwrap());

    let mut scheduler = Scheduler::new(store, CheckpointBook::new(Duration::days(14)));
    scheduler.add_source(source_for(&missing), Selector::Flagged);

    let report = scheduler.tick(now()).await;

    assert_eq!(report.failed_sources(), 1);
    assert_eq!(
        scheduler.checkpoints().get(&SourceId::new("work")),
        Some(now() - Duration::days(14))
    );
}

#[tokio::test]
async fn test_store_refuses_other_account() {
    let state = tempfile::tempdir().unwrap();
    let path = state.path().join("documents.db");
    let path = path.to_str().unwrap();

    DocumentStore::open(path, &session(), None).await.unwrap();

    let intruder = SessionCredentials::new("account-2", "zebra orbit lantern");
    let result = DocumentStore::open(path, &intruder, None).await;
    assert!(matches!(result, Err(SinkError::Session(_))));
}

#[tokio::test]
async fn test_one_maildir_split_across_two_sources() {
    let maildir = sample_maildir();
    let flagged = SourceSettings::flagged(maildir.path());
    let unflagged = SourceSettings {
        select: SelectorKind::Unflagged,
        ..SourceSettings::flagged(maildir.path())
    };
    let mut settings = Settings {
        sources: vec![flagged, unflagged],
        ..Settings::default()
    };

    // Without distinct ids both entries would share one checkpoint.
    assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

    settings.sources[0].id = Some("work-flagged".to_string());
    settings.sources[1].id = Some("work-unflagged".to_string());
    settings.validate().unwrap();

    let store = Arc::new(DocumentStore::in_memory(&session()).await.unwrap());
    let mut scheduler = Scheduler::new(store.clone(), CheckpointBook::new(settings.lookback()));
    for source in &settings.sources {
        let (source, selector) = source.to_source();
        scheduler.add_source(source, selector);
    }

    let report = scheduler.tick(now()).await;

    assert_eq!(report.failed_sources(), 0);
    assert!(
        report
            .sources
            .iter()
            .all(|outcome| matches!(outcome.status, SourceStatus::Fetched { .. }))
    );
    assert_eq!(store.count().await.unwrap(), 3);
}
