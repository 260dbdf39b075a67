use chrono::NaiveDate;
use questfocus_core::db::open_db_in_memory;
use questfocus_core::model::event::{DomainEvent, EventKind};
use questfocus_core::repo::ledger_repo::{LedgerCommit, LedgerRepository, SqliteLedgerRepository};
use questfocus_core::repo::RepoError;
use questfocus_core::reward::engine::{apply, Applied};
use questfocus_core::Ledger;
use uuid::Uuid;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

fn commit_event(
    repo: &SqliteLedgerRepository<'_>,
    read: &Ledger,
    event: &DomainEvent,
    on: NaiveDate,
) -> Result<Ledger, RepoError> {
    let Applied { ledger, delta } = apply(read, event, on).unwrap();
    repo.commit(&LedgerCommit {
        expected_version: read.version,
        ledger: &ledger,
        event,
        delta: &delta,
        occurred_on: on,
    })
}

#[test]
fn create_ledger_is_idempotent_and_starts_empty() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLedgerRepository::new(&conn);
    let user = Uuid::new_v4();

    let first = repo.create_ledger(user).unwrap();
    let second = repo.create_ledger(user).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.xp, 0);
    assert_eq!(first.level(), 1);
    assert_eq!(first.gems, 0);
    assert_eq!(first.current_streak, 0);
    assert!(first.purchased_items.is_empty());
    assert!(repo.get_ledger(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn commit_bumps_version_and_records_event() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLedgerRepository::new(&conn);
    let user = Uuid::new_v4();
    let read = repo.create_ledger(user).unwrap();

    let stored = commit_event(&repo, &read, &DomainEvent::task_completed("t-1"), day(2)).unwrap();

    assert_eq!(stored.version, read.version + 1);
    assert_eq!(stored.xp, 10);
    assert_eq!(stored.gems, 2);
    assert_eq!(stored.last_activity_date, None);
    assert!(repo
        .is_event_applied(user, EventKind::TaskCompleted, "t-1")
        .unwrap());
    assert!(!repo
        .is_event_applied(user, EventKind::PomodoroCompleted, "t-1")
        .unwrap());
}

#[test]
fn stale_commit_is_rejected_with_conflict() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLedgerRepository::new(&conn);
    let user = Uuid::new_v4();
    let read = repo.create_ledger(user).unwrap();

    commit_event(&repo, &read, &DomainEvent::task_completed("a"), day(2)).unwrap();
    let err = commit_event(&repo, &read, &DomainEvent::task_completed("b"), day(2)).unwrap_err();

    assert!(matches!(
        err,
        RepoError::Conflict { expected_version, .. } if expected_version == read.version
    ));
    let stored = repo.get_ledger(user).unwrap().unwrap();
    assert_eq!(stored.xp, 10);
    assert!(!repo
        .is_event_applied(user, EventKind::TaskCompleted, "b")
        .unwrap());
}

#[test]
fn replayed_event_is_duplicate_and_rolls_back_ledger_update() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLedgerRepository::new(&conn);
    let user = Uuid::new_v4();
    let read = repo.create_ledger(user).unwrap();
    let event = DomainEvent::pomodoro_completed("s-1", 25);

    let after_first = commit_event(&repo, &read, &event, day(2)).unwrap();
    let err = commit_event(&repo, &after_first, &event, day(2)).unwrap_err();

    assert!(matches!(
        err,
        RepoError::DuplicateEvent { kind: EventKind::PomodoroCompleted, ref source_id } if source_id == "s-1"
    ));
    let stored = repo.get_ledger(user).unwrap().unwrap();
    assert_eq!(stored, after_first);
}

#[test]
fn commit_for_missing_ledger_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLedgerRepository::new(&conn);
    let ghost = Ledger::new(Uuid::new_v4());

    let err = commit_event(&repo, &ghost, &DomainEvent::task_completed("x"), day(2)).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "ledger", .. }));
}

#[test]
fn purchase_persists_owned_item() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLedgerRepository::new(&conn);
    let user = Uuid::new_v4();
    let mut read = repo.create_ledger(user).unwrap();
    for idx in 0..10 {
        read = commit_event(
            &repo,
            &read,
            &DomainEvent::pomodoro_completed(format!("s-{idx}"), 25),
            day(2),
        )
        .unwrap();
    }
    assert_eq!(read.gems, 50);

    let stored = commit_event(&repo, &read, &DomainEvent::item_purchased("flame", 50), day(2))
        .unwrap();
    assert_eq!(stored.gems, 0);
    assert!(stored.owns("flame"));
    assert!(repo.get_ledger(user).unwrap().unwrap().owns("flame"));
}

#[test]
fn corrupt_level_column_is_rejected_on_read() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLedgerRepository::new(&conn);
    let user = Uuid::new_v4();
    repo.create_ledger(user).unwrap();

    conn.execute(
        "UPDATE ledgers SET level = 4 WHERE user_id = ?1;",
        [user.to_string()],
    )
    .unwrap();

    let err = repo.get_ledger(user).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn day_activity_counts_only_that_day() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLedgerRepository::new(&conn);
    let user = Uuid::new_v4();
    let mut read = repo.create_ledger(user).unwrap();

    read = commit_event(&repo, &read, &DomainEvent::task_completed("t-1"), day(1)).unwrap();
    read = commit_event(&repo, &read, &DomainEvent::task_completed("t-2"), day(2)).unwrap();
    commit_event(&repo, &read, &DomainEvent::pomodoro_completed("s-1", 30), day(2)).unwrap();

    let activity = repo.day_activity(user, day(2)).unwrap();
    assert_eq!(activity.tasks_completed, 1);
    assert_eq!(activity.pomodoros_completed, 1);
    assert_eq!(activity.focus_minutes, 30);
    assert!(!repo.day_activity(user, day(3)).unwrap().has_activity());
}

#[test]
fn focus_by_day_zero_fills_the_range() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLedgerRepository::new(&conn);
    let user = Uuid::new_v4();
    let mut read = repo.create_ledger(user).unwrap();

    read = commit_event(&repo, &read, &DomainEvent::pomodoro_completed("s-1", 25), day(3)).unwrap();
    commit_event(&repo, &read, &DomainEvent::pomodoro_completed("s-2", 40), day(3)).unwrap();

    let history = repo.focus_by_day(user, day(1), day(4)).unwrap();
    let minutes: Vec<u32> = history.iter().map(|entry| entry.minutes).collect();
    assert_eq!(minutes, vec![0, 0, 65, 0]);
    assert_eq!(history[2].sessions, 2);
    assert_eq!(history[0].day, day(1));
    assert!(repo.focus_by_day(user, day(4), day(1)).unwrap().is_empty());
}
