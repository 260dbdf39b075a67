use chrono::NaiveDate;
use questfocus_core::db::open_db_in_memory;
use questfocus_core::model::quest::QuestKind;
use questfocus_core::repo::ledger_repo::SqliteLedgerRepository;
use questfocus_core::repo::quest_repo::{QuestRepository, SqliteQuestRepository};
use questfocus_core::{DomainEvent, EventProcessor, QuestError, QuestEvaluator, UserId};
use rusqlite::Connection;
use uuid::Uuid;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
}

fn evaluator(
    conn: &Connection,
) -> QuestEvaluator<SqliteQuestRepository<'_>, SqliteLedgerRepository<'_>> {
    QuestEvaluator::new(
        SqliteQuestRepository::new(conn),
        EventProcessor::new(SqliteLedgerRepository::new(conn)),
    )
}

fn processor(conn: &Connection) -> EventProcessor<SqliteLedgerRepository<'_>> {
    EventProcessor::new(SqliteLedgerRepository::new(conn))
}

fn new_user(conn: &Connection) -> UserId {
    let user = Uuid::new_v4();
    processor(conn).provision(user).unwrap();
    user
}

fn complete_tasks(conn: &Connection, user: UserId, on: NaiveDate, count: u32) {
    for idx in 0..count {
        processor(conn)
            .process(user, &DomainEvent::task_completed(format!("{on}-{idx}")), on)
            .unwrap();
    }
}

#[test]
fn seeding_is_idempotent_and_canonical() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let quests = evaluator(&conn);

    let first = quests.daily_quests(user, day(1)).unwrap();
    let second = quests.daily_quests(user, day(1)).unwrap();

    assert_eq!(first, second);
    let kinds: Vec<QuestKind> = first.iter().map(|quest| quest.kind).collect();
    assert_eq!(kinds, QuestKind::DAILY_SET.to_vec());
    assert!(first.iter().all(|quest| !quest.completed));
    assert_eq!(quests.daily_quests(user, day(2)).unwrap().len(), 3);
}

#[test]
fn three_tasks_complete_task_and_streak_quests_once() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let quests = evaluator(&conn);

    complete_tasks(&conn, user, day(3), 3);
    let done = quests.evaluate(user, day(3)).unwrap();

    let mut kinds: Vec<QuestKind> = done.iter().map(|quest| quest.kind).collect();
    kinds.sort();
    assert_eq!(kinds, vec![QuestKind::ThreeTasks, QuestKind::StreakMaintained]);
    assert!(done.iter().all(|quest| quest.completed && quest.completed_at.is_some()));

    let ledger = processor(&conn).ledger(user).unwrap();
    assert_eq!(ledger.xp, 30 + 15 + 10);
    assert_eq!(ledger.gems, 6 + 10 + 5);

    assert!(quests.evaluate(user, day(3)).unwrap().is_empty());
    assert_eq!(processor(&conn).ledger(user).unwrap(), ledger);
}

#[test]
fn two_tasks_only_satisfy_streak_quest() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let quests = evaluator(&conn);

    complete_tasks(&conn, user, day(4), 2);
    let done = quests.evaluate(user, day(4)).unwrap();

    assert_eq!(done.len(), 1);
    assert_eq!(done[0].kind, QuestKind::StreakMaintained);
}

#[test]
fn two_focus_sessions_complete_focus_quest() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    for idx in 0..2 {
        processor(&conn)
            .process(
                user,
                &DomainEvent::pomodoro_completed(format!("s-{idx}"), 25),
                day(5),
            )
            .unwrap();
    }

    let done = evaluator(&conn).evaluate(user, day(5)).unwrap();
    assert!(done
        .iter()
        .any(|quest| quest.kind == QuestKind::FiftyMinutesFocus));
}

#[test]
fn activity_on_other_day_does_not_count() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);

    complete_tasks(&conn, user, day(6), 3);
    assert!(evaluator(&conn).evaluate(user, day(7)).unwrap().is_empty());
}

#[test]
fn reward_applied_before_crash_is_not_paid_twice() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let quests = evaluator(&conn);

    complete_tasks(&conn, user, day(8), 1);
    let streak_quest = quests
        .daily_quests(user, day(8))
        .unwrap()
        .into_iter()
        .find(|quest| quest.kind == QuestKind::StreakMaintained)
        .unwrap();
    // Reward landed but the completed flag never flipped.
    processor(&conn)
        .process(user, &streak_quest.reward_event(), day(8))
        .unwrap();

    let done = quests.evaluate(user, day(8)).unwrap();

    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, streak_quest.id);
    let ledger = processor(&conn).ledger(user).unwrap();
    assert_eq!(ledger.xp, 10 + 10);
    assert_eq!(ledger.gems, 2 + 5);
}

#[test]
fn manual_check_completes_once_and_only_for_today() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let quests = evaluator(&conn);
    let todays = quests.daily_quests(user, day(9)).unwrap();
    let focus_quest = todays
        .iter()
        .find(|quest| quest.kind == QuestKind::FiftyMinutesFocus)
        .unwrap();

    let done = quests
        .check_quest(user, focus_quest.id, day(9))
        .unwrap()
        .unwrap();
    assert!(done.completed);
    assert!(quests.check_quest(user, focus_quest.id, day(9)).unwrap().is_none());
    assert_eq!(processor(&conn).ledger(user).unwrap().xp, 20);

    let stale = todays
        .iter()
        .find(|quest| quest.kind == QuestKind::ThreeTasks)
        .unwrap();
    let err = quests.check_quest(user, stale.id, day(10)).unwrap_err();
    assert!(matches!(err, QuestError::Expired { date, .. } if date == day(9)));

    let missing = Uuid::new_v4();
    let err = quests.check_quest(user, missing, day(9)).unwrap_err();
    assert!(matches!(err, QuestError::QuestNotFound(id) if id == missing));
}

#[test]
fn quests_are_scoped_per_user() {
    let conn = open_db_in_memory().unwrap();
    let owner = new_user(&conn);
    let intruder = new_user(&conn);
    let repo = SqliteQuestRepository::new(&conn);
    let quest = repo.seed_daily_quests(owner, day(11)).unwrap().remove(0);

    assert!(repo.get_quest(intruder, quest.id).unwrap().is_none());
    let err = evaluator(&conn)
        .check_quest(intruder, quest.id, day(11))
        .unwrap_err();
    assert!(matches!(err, QuestError::QuestNotFound(_)));
}
