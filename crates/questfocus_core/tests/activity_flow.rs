use chrono::NaiveDate;
use questfocus_core::db::open_db_in_memory;
use questfocus_core::repo::activity_repo::SqliteActivityRepository;
use questfocus_core::repo::ledger_repo::SqliteLedgerRepository;
use questfocus_core::{
    ActivityError, ActivityService, EventProcessor, NewTask, ProcessError, TaskPriority, UserId,
};
use rusqlite::Connection;
use uuid::Uuid;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 20).unwrap()
}

fn service(
    conn: &Connection,
) -> ActivityService<SqliteActivityRepository<'_>, SqliteLedgerRepository<'_>> {
    ActivityService::new(
        SqliteActivityRepository::new(conn),
        EventProcessor::new(SqliteLedgerRepository::new(conn)),
    )
}

fn new_user(conn: &Connection) -> UserId {
    let user = Uuid::new_v4();
    EventProcessor::new(SqliteLedgerRepository::new(conn))
        .provision(user)
        .unwrap();
    user
}

#[test]
fn create_and_list_tasks() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let tasks = service(&conn);

    let created = tasks
        .create_task(
            user,
            NewTask {
                priority: TaskPriority::High,
                category: Some("study".to_string()),
                due_date: Some(today()),
                estimated_time: Some(45),
                ..NewTask::titled("Revise chapter 2")
            },
        )
        .unwrap();

    let listed = tasks.list_tasks(user).unwrap();
    assert_eq!(listed, vec![created.clone()]);
    assert!(!created.completed);
    assert_eq!(created.priority, TaskPriority::High);
    assert!(tasks.list_tasks(Uuid::new_v4()).unwrap().is_empty());
}

#[test]
fn blank_title_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);

    let err = service(&conn)
        .create_task(user, NewTask::titled("   "))
        .unwrap_err();
    assert!(matches!(err, ActivityError::Validation(_)));
}

#[test]
fn completing_task_rewards_once() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let tasks = service(&conn);
    let task = tasks.create_task(user, NewTask::titled("Email tutor")).unwrap();

    let delta = tasks.complete_task(user, task.id, today()).unwrap();
    assert_eq!((delta.xp, delta.gems, delta.tasks_completed), (10, 2, 1));
    assert!(tasks.list_tasks(user).unwrap()[0].completed);

    let err = tasks.complete_task(user, task.id, today()).unwrap_err();
    assert!(matches!(
        err,
        ActivityError::Process(ProcessError::DuplicateEvent { .. })
    ));
    let ledger = EventProcessor::new(SqliteLedgerRepository::new(&conn))
        .ledger(user)
        .unwrap();
    assert_eq!(ledger.xp, 10);
}

#[test]
fn reopened_task_keeps_reward_and_pays_nothing_on_recompletion() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let tasks = service(&conn);
    let task = tasks.create_task(user, NewTask::titled("Draft essay")).unwrap();
    tasks.complete_task(user, task.id, today()).unwrap();
    let processor = EventProcessor::new(SqliteLedgerRepository::new(&conn));
    let rewarded = processor.ledger(user).unwrap();

    let reopened = tasks.reopen_task(user, task.id).unwrap();
    assert!(!reopened.completed);
    assert_eq!(reopened.completed_at, None);
    assert!(!tasks.reopen_task(user, task.id).unwrap().completed);

    let err = tasks.complete_task(user, task.id, today()).unwrap_err();
    assert!(matches!(
        err,
        ActivityError::Process(ProcessError::DuplicateEvent { .. })
    ));
    let after = processor.ledger(user).unwrap();
    assert_eq!(after.xp, rewarded.xp);
    assert_eq!(after.gems, rewarded.gems);
    assert_eq!(after.total_tasks_completed, 1);
    assert!(tasks.list_tasks(user).unwrap()[0].completed);

    assert!(matches!(
        tasks.reopen_task(user, Uuid::new_v4()),
        Err(ActivityError::NotFound { entity: "task", .. })
    ));
}

#[test]
fn completing_unknown_task_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);

    let err = service(&conn)
        .complete_task(user, Uuid::new_v4(), today())
        .unwrap_err();
    assert!(matches!(err, ActivityError::NotFound { entity: "task", .. }));
}

#[test]
fn deleting_task_keeps_its_reward() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let tasks = service(&conn);
    let task = tasks.create_task(user, NewTask::titled("Laundry")).unwrap();
    tasks.complete_task(user, task.id, today()).unwrap();

    tasks.delete_task(user, task.id).unwrap();

    assert!(tasks.list_tasks(user).unwrap().is_empty());
    assert!(matches!(
        tasks.delete_task(user, task.id),
        Err(ActivityError::NotFound { .. })
    ));
    let ledger = EventProcessor::new(SqliteLedgerRepository::new(&conn))
        .ledger(user)
        .unwrap();
    assert_eq!(ledger.total_tasks_completed, 1);
}

#[test]
fn focus_session_rewards_planned_minutes() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let sessions = service(&conn);

    let session = sessions.start_focus_session(user, 50).unwrap();
    assert!(!session.completed);
    let delta = sessions
        .complete_focus_session(user, session.id, today())
        .unwrap();

    assert_eq!((delta.xp, delta.gems, delta.focus_minutes), (25, 5, 50));
    let processor = EventProcessor::new(SqliteLedgerRepository::new(&conn));
    assert_eq!(processor.ledger(user).unwrap().total_focus_time, 50);
    let history = processor.focus_history(user, today(), 1).unwrap();
    assert_eq!(history[0].minutes, 50);

    let err = sessions
        .complete_focus_session(user, session.id, today())
        .unwrap_err();
    assert!(matches!(
        err,
        ActivityError::Process(ProcessError::DuplicateEvent { .. })
    ));
}

#[test]
fn focus_session_length_is_bounded() {
    let conn = open_db_in_memory().unwrap();
    let user = new_user(&conn);
    let sessions = service(&conn);

    assert!(matches!(
        sessions.start_focus_session(user, 0),
        Err(ActivityError::Validation(_))
    ));
    assert!(matches!(
        sessions.start_focus_session(user, 181),
        Err(ActivityError::Validation(_))
    ));
    assert!(matches!(
        sessions.complete_focus_session(user, Uuid::new_v4(), today()),
        Err(ActivityError::NotFound {
            entity: "focus session",
            ..
        })
    ));
}
