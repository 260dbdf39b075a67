//! Operator CLI over `questfocus_core`.
//!
//! # Responsibility
//! - Drive ledger, task, focus and quest flows against a local database.
//! - Stay a thin shell: every rule lives in core.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use questfocus_core::db::{migrations, Connection};
use questfocus_core::{
    find_item, init_from_config, local_today, log_startup, open_db, ActivityService, CoreConfig,
    DomainEvent, EventProcessor, NewTask, QuestEvaluator, SqliteActivityRepository,
    SqliteLedgerRepository, SqliteQuestRepository, TaskPriority, UserId, STORE_CATALOG,
};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "questfocus")]
#[command(about = "Gamified focus ledger: tasks, focus sessions, daily quests and rewards")]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "QUESTFOCUS_DB", default_value = questfocus_core::config::DEFAULT_DB_FILE_NAME)]
    db: PathBuf,

    /// trace|debug|info|warn|error
    #[arg(long, env = "QUESTFOCUS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; file logging is off when unset
    #[arg(long, env = "QUESTFOCUS_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Attempts per event when the ledger is contended
    #[arg(long, default_value_t = questfocus_core::config::DEFAULT_MAX_CONFLICT_RETRIES)]
    retries: u32,

    /// Calendar day to act on (defaults to the local date)
    #[arg(long)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a ledger for a new or existing user id
    InitUser {
        #[arg(long)]
        user: Option<Uuid>,
    },
    /// Show xp, level, gems, streak and owned items
    Stats {
        #[arg(long)]
        user: Uuid,
    },
    /// Add a task
    AddTask {
        #[arg(long)]
        user: Uuid,
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "medium")]
        priority: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Estimated minutes
        #[arg(long)]
        estimate: Option<u32>,
    },
    /// List tasks
    Tasks {
        #[arg(long)]
        user: Uuid,
    },
    /// Complete a task and collect its reward
    CompleteTask {
        #[arg(long)]
        user: Uuid,
        task: Uuid,
    },
    /// Uncheck a completed task; its reward is kept
    ReopenTask {
        #[arg(long)]
        user: Uuid,
        task: Uuid,
    },
    /// Delete a task
    DeleteTask {
        #[arg(long)]
        user: Uuid,
        task: Uuid,
    },
    /// Start a focus session
    StartFocus {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value_t = questfocus_core::model::activity::DEFAULT_FOCUS_MINUTES)]
        minutes: u32,
    },
    /// Complete a focus session and collect its reward
    CompleteFocus {
        #[arg(long)]
        user: Uuid,
        session: Uuid,
    },
    /// Buy a store item with gems
    Buy {
        #[arg(long)]
        user: Uuid,
        item: String,
    },
    /// Show the store catalog
    Store,
    /// Show today's quests, completing any that are satisfied
    Quests {
        #[arg(long)]
        user: Uuid,
    },
    /// Check one quest by id
    CheckQuest {
        #[arg(long)]
        user: Uuid,
        quest: Uuid,
    },
    /// Daily focus minutes for the last N days
    History {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = CoreConfig {
        db_path: cli.db.clone(),
        log_dir: cli.log_dir.clone(),
        max_conflict_retries: cli.retries,
        ..CoreConfig::default()
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.validate().map_err(anyhow::Error::msg)?;
    init_from_config(&config).map_err(anyhow::Error::msg)?;

    let conn = open_db(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    log_startup(&config, migrations::schema_version(&conn)?);
    let today = cli.today.unwrap_or_else(local_today);
    run(&conn, &config, today, cli.command)
}

fn processor<'c>(
    conn: &'c Connection,
    config: &CoreConfig,
) -> EventProcessor<SqliteLedgerRepository<'c>> {
    EventProcessor::with_max_attempts(
        SqliteLedgerRepository::new(conn),
        config.max_conflict_retries,
    )
}

fn activity<'c>(
    conn: &'c Connection,
    config: &CoreConfig,
) -> ActivityService<SqliteActivityRepository<'c>, SqliteLedgerRepository<'c>> {
    ActivityService::new(SqliteActivityRepository::new(conn), processor(conn, config))
}

fn quests<'c>(
    conn: &'c Connection,
    config: &CoreConfig,
) -> QuestEvaluator<SqliteQuestRepository<'c>, SqliteLedgerRepository<'c>> {
    QuestEvaluator::new(SqliteQuestRepository::new(conn), processor(conn, config))
}

fn run(
    conn: &Connection,
    config: &CoreConfig,
    today: NaiveDate,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::InitUser { user } => {
            let user_id = user.unwrap_or_else(Uuid::new_v4);
            processor(conn, config).provision(user_id)?;
            println!("user={user_id}");
        }
        Commands::Stats { user } => {
            let ledger = processor(conn, config).ledger(user)?;
            let progress = ledger.level_progress();
            println!(
                "level={} xp={} ({}/{} to next)",
                progress.level, ledger.xp, progress.xp_into_level, progress.xp_for_next_level
            );
            println!("gems={} streak={}", ledger.gems, ledger.current_streak);
            println!(
                "focus_minutes={} tasks_completed={}",
                ledger.total_focus_time, ledger.total_tasks_completed
            );
            if !ledger.purchased_items.is_empty() {
                let owned: Vec<&str> = ledger.purchased_items.iter().map(String::as_str).collect();
                println!("owned={}", owned.join(","));
            }
        }
        Commands::AddTask {
            user,
            title,
            description,
            priority,
            category,
            due,
            estimate,
        } => {
            let Some(priority) = TaskPriority::parse(&priority) else {
                bail!("priority must be low, medium or high");
            };
            let task = activity(conn, config).create_task(
                user,
                NewTask {
                    title,
                    description,
                    priority,
                    category,
                    due_date: due,
                    estimated_time: estimate,
                },
            )?;
            println!("task={}", task.id);
        }
        Commands::Tasks { user } => {
            for task in activity(conn, config).list_tasks(user)? {
                let mark = if task.completed { "x" } else { " " };
                println!("[{mark}] {} {} ({})", task.id, task.title, task.priority.as_str());
            }
        }
        Commands::CompleteTask { user, task } => {
            let delta = activity(conn, config).complete_task(user, task, today)?;
            println!("+{} xp +{} gems streak={}", delta.xp, delta.gems, delta.streak_after);
            if delta.leveled_up() {
                println!("level up! now level {}", delta.level_after);
            }
            report_quests(conn, config, user, today)?;
        }
        Commands::ReopenTask { user, task } => {
            activity(conn, config).reopen_task(user, task)?;
            println!("reopened {task}");
        }
        Commands::DeleteTask { user, task } => {
            activity(conn, config).delete_task(user, task)?;
            println!("deleted {task}");
        }
        Commands::StartFocus { user, minutes } => {
            let session = activity(conn, config).start_focus_session(user, minutes)?;
            println!("session={} minutes={}", session.id, session.duration_minutes);
        }
        Commands::CompleteFocus { user, session } => {
            let delta = activity(conn, config).complete_focus_session(user, session, today)?;
            println!(
                "+{} xp +{} gems focus=+{}m streak={}",
                delta.xp, delta.gems, delta.focus_minutes, delta.streak_after
            );
            report_quests(conn, config, user, today)?;
        }
        Commands::Buy { user, item } => {
            let Some(store_item) = find_item(&item) else {
                bail!("unknown store item `{item}`");
            };
            let event = DomainEvent::item_purchased(store_item.id, store_item.price);
            let delta = processor(conn, config).process_with_retry(user, &event, today)?;
            println!("bought {} for {} gems", store_item.name, -delta.gems);
        }
        Commands::Store => {
            for item in STORE_CATALOG {
                println!(
                    "{:<8} {:>4} gems  {} - {}",
                    item.id, item.price, item.name, item.description
                );
            }
        }
        Commands::Quests { user } => {
            let evaluator = quests(conn, config);
            evaluator.evaluate(user, today)?;
            for quest in evaluator.daily_quests(user, today)? {
                let mark = if quest.completed { "x" } else { " " };
                println!(
                    "[{mark}] {} {} (+{} xp +{} gems)",
                    quest.id,
                    quest.title(),
                    quest.xp_reward,
                    quest.gem_reward
                );
            }
        }
        Commands::CheckQuest { user, quest } => {
            match quests(conn, config).check_quest(user, quest, today)? {
                Some(done) => println!(
                    "completed {} (+{} xp +{} gems)",
                    done.title(),
                    done.xp_reward,
                    done.gem_reward
                ),
                None => println!("already completed"),
            }
        }
        Commands::History { user, days } => {
            for day in processor(conn, config).focus_history(user, today, days)? {
                println!("{} {:>4}m {} sessions", day.day, day.minutes, day.sessions);
            }
        }
    }
    Ok(())
}

fn report_quests(
    conn: &Connection,
    config: &CoreConfig,
    user: UserId,
    today: NaiveDate,
) -> anyhow::Result<()> {
    for quest in quests(conn, config).evaluate(user, today)? {
        println!(
            "quest complete: {} (+{} xp +{} gems)",
            quest.title(),
            quest.xp_reward,
            quest.gem_reward
        );
    }
    Ok(())
}
