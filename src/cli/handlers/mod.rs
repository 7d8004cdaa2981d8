mod init;
pub use init::cmd_init;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::file_store::FileStore;
use crate::model::config::{Config, DisplayConfig};
use crate::model::notification::Notification;
use crate::model::task::{Category, Partition, Task, TaskId, UserId};
use crate::ops::hierarchy::{self, Row};
use crate::ops::task_ops::{self, TaskEdit};
use crate::ops::{check, tags};
use crate::sync::Session;
use crate::util::clock::{Clock, SystemClock};
use crate::util::unicode::{display_width, pad_to_width};

type CmdResult = Result<(), Box<dyn Error>>;

/// Resolved data directory, config and user for one invocation
pub struct Context {
    pub data_dir: PathBuf,
    pub config: Config,
    pub user: UserId,
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: &Cli) -> CmdResult {
    let ctx = context(cli)?;

    match &cli.command {
        // Init is handled in main.rs before config is loaded
        Commands::Init => cmd_init(cli),

        // Read commands
        Commands::List(args) => cmd_list(&ctx, args),
        Commands::Show(args) => cmd_show(&ctx, args),
        Commands::Candidates(args) => cmd_candidates(&ctx, args),
        Commands::Check => cmd_check(&ctx),
        Commands::Tags => cmd_tags(&ctx),
        Commands::Watch(args) => cmd_watch(&ctx, args),

        // Write commands
        Commands::Add(args) => cmd_add(&ctx, args),
        Commands::Edit(args) => cmd_edit(&ctx, args),
        Commands::Block(args) => cmd_block(&ctx, args),
        Commands::Unblock(args) => cmd_unblock(&ctx, args),
        Commands::Done(args) => cmd_done(&ctx, args),
        Commands::Rm(args) => cmd_rm(&ctx, args),
        Commands::Mv(args) => cmd_mv(&ctx, args),
        Commands::Migrate => cmd_migrate(&ctx),

        // Configuration
        Commands::User(args) => cmd_user(&ctx, args),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn context(cli: &Cli) -> Result<Context, Box<dyn Error>> {
    let data_dir = config_io::resolve_data_dir(cli.data_dir.as_deref())?;
    let config = config_io::load_config(&data_dir)?;
    let user = UserId::new(cli.user.clone().unwrap_or_else(|| config.user.id.clone()));
    Ok(Context {
        data_dir,
        config,
        user,
        json: cli.json,
    })
}

/// Load the current document into a session. One-shot commands read the
/// file directly; only `watch` subscribes.
fn open_session(ctx: &Context) -> Result<Session<FileStore>, Box<dyn Error>> {
    let store = FileStore::new(&ctx.data_dir);
    let snapshot = store.load(&ctx.user)?;
    let mut session = Session::new(store, ctx.user.clone(), ctx.config.sync.clone());
    session.load_snapshot(snapshot)?;
    Ok(session)
}

fn lookup<'a>(tasks: &'a [Task], id: &TaskId) -> Result<&'a Task, Box<dyn Error>> {
    Ok(task_ops::find_task(tasks, id)?)
}

/// Print notifications raised while loading (e.g. auto-migration) on
/// read commands. JSON output stays a single document.
fn print_notices(session: &mut Session<FileStore>, json: bool) {
    let notices = session.take_notifications();
    if !json {
        for n in &notices {
            println!("{}", format_notification(n));
        }
    }
}

/// Report a completed write: JSON document, or notification lines.
fn report(
    ctx: &Context,
    session: &mut Session<FileStore>,
    task: Option<&TaskId>,
    deleted: Option<&TaskId>,
) -> CmdResult {
    let notifications: Vec<Notification> = session.take_notifications();
    if ctx.json {
        let tasks = session.tasks();
        let out = MutationJson {
            task: task
                .and_then(|id| tasks.iter().find(|t| &t.id == id))
                .map(task_to_json),
            deleted: deleted.map(|id| id.to_string()),
            notifications,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for n in &notifications {
            println!("{}", format_notification(n));
        }
    }
    Ok(())
}

fn category_title(category: Category) -> &'static str {
    match category {
        Category::Today => "Today",
        Category::Backlog => "Backlog",
        Category::Postponed => "Postponed",
    }
}

fn row_matches(row: &Row<'_>, tag: Option<&str>) -> bool {
    match tag {
        None => true,
        Some(tag) => {
            tags::has_tag(row.task(), tag) || row.children().iter().any(|c| tags::has_tag(c, tag))
        }
    }
}

/// Render one view of the list as text or JSON.
fn render_view(
    tasks: &[Task],
    view: View,
    tag: Option<&str>,
    display: &DisplayConfig,
    today: NaiveDate,
    json: bool,
) -> Result<String, serde_json::Error> {
    let categories: &[Category] = match view {
        View::Today => &[Category::Today],
        View::Backlog => &[Category::Backlog],
        View::Postponed => &[Category::Postponed],
        View::Completed => &[],
        View::All => &Category::ALL,
    };

    let mut sections: Vec<SectionJson> = Vec::new();
    let mut lines: Vec<String> = Vec::new();

    for &category in categories {
        let organized = hierarchy::organize(tasks, category);
        let rows: Vec<Row<'_>> = organized
            .rows()
            .into_iter()
            .filter(|r| row_matches(r, tag))
            .collect();
        if json {
            sections.push(SectionJson {
                name: category.to_string(),
                tasks: rows.iter().map(row_to_json).collect(),
            });
        } else {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            let count: usize = rows.iter().map(|r| 1 + r.children().len()).sum();
            lines.push(format_section_header(category_title(category), count));
            lines.extend(format_rows(&rows, today));
        }
    }

    let show_completed = match view {
        View::Completed => true,
        View::All => display.show_completed,
        _ => false,
    };
    if show_completed {
        let mut done: Vec<&Task> = hierarchy::completed(tasks)
            .into_iter()
            .filter(|t| tag.is_none_or(|tag| tags::has_tag(t, tag)))
            .collect();
        let total = done.len();
        if view == View::All {
            done.truncate(display.completed_limit);
        }
        if json {
            sections.push(SectionJson {
                name: "completed".to_string(),
                tasks: done.iter().map(|t| task_to_json(t)).collect(),
            });
        } else {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format_section_header("Completed", total));
            lines.extend(done.iter().map(|t| format_task_line(t, today)));
            if total > done.len() {
                lines.push(format!("… {} more", total - done.len()));
            }
        }
    }

    if json {
        serde_json::to_string_pretty(&sections)
    } else {
        Ok(lines.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(ctx: &Context, args: &ListArgs) -> CmdResult {
    let mut session = open_session(ctx)?;
    print_notices(&mut session, ctx.json);
    let out = render_view(
        &session.tasks(),
        args.view.unwrap_or(View::All),
        args.tag.as_deref(),
        &ctx.config.display,
        session.today(),
        ctx.json,
    )?;
    println!("{}", out);
    Ok(())
}

fn cmd_show(ctx: &Context, args: &IdArgs) -> CmdResult {
    let mut session = open_session(ctx)?;
    print_notices(&mut session, ctx.json);
    let tasks = session.tasks();
    let task = lookup(&tasks, &parse_task_id(&args.id))?;
    let blocker = hierarchy::effective_parent(&tasks, task);
    let blocking = hierarchy::children_of(&tasks, &task.id);

    if ctx.json {
        let mut json = task_to_json(task);
        json.children = blocking.iter().map(|t| task_to_json(t)).collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        for line in format_task_detail(task, blocker, &blocking, session.today()) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_candidates(ctx: &Context, args: &IdArgs) -> CmdResult {
    let mut session = open_session(ctx)?;
    print_notices(&mut session, ctx.json);
    let tasks = session.tasks();
    let task = lookup(&tasks, &parse_task_id(&args.id))?;
    let candidates = hierarchy::blocker_candidates(&tasks, &task.id);

    if ctx.json {
        let out: Vec<TaskJson> = candidates.iter().map(|t| task_to_json(t)).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if candidates.is_empty() {
        println!("no task can block {}", task.id);
    } else {
        for t in candidates {
            println!("{}", format_task_line(t, session.today()));
        }
    }
    Ok(())
}

fn cmd_check(ctx: &Context) -> CmdResult {
    // Check what is on disk, before any migration rewrites it
    let store = FileStore::new(&ctx.data_dir);
    let tasks: Vec<Task> = store.load(&ctx.user)?.into_values().collect();
    let result = check::check_tasks(&tasks, SystemClock.today());

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            match err {
                check::CheckError::DanglingBlocker {
                    task_id,
                    blocked_by,
                } => println!("  {} is blocked by missing task {}", task_id, blocked_by),
                check::CheckError::SelfBlock { task_id } => {
                    println!("  {} blocks itself", task_id)
                }
                check::CheckError::BlockerChain {
                    task_id,
                    blocked_by,
                } => println!(
                    "  {} is blocked by {}, which is itself blocked",
                    task_id, blocked_by
                ),
                check::CheckError::EmptyText { task_id } => {
                    println!("  {} has no text", task_id)
                }
            }
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            println!();
        }
        println!("Warnings:");
        for warn in &result.warnings {
            match warn {
                check::CheckWarning::BlockedByCompleted {
                    task_id,
                    blocked_by,
                } => println!("  {} is still blocked by completed {}", task_id, blocked_by),
                check::CheckWarning::StaleCategory {
                    task_id,
                    category,
                    expected,
                } => println!(
                    "  {} is in {} but its due date says {}",
                    task_id, category, expected
                ),
                check::CheckWarning::DuplicateOrder {
                    partition,
                    order,
                    task_ids,
                } => {
                    let ids: Vec<&str> = task_ids.iter().map(|id| id.as_str()).collect();
                    println!(
                        "  {} share order {} in {}",
                        ids.join(", "),
                        order,
                        partition
                    )
                }
            }
        }
    }
    if result.valid {
        println!("✓ tasks are valid");
    } else {
        println!("✗ tasks have errors");
    }
    Ok(())
}

fn cmd_tags(ctx: &Context) -> CmdResult {
    let mut session = open_session(ctx)?;
    print_notices(&mut session, ctx.json);
    let tasks = session.tasks();
    let counts = tags::tag_counts(tasks.iter().filter(|t| !t.completed));

    if ctx.json {
        let out: Vec<TagJson> = counts
            .into_iter()
            .map(|(tag, count)| TagJson { tag, count })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let width = counts.keys().map(|t| display_width(t) + 1).max().unwrap_or(0);
        for (tag, count) in &counts {
            println!("{}  {}", pad_to_width(&format!("#{}", tag), width), count);
        }
    }
    Ok(())
}

fn cmd_watch(ctx: &Context, args: &WatchArgs) -> CmdResult {
    let store = FileStore::new(&ctx.data_dir);
    let mut session = Session::new(store, ctx.user.clone(), ctx.config.sync.clone());
    session.connect()?;
    let view = args.view.unwrap_or(View::All);
    let interval = Duration::from_secs(args.interval.max(1));

    let mut shown: Option<Arc<Vec<Task>>> = None;
    loop {
        let tasks = session.tasks();
        if shown.as_ref().is_none_or(|prev| !Arc::ptr_eq(prev, &tasks)) {
            let out = render_view(
                &tasks,
                view,
                None,
                &ctx.config.display,
                session.today(),
                ctx.json,
            )?;
            if !ctx.json {
                println!("-- {} @ {} --", ctx.user, Local::now().format("%H:%M:%S"));
            }
            println!("{}", out);
            print_notices(&mut session, ctx.json);
            shown = Some(tasks);
        }

        // A quiet interval may still cross midnight
        let applied = match session.wait(interval) {
            Ok(n) => n,
            Err(e) => {
                eprintln!("error: {}", e);
                continue;
            }
        };
        if applied == 0
            && let Err(e) = session.resume()
        {
            eprintln!("error: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(ctx: &Context, args: &AddArgs) -> CmdResult {
    let mut session = open_session(ctx)?;
    let due = args
        .due
        .as_deref()
        .map(|s| parse_due(s, session.today()))
        .transpose()?;
    let id = session.add_task(&args.text, due, args.desc.clone())?;
    if !ctx.json {
        println!("{}", id);
    }
    report(ctx, &mut session, Some(&id), None)
}

fn cmd_edit(ctx: &Context, args: &EditArgs) -> CmdResult {
    let mut session = open_session(ctx)?;
    let id = parse_task_id(&args.id);

    let mut edits = Vec::new();
    if let Some(text) = &args.text {
        edits.push(TaskEdit::Text(text.clone()));
    }
    if let Some(desc) = &args.desc {
        edits.push(TaskEdit::Description(Some(desc.clone())));
    } else if args.no_desc {
        edits.push(TaskEdit::Description(None));
    }
    if let Some(due) = &args.due {
        edits.push(TaskEdit::DueDate(Some(parse_due(due, session.today())?)));
    } else if args.no_due {
        edits.push(TaskEdit::DueDate(None));
    }
    if edits.is_empty() {
        return Err("nothing to change (use --text, --desc, --no-desc, --due or --no-due)".into());
    }

    for edit in edits {
        session.edit_task(&id, edit)?;
    }
    report(ctx, &mut session, Some(&id), None)
}

fn cmd_block(ctx: &Context, args: &BlockArgs) -> CmdResult {
    let mut session = open_session(ctx)?;
    let id = parse_task_id(&args.id);
    let blocker = parse_task_id(&args.blocker);
    session.edit_task(&id, TaskEdit::BlockedBy(Some(blocker)))?;
    report(ctx, &mut session, Some(&id), None)
}

fn cmd_unblock(ctx: &Context, args: &IdArgs) -> CmdResult {
    let mut session = open_session(ctx)?;
    let id = parse_task_id(&args.id);
    session.edit_task(&id, TaskEdit::BlockedBy(None))?;
    report(ctx, &mut session, Some(&id), None)
}

fn cmd_done(ctx: &Context, args: &IdArgs) -> CmdResult {
    let mut session = open_session(ctx)?;
    let id = parse_task_id(&args.id);
    session.toggle_complete(&id)?;
    if !ctx.json {
        let tasks = session.tasks();
        let verb = if lookup(&tasks, &id)?.completed {
            "completed"
        } else {
            "reopened"
        };
        println!("{} {}", verb, id);
    }
    report(ctx, &mut session, Some(&id), None)
}

fn cmd_rm(ctx: &Context, args: &IdArgs) -> CmdResult {
    let mut session = open_session(ctx)?;
    let id = parse_task_id(&args.id);
    session.delete_task(&id)?;
    report(ctx, &mut session, None, Some(&id))
}

fn cmd_mv(ctx: &Context, args: &MvArgs) -> CmdResult {
    let mut session = open_session(ctx)?;
    let id = parse_task_id(&args.id);
    let target: Partition = args.to.parse()?;
    let index = if args.bottom {
        usize::MAX
    } else {
        args.index.unwrap_or(0)
    };
    session.move_task(&id, target, index)?;
    report(ctx, &mut session, Some(&id), None)
}

fn cmd_migrate(ctx: &Context) -> CmdResult {
    let mut session = open_session(ctx)?;
    // With auto_migrate on, loading already did the work
    session.migrate()?;
    let notifications = session.take_notifications();
    if ctx.json {
        let out = MutationJson {
            task: None,
            deleted: None,
            notifications,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if notifications.is_empty() {
        println!("nothing to migrate");
    } else {
        for n in &notifications {
            println!("{}", format_notification(n));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn cmd_user(ctx: &Context, args: &UserArgs) -> CmdResult {
    let Some(id) = &args.id else {
        if ctx.json {
            let out = serde_json::json!({ "user": ctx.user.as_str() });
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            println!("{}", ctx.user);
        }
        return Ok(());
    };

    // Reject ids that cannot name a user directory
    FileStore::new(&ctx.data_dir).user_dir(&UserId::new(id.as_str()))?;

    config_io::init_data_dir(&ctx.data_dir)?;
    let mut doc = config_io::read_config_doc(&ctx.data_dir)?;
    config_io::set_user_id(&mut doc, id);
    config_io::write_config_doc(&ctx.data_dir, &doc)?;
    if !ctx.json {
        println!("default user set to {}", id);
    }
    Ok(())
}
