use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tf", about = concat!("todo-flow v", env!("CARGO_PKG_VERSION"), " - today, backlog, later"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Data directory (default: $TODO_FLOW_DIR, then ~/.local/share/todo-flow)
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Act on another user's task list
    #[arg(long, global = true)]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and a default config
    Init,
    /// List tasks by category
    List(ListArgs),
    /// Show task details
    Show(IdArgs),
    /// Add a task (due date picks the category)
    Add(AddArgs),
    /// Change a task's text, description or due date
    Edit(EditArgs),
    /// Make a task wait on another
    Block(BlockArgs),
    /// Remove a task's blocker
    Unblock(IdArgs),
    /// Toggle completion
    Done(IdArgs),
    /// Delete a task
    Rm(IdArgs),
    /// Move a task to a position in a category
    Mv(MvArgs),
    /// Tasks that could block the given task
    Candidates(IdArgs),
    /// Move due postponed tasks into today
    Migrate,
    /// Validate task integrity
    Check,
    /// Hashtags in use, most used first
    Tags,
    /// Show or set the default user
    User(UserArgs),
    /// Re-render a list on every change
    Watch(WatchArgs),
}

/// Which slice of the list to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum View {
    Today,
    Backlog,
    Postponed,
    Completed,
    All,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Category to list (default: all)
    #[arg(value_enum)]
    pub view: Option<View>,
    /// Only tasks carrying this hashtag
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args)]
pub struct IdArgs {
    /// Task ID (e.g. t3, or just 3)
    pub id: String,
}

#[derive(Args)]
pub struct WatchArgs {
    #[arg(value_enum)]
    pub view: Option<View>,
    /// Seconds between day-rollover checks
    #[arg(long, default_value_t = 60)]
    pub interval: u64,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task text; #words become tags
    pub text: String,
    /// Due date: YYYY-MM-DD, today, tomorrow or +N days
    #[arg(long)]
    pub due: Option<String>,
    /// Longer description
    #[arg(long)]
    pub desc: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    pub id: String,
    /// New text
    #[arg(long)]
    pub text: Option<String>,
    /// New description
    #[arg(long, conflicts_with = "no_desc")]
    pub desc: Option<String>,
    /// Remove the description
    #[arg(long)]
    pub no_desc: bool,
    /// New due date
    #[arg(long, conflicts_with = "no_due")]
    pub due: Option<String>,
    /// Remove the due date (moves the task to the backlog)
    #[arg(long)]
    pub no_due: bool,
}

#[derive(Args)]
pub struct BlockArgs {
    /// Task that should wait
    pub id: String,
    /// Task it waits on
    pub blocker: String,
}

#[derive(Args)]
pub struct MvArgs {
    pub id: String,
    /// Target: today, backlog, postponed or completed
    pub to: String,
    /// Position among the target's top-level tasks (0 = top)
    #[arg(long, conflicts_with = "bottom")]
    pub index: Option<usize>,
    /// Put the task at the bottom
    #[arg(long)]
    pub bottom: bool,
}

#[derive(Args)]
pub struct UserArgs {
    /// New default user id (omit to print the current one)
    pub id: Option<String>,
}
