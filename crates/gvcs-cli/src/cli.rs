use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gvcs",
    about = "graphvcs: version control for property graphs",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Run as if started in this directory
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    pub repo: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new repository
    Init(InitArgs),
    /// Show staged changes
    Status(StatusArgs),
    /// Stage a node
    Node(NodeArgs),
    /// Stage a relationship
    Rel(RelArgs),
    /// Stage the removal of a node or relationship
    Rm(RmArgs),
    /// Commit staged changes
    Commit(CommitArgs),
    /// Show commit history
    Log(LogArgs),
    /// List or create branches
    Branch(BranchArgs),
    /// Switch to a different branch
    Switch(SwitchArgs),
    /// Move the current branch back to an earlier commit
    Reset(ResetArgs),
    /// Merge a branch into the current branch
    Merge(MergeArgs),
    /// Print the graph recorded by a commit
    Show(ShowArgs),
    /// Show entity changes between two commits
    Diff(DiffArgs),
}

#[derive(Args)]
pub struct InitArgs {
    pub path: Option<PathBuf>,
    /// Name of the initial branch
    #[arg(short = 'b', long)]
    pub initial_branch: Option<String>,
}

#[derive(Args)]
pub struct StatusArgs {}

#[derive(Args)]
pub struct NodeArgs {
    pub id: String,
    #[arg(short, long = "label")]
    pub labels: Vec<String>,
    /// Attribute as key=value
    #[arg(short, long = "prop")]
    pub props: Vec<String>,
}

#[derive(Args)]
pub struct RelArgs {
    pub id: String,
    pub source: String,
    pub target: String,
    #[arg(short = 't', long = "type")]
    pub rel_type: String,
    #[arg(short, long = "prop")]
    pub props: Vec<String>,
}

#[derive(Args)]
pub struct RmArgs {
    /// `node:<id>` or `rel:<id>`
    pub entity: String,
    /// Also remove every relationship attached to the node
    #[arg(long)]
    pub detach: bool,
}

#[derive(Args)]
pub struct CommitArgs {
    #[arg(short, long)]
    pub message: String,
    /// Commit even if nothing is staged
    #[arg(long)]
    pub allow_empty: bool,
}

#[derive(Args)]
pub struct LogArgs {
    pub branch: Option<String>,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct BranchArgs {
    pub name: Option<String>,
    /// Start point (defaults to HEAD)
    #[arg(long)]
    pub from: Option<String>,
    /// Start from an empty root commit
    #[arg(long, conflicts_with = "from")]
    pub orphan: bool,
    #[arg(short = 'd', long, conflicts_with_all = ["from", "orphan"])]
    pub delete: bool,
}

#[derive(Args)]
pub struct SwitchArgs {
    pub branch: String,
    #[arg(short = 'c', long)]
    pub create: bool,
    /// Drop staged changes of the current branch
    #[arg(long)]
    pub discard: bool,
}

#[derive(Args)]
pub struct ResetArgs {
    pub rev: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum PolicyArg {
    ThreeWay,
    Attribute,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SideArg {
    Ours,
    Theirs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TakeArg {
    Ancestor,
    Ours,
    Theirs,
}

#[derive(Args)]
pub struct MergeArgs {
    pub branch: String,
    #[arg(long, value_enum, default_value = "three-way")]
    pub policy: PolicyArg,
    /// Side winning attributes both branches changed (attribute policy)
    #[arg(long, value_enum)]
    pub prefer: Option<SideArg>,
    /// Resolve every remaining conflict with this version
    #[arg(long, value_enum)]
    pub take: Option<TakeArg>,
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    #[arg(default_value = "HEAD")]
    pub rev: String,
}

#[derive(Args)]
pub struct DiffArgs {
    pub from: String,
    #[arg(default_value = "HEAD")]
    pub to: String,
}
