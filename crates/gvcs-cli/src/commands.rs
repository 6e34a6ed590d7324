use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use gvcs_sdk::{
    AttributeMergePolicy, ChangeKind, Commit, CommitOptions, ConflictKind, ConflictedMerge,
    EntityId, MergeOutcome, MergePolicy, Node, NodeId, Relationship, RelationshipId, RepoConfig,
    Repository, Resolution, Side, StagingArea, ThreeWayPolicy, Value,
};

use crate::cli::*;

pub fn run_command(cli: Cli, config: RepoConfig) -> anyhow::Result<()> {
    let format = cli.format;
    let root = cli.repo.as_path();
    match cli.command {
        Command::Init(args) => cmd_init(root, args, config),
        Command::Status(_) => cmd_status(&open(root)?, format),
        Command::Node(args) => cmd_node(&open(root)?, args),
        Command::Rel(args) => cmd_rel(&open(root)?, args),
        Command::Rm(args) => cmd_rm(&open(root)?, args),
        Command::Commit(args) => cmd_commit(&open(root)?, args),
        Command::Log(args) => cmd_log(&open(root)?, args, format),
        Command::Branch(args) => cmd_branch(&open(root)?, args, format),
        Command::Switch(args) => cmd_switch(&open(root)?, args),
        Command::Reset(args) => cmd_reset(&open(root)?, args),
        Command::Merge(args) => cmd_merge(&open(root)?, args, format),
        Command::Show(args) => cmd_show(&open(root)?, args),
        Command::Diff(args) => cmd_diff(&open(root)?, args, format),
    }
}

fn open(root: &Path) -> anyhow::Result<Repository> {
    Repository::open(root)
        .with_context(|| format!("not a graphvcs repository: {}", root.display()))
}

/// The saved staging area of the current branch, or a fresh one.
fn staging(repo: &Repository) -> anyhow::Result<StagingArea> {
    let head = repo.head_branch()?;
    match repo.load_staging()? {
        Some(staging) if staging.branch() == head => Ok(staging),
        _ => Ok(repo.checkout(&head)?),
    }
}

/// Fail if staged changes would be stranded by moving the current branch.
fn require_clean_staging(repo: &Repository, action: &str) -> anyhow::Result<()> {
    if let Some(staging) = repo.load_staging()? {
        if !staging.is_clean() {
            bail!(
                "cannot {action}: {} has staged changes (commit them first)",
                staging.branch()
            );
        }
        repo.clear_staging()?;
    }
    Ok(())
}

fn short(commit: &Commit) -> String {
    commit.id().short_hex()
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---- Attribute parsing ----

/// Parse a `key=value` pair. Values are read as null, bool, integer or
/// float where possible and as a string otherwise; quote a value to force a
/// string.
fn parse_prop(raw: &str) -> anyhow::Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected key=value, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("empty attribute name in {raw:?}");
    }
    Ok((key.to_string(), parse_value(value.trim())))
}

fn parse_value(raw: &str) -> Value {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    if raw == "null" {
        return Value::Null;
    }
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::Float(f),
        _ => Value::String(raw.to_string()),
    }
}

// ---- Commands ----

fn cmd_init(root: &Path, args: InitArgs, mut config: RepoConfig) -> anyhow::Result<()> {
    let path = args.path.as_deref().unwrap_or(root);
    if let Some(branch) = args.initial_branch {
        config.default_branch = branch;
    }
    let repo = Repository::init(path, config)?;
    let branch = repo.head_branch()?;
    println!(
        "{} Initialized graphvcs repository in {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    println!("  Branch: {}", branch.yellow());
    Ok(())
}

fn cmd_status(repo: &Repository, format: OutputFormat) -> anyhow::Result<()> {
    let staging = staging(repo)?;
    let status = staging.changes()?;
    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "branch": staging.branch(),
            "base": staging.base_commit().to_hex(),
            "added": status.added,
            "modified": status.modified,
            "removed": status.removed,
        }));
    }

    println!(
        "On branch {} at {}",
        staging.branch().yellow().bold(),
        staging.base_commit().short_hex().dimmed()
    );
    if status.is_clean() {
        println!("\nNothing staged.");
        return Ok(());
    }
    println!("\nStaged changes:");
    for id in &status.added {
        println!("  {} {id}", "added:   ".green());
    }
    for id in &status.modified {
        println!("  {} {id}", "modified:".yellow());
    }
    for id in &status.removed {
        println!("  {} {id}", "removed: ".red());
    }
    Ok(())
}

fn cmd_node(repo: &Repository, args: NodeArgs) -> anyhow::Result<()> {
    let mut staging = staging(repo)?;
    let id = NodeId::new(args.id)?;
    let mut node = staging
        .get_node(&id)?
        .unwrap_or_else(|| Node::new(id.clone()));
    node.labels.extend(args.labels);
    for raw in &args.props {
        let (key, value) = parse_prop(raw)?;
        node.attributes.insert(key, value);
    }
    staging.add_or_update_node(node)?;
    repo.save_staging(&staging)?;
    println!("  {} node:{id}", "staged:".green());
    Ok(())
}

fn cmd_rel(repo: &Repository, args: RelArgs) -> anyhow::Result<()> {
    let mut staging = staging(repo)?;
    let id = RelationshipId::new(args.id)?;
    let source = NodeId::new(args.source)?;
    let target = NodeId::new(args.target)?;
    let mut rel = match staging.get_relationship(&id)? {
        Some(mut existing) => {
            existing.source = source;
            existing.target = target;
            existing.rel_type = args.rel_type;
            existing
        }
        None => Relationship::new(id.clone(), source, target, args.rel_type),
    };
    for raw in &args.props {
        let (key, value) = parse_prop(raw)?;
        rel.attributes.insert(key, value);
    }
    staging.add_or_update_relationship(rel)?;
    repo.save_staging(&staging)?;
    println!("  {} rel:{id}", "staged:".green());
    Ok(())
}

fn cmd_rm(repo: &Repository, args: RmArgs) -> anyhow::Result<()> {
    let mut staging = staging(repo)?;
    let id: EntityId = args.entity.parse()?;
    if args.detach {
        let Some(node) = id.as_node() else {
            bail!("--detach only applies to nodes");
        };
        for rel in staging.remove_node_detached(node)? {
            println!("  {} rel:{rel}", "removed:".red());
        }
    } else {
        staging.remove(&id)?;
    }
    repo.save_staging(&staging)?;
    println!("  {} {id}", "removed:".red());
    Ok(())
}

fn cmd_commit(repo: &Repository, args: CommitArgs) -> anyhow::Result<()> {
    let mut staging = staging(repo)?;
    let options = if args.allow_empty {
        CommitOptions::forced()
    } else {
        CommitOptions::default()
    };
    let commit = repo.commit_with(&mut staging, repo.default_author(), args.message, options)?;
    repo.clear_staging()?;
    println!(
        "[{} {}] {}",
        staging.branch().yellow(),
        short(&commit).bold(),
        commit.summary()
    );
    Ok(())
}

fn cmd_log(repo: &Repository, args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let branch = match args.branch {
        Some(branch) => branch,
        None => repo.head_branch()?,
    };
    let commits = repo.log(&branch, Some(args.limit))?;

    if format == OutputFormat::Json {
        let entries: Vec<_> = commits
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id().to_hex(),
                    "parents": c.parents().iter().map(|p| p.to_hex()).collect::<Vec<_>>(),
                    "snapshot": c.snapshot().to_hex(),
                    "author": c.author().to_string(),
                    "timestamp_ms": c.timestamp_ms(),
                    "message": c.message(),
                })
            })
            .collect();
        return print_json(&entries);
    }

    for commit in &commits {
        if args.oneline {
            println!("{} {}", short(commit).yellow(), commit.summary());
            continue;
        }
        println!("{} {}", "commit".yellow(), commit.id().to_hex().yellow());
        if commit.is_merge() {
            let parents: Vec<_> = commit.parents().iter().map(|p| p.short_hex()).collect();
            println!("Merge:  {}", parents.join(" "));
        }
        println!("Author: {}", commit.author());
        if let Some(date) = chrono::DateTime::from_timestamp_millis(commit.timestamp_ms()) {
            println!("Date:   {}", date.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        println!();
        for line in commit.message().lines() {
            println!("    {line}");
        }
        println!();
    }
    Ok(())
}

fn cmd_branch(repo: &Repository, args: BranchArgs, format: OutputFormat) -> anyhow::Result<()> {
    match args.name {
        Some(name) if args.delete => {
            repo.delete_branch(&name)?;
            println!("Deleted branch {}", name.yellow());
        }
        Some(name) if args.orphan => {
            let commit = repo.create_orphan_branch(&name)?;
            println!("Created branch {} at empty root {}", name.yellow(), short(&commit).dimmed());
        }
        Some(name) => {
            let from = repo.resolve_rev(args.from.as_deref().unwrap_or("HEAD"))?;
            repo.create_branch(&name, from)?;
            println!("Created branch {} at {}", name.yellow(), from.short_hex().dimmed());
        }
        None if args.delete => bail!("branch name required for --delete"),
        None => {
            let branches = repo.branches()?;
            if format == OutputFormat::Json {
                return print_json(&branches);
            }
            for branch in branches {
                if branch.is_current {
                    println!(
                        "* {} {}",
                        branch.name.green().bold(),
                        branch.commit.short_hex().dimmed()
                    );
                } else {
                    println!("  {} {}", branch.name, branch.commit.short_hex().dimmed());
                }
            }
        }
    }
    Ok(())
}

fn cmd_switch(repo: &Repository, args: SwitchArgs) -> anyhow::Result<()> {
    if args.discard {
        repo.clear_staging()?;
    } else {
        require_clean_staging(repo, "switch branches")?;
    }
    if args.create {
        let from = repo.resolve_rev("HEAD")?;
        repo.create_branch(&args.branch, from)?;
    }
    repo.switch(&args.branch)?;
    if args.create {
        println!("Created and switched to {}", args.branch.yellow().bold());
    } else {
        println!("Switched to {}", args.branch.yellow().bold());
    }
    Ok(())
}

fn cmd_reset(repo: &Repository, args: ResetArgs) -> anyhow::Result<()> {
    require_clean_staging(repo, "reset")?;
    let branch = repo.head_branch()?;
    let target = repo.resolve_rev(&args.rev)?;
    let previous = repo.rollback(&branch, target)?;
    println!(
        "{} moved from {} to {}",
        branch.yellow().bold(),
        previous.short_hex().dimmed(),
        target.short_hex().bold()
    );
    println!("  Later commits are kept and can be restored with `gvcs reset {}`.", previous.short_hex());
    Ok(())
}

fn policy(args: &MergeArgs) -> anyhow::Result<Box<dyn MergePolicy>> {
    let policy: Box<dyn MergePolicy> = match (args.policy, args.prefer) {
        (PolicyArg::ThreeWay, None) => Box::new(ThreeWayPolicy),
        (PolicyArg::ThreeWay, Some(_)) => bail!("--prefer requires --policy attribute"),
        (PolicyArg::Attribute, None) => Box::new(AttributeMergePolicy::new()),
        (PolicyArg::Attribute, Some(side)) => Box::new(AttributeMergePolicy::preferring(match side {
            SideArg::Ours => Side::Ours,
            SideArg::Theirs => Side::Theirs,
        })),
    };
    Ok(policy)
}

/// Resolve every conflict with the same side. Relationships whose endpoint
/// is gone are dropped.
fn take_all(repo: &Repository, merge: &mut ConflictedMerge, take: TakeArg) -> anyhow::Result<()> {
    while let Some(record) = merge.conflicts().into_iter().next() {
        let resolution = match (record.kind, take) {
            (ConflictKind::DanglingEndpoint, _) => Resolution::Remove,
            (_, TakeArg::Ancestor) => Resolution::TakeAncestor,
            (_, TakeArg::Ours) => Resolution::TakeOurs,
            (_, TakeArg::Theirs) => Resolution::TakeTheirs,
        };
        repo.resolve_conflict(merge, &record.id, resolution)?;
    }
    Ok(())
}

fn cmd_merge(repo: &Repository, args: MergeArgs, format: OutputFormat) -> anyhow::Result<()> {
    require_clean_staging(repo, "merge")?;
    let ours = repo.head_branch()?;
    let policy = policy(&args)?;
    let message = args
        .message
        .clone()
        .unwrap_or_else(|| format!("Merge branch '{}' into {ours}", args.branch));

    let outcome = repo.merge(
        &ours,
        &args.branch,
        repo.default_author(),
        message.clone(),
        policy.as_ref(),
    )?;
    match outcome {
        MergeOutcome::UpToDate(_) => println!("Already up to date."),
        MergeOutcome::FastForward(to) => {
            println!("{} Fast-forward to {}", "✓".green(), to.short_hex().bold());
        }
        MergeOutcome::Clean(commit) => {
            println!("{} Merge made commit {}", "✓".green(), short(&commit).bold());
        }
        MergeOutcome::Conflicted(mut merge) => {
            if let Some(take) = args.take {
                take_all(repo, &mut merge, take)?;
                let commit = repo.complete_merge(&ours, merge, repo.default_author(), message)?;
                println!("{} Merge made commit {}", "✓".green(), short(&commit).bold());
                return Ok(());
            }
            let conflicts = merge.conflicts();
            if format == OutputFormat::Json {
                print_json(&conflicts)?;
            } else {
                for record in &conflicts {
                    println!("  {} {} ({})", "conflict:".red().bold(), record.id, record.kind);
                }
            }
            bail!(
                "merge of {} into {ours} has {} conflict(s); rerun with --take or --policy attribute",
                args.branch,
                conflicts.len()
            );
        }
    }
    Ok(())
}

fn cmd_show(repo: &Repository, args: ShowArgs) -> anyhow::Result<()> {
    let commit = repo.resolve_rev(&args.rev)?;
    let graph = repo.materialize(&commit)?;
    print_json(&graph.to_json())
}

fn cmd_diff(repo: &Repository, args: DiffArgs, format: OutputFormat) -> anyhow::Result<()> {
    let from = repo.resolve_rev(&args.from)?;
    let to = repo.resolve_rev(&args.to)?;
    let diff = repo.diff(&from, &to)?;
    if format == OutputFormat::Json {
        return print_json(&diff);
    }
    if diff.is_empty() {
        println!("No changes.");
    }
    for change in &diff.changes {
        let line = match change.kind {
            ChangeKind::Added => format!("+ {}", change.id).green(),
            ChangeKind::Modified => format!("~ {}", change.id).yellow(),
            ChangeKind::Removed => format!("- {}", change.id).red(),
        };
        println!("{line}");
    }
    Ok(())
}
