use clap::Parser;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = gvcs_sdk::RepoConfig::from_env()?;
    let level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    // File logs only once the repository exists.
    let repo_dir = cli.repo.join(&config.repo_dir_name);
    let logs_dir = repo_dir.is_dir().then(|| config.logs_dir(&repo_dir));
    let _guard = gvcs_sdk::telemetry::init_tracing_with_logs(level, logs_dir.as_deref())?;
    commands::run_command(cli, config)
}
