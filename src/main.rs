use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use hive::config::Config;
use hive::core::{TaskStatus, TaskTree};
use hive::roles::{
    CommandRole, GoalPlanner, JsonlLogger, Logger, Planner, Producer, Reviewer, RoleKind,
};
use hive::state::RunSnapshot;
use hive::util::{expand_tilde, truncate};
use hive::{hlog, hlog_error, Error, Orchestrator, Result, RunResult};

/// Hive - multi-agent task orchestrator
#[derive(Parser, Debug)]
#[command(name = "hive")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    HIVE_DEBUG=1        Enable debug logging (alternative to --debug)\n    HIVE_DEBUG=trace    Also log raw command role output")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.hive/hive.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Plan, produce and review work for a goal
    Run {
        /// What should be built (optional when resuming)
        #[arg(short, long)]
        goal: Option<String>,

        /// Project directory for artifacts, journal and state
        #[arg(short, long, default_value = ".")]
        path: String,

        /// Producer/reviewer pairs running at once
        #[arg(long)]
        pairs: Option<usize>,

        /// Maximum planning rounds
        #[arg(long)]
        rounds: Option<u32>,

        /// Continue from the saved state in the project directory
        #[arg(long)]
        resume: bool,
    },

    /// Show the saved task tree of a project
    Status {
        #[arg(short, long, default_value = ".")]
        path: String,
    },

    /// Print the effective configuration
    Config {
        /// Write the configuration file if it does not exist yet
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    hive::log::init_with_debug(cli.debug);

    if hive::log::is_debug() {
        hlog!("Hive starting (debug mode enabled)");
    } else {
        hlog!("Hive starting");
    }

    let result = match cli.command {
        Command::Run {
            goal,
            path,
            pairs,
            rounds,
            resume,
        } => run_goal(goal, &path, pairs, rounds, resume),
        Command::Status { path } => run_status(&path),
        Command::Config { init } => run_config(init),
    };
    if let Err(e) = &result {
        hlog_error!("Command failed: {}", e);
    }
    result
}

fn run_goal(
    goal: Option<String>,
    path: &str,
    pairs: Option<usize>,
    rounds: Option<u32>,
    resume: bool,
) -> Result<()> {
    let config = Config::load()?;
    let project_path = expand_tilde(path);
    std::fs::create_dir_all(&project_path)?;

    let snapshot = if resume {
        let snapshot = RunSnapshot::load_sync(&project_path)?;
        if snapshot.is_none() {
            println!("No saved state in {}, starting fresh", project_path.display());
        }
        snapshot
    } else {
        None
    };

    let goal = resolve_goal(goal, snapshot.as_ref())?;

    let mut run_config = config.run_config(&goal, path);
    if let Some(pairs) = pairs {
        run_config.pairs = pairs;
    }
    if let Some(rounds) = rounds {
        run_config.rounds = rounds;
    }
    run_config.validate()?;

    hlog!(
        "Run command: goal={:?}, path={}, pairs={}, rounds={}, resume={}",
        goal,
        project_path.display(),
        run_config.pairs,
        run_config.rounds,
        resume
    );

    let (planner, producer, reviewer, logger) = build_roles(&config, &project_path)?;

    println!("Goal:    {}", goal);
    println!("Project: {}", project_path.display());
    println!();

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                hlog!("Interrupt received, stopping after the current round");
                eprintln!("Interrupted, finishing the current round...");
                on_signal.cancel();
            }
        });

        let mut orchestrator = Orchestrator::new(run_config, planner, producer, reviewer, logger)
            .with_cancellation(cancel);
        if let Some(snapshot) = snapshot {
            orchestrator = orchestrator.resume(snapshot);
        }
        orchestrator.run().await
    })?;

    print_result(&result);
    Ok(())
}

/// The goal to run. A resumed run keeps the saved goal and refuses a
/// different one.
fn resolve_goal(goal: Option<String>, snapshot: Option<&RunSnapshot>) -> Result<String> {
    match (goal, snapshot) {
        (Some(goal), Some(snapshot)) if goal.trim() != snapshot.goal.trim() => {
            Err(Error::Validation(format!(
                "--goal '{}' does not match the saved goal '{}'; drop --goal or --resume",
                goal, snapshot.goal
            )))
        }
        (_, Some(snapshot)) => Ok(snapshot.goal.clone()),
        (Some(goal), None) => Ok(goal),
        (None, None) => Err(Error::Validation("--goal is required".to_string())),
    }
}

/// Wire each role from its configured command, or the built-in default.
#[allow(clippy::type_complexity)]
fn build_roles(
    config: &Config,
    project_path: &Path,
) -> Result<(
    Arc<dyn Planner>,
    Arc<dyn Producer>,
    Arc<dyn Reviewer>,
    Arc<dyn Logger>,
)> {
    let timeouts = config.timeouts();
    let command = |kind: RoleKind, line: &str| -> Result<CommandRole> {
        let limit = match kind {
            RoleKind::Planner => timeouts.planner,
            RoleKind::Producer => timeouts.producer,
            RoleKind::Reviewer => timeouts.reviewer,
            RoleKind::Logger => timeouts.logger,
        };
        let mut role = CommandRole::from_command_line(kind, line)?.with_cwd(project_path);
        if let Some(limit) = limit {
            role = role.with_timeout(limit);
        }
        Ok(role)
    };
    let required = |kind: RoleKind, line: Option<&str>| -> Result<CommandRole> {
        let line = line.ok_or_else(|| {
            Error::Validation(format!(
                "no {} command configured; set [roles] {} in {}",
                kind,
                kind,
                Config::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "hive.toml".to_string())
            ))
        })?;
        command(kind, line)
    };

    let planner: Arc<dyn Planner> = match config.roles.planner.as_deref() {
        Some(line) => Arc::new(command(RoleKind::Planner, line)?),
        None => Arc::new(GoalPlanner),
    };
    let producer: Arc<dyn Producer> = Arc::new(required(
        RoleKind::Producer,
        config.roles.producer.as_deref(),
    )?);
    let reviewer: Arc<dyn Reviewer> = Arc::new(required(
        RoleKind::Reviewer,
        config.roles.reviewer.as_deref(),
    )?);
    let logger: Arc<dyn Logger> = match config.roles.logger.as_deref() {
        Some(line) => Arc::new(command(RoleKind::Logger, line)?),
        None => Arc::new(JsonlLogger::in_project(project_path)),
    };

    Ok((planner, producer, reviewer, logger))
}

fn print_result(result: &RunResult) {
    println!();
    println!("Stopped: {}", result.stop_reason);
    println!(
        "Rounds:  {} run, {} planning cycle(s), last round {}",
        result.rounds_run, result.planning_cycles, result.last_round
    );
    for summary in &result.summaries {
        println!("  {}", summary);
    }
    println!();
    print_tree(&result.tree);
    println!();
    println!("Leaves:  {}", result.counts);
}

fn run_status(path: &str) -> Result<()> {
    let project_path: PathBuf = expand_tilde(path);
    hlog!("Status command: path={}", project_path.display());

    let Some(snapshot) = RunSnapshot::load_sync(&project_path)? else {
        println!("No saved state in {}", project_path.display());
        return Ok(());
    };

    println!("Goal:    {}", snapshot.goal);
    println!("Round:   {}", snapshot.round);
    println!("Saved:   {}", snapshot.saved_at.format("%Y-%m-%d %H:%M:%S"));
    for summary in &snapshot.summaries {
        println!("  {}", summary);
    }
    println!();
    print_tree(&snapshot.tree);
    println!();
    println!("Leaves:  {}", snapshot.tree.leaf_counts());
    Ok(())
}

fn run_config(init: bool) -> Result<()> {
    let config = Config::load()?;
    let path = Config::config_path()?;
    if init && !path.exists() {
        config.save()?;
        println!("Wrote {}", path.display());
    }
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_tree(tree: &TaskTree) {
    let mut stack = vec![(&tree.root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        println!(
            "{}{} {} {}",
            "  ".repeat(depth),
            node.id.short(),
            format_status(node.status),
            truncate(&node.description, 70)
        );
        for child in node.children.iter().rev() {
            stack.push((child, depth + 1));
        }
    }
}

/// Format task status with color codes for terminal.
fn format_status(status: TaskStatus) -> String {
    match status {
        TaskStatus::Approved => format!("\x1b[32m{}\x1b[0m", status), // Green
        TaskStatus::Failed => format!("\x1b[31m{}\x1b[0m", status),   // Red
        TaskStatus::Rejected => format!("\x1b[35m{}\x1b[0m", status), // Magenta
        TaskStatus::InProgress => format!("\x1b[33m{}\x1b[0m", status), // Yellow
        TaskStatus::Completed => format!("\x1b[36m{}\x1b[0m", status), // Cyan
        TaskStatus::Pending => format!("\x1b[90m{}\x1b[0m", status),  // Gray
    }
}
