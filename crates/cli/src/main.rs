//! Stepwise CLI - guided projects with progress tracking.

mod config;
mod draft;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use stepwise_core::{AuthIdentity, Difficulty, ProjectId, UserId};
use stepwise_progress::{CatalogQuery, LearningService, SortOrder};
use stepwise_storage::{JsonStorage, Storage};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Backend, Config};
use crate::draft::ProjectDraft;

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(about = "Guided front-end projects with progress tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file
    #[arg(long, default_value = "stepwise.json")]
    config: PathBuf,

    /// Acting user id (as returned by `signin`)
    #[arg(long, short, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register or refresh an account from a provider identity
    Signin {
        /// Provider uid
        #[arg(long)]
        uid: String,
        /// Verified email
        #[arg(long)]
        email: String,
        /// Display name
        #[arg(long)]
        name: String,
    },
    /// List projects
    Projects {
        /// Text search over title, description and tags
        #[arg(long, short)]
        query: Option<String>,
        /// Only this tier
        #[arg(long)]
        difficulty: Option<Difficulty>,
        /// Only projects with this tag
        #[arg(long)]
        tag: Option<String>,
        /// position | title | difficulty | points
        #[arg(long, default_value = "position")]
        sort: SortOrder,
    },
    /// Show a project and its steps
    Show {
        /// Project ID
        id: String,
    },
    /// Start (or resume) a project
    Start {
        /// Project ID
        id: String,
    },
    /// Go to a step
    Step {
        /// Project ID
        id: String,
        /// Step index (0-based)
        index: usize,
    },
    /// Mark a step complete
    Complete {
        /// Project ID
        id: String,
        /// Step index (0-based)
        index: usize,
    },
    /// Show dashboard
    Progress,
    /// Show leaderboard
    Leaderboard {
        /// Rows to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Admin commands
    #[command(subcommand)]
    Admin(AdminCommands),
    /// Delete the acting account and its progress
    DeleteAccount,
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Publish a project from a JSON file
    Add {
        /// Project file
        file: PathBuf,
    },
    /// Replace a project from a JSON file (must contain its id)
    Update {
        /// Project file
        file: PathBuf,
    },
    /// Delete a project
    Delete {
        /// Project ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    info!(storage = %config.storage_path.display(), backend = ?config.backend, "opening storage");

    match config.backend {
        Backend::Json => {
            let storage = JsonStorage::new(&config.storage_path).await?;
            run(cli, LearningService::new(storage, config.service_config())).await
        }
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => {
            let storage = stepwise_storage::SqliteStorage::new_from_path(&config.storage_path).await?;
            run(cli, LearningService::new(storage, config.service_config())).await
        }
        #[cfg(not(feature = "sqlite"))]
        Backend::Sqlite => anyhow::bail!("this build has no sqlite support (enable the `sqlite` feature)"),
    }
}

async fn run<S: Storage>(cli: Cli, mut service: LearningService<S>) -> Result<()> {
    let user = cli.user.map(UserId::new);

    match cli.command {
        Commands::Signin { uid, email, name } => {
            let identity = AuthIdentity { uid, email, display_name: name };
            let account = service.sign_in(&identity, Utc::now().date_naive()).await?;
            println!("Signed in: {} ({})", account.display_name, account.id);
            println!("  Admin: {}", account.is_admin);
            println!("  Points: {}", account.total_points);
            println!("  Streak: {} day(s)", account.current_streak);
        }
        Commands::Projects { query, difficulty, tag, sort } => {
            let user = require_user(user)?;
            let query = CatalogQuery { text: query, difficulty, tag, sort };
            let rows = service.catalog(&user, &query).await?;

            println!("Projects ({}, {:?} unlock)", rows.len(), service.unlock_policy());
            for row in rows {
                println!("  {} | {:<12} | {:>3}% | {} | {} - {} pts",
                    row.project.id,
                    row.project.difficulty,
                    row.progress_percent,
                    format_state(row.completed, row.unlocked),
                    row.project.title,
                    row.project.points,
                );
            }
        }
        Commands::Show { id } => {
            let project_id = parse_project_id(&id)?;
            let Some(project) = service.storage().fetch_project(project_id).await? else {
                println!("Project not found");
                return Ok(());
            };

            println!("Project: {}", project.id);
            println!("  Title: {}", project.title);
            println!("  Difficulty: {}", project.difficulty);
            println!("  Points: {}", project.points);
            if !project.tags.is_empty() {
                let tags: Vec<&str> = project.tags.iter().map(String::as_str).collect();
                println!("  Tags: {}", tags.join(", "));
            }
            println!("  {}", project.description);
            for (i, step) in project.steps.iter().enumerate() {
                println!("  [{}] {}", i, step.title);
            }
        }
        Commands::Start { id } => {
            let user = require_user(user)?;
            let view = service.open_project(&user, parse_project_id(&id)?).await?;
            println!("{} - {}% complete", view.project.title, view.record.progress_percent);
            if let Some(step) = view.current_step() {
                println!("  Current step [{}]: {}", view.record.current_step, step.title);
            }
        }
        Commands::Step { id, index } => {
            let user = require_user(user)?;
            let view = service.view_step(&user, parse_project_id(&id)?, index).await?;
            if let Some(step) = view.current_step() {
                let done = if view.record.is_step_completed(index) { " (done)" } else { "" };
                println!("[{}/{}] {}{}", index + 1, view.project.total_steps(), step.title, done);
                println!();
                println!("{}", step.description);
                if !step.explanation.is_empty() {
                    println!();
                    println!("{}", step.explanation);
                }
                if let Some(code) = &step.code {
                    println!();
                    println!("{}", code);
                }
                if let Some(hint) = &step.hint {
                    println!();
                    println!("Hint: {}", hint);
                }
                for tip in &step.tips {
                    println!("Tip: {}", tip);
                }
            }
        }
        Commands::Complete { id, index } => {
            let user = require_user(user)?;
            let outcome = service.complete_step(&user, parse_project_id(&id)?, index).await?;
            println!("Step {} complete - {}%", index, outcome.record.progress_percent);
            if outcome.newly_completed {
                println!("Project completed! +{} points (total {})",
                    outcome.points_awarded,
                    outcome.account.total_points,
                );
            }
        }
        Commands::Progress => {
            let user = require_user(user)?;
            let account = service.account(&user).await?;
            let stats = service.dashboard(&user).await?;

            println!("Dashboard for {}", account.display_name);
            println!("  Points: {}", account.total_points);
            println!("  Streak: {} day(s)", account.current_streak);
            println!("  Started: {}", stats.started);
            println!("  Completed: {}", stats.completed);
            println!("  In progress: {}", stats.in_progress);
            println!("  Average progress: {}%", stats.average_percent);
            println!("  Steps completed: {}", stats.completed_steps);
        }
        Commands::Leaderboard { limit } => {
            let board = service.leaderboard(limit).await?;
            println!("Leaderboard");
            for entry in board {
                println!("  {:>3}. {} - {} pts ({} projects)",
                    entry.rank,
                    entry.display_name,
                    entry.total_points,
                    entry.completed_projects,
                );
            }
        }
        Commands::Admin(admin) => {
            let user = require_user(user)?;
            match admin {
                AdminCommands::Add { file } => {
                    let project = ProjectDraft::read(&file)?.into_project();
                    let project = service.create_project(&user, project).await?;
                    println!("Added project: {} - {}", project.id, project.title);
                }
                AdminCommands::Update { file } => {
                    let draft = ProjectDraft::read(&file)?;
                    if draft.id.is_none() {
                        anyhow::bail!("{} has no project id", file.display());
                    }
                    let project = service.update_project(&user, draft.into_project()).await?;
                    println!("Updated project: {} - {}", project.id, project.title);
                }
                AdminCommands::Delete { id } => {
                    let project_id = parse_project_id(&id)?;
                    service.delete_project(&user, project_id).await?;
                    println!("Deleted project: {}", project_id);
                }
            }
        }
        Commands::DeleteAccount => {
            let user = require_user(user)?;
            service.delete_account(&user).await?;
            println!("Deleted account: {}", user);
        }
    }

    Ok(())
}

fn require_user(user: Option<UserId>) -> Result<UserId> {
    user.ok_or_else(|| anyhow::anyhow!("This command needs --user <id>"))
}

fn parse_project_id(s: &str) -> Result<ProjectId> {
    s.parse().map_err(|_| anyhow::anyhow!("Invalid project ID"))
}

fn format_state(completed: bool, unlocked: bool) -> &'static str {
    match (completed, unlocked) {
        (true, _) => "DONE  ",
        (false, true) => "OPEN  ",
        (false, false) => "LOCKED",
    }
}
