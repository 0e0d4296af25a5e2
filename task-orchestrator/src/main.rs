use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use task_orchestrator::config::OrchestratorConfig;
use task_orchestrator::knowledge::ModuleIndex;
use task_orchestrator::registry::RegistryCache;
use task_orchestrator::session::Session;
use task_orchestrator::store::HttpTaskStore;
use task_orchestrator_sdk::{
    CreateTaskRequest, OrchestratorError, TaskAnnotation, TaskStatus,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "task-orchestrator", about = "Task orchestration and context recovery engine")]
struct Cli {
    /// Configuration file (YAML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-establish working context and print the active project
    Recover,
    /// Rebuild the dependency graph and rescore a project's tasks
    Prioritize { project: String },
    /// Promote a coherent batch of todo tasks to doing
    Promote { project: String },
    /// Create a task
    Create {
        project: String,
        title: String,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        feature_tag: Option<String>,
        /// Ids of existing tasks that block the new one
        #[arg(long = "blocked-by")]
        blocked_by: Vec<String>,
        /// Create directly in doing, bypassing the intake queue
        #[arg(long)]
        fast_track: bool,
    },
    /// Move a task to a new status
    Status {
        project: String,
        task: String,
        /// One of: todo, doing, review, done
        #[arg(value_parser = parse_status)]
        to: TaskStatus,
    },
    /// Annotate a doing task as escalated or blocked, or clear with --clear
    Annotate {
        project: String,
        task: String,
        /// One of: escalated, blocked
        #[arg(value_parser = parse_annotation, required_unless_present = "clear")]
        annotation: Option<TaskAnnotation>,
        #[arg(long, conflicts_with = "annotation")]
        clear: bool,
    },
    /// Route a request to the knowledge modules it needs
    Route { text: String },
}

impl Command {
    /// Project the command operates on, when named explicitly
    fn project_id(&self) -> Option<&str> {
        match self {
            Command::Prioritize { project }
            | Command::Promote { project }
            | Command::Create { project, .. }
            | Command::Status { project, .. }
            | Command::Annotate { project, .. } => Some(project),
            Command::Recover | Command::Route { .. } => None,
        }
    }
}

fn parse_status(s: &str) -> std::result::Result<TaskStatus, String> {
    match s {
        "todo" => Ok(TaskStatus::Todo),
        "doing" => Ok(TaskStatus::Doing),
        "review" => Ok(TaskStatus::Review),
        "done" => Ok(TaskStatus::Done),
        other => Err(format!("unknown status '{}'", other)),
    }
}

fn parse_annotation(s: &str) -> std::result::Result<TaskAnnotation, String> {
    match s {
        "escalated" => Ok(TaskAnnotation::Escalated),
        "blocked" => Ok(TaskAnnotation::Blocked),
        other => Err(format!("unknown annotation '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Ambiguity is an answer, not a crash: enumerate the choices
            if let Some(OrchestratorError::AmbiguousProjectSelection { candidates }) =
                e.downcast_ref::<OrchestratorError>()
            {
                eprintln!("Cannot determine the active project. Candidates:");
                for choice in candidates {
                    eprintln!("  {} - {}", choice.id, choice.title);
                }
                eprintln!("Re-run with an explicit project id.");
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = OrchestratorConfig::load(cli.config.as_deref())?;

    // The route command needs no store or cache
    if let Command::Route { text } = &cli.command {
        let index = match &config.modules_file {
            Some(path) => ModuleIndex::from_yaml_file(path)?,
            None => ModuleIndex::builtin(),
        };
        for module in index.route(text) {
            println!("{}\t{}", module.id, module.content_ref);
        }
        return Ok(());
    }

    let store = Arc::new(HttpTaskStore::new(
        &config.store.base_url,
        Duration::from_secs(config.store.timeout_secs),
    )?);
    let cache = match &config.registry_dir {
        Some(dir) => RegistryCache::open(dir.clone())?,
        None => RegistryCache::open_default()?,
    };
    let session = Session::new(store, cache, config);

    // Every response opens with the status header of the project it is about
    if let Some(project_id) = cli.command.project_id() {
        println!("{}", session.project_header(project_id).await?);
    }

    match cli.command {
        Command::Recover => {
            let ctx = session.recover().await?;
            println!("{}", Session::status_header(&ctx));
        }
        Command::Prioritize { project } => {
            let run = session.prioritize(&project).await?;
            for warning in &run.warnings {
                eprintln!("warning: {}", warning);
            }
            for entry in &run.scored {
                println!(
                    "{:>3}  {:<8}{}  {}",
                    entry.score, entry.task.status, entry.task.id, entry.task.title
                );
            }
        }
        Command::Promote { project } => {
            let batch = session.promote_batch(&project).await?;
            if batch.task_ids.is_empty() {
                println!("No todo tasks to promote.");
            } else {
                println!("Promoted {} task(s):", batch.task_ids.len());
                for id in &batch.task_ids {
                    println!("  {}", id);
                }
            }
        }
        Command::Create {
            project,
            title,
            assignee,
            feature_tag,
            blocked_by,
            fast_track,
        } => {
            let task = session
                .create_task(CreateTaskRequest {
                    project_id: project,
                    title,
                    assignee,
                    feature_tag,
                    blocked_by: blocked_by.into_iter().collect(),
                    fast_track,
                })
                .await?;
            println!("{}  {}  score {}", task.id, task.status, task.priority_score);
        }
        Command::Status { project, task, to } => {
            let updated = session.set_status(&project, &task, to).await?;
            println!("{}  {}", updated.id, updated.status);
        }
        Command::Annotate {
            project,
            task,
            annotation,
            clear,
        } => {
            let value = if clear { None } else { annotation };
            let updated = session.annotate(&project, &task, value).await?;
            match updated.annotation {
                Some(TaskAnnotation::Escalated) => println!("{}  escalated", updated.id),
                Some(TaskAnnotation::Blocked) => println!("{}  blocked", updated.id),
                None => println!("{}  annotation cleared", updated.id),
            }
        }
        Command::Route { .. } => unreachable!("handled above"),
    }
    Ok(())
}
