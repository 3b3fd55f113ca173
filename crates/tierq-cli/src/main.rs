//! tierq - command line front end for the task queue.

mod workers;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tierq_core::domain::{MetaData, TaskRecord};
use tierq_core::ports::{Field, PageInfo, SystemClock};
use tierq_core::{
    DatabaseConfig, Pagination, Processor, ProcessorId, Queue, QueueConfig, QueueError,
    SqliteTaskStore, TaskFilter, TaskId, TaskStore,
};

const DEFAULT_DATABASE: &str = "tierq.db";

#[derive(Parser)]
#[command(name = "tierq")]
#[command(about = "Persistent hierarchical task queue")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "TIERQ_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (":memory:" for a throwaway database)
    #[arg(short, long, global = true, env = "TIERQ_DATABASE")]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// Add a task
    Enqueue {
        /// Worker selector
        #[arg(short, long)]
        worker: String,

        /// Queue group (root tasks only)
        #[arg(short, long)]
        group: Option<String>,

        /// Parent task id
        #[arg(short, long)]
        parent: Option<i64>,

        /// Metadata entry, value parsed as JSON when possible
        #[arg(short, long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, serde_json::Value)>,

        /// Give up after this many attempts (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        max_executions: u32,

        /// Time expression after which the task fails, e.g. "+2 hours"
        #[arg(long)]
        timeout: Option<String>,

        /// Fail this task as soon as one of its children fails
        #[arg(long)]
        break_on_child_fail: bool,
    },

    /// Process tasks until none is claimable
    Work {
        /// Processor id (generated when omitted)
        #[arg(short, long)]
        processor: Option<String>,

        /// Queue group
        #[arg(short, long)]
        group: Option<String>,

        /// Advance a single step only
        #[arg(long)]
        once: bool,

        /// Upper bound on steps for one invocation
        #[arg(long, default_value_t = 10_000)]
        max_steps: usize,
    },

    /// List tasks as JSON
    List {
        /// Status, or a comma separated list of statuses
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long)]
        group: Option<String>,

        #[arg(short, long)]
        worker: Option<String>,

        /// Metadata equality, key=value
        #[arg(short, long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, serde_json::Value)>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Tasks per page (0 = all; defaults to the configured page size)
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Show one task with its effective metadata
    Show {
        id: i64,
    },

    /// Delete finished root tasks created before a time expression
    Cleanup {
        /// e.g. "4 days" or "2016-10-04"
        before: String,
    },
}

#[derive(Serialize)]
struct ListOutput {
    tasks: Vec<TaskRecord>,
    pagination: PageInfo,
}

#[derive(Serialize)]
struct ShowOutput {
    record: TaskRecord,
    effective_meta_data: MetaData,
}

fn parse_meta(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("metadata key must not be empty".to_string());
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn load_config(cli: &Cli) -> Result<QueueConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<QueueConfig>(&content)?
        }
        None => QueueConfig::default(),
    };

    match cli.database.as_deref() {
        Some(":memory:") => config.database = Some(DatabaseConfig::Memory),
        Some(path) => {
            config.database = Some(DatabaseConfig::File {
                path: PathBuf::from(path),
            })
        }
        None if config.database.is_none() => {
            config.database = Some(DatabaseConfig::File {
                path: PathBuf::from(DEFAULT_DATABASE),
            })
        }
        None => {}
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let store: Arc<dyn TaskStore> =
        Arc::new(SqliteTaskStore::open(config.clone(), Arc::new(SystemClock)).await?);
    let queue = Queue::new(store.clone(), &config);

    match cli.command {
        Commands::Init => {
            info!(database = ?config.database, table = %config.table_name, "schema ready");
        }

        Commands::Enqueue {
            worker,
            group,
            parent,
            meta,
            max_executions,
            timeout,
            break_on_child_fail,
        } => {
            let mut task = queue.new_task(worker);
            if let Some(group) = group {
                task.set_queue_group(group);
            }
            if let Some(parent_id) = parent {
                let parent = queue.get(TaskId::new(parent_id)).await?.ok_or_else(|| {
                    QueueError::InvalidArgument(format!("parent task {parent_id} not found"))
                })?;
                parent.attach_child(&mut task)?;
            }
            for (key, value) in meta {
                task.set_meta(key, value, tierq_core::MetaScope::Local);
            }
            task.set_max_executions(max_executions);
            task.set_timeout(timeout.as_deref(), queue.store().now())?;
            task.set_break_on_child_fail(break_on_child_fail);

            let id = queue.enqueue(&mut task).await?;
            println!("{}", id.get());
        }

        Commands::Work {
            processor,
            group,
            once,
            max_steps,
        } => {
            let id = match processor {
                Some(raw) => ProcessorId::parse(raw)?,
                None => ProcessorId::generate(),
            };
            let group = group.unwrap_or_else(|| config.default_queue_group.clone());
            let workers = Arc::new(workers::builtin_registry()?);
            let processor = Processor::new(id, group, store.clone(), workers);
            info!(processor = %processor.id(), group = processor.queue_group(), "working");

            let limit = if once { 1 } else { max_steps };
            let mut steps = 0usize;
            while steps < limit {
                match processor.process_next().await {
                    Ok(Some(_)) => steps += 1,
                    Ok(None) => break,
                    Err(QueueError::WorkerNotFound(selector)) => {
                        error!(%selector, "task failed: worker not registered");
                        steps += 1;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            info!(steps, "done");
        }

        Commands::List {
            status,
            group,
            worker,
            meta,
            page,
            per_page,
        } => {
            let mut filter = TaskFilter::new();
            if let Some(status) = status {
                filter = filter.in_csv(Field::Status, &status);
            }
            if let Some(group) = group {
                filter = filter.eq(Field::QueueGroup, group);
            }
            if let Some(worker) = worker {
                filter = filter.eq(Field::Worker, worker);
            }
            for (key, value) in meta {
                filter = filter.meta(key, value);
            }
            let pagination = Pagination {
                page,
                per_page: Some(per_page.unwrap_or(config.default_page_size)),
            };

            let result = queue.find(&filter, Some(pagination)).await?;
            print_json(&ListOutput {
                tasks: result.tasks.values().map(|task| task.to_record()).collect(),
                pagination: result.pagination,
            })?;
        }

        Commands::Show { id } => {
            let task = queue
                .get(TaskId::new(id))
                .await?
                .ok_or_else(|| QueueError::InvalidArgument(format!("task {id} not found")))?;
            print_json(&ShowOutput {
                record: task.to_record(),
                effective_meta_data: task.meta_data(),
            })?;
        }

        Commands::Cleanup { before } => {
            let report = queue.cleanup(&before).await?;
            print_json(&report)?;
        }
    }

    Ok(())
}
