//! CLI command definitions for rqueue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::config::WorkerConfig;
use crate::connection::Connection;
use crate::metrics::{export_metrics, init_metrics};
use crate::queue::{Queue, DEFAULT_QUEUE};
use crate::registry::TaskRegistry;
use crate::store::RedisStore;
use crate::value::{Kwargs, Value};
use crate::worker::Worker;

/// Redis-backed work queue.
#[derive(Parser, Debug)]
#[command(name = "rqueue")]
#[command(about = "Enqueue deferred function calls on Redis and run them in workers")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Redis connection URL.
    #[arg(long, env = "RQ_REDIS_URL", global = true)]
    pub redis_url: Option<String>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run a worker on one or more queues.
    Worker(WorkerArgs),

    /// Put a call on a queue.
    Enqueue(EnqueueArgs),

    /// Show the number of pending jobs per queue.
    Info(InfoArgs),

    /// Remove every pending job from queues.
    Empty(EmptyArgs),
}

/// Arguments for `rqueue worker`.
#[derive(Parser, Debug)]
pub struct WorkerArgs {
    /// Queue to listen on; repeat in priority order. Defaults to RQ_QUEUES or "default".
    #[arg(short = 'q', long = "queue")]
    pub queues: Vec<String>,

    /// Exit once every queue is empty.
    #[arg(short, long)]
    pub burst: bool,

    /// Worker name (default: generated).
    #[arg(long)]
    pub name: Option<String>,

    /// Longest single blocking wait on Redis, in seconds.
    #[arg(long)]
    pub poll_timeout: Option<u64>,

    /// Print Prometheus metrics when the worker stops.
    #[arg(long)]
    pub print_metrics: bool,
}

/// Arguments for `rqueue enqueue`.
#[derive(Parser, Debug)]
pub struct EnqueueArgs {
    /// Queue name.
    pub queue: String,

    /// Registered function name.
    pub func: String,

    /// Positional argument as JSON (bare words are taken as strings); repeatable.
    #[arg(short, long = "arg")]
    pub args: Vec<String>,

    /// Keyword argument as KEY=JSON; repeatable.
    #[arg(short, long = "kwarg")]
    pub kwargs: Vec<String>,
}

/// Arguments for `rqueue info`.
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Queues to inspect.
    #[arg(default_value = DEFAULT_QUEUE)]
    pub queues: Vec<String>,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `rqueue empty`.
#[derive(Parser, Debug)]
pub struct EmptyArgs {
    /// Queues to empty.
    #[arg(required = true)]
    pub queues: Vec<String>,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
///
/// `registry` holds the functions a worker started from this CLI may run.
pub async fn run_with_cli(cli: Cli, registry: TaskRegistry) -> anyhow::Result<()> {
    let mut config = WorkerConfig::from_env()?;
    if let Some(url) = cli.redis_url {
        config.redis_url = url;
    }

    match cli.command {
        Commands::Worker(args) => run_worker_command(args, config, registry).await,
        Commands::Enqueue(args) => run_enqueue_command(args, &config).await,
        Commands::Info(args) => run_info_command(args, &config).await,
        Commands::Empty(args) => run_empty_command(args, &config).await,
    }
}

async fn connect(config: &WorkerConfig) -> anyhow::Result<Connection> {
    let store = RedisStore::connect(&config.redis_url)
        .await
        .with_context(|| format!("connecting to {}", config.redis_url))?;
    Ok(Arc::new(store))
}

async fn run_worker_command(
    args: WorkerArgs,
    mut config: WorkerConfig,
    registry: TaskRegistry,
) -> anyhow::Result<()> {
    if !args.queues.is_empty() {
        config.queues = args.queues;
    }
    if args.burst {
        config.burst = true;
    }
    if let Some(secs) = args.poll_timeout {
        config.poll_timeout = Duration::from_secs(secs);
    }
    if let Some(name) = args.name {
        config.name = Some(name);
    }

    init_metrics()?;

    let conn = connect(&config).await?;
    let mut worker = Worker::from_config(&config, conn, Arc::new(registry))?;

    let shutdown = worker.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping after the current job");
            shutdown.shutdown();
        }
    });

    let did_work = worker.work(config.burst).await?;
    let stats = worker.stats();
    info!(
        did_work = did_work,
        completed = stats.jobs_completed,
        failed = stats.jobs_failed,
        dequeue_errors = stats.dequeue_errors,
        "Worker finished"
    );

    if args.print_metrics {
        print!("{}", export_metrics());
    }

    Ok(())
}

async fn run_enqueue_command(args: EnqueueArgs, config: &WorkerConfig) -> anyhow::Result<()> {
    let positional: Vec<Value> = args.args.iter().map(|a| parse_value(a)).collect();
    let kwargs = parse_kwargs(&args.kwargs)?;

    let queue = Queue::new(connect(config).await?, args.queue);
    let job = queue.enqueue(args.func, positional, kwargs).await?;
    println!("Enqueued {} on {}", job.description(), queue);
    Ok(())
}

#[derive(Debug, Serialize)]
struct QueueInfo {
    name: String,
    pending: usize,
}

async fn run_info_command(args: InfoArgs, config: &WorkerConfig) -> anyhow::Result<()> {
    let conn = connect(config).await?;

    let mut infos = Vec::with_capacity(args.queues.len());
    for name in args.queues {
        let queue = Queue::new(Arc::clone(&conn), name);
        infos.push(QueueInfo {
            pending: queue.count().await?,
            name: queue.name().to_string(),
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        for info in &infos {
            println!("{:<24} {}", info.name, info.pending);
        }
    }
    Ok(())
}

async fn run_empty_command(args: EmptyArgs, config: &WorkerConfig) -> anyhow::Result<()> {
    let conn = connect(config).await?;
    for name in args.queues {
        let queue = Queue::new(Arc::clone(&conn), name);
        let pending = queue.count().await?;
        queue.clear().await?;
        println!("Removed {} job(s) from {}", pending, queue);
    }
    Ok(())
}

/// Parses a CLI argument as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from_json)
        .unwrap_or_else(|_| Value::Str(raw.to_string()))
}

fn parse_kwargs(raw: &[String]) -> anyhow::Result<Kwargs> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("keyword argument '{}' is not KEY=VALUE", pair))?;
            anyhow::ensure!(!key.is_empty(), "keyword argument '{}' has an empty key", pair);
            Ok((key.to_string(), parse_value(value)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("3"), Value::Int(3));
        assert_eq!(parse_value("\"Nick\""), Value::from("Nick"));
        assert_eq!(parse_value("Nick"), Value::from("Nick"));
        assert_eq!(
            parse_value("[1, true]"),
            Value::List(vec![Value::Int(1), Value::Bool(true)])
        );
    }

    #[test]
    fn test_parse_kwargs() {
        let kwargs =
            parse_kwargs(&["name=Frank".to_string(), "n=2".to_string()]).expect("valid kwargs");
        assert_eq!(kwargs["name"], Value::from("Frank"));
        assert_eq!(kwargs["n"], Value::Int(2));

        assert!(parse_kwargs(&["novalue".to_string()]).is_err());
        assert!(parse_kwargs(&["=1".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_worker_command() {
        let cli = Cli::try_parse_from(["rqueue", "worker", "-q", "high", "-q", "low", "--burst"])
            .expect("valid args");
        match cli.command {
            Commands::Worker(args) => {
                assert_eq!(args.queues, vec!["high", "low"]);
                assert!(args.burst);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_enqueue_command() {
        let cli = Cli::try_parse_from([
            "rqueue", "enqueue", "default", "echo", "--arg", "1", "--kwarg", "name=Frank",
        ])
        .expect("valid args");
        match cli.command {
            Commands::Enqueue(args) => {
                assert_eq!(args.queue, "default");
                assert_eq!(args.func, "echo");
                assert_eq!(args.args, vec!["1"]);
                assert_eq!(args.kwargs, vec!["name=Frank"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
