//! workq CLI: drive a work queue from the command line.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use workq::config::Config;
use workq::telemetry::{TelemetryConfig, init_telemetry};
use workq::{Consumer, QueueStats, WorkItem, WorkQueue};

#[derive(Parser)]
#[command(name = "workq", about = "Growable ring-buffer work queue")]
struct Cli {
    /// TOML config file (defaults to environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct QueueArgs {
    /// Override the initial slot count
    #[arg(long)]
    initial_capacity: Option<usize>,
    /// Override the growth ceiling
    #[arg(long)]
    max_capacity: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Run producers and a consumer against one queue, then print stats
    Run {
        /// Number of producer tasks
        #[arg(long, default_value_t = 2)]
        producers: usize,
        /// Items submitted by each producer
        #[arg(long, default_value_t = 1000)]
        items: u64,
        /// Print stats as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        queue: QueueArgs,
    },
    /// Queue stdin lines and print `tag<TAB>len` for each as it is consumed
    Pipe {
        #[command(flatten)]
        queue: QueueArgs,
    },
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    match cli.command {
        Command::Run {
            producers,
            items,
            json,
            queue,
        } => {
            apply_overrides(&mut config, &queue);
            let _guard = init_telemetry(telemetry_config(&config))?;
            cmd_run(&config, producers, items, json).await
        }
        Command::Pipe { queue } => {
            apply_overrides(&mut config, &queue);
            let _guard = init_telemetry(telemetry_config(&config))?;
            cmd_pipe(&config).await
        }
        Command::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn apply_overrides(config: &mut Config, args: &QueueArgs) {
    if let Some(initial) = args.initial_capacity {
        config.queue.initial_capacity = initial;
    }
    if let Some(max) = args.max_capacity {
        config.queue.max_capacity = Some(max);
    }
}

fn telemetry_config(config: &Config) -> TelemetryConfig {
    TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "workq".to_string(),
        default_level: config.log_level.clone(),
    }
}

async fn cmd_run(config: &Config, producers: usize, items: u64, json: bool) -> anyhow::Result<()> {
    let queue = WorkQueue::new(&config.queue)?;
    let consumer = Consumer::new(queue.clone(), config.queue.poll_interval());

    let consume = tokio::spawn(async move {
        let mut bytes = 0u64;
        let report = consumer
            .run(|item| {
                bytes += item.len() as u64;
                Ok(())
            })
            .await;
        (report, bytes)
    });

    let mut handles = Vec::with_capacity(producers);
    for producer in 0..producers as u64 {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..items {
                let tag = producer * items + i;
                queue
                    .submit_wait(WorkItem::new(tag, format!("producer-{producer}-item-{i}")))
                    .await?;
                if i % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            Ok::<_, workq::Error>(())
        }));
    }
    let mut produced = Ok(());
    for handle in handles {
        // Join every producer before stopping so the consumer is never left waiting.
        let result = handle.await.map_err(anyhow::Error::from).and_then(|r| Ok(r?));
        if produced.is_ok() {
            produced = result;
        }
    }

    queue.stop_wait().await?;
    let (report, bytes) = consume.await?;
    produced?;
    let stats = queue.stats();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "queue": stats,
                "consumer": report,
                "payload_bytes": bytes,
            }))?
        );
    } else {
        print_stats(&stats);
        println!("Processed:  {}", report.processed);
        println!("Failed:     {}", report.failed);
        println!("Bytes:      {bytes}");
    }
    Ok(())
}

async fn cmd_pipe(config: &Config) -> anyhow::Result<()> {
    let queue = WorkQueue::new(&config.queue)?;
    let consumer = Consumer::new(queue.clone(), config.queue.poll_interval());

    let consume = tokio::spawn(async move {
        consumer
            .run(|item| {
                println!("{}\t{}", item.tag, item.len());
                Ok(())
            })
            .await
    });

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut tag = 0u64;
    let mut read = Ok(());
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                read = Err(anyhow::Error::from(e));
                break;
            }
        };
        if let Err(e) = queue.submit_wait(WorkItem::new(tag, line)).await {
            read = Err(e.into());
            break;
        }
        tag += 1;
    }

    queue.stop_wait().await?;
    let report = consume.await?;
    read?;
    tracing::info!(processed = report.processed, "pipe finished");
    Ok(())
}

fn print_stats(stats: &QueueStats) {
    println!("Queue:      {}", stats.name);
    println!("Capacity:   {}", stats.capacity);
    println!("Count:      {}", stats.count);
    println!("Pushed:     {}", stats.pushed);
    println!("Popped:     {}", stats.popped);
    println!("Grows:      {}", stats.grows);
}
