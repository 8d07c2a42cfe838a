use activemq_producer::{Endpoint, Process, batch_key, read_people, stomp};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Publishes rows of a CSV file as JSON messages to an ActiveMQ queue.
#[derive(Debug, Parser)]
#[command(name = "producer", version)]
struct Cli {
    /// Broker endpoint, e.g. ssl://b-1234.mq.us-east-1.amazonaws.com:61617
    endpoint: String,
    queue: String,
    /// Batch-tracking key; the run's start time is appended to it
    seeder_key: String,
    num_messages: usize,

    #[arg(long, env = "ACTIVEMQ_USERNAME", default_value = "admin")]
    username: String,
    #[arg(
        long,
        env = "ACTIVEMQ_PASSWORD",
        default_value = "admin",
        hide_env_values = true
    )]
    password: String,
    #[arg(long, default_value = "us-500.csv")]
    data_file: PathBuf,
}

async fn run(cli: Cli) -> Result<()> {
    let endpoint: Endpoint = cli.endpoint.parse()?;
    let people = read_people(&cli.data_file)?;
    let key = batch_key(&cli.seeder_key, chrono::Local::now());
    tracing::info!(%endpoint, queue = %cli.queue, %key, "Publishing to broker");

    let connection = stomp::connect(&endpoint, &cli.username, &cli.password).await?;

    let mut process = Process::new(connection, cli.queue, key);
    let sent = process.run(&people, cli.num_messages).await;
    if let Err(err) = process.into_publisher().disconnect().await {
        tracing::warn!("Failed to disconnect cleanly: {:#}", err);
    }

    tracing::info!("Number of messages sent: {}", sent?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = err.print();
            return code;
        }
    };

    match run(cli).await {
        Ok(()) => {
            tracing::info!("Messages sent successfully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("Exception occurred: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
