// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Sweeper CLI: provisions dead-letter paths for abandoned queues and drains
//! or purges their backlog in one bounded pass.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rabbitmq_sweeper::{
    admin::RabbitMQAdmin,
    channel::new_amqp_channel,
    config::{PoliciesConfig, ServerConfig},
    messaging::RabbitMQMessaging,
    sweeper::{SweepMode, Sweeper},
};

#[derive(Parser)]
#[command(
    name = "rabbitmq-sweeper",
    about = "Provision dead-letter paths for abandoned queues and drain or purge their backlog"
)]
struct Cli {
    /// Server configuration file
    #[arg(long, default_value = "config/config.yml")]
    config: PathBuf,

    /// Policies configuration file
    #[arg(long, default_value = "config/policies-config.yml")]
    policies: PathBuf,

    /// Logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Republish every pending message through the dead-letter path
    Drain,
    /// Discard every pending message
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(cli.verbose >= 2)
        .init();

    let server = ServerConfig::from_file(&cli.config).context("loading server configuration")?;
    let policies =
        PoliciesConfig::from_file(&cli.policies).context("loading policies configuration")?;

    let mode = match cli.command {
        Command::Drain => SweepMode::Drain,
        Command::Purge => SweepMode::Purge,
    };

    let (connection, channel) = new_amqp_channel(&server).await?;
    let admin = RabbitMQAdmin::new(&server)?;
    let sweeper = Sweeper::new(admin, RabbitMQMessaging::new(channel.clone()), policies);

    let result = sweeper.run(mode).await;

    // Release the channel and connection before propagating the run outcome.
    if let Err(err) = channel.close(200, "sweep finished").await {
        error!(error = err.to_string(), "failure to close the channel");
    }
    if let Err(err) = connection.close(200, "sweep finished").await {
        error!(error = err.to_string(), "failure to close the connection");
    }

    let summary = result?;
    info!(
        swept = summary.swept,
        failed = summary.failed,
        messages = summary.messages,
        "sweep finished"
    );

    anyhow::ensure!(
        summary.failed == 0,
        "{} queue(s) failed to sweep",
        summary.failed
    );
    Ok(())
}
