use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fdfs_client::{Client, ConfigSource};
use fdfs_logging::LogConfig;

mod commands;
mod output;

use commands::Command;
use output::{OutputFormat, Printer};

/// FastDFS command-line client
///
/// Uploads, downloads and deletes files through the trackers named in a
/// FastDFS `client.conf`.
#[derive(Parser, Debug)]
#[command(name = "fdfs", version, about)]
struct Cli {
    /// Path to client.conf.
    #[arg(short, long, env = "FDFS_CLIENT_CONF", default_value = "/etc/fdfs/client.conf")]
    conf: PathBuf,

    /// Log filter; RUST_LOG overrides it.
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Directory for rolling log files.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        level: cli.log_level.clone(),
        log_dir: cli.log_dir.clone(),
        json_format: cli.json_logs,
        ..LogConfig::default()
    };
    let (dispatch, _guard) = fdfs_logging::init_logging(&log_config)?;

    let client = Client::builder(ConfigSource::File(cli.conf.clone()))
        .logger(dispatch)
        .build()
        .await
        .with_context(|| format!("connecting with {}", cli.conf.display()))?;

    let mut printer = Printer::stdout(cli.format);
    let result = cli.command.run(&client, &mut printer).await;
    client.close().await;
    result
}
