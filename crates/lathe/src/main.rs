//! lathe CLI - front-end asset build pipeline.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use lathe_pipeline::{task_listing, LayoutVariant, Target};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "lathe")]
#[command(about = "Front-end asset build pipeline with a live-reload dev server")]
#[command(version)]
pub struct Cli {
    /// Task to run; omit to list the available tasks
    #[arg(value_parser = parse_target)]
    task: Option<Target>,

    /// Print the task table and exit
    #[arg(long)]
    tasks: bool,

    /// Path to lathe.toml config file
    #[arg(short, long, default_value = "lathe.toml")]
    config: PathBuf,

    /// Project layout: root or app
    #[arg(long, value_parser = parse_layout)]
    layout: Option<LayoutVariant>,

    /// Port for the dev server
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not open a browser when serving
    #[arg(long)]
    no_open: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_target(s: &str) -> Result<Target, String> {
    s.parse().map_err(|e: lathe_pipeline::UnknownTarget| e.to_string())
}

fn parse_layout(s: &str) -> Result<LayoutVariant, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.tasks {
        print!("{}", task_listing());
        return Ok(());
    }

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.task.unwrap_or(Target::Default) {
        Target::Default => {
            commands::list::run(&cli.config).await?;
        }
        target => {
            let overrides = config::Overrides {
                layout: cli.layout,
                port: cli.port,
                no_open: cli.no_open,
            };
            let settings = config::load_config(&cli.config)?.into_settings(&overrides)?;
            commands::run::run(target, settings).await?;
        }
    }

    Ok(())
}
