mod cli;
mod commands;
mod config;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::*;
use config::CliConfig;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    tracing::debug!(?config, "configuration loaded");

    match args.command {
        Command::Encode { request, json } => {
            println!("{}", commands::encode(&request, &config.request, json)?);
        }
        Command::Decode { frame, json } => {
            println!("{}", commands::decode(&frame, json)?);
        }
        Command::Value { kind, bytes, json } => {
            println!("{}", commands::decode_value(&kind, &bytes, json)?);
        }
        Command::Send {
            request,
            bridge,
            port,
            wait,
            json,
        } => {
            let target = commands::Target::select(&config, bridge, port);
            let responses = commands::send(
                &request,
                &config.request,
                target,
                Duration::from_millis(wait),
                json,
            )?;
            for (i, response) in responses.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("{response}");
            }
        }
        Command::Port { port } => {
            println!("{}", commands::check_port(&port));
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` overrides the level chosen by `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
