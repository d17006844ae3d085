use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::Config, context::AppContext};

mod config;
mod context;
mod error;
mod modes;
mod network;
mod realtime;
mod schedule;
mod spatial;
mod tools;

#[derive(Parser)]
#[command(version, about = "NYC bike, ferry and subway tools for LLM hosts")]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the tools over MCP on stdin/stdout
    Stdio,
    /// Serve the tools over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        address: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run one tool and print its result
    Call {
        /// Tool name, e.g. find_ferry_stops_nearby
        tool: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // stdout belongs to the MCP channel
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let now = Instant::now();
    let ctx = AppContext::load(&args.config)?;
    info!("Loaded static data in {:?}", now.elapsed());

    match args.cmd {
        Command::Stdio => tools::mcp::serve_stdio(&ctx).await,
        Command::Serve { address, port } => {
            tools::http::serve(ctx, &address, port).await?;
            Ok(())
        }
        Command::Call { tool, arguments } => {
            let arguments: Map<String, Value> =
                serde_json::from_str(&arguments).context("Arguments must be a JSON object")?;

            let now = Instant::now();
            let reply = tools::call(&ctx, &tool, &arguments).await?;
            info!("Ran {tool} in {:?}", now.elapsed());

            println!("{}", reply.into_text());
            Ok(())
        }
    }
}
