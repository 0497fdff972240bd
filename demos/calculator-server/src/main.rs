//! # Calculator Server
//!
//! Serves `add` and `divide` over stdio, one JSON-RPC message per line.
//! Logs go to stderr so they never interleave with protocol frames.
//!
//! ## Usage
//! ```bash
//! cargo run --package calculator-server -- --log-level debug
//! ```
//! then write an `initialize` request to its stdin.

use anyhow::Result;
use clap::Parser;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tandem_mcp_server::{DynamicTool, McpServer, ToolBuilder, number_arg};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds to wait for the client's responses
    #[arg(long, default_value = "60")]
    request_timeout: u64,
}

fn add_tool() -> std::result::Result<DynamicTool, String> {
    ToolBuilder::new("add")
        .description("Add two numbers")
        .number_param("a", "First number")
        .number_param("b", "Second number")
        .execute(|args| async move {
            let sum = number_arg(&args, "a")? + number_arg(&args, "b")?;
            Ok(Value::String(sum.to_string()))
        })
        .build()
}

fn divide_tool() -> std::result::Result<DynamicTool, String> {
    ToolBuilder::new("divide")
        .description("Divide a by b")
        .number_param("a", "Dividend")
        .number_param("b", "Divisor")
        .execute(|args| async move {
            let a = number_arg(&args, "a")?;
            let b = number_arg(&args, "b")?;
            if b == 0.0 {
                return Err(format!("Cannot divide {} by zero", a));
            }
            Ok(json!({ "result": a / b }))
        })
        .build()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let server = McpServer::builder()
        .name("calculator-server")
        .version(env!("CARGO_PKG_VERSION"))
        .title("Calculator Server")
        .instructions("Use 'add' and 'divide' for arithmetic on two numbers")
        .tool(add_tool().map_err(anyhow::Error::msg)?)
        .tool(divide_tool().map_err(anyhow::Error::msg)?)
        .with_logging()
        .request_timeout(Duration::from_secs(args.request_timeout))
        .build()?;

    let reason = server.run_stdio().await?;
    info!(reason = %reason, "Calculator server stopped");
    Ok(())
}
