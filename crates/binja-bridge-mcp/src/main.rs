//! Binja bridge MCP server: entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use binja_bridge::{ServerUrl, Transport};
use binja_bridge_mcp::config::{client_config, current_command, resolve_server_url};
use binja_bridge_mcp::protocol::ProtocolHandler;
use binja_bridge_mcp::tools::{ActionContext, ActionRegistry};
use binja_bridge_mcp::transport::StdioTransport;

#[derive(Parser)]
#[command(
    name = "binja-bridge-mcp",
    about = "MCP server bridging agents to the Binary Ninja HTTP API",
    version
)]
struct Cli {
    /// Full URL of the Binary Ninja HTTP server (overrides host and port).
    #[arg(long, global = true)]
    server: Option<String>,

    /// Host of the Binary Ninja HTTP server.
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port of the Binary Ninja HTTP server.
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Print the MCP client configuration for this server as JSON.
    Config,

    /// Print server capabilities as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   binja-bridge-mcp completions bash > ~/.local/share/bash-completion/completions/binja-bridge-mcp
    ///   binja-bridge-mcp completions zsh > ~/.zfunc/_binja-bridge-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let server_url = resolve_server_url(cli.server.as_deref(), cli.host.as_deref(), cli.port);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!("Binja bridge MCP server");
            tracing::info!("Upstream: {server_url}");
            let transport = Transport::new(ServerUrl::new(server_url));
            let registry = ActionRegistry::new(ActionContext::new(transport));
            let handler = ProtocolHandler::new(Arc::new(registry));
            let stdio = StdioTransport::new(handler);
            let result = stdio.run().await;
            // The blocking HTTP client must not be dropped on the async runtime.
            tokio::task::spawn_blocking(move || drop(stdio)).await?;
            result?;
        }

        Commands::Config => {
            let config = client_config(&current_command(), &server_url);
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Info => {
            let capabilities = binja_bridge_mcp::types::InitializeResult::default_result();
            let tools = ActionRegistry::list_tools();
            let info = serde_json::json!({
                "server": capabilities.server_info,
                "protocol_version": capabilities.protocol_version,
                "capabilities": capabilities.capabilities,
                "upstream": server_url,
                "tools": tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "tool_count": tools.len(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "binja-bridge-mcp", &mut std::io::stdout());
        }
    }

    Ok(())
}
