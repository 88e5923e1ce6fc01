use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use toolgate::core::config::Config;
use toolgate::mcp::tools::ToolInvoker;
use toolgate::mcp::{dispatch_tool_call, McpSessionManager, ToolCallRequest};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolgate", version)]
#[command(about = "Resilient MCP tool-session gateway")]
#[command(
    long_about = "Toolgate connects to the MCP servers listed in its config file, \
aggregates their tools into one registry, and dispatches tool calls with \
reconnect-aware retry. Logs go to stderr; results go to stdout."
)]
struct Cli {
    /// Path to the config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to every configured endpoint and list the merged tool registry
    Tools,
    /// Dispatch a single tool call by name
    Call {
        /// Name of the tool to invoke
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Log to stderr so stdout stays clean for tool output.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if config.mcp_endpoints.is_empty() {
        eprintln!("No MCP endpoints configured. Add [[mcp_endpoints]] entries to the config file.");
        return ExitCode::FAILURE;
    }

    let manager = McpSessionManager::from_config(&config);
    let exit = run_command(&manager, cli.command).await;
    manager.shutdown().await;
    exit
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config, String> {
    let result = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    result.map_err(|err| err.to_string())
}

async fn run_command(manager: &McpSessionManager, command: Command) -> ExitCode {
    let resource = match manager.initialize().await {
        Ok(resource) => resource,
        Err(err) => {
            eprintln!("Failed to initialize MCP sessions: {err}");
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Tools => {
            if resource.tools.is_empty() {
                println!("No tools available ({} sessions).", resource.sessions.len());
                return ExitCode::SUCCESS;
            }
            for tool in &resource.tools {
                match tool.description() {
                    Some(description) => println!("{}  {} - {}", tool.endpoint(), tool.name(), description),
                    None => println!("{}  {}", tool.endpoint(), tool.name()),
                }
            }
            ExitCode::SUCCESS
        }
        Command::Call { tool, args } => {
            let arguments = match args.as_deref().map(serde_json::from_str) {
                Some(Ok(serde_json::Value::Object(map))) => Some(map),
                Some(Ok(_)) => {
                    eprintln!("--args must be a JSON object.");
                    return ExitCode::FAILURE;
                }
                Some(Err(err)) => {
                    eprintln!("--args is not valid JSON: {err}");
                    return ExitCode::FAILURE;
                }
                None => None,
            };

            let Some(handle) = resource.find_tool(&tool) else {
                eprintln!("Unknown tool: {tool}");
                return ExitCode::FAILURE;
            };

            let request = ToolCallRequest {
                call_id: toolgate::core::correlation::generate_id(),
                arguments,
            };
            let result =
                dispatch_tool_call(manager, handle.as_ref(), &request, &tool, 1, None, None).await;

            println!("{}", result.content());
            if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
