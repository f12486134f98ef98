//! Interactive command surface.
//!
//! A small line-oriented REPL: list the aggregated tool catalog, execute
//! one tool with prompted, type-coerced arguments, or enter conversational
//! mode. Exits on `quit` (the interrupt path lives in `main`, which owns
//! teardown either way).

use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::chat::ChatSession;
use crate::mcp::{CallOptions, InvocationRequest, ServerRegistry, ToolDescriptor, ToolInvoker};
use crate::model::ModelClient;

/// A parsed REPL command.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Tools,
    Call,
    Chat,
    Quit,
    Unknown(String),
    Empty,
}

fn parse_command(line: &str) -> Command {
    match line.trim().to_lowercase().as_str() {
        "" => Command::Empty,
        "help" | "?" => Command::Help,
        "tools" | "list" => Command::Tools,
        "call" | "execute" => Command::Call,
        "chat" => Command::Chat,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Run the REPL until `quit` or end of input.
pub async fn run(
    registry: Arc<ServerRegistry>,
    model: Arc<dyn ModelClient>,
) -> anyhow::Result<()> {
    let invoker = ToolInvoker::new(Arc::clone(&registry));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type 'help' for commands.");

    loop {
        let Some(line) = prompt(&mut lines, "> ").await? else {
            break;
        };

        match parse_command(&line) {
            Command::Empty => {}
            Command::Help => print_help(),
            Command::Tools => print_tools(&registry).await,
            Command::Call => execute_interactive(&mut lines, &registry, &invoker).await?,
            Command::Chat => chat_loop(&mut lines, Arc::clone(&model), invoker.clone()).await?,
            Command::Quit => break,
            Command::Unknown(cmd) => println!("Unknown command: {cmd}. Try 'help'."),
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        "
  tools   List available tools from all servers
  call    Execute a tool interactively
  chat    Talk to the model (it may call tools)
  help    Show this help
  quit    Disconnect and exit
"
    );
}

async fn print_tools(registry: &ServerRegistry) {
    println!("\n=== Available Tools ===");

    for conn in registry.connections() {
        println!("\nServer: {}", conn.name());
        if !conn.is_connected().await {
            println!("  (not connected)");
            continue;
        }

        let tools = conn.tools().await;
        if tools.is_empty() {
            println!("  No tools available");
            continue;
        }

        for tool in &tools {
            println!("  Tool: {}", tool.name);
            println!("    Description: {}", tool.description);
            if !tool.params.is_empty() {
                println!("    Parameters:");
                for param in &tool.params {
                    let required = if param.required { " (required)" } else { "" };
                    let description = if param.description.is_empty() {
                        "No description"
                    } else {
                        &param.description
                    };
                    println!("      - {}: {}{}", param.name, description, required);
                }
            }
        }
    }
    println!();
}

/// Prompt for server, tool, and per-parameter values, then dispatch.
///
/// Coercion failures are reported before any process is contacted.
async fn execute_interactive(
    lines: &mut Lines<BufReader<Stdin>>,
    registry: &ServerRegistry,
    invoker: &ToolInvoker,
) -> anyhow::Result<()> {
    let Some(server_name) = prompt(lines, "Server name: ").await? else {
        return Ok(());
    };
    let server_name = server_name.trim().to_string();

    let Some(connection) = registry.lookup(&server_name) else {
        println!("Server '{server_name}' not found");
        return Ok(());
    };
    let tools = connection.tools().await;
    if tools.is_empty() {
        println!("No tools available on this server");
        return Ok(());
    }

    let Some(tool_name) = prompt(lines, "Tool name: ").await? else {
        return Ok(());
    };
    let tool_name = tool_name.trim().to_string();

    let Some(descriptor) = tools.iter().find(|t| t.name == tool_name) else {
        println!("Tool '{tool_name}' not found");
        return Ok(());
    };

    let Some(arguments) = prompt_arguments(lines, descriptor).await? else {
        return Ok(());
    };

    let request = InvocationRequest::new(server_name, tool_name, arguments);
    match invoker.dispatch(&request, &CallOptions::none()).await {
        Ok(result) => println!("\nResult: {result}"),
        Err(e) => println!("Error executing tool: {e}"),
    }

    Ok(())
}

/// Prompt for each declared parameter, coercing per its kind.
///
/// Empty input skips optional parameters; a value that fails coercion
/// aborts the call (returns `None`) without dispatching anything.
async fn prompt_arguments(
    lines: &mut Lines<BufReader<Stdin>>,
    descriptor: &ToolDescriptor,
) -> anyhow::Result<Option<serde_json::Map<String, serde_json::Value>>> {
    let mut arguments = serde_json::Map::new();

    if !descriptor.params.is_empty() {
        println!("Enter arguments:");
    }

    for param in &descriptor.params {
        let label = format!("  {} ({}): ", param.name, param.kind.label());
        let Some(raw) = prompt(lines, &label).await? else {
            return Ok(None);
        };
        let raw = raw.trim();

        if raw.is_empty() {
            if param.required {
                println!("'{}' is required", param.name);
                return Ok(None);
            }
            continue;
        }

        match param.kind.coerce(&param.name, raw) {
            Ok(value) => {
                arguments.insert(param.name.clone(), value);
            }
            Err(e) => {
                println!("{e}");
                return Ok(None);
            }
        }
    }

    Ok(Some(arguments))
}

/// Conversational mode; `back` returns to the main prompt.
async fn chat_loop(
    lines: &mut Lines<BufReader<Stdin>>,
    model: Arc<dyn ModelClient>,
    invoker: ToolInvoker,
) -> anyhow::Result<()> {
    let mut session = ChatSession::new(model, invoker).await;
    println!("Chat mode. Type 'back' to return.");

    loop {
        let Some(input) = prompt(lines, "you> ").await? else {
            return Ok(());
        };
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("back") {
            return Ok(());
        }

        for message in session.turn(input, &CallOptions::none()).await {
            match message.role {
                crate::model::Role::Assistant => println!("assistant> {}", message.content),
                crate::model::Role::System => println!("  [tool] {}", message.content),
                crate::model::Role::User => {}
            }
        }
    }
}

async fn prompt(
    lines: &mut Lines<BufReader<Stdin>>,
    label: &str,
) -> anyhow::Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("tools"), Command::Tools);
        assert_eq!(parse_command("  LIST  "), Command::Tools);
        assert_eq!(parse_command("execute"), Command::Call);
        assert_eq!(parse_command("chat"), Command::Chat);
        assert_eq!(parse_command("exit"), Command::Quit);
        assert_eq!(parse_command(""), Command::Empty);
        assert_eq!(
            parse_command("frobnicate"),
            Command::Unknown("frobnicate".to_string())
        );
    }
}
