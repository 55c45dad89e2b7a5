//! Interactive REPL.

use crate::commands::{format_response, parse_pair, value_text};
use colored::Colorize;
use devobj_client::Client;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::net::SocketAddr;
use std::time::Duration;

const HELP_TEXT: &str = r#"
Available commands:
  help                          Show this help

  read <name> [name...]         Read objects
  write <name>=<value> [...]    Write objects, all or nothing
  list [category]               List readable objects
  exec <name>                   Execute a function object
  pubs                          Show publications received so far

  !<function> <json>            Send a raw request, e.g. !read "Bat_V"

  quit, exit                    Exit the REPL
"#;

/// How long `pubs` waits for messages that are already on the wire.
const PUBLICATION_POLL: Duration = Duration::from_millis(50);

pub async fn run(mut client: Client, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "devobj CLI".bold().cyan());
    println!("Connecting to {}...", addr);

    client.connect().await?;
    println!("{}", "Connected!".green());

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".devobj_history"))
        .unwrap_or_else(|_| ".devobj_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", "devobj>".cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&mut client, line).await {
                    Ok(Some(output)) => println!("{}\n", output),
                    Ok(None) => break,
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);

    let _ = client.close().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}

async fn execute_repl_command(
    client: &mut Client,
    line: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    if line.starts_with('!') {
        let response = client.request(line).await?;
        return Ok(Some(format_response(&response)));
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    let cmd = parts[0].to_lowercase();
    let args = &parts[1..];

    match cmd.as_str() {
        "help" | "?" => Ok(Some(HELP_TEXT.to_string())),

        "quit" | "exit" | "q" => Ok(None),

        "read" | "r" => {
            if args.is_empty() {
                return Ok(Some("Usage: read <name> [name...]".to_string()));
            }
            Ok(Some(client.read(args).await?))
        }

        "write" | "w" => {
            if args.is_empty() {
                return Ok(Some("Usage: write <name>=<value> [...]".to_string()));
            }
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                let (name, value) = parse_pair(arg)?;
                values.push((name, value_text(&value)));
            }
            let pairs: Vec<(&str, &str)> = values
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect();
            client.write(&pairs).await?;
            Ok(Some("Written".green().to_string()))
        }

        "list" | "ls" => {
            let names = client.list(args.first().copied()).await?;
            if names.is_empty() {
                return Ok(Some("No objects".yellow().to_string()));
            }
            Ok(Some(names.join(", ")))
        }

        "exec" | "x" => {
            if args.len() != 1 {
                return Ok(Some("Usage: exec <name>".to_string()));
            }
            client.exec(args[0]).await?;
            Ok(Some(format!("{} {}", "Executed".green(), args[0].cyan())))
        }

        "pubs" => {
            let mut output = Vec::new();
            while let Ok(message) = client.next_publication(Some(PUBLICATION_POLL)).await {
                output.push(message);
            }
            if output.is_empty() {
                return Ok(Some("No publications".yellow().to_string()));
            }
            Ok(Some(output.join("\n")))
        }

        _ => Ok(Some(format!(
            "Unknown command: {}. Type 'help' for help.",
            cmd
        ))),
    }
}
