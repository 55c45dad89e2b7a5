//! Command execution.

use crate::Commands;
use colored::Colorize;
use devobj_client::{Client, Response};
use serde_json::Value;

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &mut Client,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Read { names } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            Ok(client.read(&names).await?)
        }

        Commands::Write { pairs } => {
            let values: Vec<(String, String)> = pairs
                .iter()
                .map(|(name, value)| (name.clone(), value_text(value)))
                .collect();
            let borrowed: Vec<(&str, &str)> = values
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect();
            client.write(&borrowed).await?;
            Ok(format!("{} {} object(s)", "Written".green(), borrowed.len()))
        }

        Commands::List { category } => {
            let names = client.list(category.as_deref()).await?;
            if names.is_empty() {
                return Ok("No objects".yellow().to_string());
            }
            Ok(format_names(&names))
        }

        Commands::Exec { name } => {
            client.exec(&name).await?;
            Ok(format!("{} {}", "Executed".green(), name.cyan()))
        }

        Commands::Raw { request } => {
            let response = client.request(&request.join(" ")).await?;
            Ok(format_response(&response))
        }

        // Repl and Listen are handled directly in main.rs
        Commands::Repl | Commands::Listen { .. } => {
            Err("command must be run from main".into())
        }
    }
}

/// Parses a `NAME=VALUE` argument.
pub fn parse_pair(arg: &str) -> Result<(String, String), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", arg))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing name in {:?}", arg));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Value text as sent on the wire.
///
/// JSON values and anything that looks like a number (including hex and
/// octal integers) go out unchanged; everything else becomes a string.
pub fn value_text(raw: &str) -> String {
    let looks_numeric = raw
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.');
    if looks_numeric || serde_json::from_str::<Value>(raw).is_ok() {
        raw.to_string()
    } else {
        format!("\"{}\"", raw)
    }
}

/// Formats a response line, coloured by its status.
pub fn format_response(response: &Response) -> String {
    if response.is_success() {
        response.line.green().to_string()
    } else {
        response.line.red().to_string()
    }
}

fn format_names(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("  {}", name.cyan()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("BatCharge_V=14.4").unwrap(),
            ("BatCharge_V".to_string(), "14.4".to_string())
        );
        assert_eq!(
            parse_pair("Nickname=a=b").unwrap(),
            ("Nickname".to_string(), "a=b".to_string())
        );
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=1").is_err());
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text("14.4"), "14.4");
        assert_eq!(value_text("0x1F"), "0x1F");
        assert_eq!(value_text("-3"), "-3");
        assert_eq!(value_text("true"), "true");
        assert_eq!(value_text("\"quoted\""), "\"quoted\"");
        assert_eq!(value_text("garage"), "\"garage\"");
    }
}
