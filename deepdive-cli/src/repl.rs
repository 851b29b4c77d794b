//! REPL (Read-Eval-Print Loop) for interactive chat.

use deepdive_core::{AppConfig, Brain, ChatSession};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// A line of REPL input.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReplInput<'a> {
    Message(&'a str),
    Reset,
    Usage,
    Help,
    Exit,
    Unknown(&'a str),
    Empty,
}

pub(crate) fn parse_input(line: &str) -> ReplInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ReplInput::Empty;
    }
    if !line.starts_with('/') {
        return ReplInput::Message(line);
    }
    match line.split_whitespace().next().unwrap_or(line) {
        "/exit" | "/quit" | "/q" => ReplInput::Exit,
        "/reset" => ReplInput::Reset,
        "/usage" => ReplInput::Usage,
        "/help" | "/?" => ReplInput::Help,
        other => ReplInput::Unknown(other),
    }
}

const HELP: &str = "Commands:
  /reset   Start a new conversation
  /usage   Show token usage
  /help    Show this help
  /exit    Leave the chat";

pub async fn run_chat(config: AppConfig, brain: Option<Arc<Brain>>) -> anyhow::Result<()> {
    let model = config
        .chat
        .model
        .clone()
        .unwrap_or_else(|| config.llm.model.clone());
    let session = match &brain {
        Some(brain) => ChatSession::new(brain.clone(), &config.chat),
        None => ChatSession::inert(&config.chat),
    };

    println!("\x1b[1;32m  Deepdive chat\x1b[0m");
    println!("  Model: {model}");
    if session.is_inert() {
        println!(
            "\x1b[33m  No API key configured ({}); messages will not be sent.\x1b[0m",
            config.llm.api_key_env
        );
    }
    println!("  Type /help for commands, /exit to leave\n");

    let stdin = io::stdin();
    loop {
        print!("\x1b[1;34m> \x1b[0m");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input).is_err() || input.is_empty() {
            break;
        }

        match parse_input(&input) {
            ReplInput::Empty => continue,
            ReplInput::Exit => {
                println!("Goodbye!");
                break;
            }
            ReplInput::Reset => {
                session.reset();
                println!("\x1b[90m  Conversation cleared.\x1b[0m");
            }
            ReplInput::Usage => match &brain {
                Some(brain) => {
                    let usage = brain.total_usage();
                    println!(
                        "Tokens: {} in / {} out ({} total)",
                        usage.input_tokens,
                        usage.output_tokens,
                        usage.total()
                    );
                }
                None => println!("No usage: chat is not connected."),
            },
            ReplInput::Help => println!("{HELP}"),
            ReplInput::Unknown(cmd) => {
                println!("Unknown command: {cmd}. Type /help for commands.");
            }
            ReplInput::Message(text) => {
                print!("\x1b[90m  thinking...\x1b[0m");
                io::stdout().flush()?;
                let reply = session.send(text).await;
                print!("\r\x1b[K");
                match reply {
                    Some(reply) => println!("\x1b[32mDeepdive:\x1b[0m {reply}\n"),
                    None => println!("\x1b[90m  (not sent)\x1b[0m"),
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  hello there \n"), ReplInput::Message("hello there"));
        assert_eq!(parse_input("\n"), ReplInput::Empty);
        assert_eq!(parse_input("/reset"), ReplInput::Reset);
        assert_eq!(parse_input("/quit now"), ReplInput::Exit);
        assert_eq!(parse_input("/usage"), ReplInput::Usage);
        assert_eq!(parse_input("/bogus x"), ReplInput::Unknown("/bogus"));
    }
}
