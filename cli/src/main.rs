mod logging;

use clap::Parser;
use config::{
    API_KEY_ENV, BASE_URL_ENV, CredentialStore, MemoryCredentialStore, Settings,
    SettingsCredentialStore, load_env_file,
};
use conversation::{Conversation, ConversationConfig, ConversationEvent, ConversationState};
use llm::{ChatMessage, ClientConfig, OpenAIChatClient, Role};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about = "Streaming chat in the terminal", long_about = None)]
struct Args {
    /// Model name; defaults to the one in settings.toml
    #[arg(long)]
    model: Option<String>,

    /// Chat-completions base URL (e.g., for a proxy or compatible service)
    #[arg(long, env = BASE_URL_ENV)]
    base_url: Option<String>,

    /// API key for this session only; never written to disk
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long)]
    system_message: Option<String>,

    /// Log to stderr instead of the log file
    #[arg(long, short)]
    verbose: bool,
}

struct AppState {
    conversation: Conversation,
    credentials: Arc<dyn CredentialStore>,
    model: String,
}

fn print_prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn print_banner(model: &str, base_url: &str) {
    let status = format!(" {} • {} ", model, base_url);
    let width = status.chars().count();
    println!("┌{}┐", "─".repeat(width));
    println!("│{}│", status);
    println!("└{}┘", "─".repeat(width));
}

/// Show only the tail of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "you",
        Role::Assistant => "assistant",
    }
}

fn render_event(event: ConversationEvent) {
    match event {
        ConversationEvent::Fragment(text) => {
            print!("{}", text);
            let _ = io::stdout().flush();
        }
        ConversationEvent::MessageComplete(_) => {
            println!();
            println!();
            print_prompt();
        }
        ConversationEvent::Notice(notice) => {
            println!();
            println!("{}", notice);
            println!();
            print_prompt();
        }
        ConversationEvent::Cancelled => {
            println!();
            println!("[cancelled]");
            println!();
            print_prompt();
        }
    }
}

// Slash command parsing and handling
mod commands {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    pub enum Command {
        Quit,
        Help,
        Cancel,
        History,
        ShowKey,
        ClearKey,
        SetKey(String),
    }

    pub enum CommandResult {
        Continue,
        Exit,
    }

    impl Command {
        pub fn parse(input: &str) -> Result<Self, String> {
            let Some(body) = input.strip_prefix('/') else {
                return Err("Not a command".to_string());
            };

            let parts: Vec<&str> = body.split_whitespace().collect();
            if parts.is_empty() {
                return Err("Empty command".to_string());
            }

            match parts[0] {
                "quit" | "exit" => Ok(Command::Quit),
                "help" => Ok(Command::Help),
                "cancel" => Ok(Command::Cancel),
                "history" => Ok(Command::History),
                "key" => match parts.get(1) {
                    None => Ok(Command::ShowKey),
                    Some(&"clear") => Ok(Command::ClearKey),
                    Some(key) if parts.len() == 2 => Ok(Command::SetKey(key.to_string())),
                    Some(_) => Err("Usage: /key [<value> | clear]".to_string()),
                },
                _ => Err(format!(
                    "Unknown command: /{}. Type /help for available commands.",
                    parts[0]
                )),
            }
        }

        pub async fn execute(self, state: &mut AppState) -> CommandResult {
            match self {
                Command::Quit => {
                    println!("Goodbye!");
                    return CommandResult::Exit;
                }
                Command::Help => print_help(),
                Command::Cancel => {
                    // Reported by the Cancelled event; ignored when idle.
                    state.conversation.cancel();
                    return CommandResult::Continue;
                }
                Command::History => print_history(&state.conversation.state(), &state.model),
                Command::ShowKey => match state.credentials.get().await {
                    Some(key) if !key.trim().is_empty() => {
                        println!("API key: {}", mask_key(&key))
                    }
                    _ => println!("API key is not set. Use /key <value> to set it."),
                },
                Command::ClearKey => match state.credentials.clear().await {
                    Ok(()) => println!("API key cleared."),
                    Err(e) => eprintln!("Failed to clear API key: {:#}", e),
                },
                Command::SetKey(key) => match state.credentials.set(&key).await {
                    Ok(()) => println!("API key saved."),
                    Err(e) => eprintln!("Failed to save API key: {:#}", e),
                },
            }
            println!();
            print_prompt();
            CommandResult::Continue
        }
    }

    fn print_history(conversation: &ConversationState, model: &str) {
        if conversation.history().is_empty() {
            println!("No messages yet.");
            return;
        }
        for message in conversation.history() {
            let ChatMessage { role, content } = message;
            let label = match role {
                Role::Assistant => model,
                other => role_label(*other),
            };
            println!("[{}] {}", label, content);
        }
        if conversation.is_streaming() {
            println!("[{} …] {}", model, conversation.current_output());
        }
    }

    fn print_help() {
        println!("Available commands:");
        println!("  /key <value>           - Save the API key");
        println!("  /key clear             - Remove the saved API key");
        println!("  /key                   - Show whether an API key is set");
        println!("  /cancel                - Stop the reply being streamed");
        println!("  /history               - Show the conversation so far");
        println!("  /quit, /exit           - Exit the chat");
        println!("  /help                  - Show this help message");
        println!("  Ctrl+D                 - Exit the chat");
    }
}

fn credential_store(args: &Args) -> Arc<dyn CredentialStore> {
    if let Some(key) = args.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        tracing::info!("using API key from the environment for this session");
        return Arc::new(MemoryCredentialStore::with_key(key));
    }
    match SettingsCredentialStore::default_location() {
        Some(store) => Arc::new(store),
        None => {
            tracing::warn!("no settings directory available, API key will not persist");
            Arc::new(MemoryCredentialStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    let args = Args::parse();

    logging::init_logging(args.verbose);

    let settings = Settings::load();
    let base_url = args
        .base_url
        .clone()
        .unwrap_or_else(|| settings.base_url.clone());

    let mut conversation_config = ConversationConfig::from(&settings);
    if let Some(model) = &args.model {
        conversation_config.model = model.clone();
    }

    let client_config = ClientConfig {
        connect_timeout: settings.connect_timeout(),
        read_timeout: settings.read_timeout(),
    };
    let client = OpenAIChatClient::new(&base_url, &client_config)?;
    tracing::info!(base_url = %base_url, model = %conversation_config.model, "starting chat");

    let initial = match &args.system_message {
        Some(system) => ConversationState::with_history(vec![ChatMessage::system(system.clone())]),
        None => ConversationState::new(),
    };

    let credentials = credential_store(&args);
    let model = conversation_config.model.clone();
    let conversation = Conversation::with_state(
        Arc::new(client),
        credentials.clone(),
        conversation_config,
        initial,
    );

    let mut state = AppState {
        conversation,
        credentials,
        model,
    };

    print_banner(&state.model, &base_url);
    if state.credentials.get().await.is_none() {
        println!("No API key set. Use /key <value> or set {}.", API_KEY_ENV);
    }
    println!("Type /help for commands, Ctrl+D or /quit to exit.");
    println!();
    print_prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        println!();
                        println!("Goodbye!");
                        break;
                    }
                    Err(e) => {
                        eprintln!("Error reading input: {}", e);
                        break;
                    }
                };

                let input = line.trim();
                if input.is_empty() {
                    if !state.conversation.state().is_streaming() {
                        print_prompt();
                    }
                    continue;
                }

                if input.starts_with('/') {
                    match commands::Command::parse(input) {
                        Ok(cmd) => match cmd.execute(&mut state).await {
                            commands::CommandResult::Exit => break,
                            commands::CommandResult::Continue => continue,
                        },
                        Err(err) => {
                            println!("{}", err);
                            println!();
                            print_prompt();
                            continue;
                        }
                    }
                }

                // Regular message
                state.conversation.send_message(input);
            }
            event = state.conversation.next_event() => match event {
                Some(event) => render_event(event),
                None => break,
            },
        }
    }

    tracing::info!(
        messages = state.conversation.state().history().len(),
        "chat ended"
    );
    Ok(())
}
