//! Crewdeck terminal chat client.
//!
//! Exercises the chat core end to end against a live deployment: one-shot
//! history reads, single sends that wait for their broadcast echo, and a
//! live tail that merges backfill with the push stream.

use std::time::Duration;

use clap::{Parser, Subcommand};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crewdeck::{
    ChannelError, ChatConfig, ChatMessage, ChatSession, ConfigError, ConnectionStatus, Credential,
    HistoryClient, HistoryError, PublishError, RoomId, SetupError,
};

const CLOCK_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");

/// How long a send waits for its own broadcast echo.
const ECHO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing bearer token; pass --token or set CREWDECK_TOKEN")]
    MissingToken,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("connection dropped before the message echo arrived")]
    ConnectionLost,
    #[error("timed out waiting for the message echo")]
    EchoTimeout,
}

#[derive(Parser, Debug)]
#[command(name = "crewdeck-cli", about = "Crewdeck chat room CLI")]
struct Cli {
    #[arg(long, env = "CREWDECK_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "CREWDECK_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the latest page of a room's history.
    History {
        room: i64,
        #[arg(long)]
        size: Option<u32>,
    },
    /// Send one message and wait for its broadcast echo.
    Send { room: i64, message: String },
    /// Follow a room live: backfill, then the push stream until Ctrl-C.
    Tail { room: i64 },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = ChatConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    let credential = Credential::new(cli.token.ok_or(CliError::MissingToken)?);

    match cli.command {
        Command::History { room, size } => {
            if let Some(size) = size {
                config.page_size = size;
            }
            run_history(&config, &credential, RoomId(room)).await
        }
        Command::Send { room, message } => {
            run_send(&config, &credential, RoomId(room), &message).await
        }
        Command::Tail { room } => run_tail(&config, &credential, RoomId(room)).await,
    }
}

async fn run_history(
    config: &ChatConfig,
    credential: &Credential,
    room: RoomId,
) -> Result<(), CliError> {
    let client = HistoryClient::new(config)?;
    let page = client.fetch_latest(room, credential).await?;

    let mut previous: Option<&ChatMessage> = None;
    for message in &page.messages {
        print_with_day_break(message, previous);
        previous = Some(message);
    }
    if page.messages.is_empty() {
        eprintln!("room {room}: no messages yet");
    }
    Ok(())
}

async fn run_send(
    config: &ChatConfig,
    credential: &Credential,
    room: RoomId,
    text: &str,
) -> Result<(), CliError> {
    let mut session = ChatSession::over_websocket(config, room)?;
    session.open(credential).await?;
    session.send(text)?;

    // Success is observable only as the server's broadcast echo.
    let echo = tokio::time::timeout(ECHO_TIMEOUT, async {
        while let Some(message) = session.next_message().await {
            if message.content == text {
                return Some(message);
            }
        }
        None
    })
    .await;

    let outcome = match echo {
        Ok(Some(message)) => {
            eprintln!("delivered as message {}", message.id);
            Ok(())
        }
        Ok(None) => Err(CliError::ConnectionLost),
        Err(_) => Err(CliError::EchoTimeout),
    };
    session.close();
    outcome
}

async fn run_tail(
    config: &ChatConfig,
    credential: &Credential,
    room: RoomId,
) -> Result<(), CliError> {
    let mut session = ChatSession::over_websocket(config, room)?;
    session.open(credential).await?;
    eprintln!(
        "room {room}: {} backfilled, following live (Ctrl-C to quit)",
        session.messages().len()
    );

    let mut previous: Option<ChatMessage> = None;
    for message in session.messages() {
        print_with_day_break(message, previous.as_ref());
        previous = Some(message.clone());
    }

    loop {
        tokio::select! {
            delivered = session.next_message() => {
                let Some(message) = delivered else {
                    if session.connection_status() == ConnectionStatus::Disconnected {
                        eprintln!("connection lost");
                    }
                    break;
                };
                print_with_day_break(&message, previous.as_ref());
                previous = Some(message);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    session.close();
    Ok(())
}

fn print_with_day_break(message: &ChatMessage, previous: Option<&ChatMessage>) {
    let new_day = previous.is_none_or(|last| !last.same_calendar_day(message));
    if new_day {
        println!("── {} ──", message.created_at.date());
    }
    let clock = message
        .created_at
        .format(CLOCK_FORMAT)
        .unwrap_or_else(|_| message.created_at.to_string());
    println!("[{clock}] {}: {}", message.sender_display_name, message.content);
}
