//! Lobby game client.
//!
//! Registers a player name, joins the game view and prints the live player
//! roster. Reconnects automatically (max 5 attempts, 1 second apart).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lobby-client -- --name alice
//! cargo run --bin lobby-client -- -n bob -u ws://127.0.0.1:5000/ws
//! ```

use std::{
    sync::{Arc, Mutex, PoisonError, Weak},
    time::Duration,
};

use clap::Parser;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use lobby_client::{
    config::{
        ConnectionConfig, DEFAULT_API_BASE, DEFAULT_RECONNECTION_ATTEMPTS, DEFAULT_SERVER_URL,
    },
    connection::ConnectionManager,
    protocol::{PlayerRecord, SessionInfo, events},
    registration::RegistrationClient,
    session::GameSession,
    view::RosterFormatter,
};
use lobby_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "lobby-client")]
#[command(about = "Lobby game client with a live player roster", long_about = None)]
struct Args {
    /// Player name to register
    #[arg(short = 'n', long)]
    name: String,

    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Base URL of the player registration API
    #[arg(short = 'a', long, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Maximum connection attempts per reconnect cycle
    #[arg(long, default_value_t = DEFAULT_RECONNECTION_ATTEMPTS)]
    reconnection_attempts: u32,

    /// Delay between connection attempts, in milliseconds
    #[arg(long, default_value_t = 1000)]
    reconnection_delay_ms: u64,
}

/// A line typed at the prompt
enum Command {
    Start,
    Click(u32),
    End,
    Time(u64),
    Players,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("start"), None) => Command::Start,
        (Some("end"), None) => Command::End,
        (Some("players"), None) => Command::Players,
        (Some("help"), None) => Command::Help,
        (Some("quit" | "exit"), None) => Command::Quit,
        (Some("click"), Some(id)) => id
            .parse()
            .map(Command::Click)
            .unwrap_or_else(|_| Command::Unknown(line.to_string())),
        (Some("time"), Some(seconds)) => seconds
            .parse()
            .map(Command::Time)
            .unwrap_or_else(|_| Command::Unknown(line.to_string())),
        _ => Command::Unknown(line.to_string()),
    }
}

type OwnId = Arc<Mutex<Option<String>>>;

fn own_id(own: &OwnId) -> Option<String> {
    own.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Learn our connection id from the server and announce ourselves.
fn follow_session(manager: &Arc<ConnectionManager>, name: String, own: OwnId) {
    let weak: Weak<ConnectionManager> = Arc::downgrade(manager);
    manager.subscribe(events::SESSION, move |data| {
        let info = match data.map(|value| serde_json::from_value::<SessionInfo>(value.clone())) {
            Some(Ok(info)) => info,
            _ => {
                tracing::warn!("Ignoring malformed session event");
                return;
            }
        };
        tracing::info!("Assigned connection id {}", info.connection_id);
        *own.lock().unwrap_or_else(PoisonError::into_inner) = Some(info.connection_id.clone());

        if let Some(manager) = weak.upgrade() {
            manager.publish_player_update(&PlayerRecord::new(info.connection_id, &name, 0, true));
        }
    });
}

fn spawn_renderers(session: &GameSession, own: OwnId) {
    let mut roster_rx = session.synchronizer().subscribe();
    tokio::spawn(async move {
        while roster_rx.changed().await.is_ok() {
            let roster = roster_rx.borrow_and_update().clone();
            print!(
                "{}",
                RosterFormatter::format_roster(&roster, own_id(&own).as_deref())
            );
        }
    });

    let mut state_rx = session.connection().watch_state();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow_and_update();
            print!("{}", RosterFormatter::format_connection(state));
        }
    });
}

fn spawn_prompt(name: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    // rustyline is synchronous
    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", name);
        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    tracing::info!("Input closed");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let config = ConnectionConfig::new(args.server_url)
        .with_reconnection_attempts(args.reconnection_attempts)
        .with_reconnection_delay(Duration::from_millis(args.reconnection_delay_ms));
    let manager = Arc::new(ConnectionManager::websocket(config));
    let registration = Arc::new(RegistrationClient::new(args.api_base));
    let mut session = GameSession::new(args.name, registration, manager.clone());

    let own: OwnId = Arc::default();
    follow_session(&manager, session.player_name().to_string(), own.clone());
    spawn_renderers(&session, own.clone());

    if let Err(e) = session.enter().await {
        tracing::error!("Registration failed: {}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
    println!(
        "\nWelcome, {}! {}",
        session.player_name(),
        RosterFormatter::format_help()
    );

    let mut input_rx = spawn_prompt(session.player_name().to_string());
    while let Some(line) = input_rx.recv().await {
        match parse_command(&line) {
            Command::Start => session.start_game(),
            Command::Click(id) => session.player_click(id),
            Command::End => session.end_game(),
            Command::Time(seconds) => {
                match own_id(&own) {
                    Some(id) => {
                        let record = PlayerRecord::new(id, session.player_name(), seconds, true);
                        manager.publish_player_update(&record);
                    }
                    None => println!("Not connected yet; elapsed time not sent"),
                }
                continue;
            }
            Command::Players => {
                print!(
                    "{}",
                    RosterFormatter::format_roster(&session.roster(), own_id(&own).as_deref())
                );
                continue;
            }
            Command::Help => {
                print!("{}", RosterFormatter::format_help());
                continue;
            }
            Command::Quit => break,
            Command::Unknown(text) => {
                println!("Unknown command: {}", text);
                print!("{}", RosterFormatter::format_help());
                continue;
            }
        }
        print!("{}", RosterFormatter::format_status(session.status()));
    }

    if let Some(id) = own_id(&own) {
        let last = session
            .roster()
            .get(&id)
            .map_or(0, |record| record.total_elapsed_time);
        manager.publish_player_update(&PlayerRecord::new(id, session.player_name(), last, false));
    }
    session.leave().await;
}
