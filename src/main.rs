use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use persona_chat::api::{ApiClient, HistoryPage, SendMessageRequest, StoredMessage};
use persona_chat::config::{self, AppConfig, HistorySource};
use persona_chat::network::{ChatClient, ClientSettings, WsConnector};
use persona_chat::session::{self, LocalUser};
use persona_chat::ui::TerminalChat;

#[derive(Parser)]
#[command(
    name = "persona-chat",
    version,
    about = "Real-time chat client for matched personas"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open the live chat for a route such as `/realtime-chat/42?name=Alex&userId=7`
    Chat {
        route: String,
        #[arg(long)]
        user_id: String,
        #[arg(long, default_value = "")]
        user_name: String,
    },
    /// List chat sessions of the signed-in user
    Sessions {
        /// Show only the other participant, as seen by this user
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Get or create the chat session with another user
    Open { other_user_id: String },
    /// Print persisted messages of a session
    History {
        session: String,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Read from the match-relation endpoint instead of chat-sessions
        #[arg(long)]
        legacy: bool,
    },
    /// Send a message over REST without opening the socket
    Send {
        session: String,
        other_user_id: String,
        content: String,
    },
    /// Mark messages as read, optionally up to a sequence number
    MarkRead {
        session: String,
        #[arg(long)]
        up_to: Option<i64>,
    },
    /// Write the effective configuration to the config path
    InitConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config).apply_env();

    match run(cli, app_config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, app_config: AppConfig) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Chat {
            route,
            user_id,
            user_name,
        } => run_chat(&route, LocalUser { id: user_id, name: user_name }, app_config).await,
        Command::Sessions { user_id } => {
            let api = ApiClient::from_config(&app_config)?;
            let sessions = api.list_sessions().await?;
            if sessions.is_empty() {
                println!("No chat sessions yet");
            }
            for summary in sessions {
                let participants = match user_id.as_deref() {
                    Some(local) => format!("with {}", summary.peer_of(local)),
                    None => format!("{} <-> {}", summary.user1_id, summary.user2_id),
                };
                println!(
                    "{}  {participants}  [{}] {} messages",
                    summary.id, summary.status, summary.message_count
                );
            }
            Ok(())
        }
        Command::Open { other_user_id } => {
            let api = ApiClient::from_config(&app_config)?;
            let summary = api.create_or_get_session(&other_user_id).await?;
            println!("{}", summary.id);
            Ok(())
        }
        Command::History {
            session,
            limit,
            offset,
            legacy,
        } => {
            let api = ApiClient::from_config(&app_config)?;
            let page = HistoryPage { limit, offset };
            let messages = if legacy {
                api.realtime_messages(&session, page).await?
            } else {
                api.session_messages(&session, page).await?
            };
            for message in &messages {
                println!("{}", history_line(message));
            }
            Ok(())
        }
        Command::Send {
            session,
            other_user_id,
            content,
        } => {
            let content = content.trim();
            if content.is_empty() {
                return Err("message is empty".into());
            }
            let api = ApiClient::from_config(&app_config)?;
            let stored = api
                .send_message(&session, &SendMessageRequest::text(other_user_id, content))
                .await?;
            println!("sent #{} ({})", stored.sequence_number, stored.id);
            Ok(())
        }
        Command::MarkRead { session, up_to } => {
            let api = ApiClient::from_config(&app_config)?;
            let response = api.mark_read(&session, up_to).await?;
            println!("{}", response.message);
            Ok(())
        }
        Command::InitConfig => {
            config::save_config(&cli.config, &app_config)?;
            println!("Wrote {}", cli.config);
            Ok(())
        }
    }
}

async fn run_chat(route: &str, local: LocalUser, app_config: AppConfig) -> Result<(), Box<dyn Error>> {
    let identity = session::resolve(route, &local)?;
    let ws_url = session::ws_url(&app_config.ws_base_url, &identity)?;
    log::info!(
        "Opening chat {} with {} ({})",
        identity.session_key,
        identity.peer_name,
        identity.peer_id
    );

    // 1. Khởi chạy Network Task (chạy ngầm, tự kết nối lại)
    let api = ApiClient::from_config(&app_config)?;
    let settings = ClientSettings::new(&identity, ws_url.as_str(), &app_config);
    let (handle, events) =
        ChatClient::spawn(settings, Arc::new(WsConnector), Arc::new(api.clone()));

    // 2. Khởi chạy UI dòng lệnh trên task hiện tại
    let mut chat = TerminalChat::new(
        handle,
        events,
        identity.local_user_id,
        identity.peer_name,
        app_config.typing_expiry(),
    );
    if app_config.history_source == HistorySource::ChatSessions {
        chat = chat.with_read_receipts(api, identity.session_key);
    }
    chat.run().await?;
    Ok(())
}

fn history_line(message: &StoredMessage) -> String {
    format!(
        "#{:<5} {}  {}: {}",
        message.sequence_number, message.created_at, message.sender_name, message.content
    )
}
