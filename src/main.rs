use std::error::Error;
use std::sync::Arc;

use chat_sync::chat::Applied;
use chat_sync::config::{self, AppConfig};
use chat_sync::network::NoChannel;
use chat_sync::{ChatClient, ChatError, HttpFetcher, LogNotifier, Message, Peer};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "chat_sync",
    version,
    about = "Two-party chat client: REST history plus live messages"
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
    /// List users you can talk to
    Users,
    /// Print the conversation with a user (id or display name)
    History { peer: String },
    /// Open a conversation; every stdin line is sent, `/quit` leaves
    Chat { peer: String },
    /// Write the effective configuration (file + environment) to --config
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config = AppConfig::load(&cli.config);

    match cli.command {
        Command::InitConfig => {
            app_config.save(&cli.config)?;
            log::info!("Wrote config to {}", cli.config);
            Ok(())
        }
        Command::Users => {
            let mut client = connect(&app_config)?;
            for peer in load_directory(&mut client).await? {
                println!("{}\t{}", peer.id, peer.display_name);
            }
            Ok(())
        }
        Command::History { peer } => {
            let mut client = connect(&app_config)?;
            let peer = resolve_peer(&mut client, &peer).await?;
            show_history(&mut client, peer).await
        }
        Command::Chat { peer } => {
            let mut client = connect(&app_config)?;
            let peer = resolve_peer(&mut client, &peer).await?;
            run_chat(&mut client, peer).await
        }
    }
}

fn connect(app_config: &AppConfig) -> Result<ChatClient, Box<dyn Error>> {
    log::info!("Using chat API at {}", app_config.api_base_url);
    let fetcher = HttpFetcher::new(app_config)?;
    // The push channel is provided by the auth layer; the CLI runs without one.
    Ok(ChatClient::spawn(
        Arc::new(fetcher),
        Arc::new(NoChannel),
        Arc::new(LogNotifier),
    ))
}

async fn load_directory(client: &mut ChatClient) -> Result<Vec<Peer>, Box<dyn Error>> {
    client.refresh_directory()?;
    while client.state().users_loading() {
        if client.next_event().await.is_none() {
            break;
        }
    }
    Ok(client.state().peers().to_vec())
}

async fn resolve_peer(client: &mut ChatClient, wanted: &str) -> Result<Peer, Box<dyn Error>> {
    let peers = load_directory(client).await?;
    let found = client
        .state()
        .directory()
        .find(wanted)
        .or_else(|| {
            peers
                .iter()
                .find(|peer| peer.display_name.eq_ignore_ascii_case(wanted))
        })
        .cloned();

    Ok(found.unwrap_or_else(|| {
        log::warn!("`{wanted}` is not in the user list; using it as a raw id");
        Peer::new(wanted, wanted)
    }))
}

async fn show_history(client: &mut ChatClient, peer: Peer) -> Result<(), Box<dyn Error>> {
    client.select_peer(Some(peer.clone()));
    client.load_history(&peer.id)?;
    while client.state().messages_loading() {
        if client.next_event().await.is_none() {
            break;
        }
    }
    for message in client.state().messages() {
        print_message(message, &peer);
    }
    Ok(())
}

async fn run_chat(client: &mut ChatClient, peer: Peer) -> Result<(), Box<dyn Error>> {
    match client.open_conversation(peer.clone()) {
        Ok(()) => {}
        // Already reported through the notifier.
        Err(ChatError::NoTransport) => {}
        Err(err) => return Err(err.into()),
    }
    println!("-- chatting with {} (/quit to leave) --", peer.display_name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "/quit" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                if let Err(err) = client.send(line) {
                    log::warn!("Message not sent: {err}");
                }
            }
            applied = client.next_event() => match applied {
                Some(Applied::HistoryReplaced(_)) => {
                    for message in client.state().messages() {
                        print_message(message, &peer);
                    }
                }
                Some(Applied::Appended) => {
                    if let Some(message) = client.state().messages().last() {
                        print_message(message, &peer);
                    }
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    client.close_conversation();
    Ok(())
}

fn print_message(message: &Message, peer: &Peer) {
    let author = if message.sender_id == peer.id {
        peer.display_name.as_str()
    } else {
        "you"
    };
    let time = message
        .created_at
        .map(|at| at.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    match &message.image {
        Some(image) if message.content.is_empty() => println!("[{time}] {author}: <image {image}>"),
        _ => println!("[{time}] {author}: {}", message.content),
    }
}
