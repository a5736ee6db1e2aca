use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use chatline_core::models::message::temporary_id;
use chatline_core::models::{Conversation, Role};
use chatline_core::repositories::{
    ApiKeyJsonRepository, ApiKeyRepository, EngineConfigJsonRepository, EngineConfigRepository,
    InMemoryApiKeyRepository,
};
use chatline_core::settings::{EngineConfig, GenerationSettings, KeyStore};
use chatline_core::{ChatSession, SessionEvent, TurnAction, TurnOutcome};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "chatline", version, about = "Chat with a streaming text generator")]
struct Args {
    /// Backend base URL (overrides the config file and CHATLINE_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Store this API key before starting
    #[arg(long)]
    api_key: Option<String>,

    /// Keep the API key in memory only
    #[arg(long)]
    ephemeral_key: bool,

    /// Forget the stored API key and exit
    #[arg(long)]
    forget_key: bool,

    /// Write the effective config back to the config file
    #[arg(long)]
    save_config: bool,

    /// Conversation to open; a new one is started otherwise
    #[arg(long)]
    chat_id: Option<String>,

    /// Model for the conversation
    #[arg(long)]
    model: Option<String>,
}

enum Command {
    Send(String),
    Regenerate,
    New,
    History,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "/quit" | "/exit" => Self::Quit,
            "/regen" => Self::Regenerate,
            "/new" => Self::New,
            "/history" => Self::History,
            _ => Self::Send(line.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so replies on stdout stay clean
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let key_store = open_key_store(args.ephemeral_key).await?;
    if args.forget_key {
        key_store.remove().await;
        println!("API key removed");
        return Ok(());
    }
    if let Some(api_key) = args.api_key.clone() {
        key_store.set(api_key).await;
    }
    if !key_store.has_key() {
        warn!("No API key configured; pass --api-key to set one");
    }

    let config = load_config(&args).await?;
    let session = Arc::new(
        ChatSession::connect(config, key_store).context("Failed to create chat session")?,
    );
    start_conversation(&session, args.chat_id.clone(), args.model.as_deref());

    let printer = tokio::spawn(print_events(session.subscribe()));
    let result = run_repl(&session).await;
    printer.abort();

    info!("Exiting");
    result
}

async fn open_key_store(ephemeral: bool) -> Result<KeyStore> {
    let repository: Arc<dyn ApiKeyRepository> = if ephemeral {
        Arc::new(InMemoryApiKeyRepository::new())
    } else {
        Arc::new(ApiKeyJsonRepository::new().context("Failed to locate key storage")?)
    };

    let key_store = KeyStore::new(repository);
    key_store.load().await;
    Ok(key_store)
}

async fn load_config(args: &Args) -> Result<EngineConfig> {
    let repository = EngineConfigJsonRepository::new().context("Failed to locate config file")?;
    let mut config = match repository.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = ?e, "Failed to load config, using defaults");
            EngineConfig::default()
        }
    };

    config.apply_env_overrides();
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }

    if args.save_config {
        repository
            .save(config.clone())
            .await
            .context("Failed to save config")?;
        info!("Config saved");
    }
    Ok(config)
}

fn start_conversation(session: &ChatSession, chat_id: Option<String>, model: Option<&str>) {
    let id = chat_id.unwrap_or_else(temporary_id);
    let conversation = match model {
        Some(model) => Conversation::with_settings(
            id.clone(),
            &GenerationSettings {
                model: model.to_string(),
                ..session.config().defaults.clone()
            },
        ),
        None => Conversation::new(id.clone()),
    };

    session.add_conversation(conversation);
    session.open_conversation(Some(id.clone()), Vec::new());
    info!(conversation_id = %id, "Conversation opened");
}

async fn run_repl(session: &Arc<ChatSession>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let action = match Command::parse(&line) {
            Command::Quit => break,
            Command::New => {
                start_conversation(session, None, None);
                continue;
            }
            Command::History => {
                print_history(session);
                continue;
            }
            Command::Regenerate => {
                if !session.regenerate_available() {
                    eprintln!("Nothing to regenerate");
                    continue;
                }
                None
            }
            Command::Send(text) => {
                session.set_input(text);
                Some(TurnAction::Generate)
            }
        };

        match run_turn(session, action).await? {
            TurnOutcome::Skipped(reason) => eprintln!("Turn skipped: {reason:?}"),
            TurnOutcome::Failed(error) => eprintln!("Generation failed: {error}"),
            TurnOutcome::Completed | TurnOutcome::Cancelled => {}
        }
    }

    Ok(())
}

/// Run a turn (regeneration when `action` is `None`), cancelling it on Ctrl-C
async fn run_turn(session: &Arc<ChatSession>, action: Option<TurnAction>) -> Result<TurnOutcome> {
    let turn_session = session.clone();
    let mut turn = tokio::spawn(async move {
        match action {
            Some(action) => turn_session.submit_turn(action).await,
            None => turn_session.regenerate_turn().await,
        }
    });

    let outcome = tokio::select! {
        outcome = &mut turn => outcome,
        _ = tokio::signal::ctrl_c() => {
            session.cancel_turn();
            turn.await
        }
    };
    outcome.context("Turn task panicked")
}

fn print_history(session: &ChatSession) {
    let title = session
        .active_conversation()
        .filter(Conversation::has_title)
        .and_then(|c| c.title)
        .unwrap_or_else(|| "Untitled".to_string());
    println!("# {title} ({})", session.active_chat_id());

    for message in session.messages() {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        println!("[{speaker}] {}", message.content);
    }
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        let result = match events.recv().await {
            Ok(event) => print_event(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer fell behind");
                Ok(())
            }
            Err(RecvError::Closed) => break,
        };

        if let Err(e) = result {
            warn!(error = ?e, "Failed to write to stdout");
            break;
        }
    }
}

fn print_event(event: SessionEvent) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match event {
        SessionEvent::ChunkApplied { text, .. } => write!(stdout, "{text}")?,
        SessionEvent::ContentReplaced { content, .. } => write!(stdout, "{content}")?,
        SessionEvent::MessageRemoved { .. } => writeln!(stdout, "(regenerating)")?,
        SessionEvent::TitleUpdated { title, .. } => write!(stdout, "\n# {title}")?,
        SessionEvent::TurnFinished { outcome } => {
            if outcome == TurnOutcome::Cancelled {
                write!(stdout, " (cancelled)")?;
            }
            writeln!(stdout)?;
        }
        SessionEvent::ScrollToBottom
        | SessionEvent::MessageAppended { .. }
        | SessionEvent::MessagesReconciled { .. } => {}
    }
    stdout.flush()
}
