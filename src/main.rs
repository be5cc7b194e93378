use clap::{Parser, Subcommand};
use coverbot::dispatch::Dispatcher;
use coverbot::engine::Engine;
use coverbot::nlu::ApiNlu;
use coverbot::session::SessionStore;
use coverbot::transport::GraphTransport;
use coverbot::webhook::{self, AppState};
use std::sync::Arc;
use std::time::Duration;

/// Postback payload installed on the get-started button; arrives as a
/// platform welcome event and is answered by the NLU.
const GET_STARTED_PAYLOAD: &str = "FACEBOOK_WELCOME";

#[derive(Parser)]
#[command(
    name = "coverbot",
    version,
    about = "Webhook chat agent for a cover-song voting campaign"
)]
struct Cli {
    /// Path to config file (default: ~/.coverbot/config.toml)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show user counts and recent webhook traffic
    Inspect {
        /// How many raw webhook deliveries to show
        #[arg(short, long, default_value_t = 20)]
        events: usize,
    },
    /// Initialize a new coverbot config directory
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("coverbot=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => run_init(cli.config.as_deref()),
        Some(Commands::Inspect { events }) => run_inspect(cli.config.as_deref(), events).await,
        None => run_main(cli.config.as_deref()).await,
    }
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

fn run_init(config_override: Option<&std::path::Path>) -> anyhow::Result<()> {
    let dir = match config_override {
        Some(p) => p
            .parent()
            .map(|d| d.to_path_buf())
            .unwrap_or_else(coverbot::config::config_dir),
        None => coverbot::config::config_dir(),
    };
    std::fs::create_dir_all(&dir)?;

    let config_path = match config_override {
        Some(p) => p.to_path_buf(),
        None => dir.join("config.toml"),
    };
    if !config_path.exists() {
        std::fs::write(
            &config_path,
            r#"[platform]
page_access_token = "${FB_PAGE_ACCESS_TOKEN}"
verify_token = "${FB_VERIFY_TOKEN}"

[nlu]
access_token = "${APIAI_ACCESS_TOKEN}"
language = "vi"

[server]
port = 5000

[delivery]
pacing_ms = 200
"#,
        )?;
        println!("Created {}", config_path.display());
    } else {
        println!("Config already exists: {}", config_path.display());
    }

    println!("coverbot initialized at {}", dir.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Inspect
// ---------------------------------------------------------------------------

async fn run_inspect(config_path: Option<&std::path::Path>, events: usize) -> anyhow::Result<()> {
    let config = coverbot::config::load_config(config_path)?;
    let db = coverbot::db::Db::open(&config.db_path())?;

    let users = db.users_count().await?;
    println!("=== Users ===");
    println!("Known senders: {}", users);
    println!();

    let recent = db.raw_events_recent(events).await?;
    println!("=== Recent webhook deliveries ({}) ===", recent.len());
    for entry in &recent {
        let ts = chrono::DateTime::from_timestamp_millis(entry.received_at as i64)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  [{}] {}", ts, truncate(&entry.body, 100));
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

async fn run_main(config_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = coverbot::config::load_config(config_path)?;
    let db_path = config.db_path();
    let db = coverbot::db::Db::open(&db_path)?;
    tracing::info!("Database: {}", db_path.display());

    let transport = Arc::new(GraphTransport::new(config.platform.page_access_token.clone()));

    // Page setup is best-effort: a failure is logged and the bot still
    // serves whoever the platform routes to us.
    {
        let transport = transport.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.subscribe().await {
                tracing::error!("Webhook subscription failed: {}", e);
            }
            if let Err(e) = transport.configure_get_started(GET_STARTED_PAYLOAD).await {
                tracing::error!("Get-started setup failed: {}", e);
            }
        });
    }

    let nlu = Arc::new(ApiNlu::new(
        config.nlu.endpoint.clone(),
        config.nlu.access_token.clone(),
        config.nlu.language.clone(),
    ));
    let dispatcher = Dispatcher::new(transport.clone(), config.pacing());
    let sessions = SessionStore::new(config.session_ttl());
    let engine = Engine::new(db.clone(), dispatcher, transport, nlu, sessions);

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let state = AppState {
        db,
        verify_token: config.platform.verify_token.clone(),
        events_tx,
    };

    let bind = config.server.bind.clone();
    let port = config.server.port;
    tokio::spawn(async move {
        if let Err(e) = webhook::start_server(&bind, port, state).await {
            tracing::error!("Webhook server error: {}", e);
            std::process::exit(1);
        }
    });

    tracing::info!("coverbot running. Waiting for events...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                tokio::time::sleep(Duration::from_millis(200)).await;
                break;
            }
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                let sender = event.sender.clone();
                if let Err(e) = engine.handle_event(event).await {
                    // One bad conversation turn never takes the bot down.
                    tracing::error!(sender = %sender, "Event handling failed: {}", e);
                }
            }
        }
    }

    Ok(())
}
