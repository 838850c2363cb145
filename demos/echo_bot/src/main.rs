//! Echo Bot Demo
//!
//! A terminal bot: every stdin line becomes an update, every response is
//! printed to stdout.
//!
//! ```text
//! /start                 → welcome
//! /echo hello there      → hello there
//! /topic dev-log         → enum binding
//! /user 1                → model binding (users 1..=3 exist)
//! /roll 2 --sides 20     → clap-parsed command arguments
//! /admin/ban 42          → group prefix + throttle:3,1
//! cb:like 7              → a callback query
//! {"id":1,"kind":{...}}  → a raw JSON update
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --user 7
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use relay::prelude::*;
use relay::runtime::config::{ConfigLoader, RelayConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "Talk to a Relay bot from the terminal")]
struct Cli {
    /// Configuration file (defaults to relay.toml in the current directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(short, long)]
    profile: Option<String>,

    /// Sender id attached to typed updates.
    #[arg(short, long, default_value_t = 1)]
    user: i64,

    /// Chat id attached to typed updates.
    #[arg(long)]
    chat: Option<i64>,
}

// ============================================================================
// Models
// ============================================================================

#[derive(Debug, Clone, Bindable)]
#[bind(param = "user", entity = "users")]
struct Account {
    id: u64,
    name: &'static str,
}

const ACCOUNTS: [Account; 3] = [
    Account { id: 1, name: "alice" },
    Account { id: 2, name: "bob" },
    Account { id: 3, name: "carol" },
];

#[derive(Debug, Clone, Copy, RouteEnum)]
#[route(param = "topic")]
enum Topic {
    News,
    Releases,
    #[route(rename = "dev-log")]
    DevLog,
}

#[derive(Debug, Clone, Parser)]
struct Roll {
    /// Number of dice.
    #[arg(default_value_t = 1)]
    dice: u32,
    #[arg(short, long, default_value_t = 6)]
    sides: u32,
}

// ============================================================================
// Handlers
// ============================================================================

async fn help() -> &'static str {
    "commands: /start /echo <text> /topic <name> /user <id> /roll [dice] [--sides n] /admin/ban <id>"
}

async fn profile(account: Option<Model<Account>>) -> String {
    match account {
        Some(account) => format!("user #{} is {}", account.id, account.name),
        None => "no such user".to_string(),
    }
}

async fn roll(CommandArgs(roll): CommandArgs<Roll>, update: Arc<Update>) -> String {
    // Deterministic so the demo output is reproducible.
    let total: u64 = (0..roll.dice)
        .map(|i| (update.id as u64 + u64::from(i)) % u64::from(roll.sides.max(1)) + 1)
        .sum();
    format!("rolled {}d{}: {total}", roll.dice, roll.sides)
}

fn register(r: &mut RouteRegistrar) -> Result<(), relay::framework::RegistrationError> {
    r.pattern("id", "[0-9]+")?;

    r.command("/start", || async { "welcome! try /help" })?;
    r.add(RouteDefinition::command("/help").name("help").handler(help))?;
    r.add(
        RouteDefinition::command("/echo {text}")
            .where_("text", ".+")
            .handler(|Path(text): Path<String>| async move { text }),
    )?;
    r.add(
        RouteDefinition::command("/topic {topic}").handler(
            |EnumParam(topic): EnumParam<Topic>| async move { format!("subscribed to {topic:?}") },
        ),
    )?;
    r.add(RouteDefinition::command("/user {user}").name("user").handler(profile))?;
    r.add(
        RouteDefinition::command("/roll {args?}")
            .where_("args", ".*")
            .handler(roll),
    )?;

    r.group(
        GroupAttributes::new()
            .prefix("/admin/")
            .name("admin.")
            .middleware("throttle:3,1"),
        |r| {
            r.add(
                RouteDefinition::command("ban {id}")
                    .name("ban")
                    .handler(|Path(id): Path<u64>| async move { format!("banned {id}") }),
            )?;
            Ok(())
        },
    )?;

    r.callback_query("like {id}", |Path(id): Path<u64>| async move {
        format!("liked post {id}")
    })?;
    r.fallback(|update: Arc<Update>| async move {
        format!("unknown input {:?}, try /help", update.payload())
    })?;
    Ok(())
}

fn build_router(config: &RelayConfig, routes: Arc<RouteCollection>) -> Router {
    let mut binder = Binder::new();
    binder.bind(Account::PARAM, |raw: String| async move {
        let id: u64 = raw.parse().ok()?;
        ACCOUNTS.iter().find(|a| a.id == id).cloned()
    });

    let middleware = MiddlewareRegistry::new().global(MiddlewareSpec::inline(
        "log",
        from_fn(|req: Arc<Request>, next: Next| async move {
            debug!(route = req.route().identifier(), "handling update");
            next.run(req).await
        }),
    ));

    Router::builder(routes)
        .binder(binder)
        .middleware(middleware)
        .config(config.dispatch_config())
        .build()
}

// ============================================================================
// Transport
// ============================================================================

struct Stdout;

#[async_trait]
impl Responder for Stdout {
    async fn deliver(&self, update: &Update, response: &Response) -> Result<(), BoxError> {
        let line = match response.body() {
            Reply::None => return Ok(()),
            Reply::Text(text) => text.clone(),
            Reply::Json(value) => value.to_string(),
        };
        let status = match response.status() {
            ResponseStatus::Ok => String::new(),
            other => format!(" [{other:?}]"),
        };
        let mut out = tokio::io::stdout();
        out.write_all(format!("#{} ← {line}{status}\n", update.id).as_bytes())
            .await?;
        out.flush().await?;
        Ok(())
    }
}

fn parse_line(id: i64, line: &str, cli: &Cli) -> Option<Update> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with('{') {
        return match serde_json::from_str(line) {
            Ok(update) => Some(update),
            Err(e) => {
                warn!(error = %e, "invalid JSON update");
                None
            }
        };
    }
    let update = match line.strip_prefix("cb:") {
        Some(data) => Update::callback(id, data.trim()),
        None => Update::text(id, line),
    };
    let update = update.from_user(cli.user);
    Some(match cli.chat {
        Some(chat) => update.in_chat(chat),
        None => update,
    })
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new().with_current_dir();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile);
    }
    let config = loader.load()?;

    let table = RouteTable::new();
    let routes = table.boot(&config.routing, register)?;
    let router = build_router(&config, routes);
    let runtime = RelayRuntime::from_config(&config, router, Arc::new(Stdout));

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut id = 0;
        while let Ok(Some(line)) = lines.next_line().await {
            id += 1;
            if let Some(update) = parse_line(id, &line, &cli)
                && tx.send(update).await.is_err()
            {
                break;
            }
        }
    });

    info!("echo bot ready, type /help");
    let stats = runtime.run_until_signal(rx).await;
    info!(
        handled = stats.handled,
        unhandled = stats.unhandled,
        failed = stats.failed,
        "echo bot stopped"
    );
    Ok(())
}
