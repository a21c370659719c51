use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use issueboard::config::{ConfigError, DEFAULT_API_URL, SyncConfig};
use issueboard::model::{ItemId, Priority, Status, UnknownStatus};
use issueboard::net::ReconnectPolicy;
use issueboard::net::backoff::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY};
use issueboard::remote::{GraphqlStore, RemoteError};
use issueboard::session::SyncSession;
use issueboard::state::{AssigneeFilter, Board, DiscardReason, DropOutcome, IssueFilter};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("invalid column: {0}")]
    UnknownColumn(#[from] UnknownStatus),
    #[error("issue {0} is not on the board")]
    UnknownItem(ItemId),
    #[error("move discarded: {0}")]
    Discarded(DiscardReason),
    #[error("no drag in progress")]
    NoDrag,
}

#[derive(Parser, Debug)]
#[command(name = "issueboard", about = "Realtime issue board client")]
struct Cli {
    #[arg(long, env = "ISSUEBOARD_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Override the websocket URL derived from the API URL.
    #[arg(long, env = "ISSUEBOARD_WS_URL")]
    ws_url: Option<String>,

    #[arg(long, env = "ISSUEBOARD_GRAPHQL_URL")]
    graphql_url: Option<String>,

    #[arg(long, env = "ISSUEBOARD_ACCESS_TOKEN")]
    access_token: Option<String>,

    #[arg(long, env = "ISSUEBOARD_RECONNECT_MAX", default_value_t = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    reconnect_max: u32,

    #[arg(long, env = "ISSUEBOARD_RECONNECT_BASE_MS")]
    reconnect_base_ms: Option<u64>,

    /// Milliseconds a socket handshake may take before it counts as failed.
    #[arg(long, env = "ISSUEBOARD_CONNECT_TIMEOUT_MS")]
    connect_timeout_ms: Option<u64>,

    /// Seconds between heartbeat pings; 0 disables them.
    #[arg(long, env = "ISSUEBOARD_HEARTBEAT_SECS", default_value_t = 0)]
    heartbeat_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the board every time it changes.
    Watch {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        status: Option<Status>,
        #[arg(long, conflicts_with = "unassigned")]
        assignee: Option<i64>,
        #[arg(long, default_value_t = false)]
        unassigned: bool,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Drag ITEM onto COLUMN and report how the move settled.
    Move { item: String, column: String },
}

impl Cli {
    fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        let mut config = SyncConfig::new(&self.api_url)?;
        if let Some(ws_url) = &self.ws_url {
            config.ws_url.clone_from(ws_url);
        }
        if let Some(graphql_url) = &self.graphql_url {
            config.graphql_url.clone_from(graphql_url);
        }
        config.access_token = self.access_token.clone().filter(|t| !t.is_empty());
        config.reconnect = ReconnectPolicy {
            max_attempts: self.reconnect_max,
            base_delay: self.reconnect_base_ms.map_or(DEFAULT_RECONNECT_BASE_DELAY, Duration::from_millis),
            connect_timeout: self.connect_timeout_ms.map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_millis),
        };
        config.heartbeat = (self.heartbeat_secs > 0).then(|| Duration::from_secs(self.heartbeat_secs));
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = cli.sync_config()?;
    let store = GraphqlStore::new(&config.graphql_url, config.access_token.as_deref())?;
    let session = SyncSession::start(config, Arc::new(store));

    match cli.command {
        Command::Watch { search, priority, status, assignee, unassigned, tag } => {
            let assignee = if unassigned { Some(AssigneeFilter::Unassigned) } else { assignee.map(AssigneeFilter::User) };
            let filter = IssueFilter { search, priority, status, assignee, tag_id: tag };
            run_watch(session, filter).await
        }
        Command::Move { item, column } => run_move(session, ItemId::new(item), &column).await,
    }
}

async fn run_watch(session: SyncSession<GraphqlStore>, filter: IssueFilter) -> Result<(), CliError> {
    if !filter.is_empty() {
        session.set_filter(filter).await?;
    }
    let mut rx = session.board().subscribe();
    print!("{}", render_board(&rx.borrow_and_update()));
    while rx.changed().await.is_ok() {
        let rendered = render_board(&rx.borrow_and_update());
        println!();
        print!("{rendered}");
    }
    Ok(())
}

async fn run_move(mut session: SyncSession<GraphqlStore>, id: ItemId, column: &str) -> Result<(), CliError> {
    let to: Status = column.parse()?;
    session.refresh().await?;
    if session.board().read(|board| board.locate(&id)).is_none() {
        return Err(CliError::UnknownItem(id));
    }

    session.drag().begin_drag(id.clone());
    let pending = match session.drag().drag_end(&id, Some(to.as_str())) {
        DropOutcome::Moved(pending) => pending,
        DropOutcome::Discarded(reason) => return Err(CliError::Discarded(reason)),
        DropOutcome::NoSession => return Err(CliError::NoDrag),
    };

    println!("#{id}: {} -> {}", pending.from, pending.to);
    let settlement = pending.settled().await;
    println!("#{id}: {settlement}");
    print!("{}", render_board(&session.board().snapshot()));
    session.shutdown();
    Ok(())
}

fn render_board(board: &Board) -> String {
    let mut out = String::new();
    for column in board.columns() {
        let _ = writeln!(out, "{} ({})", column.id(), column.items.len());
        for item in &column.items {
            let _ = writeln!(out, "  #{:<6} {:<7} {}", item.id.as_str(), item.priority.as_str(), item.title);
        }
    }
    out
}
