use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use challenge_desk::leaderboard::{self, LeaderboardView};
use challenge_desk::payment::{self, CheckoutError, PaymentMethod, Plan};
use challenge_desk::storage::{Language, Theme};
use challenge_desk::trade::{TradeAction, TradeOutcome, VerdictStatus};
use challenge_desk::{
    ClientConfig, Dashboard, DashboardState, DurableStore, Gateway, Leaderboard, LeaderboardState,
    Navigator, Preferences, Route, Screen, SessionStore,
};

#[derive(Parser, Debug)]
#[command(name = "challenge-desk")]
#[command(about = "Terminal client for the simulated trading challenge")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// API base address (e.g. http://localhost:5000/api); overrides CHALLENGE_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// File holding the credential and preferences; overrides CHALLENGE_STORE_PATH
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Request timeout in seconds; overrides CHALLENGE_TIMEOUT_SECS
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "CHALLENGE_PASSWORD")]
        password: String,
    },

    /// Sign in and store the credential
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "CHALLENGE_PASSWORD")]
        password: String,
    },

    /// Forget the stored credential
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Buy a challenge plan
    Checkout {
        /// starter, pro or elite
        #[arg(long)]
        plan: String,

        /// cmi, crypto or paypal
        #[arg(long, default_value = "cmi")]
        method: String,
    },

    /// Live prices, signals and trading (interactive)
    Dashboard {
        /// Symbol selected on start
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Monthly leaderboard
    Leaderboard {
        /// Keep refreshing until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Show or change language and theme
    Prefs {
        /// fr, en or ar
        #[arg(long)]
        lang: Option<String>,

        /// dark or light
        #[arg(long)]
        theme: Option<String>,
    },

    /// Trades placed in the active challenge
    History,
}

impl Args {
    /// Environment first, then command-line overrides
    fn client_config(&self, needs_api: bool) -> Result<ClientConfig> {
        let mut config = match &self.api_url {
            Some(url) => ClientConfig {
                api_base_url: url.clone(),
                ..Default::default()
            }
            .with_env()?,
            None if needs_api => ClientConfig::from_env().context("pass --api-url or set it in .env")?,
            None => ClientConfig::from_env().or_else(|_| ClientConfig::default().with_env())?,
        };

        if let Some(store) = &self.store {
            config.storage_path = store.clone();
        }
        if let Some(secs) = self.timeout {
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config.normalized())
    }

    /// Commands that never send a request
    fn is_offline(&self) -> bool {
        matches!(self.command, Commands::Prefs { .. } | Commands::Logout)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_directive = if args.verbose {
        "challenge_desk=debug"
    } else {
        "challenge_desk=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();

    let config = args.client_config(!args.is_offline())?;

    // A corrupt store must not lock the user out of logout or prefs
    let store = Arc::new(
        DurableStore::open_or_reset(&config.storage_path)
            .with_context(|| format!("Failed to open store at {:?}", config.storage_path))?,
    );

    if let Commands::Prefs { lang, theme } = &args.command {
        return run_prefs(&store, &config, lang.as_deref(), theme.as_deref());
    }

    let gateway = Gateway::http(&config, store.clone())?;
    let session = SessionStore::new(gateway);

    if let Commands::Logout = args.command {
        session.logout();
        println!("Signed out.");
        return Ok(());
    }

    session.bootstrap().await;

    match args.command {
        Commands::Register {
            username,
            email,
            password,
        } => {
            let user = session
                .register(&username, &email, &password)
                .await
                .map_err(|e| anyhow!(e.user_message("Registration failed")))?;
            println!("Welcome, {}!", user.username);
        }
        Commands::Login { email, password } => {
            let user = session
                .login(&email, &password)
                .await
                .map_err(|e| anyhow!(e.user_message("Login failed")))?;
            println!("Signed in as {} ({})", user.username, user.email);
        }
        Commands::Whoami => match session.snapshot().user {
            Some(user) => println!("{} <{}> {:?}", user.username, user.email, user.role),
            None => println!("Not signed in."),
        },
        Commands::Checkout { plan, method } => {
            run_checkout(&session, &plan, &method).await?;
        }
        Commands::Dashboard { symbol } => {
            run_dashboard(&session, &config, symbol).await?;
        }
        Commands::Leaderboard { watch } => {
            run_leaderboard(&session, &config, watch).await?;
        }
        Commands::History => {
            run_history(&session).await?;
        }
        Commands::Prefs { .. } | Commands::Logout => {}
    }

    Ok(())
}

fn run_prefs(
    store: &DurableStore,
    config: &ClientConfig,
    lang: Option<&str>,
    theme: Option<&str>,
) -> Result<()> {
    let mut prefs = Preferences::load(store, config.default_theme);

    if let Some(code) = lang {
        let language = Language::parse(code).ok_or_else(|| anyhow!("Unknown language '{}'", code))?;
        prefs.set_language(store, language)?;
    }
    if let Some(name) = theme {
        let theme = Theme::parse(name).ok_or_else(|| anyhow!("Unknown theme '{}'", name))?;
        prefs.set_theme(store, theme)?;
    }

    let direction = if prefs.language.is_rtl() { "rtl" } else { "ltr" };
    println!("language: {} ({})", prefs.language, direction);
    println!("theme:    {}", prefs.theme);
    Ok(())
}

async fn run_checkout(session: &SessionStore, plan: &str, method: &str) -> Result<()> {
    let plan = Plan::parse(plan).ok_or_else(|| anyhow!("Unknown plan '{}'", plan))?;
    let method =
        PaymentMethod::parse(method).ok_or_else(|| anyhow!("Unknown payment method '{}'", method))?;

    match payment::checkout(session.gateway(), plan, method).await {
        Ok(()) => {
            println!("Purchased {}", plan);
            Ok(())
        }
        Err(CheckoutError::SessionExpired) => {
            session.logout();
            bail!("{}", CheckoutError::SessionExpired)
        }
        Err(e) => bail!("{}", e),
    }
}

async fn run_history(session: &SessionStore) -> Result<()> {
    let trades = session
        .gateway()
        .trade_history()
        .await
        .map_err(|e| anyhow!(e.user_message("Failed to fetch trade history")))?;

    if trades.is_empty() {
        println!("No trades yet.");
        return Ok(());
    }
    println!("{:<20} {:<8} {:<5} {:>10} {:>12} {:>10}", "TIME", "SYMBOL", "SIDE", "QTY", "PRICE", "P&L");
    for t in trades {
        println!(
            "{:<20} {:<8} {:<5} {:>10} {:>12.2} {:>10.2}",
            t.timestamp, t.symbol, t.action, t.quantity, t.price, t.profit_loss
        );
    }
    Ok(())
}

// ============================================================================
// Leaderboard
// ============================================================================

async fn run_leaderboard(session: &SessionStore, config: &ClientConfig, watch: bool) -> Result<()> {
    if !watch {
        let raw = session
            .gateway()
            .monthly_leaderboard()
            .await
            .map_err(|_| anyhow!(leaderboard::LEADERBOARD_FALLBACK))?;
        print_leaderboard(&LeaderboardState {
            loading: false,
            error: None,
            rows: leaderboard::normalize(&raw),
        });
        return Ok(());
    }

    let handle = Leaderboard::mount(session.gateway().clone(), config);
    let mut rx = handle.subscribe();
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                print_leaderboard(&state);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    handle.unmount().await;
    Ok(())
}

fn print_leaderboard(state: &LeaderboardState) {
    match state.view() {
        LeaderboardView::Loading => println!("Loading..."),
        LeaderboardView::Error(message) => println!("{}", message),
        LeaderboardView::Rows(rows) => {
            println!("{:>4}  {:<20} {:>9} {:>7}", "#", "TRADER", "PROFIT", "TRADES");
            for row in rows {
                println!(
                    "{:>4}  {:<20} {:>8.2}% {:>7}",
                    row.rank, row.username, row.profit_percent, row.total_trades
                );
            }
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, PartialEq)]
enum Input {
    Symbol(String),
    Trade(TradeAction, u32),
    Pause,
    Resume,
    Dismiss,
    Quit,
    Help,
}

fn parse_input(line: &str) -> Result<Input> {
    let mut parts = line.split_whitespace();
    let word = parts.next().unwrap_or("").to_ascii_lowercase();
    let arg = parts.next();

    let quantity = |arg: Option<&str>| -> Result<u32> {
        arg.context("quantity required")?
            .parse::<u32>()
            .context("quantity must be a positive whole number")
    };

    match word.as_str() {
        "symbol" | "s" => Ok(Input::Symbol(arg.context("symbol required")?.to_string())),
        "buy" | "b" => Ok(Input::Trade(TradeAction::Buy, quantity(arg)?)),
        "sell" => Ok(Input::Trade(TradeAction::Sell, quantity(arg)?)),
        "pause" => Ok(Input::Pause),
        "resume" => Ok(Input::Resume),
        "dismiss" | "ok" => Ok(Input::Dismiss),
        "quit" | "q" | "exit" => Ok(Input::Quit),
        "" | "help" | "?" => Ok(Input::Help),
        other => bail!("unknown command '{}'", other),
    }
}

const DASHBOARD_HELP: &str =
    "commands: symbol <T> | buy <n> | sell <n> | pause | resume | dismiss | quit";

async fn run_dashboard(
    session: &SessionStore,
    config: &ClientConfig,
    symbol: Option<String>,
) -> Result<()> {
    let mut nav = Navigator::new();
    match nav.navigate(Route::Dashboard.path(), session) {
        Screen::Show(Route::Dashboard) => {}
        Screen::Show(other) => {
            println!(
                "Not signed in (redirected to {}). Run `challenge-desk login` first.",
                other.path()
            );
            return Ok(());
        }
        Screen::Loading(_) => bail!("Session is still loading"),
    }

    let mut config = config.clone();
    if let Some(symbol) = symbol {
        config.default_symbol = symbol;
    }

    let handle = Dashboard::mount(session.gateway().clone(), &config);
    let mut state_rx = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", DASHBOARD_HELP);

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                render_dashboard(&state);

                // a 401 anywhere ends the session on the next guard check
                if nav.resolve(session) != Screen::Show(Route::Dashboard) {
                    println!("Session expired. Please log in again.");
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = match parse_input(&line) {
                    Ok(input) => input,
                    Err(e) => {
                        println!("{}; {}", e, DASHBOARD_HELP);
                        continue;
                    }
                };
                debug!("Dashboard input: {:?}", input);
                match input {
                    Input::Symbol(ticker) => handle.select_symbol(&ticker).await,
                    Input::Pause => handle.set_polling(false).await,
                    Input::Resume => handle.set_polling(true).await,
                    Input::Dismiss => handle.dismiss_verdict().await,
                    Input::Help => println!("{}", DASHBOARD_HELP),
                    Input::Quit => break,
                    Input::Trade(action, quantity) => {
                        match handle.trade(action, quantity).await {
                            TradeOutcome::Skipped => {
                                println!("Trade unavailable: waiting for a price and an active challenge");
                            }
                            TradeOutcome::Completed { .. } => println!("Trade executed"),
                            TradeOutcome::Failed { message } => println!("Trade failed: {}", message),
                            TradeOutcome::Aborted => println!("Trade interrupted"),
                        }
                    }
                }
            }
        }
    }

    handle.unmount().await;
    info!("Dashboard closed");
    Ok(())
}

fn render_dashboard(state: &DashboardState) {
    let price = state
        .live_price
        .as_ref()
        .map(|p| format!("{} ({})", p.display(), p.display_change()))
        .unwrap_or_else(|| "...".to_string());
    let signal = state
        .signal
        .as_ref()
        .map(|s| format!("{:?} {:.0}% risk {:?}", s.signal, s.confidence, s.risk_level))
        .unwrap_or_else(|| "...".to_string());
    let polling = if state.polling { "live" } else { "paused" };

    println!("[{}] {} {} | signal {}", polling, state.symbol, price, signal);

    if let Some(chart) = &state.chart {
        if let (Some(first), Some(last)) = (chart.first(), chart.last()) {
            println!("  chart: {} candles, {:.2} -> {:.2}", chart.len(), first.close, last.close);
        }
    }
    if let Some(challenge) = &state.challenge {
        println!(
            "  challenge #{}: balance {:.2} ({:+.2}%) {:?}",
            challenge.id,
            challenge.current_balance,
            challenge.profit_percent(),
            challenge.health()
        );
    }
    if state.submitting {
        println!("  submitting...");
    }
    if let Some(error) = &state.error {
        println!("  error: {}", error);
    }
    if let Some(verdict) = &state.verdict {
        let title = match verdict.status {
            VerdictStatus::Passed => "CHALLENGE PASSED",
            VerdictStatus::Failed => "CHALLENGE FAILED",
        };
        println!("  *** {} *** {}", title, verdict.reason.as_deref().unwrap_or(""));
        println!("  (type `dismiss` to close)");
    }
}
