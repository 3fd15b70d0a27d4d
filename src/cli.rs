//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvExportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::logging::{init_logging, LoggingConfig};
use crate::domain::alert::AlertKind;
use crate::domain::clock;
use crate::domain::config_validation::{store_backend, validate_config, StoreBackend};
use crate::domain::demo::seed_demo_data;
use crate::domain::error::LedgerError;
use crate::domain::ledger::HoldingChange;
use crate::domain::portfolio::PortfolioValuation;
use crate::domain::preferences::{ChartPreferences, PreferencesUpdate, Theme};
use crate::domain::stock::normalize_symbol;
use crate::domain::trade::TransactionType;
use crate::domain::user::User;
use crate::domain::watchlist::Watchlist;
use crate::ports::config_port::ConfigPort;
use crate::ports::export_port::ExportPort;
use crate::ports::LedgerStore;

#[derive(Parser, Debug)]
#[command(name = "stockledger", about = "Portfolio and watchlist ledger")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the schema, optionally with demo data
    Init {
        #[arg(long)]
        demo: bool,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Record a purchase
    Buy(TradeArgs),
    /// Record a sale
    Sell(TradeArgs),
    /// Show holdings of the primary portfolio
    Portfolio {
        user: String,
        /// Current price as SYMBOL=PRICE; may be repeated
        #[arg(long = "price", value_parser = parse_price)]
        prices: Vec<(String, f64)>,
    },
    /// Show the transaction log, newest first
    Transactions {
        user: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Manage watchlists
    Watchlist {
        #[command(subcommand)]
        action: WatchlistCommand,
    },
    /// Manage price and event alerts
    Alert {
        #[command(subcommand)]
        action: AlertCommand,
    },
    /// Show or change dashboard preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsCommand,
    },
    /// Write holdings or transactions as CSV
    Export {
        #[command(subcommand)]
        action: ExportCommand,
    },
}

#[derive(Args, Debug)]
pub struct TradeArgs {
    pub user: String,
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    Create { username: String, email: String },
    Show { username: String },
}

#[derive(Subcommand, Debug)]
pub enum WatchlistCommand {
    Add {
        user: String,
        symbol: String,
        /// Defaults to the primary watchlist
        #[arg(short, long)]
        watchlist: Option<i64>,
    },
    Remove {
        user: String,
        symbol: String,
        #[arg(short, long)]
        watchlist: Option<i64>,
    },
    List {
        user: String,
        #[arg(short, long)]
        watchlist: Option<i64>,
    },
    Create {
        user: String,
        name: String,
        /// Make it the primary watchlist
        #[arg(long)]
        primary: bool,
    },
    Delete {
        user: String,
        watchlist: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum AlertCommand {
    Add {
        user: String,
        symbol: String,
        /// price-above, price-below, pct-change, earnings or news
        kind: AlertKind,
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
    Delete { id: i64 },
    Enable { id: i64 },
    Disable { id: i64 },
    List { user: String },
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    Show {
        user: String,
    },
    Set {
        user: String,
        #[arg(long)]
        theme: Option<Theme>,
        #[arg(long)]
        default_app: Option<String>,
        /// Comma-separated symbols
        #[arg(long, value_delimiter = ',')]
        favorites: Option<Vec<String>>,
        /// Chart options as a JSON object
        #[arg(long)]
        chart: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ExportCommand {
    Holdings {
        user: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Transactions {
        user: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(code) => return code,
    };
    init_logging(&LoggingConfig::from_env(&config));

    if let Err(e) = validate_config(&config) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match execute(cli.command, store.as_ref(), &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load the INI file if one was given, then apply `DATABASE_URL`.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, ExitCode> {
    let adapter = match path {
        Some(path) => FileConfigAdapter::from_file(path).map_err(|e| {
            let err = LedgerError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            };
            eprintln!("error: {err}");
            ExitCode::from(&err)
        })?,
        None => FileConfigAdapter::empty(),
    };
    Ok(adapter.with_env_overrides())
}

/// Open the configured backend and make sure its schema exists.
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn LedgerStore>, LedgerError> {
    match store_backend(config)? {
        StoreBackend::Sqlite => open_sqlite(config),
        StoreBackend::Postgres => open_postgres(config),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<Box<dyn LedgerStore>, LedgerError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let adapter = SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<Box<dyn LedgerStore>, LedgerError> {
    Err(backend_not_built("sqlite"))
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &dyn ConfigPort) -> Result<Box<dyn LedgerStore>, LedgerError> {
    use crate::adapters::postgres_adapter::PostgresAdapter;

    let adapter = PostgresAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_config: &dyn ConfigPort) -> Result<Box<dyn LedgerStore>, LedgerError> {
    Err(backend_not_built("postgres"))
}

#[allow(dead_code)]
fn backend_not_built(name: &str) -> LedgerError {
    LedgerError::ConfigInvalid {
        section: "database".into(),
        key: "backend".into(),
        reason: format!("{name} support not compiled in (enable the `{name}` feature)"),
    }
}

pub fn parse_price(raw: &str) -> Result<(String, f64), String> {
    let (symbol, price) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=PRICE, got {raw:?}"))?;
    let symbol = normalize_symbol(symbol).map_err(|e| e.to_string())?;
    let price: f64 = price
        .trim()
        .parse()
        .map_err(|_| format!("invalid price in {raw:?}"))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(format!("price must be positive in {raw:?}"));
    }
    Ok((symbol, price))
}

/// Run one command against an open store, writing its report to `out`.
pub fn execute(
    command: Command,
    store: &dyn LedgerStore,
    out: &mut dyn Write,
) -> Result<(), LedgerError> {
    match command {
        Command::Init { demo } => run_init(store, demo, out),
        Command::User { action } => run_user(store, action, out),
        Command::Buy(args) => run_trade(store, TransactionType::Buy, args, out),
        Command::Sell(args) => run_trade(store, TransactionType::Sell, args, out),
        Command::Portfolio { user, prices } => run_portfolio(store, &user, prices, out),
        Command::Transactions { user, limit } => run_transactions(store, &user, limit, out),
        Command::Watchlist { action } => run_watchlist(store, action, out),
        Command::Alert { action } => run_alert(store, action, out),
        Command::Prefs { action } => run_prefs(store, action, out),
        Command::Export { action } => run_export(store, action, out),
    }
}

fn resolve_user(store: &dyn LedgerStore, username: &str) -> Result<User, LedgerError> {
    store
        .find_user(username)?
        .ok_or_else(|| LedgerError::UnknownUsername {
            username: username.to_string(),
        })
}

fn run_init(store: &dyn LedgerStore, demo: bool, out: &mut dyn Write) -> Result<(), LedgerError> {
    writeln!(out, "schema ready")?;
    if demo {
        match seed_demo_data(store)? {
            Some(user) => writeln!(out, "seeded demo user {} (id {})", user.username, user.id)?,
            None => writeln!(out, "demo data already present")?,
        }
    }
    Ok(())
}

fn run_user(
    store: &dyn LedgerStore,
    action: UserCommand,
    out: &mut dyn Write,
) -> Result<(), LedgerError> {
    match action {
        UserCommand::Create { username, email } => {
            let user = store.create_user(&username, &email)?;
            writeln!(out, "created user {} (id {})", user.username, user.id)?;
        }
        UserCommand::Show { username } => {
            let user = resolve_user(store, &username)?;
            let portfolios = store.list_portfolios(user.id)?;
            let watchlists = store.list_watchlists(user.id)?;
            writeln!(out, "id:         {}", user.id)?;
            writeln!(out, "username:   {}", user.username)?;
            writeln!(out, "email:      {}", user.email)?;
            writeln!(out, "created:    {}", clock::to_text(&user.created_at))?;
            writeln!(
                out,
                "portfolios: {} (primary {})",
                portfolios.len(),
                display_id(user.primary_portfolio_id)
            )?;
            writeln!(
                out,
                "watchlists: {} (primary {})",
                watchlists.len(),
                display_id(user.primary_watchlist_id)
            )?;
        }
    }
    Ok(())
}

fn display_id(id: Option<i64>) -> String {
    id.map(|i| i.to_string()).unwrap_or_else(|| "none".to_string())
}

fn run_trade(
    store: &dyn LedgerStore,
    kind: TransactionType,
    args: TradeArgs,
    out: &mut dyn Write,
) -> Result<(), LedgerError> {
    let user = resolve_user(store, &args.user)?;
    let outcome = store.record_transaction(user.id, &args.symbol, kind, args.quantity, args.price)?;
    let tx = &outcome.transaction;
    writeln!(
        out,
        "{} {} {} @ {:.2} (transaction {})",
        tx.kind, tx.quantity, tx.symbol, tx.price, tx.id
    )?;
    match &outcome.change {
        HoldingChange::Opened(p) | HoldingChange::Increased(p) | HoldingChange::Reduced(p) => {
            writeln!(out, "holding: {} @ avg {:.2}", p.quantity, p.average_price)?
        }
        HoldingChange::Closed => writeln!(out, "holding: closed")?,
        HoldingChange::Unchanged => writeln!(out, "holding: unchanged")?,
    }
    Ok(())
}

fn run_portfolio(
    store: &dyn LedgerStore,
    username: &str,
    prices: Vec<(String, f64)>,
    out: &mut dyn Write,
) -> Result<(), LedgerError> {
    let user = resolve_user(store, username)?;
    let portfolio = store.primary_portfolio(user.id)?;
    let holdings = store.list_holdings(portfolio.id)?;
    let prices: HashMap<String, f64> = prices.into_iter().collect();
    let valuation = PortfolioValuation::compute(&holdings, &prices);

    writeln!(out, "{} (id {})", portfolio.name, portfolio.id)?;
    if valuation.holdings.is_empty() {
        writeln!(out, "  no holdings")?;
        return Ok(());
    }
    writeln!(
        out,
        "  {:<8} {:>12} {:>12} {:>12} {:>14} {:>12} {:>8}",
        "SYMBOL", "QTY", "AVG", "PRICE", "VALUE", "P&L", "P&L%"
    )?;
    for row in &valuation.holdings {
        writeln!(
            out,
            "  {:<8} {:>12.4} {:>12.2} {:>12.2} {:>14.2} {:>12.2} {:>7.2}%",
            row.symbol,
            row.quantity,
            row.average_price,
            row.current_price,
            row.current_value,
            row.pnl,
            row.pnl_pct
        )?;
    }
    writeln!(
        out,
        "  invested {:.2}, value {:.2}, P&L {:.2} ({:.2}%)",
        valuation.total_invested, valuation.total_value, valuation.total_pnl, valuation.total_pnl_pct
    )?;
    Ok(())
}

fn run_transactions(
    store: &dyn LedgerStore,
    username: &str,
    limit: Option<usize>,
    out: &mut dyn Write,
) -> Result<(), LedgerError> {
    let user = resolve_user(store, username)?;
    let transactions = store.list_transactions(user.id, limit)?;
    if transactions.is_empty() {
        writeln!(out, "no transactions")?;
        return Ok(());
    }
    for tx in &transactions {
        writeln!(
            out,
            "{:>6}  {}  {:<4} {:<8} {:>12.4} @ {:>10.2} = {:>12.2}",
            tx.id,
            clock::to_text(&tx.executed_at),
            tx.kind,
            tx.symbol,
            tx.quantity,
            tx.price,
            tx.total_value()
        )?;
    }
    Ok(())
}

/// The explicitly chosen watchlist, which must belong to `user`, or the primary one.
fn target_watchlist(
    store: &dyn LedgerStore,
    user: &User,
    watchlist_id: Option<i64>,
) -> Result<Watchlist, LedgerError> {
    match watchlist_id {
        None => store.primary_watchlist(user.id),
        Some(id) => store
            .list_watchlists(user.id)?
            .into_iter()
            .find(|w| w.id == id)
            .ok_or_else(|| {
                LedgerError::invalid("watchlist", format!("{} has no watchlist {id}", user.username))
            }),
    }
}

fn run_watchlist(
    store: &dyn LedgerStore,
    action: WatchlistCommand,
    out: &mut dyn Write,
) -> Result<(), LedgerError> {
    match action {
        WatchlistCommand::Add {
            user,
            symbol,
            watchlist,
        } => {
            let user = resolve_user(store, &user)?;
            let target = target_watchlist(store, &user, watchlist)?;
            if store.add_to_watchlist(target.id, &symbol)? {
                writeln!(out, "added {} to {}", symbol.trim().to_uppercase(), target.name)?;
            } else {
                writeln!(out, "{} already on {}", symbol.trim().to_uppercase(), target.name)?;
            }
        }
        WatchlistCommand::Remove {
            user,
            symbol,
            watchlist,
        } => {
            let user = resolve_user(store, &user)?;
            let target = target_watchlist(store, &user, watchlist)?;
            if store.remove_from_watchlist(target.id, &symbol)? {
                writeln!(out, "removed {} from {}", symbol.trim().to_uppercase(), target.name)?;
            } else {
                writeln!(out, "{} not on {}", symbol.trim().to_uppercase(), target.name)?;
            }
        }
        WatchlistCommand::List { user, watchlist } => {
            let user = resolve_user(store, &user)?;
            let target = target_watchlist(store, &user, watchlist)?;
            writeln!(out, "{} (id {})", target.name, target.id)?;
            for entry in store.list_watchlist_stocks(target.id)? {
                writeln!(out, "  {:<8} {}", entry.symbol, entry.company_name)?;
            }
            let others: Vec<_> = store
                .list_watchlists(user.id)?
                .into_iter()
                .filter(|w| w.id != target.id)
                .collect();
            for w in others {
                writeln!(out, "other: {} (id {})", w.name, w.id)?;
            }
        }
        WatchlistCommand::Create {
            user,
            name,
            primary,
        } => {
            let user = resolve_user(store, &user)?;
            let watchlist = store.create_watchlist(user.id, &name)?;
            if primary {
                store.set_primary_watchlist(user.id, watchlist.id)?;
            }
            writeln!(out, "created watchlist {} (id {})", watchlist.name, watchlist.id)?;
        }
        WatchlistCommand::Delete { user, watchlist } => {
            let user = resolve_user(store, &user)?;
            let target = target_watchlist(store, &user, Some(watchlist))?;
            store.delete_watchlist(target.id)?;
            writeln!(out, "deleted watchlist {} (id {})", target.name, target.id)?;
        }
    }
    Ok(())
}

fn run_alert(
    store: &dyn LedgerStore,
    action: AlertCommand,
    out: &mut dyn Write,
) -> Result<(), LedgerError> {
    match action {
        AlertCommand::Add {
            user,
            symbol,
            kind,
            value,
        } => {
            let user = resolve_user(store, &user)?;
            let alert = store.add_alert(user.id, &symbol, kind, value)?;
            writeln!(out, "alert {}: {} {} {}", alert.id, alert.symbol, alert.kind, alert.value)?;
        }
        AlertCommand::Delete { id } => {
            let found = store.delete_alert(id)?;
            writeln!(out, "{}", if found { "deleted" } else { "no such alert" })?;
        }
        AlertCommand::Enable { id } => {
            let found = store.set_alert_active(id, true)?;
            writeln!(out, "{}", if found { "enabled" } else { "no such alert" })?;
        }
        AlertCommand::Disable { id } => {
            let found = store.set_alert_active(id, false)?;
            writeln!(out, "{}", if found { "disabled" } else { "no such alert" })?;
        }
        AlertCommand::List { user } => {
            let user = resolve_user(store, &user)?;
            let alerts = store.list_active_alerts(user.id)?;
            if alerts.is_empty() {
                writeln!(out, "no active alerts")?;
            }
            for alert in alerts {
                writeln!(
                    out,
                    "{:>6}  {:<8} {:<12} {}",
                    alert.id, alert.symbol, alert.kind, alert.value
                )?;
            }
        }
    }
    Ok(())
}

fn run_prefs(
    store: &dyn LedgerStore,
    action: PrefsCommand,
    out: &mut dyn Write,
) -> Result<(), LedgerError> {
    match action {
        PrefsCommand::Show { user } => {
            let user = resolve_user(store, &user)?;
            let prefs = store.get_preferences(user.id)?;
            let chart = serde_json::to_string(&prefs.chart).map_err(|e| {
                LedgerError::Serialization {
                    reason: e.to_string(),
                }
            })?;
            writeln!(out, "theme:       {}", prefs.theme)?;
            writeln!(out, "default app: {}", prefs.default_app)?;
            writeln!(out, "favorites:   {}", prefs.favorite_symbols.join(", "))?;
            writeln!(out, "chart:       {chart}")?;
        }
        PrefsCommand::Set {
            user,
            theme,
            default_app,
            favorites,
            chart,
        } => {
            let user = resolve_user(store, &user)?;
            let favorite_symbols = favorites
                .map(|symbols| {
                    symbols
                        .iter()
                        .filter(|s| !s.trim().is_empty())
                        .map(|s| normalize_symbol(s))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?;
            let chart_preferences = chart
                .map(|raw| {
                    serde_json::from_str::<ChartPreferences>(&raw)
                        .map_err(|e| LedgerError::invalid("chart preferences", e.to_string()))
                })
                .transpose()?;
            let update = PreferencesUpdate {
                theme,
                default_app,
                favorite_symbols,
                chart_preferences,
            };
            if update.is_empty() {
                return Err(LedgerError::invalid("preferences", "nothing to update"));
            }
            store.update_preferences(user.id, &update)?;
            writeln!(out, "preferences updated")?;
        }
    }
    Ok(())
}

fn run_export(
    store: &dyn LedgerStore,
    action: ExportCommand,
    out: &mut dyn Write,
) -> Result<(), LedgerError> {
    let exporter = CsvExportAdapter::new();
    let (username, output) = match &action {
        ExportCommand::Holdings { user, output } | ExportCommand::Transactions { user, output } => {
            (user.as_str(), output.as_ref())
        }
    };
    let user = resolve_user(store, username)?;

    let mut file;
    let sink: &mut dyn Write = match output {
        Some(path) => {
            file = File::create(path)?;
            &mut file
        }
        None => out,
    };

    match action {
        ExportCommand::Holdings { .. } => {
            let portfolio = store.primary_portfolio(user.id)?;
            exporter.write_holdings(&store.list_holdings(portfolio.id)?, sink)?;
        }
        ExportCommand::Transactions { .. } => {
            exporter.write_transactions(&store.list_transactions(user.id, None)?, sink)?;
        }
    }
    Ok(())
}
