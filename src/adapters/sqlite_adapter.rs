//! SQLite storage adapter.
//!
//! Every operation checks out one pooled connection for its duration. Multi-step
//! mutations run inside a single SQLite transaction that rolls back on drop.

use crate::domain::alert::{Alert, AlertKind};
use crate::domain::clock;
use crate::domain::config_validation::{pool_size, sell_policy, DEFAULT_SQLITE_PATH};
use crate::domain::error::LedgerError;
use crate::domain::ledger::{plan_trade, HoldingChange, SellPolicy, TradeOutcome};
use crate::domain::portfolio::{Portfolio, DEFAULT_PORTFOLIO_NAME};
use crate::domain::position::{Holding, Position};
use crate::domain::preferences::{Preferences, PreferencesUpdate, StoredPreferences};
use crate::domain::stock::{normalize_symbol, placeholder_name, Stock, StockDetails};
use crate::domain::trade::{TradeRequest, Transaction, TransactionType};
use crate::domain::user::User;
use crate::domain::watchlist::{Watchlist, WatchlistEntry, DEFAULT_WATCHLIST_NAME};
use crate::ports::alert_port::AlertPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::preference_port::PreferencePort;
use crate::ports::watchlist_port::WatchlistPort;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    primary_portfolio_id INTEGER REFERENCES portfolios(id),
    primary_watchlist_id INTEGER REFERENCES watchlists(id)
);
CREATE TABLE IF NOT EXISTS stocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL UNIQUE,
    company_name TEXT NOT NULL,
    sector TEXT,
    industry TEXT,
    last_updated TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS watchlists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS watchlist_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    watchlist_id INTEGER NOT NULL REFERENCES watchlists(id),
    stock_id INTEGER NOT NULL REFERENCES stocks(id),
    added_at TEXT NOT NULL,
    UNIQUE (watchlist_id, stock_id)
);
CREATE TABLE IF NOT EXISTS portfolios (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS portfolio_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    portfolio_id INTEGER NOT NULL REFERENCES portfolios(id),
    stock_id INTEGER NOT NULL REFERENCES stocks(id),
    quantity REAL NOT NULL CHECK (quantity > 0),
    average_price REAL NOT NULL CHECK (average_price > 0),
    UNIQUE (portfolio_id, stock_id)
);
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    stock_id INTEGER NOT NULL REFERENCES stocks(id),
    transaction_type TEXT NOT NULL CHECK (transaction_type IN ('Buy', 'Sell')),
    quantity REAL NOT NULL CHECK (quantity > 0),
    price REAL NOT NULL CHECK (price > 0),
    executed_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    stock_id INTEGER NOT NULL REFERENCES stocks(id),
    alert_type TEXT NOT NULL,
    value REAL NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS user_preferences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id),
    theme TEXT,
    default_app TEXT,
    favorite_symbols TEXT,
    chart_preferences TEXT
);
CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, executed_at);
CREATE INDEX IF NOT EXISTS idx_alerts_user ON alerts(user_id);
CREATE INDEX IF NOT EXISTS idx_watchlists_user ON watchlists(user_id);
CREATE INDEX IF NOT EXISTS idx_portfolios_user ON portfolios(user_id);
CREATE TRIGGER IF NOT EXISTS transactions_no_update BEFORE UPDATE ON transactions
BEGIN
    SELECT RAISE(ABORT, 'transactions are append-only');
END;
CREATE TRIGGER IF NOT EXISTS transactions_no_delete BEFORE DELETE ON transactions
BEGIN
    SELECT RAISE(ABORT, 'transactions are append-only');
END;";

const USER_COLUMNS: &str =
    "id, username, email, created_at, primary_portfolio_id, primary_watchlist_id";
const STOCK_COLUMNS: &str = "id, symbol, company_name, sector, industry, last_updated";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
    sell_policy: SellPolicy,
}

fn db_err(e: r2d2::Error) -> LedgerError {
    LedgerError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> LedgerError {
    LedgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(index: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
}

fn ts_col(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    clock::from_text(&text).map_err(|e| conversion_err(index, e))
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct LabelError(String);

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        created_at: ts_col(row, 3)?,
        primary_portfolio_id: row.get(4)?,
        primary_watchlist_id: row.get(5)?,
    })
}

fn stock_from_row(row: &Row<'_>) -> rusqlite::Result<Stock> {
    Ok(Stock {
        id: row.get(0)?,
        symbol: row.get(1)?,
        company_name: row.get(2)?,
        sector: row.get(3)?,
        industry: row.get(4)?,
        last_updated: ts_col(row, 5)?,
    })
}

fn portfolio_from_row(row: &Row<'_>) -> rusqlite::Result<Portfolio> {
    Ok(Portfolio {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        created_at: ts_col(row, 3)?,
    })
}

fn watchlist_from_row(row: &Row<'_>) -> rusqlite::Result<Watchlist> {
    Ok(Watchlist {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        created_at: ts_col(row, 3)?,
    })
}

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<Alert> {
    let label: String = row.get(4)?;
    let kind: AlertKind = label.parse().map_err(|e| conversion_err(4, LabelError(e)))?;
    Ok(Alert {
        id: row.get(0)?,
        user_id: row.get(1)?,
        stock_id: row.get(2)?,
        symbol: row.get(3)?,
        kind,
        value: row.get(5)?,
        active: row.get(6)?,
        created_at: ts_col(row, 7)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let label: String = row.get(4)?;
    let kind: TransactionType = label
        .parse()
        .map_err(|e: LedgerError| conversion_err(4, LabelError(e.to_string())))?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        stock_id: row.get(2)?,
        symbol: row.get(3)?,
        kind,
        quantity: row.get(5)?,
        price: row.get(6)?,
        executed_at: ts_col(row, 7)?,
    })
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, LedgerError> {
    rows.collect::<rusqlite::Result<Vec<T>>>().map_err(query_err)
}

fn fetch_user(conn: &Connection, user_id: i64) -> Result<Option<User>, LedgerError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![user_id],
        user_from_row,
    )
    .optional()
    .map_err(query_err)
}

fn require_user(conn: &Connection, user_id: i64) -> Result<User, LedgerError> {
    fetch_user(conn, user_id)?.ok_or(LedgerError::UserNotFound { user_id })
}

fn fetch_stock(conn: &Connection, symbol: &str) -> Result<Option<Stock>, LedgerError> {
    conn.query_row(
        &format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE symbol = ?1"),
        params![symbol],
        stock_from_row,
    )
    .optional()
    .map_err(query_err)
}

/// Single-statement get-or-create keyed on the unique symbol.
fn get_or_create_stock(conn: &Connection, symbol: &str) -> Result<Stock, LedgerError> {
    conn.query_row(
        &format!(
            "INSERT INTO stocks (symbol, company_name, last_updated) VALUES (?1, ?2, ?3)
             ON CONFLICT(symbol) DO UPDATE SET symbol = excluded.symbol
             RETURNING {STOCK_COLUMNS}"
        ),
        params![symbol, placeholder_name(symbol), clock::to_text(&clock::now())],
        stock_from_row,
    )
    .map_err(query_err)
}

fn fetch_portfolio(conn: &Connection, portfolio_id: i64) -> Result<Option<Portfolio>, LedgerError> {
    conn.query_row(
        "SELECT id, user_id, name, created_at FROM portfolios WHERE id = ?1",
        params![portfolio_id],
        portfolio_from_row,
    )
    .optional()
    .map_err(query_err)
}

fn insert_portfolio(conn: &Connection, user_id: i64, name: &str) -> Result<Portfolio, LedgerError> {
    let created_at = clock::now();
    conn.execute(
        "INSERT INTO portfolios (name, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![name, user_id, clock::to_text(&created_at)],
    )
    .map_err(query_err)?;
    Ok(Portfolio {
        id: conn.last_insert_rowid(),
        user_id,
        name: name.to_string(),
        created_at,
    })
}

/// Resolve the designated portfolio. A user without one adopts their oldest
/// portfolio, or gets a new default one.
fn ensure_primary_portfolio(conn: &Connection, user: &User) -> Result<Portfolio, LedgerError> {
    if let Some(id) = user.primary_portfolio_id {
        return fetch_portfolio(conn, id)?.ok_or(LedgerError::PortfolioNotFound { portfolio_id: id });
    }

    let existing = conn
        .query_row(
            "SELECT id, user_id, name, created_at FROM portfolios
             WHERE user_id = ?1 ORDER BY id LIMIT 1",
            params![user.id],
            portfolio_from_row,
        )
        .optional()
        .map_err(query_err)?;

    let portfolio = match existing {
        Some(p) => p,
        None => {
            info!(user_id = user.id, "creating default portfolio");
            insert_portfolio(conn, user.id, DEFAULT_PORTFOLIO_NAME)?
        }
    };

    conn.execute(
        "UPDATE users SET primary_portfolio_id = ?1 WHERE id = ?2",
        params![portfolio.id, user.id],
    )
    .map_err(query_err)?;
    Ok(portfolio)
}

fn fetch_watchlist(conn: &Connection, watchlist_id: i64) -> Result<Option<Watchlist>, LedgerError> {
    conn.query_row(
        "SELECT id, user_id, name, created_at FROM watchlists WHERE id = ?1",
        params![watchlist_id],
        watchlist_from_row,
    )
    .optional()
    .map_err(query_err)
}

fn insert_watchlist(conn: &Connection, user_id: i64, name: &str) -> Result<Watchlist, LedgerError> {
    let created_at = clock::now();
    conn.execute(
        "INSERT INTO watchlists (name, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![name, user_id, clock::to_text(&created_at)],
    )
    .map_err(query_err)?;
    Ok(Watchlist {
        id: conn.last_insert_rowid(),
        user_id,
        name: name.to_string(),
        created_at,
    })
}

fn ensure_primary_watchlist(conn: &Connection, user: &User) -> Result<Watchlist, LedgerError> {
    if let Some(id) = user.primary_watchlist_id {
        if let Some(watchlist) = fetch_watchlist(conn, id)? {
            return Ok(watchlist);
        }
    }

    let existing = conn
        .query_row(
            "SELECT id, user_id, name, created_at FROM watchlists
             WHERE user_id = ?1 ORDER BY id LIMIT 1",
            params![user.id],
            watchlist_from_row,
        )
        .optional()
        .map_err(query_err)?;

    let watchlist = match existing {
        Some(w) => w,
        None => {
            info!(user_id = user.id, "creating default watchlist");
            insert_watchlist(conn, user.id, DEFAULT_WATCHLIST_NAME)?
        }
    };

    conn.execute(
        "UPDATE users SET primary_watchlist_id = ?1 WHERE id = ?2",
        params![watchlist.id, user.id],
    )
    .map_err(query_err)?;
    Ok(watchlist)
}

fn fetch_position(
    conn: &Connection,
    portfolio_id: i64,
    stock: &Stock,
) -> Result<Option<Position>, LedgerError> {
    conn.query_row(
        "SELECT quantity, average_price FROM portfolio_items
         WHERE portfolio_id = ?1 AND stock_id = ?2",
        params![portfolio_id, stock.id],
        |row| {
            Ok(Position {
                symbol: stock.symbol.clone(),
                quantity: row.get(0)?,
                average_price: row.get(1)?,
            })
        },
    )
    .optional()
    .map_err(query_err)
}

fn apply_change(
    conn: &Connection,
    portfolio_id: i64,
    stock_id: i64,
    change: &HoldingChange,
) -> Result<(), LedgerError> {
    let result = match change {
        HoldingChange::Opened(pos) => conn.execute(
            "INSERT INTO portfolio_items (portfolio_id, stock_id, quantity, average_price)
             VALUES (?1, ?2, ?3, ?4)",
            params![portfolio_id, stock_id, pos.quantity, pos.average_price],
        ),
        HoldingChange::Increased(pos) | HoldingChange::Reduced(pos) => conn.execute(
            "UPDATE portfolio_items SET quantity = ?1, average_price = ?2
             WHERE portfolio_id = ?3 AND stock_id = ?4",
            params![pos.quantity, pos.average_price, portfolio_id, stock_id],
        ),
        HoldingChange::Closed => conn.execute(
            "DELETE FROM portfolio_items WHERE portfolio_id = ?1 AND stock_id = ?2",
            params![portfolio_id, stock_id],
        ),
        HoldingChange::Unchanged => Ok(0),
    };
    result.map_err(query_err)?;
    Ok(())
}

fn fetch_stored_preferences(
    conn: &Connection,
    user_id: i64,
) -> Result<Option<StoredPreferences>, LedgerError> {
    conn.query_row(
        "SELECT theme, default_app, favorite_symbols, chart_preferences
         FROM user_preferences WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(StoredPreferences {
                theme: row.get(0)?,
                default_app: row.get(1)?,
                favorite_symbols: row.get(2)?,
                chart_preferences: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(query_err)
}

fn insert_default_preferences(conn: &Connection, user_id: i64) -> Result<(), LedgerError> {
    let stored = Preferences::defaults(user_id).to_stored()?;
    conn.execute(
        "INSERT INTO user_preferences (user_id, theme, default_app, favorite_symbols, chart_preferences)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO NOTHING",
        params![
            user_id,
            stored.theme,
            stored.default_app,
            stored.favorite_symbols,
            stored.chart_preferences
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LedgerError> {
        let db_path = config
            .get_string("sqlite", "path")
            .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string());
        Self::open(&db_path, pool_size(config, "sqlite"), sell_policy(config)?)
    }

    pub fn open(path: &str, pool_size: u32, sell_policy: SellPolicy) -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::file(path).with_init(|c| {
            c.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        info!(path, pool_size, %sell_policy, "opened sqlite store");
        Ok(Self { pool, sell_policy })
    }

    pub fn in_memory() -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        // Dropping the only connection would drop the database with it.
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)
            .map_err(db_err)?;

        Ok(Self {
            pool,
            sell_policy: SellPolicy::default(),
        })
    }

    pub fn with_sell_policy(mut self, policy: SellPolicy) -> Self {
        self.sell_policy = policy;
        self
    }

    pub fn sell_policy(&self) -> SellPolicy {
        self.sell_policy
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, LedgerError> {
        self.pool.get().map_err(db_err)
    }

    pub fn initialize_schema(&self) -> Result<(), LedgerError> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA).map_err(query_err)?;
        debug!("sqlite schema ready");
        Ok(())
    }
}

impl LedgerPort for SqliteAdapter {
    fn create_user(&self, username: &str, email: &str) -> Result<User, LedgerError> {
        let conn = self.conn()?;
        let created_at = clock::now();
        conn.execute(
            "INSERT INTO users (username, email, created_at) VALUES (?1, ?2, ?3)",
            params![username, email, clock::to_text(&created_at)],
        )
        .map_err(query_err)?;
        let id = conn.last_insert_rowid();
        info!(user_id = id, username, "created user");
        Ok(User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            created_at,
            primary_portfolio_id: None,
            primary_watchlist_id: None,
        })
    }

    fn get_or_create_user(&self, username: &str, email: &str) -> Result<User, LedgerError> {
        match self.find_user(username)? {
            Some(user) => Ok(user),
            None => self.create_user(username, email),
        }
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>, LedgerError> {
        let conn = self.conn()?;
        fetch_user(&conn, user_id)
    }

    fn find_user(&self, username: &str) -> Result<Option<User>, LedgerError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(query_err)
    }

    fn upsert_stock(&self, details: &StockDetails) -> Result<Stock, LedgerError> {
        let symbol = normalize_symbol(&details.symbol)?;
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "INSERT INTO stocks (symbol, company_name, sector, industry, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(symbol) DO UPDATE SET
                     company_name = excluded.company_name,
                     sector = excluded.sector,
                     industry = excluded.industry,
                     last_updated = excluded.last_updated
                 RETURNING {STOCK_COLUMNS}"
            ),
            params![
                symbol,
                details.company_name,
                details.sector,
                details.industry,
                clock::to_text(&clock::now())
            ],
            stock_from_row,
        )
        .map_err(query_err)
    }

    fn get_stock(&self, symbol: &str) -> Result<Option<Stock>, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let conn = self.conn()?;
        fetch_stock(&conn, &symbol)
    }

    fn list_stocks(&self) -> Result<Vec<Stock>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {STOCK_COLUMNS} FROM stocks ORDER BY symbol"))
            .map_err(query_err)?;
        let rows = stmt.query_map([], stock_from_row).map_err(query_err)?;
        collect_rows(rows)
    }

    fn record_transaction(
        &self,
        user_id: i64,
        symbol: &str,
        kind: TransactionType,
        quantity: f64,
        price: f64,
    ) -> Result<TradeOutcome, LedgerError> {
        let trade = TradeRequest::new(symbol, kind, quantity, price)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let user = require_user(&tx, user_id)?;
        let stock = get_or_create_stock(&tx, &trade.symbol)?;
        let portfolio = ensure_primary_portfolio(&tx, &user)?;
        let current = fetch_position(&tx, portfolio.id, &stock)?;

        let plan = plan_trade(current.as_ref(), &trade, self.sell_policy).inspect_err(|e| {
            warn!(user_id, symbol = %trade.symbol, error = %e, "trade rejected");
        })?;

        let executed_at = clock::now();
        tx.execute(
            "INSERT INTO transactions (user_id, stock_id, transaction_type, quantity, price, executed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                stock.id,
                trade.kind.as_str(),
                plan.recorded_quantity,
                trade.price,
                clock::to_text(&executed_at)
            ],
        )
        .map_err(query_err)?;
        let transaction_id = tx.last_insert_rowid();

        apply_change(&tx, portfolio.id, stock.id, &plan.change)?;
        tx.commit().map_err(query_err)?;

        info!(
            user_id,
            symbol = %trade.symbol,
            kind = %trade.kind,
            quantity = plan.recorded_quantity,
            price = trade.price,
            "recorded transaction"
        );

        Ok(TradeOutcome {
            transaction: Transaction {
                id: transaction_id,
                user_id,
                stock_id: stock.id,
                symbol: stock.symbol,
                kind: trade.kind,
                quantity: plan.recorded_quantity,
                price: trade.price,
                executed_at,
            },
            change: plan.change,
        })
    }

    fn create_portfolio(&self, user_id: i64, name: &str) -> Result<Portfolio, LedgerError> {
        let conn = self.conn()?;
        require_user(&conn, user_id)?;
        let portfolio = insert_portfolio(&conn, user_id, name)?;
        info!(user_id, portfolio_id = portfolio.id, "created portfolio");
        Ok(portfolio)
    }

    fn primary_portfolio(&self, user_id: i64) -> Result<Portfolio, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let user = require_user(&tx, user_id)?;
        let portfolio = ensure_primary_portfolio(&tx, &user)?;
        tx.commit().map_err(query_err)?;
        Ok(portfolio)
    }

    fn set_primary_portfolio(&self, user_id: i64, portfolio_id: i64) -> Result<bool, LedgerError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE users SET primary_portfolio_id = ?1
                 WHERE id = ?2
                   AND EXISTS (SELECT 1 FROM portfolios WHERE id = ?1 AND user_id = ?2)",
                params![portfolio_id, user_id],
            )
            .map_err(query_err)?;
        Ok(updated > 0)
    }

    fn list_portfolios(&self, user_id: i64) -> Result<Vec<Portfolio>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, name, created_at FROM portfolios
                 WHERE user_id = ?1 ORDER BY id",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id], portfolio_from_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }

    fn list_holdings(&self, portfolio_id: i64) -> Result<Vec<Holding>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT pi.portfolio_id, pi.stock_id, s.symbol, s.company_name,
                        pi.quantity, pi.average_price
                 FROM portfolio_items pi
                 JOIN stocks s ON s.id = pi.stock_id
                 WHERE pi.portfolio_id = ?1
                 ORDER BY s.symbol",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![portfolio_id], |row| {
                Ok(Holding {
                    portfolio_id: row.get(0)?,
                    stock_id: row.get(1)?,
                    symbol: row.get(2)?,
                    company_name: row.get(3)?,
                    quantity: row.get(4)?,
                    average_price: row.get(5)?,
                })
            })
            .map_err(query_err)?;
        collect_rows(rows)
    }

    fn list_transactions(
        &self,
        user_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let conn = self.conn()?;
        // SQLite treats a negative LIMIT as no limit.
        let limit = limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX)).unwrap_or(-1);
        let mut stmt = conn
            .prepare(
                "SELECT t.id, t.user_id, t.stock_id, s.symbol, t.transaction_type,
                        t.quantity, t.price, t.executed_at
                 FROM transactions t
                 JOIN stocks s ON s.id = t.stock_id
                 WHERE t.user_id = ?1
                 ORDER BY t.executed_at DESC, t.id DESC
                 LIMIT ?2",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id, limit], transaction_from_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }
}

impl WatchlistPort for SqliteAdapter {
    fn create_watchlist(&self, user_id: i64, name: &str) -> Result<Watchlist, LedgerError> {
        let conn = self.conn()?;
        require_user(&conn, user_id)?;
        let watchlist = insert_watchlist(&conn, user_id, name)?;
        info!(user_id, watchlist_id = watchlist.id, "created watchlist");
        Ok(watchlist)
    }

    fn primary_watchlist(&self, user_id: i64) -> Result<Watchlist, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let user = require_user(&tx, user_id)?;
        let watchlist = ensure_primary_watchlist(&tx, &user)?;
        tx.commit().map_err(query_err)?;
        Ok(watchlist)
    }

    fn set_primary_watchlist(&self, user_id: i64, watchlist_id: i64) -> Result<bool, LedgerError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE users SET primary_watchlist_id = ?1
                 WHERE id = ?2
                   AND EXISTS (SELECT 1 FROM watchlists WHERE id = ?1 AND user_id = ?2)",
                params![watchlist_id, user_id],
            )
            .map_err(query_err)?;
        Ok(updated > 0)
    }

    fn list_watchlists(&self, user_id: i64) -> Result<Vec<Watchlist>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, name, created_at FROM watchlists
                 WHERE user_id = ?1 ORDER BY id",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id], watchlist_from_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }

    fn list_watchlist_stocks(&self, watchlist_id: i64) -> Result<Vec<WatchlistEntry>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT wi.watchlist_id, wi.stock_id, s.symbol, s.company_name, wi.added_at
                 FROM watchlist_items wi
                 JOIN stocks s ON s.id = wi.stock_id
                 WHERE wi.watchlist_id = ?1
                 ORDER BY wi.id",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![watchlist_id], |row| {
                Ok(WatchlistEntry {
                    watchlist_id: row.get(0)?,
                    stock_id: row.get(1)?,
                    symbol: row.get(2)?,
                    company_name: row.get(3)?,
                    added_at: ts_col(row, 4)?,
                })
            })
            .map_err(query_err)?;
        collect_rows(rows)
    }

    fn add_to_watchlist(&self, watchlist_id: i64, symbol: &str) -> Result<bool, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        if fetch_watchlist(&tx, watchlist_id)?.is_none() {
            debug!(watchlist_id, "watchlist not found");
            return Ok(false);
        }

        let stock = get_or_create_stock(&tx, &symbol)?;
        let inserted = tx
            .execute(
                "INSERT INTO watchlist_items (watchlist_id, stock_id, added_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(watchlist_id, stock_id) DO NOTHING",
                params![watchlist_id, stock.id, clock::to_text(&clock::now())],
            )
            .map_err(query_err)?;
        tx.commit().map_err(query_err)?;

        if inserted > 0 {
            info!(watchlist_id, symbol = %symbol, "added to watchlist");
        }
        Ok(inserted > 0)
    }

    fn remove_from_watchlist(&self, watchlist_id: i64, symbol: &str) -> Result<bool, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let conn = self.conn()?;
        let Some(stock) = fetch_stock(&conn, &symbol)? else {
            return Ok(false);
        };
        let removed = conn
            .execute(
                "DELETE FROM watchlist_items WHERE watchlist_id = ?1 AND stock_id = ?2",
                params![watchlist_id, stock.id],
            )
            .map_err(query_err)?;
        if removed > 0 {
            info!(watchlist_id, symbol = %symbol, "removed from watchlist");
        }
        Ok(removed > 0)
    }

    fn delete_watchlist(&self, watchlist_id: i64) -> Result<bool, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        if fetch_watchlist(&tx, watchlist_id)?.is_none() {
            return Ok(false);
        }
        tx.execute(
            "UPDATE users SET primary_watchlist_id = NULL WHERE primary_watchlist_id = ?1",
            params![watchlist_id],
        )
        .map_err(query_err)?;
        tx.execute(
            "DELETE FROM watchlist_items WHERE watchlist_id = ?1",
            params![watchlist_id],
        )
        .map_err(query_err)?;
        tx.execute("DELETE FROM watchlists WHERE id = ?1", params![watchlist_id])
            .map_err(query_err)?;
        tx.commit().map_err(query_err)?;
        info!(watchlist_id, "deleted watchlist");
        Ok(true)
    }
}

impl AlertPort for SqliteAdapter {
    fn add_alert(
        &self,
        user_id: i64,
        symbol: &str,
        kind: AlertKind,
        value: f64,
    ) -> Result<Alert, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        if !value.is_finite() {
            return Err(LedgerError::invalid("alert value", format!("must be finite, got {value}")));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        require_user(&tx, user_id)?;
        let stock = get_or_create_stock(&tx, &symbol)?;
        let created_at = clock::now();
        tx.execute(
            "INSERT INTO alerts (user_id, stock_id, alert_type, value, active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![user_id, stock.id, kind.label(), value, clock::to_text(&created_at)],
        )
        .map_err(query_err)?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(query_err)?;

        info!(user_id, alert_id = id, symbol = %symbol, kind = %kind, value, "added alert");
        Ok(Alert {
            id,
            user_id,
            stock_id: stock.id,
            symbol: stock.symbol,
            kind,
            value,
            active: true,
            created_at,
        })
    }

    fn delete_alert(&self, alert_id: i64) -> Result<bool, LedgerError> {
        let conn = self.conn()?;
        let removed = conn
            .execute("DELETE FROM alerts WHERE id = ?1", params![alert_id])
            .map_err(query_err)?;
        Ok(removed > 0)
    }

    fn set_alert_active(&self, alert_id: i64, active: bool) -> Result<bool, LedgerError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE alerts SET active = ?1 WHERE id = ?2",
                params![active, alert_id],
            )
            .map_err(query_err)?;
        Ok(updated > 0)
    }

    fn list_active_alerts(&self, user_id: i64) -> Result<Vec<Alert>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT a.id, a.user_id, a.stock_id, s.symbol, a.alert_type,
                        a.value, a.active, a.created_at
                 FROM alerts a
                 JOIN stocks s ON s.id = a.stock_id
                 WHERE a.user_id = ?1 AND a.active = 1
                 ORDER BY a.id",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id], alert_from_row)
            .map_err(query_err)?;
        collect_rows(rows)
    }
}

impl PreferencePort for SqliteAdapter {
    fn get_preferences(&self, user_id: i64) -> Result<Preferences, LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        require_user(&tx, user_id)?;

        let stored = match fetch_stored_preferences(&tx, user_id)? {
            Some(stored) => stored,
            None => {
                info!(user_id, "creating default preferences");
                insert_default_preferences(&tx, user_id)?;
                Preferences::defaults(user_id).to_stored()?
            }
        };
        tx.commit().map_err(query_err)?;

        Ok(Preferences::from_stored(user_id, &stored))
    }

    fn update_preferences(
        &self,
        user_id: i64,
        update: &PreferencesUpdate,
    ) -> Result<(), LedgerError> {
        let values = update.to_stored()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        require_user(&tx, user_id)?;

        insert_default_preferences(&tx, user_id)?;
        tx.execute(
            "UPDATE user_preferences SET
                 theme = COALESCE(?1, theme),
                 default_app = COALESCE(?2, default_app),
                 favorite_symbols = COALESCE(?3, favorite_symbols),
                 chart_preferences = COALESCE(?4, chart_preferences)
             WHERE user_id = ?5",
            params![
                values.theme,
                values.default_app,
                values.favorite_symbols,
                values.chart_preferences,
                user_id
            ],
        )
        .map_err(query_err)?;
        tx.commit().map_err(query_err)?;

        info!(user_id, "updated preferences");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preferences::Theme;
    use approx::assert_relative_eq;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn store() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn store_with_user() -> (SqliteAdapter, User) {
        let adapter = store();
        let user = adapter.create_user("alice", "alice@example.com").unwrap();
        (adapter, user)
    }

    struct PathConfig(String);

    impl ConfigPort for PathConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            match (section, key) {
                ("sqlite", "path") => Some(self.0.clone()),
                ("ledger", "sell_policy") => Some("clamp".to_string()),
                _ => None,
            }
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    #[test]
    fn from_config_reads_path_and_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let config = PathConfig(path.to_str().unwrap().to_string());

        let adapter = SqliteAdapter::from_config(&config).unwrap();
        adapter.initialize_schema().unwrap();
        assert_eq!(adapter.sell_policy(), SellPolicy::Clamp);
        assert!(path.exists());
        assert_eq!(pool_size(&EmptyConfig, "sqlite"), 4);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_str().unwrap();

        {
            let adapter = SqliteAdapter::open(path, 2, SellPolicy::Reject).unwrap();
            adapter.initialize_schema().unwrap();
            let user = adapter.create_user("carol", "carol@example.com").unwrap();
            adapter
                .record_transaction(user.id, "IBM", TransactionType::Buy, 3.0, 140.0)
                .unwrap();
        }

        let adapter = SqliteAdapter::open(path, 2, SellPolicy::Reject).unwrap();
        adapter.initialize_schema().unwrap();
        let user = adapter.find_user("carol").unwrap().unwrap();
        assert_eq!(adapter.list_transactions(user.id, None).unwrap().len(), 1);
    }

    #[test]
    fn schema_is_idempotent() {
        let adapter = store();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn buy_then_buy_blends_average() {
        let (adapter, user) = store_with_user();
        adapter
            .record_transaction(user.id, "X", TransactionType::Buy, 10.0, 100.0)
            .unwrap();
        let outcome = adapter
            .record_transaction(user.id, "x", TransactionType::Buy, 5.0, 130.0)
            .unwrap();
        assert!(matches!(outcome.change, HoldingChange::Increased(_)));

        let portfolio = adapter.primary_portfolio(user.id).unwrap();
        let holdings = adapter.list_holdings(portfolio.id).unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].symbol, "X");
        assert_relative_eq!(holdings[0].quantity, 15.0);
        assert_relative_eq!(holdings[0].average_price, 110.0);
    }

    #[test]
    fn first_trade_creates_primary_portfolio() {
        let (adapter, user) = store_with_user();
        assert!(adapter.list_portfolios(user.id).unwrap().is_empty());

        adapter
            .record_transaction(user.id, "AAPL", TransactionType::Buy, 1.0, 150.0)
            .unwrap();

        let portfolios = adapter.list_portfolios(user.id).unwrap();
        assert_eq!(portfolios.len(), 1);
        assert_eq!(portfolios[0].name, DEFAULT_PORTFOLIO_NAME);
        let refreshed = adapter.get_user(user.id).unwrap().unwrap();
        assert_eq!(refreshed.primary_portfolio_id, Some(portfolios[0].id));
    }

    #[test]
    fn legacy_user_adopts_oldest_portfolio() {
        let (adapter, user) = store_with_user();
        let first = adapter.create_portfolio(user.id, "Long Term").unwrap();
        adapter.create_portfolio(user.id, "Trading").unwrap();

        let primary = adapter.primary_portfolio(user.id).unwrap();
        assert_eq!(primary.id, first.id);
        assert_eq!(adapter.list_portfolios(user.id).unwrap().len(), 2);
    }

    #[test]
    fn trades_follow_designated_portfolio() {
        let (adapter, user) = store_with_user();
        adapter.create_portfolio(user.id, "Long Term").unwrap();
        let trading = adapter.create_portfolio(user.id, "Trading").unwrap();
        assert!(adapter.set_primary_portfolio(user.id, trading.id).unwrap());

        adapter
            .record_transaction(user.id, "TSLA", TransactionType::Buy, 2.0, 250.0)
            .unwrap();
        assert_eq!(adapter.list_holdings(trading.id).unwrap().len(), 1);
    }

    #[test]
    fn cannot_designate_someone_elses_portfolio() {
        let (adapter, user) = store_with_user();
        let bob = adapter.create_user("bob", "bob@example.com").unwrap();
        let bobs = adapter.create_portfolio(bob.id, "Bob's").unwrap();
        assert!(!adapter.set_primary_portfolio(user.id, bobs.id).unwrap());
        assert!(!adapter.set_primary_portfolio(user.id, 9999).unwrap());
    }

    #[test]
    fn rejected_sell_writes_nothing() {
        let (adapter, user) = store_with_user();
        let err = adapter
            .record_transaction(user.id, "NEW", TransactionType::Sell, 1.0, 10.0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientHoldings { .. }));
        assert!(adapter.list_transactions(user.id, None).unwrap().is_empty());
        assert!(adapter.get_stock("NEW").unwrap().is_none());
    }

    #[test]
    fn record_policy_keeps_orphan_sell() {
        let (adapter, user) = store_with_user();
        let adapter = adapter.with_sell_policy(SellPolicy::Record);
        let outcome = adapter
            .record_transaction(user.id, "GHOST", TransactionType::Sell, 3.0, 10.0)
            .unwrap();
        assert_eq!(outcome.change, HoldingChange::Unchanged);
        assert_eq!(adapter.list_transactions(user.id, None).unwrap().len(), 1);
        let portfolio = adapter.primary_portfolio(user.id).unwrap();
        assert!(adapter.list_holdings(portfolio.id).unwrap().is_empty());
    }

    #[test]
    fn clamp_policy_records_held_quantity() {
        let (adapter, user) = store_with_user();
        let adapter = adapter.with_sell_policy(SellPolicy::Clamp);
        adapter
            .record_transaction(user.id, "AMZN", TransactionType::Buy, 4.0, 100.0)
            .unwrap();
        let outcome = adapter
            .record_transaction(user.id, "AMZN", TransactionType::Sell, 10.0, 120.0)
            .unwrap();
        assert_relative_eq!(outcome.transaction.quantity, 4.0);
        assert_eq!(outcome.change, HoldingChange::Closed);
    }

    #[test]
    fn unknown_user_is_an_error() {
        let adapter = store();
        let err = adapter
            .record_transaction(42, "AAPL", TransactionType::Buy, 1.0, 1.0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound { user_id: 42 }));
    }

    #[test]
    fn transactions_are_append_only() {
        let (adapter, user) = store_with_user();
        adapter
            .record_transaction(user.id, "AAPL", TransactionType::Buy, 1.0, 1.0)
            .unwrap();
        let conn = adapter.conn().unwrap();
        assert!(conn.execute("DELETE FROM transactions", []).is_err());
        assert!(conn.execute("UPDATE transactions SET price = 2.0", []).is_err());
    }

    #[test]
    fn in_memory_pool_keeps_its_connection() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        assert_eq!(adapter.pool.max_size(), 1);
        assert_eq!(adapter.pool.idle_timeout(), None);
        assert_eq!(adapter.pool.max_lifetime(), None);
    }

    #[test]
    fn transaction_limit() {
        let (adapter, user) = store_with_user();
        for i in 1..=5 {
            adapter
                .record_transaction(user.id, "AAPL", TransactionType::Buy, 1.0, i as f64)
                .unwrap();
        }
        let recent = adapter.list_transactions(user.id, Some(2)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_relative_eq!(recent[0].price, 5.0);
        assert_relative_eq!(recent[1].price, 4.0);
        assert_eq!(adapter.list_transactions(user.id, None).unwrap().len(), 5);
        assert_eq!(adapter.list_transactions(user.id, Some(usize::MAX)).unwrap().len(), 5);
        assert!(adapter.list_transactions(user.id, Some(0)).unwrap().is_empty());
    }

    #[test]
    fn upsert_stock_refreshes_details() {
        let (adapter, user) = store_with_user();
        adapter
            .record_transaction(user.id, "NFLX", TransactionType::Buy, 1.0, 400.0)
            .unwrap();
        assert_eq!(adapter.get_stock("NFLX").unwrap().unwrap().company_name, "NFLX Inc.");

        let stock = adapter
            .upsert_stock(&StockDetails::new(
                "nflx",
                "Netflix, Inc.",
                "Communication Services",
                "Entertainment",
            ))
            .unwrap();
        assert_eq!(stock.company_name, "Netflix, Inc.");
        assert_eq!(stock.sector.as_deref(), Some("Communication Services"));
        assert_eq!(adapter.list_stocks().unwrap().len(), 1);
    }

    #[test]
    fn get_or_create_user_is_stable() {
        let adapter = store();
        let a = adapter.get_or_create_user("demo", "demo@example.com").unwrap();
        let b = adapter.get_or_create_user("demo", "demo@example.com").unwrap();
        assert_eq!(a.id, b.id);
        assert!(adapter.find_user("nobody").unwrap().is_none());
    }

    #[test]
    fn add_to_missing_watchlist_returns_false() {
        let adapter = store();
        assert!(!adapter.add_to_watchlist(77, "AAPL").unwrap());
        assert!(adapter.get_stock("AAPL").unwrap().is_none());
    }

    #[test]
    fn remove_unknown_symbol_returns_false() {
        let (adapter, user) = store_with_user();
        let watchlist = adapter.primary_watchlist(user.id).unwrap();
        assert!(!adapter.remove_from_watchlist(watchlist.id, "ZZZZ").unwrap());
    }

    #[test]
    fn delete_watchlist_cascades_and_clears_primary() {
        let (adapter, user) = store_with_user();
        let watchlist = adapter.primary_watchlist(user.id).unwrap();
        adapter.add_to_watchlist(watchlist.id, "AAPL").unwrap();
        adapter.add_to_watchlist(watchlist.id, "MSFT").unwrap();

        assert!(adapter.delete_watchlist(watchlist.id).unwrap());
        assert!(!adapter.delete_watchlist(watchlist.id).unwrap());
        assert!(adapter.list_watchlist_stocks(watchlist.id).unwrap().is_empty());
        let refreshed = adapter.get_user(user.id).unwrap().unwrap();
        assert_eq!(refreshed.primary_watchlist_id, None);

        let replacement = adapter.primary_watchlist(user.id).unwrap();
        assert_ne!(replacement.id, watchlist.id);
    }

    #[test]
    fn alerts_can_be_disabled_and_deleted() {
        let (adapter, user) = store_with_user();
        let alert = adapter
            .add_alert(user.id, "tsla", AlertKind::PercentChange, 5.0)
            .unwrap();
        assert_eq!(alert.symbol, "TSLA");
        assert!(alert.active);

        assert!(adapter.set_alert_active(alert.id, false).unwrap());
        assert!(adapter.list_active_alerts(user.id).unwrap().is_empty());
        assert!(adapter.set_alert_active(alert.id, true).unwrap());
        assert_eq!(adapter.list_active_alerts(user.id).unwrap().len(), 1);

        assert!(adapter.delete_alert(alert.id).unwrap());
        assert!(!adapter.delete_alert(alert.id).unwrap());
        assert!(!adapter.set_alert_active(alert.id, true).unwrap());
    }

    #[test]
    fn alert_value_must_be_finite() {
        let (adapter, user) = store_with_user();
        let err = adapter
            .add_alert(user.id, "AAPL", AlertKind::PriceAbove, f64::NAN)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { .. }));
    }

    #[test]
    fn corrupted_preference_text_degrades_to_defaults() {
        let (adapter, user) = store_with_user();
        adapter.get_preferences(user.id).unwrap();
        {
            let conn = adapter.conn().unwrap();
            conn.execute(
                "UPDATE user_preferences SET favorite_symbols = '{oops', chart_preferences = NULL, theme = 'plaid'
                 WHERE user_id = ?1",
                params![user.id],
            )
            .unwrap();
        }
        let prefs = adapter.get_preferences(user.id).unwrap();
        assert_eq!(prefs, Preferences::defaults(user.id));
    }

    #[test]
    fn update_creates_missing_row() {
        let (adapter, user) = store_with_user();
        adapter
            .update_preferences(
                user.id,
                &PreferencesUpdate {
                    theme: Some(Theme::Dark),
                    ..Default::default()
                },
            )
            .unwrap();
        let prefs = adapter.get_preferences(user.id).unwrap();
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.default_app, "Stock Analysis");
        assert_eq!(prefs.favorite_symbols, vec!["AAPL", "MSFT", "GOOGL"]);
    }

    #[test]
    fn preferences_for_unknown_user() {
        let adapter = store();
        assert!(matches!(
            adapter.get_preferences(5),
            Err(LedgerError::UserNotFound { user_id: 5 })
        ));
    }
}
