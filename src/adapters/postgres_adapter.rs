//! PostgreSQL storage adapter.
//!
//! Same semantics as the SQLite store. Timestamps use `TIMESTAMPTZ` and ids
//! are `BIGSERIAL`.

use crate::domain::alert::{Alert, AlertKind};
use crate::domain::clock;
use crate::domain::config_validation::{pool_size, sell_policy};
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
use postgres::types::ToSql;
use postgres::{GenericClient, NoTls, Row};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use tracing::{debug, info, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS stocks (
    id BIGSERIAL PRIMARY KEY,
    symbol TEXT NOT NULL UNIQUE,
    company_name TEXT NOT NULL,
    sector TEXT,
    industry TEXT,
    last_updated TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS watchlists (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    user_id BIGINT NOT NULL REFERENCES users(id),
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS watchlist_items (
    id BIGSERIAL PRIMARY KEY,
    watchlist_id BIGINT NOT NULL REFERENCES watchlists(id),
    stock_id BIGINT NOT NULL REFERENCES stocks(id),
    added_at TIMESTAMPTZ NOT NULL,
    UNIQUE (watchlist_id, stock_id)
);
CREATE TABLE IF NOT EXISTS portfolios (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    user_id BIGINT NOT NULL REFERENCES users(id),
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS portfolio_items (
    id BIGSERIAL PRIMARY KEY,
    portfolio_id BIGINT NOT NULL REFERENCES portfolios(id),
    stock_id BIGINT NOT NULL REFERENCES stocks(id),
    quantity DOUBLE PRECISION NOT NULL CHECK (quantity > 0),
    average_price DOUBLE PRECISION NOT NULL CHECK (average_price > 0),
    UNIQUE (portfolio_id, stock_id)
);
CREATE TABLE IF NOT EXISTS transactions (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id),
    stock_id BIGINT NOT NULL REFERENCES stocks(id),
    transaction_type TEXT NOT NULL CHECK (transaction_type IN ('Buy', 'Sell')),
    quantity DOUBLE PRECISION NOT NULL CHECK (quantity > 0),
    price DOUBLE PRECISION NOT NULL CHECK (price > 0),
    executed_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS alerts (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id),
    stock_id BIGINT NOT NULL REFERENCES stocks(id),
    alert_type TEXT NOT NULL,
    value DOUBLE PRECISION NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS user_preferences (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL UNIQUE REFERENCES users(id),
    theme TEXT,
    default_app TEXT,
    favorite_symbols TEXT,
    chart_preferences TEXT
);
ALTER TABLE users ADD COLUMN IF NOT EXISTS primary_portfolio_id BIGINT REFERENCES portfolios(id);
ALTER TABLE users ADD COLUMN IF NOT EXISTS primary_watchlist_id BIGINT REFERENCES watchlists(id);
CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, executed_at);
CREATE INDEX IF NOT EXISTS idx_alerts_user ON alerts(user_id);
CREATE INDEX IF NOT EXISTS idx_watchlists_user ON watchlists(user_id);
CREATE INDEX IF NOT EXISTS idx_portfolios_user ON portfolios(user_id);
CREATE OR REPLACE FUNCTION transactions_append_only() RETURNS trigger AS $$
BEGIN
    RAISE EXCEPTION 'transactions are append-only';
END;
$$ LANGUAGE plpgsql;
DROP TRIGGER IF EXISTS transactions_append_only ON transactions;
CREATE TRIGGER transactions_append_only BEFORE UPDATE OR DELETE ON transactions
    FOR EACH ROW EXECUTE FUNCTION transactions_append_only();";

const USER_COLUMNS: &str =
    "id, username, email, created_at, primary_portfolio_id, primary_watchlist_id";
const STOCK_COLUMNS: &str = "id, symbol, company_name, sector, industry, last_updated";

type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

pub struct PostgresAdapter {
    pool: Pool<PostgresConnectionManager<NoTls>>,
    sell_policy: SellPolicy,
}

fn db_err(e: r2d2::Error) -> LedgerError {
    LedgerError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: postgres::Error) -> LedgerError {
    LedgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get(0),
        username: row.get(1),
        email: row.get(2),
        created_at: row.get(3),
        primary_portfolio_id: row.get(4),
        primary_watchlist_id: row.get(5),
    }
}

fn stock_from_row(row: &Row) -> Stock {
    Stock {
        id: row.get(0),
        symbol: row.get(1),
        company_name: row.get(2),
        sector: row.get(3),
        industry: row.get(4),
        last_updated: row.get(5),
    }
}

fn portfolio_from_row(row: &Row) -> Portfolio {
    Portfolio {
        id: row.get(0),
        user_id: row.get(1),
        name: row.get(2),
        created_at: row.get(3),
    }
}

fn watchlist_from_row(row: &Row) -> Watchlist {
    Watchlist {
        id: row.get(0),
        user_id: row.get(1),
        name: row.get(2),
        created_at: row.get(3),
    }
}

fn alert_from_row(row: &Row) -> Result<Alert, LedgerError> {
    let label: String = row.get(4);
    let kind: AlertKind = label.parse().map_err(|reason| LedgerError::DatabaseQuery {
        reason: format!("stored alert_type: {reason}"),
    })?;
    Ok(Alert {
        id: row.get(0),
        user_id: row.get(1),
        stock_id: row.get(2),
        symbol: row.get(3),
        kind,
        value: row.get(5),
        active: row.get(6),
        created_at: row.get(7),
    })
}

fn transaction_from_row(row: &Row) -> Result<Transaction, LedgerError> {
    let label: String = row.get(4);
    Ok(Transaction {
        id: row.get(0),
        user_id: row.get(1),
        stock_id: row.get(2),
        symbol: row.get(3),
        kind: label.parse()?,
        quantity: row.get(5),
        price: row.get(6),
        executed_at: row.get(7),
    })
}

fn query_opt(
    client: &mut impl GenericClient,
    sql: &str,
    params: Params<'_>,
) -> Result<Option<Row>, LedgerError> {
    client.query_opt(sql, params).map_err(query_err)
}

fn query_one(
    client: &mut impl GenericClient,
    sql: &str,
    params: Params<'_>,
) -> Result<Row, LedgerError> {
    client.query_one(sql, params).map_err(query_err)
}

fn execute(
    client: &mut impl GenericClient,
    sql: &str,
    params: Params<'_>,
) -> Result<u64, LedgerError> {
    client.execute(sql, params).map_err(query_err)
}

fn fetch_user(client: &mut impl GenericClient, user_id: i64) -> Result<Option<User>, LedgerError> {
    let row = query_opt(
        client,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"),
        &[&user_id],
    )?;
    Ok(row.as_ref().map(user_from_row))
}

fn require_user(client: &mut impl GenericClient, user_id: i64) -> Result<User, LedgerError> {
    fetch_user(client, user_id)?.ok_or(LedgerError::UserNotFound { user_id })
}

fn fetch_stock(client: &mut impl GenericClient, symbol: &str) -> Result<Option<Stock>, LedgerError> {
    let row = query_opt(
        client,
        &format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE symbol = $1"),
        &[&symbol],
    )?;
    Ok(row.as_ref().map(stock_from_row))
}

fn get_or_create_stock(client: &mut impl GenericClient, symbol: &str) -> Result<Stock, LedgerError> {
    let name = placeholder_name(symbol);
    let now = clock::now();
    let row = query_one(
        client,
        &format!(
            "INSERT INTO stocks (symbol, company_name, last_updated) VALUES ($1, $2, $3)
             ON CONFLICT (symbol) DO UPDATE SET symbol = EXCLUDED.symbol
             RETURNING {STOCK_COLUMNS}"
        ),
        &[&symbol, &name, &now],
    )?;
    Ok(stock_from_row(&row))
}

fn fetch_portfolio(
    client: &mut impl GenericClient,
    portfolio_id: i64,
) -> Result<Option<Portfolio>, LedgerError> {
    let row = query_opt(
        client,
        "SELECT id, user_id, name, created_at FROM portfolios WHERE id = $1",
        &[&portfolio_id],
    )?;
    Ok(row.as_ref().map(portfolio_from_row))
}

fn insert_portfolio(
    client: &mut impl GenericClient,
    user_id: i64,
    name: &str,
) -> Result<Portfolio, LedgerError> {
    let now = clock::now();
    let row = query_one(
        client,
        "INSERT INTO portfolios (name, user_id, created_at) VALUES ($1, $2, $3)
         RETURNING id, user_id, name, created_at",
        &[&name, &user_id, &now],
    )?;
    Ok(portfolio_from_row(&row))
}

fn ensure_primary_portfolio(
    client: &mut impl GenericClient,
    user: &User,
) -> Result<Portfolio, LedgerError> {
    if let Some(id) = user.primary_portfolio_id {
        return fetch_portfolio(client, id)?
            .ok_or(LedgerError::PortfolioNotFound { portfolio_id: id });
    }

    let existing = query_opt(
        client,
        "SELECT id, user_id, name, created_at FROM portfolios
         WHERE user_id = $1 ORDER BY id LIMIT 1",
        &[&user.id],
    )?;
    let portfolio = match existing {
        Some(row) => portfolio_from_row(&row),
        None => {
            info!(user_id = user.id, "creating default portfolio");
            insert_portfolio(client, user.id, DEFAULT_PORTFOLIO_NAME)?
        }
    };

    execute(
        client,
        "UPDATE users SET primary_portfolio_id = $1 WHERE id = $2",
        &[&portfolio.id, &user.id],
    )?;
    Ok(portfolio)
}

fn fetch_watchlist(
    client: &mut impl GenericClient,
    watchlist_id: i64,
) -> Result<Option<Watchlist>, LedgerError> {
    let row = query_opt(
        client,
        "SELECT id, user_id, name, created_at FROM watchlists WHERE id = $1",
        &[&watchlist_id],
    )?;
    Ok(row.as_ref().map(watchlist_from_row))
}

fn insert_watchlist(
    client: &mut impl GenericClient,
    user_id: i64,
    name: &str,
) -> Result<Watchlist, LedgerError> {
    let now = clock::now();
    let row = query_one(
        client,
        "INSERT INTO watchlists (name, user_id, created_at) VALUES ($1, $2, $3)
         RETURNING id, user_id, name, created_at",
        &[&name, &user_id, &now],
    )?;
    Ok(watchlist_from_row(&row))
}

fn ensure_primary_watchlist(
    client: &mut impl GenericClient,
    user: &User,
) -> Result<Watchlist, LedgerError> {
    if let Some(id) = user.primary_watchlist_id {
        if let Some(watchlist) = fetch_watchlist(client, id)? {
            return Ok(watchlist);
        }
    }

    let existing = query_opt(
        client,
        "SELECT id, user_id, name, created_at FROM watchlists
         WHERE user_id = $1 ORDER BY id LIMIT 1",
        &[&user.id],
    )?;
    let watchlist = match existing {
        Some(row) => watchlist_from_row(&row),
        None => {
            info!(user_id = user.id, "creating default watchlist");
            insert_watchlist(client, user.id, DEFAULT_WATCHLIST_NAME)?
        }
    };

    execute(
        client,
        "UPDATE users SET primary_watchlist_id = $1 WHERE id = $2",
        &[&watchlist.id, &user.id],
    )?;
    Ok(watchlist)
}

fn fetch_stored_preferences(
    client: &mut impl GenericClient,
    user_id: i64,
) -> Result<Option<StoredPreferences>, LedgerError> {
    let row = query_opt(
        client,
        "SELECT theme, default_app, favorite_symbols, chart_preferences
         FROM user_preferences WHERE user_id = $1",
        &[&user_id],
    )?;
    Ok(row.map(|row| StoredPreferences {
        theme: row.get(0),
        default_app: row.get(1),
        favorite_symbols: row.get(2),
        chart_preferences: row.get(3),
    }))
}

fn insert_default_preferences(
    client: &mut impl GenericClient,
    user_id: i64,
) -> Result<(), LedgerError> {
    let stored = Preferences::defaults(user_id).to_stored()?;
    execute(
        client,
        "INSERT INTO user_preferences (user_id, theme, default_app, favorite_symbols, chart_preferences)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (user_id) DO NOTHING",
        &[
            &user_id,
            &stored.theme,
            &stored.default_app,
            &stored.favorite_symbols,
            &stored.chart_preferences,
        ],
    )?;
    Ok(())
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LedgerError> {
        let connection_string = config.require_string("postgres", "connection_string")?;
        Self::connect(
            &connection_string,
            pool_size(config, "postgres"),
            sell_policy(config)?,
        )
    }

    pub fn connect(
        connection_string: &str,
        pool_size: u32,
        sell_policy: SellPolicy,
    ) -> Result<Self, LedgerError> {
        let pg_config: postgres::Config = connection_string
            .parse()
            .map_err(|e: postgres::Error| LedgerError::ConfigInvalid {
                section: "postgres".into(),
                key: "connection_string".into(),
                reason: e.to_string(),
            })?;
        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        info!(pool_size, %sell_policy, "connected to postgres");
        Ok(Self { pool, sell_policy })
    }

    pub fn with_sell_policy(mut self, policy: SellPolicy) -> Self {
        self.sell_policy = policy;
        self
    }

    fn conn(&self) -> Result<PooledConnection<PostgresConnectionManager<NoTls>>, LedgerError> {
        self.pool.get().map_err(db_err)
    }

    pub fn initialize_schema(&self) -> Result<(), LedgerError> {
        let mut conn = self.conn()?;
        conn.batch_execute(SCHEMA).map_err(query_err)?;
        debug!("postgres schema ready");
        Ok(())
    }
}

impl LedgerPort for PostgresAdapter {
    fn create_user(&self, username: &str, email: &str) -> Result<User, LedgerError> {
        let mut conn = self.conn()?;
        let now = clock::now();
        let row = query_one(
            &mut *conn,
            &format!(
                "INSERT INTO users (username, email, created_at) VALUES ($1, $2, $3)
                 RETURNING {USER_COLUMNS}"
            ),
            &[&username, &email, &now],
        )?;
        let user = user_from_row(&row);
        info!(user_id = user.id, username, "created user");
        Ok(user)
    }

    fn get_or_create_user(&self, username: &str, email: &str) -> Result<User, LedgerError> {
        match self.find_user(username)? {
            Some(user) => Ok(user),
            None => self.create_user(username, email),
        }
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>, LedgerError> {
        let mut conn = self.conn()?;
        fetch_user(&mut *conn, user_id)
    }

    fn find_user(&self, username: &str) -> Result<Option<User>, LedgerError> {
        let mut conn = self.conn()?;
        let row = query_opt(
            &mut *conn,
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"),
            &[&username],
        )?;
        Ok(row.as_ref().map(user_from_row))
    }

    fn upsert_stock(&self, details: &StockDetails) -> Result<Stock, LedgerError> {
        let symbol = normalize_symbol(&details.symbol)?;
        let now = clock::now();
        let mut conn = self.conn()?;
        let row = query_one(
            &mut *conn,
            &format!(
                "INSERT INTO stocks (symbol, company_name, sector, industry, last_updated)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (symbol) DO UPDATE SET
                     company_name = EXCLUDED.company_name,
                     sector = EXCLUDED.sector,
                     industry = EXCLUDED.industry,
                     last_updated = EXCLUDED.last_updated
                 RETURNING {STOCK_COLUMNS}"
            ),
            &[
                &symbol,
                &details.company_name,
                &details.sector,
                &details.industry,
                &now,
            ],
        )?;
        Ok(stock_from_row(&row))
    }

    fn get_stock(&self, symbol: &str) -> Result<Option<Stock>, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let mut conn = self.conn()?;
        fetch_stock(&mut *conn, &symbol)
    }

    fn list_stocks(&self) -> Result<Vec<Stock>, LedgerError> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(&format!("SELECT {STOCK_COLUMNS} FROM stocks ORDER BY symbol"), &[])
            .map_err(query_err)?;
        Ok(rows.iter().map(stock_from_row).collect())
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
        let mut tx = conn.transaction().map_err(query_err)?;

        let user = require_user(&mut tx, user_id)?;
        let stock = get_or_create_stock(&mut tx, &trade.symbol)?;
        let portfolio = ensure_primary_portfolio(&mut tx, &user)?;

        let current = query_opt(
            &mut tx,
            "SELECT quantity, average_price FROM portfolio_items
             WHERE portfolio_id = $1 AND stock_id = $2 FOR UPDATE",
            &[&portfolio.id, &stock.id],
        )?
        .map(|row| Position {
            symbol: stock.symbol.clone(),
            quantity: row.get(0),
            average_price: row.get(1),
        });

        let plan = plan_trade(current.as_ref(), &trade, self.sell_policy).inspect_err(|e| {
            warn!(user_id, symbol = %trade.symbol, error = %e, "trade rejected");
        })?;

        let executed_at = clock::now();
        let kind_label = trade.kind.as_str();
        let row = query_one(
            &mut tx,
            "INSERT INTO transactions (user_id, stock_id, transaction_type, quantity, price, executed_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
            &[
                &user_id,
                &stock.id,
                &kind_label,
                &plan.recorded_quantity,
                &trade.price,
                &executed_at,
            ],
        )?;
        let transaction_id: i64 = row.get(0);

        let affected = match &plan.change {
            HoldingChange::Opened(pos) => execute(
                &mut tx,
                "INSERT INTO portfolio_items (portfolio_id, stock_id, quantity, average_price)
                 VALUES ($1, $2, $3, $4)",
                &[&portfolio.id, &stock.id, &pos.quantity, &pos.average_price],
            )?,
            HoldingChange::Increased(pos) | HoldingChange::Reduced(pos) => execute(
                &mut tx,
                "UPDATE portfolio_items SET quantity = $1, average_price = $2
                 WHERE portfolio_id = $3 AND stock_id = $4",
                &[&pos.quantity, &pos.average_price, &portfolio.id, &stock.id],
            )?,
            HoldingChange::Closed => execute(
                &mut tx,
                "DELETE FROM portfolio_items WHERE portfolio_id = $1 AND stock_id = $2",
                &[&portfolio.id, &stock.id],
            )?,
            HoldingChange::Unchanged => 0,
        };
        debug!(affected, "applied holding change");
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
        let mut conn = self.conn()?;
        require_user(&mut *conn, user_id)?;
        insert_portfolio(&mut *conn, user_id, name)
    }

    fn primary_portfolio(&self, user_id: i64) -> Result<Portfolio, LedgerError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(query_err)?;
        let user = require_user(&mut tx, user_id)?;
        let portfolio = ensure_primary_portfolio(&mut tx, &user)?;
        tx.commit().map_err(query_err)?;
        Ok(portfolio)
    }

    fn set_primary_portfolio(&self, user_id: i64, portfolio_id: i64) -> Result<bool, LedgerError> {
        let mut conn = self.conn()?;
        let updated = execute(
            &mut *conn,
            "UPDATE users SET primary_portfolio_id = $1
             WHERE id = $2
               AND EXISTS (SELECT 1 FROM portfolios WHERE id = $1 AND user_id = $2)",
            &[&portfolio_id, &user_id],
        )?;
        Ok(updated > 0)
    }

    fn list_portfolios(&self, user_id: i64) -> Result<Vec<Portfolio>, LedgerError> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT id, user_id, name, created_at FROM portfolios
                 WHERE user_id = $1 ORDER BY id",
                &[&user_id],
            )
            .map_err(query_err)?;
        Ok(rows.iter().map(portfolio_from_row).collect())
    }

    fn list_holdings(&self, portfolio_id: i64) -> Result<Vec<Holding>, LedgerError> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT pi.portfolio_id, pi.stock_id, s.symbol, s.company_name,
                        pi.quantity, pi.average_price
                 FROM portfolio_items pi
                 JOIN stocks s ON s.id = pi.stock_id
                 WHERE pi.portfolio_id = $1
                 ORDER BY s.symbol",
                &[&portfolio_id],
            )
            .map_err(query_err)?;
        Ok(rows
            .iter()
            .map(|row| Holding {
                portfolio_id: row.get(0),
                stock_id: row.get(1),
                symbol: row.get(2),
                company_name: row.get(3),
                quantity: row.get(4),
                average_price: row.get(5),
            })
            .collect())
    }

    fn list_transactions(
        &self,
        user_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut conn = self.conn()?;
        // LIMIT NULL is no limit.
        let limit: Option<i64> = limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX));
        let rows = conn
            .query(
                "SELECT t.id, t.user_id, t.stock_id, s.symbol, t.transaction_type,
                        t.quantity, t.price, t.executed_at
                 FROM transactions t
                 JOIN stocks s ON s.id = t.stock_id
                 WHERE t.user_id = $1
                 ORDER BY t.executed_at DESC, t.id DESC
                 LIMIT $2",
                &[&user_id, &limit],
            )
            .map_err(query_err)?;
        rows.iter().map(transaction_from_row).collect()
    }
}

impl WatchlistPort for PostgresAdapter {
    fn create_watchlist(&self, user_id: i64, name: &str) -> Result<Watchlist, LedgerError> {
        let mut conn = self.conn()?;
        require_user(&mut *conn, user_id)?;
        insert_watchlist(&mut *conn, user_id, name)
    }

    fn primary_watchlist(&self, user_id: i64) -> Result<Watchlist, LedgerError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(query_err)?;
        let user = require_user(&mut tx, user_id)?;
        let watchlist = ensure_primary_watchlist(&mut tx, &user)?;
        tx.commit().map_err(query_err)?;
        Ok(watchlist)
    }

    fn set_primary_watchlist(&self, user_id: i64, watchlist_id: i64) -> Result<bool, LedgerError> {
        let mut conn = self.conn()?;
        let updated = execute(
            &mut *conn,
            "UPDATE users SET primary_watchlist_id = $1
             WHERE id = $2
               AND EXISTS (SELECT 1 FROM watchlists WHERE id = $1 AND user_id = $2)",
            &[&watchlist_id, &user_id],
        )?;
        Ok(updated > 0)
    }

    fn list_watchlists(&self, user_id: i64) -> Result<Vec<Watchlist>, LedgerError> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT id, user_id, name, created_at FROM watchlists
                 WHERE user_id = $1 ORDER BY id",
                &[&user_id],
            )
            .map_err(query_err)?;
        Ok(rows.iter().map(watchlist_from_row).collect())
    }

    fn list_watchlist_stocks(&self, watchlist_id: i64) -> Result<Vec<WatchlistEntry>, LedgerError> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT wi.watchlist_id, wi.stock_id, s.symbol, s.company_name, wi.added_at
                 FROM watchlist_items wi
                 JOIN stocks s ON s.id = wi.stock_id
                 WHERE wi.watchlist_id = $1
                 ORDER BY wi.id",
                &[&watchlist_id],
            )
            .map_err(query_err)?;
        Ok(rows
            .iter()
            .map(|row| WatchlistEntry {
                watchlist_id: row.get(0),
                stock_id: row.get(1),
                symbol: row.get(2),
                company_name: row.get(3),
                added_at: row.get(4),
            })
            .collect())
    }

    fn add_to_watchlist(&self, watchlist_id: i64, symbol: &str) -> Result<bool, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(query_err)?;

        if fetch_watchlist(&mut tx, watchlist_id)?.is_none() {
            debug!(watchlist_id, "watchlist not found");
            return Ok(false);
        }

        let stock = get_or_create_stock(&mut tx, &symbol)?;
        let now = clock::now();
        let inserted = execute(
            &mut tx,
            "INSERT INTO watchlist_items (watchlist_id, stock_id, added_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (watchlist_id, stock_id) DO NOTHING",
            &[&watchlist_id, &stock.id, &now],
        )?;
        tx.commit().map_err(query_err)?;

        if inserted > 0 {
            info!(watchlist_id, symbol = %symbol, "added to watchlist");
        }
        Ok(inserted > 0)
    }

    fn remove_from_watchlist(&self, watchlist_id: i64, symbol: &str) -> Result<bool, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let mut conn = self.conn()?;
        let removed = execute(
            &mut *conn,
            "DELETE FROM watchlist_items wi
             USING stocks s
             WHERE s.id = wi.stock_id AND wi.watchlist_id = $1 AND s.symbol = $2",
            &[&watchlist_id, &symbol],
        )?;
        if removed > 0 {
            info!(watchlist_id, symbol = %symbol, "removed from watchlist");
        }
        Ok(removed > 0)
    }

    fn delete_watchlist(&self, watchlist_id: i64) -> Result<bool, LedgerError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(query_err)?;
        execute(
            &mut tx,
            "UPDATE users SET primary_watchlist_id = NULL WHERE primary_watchlist_id = $1",
            &[&watchlist_id],
        )?;
        execute(
            &mut tx,
            "DELETE FROM watchlist_items WHERE watchlist_id = $1",
            &[&watchlist_id],
        )?;
        let deleted = execute(&mut tx, "DELETE FROM watchlists WHERE id = $1", &[&watchlist_id])?;
        tx.commit().map_err(query_err)?;
        if deleted > 0 {
            info!(watchlist_id, "deleted watchlist");
        }
        Ok(deleted > 0)
    }
}

impl AlertPort for PostgresAdapter {
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
        let mut tx = conn.transaction().map_err(query_err)?;
        require_user(&mut tx, user_id)?;
        let stock = get_or_create_stock(&mut tx, &symbol)?;
        let created_at = clock::now();
        let label = kind.label();
        let row = query_one(
            &mut tx,
            "INSERT INTO alerts (user_id, stock_id, alert_type, value, active, created_at)
             VALUES ($1, $2, $3, $4, TRUE, $5)
             RETURNING id",
            &[&user_id, &stock.id, &label, &value, &created_at],
        )?;
        let id: i64 = row.get(0);
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
        let mut conn = self.conn()?;
        let removed = execute(&mut *conn, "DELETE FROM alerts WHERE id = $1", &[&alert_id])?;
        Ok(removed > 0)
    }

    fn set_alert_active(&self, alert_id: i64, active: bool) -> Result<bool, LedgerError> {
        let mut conn = self.conn()?;
        let updated = execute(
            &mut *conn,
            "UPDATE alerts SET active = $1 WHERE id = $2",
            &[&active, &alert_id],
        )?;
        Ok(updated > 0)
    }

    fn list_active_alerts(&self, user_id: i64) -> Result<Vec<Alert>, LedgerError> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT a.id, a.user_id, a.stock_id, s.symbol, a.alert_type,
                        a.value, a.active, a.created_at
                 FROM alerts a
                 JOIN stocks s ON s.id = a.stock_id
                 WHERE a.user_id = $1 AND a.active
                 ORDER BY a.id",
                &[&user_id],
            )
            .map_err(query_err)?;
        rows.iter().map(alert_from_row).collect()
    }
}

impl PreferencePort for PostgresAdapter {
    fn get_preferences(&self, user_id: i64) -> Result<Preferences, LedgerError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(query_err)?;
        require_user(&mut tx, user_id)?;

        let stored = match fetch_stored_preferences(&mut tx, user_id)? {
            Some(stored) => stored,
            None => {
                info!(user_id, "creating default preferences");
                insert_default_preferences(&mut tx, user_id)?;
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
        let mut tx = conn.transaction().map_err(query_err)?;
        require_user(&mut tx, user_id)?;

        insert_default_preferences(&mut tx, user_id)?;
        execute(
            &mut tx,
            "UPDATE user_preferences SET
                 theme = COALESCE($1, theme),
                 default_app = COALESCE($2, default_app),
                 favorite_symbols = COALESCE($3, favorite_symbols),
                 chart_preferences = COALESCE($4, chart_preferences)
             WHERE user_id = $5",
            &[
                &values.theme,
                &values.default_app,
                &values.favorite_symbols,
                &values.chart_preferences,
                &user_id,
            ],
        )?;
        tx.commit().map_err(query_err)?;

        info!(user_id, "updated preferences");
        Ok(())
    }
}
