//! CLI integration tests.
//!
//! Tests cover:
//! - Config loading from INI files on disk
//! - Store selection and schema creation
//! - Command dispatch against a file-backed SQLite store
//! - Exit codes for configuration and input errors

mod common;

use clap::Parser;
use stockledger::adapters::file_config_adapter::FileConfigAdapter;
use stockledger::cli::{self, Cli};
use stockledger::domain::error::LedgerError;
use stockledger::ports::config_port::ConfigPort;
use stockledger::ports::LedgerStore;
use std::io::Write;
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn sqlite_config(dir: &TempDir, extra: &str) -> FileConfigAdapter {
    let path = dir.path().join("ledger.db");
    let ini = format!(
        "[database]\nbackend = sqlite\n\n[sqlite]\npath = {}\npool_size = 2\n{extra}",
        path.display()
    );
    FileConfigAdapter::from_string(&ini).unwrap()
}

fn open(dir: &TempDir, extra: &str) -> Box<dyn LedgerStore> {
    cli::open_store(&sqlite_config(dir, extra)).unwrap()
}

/// Parse `args` as a command line and run it, returning stdout.
fn exec(store: &dyn LedgerStore, args: &[&str]) -> Result<String, LedgerError> {
    let mut argv = vec!["stockledger"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let mut out = Vec::new();
    cli::execute(cli.command, store, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

mod config_loading {
    use super::*;

    #[test]
    fn load_config_reads_file() {
        let file = write_temp_ini("[ledger]\nsell_policy = record\n");
        let config = cli::load_config(Some(file.path())).unwrap();
        assert_eq!(
            config.get_string("ledger", "sell_policy"),
            Some("record".to_string())
        );
    }

    #[test]
    fn load_config_missing_file_is_config_error() {
        let result = cli::load_config(Some(std::path::Path::new("/nonexistent/ledger.ini")));
        assert_eq!(result.err(), Some(ExitCode::from(2)));
    }

    #[test]
    fn open_store_creates_database_file() {
        let dir = TempDir::new().unwrap();
        let _store = open(&dir, "");
        assert!(dir.path().join("ledger.db").exists());
    }

    #[test]
    fn unknown_backend_rejected() {
        let config = FileConfigAdapter::from_string("[database]\nbackend = oracle\n").unwrap();
        let err = cli::open_store(&config).err().unwrap();
        assert!(matches!(err, LedgerError::ConfigInvalid { .. }));
    }

    #[test]
    fn run_exits_with_config_code_on_bad_policy() {
        let file = write_temp_ini("[ledger]\nsell_policy = yolo\n");
        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::try_parse_from(["stockledger", "--config", path.as_str(), "init"]).unwrap();
        assert_eq!(cli::run(cli), ExitCode::from(2));
    }

    #[test]
    fn run_exits_with_config_code_on_missing_file() {
        let cli =
            Cli::try_parse_from(["stockledger", "-c", "/nonexistent/ledger.ini", "init"]).unwrap();
        assert_eq!(cli::run(cli), ExitCode::from(2));
    }
}

mod commands {
    use super::*;

    #[test]
    fn trading_session() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "");

        exec(store.as_ref(), &["user", "create", "alice", "alice@example.com"]).unwrap();
        let out = exec(store.as_ref(), &["buy", "alice", "x", "10", "100"]).unwrap();
        assert!(out.contains("Buy 10 X @ 100.00"), "{out}");
        let out = exec(store.as_ref(), &["buy", "alice", "X", "5", "130"]).unwrap();
        assert!(out.contains("holding: 15 @ avg 110.00"), "{out}");

        let out = exec(store.as_ref(), &["portfolio", "alice", "--price", "X=120"]).unwrap();
        assert!(out.contains("My Portfolio"), "{out}");
        assert!(out.contains("invested 1650.00, value 1800.00, P&L 150.00"), "{out}");

        let out = exec(store.as_ref(), &["sell", "alice", "X", "15", "120"]).unwrap();
        assert!(out.contains("holding: closed"), "{out}");

        let err = exec(store.as_ref(), &["sell", "alice", "X", "1", "120"]).unwrap_err();
        assert_eq!(ExitCode::from(&err), ExitCode::from(4));

        let out = exec(store.as_ref(), &["transactions", "alice"]).unwrap();
        assert_eq!(out.lines().count(), 3);
        let out = exec(store.as_ref(), &["transactions", "alice", "--limit", "1"]).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("Sell"), "{out}");
    }

    #[test]
    fn unknown_user_exits_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "");
        let err = exec(store.as_ref(), &["portfolio", "ghost"]).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownUsername { .. }));
        assert_eq!(ExitCode::from(&err), ExitCode::from(5));
    }

    #[test]
    fn clamp_policy_from_config() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "\n[ledger]\nsell_policy = clamp\n");
        exec(store.as_ref(), &["user", "create", "bob", "bob@example.com"]).unwrap();
        exec(store.as_ref(), &["buy", "bob", "AMD", "2", "100"]).unwrap();
        let out = exec(store.as_ref(), &["sell", "bob", "AMD", "5", "110"]).unwrap();
        assert!(out.contains("Sell 2 AMD"), "{out}");
    }

    #[test]
    fn watchlist_commands() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "");
        exec(store.as_ref(), &["user", "create", "carol", "carol@example.com"]).unwrap();

        let out = exec(store.as_ref(), &["watchlist", "add", "carol", "aapl"]).unwrap();
        assert!(out.contains("added AAPL to My Watchlist"), "{out}");
        let out = exec(store.as_ref(), &["watchlist", "add", "carol", "AAPL"]).unwrap();
        assert!(out.contains("already on"), "{out}");

        let out = exec(store.as_ref(), &["watchlist", "list", "carol"]).unwrap();
        assert!(out.contains("AAPL"), "{out}");

        let out = exec(store.as_ref(), &["watchlist", "create", "carol", "Tech", "--primary"]).unwrap();
        assert!(out.contains("created watchlist Tech"), "{out}");
        let out = exec(store.as_ref(), &["watchlist", "list", "carol"]).unwrap();
        assert!(out.starts_with("Tech"), "{out}");

        let out = exec(store.as_ref(), &["watchlist", "remove", "carol", "AAPL", "-w", "1"]).unwrap();
        assert!(out.contains("removed AAPL"), "{out}");

        let err = exec(store.as_ref(), &["watchlist", "delete", "carol", "999"]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { .. }));
    }

    #[test]
    fn alert_commands() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "");
        exec(store.as_ref(), &["user", "create", "dan", "dan@example.com"]).unwrap();

        let out = exec(store.as_ref(), &["alert", "add", "dan", "tsla", "pct-change", "5"]).unwrap();
        assert!(out.contains("TSLA % Change 5"), "{out}");
        assert_eq!(exec(store.as_ref(), &["alert", "disable", "1"]).unwrap(), "disabled\n");
        assert_eq!(
            exec(store.as_ref(), &["alert", "list", "dan"]).unwrap(),
            "no active alerts\n"
        );
        assert_eq!(exec(store.as_ref(), &["alert", "enable", "1"]).unwrap(), "enabled\n");
        assert_eq!(exec(store.as_ref(), &["alert", "delete", "1"]).unwrap(), "deleted\n");
        assert_eq!(
            exec(store.as_ref(), &["alert", "delete", "1"]).unwrap(),
            "no such alert\n"
        );
    }

    #[test]
    fn prefs_commands() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "");
        exec(store.as_ref(), &["user", "create", "erin", "erin@example.com"]).unwrap();

        let out = exec(store.as_ref(), &["prefs", "show", "erin"]).unwrap();
        assert!(out.contains("theme:       light"), "{out}");
        assert!(out.contains("favorites:   AAPL, MSFT, GOOGL"), "{out}");

        exec(
            store.as_ref(),
            &["prefs", "set", "erin", "--theme", "dark", "--favorites", "nvda,amd"],
        )
        .unwrap();
        let out = exec(store.as_ref(), &["prefs", "show", "erin"]).unwrap();
        assert!(out.contains("theme:       dark"), "{out}");
        assert!(out.contains("favorites:   NVDA, AMD"), "{out}");

        let err = exec(store.as_ref(), &["prefs", "set", "erin"]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { .. }));

        let err = exec(store.as_ref(), &["prefs", "set", "erin", "--chart", "{nope"]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { .. }));
    }

    #[test]
    fn export_to_file() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "");
        exec(store.as_ref(), &["init", "--demo"]).unwrap();

        let holdings_path = dir.path().join("holdings.csv");
        let out = exec(
            store.as_ref(),
            &["export", "holdings", "demo_user", "-o", holdings_path.to_str().unwrap()],
        )
        .unwrap();
        assert!(out.is_empty());
        let csv = std::fs::read_to_string(&holdings_path).unwrap();
        assert!(csv.starts_with("symbol,company_name,quantity,average_price,invested\n"));
        assert_eq!(csv.lines().count(), 5);

        let out = exec(store.as_ref(), &["export", "transactions", "demo_user"]).unwrap();
        assert!(out.starts_with("date,symbol,type,quantity,price,total_value\n"), "{out}");
        assert_eq!(out.lines().count(), 5);
    }

    #[test]
    fn init_demo_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "");
        let out = exec(store.as_ref(), &["init", "--demo"]).unwrap();
        assert!(out.contains("seeded demo user demo_user"), "{out}");
        let out = exec(store.as_ref(), &["init", "--demo"]).unwrap();
        assert!(out.contains("demo data already present"), "{out}");

        let out = exec(store.as_ref(), &["user", "show", "demo_user"]).unwrap();
        assert!(out.contains("portfolios: 1"), "{out}");
    }
}
