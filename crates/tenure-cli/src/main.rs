//! tenure: administrative CLI for the subscription ledger database.
//!
//! Usage:
//!   tenure dump                          - Dump all tables as JSON
//!   tenure show <pubkey>                 - Show one account and its standing
//!   tenure erase <pubkey> --yes          - Erase an account entirely
//!   tenure set-token <pubkey> <token>    - Override a correlation token

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use tenure_db::{LedgerStore, SqliteStore};
use tenure_ledger::{Ledger, LedgerConfig};

#[derive(Parser)]
#[command(name = "tenure", about = "Subscription ledger administration")]
struct Cli {
    /// Path to the SQLite database.
    #[arg(long, default_value = "tenure.db")]
    db: PathBuf,

    /// Optional TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dump every table as pretty-printed JSON.
    Dump,
    /// Show one account, its number, computed expiry, and standing.
    Show {
        /// The account's identity.
        pubkey: String,
    },
    /// Erase an account: record, index entry, and correlation token.
    Erase {
        /// The account's identity.
        pubkey: String,
        /// Confirm the erase.
        #[arg(long)]
        yes: bool,
    },
    /// Override an identity's correlation token.
    SetToken {
        /// The identity to re-seed.
        pubkey: String,
        /// The token to store verbatim.
        token: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tenure=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LedgerConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => LedgerConfig::load().context("loading config")?,
    };
    let store = SqliteStore::open(&cli.db)
        .with_context(|| format!("opening database {}", cli.db.display()))?;
    tracing::debug!(db = %cli.db.display(), "database opened");
    let ledger = Ledger::with_config(store, config);

    match cli.command {
        Command::Dump => dump(&ledger),
        Command::Show { pubkey } => show(&ledger, &pubkey),
        Command::Erase { pubkey, yes } => erase(&ledger, &pubkey, yes),
        Command::SetToken { pubkey, token } => {
            ledger.force_set_token(&pubkey, &token)?;
            println!("token for {pubkey} set");
            Ok(())
        }
    }
}

/// Dump all three tables, keyed the way they are stored.
fn dump(ledger: &Ledger<SqliteStore>) -> anyhow::Result<()> {
    let store = ledger.store();

    let mut accounts = serde_json::Map::new();
    for (number, record) in store.scan_accounts()? {
        // Records are stored as JSON text; fall back to the raw string for
        // rows that no longer parse.
        let value = serde_json::from_str(&record)
            .unwrap_or_else(|_| serde_json::Value::String(record));
        accounts.insert(number.to_string(), value);
    }

    let mut index = serde_json::Map::new();
    for (identity, number) in store.scan_account_numbers()? {
        index.insert(identity, number.into());
    }

    let mut tokens = serde_json::Map::new();
    for (identity, token) in store.scan_identity_tokens()? {
        tokens.insert(identity, token.into());
    }

    let dump = serde_json::json!({
        "accounts": accounts,
        "account_index": index,
        "identity_tokens": tokens,
    });
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}

fn show(ledger: &Ledger<SqliteStore>, pubkey: &str) -> anyhow::Result<()> {
    let Some((number, account)) = ledger.resolve(pubkey)? else {
        anyhow::bail!("no account for {pubkey}");
    };
    let info = ledger.info_view(&account, number, false);
    let standing = ledger.is_active(pubkey)?;
    let view = serde_json::json!({
        "info": info,
        "transactions": account.transactions,
        "last_history_refresh": account.last_history_refresh,
        "standing_reason": standing.reason(),
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn erase(ledger: &Ledger<SqliteStore>, pubkey: &str, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("refusing to erase {pubkey} without --yes");
    }
    ledger
        .erase(pubkey)
        .with_context(|| format!("erasing {pubkey}"))?;
    println!("account for {pubkey} erased");
    Ok(())
}
