//! SQLite-backed store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, TransactionBehavior};
use tenure_types::AccountNumber;

use crate::store::LedgerStore;
use crate::{migrations, DbError, Result};

/// Name of the account-number sequence in the counters table.
const ACCOUNT_SEQUENCE: &str = "account_number";

/// A [`LedgerStore`] backed by a single SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    ///
    /// Configures WAL mode and runs any pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        configure(&conn)?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

impl LedgerStore for SqliteStore {
    fn get_account(&self, number: AccountNumber) -> Result<Option<String>> {
        let conn = self.lock();
        match conn.query_row(
            "SELECT record FROM accounts WHERE number = ?1",
            [number as i64],
            |row| row.get(0),
        ) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::Sqlite(e)),
        }
    }

    fn put_account(&self, number: AccountNumber, record: &str) -> Result<()> {
        self.lock().execute(
            "INSERT OR REPLACE INTO accounts (number, record) VALUES (?1, ?2)",
            rusqlite::params![number as i64, record],
        )?;
        Ok(())
    }

    fn delete_account(&self, number: AccountNumber) -> Result<()> {
        self.lock().execute(
            "DELETE FROM accounts WHERE number = ?1",
            [number as i64],
        )?;
        Ok(())
    }

    fn scan_accounts(&self) -> Result<Vec<(AccountNumber, String)>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT number, record FROM accounts ORDER BY number ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_account_number(&self, identity: &str) -> Result<Option<AccountNumber>> {
        let conn = self.lock();
        match conn.query_row(
            "SELECT number FROM account_index WHERE identity = ?1",
            [identity],
            |row| row.get::<_, i64>(0),
        ) {
            Ok(number) => Ok(Some(number as u64)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::Sqlite(e)),
        }
    }

    fn put_account_number(&self, identity: &str, number: AccountNumber) -> Result<()> {
        self.lock().execute(
            "INSERT OR REPLACE INTO account_index (identity, number) VALUES (?1, ?2)",
            rusqlite::params![identity, number as i64],
        )?;
        Ok(())
    }

    fn delete_account_number(&self, identity: &str) -> Result<()> {
        self.lock().execute(
            "DELETE FROM account_index WHERE identity = ?1",
            [identity],
        )?;
        Ok(())
    }

    fn scan_account_numbers(&self) -> Result<Vec<(String, AccountNumber)>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT identity, number FROM account_index ORDER BY identity ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_identity_token(&self, identity: &str) -> Result<Option<String>> {
        let conn = self.lock();
        match conn.query_row(
            "SELECT token FROM identity_tokens WHERE identity = ?1",
            [identity],
            |row| row.get(0),
        ) {
            Ok(token) => Ok(Some(token)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::Sqlite(e)),
        }
    }

    fn put_identity_token(&self, identity: &str, token: &str) -> Result<()> {
        self.lock().execute(
            "INSERT OR REPLACE INTO identity_tokens (identity, token) VALUES (?1, ?2)",
            rusqlite::params![identity, token],
        )?;
        Ok(())
    }

    fn delete_identity_token(&self, identity: &str) -> Result<()> {
        self.lock().execute(
            "DELETE FROM identity_tokens WHERE identity = ?1",
            [identity],
        )?;
        Ok(())
    }

    fn scan_identity_tokens(&self) -> Result<Vec<(String, String)>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT identity, token FROM identity_tokens ORDER BY identity ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn allocate_account_number(&self) -> Result<AccountNumber> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored: Option<i64> = match tx.query_row(
            "SELECT value FROM counters WHERE name = ?1",
            [ACCOUNT_SEQUENCE],
            |row| row.get(0),
        ) {
            Ok(value) => Some(value),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(DbError::Sqlite(e)),
        };

        let current = match stored {
            Some(value) => value,
            // First allocation on this database: seed from the highest
            // number already in use (snapshot-restore bootstrap).
            None => tx.query_row(
                "SELECT COALESCE(MAX(number), 0) FROM accounts",
                [],
                |row| row.get(0),
            )?,
        };

        let next = current + 1;
        tx.execute(
            "INSERT OR REPLACE INTO counters (name, value) VALUES (?1, ?2)",
            rusqlite::params![ACCOUNT_SEQUENCE, next],
        )?;
        tx.commit()?;
        Ok(next as u64)
    }
}
