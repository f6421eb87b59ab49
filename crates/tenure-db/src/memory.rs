//! In-memory store backed by ordered maps.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tenure_types::AccountNumber;

use crate::store::LedgerStore;
use crate::Result;

/// A [`LedgerStore`] held entirely in memory.
///
/// Used by tests and ephemeral deployments. All tables live behind one
/// mutex, which also makes number allocation trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: BTreeMap<AccountNumber, String>,
    index: BTreeMap<String, AccountNumber>,
    tokens: BTreeMap<String, String>,
    /// Last allocated number; seeded lazily from the account table.
    sequence: Option<AccountNumber>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LedgerStore for MemoryStore {
    fn get_account(&self, number: AccountNumber) -> Result<Option<String>> {
        Ok(self.lock().accounts.get(&number).cloned())
    }

    fn put_account(&self, number: AccountNumber, record: &str) -> Result<()> {
        self.lock().accounts.insert(number, record.to_string());
        Ok(())
    }

    fn delete_account(&self, number: AccountNumber) -> Result<()> {
        self.lock().accounts.remove(&number);
        Ok(())
    }

    fn scan_accounts(&self) -> Result<Vec<(AccountNumber, String)>> {
        Ok(self
            .lock()
            .accounts
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }

    fn get_account_number(&self, identity: &str) -> Result<Option<AccountNumber>> {
        Ok(self.lock().index.get(identity).copied())
    }

    fn put_account_number(&self, identity: &str, number: AccountNumber) -> Result<()> {
        self.lock().index.insert(identity.to_string(), number);
        Ok(())
    }

    fn delete_account_number(&self, identity: &str) -> Result<()> {
        self.lock().index.remove(identity);
        Ok(())
    }

    fn scan_account_numbers(&self) -> Result<Vec<(String, AccountNumber)>> {
        Ok(self
            .lock()
            .index
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    fn get_identity_token(&self, identity: &str) -> Result<Option<String>> {
        Ok(self.lock().tokens.get(identity).cloned())
    }

    fn put_identity_token(&self, identity: &str, token: &str) -> Result<()> {
        self.lock()
            .tokens
            .insert(identity.to_string(), token.to_string());
        Ok(())
    }

    fn delete_identity_token(&self, identity: &str) -> Result<()> {
        self.lock().tokens.remove(identity);
        Ok(())
    }

    fn scan_identity_tokens(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .lock()
            .tokens
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn allocate_account_number(&self) -> Result<AccountNumber> {
        let mut inner = self.lock();
        let current = match inner.sequence {
            Some(n) => n,
            None => inner
                .accounts
                .last_key_value()
                .map(|(k, _)| *k)
                .unwrap_or(0),
        };
        let next = current + 1;
        inner.sequence = Some(next);
        Ok(next)
    }
}
