//! Wallet handle and in-memory record store.
//!
//! A `Wallet` is an explicit, caller-owned resource with an open/close
//! lifecycle, acquired once per agent identity and shared (`Arc`) by every
//! protocol service. It is never recreated implicitly behind a global.

use crate::core::{Error, Result};
use crate::records::{RecordKind, TagMap, WalletRecord};
use crate::store::SearchQuery;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Configuration for opening a wallet.
#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// Wallet name, scoping all records to one agent identity.
    pub name: String,
}

impl WalletConfig {
    /// Create a configuration for the named wallet.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// One persisted record: body, tag projection, insertion sequence.
#[derive(Clone, Debug)]
struct StoredEntry {
    seq: u64,
    body: serde_json::Value,
    tags: TagMap,
}

#[derive(Default)]
struct StoreInner {
    next_seq: u64,
    records: HashMap<RecordKind, HashMap<String, StoredEntry>>,
}

/// Handle to an agent wallet's record store.
///
/// All operations are safe for concurrent use across unrelated record ids.
/// Sequences of load, trigger, persist against the *same* id must run under
/// the guard returned by [`Wallet::lock_record`]; the store itself only
/// guarantees that each individual add/update is atomic (body and tags as
/// one unit).
pub struct Wallet {
    name: String,
    inner: RwLock<StoreInner>,
    locks: Mutex<HashMap<(RecordKind, String), Arc<Mutex<()>>>>,
    open: AtomicBool,
}

impl Wallet {
    /// Open a wallet for the given configuration.
    pub async fn open(config: WalletConfig) -> Result<Self> {
        Ok(Self {
            name: config.name,
            inner: RwLock::new(StoreInner::default()),
            locks: Mutex::new(HashMap::new()),
            open: AtomicBool::new(true),
        })
    }

    /// Wallet name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Close the wallet; subsequent operations fail with `WalletClosed`.
    pub async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::WalletClosed)
        }
    }

    /// Add a new record. Fails with `DuplicateId` if the id exists.
    pub async fn add<R: WalletRecord>(&self, record: &R) -> Result<()> {
        self.ensure_open()?;
        let body = serde_json::to_value(record)?;
        let tags = record.tags();

        let mut inner = self.inner.write().await;
        let kind_records = inner.records.entry(R::KIND).or_default();
        if kind_records.contains_key(record.id()) {
            return Err(Error::DuplicateId(record.id().to_string()));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .records
            .entry(R::KIND)
            .or_default()
            .insert(record.id().to_string(), StoredEntry { seq, body, tags });
        Ok(())
    }

    /// Get a record by id. Fails with `NotFound` if absent.
    pub async fn get<R: WalletRecord>(&self, id: &str) -> Result<R> {
        self.ensure_open()?;
        let inner = self.inner.read().await;
        let entry = inner
            .records
            .get(&R::KIND)
            .and_then(|records| records.get(id))
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(serde_json::from_value(entry.body.clone())?)
    }

    /// Overwrite a record and its tag projection atomically.
    /// Fails with `NotFound` if the id does not exist.
    pub async fn update<R: WalletRecord>(&self, record: &R) -> Result<()> {
        self.ensure_open()?;
        let body = serde_json::to_value(record)?;
        let tags = record.tags();

        let mut inner = self.inner.write().await;
        let entry = inner
            .records
            .get_mut(&R::KIND)
            .and_then(|records| records.get_mut(record.id()))
            .ok_or_else(|| Error::NotFound(record.id().to_string()))?;
        entry.body = body;
        entry.tags = tags;
        Ok(())
    }

    /// Search records whose tags satisfy the query, in insertion order,
    /// truncated at `limit`. Zero matches is an empty vec, never an error.
    pub async fn search<R: WalletRecord>(
        &self,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<R>> {
        self.ensure_open()?;
        let inner = self.inner.read().await;
        let mut matches: Vec<&StoredEntry> = inner
            .records
            .get(&R::KIND)
            .map(|records| {
                records
                    .values()
                    .filter(|entry| query.matches(&entry.tags))
                    .collect()
            })
            .unwrap_or_default();
        matches.sort_by_key(|entry| entry.seq);

        matches
            .into_iter()
            .take(limit)
            .map(|entry| serde_json::from_value(entry.body.clone()).map_err(Error::from))
            .collect()
    }

    /// Search expecting exactly one match.
    ///
    /// Zero matches fails with `NotFound`; more than one fails with
    /// `AmbiguousMatch` instead of silently picking a record.
    pub async fn search_single<R: WalletRecord>(&self, query: &SearchQuery) -> Result<R> {
        let mut matches = self.search::<R>(query, 2).await?;
        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(Error::NotFound(format!(
                "no {} record matching query",
                R::KIND
            ))),
            n => Err(Error::AmbiguousMatch(n)),
        }
    }

    /// Acquire the per-record-id mutex.
    ///
    /// Protocol services hold this guard across one full load, apply
    /// trigger, persist sequence so that concurrent handlers racing on the
    /// same record serialize instead of losing an update to a stale read.
    /// Operations on different ids are unaffected.
    pub async fn lock_record(&self, kind: RecordKind, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop registry entries no guard or waiter still references, so
            // the map does not grow with every id ever locked.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((kind, id.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ConnectionRecord, CredentialRecord};

    async fn wallet() -> Wallet {
        Wallet::open(WalletConfig::new("test")).await.unwrap()
    }

    #[tokio::test]
    async fn test_add_and_get_roundtrip() {
        let wallet = wallet().await;
        let record = ConnectionRecord::new("did:pactum:alice", "alice-vk");
        wallet.add(&record).await.unwrap();

        let loaded: ConnectionRecord = wallet.get(&record.id).await.unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.my_verkey, "alice-vk");
    }

    #[tokio::test]
    async fn test_add_duplicate_id_fails() {
        let wallet = wallet().await;
        let record = ConnectionRecord::new("did:pactum:alice", "alice-vk");
        wallet.add(&record).await.unwrap();

        let err = wallet.add(&record).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateId(_)));
    }

    #[tokio::test]
    async fn test_get_missing_fails_not_found() {
        let wallet = wallet().await;
        let err = wallet.get::<ConnectionRecord>("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_missing_fails_not_found() {
        let wallet = wallet().await;
        let record = ConnectionRecord::new("did:pactum:alice", "alice-vk");
        let err = wallet.update(&record).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_rewrites_tags_with_body() {
        let wallet = wallet().await;
        let mut record = CredentialRecord::new("conn-1", "def-1", "{}");
        wallet.add(&record).await.unwrap();

        record.nonce = Some("42".to_string());
        wallet.update(&record).await.unwrap();

        let by_nonce = wallet
            .search::<CredentialRecord>(&SearchQuery::new().eq("nonce", "42"), 10)
            .await
            .unwrap();
        assert_eq!(by_nonce.len(), 1);
        assert_eq!(by_nonce[0].id, record.id);
    }

    #[tokio::test]
    async fn test_search_empty_store_returns_empty() {
        let wallet = wallet().await;
        let results = wallet
            .search::<CredentialRecord>(&SearchQuery::new().eq("nonce", "42"), 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_insertion_order_and_limit() {
        let wallet = wallet().await;
        let mut ids = Vec::new();
        for _ in 0..5 {
            let record = CredentialRecord::new("conn-1", "def-1", "{}");
            ids.push(record.id.clone());
            wallet.add(&record).await.unwrap();
        }

        let results = wallet
            .search::<CredentialRecord>(&SearchQuery::new().eq("connectionId", "conn-1"), 3)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        let found: Vec<String> = results.into_iter().map(|r| r.id).collect();
        assert_eq!(found, ids[..3].to_vec());
    }

    #[tokio::test]
    async fn test_search_is_scoped_per_kind() {
        let wallet = wallet().await;
        wallet
            .add(&ConnectionRecord::new("did:pactum:alice", "alice-vk"))
            .await
            .unwrap();

        let results = wallet
            .search::<CredentialRecord>(&SearchQuery::new(), 10)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_single_detects_ambiguity() {
        let wallet = wallet().await;
        for _ in 0..2 {
            let mut record = CredentialRecord::new("conn-1", "def-1", "{}");
            record.nonce = Some("42".to_string());
            wallet.add(&record).await.unwrap();
        }

        let err = wallet
            .search_single::<CredentialRecord>(&SearchQuery::new().eq("nonce", "42"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousMatch(2)));
    }

    #[tokio::test]
    async fn test_search_single_zero_matches_is_not_found() {
        let wallet = wallet().await;
        let err = wallet
            .search_single::<CredentialRecord>(&SearchQuery::new().eq("nonce", "42"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_closed_wallet_rejects_operations() {
        let wallet = wallet().await;
        wallet.close().await;

        let record = ConnectionRecord::new("did:pactum:alice", "alice-vk");
        assert!(matches!(
            wallet.add(&record).await.unwrap_err(),
            Error::WalletClosed
        ));
    }

    #[tokio::test]
    async fn test_lock_registry_prunes_released_entries() {
        let wallet = wallet().await;

        for i in 0..100 {
            let id = format!("record-{i}");
            let guard = wallet
                .lock_record(crate::records::RecordKind::Connection, &id)
                .await;
            drop(guard);
        }

        // Acquiring a fresh lock sweeps out the released entries.
        let _guard = wallet
            .lock_record(crate::records::RecordKind::Connection, "live")
            .await;
        let locks = wallet.locks.lock().await;
        assert_eq!(locks.len(), 1);
        assert!(locks.contains_key(&(
            crate::records::RecordKind::Connection,
            "live".to_string()
        )));
    }

    #[tokio::test]
    async fn test_lock_record_serializes_same_id_writers() {
        use crate::fsm::Stateful;
        use crate::records::{ConnectionState, ConnectionTrigger};

        let wallet = Arc::new(wallet().await);
        let record = ConnectionRecord::new("did:pactum:alice", "alice-vk");
        let id = record.id.clone();
        wallet.add(&record).await.unwrap();

        // Two tasks race a load -> apply(InvitationAccept) -> persist cycle
        // on the same record. Exactly one may win; under the per-id lock the
        // loser observes Negotiating and fails the trigger instead of
        // overwriting from a stale read.
        let mut handles = Vec::new();
        for _ in 0..2 {
            let wallet = wallet.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let _guard = wallet
                    .lock_record(crate::records::RecordKind::Connection, &id)
                    .await;
                let mut record: ConnectionRecord = wallet.get(&id).await.unwrap();
                let table = ConnectionRecord::transitions();
                match table.apply(&mut record, ConnectionTrigger::InvitationAccept) {
                    Ok(_) => {
                        wallet.update(&record).await.unwrap();
                        true
                    }
                    Err(_) => false,
                }
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);

        let final_record: ConnectionRecord = wallet.get(&id).await.unwrap();
        assert_eq!(final_record.state(), ConnectionState::Negotiating);
    }
}
