//! In-process target store.
//!
//! Each target lives in its own slot behind a mutex, so appends to one target
//! are serialized while different targets proceed independently. The map of
//! slots is only write-locked for inserts and deletes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::StoreError;
use super::models::{Target, TargetUpdate};
use super::repository::TargetStore;
use crate::monitoring::ledger::{HistoryLedger, HistoryPage, PageRequest};
use crate::monitoring::types::CheckResult;

struct Slot {
    seq: u64,
    target: Target,
    ledger: HistoryLedger,
}

#[derive(Default)]
struct Registry {
    slots: HashMap<Uuid, Arc<Mutex<Slot>>>,
    by_address: HashMap<(String, String), Uuid>,
}

pub struct MemoryStore {
    registry: RwLock<Registry>,
    next_seq: AtomicU64,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            next_seq: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    async fn slot(&self, id: Uuid) -> Option<Arc<Mutex<Slot>>> {
        self.registry.read().await.slots.get(&id).cloned()
    }

    /// Snapshot the targets matching `filter`, ordered by insertion
    async fn collect_targets<F>(&self, filter: F) -> Vec<Target>
    where
        F: Fn(&Target) -> bool,
    {
        let slots: Vec<Arc<Mutex<Slot>>> =
            self.registry.read().await.slots.values().cloned().collect();

        let mut found = Vec::with_capacity(slots.len());
        for slot in slots {
            let slot = slot.lock().await;
            if filter(&slot.target) {
                found.push((slot.seq, slot.target.clone()));
            }
        }

        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, target)| target).collect()
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn insert_target(&self, target: &Target, initial: &CheckResult) -> Result<(), StoreError> {
        let mut registry = self.registry.write().await;

        let key = (target.owner.clone(), target.address.clone());
        if registry.by_address.contains_key(&key) || registry.slots.contains_key(&target.id) {
            return Err(StoreError::Conflict);
        }

        let mut ledger = HistoryLedger::new(self.capacity);
        ledger.append(initial.clone());

        let slot = Slot {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            target: target.clone(),
            ledger,
        };
        registry.by_address.insert(key, target.id);
        registry.slots.insert(target.id, Arc::new(Mutex::new(slot)));
        Ok(())
    }

    async fn find_by_address(
        &self,
        owner: &str,
        address: &str,
    ) -> Result<Option<Target>, StoreError> {
        let id = {
            let registry = self.registry.read().await;
            registry.by_address.get(&(owner.to_string(), address.to_string())).copied()
        };

        match id {
            Some(id) => self.get_target(id).await,
            None => Ok(None),
        }
    }

    async fn get_target(&self, id: Uuid) -> Result<Option<Target>, StoreError> {
        match self.slot(id).await {
            Some(slot) => Ok(Some(slot.lock().await.target.clone())),
            None => Ok(None),
        }
    }

    async fn list_targets(&self, owner: &str) -> Result<Vec<Target>, StoreError> {
        Ok(self.collect_targets(|target| target.owner == owner).await)
    }

    async fn list_all_targets(&self) -> Result<Vec<Target>, StoreError> {
        Ok(self.collect_targets(|_| true).await)
    }

    async fn update_target(
        &self,
        id: Uuid,
        update: &TargetUpdate,
    ) -> Result<Option<Target>, StoreError> {
        let Some(slot) = self.slot(id).await else {
            return Ok(None);
        };

        let mut slot = slot.lock().await;
        slot.target.apply_update(update);
        Ok(Some(slot.target.clone()))
    }

    async fn delete_target(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut registry = self.registry.write().await;

        // The ledger lives inside the slot and goes with it
        match registry.slots.remove(&id) {
            Some(slot) => {
                let slot = slot.lock().await;
                registry.by_address.remove(&(slot.target.owner.clone(), slot.target.address.clone()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_result(&self, id: Uuid, result: &CheckResult) -> Result<Target, StoreError> {
        let slot = self.slot(id).await.ok_or(StoreError::NotFound)?;

        let mut slot = slot.lock().await;
        slot.ledger.append(result.clone());
        slot.target.record(result);
        Ok(slot.target.clone())
    }

    async fn history_page(
        &self,
        id: Uuid,
        request: PageRequest,
    ) -> Result<HistoryPage, StoreError> {
        let slot = self.slot(id).await.ok_or(StoreError::NotFound)?;
        let page = slot.lock().await.ledger.page(request);
        Ok(page)
    }

    async fn history(&self, id: Uuid) -> Result<Vec<CheckResult>, StoreError> {
        let slot = self.slot(id).await.ok_or(StoreError::NotFound)?;
        let history = slot.lock().await.ledger.to_vec();
        Ok(history)
    }

    fn history_capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{CheckTrigger, TargetStatus};

    fn up(latency: u64) -> CheckResult {
        CheckResult::responded(CheckTrigger::Scheduled, 200, latency)
    }

    async fn seeded(store: &MemoryStore, owner: &str, address: &str) -> Target {
        let target = Target::new(owner, address, None, 5);
        store.insert_target(&target, &up(0)).await.unwrap();
        target
    }

    #[tokio::test]
    async fn test_owner_address_uniqueness() {
        let store = MemoryStore::new(10);
        seeded(&store, "alice", "https://a.example").await;

        let dup = Target::new("alice", "https://a.example", None, 5);
        assert!(matches!(store.insert_target(&dup, &up(0)).await, Err(StoreError::Conflict)));

        seeded(&store, "bob", "https://a.example").await;
        assert!(store.find_by_address("bob", "https://a.example").await.unwrap().is_some());
        assert!(store.find_by_address("carol", "https://a.example").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_is_insertion_ordered_and_scoped() {
        let store = MemoryStore::new(10);
        let first = seeded(&store, "alice", "https://1.example").await;
        seeded(&store, "bob", "https://2.example").await;
        let third = seeded(&store, "alice", "https://3.example").await;

        let alice: Vec<Uuid> =
            store.list_targets("alice").await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(alice, vec![first.id, third.id]);
        assert_eq!(store.list_all_targets().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(MemoryStore::new(1000));
        let id = seeded(&store, "alice", "https://a.example").await.id;

        let mut handles = Vec::new();
        for n in 0..50u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append_result(id, &up(n)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let page = store.history_page(id, PageRequest::new(1, 1000)).await.unwrap();
        assert_eq!(page.total_records, 51);
    }

    #[tokio::test]
    async fn test_concurrent_appends_respect_capacity() {
        let store = Arc::new(MemoryStore::new(10));
        let id = seeded(&store, "alice", "https://a.example").await.id;

        let mut handles = Vec::new();
        for n in 0..40u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append_result(id, &up(n)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.history(id).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_delete_cascades_and_frees_address() {
        let store = MemoryStore::new(10);
        let target = seeded(&store, "alice", "https://a.example").await;
        store.append_result(target.id, &up(5)).await.unwrap();

        assert!(store.delete_target(target.id).await.unwrap());
        assert!(!store.delete_target(target.id).await.unwrap());
        assert!(matches!(store.history(target.id).await, Err(StoreError::NotFound)));
        assert!(matches!(store.append_result(target.id, &up(1)).await, Err(StoreError::NotFound)));

        // The address can be registered again once deleted
        seeded(&store, "alice", "https://a.example").await;
    }

    #[tokio::test]
    async fn test_append_updates_snapshot() {
        let store = MemoryStore::new(10);
        let target = seeded(&store, "alice", "https://a.example").await;

        let failed = CheckResult::failure(CheckTrigger::Scheduled, "timeout of 10000ms exceeded");
        let updated = store.append_result(target.id, &failed).await.unwrap();
        assert_eq!(updated.current_status, TargetStatus::Down);
        assert_eq!(updated.last_checked_at, Some(failed.timestamp));
        assert_eq!(store.get_target(target.id).await.unwrap(), Some(updated));
    }
}
