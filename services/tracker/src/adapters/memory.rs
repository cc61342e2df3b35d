//! services/tracker/src/adapters/memory.rs
//!
//! An in-process implementation of the storage ports, used when no database is
//! configured and by the test suite.
//!
//! Each record sits behind its own mutex, so concurrent operations only
//! serialize when they touch the same target or pool. The maps themselves are
//! guarded by read/write locks that are held just long enough to find a record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phishing_core::domain::{Pool, Status, StatusSet, Target};
use phishing_core::ids::generate_id;
use phishing_core::ports::{PoolStore, PortError, PortResult, TargetStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

type Row<T> = Arc<Mutex<T>>;

#[derive(Default)]
pub struct MemoryStore {
    targets: RwLock<HashMap<String, Row<Target>>>,
    pools: RwLock<HashMap<String, Row<Pool>>>,
    /// (group, template) -> pool id. Also serializes pool creation.
    pool_index: Mutex<HashMap<(String, String), String>>,
}

fn poisoned<E>(_: E) -> PortError {
    PortError::Unavailable("memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn target_row(&self, target_id: &str) -> PortResult<Row<Target>> {
        self.targets
            .read()
            .map_err(poisoned)?
            .get(target_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Target {} not found", target_id)))
    }

    fn pool_row(&self, pool_id: &str) -> PortResult<Row<Pool>> {
        self.pools
            .read()
            .map_err(poisoned)?
            .get(pool_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Pool {} not found", pool_id)))
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn create_target(&self) -> PortResult<Target> {
        let target = Target::new(generate_id());
        self.targets
            .write()
            .map_err(poisoned)?
            .insert(target.id.clone(), Arc::new(Mutex::new(target.clone())));
        Ok(target)
    }

    async fn get_target(&self, target_id: &str) -> PortResult<Target> {
        let row = self.target_row(target_id)?;
        let target = row.lock().map_err(poisoned)?.clone();
        Ok(target)
    }

    async fn upgrade(
        &self,
        target_id: &str,
        new_status: Status,
        at: DateTime<Utc>,
    ) -> PortResult<StatusSet> {
        let row = self.target_row(target_id)?;
        let mut target = row.lock().map_err(poisoned)?;
        Ok(target.upgrade(new_status, at))
    }

    async fn reset_targets(&self, target_ids: &[String]) -> PortResult<u64> {
        let mut reset = 0;
        for target_id in target_ids {
            match self.target_row(target_id) {
                Ok(row) => {
                    row.lock().map_err(poisoned)?.reset();
                    reset += 1;
                }
                Err(PortError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(reset)
    }
}

#[async_trait]
impl PoolStore for MemoryStore {
    async fn get_or_create(&self, group: &str, template: &str) -> PortResult<Pool> {
        let mut index = self.pool_index.lock().map_err(poisoned)?;
        let key = (group.to_string(), template.to_string());

        if let Some(pool_id) = index.get(&key) {
            let row = self.pool_row(pool_id)?;
            let pool = row.lock().map_err(poisoned)?.clone();
            return Ok(pool);
        }

        let pool = Pool::new(generate_id(), group, template);
        self.pools
            .write()
            .map_err(poisoned)?
            .insert(pool.id.clone(), Arc::new(Mutex::new(pool.clone())));
        index.insert(key, pool.id.clone());
        Ok(pool)
    }

    async fn get_pool(&self, pool_id: &str) -> PortResult<Pool> {
        let row = self.pool_row(pool_id)?;
        let pool = row.lock().map_err(poisoned)?.clone();
        Ok(pool)
    }

    async fn increment_statuses(&self, pool_id: &str, statuses: &StatusSet) -> PortResult<()> {
        if statuses.is_empty() {
            return Ok(());
        }
        let row = self.pool_row(pool_id)?;
        row.lock().map_err(poisoned)?.apply_increment(statuses);
        Ok(())
    }

    async fn reset_pools(&self, pool_ids: &[String]) -> PortResult<u64> {
        let mut reset = 0;
        for pool_id in pool_ids {
            match self.pool_row(pool_id) {
                Ok(row) => {
                    row.lock().map_err(poisoned)?.reset();
                    reset += 1;
                }
                Err(PortError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(reset)
    }
}
