//! In-memory pool config store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use slq_bridge::ConfigSource;
use slq_schemas::PoolConfig;

#[derive(Clone, Default)]
pub struct MemConfigStore {
    inner: Arc<Mutex<HashMap<String, PoolConfig>>>,
}

impl MemConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous seeding helper for test setup.
    pub fn put(&self, cfg: PoolConfig) {
        let mut inner = self.inner.lock().expect("testkit lock poisoned");
        inner.insert(cfg.pool_id.clone(), cfg);
    }
}

#[async_trait]
impl ConfigSource for MemConfigStore {
    async fn get(&self, pool_id: &str) -> Result<Option<PoolConfig>> {
        let inner = self.inner.lock().expect("testkit lock poisoned");
        Ok(inner.get(pool_id).cloned())
    }

    async fn upsert(&self, cfg: &PoolConfig) -> Result<()> {
        self.put(cfg.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PoolConfig>> {
        let inner = self.inner.lock().expect("testkit lock poisoned");
        let mut out: Vec<_> = inner.values().cloned().collect();
        out.sort_by(|a, b| a.pool_id.cmp(&b.pool_id));
        Ok(out)
    }
}
