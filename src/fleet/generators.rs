//! Generator records
//!
//! Reads and writes of the record map are short critical sections. Mutations
//! that span a decision (validate, pick a collector, persist, apply) hold the
//! generator's own writer lock, so two mutations of the same generator never
//! interleave while different generators proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::model::Generator;

/// Exclusive right to mutate one generator
pub type GeneratorWriteGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct GeneratorTable {
    generators: RwLock<HashMap<String, Generator>>,
    writers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GeneratorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the writer lock of a generator (created on first use)
    ///
    /// Callers must hold at most one writer lock at a time.
    pub async fn lock(&self, name: &str) -> GeneratorWriteGuard {
        let writer = {
            let mut writers = self.writers.lock().await;
            writers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        writer.lock_owned().await
    }

    pub async fn get(&self, name: &str) -> Option<Generator> {
        self.generators.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.generators.read().await.contains_key(name)
    }

    /// Insert or replace a generator record
    pub async fn put(&self, generator: Generator) {
        self.generators
            .write()
            .await
            .insert(generator.name.clone(), generator);
    }

    /// Overwrite the current collector of an existing generator
    pub async fn set_current(&self, name: &str, collector: Option<String>) -> Option<Generator> {
        let mut map = self.generators.write().await;
        let generator = map.get_mut(name)?;
        generator.current_collector = collector;
        Some(generator.clone())
    }

    /// All generators, ordered by name
    pub async fn list(&self) -> Vec<Generator> {
        let mut generators: Vec<Generator> =
            self.generators.read().await.values().cloned().collect();
        generators.sort_by(|a, b| a.name.cmp(&b.name));
        generators
    }

    /// Names of the generators currently assigned to `collector`, ascending
    pub async fn assigned_to(&self, collector: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .generators
            .read()
            .await
            .values()
            .filter(|g| g.is_assigned_to(collector))
            .map(|g| g.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Names of active generators without a collector, ascending
    pub async fn orphans(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .generators
            .read()
            .await
            .values()
            .filter(|g| g.is_orphaned())
            .map(|g| g.name.clone())
            .collect();
        names.sort();
        names
    }
}
