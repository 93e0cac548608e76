use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustEntry {
    pub seq: u64,
    pub weight: f64,
}

/// Trust weight and registration order per worker, frozen for a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustTable {
    entries: HashMap<String, TrustEntry>,
}

impl TrustTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, worker_id: impl Into<String>, seq: u64, weight: f64) {
        self.entries
            .insert(worker_id.into(), TrustEntry { seq, weight });
    }

    /// Unknown workers weigh 1.0.
    pub fn weight(&self, worker_id: &str) -> f64 {
        self.entries.get(worker_id).map(|e| e.weight).unwrap_or(1.0)
    }

    /// Unknown workers sort after every registered one.
    pub fn seq(&self, worker_id: &str) -> u64 {
        self.entries.get(worker_id).map(|e| e.seq).unwrap_or(u64::MAX)
    }

    pub fn merge(&mut self, other: &TrustTable) {
        for (id, entry) in &other.entries {
            self.entries.insert(id.clone(), *entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
