use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::{AgentStats, TxRecord};

/// Capacity of the fan-out channel. Receivers that lag this far behind start
/// dropping records rather than blocking the writer.
const FANOUT_BUFFER: usize = 256;

/// Bounded, newest-first working set of transaction records plus per-agent
/// running stats. Single-writer: only the indexer task mutates it.
pub struct TxStore {
    records: VecDeque<TxRecord>,
    agents: HashMap<String, AgentStats>,
    capacity: usize,
    feed: broadcast::Sender<TxRecord>,
}

impl TxStore {
    pub fn new(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(FANOUT_BUFFER);
        Self {
            records: VecDeque::with_capacity(capacity),
            agents: HashMap::new(),
            capacity,
            feed,
        }
    }

    /// Insert at the head, evicting the tail record when over capacity.
    /// Updates the agent's running stats and publishes the record to all
    /// current feed subscribers, in insertion order.
    pub fn insert(&mut self, record: TxRecord) {
        self.upsert_agent_stats(&record);
        self.records.push_front(record.clone());
        if self.records.len() > self.capacity {
            self.records.pop_back();
        }
        // Errors only mean "no subscribers right now".
        let _ = self.feed.send(record);
    }

    fn upsert_agent_stats(&mut self, record: &TxRecord) {
        self.agents
            .entry(record.agent.clone())
            .or_insert_with(|| AgentStats::new(&record.agent, record.timestamp))
            .apply(record);
    }

    /// Point-in-time copy of the record sequence, newest first.
    pub fn snapshot(&self) -> Vec<TxRecord> {
        self.records.iter().cloned().collect()
    }

    /// Re-sort newest-first by timestamp. Used once after warm-up backfill,
    /// whose jittered timestamps do not arrive in order.
    pub fn sort_by_timestamp_desc(&mut self) {
        self.records
            .make_contiguous()
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agent_stats(&self, address: &str) -> Option<AgentStats> {
        self.agents.get(address).cloned()
    }

    pub fn all_agent_stats(&self) -> Vec<AgentStats> {
        self.agents.values().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TxRecord> {
        self.feed.subscribe()
    }
}

/// Thread-safe handle around TxStore. Clones share the same store.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<TxStore>>,
}

impl SharedStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TxStore::new(capacity))),
        }
    }

    pub fn insert(&self, record: TxRecord) {
        self.inner.lock().unwrap().insert(record);
    }

    pub fn snapshot(&self) -> Vec<TxRecord> {
        self.inner.lock().unwrap().snapshot()
    }

    pub fn sort_by_timestamp_desc(&self) {
        self.inner.lock().unwrap().sort_by_timestamp_desc();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn agent_count(&self) -> usize {
        self.inner.lock().unwrap().agent_count()
    }

    pub fn agent_stats(&self, address: &str) -> Option<AgentStats> {
        self.inner.lock().unwrap().agent_stats(address)
    }

    pub fn all_agent_stats(&self) -> Vec<AgentStats> {
        self.inner.lock().unwrap().all_agent_stats()
    }

    /// Subscribe to the live feed. Only records inserted after this call are
    /// delivered; there is no replay.
    pub fn subscribe(&self) -> broadcast::Receiver<TxRecord> {
        self.inner.lock().unwrap().subscribe()
    }
}
