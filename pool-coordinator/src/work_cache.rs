use std::collections::{HashMap, VecDeque};

use pool_core::BlockTemplate;

/// Bounded cache of recent work epochs, keyed by `mining_request_id`.
///
/// Capacity 12: large enough that a miner working a few requests behind the
/// current epoch (slow hardware, a queued submission) still lands an
/// [`WorkCache::get`] hit, small enough that memory is bounded regardless of
/// how long the pool runs. Eviction is strict insertion order (a ring), not
/// LRU by access — a request id is either recent or it isn't, reads don't
/// extend its life.
pub struct WorkCache {
    capacity: usize,
    order: VecDeque<u64>,
    entries: HashMap<u64, BlockTemplate>,
}

impl WorkCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, request_id: u64, template: BlockTemplate) {
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(request_id);
        self.entries.insert(request_id, template);
    }

    pub fn get(&self, request_id: u64) -> Option<&BlockTemplate> {
        self.entries.get(&request_id)
    }

    pub fn get_mut(&mut self, request_id: u64) -> Option<&mut BlockTemplate> {
        self.entries.get_mut(&request_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
