use crate::chunks::ChunkDescriptor;
use crate::coords::ChunkId;
use std::collections::HashSet;

/// Bounded-concurrency queue for chunk fetches. The scheduler itself is a
/// pure state machine; the event loop drains it and spawns one fetch task
/// per drained descriptor, reporting back through `complete`.
///
/// A chunk that fails to fetch is completed but never marked loaded in the
/// pixel store, so the next viewport settle re-queues it.
#[derive(Debug, Default)]
pub struct RequestScheduler {
    queue: Vec<ChunkDescriptor>,
    queued: HashSet<ChunkId>,
    in_flight: HashSet<ChunkId>,
    max_in_flight: usize,
}

impl RequestScheduler {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            queue: Vec::new(),
            queued: HashSet::new(),
            in_flight: HashSet::new(),
            max_in_flight,
        }
    }

    /// Enqueue descriptors that are not already loaded, queued or in
    /// flight. Duplicate scheduling is a no-op.
    pub fn schedule<F>(&mut self, descriptors: &[ChunkDescriptor], is_loaded: F)
    where
        F: Fn(ChunkId) -> bool,
    {
        for desc in descriptors {
            if is_loaded(desc.id)
                || self.queued.contains(&desc.id)
                || self.in_flight.contains(&desc.id)
            {
                continue;
            }
            self.queued.insert(desc.id);
            self.queue.push(*desc);
        }
        self.queue.sort_by_key(|c| (c.priority, c.id.cy, c.id.cx));
    }

    /// Pop up to `max_in_flight - in_flight` highest-priority chunks and
    /// mark them in flight. The caller owns executing their fetches.
    pub fn next_batch(&mut self) -> Vec<ChunkDescriptor> {
        let mut batch = Vec::new();
        while self.in_flight.len() < self.max_in_flight && !self.queue.is_empty() {
            let desc = self.queue.remove(0);
            self.queued.remove(&desc.id);
            self.in_flight.insert(desc.id);
            batch.push(desc);
        }
        batch
    }

    /// Release the in-flight slot for a finished fetch, success or not.
    pub fn complete(&mut self, id: ChunkId) {
        self.in_flight.remove(&id);
    }

    /// Drop all queued work (refresh). In-flight fetches are not
    /// cancellable; their results merge and are evicted later if stale.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(cx: u16, cy: u16, priority: u64) -> ChunkDescriptor {
        ChunkDescriptor {
            id: ChunkId { cx, cy },
            priority,
        }
    }

    #[test]
    fn in_flight_never_exceeds_limit_under_burst() {
        let mut scheduler = RequestScheduler::new(3);
        let burst: Vec<ChunkDescriptor> = (0..60u16)
            .map(|i| desc(i % 10, i / 10, i as u64))
            .collect();
        scheduler.schedule(&burst, |_| false);

        let mut fetched = 0;
        while !scheduler.is_idle() {
            let batch = scheduler.next_batch();
            assert!(scheduler.in_flight_count() <= 3);
            if batch.is_empty() {
                break;
            }
            for d in &batch {
                fetched += 1;
                scheduler.complete(d.id);
            }
        }
        assert_eq!(fetched, 60);
    }

    #[test]
    fn duplicate_schedule_is_noop() {
        let mut scheduler = RequestScheduler::new(3);
        let chunk = [desc(1, 1, 0)];
        scheduler.schedule(&chunk, |_| false);
        scheduler.schedule(&chunk, |_| false);
        assert_eq!(scheduler.queue_depth(), 1);

        // In flight: still not re-queued.
        let batch = scheduler.next_batch();
        assert_eq!(batch.len(), 1);
        scheduler.schedule(&chunk, |_| false);
        assert_eq!(scheduler.queue_depth(), 0);
    }

    #[test]
    fn loaded_chunks_are_skipped() {
        let mut scheduler = RequestScheduler::new(3);
        let chunks = [desc(0, 0, 0), desc(1, 0, 1)];
        scheduler.schedule(&chunks, |id| id == ChunkId { cx: 0, cy: 0 });
        assert_eq!(scheduler.queue_depth(), 1);
        assert_eq!(scheduler.next_batch()[0].id, ChunkId { cx: 1, cy: 0 });
    }

    #[test]
    fn batches_come_out_in_priority_order() {
        let mut scheduler = RequestScheduler::new(2);
        scheduler.schedule(&[desc(5, 5, 90), desc(1, 1, 10), desc(2, 2, 40)], |_| false);
        let batch = scheduler.next_batch();
        assert_eq!(batch[0].id, ChunkId { cx: 1, cy: 1 });
        assert_eq!(batch[1].id, ChunkId { cx: 2, cy: 2 });
    }

    #[test]
    fn failed_chunk_is_eligible_again_after_complete() {
        let mut scheduler = RequestScheduler::new(1);
        let chunk = [desc(3, 3, 0)];
        scheduler.schedule(&chunk, |_| false);
        let batch = scheduler.next_batch();
        assert_eq!(batch.len(), 1);
        // Fetch fails: slot released, chunk not marked loaded.
        scheduler.complete(batch[0].id);
        scheduler.schedule(&chunk, |_| false);
        assert_eq!(scheduler.queue_depth(), 1);
    }
}
