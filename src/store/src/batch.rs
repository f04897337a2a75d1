use crate::Store;
use crate::collection::Collection;
use log::debug;

/// A single atomic commit tops out at this many writes, so bulk fan-out
/// (fixture calendars, cleanup sweeps) goes through sequential chunks.
/// Chunks are individually atomic but the whole operation is not; every
/// write is idempotent by id, so a crashed run is safe to repeat.
pub const MAX_BATCH: usize = 450;

pub struct BulkWriter<'s> {
    store: &'s Store,
    ops: Vec<Box<dyn FnOnce() + 's>>,
    committed: usize,
}

impl<'s> BulkWriter<'s> {
    pub fn new(store: &'s Store) -> Self {
        BulkWriter {
            store,
            ops: Vec::new(),
            committed: 0,
        }
    }

    pub fn put<T: Clone + Send + Sync + 'static>(&mut self, coll: &'s Collection<T>, id: &str, value: T) {
        let id = id.to_string();
        self.ops.push(Box::new(move || coll.apply_put(&id, value)));
        self.flush_if_full();
    }

    pub fn delete<T: Clone + Send + Sync + 'static>(&mut self, coll: &'s Collection<T>, id: &str) {
        let id = id.to_string();
        self.ops.push(Box::new(move || {
            coll.apply_remove(&id);
        }));
        self.flush_if_full();
    }

    fn flush_if_full(&mut self) {
        if self.ops.len() >= MAX_BATCH {
            self.flush();
        }
    }

    pub fn flush(&mut self) {
        if self.ops.is_empty() {
            return;
        }
        let chunk = std::mem::take(&mut self.ops);
        let count = chunk.len();
        {
            let _gate = self.store.commit_gate().lock().expect("commit gate poisoned");
            for op in chunk {
                op();
            }
        }
        self.committed += count;
        debug!("bulk chunk committed: {} ops ({} total)", count, self.committed);
    }

    /// Flushes the tail chunk and reports how many writes landed.
    pub fn finish(mut self) -> usize {
        self.flush();
        self.committed
    }
}
