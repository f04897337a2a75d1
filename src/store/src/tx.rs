use crate::collection::{Collection, Validate};
use crate::error::StoreError;
use log::debug;

pub(crate) const MAX_TX_ATTEMPTS: u32 = 16;

enum ReadRecord<'s> {
    /// A single-document read; validated against the doc's version.
    Doc {
        coll: &'s dyn Validate,
        id: String,
        version: Option<u64>,
    },
    /// A query over a collection; validated against the collection version,
    /// so any concurrent write to the collection invalidates the result set
    /// (including phantom inserts).
    Query {
        coll: &'s dyn Validate,
        version: u64,
    },
}

/// One optimistic transaction: a read set, then a buffered write set.
///
/// Reads record the versions they observed; writes are deferred closures that
/// only land after every recorded version has been re-validated under the
/// store-wide commit gate. Mirroring the underlying store discipline, all
/// reads must come before the first write.
pub struct Tx<'s> {
    reads: Vec<ReadRecord<'s>>,
    writes: Vec<Box<dyn FnOnce() + 's>>,
}

impl<'s> Tx<'s> {
    pub(crate) fn new() -> Self {
        Tx {
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    fn guard_read(&self, name: &'static str) -> Result<(), StoreError> {
        if self.writes.is_empty() {
            Ok(())
        } else {
            Err(StoreError::ReadAfterWrite(name))
        }
    }

    pub fn get<T: Clone + Send + Sync + 'static>(
        &mut self,
        coll: &'s Collection<T>,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        self.guard_read(Validate::name(coll))?;
        let (version, value) = coll.snapshot(id);
        self.reads.push(ReadRecord::Doc {
            coll,
            id: id.to_string(),
            version,
        });
        Ok(value)
    }

    /// Unordered query inside the transaction.
    pub fn scan<T, F>(
        &mut self,
        coll: &'s Collection<T>,
        filter: F,
    ) -> Result<Vec<(String, T)>, StoreError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&str, &T) -> bool,
    {
        self.guard_read(Validate::name(coll))?;
        let version = coll.collection_version();
        let rows = coll.scan(filter);
        self.reads.push(ReadRecord::Query { coll, version });
        Ok(rows)
    }

    /// Ordered query inside the transaction; propagates `MissingIndex` so the
    /// caller can fall back to `scan`.
    pub fn query_ordered<T, K, F, KF>(
        &mut self,
        coll: &'s Collection<T>,
        filter: F,
        key_of: KF,
        index: &'static str,
    ) -> Result<Vec<(String, T)>, StoreError>
    where
        T: Clone + Send + Sync + 'static,
        K: Ord,
        F: Fn(&str, &T) -> bool,
        KF: Fn(&T) -> K,
    {
        self.guard_read(Validate::name(coll))?;
        let version = coll.collection_version();
        let rows = coll.query_ordered(filter, key_of, index)?;
        self.reads.push(ReadRecord::Query { coll, version });
        Ok(rows)
    }

    /// Buffers an upsert; applied only if the whole transaction commits.
    pub fn put<T: Clone + Send + Sync + 'static>(&mut self, coll: &'s Collection<T>, id: &str, value: T) {
        let id = id.to_string();
        self.writes.push(Box::new(move || coll.apply_put(&id, value)));
    }

    /// Buffers a delete.
    pub fn delete<T: Clone + Send + Sync + 'static>(&mut self, coll: &'s Collection<T>, id: &str) {
        let id = id.to_string();
        self.writes.push(Box::new(move || {
            coll.apply_remove(&id);
        }));
    }

    /// True when every recorded read still observes the same version.
    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        for read in &self.reads {
            match read {
                ReadRecord::Doc { coll, id, version } => {
                    if coll.doc_version(id) != *version {
                        return Err(StoreError::Conflict(format!("{}/{}", coll.name(), id)));
                    }
                }
                ReadRecord::Query { coll, version } => {
                    if coll.collection_version() != *version {
                        return Err(StoreError::Conflict(coll.name().to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn commit(self) {
        for write in self.writes {
            write();
        }
    }
}

pub(crate) fn log_retry(attempt: u32, err: &StoreError) {
    debug!("transaction retry #{}: {}", attempt + 1, err);
}
