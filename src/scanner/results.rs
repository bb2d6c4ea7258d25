//! Append-only record store read through snapshots

use crate::discovery::DeviceRecord;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Records in completion order.
///
/// A record is moved in whole under the lock, so a reader can never see one
/// half built. Snapshots are deep copies.
#[derive(Debug, Default)]
pub struct ResultStore {
    records: Mutex<Vec<DeviceRecord>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DeviceRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, record: DeviceRecord) {
        self.lock().push(record);
    }

    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.lock().clone()
    }

    /// Replace the contents of `out` with the current records and return how
    /// many were copied. Reuses `out`'s allocation.
    pub fn snapshot_into(&self, out: &mut Vec<DeviceRecord>) -> usize {
        let records = self.lock();
        out.clear();
        out.extend(records.iter().cloned());
        out.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn reachable_count(&self) -> usize {
        self.lock().iter().filter(|r| r.reachable).count()
    }
}
