//! In-process adapter

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tessera_core::{Adapter, PolicySnapshot, Record, Result, TesseraError};

/// Adapter that keeps records in process memory
///
/// Writes can be made to fail on demand, which is how callers exercise the
/// enforcer's storage-failure path.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    records: RwLock<Vec<Record>>,
    fail_writes: AtomicBool,
}

impl MemoryAdapter {
    /// Empty adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter pre-populated with `records`
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of the stored records
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot::new(self.records.read().clone())
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TesseraError::storage("memory adapter rejected the write"));
        }
        Ok(())
    }
}

impl Adapter for MemoryAdapter {
    fn load_all(&self) -> Result<PolicySnapshot> {
        Ok(self.snapshot())
    }

    fn save_all(&self, snapshot: &PolicySnapshot) -> Result<()> {
        self.check_writable()?;
        *self.records.write() = snapshot.records.clone();
        Ok(())
    }

    fn add_record(&self, record: &Record) -> Result<()> {
        self.check_writable()?;
        self.records.write().push(record.clone());
        Ok(())
    }

    fn remove_record(&self, record: &Record) -> Result<()> {
        self.check_writable()?;
        self.records.write().retain(|r| r != record);
        Ok(())
    }

    fn add_records(&self, records: &[Record]) -> Result<()> {
        self.check_writable()?;
        self.records.write().extend_from_slice(records);
        Ok(())
    }
}
