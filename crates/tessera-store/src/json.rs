//! JSON document adapter
//!
//! The whole snapshot is stored as one pretty-printed document and every write
//! rewrites it.

use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tessera_core::{Adapter, PolicySnapshot, Record, Result};

/// Adapter over a JSON snapshot file
#[derive(Debug)]
pub struct JsonFileAdapter {
    path: PathBuf,
    io: Mutex<()>,
}

impl JsonFileAdapter {
    /// Adapter reading and writing `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<PolicySnapshot> {
        if !self.path.exists() {
            return Ok(PolicySnapshot::default());
        }
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write(&self, snapshot: &PolicySnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut Vec<Record>)) -> Result<()> {
        let _guard = self.io.lock();
        let mut snapshot = self.read()?;
        f(&mut snapshot.records);
        self.write(&snapshot)
    }
}

impl Adapter for JsonFileAdapter {
    fn load_all(&self) -> Result<PolicySnapshot> {
        let _guard = self.io.lock();
        self.read()
    }

    fn save_all(&self, snapshot: &PolicySnapshot) -> Result<()> {
        let _guard = self.io.lock();
        self.write(snapshot)
    }

    fn add_record(&self, record: &Record) -> Result<()> {
        self.update(|records| records.push(record.clone()))
    }

    fn remove_record(&self, record: &Record) -> Result<()> {
        self.update(|records| records.retain(|r| r != record))
    }

    fn add_records(&self, records: &[Record]) -> Result<()> {
        self.update(|stored| stored.extend_from_slice(records))
    }

    fn remove_records(&self, records: &[Record]) -> Result<()> {
        self.update(|stored| stored.retain(|r| !records.contains(r)))
    }
}
