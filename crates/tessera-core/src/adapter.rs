//! Storage boundary consumed by the enforcer
//!
//! The engine keeps every tuple in memory and treats the adapter as an ordered
//! source (at startup and on reload) and sink (write-through or explicit save).
//! Implementations may back onto a file, a key-value store or a remote cache.

use crate::errors::Result;
use crate::types::{PolicySnapshot, Record};

/// Durable storage for policy and grouping records
pub trait Adapter: Send + Sync {
    /// Load every stored record, in storage order
    fn load_all(&self) -> Result<PolicySnapshot>;

    /// Replace the stored contents with `snapshot`
    fn save_all(&self, snapshot: &PolicySnapshot) -> Result<()>;

    /// Persist one newly added record
    fn add_record(&self, record: &Record) -> Result<()>;

    /// Persist the removal of one record
    fn remove_record(&self, record: &Record) -> Result<()>;

    /// Persist several new records
    ///
    /// The default writes them one at a time; backends with native batching
    /// should override it so a failure leaves none of them stored.
    fn add_records(&self, records: &[Record]) -> Result<()> {
        for record in records {
            self.add_record(record)?;
        }
        Ok(())
    }

    /// Persist the removal of several records
    fn remove_records(&self, records: &[Record]) -> Result<()> {
        for record in records {
            self.remove_record(record)?;
        }
        Ok(())
    }
}

impl<T: Adapter + ?Sized> Adapter for Box<T> {
    fn load_all(&self) -> Result<PolicySnapshot> {
        (**self).load_all()
    }

    fn save_all(&self, snapshot: &PolicySnapshot) -> Result<()> {
        (**self).save_all(snapshot)
    }

    fn add_record(&self, record: &Record) -> Result<()> {
        (**self).add_record(record)
    }

    fn remove_record(&self, record: &Record) -> Result<()> {
        (**self).remove_record(record)
    }

    fn add_records(&self, records: &[Record]) -> Result<()> {
        (**self).add_records(records)
    }

    fn remove_records(&self, records: &[Record]) -> Result<()> {
        (**self).remove_records(records)
    }
}

impl<T: Adapter + ?Sized> Adapter for std::sync::Arc<T> {
    fn load_all(&self) -> Result<PolicySnapshot> {
        (**self).load_all()
    }

    fn save_all(&self, snapshot: &PolicySnapshot) -> Result<()> {
        (**self).save_all(snapshot)
    }

    fn add_record(&self, record: &Record) -> Result<()> {
        (**self).add_record(record)
    }

    fn remove_record(&self, record: &Record) -> Result<()> {
        (**self).remove_record(record)
    }

    fn add_records(&self, records: &[Record]) -> Result<()> {
        (**self).add_records(records)
    }

    fn remove_records(&self, records: &[Record]) -> Result<()> {
        (**self).remove_records(records)
    }
}
