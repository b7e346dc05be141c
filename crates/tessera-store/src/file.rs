//! CSV policy file adapter
//!
//! One record per line: `ptype, v0, v1, ...`. Blank lines and lines starting
//! with `#` are skipped. Values are trimmed; a value containing a comma or a
//! double quote is written double-quoted with inner quotes doubled.
//!
//! Appends go straight to the end of the file. Removals and full saves rewrite
//! the file through a sibling temporary file and a rename, so readers never see
//! a half-written policy.

use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tessera_core::{Adapter, PolicySnapshot, Record, Result, Rule, TesseraError};

/// Adapter over a CSV policy file
#[derive(Debug)]
pub struct FileAdapter {
    path: PathBuf,
    io: Mutex<()>,
}

impl FileAdapter {
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

    fn read_records(&self) -> Result<Vec<Record>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Policy file absent; starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(TesseraError::storage(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            }
        };
        let mut records = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if let Some(record) = parse_line(line).map_err(|message| {
                TesseraError::storage(format!(
                    "{}:{}: {message}",
                    self.path.display(),
                    lineno + 1
                ))
            })? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn rewrite(&self, records: &[Record]) -> Result<()> {
        let mut body = String::new();
        for record in records {
            body.push_str(&format_record(record));
            body.push('\n');
        }
        let tmp = self.path.with_extension("csv.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn append(&self, records: &[Record]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        let needs_newline = match file.metadata()?.len() {
            0 => false,
            len => {
                let mut last = [0u8; 1];
                file.seek(SeekFrom::Start(len - 1))?;
                file.read_exact(&mut last)?;
                last[0] != b'\n'
            }
        };
        let mut body = String::new();
        if needs_newline {
            body.push('\n');
        }
        for record in records {
            body.push_str(&format_record(record));
            body.push('\n');
        }
        file.write_all(body.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

impl Adapter for FileAdapter {
    fn load_all(&self) -> Result<PolicySnapshot> {
        let _guard = self.io.lock();
        let records = self.read_records()?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "Read policy file");
        Ok(PolicySnapshot::new(records))
    }

    fn save_all(&self, snapshot: &PolicySnapshot) -> Result<()> {
        let _guard = self.io.lock();
        self.rewrite(&snapshot.records)
    }

    fn add_record(&self, record: &Record) -> Result<()> {
        let _guard = self.io.lock();
        self.append(std::slice::from_ref(record))
    }

    fn remove_record(&self, record: &Record) -> Result<()> {
        self.remove_records(std::slice::from_ref(record))
    }

    fn add_records(&self, records: &[Record]) -> Result<()> {
        let _guard = self.io.lock();
        self.append(records)
    }

    fn remove_records(&self, records: &[Record]) -> Result<()> {
        let _guard = self.io.lock();
        let mut kept = self.read_records()?;
        kept.retain(|r| !records.contains(r));
        self.rewrite(&kept)
    }
}

/// Parse one line; `None` for blanks and comments
fn parse_line(line: &str) -> std::result::Result<Option<Record>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let mut fields = split_fields(trimmed)?.into_iter();
    let ptype = match fields.next() {
        Some(p) if !p.is_empty() => p,
        _ => return Err("missing record type".to_string()),
    };
    Ok(Some(Record::new(ptype, Rule::new(fields.collect()))))
}

fn split_fields(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        value.push('"');
                    }
                    Some('"') => break,
                    Some(c) => value.push(c),
                    None => return Err("unterminated quoted value".to_string()),
                }
            }
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            match chars.peek() {
                None | Some(',') => {}
                Some(c) => return Err(format!("unexpected `{c}` after quoted value")),
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim_end().to_string();
        }
        fields.push(value);
        if chars.next().is_none() {
            return Ok(fields);
        }
    }
}

fn format_record(record: &Record) -> String {
    std::iter::once(record.ptype.as_str())
        .chain(record.rule.iter().map(String::as_str))
        .map(quote)
        .collect::<Vec<_>>()
        .join(", ")
}

fn quote(value: &str) -> String {
    if value.contains([',', '"']) || value.trim() != value || value.starts_with('#') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
