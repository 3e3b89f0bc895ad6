//! Result emission: one tab-separated block per image, appended to a shared file

use csv::WriterBuilder;
use log::debug;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{PhenoError, Result};
use crate::models::{MeasurementRecord, RecordGroup};

/// Destination for the measurement records of one image
pub trait ResultSink: Send + Sync {
    fn emit(&self, image_id: &str, records: &[MeasurementRecord]) -> Result<()>;
}

/// Render one image's records as a TSV block.
///
/// Groups come out shape → color → marker. Each group starts with a header row
/// `image<TAB>field...` followed by one row per record. Absent groups are skipped.
pub fn render_block(image_id: &str, records: &[MeasurementRecord]) -> Result<Vec<u8>> {
    let mut groups: BTreeMap<RecordGroup, Vec<&MeasurementRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.group).or_default().push(record);
    }

    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(Vec::new());
    for rows in groups.values() {
        let Some(first) = rows.first() else {
            continue;
        };
        let mut header = vec!["image"];
        header.extend(first.header());
        writer.write_record(&header)?;
        for record in rows {
            let mut row = vec![image_id.to_string()];
            row.extend(record.values());
            writer.write_record(&row)?;
        }
    }
    writer
        .into_inner()
        .map_err(|e| PhenoError::Io(e.into_error()))
}

/// Appends blocks to a single file; one image's block is one write under the lock
pub struct TsvSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl TsvSink {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for TsvSink {
    fn emit(&self, image_id: &str, records: &[MeasurementRecord]) -> Result<()> {
        let block = render_block(image_id, records)?;
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(&block)?;
        file.flush()?;
        debug!("Wrote {} record(s) for {} to {}", records.len(), image_id, self.path.display());
        Ok(())
    }
}

/// Collects blocks in memory, in emission order
#[derive(Default)]
pub struct MemorySink {
    blocks: Mutex<Vec<(String, Vec<MeasurementRecord>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(String, Vec<MeasurementRecord>)> {
        let mut blocks = self.blocks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *blocks)
    }
}

impl ResultSink for MemorySink {
    fn emit(&self, image_id: &str, records: &[MeasurementRecord]) -> Result<()> {
        let mut blocks = self.blocks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        blocks.push((image_id.to_string(), records.to_vec()));
        Ok(())
    }
}
