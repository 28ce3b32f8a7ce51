//src/result_store.rs

use ahash::AHashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::columns::{ColumnPolicy, STRAIN};
use crate::error::{io_err, GenotypeError, Result};
use crate::types::ResultRow;

/// Relative location of the store inside the assembly directory.
pub const RESULTS_DIR_NAME: &str = "results";
pub const RESULTS_FILE_NAME: &str = "results.tsv";

/// Append-only tab-separated table of classified samples.
///
/// The header is read once when the store is opened (or fixed by the first
/// write) and never re-read; every later row is written in that order.
#[derive(Debug)]
pub struct ResultStore {
    path: PathBuf,
    header: Option<Vec<String>>,
    /// `Lenient` writes header columns a row lacks as empty values.
    policy: ColumnPolicy,
}

/// Tabs or line breaks inside a value would split a row.
fn clean(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut f = File::open(path).map_err(io_err(path))?;
    let len = f.metadata().map_err(io_err(path))?.len();
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    f.seek(SeekFrom::End(-1)).map_err(io_err(path))?;
    f.read_exact(&mut last).map_err(io_err(path))?;
    Ok(last[0] == b'\n')
}

impl ResultStore {
    /// Open the store at `path` and return it together with the set of strains
    /// it already contains. A missing or empty file is a store with no header.
    pub fn open<P: AsRef<Path>>(
        path: P,
        policy: ColumnPolicy,
    ) -> Result<(Self, AHashSet<String>)> {
        let path = path.as_ref().to_path_buf();
        let mut annotated = AHashSet::new();

        if !path.exists() {
            return Ok((
                Self {
                    path,
                    header: None,
                    policy,
                },
                annotated,
            ));
        }

        let reader = BufReader::new(File::open(&path).map_err(io_err(&path))?);
        let mut lines = reader.lines();

        let header: Vec<String> = match lines.next() {
            Some(line) => line
                .map_err(io_err(&path))?
                .trim_end_matches('\r')
                .split('\t')
                .map(String::from)
                .collect(),
            None => {
                return Ok((
                    Self {
                        path,
                        header: None,
                        policy,
                    },
                    annotated,
                ))
            }
        };

        let strain_col = header
            .iter()
            .position(|c| c == STRAIN)
            .ok_or_else(|| GenotypeError::MissingStrainColumn(path.clone()))?;

        for line in lines {
            let line = line.map_err(io_err(&path))?;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(strain) = line.trim_end_matches('\r').split('\t').nth(strain_col) {
                annotated.insert(strain.to_string());
            }
        }

        log::info!(
            "Result store {:?} already holds {} strain(s)",
            path,
            annotated.len()
        );
        Ok((
            Self {
                path,
                header: Some(header),
                policy,
            },
            annotated,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Append one row. The first row written to a new store fixes the header;
    /// later rows are reordered to match it. A column the header does not know
    /// is always an error; a header column the row lacks is an error under
    /// `Strict` and an empty value under `Lenient`.
    pub fn append(&mut self, row: &ResultRow) -> Result<()> {
        let mut text = String::new();

        let values: Vec<String> = match &self.header {
            Some(header) => {
                let missing: Vec<String> = header
                    .iter()
                    .filter(|c| !row.contains_key(c))
                    .cloned()
                    .collect();
                let unexpected: Vec<String> = row
                    .keys()
                    .filter(|k| !header.iter().any(|c| c == k))
                    .map(String::from)
                    .collect();
                let strict = self.policy == ColumnPolicy::Strict;
                if !unexpected.is_empty() || (strict && !missing.is_empty()) {
                    return Err(GenotypeError::HeaderMismatch {
                        path: self.path.clone(),
                        missing,
                        unexpected,
                    });
                }
                if !missing.is_empty() {
                    log::warn!(
                        "Row for {} lacks column(s) {}; writing them empty",
                        row.get(STRAIN).unwrap_or("?"),
                        missing.join(", ")
                    );
                }
                if !ends_with_newline(&self.path)? {
                    text.push('\n');
                }
                header
                    .iter()
                    .map(|c| clean(row.get(c).unwrap_or_default()))
                    .collect()
            }
            None => {
                let header: Vec<String> = row.keys().map(clean).collect();
                text.push_str(&header.join("\t"));
                text.push('\n');
                self.header = Some(header);
                row.values().map(clean).collect()
            }
        };
        text.push_str(&values.join("\t"));
        text.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        // One open/write/close per row, so a crash never loses earlier rows.
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err(&self.path))?;
        f.write_all(text.as_bytes()).map_err(io_err(&self.path))?;
        Ok(())
    }
}
