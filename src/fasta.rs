use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::{io_err, GenotypeError, Result};
use crate::types::SequenceRecord;

/// Line width used when writing sequences, matching common FASTA writers.
const LINE_WIDTH: usize = 60;

/// Minimal FASTA reader that also supports .gz
pub fn read_fasta_records<P: AsRef<Path>>(path: P) -> Result<Vec<SequenceRecord>> {
    let path = path.as_ref();
    let f = File::open(path).map_err(io_err(path))?;

    // If the file ends with ".gz", wrap it in a MultiGzDecoder
    let is_gz = path.extension().map(|ext| ext == "gz").unwrap_or(false);

    let mut reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };

    let mut records = Vec::new();
    let mut current: Option<SequenceRecord> = None;
    let mut line = String::new();
    let mut line_no = 0usize;

    loop {
        line.clear();
        if reader.read_line(&mut line).map_err(io_err(path))? == 0 {
            break; // EOF
        }
        line_no += 1;
        let text = line.trim_end();

        if let Some(header) = text.strip_prefix('>') {
            if let Some(done) = current.take() {
                records.push(done);
            }
            let header = header.trim();
            let id = header.split_whitespace().next().unwrap_or_default();
            if id.is_empty() {
                return Err(GenotypeError::MalformedFasta {
                    path: path.to_path_buf(),
                    line: line_no,
                    reason: "empty record identifier".into(),
                });
            }
            current = Some(SequenceRecord {
                id: id.to_string(),
                description: header.to_string(),
                seq: String::new(),
            });
        } else if let Some(rec) = current.as_mut() {
            rec.seq.push_str(text.trim());
        } else if !text.trim().is_empty() {
            return Err(GenotypeError::MalformedFasta {
                path: path.to_path_buf(),
                line: line_no,
                reason: "sequence data before the first '>' header".into(),
            });
        }
    }

    if let Some(done) = current {
        records.push(done);
    }
    Ok(records)
}

/// Write records to `path`, truncating whatever was there.
pub fn write_fasta_records<P: AsRef<Path>>(path: P, records: &[SequenceRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(io_err(path))?;
    let mut out = BufWriter::new(file);

    for rec in records {
        writeln!(out, ">{}", rec.description).map_err(io_err(path))?;
        let bytes = rec.seq.as_bytes();
        for chunk in bytes.chunks(LINE_WIDTH) {
            out.write_all(chunk).map_err(io_err(path))?;
            out.write_all(b"\n").map_err(io_err(path))?;
        }
    }
    out.flush().map_err(io_err(path))
}

/// True for `*.fasta` and `*.fasta.gz` file names.
fn is_fasta_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".fasta") || lower.ends_with(".fasta.gz")
}

/// List the FASTA files directly inside `dir` (no recursion), sorted by path
/// so that grouping and database concatenation are reproducible.
pub fn find_fasta_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(GenotypeError::MissingInput(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_err(dir))?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_string_lossy().to_string();
            if path.is_file() && is_fasta_name(&name) {
                Some(path)
            } else {
                None
            }
        })
        .collect();
    files.sort_unstable();
    Ok(files)
}
