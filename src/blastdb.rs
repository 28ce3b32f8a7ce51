//src/blastdb.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::error::{io_err, GenotypeError, Result};
use crate::fasta::{find_fasta_files, read_fasta_records};
use crate::process::run_command;

/// Name of the database directory created inside the reference directory.
pub const BLAST_DIR_NAME: &str = "blast";

/// Default database name (also used as its title).
pub const DEFAULT_DB_NAME: &str = "hpai_geno_db";

/// Handle to a freshly built nucleotide database. Disposable: it is rebuilt
/// at the start of every run and removed at the end.
#[derive(Debug, Clone)]
pub struct ReferenceDatabase {
    /// `<reference_dir>/blast`, owned entirely by the builder.
    pub dir: PathBuf,
    /// Path prefix the aligner uses to find the database files.
    pub prefix: PathBuf,
    pub title: String,
}

impl ReferenceDatabase {
    /// Delete the database directory and everything in it.
    pub fn remove(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).map_err(io_err(&self.dir))?;
        }
        Ok(())
    }
}

/// Something that can turn concatenated reference FASTA into a queryable
/// nucleotide database at `prefix`.
pub trait DatabaseBuilder {
    fn build(&self, fasta: Vec<u8>, prefix: &Path, title: &str) -> Result<()>;
}

/// Builds the database with NCBI `makeblastdb`, fed on stdin.
#[derive(Debug, Clone)]
pub struct MakeBlastDb {
    pub program: PathBuf,
    pub timeout: Option<Duration>,
}

impl DatabaseBuilder for MakeBlastDb {
    fn build(&self, fasta: Vec<u8>, prefix: &Path, title: &str) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-dbtype", "nucl", "-out"])
            .arg(prefix)
            .arg("-title")
            .arg(title);
        // makeblastdb is chatty; its console output is captured and dropped.
        run_command(cmd, Some(fasta), self.timeout)?;
        Ok(())
    }
}

/// Concatenate reference files, making sure each one ends on a line break.
fn concat_references(files: &[PathBuf]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for path in files {
        // Parse first so a malformed reference fails the run up front.
        let records = read_fasta_records(path)?;
        if records.is_empty() {
            return Err(GenotypeError::MalformedFasta {
                path: path.clone(),
                line: 0,
                reason: "no records".into(),
            });
        }
        for rec in records {
            buf.extend_from_slice(b">");
            buf.extend_from_slice(rec.description.as_bytes());
            buf.extend_from_slice(b"\n");
            buf.extend_from_slice(rec.seq.as_bytes());
            buf.extend_from_slice(b"\n");
        }
    }
    Ok(buf)
}

/// Recreate `<reference_dir>/blast` from scratch and build `name` inside it
/// from every reference FASTA directly under `reference_dir`.
pub fn build_reference_database(
    reference_dir: &Path,
    name: &str,
    builder: &dyn DatabaseBuilder,
) -> Result<ReferenceDatabase> {
    let files = find_fasta_files(reference_dir)?;
    if files.is_empty() {
        return Err(GenotypeError::NoReferenceFiles(reference_dir.to_path_buf()));
    }

    let dir = reference_dir.join(BLAST_DIR_NAME);
    if dir.exists() {
        log::debug!("Removing stale database directory {:?}", dir);
        fs::remove_dir_all(&dir).map_err(io_err(&dir))?;
    }
    fs::create_dir_all(&dir).map_err(io_err(&dir))?;

    let fasta = concat_references(&files)?;
    let prefix = dir.join(name);
    builder.build(fasta, &prefix, name)?;

    log::info!(
        "Built reference database {:?} from {} file(s)",
        prefix,
        files.len()
    );
    Ok(ReferenceDatabase {
        dir,
        prefix,
        title: name.to_string(),
    })
}
