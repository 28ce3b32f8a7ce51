//src/workspace.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_err, Result};
use crate::result_store::{RESULTS_DIR_NAME, RESULTS_FILE_NAME};

pub const STAGING_DIR_NAME: &str = "staging";
/// Stem shared by the staged FASTA and everything the classifier writes.
pub const STAGED_STEM: &str = "staged";

/// Transient and persistent directories under the assembly directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub staging_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Workspace {
    /// Create `staging/` and `results/` under `fasta_dir`. Safe to call when
    /// they already exist.
    pub fn prepare(fasta_dir: &Path) -> Result<Self> {
        let staging_dir = fasta_dir.join(STAGING_DIR_NAME);
        let results_dir = fasta_dir.join(RESULTS_DIR_NAME);
        fs::create_dir_all(&staging_dir).map_err(io_err(&staging_dir))?;
        fs::create_dir_all(&results_dir).map_err(io_err(&results_dir))?;
        Ok(Self {
            staging_dir,
            results_dir,
        })
    }

    pub fn results_file(&self) -> PathBuf {
        self.results_dir.join(RESULTS_FILE_NAME)
    }

    pub fn staged_fasta(&self) -> PathBuf {
        self.staging_dir.join(format!("{STAGED_STEM}.fasta"))
    }

    /// Prefix handed to the classifier for its own output files.
    pub fn staged_sample_name(&self) -> PathBuf {
        self.staging_dir.join(STAGED_STEM)
    }

    /// Remove every entry inside the staging directory, keeping the directory.
    pub fn clear_staging(&self) -> Result<()> {
        if !self.staging_dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.staging_dir).map_err(io_err(&self.staging_dir))? {
            let path = entry.map_err(io_err(&self.staging_dir))?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path).map_err(io_err(&path))?;
            } else {
                fs::remove_file(&path).map_err(io_err(&path))?;
            }
        }
        Ok(())
    }

    /// Scope guard that empties the staging directory when dropped.
    pub fn stage(&self) -> StagingGuard<'_> {
        StagingGuard { workspace: self }
    }

    /// Remove the staging directory entirely. Results are left alone.
    pub fn cleanup(&self) -> Result<()> {
        if self.staging_dir.exists() {
            fs::remove_dir_all(&self.staging_dir).map_err(io_err(&self.staging_dir))?;
        }
        Ok(())
    }
}

/// Clears staging on drop, on success and error paths alike.
pub struct StagingGuard<'a> {
    workspace: &'a Workspace,
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.workspace.clear_staging() {
            log::warn!("Could not clear staging area: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();
        fs::write(ws.results_file(), "Strain\n").unwrap();
        let again = Workspace::prepare(dir.path()).unwrap();
        assert!(again.staging_dir.is_dir());
        assert_eq!(fs::read_to_string(again.results_file()).unwrap(), "Strain\n");
    }

    #[test]
    fn test_guard_clears_staging() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();
        {
            let _guard = ws.stage();
            fs::write(ws.staged_fasta(), ">a\nA\n").unwrap();
            fs::create_dir(ws.staging_dir.join("tmp")).unwrap();
        }
        assert!(ws.staging_dir.is_dir());
        assert_eq!(fs::read_dir(&ws.staging_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_cleanup_keeps_results() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();
        ws.cleanup().unwrap();
        assert!(!ws.staging_dir.exists());
        assert!(ws.results_dir.is_dir());
    }
}
