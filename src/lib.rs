// src/lib.rs
pub mod blastdb;
pub mod classifier;
pub mod columns;
pub mod error;
pub mod fasta;
pub mod grouping;
pub mod process;
pub mod result_store;
pub mod types;
pub mod workspace;

use ahash::AHashSet;
use indicatif::ProgressBar;
use std::path::PathBuf;

use crate::blastdb::{
    build_reference_database, DatabaseBuilder, ReferenceDatabase, DEFAULT_DB_NAME,
};
use crate::classifier::{classify_sample, GenotypeClassifier};
use crate::columns::{ColumnOrder, ColumnPolicy};
use crate::error::{GenotypeError, Result};
use crate::fasta::find_fasta_files;
use crate::grouping::{eligible_samples, group_samples, EXPECTED_SEGMENTS};
use crate::result_store::ResultStore;
use crate::types::{ClassifiedSample, Sample};
use crate::workspace::Workspace;

/// Everything a run needs to know about its inputs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory of assembly FASTAs; `staging/` and `results/` live here too.
    pub fasta_dir: PathBuf,
    /// Directory of reference FASTAs; the database is rebuilt under `blast/`.
    pub reference_dir: PathBuf,
    /// Genotype key spreadsheet, only passed through to the classifier.
    pub cross_reference: PathBuf,
    pub db_name: String,
    pub expected_segments: usize,
    pub column_policy: ColumnPolicy,
}

impl PipelineConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>, R: Into<PathBuf>>(
        fasta_dir: P,
        reference_dir: Q,
        cross_reference: R,
    ) -> Self {
        Self {
            fasta_dir: fasta_dir.into(),
            reference_dir: reference_dir.into(),
            cross_reference: cross_reference.into(),
            db_name: DEFAULT_DB_NAME.to_string(),
            expected_segments: EXPECTED_SEGMENTS,
            column_policy: ColumnPolicy::default(),
        }
    }

    /// Check that all inputs exist before anything is created or deleted.
    pub fn validate(&self) -> Result<()> {
        for dir in [&self.fasta_dir, &self.reference_dir] {
            if !dir.is_dir() {
                return Err(GenotypeError::MissingInput(dir.clone()));
            }
        }
        if !self.cross_reference.is_file() {
            return Err(GenotypeError::MissingInput(self.cross_reference.clone()));
        }
        Ok(())
    }

    pub fn results_file(&self) -> PathBuf {
        self.fasta_dir
            .join(result_store::RESULTS_DIR_NAME)
            .join(result_store::RESULTS_FILE_NAME)
    }
}

/// What a run did.
#[derive(Debug)]
pub struct RunSummary {
    /// Samples classified and appended this run, in processing order.
    pub classified: Vec<ClassifiedSample>,
    /// Strains whose record count was not the expected segment count.
    pub incomplete: usize,
    /// Complete strains skipped because the store already had them.
    pub already_annotated: usize,
    pub results_file: PathBuf,
}

/// One run, split into the phases a caller may want to report separately.
///
/// `prepare` → `discover` → `build_database` → `classify` → `finish`.
/// `run_pipeline` chains them.
pub struct Pipeline<'c> {
    config: &'c PipelineConfig,
    workspace: Workspace,
    store: ResultStore,
    annotated: AHashSet<String>,
    samples: Vec<Sample>,
}

impl<'c> Pipeline<'c> {
    /// Validate inputs, create the workspace and snapshot the strains already
    /// in the result store.
    pub fn prepare(config: &'c PipelineConfig) -> Result<Self> {
        config.validate()?;
        let workspace = Workspace::prepare(&config.fasta_dir)?;
        let (store, annotated) =
            ResultStore::open(workspace.results_file(), config.column_policy)?;
        Ok(Self {
            config,
            workspace,
            store,
            annotated,
            samples: Vec::new(),
        })
    }

    /// Group the assembly records into samples. Returns the strain count.
    pub fn discover(&mut self) -> Result<usize> {
        let files = find_fasta_files(&self.config.fasta_dir)?;
        self.samples = group_samples(&files)?;
        Ok(self.samples.len())
    }

    /// Rebuild the reference database from scratch.
    pub fn build_database(&self, builder: &dyn DatabaseBuilder) -> Result<ReferenceDatabase> {
        build_reference_database(&self.config.reference_dir, &self.config.db_name, builder)
    }

    /// Classify and append every eligible sample, one at a time.
    ///
    /// Rows are written as soon as each sample finishes, so an error part way
    /// through keeps every earlier row.
    pub fn classify(
        &mut self,
        database: &ReferenceDatabase,
        classifier: &dyn GenotypeClassifier,
        progress: &ProgressBar,
    ) -> Result<RunSummary> {
        let expected = self.config.expected_segments;
        let columns = ColumnOrder::canonical(self.config.column_policy);
        let eligible: Vec<_> =
            eligible_samples(&self.samples, &self.annotated, expected).collect();
        let incomplete = self
            .samples
            .iter()
            .filter(|s| s.segment_count() != expected)
            .count();
        let already_annotated = self.samples.len() - incomplete - eligible.len();
        log::info!(
            "{} sample(s) to classify, {} incomplete, {} already annotated",
            eligible.len(),
            incomplete,
            already_annotated
        );

        progress.set_length(eligible.len() as u64);
        let mut classified = Vec::with_capacity(eligible.len());
        for sample in eligible {
            progress.set_message(sample.strain.clone());
            let result = classify_sample(sample, database, &self.workspace, classifier, &columns)?;
            self.store.append(&result.row)?;
            progress.suspend(|| println!("{}", result.summary));
            progress.inc(1);
            classified.push(result);
        }

        Ok(RunSummary {
            classified,
            incomplete,
            already_annotated,
            results_file: self.store.path().to_path_buf(),
        })
    }

    /// Remove staging and the database. Only called after a clean run, so a
    /// failed run leaves both behind.
    pub fn finish(self, database: ReferenceDatabase) -> Result<()> {
        self.workspace.cleanup()?;
        database.remove()
    }
}

/// Classify every complete, not yet annotated sample under
/// `config.fasta_dir` and append one row per sample to the result store.
///
/// On error the staging and database directories are left in place.
pub fn run_pipeline(
    config: &PipelineConfig,
    builder: &dyn DatabaseBuilder,
    classifier: &dyn GenotypeClassifier,
    progress: &ProgressBar,
) -> Result<RunSummary> {
    let mut pipeline = Pipeline::prepare(config)?;
    pipeline.discover()?;
    let database = pipeline.build_database(builder)?;
    let summary = pipeline.classify(&database, classifier, progress)?;
    pipeline.finish(database)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_reports_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = dir.path().join("fasta");
        let refs = dir.path().join("refs");
        let key = dir.path().join("key.xlsx");

        let config = PipelineConfig::new(&fasta, &refs, &key);
        assert!(matches!(config.validate(), Err(GenotypeError::MissingInput(p)) if p == fasta));

        fs::create_dir(&fasta).unwrap();
        fs::create_dir(&refs).unwrap();
        assert!(matches!(config.validate(), Err(GenotypeError::MissingInput(p)) if p == key));

        fs::write(&key, b"").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.results_file(), fasta.join("results").join("results.tsv"));
    }
}
