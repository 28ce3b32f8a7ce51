//src/classifier.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::blastdb::ReferenceDatabase;
use crate::columns::{
    ColumnOrder, COVERAGE, COVERAGE_PLACEHOLDER, DATE, DATE_RUN, FILE_NAME, GENOTYPE,
    SEGMENTS_USED, STRAIN,
};
use crate::error::{io_err, GenotypeError, Result};
use crate::fasta::write_fasta_records;
use crate::process::run_command;
use crate::types::{ClassifiedSample, ResultRow, Sample, SequenceRecord};
use crate::workspace::Workspace;

/// Inputs for one classification call.
#[derive(Debug)]
pub struct ClassifyRequest<'a> {
    /// Staged FASTA holding the renamed segments of one sample.
    pub fasta: &'a Path,
    /// Path prefix for any files the classifier writes.
    pub sample_name: &'a Path,
    pub database: &'a ReferenceDatabase,
}

/// Per-sample statistics from the classifier, in its own column order.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub stats: ResultRow,
}

impl Classification {
    pub fn genotype(&self) -> &str {
        self.stats.get(GENOTYPE).unwrap_or_default()
    }

    /// Segment calls that passed the classifier's identity threshold.
    pub fn segments_used(&self) -> &str {
        self.stats.get(SEGMENTS_USED).unwrap_or_default()
    }
}

/// The alignment + genotype-calling step. Called exactly once per sample.
pub trait GenotypeClassifier {
    fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification>;
}

/// Parse a two-line stats table (header, values) into an ordered row.
pub fn parse_stats_tsv(text: &str) -> Result<ResultRow> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| GenotypeError::ClassifierOutput("empty stats file".into()))?;
    let values = lines
        .next()
        .ok_or_else(|| GenotypeError::ClassifierOutput("stats file has no value row".into()))?;

    let keys: Vec<&str> = header.trim_end_matches('\r').split('\t').collect();
    let vals: Vec<&str> = values.trim_end_matches('\r').split('\t').collect();
    if keys.len() != vals.len() {
        return Err(GenotypeError::ClassifierOutput(format!(
            "stats header has {} columns but value row has {}",
            keys.len(),
            vals.len()
        )));
    }
    Ok(keys.into_iter().zip(vals).collect())
}

/// Runs the GenoFLU command line and reads its `<sample_name>_stats.tsv`.
#[derive(Debug, Clone)]
pub struct GenoFluCommand {
    pub program: PathBuf,
    /// Placed before the standard arguments, e.g. the script when `program`
    /// is an interpreter.
    pub leading_args: Vec<String>,
    pub reference_dir: PathBuf,
    pub cross_reference: PathBuf,
    pub timeout: Option<Duration>,
}

impl GenotypeClassifier for GenoFluCommand {
    fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("-f")
            .arg(request.fasta)
            .arg("-i")
            .arg(&self.reference_dir)
            .arg("-c")
            .arg(&self.cross_reference)
            .arg("-n")
            .arg(request.sample_name)
            .arg("-b")
            .arg(&request.database.prefix);
        run_command(cmd, None, self.timeout)?;

        let mut stats_path = request.sample_name.as_os_str().to_owned();
        stats_path.push("_stats.tsv");
        let stats_path = PathBuf::from(stats_path);
        if !stats_path.exists() {
            return Err(GenotypeError::ClassifierOutput(format!(
                "{} produced no {:?}",
                self.program.display(),
                stats_path
            )));
        }
        let text = fs::read_to_string(&stats_path).map_err(io_err(&stats_path))?;
        Ok(Classification {
            stats: parse_stats_tsv(&text)?,
        })
    }
}

/// Copies of the sample's records with `_1`, `_2`, ... appended to the ids,
/// so segments of the same strain do not collide once staged together.
pub fn renamed_segments(sample: &Sample) -> Vec<SequenceRecord> {
    sample
        .records
        .iter()
        .enumerate()
        .map(|(i, rec)| rec.renamed(format!("{}_{}", rec.id, i + 1)))
        .collect()
}

/// Flatten classifier statistics into a result row for `sample`.
pub fn normalize(
    sample: &Sample,
    classification: Classification,
    columns: &ColumnOrder,
) -> Result<ResultRow> {
    let mut row = classification.stats;
    row.set(FILE_NAME, sample.source_files.join(","));
    row.set(COVERAGE, COVERAGE_PLACEHOLDER);
    row.set(STRAIN, sample.strain.clone());
    let date = row.get(DATE).unwrap_or_default().to_string();
    row.set(DATE_RUN, date);
    columns.apply(row)
}

/// Stage one complete sample, classify it and build its result row.
///
/// The staging directory is emptied before this returns, whatever the outcome.
pub fn classify_sample(
    sample: &Sample,
    database: &ReferenceDatabase,
    workspace: &Workspace,
    classifier: &dyn GenotypeClassifier,
    columns: &ColumnOrder,
) -> Result<ClassifiedSample> {
    let _guard = workspace.stage();

    let fasta = workspace.staged_fasta();
    let sample_name = workspace.staged_sample_name();
    write_fasta_records(&fasta, &renamed_segments(sample))?;

    let classification = classifier.classify(&ClassifyRequest {
        fasta: &fasta,
        sample_name: &sample_name,
        database,
    })?;

    let summary = format!(
        "{} Genotype --> {}: {}",
        sample.strain,
        classification.genotype(),
        classification.segments_used()
    );
    let row = normalize(sample, classification, columns)?;

    Ok(ClassifiedSample {
        strain: sample.strain.clone(),
        row,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnPolicy;
    use crate::fasta::read_fasta_records;
    use std::cell::RefCell;

    fn sample(strain: &str) -> Sample {
        let mut s = Sample::new(strain);
        s.source_files.push("run1.fasta".into());
        for i in 0..8 {
            s.records.push(SequenceRecord {
                id: strain.into(),
                description: format!("{strain} segment"),
                seq: format!("ACGT{i}"),
            });
        }
        s
    }

    fn database(dir: &Path) -> ReferenceDatabase {
        ReferenceDatabase {
            dir: dir.join("blast"),
            prefix: dir.join("blast").join("db"),
            title: "db".into(),
        }
    }

    struct Fake {
        staged: RefCell<Vec<SequenceRecord>>,
        fail: bool,
    }

    impl GenotypeClassifier for Fake {
        fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification> {
            *self.staged.borrow_mut() = read_fasta_records(request.fasta)?;
            if self.fail {
                return Err(GenotypeError::ClassifierOutput("boom".into()));
            }
            let stats = parse_stats_tsv(
                "sample\tdate\tGenotype\tGenotype List Used, >=98%\tGenotype Average Depth of Coverage List\n\
                 staged\t2024-05-01\tB3.13\tPB2:am4.4, PB1:am4.4\t\n",
            )?;
            Ok(Classification { stats })
        }
    }

    #[test]
    fn test_classify_sample_stages_renamed_copies() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();
        let s = sample("A/cow/1");
        let fake = Fake {
            staged: RefCell::new(Vec::new()),
            fail: false,
        };

        let out = classify_sample(
            &s,
            &database(dir.path()),
            &ws,
            &fake,
            &ColumnOrder::canonical(ColumnPolicy::Strict),
        )
        .unwrap();

        let staged = fake.staged.borrow();
        let ids: Vec<_> = staged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids[0], "A/cow/1_1");
        assert_eq!(ids[7], "A/cow/1_8");
        assert_eq!(staged[0].description, "A/cow/1_1");
        assert!(s.records.iter().all(|r| r.id == "A/cow/1"));

        assert_eq!(out.summary, "A/cow/1 Genotype --> B3.13: PB2:am4.4, PB1:am4.4");
        assert_eq!(
            out.row.keys().collect::<Vec<_>>(),
            vec![
                "Strain",
                "Genotype",
                "Genotype List Used, >=98%",
                "Genotype Average Depth of Coverage List",
                "Date run",
                "File Name",
                "date"
            ]
        );
        assert_eq!(out.row.get("Strain"), Some("A/cow/1"));
        assert_eq!(out.row.get("Date run"), Some("2024-05-01"));
        assert_eq!(out.row.get("File Name"), Some("run1.fasta"));
        assert_eq!(out.row.get(COVERAGE), Some(COVERAGE_PLACEHOLDER));
        assert_eq!(fs::read_dir(&ws.staging_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_failure_still_clears_staging() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();
        let fake = Fake {
            staged: RefCell::new(Vec::new()),
            fail: true,
        };
        let res = classify_sample(
            &sample("X"),
            &database(dir.path()),
            &ws,
            &fake,
            &ColumnOrder::canonical(ColumnPolicy::Lenient),
        );
        assert!(matches!(res, Err(GenotypeError::ClassifierOutput(_))));
        assert_eq!(fake.staged.borrow().len(), 8);
        assert_eq!(fs::read_dir(&ws.staging_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_parse_stats_rejects_ragged_rows() {
        assert!(parse_stats_tsv("a\tb\n1\n").is_err());
        assert!(parse_stats_tsv("a\tb\n").is_err());
        let row = parse_stats_tsv("b\ta\r\n2\t1\r\n").unwrap();
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_genoflu_command_reads_stats_file() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();
        let script = dir.path().join("fake_genoflu.sh");
        fs::write(
            &script,
            "#!/bin/sh\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-n\" ]; then name=\"$2\"; fi\n  shift\ndone\n\
             printf 'sample\\tGenotype\\n%s\\tD1.1\\n' \"$(basename \"$name\")\" > \"${name}_stats.tsv\"\n",
        )
        .unwrap();

        let cmd = GenoFluCommand {
            program: PathBuf::from("sh"),
            leading_args: vec![script.to_string_lossy().to_string()],
            reference_dir: dir.path().to_path_buf(),
            cross_reference: dir.path().join("key.xlsx"),
            timeout: Some(Duration::from_secs(30)),
        };
        write_fasta_records(ws.staged_fasta(), &renamed_segments(&sample("X"))).unwrap();
        let out = cmd
            .classify(&ClassifyRequest {
                fasta: &ws.staged_fasta(),
                sample_name: &ws.staged_sample_name(),
                database: &database(dir.path()),
            })
            .unwrap();
        assert_eq!(out.genotype(), "D1.1");
        assert_eq!(out.stats.get("sample"), Some("staged"));
    }
}
