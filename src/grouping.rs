//src/grouping.rs

use ahash::{AHashMap, AHashSet};
use std::path::PathBuf;

use crate::error::Result;
use crate::fasta::read_fasta_records;
use crate::types::Sample;

/// Number of genome segments that make up one complete sample.
pub const EXPECTED_SEGMENTS: usize = 8;

/// Group the records of every assembly file by their raw identifier.
///
/// Files are read in the order given (callers pass them sorted). A strain key
/// that shows up in several files accumulates records from all of them; no
/// completeness check happens here.
pub fn group_samples(files: &[PathBuf]) -> Result<Vec<Sample>> {
    let mut samples: Vec<Sample> = Vec::new();
    let mut index: AHashMap<String, usize> = AHashMap::new();

    for path in files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        for record in read_fasta_records(path)? {
            let slot = *index.entry(record.id.clone()).or_insert_with(|| {
                samples.push(Sample::new(record.id.clone()));
                samples.len() - 1
            });
            let sample = &mut samples[slot];
            if !sample.source_files.contains(&file_name) {
                sample.source_files.push(file_name.clone());
            }
            sample.records.push(record);
        }
    }

    log::info!(
        "Grouped {} strain(s) from {} assembly file(s)",
        samples.len(),
        files.len()
    );
    Ok(samples)
}

/// Samples that are complete and not yet annotated, in grouping order.
///
/// A sample with more records than expected (usually the same assembly
/// present twice) is rejected like a short one, but with a warning.
pub fn eligible_samples<'a>(
    samples: &'a [Sample],
    annotated: &'a AHashSet<String>,
    expected: usize,
) -> impl Iterator<Item = &'a Sample> + 'a {
    samples.iter().filter(move |sample| {
        let n = sample.segment_count();
        if n > expected {
            log::warn!(
                "Skipping {}: {} records for {} segments (duplicate inputs?)",
                sample.strain,
                n,
                expected
            );
            return false;
        }
        if n < expected {
            log::debug!("Skipping incomplete {} ({}/{})", sample.strain, n, expected);
            return false;
        }
        if annotated.contains(&sample.strain) {
            log::debug!("Skipping already annotated {}", sample.strain);
            return false;
        }
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SequenceRecord;
    use std::fmt::Write as _;
    use std::fs;

    fn fasta_for(strain: &str, n: usize) -> String {
        let mut out = String::new();
        for i in 0..n {
            let _ = write!(out, ">{strain} seg{}\nACGT{i}\n", i + 1);
        }
        out
    }

    fn sample(strain: &str, n: usize) -> Sample {
        let mut s = Sample::new(strain);
        for i in 0..n {
            s.records.push(SequenceRecord {
                id: strain.into(),
                description: strain.into(),
                seq: format!("A{i}"),
            });
        }
        s
    }

    #[test]
    fn test_group_across_files_keeps_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.fasta");
        let b = dir.path().join("b.fasta");
        fs::write(&a, format!("{}{}", fasta_for("X", 5), fasta_for("Y", 8))).unwrap();
        fs::write(&b, fasta_for("X", 3)).unwrap();

        let samples = group_samples(&[a, b]).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].strain, "X");
        assert_eq!(samples[0].segment_count(), 8);
        assert_eq!(samples[0].source_files, vec!["a.fasta", "b.fasta"]);
        assert_eq!(samples[0].records[5].description, "X seg1");
        assert_eq!(samples[1].strain, "Y");
        assert_eq!(samples[1].source_files, vec!["a.fasta"]);
    }

    #[test]
    fn test_eligible_requires_exact_count() {
        let samples = vec![
            sample("short", 7),
            sample("ok", 8),
            sample("long", 9),
            sample("six", 6),
        ];
        let annotated = AHashSet::new();
        let picked: Vec<_> = eligible_samples(&samples, &annotated, EXPECTED_SEGMENTS)
            .map(|s| s.strain.as_str())
            .collect();
        assert_eq!(picked, vec!["ok"]);
    }

    #[test]
    fn test_eligible_skips_annotated() {
        let samples = vec![sample("X", 8), sample("Y", 8), sample("Z", 8)];
        let annotated: AHashSet<String> = ["Y".to_string()].into_iter().collect();
        let picked: Vec<_> = eligible_samples(&samples, &annotated, EXPECTED_SEGMENTS)
            .map(|s| s.strain.as_str())
            .collect();
        assert_eq!(picked, vec!["X", "Z"]);
    }
}
