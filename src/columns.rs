//src/columns.rs

use crate::error::{GenotypeError, Result};
use crate::types::ResultRow;

pub const STRAIN: &str = "Strain";
pub const GENOTYPE: &str = "Genotype";
pub const SAMPLE: &str = "sample";
pub const FILE_NAME: &str = "File Name";
pub const DATE: &str = "date";
pub const DATE_RUN: &str = "Date run";
pub const SEGMENTS_USED: &str = "Genotype List Used, >=98%";
pub const COVERAGE: &str = "Genotype Average Depth of Coverage List";

/// Stand-in for the coverage column: assemblies carry no read depth.
pub const COVERAGE_PLACEHOLDER: &str = "Ran on FASTA - No Coverage Report";

/// What to do when the classifier output lacks a column the ordering relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnPolicy {
    /// Keep the classifier's own order and log a warning.
    #[default]
    Lenient,
    /// Fail with `GenotypeError::SchemaMismatch`.
    Strict,
}

/// Declarative column layout for result rows.
///
/// Final order: `leading`, then every other column in its original order,
/// then `trailing`. Columns in `dropped` are removed.
#[derive(Debug, Clone)]
pub struct ColumnOrder {
    pub leading: Vec<String>,
    pub trailing: Vec<String>,
    pub dropped: Vec<String>,
    pub policy: ColumnPolicy,
}

impl ColumnOrder {
    /// `Strain`, `Genotype`, the rest, then `File Name` and `date`;
    /// the classifier's internal `sample` name is dropped.
    pub fn canonical(policy: ColumnPolicy) -> Self {
        Self {
            leading: vec![STRAIN.into(), GENOTYPE.into()],
            trailing: vec![FILE_NAME.into(), DATE.into()],
            dropped: vec![SAMPLE.into()],
            policy,
        }
    }

    fn required(&self) -> impl Iterator<Item = &String> {
        self.dropped
            .iter()
            .chain(self.leading.iter())
            .chain(self.trailing.iter())
    }

    /// Apply the layout to `row`. Under `Lenient`, columns the row lacks are
    /// simply left out of the layout.
    pub fn apply(&self, row: ResultRow) -> Result<ResultRow> {
        let missing: Vec<String> = self
            .required()
            .filter(|k| !row.contains_key(k))
            .cloned()
            .collect();

        if !missing.is_empty() {
            match self.policy {
                ColumnPolicy::Strict => return Err(GenotypeError::SchemaMismatch { missing }),
                ColumnPolicy::Lenient => {
                    if missing.len() == self.required().count() {
                        log::warn!("None of the expected columns are present in classifier output");
                    } else {
                        log::warn!(
                            "Classifier output lacks column(s) {}; ordering the rest",
                            missing.join(", ")
                        );
                    }
                }
            }
        }

        // Absent leading/trailing keys are skipped by `reordered`.
        let pinned = |k: &str| self.required().any(|r| r == k);
        let mut order: Vec<&str> = self.leading.iter().map(String::as_str).collect();
        order.extend(row.keys().filter(|k| !pinned(*k)));
        order.extend(self.trailing.iter().map(String::as_str));
        Ok(row.reordered(order.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_row() -> ResultRow {
        [
            ("sample", "staged"),
            ("date", "2024-05-01"),
            ("Genotype", "B3.13"),
            ("PB2", "am4.4"),
            ("File Name", "run1.fasta"),
            ("Strain", "A/cow/1"),
            ("Date run", "2024-05-01"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_canonical_layout() {
        let out = ColumnOrder::canonical(ColumnPolicy::Strict)
            .apply(stats_row())
            .unwrap();
        assert_eq!(
            out.keys().collect::<Vec<_>>(),
            vec!["Strain", "Genotype", "PB2", "Date run", "File Name", "date"]
        );
        assert_eq!(out.get("Strain"), Some("A/cow/1"));
    }

    #[test]
    fn test_lenient_orders_present_columns() {
        let mut row = stats_row();
        row.remove("date");
        let out = ColumnOrder::canonical(ColumnPolicy::Lenient).apply(row).unwrap();
        assert_eq!(
            out.keys().collect::<Vec<_>>(),
            vec!["Strain", "Genotype", "PB2", "Date run", "File Name"]
        );
    }

    #[test]
    fn test_lenient_without_any_expected_column() {
        let row: ResultRow = [("b", "2"), ("a", "1")].into_iter().collect();
        let out = ColumnOrder::canonical(ColumnPolicy::Lenient).apply(row).unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_strict_reports_missing() {
        let mut row = stats_row();
        row.remove("date");
        row.remove("Genotype");
        match ColumnOrder::canonical(ColumnPolicy::Strict).apply(row) {
            Err(GenotypeError::SchemaMismatch { missing }) => {
                assert_eq!(missing, vec!["Genotype", "date"])
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }
}
