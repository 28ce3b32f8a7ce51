//src/types.rs

/// A single FASTA record. `id` is the first whitespace-delimited token of the
/// header, `description` the full header text without the leading `>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: String,
    pub description: String,
    pub seq: String,
}

impl SequenceRecord {
    /// A copy carrying a new identifier. The header becomes just the new id.
    pub fn renamed(&self, new_id: String) -> Self {
        Self {
            description: new_id.clone(),
            id: new_id,
            seq: self.seq.clone(),
        }
    }
}

/// All segment records sharing one strain key, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub strain: String,
    pub records: Vec<SequenceRecord>,
    /// Distinct assembly file names that contributed records, first-seen order.
    pub source_files: Vec<String>,
}

impl Sample {
    pub fn new(strain: impl Into<String>) -> Self {
        Self {
            strain: strain.into(),
            records: Vec::new(),
            source_files: Vec::new(),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.records.len()
    }
}

/// A flat, insertion-ordered `column -> value` mapping.
///
/// Setting a key that already exists keeps its position; a new key goes to
/// the end. Column order matters because the first row written fixes the
/// result store header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    entries: Vec<(String, String)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild the row in the given key order. Keys not present in the row
    /// are ignored; keys not named in `order` are dropped.
    pub fn reordered<S: AsRef<str>>(&self, order: &[S]) -> Self {
        let entries = order
            .iter()
            .filter_map(|k| {
                self.get(k.as_ref())
                    .map(|v| (k.as_ref().to_string(), v.to_string()))
            })
            .collect();
        Self { entries }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = ResultRow::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

/// The outcome of classifying one sample: the normalized row destined for
/// the result store plus the line printed to stdout.
#[derive(Debug, Clone)]
pub struct ClassifiedSample {
    pub strain: String,
    pub row: ResultRow,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_existing_key_keeps_position() {
        let mut row: ResultRow = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        row.set("a", "9");
        row.set("d", "4");
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
        assert_eq!(row.get("a"), Some("9"));
    }

    #[test]
    fn test_reordered_follows_given_order() {
        let row: ResultRow = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        let out = row.reordered(&["c", "a", "b"][..]);
        assert_eq!(out.values().collect::<Vec<_>>(), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_renamed_record_leaves_original() {
        let rec = SequenceRecord {
            id: "A/duck/1".into(),
            description: "A/duck/1 segment 4".into(),
            seq: "ACGT".into(),
        };
        let copy = rec.renamed("A/duck/1_4".into());
        assert_eq!(copy.id, "A/duck/1_4");
        assert_eq!(copy.description, "A/duck/1_4");
        assert_eq!(rec.id, "A/duck/1");
        assert_eq!(copy.seq, rec.seq);
    }
}
