//! Ordered class-index to label lookup

use std::collections::HashMap;
use vitserve_core::{Error, Result};

/// Fixed-size, ordered label table loaded alongside a model.
///
/// Index `i` holds the name of class `i`. Lookups are bounds-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Build a table from labels already in class order
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(Error::config("label table must contain at least one label"));
        }
        Ok(Self { labels })
    }

    /// Build a table from a model config's `id2label` map.
    ///
    /// Keys are stringified class indices. Indices below `num_labels` that
    /// the map does not name get the hub's default `LABEL_{i}` name.
    pub fn from_id2label(id2label: &HashMap<String, String>, num_labels: Option<usize>) -> Result<Self> {
        let mut indexed = Vec::with_capacity(id2label.len());
        for (key, label) in id2label {
            let idx: usize = key.trim().parse().map_err(|_| {
                Error::config(format!("id2label key '{}' is not a class index", key))
            })?;
            indexed.push((idx, label.clone()));
        }

        let size = indexed
            .iter()
            .map(|(idx, _)| idx + 1)
            .max()
            .unwrap_or(0)
            .max(num_labels.unwrap_or(0));

        let mut labels: Vec<Option<String>> = vec![None; size];
        for (idx, label) in indexed {
            labels[idx] = Some(label);
        }

        Self::new(
            labels
                .into_iter()
                .enumerate()
                .map(|(idx, label)| label.unwrap_or_else(|| format!("LABEL_{}", idx))),
        )
    }

    /// Label for a class index
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    /// Class index for a label
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in class order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id2label(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_orders_by_index() {
        let table = LabelTable::from_id2label(&id2label(&[("1", "Fake"), ("0", "Real")]), None).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0), Some("Real"));
        assert_eq!(table.get(1), Some("Fake"));
        assert_eq!(table.get(2), None);
        assert_eq!(table.iter().collect::<Vec<_>>(), vec!["Real", "Fake"]);
    }

    #[test]
    fn test_fills_gaps_with_default_names() {
        let table = LabelTable::from_id2label(&id2label(&[("2", "cat")]), Some(4)).unwrap();

        assert_eq!(
            table.iter().collect::<Vec<_>>(),
            vec!["LABEL_0", "LABEL_1", "cat", "LABEL_3"]
        );
    }

    #[test]
    fn test_rejects_non_numeric_keys() {
        let err = LabelTable::from_id2label(&id2label(&[("zero", "Real")]), None).unwrap_err();
        assert!(err.to_string().contains("zero"));
    }

    #[test]
    fn test_rejects_empty_table() {
        assert!(LabelTable::from_id2label(&HashMap::new(), None).is_err());
        assert!(LabelTable::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_index_of() {
        let table = LabelTable::new(["Real", "Fake"]).unwrap();
        assert_eq!(table.index_of("Fake"), Some(1));
        assert_eq!(table.index_of("Other"), None);
    }
}
