use crate::model::{CatalogEntry, CatalogError};

/// Flattened, read-only set of labeled reference sentences.
///
/// The position of an entry in [`IntentCatalog::entries`] is the column index
/// used by every similarity row.
#[derive(Debug, Clone)]
pub struct IntentCatalog {
    entries: Vec<CatalogEntry>,
}

impl IntentCatalog {
    /// Flattens groups in order, then sentences within each group in order.
    pub fn load<L, S, I>(groups: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (L, S)>,
        L: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let mut entries = Vec::new();
        for (label, sentences) in groups {
            for sentence in sentences {
                entries.push(CatalogEntry {
                    label: label.as_ref().to_string(),
                    reference_text: sentence.as_ref().to_string(),
                });
            }
        }

        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.label.as_str())
    }

    /// Distinct labels in first-seen order.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !labels.contains(&entry.label.as_str()) {
                labels.push(&entry.label);
            }
        }
        labels
    }
}
