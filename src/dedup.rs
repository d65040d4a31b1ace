use crate::normalizer::Fingerprint;
use std::collections::HashSet;

/// Per-run set of fingerprints already accepted.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: HashSet<Fingerprint>,
}

impl DedupStore {
    /// Returns `true` the first time a fingerprint is seen; blank text is never accepted.
    pub fn accept(&mut self, text: &str) -> bool {
        match Fingerprint::of(text) {
            Some(fp) => self.seen.insert(fp),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
