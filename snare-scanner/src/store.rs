use crate::result::{ScanResult, Statistics};

/// Ordered, identity-deduplicated collection of scan results.
///
/// Lookups are linear scans; result volumes are bounded by page size.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    results: Vec<ScanResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result unless one with the same identity is already stored.
    /// Returns whether the result was kept.
    pub fn add(&mut self, result: ScanResult) -> bool {
        if self.contains(&result) {
            return false;
        }
        self.results.push(result);
        true
    }

    pub fn extend<I: IntoIterator<Item = ScanResult>>(&mut self, results: I) -> usize {
        results.into_iter().filter(|r| self.add(r.clone())).count()
    }

    pub fn contains(&self, result: &ScanResult) -> bool {
        self.results.iter().any(|r| r.same_identity(result))
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    pub fn all(&self) -> &[ScanResult] {
        &self.results
    }

    pub fn to_vec(&self) -> Vec<ScanResult> {
        self.results.clone()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::from_results(&self.results)
    }
}
