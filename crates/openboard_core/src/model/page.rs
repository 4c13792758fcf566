use serde::{Deserialize, Serialize};

/// One page of finder results plus the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the filter, ignoring limit and offset.
    pub total: u64,
    /// Effective limit after default/clamp normalization.
    pub applied_limit: u32,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
