use serde::{Deserialize, Serialize};

/// Coverage of one resolution pass. Phoneless rows are counted here, not matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub contacts_indexed: usize,
    pub contacts_without_phone: usize,
    pub calls_considered: usize,
    pub calls_without_phone: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Matched calls with more than one candidate contact.
    pub ambiguous: usize,
}
