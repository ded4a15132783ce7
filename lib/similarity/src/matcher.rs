//! The capability shared by every identity matcher

use idmatch_core::{IdentityRecord, MatchMethod, SimilarityResult};

/// Something that can decide whether two records describe one person
///
/// Implementations never fail outright: problems are reported as a failed
/// [`SimilarityResult`] carrying an error in its details.
pub trait IdentityMatcher: Send + Sync {
    fn method(&self) -> MatchMethod;

    fn compare(&self, record1: &IdentityRecord, record2: &IdentityRecord) -> SimilarityResult;

    fn is_same_person(&self, record1: &IdentityRecord, record2: &IdentityRecord) -> bool {
        self.compare(record1, record2).is_same_person
    }
}
