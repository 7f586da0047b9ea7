//! Dispatch resolver: ranks scored candidates.
//!
//! Lowest cost wins; equal costs fall back to the candidate's tie key
//! (source id for forward searches, target id for reversed ones) so the
//! outcome never depends on the order path results came back in.

use std::cmp::Ordering;

use sd_request::Candidate;

fn by_rank(a: &Candidate, b: &Candidate) -> Ordering {
    a.cost.total_cmp(&b.cost).then(a.tie_key.cmp(&b.tie_key))
}

/// All candidates, best first.  The apply phase walks this list until a
/// source still accepts.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(by_rank);
    candidates
}

/// The single best candidate.
pub fn resolve(candidates: &[Candidate]) -> Option<Candidate> {
    candidates.iter().copied().min_by(by_rank)
}
