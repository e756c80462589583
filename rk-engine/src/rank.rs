//! Competition ranking
//!
//! Equal scores share a rank and the next distinct score skips by the size of
//! the tie (`10, 10, 7` ranks `1, 1, 3`). Zero scores are left out entirely.

use rk_common::SubjectId;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Subjects sharing one score and therefore one rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub rank: usize,
    pub score: u64,
    /// Ordered by subject id
    pub subjects: Vec<SubjectId>,
}

/// Rank `(subject, score)` pairs, best first
///
/// Each subject is expected once; a repeated subject is ranked once per
/// occurrence.
pub fn rank(scores: &[(SubjectId, u64)]) -> Vec<RankEntry> {
    let mut by_score: BTreeMap<Reverse<u64>, Vec<SubjectId>> = BTreeMap::new();
    for &(subject, score) in scores {
        if score > 0 {
            by_score.entry(Reverse(score)).or_default().push(subject);
        }
    }

    let mut ahead = 0;
    by_score
        .into_iter()
        .map(|(Reverse(score), mut subjects)| {
            subjects.sort();
            let entry = RankEntry {
                rank: ahead + 1,
                score,
                subjects,
            };
            ahead += entry.subjects.len();
            entry
        })
        .collect()
}

/// Rank held by `subject`, `None` if unranked
pub fn rank_of(entries: &[RankEntry], subject: SubjectId) -> Option<usize> {
    entries
        .iter()
        .find(|e| e.subjects.contains(&subject))
        .map(|e| e.rank)
}
