//! Challenge point scoring
//!
//! Completed challenges are tags labelled `🏆<tier> <name> /+<points>/`, with
//! tier 🟢 (base), ⭐ (star) or ☄️ (ultimate). A subject's score is the sum of
//! the points of every challenge tag it holds.

use crate::rank::{self, RankEntry};
use crate::store::TagMeta;
use crate::tags::TagSet;
use once_cell::sync::Lazy;
use regex::Regex;
use rk_common::{SubjectId, TagId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static CHALLENGE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^🏆(🟢|⭐|☄\x{FE0F}?)\s+(.+?)\s+/\+(\d+)/$").expect("challenge label pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeTier {
    Base,
    Star,
    Ultimate,
}

impl ChallengeTier {
    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "🟢" => Some(ChallengeTier::Base),
            "⭐" => Some(ChallengeTier::Star),
            m if m.starts_with('☄') => Some(ChallengeTier::Ultimate),
            _ => None,
        }
    }
}

/// A parsed challenge tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeTag {
    pub id: TagId,
    pub tier: ChallengeTier,
    pub name: String,
    pub points: u64,
}

impl ChallengeTag {
    /// Parse a declared tag; `None` unless the label is a challenge label
    pub fn parse(meta: &TagMeta) -> Option<Self> {
        let caps = CHALLENGE_LABEL.captures(&meta.label)?;
        Some(Self {
            id: meta.id,
            tier: ChallengeTier::from_marker(caps.get(1)?.as_str())?,
            name: caps.get(2)?.as_str().to_string(),
            points: caps.get(3)?.as_str().parse().ok()?,
        })
    }
}

/// Challenge tags of one collection, keyed by id
#[derive(Debug, Clone, Default)]
pub struct ChallengeCatalog {
    by_id: HashMap<TagId, ChallengeTag>,
}

impl ChallengeCatalog {
    pub fn from_declared(declared: &[TagMeta]) -> Self {
        Self {
            by_id: declared
                .iter()
                .filter_map(ChallengeTag::parse)
                .map(|c| (c.id, c))
                .collect(),
        }
    }

    pub fn get(&self, id: TagId) -> Option<&ChallengeTag> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Total points for a tag set
    pub fn score(&self, tags: &TagSet) -> u64 {
        self.held(tags).iter().map(|c| c.points).sum()
    }

    /// Challenges held, highest points first (ties by id)
    pub fn held(&self, tags: &TagSet) -> Vec<&ChallengeTag> {
        let mut held: Vec<&ChallengeTag> = tags.iter().filter_map(|id| self.by_id.get(id)).collect();
        held.sort_by(|a, b| b.points.cmp(&a.points).then(a.id.cmp(&b.id)));
        held
    }

    /// Competition ranking of the given subjects by score
    pub fn leaderboard<'a>(
        &self,
        subjects: impl IntoIterator<Item = (SubjectId, &'a TagSet)>,
    ) -> Vec<RankEntry> {
        let scores: Vec<(SubjectId, u64)> = subjects
            .into_iter()
            .map(|(subject, tags)| (subject, self.score(tags)))
            .collect();
        rank::rank(&scores)
    }
}
