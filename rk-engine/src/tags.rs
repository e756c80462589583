//! Tag identity and pending operations
//!
//! The engine's fixed-purpose tags form a closed enumeration (`KnownTag`) that a
//! `TagTable` maps to concrete platform ids. Everything else (challenge tags,
//! category members, toggle tags) is operator-declared and travels as a plain
//! `TagId`; the table classifies those as `None`.

use rk_common::config::TagsConfig;
use rk_common::TagId;
use std::collections::{BTreeSet, HashMap};

/// A subject's tags. Ordered so diffs and logs are deterministic.
pub type TagSet = BTreeSet<TagId>;

/// Fixed-purpose tags. Group variants carry the tracked group's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownTag {
    Leader,
    Available,
    AvailableLeader,
    NotAvailable,
    Inactive,
    ExplainedInactive,
    Person,
    Newbie,
    InGroup(usize),
    GroupLeader(usize),
    AvailableNotInGroup(usize),
}

/// Anything a session accepts as a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRef {
    Known(KnownTag),
    Id(TagId),
}

impl From<KnownTag> for TagRef {
    fn from(tag: KnownTag) -> Self {
        TagRef::Known(tag)
    }
}

impl From<TagId> for TagRef {
    fn from(id: TagId) -> Self {
        TagRef::Id(id)
    }
}

/// Tags belonging to one tracked group (a voice channel)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedGroup {
    pub name: String,
    pub member: TagId,
    pub leader: Option<TagId>,
    pub available_not_in: Option<TagId>,
}

/// Lookup table between `KnownTag` and platform ids
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    leader: Option<TagId>,
    available: Option<TagId>,
    available_leader: Option<TagId>,
    not_available: Option<TagId>,
    inactive: Option<TagId>,
    explained_inactive: Option<TagId>,
    person: Option<TagId>,
    newbie: Option<TagId>,
    groups: Vec<TrackedGroup>,
    by_id: HashMap<TagId, KnownTag>,
}

impl TagTable {
    pub fn from_config(config: &TagsConfig) -> Self {
        let mut table = Self {
            leader: config.leader,
            available: config.available,
            available_leader: config.available_leader,
            not_available: config.not_available,
            inactive: config.inactive,
            explained_inactive: config.explained_inactive,
            person: config.person,
            newbie: config.newbie,
            groups: config
                .groups
                .iter()
                .map(|g| TrackedGroup {
                    name: g.name.clone(),
                    member: g.member,
                    leader: g.leader,
                    available_not_in: g.available_not_in,
                })
                .collect(),
            by_id: HashMap::new(),
        };
        table.by_id = table.index();
        table
    }

    fn index(&self) -> HashMap<TagId, KnownTag> {
        let mut by_id = HashMap::new();
        let fixed = [
            KnownTag::Leader,
            KnownTag::Available,
            KnownTag::AvailableLeader,
            KnownTag::NotAvailable,
            KnownTag::Inactive,
            KnownTag::ExplainedInactive,
            KnownTag::Person,
            KnownTag::Newbie,
        ];
        let grouped = (0..self.groups.len()).flat_map(|n| {
            [
                KnownTag::InGroup(n),
                KnownTag::GroupLeader(n),
                KnownTag::AvailableNotInGroup(n),
            ]
        });
        for key in fixed.into_iter().chain(grouped) {
            if let Some(id) = self.id(key) {
                by_id.entry(id).or_insert(key);
            }
        }
        by_id
    }

    /// Platform id for a known tag, `None` when not configured
    pub fn id(&self, key: KnownTag) -> Option<TagId> {
        match key {
            KnownTag::Leader => self.leader,
            KnownTag::Available => self.available,
            KnownTag::AvailableLeader => self.available_leader,
            KnownTag::NotAvailable => self.not_available,
            KnownTag::Inactive => self.inactive,
            KnownTag::ExplainedInactive => self.explained_inactive,
            KnownTag::Person => self.person,
            KnownTag::Newbie => self.newbie,
            KnownTag::InGroup(n) => self.groups.get(n).map(|g| g.member),
            KnownTag::GroupLeader(n) => self.groups.get(n).and_then(|g| g.leader),
            KnownTag::AvailableNotInGroup(n) => self.groups.get(n).and_then(|g| g.available_not_in),
        }
    }

    pub fn resolve(&self, tag: TagRef) -> Option<TagId> {
        match tag {
            TagRef::Known(key) => self.id(key),
            TagRef::Id(id) => Some(id),
        }
    }

    /// Which known tag an id stands for; `None` means operator-declared
    pub fn classify(&self, id: TagId) -> Option<KnownTag> {
        self.by_id.get(&id).copied()
    }

    /// Whether `tags` holds the known tag (false when unconfigured)
    pub fn holds(&self, tags: &TagSet, key: KnownTag) -> bool {
        self.id(key).is_some_and(|id| tags.contains(&id))
    }

    pub fn groups(&self) -> &[TrackedGroup] {
        &self.groups
    }

    /// Whether `tags` holds the member tag of any tracked group
    pub fn in_any_group(&self, tags: &TagSet) -> bool {
        self.groups.iter().any(|g| tags.contains(&g.member))
    }
}

/// Queued add/remove intents
///
/// The two sets never overlap: queuing an add cancels a pending removal of the
/// same tag and vice versa, so the last intent for a tag wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingOps {
    to_add: TagSet,
    to_remove: TagSet,
}

impl PendingOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tag: TagId) {
        self.to_remove.remove(&tag);
        self.to_add.insert(tag);
    }

    pub fn remove(&mut self, tag: TagId) {
        self.to_add.remove(&tag);
        self.to_remove.insert(tag);
    }

    pub fn to_add(&self) -> &TagSet {
        &self.to_add
    }

    pub fn to_remove(&self) -> &TagSet {
        &self.to_remove
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// `(base ∪ to_add) − to_remove`
    pub fn apply(&self, base: &TagSet) -> TagSet {
        base.union(&self.to_add)
            .filter(|tag| !self.to_remove.contains(*tag))
            .copied()
            .collect()
    }
}
