//! Derivation passes run on every commit
//!
//! Both passes rewrite a desired tag set in place and are idempotent: running
//! either twice on its own output changes nothing. They always run in the
//! same order, dependent rules first and category normalization second, so a
//! tag that is both dependent and a category member ends up with the category
//! verdict.

use crate::hierarchy::CategoryHierarchy;
use crate::tags::{KnownTag, TagSet, TagTable};
use rk_common::TagId;

/// Ensure or clear a dependent tag. Unconfigured tags are skipped.
fn set(tags: &mut TagSet, id: Option<TagId>, condition: bool) {
    let Some(id) = id else {
        return;
    };
    if condition {
        tags.insert(id);
    } else {
        tags.remove(&id);
    }
}

/// Re-derive every dependent tag from the facts held in `tags`
///
/// Facts are `Leader`, `Available`, `Inactive` and each group's membership;
/// everything this pass writes is recomputed from those and never read back.
pub fn apply_dependent_rules(table: &TagTable, tags: &mut TagSet) {
    let is_leader = table.holds(tags, KnownTag::Leader);
    let is_available = table.holds(tags, KnownTag::Available);
    let is_inactive = table.holds(tags, KnownTag::Inactive);

    for group in table.groups() {
        let in_group = tags.contains(&group.member);
        set(tags, group.leader, is_leader && in_group);
        set(tags, group.available_not_in, is_available && !in_group);
    }

    set(tags, table.id(KnownTag::AvailableLeader), is_leader && is_available);
    set(tags, table.id(KnownTag::NotAvailable), !is_available && !is_inactive);

    if is_inactive {
        set(tags, table.id(KnownTag::Person), false);
    } else {
        set(tags, table.id(KnownTag::ExplainedInactive), false);
        set(tags, table.id(KnownTag::Person), true);
    }
}

/// Bring every category's marker and sentinel in line with its members
///
/// - holds a member: marker on, sentinel off
/// - holds none, category has a sentinel: marker and sentinel on
/// - holds none, no sentinel: marker off
pub fn normalize_categories(hierarchy: &CategoryHierarchy, tags: &mut TagSet) {
    for group in hierarchy.groups() {
        if group.has_member_in(tags) {
            tags.insert(group.marker);
            if let Some(sentinel) = group.sentinel {
                tags.remove(&sentinel);
            }
        } else if let Some(sentinel) = group.sentinel {
            tags.insert(group.marker);
            tags.insert(sentinel);
        } else {
            tags.remove(&group.marker);
        }
    }
}

/// Both passes, in their fixed order
pub fn derive(table: &TagTable, hierarchy: &CategoryHierarchy, tags: &mut TagSet) {
    apply_dependent_rules(table, tags);
    normalize_categories(hierarchy, tags);
}
