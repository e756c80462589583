//! Category hierarchy resolver
//!
//! Operators declare categories purely through tag labels and ordering: a
//! boundary tag such as `──╱ badges ─` opens a category, and every tag below it
//! up to the next boundary belongs to it. One member may carry the exact
//! sentinel label (`🚫 none`) meaning "no member of this category held".
//!
//! All label sniffing lives here. Callers get typed `CategoryGroup`s.
//!
//! Operators can edit declarations at any time, so a hierarchy must be resolved
//! from a fresh listing on every use and never cached.

use crate::error::{Error, Result};
use crate::store::TagMeta;
use crate::tags::TagSet;
use rk_common::config::HierarchyConfig;
use rk_common::TagId;
use std::collections::HashSet;

/// A category: marker tag, member tags, optional "none" sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    /// The boundary tag itself; held by anyone normalized into the category
    pub marker: TagId,
    pub label: String,
    /// Non-sentinel members, in declaration order (highest position first)
    pub members: Vec<TagId>,
    pub sentinel: Option<TagId>,
}

impl CategoryGroup {
    /// Whether `tags` holds at least one non-sentinel member
    pub fn has_member_in(&self, tags: &TagSet) -> bool {
        self.members.iter().any(|m| tags.contains(m))
    }
}

/// Resolved categories of one collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryHierarchy {
    groups: Vec<CategoryGroup>,
}

impl CategoryHierarchy {
    /// Parse declared tags into categories
    ///
    /// # Errors
    ///
    /// `Error::InvalidHierarchy` if a tag id is declared twice, two tags share a
    /// position, or a category declares more than one sentinel. Ambiguous
    /// declarations are rejected rather than guessed at.
    pub fn resolve(declared: &[TagMeta], conventions: &HierarchyConfig) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut positions = HashSet::new();
        for tag in declared {
            if !ids.insert(tag.id) {
                return Err(Error::InvalidHierarchy(format!("tag {} declared twice", tag.id)));
            }
            if !positions.insert(tag.position) {
                return Err(Error::InvalidHierarchy(format!(
                    "position {} is shared by more than one tag (second: {:?})",
                    tag.position, tag.label
                )));
            }
        }

        let mut sorted: Vec<&TagMeta> = declared.iter().collect();
        sorted.sort_by(|a, b| b.position.cmp(&a.position));

        let mut groups: Vec<CategoryGroup> = Vec::new();
        let mut open = false;

        for tag in sorted {
            if is_boundary(&tag.label, conventions) {
                groups.push(CategoryGroup {
                    marker: tag.id,
                    label: tag.label.clone(),
                    members: Vec::new(),
                    sentinel: None,
                });
                open = true;
                continue;
            }

            if !open {
                continue;
            }
            // @everyone sits at the bottom and closes whatever is open
            if tag.is_default {
                open = false;
                continue;
            }
            let Some(group) = groups.last_mut() else {
                continue;
            };

            if tag.label == conventions.sentinel_label {
                if let Some(existing) = group.sentinel {
                    return Err(Error::InvalidHierarchy(format!(
                        "category {:?} has two sentinels ({} and {})",
                        group.label, existing, tag.id
                    )));
                }
                group.sentinel = Some(tag.id);
            } else if tag.label.trim().is_empty() {
                continue;
            } else {
                group.members.push(tag.id);
            }
        }

        tracing::debug!(categories = groups.len(), "Resolved category hierarchy");
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Category opened by `marker`
    pub fn group(&self, marker: TagId) -> Option<&CategoryGroup> {
        self.groups.iter().find(|g| g.marker == marker)
    }

    /// Category a member or sentinel tag belongs to
    pub fn group_of(&self, tag: TagId) -> Option<&CategoryGroup> {
        self.groups
            .iter()
            .find(|g| g.sentinel == Some(tag) || g.members.contains(&tag))
    }
}

fn is_boundary(label: &str, conventions: &HierarchyConfig) -> bool {
    label.starts_with(&conventions.boundary_prefix) && label.ends_with(&conventions.boundary_suffix)
}
