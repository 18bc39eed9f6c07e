//! In-memory has-many collection with change tracking.

use super::ModelRef;
use std::collections::BTreeSet;

/// One entry of a collection
#[derive(Debug, Clone)]
pub enum Member {
    Record(ModelRef),
    /// A bare primary key of an existing foreign row
    Key(i64),
}

impl Member {
    /// Primary key, `None` for records that were never saved
    pub fn id(&self) -> Option<i64> {
        match self {
            Member::Record(record) => record.id(),
            Member::Key(id) => Some(*id),
        }
    }

    pub fn record(&self) -> Option<&ModelRef> {
        match self {
            Member::Record(record) => Some(record),
            Member::Key(_) => None,
        }
    }
}

impl From<ModelRef> for Member {
    fn from(record: ModelRef) -> Self {
        Member::Record(record)
    }
}

impl From<&ModelRef> for Member {
    fn from(record: &ModelRef) -> Self {
        Member::Record(record.clone())
    }
}

impl From<i64> for Member {
    fn from(id: i64) -> Self {
        Member::Key(id)
    }
}

/// Members of a has-many association plus the ids it was loaded with
#[derive(Debug, Clone, Default)]
pub struct Collection {
    original: Vec<i64>,
    members: Vec<Member>,
    changed: bool,
}

impl Collection {
    /// Collection as fetched from the store
    pub fn loaded(records: Vec<ModelRef>) -> Self {
        let members: Vec<Member> = records.into_iter().map(Member::Record).collect();
        Self {
            original: members.iter().filter_map(Member::id).collect(),
            members,
            changed: false,
        }
    }

    /// Ids the collection was loaded (or last saved) with
    pub fn original(&self) -> &[i64] {
        &self.original
    }

    /// Ids of the current members that have one
    pub fn ids(&self) -> Vec<i64> {
        self.members.iter().filter_map(Member::id).collect()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Record members, in order
    pub fn records(&self) -> Vec<ModelRef> {
        self.members
            .iter()
            .filter_map(Member::record)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn contains(&self, id: i64) -> bool {
        self.members.iter().any(|m| m.id() == Some(id))
    }

    /// Add a member; a member whose id is already present is ignored
    pub fn push(&mut self, member: Member) -> bool {
        if let Some(id) = member.id() {
            if self.contains(id) {
                return false;
            }
        }
        self.members.push(member);
        self.changed = true;
        true
    }

    /// Remove the member with this id
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.id() != Some(id));
        let removed = before != self.members.len();
        self.changed |= removed;
        removed
    }

    /// Replace every member
    pub fn replace(&mut self, members: Vec<Member>) {
        self.members.clear();
        for member in members {
            if member.id().map_or(true, |id| !self.contains(id)) {
                self.members.push(member);
            }
        }
        self.changed = true;
    }

    /// `(removed, added)` relative to the original ids
    pub fn diff(&self) -> (Vec<i64>, Vec<i64>) {
        let current: BTreeSet<i64> = self.ids().into_iter().collect();
        let original: BTreeSet<i64> = self.original.iter().copied().collect();
        (
            original.difference(&current).copied().collect(),
            current.difference(&original).copied().collect(),
        )
    }

    /// Accept the current members as the new original state
    pub fn commit(&mut self) {
        self.original = self.ids();
        self.changed = false;
    }
}
