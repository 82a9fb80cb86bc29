use crate::errors::{Result, TaxoError};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub parent_id: u64,
    pub rank_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Added,
    /// The same child already hangs under the same parent.
    Exists,
}

/// Parent edges of the tree, keyed by child id.
///
/// A child has exactly one parent. Re-asserting that edge is a no-op; asking
/// for a different parent is refused with [`TaxoError::ParentConflict`] and the
/// stored edge is kept.
#[derive(Debug, Default, Clone)]
pub struct LinkStore {
    parents: HashMap<u64, Link>,
    children: HashMap<u64, BTreeSet<u64>>,
}

impl LinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_link(&mut self, child_id: u64, parent_id: u64, rank_code: &str) -> Result<LinkOutcome> {
        if let Some(link) = self.parents.get(&child_id) {
            if link.parent_id == parent_id {
                return Ok(LinkOutcome::Exists);
            }
            return Err(TaxoError::ParentConflict {
                child: child_id,
                existing: link.parent_id,
                requested: parent_id,
            });
        }

        self.parents.insert(
            child_id,
            Link {
                parent_id,
                rank_code: rank_code.to_string(),
            },
        );
        // the root's self edge is not a child relation
        if child_id != parent_id {
            self.children.entry(parent_id).or_default().insert(child_id);
        }
        Ok(LinkOutcome::Added)
    }

    pub fn get(&self, child_id: u64) -> Option<&Link> {
        self.parents.get(&child_id)
    }

    pub fn parent(&self, child_id: u64) -> Option<u64> {
        self.parents.get(&child_id).map(|link| link.parent_id)
    }

    pub fn rank_code(&self, child_id: u64) -> Option<&str> {
        self.parents.get(&child_id).map(|link| link.rank_code.as_str())
    }

    pub fn is_linked(&self, child_id: u64) -> bool {
        self.parents.contains_key(&child_id)
    }

    /// Children of `parent_id` in ascending id order.
    pub fn children(&self, parent_id: u64) -> impl Iterator<Item = u64> + '_ {
        self.children
            .get(&parent_id)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}
