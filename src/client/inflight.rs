use std::sync::Arc;

use dashmap::DashMap;

use crate::models::{Id, VoteTarget};

/// Registry of outstanding mutations, keyed by what they act on. Screens use
/// it to keep a vote button or reply form disabled until the request settles.
#[derive(Clone, Default)]
pub struct InFlight {
    pending: Arc<DashMap<String, ()>>,
}

/// Marks a mutation as outstanding until dropped.
#[must_use = "the mutation counts as settled as soon as the guard is dropped"]
pub struct InFlightGuard {
    pending: Arc<DashMap<String, ()>>,
    key: String,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vote_key(target: VoteTarget) -> String {
        match target {
            VoteTarget::Discussion(id) => format!("vote:discussion:{id}"),
            VoteTarget::Reply(id) => format!("vote:reply:{id}"),
        }
    }

    pub fn reply_key(discussion_id: Id) -> String {
        format!("reply:{discussion_id}")
    }

    /// `None` when the same mutation is already outstanding.
    pub fn try_begin(&self, key: impl Into<String>) -> Option<InFlightGuard> {
        use dashmap::mapref::entry::Entry;
        let key = key.into();
        match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightGuard { pending: self.pending.clone(), key })
            }
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.key);
    }
}
