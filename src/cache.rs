//! Client-side query cache and the mutation -> invalidation table.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::models::{Discussion, Id, ReplyPage, VoteTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `(discussion, id)`: the discussion aggregate, counts included.
    Discussion(Id),
    /// `(replyList, discussion_id)`: the flat reply listing.
    ReplyList(Id),
}

/// Every write the client can issue against the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    CastVote { discussion_id: Id, target: VoteTarget },
    CreateReply { discussion_id: Id },
    DeleteReply { discussion_id: Id },
    UpdateDiscussion { discussion_id: Id },
    DeleteDiscussion { discussion_id: Id },
}

impl Mutation {
    /// Cache keys made stale by this mutation once the server accepted it.
    pub fn invalidates(&self) -> Vec<CacheKey> {
        match *self {
            Mutation::CastVote { discussion_id, target: VoteTarget::Discussion(_) }
            | Mutation::UpdateDiscussion { discussion_id } => {
                vec![CacheKey::Discussion(discussion_id)]
            }
            Mutation::CastVote { discussion_id, target: VoteTarget::Reply(_) }
            | Mutation::CreateReply { discussion_id }
            | Mutation::DeleteReply { discussion_id }
            | Mutation::DeleteDiscussion { discussion_id } => {
                vec![CacheKey::Discussion(discussion_id), CacheKey::ReplyList(discussion_id)]
            }
        }
    }
}

/// Generation stamp taken before a fetch. A fetched value is only stored if
/// no invalidation happened while the request was in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Cached aggregates for a single viewer. Shared across tasks.
#[derive(Clone, Default)]
pub struct QueryCache {
    discussions: Arc<DashMap<Id, Discussion>>,
    reply_lists: Arc<DashMap<Id, ReplyPage>>,
    generation: Arc<AtomicU64>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::SeqCst))
    }

    pub fn discussion(&self, id: Id) -> Option<Discussion> {
        self.discussions.get(&id).map(|d| d.clone())
    }

    pub fn reply_list(&self, discussion_id: Id) -> Option<ReplyPage> {
        self.reply_lists.get(&discussion_id).map(|p| p.clone())
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        match key {
            CacheKey::Discussion(id) => self.discussions.contains_key(&id),
            CacheKey::ReplyList(id) => self.reply_lists.contains_key(&id),
        }
    }

    /// Stores `d` unless the cache was invalidated after `seen` was taken.
    pub fn store_discussion(&self, seen: Generation, d: Discussion) -> bool {
        if self.generation() != seen {
            debug!(discussion_id = d.discussion_id, "dropping stale discussion fetch");
            return false;
        }
        self.discussions.insert(d.discussion_id, d);
        true
    }

    pub fn store_reply_list(&self, seen: Generation, discussion_id: Id, page: ReplyPage) -> bool {
        if self.generation() != seen {
            debug!(discussion_id, "dropping stale reply list fetch");
            return false;
        }
        self.reply_lists.insert(discussion_id, page);
        true
    }

    pub fn invalidate(&self, keys: &[CacheKey]) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for key in keys {
            let removed = match *key {
                CacheKey::Discussion(id) => self.discussions.remove(&id).is_some(),
                CacheKey::ReplyList(id) => self.reply_lists.remove(&id).is_some(),
            };
            debug!(?key, removed, "cache invalidated");
        }
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.discussions.clear();
        self.reply_lists.clear();
        debug!("cache cleared");
    }

    /// Finds which cached reply list holds `reply_id`.
    pub fn discussion_of_reply(&self, reply_id: Id) -> Option<Id> {
        self.reply_lists
            .iter()
            .find(|entry| entry.value().items.iter().any(|r| r.reply_id == reply_id))
            .map(|entry| *entry.key())
    }
}
