use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{CacheKey, Mutation, QueryCache};
use crate::client::api::DiscussionApi;
use crate::error::ClientResult;
use crate::models::{Discussion, Id, NewReply, Reply, ReplyPage, UpdateDiscussion};
use crate::tree::{build_tree, ReplyForest};

/// Cache-first reads and cache-invalidating writes for one viewer.
///
/// Counts are never patched locally: a write drops the keys listed by
/// [`Mutation::invalidates`] and the next read refetches.
pub struct DiscussionRepository {
    api: Arc<dyn DiscussionApi>,
    cache: QueryCache,
}

impl DiscussionRepository {
    pub fn new(api: Arc<dyn DiscussionApi>) -> Self {
        Self { api, cache: QueryCache::new() }
    }

    pub fn api(&self) -> &Arc<dyn DiscussionApi> {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn get_discussion(&self, id: Id) -> ClientResult<Discussion> {
        if let Some(hit) = self.cache.discussion(id) {
            debug!(discussion_id = id, "discussion cache hit");
            return Ok(hit);
        }
        let seen = self.cache.generation();
        let fresh = self.api.get_discussion(id).await?;
        self.cache.store_discussion(seen, fresh.clone());
        Ok(fresh)
    }

    /// The returned discussion is not cached; the next read refetches it.
    pub async fn update_discussion(&self, discussion_id: Id, upd: UpdateDiscussion) -> ClientResult<Discussion> {
        let updated = self.api.update_discussion(discussion_id, upd).await?;
        info!(discussion_id, "discussion updated");
        self.apply(&Mutation::UpdateDiscussion { discussion_id });
        Ok(updated)
    }

    pub async fn delete_discussion(&self, discussion_id: Id) -> ClientResult<()> {
        self.api.delete_discussion(discussion_id).await?;
        info!(discussion_id, "discussion deleted");
        self.apply(&Mutation::DeleteDiscussion { discussion_id });
        Ok(())
    }

    /// The `{ total, items }` envelope as last fetched.
    pub async fn reply_page(&self, discussion_id: Id) -> ClientResult<ReplyPage> {
        if let Some(hit) = self.cache.reply_list(discussion_id) {
            debug!(discussion_id, "reply list cache hit");
            return Ok(hit);
        }
        let seen = self.cache.generation();
        let page = self.api.list_replies(discussion_id).await?;
        self.cache.store_reply_list(seen, discussion_id, page.clone());
        Ok(page)
    }

    /// Flat replies, oldest first.
    pub async fn list_replies(&self, discussion_id: Id) -> ClientResult<Vec<Reply>> {
        Ok(self.reply_page(discussion_id).await?.items)
    }

    pub async fn reply_tree(&self, discussion_id: Id) -> ClientResult<ReplyForest> {
        Ok(build_tree(self.list_replies(discussion_id).await?))
    }

    pub async fn create_reply(
        &self,
        discussion_id: Id,
        content: impl Into<String>,
        parent_reply_id: Option<Id>,
    ) -> ClientResult<Reply> {
        let new = NewReply { content: content.into(), parent_reply_id };
        let reply = self.api.create_reply(discussion_id, new).await?;
        info!(discussion_id, reply_id = reply.reply_id, "reply created");
        self.apply(&Mutation::CreateReply { discussion_id });
        Ok(reply)
    }

    pub async fn delete_reply(&self, discussion_id: Id, reply_id: Id) -> ClientResult<()> {
        self.api.delete_reply(reply_id).await?;
        info!(discussion_id, reply_id, "reply deleted");
        self.apply(&Mutation::DeleteReply { discussion_id });
        Ok(())
    }

    /// Drops whatever `mutation` made stale and returns those keys.
    pub fn apply(&self, mutation: &Mutation) -> Vec<CacheKey> {
        let keys = mutation.invalidates();
        self.cache.invalidate(&keys);
        keys
    }

    pub fn invalidate(&self, keys: &[CacheKey]) {
        self.cache.invalidate(keys);
    }

    /// New identity: `user_vote_type` of the old one must not leak, so the
    /// whole cache goes.
    pub fn switch_viewer(&self, token: Option<String>) {
        self.api.set_token(token);
        self.cache.clear();
        info!("viewer switched, cache cleared");
    }
}
