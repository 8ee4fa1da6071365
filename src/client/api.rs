use async_trait::async_trait;

use crate::error::ClientResult;
use crate::models::{Discussion, Id, NewReply, Reply, ReplyPage, UpdateDiscussion, VoteRequest};

/// Transport for the REST contract. One request per call, no retries and
/// no caching at this layer.
#[async_trait]
pub trait DiscussionApi: Send + Sync {
    async fn get_discussion(&self, id: Id) -> ClientResult<Discussion>;
    async fn update_discussion(&self, id: Id, upd: UpdateDiscussion) -> ClientResult<Discussion>;
    async fn delete_discussion(&self, id: Id) -> ClientResult<()>;
    async fn list_replies(&self, discussion_id: Id) -> ClientResult<ReplyPage>;
    async fn create_reply(&self, discussion_id: Id, new: NewReply) -> ClientResult<Reply>;
    async fn cast_vote(&self, vote: VoteRequest) -> ClientResult<()>;
    async fn delete_reply(&self, reply_id: Id) -> ClientResult<()>;

    /// Replace the identity requests are made as. `None` means anonymous.
    fn set_token(&self, token: Option<String>);
}
