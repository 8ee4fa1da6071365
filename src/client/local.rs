use std::sync::{Arc, RwLock};

use actix_web::ResponseError;
use async_trait::async_trait;

use crate::auth::{Claims, Role};
use crate::client::api::DiscussionApi;
use crate::error::{ApiError, ClientError, ClientResult};
use crate::models::{Discussion, Id, NewReply, Reply, ReplyPage, UpdateDiscussion, VoteRequest};
use crate::repo::{Repo, RepoError};

/// In-process transport straight onto a [`Repo`], for embedding the engine
/// next to its store. The "token" is taken as the viewer id as-is; roles are
/// set separately with [`with_roles`](Self::with_roles).
///
/// Failures come back with the status the HTTP surface would have used.
pub struct LocalApi {
    repo: Arc<dyn Repo>,
    viewer: RwLock<Option<Claims>>,
}

impl LocalApi {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo, viewer: RwLock::new(None) }
    }

    pub fn as_viewer(self, viewer: impl Into<String>) -> Self {
        self.set_token(Some(viewer.into()));
        self
    }

    /// Roles of the current viewer. Cleared again by the next `set_token`.
    pub fn with_roles(self, roles: Vec<Role>) -> Self {
        if let Ok(mut slot) = self.viewer.write() {
            if let Some(claims) = slot.as_mut() {
                claims.roles = roles;
            }
        }
        self
    }

    fn claims(&self) -> Option<Claims> {
        self.viewer.read().ok().and_then(|v| v.clone())
    }

    fn viewer(&self) -> Option<String> {
        self.claims().map(|c| c.sub)
    }

    fn signed_in(&self, operation: &'static str) -> ClientResult<Claims> {
        self.claims().ok_or_else(|| ClientError::Rejected {
            operation,
            status: 401,
            message: ApiError::Unauthorized("authorization required").to_string(),
        })
    }
}

fn forbidden(operation: &'static str) -> ClientError {
    ClientError::Rejected { operation, status: 403, message: ApiError::Forbidden.to_string() }
}

fn rejected(operation: &'static str, e: RepoError) -> ClientError {
    let api = ApiError::from(e);
    ClientError::Rejected { operation, status: api.status_code().as_u16(), message: api.to_string() }
}

#[async_trait]
impl DiscussionApi for LocalApi {
    async fn get_discussion(&self, id: Id) -> ClientResult<Discussion> {
        let viewer = self.viewer();
        self.repo
            .get_discussion(id, viewer.as_deref())
            .await
            .map_err(|e| rejected("get_discussion", e))
    }

    async fn update_discussion(&self, id: Id, upd: UpdateDiscussion) -> ClientResult<Discussion> {
        let op = "update_discussion";
        let viewer = self.signed_in(op)?;
        let current = self.repo.get_discussion(id, None).await.map_err(|e| rejected(op, e))?;
        let edits_text = upd.title.is_some() || upd.content.is_some() || upd.discussion_type.is_some();
        if !(viewer.may_modify(&current.author_id) || viewer.is_privileged())
            || (upd.is_solution.is_some() && !viewer.is_privileged())
            || (edits_text && !viewer.may_modify(&current.author_id))
        {
            return Err(forbidden(op));
        }
        self.repo
            .update_discussion(id, upd, Some(viewer.viewer_id()))
            .await
            .map_err(|e| rejected(op, e))
    }

    async fn delete_discussion(&self, id: Id) -> ClientResult<()> {
        let op = "delete_discussion";
        let viewer = self.signed_in(op)?;
        let current = self.repo.get_discussion(id, None).await.map_err(|e| rejected(op, e))?;
        if !viewer.may_modify(&current.author_id) {
            return Err(forbidden(op));
        }
        self.repo.delete_discussion(id).await.map_err(|e| rejected(op, e))
    }

    async fn list_replies(&self, discussion_id: Id) -> ClientResult<ReplyPage> {
        let viewer = self.viewer();
        self.repo
            .list_replies(discussion_id, viewer.as_deref())
            .await
            .map(ReplyPage::new)
            .map_err(|e| rejected("list_replies", e))
    }

    async fn create_reply(&self, discussion_id: Id, new: NewReply) -> ClientResult<Reply> {
        let author = self.signed_in("create_reply")?;
        self.repo
            .create_reply(discussion_id, new, author.viewer_id())
            .await
            .map_err(|e| rejected("create_reply", e))
    }

    async fn cast_vote(&self, vote: VoteRequest) -> ClientResult<()> {
        let voter = self.signed_in("cast_vote")?;
        let target = vote.target()?;
        self.repo
            .cast_vote(voter.viewer_id(), target, vote.vote_type)
            .await
            .map(|_| ())
            .map_err(|e| rejected("cast_vote", e))
    }

    async fn delete_reply(&self, reply_id: Id) -> ClientResult<()> {
        let viewer = self.signed_in("delete_reply")?;
        let reply = self
            .repo
            .get_reply(reply_id, None)
            .await
            .map_err(|e| rejected("delete_reply", e))?;
        if !viewer.may_modify(&reply.author_id) {
            return Err(forbidden("delete_reply"));
        }
        self.repo.delete_reply(reply_id).await.map_err(|e| rejected("delete_reply", e))
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.viewer.write() {
            *slot = token.map(|sub| Claims { sub, exp: 0, roles: vec![Role::User] });
        }
    }
}
