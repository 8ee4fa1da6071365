use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    /// Contribution of one vote of this type to `vote_count`.
    pub fn weight(self) -> i64 {
        match self {
            VoteType::Upvote => 1,
            VoteType::Downvote => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscussionType {
    Question,
    Solution,
    #[default]
    General,
    BugReport,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("a discussion must belong to exactly one of lesson or problem")]
pub struct UnscopedDiscussion;

/// Where a discussion lives. Exactly one context, never both and never none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscussionContext {
    Lesson(Id),
    Problem(Id),
}

impl DiscussionContext {
    pub fn from_ids(lesson_id: Option<Id>, problem_id: Option<Id>) -> Result<Self, UnscopedDiscussion> {
        match (lesson_id, problem_id) {
            (Some(l), None) => Ok(DiscussionContext::Lesson(l)),
            (None, Some(p)) => Ok(DiscussionContext::Problem(p)),
            _ => Err(UnscopedDiscussion),
        }
    }

    pub fn lesson_id(self) -> Option<Id> {
        match self { DiscussionContext::Lesson(id) => Some(id), _ => None }
    }

    pub fn problem_id(self) -> Option<Id> {
        match self { DiscussionContext::Problem(id) => Some(id), _ => None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Discussion {
    pub discussion_id: Id,
    pub lesson_id: Option<Id>,
    pub problem_id: Option<Id>,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub discussion_type: DiscussionType,
    pub is_solution: bool,
    pub vote_count: i64,   // upvotes - downvotes, computed by the store
    pub view_count: i64,
    pub reply_count: i64,
    #[serde(default)]
    pub user_vote_type: Option<VoteType>, // requesting viewer only
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discussion {
    pub fn context(&self) -> Result<DiscussionContext, UnscopedDiscussion> {
        DiscussionContext::from_ids(self.lesson_id, self.problem_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewDiscussion {
    pub lesson_id: Option<Id>,
    pub problem_id: Option<Id>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub discussion_type: DiscussionType,
    #[serde(default)]
    pub is_solution: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateDiscussion {
    pub title: Option<String>,
    pub content: Option<String>,
    pub discussion_type: Option<DiscussionType>,
    pub is_solution: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reply {
    pub reply_id: Id,
    pub discussion_id: Id,
    pub parent_reply_id: Option<Id>,
    pub author_id: String,
    pub content: String,
    pub vote_count: i64,
    #[serde(default)]
    pub user_vote_type: Option<VoteType>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewReply {
    pub content: String,
    #[serde(default)]
    pub parent_reply_id: Option<Id>,
}

/// Envelope returned by the reply listing: flat, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReplyPage {
    pub total: usize,
    pub items: Vec<Reply>,
}

impl ReplyPage {
    pub fn new(items: Vec<Reply>) -> Self {
        Self { total: items.len(), items }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("a vote needs exactly one of discussion_id or reply_id")]
pub struct InvalidTargetError;

/// A validated vote target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target_type", content = "target_id", rename_all = "snake_case")]
pub enum VoteTarget {
    Discussion(Id),
    Reply(Id),
}

/// Unvalidated target as a caller hands it in: both ids optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetRef {
    pub discussion_id: Option<Id>,
    pub reply_id: Option<Id>,
}

impl TargetRef {
    pub fn discussion(id: Id) -> Self {
        Self { discussion_id: Some(id), reply_id: None }
    }

    pub fn reply(id: Id) -> Self {
        Self { discussion_id: None, reply_id: Some(id) }
    }

    pub fn resolve(self) -> Result<VoteTarget, InvalidTargetError> {
        match (self.discussion_id, self.reply_id) {
            (Some(d), None) => Ok(VoteTarget::Discussion(d)),
            (None, Some(r)) => Ok(VoteTarget::Reply(r)),
            _ => Err(InvalidTargetError),
        }
    }
}

impl From<VoteTarget> for TargetRef {
    fn from(t: VoteTarget) -> Self {
        match t {
            VoteTarget::Discussion(id) => TargetRef::discussion(id),
            VoteTarget::Reply(id) => TargetRef::reply(id),
        }
    }
}

/// Body of `POST /votes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VoteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<Id>,
    pub vote_type: VoteType,
}

impl VoteRequest {
    pub fn new(target: VoteTarget, vote_type: VoteType) -> Self {
        let t = TargetRef::from(target);
        Self { discussion_id: t.discussion_id, reply_id: t.reply_id, vote_type }
    }

    pub fn target(&self) -> Result<VoteTarget, InvalidTargetError> {
        TargetRef { discussion_id: self.discussion_id, reply_id: self.reply_id }.resolve()
    }
}

/// Stored vote row. Never sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: String,
    pub target: VoteTarget,
    pub vote_type: VoteType,
}
