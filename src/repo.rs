use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::*;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict: {0}")] Conflict(String),
    #[error("invalid: {0}")] Invalid(String),
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// `viewer` is the requesting identity; it only affects `user_vote_type`.
#[async_trait]
pub trait DiscussionRepo: Send + Sync {
    async fn list_discussions(&self, ctx: DiscussionContext, viewer: Option<&str>) -> RepoResult<Vec<Discussion>>;
    async fn get_discussion(&self, id: Id, viewer: Option<&str>) -> RepoResult<Discussion>;
    async fn create_discussion(&self, new: NewDiscussion, author: &str) -> RepoResult<Discussion>;
    async fn update_discussion(&self, id: Id, upd: UpdateDiscussion, viewer: Option<&str>) -> RepoResult<Discussion>;
    /// Removes the discussion, its replies and every vote on either.
    async fn delete_discussion(&self, id: Id) -> RepoResult<()>;
    async fn record_view(&self, id: Id) -> RepoResult<i64>;
}

#[async_trait]
pub trait ReplyRepo: Send + Sync {
    /// Flat, oldest first.
    async fn list_replies(&self, discussion_id: Id, viewer: Option<&str>) -> RepoResult<Vec<Reply>>;
    async fn get_reply(&self, id: Id, viewer: Option<&str>) -> RepoResult<Reply>;
    async fn create_reply(&self, discussion_id: Id, new: NewReply, author: &str) -> RepoResult<Reply>;
    /// Children of the deleted reply are left in place.
    async fn delete_reply(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait VoteRepo: Send + Sync {
    /// Applies toggle/switch semantics and returns the voter's resulting vote.
    async fn cast_vote(&self, voter: &str, target: VoteTarget, vote_type: VoteType) -> RepoResult<Option<VoteType>>;
}

pub trait Repo: DiscussionRepo + ReplyRepo + VoteRepo {}

impl<T> Repo for T where T: DiscussionRepo + ReplyRepo + VoteRepo {}

pub mod inmem {
    use super::*;

    const SNAPSHOT_FILE: &str = "state.json";

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct DiscussionRecord {
        id: Id,
        lesson_id: Option<Id>,
        problem_id: Option<Id>,
        author_id: String,
        title: String,
        content: String,
        discussion_type: DiscussionType,
        is_solution: bool,
        view_count: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct ReplyRecord {
        id: Id,
        discussion_id: Id,
        parent_reply_id: Option<Id>,
        author_id: String,
        content: String,
        created_at: DateTime<Utc>,
    }

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        discussions: HashMap<Id, DiscussionRecord>,
        replies: HashMap<Id, ReplyRecord>,
        votes: Vec<Vote>,
        next_id: Id,
    }

    impl State {
        fn next_id(&mut self) -> Id {
            self.next_id += 1;
            self.next_id
        }

        fn vote_count(&self, target: VoteTarget) -> i64 {
            self.votes
                .iter()
                .filter(|v| v.target == target)
                .map(|v| v.vote_type.weight())
                .sum()
        }

        fn vote_of(&self, viewer: Option<&str>, target: VoteTarget) -> Option<VoteType> {
            let viewer = viewer?;
            self.votes
                .iter()
                .find(|v| v.target == target && v.voter_id == viewer)
                .map(|v| v.vote_type)
        }

        fn discussion_view(&self, rec: &DiscussionRecord, viewer: Option<&str>) -> Discussion {
            let target = VoteTarget::Discussion(rec.id);
            Discussion {
                discussion_id: rec.id,
                lesson_id: rec.lesson_id,
                problem_id: rec.problem_id,
                author_id: rec.author_id.clone(),
                title: rec.title.clone(),
                content: rec.content.clone(),
                discussion_type: rec.discussion_type,
                is_solution: rec.is_solution,
                vote_count: self.vote_count(target),
                view_count: rec.view_count,
                reply_count: self.replies.values().filter(|r| r.discussion_id == rec.id).count() as i64,
                user_vote_type: self.vote_of(viewer, target),
                created_at: rec.created_at,
                updated_at: rec.updated_at,
            }
        }

        fn reply_view(&self, rec: &ReplyRecord, viewer: Option<&str>) -> Reply {
            let target = VoteTarget::Reply(rec.id);
            Reply {
                reply_id: rec.id,
                discussion_id: rec.discussion_id,
                parent_reply_id: rec.parent_reply_id,
                author_id: rec.author_id.clone(),
                content: rec.content.clone(),
                vote_count: self.vote_count(target),
                user_vote_type: self.vote_of(viewer, target),
                created_at: rec.created_at,
            }
        }

        fn target_exists(&self, target: VoteTarget) -> bool {
            match target {
                VoteTarget::Discussion(id) => self.discussions.contains_key(&id),
                VoteTarget::Reply(id) => self.replies.contains_key(&id),
            }
        }
    }

    /// In-memory store with an optional JSON snapshot on disk.
    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
        // one snapshot writer at a time
        persist_lock: Arc<Mutex<()>>,
    }

    impl InMemRepo {
        /// Snapshot under `DISCUSS_DATA_DIR` (default `data/`).
        pub fn new() -> Self {
            let dir = std::env::var("DISCUSS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"));
            Self::with_data_dir(dir)
        }

        pub fn with_data_dir(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
                persist_lock: Arc::default(),
            }
        }

        /// Never touches the disk.
        pub fn ephemeral() -> Self {
            Self {
                state: Arc::new(RwLock::new(State::default())),
                snapshot_path: None,
                persist_lock: Arc::default(),
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), "loaded snapshot");
                        s
                    }
                    Err(e) => {
                        warn!(path = %path.display(), "failed to parse snapshot: {e}; starting empty");
                        State::default()
                    }
                },
                Err(e) => {
                    debug!(path = %path.display(), "no snapshot: {e}; starting empty");
                    State::default()
                }
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        // Called after the write guard is released. The state is read under
        // the persist lock so the last writer always flushes the newest state.
        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_deref() else { return };
            let _flush = match self.persist_lock.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let bytes = match self.read().map(|s| serde_json::to_vec_pretty(&*s)) {
                Ok(Ok(b)) => b,
                Ok(Err(e)) => { warn!("failed to serialize snapshot: {e}"); return; }
                Err(e) => { warn!("failed to read state for snapshot: {e}"); return; }
            };
            if let Some(dir) = path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            let tmp = path.with_extension("json.tmp");
            let written = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, path));
            if let Err(e) = written {
                warn!(path = %path.display(), "failed to write snapshot: {e}");
                let _ = std::fs::remove_file(&tmp);
            }
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self { Self::new() }
    }

    #[async_trait]
    impl DiscussionRepo for InMemRepo {
        async fn list_discussions(&self, ctx: DiscussionContext, viewer: Option<&str>) -> RepoResult<Vec<Discussion>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.discussions
                .values()
                .filter(|d| d.lesson_id == ctx.lesson_id() && d.problem_id == ctx.problem_id())
                .map(|d| s.discussion_view(d, viewer))
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.discussion_id.cmp(&a.discussion_id))); // newest first
            Ok(v)
        }

        async fn get_discussion(&self, id: Id, viewer: Option<&str>) -> RepoResult<Discussion> {
            let s = self.read()?;
            let rec = s.discussions.get(&id).ok_or(RepoError::NotFound)?;
            Ok(s.discussion_view(rec, viewer))
        }

        async fn create_discussion(&self, new: NewDiscussion, author: &str) -> RepoResult<Discussion> {
            let ctx = DiscussionContext::from_ids(new.lesson_id, new.problem_id)
                .map_err(|e| RepoError::Invalid(e.to_string()))?;
            if new.title.trim().is_empty() {
                return Err(RepoError::Invalid("title must not be empty".into()));
            }
            let mut s = self.write()?;
            let now = Utc::now();
            let id = s.next_id();
            let rec = DiscussionRecord {
                id,
                lesson_id: ctx.lesson_id(),
                problem_id: ctx.problem_id(),
                author_id: author.to_string(),
                title: new.title,
                content: new.content,
                discussion_type: new.discussion_type,
                is_solution: new.is_solution,
                view_count: 0,
                created_at: now,
                updated_at: now,
            };
            let out = s.discussion_view(&rec, Some(author));
            s.discussions.insert(id, rec);
            drop(s);
            self.persist();
            Ok(out)
        }

        async fn update_discussion(&self, id: Id, upd: UpdateDiscussion, viewer: Option<&str>) -> RepoResult<Discussion> {
            let mut s = self.write()?;
            let rec = s.discussions.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(title) = upd.title {
                if title.trim().is_empty() {
                    return Err(RepoError::Invalid("title must not be empty".into()));
                }
                rec.title = title;
            }
            if let Some(content) = upd.content { rec.content = content; }
            if let Some(t) = upd.discussion_type { rec.discussion_type = t; }
            if let Some(flag) = upd.is_solution { rec.is_solution = flag; }
            rec.updated_at = Utc::now();
            let rec = rec.clone();
            let out = s.discussion_view(&rec, viewer);
            drop(s);
            self.persist();
            Ok(out)
        }

        async fn delete_discussion(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            if s.discussions.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            let doomed: Vec<Id> = s.replies.values().filter(|r| r.discussion_id == id).map(|r| r.id).collect();
            for rid in &doomed {
                s.replies.remove(rid);
            }
            s.votes.retain(|v| match v.target {
                VoteTarget::Discussion(d) => d != id,
                VoteTarget::Reply(r) => !doomed.contains(&r),
            });
            drop(s);
            self.persist();
            Ok(())
        }

        async fn record_view(&self, id: Id) -> RepoResult<i64> {
            let mut s = self.write()?;
            let rec = s.discussions.get_mut(&id).ok_or(RepoError::NotFound)?;
            rec.view_count += 1;
            let count = rec.view_count;
            drop(s);
            self.persist();
            Ok(count)
        }
    }

    #[async_trait]
    impl ReplyRepo for InMemRepo {
        async fn list_replies(&self, discussion_id: Id, viewer: Option<&str>) -> RepoResult<Vec<Reply>> {
            let s = self.read()?;
            if !s.discussions.contains_key(&discussion_id) {
                return Err(RepoError::NotFound);
            }
            let mut recs: Vec<&ReplyRecord> = s.replies
                .values()
                .filter(|r| r.discussion_id == discussion_id)
                .collect();
            recs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))); // ascending
            Ok(recs.into_iter().map(|r| s.reply_view(r, viewer)).collect())
        }

        async fn get_reply(&self, id: Id, viewer: Option<&str>) -> RepoResult<Reply> {
            let s = self.read()?;
            let rec = s.replies.get(&id).ok_or(RepoError::NotFound)?;
            Ok(s.reply_view(rec, viewer))
        }

        async fn create_reply(&self, discussion_id: Id, new: NewReply, author: &str) -> RepoResult<Reply> {
            if new.content.trim().is_empty() {
                return Err(RepoError::Invalid("content must not be empty".into()));
            }
            let mut s = self.write()?;
            if !s.discussions.contains_key(&discussion_id) {
                return Err(RepoError::NotFound);
            }
            if let Some(parent_id) = new.parent_reply_id {
                let parent = s.replies.get(&parent_id).ok_or(RepoError::NotFound)?;
                if parent.discussion_id != discussion_id {
                    return Err(RepoError::Conflict(format!(
                        "parent reply {parent_id} belongs to another discussion"
                    )));
                }
            }
            let id = s.next_id();
            let rec = ReplyRecord {
                id,
                discussion_id,
                parent_reply_id: new.parent_reply_id,
                author_id: author.to_string(),
                content: new.content,
                created_at: Utc::now(),
            };
            let out = s.reply_view(&rec, Some(author));
            s.replies.insert(id, rec);
            if let Some(d) = s.discussions.get_mut(&discussion_id) { d.updated_at = Utc::now(); }
            drop(s);
            self.persist();
            Ok(out)
        }

        async fn delete_reply(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            if s.replies.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            s.votes.retain(|v| v.target != VoteTarget::Reply(id));
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl VoteRepo for InMemRepo {
        async fn cast_vote(&self, voter: &str, target: VoteTarget, vote_type: VoteType) -> RepoResult<Option<VoteType>> {
            let mut s = self.write()?;
            if !s.target_exists(target) {
                return Err(RepoError::NotFound);
            }
            let existing = s.votes.iter().position(|v| v.target == target && v.voter_id == voter);
            let result = match existing {
                Some(pos) if s.votes[pos].vote_type == vote_type => {
                    s.votes.remove(pos);
                    None
                }
                Some(pos) => {
                    s.votes[pos].vote_type = vote_type;
                    Some(vote_type)
                }
                None => {
                    s.votes.push(Vote { voter_id: voter.to_string(), target, vote_type });
                    Some(vote_type)
                }
            };
            drop(s);
            self.persist();
            Ok(result)
        }
    }
}
