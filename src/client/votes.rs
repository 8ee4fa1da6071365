use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{CacheKey, Mutation};
use crate::client::repository::DiscussionRepository;
use crate::error::ClientResult;
use crate::models::{Id, TargetRef, VoteRequest, VoteTarget, VoteType};

/// What a successful vote made stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidated {
    Keys(Vec<CacheKey>),
    /// The owning discussion of a reply could not be determined.
    Everything,
}

/// Sends vote intents and invalidates the affected aggregates afterwards.
///
/// Whether a vote is created, cleared or switched is decided by the server;
/// this type only forwards `vote_type` and never touches a count. Callers
/// must keep the control disabled while a vote is outstanding (see
/// [`crate::client::InFlight`]).
#[derive(Clone)]
pub struct VoteCoordinator {
    repo: Arc<DiscussionRepository>,
}

impl VoteCoordinator {
    pub fn new(repo: Arc<DiscussionRepository>) -> Self {
        Self { repo }
    }

    /// Casts `vote_type` on the single target named by `target`. For reply
    /// targets the owning discussion is looked up in the cached reply lists.
    pub async fn cast_vote(&self, target: TargetRef, vote_type: VoteType) -> ClientResult<Invalidated> {
        let target = target.resolve()?;
        let owner = match target {
            VoteTarget::Discussion(id) => Some(id),
            VoteTarget::Reply(id) => self.repo.cache().discussion_of_reply(id),
        };
        self.send(owner, target, vote_type).await
    }

    /// Same as [`cast_vote`](Self::cast_vote) with the owning discussion given.
    pub async fn cast_vote_in(
        &self,
        discussion_id: Id,
        target: TargetRef,
        vote_type: VoteType,
    ) -> ClientResult<Invalidated> {
        let target = target.resolve()?;
        self.send(Some(discussion_id), target, vote_type).await
    }

    async fn send(&self, owner: Option<Id>, target: VoteTarget, vote_type: VoteType) -> ClientResult<Invalidated> {
        if let Err(e) = self.repo.api().cast_vote(VoteRequest::new(target, vote_type)).await {
            // nothing was applied locally, so nothing to roll back
            warn!(?target, ?vote_type, error = %e, "vote not applied");
            return Err(e);
        }
        info!(?target, ?vote_type, "vote accepted");
        Ok(match owner {
            Some(discussion_id) => {
                Invalidated::Keys(self.repo.apply(&Mutation::CastVote { discussion_id, target }))
            }
            None => {
                self.repo.cache().clear();
                Invalidated::Everything
            }
        })
    }
}
