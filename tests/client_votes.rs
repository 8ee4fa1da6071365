use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use discuss::auth::Role;
use discuss::cache::CacheKey;
use discuss::client::{DiscussionApi, DiscussionRepository, InFlight, Invalidated, LocalApi, VoteCoordinator};
use discuss::error::{ClientError, ClientResult};
use discuss::models::{
    Discussion, DiscussionType, Id, NewDiscussion, NewReply, Reply, ReplyPage, TargetRef, UpdateDiscussion,
    VoteRequest, VoteTarget, VoteType,
};
use discuss::repo::inmem::InMemRepo;
use discuss::repo::{DiscussionRepo, VoteRepo};

async fn seeded() -> (Arc<InMemRepo>, Id) {
    let store = Arc::new(InMemRepo::ephemeral());
    let d = store
        .create_discussion(
            NewDiscussion {
                lesson_id: Some(1),
                problem_id: None,
                title: "Off by one".into(),
                content: "loop runs once too often".into(),
                discussion_type: DiscussionType::Question,
                is_solution: false,
            },
            "ana",
        )
        .await
        .unwrap();
    (store, d.discussion_id)
}

fn client(store: &Arc<InMemRepo>, viewer: &str) -> (Arc<DiscussionRepository>, VoteCoordinator) {
    let api: Arc<dyn DiscussionApi> = Arc::new(LocalApi::new(store.clone()).as_viewer(viewer));
    let repo = Arc::new(DiscussionRepository::new(api));
    (repo.clone(), VoteCoordinator::new(repo))
}

#[tokio::test]
async fn server_decides_toggle_and_counts_come_from_refetch() {
    let (store, id) = seeded().await;
    for voter in ["v1", "v2", "v3", "v4", "v5"] {
        store.cast_vote(voter, VoteTarget::Discussion(id), VoteType::Upvote).await.unwrap();
    }
    let (repo, votes) = client(&store, "me");

    let d = repo.get_discussion(id).await.unwrap();
    assert_eq!((d.vote_count, d.user_vote_type), (5, None));

    let steps = [
        (VoteType::Upvote, 6, Some(VoteType::Upvote)),
        (VoteType::Upvote, 5, None),
        (VoteType::Downvote, 4, Some(VoteType::Downvote)),
    ];
    for (vote, count, mine) in steps {
        let stale = votes.cast_vote(TargetRef::discussion(id), vote).await.unwrap();
        assert_eq!(stale, Invalidated::Keys(vec![CacheKey::Discussion(id)]));
        assert!(!repo.cache().contains(CacheKey::Discussion(id)));
        let d = repo.get_discussion(id).await.unwrap();
        assert_eq!((d.vote_count, d.user_vote_type), (count, mine));
    }
}

#[tokio::test]
async fn cached_discussion_is_served_until_invalidated() {
    let (store, id) = seeded().await;
    let (repo, _) = client(&store, "me");
    assert_eq!(repo.get_discussion(id).await.unwrap().vote_count, 0);

    // someone else votes behind the cache's back
    store.cast_vote("bo", VoteTarget::Discussion(id), VoteType::Upvote).await.unwrap();
    assert_eq!(repo.get_discussion(id).await.unwrap().vote_count, 0);

    repo.invalidate(&[CacheKey::Discussion(id)]);
    assert_eq!(repo.get_discussion(id).await.unwrap().vote_count, 1);
}

/// Counts every call and fails them all.
#[derive(Default)]
struct CountingApi {
    calls: AtomicUsize,
}

impl CountingApi {
    fn hit(&self, operation: &'static str) -> ClientError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ClientError::Rejected { operation, status: 500, message: "unreachable".into() }
    }
}

#[async_trait]
impl DiscussionApi for CountingApi {
    async fn get_discussion(&self, _id: Id) -> ClientResult<Discussion> {
        Err(self.hit("get_discussion"))
    }
    async fn update_discussion(&self, _id: Id, _upd: UpdateDiscussion) -> ClientResult<Discussion> {
        Err(self.hit("update_discussion"))
    }
    async fn delete_discussion(&self, _id: Id) -> ClientResult<()> {
        Err(self.hit("delete_discussion"))
    }
    async fn list_replies(&self, _discussion_id: Id) -> ClientResult<ReplyPage> {
        Err(self.hit("list_replies"))
    }
    async fn create_reply(&self, _discussion_id: Id, _new: NewReply) -> ClientResult<Reply> {
        Err(self.hit("create_reply"))
    }
    async fn cast_vote(&self, _vote: VoteRequest) -> ClientResult<()> {
        Err(self.hit("cast_vote"))
    }
    async fn delete_reply(&self, _reply_id: Id) -> ClientResult<()> {
        Err(self.hit("delete_reply"))
    }
    fn set_token(&self, _token: Option<String>) {}
}

#[tokio::test]
async fn ambiguous_target_is_refused_before_any_request() {
    let api = Arc::new(CountingApi::default());
    let repo = Arc::new(DiscussionRepository::new(api.clone()));
    let votes = VoteCoordinator::new(repo);

    for target in [
        TargetRef::default(),
        TargetRef { discussion_id: Some(1), reply_id: Some(2) },
    ] {
        let err = votes.cast_vote(target, VoteType::Upvote).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidTarget(_)));
        assert!(!err.is_transient());
        let err = votes.cast_vote_in(1, target, VoteType::Downvote).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidTarget(_)));
    }
    assert_eq!(api.calls.load(Ordering::SeqCst), 0);
}

/// Local transport whose vote endpoint can be switched off.
struct FlakyVotes {
    inner: LocalApi,
    down: AtomicBool,
}

#[async_trait]
impl DiscussionApi for FlakyVotes {
    async fn get_discussion(&self, id: Id) -> ClientResult<Discussion> {
        self.inner.get_discussion(id).await
    }
    async fn update_discussion(&self, id: Id, upd: UpdateDiscussion) -> ClientResult<Discussion> {
        self.inner.update_discussion(id, upd).await
    }
    async fn delete_discussion(&self, id: Id) -> ClientResult<()> {
        self.inner.delete_discussion(id).await
    }
    async fn list_replies(&self, discussion_id: Id) -> ClientResult<ReplyPage> {
        self.inner.list_replies(discussion_id).await
    }
    async fn create_reply(&self, discussion_id: Id, new: NewReply) -> ClientResult<Reply> {
        self.inner.create_reply(discussion_id, new).await
    }
    async fn cast_vote(&self, vote: VoteRequest) -> ClientResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ClientError::Rejected { operation: "cast_vote", status: 503, message: "unavailable".into() });
        }
        self.inner.cast_vote(vote).await
    }
    async fn delete_reply(&self, reply_id: Id) -> ClientResult<()> {
        self.inner.delete_reply(reply_id).await
    }
    fn set_token(&self, token: Option<String>) {
        self.inner.set_token(token)
    }
}

#[tokio::test]
async fn failed_vote_leaves_cache_and_counts_untouched() {
    let (store, id) = seeded().await;
    let api = Arc::new(FlakyVotes { inner: LocalApi::new(store.clone()).as_viewer("me"), down: AtomicBool::new(true) });
    let repo = Arc::new(DiscussionRepository::new(api.clone()));
    let votes = VoteCoordinator::new(repo.clone());

    let before = repo.get_discussion(id).await.unwrap();
    let err = votes.cast_vote(TargetRef::discussion(id), VoteType::Upvote).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.notice(), "Something went wrong, your change was not saved.");
    assert!(repo.cache().contains(CacheKey::Discussion(id)));
    assert_eq!(repo.get_discussion(id).await.unwrap(), before);

    // the server never saw it either
    repo.invalidate(&[CacheKey::Discussion(id)]);
    assert_eq!(repo.get_discussion(id).await.unwrap().vote_count, 0);

    api.down.store(false, Ordering::SeqCst);
    votes.cast_vote(TargetRef::discussion(id), VoteType::Upvote).await.unwrap();
    assert_eq!(repo.get_discussion(id).await.unwrap().vote_count, 1);
}

#[tokio::test]
async fn anonymous_vote_is_rejected_with_sign_in_notice() {
    let (store, id) = seeded().await;
    let api: Arc<dyn DiscussionApi> = Arc::new(LocalApi::new(store.clone()));
    let votes = VoteCoordinator::new(Arc::new(DiscussionRepository::new(api)));
    let err = votes.cast_vote(TargetRef::discussion(id), VoteType::Upvote).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.notice(), "Please sign in to continue.");
}

#[tokio::test]
async fn switching_viewer_drops_the_previous_vote_state() {
    let (store, id) = seeded().await;
    let (repo, votes) = client(&store, "me");
    votes.cast_vote(TargetRef::discussion(id), VoteType::Upvote).await.unwrap();
    assert_eq!(repo.get_discussion(id).await.unwrap().user_vote_type, Some(VoteType::Upvote));

    repo.switch_viewer(Some("someone-else".into()));
    assert!(!repo.cache().contains(CacheKey::Discussion(id)));
    let d = repo.get_discussion(id).await.unwrap();
    assert_eq!((d.vote_count, d.user_vote_type), (1, None));
}

#[tokio::test]
async fn reply_vote_invalidates_owner_and_reply_list() {
    let (store, id) = seeded().await;
    let (repo, votes) = client(&store, "me");
    let reply = repo.create_reply(id, "try an inclusive range", None).await.unwrap();

    let listed = repo.list_replies(id).await.unwrap();
    assert_eq!(listed[0].vote_count, 0);
    repo.get_discussion(id).await.unwrap();

    let stale = votes.cast_vote(TargetRef::reply(reply.reply_id), VoteType::Upvote).await.unwrap();
    assert_eq!(stale, Invalidated::Keys(vec![CacheKey::Discussion(id), CacheKey::ReplyList(id)]));

    let listed = repo.list_replies(id).await.unwrap();
    assert_eq!((listed[0].vote_count, listed[0].user_vote_type), (1, Some(VoteType::Upvote)));
}

#[tokio::test]
async fn reply_vote_with_unknown_owner_clears_everything() {
    let (store, id) = seeded().await;
    let (repo, votes) = client(&store, "me");
    let reply = repo.create_reply(id, "first", None).await.unwrap();
    repo.get_discussion(id).await.unwrap();
    assert!(repo.cache().reply_list(id).is_none());

    let stale = votes.cast_vote(TargetRef::reply(reply.reply_id), VoteType::Downvote).await.unwrap();
    assert_eq!(stale, Invalidated::Everything);
    assert!(!repo.cache().contains(CacheKey::Discussion(id)));

    // with the owner given, only its keys go
    repo.get_discussion(id).await.unwrap();
    let stale = votes.cast_vote_in(id, TargetRef::reply(reply.reply_id), VoteType::Downvote).await.unwrap();
    assert_eq!(stale, Invalidated::Keys(vec![CacheKey::Discussion(id), CacheKey::ReplyList(id)]));
}

#[tokio::test]
async fn creating_and_deleting_replies_refreshes_reply_count_and_tree() {
    let (store, id) = seeded().await;
    let (repo, _) = client(&store, "me");
    assert_eq!(repo.get_discussion(id).await.unwrap().reply_count, 0);
    assert!(repo.reply_tree(id).await.unwrap().is_empty());

    let root = repo.create_reply(id, "root", None).await.unwrap();
    let child = repo.create_reply(id, "child", Some(root.reply_id)).await.unwrap();
    assert_eq!(repo.get_discussion(id).await.unwrap().reply_count, 2);
    let page = repo.reply_page(id).await.unwrap();
    assert_eq!(page.total, 2);
    let tree = repo.reply_tree(id).await.unwrap();
    assert_eq!(tree.root_ids(), vec![root.reply_id]);
    assert_eq!(tree.child_ids(root.reply_id), vec![child.reply_id]);

    repo.delete_reply(id, root.reply_id).await.unwrap();
    assert_eq!(repo.get_discussion(id).await.unwrap().reply_count, 1);
    assert_eq!(repo.reply_tree(id).await.unwrap().root_ids(), vec![child.reply_id]);
}

#[tokio::test]
async fn deleting_someone_elses_reply_is_forbidden() {
    let (store, id) = seeded().await;
    let (author, _) = client(&store, "bo");
    let reply = author.create_reply(id, "mine", None).await.unwrap();

    let (other, _) = client(&store, "me");
    let err = other.delete_reply(id, reply.reply_id).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(other.list_replies(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn in_flight_guard_blocks_double_submit() {
    let (store, id) = seeded().await;
    let (repo, votes) = client(&store, "me");
    let inflight = InFlight::new();
    let key = InFlight::vote_key(VoteTarget::Discussion(id));

    let guard = inflight.try_begin(key.clone()).unwrap();
    assert!(inflight.try_begin(key.clone()).is_none(), "second click while pending");
    votes.cast_vote(TargetRef::discussion(id), VoteType::Upvote).await.unwrap();
    drop(guard);

    assert!(!inflight.is_pending(&key));
    assert_eq!(repo.get_discussion(id).await.unwrap().vote_count, 1);
}

#[tokio::test]
async fn admin_may_delete_any_reply_through_the_local_transport() {
    let (store, id) = seeded().await;
    let (author, _) = client(&store, "bo");
    let reply = author.create_reply(id, "spam", None).await.unwrap();

    let api: Arc<dyn DiscussionApi> =
        Arc::new(LocalApi::new(store.clone()).as_viewer("root").with_roles(vec![Role::Admin]));
    let admin = DiscussionRepository::new(api);
    admin.delete_reply(id, reply.reply_id).await.unwrap();
    assert!(admin.list_replies(id).await.unwrap().is_empty());

    // a new identity starts without the previous roles
    let reply = author.create_reply(id, "again", None).await.unwrap();
    admin.switch_viewer(Some("root".into()));
    let err = admin.delete_reply(id, reply.reply_id).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn discussion_edits_invalidate_and_follow_role_rules() {
    let (store, id) = seeded().await;
    let (author, _) = client(&store, "ana");
    author.get_discussion(id).await.unwrap();

    let accept = UpdateDiscussion { is_solution: Some(true), ..Default::default() };
    let err = author.update_discussion(id, accept.clone()).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(author.cache().contains(CacheKey::Discussion(id)), "rejected edit keeps the cache");

    let retitle = UpdateDiscussion { title: Some("Off by one in range()".into()), ..Default::default() };
    author.update_discussion(id, retitle).await.unwrap();
    assert!(!author.cache().contains(CacheKey::Discussion(id)));
    assert_eq!(author.get_discussion(id).await.unwrap().title, "Off by one in range()");

    let api: Arc<dyn DiscussionApi> =
        Arc::new(LocalApi::new(store.clone()).as_viewer("ivo").with_roles(vec![Role::Instructor]));
    let instructor = DiscussionRepository::new(api);
    assert!(instructor.update_discussion(id, accept).await.unwrap().is_solution);

    let (stranger, _) = client(&store, "bo");
    assert_eq!(stranger.delete_discussion(id).await.unwrap_err().status(), Some(403));

    author.list_replies(id).await.unwrap();
    author.delete_discussion(id).await.unwrap();
    assert!(!author.cache().contains(CacheKey::ReplyList(id)));
    assert_eq!(author.get_discussion(id).await.unwrap_err().status(), Some(404));
}
