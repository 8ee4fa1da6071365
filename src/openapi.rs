use crate::models::{Discussion, DiscussionType, NewDiscussion, NewReply, Reply, ReplyPage, UpdateDiscussion, VoteRequest, VoteType};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_discussions,
        crate::routes::create_discussion,
        crate::routes::get_discussion,
        crate::routes::update_discussion,
        crate::routes::delete_discussion,
        crate::routes::record_view,
        crate::routes::list_replies,
        crate::routes::reply_tree,
        crate::routes::create_reply,
        crate::routes::delete_reply,
        crate::routes::cast_vote,
    ),
    components(schemas(
        Discussion, NewDiscussion, UpdateDiscussion, DiscussionType,
        Reply, NewReply, ReplyPage, VoteRequest, VoteType,
    )),
    tags(
        (name = "discussions", description = "Discussion operations"),
        (name = "replies", description = "Reply operations"),
        (name = "votes", description = "Vote operations"),
    )
)]
pub struct ApiDoc;
