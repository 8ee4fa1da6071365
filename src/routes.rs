use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::repo::Repo;
use crate::tree::build_tree;

pub fn config(cfg: &mut web::ServiceConfig) {
    // extractor failures answer with the same `{error}` body as handlers
    cfg.app_data(web::JsonConfig::default().error_handler(|e, _| ApiError::BadRequest(e.to_string()).into()))
        .app_data(web::PathConfig::default().error_handler(|e, _| ApiError::BadRequest(e.to_string()).into()))
        .app_data(web::QueryConfig::default().error_handler(|e, _| ApiError::BadRequest(e.to_string()).into()));
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/discussions")
                    .route(web::get().to(list_discussions))
                    .route(web::post().to(create_discussion)),
            )
            .service(
                web::resource("/discussions/{id}")
                    .route(web::get().to(get_discussion))
                    .route(web::patch().to(update_discussion))
                    .route(web::delete().to(delete_discussion)),
            )
            .service(web::resource("/discussions/{id}/view").route(web::post().to(record_view)))
            .service(
                web::resource("/discussions/{id}/replies")
                    .route(web::get().to(list_replies))
                    .route(web::post().to(create_reply)),
            )
            .service(web::resource("/discussions/{id}/replies/tree").route(web::get().to(reply_tree)))
            .service(web::resource("/replies/{id}").route(web::delete().to(delete_reply)))
            .service(web::resource("/votes").route(web::post().to(cast_vote))),
    );
}

/// CORS for the single configured frontend origin.
pub fn cors(frontend_url: &str) -> Cors {
    Cors::default()
        .allowed_origin(frontend_url)
        .allow_any_header()
        .allowed_methods(["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
        .supports_credentials()
        .max_age(3600)
}

#[derive(Clone)]
pub struct AppState { pub repo: Arc<dyn Repo> }

fn viewer(auth: &Option<Auth>) -> Option<&str> {
    auth.as_ref().map(|a| a.0.viewer_id())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContextQuery {
    pub lesson_id: Option<Id>,
    pub problem_id: Option<Id>,
}

#[utoipa::path(
    get,
    path = "/api/v1/discussions",
    params(ContextQuery),
    responses(
        (status = 200, description = "Discussions of one lesson or problem, newest first", body = [Discussion]),
        (status = 400, description = "Neither or both of lesson_id / problem_id given")
    )
)]
pub async fn list_discussions(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    query: web::Query<ContextQuery>,
) -> Result<HttpResponse, ApiError> {
    let ctx = DiscussionContext::from_ids(query.lesson_id, query.problem_id)?;
    let list = data.repo.list_discussions(ctx, viewer(&auth)).await?;
    Ok(HttpResponse::Ok().json(list))
}

#[utoipa::path(
    post,
    path = "/api/v1/discussions",
    request_body = NewDiscussion,
    responses(
        (status = 201, description = "Discussion created", body = Discussion),
        (status = 400, description = "Not scoped to exactly one lesson or problem"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only instructors and admins may mark a solution")
    )
)]
pub async fn create_discussion(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewDiscussion>,
) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    DiscussionContext::from_ids(new.lesson_id, new.problem_id)?;
    if new.is_solution && !auth.0.is_privileged() {
        return Err(ApiError::Forbidden);
    }
    let d = data.repo.create_discussion(new, auth.0.viewer_id()).await?;
    info!(discussion_id = d.discussion_id, author = %d.author_id, "discussion created");
    Ok(HttpResponse::Created().json(d))
}

#[utoipa::path(
    get,
    path = "/api/v1/discussions/{id}",
    params(("id" = Id, Path, description = "Discussion id")),
    responses(
        (status = 200, description = "Discussion with the viewer's vote", body = Discussion),
        (status = 404, description = "Discussion not found")
    )
)]
pub async fn get_discussion(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let d = data.repo.get_discussion(path.into_inner(), viewer(&auth)).await?;
    Ok(HttpResponse::Ok().json(d))
}

#[utoipa::path(
    patch,
    path = "/api/v1/discussions/{id}",
    request_body = UpdateDiscussion,
    params(("id" = Id, Path, description = "Discussion id")),
    responses(
        (status = 200, description = "Discussion updated", body = Discussion),
        (status = 403, description = "Not the author, or is_solution without privilege"),
        (status = 404, description = "Discussion not found")
    )
)]
pub async fn update_discussion(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateDiscussion>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let current = data.repo.get_discussion(id, None).await?;
    if !auth.0.may_modify(&current.author_id) && !auth.0.is_privileged() {
        return Err(ApiError::Forbidden);
    }
    let upd = payload.into_inner();
    // authors may edit their text, only privileged roles touch the flag
    if upd.is_solution.is_some() && !auth.0.is_privileged() {
        return Err(ApiError::Forbidden);
    }
    if !auth.0.may_modify(&current.author_id)
        && (upd.title.is_some() || upd.content.is_some() || upd.discussion_type.is_some())
    {
        return Err(ApiError::Forbidden);
    }
    let d = data.repo.update_discussion(id, upd, Some(auth.0.viewer_id())).await?;
    Ok(HttpResponse::Ok().json(d))
}

#[utoipa::path(
    delete,
    path = "/api/v1/discussions/{id}",
    params(("id" = Id, Path, description = "Discussion id")),
    responses(
        (status = 204, description = "Discussion and its replies deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Discussion not found")
    )
)]
pub async fn delete_discussion(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let current = data.repo.get_discussion(id, None).await?;
    if !auth.0.may_modify(&current.author_id) {
        return Err(ApiError::Forbidden);
    }
    data.repo.delete_discussion(id).await?;
    info!(discussion_id = id, by = %auth.0.sub, "discussion deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/discussions/{id}/view",
    params(("id" = Id, Path, description = "Discussion id")),
    responses(
        (status = 200, description = "View counted; body carries the new view_count"),
        (status = 404, description = "Discussion not found")
    )
)]
pub async fn record_view(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let views = data.repo.record_view(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "view_count": views })))
}

#[utoipa::path(
    get,
    path = "/api/v1/discussions/{id}/replies",
    params(("id" = Id, Path, description = "Discussion id")),
    responses(
        (status = 200, description = "Flat replies, oldest first", body = ReplyPage),
        (status = 404, description = "Discussion not found")
    )
)]
pub async fn list_replies(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let replies = data.repo.list_replies(path.into_inner(), viewer(&auth)).await?;
    Ok(HttpResponse::Ok().json(ReplyPage::new(replies)))
}

#[utoipa::path(
    get,
    path = "/api/v1/discussions/{id}/replies/tree",
    params(("id" = Id, Path, description = "Discussion id")),
    responses(
        (status = 200, description = "Replies nested under their parents; orphans are roots"),
        (status = 404, description = "Discussion not found")
    )
)]
pub async fn reply_tree(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let replies = data.repo.list_replies(path.into_inner(), viewer(&auth)).await?;
    Ok(HttpResponse::Ok().json(build_tree(replies).to_nested()))
}

#[utoipa::path(
    post,
    path = "/api/v1/discussions/{id}/replies",
    request_body = NewReply,
    params(("id" = Id, Path, description = "Discussion id")),
    responses(
        (status = 201, description = "Reply created", body = Reply),
        (status = 400, description = "Empty content"),
        (status = 404, description = "Discussion or parent reply not found"),
        (status = 409, description = "Parent reply belongs to another discussion")
    )
)]
pub async fn create_reply(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewReply>,
) -> Result<HttpResponse, ApiError> {
    let discussion_id = path.into_inner();
    let reply = data.repo.create_reply(discussion_id, payload.into_inner(), auth.0.viewer_id()).await?;
    info!(discussion_id, reply_id = reply.reply_id, parent = ?reply.parent_reply_id, "reply created");
    Ok(HttpResponse::Created().json(reply))
}

#[utoipa::path(
    delete,
    path = "/api/v1/replies/{id}",
    params(("id" = Id, Path, description = "Reply id")),
    responses(
        (status = 204, description = "Reply deleted; its children stay"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Reply not found")
    )
)]
pub async fn delete_reply(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let reply = data.repo.get_reply(id, None).await?;
    if !auth.0.may_modify(&reply.author_id) {
        return Err(ApiError::Forbidden);
    }
    data.repo.delete_reply(id).await?;
    info!(reply_id = id, discussion_id = reply.discussion_id, "reply deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/votes",
    request_body = VoteRequest,
    responses(
        (status = 204, description = "Vote applied (created, cleared or switched)"),
        (status = 400, description = "Not exactly one of discussion_id / reply_id"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Target not found")
    )
)]
pub async fn cast_vote(auth: Auth, data: web::Data<AppState>, payload: web::Json<VoteRequest>) -> Result<HttpResponse, ApiError> {
    let target = payload.target()?;
    let now = data.repo.cast_vote(auth.0.viewer_id(), target, payload.vote_type).await?;
    info!(?target, voter = %auth.0.sub, result = ?now, "vote cast");
    Ok(HttpResponse::NoContent().finish())
}
