use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::client::api::DiscussionApi;
use crate::config::ClientConfig;
use crate::error::{ApiErrorBody, ClientError, ClientResult};
use crate::models::{Discussion, Id, NewReply, Reply, ReplyPage, UpdateDiscussion, VoteRequest};

/// `reqwest` transport against the `/api/v1` surface.
pub struct HttpDiscussionApi {
    base: String,
    client: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl HttpDiscussionApi {
    pub fn new(cfg: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            base: cfg.api_url.trim_end_matches('/').to_string(),
            client,
            token: RwLock::new(cfg.token.clone()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    async fn send(&self, operation: &'static str, rb: RequestBuilder) -> ClientResult<Response> {
        let rb = match self.token() {
            Some(t) => rb.bearer_auth(t),
            None => rb,
        };
        let resp = rb
            .send()
            .await
            .map_err(|source| ClientError::Network { operation, source })?;
        let status = resp.status();
        if status.is_success() {
            debug!(operation, status = status.as_u16(), "request ok");
            return Ok(resp);
        }
        let fallback = status.canonical_reason().unwrap_or("request failed").to_string();
        let message = match resp.json::<ApiErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => fallback,
        };
        warn!(operation, status = status.as_u16(), %message, "request rejected");
        Err(ClientError::Rejected { operation, status: status.as_u16(), message })
    }

    async fn decode<T: DeserializeOwned>(operation: &'static str, resp: Response) -> ClientResult<T> {
        resp.json::<T>()
            .await
            .map_err(|source| ClientError::Network { operation, source })
    }
}

#[async_trait]
impl DiscussionApi for HttpDiscussionApi {
    async fn get_discussion(&self, id: Id) -> ClientResult<Discussion> {
        let op = "get_discussion";
        let resp = self.send(op, self.client.get(self.url(&format!("/discussions/{id}")))).await?;
        Self::decode(op, resp).await
    }

    async fn update_discussion(&self, id: Id, upd: UpdateDiscussion) -> ClientResult<Discussion> {
        let op = "update_discussion";
        let resp = self.send(op, self.client.patch(self.url(&format!("/discussions/{id}"))).json(&upd)).await?;
        Self::decode(op, resp).await
    }

    async fn delete_discussion(&self, id: Id) -> ClientResult<()> {
        self.send("delete_discussion", self.client.delete(self.url(&format!("/discussions/{id}")))).await?;
        Ok(())
    }

    async fn list_replies(&self, discussion_id: Id) -> ClientResult<ReplyPage> {
        let op = "list_replies";
        let url = self.url(&format!("/discussions/{discussion_id}/replies"));
        let resp = self.send(op, self.client.get(url)).await?;
        Self::decode(op, resp).await
    }

    async fn create_reply(&self, discussion_id: Id, new: NewReply) -> ClientResult<Reply> {
        let op = "create_reply";
        let url = self.url(&format!("/discussions/{discussion_id}/replies"));
        let resp = self.send(op, self.client.post(url).json(&new)).await?;
        Self::decode(op, resp).await
    }

    async fn cast_vote(&self, vote: VoteRequest) -> ClientResult<()> {
        self.send("cast_vote", self.client.post(self.url("/votes")).json(&vote)).await?;
        Ok(())
    }

    async fn delete_reply(&self, reply_id: Id) -> ClientResult<()> {
        let url = self.url(&format!("/replies/{reply_id}"));
        self.send("delete_reply", self.client.delete(url)).await?;
        Ok(())
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }
}
