//! HTTP client for the REST collaborators: notification history, mark-read,
//! and the activity feed.

use std::future::Future;

use pulse_core::{
  api::{FeedApi, NotificationApi},
  feed::{FeedFilter, FeedPost},
  notification::{NotificationItem, NotificationRecord},
};
use reqwest::{Client, RequestBuilder, Response};

use crate::{
  config::ClientConfig,
  error::{Error, Result},
};

/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct RestClient {
  client:   Client,
  base_url: String,
  token:    String,
}

impl RestClient {
  pub fn new(config: &ClientConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.request_timeout()).build()?;
    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      token: config.token.clone(),
    })
  }

  fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.token.is_empty() { req } else { req.bearer_auth(&self.token) }
  }

  async fn send(&self, path: &str, req: RequestBuilder) -> Result<Response> {
    let resp = self.auth(req).send().await?;
    if !resp.status().is_success() {
      return Err(Error::Status { path: path.to_string(), status: resp.status() });
    }
    Ok(resp)
  }
}

impl NotificationApi for RestClient {
  type Error = Error;

  /// `GET /notifications/`
  fn fetch_history(
    &self,
  ) -> impl Future<Output = Result<Vec<NotificationItem>>> + Send + '_ {
    async move {
      let path = "/notifications/";
      let resp = self.send(path, self.client.get(self.url(path))).await?;
      let records: Vec<NotificationRecord> = resp.json().await?;
      Ok(records.into_iter().map(NotificationItem::from).collect())
    }
  }

  /// `POST /notifications/{id}/read`
  fn mark_read(&self, id: u64) -> impl Future<Output = Result<()>> + Send + '_ {
    async move {
      let path = format!("/notifications/{id}/read");
      self.send(&path, self.client.post(self.url(&path))).await?;
      Ok(())
    }
  }
}

impl FeedApi for RestClient {
  type Error = Error;

  /// `GET /feed/?user_id=…&start_date=…&end_date=…`
  fn fetch_feed<'a>(
    &'a self,
    filter: &'a FeedFilter,
  ) -> impl Future<Output = Result<Vec<FeedPost>>> + Send + 'a {
    async move {
      let path = "/feed/";
      let req = self.client.get(self.url(path)).query(&filter.query_pairs());
      let resp = self.send(path, req).await?;
      Ok(resp.json().await?)
    }
  }
}
