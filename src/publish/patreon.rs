//! Patreon API v2 publisher.
//!
//! Each post is two requests against `api_base`:
//!
//! 1. `POST /posts` with a JSON:API document (title, caption, public, free,
//!    attached to the campaign). Returns the new post id.
//! 2. `POST /posts/{id}/media` with the image as multipart field `file`.
//!    A failed upload is logged; the post itself already exists.
//!
//! Requests that hit 429, a 5xx or a transport error are retried up to
//! `max_retries` times with exponential backoff. A 401 triggers one token
//! refresh per publisher when a refresh token and client credentials are
//! available.

use super::{PostDraft, PublishError, Publisher};
use crate::config::{PatreonConfig, PatreonCredentials};
use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response, multipart};
use serde::Deserialize;
use serde_json::{Value, json};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Title shared by every post made on `date`.
pub fn post_title(date: NaiveDate) -> String {
    format!("Daily Architectural Art - {}", date.format("%B %d, %Y"))
}

/// JSON:API body for creating a free, public post in `campaign_id`.
pub fn post_payload(title: &str, content: &str, campaign_id: &str) -> Value {
    json!({
        "data": {
            "type": "post",
            "attributes": {
                "title": title,
                "content": content,
                "is_paid": false,
                "is_public": true
            },
            "relationships": {
                "campaign": {
                    "data": { "id": campaign_id, "type": "campaign" }
                }
            }
        }
    })
}

/// Wait before retry number `attempt` (0-based).
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(MAX_BACKOFF)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[derive(Deserialize)]
struct CreatedPost {
    data: CreatedPostData,
}

#[derive(Deserialize)]
struct CreatedPostData {
    id: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

pub struct PatreonPublisher {
    client: Client,
    api_base: String,
    token_url: String,
    campaign_id: String,
    credentials: PatreonCredentials,
    max_retries: u32,
    backoff_base: Duration,
    refreshed: bool,
}

impl PatreonPublisher {
    /// Build a client from config. Fails without an access token.
    pub fn new(config: &PatreonConfig) -> Result<Self, PublishError> {
        if config.credentials.access_token.is_none() {
            return Err(PublishError::MissingCredential("PATREON_ACCESS_TOKEN"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            campaign_id: config.campaign_id.clone(),
            credentials: config.credentials.clone(),
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(1),
            refreshed: false,
        })
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    fn access_token(&self) -> Result<String, PublishError> {
        self.credentials
            .access_token
            .clone()
            .ok_or(PublishError::MissingCredential("PATREON_ACCESS_TOKEN"))
    }

    fn can_refresh(&self) -> bool {
        !self.refreshed
            && self.credentials.refresh_token.is_some()
            && self.credentials.client_id.is_some()
            && self.credentials.client_secret.is_some()
    }

    /// Exchange the refresh token for a new access token.
    fn refresh_access_token(&mut self) -> Result<(), PublishError> {
        self.refreshed = true;
        let creds = &self.credentials;
        let (Some(refresh), Some(id), Some(secret)) = (
            creds.refresh_token.as_deref(),
            creds.client_id.as_deref(),
            creds.client_secret.as_deref(),
        ) else {
            return Err(PublishError::MissingCredential("PATREON_REFRESH_TOKEN"));
        };

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", id),
            ("client_secret", secret),
        ];
        let response = self.client.post(&self.token_url).form(&params).send()?;
        if !response.status().is_success() {
            return Err(api_error(response));
        }
        let tokens: TokenResponse = response.json()?;
        self.credentials.access_token = Some(tokens.access_token);
        if let Some(rt) = tokens.refresh_token {
            self.credentials.refresh_token = Some(rt);
        }
        info!("refreshed Patreon access token");
        Ok(())
    }

    /// Send an authorized request, retrying as described in the module docs.
    ///
    /// `build` is called once per attempt because multipart bodies can't be
    /// cloned.
    fn send<F>(&mut self, what: &str, mut build: F) -> Result<Response, PublishError>
    where
        F: FnMut(&Client) -> Result<RequestBuilder, PublishError>,
    {
        let mut attempt = 0;
        loop {
            let token = self.access_token()?;
            let result = build(&self.client)?.bearer_auth(token).send();
            match result {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED && self.can_refresh() => {
                    warn!(request = what, "access token rejected, refreshing");
                    self.refresh_access_token()?;
                }
                Ok(resp) if is_retryable(resp.status()) && attempt < self.max_retries => {
                    let delay = backoff_delay(self.backoff_base, attempt);
                    warn!(
                        request = what,
                        status = %resp.status(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying Patreon request"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Ok(resp) => return Err(api_error(resp)),
                Err(e) if attempt < self.max_retries && (e.is_timeout() || e.is_connect()) => {
                    let delay = backoff_delay(self.backoff_base, attempt);
                    warn!(request = what, error = %e, attempt = attempt + 1, "retrying Patreon request");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn create_post(&mut self, title: &str, content: &str) -> Result<String, PublishError> {
        let url = format!("{}/posts", self.api_base);
        let body = post_payload(title, content, &self.campaign_id);
        let response = self.send("create post", |client| Ok(client.post(&url).json(&body)))?;
        let created: CreatedPost = response
            .json()
            .map_err(|e| PublishError::InvalidResponse(format!("post creation: {e}")))?;
        info!(post_id = %created.data.id, "created Patreon post");
        Ok(created.data.id)
    }

    fn upload_media(&mut self, post_id: &str, draft: &PostDraft) -> Result<(), PublishError> {
        let url = format!("{}/posts/{}/media", self.api_base, post_id);
        let path = draft.image_path.clone();
        self.send("upload media", |client| {
            let form = multipart::Form::new().file("file", &path)?;
            Ok(client.post(&url).multipart(form))
        })?;
        info!(post_id, file = %draft.image_path.display(), "uploaded image to Patreon post");
        Ok(())
    }
}

fn api_error(response: Response) -> PublishError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    error!(status, body = %body, "Patreon API request failed");
    PublishError::Api { status, body }
}

impl Publisher for PatreonPublisher {
    fn check_connection(&mut self) -> Result<(), PublishError> {
        let url = format!("{}/campaigns/{}", self.api_base, self.campaign_id);
        debug!(url = %url, "checking Patreon campaign");
        self.send("fetch campaign", |client| Ok(client.get(&url)))?;
        info!(campaign = %self.campaign_id, "Patreon connection ok");
        Ok(())
    }

    fn publish(&mut self, draft: &PostDraft) -> Result<Option<String>, PublishError> {
        let title = post_title(draft.date);
        let post_id = self.create_post(&title, &draft.caption)?;
        if let Err(e) = self.upload_media(&post_id, draft) {
            error!(post_id = %post_id, error = %e, "image upload failed, post left without media");
        }
        Ok(Some(post_id))
    }
}
