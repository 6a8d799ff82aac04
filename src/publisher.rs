use std::{cell::OnceCell, time::Duration};

use anyhow::{bail, Context};
use log::{debug, info, warn};
use reqwest::{blocking::Client, StatusCode};
use serde::Deserialize;

mod request;

pub(crate) use request::PublishRequest;

pub(crate) trait Publisher {
    /// Submits `request` exactly once. `true` only if the article was created.
    ///
    /// Failures are logged here; backing off and retrying is up to the caller.
    fn publish(&self, request: &PublishRequest) -> bool;
}

#[derive(Deserialize, Debug)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize, Debug)]
struct User {
    id: String,
}

#[derive(Deserialize, Debug)]
struct CreatedPost {
    id: String,
    #[serde(default)]
    url: String,
}

/// Medium REST API client. Blocking; one request at a time.
#[derive(Debug)]
pub(crate) struct MediumPublisher {
    client: Client,
    api_base: String,
    token: Option<String>,
    user_id: OnceCell<String>,
}

impl MediumPublisher {
    pub fn new(api_base: &str, token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("while building the HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            user_id: OnceCell::new(),
        })
    }

    fn user_id(&self, token: &str) -> anyhow::Result<&str> {
        if let Some(id) = self.user_id.get() {
            return Ok(id.as_str());
        }

        debug!("Resolving Medium user...");
        let response = self
            .client
            .get(format!("{}/v1/me", self.api_base))
            .query(&[("accessToken", token)])
            .send()
            .context("while requesting /v1/me")?;
        let status = response.status();
        if !status.is_success() {
            bail!("/v1/me returned {status}: {}", response.text().unwrap_or_default());
        }
        let me: Envelope<User> = response.json().context("Invalid /v1/me response")?;
        debug!("done. user id: {}", me.data.id);

        Ok(self.user_id.get_or_init(|| me.data.id).as_str())
    }

    fn submit(&self, request: &PublishRequest) -> anyhow::Result<()> {
        let token = self.token.as_deref().context("MEDIUM_TOKEN is not set")?;
        let user_id = self.user_id(token)?;

        let response = self
            .client
            .post(format!("{}/v1/users/{user_id}/posts", self.api_base))
            .bearer_auth(token)
            .json(request)
            .send()
            .context("while posting the article")?;
        let status = response.status();
        if status != StatusCode::CREATED {
            bail!("{status}: {}", response.text().unwrap_or_default());
        }

        match response.json::<Envelope<CreatedPost>>() {
            Ok(created) => info!("Created draft {} {}", created.data.id, created.data.url),
            Err(e) => debug!("created, but the response body was unreadable: {e}"),
        }
        Ok(())
    }
}

impl Publisher for MediumPublisher {
    fn publish(&self, request: &PublishRequest) -> bool {
        match self.submit(request) {
            Ok(()) => true,
            Err(e) => {
                warn!("Publishing {:?} failed: {e:#}", request.title);
                false
            }
        }
    }
}
