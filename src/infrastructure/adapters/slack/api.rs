//! Slack Web API client

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::application::errors::BotError;
use crate::infrastructure::config::SlackConfig;

/// Slack Web API base URL
const API_BASE: &str = "https://slack.com/api";

/// Page size requested from cursor-paginated methods
const PAGE_LIMIT: u32 = 200;

/// Response of `rtm.connect`
#[derive(Debug, Clone, Deserialize)]
pub struct RtmConnectResponse {
    pub url: String,
    #[serde(rename = "self")]
    pub identity: Identity,
    pub team: Option<Team>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: Option<String>,
    pub domain: Option<String>,
}

/// Conversation summary as returned by `conversations.list`
#[derive(Debug, Clone, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub name: Option<String>,
    pub user: Option<String>,
}

/// Formatting flags forwarded to `chat.postMessage`
#[derive(Debug, Clone, Default)]
struct PostOptions {
    parse: Option<String>,
    link_names: Option<bool>,
    unfurl_links: Option<bool>,
    unfurl_media: Option<bool>,
}

/// Slack Web API client
#[derive(Clone)]
pub struct SlackApi {
    token: String,
    client: Client,
    base_url: String,
    post_options: PostOptions,
}

impl SlackApi {
    pub fn new(config: &SlackConfig) -> Result<Self, BotError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(30));
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy).map_err(|e| BotError::Network(e.to_string()))?,
            );
        }

        Ok(Self {
            token: config.token.clone(),
            client: builder.build()?,
            base_url: API_BASE.to_string(),
            post_options: PostOptions {
                parse: config.parse.clone(),
                link_names: config.link_names,
                unfurl_links: config.unfurl_links,
                unfurl_media: config.unfurl_media,
            },
        })
    }

    /// Points the client at another API root, e.g. a local test server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Calls a Web API method and decodes the body once `ok` is confirmed
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, BotError> {
        let response = self
            .client
            .post(self.api_url(method))
            .bearer_auth(&self.token)
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BotError::Network(format!(
                "Slack API error in {}: {}",
                method,
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        check_ok(method, &body)?;
        serde_json::from_value(body).map_err(|e| BotError::Parse(format!("{}: {}", method, e)))
    }

    /// Opens an RTM session and returns the websocket URL plus our own identity
    pub async fn rtm_connect(&self) -> Result<RtmConnectResponse, BotError> {
        self.call("rtm.connect", &[]).await
    }

    /// Posts each string as a separate message
    pub async fn send_messages(&self, channel: &str, strings: &[String]) -> Result<(), BotError> {
        for text in strings {
            let mut params = vec![
                ("channel", channel.to_string()),
                ("text", text.clone()),
                ("as_user", "true".to_string()),
            ];
            if let Some(parse) = &self.post_options.parse {
                params.push(("parse", parse.clone()));
            }
            if let Some(link_names) = self.post_options.link_names {
                params.push(("link_names", (link_names as u8).to_string()));
            }
            if let Some(unfurl_links) = self.post_options.unfurl_links {
                params.push(("unfurl_links", unfurl_links.to_string()));
            }
            if let Some(unfurl_media) = self.post_options.unfurl_media {
                params.push(("unfurl_media", unfurl_media.to_string()));
            }

            let _: Value = self.call("chat.postMessage", &params).await?;
        }
        tracing::debug!("Posted {} message(s) to {}", strings.len(), channel);
        Ok(())
    }

    pub async fn set_topic(&self, channel: &str, topic: &str) -> Result<(), BotError> {
        let params = [("channel", channel.to_string()), ("topic", topic.to_string())];
        let _: Value = self.call("conversations.setTopic", &params).await?;
        Ok(())
    }

    /// Opens (or reuses) the direct message channel with a user
    pub async fn open_im(&self, user_id: &str) -> Result<String, BotError> {
        #[derive(Deserialize)]
        struct Response {
            channel: Conversation,
        }

        let response: Response = self
            .call("conversations.open", &[("users", user_id.to_string())])
            .await?;
        Ok(response.channel.id)
    }

    /// All member ids of a conversation, across every page
    pub async fn conversation_members(&self, channel: &str) -> Result<Vec<String>, BotError> {
        let params = [("channel", channel.to_string())];
        let params = &params;
        collect_pages(move |cursor| self.page("conversations.members", params, "members", cursor))
            .await
    }

    /// Conversations of the given types the token can see, across every page
    pub async fn list_conversations(&self, types: &str) -> Result<Vec<Conversation>, BotError> {
        let params = [("types", types.to_string())];
        let params = &params;
        collect_pages(move |cursor| self.page("conversations.list", params, "channels", cursor))
            .await
    }

    async fn page<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
        key: &str,
        cursor: Option<String>,
    ) -> Result<(Vec<T>, Option<String>), BotError> {
        let mut params = params.to_vec();
        params.push(("limit", PAGE_LIMIT.to_string()));
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let body: Value = self.call(method, &params).await?;
        decode_page(method, body, key)
    }
}

/// Splits a paginated response into its items and the cursor of the next page
fn decode_page<T: DeserializeOwned>(
    method: &str,
    mut body: Value,
    key: &str,
) -> Result<(Vec<T>, Option<String>), BotError> {
    let next_cursor = body
        .pointer("/response_metadata/next_cursor")
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    let items = match body.get_mut(key).map(Value::take) {
        Some(items) => serde_json::from_value(items)
            .map_err(|e| BotError::Parse(format!("{}: {}", method, e)))?,
        None => Vec::new(),
    };
    Ok((items, next_cursor))
}

/// Follows `next_cursor` until a page comes back without one
async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, BotError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>), BotError>>,
{
    let mut all = Vec::new();
    let mut cursor = None;
    loop {
        let (items, next) = fetch(cursor).await?;
        all.extend(items);
        match next {
            Some(next) => cursor = Some(next),
            None => return Ok(all),
        }
    }
}

fn check_ok(method: &str, body: &Value) -> Result<(), BotError> {
    if body.get("ok").and_then(|ok| ok.as_bool()) == Some(true) {
        return Ok(());
    }
    let error = body
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("unknown_error")
        .to_string();
    Err(BotError::Api {
        method: method.to_string(),
        error,
    })
}
