use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The platform answered 200 but reported an error in the body.
    #[error("platform error: {0}")]
    Platform(String),
    #[error("malformed profile response for {0}")]
    BadProfile(String),
}

/// Platform profile of a sender, fetched once when a user is first seen.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
}

/// Outbound messaging seam. The dispatcher and engine depend on this
/// narrow contract; the Graph API client below is the production impl.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, recipient: &str, payload: &Value) -> Result<(), TransportError>;

    /// Send a sender action such as "typing_on".
    async fn send_action(&self, recipient: &str, action: &str) -> Result<(), TransportError>;

    async fn fetch_profile(&self, sender: &str) -> Result<Profile, TransportError>;
}

/// Messenger Graph API transport.
pub struct GraphTransport {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GraphTransport {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, "https://graph.facebook.com/v2.6")
    }

    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
            base_url: base_url.into(),
        }
    }

    async fn post_messages(&self, body: Value) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/me/messages", self.base_url))
            .query(&[("access_token", self.access_token.as_str())])
            .json(&body)
            .send()
            .await?;
        let body: Value = response.json().await?;
        if let Some(error) = body.get("error") {
            return Err(TransportError::Platform(error.to_string()));
        }
        Ok(())
    }

    /// Subscribe the app to the page's webhook events. Called at startup.
    pub async fn subscribe(&self) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/me/subscribed_apps", self.base_url))
            .query(&[("access_token", self.access_token.as_str())])
            .send()
            .await?;
        tracing::info!("Subscription result: {}", response.status());
        Ok(())
    }

    /// Configure the get-started button shown to first-time users.
    pub async fn configure_get_started(&self, payload: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/me/thread_settings", self.base_url))
            .query(&[("access_token", self.access_token.as_str())])
            .json(&json!({
                "setting_type": "call_to_actions",
                "thread_state": "new_thread",
                "call_to_actions": [{ "payload": payload }]
            }))
            .send()
            .await?;
        tracing::info!("Get-started setup result: {}", response.status());
        Ok(())
    }
}

#[async_trait]
impl Transport for GraphTransport {
    async fn send_message(&self, recipient: &str, payload: &Value) -> Result<(), TransportError> {
        self.post_messages(json!({
            "recipient": { "id": recipient },
            "message": payload,
        }))
        .await
    }

    async fn send_action(&self, recipient: &str, action: &str) -> Result<(), TransportError> {
        self.post_messages(json!({
            "recipient": { "id": recipient },
            "sender_action": action,
        }))
        .await
    }

    async fn fetch_profile(&self, sender: &str) -> Result<Profile, TransportError> {
        let body: Value = self
            .client
            .get(format!("{}/{}/", self.base_url, sender))
            .query(&[("access_token", self.access_token.as_str())])
            .send()
            .await?
            .json()
            .await?;
        if body.get("error").is_some() || body.get("first_name").is_none() {
            return Err(TransportError::BadProfile(sender.to_string()));
        }
        Ok(Profile {
            first_name: body["first_name"].as_str().unwrap_or("").to_string(),
            last_name: body["last_name"].as_str().unwrap_or("").to_string(),
        })
    }
}
