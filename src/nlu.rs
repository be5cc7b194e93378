use crate::message::{Button, MessageDescriptor, QuickReply};
use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum NluError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed NLU response: {0}")]
    BadResponse(String),
}

/// What the NLU resolved for one utterance. At most one of the three
/// shapes is relayed, in precedence order: data, then rich messages,
/// then plain text.
#[derive(Debug, Clone, Default)]
pub struct Fulfillment {
    pub text: Option<String>,
    /// Platform-native payload(s), relayed verbatim.
    pub data: Option<Value>,
    pub messages: Vec<MessageDescriptor>,
}

/// Intent-detection seam. Free text and events the engine does not handle
/// locally are forwarded here.
#[async_trait]
pub trait Nlu: Send + Sync {
    async fn query_text(&self, session_id: &str, text: &str) -> Result<Fulfillment, NluError>;

    async fn query_event(
        &self,
        session_id: &str,
        name: &str,
        data: Option<&Value>,
    ) -> Result<Fulfillment, NluError>;
}

/// api.ai-style `/v1/query` client.
pub struct ApiNlu {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    language: String,
}

impl ApiNlu {
    pub fn new(
        endpoint: impl Into<String>,
        access_token: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            access_token: access_token.into(),
            language: language.into(),
        }
    }

    async fn query(&self, mut body: Value) -> Result<Fulfillment, NluError> {
        body["lang"] = json!(self.language);
        let response: Value = self
            .client
            .post(format!("{}/query", self.endpoint))
            .query(&[("v", "20150910")])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        parse_fulfillment(&response)
            .ok_or_else(|| NluError::BadResponse("missing result.fulfillment".into()))
    }
}

#[async_trait]
impl Nlu for ApiNlu {
    async fn query_text(&self, session_id: &str, text: &str) -> Result<Fulfillment, NluError> {
        self.query(json!({ "query": text, "sessionId": session_id }))
            .await
    }

    async fn query_event(
        &self,
        session_id: &str,
        name: &str,
        data: Option<&Value>,
    ) -> Result<Fulfillment, NluError> {
        let mut event = json!({ "name": name });
        if let Some(data) = data {
            event["data"] = data.clone();
        }
        self.query(json!({ "event": event, "sessionId": session_id }))
            .await
    }
}

/// Extract the fulfillment from a `/v1/query` response body.
pub fn parse_fulfillment(response: &Value) -> Option<Fulfillment> {
    let fulfillment = response.get("result")?.get("fulfillment")?;

    let text = fulfillment
        .get("speech")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let data = fulfillment
        .get("data")
        .and_then(|d| d.get("facebook"))
        .cloned();

    let messages = fulfillment
        .get("messages")
        .and_then(Value::as_array)
        .map(|raw| raw.iter().filter_map(descriptor_from_value).collect())
        .unwrap_or_default();

    Some(Fulfillment {
        text,
        data,
        messages,
    })
}

/// Map one NLU rich-message object onto a descriptor. Unknown or
/// malformed kinds yield `None` and are dropped without error.
fn descriptor_from_value(raw: &Value) -> Option<MessageDescriptor> {
    match raw.get("type")?.as_u64()? {
        0 => Some(MessageDescriptor::Text {
            text: raw.get("speech")?.as_str()?.to_string(),
        }),
        1 => Some(MessageDescriptor::Card {
            title: raw
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            image_url: raw
                .get("imageUrl")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            subtitle: raw
                .get("subtitle")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            buttons: raw
                .get("buttons")
                .and_then(Value::as_array)
                .map(|buttons| {
                    buttons
                        .iter()
                        .filter_map(|b| {
                            Some(Button {
                                label: b.get("text")?.as_str()?.to_string(),
                                target: b
                                    .get("postback")
                                    .and_then(Value::as_str)
                                    .filter(|p| !p.is_empty())
                                    .map(str::to_string),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }),
        2 => Some(MessageDescriptor::QuickReplies {
            title: raw
                .get("title")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            options: raw
                .get("replies")
                .and_then(Value::as_array)
                .map(|replies| {
                    replies
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|r| QuickReply::new(r, r))
                        .collect()
                })
                .unwrap_or_default(),
        }),
        3 => Some(MessageDescriptor::Image {
            url: raw
                .get("imageUrl")
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
        }),
        4 => raw
            .get("payload")
            .and_then(|p| p.get("facebook"))
            .map(|facebook| MessageDescriptor::Custom {
                raw: facebook.clone(),
            }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_speech_only() {
        let response = json!({
            "result": { "fulfillment": { "speech": "hello" } }
        });
        let fulfillment = parse_fulfillment(&response).unwrap();
        assert_eq!(fulfillment.text.as_deref(), Some("hello"));
        assert!(fulfillment.data.is_none());
        assert!(fulfillment.messages.is_empty());
    }

    #[test]
    fn test_parse_data_payload() {
        let response = json!({
            "result": { "fulfillment": {
                "speech": "",
                "data": { "facebook": { "text": "native" } }
            }}
        });
        let fulfillment = parse_fulfillment(&response).unwrap();
        assert!(fulfillment.text.is_none());
        assert_eq!(fulfillment.data, Some(json!({ "text": "native" })));
    }

    #[test]
    fn test_parse_rich_messages() {
        let response = json!({
            "result": { "fulfillment": {
                "speech": "fallback",
                "messages": [
                    { "type": 0, "speech": "hi" },
                    { "type": 1, "title": "Entry", "imageUrl": "http://e/i.png",
                      "buttons": [{ "text": "Vote", "postback": "BC 123456" },
                                  { "text": "Listen" }] },
                    { "type": 2, "title": "Pick one", "replies": ["A", "B"] },
                    { "type": 3, "imageUrl": "http://e/photo.jpg" },
                    { "type": 4, "payload": { "facebook": { "text": "raw" } } },
                    { "type": 99, "speech": "dropped" }
                ]
            }}
        });
        let fulfillment = parse_fulfillment(&response).unwrap();
        assert_eq!(fulfillment.messages.len(), 5);
        assert_eq!(
            fulfillment.messages[0],
            MessageDescriptor::text("hi")
        );
        match &fulfillment.messages[1] {
            MessageDescriptor::Card { title, buttons, .. } => {
                assert_eq!(title, "Entry");
                assert_eq!(buttons.len(), 2);
                assert_eq!(buttons[0].target.as_deref(), Some("BC 123456"));
                assert!(buttons[1].target.is_none());
            }
            other => panic!("expected card, got {:?}", other),
        }
        match &fulfillment.messages[2] {
            MessageDescriptor::QuickReplies { title, options } => {
                assert_eq!(title.as_deref(), Some("Pick one"));
                assert_eq!(options[1], QuickReply::new("B", "B"));
            }
            other => panic!("expected quick replies, got {:?}", other),
        }
        assert_eq!(
            fulfillment.messages[4],
            MessageDescriptor::Custom {
                raw: json!({ "text": "raw" })
            }
        );
    }

    #[test]
    fn test_unknown_kind_dropped_silently() {
        assert!(descriptor_from_value(&json!({ "type": 7 })).is_none());
        assert!(descriptor_from_value(&json!({ "no_type": true })).is_none());
    }

    #[test]
    fn test_missing_fulfillment() {
        assert!(parse_fulfillment(&json!({ "status": { "code": 200 } })).is_none());
    }
}
