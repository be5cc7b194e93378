use serde_json::Value;

/// A media attachment carried by an inbound message.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

impl Attachment {
    /// Contest entries must be audio or video; anything else is rejected
    /// with a corrective prompt.
    pub fn is_submission(&self) -> bool {
        self.kind == "audio" || self.kind == "video"
    }
}

/// One inbound unit from the messaging platform, consumed once.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub sender: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Text(String),
    QuickReply { payload: String },
    Postback { payload: String, data: Option<Value> },
    Attachment(Attachment),
    /// The page's own outbound message echoed back. Ignored except for the
    /// TURN_ON / TURN_OFF control tokens.
    Echo(String),
}

impl Event {
    /// The free-text view of this event, the way the NLU sees it: quick
    /// reply and postback payloads count as text.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Text(text) => Some(text),
            EventKind::QuickReply { payload } => Some(payload),
            EventKind::Postback { payload, .. } => Some(payload),
            EventKind::Attachment(_) | EventKind::Echo(_) => None,
        }
    }
}

/// Parse a webhook envelope (`entry[].messaging[]`) into events.
///
/// Delivery and read receipts are skipped. Echoes keep only their text and
/// are attributed to the conversation partner (`recipient.id`), since the
/// page itself is the sender on the wire.
pub fn parse_webhook(body: &Value) -> Vec<Event> {
    let mut events = Vec::new();
    let Some(entries) = body.get("entry").and_then(Value::as_array) else {
        return events;
    };
    for entry in entries {
        let Some(messaging) = entry.get("messaging").and_then(Value::as_array) else {
            continue;
        };
        for raw in messaging {
            if let Some(event) = parse_messaging_event(raw) {
                events.push(event);
            }
        }
    }
    events
}

fn parse_messaging_event(raw: &Value) -> Option<Event> {
    if raw.get("delivery").is_some() || raw.get("read").is_some() {
        return None;
    }

    let message = raw.get("message");
    let is_echo = message
        .and_then(|m| m.get("is_echo"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let sender = if is_echo {
        raw["recipient"]["id"].as_str()?.to_string()
    } else {
        raw["sender"]["id"].as_str()?.to_string()
    };

    if is_echo {
        let text = message?.get("text")?.as_str()?.to_string();
        return Some(Event {
            sender,
            kind: EventKind::Echo(text),
        });
    }

    if let Some(postback) = raw.get("postback") {
        let payload = postback.get("payload")?.as_str()?.to_string();
        return Some(Event {
            sender,
            kind: EventKind::Postback {
                payload,
                data: postback.get("data").cloned(),
            },
        });
    }

    let message = message?;

    if let Some(attachments) = message.get("attachments").and_then(Value::as_array) {
        // Only the first attachment counts; the platform sends one per upload.
        let first = attachments.first()?;
        return Some(Event {
            sender,
            kind: EventKind::Attachment(Attachment {
                kind: first["type"].as_str().unwrap_or("").to_string(),
                url: first["payload"]["url"].as_str().unwrap_or("").to_string(),
            }),
        });
    }

    if let Some(quick_reply) = message.get("quick_reply") {
        let payload = quick_reply.get("payload")?.as_str()?.to_string();
        return Some(Event {
            sender,
            kind: EventKind::QuickReply { payload },
        });
    }

    let text = message.get("text")?.as_str()?.to_string();
    Some(Event {
        sender,
        kind: EventKind::Text(text),
    })
}
