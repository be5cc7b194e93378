//! Conversation engine: routes inbound events to flow handlers or the NLU
//! and delivers whatever comes back.

pub mod flows;

use crate::command::Command;
use crate::db::users::{Prompt, UserDocument};
use crate::db::{Db, DbError};
use crate::dispatch::{DeliveryError, Dispatcher};
use crate::event::{Event, EventKind};
use crate::message::{compile::compile, CompiledMessage, MessageDescriptor};
use crate::nlu::{Fulfillment, Nlu, NluError};
use crate::session::SessionStore;
use crate::transport::{Transport, TransportError};
use flows::Turn;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("database error: {0}")]
    Db(#[from] DbError),
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("NLU error: {0}")]
    Nlu(#[from] NluError),
}

/// Outcome of routing one event before any I/O happens.
enum Routed {
    /// A flow handler produced messages and an updated document.
    Flow(Turn),
    /// Hand the text to the NLU.
    Forward(String),
    /// Hand a named platform event to the NLU.
    ForwardEvent { name: String, data: Option<Value> },
    /// Nothing to do.
    Ignore,
}

/// Postback payloads the platform itself emits; these map onto NLU events
/// rather than text queries.
const PLATFORM_EVENTS: &[&str] = &["FACEBOOK_WELCOME", "FACEBOOK_LOCATION"];

pub struct Engine {
    db: Db,
    dispatcher: Dispatcher,
    transport: Arc<dyn Transport>,
    nlu: Arc<dyn Nlu>,
    sessions: SessionStore,
}

impl Engine {
    pub fn new(
        db: Db,
        dispatcher: Dispatcher,
        transport: Arc<dyn Transport>,
        nlu: Arc<dyn Nlu>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            db,
            dispatcher,
            transport,
            nlu,
            sessions,
        }
    }

    /// Process one inbound event end to end: load (or bootstrap) the user,
    /// route, deliver, persist. Errors are returned to the caller for
    /// logging; they never tear the process down.
    pub async fn handle_event(&self, event: Event) -> Result<(), EngineError> {
        // Echoes only carry the on/off switch; everything else about them
        // is noise.
        if let EventKind::Echo(text) = &event.kind {
            return self.handle_echo(&event.sender, text).await;
        }

        let doc = match self.db.users_find(&event.sender).await? {
            Some(doc) => doc,
            None => self.bootstrap_user(&event.sender).await?,
        };

        if !doc.turned_on {
            tracing::debug!(sender = %event.sender, "Bot is off for this user, skipping");
            return Ok(());
        }

        // Audit trail for accepted submissions, kept even if the user
        // later cancels the confirmation.
        if let EventKind::Attachment(attachment) = &event.kind {
            if attachment.is_submission() {
                self.db
                    .uploads_insert(&event.sender, &attachment.kind, &attachment.url)
                    .await?;
            }
        }

        match self.route(&event, doc) {
            Routed::Flow(turn) => {
                let compiled = compile(&turn.messages);
                self.dispatcher.deliver(&event.sender, &compiled).await?;
                self.db.users_upsert(&turn.doc).await?;
            }
            Routed::Forward(text) => {
                let session = self.sessions.session_id(&event.sender);
                let fulfillment = self.nlu.query_text(&session, &text).await?;
                self.relay(&event.sender, fulfillment).await?;
            }
            Routed::ForwardEvent { name, data } => {
                let session = self.sessions.session_id(&event.sender);
                let fulfillment = self.nlu.query_event(&session, &name, data.as_ref()).await?;
                self.relay(&event.sender, fulfillment).await?;
            }
            Routed::Ignore => {}
        }
        Ok(())
    }

    async fn handle_echo(&self, sender: &str, text: &str) -> Result<(), EngineError> {
        let flip = match text {
            "TURN_ON" => Some(true),
            "TURN_OFF" => Some(false),
            _ => None,
        };
        let Some(turned_on) = flip else {
            return Ok(());
        };
        if let Some(mut doc) = self.db.users_find(sender).await? {
            doc.turned_on = turned_on;
            self.db.users_upsert(&doc).await?;
            tracing::info!(sender, turned_on, "Toggled bot for user");
        }
        Ok(())
    }

    async fn bootstrap_user(&self, sender: &str) -> Result<UserDocument, EngineError> {
        let profile = self.transport.fetch_profile(sender).await?;
        let doc = UserDocument::new(sender, &profile.first_name, &profile.last_name);
        self.db.users_upsert(&doc).await?;
        tracing::info!(sender, name = %doc.full_name(), "New user");
        Ok(doc)
    }

    /// Pure routing: no I/O, no randomness beyond the draws handed to flows.
    fn route(&self, event: &Event, doc: UserDocument) -> Routed {
        match &event.kind {
            EventKind::Postback { payload, data } if PLATFORM_EVENTS.contains(&payload.as_str()) => {
                Routed::ForwardEvent {
                    name: payload.clone(),
                    data: data.clone(),
                }
            }
            EventKind::Postback { payload, .. } | EventKind::QuickReply { payload } => {
                match Command::parse(payload) {
                    Some(command) => self.route_command(command, doc),
                    None => Routed::Forward(payload.clone()),
                }
            }
            EventKind::Text(text) => self.route_text(text, doc),
            EventKind::Attachment(attachment) => {
                if attachment.is_submission() {
                    Routed::Flow(flows::handle_upload(doc, attachment.clone()))
                } else {
                    Routed::Flow(flows::invalid_upload(doc))
                }
            }
            EventKind::Echo(_) => Routed::Ignore,
        }
    }

    fn route_command(&self, command: Command, doc: UserDocument) -> Routed {
        let turn = match command {
            Command::Vote => flows::prompt_vote_code(doc),
            Command::QuickVote(vote_id) => {
                let (score, rank) = vote_draw();
                flows::register_vote(doc, &vote_id, score, rank)
            }
            Command::Review => flows::review_entry(doc),
            Command::ShowGift => flows::show_gift(doc),
            Command::OpenGift => flows::open_gift(doc, gift_roll()),
            Command::ConfirmUpload => flows::confirm_upload(doc),
            Command::CancelUpload => flows::cancel_upload(doc),
            Command::UserName(name) => flows::store_name(doc, &name),
            Command::OtherName | Command::EditInfo => flows::ask_other_name(doc),
            Command::RedeemCard(carrier) => flows::redeem_card(doc, carrier),
            Command::AskPhone => flows::ask_phone(doc),
            Command::AskEmail => flows::ask_email(doc),
            // The main menu lives in the NLU's training data.
            Command::BackToMenu => return Routed::Forward("BACK_TO_MENU".to_string()),
        };
        Routed::Flow(turn)
    }

    fn route_text(&self, text: &str, doc: UserDocument) -> Routed {
        if text == crate::command::VOTE_TRIGGER {
            return Routed::Flow(flows::prompt_vote_code(doc));
        }
        match doc.last_prompt {
            Prompt::GetVoteId => {
                if flows::is_vote_code(text) {
                    let (score, rank) = vote_draw();
                    Routed::Flow(flows::register_vote(doc, text, score, rank))
                } else {
                    Routed::Flow(flows::invalid_vote_code(doc, text))
                }
            }
            Prompt::GetUserName => Routed::Flow(flows::store_name(doc, text)),
            Prompt::GetPhoneNumber => Routed::Flow(flows::store_phone(doc, text)),
            Prompt::GetEmail => {
                let (score, rank) = vote_draw();
                Routed::Flow(flows::store_email(doc, text, score, rank))
            }
            Prompt::None => Routed::Forward(text.to_string()),
        }
    }

    /// Relay an NLU fulfillment. Precedence: platform-native data first,
    /// then rich messages, then plain speech.
    async fn relay(&self, recipient: &str, fulfillment: Fulfillment) -> Result<(), EngineError> {
        if let Some(data) = fulfillment.data {
            return self.relay_data(recipient, data).await;
        }
        let descriptors = if !fulfillment.messages.is_empty() {
            fulfillment.messages
        } else if let Some(text) = fulfillment.text {
            vec![MessageDescriptor::text(text)]
        } else {
            return Ok(());
        };
        let compiled = compile(&descriptors);
        self.dispatcher.deliver(recipient, &compiled).await?;
        Ok(())
    }

    /// Platform-native payloads go out verbatim. An array is a paced
    /// sequence; anything carrying `sender_action` is sent as an action.
    async fn relay_data(&self, recipient: &str, data: Value) -> Result<(), EngineError> {
        match data {
            Value::Array(items) => {
                let compiled: Vec<CompiledMessage> = items
                    .into_iter()
                    .map(|item| match item.get("sender_action").and_then(Value::as_str) {
                        Some(action) => CompiledMessage::Action(action.to_string()),
                        None => CompiledMessage::Content(item),
                    })
                    .collect();
                self.dispatcher.deliver(recipient, &compiled).await?;
            }
            single => {
                self.dispatcher
                    .deliver_one(recipient, &CompiledMessage::Content(single))
                    .await?;
            }
        }
        Ok(())
    }
}

fn vote_draw() -> (u32, u32) {
    let mut rng = rand::thread_rng();
    (rng.gen_range(1..=100), rng.gen_range(1..=10))
}

fn gift_roll() -> u8 {
    rand::thread_rng().gen_range(1..=10)
}
