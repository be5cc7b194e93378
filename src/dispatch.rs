use crate::message::CompiledMessage;
use crate::transport::{Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;

/// A send failed partway through a sequence. Messages delivered before the
/// failure stay delivered; there is no rollback.
#[derive(Debug, thiserror::Error)]
#[error("delivery aborted after {sent} message(s): {source}")]
pub struct DeliveryError {
    pub sent: usize,
    #[source]
    pub source: TransportError,
}

/// Sequences outbound messages to one recipient with a human-like cadence:
/// typing indicator, fixed pacing delay, send. Strictly in order, never
/// concurrent per call.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    pacing: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, pacing: Duration) -> Self {
        Self { transport, pacing }
    }

    /// Deliver a compiled sequence. Each content message gets a typing
    /// pre-roll and the pacing delay; sender actions go out directly.
    /// Aborts on the first failure. An empty list is a no-op success.
    pub async fn deliver(
        &self,
        recipient: &str,
        messages: &[CompiledMessage],
    ) -> Result<(), DeliveryError> {
        let mut sent = 0usize;
        for message in messages {
            let result = match message {
                CompiledMessage::Action(kind) => self.transport.send_action(recipient, kind).await,
                CompiledMessage::Content(payload) => {
                    match self.transport.send_action(recipient, "typing_on").await {
                        Ok(()) => {
                            tokio::time::sleep(self.pacing).await;
                            self.transport.send_message(recipient, payload).await
                        }
                        Err(e) => Err(e),
                    }
                }
            };
            if let Err(source) = result {
                return Err(DeliveryError { sent, source });
            }
            sent += 1;
        }
        Ok(())
    }

    /// Deliver a single message with no typing pre-roll or delay.
    pub async fn deliver_one(
        &self,
        recipient: &str,
        message: &CompiledMessage,
    ) -> Result<(), DeliveryError> {
        let result = match message {
            CompiledMessage::Action(kind) => self.transport.send_action(recipient, kind).await,
            CompiledMessage::Content(payload) => {
                self.transport.send_message(recipient, payload).await
            }
        };
        result.map_err(|source| DeliveryError { sent: 0, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Profile;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Records every transport call; fails send_message on chosen indices.
    pub struct MockTransport {
        pub messages: Mutex<Vec<(String, Value)>>,
        pub actions: Mutex<Vec<(String, String)>>,
        pub fail_on_send: Option<usize>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
                actions: Mutex::new(Vec::new()),
                fail_on_send: None,
            }
        }

        pub fn failing_on(index: usize) -> Self {
            Self {
                fail_on_send: Some(index),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send_message(
            &self,
            recipient: &str,
            payload: &Value,
        ) -> Result<(), TransportError> {
            let mut messages = self.messages.lock().unwrap();
            let attempt = messages.len();
            messages.push((recipient.to_string(), payload.clone()));
            if self.fail_on_send == Some(attempt) {
                return Err(TransportError::Platform("boom".into()));
            }
            Ok(())
        }

        async fn send_action(&self, recipient: &str, action: &str) -> Result<(), TransportError> {
            self.actions
                .lock()
                .unwrap()
                .push((recipient.to_string(), action.to_string()));
            Ok(())
        }

        async fn fetch_profile(&self, _sender: &str) -> Result<Profile, TransportError> {
            Ok(Profile {
                first_name: "Jane".into(),
                last_name: "Doe".into(),
            })
        }
    }

    fn content(text: &str) -> CompiledMessage {
        CompiledMessage::Content(json!({ "text": text }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_in_order_with_typing() {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = Dispatcher::new(transport.clone(), Duration::from_millis(200));

        dispatcher
            .deliver("u1", &[content("a"), content("b")])
            .await
            .unwrap();

        let messages = transport.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].1["text"], "a");
        assert_eq!(messages[1].1["text"], "b");

        // One typing_on per content message
        let actions = transport.actions.lock().unwrap();
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|(_, a)| a == "typing_on"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborts_on_first_failure() {
        let transport = Arc::new(MockTransport::failing_on(1));
        let dispatcher = Dispatcher::new(transport.clone(), Duration::from_millis(200));

        let err = dispatcher
            .deliver("u1", &[content("a"), content("b"), content("c"), content("d")])
            .await
            .unwrap_err();

        // Exactly 2 send attempts: one success, one failure; the rest never tried.
        assert_eq!(transport.messages.lock().unwrap().len(), 2);
        assert_eq!(err.sent, 1);
    }

    #[tokio::test]
    async fn test_empty_list_is_noop() {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = Dispatcher::new(transport.clone(), Duration::from_millis(200));
        dispatcher.deliver("u1", &[]).await.unwrap();
        assert!(transport.messages.lock().unwrap().is_empty());
        assert!(transport.actions.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sender_actions_skip_typing_preroll() {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = Dispatcher::new(transport.clone(), Duration::from_millis(200));

        dispatcher
            .deliver(
                "u1",
                &[CompiledMessage::Action("mark_seen".into()), content("a")],
            )
            .await
            .unwrap();

        let actions = transport.actions.lock().unwrap();
        // mark_seen dispatched directly, then one typing_on for the content.
        assert_eq!(
            actions
                .iter()
                .map(|(_, a)| a.as_str())
                .collect::<Vec<_>>(),
            vec!["mark_seen", "typing_on"]
        );
    }

    #[tokio::test]
    async fn test_deliver_one_skips_typing() {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = Dispatcher::new(transport.clone(), Duration::from_millis(200));
        dispatcher.deliver_one("u1", &content("solo")).await.unwrap();
        assert_eq!(transport.messages.lock().unwrap().len(), 1);
        assert!(transport.actions.lock().unwrap().is_empty());
    }
}
