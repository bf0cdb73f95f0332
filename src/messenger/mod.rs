//! Typed message channel from the preview context to the controller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{StudioError, StudioResult};

/// Element picked in the preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedElementEvent {
    pub selector: String,
    pub text: String,
    #[serde(rename = "tagName")]
    pub tag_name: String,
    pub attributes: BTreeMap<String, String>,
    /// Container selector that `selector` is relative to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Messages the preview context may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PreviewMessage {
    ElementSelected(SelectedElementEvent),
}

/// A message as it crosses the boundary: sender origin plus JSON text
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub origin: String,
    pub data: String,
}

/// Sending half, held by the preview context
#[derive(Debug, Clone)]
pub struct PreviewPort {
    origin: String,
    sender: mpsc::UnboundedSender<RawMessage>,
}

impl PreviewPort {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Post a message to the controller
    pub fn post(&self, message: &PreviewMessage) -> StudioResult<()> {
        let data = serde_json::to_string(message)?;
        self.sender
            .send(RawMessage {
                origin: self.origin.clone(),
                data,
            })
            .map_err(|_| StudioError::message_rejected("controller is no longer listening"))
    }
}

/// Receiving half, held by the controller
#[derive(Debug)]
pub struct ControllerInbox {
    expected_origin: String,
    sender: mpsc::UnboundedSender<RawMessage>,
    receiver: mpsc::UnboundedReceiver<RawMessage>,
}

/// Create a channel accepting messages only from `preview_origin`
pub fn channel(preview_origin: impl Into<String>) -> (PreviewPort, ControllerInbox) {
    let origin = preview_origin.into();
    let (sender, receiver) = mpsc::unbounded_channel();

    let port = PreviewPort {
        origin: origin.clone(),
        sender: sender.clone(),
    };
    let inbox = ControllerInbox {
        expected_origin: origin,
        sender,
        receiver,
    };

    (port, inbox)
}

impl ControllerInbox {
    pub fn expected_origin(&self) -> &str {
        &self.expected_origin
    }

    /// Raw sender for frames that are not the preview (any origin)
    pub fn raw_sender(&self) -> mpsc::UnboundedSender<RawMessage> {
        self.sender.clone()
    }

    /// Validate origin and decode the payload
    pub fn accept(&self, raw: &RawMessage) -> StudioResult<PreviewMessage> {
        if raw.origin != self.expected_origin {
            warn!("Dropping message from unexpected origin {}", raw.origin);
            return Err(StudioError::message_rejected(format!(
                "unexpected origin {}",
                raw.origin
            )));
        }

        serde_json::from_str(&raw.data).map_err(|e| {
            warn!("Dropping malformed preview message: {}", e);
            StudioError::message_rejected(format!("malformed message: {}", e))
        })
    }

    /// Next queued message without waiting; `None` when the queue is empty
    pub fn try_next(&mut self) -> Option<StudioResult<PreviewMessage>> {
        let raw = self.receiver.try_recv().ok()?;
        debug!("Received {} byte message from {}", raw.data.len(), raw.origin);
        Some(self.accept(&raw))
    }

    /// Wait for the next valid message, skipping rejected ones
    pub async fn next(&mut self) -> Option<PreviewMessage> {
        while let Some(raw) = self.receiver.recv().await {
            if let Ok(message) = self.accept(&raw) {
                return Some(message);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> SelectedElementEvent {
        SelectedElementEvent {
            selector: "div#price-123".to_string(),
            text: "$19.99".to_string(),
            tag_name: "div".to_string(),
            attributes: [("id".to_string(), "price-123".to_string())].into_iter().collect(),
            scope: None,
        }
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(PreviewMessage::ElementSelected(event())).unwrap();

        assert_eq!(json["type"], "elementSelected");
        assert_eq!(json["tagName"], "div");
        assert_eq!(json["attributes"]["id"], "price-123");
        assert!(json.get("scope").is_none());
    }

    #[test]
    fn test_port_to_inbox() {
        let (port, mut inbox) = channel("http://localhost:8000");
        port.post(&PreviewMessage::ElementSelected(event())).unwrap();

        let received = inbox.try_next().unwrap().unwrap();
        assert_eq!(received, PreviewMessage::ElementSelected(event()));
        assert!(inbox.try_next().is_none());
    }

    #[test]
    fn test_foreign_origin_rejected() {
        let (_port, mut inbox) = channel("http://localhost:8000");
        let data = serde_json::to_string(&PreviewMessage::ElementSelected(event())).unwrap();
        inbox
            .raw_sender()
            .send(RawMessage { origin: "https://evil.example".to_string(), data })
            .unwrap();

        let result = inbox.try_next().unwrap();
        assert!(matches!(result, Err(StudioError::MessageRejected { .. })));
    }

    #[test]
    fn test_malformed_and_unknown_types_rejected() {
        let (_port, inbox) = channel("http://localhost:8000");

        for data in [
            r#"{"type":"somethingElse","selector":"a"}"#,
            r#"{"type":"elementSelected","selector":"a"}"#,
            "not json",
        ] {
            let raw = RawMessage { origin: "http://localhost:8000".to_string(), data: data.to_string() };
            assert!(inbox.accept(&raw).is_err(), "accepted {}", data);
        }
    }

    #[tokio::test]
    async fn test_next_skips_rejected_messages() {
        let (port, mut inbox) = channel("http://localhost:8000");
        inbox
            .raw_sender()
            .send(RawMessage { origin: "null".to_string(), data: "{}".to_string() })
            .unwrap();
        port.post(&PreviewMessage::ElementSelected(event())).unwrap();

        let message = inbox.next().await.unwrap();
        assert_eq!(message, PreviewMessage::ElementSelected(event()));
    }
}
