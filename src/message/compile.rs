use super::split::split_text;
use super::{Button, CompiledMessage, MessageDescriptor, TEXT_LIMIT};
use serde_json::json;

/// Fallback prompt when a quick-reply descriptor carries no title.
const DEFAULT_QUICK_REPLY_TITLE: &str = "Choose an item";

/// Compile an ordered descriptor sequence into platform message objects.
///
/// Consecutive cards are coalesced into one carousel; text over the
/// platform limit is split into several messages. Descriptors with nothing
/// to show (empty text, empty quick-reply options, missing image URL) are
/// dropped without error. Output order otherwise matches input order.
pub fn compile(descriptors: &[MessageDescriptor]) -> Vec<CompiledMessage> {
    let mut compiled = Vec::new();
    let mut index = 0;

    while index < descriptors.len() {
        match &descriptors[index] {
            MessageDescriptor::Text { text } => {
                if !text.is_empty() {
                    for chunk in split_text(text, TEXT_LIMIT) {
                        compiled.push(CompiledMessage::Content(json!({ "text": chunk })));
                    }
                }
            }
            MessageDescriptor::Card { .. } => {
                // Collect every immediately-adjacent card into one carousel.
                let start = index;
                while index + 1 < descriptors.len()
                    && matches!(descriptors[index + 1], MessageDescriptor::Card { .. })
                {
                    index += 1;
                }
                compiled.push(compile_carousel(&descriptors[start..=index]));
            }
            MessageDescriptor::QuickReplies { title, options } => {
                if !options.is_empty() {
                    let replies: Vec<_> = options
                        .iter()
                        .map(|r| {
                            json!({
                                "content_type": "text",
                                "title": r.label,
                                "payload": r.payload,
                            })
                        })
                        .collect();
                    compiled.push(CompiledMessage::Content(json!({
                        "text": title.as_deref().unwrap_or(DEFAULT_QUICK_REPLY_TITLE),
                        "quick_replies": replies,
                    })));
                }
            }
            MessageDescriptor::Image { url } => {
                if let Some(url) = url {
                    compiled.push(CompiledMessage::Content(json!({
                        "attachment": { "type": "image", "payload": { "url": url } }
                    })));
                }
            }
            MessageDescriptor::Custom { raw } => {
                compiled.push(CompiledMessage::Content(raw.clone()));
            }
            MessageDescriptor::SenderAction { kind } => {
                compiled.push(CompiledMessage::Action(kind.clone()));
            }
        }
        index += 1;
    }

    compiled
}

fn compile_carousel(cards: &[MessageDescriptor]) -> CompiledMessage {
    let elements: Vec<_> = cards
        .iter()
        .filter_map(|card| match card {
            MessageDescriptor::Card {
                title,
                image_url,
                subtitle,
                buttons,
            } => {
                let mut element = json!({ "title": title, "image_url": image_url });
                if let Some(subtitle) = subtitle {
                    element["subtitle"] = json!(subtitle);
                }
                let compiled_buttons: Vec<_> =
                    buttons.iter().filter_map(compile_button).collect();
                if !compiled_buttons.is_empty() {
                    element["buttons"] = json!(compiled_buttons);
                }
                Some(element)
            }
            _ => None,
        })
        .collect();

    CompiledMessage::Content(json!({
        "attachment": {
            "type": "template",
            "payload": { "template_type": "generic", "elements": elements }
        }
    }))
}

fn compile_button(button: &Button) -> Option<serde_json::Value> {
    if button.label.is_empty() {
        return None;
    }
    // No explicit target: the label doubles as the postback token.
    let target = button.target.as_deref().unwrap_or(&button.label);
    Some(if target.starts_with("http") {
        json!({ "type": "web_url", "url": target, "title": button.label })
    } else {
        json!({ "type": "postback", "payload": target, "title": button.label })
    })
}
