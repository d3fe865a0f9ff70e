use serde::Serialize;

use routey_core::audit::DeliveryMode;
use routey_core::domain::Record;
use routey_core::routing::RouteMethod;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Mrkdwn { text: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
}

/// The notification delivered to a fulfillment branch POC when a record is
/// dispatched: identifying fields, the resolved branch and how it was chosen,
/// and a link to the rendered document when one exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchNotice {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
    pub attachment_url: Option<String>,
}

impl DispatchNotice {
    pub fn compose(
        record: &Record,
        branch: &str,
        method: RouteMethod,
        mode: DeliveryMode,
        intended_contact: &str,
    ) -> Self {
        let fallback_text = format!(
            "New employee record for {} routed to {} ({})",
            record.employee_name,
            branch,
            method_label(method),
        );

        let mut blocks = vec![
            Block::Section {
                block_id: "dispatch_summary".to_owned(),
                text: TextObject::Mrkdwn {
                    text: format!(
                        "*{}* ({})\nBranch: *{}*\nRouting: {}\nStated location: {}",
                        record.employee_name,
                        record.id,
                        branch,
                        method_label(method),
                        record.location_branch,
                    ),
                },
            },
        ];

        if let Some(url) = record.document_url.as_deref() {
            blocks.push(Block::Section {
                block_id: "dispatch_document".to_owned(),
                text: TextObject::Mrkdwn { text: format!("<{url}|Employee record document>") },
            });
        }

        if mode == DeliveryMode::Test {
            blocks.push(Block::Context {
                block_id: "dispatch_test_banner".to_owned(),
                elements: vec![TextObject::Plain {
                    text: format!(
                        "TEST DELIVERY - production recipient would have been {intended_contact}"
                    ),
                }],
            });
        }

        Self { fallback_text, blocks, attachment_url: record.document_url.clone() }
    }

    /// Flat text rendering for channels that do not take structured blocks.
    pub fn render_text(&self) -> String {
        let mut lines = vec![self.fallback_text.clone()];
        for block in &self.blocks {
            match block {
                Block::Section { text, .. } => lines.push(text_value(text).to_owned()),
                Block::Context { elements, .. } => {
                    lines.extend(elements.iter().map(|element| text_value(element).to_owned()));
                }
            }
        }
        lines.join("\n")
    }
}

fn method_label(method: RouteMethod) -> &'static str {
    match method {
        RouteMethod::Direct => "direct branch match",
        RouteMethod::Alias => "alias match",
        RouteMethod::Nearest => "nearest fulfillment point",
        RouteMethod::Default => "default branch fallback",
    }
}

fn text_value(text: &TextObject) -> &str {
    match text {
        TextObject::Plain { text } | TextObject::Mrkdwn { text } => text,
    }
}
