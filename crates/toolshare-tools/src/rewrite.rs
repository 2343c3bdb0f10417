//! Rule-based text rewriting. Each style swaps a handful of words; results
//! are announced to other instances but never applied there.

use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use toolshare_core::{NotificationOptions, ToolId};

use crate::context::ToolContext;
use crate::error::{Result, ToolError};

const TOOL: ToolId = ToolId::Rewrite;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum RewriteStyle {
    Formal,
    Casual,
    Business,
    Academic,
}

impl RewriteStyle {
    fn replacements(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Formal => &[(r"\bI'm\b", "One is"), (r"\bI\b", "One")],
            Self::Casual => &[(r"\bdo not\b", "don't"), (r"\bare not\b", "aren't")],
            Self::Business => &[(r"\bhelp\b", "assist"), (r"\bget\b", "obtain")],
            Self::Academic => &[(r"\bthink\b", "consider"), (r"\bshow\b", "demonstrate")],
        }
    }
}

struct Rule {
    style: RewriteStyle,
    pattern: Regex,
    replacement: &'static str,
}

static WHITESPACE: Lazy<Option<Regex>> = Lazy::new(|| compile(r"\s+"));

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    RewriteStyle::iter()
        .flat_map(|style| {
            style
                .replacements()
                .iter()
                .filter_map(move |&(pattern, replacement)| {
                    compile(pattern).map(|pattern| Rule {
                        style,
                        pattern,
                        replacement,
                    })
                })
        })
        .collect()
});

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!(pattern, "Skipping rewrite rule that does not compile: {e}");
            None
        }
    }
}

/// Collapse whitespace, then apply the style's word swaps in order.
pub fn rewrite_text(text: &str, style: RewriteStyle) -> String {
    let mut result = match WHITESPACE.as_ref() {
        Some(whitespace) => whitespace.replace_all(text.trim(), " ").into_owned(),
        None => text.trim().to_string(),
    };
    for rule in RULES.iter().filter(|rule| rule.style == style) {
        result = rule
            .pattern
            .replace_all(&result, rule.replacement)
            .into_owned();
    }
    result
}

#[derive(Debug)]
pub struct RewriteTool {
    ctx: ToolContext,
    last: Arc<Mutex<Option<String>>>,
}

impl RewriteTool {
    pub fn new(ctx: ToolContext) -> Self {
        ctx.bus.subscribe(TOOL, |action: &str, _: &Value| {
            tracing::trace!(action, "Rewrite results stay with the instance that made them");
        });

        Self {
            ctx,
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// The most recent result produced by this instance.
    pub fn last_result(&self) -> Option<String> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn rewrite(&self, text: &str, style: RewriteStyle) -> Result<String> {
        if text.trim().is_empty() {
            return Err(ToolError::invalid_input(TOOL, "text to rewrite is empty"));
        }

        let result = rewrite_text(text, style);
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(result.clone());

        self.ctx.publish(TOOL, "done", json!({ "text": result }));
        self.ctx
            .announce(
                "Rewrite complete",
                NotificationOptions::body(format!("Rewritten in {style} style")),
            )
            .await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use toolshare_core::test_utils::recording_gateway;
    use toolshare_core::{Bus, Delivery, InMemoryStore, Origin};

    #[rstest]
    #[case(RewriteStyle::Formal, "I think I'm   ready", "One think One is ready")]
    #[case(RewriteStyle::Casual, "We do not know, they are not here", "We don't know, they aren't here")]
    #[case(RewriteStyle::Business, "Please help me get it", "Please assist me obtain it")]
    #[case(RewriteStyle::Academic, "I think charts show trends", "I consider charts demonstrate trends")]
    #[case(RewriteStyle::Business, "helpful together", "helpful together")]
    fn applies_style_rules(#[case] style: RewriteStyle, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(rewrite_text(input, style), expected);
    }

    #[test]
    fn styles_parse_from_lowercase_names() {
        assert_eq!("academic".parse::<RewriteStyle>().unwrap(), RewriteStyle::Academic);
        assert!("poetic".parse::<RewriteStyle>().is_err());
        assert_eq!(RewriteStyle::Casual.to_string(), "casual");
    }

    #[tokio::test]
    async fn rewrite_publishes_result_and_notifies() {
        let origin = Origin::default();
        let (bus, _listener) = Bus::connect(&origin);
        let (peer, mut peer_listener) = Bus::connect(&origin);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        peer.subscribe(ToolId::Rewrite, move |action: &str, payload: &Value| {
            sink.lock().unwrap().push((action.to_string(), payload.clone()));
        });
        let (gateway, transport) = recording_gateway();
        let tool = RewriteTool::new(ToolContext::new(bus, Arc::new(InMemoryStore::new()), gateway));

        let result = tool
            .rewrite("  please help  ", RewriteStyle::Business)
            .await
            .unwrap();

        assert_eq!(result, "please assist");
        assert_eq!(tool.last_result().as_deref(), Some("please assist"));
        assert_eq!(transport.titles(), vec!["Rewrite complete"]);
        assert_eq!(
            peer_listener.drain(),
            vec![Delivery::Delivered(ToolId::Rewrite)]
        );
        assert_eq!(
            *received.lock().unwrap(),
            vec![("done".to_string(), json!({ "text": "please assist" }))]
        );
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let origin = Origin::default();
        let (bus, _listener) = Bus::connect(&origin);
        let (gateway, transport) = recording_gateway();
        let tool = RewriteTool::new(ToolContext::new(bus, Arc::new(InMemoryStore::new()), gateway));

        assert!(matches!(
            tool.rewrite(" \n ", RewriteStyle::Formal).await,
            Err(ToolError::InvalidInput { .. })
        ));
        assert!(tool.last_result().is_none());
        assert!(transport.titles().is_empty());
    }
}
