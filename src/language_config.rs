//! On-enter rules for comment continuation in C and C++ documents.
//!
//! The rules are handed to the host verbatim; their regular expressions are
//! evaluated by the host's own engine (which supports look-ahead), so they are
//! kept as source strings here.

use crate::settings::Settings;
use std::path::Path;

/// Setting holding comma-separated comment prefixes that continue on Enter.
pub const COMMENT_CONTINUATION_PATTERNS_KEY: &str = "commentContinuationPatterns";

/// Used when the setting is absent.
pub const DEFAULT_COMMENT_PATTERNS: &[&str] = &["/**"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentAction {
    None,
    Indent,
    IndentOutdent,
    Outdent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterAction {
    pub indent_action: IndentAction,
    pub append_text: Option<String>,
    pub remove_text: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnEnterRule {
    pub before_text: String,
    pub after_text: Option<String>,
    pub action: EnterAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LanguageConfiguration {
    pub on_enter_rules: Vec<OnEnterRule>,
}

impl LanguageConfiguration {
    /// Build the configuration for `resource` from the user's patterns.
    pub fn for_resource(settings: &dyn Settings, resource: Option<&Path>) -> Self {
        let patterns: Vec<String> = settings
            .get(resource, COMMENT_CONTINUATION_PATTERNS_KEY)
            .map(|raw| {
                raw.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .filter(|p: &Vec<String>| !p.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_COMMENT_PATTERNS
                    .iter()
                    .map(|p| p.to_string())
                    .collect()
            });
        Self::from_patterns(&patterns)
    }

    pub fn from_patterns(patterns: &[String]) -> Self {
        let mut on_enter_rules = Vec::new();
        let mut have_block_continuation = false;

        for pattern in patterns {
            if pattern.starts_with("/*") {
                on_enter_rules.extend(block_comment_begin_rules(pattern));
                have_block_continuation = true;
            } else if pattern.starts_with("//") {
                on_enter_rules.push(line_comment_rule(pattern));
            } else {
                tracing::warn!("Ignoring comment continuation pattern {:?}", pattern);
            }
        }

        // Continuation and end rules are shared by every block pattern.
        if have_block_continuation {
            on_enter_rules.extend(block_comment_body_rules());
        }

        Self { on_enter_rules }
    }
}

fn block_comment_begin_rules(pattern: &str) -> Vec<OnEnterRule> {
    let begin = format!(r"^\s*{}(?!\/)([^\*]|\*(?!\/))*$", regex::escape(pattern));
    vec![
        OnEnterRule {
            before_text: begin.clone(),
            after_text: Some(r"^\s*\*\/$".to_string()),
            action: EnterAction {
                indent_action: IndentAction::IndentOutdent,
                append_text: Some(" * ".to_string()),
                remove_text: None,
            },
        },
        OnEnterRule {
            before_text: begin,
            after_text: None,
            action: EnterAction {
                indent_action: IndentAction::None,
                append_text: Some(" * ".to_string()),
                remove_text: None,
            },
        },
    ]
}

fn block_comment_body_rules() -> Vec<OnEnterRule> {
    vec![
        OnEnterRule {
            before_text: r"^(\t|[ ])*[ ]\*([ ]([^\*]|\*(?!\/))*)?$".to_string(),
            after_text: None,
            action: EnterAction {
                indent_action: IndentAction::None,
                append_text: Some("* ".to_string()),
                remove_text: None,
            },
        },
        OnEnterRule {
            before_text: r"^(\t|[ ])*[ ]\*\/\s*$".to_string(),
            after_text: None,
            action: EnterAction {
                indent_action: IndentAction::None,
                append_text: None,
                remove_text: Some(1),
            },
        },
        OnEnterRule {
            before_text: r"^(\t|[ ])*[ ]\*[^/]*\*\/\s*$".to_string(),
            after_text: None,
            action: EnterAction {
                indent_action: IndentAction::None,
                append_text: None,
                remove_text: Some(1),
            },
        },
    ]
}

fn line_comment_rule(pattern: &str) -> OnEnterRule {
    OnEnterRule {
        before_text: format!(r"^\s*{}.*$", regex::escape(pattern)),
        after_text: None,
        action: EnterAction {
            indent_action: IndentAction::None,
            append_text: Some(format!("{} ", pattern)),
            remove_text: None,
        },
    }
}
