//! Prompt templates for the three generation endpoints.
//!
//! Each endpoint wraps the caller's text in fixed wording. The rendered
//! string is what gets fingerprinted, so identical inputs always render
//! identically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder rendered when the caller sends no `user_id`.
const ANONYMOUS_USER: &str = "anonymous";

/// Inbound body shared by every prompt endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptInput {
    pub text: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Per-request persona name; falls back to the configured default.
    #[serde(default)]
    pub ai_name: Option<String>,
}

impl PromptInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// The prompt endpoints and their templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// Thought-expansion persona (`POST /ai`).
    Ai,
    /// Age-range and gender estimation, JSON-only answer (`POST /profile`).
    Profile,
    /// Near-future outlook persona (`POST /future`).
    Future,
}

impl PromptKind {
    pub const ALL: [PromptKind; 3] = [PromptKind::Ai, PromptKind::Profile, PromptKind::Future];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Profile => "profile",
            Self::Future => "future",
        }
    }

    /// Route path for this endpoint.
    pub fn path(self) -> &'static str {
        match self {
            Self::Ai => "/ai",
            Self::Profile => "/profile",
            Self::Future => "/future",
        }
    }

    /// Render the template. `default_ai_name` is used when the input has no
    /// non-blank `ai_name`.
    pub fn render(self, input: &PromptInput, default_ai_name: &str) -> String {
        let ai_name = input
            .ai_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(default_ai_name);
        let user_id = input
            .user_id
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(ANONYMOUS_USER);
        let text = input.text.as_str();

        match self {
            Self::Ai => format!(
                "あなたは「{ai_name}」。\n\
                 ユーザーの思考を拡張し、未来を示すAI。\n\
                 \n\
                 ユーザーID: {user_id}\n\
                 \n\
                 ユーザー入力:\n\
                 {text}\n"
            ),
            Self::Profile => format!(
                "次の文章から年齢層と性別を推定し、JSONだけで返せ。\n\
                 例:\n\
                 {{\"age\":\"20s\",\"gender\":\"male\"}}\n\
                 \n\
                 文章:\n\
                 {text}\n"
            ),
            Self::Future => format!(
                "あなたは「{ai_name}」。\n\
                 ユーザーの入力から、起こりうる近い未来を三つ簡潔に示すAI。\n\
                 \n\
                 ユーザーID: {user_id}\n\
                 \n\
                 ユーザー入力:\n\
                 {text}\n"
            ),
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(Self::Ai),
            "profile" => Ok(Self::Profile),
            "future" => Ok(Self::Future),
            other => Err(format!(
                "unknown endpoint '{}' (expected ai, profile or future)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_template_embeds_fields() {
        let input = PromptInput {
            text: "明日の予定".into(),
            user_id: Some("u-1".into()),
            ai_name: Some("KAME".into()),
        };
        let p = PromptKind::Ai.render(&input, "DEFAULT");
        assert!(p.starts_with("あなたは「KAME」。"));
        assert!(p.contains("ユーザーID: u-1"));
        assert!(p.contains("ユーザー入力:\n明日の予定\n"));
    }

    #[test]
    fn test_default_ai_name_used_when_missing_or_blank() {
        let mut input = PromptInput::new("hi");
        assert!(PromptKind::Ai.render(&input, "TSURU").contains("「TSURU」"));
        input.ai_name = Some("  ".into());
        assert!(PromptKind::Future.render(&input, "TSURU").contains("「TSURU」"));
    }

    #[test]
    fn test_missing_user_id_renders_anonymous() {
        let p = PromptKind::Ai.render(&PromptInput::new("hi"), "X");
        assert!(p.contains("ユーザーID: anonymous"));
    }

    #[test]
    fn test_profile_template_has_json_example_and_no_persona() {
        let input = PromptInput {
            text: "学校が楽しい".into(),
            user_id: Some("u".into()),
            ai_name: Some("KAME".into()),
        };
        let p = PromptKind::Profile.render(&input, "X");
        assert!(p.contains(r#"{"age":"20s","gender":"male"}"#));
        assert!(p.ends_with("学校が楽しい\n"));
        assert!(!p.contains("KAME"));
    }

    #[test]
    fn test_templates_differ_per_endpoint() {
        let input = PromptInput::new("same text");
        let rendered: Vec<String> = PromptKind::ALL
            .iter()
            .map(|k| k.render(&input, "X"))
            .collect();
        assert_ne!(rendered[0], rendered[1]);
        assert_ne!(rendered[0], rendered[2]);
        assert_ne!(rendered[1], rendered[2]);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let input = PromptInput::new("repeat");
        assert_eq!(
            PromptKind::Ai.render(&input, "X"),
            PromptKind::Ai.render(&input, "X")
        );
    }

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!("AI".parse::<PromptKind>().unwrap(), PromptKind::Ai);
        assert_eq!("profile".parse::<PromptKind>().unwrap(), PromptKind::Profile);
        assert!("other".parse::<PromptKind>().is_err());
        assert_eq!(PromptKind::Future.to_string(), "future");
        assert_eq!(PromptKind::Future.path(), "/future");
    }

    #[test]
    fn test_input_deserialize_optional_fields() {
        let input: PromptInput = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(input.text, "hello");
        assert!(input.user_id.is_none());
        assert!(input.ai_name.is_none());
    }
}
