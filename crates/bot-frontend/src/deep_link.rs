//! Deep-link start parameters and publish-target parsing.
//!
//! Two start-param forms are accepted:
//!
//! - `run_<slug>`: plain run.
//! - `run_test-<slug>__src_<chatId>`: run attributed to the chat it was
//!   published into.

const RUN_PREFIX: &str = "run_";
const ATTRIBUTED_PREFIX: &str = "run_test-";
const SOURCE_MARKER: &str = "__src_";

/// A parsed deep link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLink {
    pub slug: String,
    pub source_chat_id: Option<i64>,
}

/// Parse a `/start` payload. `None` for anything that is not a run link.
pub fn parse_start_param(param: &str) -> Option<RunLink> {
    if let Some(rest) = param.strip_prefix(ATTRIBUTED_PREFIX) {
        if let Some((slug, src)) = rest.split_once(SOURCE_MARKER) {
            if slug.is_empty() {
                return None;
            }
            let source_chat_id = src.parse().ok()?;
            return Some(RunLink {
                slug: slug.to_string(),
                source_chat_id: Some(source_chat_id),
            });
        }
    }
    let slug = param.strip_prefix(RUN_PREFIX)?;
    if slug.is_empty() {
        return None;
    }
    Some(RunLink {
        slug: slug.to_string(),
        source_chat_id: None,
    })
}

/// Build a `/start` payload, attributing the source chat when known.
pub fn format_start_param(slug: &str, source_chat_id: Option<i64>) -> String {
    match source_chat_id {
        Some(chat_id) => format!("{ATTRIBUTED_PREFIX}{slug}{SOURCE_MARKER}{chat_id}"),
        None => format!("{RUN_PREFIX}{slug}"),
    }
}

/// Publish target: a channel/group by handle or by numeric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    Username(String),
    Id(i64),
}

impl ChatTarget {
    /// Form the chat platform accepts as `chat_id`.
    pub fn as_api_target(&self) -> String {
        match self {
            Self::Username(name) => format!("@{name}"),
            Self::Id(id) => id.to_string(),
        }
    }
}

/// Accepts `@handle`, `t.me/handle` links, and numeric ids.
pub fn parse_chat_target(raw: &str) -> Option<ChatTarget> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(handle) = raw.strip_prefix('@') {
        return valid_handle(handle).then(|| ChatTarget::Username(handle.to_string()));
    }
    for prefix in ["https://t.me/", "http://t.me/", "t.me/"] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            let handle = rest.split(['/', '?']).next().unwrap_or_default();
            return valid_handle(handle).then(|| ChatTarget::Username(handle.to_string()));
        }
    }
    raw.parse().ok().map(ChatTarget::Id)
}

fn valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_run_link_round_trips() {
        let param = format_start_param("hero-quiz", None);
        assert_eq!(param, "run_hero-quiz");
        assert_eq!(
            parse_start_param(&param),
            Some(RunLink {
                slug: "hero-quiz".into(),
                source_chat_id: None
            })
        );
    }

    #[test]
    fn attributed_link_round_trips() {
        let param = format_start_param("hero-quiz", Some(-1001234));
        assert_eq!(param, "run_test-hero-quiz__src_-1001234");
        assert_eq!(
            parse_start_param(&param),
            Some(RunLink {
                slug: "hero-quiz".into(),
                source_chat_id: Some(-1001234)
            })
        );
    }

    #[test]
    fn slug_starting_with_test_dash_still_parses_plain() {
        // Without the source marker the long prefix does not apply.
        assert_eq!(
            parse_start_param("run_test-drive"),
            Some(RunLink {
                slug: "test-drive".into(),
                source_chat_id: None
            })
        );
    }

    #[test]
    fn junk_params_are_rejected() {
        assert_eq!(parse_start_param("run_"), None);
        assert_eq!(parse_start_param("start"), None);
        assert_eq!(parse_start_param("run_test-__src_5"), None);
        assert_eq!(parse_start_param("run_test-x__src_abc"), None);
    }

    #[test]
    fn chat_targets_parse_all_forms() {
        assert_eq!(
            parse_chat_target("@my_channel"),
            Some(ChatTarget::Username("my_channel".into()))
        );
        assert_eq!(
            parse_chat_target("https://t.me/my_channel"),
            Some(ChatTarget::Username("my_channel".into()))
        );
        assert_eq!(
            parse_chat_target("t.me/my_channel?start=x"),
            Some(ChatTarget::Username("my_channel".into()))
        );
        assert_eq!(parse_chat_target("-100555"), Some(ChatTarget::Id(-100555)));
        assert_eq!(parse_chat_target("@"), None);
        assert_eq!(parse_chat_target("not a chat"), None);
    }

    #[test]
    fn api_target_forms() {
        assert_eq!(
            ChatTarget::Username("ch".into()).as_api_target(),
            "@ch"
        );
        assert_eq!(ChatTarget::Id(-5).as_api_target(), "-5");
    }
}
