//! The `/publish` command: argument parsing and per-user pending state.

use dashmap::DashMap;

use crate::deep_link::{parse_chat_target, ChatTarget};
use crate::error::BotError;

/// Parsed `/publish <slug> <chat> [caption]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub slug: String,
    pub target: ChatTarget,
    pub caption: Option<String>,
}

/// Parse the text after `/publish`.
pub fn parse_publish_args(args: &str) -> Result<PublishRequest, BotError> {
    let mut parts = args.trim().splitn(3, char::is_whitespace);
    let slug = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| usage("missing slug"))?;
    let target_raw = parts.next().ok_or_else(|| usage("missing chat"))?;
    let target = parse_chat_target(target_raw)
        .ok_or_else(|| usage("chat must be @handle, t.me link, or numeric id"))?;
    let caption = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok(PublishRequest {
        slug: slug.to_string(),
        target,
        caption,
    })
}

fn usage(detail: &str) -> BotError {
    BotError::BadCommand(format!(
        "{detail}; usage: /publish <slug> <chat> [caption]"
    ))
}

/// Pending publish confirmations, keyed by the admin's user id. Issuing a
/// new `/publish` replaces the previous pending one.
#[derive(Default)]
pub struct PublishStore {
    pending: DashMap<i64, PublishRequest>,
}

impl PublishStore {
    pub fn stage(&self, user_id: i64, request: PublishRequest) {
        self.pending.insert(user_id, request);
    }

    pub fn take(&self, user_id: i64) -> Option<PublishRequest> {
        self.pending.remove(&user_id).map(|(_, request)| request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_command_parses() {
        let request = parse_publish_args("hero-quiz @my_channel Try this one!").unwrap();
        assert_eq!(request.slug, "hero-quiz");
        assert_eq!(request.target, ChatTarget::Username("my_channel".into()));
        assert_eq!(request.caption.as_deref(), Some("Try this one!"));
    }

    #[test]
    fn caption_is_optional() {
        let request = parse_publish_args("hero-quiz -100555").unwrap();
        assert_eq!(request.target, ChatTarget::Id(-100555));
        assert_eq!(request.caption, None);
    }

    #[test]
    fn malformed_commands_explain_usage() {
        for args in ["", "slug-only", "slug not@valid"] {
            let err = parse_publish_args(args).unwrap_err();
            assert!(err.to_string().contains("usage: /publish"), "{args}");
        }
    }

    #[test]
    fn staging_twice_keeps_the_latest() {
        let store = PublishStore::default();
        store.stage(1, parse_publish_args("a @ch").unwrap());
        store.stage(1, parse_publish_args("b @ch").unwrap());
        assert_eq!(store.take(1).unwrap().slug, "b");
        assert!(store.take(1).is_none());
    }
}
