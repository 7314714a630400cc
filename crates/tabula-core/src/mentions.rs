use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tabula_types::models::Mention;

use crate::providers::IdentityProvider;

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([a-zA-Z0-9_-]+)").expect("mention pattern is valid"));

/// Handles mentioned in `message`, each once, in order of first appearance.
pub fn parse_handles(message: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    MENTION
        .captures_iter(message)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|handle| seen.insert(*handle))
        .collect()
}

/// Resolves mentioned handles to users. Unknown handles are dropped.
pub fn resolve(message: &str, identity: &dyn IdentityProvider) -> Vec<Mention> {
    parse_handles(message)
        .into_iter()
        .filter_map(|handle| {
            identity.display_name(handle).map(|display_name| Mention {
                user_id: handle.to_string(),
                display_name,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_db::Database;

    #[test]
    fn handles_are_deduplicated_in_first_seen_order() {
        assert_eq!(
            parse_handles("@bob ping @alice, @bob again and @carol-2@alice"),
            vec!["bob", "alice", "carol-2"]
        );
    }

    #[test]
    fn no_handles() {
        assert!(parse_handles("plain text, email@ nothing").is_empty());
        assert!(parse_handles("").is_empty());
    }

    #[test]
    fn unknown_users_are_dropped() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user("alice", "Alice").unwrap();

        let mentions = resolve("@ghost hi @alice", &db);
        assert_eq!(
            mentions,
            vec![Mention {
                user_id: "alice".into(),
                display_name: "Alice".into(),
            }]
        );
    }

    #[test]
    fn resolvable_handles_only() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user("alice", "Alice").unwrap();
        db.upsert_user("bob", "Bob").unwrap();

        let ids: Vec<_> = resolve("hello @alice and @bob, cc @unknown_user @alice", &db)
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        assert_eq!(ids, vec!["alice", "bob"]);
    }
}
