//! Key builders for every durable session entry.
//!
//! Keys are relative; the provider applies the configured prefix.

/// Prefix shared by every session record key.
pub const SESSION_PREFIX: &str = "session:";

const PRINCIPAL_PREFIX: &str = "principal:";

/// Session record by session id.
pub fn session(session_id: impl std::fmt::Display) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

/// Session record by access credential digest.
pub fn access(digest: &str) -> String {
    format!("access:{digest}")
}

/// Session id by refresh credential digest.
pub fn refresh(digest: &str) -> String {
    format!("refresh:{digest}")
}

/// Index entry tying a session to its principal.
///
/// `principal` is a digest of the principal id, so it never carries glob
/// characters into a key pattern.
pub fn principal_session(principal: &str, session_id: impl std::fmt::Display) -> String {
    format!("{PRINCIPAL_PREFIX}{principal}:{session_id}")
}

/// Pattern matching every index entry of one principal.
pub fn principal_sessions(principal: &str) -> String {
    format!("{PRINCIPAL_PREFIX}{principal}:*")
}

/// Pattern matching every session record.
pub fn all_sessions() -> String {
    format!("{SESSION_PREFIX}*")
}

/// Extract the session id portion of a session record key.
pub fn session_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(SESSION_PREFIX)
}

/// Extract the session id portion of a principal index key.
pub fn session_id_from_principal_key(key: &str) -> Option<&str> {
    key.strip_prefix(PRINCIPAL_PREFIX)?
        .split_once(':')
        .map(|(_, session_id)| session_id)
}
