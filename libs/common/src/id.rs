use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = lagoon_common::id::prefixed_ulid("ses");
/// assert!(id.starts_with("ses_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    /// Live gateway sessions.
    pub const SESSION: &str = "ses";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_ulid_has_prefix_and_length() {
        let id = prefixed_ulid(prefix::SESSION);
        assert!(id.starts_with("ses_"));
        // prefix + underscore + 26-char ULID
        assert_eq!(id.len(), 4 + 26);
    }

    #[test]
    fn consecutive_ids_differ() {
        assert_ne!(prefixed_ulid("ses"), prefixed_ulid("ses"));
    }
}
