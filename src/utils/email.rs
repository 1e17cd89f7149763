/// Canonical form of a verification subject.
pub fn normalize_subject(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Splits an email at its final `@`. `None` when either side is empty.
pub fn split_email(email: &str) -> Option<(&str, &str)> {
    let (local, domain) = email.trim().rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some((local, domain))
}

/// Rate-limit key for a client: remote address plus user agent.
pub fn client_key(remote_addr: Option<&str>, user_agent: Option<&str>) -> String {
    let addr = remote_addr.map(str::trim).filter(|s| !s.is_empty());
    let ua = user_agent.map(str::trim).filter(|s| !s.is_empty());
    format!("{}|{}", addr.unwrap_or("unknown"), ua.unwrap_or("unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_subject() {
        assert_eq!(normalize_subject("  User@Gmail.COM "), "user@gmail.com");
    }

    #[test]
    fn test_split_email_uses_final_at() {
        assert_eq!(split_email("a@b@c.com"), Some(("a@b", "c.com")));
        assert_eq!(split_email("user@gmail.com"), Some(("user", "gmail.com")));
        assert_eq!(split_email("no-at-sign"), None);
        assert_eq!(split_email("@gmail.com"), None);
        assert_eq!(split_email("user@"), None);
    }

    #[test]
    fn test_client_key() {
        assert_eq!(client_key(Some("10.0.0.1"), Some("curl/8")), "10.0.0.1|curl/8");
        assert_eq!(client_key(None, Some("  ")), "unknown|unknown");
    }
}
