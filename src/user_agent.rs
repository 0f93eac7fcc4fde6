//! User-Agent strings for drive requests.
//!
//! The drive service serves different (and less useful) pages to clients
//! that identify as tools, so every request presents a desktop browser UA.

/// Browser User-Agent sent with every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Identity string used in CLI version output and logs.
#[must_use]
pub fn tool_identity() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("drivefetch/{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_user_agent_looks_like_chrome() {
        assert!(BROWSER_USER_AGENT.starts_with("Mozilla/5.0"));
        assert!(BROWSER_USER_AGENT.contains("Chrome/"));
    }

    #[test]
    fn test_tool_identity_contains_version() {
        let identity = tool_identity();
        assert_eq!(
            identity.strip_prefix("drivefetch/"),
            Some(env!("CARGO_PKG_VERSION"))
        );
    }
}
