//! Ordered prefix table deciding which requests belong to the backend.

/// Path prefixes owned by the backend, in match order.
pub const PROXIED_PREFIXES: [&str; 6] = [
    "/api",
    "/auth",
    "/social",
    "/messages/ws",
    "/messages",
    "/resume-tester",
];

/// A single forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRule {
    pub path_prefix: &'static str,
    pub target_origin: String,
    pub forward_cookies: bool,
    pub supports_websocket: bool,
}

impl ProxyRule {
    /// Whether `path` falls under this rule's mount point.
    pub fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.path_prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Upstream URL for an inbound path (and optional query).
    pub fn target_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.target_origin, path_and_query)
    }

    /// Upstream WebSocket URL: same target with the `ws`/`wss` scheme.
    pub fn websocket_url(&self, path_and_query: &str) -> String {
        let url = self.target_url(path_and_query);
        if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            url
        }
    }
}

/// Immutable rule table, evaluated top to bottom.
#[derive(Debug, Clone)]
pub struct ProxyTable {
    rules: Vec<ProxyRule>,
}

impl ProxyTable {
    pub fn new(target_origin: &str) -> Self {
        let rules = PROXIED_PREFIXES
            .into_iter()
            .map(|prefix| ProxyRule {
                path_prefix: prefix,
                target_origin: target_origin.to_string(),
                forward_cookies: true,
                supports_websocket: true,
            })
            .collect();
        Self { rules }
    }

    /// First rule matching `path`, if any.
    pub fn match_path(&self, path: &str) -> Option<&ProxyRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn rules(&self) -> &[ProxyRule] {
        &self.rules
    }
}
