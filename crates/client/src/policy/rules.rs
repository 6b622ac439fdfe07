//! robots.txt parsing and rule evaluation.
//!
//! Evaluation picks the most specific user-agent group that matches the
//! crawler's product token, falling back to `*`. Within that group the
//! longest matching path pattern decides; on equal length `Allow` wins.
//! Patterns support `*` (any run of characters) and a trailing `$`
//! (end of path).
//!
//! An empty `Disallow:` is stored as an empty-pattern `Allow` so the group
//! still exists for group selection; it matches every path at the lowest
//! specificity.

use serde::{Deserialize, Serialize};

/// One Allow or Disallow line, tagged with the user-agent group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Lowercased user-agent pattern, `*` for the default group.
    pub user_agent_pattern: String,
    pub path_pattern: String,
    pub allow: bool,
}

impl PolicyRule {
    pub fn new(user_agent_pattern: &str, path_pattern: &str, allow: bool) -> Self {
        Self {
            user_agent_pattern: user_agent_pattern.trim().to_lowercase(),
            path_pattern: path_pattern.trim().to_string(),
            allow,
        }
    }
}

/// Parse a robots.txt body.
///
/// Returns None when the body has no recognizable directives at all,
/// e.g. an HTML error page served with a 200 status.
pub fn parse(body: &str) -> Option<Vec<PolicyRule>> {
    let mut rules = Vec::new();
    let mut agents: Vec<String> = Vec::new();
    let mut in_rules = false;
    let mut recognized = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match field.trim().to_ascii_lowercase().as_str() {
            "user-agent" => {
                recognized = true;
                if in_rules {
                    agents.clear();
                    in_rules = false;
                }
                if !value.is_empty() {
                    agents.push(value.to_lowercase());
                }
            }
            directive @ ("allow" | "disallow") => {
                recognized = true;
                in_rules = true;
                if value.is_empty() && directive == "allow" {
                    continue;
                }
                let allow = directive == "allow" || value.is_empty();
                rules.extend(agents.iter().map(|agent| PolicyRule::new(agent, value, allow)));
            }
            "sitemap" | "crawl-delay" | "host" => recognized = true,
            _ => {}
        }
    }

    recognized.then_some(rules)
}

/// Product token of a User-Agent header value, lowercased.
///
/// `"sift/0.1 (+https://example.com)"` yields `"sift"`.
pub fn product_token(user_agent: &str) -> String {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Whether `pattern` matches the start of `path`.
pub fn path_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (pattern, false),
    };

    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };

    let remaining: Vec<&str> = parts.collect();
    let Some((last, middle)) = remaining.split_last() else {
        return !anchored || rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }

    if anchored {
        rest.ends_with(last)
    } else {
        rest.contains(last)
    }
}

/// Evaluate `rules` for a crawler and a path (including any query string).
pub fn is_allowed(rules: &[PolicyRule], user_agent: &str, path: &str) -> bool {
    let token = product_token(user_agent);

    let group = rules
        .iter()
        .map(|r| r.user_agent_pattern.as_str())
        .filter(|pattern| *pattern != "*" && !token.is_empty() && token.contains(pattern))
        .max_by_key(|pattern| pattern.len())
        .unwrap_or("*");

    let best = rules
        .iter()
        .filter(|r| r.user_agent_pattern == group && path_matches(&r.path_pattern, path))
        .max_by(|a, b| a.path_pattern.len().cmp(&b.path_pattern.len()).then(a.allow.cmp(&b.allow)));

    best.is_none_or(|rule| rule.allow)
}
