//! Robots.txt parser implementation
//!
//! Allow/deny decisions are made by the robotstxt crate's longest-match
//! matcher. The same crate's parser drives a `RobotsParseHandler` that
//! collects the user-agent groups, so `Crawl-delay` (which the matcher
//! ignores) can be read for the group that applies to us.

use std::time::Duration;

use robotstxt::{parse_robotstxt, DefaultMatcher, RobotsParseHandler};

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    allow: Vec<String>,
    disallow: Vec<String>,
    crawl_delay: Option<f64>,
}

/// Builds groups from parser callbacks
///
/// Consecutive `User-agent` lines share one group. A `User-agent` line that
/// follows any other directive starts a new group. Rules seen before the
/// first `User-agent` line belong to no group.
#[derive(Debug, Default)]
struct GroupCollector {
    groups: Vec<Group>,
    in_agent_lines: bool,
}

impl GroupCollector {
    fn current(&mut self) -> Option<&mut Group> {
        self.in_agent_lines = false;
        self.groups.last_mut()
    }
}

impl RobotsParseHandler for GroupCollector {
    fn handle_robots_start(&mut self) {}

    fn handle_robots_end(&mut self) {}

    fn handle_user_agent(&mut self, _line_num: u32, user_agent: &str) {
        if !self.in_agent_lines {
            self.groups.push(Group::default());
            self.in_agent_lines = true;
        }
        if let Some(group) = self.groups.last_mut() {
            group.agents.push(product_token(user_agent));
        }
    }

    fn handle_allow(&mut self, _line_num: u32, value: &str) {
        if let Some(group) = self.current() {
            if !value.is_empty() {
                group.allow.push(value.to_string());
            }
        }
    }

    fn handle_disallow(&mut self, _line_num: u32, value: &str) {
        // An empty Disallow allows everything; it adds no constraint
        if let Some(group) = self.current() {
            if !value.is_empty() {
                group.disallow.push(value.to_string());
            }
        }
    }

    fn handle_sitemap(&mut self, _line_num: u32, _value: &str) {}

    fn handle_unknown_action(&mut self, _line_num: u32, action: &str, value: &str) {
        if !action.eq_ignore_ascii_case("crawl-delay") {
            return;
        }
        if let (Some(group), Ok(delay)) = (self.current(), value.trim().parse::<f64>()) {
            if delay.is_finite() && delay >= 0.0 {
                group.crawl_delay = Some(delay);
            }
        }
    }
}

/// Parsed robots.txt data
///
/// Holds the raw content for the matcher plus the user-agent groups read
/// from it.
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty means allow all)
    content: String,
    groups: Vec<Group>,
}

/// The directives that apply to one user agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    pub disallow: Vec<String>,
    pub allow: Vec<String>,
    pub crawl_delay: Option<Duration>,
}

/// Reduces a User-Agent header to its product token (`Name/1.0 (...)` → `name`)
pub fn product_token(user_agent: &str) -> String {
    user_agent
        .trim()
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

impl ParsedRobots {
    /// Parses raw robots.txt content
    ///
    /// Never fails: lines that cannot be understood are skipped.
    pub fn parse(content: &str) -> Self {
        let mut collector = GroupCollector::default();
        parse_robotstxt(content, &mut collector);
        Self {
            content: content.to_string(),
            groups: collector.groups,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is the result when robots.txt cannot be fetched.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks a path (with query string) for the given user agent
    ///
    /// The longest matching pattern decides; an Allow and a Disallow of the
    /// same length resolve to Allow. `/robots.txt` is always allowed.
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        if self.content.is_empty() || path == "/robots.txt" {
            return true;
        }
        let token = product_token(user_agent);
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &token, path)
    }

    /// Selects and merges the groups that apply to `user_agent`
    ///
    /// Groups naming the agent's product token win over `*` groups. When
    /// several groups apply, their directives are combined and the largest
    /// crawl-delay is kept.
    pub fn rules_for(&self, user_agent: &str) -> RobotsRules {
        let token = product_token(user_agent);

        let exact: Vec<&Group> = self
            .groups
            .iter()
            .filter(|g| !token.is_empty() && g.agents.iter().any(|a| *a == token))
            .collect();

        let selected = if exact.is_empty() {
            self.groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == "*"))
                .collect()
        } else {
            exact
        };

        let mut rules = RobotsRules::default();
        for group in selected {
            rules.allow.extend(group.allow.iter().cloned());
            rules.disallow.extend(group.disallow.iter().cloned());
            if let Some(delay) = group.crawl_delay {
                let delay = Duration::try_from_secs_f64(delay).unwrap_or(Duration::MAX);
                rules.crawl_delay = Some(rules.crawl_delay.map_or(delay, |d| d.max(delay)));
            }
        }

        rules
    }

    /// Crawl-delay for the given user agent, if any
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.rules_for(user_agent).crawl_delay
    }
}
