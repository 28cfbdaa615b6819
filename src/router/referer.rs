//! Referer-based inference: picks a dev server for requests whose path
//! does not say which app they belong to.
//!
//! The `Referer` header is client-controlled, so this is a heuristic only.
//! All of it lives here so it can be swapped for something sturdier (a
//! routing cookie, for instance) without touching the dispatcher.

use crate::config::GatewayConfig;

/// A single inference rule: if `needle` occurs in the inspected string,
/// route to `port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefererRule {
    pub needle: String,
    pub port: u16,
}

/// Priority-ordered rules plus the default port
#[derive(Debug, Clone)]
pub struct RefererRules {
    rules: Vec<RefererRule>,
    default_port: u16,
}

impl RefererRules {
    /// Build rules from explicit pairs
    pub fn new(rules: Vec<RefererRule>, default_port: u16) -> Self {
        Self {
            rules,
            default_port,
        }
    }

    /// Derive rules from configuration: every route of every non-default
    /// app, in app order. The default app needs no rule since it is the
    /// fallback anyway.
    pub fn from_config(config: &GatewayConfig, default_port: u16) -> Self {
        let rules = config
            .apps
            .iter()
            .filter(|(name, _)| **name != config.default_app)
            .flat_map(|(_, app)| {
                app.routes.iter().map(move |route| RefererRule {
                    needle: route.clone(),
                    port: app.port,
                })
            })
            .collect();
        Self::new(rules, default_port)
    }

    /// First rule whose needle occurs in `haystack`
    pub fn infer(&self, haystack: &str) -> Option<u16> {
        self.rules
            .iter()
            .find(|rule| haystack.contains(rule.needle.as_str()))
            .map(|rule| rule.port)
    }

    /// Resolve a port from an optional `Referer`, falling back to the default
    pub fn resolve(&self, referer: Option<&str>) -> u16 {
        referer
            .and_then(|r| self.infer(r))
            .unwrap_or(self.default_port)
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    pub fn rules(&self) -> &[RefererRule] {
        &self.rules
    }
}
