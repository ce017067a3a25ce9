//! Compiled routing rules for one configuration generation.
//!
//! # Responsibilities
//! - Compile `RouterConfig` into per-host `HostRule`s
//! - Resolve per-host fallbacks (secrets, pools) to the global defaults
//! - Pick a backend uniformly at random from a pool
//!
//! # Design Decisions
//! - Built once, never mutated afterwards; a reload builds a new table
//! - Host keys are lowercased, lookups are case-insensitive
//! - Secrets are shared `Arc<[u8]>` so decode tasks can own them cheaply

use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{HostRuleConfig, RouterConfig};
use crate::routing::rule_set::RuleSet;

/// A candidate key for directive decoding.
pub type Secret = Arc<[u8]>;

/// A static list of `host:port` backends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerPool {
    servers: Vec<String>,
}

impl ServerPool {
    pub fn new(servers: Vec<String>) -> Self {
        Self { servers }
    }

    /// Pick one server uniformly at random.
    pub fn pick(&self) -> Option<&str> {
        self.servers
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    pub fn contains(&self, server: &str) -> bool {
        self.servers.iter().any(|s| s == server)
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }
}

/// Compiled rule for one host.
#[derive(Debug, Default)]
pub struct HostRule {
    /// Candidate keys in configured order. Empty means "use the defaults".
    pub secrets: Vec<Secret>,
    pub versions: RuleSet<String>,
    pub uids: RuleSet<i64>,
    pub telephones: RuleSet<i64>,
    pub cities: RuleSet<i64>,
    /// Empty means "use the default group A pool".
    pub group_a: ServerPool,
    /// Empty means "use the default group B pool".
    pub group_b: ServerPool,
}

impl HostRule {
    /// Compile one host entry.
    pub fn from_config(config: &HostRuleConfig) -> Self {
        Self {
            secrets: compile_secrets(&config.secrets),
            versions: config.versions.iter().cloned().collect(),
            uids: config.uids.iter().copied().collect(),
            telephones: config.telephones.iter().copied().collect(),
            cities: config.cities.iter().copied().collect(),
            group_a: ServerPool::new(config.group_a.clone()),
            group_b: ServerPool::new(config.group_b.clone()),
        }
    }

    /// True when the rule restricts versions at all.
    pub fn has_versions(&self) -> bool {
        !self.versions.is_empty()
    }
}

/// Host → rule mapping plus the global defaults.
#[derive(Debug, Default)]
pub struct RoutingTable {
    hosts: HashMap<String, HostRule>,
    default_secrets: Vec<Secret>,
    default_a: ServerPool,
    default_b: ServerPool,
}

impl RoutingTable {
    /// Compile a validated configuration into a table.
    pub fn from_config(config: &RouterConfig) -> Self {
        let hosts = config
            .rules
            .iter()
            .map(|(host, rule)| (normalize_host(host), HostRule::from_config(rule)))
            .collect();

        Self {
            hosts,
            default_secrets: compile_secrets(&config.default_secrets),
            default_a: ServerPool::new(config.default_server.group_a.clone()),
            default_b: ServerPool::new(config.default_server.group_b.clone()),
        }
    }

    /// The rule for `host`, if any.
    pub fn rule(&self, host: &str) -> Option<&HostRule> {
        if let Some(rule) = self.hosts.get(host) {
            return Some(rule);
        }
        self.hosts.get(&normalize_host(host))
    }

    /// Candidate keys for `host`: its own if configured, else the defaults.
    pub fn secrets_for(&self, host: &str) -> &[Secret] {
        match self.rule(host) {
            Some(rule) if !rule.secrets.is_empty() => &rule.secrets,
            _ => &self.default_secrets,
        }
    }

    /// Group A pool effective for `rule`.
    pub fn group_a<'a>(&'a self, rule: &'a HostRule) -> &'a ServerPool {
        if rule.group_a.is_empty() {
            &self.default_a
        } else {
            &rule.group_a
        }
    }

    /// Group B pool effective for `rule`.
    pub fn group_b<'a>(&'a self, rule: &'a HostRule) -> &'a ServerPool {
        if rule.group_b.is_empty() {
            &self.default_b
        } else {
            &rule.group_b
        }
    }

    pub fn default_group_a(&self) -> &ServerPool {
        &self.default_a
    }

    pub fn default_group_b(&self) -> &ServerPool {
        &self.default_b
    }

    /// Number of hosts with a rule.
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }
}

fn compile_secrets(secrets: &[String]) -> Vec<Secret> {
    secrets
        .iter()
        .map(|s| Secret::from(s.as_bytes()))
        .collect()
}

fn normalize_host(host: &str) -> String {
    host.trim().to_ascii_lowercase()
}
