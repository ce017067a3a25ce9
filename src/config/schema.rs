//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.
//! Field aliases accept the camelCase keys of the JSON layout as well.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration for the A/B router.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Log output settings.
    pub log: LogConfig,

    /// Listener port, token names and admin surface.
    #[serde(alias = "defaultOption")]
    pub options: OptionsConfig,

    /// Server timeouts and drain deadline.
    pub timeouts: TimeoutConfig,

    /// Pools used when a host has no pool of its own.
    #[serde(alias = "defaultServer")]
    pub default_server: ServerGroups,

    /// Candidate secrets used when a host has none of its own.
    #[serde(alias = "defaultSecret")]
    pub default_secrets: Vec<String>,

    /// Per-host rules keyed by Host header.
    #[serde(alias = "rule")]
    pub rules: HashMap<String, HostRuleConfig>,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for the log file. Logs go to stderr when unset.
    pub dir: Option<PathBuf>,

    /// File name inside `dir`, as a time pattern evaluated per record so a
    /// dated name starts a new file when the date changes. Either strftime
    /// (`%Y%m%d.log`) or a reference-time layout (`20060102.log`).
    pub format: String,

    /// Text prepended to every line written to the log file.
    pub prefix: String,

    /// Line encoding.
    #[serde(alias = "output")]
    pub style: LogStyle,

    /// Default filter when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: "abtest-%Y%m%d.log".to_string(),
            prefix: String::new(),
            style: LogStyle::Text,
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// `format` as a strftime pattern.
    pub fn file_pattern(&self) -> Cow<'_, str> {
        if self.format.contains('%') {
            Cow::Borrowed(&self.format)
        } else {
            Cow::Owned(reference_layout_to_strftime(&self.format))
        }
    }
}

/// Reference-time layout tokens (Mon Jan 2 15:04:05 MST 2006) and their
/// strftime equivalents. Longer tokens come first.
const LAYOUT_TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    ("-0700", "%z"),
    ("2006", "%Y"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("01", "%m"),
    ("02", "%d"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
];

fn reference_layout_to_strftime(layout: &str) -> String {
    let mut out = String::with_capacity(layout.len() + 8);
    let mut rest = layout;
    'outer: while let Some(c) = rest.chars().next() {
        for (token, spec) in LAYOUT_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogStyle {
    #[default]
    Text,
    Json,
}

/// General options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OptionsConfig {
    /// Listen port (all interfaces).
    pub port: u16,

    /// Header (and fallback cookie) carrying the version token.
    #[serde(alias = "paramNameVersion")]
    pub version_param: String,

    /// Header (and fallback cookie) carrying the directive token.
    #[serde(alias = "paramNameData")]
    pub directive_param: String,

    /// File recording the serving process id.
    #[serde(alias = "sockFile")]
    pub pid_file: PathBuf,

    /// Admin path that triggers a config reload.
    pub reload_path: String,

    /// Admin path answering liveness checks.
    pub health_path: String,

    /// Largest request body that will be buffered and forwarded.
    pub max_body_bytes: usize,

    /// Largest body excerpt written to the access log.
    pub log_body_bytes: usize,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            version_param: "__abv".to_string(),
            directive_param: "__abd".to_string(),
            pid_file: PathBuf::from("/tmp/abtest.sock"),
            reload_path: "/abtest_config_reload".to_string(),
            health_path: "/slb_check".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            log_body_bytes: 64 * 1024,
        }
    }
}

/// Timeout configuration, all in seconds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for reading the request body.
    pub read_secs: u64,

    /// Deadline for producing the response.
    pub write_secs: u64,

    /// Idle keep-alive connection timeout.
    pub idle_secs: u64,

    /// Deadline for the backend to answer.
    pub upstream_secs: u64,

    /// Drain deadline on shutdown and hand-off.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 5,
            write_secs: 60,
            idle_secs: 300,
            upstream_secs: 60,
            shutdown_secs: 10,
        }
    }
}

/// The two backend pools, as `host:port` strings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerGroups {
    #[serde(alias = "groupA")]
    pub group_a: Vec<String>,

    #[serde(alias = "groupB")]
    pub group_b: Vec<String>,
}

/// Routing rule for one host. Empty lists fall back to the global defaults
/// (secrets, pools) or disable that criterion (versions, uids, ...).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HostRuleConfig {
    pub secrets: Vec<String>,

    pub versions: Vec<String>,

    pub uids: Vec<i64>,

    #[serde(alias = "telphones")]
    pub telephones: Vec<i64>,

    #[serde(alias = "citys")]
    pub cities: Vec<i64>,

    #[serde(alias = "groupA")]
    pub group_a: Vec<String>,

    #[serde(alias = "groupB")]
    pub group_b: Vec<String>,
}
