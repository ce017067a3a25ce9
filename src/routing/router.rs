//! Backend selection.
//!
//! # Responsibilities
//! - Turn (host, version token, directive token) into a backend address
//! - Own one immutable `RoutingTable` generation and its decoder
//!
//! # Design Decisions
//! - Group A is the default; group B needs an explicit opt-in
//! - An expired directive sends traffic to group A before any other check
//! - Pool picks are made per call, uniformly at random

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::directive::{Directive, DirectiveDecoder};
use crate::routing::table::RoutingTable;

/// Which backend group a request was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    A,
    B,
}

/// Routing decision engine for one table generation.
#[derive(Debug, Clone)]
pub struct Router {
    table: Arc<RoutingTable>,
    decoder: DirectiveDecoder,
}

impl Router {
    pub fn new(table: RoutingTable) -> Self {
        let table = Arc::new(table);
        Self {
            decoder: DirectiveDecoder::new(Arc::clone(&table)),
            table,
        }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Resolve the backend address for a request.
    ///
    /// Returns `None` only when the selected pool is empty.
    pub async fn resolve(&self, host: &str, version: &str, directive: &str) -> Option<String> {
        self.resolve_at(host, version, directive, unix_now()).await
    }

    /// [`Router::resolve`] with an explicit clock, in Unix seconds.
    pub async fn resolve_at(
        &self,
        host: &str,
        version: &str,
        directive: &str,
        now: i64,
    ) -> Option<String> {
        let table = &*self.table;
        let Some(rule) = table.rule(host) else {
            return table.default_group_a().pick().map(str::to_owned);
        };

        let group = self.select_group(host, version, directive, now).await;
        let pool = match group {
            Group::A => table.group_a(rule),
            Group::B => table.group_b(rule),
        };
        pool.pick().map(str::to_owned)
    }

    /// Decide between group A and B for a host that has a rule.
    pub async fn select_group(&self, host: &str, version: &str, token: &str, now: i64) -> Group {
        let Some(rule) = self.table.rule(host) else {
            return Group::A;
        };

        if version.is_empty() && token.is_empty() {
            return Group::A;
        }

        let directive = if token.is_empty() {
            Directive::default()
        } else {
            self.decoder.decode(host, token).await
        };

        let version_matches = rule.versions.has(version);
        if version_matches && directive.is_empty() {
            return Group::B;
        }

        if version_matches || !rule.has_versions() {
            if directive.expiry().is_some_and(|expiry| expiry < now) {
                return Group::A;
            }
            if directive.uid().is_some_and(|uid| rule.uids.has(&uid)) {
                return Group::B;
            }
            if directive.telephone().is_some_and(|tel| rule.telephones.has(&tel)) {
                return Group::B;
            }
            if directive.city().is_some_and(|city| rule.cities.has(&city)) {
                return Group::B;
            }
        }

        Group::A
    }
}

/// Current time in Unix seconds (UTC).
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
