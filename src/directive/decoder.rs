//! Directive token decoding.
//!
//! A directive token is the hex encoding of an obfuscated JSON array of up
//! to four base-64 numerals: `[expiry, uid, telephone, city]`. The producer
//! may use any of several candidate keys, so every key is tried.
//!
//! # Design Decisions
//! - One task per candidate key; results land in a buffer indexed by key
//!   position and are scanned in key order after the join, so the chosen
//!   record never depends on completion order
//! - Every failure (bad hex, bad JSON, panicking task) degrades to "no
//!   directive" instead of an error

use futures_util::future::join_all;
use std::sync::Arc;

use crate::directive::{cipher, radix};
use crate::routing::table::{RoutingTable, Secret};

/// Number of fields a directive carries at most.
pub const FIELD_COUNT: usize = 4;

/// Decoded directive fields, in order `[expiry, uid, telephone, city]`.
///
/// A shorter directive means the trailing fields are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directive(Vec<i64>);

impl Directive {
    pub fn new(fields: Vec<i64>) -> Self {
        Self(fields)
    }

    /// Expiry as Unix seconds.
    pub fn expiry(&self) -> Option<i64> {
        self.0.first().copied()
    }

    pub fn uid(&self) -> Option<i64> {
        self.0.get(1).copied()
    }

    pub fn telephone(&self) -> Option<i64> {
        self.0.get(2).copied()
    }

    pub fn city(&self) -> Option<i64> {
        self.0.get(3).copied()
    }

    pub fn fields(&self) -> &[i64] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// The raw string fields recovered with one candidate key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Record(Vec<String>);

impl Record {
    fn invalid() -> Self {
        Self(vec![String::new(); FIELD_COUNT])
    }

    /// A record is valid when its first field is non-empty.
    fn is_valid(&self) -> bool {
        self.0.first().is_some_and(|f| !f.is_empty())
    }

    fn into_directive(self) -> Directive {
        let fields = self
            .0
            .iter()
            .map(|field| {
                let value = radix::decode(field, radix::Base::MAX);
                i64::try_from(value).unwrap_or(i64::MAX)
            })
            .collect();
        Directive(fields)
    }
}

/// Recover a record from ciphertext with one key.
pub(crate) fn attempt(key: &[u8], ciphertext: &[u8]) -> Record {
    let plaintext = cipher::transform(key, ciphertext);
    match serde_json::from_slice::<Vec<String>>(&plaintext) {
        Ok(fields) if !fields.is_empty() && fields.len() <= FIELD_COUNT => Record(fields),
        _ => Record::invalid(),
    }
}

/// The first valid record in candidate order.
pub(crate) fn first_valid(records: Vec<Record>) -> Option<Record> {
    records.into_iter().find(Record::is_valid)
}

/// Decode a directive token against a set of candidate keys.
pub async fn decode_with(keys: &[Secret], token: &str) -> Directive {
    if keys.is_empty() {
        return Directive::default();
    }

    let ciphertext: Arc<[u8]> = match hex::decode(token) {
        Ok(bytes) => bytes.into(),
        Err(e) => {
            tracing::debug!(error = %e, "Directive token is not valid hex");
            Arc::from(Vec::new())
        }
    };

    let tasks = keys.iter().map(|key| {
        let key = Arc::clone(key);
        let ciphertext = Arc::clone(&ciphertext);
        tokio::spawn(async move { attempt(&key, &ciphertext) })
    });

    // join_all yields results in the order the tasks were created.
    let records = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| match joined {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Directive decode task failed");
                Record::invalid()
            }
        })
        .collect();

    first_valid(records)
        .map(Record::into_directive)
        .unwrap_or_default()
}

/// Decodes directive tokens using the candidate keys of a routing table.
#[derive(Debug, Clone)]
pub struct DirectiveDecoder {
    table: Arc<RoutingTable>,
}

impl DirectiveDecoder {
    pub fn new(table: Arc<RoutingTable>) -> Self {
        Self { table }
    }

    /// Decode `token` for `host`. Returns an empty directive when nothing
    /// valid can be recovered.
    pub async fn decode(&self, host: &str, token: &str) -> Directive {
        decode_with(self.table.secrets_for(host), token).await
    }
}
