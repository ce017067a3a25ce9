//! Directive token subsystem.
//!
//! # Data Flow
//! ```text
//! hex token
//!     → hex decode (malformed ⇒ empty ciphertext)
//!     → cipher.rs (XOR mask per candidate key, one task per key)
//!     → JSON array of up to 4 numerals
//!     → radix.rs (base-64 numerals → integers)
//!     → Directive [expiry, uid, telephone, city]
//! ```
//!
//! Only decoding lives here; tokens are produced by a cooperating service.

pub mod cipher;
pub mod decoder;
pub mod radix;

pub use decoder::{Directive, DirectiveDecoder};
