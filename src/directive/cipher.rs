//! Single-byte XOR obfuscation shared with the directive producer.
//!
//! The key is folded to one mask byte (XOR of every key byte) and that mask
//! is applied to every data byte. The transform is its own inverse.

/// XOR-reduce `key` to its mask byte. An empty key yields zero.
pub fn mask(key: &[u8]) -> u8 {
    key.iter().fold(0, |acc, b| acc ^ b)
}

/// Apply the obfuscation transform for `key` to `data`.
pub fn transform(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mask = mask(key);
    data.iter().map(|b| b ^ mask).collect()
}
