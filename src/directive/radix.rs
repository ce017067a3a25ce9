//! Base-N numerals over a fixed 64-symbol alphabet.
//!
//! Symbols, by value: `0-9`, `a-z`, `A-Z`, `-`, `=`.
//! Numerals are big-endian and zero encodes to the empty string, so the
//! empty string decodes back to zero.

/// The numeral alphabet, indexed by digit value.
pub const ALPHABET: &[u8; 64] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ-=";

/// A numeral base between 2 and 64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Base(u8);

impl Base {
    /// The widest base the alphabet supports.
    pub const MAX: Base = Base(64);

    /// Returns `None` when `base` is outside `2..=64`.
    pub fn new(base: u8) -> Option<Self> {
        (2..=64).contains(&base).then_some(Self(base))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Digit value of a symbol, or `None` if the symbol is not in the alphabet.
fn digit_value(symbol: u8) -> Option<u64> {
    let value = match symbol {
        b'0'..=b'9' => symbol - b'0',
        b'a'..=b'z' => symbol - b'a' + 10,
        b'A'..=b'Z' => symbol - b'A' + 36,
        b'-' => 62,
        b'=' => 63,
        _ => return None,
    };
    Some(u64::from(value))
}

/// Render `num` in `base`, most significant digit first.
pub fn encode(mut num: u64, base: Base) -> String {
    let base = u64::from(base.get());
    let mut digits = Vec::new();
    while num != 0 {
        digits.push(ALPHABET[(num % base) as usize]);
        num /= base;
    }
    digits.reverse();
    // Every byte comes from the ASCII alphabet.
    digits.into_iter().map(char::from).collect()
}

/// Interpret `numeral` in `base`.
///
/// Scanning stops at the first symbol outside the alphabet and the rest of
/// the input is ignored. Values that do not fit in a `u64` saturate.
pub fn decode(numeral: &str, base: Base) -> u64 {
    let base = u64::from(base.get());
    let mut acc: u64 = 0;
    for symbol in numeral.bytes() {
        let Some(digit) = digit_value(symbol) else {
            break;
        };
        acc = match acc.checked_mul(base).and_then(|v| v.checked_add(digit)) {
            Some(v) => v,
            None => return u64::MAX,
        };
    }
    acc
}
