use crate::error::{FieldOverflowSnafu, Result, SixBitRangeSnafu};

/// The AIS six-bit ASCII alphabet in symbol order: `@` is 0, `A`-`Z` are
/// 1-26, space is 32, digits start at 48.
const SIX_BIT_ALPHABET: &str =
    "@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_ !\"#$%&'()*+,-./0123456789:;<=>?";

/// Fill behavior for fixed-width text fields. Name and destination fields pad
/// with spaces, callsign and vendor-id fields pad with `@`; unknown input
/// characters map to the fill symbol of the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFill {
    Space,
    At,
}

impl TextFill {
    fn symbol(self) -> u8 {
        match self {
            TextFill::Space => 32,
            TextFill::At => 0,
        }
    }

    fn pad_char(self) -> char {
        match self {
            TextFill::Space => ' ',
            TextFill::At => '@',
        }
    }
}

/// Append-only bitstring used to assemble one AIS message.
#[derive(Debug, Default, Clone)]
pub struct BitBuf {
    bits: Vec<bool>,
}

impl BitBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Appends `value` as an unsigned big-endian field of exactly `width` bits.
    pub fn put_u32(&mut self, value: u32, width: usize) -> Result<()> {
        if width < 32 && u64::from(value) >> width != 0 {
            return FieldOverflowSnafu {
                value: i64::from(value),
                width,
            }
            .fail();
        }
        for i in (0..width).rev() {
            self.bits.push(value >> i & 1 == 1);
        }
        Ok(())
    }

    /// Appends a signed value in two's-complement representation. The caller
    /// must pre-clamp; a magnitude that does not fit `width` bits is an error.
    pub fn put_i32(&mut self, value: i32, width: usize) -> Result<()> {
        let encoded = if value < 0 {
            (1i64 << width) + i64::from(value)
        } else {
            i64::from(value)
        };
        if encoded < 0 || encoded >> width != 0 {
            return FieldOverflowSnafu {
                value: i64::from(value),
                width,
            }
            .fail();
        }
        for i in (0..width).rev() {
            self.bits.push(encoded >> i & 1 == 1);
        }
        Ok(())
    }

    /// Appends `chars` six-bit symbols of uppercased text, truncating or
    /// padding with the fill character as needed.
    pub fn put_text(&mut self, text: &str, chars: usize, fill: TextFill) {
        let upper = text.to_uppercase();
        let mut input = upper.chars();
        for _ in 0..chars {
            let c = input.next().unwrap_or(fill.pad_char());
            let symbol = SIX_BIT_ALPHABET
                .find(c)
                .map(|i| i as u8)
                .unwrap_or(fill.symbol());
            for i in (0..6).rev() {
                self.bits.push(symbol >> i & 1 == 1);
            }
        }
    }

    /// Zero-pads up to `len` bits; no-op when already at or past it.
    pub fn pad_to(&mut self, len: usize) {
        while self.bits.len() < len {
            self.bits.push(false);
        }
    }

    /// Armors the bitstring as printable six-bit ASCII, zero-padding to a
    /// multiple of 6 first.
    pub fn to_payload(&self) -> Result<String> {
        let mut payload = String::with_capacity(self.bits.len().div_ceil(6));
        for chunk in self.bits.chunks(6) {
            let mut value = 0u8;
            for i in 0..6 {
                value <<= 1;
                if chunk.get(i).copied().unwrap_or(false) {
                    value |= 1;
                }
            }
            payload.push(encode_six_bit(value)?);
        }
        Ok(payload)
    }
}

/// Maps a six-bit symbol (0-63) onto the AIS payload armoring alphabet.
pub fn encode_six_bit(value: u8) -> Result<char> {
    match value {
        0..=39 => Ok((b'0' + value) as char),
        40..=63 => Ok((b'8' + value) as char),
        _ => SixBitRangeSnafu { value }.fail(),
    }
}

/// XOR checksum over every byte between the leading `!`/`$` and the end of
/// `sentence`, rendered as two uppercase hex digits.
pub fn checksum(sentence: &str) -> String {
    let cs = sentence
        .bytes()
        .skip(1)
        .fold(0u8, |acc, b| acc ^ b);
    format!("{cs:02X}")
}
