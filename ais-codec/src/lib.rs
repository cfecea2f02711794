#![deny(warnings)]
#![deny(rust_2018_idioms)]

//! Bit-exact construction of AIS messages (ITU-R M.1371 types 1, 5, 19 and
//! 24A/24B) and their framing as NMEA 0183 `!AIVDM` sentences.

mod bits;
mod error;
mod message;
mod sentence;

pub use bits::*;
pub use error::*;
pub use message::*;
pub use sentence::*;
