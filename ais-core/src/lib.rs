#![deny(warnings)]
#![deny(rust_2018_idioms)]

//! Domain types shared by the AIS codec and the broadcast gateway.

mod ais;
mod error;
mod vessel;

pub use ais::*;
pub use error::*;
pub use vessel::*;
