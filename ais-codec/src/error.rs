use ais_core::Mmsi;
use snafu::{Location, Snafu};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("six-bit symbol out of range: {value}"))]
    SixBitRange {
        #[snafu(implicit)]
        location: Location,
        value: u8,
    },
    #[snafu(display("value {value} does not fit a {width} bit field"))]
    FieldOverflow {
        #[snafu(implicit)]
        location: Location,
        value: i64,
        width: usize,
    },
    #[snafu(display("vessel {mmsi} has no position, cannot build a position report"))]
    MissingPosition {
        #[snafu(implicit)]
        location: Location,
        mmsi: Mmsi,
    },
    #[snafu(display("assembled message is {actual} bits, expected {expected}"))]
    LengthMismatch {
        #[snafu(implicit)]
        location: Location,
        expected: usize,
        actual: usize,
    },
}
