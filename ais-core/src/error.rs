use snafu::{Location, Snafu};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("invalid mmsi: '{value}'"))]
    InvalidMmsi {
        #[snafu(implicit)]
        location: Location,
        value: String,
    },
}
