#![deny(warnings)]
#![deny(rust_2018_idioms)]

//! Implements a service that polls vessel telemetry from a primary HTTP
//! source and an optional cloud source, merges it per MMSI, re-encodes it as
//! AIS `!AIVDM` sentences and fans the sentences out to TCP, WebSocket and
//! UDP clients.

pub mod aggregator;
pub mod broadcaster;
pub mod cloud;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod settings;
pub mod signalk;
pub mod startup;
