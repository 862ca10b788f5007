//! # Formats
//!
//! Binary model persistence. File I/O stays in the app layer.

mod persistence;

pub use persistence::{ModelHeader, network_from_bytes, network_to_bytes};
