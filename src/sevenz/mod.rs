//! 7z-family record decoding.
//!
//! Only the compact coder descriptor is handled here; folder graphs and the
//! packed header layout are out of scope.

mod coder;

pub use coder::{CoderDescriptor, CoderMethod, method, read_number};
