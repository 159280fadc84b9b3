//! Perforce tagged-output protocol layer: record model, depot prefix
//! resolution, stream scanning, and the client that ties them together.

mod client;
mod prefix;
mod record;
mod scan;

pub use client::*;
pub use prefix::*;
pub use record::*;
pub use scan::*;
