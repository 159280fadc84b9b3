//! p4stream - streaming parser for Perforce tagged (`-ztag`) command output.

pub mod exec;
pub mod p4;
