//! ZIP format definitions and low-level parsing utilities.
//!
//! Nothing here knows about collections. The functions take any
//! `Read + Seek` positioned anywhere and return decoded records;
//! [`ArchiveCollection`](crate::ArchiveCollection) ties them together.

pub mod detect;
pub mod reader;
pub mod zip;
