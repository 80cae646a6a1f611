//! I/O: object storage and tab-separated tables.

pub mod cloud;
pub mod tsv;
