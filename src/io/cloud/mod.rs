//! Object storage abstractions.
//!
//! The pipeline reads source tables from, and writes JSON artifacts to, an
//! object store reached through the provider-agnostic [`ObjectIO`] trait:
//!
//! - **Synchronous interface** - all operations are blocking
//! - **Fake implementation** - [`FakeObjectIO`] keeps everything in memory and
//!   can inject failures, for tests
//! - **Filesystem implementation** - [`LocalObjectIO`] maps buckets to directories
//! - **Helpers** - retry with backoff and bounded timeouts
//!
//! Components never touch an `ObjectIO` directly; they receive a
//! [`StorageClient`], which binds a bucket and applies the retry and timeout
//! policy to every call.
//!
//! ```
//! use edgarflow::io::cloud::*;
//!
//! # fn main() -> CloudResult<()> {
//! let storage = FakeObjectIO::new();
//! storage.put_object("bucket", "sec_extracted_tsv/2016q4/sub.txt", b"adsh\n")?;
//! storage.put_object("bucket", "sec_extracted_tsv/2017q1/num.txt", b"adsh\n")?;
//!
//! let quarters = storage.list_prefixes("bucket", "sec_extracted_tsv/")?;
//! assert_eq!(quarters, vec!["sec_extracted_tsv/2016q4/", "sec_extracted_tsv/2017q1/"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`CloudResult<T>`] where the error is [`CloudIOError`].
//! Errors are categorized by [`ErrorKind`]; `Network`, `Timeout`,
//! `ServiceUnavailable` and `RateLimited` are treated as transient and retried.

pub mod client;
pub mod fake;
pub mod helpers;
pub mod local;
pub mod traits;

pub use client::StorageClient;
pub use fake::*;
pub use local::LocalObjectIO;
pub use traits::*;
