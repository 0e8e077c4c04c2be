//! Seam between the account worker and the platform protocol code.

use std::future::Future;
use std::pin::Pin;

use crate::domain::{RawRecord, TimeChunk};
use crate::error::FetchError;
use crate::normalize::MappingTables;

/// Everything an account worker needs from a reporting platform.
///
/// Whether a chunk is served by an async report job or a paginated listing is
/// an adapter concern; the worker only sees raw rows per
/// `(account, chunk, attribution window)`.
pub trait PlatformClient: Send + Sync {
    /// Verifies the account's credential before any fetch. An `Auth` error
    /// here aborts the whole account.
    fn validate_account<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), FetchError>> + Send + 'a>>;

    /// Fetches the campaign / adgroup / ad lookup tables for one account.
    fn fetch_mappings<'a>(
        &'a self,
        account_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<MappingTables, FetchError>> + Send + 'a>>;

    /// Fetches all raw metric rows for one unit of work.
    fn fetch_chunk<'a>(
        &'a self,
        account_id: &'a str,
        chunk: TimeChunk,
        attribution_window: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRecord>, FetchError>> + Send + 'a>>;
}
