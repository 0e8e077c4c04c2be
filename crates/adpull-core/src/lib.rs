//! Core pipeline for adpull.
//!
//! This crate contains:
//! - Canonical record schema, time chunking and fingerprint dedup
//! - The retry/backoff and pacing policy
//! - Report-job polling and cursor pagination engines
//! - Platform adapters behind the [`PlatformClient`] seam
//! - The per-account worker and the bounded multi-account orchestrator

pub mod account;
pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod fingerprint;
pub mod http;
pub mod job;
pub mod normalize;
pub mod orchestrator;
pub mod pagination;
pub mod retry;

pub use account::{AccountResult, AccountStatus, AccountWorker};
pub use adapters::{AccountTokens, InsightsAdapter, ReportingAdapter};
pub use config::FetchPolicy;
pub use domain::{DateRange, EntityId, NormalizedRecord, RawRecord, TimeChunk};
pub use error::FetchError;
pub use fetcher::PlatformClient;
pub use fingerprint::{Deduplicator, RecordFingerprint};
pub use http::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use job::{CompletedJob, JobHandle, JobPoller, JobStatus, JobStatusSnapshot, ReportJobApi};
pub use normalize::{
    AdInfo, CampaignInfo, MappingTables, NormalizeStats, RecordNormalizer,
};
pub use orchestrator::{Orchestrator, RunOutput, RunSummary};
pub use pagination::{
    BatchOutcome, BatchSource, Cursor, Page, PageFetcher, PageOutcome, PageSource,
};
pub use retry::{Backoff, RetryConfig};
