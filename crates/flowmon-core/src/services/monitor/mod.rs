//! Usage monitoring engine
//!
//! # Overview
//!
//! Polls a mobile carrier's subscriber API for data-quota usage, classifies
//! the reported packages into category buckets, computes usage deltas
//! against the previous observation and persists the result as a snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   cookie    ┌───────────────┐   report   ┌────────────┐
//! │ Session    │◄───────────►│ SessionBroker │───────────►│ normalize  │
//! │ Client     │   (login)   │ (retry once)  │            │ (packages) │
//! └────────────┘             └───────▲───────┘            └─────┬──────┘
//!                                    │                          │
//! ┌────────────┐   envelope         │                   ┌──────▼──────┐
//! │ Quota      │────────────────────┘                   │  BucketSet  │
//! │ Client     │                                        └──────┬──────┘
//! └────────────┘                                               │
//!                 ┌───────────────┐    previous    ┌───────────▼──────┐
//!                 │ SnapshotStore │───────────────►│   compute_diff   │
//!                 │ (save/prune)  │◄───────────────│                  │
//!                 └───────────────┘    snapshot    └──────────────────┘
//! ```
//!
//! The pieces are wired together by [`runner::UsageMonitor`], which also
//! enforces per-account serialization and bounded concurrency.

pub mod broker;
pub mod buckets;
pub mod delta;
pub mod error;
pub mod quota;
pub mod report;
pub mod runner;
pub mod session;
pub mod store;

pub use broker::{Authenticator, BrokerOutcome, ReportFetcher, SessionBroker};
pub use buckets::{determine_bucket_key, Bucket, BucketKey, BucketSet};
pub use delta::{compute_diff, DiffSet, UsageDelta};
pub use error::MonitorError;
pub use quota::QuotaClient;
pub use report::{normalize, Package, RawReport};
pub use runner::{LogDispatcher, NotificationDispatcher, UsageMonitor, DEFAULT_WORKER_LIMIT};
pub use session::SessionClient;
pub use store::{Snapshot, SnapshotStore, RETENTION_DAYS};
