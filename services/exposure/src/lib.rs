//! Lumen Exposure Tracking Service
//!
//! Backend for the KOL video wall on the Lumen holiday campaign landing
//! page. The page rotates creator videos and wants under-shown videos to
//! surface first, so this service keeps a per-video exposure counter in a
//! remote key-value store and serves it sorted ascending.
//!
//! ## Features
//!
//! - **Least-Exposed-First Reads**: the full counter map sorted ascending
//!   by count, with a deterministic catalog-order tie-break
//! - **Batch Exposure Recording**: player beacons report shown videos in
//!   batches; each occurrence increments its counter by one
//! - **Never-Fail Degradation**: a missing key, missing credentials, or an
//!   unreachable store all degrade to zeroed counts and dropped batches,
//!   never to an error the landing page can see
//!
//! ## Architecture
//!
//! ```text
//! Landing Page                 Exposure Service              KV REST API
//! ┌──────────────┐            ┌────────────────┐           ┌──────────────┐
//! │ Rotation     │─── GET ───▶│ api            │           │ single key:  │
//! │ Component    │            │   │            │── read ──▶│ full counter │
//! └──────────────┘            │   ▼            │           │ map (JSON)   │
//! ┌──────────────┐            │ ExposureTracker│◀─ write ──│              │
//! │ Player       │─── POST ──▶│   │            │           └──────────────┘
//! │ Beacon       │            │   ▼            │
//! └──────────────┘            │ CounterStore   │
//!                             └────────────────┘
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod exposure;
pub mod store;

pub use api::{create_router, start_api_server, AppState};
pub use catalog::{catalog_ids, catalog_rank, zeroed_counts, VideoEntry, VIDEO_CATALOG};
pub use config::Config;
pub use exposure::{ExposureTracker, VideoExposure};
pub use store::{CounterStore, KvCounterStore, MemoryCounterStore, StoreError};
