//! Service layer: release fetching and update orchestration.
//!
//! [`ReleaseFetchController`] decides when release lists are refreshed and
//! talks to the [`ReleaseApi`]. [`UpdateService`] combines the cache, the
//! telemetry store and [`crate::domain::UpdateAdvisor`] for API consumers.

pub mod fetch_controller;
pub mod release_api;
pub mod update_service;

pub use fetch_controller::{
    FetchControllerConfig, FetchOutcome, RefreshPolicy, ReleaseFetchController, SkipReason,
};
pub use release_api::{GithubReleaseApi, ReleaseApi};
pub use update_service::{
    FirmwareSelection, ListedRelease, ReleaseListing, UpdateService, UpdateServiceConfig,
};
