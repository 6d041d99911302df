pub mod client;
pub mod normalize;

pub use client::{HttpSnapshotFetcher, RegistryClient, SnapshotFetcher, VerifyError};
pub use normalize::snapshot_from_response;
