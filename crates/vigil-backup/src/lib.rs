//! Backup creation, verification, cataloguing and retention for the
//! Vigil platform.
//!
//! This crate provides:
//! - the Backup Coordinator producing timestamped, checksummed backup sets
//! - integrity verification (digests + shallow smoke tests)
//! - the on-disk backup catalog and its manifests
//! - retention pruning with in-flight-deployment protection
//! - optional cold-archive upload

pub mod archive;
pub mod catalog;
pub mod coordinator;
pub mod manifest;
pub mod retention;
pub mod verifier;

pub use archive::{ColdArchive, HttpColdArchive};
pub use catalog::BackupCatalog;
pub use coordinator::{BackupCoordinator, BackupOptions, BackupOutcome};
pub use manifest::{BackupManifest, MANIFEST_FILE};
pub use retention::{PruneReport, RetentionPolicy};
pub use verifier::{IntegrityVerifier, VerificationReport};
