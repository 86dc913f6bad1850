//! Domain model (IDs, devices, artifacts, errors).

pub mod artifact;
pub mod device;
pub mod errors;
pub mod ids;

pub use artifact::{ArtifactId, BackupArtifact, BackupKind, backup_basename, parse_backup_filename};
pub use device::{Credentials, Device};
pub use errors::BackupError;
pub use ids::DeviceId;
