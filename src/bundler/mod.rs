pub mod archive;
pub mod eligibility;
pub mod engine;
pub mod manifest;
pub mod naming;
pub mod quarantine;
pub mod selection;

pub use eligibility::{ArchivableFile, EligibilityScan, Ineligibility, IneligibleFile};
pub use engine::{bundle, has_enough_data, run_continual, run_once, BundleLayout, BundleOptions, BundleReport};
pub use manifest::{BundleManifest, ManifestEntry};
pub use quarantine::{scan_and_quarantine, QuarantineReport};
pub use selection::select_oldest;
