//! Copying reports and dashboards into new folders
//!
//! A copy runs in one direction: the [`selector`] resolves what to copy, the
//! [`folders`] provisioner resolves where to, the [`builder`] retrieves and
//! rewrites everything into a [`DeployPackage`](crate::metadata::DeployPackage),
//! and the [`deploy`] orchestrator ships it and waits for the result.

pub mod builder;
pub mod deploy;
pub mod folders;
pub mod renamer;
pub mod selector;

pub use builder::{BuildOutcome, BuildWarning, PackageBuilder, RenamedItem};
pub use deploy::DeployOrchestrator;
pub use folders::FolderProvisioner;
pub use renamer::{ExistingNames, NewName, RenamePolicy};
pub use selector::Selector;

use crate::metadata::{FolderRef, ItemKind};

/// A component in the source org, addressed by its folder-qualified full name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceItem {
    pub kind: ItemKind,
    pub full_name: String,
}

impl SourceItem {
    pub fn new(kind: ItemKind, full_name: impl Into<String>) -> Self {
        Self {
            kind,
            full_name: full_name.into(),
        }
    }
}

/// Where copies land. Reports copied for a dashboard go to `reports` too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTargets {
    pub reports: FolderRef,
    pub dashboards: Option<FolderRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub items: Vec<SourceItem>,
    pub targets: CopyTargets,
}

impl CopyRequest {
    pub fn new(items: Vec<SourceItem>, targets: CopyTargets) -> Self {
        Self { items, targets }
    }
}
