use log::info;

use super::renamer::{ExistingNames, RenamePolicy, to_developer_name};
use super::selector::Selector;
use crate::api::OrgApi;
use crate::error::{CopierError, CopierResult};
use crate::metadata::{FolderRef, ItemKind};

/// Finds target folders by label, creating public ones when missing
pub struct FolderProvisioner<'a> {
    api: &'a dyn OrgApi,
    policy: RenamePolicy,
}

impl<'a> FolderProvisioner<'a> {
    pub fn new(api: &'a dyn OrgApi, policy: RenamePolicy) -> Self {
        Self { api, policy }
    }

    pub async fn ensure_folder(&self, kind: ItemKind, label: &str) -> CopierResult<FolderRef> {
        let label = label.trim();
        if label.is_empty() {
            return Err(CopierError::Config(format!(
                "{} folder name must not be empty",
                kind
            )));
        }

        info!("Ensuring {} folder exists: '{}'", kind, label);
        let selector = Selector::new(self.api);
        if let Some(folder) = selector.find_folder_by_name(kind, label).await? {
            info!(
                "Found existing {} folder '{}' ({})",
                kind, folder.name, folder.developer_name
            );
            return Ok(folder);
        }

        let existing: ExistingNames = selector.folder_developer_names(kind).await?.into_iter().collect();
        let developer_name = self
            .policy
            .dedupe_developer_name(&to_developer_name(label), &existing)?;

        info!(
            "Creating {} folder '{}' with DeveloperName '{}'",
            kind, label, developer_name
        );
        let id = self.api.create_folder(label, &developer_name, kind).await?;

        Ok(FolderRef {
            id,
            name: label.to_string(),
            developer_name,
            kind,
        })
    }
}
