//! Read-only listing of folders, reports and dashboards

use std::collections::HashMap;

use log::{debug, info};
use serde_json::Value;

use super::SourceItem;
use crate::api::OrgApi;
use crate::api::constants::SOQL_ID_CHUNK;
use crate::error::{CopierError, CopierResult};
use crate::metadata::{CatalogItem, FolderRef, ItemKind};

pub struct Selector<'a> {
    api: &'a dyn OrgApi,
}

impl<'a> Selector<'a> {
    pub fn new(api: &'a dyn OrgApi) -> Self {
        Self { api }
    }

    /// Folders of one kind, ordered by label. Rows without a usable label or
    /// DeveloperName are skipped.
    pub async fn list_folders(&self, kind: ItemKind) -> CopierResult<Vec<FolderRef>> {
        let soql = format!(
            "SELECT Id, Name, DeveloperName FROM Folder WHERE Type = '{}' ORDER BY Name",
            kind.type_name()
        );
        let rows = self.api.query(&soql).await?;
        let mut folders: Vec<FolderRef> = rows.iter().filter_map(|r| folder_from_row(r, kind)).collect();
        folders.sort_by_key(|f| f.name.to_lowercase());

        info!("Listed {} {} folder(s)", folders.len(), kind);
        Ok(folders)
    }

    pub async fn get_folder(&self, kind: ItemKind, folder_id: &str) -> CopierResult<FolderRef> {
        let soql = format!(
            "SELECT Id, Name, DeveloperName FROM Folder WHERE Type = '{}' AND Id = '{}'",
            kind.type_name(),
            escape_soql(folder_id)
        );
        let rows = self.api.query(&soql).await?;
        let folder = rows
            .iter()
            .find_map(|r| folder_from_row(r, kind))
            .ok_or_else(|| CopierError::NotFound {
                what: "folder",
                key: folder_id.to_string(),
            })?;

        debug!(
            "Resolved folder {} to '{}' ({})",
            folder_id, folder.name, folder.developer_name
        );
        Ok(folder)
    }

    /// Folder of `kind` whose label is exactly `name`, if any
    pub async fn find_folder_by_name(
        &self,
        kind: ItemKind,
        name: &str,
    ) -> CopierResult<Option<FolderRef>> {
        let soql = format!(
            "SELECT Id, Name, DeveloperName FROM Folder WHERE Type = '{}' AND Name = '{}'",
            kind.type_name(),
            escape_soql(name)
        );
        let rows = self.api.query(&soql).await?;
        Ok(rows.iter().find_map(|r| folder_from_row(r, kind)))
    }

    /// DeveloperNames of every folder of `kind`, including unlisted ones
    pub async fn folder_developer_names(&self, kind: ItemKind) -> CopierResult<Vec<String>> {
        let soql = format!(
            "SELECT DeveloperName FROM Folder WHERE Type = '{}'",
            kind.type_name()
        );
        let rows = self.api.query(&soql).await?;
        Ok(rows
            .iter()
            .filter_map(|r| text(r, "DeveloperName"))
            .map(str::to_string)
            .collect())
    }

    /// Every report or dashboard the user can see, ordered by label
    pub async fn list_copyable_items(&self, kind: ItemKind) -> CopierResult<Vec<CatalogItem>> {
        let soql = format!(
            "SELECT Id, {label}, DeveloperName, {folder} FROM {object} ORDER BY {label}",
            label = label_field(kind),
            folder = folder_field(kind),
            object = kind.type_name(),
        );
        let rows = self.api.query(&soql).await?;
        let items: Vec<CatalogItem> = rows
            .iter()
            .filter_map(|r| {
                let folder_id = text(r, folder_field(kind)).unwrap_or_default();
                item_from_row(r, kind, folder_id)
            })
            .collect();

        info!("Listed {} copyable {}(s)", items.len(), kind);
        Ok(items)
    }

    /// Items stored directly in `folder`
    pub async fn list_items_in_folder(
        &self,
        kind: ItemKind,
        folder: &FolderRef,
    ) -> CopierResult<Vec<CatalogItem>> {
        let label_field = label_field(kind);
        let soql = format!(
            "SELECT Id, {label}, DeveloperName FROM {object} WHERE FolderName = '{folder}' ORDER BY {label}",
            label = label_field,
            object = kind.type_name(),
            folder = escape_soql(&folder.name),
        );
        let rows = self.api.query(&soql).await?;
        let items: Vec<CatalogItem> = rows
            .iter()
            .filter_map(|r| item_from_row(r, kind, &folder.id))
            .collect();

        info!(
            "Listed {} {}(s) in folder '{}'",
            items.len(),
            kind,
            folder.name
        );
        Ok(items)
    }

    /// Map item ids to DeveloperNames, querying at most [`SOQL_ID_CHUNK`] ids at a time.
    /// Ids that do not resolve are absent from the result.
    pub async fn resolve_developer_names(
        &self,
        kind: ItemKind,
        ids: &[String],
    ) -> CopierResult<HashMap<String, String>> {
        Ok(self
            .resolve_items(kind, ids)
            .await?
            .into_iter()
            .map(|(id, item)| (id, item.api_name))
            .collect())
    }

    pub async fn resolve_report_developer_names(
        &self,
        ids: &[String],
    ) -> CopierResult<HashMap<String, String>> {
        self.resolve_developer_names(ItemKind::Report, ids).await
    }

    /// Catalog rows for `ids`, keyed by the id as requested
    async fn resolve_items(
        &self,
        kind: ItemKind,
        ids: &[String],
    ) -> CopierResult<HashMap<String, CatalogItem>> {
        let ids: Vec<&str> = ids.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
        let mut resolved = HashMap::new();

        for chunk in ids.chunks(SOQL_ID_CHUNK) {
            let in_clause = chunk
                .iter()
                .map(|id| format!("'{}'", escape_soql(id)))
                .collect::<Vec<_>>()
                .join(",");
            let soql = format!(
                "SELECT Id, DeveloperName, {} FROM {} WHERE Id IN ({})",
                folder_field(kind),
                kind.type_name(),
                in_clause
            );
            for row in self.api.query(&soql).await? {
                let folder_id = text(&row, folder_field(kind)).unwrap_or_default();
                let Some(item) = item_from_row(&row, kind, folder_id) else {
                    continue;
                };
                // Ids may be requested in 15-character form and come back in 18
                if let Some(requested) = chunk.iter().find(|id| same_id(id, &item.id)) {
                    resolved.insert(requested.to_string(), item);
                }
            }
        }

        info!(
            "Resolved DeveloperName for {}/{} {}(s)",
            resolved.len(),
            ids.len(),
            kind
        );
        Ok(resolved)
    }

    /// Source items for selected ids in `folder`. Every id must resolve to
    /// an item stored in that folder.
    pub async fn selected_items(
        &self,
        kind: ItemKind,
        folder: &FolderRef,
        ids: &[String],
    ) -> CopierResult<Vec<SourceItem>> {
        let resolved = self.resolve_items(kind, ids).await?;
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let catalog = resolved
                .get(id.trim())
                .filter(|item| same_id(&item.folder_id, &folder.id))
                .ok_or_else(|| CopierError::NotFound {
                    what: kind.type_name(),
                    key: format!("{} in folder '{}'", id.trim(), folder.name),
                })?;
            let item = SourceItem::new(kind, folder.member(&catalog.api_name));
            if !items.contains(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Source items for everything of `kind` in `folder`
    pub async fn folder_contents(
        &self,
        kind: ItemKind,
        folder: &FolderRef,
    ) -> CopierResult<Vec<SourceItem>> {
        let items = self.list_items_in_folder(kind, folder).await?;
        let mut sources: Vec<SourceItem> = items
            .iter()
            .map(|item| SourceItem::new(kind, folder.member(&item.api_name)))
            .collect();
        sources.dedup();
        Ok(sources)
    }
}

/// Escape a value for use inside a single-quoted SOQL string literal
pub fn escape_soql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Salesforce ids compare on their case-sensitive 15-character prefix
fn same_id(a: &str, b: &str) -> bool {
    match (a.get(..15), b.get(..15)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Column holding the containing folder id. `Report.OwnerId` is the folder
/// for reports stored in folders.
fn folder_field(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Report => "OwnerId",
        ItemKind::Dashboard => "FolderId",
    }
}

fn label_field(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Report => "Name",
        ItemKind::Dashboard => "Title",
    }
}

fn text<'v>(row: &'v Value, field: &str) -> Option<&'v str> {
    row.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn folder_from_row(row: &Value, kind: ItemKind) -> Option<FolderRef> {
    let name = text(row, "Name").filter(|n| *n != "(null)")?;
    Some(FolderRef {
        id: text(row, "Id")?.to_string(),
        name: name.to_string(),
        developer_name: text(row, "DeveloperName")?.to_string(),
        kind,
    })
}

fn item_from_row(row: &Value, kind: ItemKind, folder_id: &str) -> Option<CatalogItem> {
    let api_name = text(row, "DeveloperName")?;
    let name = text(row, label_field(kind)).unwrap_or(api_name);
    Some(CatalogItem {
        id: text(row, "Id")?.to_string(),
        name: name.to_string(),
        api_name: api_name.to_string(),
        folder_id: folder_id.to_string(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_soql() {
        assert_eq!(escape_soql("O'Brien's"), "O\\'Brien\\'s");
        assert_eq!(escape_soql("a\\b"), "a\\\\b");
        assert_eq!(escape_soql("Plain"), "Plain");
    }

    #[test]
    fn test_folder_rows_are_filtered() {
        let good = json!({"Id": "00l1", "Name": "Sales", "DeveloperName": "Sales"});
        let null_label = json!({"Id": "00l2", "Name": "(null)", "DeveloperName": "X"});
        let blank_label = json!({"Id": "00l3", "Name": "  ", "DeveloperName": "Y"});
        let no_dev = json!({"Id": "00l4", "Name": "Private", "DeveloperName": null});

        assert!(folder_from_row(&good, ItemKind::Report).is_some());
        assert!(folder_from_row(&null_label, ItemKind::Report).is_none());
        assert!(folder_from_row(&blank_label, ItemKind::Report).is_none());
        assert!(folder_from_row(&no_dev, ItemKind::Report).is_none());
    }

    #[test]
    fn test_same_id_ignores_checksum_suffix() {
        assert!(same_id("00l000000000001", "00l000000000001AAA"));
        assert!(same_id("00l000000000001AAA", "00l000000000001AAA"));
        assert!(!same_id("00l000000000001", "00L000000000001"));
        assert!(!same_id("", "00l000000000001"));
    }

    #[test]
    fn test_dashboard_label_falls_back_to_developer_name() {
        let row = json!({"Id": "01Z1", "DeveloperName": "Exec_Overview"});
        let item = item_from_row(&row, ItemKind::Dashboard, "00l9").unwrap();
        assert_eq!(item.name, "Exec_Overview");
        assert_eq!(item.folder_id, "00l9");
    }
}
