//! Domain model for copyable analytics metadata
//!
//! Reports and dashboards live in folders and are addressed by the Metadata API
//! through folder-qualified full names (`Folder/DeveloperName`).

pub mod body;
pub mod package;

pub use body::{DashboardBody, MetadataBody, ReportBody};
pub use package::{DeployPackage, PackageManifest};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two kinds of component this tool copies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Report,
    Dashboard,
}

impl ItemKind {
    /// Metadata API type name, also the `Folder.Type` value and the SOQL object name
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Report => "Report",
            ItemKind::Dashboard => "Dashboard",
        }
    }

    /// Top-level directory inside a retrieve/deploy zip
    pub fn directory(&self) -> &'static str {
        match self {
            ItemKind::Report => "reports",
            ItemKind::Dashboard => "dashboards",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ItemKind::Report => "report",
            ItemKind::Dashboard => "dashboard",
        }
    }

    /// Maximum length of the display label (Report.Name / Dashboard.Title)
    pub fn label_max_len(&self) -> usize {
        match self {
            ItemKind::Report => 40,
            ItemKind::Dashboard => 80,
        }
    }

    /// Zip path of a component, e.g. `reports/Sales/Q1_Sales.report`
    pub fn file_path(&self, full_name: &str) -> String {
        format!("{}/{}.{}", self.directory(), full_name, self.extension())
    }

    /// Inverse of [`ItemKind::file_path`]: recovers kind and full name from a zip entry
    pub fn parse_file_path(path: &str) -> Option<(ItemKind, String)> {
        let (dir, rest) = path.split_once('/')?;
        let kind = match dir {
            "reports" => ItemKind::Report,
            "dashboards" => ItemKind::Dashboard,
            _ => return None,
        };
        let full_name = rest.strip_suffix(&format!(".{}", kind.extension()))?;
        if !full_name.contains('/') {
            return None;
        }
        Some((kind, full_name.to_string()))
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "report" | "reports" => Ok(ItemKind::Report),
            "dashboard" | "dashboards" => Ok(ItemKind::Dashboard),
            other => Err(format!("Unknown item kind: {}", other)),
        }
    }
}

/// A retrievable report or dashboard, as listed from the org
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub api_name: String,
    pub folder_id: String,
    pub kind: ItemKind,
}

/// A report or dashboard folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRef {
    pub id: String,
    pub name: String,
    pub developer_name: String,
    pub kind: ItemKind,
}

impl FolderRef {
    /// Full name of a component placed in this folder
    pub fn member(&self, api_name: &str) -> String {
        format!("{}/{}", self.developer_name, api_name)
    }
}

/// Split `Folder/Name` into its two halves
pub fn split_full_name(full_name: &str) -> Option<(&str, &str)> {
    let (folder, name) = full_name.rsplit_once('/')?;
    if folder.is_empty() || name.is_empty() {
        return None;
    }
    Some((folder, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_paths() {
        assert_eq!(
            ItemKind::Report.file_path("Sales/Q1_Sales"),
            "reports/Sales/Q1_Sales.report"
        );
        assert_eq!(
            ItemKind::Dashboard.file_path("Exec/Overview"),
            "dashboards/Exec/Overview.dashboard"
        );
    }

    #[test]
    fn test_parse_file_path() {
        assert_eq!(
            ItemKind::parse_file_path("reports/Sales/Q1_Sales.report"),
            Some((ItemKind::Report, "Sales/Q1_Sales".to_string()))
        );
        assert_eq!(
            ItemKind::parse_file_path("dashboards/Exec/Overview.dashboard"),
            Some((ItemKind::Dashboard, "Exec/Overview".to_string()))
        );
        assert_eq!(ItemKind::parse_file_path("package.xml"), None);
        assert_eq!(ItemKind::parse_file_path("reports/Sales.report"), None);
        assert_eq!(ItemKind::parse_file_path("reports/Sales/Q1.dashboard"), None);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("report".parse::<ItemKind>(), Ok(ItemKind::Report));
        assert_eq!("Dashboards".parse::<ItemKind>(), Ok(ItemKind::Dashboard));
        assert!("folder".parse::<ItemKind>().is_err());
    }

    #[test]
    fn test_split_full_name() {
        assert_eq!(split_full_name("Sales/Q1"), Some(("Sales", "Q1")));
        assert_eq!(split_full_name("Q1"), None);
        assert_eq!(split_full_name("/Q1"), None);
    }
}
