//! Deploy package assembly: `package.xml` manifest plus component files

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Write};

use log::debug;
use roxmltree::Document;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use super::ItemKind;
use crate::api::constants::METADATA_NS;
use crate::api::soap::escape_xml;
use crate::error::{CopierError, CopierResult};

pub const MANIFEST_PATH: &str = "package.xml";

/// The `package.xml` descriptor: type name -> member full names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    version: String,
    types: BTreeMap<String, BTreeSet<String>>,
}

impl PackageManifest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            types: BTreeMap::new(),
        }
    }

    pub fn add_member(&mut self, type_name: &str, member: impl Into<String>) {
        self.types
            .entry(type_name.to_string())
            .or_default()
            .insert(member.into());
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn members(&self, type_name: &str) -> Vec<&str> {
        self.types
            .get(type_name)
            .map(|m| m.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn types(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.types.iter().map(|(t, m)| (t.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.types.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the manifest. Types and members are emitted in sorted order so
    /// the same package always produces byte-identical XML.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!("<Package xmlns=\"{}\">\n", METADATA_NS));
        for (type_name, members) in &self.types {
            if members.is_empty() {
                continue;
            }
            xml.push_str("    <types>\n");
            for member in members {
                xml.push_str(&format!("        <members>{}</members>\n", escape_xml(member)));
            }
            xml.push_str(&format!("        <name>{}</name>\n", escape_xml(type_name)));
            xml.push_str("    </types>\n");
        }
        xml.push_str(&format!("    <version>{}</version>\n", escape_xml(&self.version)));
        xml.push_str("</Package>\n");
        xml
    }

    pub fn from_xml(xml: &str) -> CopierResult<Self> {
        let doc = Document::parse(xml).map_err(|e| CopierError::xml(MANIFEST_PATH, e))?;
        let root = doc.root_element();
        if root.tag_name().name() != "Package" {
            return Err(CopierError::xml(MANIFEST_PATH, "root element is not <Package>"));
        }

        let version = root
            .children()
            .find(|n| n.tag_name().name() == "version")
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string())
            .ok_or_else(|| CopierError::xml(MANIFEST_PATH, "missing <version>"))?;

        let mut manifest = PackageManifest::new(version);
        for types in root.children().filter(|n| n.tag_name().name() == "types") {
            let name = types
                .children()
                .find(|n| n.tag_name().name() == "name")
                .and_then(|n| n.text())
                .map(str::trim)
                .ok_or_else(|| CopierError::xml(MANIFEST_PATH, "<types> without <name>"))?;
            for member in types
                .children()
                .filter(|n| n.tag_name().name() == "members")
                .filter_map(|n| n.text())
            {
                manifest.add_member(name, member.trim());
            }
        }
        Ok(manifest)
    }
}

/// A deployable bundle: rewritten component bodies and the manifest describing them.
///
/// Components can only be added through [`DeployPackage::add_component`], which
/// writes the file and its manifest entry together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPackage {
    manifest: PackageManifest,
    files: BTreeMap<String, String>,
}

impl DeployPackage {
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            manifest: PackageManifest::new(api_version),
            files: BTreeMap::new(),
        }
    }

    pub fn add_component(&mut self, kind: ItemKind, full_name: &str, body: String) {
        self.files.insert(kind.file_path(full_name), body);
        self.manifest.add_member(kind.type_name(), full_name);
    }

    pub fn contains(&self, kind: ItemKind, full_name: &str) -> bool {
        self.files.contains_key(&kind.file_path(full_name))
    }

    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    pub fn package_xml(&self) -> String {
        self.manifest.to_xml()
    }

    pub fn members(&self, kind: ItemKind) -> Vec<&str> {
        self.manifest.members(kind.type_name())
    }

    pub fn file(&self, kind: ItemKind, full_name: &str) -> Option<&str> {
        self.files.get(&kind.file_path(full_name)).map(String::as_str)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, b)| (p.as_str(), b.as_str()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serialize as a deflated zip laid out the way the Metadata API expects
    pub fn to_zip(&self) -> CopierResult<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        zip.start_file(MANIFEST_PATH, options)?;
        zip.write_all(self.package_xml().as_bytes())?;

        for (path, body) in &self.files {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(body.as_bytes())?;
        }

        let cursor = zip.finish()?;
        let bytes = cursor.into_inner();
        debug!(
            "Packed {} component(s) into {} byte zip",
            self.files.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Load a package previously written by [`DeployPackage::to_zip`]
    pub fn from_zip(bytes: &[u8]) -> CopierResult<Self> {
        let files = read_zip_entries(bytes)?;
        let manifest_xml = files
            .get(MANIFEST_PATH)
            .ok_or_else(|| CopierError::xml("package zip", "missing package.xml"))?;
        let manifest = PackageManifest::from_xml(manifest_xml)?;

        let mut package = DeployPackage::new(manifest.version());
        for (path, body) in &files {
            if let Some((kind, full_name)) = ItemKind::parse_file_path(path) {
                package.add_component(kind, &full_name, body.clone());
            }
        }

        if package.manifest != manifest {
            return Err(CopierError::xml(
                "package zip",
                "package.xml does not match the component files",
            ));
        }
        Ok(package)
    }
}

/// Read every file entry of a zip into memory as UTF-8 text
pub fn read_zip_entries(bytes: &[u8]) -> CopierResult<BTreeMap<String, String>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = BTreeMap::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        entries.insert(name, content);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package() -> DeployPackage {
        let mut package = DeployPackage::new("58.0");
        package.add_component(ItemKind::Report, "Archive/Q1_Sales_Copy", "<Report/>".to_string());
        package.add_component(ItemKind::Dashboard, "Exec/Overview_Copy", "<Dashboard/>".to_string());
        package
    }

    #[test]
    fn test_manifest_rendering() {
        let xml = sample_package().package_xml();
        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<Package xmlns="http://soap.sforce.com/2006/04/metadata">
    <types>
        <members>Exec/Overview_Copy</members>
        <name>Dashboard</name>
    </types>
    <types>
        <members>Archive/Q1_Sales_Copy</members>
        <name>Report</name>
    </types>
    <version>58.0</version>
</Package>
"#;
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_manifest_parses_back() {
        let package = sample_package();
        let parsed = PackageManifest::from_xml(&package.package_xml()).unwrap();
        assert_eq!(&parsed, package.manifest());
    }

    #[test]
    fn test_every_manifest_member_has_a_file() {
        let package = sample_package();
        for (type_name, members) in package.manifest().types() {
            let kind: ItemKind = type_name.parse().unwrap();
            for member in members {
                assert!(package.contains(kind, member), "{} has no file", member);
            }
        }
        assert_eq!(package.len(), package.manifest().len());
    }

    #[test]
    fn test_zip_layout_and_reload() {
        let package = sample_package();
        let bytes = package.to_zip().unwrap();

        let entries = read_zip_entries(&bytes).unwrap();
        let names: Vec<_> = entries.keys().cloned().collect();
        assert_eq!(
            names,
            vec![
                "dashboards/Exec/Overview_Copy.dashboard",
                "package.xml",
                "reports/Archive/Q1_Sales_Copy.report",
            ]
        );

        let reloaded = DeployPackage::from_zip(&bytes).unwrap();
        assert_eq!(reloaded, package);
    }

    #[test]
    fn test_members_are_escaped() {
        let mut manifest = PackageManifest::new("58.0");
        manifest.add_member("Report", "R&D/Plan");
        assert!(manifest.to_xml().contains("<members>R&amp;D/Plan</members>"));
    }
}
