//! Typed view over retrieved `.report` / `.dashboard` XML
//!
//! Parsing goes through `roxmltree` so the builder can rely on the fields it
//! needs being present. Rewrites stream the original document through
//! `quick-xml` and only touch the text of the targeted elements, so every
//! other element of the body round-trips unchanged.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use quick_xml::events::{BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use roxmltree::Document;

use super::ItemKind;
use crate::error::{CopierError, CopierResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBody {
    xml: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardBody {
    xml: String,
    pub title: String,
    /// Folder-qualified names of every report the dashboard components use
    pub report_refs: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataBody {
    Report(ReportBody),
    Dashboard(DashboardBody),
}

impl MetadataBody {
    /// Parse a retrieved body and check it has the shape of the expected kind
    pub fn parse(expected: ItemKind, full_name: &str, xml: &str) -> CopierResult<Self> {
        let doc = Document::parse(xml)
            .map_err(|e| CopierError::unsupported(full_name, format!("invalid XML: {}", e)))?;
        let root = doc.root_element();
        let root_name = root.tag_name().name();

        if root_name != expected.type_name() {
            return Err(CopierError::unsupported(
                full_name,
                format!("expected a {} body, found <{}>", expected, root_name),
            ));
        }

        let child_text = |tag: &str| {
            root.children()
                .find(|n| n.is_element() && n.tag_name().name() == tag)
                .and_then(|n| n.text())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        };

        match expected {
            ItemKind::Report => {
                let label = child_text("name").ok_or_else(|| {
                    CopierError::unsupported(full_name, "report has no <name> element")
                })?;
                Ok(MetadataBody::Report(ReportBody {
                    xml: xml.to_string(),
                    label,
                }))
            }
            ItemKind::Dashboard => {
                let title = child_text("title").ok_or_else(|| {
                    CopierError::unsupported(full_name, "dashboard has no <title> element")
                })?;

                let mut report_refs = BTreeSet::new();
                for node in doc
                    .descendants()
                    .filter(|n| n.is_element() && n.tag_name().name() == "report")
                {
                    let value = node.text().map(str::trim).unwrap_or_default();
                    if !value.contains('/') {
                        return Err(CopierError::unsupported(
                            full_name,
                            format!("dashboard component references '{}' without a folder", value),
                        ));
                    }
                    report_refs.insert(value.to_string());
                }

                debug!(
                    "Dashboard '{}' references {} report(s)",
                    full_name,
                    report_refs.len()
                );
                Ok(MetadataBody::Dashboard(DashboardBody {
                    xml: xml.to_string(),
                    title,
                    report_refs,
                }))
            }
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            MetadataBody::Report(_) => ItemKind::Report,
            MetadataBody::Dashboard(_) => ItemKind::Dashboard,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MetadataBody::Report(r) => &r.label,
            MetadataBody::Dashboard(d) => &d.title,
        }
    }
}

impl ReportBody {
    /// Body with its `<name>` replaced by `label`
    pub fn relabel(&self, label: &str) -> CopierResult<String> {
        rewrite_text(&self.xml, "report body", |path, _| {
            (path == ["Report", "name"]).then(|| label.to_string())
        })
    }
}

impl DashboardBody {
    /// Body with a new `<title>` and every `<report>` reference remapped.
    ///
    /// Every reference must be present in `report_renames`; a dashboard that
    /// would keep pointing at the source reports is rejected.
    pub fn rewrite(
        &self,
        title: &str,
        report_renames: &HashMap<String, String>,
    ) -> CopierResult<String> {
        if let Some(missing) = self
            .report_refs
            .iter()
            .find(|r| !report_renames.contains_key(*r))
        {
            return Err(CopierError::unsupported(
                missing.clone(),
                "dashboard reference has no copied report",
            ));
        }

        rewrite_text(&self.xml, "dashboard body", |path, text| {
            if path == ["Dashboard", "title"] {
                return Some(title.to_string());
            }
            if path.last().map(String::as_str) == Some("report") {
                return report_renames.get(text.trim()).cloned();
            }
            None
        })
    }
}

/// Stream `xml` through, replacing the text of elements for which `replace`
/// returns a value. `replace` receives the local-name path from the root.
fn rewrite_text<F>(xml: &str, context: &str, mut replace: F) -> CopierResult<String>
where
    F: FnMut(&[String], &str) -> Option<String>,
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut path: Vec<String> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| CopierError::xml(context, e))?;

        match event {
            Event::Eof => break,
            Event::Start(start) => {
                path.push(String::from_utf8_lossy(start.local_name().as_ref()).into_owned());
                writer
                    .write_event(Event::Start(start))
                    .map_err(|e| CopierError::xml(context, e))?;
            }
            Event::End(end) => {
                path.pop();
                writer
                    .write_event(Event::End(end))
                    .map_err(|e| CopierError::xml(context, e))?;
            }
            Event::Text(text) => {
                let replacement = {
                    let unescaped = text.unescape().map_err(|e| CopierError::xml(context, e))?;
                    replace(&path, &unescaped)
                };
                let event = match replacement {
                    Some(new_text) => Event::Text(BytesText::new(&new_text).into_owned()),
                    None => Event::Text(text),
                };
                writer
                    .write_event(event)
                    .map_err(|e| CopierError::xml(context, e))?;
            }
            other => writer
                .write_event(other)
                .map_err(|e| CopierError::xml(context, e))?,
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| CopierError::xml(context, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Report xmlns="http://soap.sforce.com/2006/04/metadata">
    <columns>
        <field>AMOUNT</field>
    </columns>
    <format>Tabular</format>
    <name>Q1 Sales</name>
    <params>
        <name>co</name>
        <value>1</value>
    </params>
    <reportType>Opportunity</reportType>
</Report>
"#;

    const DASHBOARD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Dashboard xmlns="http://soap.sforce.com/2006/04/metadata">
    <leftSection>
        <components>
            <componentType>Bar</componentType>
            <report>Sales/Q1_Sales</report>
        </components>
        <components>
            <componentType>Table</componentType>
            <report>Marketing/Leads &amp; Campaigns</report>
        </components>
    </leftSection>
    <title>Exec Overview</title>
</Dashboard>
"#;

    #[test]
    fn test_parse_report() {
        let body = MetadataBody::parse(ItemKind::Report, "Sales/Q1_Sales", REPORT).unwrap();
        assert_eq!(body.kind(), ItemKind::Report);
        assert_eq!(body.label(), "Q1 Sales");
    }

    #[test]
    fn test_relabel_only_touches_top_level_name() {
        let MetadataBody::Report(body) =
            MetadataBody::parse(ItemKind::Report, "Sales/Q1_Sales", REPORT).unwrap()
        else {
            panic!("expected report");
        };
        let rewritten = body.relabel("Q1 Sales Copy").unwrap();
        assert!(rewritten.contains("<name>Q1 Sales Copy</name>"));
        assert!(rewritten.contains("<name>co</name>"));
        assert!(rewritten.contains("<field>AMOUNT</field>"));
        assert!(rewritten.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    }

    #[test]
    fn test_parse_dashboard_refs() {
        let body = MetadataBody::parse(ItemKind::Dashboard, "Exec/Overview", DASHBOARD).unwrap();
        let MetadataBody::Dashboard(dash) = body else {
            panic!("expected dashboard");
        };
        assert_eq!(dash.title, "Exec Overview");
        let refs: Vec<_> = dash.report_refs.iter().cloned().collect();
        assert_eq!(refs, vec!["Marketing/Leads & Campaigns", "Sales/Q1_Sales"]);
    }

    #[test]
    fn test_dashboard_rewrite_remaps_every_reference() {
        let MetadataBody::Dashboard(dash) =
            MetadataBody::parse(ItemKind::Dashboard, "Exec/Overview", DASHBOARD).unwrap()
        else {
            panic!("expected dashboard");
        };
        let renames = HashMap::from([
            ("Sales/Q1_Sales".to_string(), "Archive/Q1_Sales_Copy".to_string()),
            (
                "Marketing/Leads & Campaigns".to_string(),
                "Archive/Leads_Copy".to_string(),
            ),
        ]);
        let rewritten = dash.rewrite("Exec Overview Copy", &renames).unwrap();
        assert!(rewritten.contains("<report>Archive/Q1_Sales_Copy</report>"));
        assert!(rewritten.contains("<report>Archive/Leads_Copy</report>"));
        assert!(rewritten.contains("<title>Exec Overview Copy</title>"));
        assert!(!rewritten.contains("Sales/Q1_Sales<"));
    }

    #[test]
    fn test_dashboard_rewrite_rejects_dangling_reference() {
        let MetadataBody::Dashboard(dash) =
            MetadataBody::parse(ItemKind::Dashboard, "Exec/Overview", DASHBOARD).unwrap()
        else {
            panic!("expected dashboard");
        };
        let renames = HashMap::from([(
            "Sales/Q1_Sales".to_string(),
            "Archive/Q1_Sales_Copy".to_string(),
        )]);
        let err = dash.rewrite("Copy", &renames).unwrap_err();
        assert!(matches!(err, CopierError::UnsupportedComponent { .. }));
    }

    #[test]
    fn test_wrong_root_is_unsupported() {
        let err = MetadataBody::parse(ItemKind::Dashboard, "Sales/Q1_Sales", REPORT).unwrap_err();
        assert!(matches!(err, CopierError::UnsupportedComponent { .. }));
    }

    #[test]
    fn test_report_without_name_is_unsupported() {
        let xml = r#"<Report xmlns="http://soap.sforce.com/2006/04/metadata"><format>Tabular</format></Report>"#;
        let err = MetadataBody::parse(ItemKind::Report, "Sales/X", xml).unwrap_err();
        assert!(matches!(err, CopierError::UnsupportedComponent { .. }));
    }

    #[test]
    fn test_unqualified_report_reference_is_unsupported() {
        let xml = r#"<Dashboard xmlns="http://soap.sforce.com/2006/04/metadata">
            <leftSection><components><report>Orphan</report></components></leftSection>
            <title>T</title></Dashboard>"#;
        let err = MetadataBody::parse(ItemKind::Dashboard, "Exec/T", xml).unwrap_err();
        assert!(matches!(err, CopierError::UnsupportedComponent { .. }));
    }
}
