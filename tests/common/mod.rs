//! In-memory org used by the integration tests
#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use sf_copier::api::{OrgApi, RetrievedFiles};
use sf_copier::api::metadata::{ComponentFailure, ComponentSuccess, DeployResult, DeployState};
use sf_copier::error::{CopierError, CopierResult};
use sf_copier::metadata::{FolderRef, ItemKind, PackageManifest};

pub const JOB_ID: &str = "0Af000000000001AAA";

#[derive(Debug, Clone)]
pub struct FakeItem {
    pub id: String,
    pub kind: ItemKind,
    pub label: String,
    pub api_name: String,
    pub folder_id: String,
}

#[derive(Default)]
pub struct FakeOrg {
    pub folders: Mutex<Vec<FolderRef>>,
    pub items: Vec<FakeItem>,
    /// Retrievable bodies keyed by zip path
    pub bodies: BTreeMap<String, String>,
    pub deploy_statuses: Mutex<VecDeque<DeployResult>>,
    pub deployed: Mutex<Vec<(Vec<u8>, bool)>>,
    pub created_folders: Mutex<Vec<(String, String, ItemKind)>>,
    pub retrieves: Mutex<Vec<PackageManifest>>,
    pub queries: Mutex<Vec<String>>,
    pub fail_queries: bool,
}

impl FakeOrg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(self, id: &str, name: &str, developer_name: &str, kind: ItemKind) -> Self {
        self.folders.lock().unwrap().push(FolderRef {
            id: id.to_string(),
            name: name.to_string(),
            developer_name: developer_name.to_string(),
            kind,
        });
        self
    }

    /// Register a report that is listed in `folder_id` and retrievable
    pub fn with_report(mut self, id: &str, folder_id: &str, api_name: &str, label: &str) -> Self {
        let folder = self.folder(folder_id);
        let full_name = folder.member(api_name);
        self.bodies
            .insert(ItemKind::Report.file_path(&full_name), report_xml(label));
        self.items.push(FakeItem {
            id: id.to_string(),
            kind: ItemKind::Report,
            label: label.to_string(),
            api_name: api_name.to_string(),
            folder_id: folder_id.to_string(),
        });
        self
    }

    pub fn with_dashboard(
        mut self,
        id: &str,
        folder_id: &str,
        api_name: &str,
        title: &str,
        report_refs: &[&str],
    ) -> Self {
        let folder = self.folder(folder_id);
        let full_name = folder.member(api_name);
        self.bodies.insert(
            ItemKind::Dashboard.file_path(&full_name),
            dashboard_xml(title, report_refs),
        );
        self.items.push(FakeItem {
            id: id.to_string(),
            kind: ItemKind::Dashboard,
            label: title.to_string(),
            api_name: api_name.to_string(),
            folder_id: folder_id.to_string(),
        });
        self
    }

    /// Register a body without a catalog entry
    pub fn with_body(mut self, kind: ItemKind, full_name: &str, xml: &str) -> Self {
        self.bodies.insert(kind.file_path(full_name), xml.to_string());
        self
    }

    pub fn without_body(mut self, kind: ItemKind, full_name: &str) -> Self {
        self.bodies.remove(&kind.file_path(full_name));
        self
    }

    pub fn with_deploy_statuses(self, statuses: Vec<DeployResult>) -> Self {
        *self.deploy_statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn folder(&self, id: &str) -> FolderRef {
        self.folders
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .unwrap_or_else(|| panic!("unknown folder {}", id))
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    fn folder_rows(&self, soql: &str) -> Vec<Value> {
        let kind = quoted(soql, "Type").and_then(|t| t.parse::<ItemKind>().ok());
        let id = quoted(soql, "Id");
        let name = quoted(soql, "Name");

        self.folders
            .lock()
            .unwrap()
            .iter()
            .filter(|f| kind.map_or(true, |k| f.kind == k))
            .filter(|f| id.as_ref().map_or(true, |id| &f.id == id))
            .filter(|f| name.as_ref().map_or(true, |n| &f.name == n))
            .map(|f| json!({"Id": f.id, "Name": f.name, "DeveloperName": f.developer_name}))
            .collect()
    }

    fn item_rows(&self, soql: &str, kind: ItemKind) -> Vec<Value> {
        let folder_name = quoted(soql, "FolderName");
        let ids = in_list(soql);
        let folders = self.folders.lock().unwrap().clone();

        self.items
            .iter()
            .filter(|i| i.kind == kind)
            .filter(|i| {
                folder_name.as_ref().map_or(true, |name| {
                    folders.iter().any(|f| &f.id == &i.folder_id && &f.name == name)
                })
            })
            .filter(|i| ids.as_ref().map_or(true, |ids| ids.contains(&i.id)))
            .map(|i| match kind {
                ItemKind::Report => json!({
                    "Id": i.id, "Name": i.label, "DeveloperName": i.api_name, "OwnerId": i.folder_id
                }),
                ItemKind::Dashboard => json!({
                    "Id": i.id, "Title": i.label, "DeveloperName": i.api_name, "FolderId": i.folder_id
                }),
            })
            .collect()
    }
}

#[async_trait]
impl OrgApi for FakeOrg {
    fn api_version(&self) -> &str {
        "58.0"
    }

    async fn query(&self, soql: &str) -> CopierResult<Vec<Value>> {
        self.queries.lock().unwrap().push(soql.to_string());
        if self.fail_queries {
            return Err(CopierError::upstream("INVALID_SESSION_ID"));
        }
        let rows = if soql.contains("FROM Folder") {
            self.folder_rows(soql)
        } else if soql.contains("FROM Report") {
            self.item_rows(soql, ItemKind::Report)
        } else if soql.contains("FROM Dashboard") {
            self.item_rows(soql, ItemKind::Dashboard)
        } else {
            panic!("unexpected query: {}", soql);
        };
        Ok(rows)
    }

    async fn create_folder(
        &self,
        name: &str,
        developer_name: &str,
        kind: ItemKind,
    ) -> CopierResult<String> {
        let mut created = self.created_folders.lock().unwrap();
        created.push((name.to_string(), developer_name.to_string(), kind));
        let id = format!("00lNEW{:09}", created.len());
        self.folders.lock().unwrap().push(FolderRef {
            id: id.clone(),
            name: name.to_string(),
            developer_name: developer_name.to_string(),
            kind,
        });
        Ok(id)
    }

    async fn retrieve(&self, manifest: &PackageManifest) -> CopierResult<RetrievedFiles> {
        self.retrieves.lock().unwrap().push(manifest.clone());
        let mut retrieved = RetrievedFiles::default();
        for (type_name, members) in manifest.types() {
            let kind: ItemKind = type_name.parse().map_err(CopierError::Config)?;
            for member in members {
                let path = kind.file_path(member);
                match self.bodies.get(&path) {
                    Some(body) => {
                        retrieved.files.insert(path, body.clone());
                    }
                    None => retrieved.messages.push((
                        "unpackaged/package.xml".to_string(),
                        format!(
                            "Entity of type '{}' named '{}' cannot be found",
                            type_name, member
                        ),
                    )),
                }
            }
        }
        Ok(retrieved)
    }

    async fn deploy(&self, zip: &[u8], rollback_on_error: bool) -> CopierResult<String> {
        self.deployed
            .lock()
            .unwrap()
            .push((zip.to_vec(), rollback_on_error));
        Ok(JOB_ID.to_string())
    }

    async fn check_deploy_status(&self, job_id: &str) -> CopierResult<DeployResult> {
        let mut statuses = self.deploy_statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        status
            .map(|mut s| {
                s.job_id = job_id.to_string();
                s
            })
            .ok_or_else(|| CopierError::NotFound {
                what: "deploy job",
                key: job_id.to_string(),
            })
    }
}

pub fn report_xml(label: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Report xmlns="http://soap.sforce.com/2006/04/metadata">
    <columns>
        <field>AMOUNT</field>
    </columns>
    <format>Tabular</format>
    <name>{}</name>
    <reportType>Opportunity</reportType>
</Report>
"#,
        label
    )
}

pub fn dashboard_xml(title: &str, report_refs: &[&str]) -> String {
    let components: String = report_refs
        .iter()
        .map(|r| {
            format!(
                "        <components>\n            <componentType>Bar</componentType>\n            <report>{}</report>\n        </components>\n",
                r
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Dashboard xmlns="http://soap.sforce.com/2006/04/metadata">
    <dashboardType>SpecifiedUser</dashboardType>
    <leftSection>
{}    </leftSection>
    <title>{}</title>
</Dashboard>
"#,
        components, title
    )
}

pub fn deploy_status(state: DeployState) -> DeployResult {
    DeployResult {
        job_id: JOB_ID.to_string(),
        state,
        done: state.is_terminal(),
        success: state == DeployState::Succeeded,
        components_total: 0,
        components_deployed: 0,
        component_errors: 0,
        tests_total: 0,
        tests_completed: 0,
        test_errors: 0,
        successes: Vec::new(),
        failures: Vec::new(),
        test_failures: Vec::new(),
        error_message: None,
        state_detail: None,
        created_at: None,
        completed_at: None,
    }
}

pub fn success(component_type: &str, full_name: &str) -> ComponentSuccess {
    ComponentSuccess {
        component_type: component_type.to_string(),
        full_name: full_name.to_string(),
        file_name: String::new(),
    }
}

pub fn failure(component_type: &str, full_name: &str, problem: &str) -> ComponentFailure {
    ComponentFailure {
        component_type: component_type.to_string(),
        full_name: full_name.to_string(),
        file_name: String::new(),
        problem_type: "Error".to_string(),
        problem: problem.to_string(),
    }
}

/// Value of `field = '...'` in a SOQL string, unescaped
fn quoted(soql: &str, field: &str) -> Option<String> {
    let marker = format!(" {} = '", field);
    let start = soql.find(&marker)? + marker.len();
    let mut value = String::new();
    let mut chars = soql[start..].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.push(chars.next()?),
            '\'' => return Some(value),
            _ => value.push(c),
        }
    }
    None
}

fn in_list(soql: &str) -> Option<Vec<String>> {
    let start = soql.find("Id IN (")? + "Id IN (".len();
    let end = soql[start..].find(')')? + start;
    Some(
        soql[start..end]
            .split(',')
            .map(|v| v.trim().trim_matches('\'').to_string())
            .collect(),
    )
}
