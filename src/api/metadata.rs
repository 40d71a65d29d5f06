//! Metadata API request bodies and response models
//!
//! Covers the four asynchronous calls the copier uses: `retrieve`,
//! `checkRetrieveStatus`, `deploy` and `checkDeployStatus`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use roxmltree::Node;
use serde::Serialize;

use super::soap::{child_bool, child_text, child_u32, escape_xml, parse_response, result_node};
use crate::error::{CopierError, CopierResult};
use crate::metadata::{ItemKind, PackageManifest};

/// Lifecycle of a deploy job: `Queued -> InProgress -> {Succeeded | Failed | PartialFailure}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeployState {
    Queued,
    InProgress,
    Succeeded,
    Failed,
    PartialFailure,
}

impl DeployState {
    /// Map the Metadata API `DeployStatus` enumeration
    pub fn from_api(status: &str) -> Self {
        match status {
            "Pending" => DeployState::Queued,
            "InProgress" | "Canceling" => DeployState::InProgress,
            "Succeeded" => DeployState::Succeeded,
            "SucceededPartial" => DeployState::PartialFailure,
            "Failed" | "Canceled" => DeployState::Failed,
            _ => DeployState::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeployState::Succeeded | DeployState::Failed | DeployState::PartialFailure
        )
    }
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeployState::Queued => "Queued",
            DeployState::InProgress => "InProgress",
            DeployState::Succeeded => "Succeeded",
            DeployState::Failed => "Failed",
            DeployState::PartialFailure => "PartialFailure",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSuccess {
    pub component_type: String,
    pub full_name: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentFailure {
    pub component_type: String,
    pub full_name: String,
    pub file_name: String,
    pub problem_type: String,
    pub problem: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestFailure {
    pub class_name: String,
    pub method: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

/// Outcome of `checkDeployStatus`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployResult {
    pub job_id: String,
    pub state: DeployState,
    pub done: bool,
    pub success: bool,
    pub components_total: u32,
    pub components_deployed: u32,
    pub component_errors: u32,
    pub tests_total: u32,
    pub tests_completed: u32,
    pub test_errors: u32,
    pub successes: Vec<ComponentSuccess>,
    pub failures: Vec<ComponentFailure>,
    pub test_failures: Vec<TestFailure>,
    pub error_message: Option<String>,
    pub state_detail: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DeployResult {
    pub fn components_progress_percent(&self) -> u32 {
        percent(self.components_deployed + self.component_errors, self.components_total)
    }

    pub fn tests_progress_percent(&self) -> u32 {
        percent(self.tests_completed, self.tests_total)
    }

    /// The failure recorded for a given component, if any
    pub fn failure_for(&self, full_name: &str) -> Option<&ComponentFailure> {
        self.failures.iter().find(|f| f.full_name == full_name)
    }

    pub fn succeeded(&self, full_name: &str) -> bool {
        self.successes.iter().any(|s| s.full_name == full_name)
    }
}

fn percent(done: u32, total: u32) -> u32 {
    if total == 0 {
        0
    } else {
        (done.min(total) * 100) / total
    }
}

/// Outcome of `checkRetrieveStatus`
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveStatus {
    pub job_id: String,
    pub done: bool,
    pub status: String,
    pub zip_base64: Option<String>,
    /// `(fileName, problem)` pairs, e.g. for components that do not exist
    pub messages: Vec<(String, String)>,
    pub error_message: Option<String>,
}

impl RetrieveStatus {
    pub fn succeeded(&self) -> bool {
        self.done && self.status == "Succeeded"
    }
}

/// Contents of a finished retrieve: zip path to file text, plus the
/// `(fileName, problem)` messages for components that did not come back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedFiles {
    pub files: BTreeMap<String, String>,
    pub messages: Vec<(String, String)>,
}

impl RetrievedFiles {
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// The problem Salesforce reported for one component. Missing components
    /// are reported against `package.xml`, so the message text is matched on
    /// the quoted full name as well as the file name.
    pub fn problem_for(&self, kind: ItemKind, full_name: &str) -> Option<&str> {
        let path = kind.file_path(full_name);
        let quoted = format!("'{}'", full_name);
        self.messages
            .iter()
            .find(|(file, problem)| file.ends_with(&path) || problem.contains(&quoted))
            .map(|(_, problem)| problem.as_str())
    }
}

pub fn retrieve_request(manifest: &PackageManifest) -> String {
    let mut types = String::new();
    for (type_name, members) in manifest.types() {
        types.push_str("<met:types>");
        for member in members {
            types.push_str(&format!("<met:members>{}</met:members>", escape_xml(member)));
        }
        types.push_str(&format!("<met:name>{}</met:name></met:types>", escape_xml(type_name)));
    }
    format!(
        concat!(
            "<met:retrieve><met:retrieveRequest>",
            "<met:apiVersion>{version}</met:apiVersion>",
            "<met:singlePackage>true</met:singlePackage>",
            "<met:unpackaged>{types}<met:version>{version}</met:version></met:unpackaged>",
            "</met:retrieveRequest></met:retrieve>"
        ),
        version = escape_xml(manifest.version()),
        types = types,
    )
}

pub fn check_retrieve_status_request(job_id: &str) -> String {
    format!(
        "<met:checkRetrieveStatus><met:asyncProcessId>{}</met:asyncProcessId><met:includeZip>true</met:includeZip></met:checkRetrieveStatus>",
        escape_xml(job_id)
    )
}

pub fn deploy_request(zip_base64: &str, rollback_on_error: bool) -> String {
    format!(
        concat!(
            "<met:deploy><met:ZipFile>{zip}</met:ZipFile><met:DeployOptions>",
            "<met:checkOnly>false</met:checkOnly>",
            "<met:ignoreWarnings>false</met:ignoreWarnings>",
            "<met:rollbackOnError>{rollback}</met:rollbackOnError>",
            "<met:singlePackage>true</met:singlePackage>",
            "</met:DeployOptions></met:deploy>"
        ),
        zip = zip_base64,
        rollback = rollback_on_error,
    )
}

pub fn check_deploy_status_request(job_id: &str) -> String {
    format!(
        "<met:checkDeployStatus><met:asyncProcessId>{}</met:asyncProcessId><met:includeDetails>true</met:includeDetails></met:checkDeployStatus>",
        escape_xml(job_id)
    )
}

/// Job id from a `retrieve` or `deploy` response
pub fn parse_async_id(xml: &str, call: &str) -> CopierResult<String> {
    let doc = parse_response(xml, call)?;
    let result = result_node(&doc, call)?;
    child_text(result, "id")
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CopierError::xml(format!("{} response", call), "missing job id"))
}

pub fn parse_retrieve_status(xml: &str) -> CopierResult<RetrieveStatus> {
    let doc = parse_response(xml, "checkRetrieveStatus")?;
    let result = result_node(&doc, "checkRetrieveStatus")?;

    let messages = result
        .children()
        .filter(|n| n.tag_name().name() == "messages")
        .map(|m| {
            (
                child_text(m, "fileName").unwrap_or_default().to_string(),
                child_text(m, "problem").unwrap_or_default().to_string(),
            )
        })
        .collect();

    Ok(RetrieveStatus {
        job_id: child_text(result, "id").unwrap_or_default().to_string(),
        done: child_bool(result, "done"),
        status: child_text(result, "status").unwrap_or("InProgress").to_string(),
        zip_base64: child_text(result, "zipFile")
            .filter(|z| !z.is_empty())
            .map(str::to_string),
        messages,
        error_message: child_text(result, "errorMessage").map(str::to_string),
    })
}

pub fn parse_deploy_status(xml: &str) -> CopierResult<DeployResult> {
    let doc = parse_response(xml, "checkDeployStatus")?;
    let result = result_node(&doc, "checkDeployStatus")?;
    let details = result
        .children()
        .find(|n| n.tag_name().name() == "details");

    let (successes, failures, test_failures) = match details {
        Some(details) => (
            details
                .children()
                .filter(|n| n.tag_name().name() == "componentSuccesses")
                .map(parse_component_success)
                .filter(|s| s.full_name != "package.xml")
                .collect(),
            details
                .children()
                .filter(|n| n.tag_name().name() == "componentFailures")
                .map(parse_component_failure)
                .collect(),
            details
                .descendants()
                .filter(|n| n.tag_name().name() == "failures")
                .map(parse_test_failure)
                .collect(),
        ),
        None => (Vec::new(), Vec::new(), Vec::new()),
    };

    let status = child_text(result, "status").unwrap_or("Pending");

    Ok(DeployResult {
        job_id: child_text(result, "id").unwrap_or_default().to_string(),
        state: DeployState::from_api(status),
        done: child_bool(result, "done"),
        success: child_bool(result, "success"),
        components_total: child_u32(result, "numberComponentsTotal"),
        components_deployed: child_u32(result, "numberComponentsDeployed"),
        component_errors: child_u32(result, "numberComponentErrors"),
        tests_total: child_u32(result, "numberTestsTotal"),
        tests_completed: child_u32(result, "numberTestsCompleted"),
        test_errors: child_u32(result, "numberTestErrors"),
        successes,
        failures,
        test_failures,
        error_message: child_text(result, "errorMessage").map(str::to_string),
        state_detail: child_text(result, "stateDetail").map(str::to_string),
        created_at: child_datetime(result, "createdDate"),
        completed_at: child_datetime(result, "completedDate"),
    })
}

fn parse_component_success(node: Node<'_, '_>) -> ComponentSuccess {
    ComponentSuccess {
        component_type: child_text(node, "componentType").unwrap_or_default().to_string(),
        full_name: child_text(node, "fullName").unwrap_or_default().to_string(),
        file_name: child_text(node, "fileName").unwrap_or_default().to_string(),
    }
}

fn parse_component_failure(node: Node<'_, '_>) -> ComponentFailure {
    ComponentFailure {
        component_type: child_text(node, "componentType").unwrap_or_default().to_string(),
        full_name: child_text(node, "fullName").unwrap_or_default().to_string(),
        file_name: child_text(node, "fileName").unwrap_or_default().to_string(),
        problem_type: child_text(node, "problemType").unwrap_or("Error").to_string(),
        problem: child_text(node, "problem").unwrap_or_default().to_string(),
    }
}

fn parse_test_failure(node: Node<'_, '_>) -> TestFailure {
    TestFailure {
        class_name: child_text(node, "name").unwrap_or_default().to_string(),
        method: child_text(node, "methodName").unwrap_or_default().to_string(),
        message: child_text(node, "message").unwrap_or_default().to_string(),
        stack_trace: child_text(node, "stackTrace").map(str::to_string),
    }
}

fn child_datetime(node: Node<'_, '_>, name: &str) -> Option<DateTime<Utc>> {
    child_text(node, name)
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
