//! Salesforce API access
//!
//! [`OrgApi`] is everything the copier needs from an org. [`SalesforceClient`]
//! implements it over HTTP: SOAP login, REST query and insert, and the
//! asynchronous Metadata API retrieve and deploy calls.

pub mod auth;
pub mod client;
pub mod constants;
pub mod metadata;
pub mod resilience;
pub mod soap;

use async_trait::async_trait;

use crate::error::CopierResult;
use crate::metadata::{ItemKind, PackageManifest};

pub use auth::Session;
pub use client::SalesforceClient;
pub use metadata::{DeployResult, DeployState, RetrievedFiles};
pub use resilience::{PollConfig, PollOutcome, PollPolicy};

/// Operations the copier performs against an org
#[async_trait]
pub trait OrgApi: Send + Sync {
    /// Metadata API version used for manifests and endpoints
    fn api_version(&self) -> &str;

    /// Run a SOQL query and return every record, following pagination
    async fn query(&self, soql: &str) -> CopierResult<Vec<serde_json::Value>>;

    /// Insert a public folder and return its id
    async fn create_folder(
        &self,
        name: &str,
        developer_name: &str,
        kind: ItemKind,
    ) -> CopierResult<String>;

    /// Retrieve the components listed in `manifest`, with the problems
    /// reported for any that did not come back
    async fn retrieve(&self, manifest: &PackageManifest) -> CopierResult<RetrievedFiles>;

    /// Start a deploy of a package zip and return the job id
    async fn deploy(&self, zip: &[u8], rollback_on_error: bool) -> CopierResult<String>;

    /// One status check for a deploy job
    async fn check_deploy_status(&self, job_id: &str) -> CopierResult<DeployResult>;
}
