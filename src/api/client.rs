use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info, warn};
use serde_json::{Value, json};

use super::auth::{self, Session};
use super::constants::{headers, metadata_endpoint, query_endpoint, sobject_endpoint};
use super::metadata::{self as md, DeployResult, RetrievedFiles};
use super::resilience::{PollConfig, PollOutcome, PollPolicy};
use super::soap::{metadata_envelope, parse_response};
use super::OrgApi;
use crate::auth::Credentials;
use crate::error::{CopierError, CopierResult};
use crate::metadata::package::read_zip_entries;
use crate::metadata::{ItemKind, PackageManifest};

/// Salesforce client with connection pooling, bound to one session
pub struct SalesforceClient {
    http_client: reqwest::Client,
    session: Session,
    api_version: String,
    retrieve_policy: PollPolicy,
}

impl SalesforceClient {
    /// Pooled HTTP client shared by login and every later call
    pub fn build_http_client() -> CopierResult<reqwest::Client> {
        reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("sf-copier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(CopierError::from)
    }

    /// Log in and return a client owning the new session
    pub async fn connect(
        credentials: &Credentials,
        api_version: &str,
        retrieve_poll: PollConfig,
    ) -> CopierResult<Self> {
        let http_client = Self::build_http_client()?;
        let session = auth::login(&http_client, credentials, api_version).await?;
        Ok(Self::with_session(http_client, session, api_version)
            .with_retrieve_policy(PollPolicy::new(retrieve_poll)))
    }

    pub fn with_session(http_client: reqwest::Client, session: Session, api_version: &str) -> Self {
        Self {
            http_client,
            session,
            api_version: api_version.to_string(),
            retrieve_policy: PollPolicy::default(),
        }
    }

    pub fn with_retrieve_policy(mut self, policy: PollPolicy) -> Self {
        self.retrieve_policy = policy;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// POST a Metadata API call and return the raw response body
    async fn metadata_call(&self, call: &str, body: &str) -> CopierResult<String> {
        let url = metadata_endpoint(&self.session.instance_url, &self.api_version);
        debug!("Metadata API call {} -> {}", call, url);

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, headers::CONTENT_TYPE_SOAP)
            .header(headers::SOAP_ACTION, call)
            .body(metadata_envelope(&self.session.session_id, body))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(match parse_response(&text, call) {
                Err(e @ CopierError::UpstreamUnavailable { .. }) => e,
                _ => CopierError::upstream(format!("{} failed with HTTP {}", call, status)),
            });
        }
        Ok(text)
    }

    async fn get_json(&self, url: &str) -> CopierResult<Value> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.session.session_id)
            .header(reqwest::header::ACCEPT, headers::CONTENT_TYPE_JSON)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rest_error("query", status, &body));
        }
        Ok(response.json().await?)
    }

    async fn check_retrieve_status(&self, job_id: &str) -> CopierResult<md::RetrieveStatus> {
        let xml = self
            .metadata_call("checkRetrieveStatus", &md::check_retrieve_status_request(job_id))
            .await?;
        md::parse_retrieve_status(&xml)
    }
}

#[async_trait]
impl OrgApi for SalesforceClient {
    fn api_version(&self) -> &str {
        &self.api_version
    }

    async fn query(&self, soql: &str) -> CopierResult<Vec<Value>> {
        debug!("SOQL: {}", soql);
        let mut url = format!(
            "{}?q={}",
            query_endpoint(&self.session.instance_url, &self.api_version),
            urlencoding::encode(soql)
        );
        let mut records = Vec::new();

        loop {
            let page = self.get_json(&url).await?;
            if let Some(batch) = page.get("records").and_then(Value::as_array) {
                records.extend(batch.iter().cloned());
            }

            let done = page.get("done").and_then(Value::as_bool).unwrap_or(true);
            match page.get("nextRecordsUrl").and_then(Value::as_str) {
                Some(next) if !done => {
                    url = format!("{}{}", self.session.instance_url, next);
                }
                _ => break,
            }
        }

        debug!("Query returned {} records", records.len());
        Ok(records)
    }

    async fn create_folder(
        &self,
        name: &str,
        developer_name: &str,
        kind: ItemKind,
    ) -> CopierResult<String> {
        let url = sobject_endpoint(&self.session.instance_url, &self.api_version, "Folder");
        let payload = json!({
            "Name": name,
            "DeveloperName": developer_name,
            "Type": kind.type_name(),
            "AccessType": "Public",
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.session.session_id)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(rest_error("create folder", status, &body));
        }

        let created: Value = serde_json::from_str(&body)
            .map_err(|e| CopierError::upstream(format!("invalid create folder response: {}", e)))?;
        let id = created
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CopierError::upstream("create folder response has no id"))?;

        info!("Created {} folder '{}' ({}) with id {}", kind, name, developer_name, id);
        Ok(id.to_string())
    }

    async fn retrieve(&self, manifest: &PackageManifest) -> CopierResult<RetrievedFiles> {
        let requested = manifest
            .types()
            .flat_map(|(_, members)| members.iter().cloned())
            .collect::<Vec<_>>()
            .join(", ");

        let xml = self
            .metadata_call("retrieve", &md::retrieve_request(manifest))
            .await?;
        let job_id = md::parse_async_id(&xml, "retrieve")?;
        info!("Retrieve job {} started for {}", job_id, requested);

        let outcome = self
            .retrieve_policy
            .poll(|| self.check_retrieve_status(&job_id), |status| status.done)
            .await?;

        let status = match outcome {
            PollOutcome::Finished(status) => status,
            PollOutcome::TimedOut(status) => {
                return Err(CopierError::retrieval(
                    requested,
                    format!("retrieve {} still {} after polling", job_id, status.status),
                ));
            }
        };

        if !status.succeeded() {
            return Err(CopierError::retrieval(
                requested,
                status
                    .error_message
                    .unwrap_or_else(|| format!("retrieve finished with status {}", status.status)),
            ));
        }
        for (file, problem) in &status.messages {
            warn!("Retrieve {}: {} - {}", job_id, file, problem);
        }

        let encoded = status.zip_base64.unwrap_or_default();
        let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| CopierError::retrieval(requested.clone(), format!("bad zip encoding: {}", e)))?;

        let files = read_zip_entries(&bytes)?;
        debug!("Retrieve {} returned {} files", job_id, files.len());
        Ok(RetrievedFiles {
            files,
            messages: status.messages,
        })
    }

    async fn deploy(&self, zip: &[u8], rollback_on_error: bool) -> CopierResult<String> {
        let encoded = STANDARD.encode(zip);
        let xml = self
            .metadata_call("deploy", &md::deploy_request(&encoded, rollback_on_error))
            .await?;
        let job_id = md::parse_async_id(&xml, "deploy")?;
        info!("Deploy job {} submitted ({} bytes)", job_id, zip.len());
        Ok(job_id)
    }

    async fn check_deploy_status(&self, job_id: &str) -> CopierResult<DeployResult> {
        let xml = self
            .metadata_call("checkDeployStatus", &md::check_deploy_status_request(job_id))
            .await?;
        md::parse_deploy_status(&xml)
    }
}

/// Map a failed REST response to an upstream error, using the
/// `[{"message", "errorCode"}]` body when present
fn rest_error(action: &str, status: reqwest::StatusCode, body: &str) -> CopierError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            let first = v.as_array()?.first()?.clone();
            let message = first.get("message")?.as_str()?.to_string();
            let code = first
                .get("errorCode")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN");
            Some(format!("{} ({})", message, code))
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    CopierError::upstream(format!("{} failed with HTTP {}: {}", action, status, detail))
}
