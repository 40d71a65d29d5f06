use log::{debug, info, warn};

use crate::api::metadata::{DeployResult, DeployState};
use crate::api::resilience::{PollConfig, PollOutcome, PollPolicy};
use crate::api::OrgApi;
use crate::error::{CopierError, CopierResult};
use crate::metadata::DeployPackage;

/// Submits packages and follows deploy jobs to a terminal state.
///
/// A deploy is never retried: a failed or partially failed job is reported
/// as-is through its [`DeployResult`].
pub struct DeployOrchestrator<'a> {
    api: &'a dyn OrgApi,
    policy: PollPolicy,
    rollback_on_error: bool,
}

impl<'a> DeployOrchestrator<'a> {
    pub fn new(api: &'a dyn OrgApi, poll: PollConfig) -> Self {
        Self {
            api,
            policy: PollPolicy::new(poll),
            rollback_on_error: false,
        }
    }

    /// With rollback enabled a job either deploys everything or fails as a whole
    pub fn with_rollback_on_error(mut self, rollback_on_error: bool) -> Self {
        self.rollback_on_error = rollback_on_error;
        self
    }

    pub async fn submit_deploy(&self, package: &DeployPackage) -> CopierResult<String> {
        if package.is_empty() {
            return Err(CopierError::EmptyPackage);
        }
        debug!("Deploying package.xml:\n{}", package.package_xml());
        let zip = package.to_zip()?;
        self.send(&zip, package.len()).await
    }

    /// Deploy a zip saved earlier with [`DeployPackage::to_zip`]
    pub async fn submit_zip(&self, zip: &[u8]) -> CopierResult<String> {
        let package = DeployPackage::from_zip(zip)?;
        if package.is_empty() {
            return Err(CopierError::EmptyPackage);
        }
        self.send(zip, package.len()).await
    }

    async fn send(&self, zip: &[u8], components: usize) -> CopierResult<String> {
        info!(
            "Submitting deploy of {} component(s) (rollbackOnError={})",
            components, self.rollback_on_error
        );
        let job_id = self.api.deploy(zip, self.rollback_on_error).await?;
        info!("Deploy job id: {}", job_id);
        Ok(job_id)
    }

    /// A single status check
    pub async fn poll_deploy_status(&self, job_id: &str) -> CopierResult<DeployResult> {
        let result = self.api.check_deploy_status(job_id).await?;
        debug!(
            "Deploy {}: {} ({}/{} components, {} errors)",
            job_id,
            result.state,
            result.components_deployed,
            result.components_total,
            result.component_errors
        );
        Ok(result)
    }

    /// Poll until the job is terminal. Past the configured wait this returns
    /// [`CopierError::DeployTimeout`]; the job itself keeps running.
    pub async fn wait_for_deploy(&self, job_id: &str) -> CopierResult<DeployResult> {
        info!(
            "Waiting up to {:?} for deploy {}",
            self.policy.config().max_wait,
            job_id
        );
        let outcome = self
            .policy
            .poll(
                || async move {
                    let result = self.poll_deploy_status(job_id).await?;
                    info!(
                        "Deploy {} is {} ({}%)",
                        job_id,
                        result.state,
                        result.components_progress_percent()
                    );
                    Ok::<_, CopierError>(result)
                },
                |result| result.state.is_terminal(),
            )
            .await?;

        match outcome {
            PollOutcome::Finished(result) => {
                match result.state {
                    DeployState::Succeeded => info!("Deploy {} succeeded", job_id),
                    DeployState::PartialFailure => warn!(
                        "Deploy {} partially failed: {} component error(s)",
                        job_id,
                        result.failures.len()
                    ),
                    _ => warn!(
                        "Deploy {} failed: {}",
                        job_id,
                        result.error_message.as_deref().unwrap_or("see component failures")
                    ),
                }
                Ok(result)
            }
            PollOutcome::TimedOut(result) => {
                warn!("Deploy {} still {} when polling stopped", job_id, result.state);
                Err(CopierError::DeployTimeout {
                    job_id: job_id.to_string(),
                    last_status: result.state,
                })
            }
        }
    }
}
