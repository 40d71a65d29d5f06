use anyhow::{Context, Result};
use clap::Args;

use super::{orchestrator, report_deploy_result};
use crate::api::OrgApi;
use crate::config::Config;

#[derive(Args)]
pub struct StatusCommands {
    /// Deploy job id
    pub job_id: String,

    /// Keep polling until the job finishes
    #[arg(short, long)]
    pub wait: bool,
}

pub async fn status_command(args: StatusCommands, api: &dyn OrgApi, config: &Config) -> Result<()> {
    let orchestrator = orchestrator(api, config);
    let result = if args.wait {
        orchestrator.wait_for_deploy(&args.job_id).await
    } else {
        orchestrator.poll_deploy_status(&args.job_id).await
    }
    .with_context(|| format!("Failed to get status of deploy {}", args.job_id))?;

    report_deploy_result(&result)
}
