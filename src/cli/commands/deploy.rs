use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use std::fs;
use std::path::PathBuf;

use super::{orchestrator, report_deploy_result};
use crate::api::OrgApi;
use crate::config::Config;
use crate::metadata::DeployPackage;
use crate::ui::confirm_deploy;

#[derive(Args)]
pub struct DeployCommands {
    /// Package zip written by `copy --save`
    pub zip: PathBuf,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Return after submitting instead of waiting for the deploy to finish
    #[arg(long)]
    pub no_wait: bool,
}

pub async fn deploy_command(args: DeployCommands, api: &dyn OrgApi, config: &Config) -> Result<()> {
    let bytes = fs::read(&args.zip)
        .with_context(|| format!("Failed to read package: {}", args.zip.display()))?;
    let package = DeployPackage::from_zip(&bytes)
        .with_context(|| format!("Not a valid package zip: {}", args.zip.display()))?;

    println!("📦 Package {} ({} component(s))", args.zip.display().to_string().cyan(), package.len());
    println!("{}", package.package_xml().dimmed());

    if !confirm_deploy(package.len(), args.yes)? {
        println!("❌ Deploy cancelled");
        return Ok(());
    }

    let orchestrator = orchestrator(api, config);
    let job_id = orchestrator
        .submit_zip(&bytes)
        .await
        .context("Failed to submit deploy")?;
    println!("🚀 Deploy submitted: {}", job_id.cyan());

    if args.no_wait {
        println!("💡 Check progress with: sf-copier status {}", job_id);
        return Ok(());
    }

    let result = orchestrator
        .wait_for_deploy(&job_id)
        .await
        .context("Failed while waiting for deploy")?;
    report_deploy_result(&result)
}
