//! `copy`: resolve the selection, build the package, then save and/or deploy it

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use std::fs;
use std::path::PathBuf;

use super::{orchestrator, report_deploy_result};
use crate::api::OrgApi;
use crate::config::Config;
use crate::copier::{
    BuildOutcome, CopyRequest, CopyTargets, FolderProvisioner, PackageBuilder, Selector,
};
use crate::metadata::ItemKind;
use crate::ui::confirm_deploy;

#[derive(Args)]
pub struct CopyCommands {
    /// Source report folder id. Without --report, every report in it is copied.
    #[arg(long)]
    pub report_folder: Option<String>,

    /// Report id to copy from --report-folder (repeatable)
    #[arg(long = "report", requires = "report_folder")]
    pub reports: Vec<String>,

    /// Source dashboard folder id. Without --dashboard, every dashboard in it is copied.
    #[arg(long)]
    pub dashboard_folder: Option<String>,

    /// Dashboard id to copy from --dashboard-folder, with every report it uses (repeatable)
    #[arg(long = "dashboard", requires = "dashboard_folder")]
    pub dashboards: Vec<String>,

    /// Label of the report folder copies go to; created when missing
    #[arg(short, long)]
    pub target: String,

    /// Label of the dashboard folder copied dashboards go to (defaults to --target)
    #[arg(long)]
    pub dashboard_target: Option<String>,

    /// Save the package zip to this path
    #[arg(short, long)]
    pub save: Option<PathBuf>,

    /// Deploy the package after building it
    #[arg(long)]
    pub deploy: bool,

    /// Skip the deploy confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Return after submitting instead of waiting for the deploy to finish
    #[arg(long, requires = "deploy")]
    pub no_wait: bool,
}

pub async fn copy_command(args: CopyCommands, api: &dyn OrgApi, config: &Config) -> Result<()> {
    if args.report_folder.is_none() && args.dashboard_folder.is_none() {
        anyhow::bail!("Nothing selected: pass --report-folder and/or --dashboard-folder");
    }

    let selector = Selector::new(api);
    let mut items = Vec::new();

    if let Some(folder_id) = &args.report_folder {
        let folder = selector
            .get_folder(ItemKind::Report, folder_id)
            .await
            .context("Failed to resolve source report folder")?;
        println!("📂 Source report folder: {}", folder.name.cyan());

        let selected = if args.reports.is_empty() {
            selector.folder_contents(ItemKind::Report, &folder).await
        } else {
            selector
                .selected_items(ItemKind::Report, &folder, &args.reports)
                .await
        }
        .context("Failed to resolve selected reports")?;
        items.extend(selected);
    }

    if let Some(folder_id) = &args.dashboard_folder {
        let folder = selector
            .get_folder(ItemKind::Dashboard, folder_id)
            .await
            .context("Failed to resolve source dashboard folder")?;
        println!("📂 Source dashboard folder: {}", folder.name.cyan());

        let selected = if args.dashboards.is_empty() {
            selector.folder_contents(ItemKind::Dashboard, &folder).await
        } else {
            selector
                .selected_items(ItemKind::Dashboard, &folder, &args.dashboards)
                .await
        }
        .context("Failed to resolve selected dashboards")?;
        items.extend(selected);
    }

    if items.is_empty() {
        println!("⚠️  {}", "Nothing to copy: the selection is empty".yellow());
        return Ok(());
    }

    let provisioner = FolderProvisioner::new(api, config.rename_policy());
    let report_target = provisioner
        .ensure_folder(ItemKind::Report, &args.target)
        .await
        .context("Failed to prepare target report folder")?;

    let has_dashboards = items.iter().any(|i| i.kind == ItemKind::Dashboard);
    let dashboard_target = if has_dashboards {
        let label = args.dashboard_target.as_deref().unwrap_or(&args.target);
        Some(
            provisioner
                .ensure_folder(ItemKind::Dashboard, label)
                .await
                .context("Failed to prepare target dashboard folder")?,
        )
    } else {
        None
    };

    println!("🔄 {}", "Retrieving and rewriting components...".dimmed());
    let request = CopyRequest::new(
        items,
        CopyTargets {
            reports: report_target,
            dashboards: dashboard_target,
        },
    );
    let outcome = PackageBuilder::new(api, config.rename_policy())
        .build_package(&request)
        .await
        .context("Failed to build package")?;

    print_outcome(&outcome);

    if outcome.package.is_empty() {
        anyhow::bail!("No component could be copied");
    }

    if let Some(path) = &args.save {
        let zip = outcome.package.to_zip().context("Failed to write package zip")?;
        fs::write(path, &zip)
            .with_context(|| format!("Failed to save package to: {}", path.display()))?;
        println!("💾 Package saved to: {}", path.display().to_string().bright_green());
    }

    if !args.deploy {
        if args.save.is_none() {
            println!("💡 {}", "Dry run only. Use --save to keep the package or --deploy to deploy it.".dimmed());
        }
        return Ok(());
    }

    if !confirm_deploy(outcome.package.len(), args.yes)? {
        println!("❌ Deploy cancelled");
        return Ok(());
    }

    let orchestrator = orchestrator(api, config);
    let job_id = orchestrator
        .submit_deploy(&outcome.package)
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

fn print_outcome(outcome: &BuildOutcome) {
    println!();
    println!("📋 Copies ({}):", outcome.renames.len());
    for rename in &outcome.renames {
        println!(
            "  {} {} → {} {}",
            rename.kind.to_string().dimmed(),
            rename.source,
            rename.target.bright_green(),
            format!("\"{}\"", rename.label).dimmed()
        );
    }

    if !outcome.warnings.is_empty() {
        println!();
        println!("⚠️  Skipped ({}):", outcome.warnings.len());
        for warning in &outcome.warnings {
            println!("  {}", warning.to_string().yellow());
        }
    }

    println!();
    println!("📄 package.xml:");
    println!("{}", outcome.package.package_xml().dimmed());
}
