pub mod copy;
pub mod deploy;
pub mod folders;
pub mod items;
pub mod status;

use anyhow::Result;
use colored::*;

use crate::api::metadata::{DeployResult, DeployState};
use crate::config::Config;
use crate::copier::DeployOrchestrator;
use crate::api::OrgApi;

pub use copy::{CopyCommands, copy_command};
pub use deploy::{DeployCommands, deploy_command};
pub use folders::{FoldersCommands, folders_command};
pub use items::{ItemsCommands, items_command};
pub use status::{StatusCommands, status_command};

pub(crate) fn orchestrator<'a>(api: &'a dyn OrgApi, config: &Config) -> DeployOrchestrator<'a> {
    DeployOrchestrator::new(api, config.poll_config())
        .with_rollback_on_error(config.deploy.rollback_on_error)
}

/// Print a deploy status and turn a failed or partial deploy into an error exit
pub(crate) fn report_deploy_result(result: &DeployResult) -> Result<()> {
    let state = match result.state {
        DeployState::Succeeded => result.state.to_string().bright_green().bold(),
        DeployState::PartialFailure => result.state.to_string().yellow().bold(),
        DeployState::Failed => result.state.to_string().bright_red().bold(),
        _ => result.state.to_string().cyan(),
    };

    println!("📦 Deploy {}: {}", result.job_id.cyan(), state);
    println!(
        "   Components: {}/{} deployed, {} error(s) ({}%)",
        result.components_deployed,
        result.components_total,
        result.component_errors,
        result.components_progress_percent()
    );
    if result.tests_total > 0 {
        println!(
            "   Tests: {}/{} run, {} error(s) ({}%)",
            result.tests_completed,
            result.tests_total,
            result.test_errors,
            result.tests_progress_percent()
        );
    }
    if let Some(detail) = &result.state_detail {
        println!("   {}", detail.dimmed());
    }

    for success in &result.successes {
        println!("   ✅ {} {}", success.component_type.dimmed(), success.full_name);
    }
    for failure in &result.failures {
        println!(
            "   ❌ {} {}: {}",
            failure.component_type.dimmed(),
            failure.full_name,
            failure.problem.bright_red()
        );
    }
    for test in &result.test_failures {
        println!(
            "   ❌ {}.{}: {}",
            test.class_name,
            test.method,
            test.message.bright_red()
        );
    }
    if let Some(message) = &result.error_message {
        println!("   {}", message.bright_red());
    }

    match result.state {
        DeployState::Succeeded => Ok(()),
        DeployState::PartialFailure => anyhow::bail!(
            "Deploy {} partially failed ({} component error(s))",
            result.job_id,
            result.failures.len()
        ),
        DeployState::Failed => anyhow::bail!("Deploy {} failed", result.job_id),
        _ => Ok(()),
    }
}
