mod common;

use anyhow::Result;
use clap::Parser;
use common::FakeOrg;

use sf_copier::cli::commands::copy_command;
use sf_copier::cli::{Cli, Commands};
use sf_copier::config::Config;
use sf_copier::metadata::{DeployPackage, ItemKind};

fn exec_org() -> FakeOrg {
    FakeOrg::new()
        .with_folder("00l00000000000A", "A", "A", ItemKind::Report)
        .with_folder("00l00000000000B", "B", "B", ItemKind::Report)
        .with_folder("00l00000000000D", "Exec", "Exec", ItemKind::Dashboard)
        .with_folder("00l00000000000R", "Copies", "Copies", ItemKind::Report)
        .with_folder("00l00000000000T", "Copied Dashboards", "Copied_Dashboards", ItemKind::Dashboard)
        .with_report("00O00000000000A", "00l00000000000A", "Pipeline", "Pipeline")
        .with_report("00O00000000000B", "00l00000000000B", "Leads", "Leads")
        .with_dashboard(
            "01Z000000000001",
            "00l00000000000D",
            "Overview",
            "Overview",
            &["A/Pipeline", "B/Leads"],
        )
}

fn copy_args(args: &[&str]) -> sf_copier::cli::commands::CopyCommands {
    let cli = Cli::try_parse_from(["sf-copier", "copy"].iter().chain(args.iter())).unwrap();
    match cli.command {
        Commands::Copy(args) => args,
        _ => panic!("expected copy command"),
    }
}

#[tokio::test]
async fn test_dashboard_folder_alone_copies_every_dashboard_in_it() -> Result<()> {
    let org = exec_org();
    let dir = tempfile::tempdir()?;
    let zip_path = dir.path().join("package.zip");
    let zip_arg = zip_path.to_string_lossy().to_string();

    let args = copy_args(&[
        "--dashboard-folder",
        "00l00000000000D",
        "--target",
        "Copies",
        "--dashboard-target",
        "Copied Dashboards",
        "--save",
        &zip_arg,
    ]);
    copy_command(args, &org, &Config::default()).await?;

    let package = DeployPackage::from_zip(&std::fs::read(&zip_path)?)?;
    assert_eq!(
        package.members(ItemKind::Dashboard),
        vec!["Copied_Dashboards/Overview_Copy"]
    );
    assert_eq!(
        package.members(ItemKind::Report),
        vec!["Copies/Leads_Copy", "Copies/Pipeline_Copy"]
    );
    assert!(org.deployed.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_dashboard_id_outside_its_folder_is_rejected() {
    let org = exec_org().with_folder("00l00000000000E", "Other", "Other", ItemKind::Dashboard);

    let args = copy_args(&[
        "--dashboard-folder",
        "00l00000000000E",
        "--dashboard",
        "01Z000000000001",
        "--target",
        "Copies",
    ]);
    let err = copy_command(args, &org, &Config::default())
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("01Z000000000001 in folder 'Other'"));
    assert!(org.retrieves.lock().unwrap().is_empty());
}
