use super::commands::{CopyCommands, DeployCommands, FoldersCommands, ItemsCommands, StatusCommands};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sf-copier")]
#[command(about = "Copy Salesforce reports and dashboards into new folders")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Load credentials from this .env file instead of ./.env
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List report or dashboard folders
    Folders(FoldersCommands),
    /// List reports or dashboards, optionally within one folder
    Items(ItemsCommands),
    /// Build a package of copies, then optionally save and deploy it
    Copy(CopyCommands),
    /// Deploy a previously saved package zip
    Deploy(DeployCommands),
    /// Check the status of a deploy job
    Status(StatusCommands),
}
