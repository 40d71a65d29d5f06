use anyhow::{Context, Result};
use clap::Args;
use colored::*;

use crate::api::OrgApi;
use crate::copier::Selector;
use crate::metadata::ItemKind;

#[derive(Args)]
pub struct FoldersCommands {
    /// Folder type: report or dashboard
    #[arg(default_value = "report")]
    pub kind: ItemKind,
}

pub async fn folders_command(args: FoldersCommands, api: &dyn OrgApi) -> Result<()> {
    let folders = Selector::new(api)
        .list_folders(args.kind)
        .await
        .with_context(|| format!("Failed to list {} folders", args.kind))?;

    if folders.is_empty() {
        println!("📂 No {} folders found", args.kind);
        return Ok(());
    }

    println!("📂 {} {} folder(s):", folders.len(), args.kind);
    for folder in &folders {
        println!(
            "  {}  {} {}",
            folder.id.dimmed(),
            folder.name.bright_white().bold(),
            format!("({})", folder.developer_name).dimmed()
        );
    }
    Ok(())
}
