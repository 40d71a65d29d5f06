use anyhow::{Context, Result};
use clap::Args;
use colored::*;

use crate::api::OrgApi;
use crate::copier::Selector;
use crate::metadata::ItemKind;

#[derive(Args)]
pub struct ItemsCommands {
    /// Item type: report or dashboard
    #[arg(default_value = "report")]
    pub kind: ItemKind,

    /// Only list items in the folder with this id
    #[arg(short, long)]
    pub folder: Option<String>,
}

pub async fn items_command(args: ItemsCommands, api: &dyn OrgApi) -> Result<()> {
    let selector = Selector::new(api);

    let items = match &args.folder {
        Some(folder_id) => {
            let folder = selector
                .get_folder(args.kind, folder_id)
                .await
                .with_context(|| format!("Failed to resolve folder {}", folder_id))?;
            println!("📂 Folder: {} ({})", folder.name.cyan(), folder.developer_name.dimmed());
            selector.list_items_in_folder(args.kind, &folder).await
        }
        None => selector.list_copyable_items(args.kind).await,
    }
    .with_context(|| format!("Failed to list {}s", args.kind))?;

    if items.is_empty() {
        println!("📋 No {}s found", args.kind);
        return Ok(());
    }

    println!("📋 {} {}(s):", items.len(), args.kind);
    for item in &items {
        println!(
            "  {}  {} {}",
            item.id.dimmed(),
            item.name.bright_white(),
            format!("({})", item.api_name).dimmed()
        );
    }
    Ok(())
}
