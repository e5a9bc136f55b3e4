use crate::output::Output;
use anyhow::{Context, Result};
use clap::Subcommand;
use gtd_core::{TagKind, Tracker};

/// Commands shared by the category and status registries
#[derive(Subcommand)]
pub enum TagCommands {
    /// List registered names
    List {
        /// Only names used by projects of the current partition
        #[arg(long = "in-use")]
        in_use: bool,
    },
    /// Rename a tag on every project of the current partition
    Rename {
        #[arg(value_name = "OLD")]
        old: String,
        /// New name; an empty string removes the tag
        #[arg(value_name = "NEW")]
        new: String,
    },
}

impl TagCommands {
    /// Execute the tag command for `kind`
    pub async fn run(self, kind: TagKind, tracker: &Tracker, out: &Output) -> Result<()> {
        match self {
            TagCommands::List { in_use } => {
                let names = match (kind, in_use) {
                    (TagKind::Category, false) => tracker.category_names().await?,
                    (TagKind::Category, true) => tracker.categories_in_use().await?,
                    (TagKind::Status, false) => tracker.status_names().await?,
                    (TagKind::Status, true) => tracker.statuses_in_use().await?,
                };
                out.names(&names.current())
            }
            TagCommands::Rename { old, new } => {
                match kind {
                    TagKind::Category => tracker.rename_category(&old, &new).await,
                    TagKind::Status => tracker.rename_status(&old, &new).await,
                }
                .with_context(|| format!("Failed to rename {} {:?}", kind, old))?;
                out.message(&format!("Renamed {} {:?} to {:?}", kind, old, new));
                Ok(())
            }
        }
    }
}
