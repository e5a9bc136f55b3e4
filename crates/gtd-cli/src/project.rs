use crate::output::Output;
use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use gtd_core::{ProjectId, ProjectRecord, Tracker};

/// Project-related commands
#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Add a project at the end of the current partition
    Add(ProjectAddArgs),
    /// List projects, optionally filtered by category and status
    List(ProjectListArgs),
    /// Change fields of a project
    Update(ProjectUpdateArgs),
    /// Delete a project and all of its steps
    Delete {
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// Put projects in the given order (every project of the partition, once)
    Reorder {
        #[arg(value_name = "ID", required = true)]
        ids: Vec<i64>,
    },
    /// Move a project to the end of another partition
    Move {
        #[arg(value_name = "ID")]
        id: i64,

        /// Target partition
        #[arg(long = "to", value_enum)]
        to: Partition,
    },
}

/// Which set of projects a project belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Partition {
    Demo,
    Production,
}

#[derive(Args)]
pub struct ProjectAddArgs {
    /// Project name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Category tag
    #[arg(long = "category", value_name = "NAME")]
    pub category: Option<String>,

    /// Status tag
    #[arg(long = "status", value_name = "NAME")]
    pub status: Option<String>,

    /// Free-form notes
    #[arg(long = "notes", value_name = "TEXT")]
    pub notes: Option<String>,
}

#[derive(Args)]
pub struct ProjectListArgs {
    /// Only projects with exactly this category
    #[arg(long = "category", value_name = "NAME")]
    pub category: Option<String>,

    /// Only projects with exactly this status
    #[arg(long = "status", value_name = "NAME")]
    pub status: Option<String>,
}

#[derive(Args)]
pub struct ProjectUpdateArgs {
    #[arg(value_name = "ID")]
    pub id: i64,

    /// New name
    #[arg(long = "name", value_name = "NAME")]
    pub name: Option<String>,

    /// New category tag (empty string clears it)
    #[arg(long = "category", value_name = "NAME")]
    pub category: Option<String>,

    /// New status tag (empty string clears it)
    #[arg(long = "status", value_name = "NAME")]
    pub status: Option<String>,

    /// New notes
    #[arg(long = "notes", value_name = "TEXT")]
    pub notes: Option<String>,
}

impl ProjectCommands {
    /// Execute the project command
    pub async fn run(self, tracker: &Tracker, out: &Output) -> Result<()> {
        match self {
            ProjectCommands::Add(args) => args.run(tracker, out).await,
            ProjectCommands::List(args) => args.run(tracker, out).await,
            ProjectCommands::Update(args) => args.run(tracker, out).await,
            ProjectCommands::Delete { id } => {
                let deleted = tracker
                    .delete_project(ProjectId(id))
                    .await
                    .with_context(|| format!("Failed to delete project {}", id))?;
                if deleted {
                    out.message(&format!("Deleted project {}", id));
                } else {
                    out.message(&format!("Project {} does not exist", id));
                }
                Ok(())
            }
            ProjectCommands::Reorder { ids } => {
                let mut ordered = Vec::with_capacity(ids.len());
                for id in ids {
                    ordered.push(tracker.project(ProjectId(id)).await?);
                }
                tracker
                    .reorder_projects(&ordered)
                    .await
                    .context("Failed to reorder projects")?;
                out.projects(&tracker.projects().await?.current())
            }
            ProjectCommands::Move { id, to } => {
                tracker
                    .move_project(ProjectId(id), to == Partition::Demo)
                    .await
                    .with_context(|| format!("Failed to move project {}", id))?;
                if out.is_json() {
                    return out.json(&tracker.project(ProjectId(id)).await?);
                }
                let partition = match to {
                    Partition::Demo => "demo",
                    Partition::Production => "production",
                };
                out.message(&format!("Moved project {} to {}", id, partition));
                Ok(())
            }
        }
    }
}

impl ProjectAddArgs {
    pub fn record(&self) -> ProjectRecord {
        ProjectRecord {
            kategorie: self.category.clone().unwrap_or_default(),
            status: self.status.clone().unwrap_or_default(),
            notes: self.notes.clone().unwrap_or_default(),
            ..ProjectRecord::new(self.name.clone())
        }
    }

    async fn run(self, tracker: &Tracker, out: &Output) -> Result<()> {
        let id = tracker
            .add_project(self.record())
            .await
            .context("Failed to add project")?;
        if out.is_json() {
            return out.json(&tracker.project(id).await?);
        }
        out.message(&format!("Added project {} ({})", id, self.name));
        Ok(())
    }
}

impl ProjectListArgs {
    async fn run(self, tracker: &Tracker, out: &Output) -> Result<()> {
        tracker.set_category_filter(self.category);
        tracker.set_status_filter(self.status);
        let projects = tracker.projects().await?;
        out.projects(&projects.current())
    }
}

impl ProjectUpdateArgs {
    pub fn apply(&self, record: &mut ProjectRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(category) = &self.category {
            record.kategorie = category.clone();
        }
        if let Some(status) = &self.status {
            record.status = status.clone();
        }
        if let Some(notes) = &self.notes {
            record.notes = notes.clone();
        }
    }

    async fn run(self, tracker: &Tracker, out: &Output) -> Result<()> {
        let mut record = tracker.project(ProjectId(self.id)).await?;
        self.apply(&mut record);
        tracker
            .update_project(record)
            .await
            .with_context(|| format!("Failed to update project {}", self.id))?;
        if out.is_json() {
            return out.json(&tracker.project(ProjectId(self.id)).await?);
        }
        out.message(&format!("Updated project {}", self.id));
        Ok(())
    }
}
