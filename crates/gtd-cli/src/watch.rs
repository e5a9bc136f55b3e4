use crate::output::Output;
use anyhow::{Context, Result};
use clap::Args;
use gtd_core::{ProjectId, Tracker};
use std::time::Duration;
use tracing::debug;

/// Arguments for following a project's steps
#[derive(Args)]
pub struct WatchArgs {
    #[arg(value_name = "PROJECT_ID")]
    pub project_id: i64,

    /// Stop after this many seconds
    #[arg(long = "seconds", value_name = "N", default_value_t = 10)]
    pub seconds: u64,
}

impl WatchArgs {
    /// Print the step list every time it changes until the time is up
    pub async fn run(self, tracker: &Tracker, out: &Output) -> Result<()> {
        let project = tracker
            .project(ProjectId(self.project_id))
            .await
            .with_context(|| format!("Cannot watch project {}", self.project_id))?;
        let mut steps = tracker.steps_for_project(project.id).await?;

        out.message(&format!("{} ({}s)", project.name, self.seconds));
        out.steps(&steps.current())?;

        let deadline = tokio::time::sleep(Duration::from_secs(self.seconds));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                _ = tokio::signal::ctrl_c() => break,
                changed = steps.changed() => {
                    let views = changed?;
                    out.message("");
                    out.steps(&views)?;
                }
            }
        }
        debug!(project = %project.id, "watch finished");
        Ok(())
    }
}
