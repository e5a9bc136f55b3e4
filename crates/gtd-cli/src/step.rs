use crate::output::{format_duration, Output};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use gtd_core::{ProjectId, StepId, StepRecord, StepView, Tracker};

/// Step-related commands
#[derive(Subcommand)]
pub enum StepCommands {
    /// Add a step at the end of a project
    Add(StepAddArgs),
    /// List the steps of a project with their current durations
    List {
        #[arg(value_name = "PROJECT_ID")]
        project_id: i64,
    },
    /// Show every field of one step
    Show {
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// Change fields of a step
    Update(StepUpdateArgs),
    /// Delete a step
    Delete {
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// Put a project's steps in the given order (every step, once)
    Reorder {
        #[arg(value_name = "PROJECT_ID")]
        project_id: i64,
        #[arg(value_name = "ID", required = true)]
        ids: Vec<i64>,
    },
    /// Start a stopped step or pause a running one
    Toggle {
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// Zero a step's tracked time
    Reset {
        #[arg(value_name = "ID")]
        id: i64,
    },
}

#[derive(Args)]
pub struct StepAddArgs {
    #[arg(value_name = "PROJECT_ID")]
    pub project_id: i64,

    /// Step name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Target duration in seconds
    #[arg(long = "target-seconds", value_name = "SECONDS", default_value_t = 0)]
    pub target_seconds: i64,

    /// Free-form notes
    #[arg(long = "notes", value_name = "TEXT")]
    pub notes: Option<String>,
}

#[derive(Args, Default)]
pub struct StepUpdateArgs {
    #[arg(value_name = "ID")]
    pub id: i64,

    #[arg(long = "name", value_name = "NAME")]
    pub name: Option<String>,

    #[arg(long = "target-seconds", value_name = "SECONDS")]
    pub target_seconds: Option<i64>,

    #[arg(long = "notes", value_name = "TEXT")]
    pub notes: Option<String>,

    #[arg(long = "average-pulse", value_name = "BPM")]
    pub average_pulse: Option<i64>,

    #[arg(long = "peak-pulse", value_name = "BPM")]
    pub peak_pulse: Option<i64>,

    #[arg(long = "average-load", value_name = "TEXT")]
    pub average_load: Option<String>,

    #[arg(long = "fitness-level", value_name = "LEVEL")]
    pub fitness_level: Option<i64>,

    #[arg(long = "repetitions", value_name = "COUNT")]
    pub repetitions: Option<i64>,

    #[arg(long = "calories", value_name = "KCAL")]
    pub calories: Option<i64>,

    #[arg(long = "distance-meters", value_name = "METERS")]
    pub distance_meters: Option<i64>,
}

impl StepCommands {
    /// Execute the step command
    pub async fn run(self, tracker: &Tracker, out: &Output) -> Result<()> {
        match self {
            StepCommands::Add(args) => args.run(tracker, out).await,
            StepCommands::List { project_id } => {
                let steps = tracker.steps_for_project(ProjectId(project_id)).await?;
                out.steps(&steps.current())
            }
            StepCommands::Show { id } => {
                let steps = tracker.watch_step(StepId(id)).await?;
                let step = steps
                    .current()
                    .with_context(|| format!("Step {} does not exist", id))?;
                show(&step, out)
            }
            StepCommands::Update(args) => args.run(tracker, out).await,
            StepCommands::Delete { id } => {
                if tracker.delete_step(StepId(id)).await? {
                    out.message(&format!("Deleted step {}", id));
                } else {
                    out.message(&format!("Step {} does not exist", id));
                }
                Ok(())
            }
            StepCommands::Reorder { project_id, ids } => {
                let mut ordered = Vec::with_capacity(ids.len());
                for id in ids {
                    ordered.push(tracker.step(StepId(id)).await?);
                }
                let project_id = ProjectId(project_id);
                tracker
                    .reorder_steps(project_id, &ordered)
                    .await
                    .context("Failed to reorder steps")?;
                out.steps(&tracker.steps_for_project(project_id).await?.current())
            }
            StepCommands::Toggle { id } => {
                let record = tracker
                    .toggle_timer(StepId(id))
                    .await
                    .with_context(|| format!("Failed to toggle step {}", id))?;
                let verb = if record.is_running { "Started" } else { "Paused" };
                report(verb, record, out)
            }
            StepCommands::Reset { id } => {
                let record = tracker
                    .reset_duration(StepId(id))
                    .await
                    .with_context(|| format!("Failed to reset step {}", id))?;
                report("Reset", record, out)
            }
        }
    }
}

fn report(verb: &str, record: StepRecord, out: &Output) -> Result<()> {
    if out.is_json() {
        return out.json(&record);
    }
    out.message(&format!(
        "{} step {} ({}), banked {}",
        verb,
        record.id,
        record.name,
        format_duration(record.dauer_seconds)
    ));
    Ok(())
}

fn show(step: &StepView, out: &Output) -> Result<()> {
    if out.is_json() {
        return out.json(step);
    }
    let r = &step.record;
    println!("{} [{}] in project {}", r.name, r.id, r.project_id);
    println!("  position:   {}", r.sort_order);
    println!("  elapsed:    {}", format_duration(step.live_elapsed_seconds));
    println!("  target:     {}", format_duration(r.ziel_zeit_seconds));
    println!("  running:    {}", if r.is_running { "yes" } else { "no" });
    if !r.notes.is_empty() {
        println!("  notes:      {}", r.notes);
    }
    println!("  pulse:      avg {} / peak {}", r.average_pulse, r.peak_pulse);
    println!("  load:       {}", r.average_load);
    println!("  fitness:    {}", r.fitness_level);
    println!("  reps:       {}", r.repetitions);
    println!("  calories:   {}", r.calories);
    println!("  distance:   {} m", r.distance_meters);
    Ok(())
}

impl StepAddArgs {
    pub fn record(&self) -> StepRecord {
        StepRecord {
            ziel_zeit_seconds: self.target_seconds,
            notes: self.notes.clone().unwrap_or_default(),
            ..StepRecord::new(ProjectId(self.project_id), self.name.clone())
        }
    }

    async fn run(self, tracker: &Tracker, out: &Output) -> Result<()> {
        let id = tracker.add_step(self.record()).await.context("Failed to add step")?;
        if out.is_json() {
            return out.json(&tracker.step(id).await?);
        }
        out.message(&format!("Added step {} ({})", id, self.name));
        Ok(())
    }
}

impl StepUpdateArgs {
    pub fn apply(&self, record: &mut StepRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(target) = self.target_seconds {
            record.ziel_zeit_seconds = target;
        }
        if let Some(notes) = &self.notes {
            record.notes = notes.clone();
        }
        if let Some(value) = self.average_pulse {
            record.average_pulse = value;
        }
        if let Some(value) = self.peak_pulse {
            record.peak_pulse = value;
        }
        if let Some(load) = &self.average_load {
            record.average_load = load.clone();
        }
        if let Some(value) = self.fitness_level {
            record.fitness_level = value;
        }
        if let Some(value) = self.repetitions {
            record.repetitions = value;
        }
        if let Some(value) = self.calories {
            record.calories = value;
        }
        if let Some(value) = self.distance_meters {
            record.distance_meters = value;
        }
    }

    async fn run(self, tracker: &Tracker, out: &Output) -> Result<()> {
        let mut record = tracker.step(StepId(self.id)).await?;
        self.apply(&mut record);
        tracker
            .update_step(record)
            .await
            .with_context(|| format!("Failed to update step {}", self.id))?;
        if out.is_json() {
            return out.json(&tracker.step(StepId(self.id)).await?);
        }
        out.message(&format!("Updated step {}", self.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_only_touches_given_fields() {
        let mut record = StepRecord {
            dauer_seconds: 90,
            calories: 10,
            ..StepRecord::new(ProjectId(1), "Run")
        };
        let args = StepUpdateArgs {
            id: 1,
            calories: Some(250),
            average_load: Some("high".into()),
            ..StepUpdateArgs::default()
        };
        args.apply(&mut record);

        assert_eq!(record.name, "Run");
        assert_eq!(record.calories, 250);
        assert_eq!(record.average_load, "high");
        assert_eq!(record.dauer_seconds, 90);
    }
}
