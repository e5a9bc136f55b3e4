//! Plain-text and JSON rendering of tracker records.

use anyhow::Result;
use gtd_core::{ProjectRecord, StepView};
use serde::Serialize;

/// Where and how command results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn projects(&self, projects: &[ProjectRecord]) -> Result<()> {
        if self.json {
            return self.json(projects);
        }
        if projects.is_empty() {
            println!("No projects.");
        }
        for project in projects {
            println!("{}", project_line(project));
        }
        Ok(())
    }

    pub fn steps(&self, steps: &[StepView]) -> Result<()> {
        if self.json {
            return self.json(steps);
        }
        if steps.is_empty() {
            println!("No steps.");
        }
        for step in steps {
            println!("{}", step_line(step));
        }
        Ok(())
    }

    pub fn names(&self, names: &[String]) -> Result<()> {
        if self.json {
            return self.json(names);
        }
        for name in names {
            println!("{}", name);
        }
        Ok(())
    }

    pub fn message(&self, text: &str) {
        if !self.json {
            println!("{}", text);
        }
    }
}

/// `H:MM:SS`, hours unbounded.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

pub fn project_line(project: &ProjectRecord) -> String {
    let mut line = format!("{:>3}. [{}] {}", project.sort_order, project.id, project.name);
    if !project.kategorie.is_empty() {
        line.push_str(&format!("  #{}", project.kategorie));
    }
    if !project.status.is_empty() {
        line.push_str(&format!("  ({})", project.status));
    }
    line
}

pub fn step_line(step: &StepView) -> String {
    let record = &step.record;
    let marker = if record.is_running { ">" } else { " " };
    let mut line = format!(
        "{} {:>3}. [{}] {}  {}",
        marker,
        record.sort_order,
        record.id,
        record.name,
        format_duration(step.live_elapsed_seconds)
    );
    if record.ziel_zeit_seconds > 0 {
        line.push_str(&format!(" / {}", format_duration(record.ziel_zeit_seconds)));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtd_core::{ProjectId, StepRecord};

    #[test]
    fn durations_render_as_hours_minutes_seconds() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(165), "0:02:45");
        assert_eq!(format_duration(3_600 * 27 + 61), "27:01:01");
        assert_eq!(format_duration(-5), "0:00:00");
    }

    #[test]
    fn project_line_shows_tags() {
        let project = ProjectRecord {
            id: ProjectId(4),
            sort_order: 2,
            kategorie: "Work".into(),
            status: "Open".into(),
            ..ProjectRecord::new("Taxes")
        };
        assert_eq!(project_line(&project), "  2. [4] Taxes  #Work  (Open)");
    }

    #[test]
    fn step_line_marks_running_steps() {
        let record = StepRecord {
            sort_order: 1,
            is_running: true,
            ziel_zeit_seconds: 1800,
            ..StepRecord::new(ProjectId(1), "Run")
        };
        let view = StepView {
            record,
            live_elapsed_seconds: 165,
        };
        assert_eq!(step_line(&view), ">   1. [0] Run  0:02:45 / 0:30:00");
    }
}
