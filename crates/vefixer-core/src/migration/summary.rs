use serde::Serialize;
use serde_json::json;

use crate::outcome::ExecutionOutcome;
use crate::target::TargetManager;

use super::state::{Disposition, EnvironmentReport};

#[derive(Clone, Debug, Serialize)]
pub struct MigrationSummary {
    pub target: TargetManager,
    pub dry_run: bool,
    pub cancelled: bool,
    pub environments: Vec<EnvironmentReport>,
    /// Directories or links the walk had to skip.
    pub discovery_issues: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationCounts {
    pub migrated: usize,
    pub skipped: usize,
    pub unsupported: usize,
    pub failed: usize,
}

impl MigrationSummary {
    pub fn counts(&self) -> MigrationCounts {
        let mut counts = MigrationCounts::default();
        for report in &self.environments {
            match report.disposition {
                Disposition::Migrated { .. } => counts.migrated += 1,
                Disposition::Skipped { .. } => counts.skipped += 1,
                Disposition::Unsupported { .. } => counts.unsupported += 1,
                Disposition::Aborted { .. } | Disposition::Cancelled { .. } => counts.failed += 1,
            }
        }
        counts
    }

    pub fn has_failures(&self) -> bool {
        self.cancelled || self.environments.iter().any(|r| r.disposition.is_failure())
    }

    pub fn to_outcome(&self) -> ExecutionOutcome {
        let counts = self.counts();
        let mut details = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Some(map) = details.as_object_mut() {
            map.insert("counts".into(), json!(counts));
        }

        let prefix = if self.dry_run { "dry run: " } else { "" };
        if self.environments.is_empty() {
            let message = format!("{prefix}no virtual environments found");
            return if self.cancelled {
                ExecutionOutcome::failure(format!("{message} (cancelled)"), details)
            } else {
                ExecutionOutcome::success(message, details)
            };
        }

        let verb = if self.dry_run { "would migrate" } else { "migrated" };
        let mut message = format!(
            "{prefix}{verb} {}, skipped {}, failed {}",
            counts.migrated, counts.skipped, counts.failed
        );
        if counts.unsupported > 0 {
            message.push_str(&format!(
                ", {} unsupported for target {}",
                counts.unsupported, self.target
            ));
        }
        if self.cancelled {
            message.push_str(" (cancelled)");
        }
        if self.has_failures() {
            ExecutionOutcome::failure(message, details)
        } else {
            ExecutionOutcome::success(message, details)
        }
    }
}
