use vefixer_core::{EnvironmentReport, MigrationSummary};

use crate::style::Style;

struct EnvironmentRow<'a> {
    report: &'a EnvironmentReport,
    root: String,
    python: String,
    result: &'static str,
    detail: String,
}

impl<'a> EnvironmentRow<'a> {
    fn new(report: &'a EnvironmentReport) -> Self {
        Self {
            report,
            root: report.root.display().to_string(),
            python: report
                .version
                .as_ref()
                .map_or_else(|| "?".to_string(), ToString::to_string),
            result: report.disposition.label(),
            detail: report.disposition.summary(),
        }
    }
}

/// One line per environment, padded into columns.
pub fn format_environment_table(style: &Style, summary: &MigrationSummary) -> Option<String> {
    if summary.environments.is_empty() {
        return None;
    }
    let rows = summary
        .environments
        .iter()
        .map(EnvironmentRow::new)
        .collect::<Vec<_>>();

    let headers = ["Environment", "Python", "Result"];
    let mut widths = headers.map(str::len);
    for row in &rows {
        widths[0] = widths[0].max(row.root.len());
        widths[1] = widths[1].max(row.python.len());
        widths[2] = widths[2].max(row.result.len());
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(style.table_header(&format!(
        "{:<w0$}  {:<w1$}  {:<w2$}  Detail",
        headers[0],
        headers[1],
        headers[2],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
    )));
    lines.push(format!(
        "{:-<w0$}  {:-<w1$}  {:-<w2$}  ------",
        "",
        "",
        "",
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
    ));
    for row in &rows {
        let result = format!("{:<w$}", row.result, w = widths[2]);
        lines.push(format!(
            "{:<w0$}  {:<w1$}  {}  {}",
            row.root,
            row.python,
            style.disposition(&row.report.disposition, &result),
            row.detail,
            w0 = widths[0],
            w1 = widths[1],
        ));
        if let Some(output) = &row.report.output {
            for line in output.stderr.lines().chain(output.stdout.lines()) {
                lines.push(style.dimmed(&format!("    {line}")));
            }
        }
    }
    Some(lines.join("\n"))
}

pub fn format_discovery_issues(style: &Style, summary: &MigrationSummary) -> Option<String> {
    if summary.discovery_issues.is_empty() {
        return None;
    }
    let lines = summary
        .discovery_issues
        .iter()
        .map(|issue| style.info(&format!("skipped during search: {issue}")))
        .collect::<Vec<_>>();
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use vefixer_core::{Disposition, MigrationState, PythonVersion, Reinstall, TargetManager};

    use super::*;

    fn report(root: &str, version: Option<&str>, disposition: Disposition) -> EnvironmentReport {
        EnvironmentReport {
            root: PathBuf::from(root),
            interpreter: PathBuf::from("/old/python"),
            version: version.and_then(PythonVersion::parse),
            disposition,
            output: None,
        }
    }

    fn summary(environments: Vec<EnvironmentReport>) -> MigrationSummary {
        MigrationSummary {
            target: TargetManager::Mise,
            dry_run: false,
            cancelled: false,
            environments,
            discovery_issues: Vec::new(),
        }
    }

    #[test]
    fn table_lists_every_environment() {
        let style = Style::new(true, false);
        let summary = summary(vec![
            report(
                "/src/app/.venv",
                Some("3.10.7"),
                Disposition::Migrated {
                    interpreter: PathBuf::from("/new/python"),
                    reinstall: Reinstall::NoStrategy,
                    renamed_config: false,
                },
            ),
            report(
                "/src/sys/.venv",
                None,
                Disposition::Aborted {
                    state: MigrationState::Probing,
                    reason: "cannot determine the Python version".into(),
                },
            ),
        ]);

        let table = format_environment_table(&style, &summary).expect("table");
        let lines = table.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Environment"));
        assert!(lines[2].contains("3.10.7") && lines[2].contains("migrated"));
        assert!(lines[3].contains('?') && lines[3].contains("aborted while probing"));
    }

    #[test]
    fn empty_runs_have_no_table() {
        let style = Style::new(true, false);
        assert!(format_environment_table(&style, &summary(Vec::new())).is_none());
        assert!(format_discovery_issues(&style, &summary(Vec::new())).is_none());
    }
}
