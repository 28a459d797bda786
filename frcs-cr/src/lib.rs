//! frcs-cr library: Conflict Resolution operator tool
//!
//! Walks the store's conflict groups, shows the operator every record of a
//! group side by side, and applies the chosen policy one group at a time.
//! Input and output are generic so a pass can be scripted in tests.

use anyhow::Result;
use frcs_common::resolve::{ConflictResolver, FieldDiff, ResolutionPolicy};
use frcs_common::store::{ConflictGroup, RowTable};
use frcs_common::FieldSchema;
use futures::TryStreamExt;
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// One operator answer at the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Apply(ResolutionPolicy),
    Skip,
    Quit,
}

/// Parse an answer for a group of `group_len` records
///
/// `1..=n` keeps that record, `a` averages, `s` skips, `q` quits.
pub fn parse_choice(input: &str, group_len: usize) -> Option<Choice> {
    let input = input.trim();
    match input.to_ascii_lowercase().as_str() {
        "a" => Some(Choice::Apply(ResolutionPolicy::Average)),
        "s" => Some(Choice::Skip),
        "q" => Some(Choice::Quit),
        _ => match input.parse::<usize>() {
            Ok(n) if (1..=group_len).contains(&n) => {
                Some(Choice::Apply(ResolutionPolicy::KeepIndex(n - 1)))
            }
            _ => None,
        },
    }
}

pub fn prompt_text(group_len: usize) -> String {
    let keep = if group_len == 2 {
        "1, 2".to_string()
    } else {
        format!("1..{}", group_len)
    };
    format!("Keep ({}), Average (a), Skip (s) or Quit (q)? ", keep)
}

/// Side-by-side table of every record in the group
///
/// Rows follow schema order; fields that disagree are marked with `*`.
pub fn render_group(schema: &FieldSchema, group: &ConflictGroup) -> String {
    let maps: Vec<_> = group.records().map(|r| r.to_field_map()).collect();

    let mut rows: Vec<(bool, String, Vec<String>)> = Vec::new();
    rows.push((
        false,
        "stored as".to_string(),
        group
            .members
            .iter()
            .map(|m| match m.row.table {
                RowTable::Canonical => "canonical".to_string(),
                RowTable::Parked => "parked".to_string(),
            })
            .collect(),
    ));
    for field in &schema.fields {
        let values: Vec<String> = maps
            .iter()
            .map(|m| m.get(&field.id).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        let differs = values.iter().any(|v| *v != values[0]);
        rows.push((differs, field.id.clone(), values));
    }
    rows.push((
        false,
        "ingested_at".to_string(),
        group
            .records()
            .map(|r| frcs_common::time::format_timestamp(&r.ingested_at))
            .collect(),
    ));

    let headers: Vec<String> = (1..=group.len()).map(|i| format!("#{}", i)).collect();
    let field_width = rows.iter().map(|(_, f, _)| f.chars().count()).max().unwrap_or(0);
    let widths: Vec<usize> = (0..group.len())
        .map(|col| {
            rows.iter()
                .map(|(_, _, values)| values[col].chars().count())
                .chain(std::iter::once(headers[col].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let line = |marker: &str, field: &str, cells: &[String]| {
        let cells: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        format!("{} {:<fw$}  {}", marker, field, cells.join("  "), fw = field_width)
            .trim_end()
            .to_string()
    };

    out.push_str(&line(" ", "field", &headers));
    out.push('\n');
    let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(" ", &"-".repeat(field_width), &rules));
    out.push('\n');
    for (differs, field, values) in &rows {
        out.push_str(&line(if *differs { "*" } else { " " }, field, values));
        out.push('\n');
    }
    out
}

/// One line per disagreeing field
pub fn render_diff(diffs: &[FieldDiff]) -> String {
    if diffs.is_empty() {
        return "No field differences; the records are identical.\n".to_string();
    }

    let mut out = format!("{} field(s) differ:\n", diffs.len());
    for diff in diffs {
        let values: Vec<String> = diff.values.iter().map(|v| v.to_string()).collect();
        out.push_str(&format!("  {}: {}\n", diff.field, values.join(" | ")));
    }
    out
}

fn render_header(index: usize, group: &ConflictGroup) -> String {
    format!(
        "=== Conflict {}: {} ({} records) ===",
        index,
        group.key,
        group.len()
    )
}

/// Print every conflict group without changing anything
pub async fn list_conflicts<W: Write>(resolver: &ConflictResolver, out: &mut W) -> Result<usize> {
    let schema = resolver.store().schema();
    let mut count = 0;

    let mut groups = Box::pin(resolver.list_conflicts());
    while let Some(group) = groups.try_next().await? {
        count += 1;
        writeln!(out, "{}", render_header(count, &group))?;
        write!(out, "{}", render_group(schema, &group))?;
        write!(out, "{}", render_diff(&resolver.diff(&group)))?;
        writeln!(out)?;
    }

    if count == 0 {
        writeln!(out, "No conflicts found.")?;
    } else {
        writeln!(out, "{} conflict group(s).", count)?;
    }
    Ok(count)
}

/// Outcome counts for one reconciliation pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub resolved: usize,
    pub skipped: usize,
    pub failed: usize,
    /// The pass was cut short by `interrupt` (Ctrl+C)
    pub interrupted: bool,
}

/// Interactive reconciliation pass
///
/// Holds the maintenance lock for the whole pass. A group whose merge fails
/// is reported and left intact; the pass moves on to the next group. When
/// `interrupt` resolves first, the pass stops where it is and the lock is
/// still released.
pub async fn run_pass<R, W, F>(
    resolver: &ConflictResolver,
    input: &mut R,
    out: &mut W,
    interrupt: F,
) -> Result<PassSummary>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    F: Future<Output = ()>,
{
    resolver.begin_pass().await?;

    let mut summary = PassSummary::default();
    let interrupted = tokio::select! {
        result = resolve_groups(resolver, input, out, &mut summary) => result.map(|()| false),
        _ = interrupt => Ok(true),
    };
    resolver.end_pass().await?;
    summary.interrupted = interrupted?;

    if summary.interrupted {
        warn!("Reconciliation pass interrupted");
        writeln!(out, "\nInterrupted; remaining conflicts are left for a later pass.")?;
    }
    writeln!(
        out,
        "Resolved: {}, Skipped: {}, Failed: {}",
        summary.resolved, summary.skipped, summary.failed
    )?;
    info!(
        "Reconciliation pass complete: {} resolved, {} skipped, {} failed",
        summary.resolved, summary.skipped, summary.failed
    );
    Ok(summary)
}

async fn resolve_groups<R, W>(
    resolver: &ConflictResolver,
    input: &mut R,
    out: &mut W,
    summary: &mut PassSummary,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let schema = resolver.store().schema();
    let mut index = 0;

    let mut groups = Box::pin(resolver.list_conflicts());
    while let Some(group) = groups.try_next().await? {
        index += 1;
        let diffs = resolver.diff(&group);
        writeln!(out, "{}", render_header(index, &group))?;
        write!(out, "{}", render_group(schema, &group))?;
        write!(out, "{}", render_diff(&diffs))?;

        let choice = loop {
            write!(out, "{}", prompt_text(group.len()))?;
            out.flush()?;

            let mut answer = String::new();
            if input.read_line(&mut answer).await? == 0 {
                break Choice::Quit;
            }
            match parse_choice(&answer, group.len()) {
                Some(choice) => break choice,
                None => writeln!(out, "Invalid choice '{}'", answer.trim())?,
            }
        };

        let policy = match choice {
            Choice::Apply(policy) => policy,
            Choice::Skip => {
                summary.skipped += 1;
                writeln!(out, "Skipped {}\n", group.key)?;
                continue;
            }
            Choice::Quit => {
                writeln!(out, "Stopping; remaining conflicts are left for a later pass.")?;
                break;
            }
        };

        match resolver.resolve(&group, policy).await {
            Ok(survivor) => {
                summary.resolved += 1;
                let how = match policy {
                    ResolutionPolicy::KeepIndex(i) => format!("kept record #{}", i + 1),
                    ResolutionPolicy::Average => "averaged".to_string(),
                };
                writeln!(
                    out,
                    "✓ Resolved {} ({}, scouted by {})\n",
                    group.key, how, survivor.scouter_name
                )?;
            }
            Err(e) => {
                summary.failed += 1;
                warn!("Resolution of {} failed: {}", group.key, e);
                writeln!(out, "✗ Failed to resolve {}: {}", group.key, e)?;
                write!(out, "{}", render_diff(&diffs))?;
                writeln!(out, "The group is unchanged and will be offered again next pass.\n")?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use frcs_common::record::{Alliance, FieldMap, IdentityKey, ObservationRecord};
    use frcs_common::store::{RowRef, StoredRecord};
    use frcs_common::FieldValue;

    #[test]
    fn test_parse_choice() {
        let keep = |i| Some(Choice::Apply(ResolutionPolicy::KeepIndex(i)));
        assert_eq!(parse_choice("1", 2), keep(0));
        assert_eq!(parse_choice(" 2\n", 2), keep(1));
        assert_eq!(parse_choice("3", 3), keep(2));
        assert_eq!(parse_choice("A", 2), Some(Choice::Apply(ResolutionPolicy::Average)));
        assert_eq!(parse_choice("s", 2), Some(Choice::Skip));
        assert_eq!(parse_choice("q", 2), Some(Choice::Quit));
        assert_eq!(parse_choice("3", 2), None);
        assert_eq!(parse_choice("0", 2), None);
        assert_eq!(parse_choice("", 2), None);
        assert_eq!(parse_choice("average", 2), None);
    }

    #[test]
    fn test_prompt_text() {
        assert_eq!(prompt_text(2), "Keep (1, 2), Average (a), Skip (s) or Quit (q)? ");
        assert_eq!(prompt_text(4), "Keep (1..4), Average (a), Skip (s) or Quit (q)? ");
    }

    fn member(id: i64, table: RowTable, scouter: &str, upper: i64) -> StoredRecord {
        let schema = FieldSchema::builtin();
        let mut attributes: FieldMap = schema
            .attribute_fields()
            .filter_map(|f| f.default_value().map(|v| (f.id.clone(), v)))
            .collect();
        attributes.insert("auto_balls_scored_upper".into(), FieldValue::Integer(upper));

        StoredRecord {
            row: RowRef { table, id },
            record: ObservationRecord {
                key: IdentityKey::new(9, 2910, Alliance::Blue),
                scouter_name: scouter.to_string(),
                submitted_at: "2024-03-02T10:15:00Z".to_string(),
                ingested_at: Utc.with_ymd_and_hms(2024, 3, 2, 10, 16, 0).unwrap(),
                attributes,
            },
        }
    }

    fn group() -> ConflictGroup {
        ConflictGroup {
            key: IdentityKey::new(9, 2910, Alliance::Blue),
            members: vec![
                member(4, RowTable::Canonical, "Ada", 2),
                member(1, RowTable::Parked, "Grace", 5),
            ],
        }
    }

    #[test]
    fn test_render_group_marks_differing_fields() {
        let table = render_group(&FieldSchema::builtin(), &group());
        let line = |field: &str| {
            table
                .lines()
                .find(|l| l[2..].starts_with(&format!("{} ", field)))
                .unwrap_or_else(|| panic!("no row for {}", field))
                .to_string()
        };

        assert!(table.lines().next().unwrap().contains("#1"));
        assert!(line("stored as").contains("canonical"));
        assert!(line("stored as").contains("parked"));
        assert!(line("auto_balls_scored_upper").starts_with('*'));
        assert!(line("scouter_name").starts_with('*'));
        assert!(line("team_number").starts_with(' '));
        assert!(line("team_number").contains("2910"));
        assert!(line("climb_level").contains("\"\""));
    }

    #[test]
    fn test_render_diff() {
        let diffs = frcs_common::resolve::diff(&FieldSchema::builtin(), &group());
        let text = render_diff(&diffs);
        assert!(text.starts_with("2 field(s) differ:"));
        assert!(text.contains("  scouter_name: Ada | Grace\n"));
        assert!(text.contains("  auto_balls_scored_upper: 2 | 5\n"));

        assert!(render_diff(&[]).contains("identical"));
    }
}
