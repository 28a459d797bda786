//! Scan feed
//!
//! Ingests decoded QR texts arriving one per line, as written by the camera
//! decoder. Each outcome is printed as a single status line so the operator
//! at the scanning station can glance and move on to the next tablet.

use frcs_common::ingest::{IngestOutcome, IngestPipeline, RejectReason};
use frcs_common::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

/// Typing this on its own line prints store statistics
pub const STATS_COMMAND: &str = "s";

/// Counts for one scan session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanTotals {
    pub accepted: usize,
    pub identical: usize,
    pub conflicting: usize,
    pub rejected: usize,
    /// Lines skipped as a repeat of the previous scan
    pub repeats: usize,
}

pub struct ScanFeed {
    pipeline: IngestPipeline,
    suppress_repeats: bool,
    last_scan: Option<String>,
    totals: ScanTotals,
}

impl ScanFeed {
    /// With `suppress_repeats`, a line equal to the previous scan is skipped,
    /// since a code held in front of the camera decodes on every frame
    pub fn new(pipeline: IngestPipeline, suppress_repeats: bool) -> Self {
        Self {
            pipeline,
            suppress_repeats,
            last_scan: None,
            totals: ScanTotals::default(),
        }
    }

    pub fn totals(&self) -> ScanTotals {
        self.totals
    }

    /// Process lines until end of input
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<ScanTotals>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            self.handle_line(&line, out).await?;
        }

        writeln!(
            out,
            "Session: {} saved, {} already recorded, {} conflicts parked, {} rejected",
            self.totals.accepted, self.totals.identical, self.totals.conflicting, self.totals.rejected
        )?;
        Ok(self.totals)
    }

    /// Process one input line
    pub async fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        if line == STATS_COMMAND {
            return self.print_stats(out).await;
        }

        if self.suppress_repeats && self.last_scan.as_deref() == Some(line) {
            debug!("Skipping repeat of previous scan");
            self.totals.repeats += 1;
            return Ok(());
        }
        self.last_scan = Some(line.to_string());

        let report = self.pipeline.ingest(line).await;
        let label = report
            .record
            .as_ref()
            .map(|r| r.key.to_string())
            .unwrap_or_else(|| report.summary.clone());

        match report.outcome {
            IngestOutcome::Accepted => {
                self.totals.accepted += 1;
                writeln!(out, "✓ Saved: {}", label)?;
            }
            IngestOutcome::DuplicateIdentical => {
                self.totals.identical += 1;
                writeln!(out, "= Already recorded: {}", label)?;
            }
            IngestOutcome::DuplicateConflicting => {
                self.totals.conflicting += 1;
                writeln!(out, "! Conflict parked: {} (resolve with frcs-cr)", label)?;
            }
            IngestOutcome::Rejected(reason) => {
                self.totals.rejected += 1;
                writeln!(out, "✗ {}", report.summary)?;
                if reason == RejectReason::Store {
                    // Nothing was written; the same code must go through on a rescan
                    self.last_scan = None;
                    writeln!(out, "  Rescan the code to retry.")?;
                }
            }
        }
        Ok(())
    }

    async fn print_stats<W: Write>(&self, out: &mut W) -> Result<()> {
        let store = self.pipeline.store();
        let stats = store.stats().await?;

        writeln!(out, "=== Database Statistics ===")?;
        writeln!(out, "Match records:   {}", stats.match_records)?;
        writeln!(out, "Unique teams:    {}", stats.unique_teams)?;
        writeln!(out, "Parked records:  {}", stats.parked_records)?;
        writeln!(out, "Open conflicts:  {}", stats.conflict_groups)?;

        let recent = store.recent(5).await?;
        if !recent.is_empty() {
            writeln!(out, "Recent entries:")?;
            for record in recent {
                writeln!(out, "  {} by {}", record.key, record.scouter_name)?;
            }
        }
        Ok(())
    }
}
