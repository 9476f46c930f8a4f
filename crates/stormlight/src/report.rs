//! Live snapshot reporting

use std::io::Write;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::error::Result;
use crate::metrics::{Metrics, Snapshot, SnapshotRow};

/// Table column headers, in render order
pub const HEADERS: [&str; 9] = [
    "Method",
    "Endpoint",
    "RPS",
    "Median (ms)",
    "Average (ms)",
    "Min (ms)",
    "Max (ms)",
    "Failed Requests",
    "Total Requests",
];

/// Destination for rendered snapshots
pub trait SnapshotSink: Send + Sync {
    fn render(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Writes each snapshot as a plain text table
pub struct TableSink<W: Write + Send> {
    out: Mutex<W>,
}

impl TableSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TableSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> SnapshotSink for TableSink<W> {
    fn render(&self, snapshot: &Snapshot) -> Result<()> {
        let mut out = self.out.lock();
        writeln!(out, "{}\n", render_table(snapshot))?;
        out.flush()?;
        Ok(())
    }
}

fn cells(row: &SnapshotRow) -> [String; 9] {
    [
        row.method.clone().unwrap_or_else(|| "total".to_string()),
        row.endpoint.clone().unwrap_or_default(),
        format!("{:.2}", row.rps),
        row.median.map_or_else(|| "-".to_string(), |m| m.to_string()),
        format!("{:.2}", row.average),
        row.min.map_or_else(|| "-".to_string(), |m| format!("{:.2}", m)),
        format!("{:.2}", row.max),
        row.failures.to_string(),
        row.requests.to_string(),
    ]
}

/// Render a snapshot as an aligned table: text columns left-aligned,
/// numeric columns right-aligned, a rule above the aggregate row.
pub fn render_table(snapshot: &Snapshot) -> String {
    let rows: Vec<[String; 9]> = snapshot.entries.iter().map(cells).collect();
    let total = cells(&snapshot.total);

    let mut widths = HEADERS.map(str::len);
    for row in rows.iter().chain(std::iter::once(&total)) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: &[String; 9]| -> String {
        cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(col, (cell, width))| {
                if col < 2 {
                    format!("{:<width$}", cell, width = width)
                } else {
                    format!("{:>width$}", cell, width = width)
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let rule = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("  ");

    let mut table = vec![line(&HEADERS.map(String::from)), rule.clone()];
    table.extend(rows.iter().map(&line));
    table.push(rule);
    table.push(line(&total));
    table.join("\n")
}

/// Render a snapshot every `interval` until `end_time`.
///
/// The final sleep is clipped to the deadline.
pub async fn report_metrics(
    metrics: &Metrics,
    sink: &dyn SnapshotSink,
    end_time: Instant,
    interval: Duration,
) -> Result<()> {
    while Instant::now() < end_time {
        sink.render(&metrics.snapshot())?;
        sleep_until((Instant::now() + interval).min(end_time)).await;
    }
    Ok(())
}
