//! Statistics collection, computation, and formatted output.
//!
//! The client accumulates running RTT aggregates in `Statistics` and derives
//! loss, mean and deviation only when a report is produced. The server keeps
//! a much smaller summary of what it answered.

use serde::Serialize;
use tokio::time::Instant;

/// Output format for statistics reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for machine consumption.
    Json,
}

/// Running totals for one ping session.
#[derive(Debug, Clone)]
pub struct Statistics {
    prefix: String,
    sent: u64,
    received: u64,
    start: Instant,
    min: f64,
    max: f64,
    sum_rtt: f64,
    sum_rtt_squared: f64,
}

impl Statistics {
    /// Starts a new accumulator; the session clock starts now.
    pub fn new(prefix: impl Into<String>) -> Self {
        Statistics {
            prefix: prefix.into(),
            sent: 0,
            received: 0,
            start: Instant::now(),
            min: f64::MAX,
            max: 0.0,
            sum_rtt: 0.0,
            sum_rtt_squared: 0.0,
        }
    }

    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    /// Records one received response with its round-trip time in milliseconds.
    pub fn record_rtt(&mut self, rtt_ms: f64) {
        self.received += 1;
        if rtt_ms < self.min {
            self.min = rtt_ms;
        }
        if rtt_ms > self.max {
            self.max = rtt_ms;
        }
        self.sum_rtt += rtt_ms;
        self.sum_rtt_squared += rtt_ms * rtt_ms;
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derives the report figures as of now.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> StatsSnapshot {
        let elapsed_ms = now.saturating_duration_since(self.start).as_millis() as u64;

        let loss_percent = if self.sent > 0 {
            Some(self.sent.saturating_sub(self.received) as f64 * 100.0 / self.sent as f64)
        } else {
            None
        };

        let (min_ms, avg_ms, max_ms, mdev_ms) = if self.received > 0 {
            let n = self.received as f64;
            let avg = self.sum_rtt / n;
            // Rounding can push the variance slightly below zero.
            let variance = (self.sum_rtt_squared / n - avg * avg).max(0.0);
            (
                Some(self.min),
                Some(avg),
                Some(self.max),
                Some(variance.sqrt()),
            )
        } else {
            (None, None, None, None)
        };

        StatsSnapshot {
            prefix: self.prefix.clone(),
            sent: self.sent,
            received: self.received,
            loss_percent,
            elapsed_ms,
            min_ms,
            avg_ms,
            max_ms,
            mdev_ms,
        }
    }
}

/// Serializable report derived from `Statistics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub prefix: String,
    pub sent: u64,
    pub received: u64,
    pub loss_percent: Option<f64>,
    pub elapsed_ms: u64,
    pub min_ms: Option<f64>,
    pub avg_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub mdev_ms: Option<f64>,
}

impl StatsSnapshot {
    /// Prints the final summary in the given format.
    pub fn print(&self, format: OutputFormat) {
        match format {
            OutputFormat::Text => print!("{}", self.to_text()),
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(self) {
                    println!("{}", json);
                }
            }
        }
    }

    /// Renders the ping-style text report, one line per figure group.
    pub fn to_text(&self) -> String {
        let mut out = format!("\n--- {} ping statistics ---\n", self.prefix);

        if let Some(loss) = self.loss_percent {
            out.push_str(&format!(
                "{} Interests transmitted, {} Data received, {:.1}% packet loss, time {} ms\n",
                self.sent, self.received, loss, self.elapsed_ms
            ));
        }

        if let (Some(min), Some(avg), Some(max), Some(mdev)) =
            (self.min_ms, self.avg_ms, self.max_ms, self.mdev_ms)
        {
            out.push_str(&format!(
                "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms\n",
                min, avg, max, mdev
            ));
        }

        out
    }
}

/// Serializable responder summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponderStats {
    pub prefix: String,
    pub interests_received: u64,
    pub interests_answered: u64,
    pub uptime_seconds: f64,
}

impl ResponderStats {
    /// Prints the responder summary in the given format.
    pub fn print(&self, format: OutputFormat) {
        match format {
            OutputFormat::Text => print!("{}", self.to_text()),
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(self) {
                    println!("{}", json);
                }
            }
        }
    }

    pub fn to_text(&self) -> String {
        format!(
            "\n--- {} ping server statistics ---\n\
             {} Interests received, {} Interests answered, uptime {:.1} s\n",
            self.prefix, self.interests_received, self.interests_answered, self.uptime_seconds
        )
    }
}
