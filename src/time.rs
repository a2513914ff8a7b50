use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// Formats the `<seconds>.<microseconds>: ` prefix used by timestamped output.
///
/// ```
/// use ccnping::time::timestamp_prefix;
/// let at = chrono::DateTime::<chrono::Utc>::from_timestamp(1_700_000_000, 42_000).unwrap();
/// assert_eq!(timestamp_prefix(at), "1700000000.000042: ");
/// ```
pub fn timestamp_prefix(date: DateTime<Utc>) -> String {
    format!("{}.{:06}: ", date.timestamp(), date.timestamp_subsec_micros())
}

/// Writes protocol output lines to standard output, optionally timestamped.
///
/// A capturing printer keeps the lines in memory instead, for inspection.
#[derive(Debug, Clone, Default)]
pub struct Printer {
    timestamps: bool,
    capture: Option<Arc<Mutex<Vec<String>>>>,
}

impl Printer {
    pub fn new(timestamps: bool) -> Self {
        Printer {
            timestamps,
            capture: None,
        }
    }

    pub fn capturing(timestamps: bool) -> Self {
        Printer {
            timestamps,
            capture: Some(Arc::default()),
        }
    }

    /// Builds the line `println` would write at `now`.
    pub fn format_line(&self, now: DateTime<Utc>, message: &str) -> String {
        if self.timestamps {
            format!("{}{}", timestamp_prefix(now), message)
        } else {
            message.to_string()
        }
    }

    pub fn println(&self, message: &str) {
        let line = self.format_line(Utc::now(), message);
        match &self.capture {
            Some(lines) => match lines.lock() {
                Ok(mut lines) => lines.push(line),
                Err(poisoned) => poisoned.into_inner().push(line),
            },
            None => println!("{}", line),
        }
    }

    /// Lines written so far by a capturing printer; empty otherwise.
    pub fn captured(&self) -> Vec<String> {
        match &self.capture {
            Some(lines) => match lines.lock() {
                Ok(lines) => lines.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            },
            None => Vec::new(),
        }
    }
}
