//! Pending Interest table shared by the consumer faces.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::name::Name;

/// Interests awaiting Data, keyed by name, with their expiry deadlines.
#[derive(Debug, Default)]
pub struct PendingInterestTable {
    entries: HashMap<Name, Instant>,
}

impl PendingInterestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pending Interest. Returns false if the name is already pending.
    pub fn insert(&mut self, name: Name, deadline: Instant) -> bool {
        if self.entries.contains_key(&name) {
            return false;
        }
        self.entries.insert(name, deadline);
        true
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    /// Removes and returns the pending Interest that `data_name` satisfies.
    ///
    /// An exact match wins; otherwise the longest pending name that is a
    /// prefix of `data_name` is taken.
    pub fn satisfy(&mut self, data_name: &Name) -> Option<Name> {
        if self.entries.remove(data_name).is_some() {
            return Some(data_name.clone());
        }

        let matched = self
            .entries
            .keys()
            .filter(|name| name.is_prefix_of(data_name))
            .max_by_key(|name| name.len())
            .cloned()?;
        self.entries.remove(&matched);
        Some(matched)
    }

    /// Earliest deadline among pending Interests.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().min().copied()
    }

    /// Removes and returns every Interest whose deadline is at or before `now`,
    /// oldest first.
    pub fn expire(&mut self, now: Instant) -> Vec<Name> {
        let mut expired: Vec<(Instant, Name)> = self
            .entries
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(name, deadline)| (*deadline, name.clone()))
            .collect();
        expired.sort();

        for (_, name) in &expired {
            self.entries.remove(name);
        }
        expired.into_iter().map(|(_, name)| name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sleeps until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
