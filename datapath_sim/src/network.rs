//! Simulated media probe with fault injection.

use async_trait::async_trait;
use datapath_env::{EnvError, MediaProbe};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Scripted outcome for one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFault {
    /// Server answers with an error
    Unreachable,
    /// Probe exceeds its timeout
    Timeout,
}

/// Media probe answering from a scripted table.
///
/// Locations are reachable once `publish`ed unless a fault is injected.
#[derive(Debug, Default)]
pub struct SimProbe {
    published: Mutex<HashSet<String>>,
    faults: Mutex<HashMap<String, ProbeFault>>,
    /// Probe count per location
    calls: Mutex<HashMap<String, usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a location reachable.
    pub fn publish(&self, location: impl Into<String>) {
        lock(&self.published).insert(location.into());
    }

    pub fn inject_fault(&self, location: impl Into<String>, fault: ProbeFault) {
        lock(&self.faults).insert(location.into(), fault);
    }

    /// Clears all injected faults.
    pub fn heal_all(&self) {
        lock(&self.faults).clear();
    }

    pub fn calls(&self, location: &str) -> usize {
        lock(&self.calls).get(location).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }
}

#[async_trait]
impl MediaProbe for SimProbe {
    async fn probe(&self, location: &str) -> Result<bool, EnvError> {
        *lock(&self.calls).entry(location.to_string()).or_insert(0) += 1;

        let fault = lock(&self.faults).get(location).copied();
        match fault {
            Some(ProbeFault::Unreachable) => Err(EnvError::network(format!("{} unreachable", location))),
            Some(ProbeFault::Timeout) => Err(EnvError::Timeout(1200)),
            None => Ok(lock(&self.published).contains(location)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_published_locations_are_reachable() {
        let probe = SimProbe::new();
        assert!(!probe.probe("walk/a.mp4").await.unwrap());

        probe.publish("walk/a.mp4");
        assert!(probe.probe("walk/a.mp4").await.unwrap());
        assert_eq!(probe.calls("walk/a.mp4"), 2);
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let probe = SimProbe::new();
        probe.publish("a.mp4");
        probe.inject_fault("a.mp4", ProbeFault::Timeout);
        assert!(matches!(probe.probe("a.mp4").await, Err(EnvError::Timeout(_))));

        probe.inject_fault("a.mp4", ProbeFault::Unreachable);
        assert!(matches!(probe.probe("a.mp4").await, Err(EnvError::NetworkError(_))));

        probe.heal_all();
        assert!(probe.probe("a.mp4").await.unwrap());
        assert_eq!(probe.total_calls(), 3);
    }
}
