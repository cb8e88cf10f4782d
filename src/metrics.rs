//! Per-agent invocation metrics.
//!
//! [`MetricLog`] is an append-only in-process record of every agent
//! invocation the orchestrator makes: one [`AgentMetricRecord`] per attempt,
//! retries included.  It exists for tests and operational introspection, not
//! for export — there is no sink beyond `snapshot()`.

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::agents::AgentKind;

// ---------------------------------------------------------------------------
// AgentMetricRecord
// ---------------------------------------------------------------------------

/// One agent invocation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentMetricRecord {
    pub agent: AgentKind,
    /// Wall-clock moment the invocation started.
    pub timestamp: SystemTime,
    pub duration: Duration,
    pub success: bool,
    /// Agent-specific quality signal, e.g. transcription confidence.
    pub quality_score: Option<f32>,
}

/// Aggregate view over one agent's records.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentStats {
    pub invocations: usize,
    pub failures: usize,
    pub total_duration: Duration,
    pub mean_quality: Option<f32>,
}

// ---------------------------------------------------------------------------
// MetricLog
// ---------------------------------------------------------------------------

/// Thread-safe append-only metric store.
#[derive(Debug, Default)]
pub struct MetricLog {
    records: Mutex<Vec<AgentMetricRecord>>,
}

impl MetricLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: AgentMetricRecord) {
        log::debug!(
            "metric: agent={} success={} duration={:?} quality={:?}",
            record.agent,
            record.success,
            record.duration,
            record.quality_score
        );
        self.records.lock().unwrap().push(record);
    }

    /// Copy of every record in insertion order.
    pub fn snapshot(&self) -> Vec<AgentMetricRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn records_for(&self, agent: AgentKind) -> Vec<AgentMetricRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.agent == agent)
            .cloned()
            .collect()
    }

    pub fn count_for(&self, agent: AgentKind) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.agent == agent)
            .count()
    }

    /// Aggregate one agent's records; `None` when it was never invoked.
    pub fn stats_for(&self, agent: AgentKind) -> Option<AgentStats> {
        let records = self.records_for(agent);
        if records.is_empty() {
            return None;
        }

        let failures = records.iter().filter(|r| !r.success).count();
        let total_duration = records.iter().map(|r| r.duration).sum();

        let scores: Vec<f32> = records.iter().filter_map(|r| r.quality_score).collect();
        let mean_quality = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f32>() / scores.len() as f32)
        };

        Some(AgentStats {
            invocations: records.len(),
            failures,
            total_duration,
            mean_quality,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(agent: AgentKind, success: bool, quality: Option<f32>) -> AgentMetricRecord {
        AgentMetricRecord {
            agent,
            timestamp: SystemTime::now(),
            duration: Duration::from_millis(25),
            success,
            quality_score: quality,
        }
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let log = MetricLog::new();
        log.record(record(AgentKind::SafetyGate, true, None));
        log.record(record(AgentKind::Description, false, None));
        log.record(record(AgentKind::Description, true, None));

        let all = log.snapshot();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].agent, AgentKind::SafetyGate);
        assert!(!all[1].success);
        assert!(all[2].success);
    }

    #[test]
    fn count_filters_by_agent() {
        let log = MetricLog::new();
        log.record(record(AgentKind::Generation, true, None));
        log.record(record(AgentKind::Transcription, true, Some(0.8)));

        assert_eq!(log.count_for(AgentKind::Generation), 1);
        assert_eq!(log.count_for(AgentKind::Transcription), 1);
        assert_eq!(log.count_for(AgentKind::SafetyGate), 0);
    }

    #[test]
    fn stats_aggregate_failures_and_quality() {
        let log = MetricLog::new();
        log.record(record(AgentKind::Transcription, true, Some(0.6)));
        log.record(record(AgentKind::Transcription, false, None));
        log.record(record(AgentKind::Transcription, true, Some(0.8)));

        let stats = log.stats_for(AgentKind::Transcription).unwrap();
        assert_eq!(stats.invocations, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.total_duration, Duration::from_millis(75));
        assert!((stats.mean_quality.unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn stats_for_uninvoked_agent_is_none() {
        let log = MetricLog::new();
        assert_eq!(log.stats_for(AgentKind::Generation), None);
    }
}
