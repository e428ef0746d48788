//! # Prometheus Metrics
//!
//! Operational metrics for chain selection: how many candidates were
//! evaluated, how they were decided, and how deep the reorgs went.
//!
//! Each [`crate::chain::Blockchain`] owns its own [`prometheus::Registry`],
//! so independent chain instances in one process never share counters.
//! Embedders scrape it through [`ChainMetrics::encode`] or register the
//! registry with their own exporter.

use prometheus::core::Collector;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

use crate::finality::Decision;

/// Holds all Prometheus metric handles for one chain.
#[derive(Clone)]
pub struct ChainMetrics {
    registry: Registry,
    /// Candidate segments that reached a decision.
    pub segments_evaluated_total: IntCounter,
    pub head_switches_total: IntCounter,
    pub side_chains_total: IntCounter,
    /// Candidates refused by the artificial finality gate.
    pub finality_rejections_total: IntCounter,
    pub unknown_ancestors_total: IntCounter,
    pub validation_failures_total: IntCounter,
    /// Height of the canonical head.
    pub head_number: IntGauge,
    /// Canonical headers retired per head switch.
    pub reorg_depth: Histogram,
}

fn register<C: Collector + Clone + 'static>(registry: &Registry, metric: C) -> prometheus::Result<C> {
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

impl ChainMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("mess".into()), None)?;

        let segments_evaluated_total = register(
            &registry,
            IntCounter::new("segments_evaluated_total", "Candidate segments evaluated")?,
        )?;
        let head_switches_total = register(
            &registry,
            IntCounter::new("head_switches_total", "Candidates that became the canonical chain")?,
        )?;
        let side_chains_total = register(
            &registry,
            IntCounter::new("side_chains_total", "Candidates stored as side chains")?,
        )?;
        let finality_rejections_total = register(
            &registry,
            IntCounter::new(
                "finality_rejections_total",
                "Candidates rejected by the artificial finality gate",
            )?,
        )?;
        let unknown_ancestors_total = register(
            &registry,
            IntCounter::new(
                "unknown_ancestors_total",
                "Candidates with no common ancestor in retained history",
            )?,
        )?;
        let validation_failures_total = register(
            &registry,
            IntCounter::new("validation_failures_total", "Candidates failing header validation")?,
        )?;
        let head_number = register(
            &registry,
            IntGauge::new("head_number", "Height of the canonical head")?,
        )?;
        let reorg_depth = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new("reorg_depth", "Canonical headers retired per head switch")
                    .buckets(vec![0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 64.0, 256.0, 1024.0]),
            )?,
        )?;

        Ok(Self {
            registry,
            segments_evaluated_total,
            head_switches_total,
            side_chains_total,
            finality_rejections_total,
            unknown_ancestors_total,
            validation_failures_total,
            head_number,
            reorg_depth,
        })
    }

    /// Count a decision.
    pub fn observe_decision(&self, decision: &Decision) {
        self.segments_evaluated_total.inc();
        match decision {
            Decision::HeadSwitch => self.head_switches_total.inc(),
            Decision::SideChainAccepted => self.side_chains_total.inc(),
            Decision::Rejected(_) => self.finality_rejections_total.inc(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_are_counted() {
        let metrics = ChainMetrics::new().unwrap();
        metrics.observe_decision(&Decision::HeadSwitch);
        metrics.observe_decision(&Decision::SideChainAccepted);
        metrics.observe_decision(&Decision::HeadSwitch);

        assert_eq!(metrics.segments_evaluated_total.get(), 3);
        assert_eq!(metrics.head_switches_total.get(), 2);
        assert_eq!(metrics.side_chains_total.get(), 1);
        assert_eq!(metrics.finality_rejections_total.get(), 0);
    }

    #[test]
    fn encodes_with_namespace() {
        let metrics = ChainMetrics::new().unwrap();
        metrics.head_number.set(42);
        let text = metrics.encode().unwrap();
        assert!(text.contains("mess_head_number 42"));
        assert!(text.contains("mess_reorg_depth_bucket"));
    }

    #[test]
    fn instances_are_independent() {
        let a = ChainMetrics::new().unwrap();
        let b = ChainMetrics::new().unwrap();
        a.head_switches_total.inc();
        assert_eq!(b.head_switches_total.get(), 0);
    }
}
