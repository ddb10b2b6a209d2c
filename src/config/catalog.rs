//! Built-in class catalogue for the reference board.

use crate::config::EngineConfig;
use crate::core::{AggregationRule, ClassSpec, PairSpec};

/// Default for latency classes, in microseconds.
pub const LATENCY_DEFAULT_USEC: i32 = 2_000_000_000;
/// Default for the throughput floor, in kB/s.
pub const THROUGHPUT_DEFAULT_KBS: i32 = 0;
/// Default for ceiling classes: no ceiling.
pub const UNCONSTRAINED_CEILING: i32 = i32::MAX;

/// CPU, GPU and DDR each expose the same four profile classes.
const PROFILE_DOMAINS: [&str; 3] = ["cpu", "gpu", "ddr"];

impl EngineConfig {
    /// Catalogue matching the reference board's power-management classes.
    pub fn platform_default() -> Self {
        let cpus = i32::try_from(num_cpus::get()).unwrap_or(i32::MAX);
        let mut classes = vec![
            ClassSpec::new("cpu_dma_latency", AggregationRule::Min, LATENCY_DEFAULT_USEC),
            ClassSpec::new("network_latency", AggregationRule::Min, LATENCY_DEFAULT_USEC),
            ClassSpec::new("network_throughput", AggregationRule::Max, THROUGHPUT_DEFAULT_KBS),
        ];
        let mut pairs = Vec::new();

        for domain in PROFILE_DOMAINS {
            classes.push(ClassSpec::new(
                format!("{domain}_maxprofile"),
                AggregationRule::Min,
                UNCONSTRAINED_CEILING,
            ));
            classes.push(ClassSpec::new(format!("{domain}_minprofile"), AggregationRule::Max, 0));
            classes.push(ClassSpec::new(format!("{domain}_profile_block"), AggregationRule::Max, 0));
            classes.push(ClassSpec::new(format!("{domain}_profile_safe"), AggregationRule::Max, 0));
            pairs.push(PairSpec::new(
                format!("{domain}_minprofile"),
                format!("{domain}_maxprofile"),
            ));
        }

        classes.extend([
            ClassSpec::new("cpu_number_lock", AggregationRule::Max, 0),
            ClassSpec::new("cpu_number_max", AggregationRule::Min, cpus),
            ClassSpec::new("cpu_number_min", AggregationRule::Max, 1),
            ClassSpec::new("cpu_number_safe", AggregationRule::Min, cpus),
            ClassSpec::new("ipps_policy", AggregationRule::Max, 0),
        ]);
        pairs.push(PairSpec::new("cpu_number_min", "cpu_number_max"));

        Self { classes, pairs }
    }
}
