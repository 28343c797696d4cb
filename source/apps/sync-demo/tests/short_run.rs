//! CONTEXT: End-to-end runs of the demo workload on the host
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//!
//! TEST_SCOPE:
//!   - Every policy completes a short run and shuts down cleanly
//!   - Queue accounting balances at shutdown
//!   - Registry saturation surfaces as a setup error
//!
//! ADR: docs/adr/0001-sync-addons.md
use std::time::Duration;

use nexus_sync::RwPolicy;
use sync_demo::{run_for, DemoConfig, DemoError};

fn fast(policy: RwPolicy) -> DemoConfig {
    // Ten times the nominal tick rate: every delay shrinks tenfold.
    DemoConfig { tick_rate_hz: 10_000, policy, queue_capacity: 2, ..DemoConfig::default() }
}

#[test]
fn every_policy_runs_and_balances_the_queue() {
    for policy in RwPolicy::ALL {
        let summary = run_for(&fast(policy), Duration::from_millis(1500)).unwrap();
        assert!(summary.ticks > 0, "{policy}");
        assert!(summary.writes > 0, "{policy}");
        assert!(summary.reads > 0, "{policy}");
        assert_eq!(
            summary.produced,
            summary.consumed + summary.left_in_queue as u64,
            "{policy}"
        );
        assert_eq!(summary.hook_runs.len(), 3);
    }
}

#[test]
fn zero_capacity_is_rejected_before_running() {
    let config = DemoConfig { queue_capacity: 0, ..fast(RwPolicy::Balanced) };
    let err = run_for(&config, Duration::from_millis(10)).unwrap_err();
    assert!(matches!(err, DemoError::Sync(nexus_sync::Error::InvalidCapacity)));
}
