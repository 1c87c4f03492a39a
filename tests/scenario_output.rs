#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// The scenario runner reads `/proc/self/stat`.
#![cfg(target_os = "linux")]

use weakhold::{
    run_combined_allocation_scenario, run_split_allocation_scenario, ProcStat, Shape,
};

// Large enough to be meaningful, small enough to keep the test quick.
const PAYLOAD_LEN: usize = 32 * 1024 * 1024;

#[test]
fn all_four_scenarios_run_to_completion() {
    env_logger::Builder::from_env("WEAKHOLD_LOG").init();

    let source = ProcStat;
    for shape in [Shape::EmbeddedArray, Shape::BufferHandle] {
        run_combined_allocation_scenario(&source, shape, PAYLOAD_LEN)
            .expect("combined scenario failed");
        run_split_allocation_scenario(&source, shape, PAYLOAD_LEN)
            .expect("split scenario failed");
    }
}
