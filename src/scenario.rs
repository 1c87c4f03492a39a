use crate::block::{Placement, Shape};
use crate::error::Error;
use crate::handle::Strong;
use crate::report::{self, StatSource};

/// Payload size used by the demonstration binary: large enough that the
/// payload dominates every memory report.
pub const PAYLOAD_LEN: usize = 100 * 1024 * 1024;

/// Run one lifecycle scenario, printing a labelled memory report at each of
/// its five checkpoints.
///
/// Lifecycle: create one owning handle with the given placement and shape,
/// derive one observer from it, release the owning handle, release the
/// observer. Reports are taken at the baseline, after creation, after
/// deriving the observer, after releasing the owning handle, and after
/// releasing the observer.
///
/// The printed expectations describe what reference counting alone suggests;
/// whether the after-strong-release report actually stays elevated is decided
/// by the allocation topology, which is the effect under demonstration.
///
/// # Errors
///
/// Returns [`Error`] if the payload cannot be allocated or a memory report
/// fails. Either is fatal to the experiment.
pub fn run_scenario<S: StatSource>(
    source: &S,
    placement: Placement,
    shape: Shape,
    payload_len: usize,
) -> Result<(), Error> {
    println!("----- {} / {}", placement.label(), shape.label());
    info!(
        "scenario: {} / {} / {} bytes",
        placement.label(),
        shape.label(),
        payload_len
    );

    println!("Baseline before creation");
    report::report_memory_usage(source)?;

    let mut strong = Strong::allocate(placement, shape, payload_len)?;
    println!("Expectation: increased memory");
    report::report_memory_usage(source)?;

    let mut observer = strong.downgrade();
    println!("Expectation: no change from deriving an observer");
    report::report_memory_usage(source)?;

    strong.release();
    match placement {
        Placement::Combined => {
            println!("Expectation: observer keeps the block alive and the payload allocated");
        }
        Placement::Split => println!("Expectation: all back to normal"),
    }
    report::report_memory_usage(source)?;

    observer.release();
    println!("Expectation: all back to normal");
    report::report_memory_usage(source)?;

    Ok(())
}

/// Run the scenario whose bookkeeping and payload share one allocation.
///
/// # Errors
///
/// See [`run_scenario`].
pub fn run_combined_allocation_scenario<S: StatSource>(
    source: &S,
    shape: Shape,
    payload_len: usize,
) -> Result<(), Error> {
    run_scenario(source, Placement::Combined, shape, payload_len)
}

/// Run the scenario whose bookkeeping owns a separately allocated payload.
///
/// # Errors
///
/// See [`run_scenario`].
pub fn run_split_allocation_scenario<S: StatSource>(
    source: &S,
    shape: Shape,
    payload_len: usize,
) -> Result<(), Error> {
    run_scenario(source, Placement::Split, shape, payload_len)
}
