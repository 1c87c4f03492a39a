#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! Run the four allocation scenarios in a fixed sequence and print a memory
//! report at every lifecycle checkpoint.
//!
//! No flags, no configuration; set `WEAKHOLD_LOG` for diagnostic logging.

use std::process::ExitCode;

use weakhold::{
    report_memory_usage, run_combined_allocation_scenario, run_split_allocation_scenario, Error,
    ProcStat, Shape, PAYLOAD_LEN,
};

fn main() -> ExitCode {
    env_logger::Builder::from_env("WEAKHOLD_LOG").init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("weakhold: {err}");
            ExitCode::FAILURE
        }
    }
}

// Scenario order is fixed: each scenario's baseline is whatever process
// memory the previous one left behind.
fn run() -> Result<(), Error> {
    let source = ProcStat;

    println!("Memory at start");
    report_memory_usage(&source)?;

    println!();
    println!("Payload embedded in the control block");
    run_combined_allocation_scenario(&source, Shape::EmbeddedArray, PAYLOAD_LEN)?;
    run_split_allocation_scenario(&source, Shape::EmbeddedArray, PAYLOAD_LEN)?;

    println!();
    println!("Payload owned through a handle");
    run_combined_allocation_scenario(&source, Shape::BufferHandle, PAYLOAD_LEN)?;
    run_split_allocation_scenario(&source, Shape::BufferHandle, PAYLOAD_LEN)?;

    println!();
    println!("Memory before exit");
    report_memory_usage(&source)?;

    Ok(())
}
