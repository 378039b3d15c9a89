//! metastage - deployment groups and package manifests from metadata dependencies

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = metastage::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
