//! Kodegen Bundler MSI - installer database binder.
//!
//! This binary binds a linked intermediate into an installer database and
//! lays out its cabinets and uncompressed files next to it.

use kodegen_bundler_msi::cli;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    process::exit(exit_code);
}
