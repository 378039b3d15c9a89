//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `plan <edges>` | Print deployment groups, untested subjects and cycle diagnostics |
//! | `manifest <edges> <catalog>` | Write `package-all.xml` and one manifest per group |
//! | `score <a> <b>` | Show the name similarity used for test pairing |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output; it also raises the log
//! filter to `debug` unless `RUST_LOG` says otherwise:
//! ```bash
//! metastage --verbose plan dependencies.json
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod plan;
mod manifest_cmd;
mod score;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
