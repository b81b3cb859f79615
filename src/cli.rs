//! Minimal CLI parsing for run mode overrides.

use std::env;

#[derive(Debug, Default)]
pub struct CliOptions {
    /// Run a single scan and exit instead of scheduling
    pub once: bool,
    /// Override the configured scan limit
    pub limit: Option<usize>,
}

impl CliOptions {
    pub fn from_args() -> Self {
        let mut options = CliOptions::default();
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--once" => options.once = true,
                "--limit" => {
                    if let Some(value) = args.next() {
                        options.limit = value.parse().ok();
                    }
                }
                _ if arg.starts_with("--limit=") => {
                    if let Some(value) = arg.split_once('=').map(|(_, v)| v) {
                        options.limit = value.parse().ok();
                    }
                }
                _ => {}
            }
        }
        options
    }
}
