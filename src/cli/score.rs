//! Score command: name similarity as used for test pairing

use anyhow::Result;

use super::output::Output;
use crate::domain::similarity;
use crate::storage::Config;

pub fn run(output: &Output, config: &Config, a: &str, b: &str) -> Result<()> {
    let score = similarity(a, b);
    let threshold = config.project.resolver.similarity_threshold;
    let matches = score > threshold;

    if output.is_json() {
        output.data(&serde_json::json!({
            "a": a,
            "b": b,
            "score": score,
            "threshold": threshold,
            "matches": matches,
        }));
    } else {
        let verdict = if matches { "match" } else { "no match" };
        println!("{} ({}, threshold {})", score, verdict, threshold);
    }

    Ok(())
}
