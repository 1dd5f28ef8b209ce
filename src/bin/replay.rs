//! Replay a JSONL reading file through a fresh engine
//!
//! Prints each finalized aggregate to stdout in the downstream wire format and
//! a per-day summary to stderr. Useful for checking a capture offline before
//! pointing the runtime at it.
//!
//! Usage:
//!   cargo run --bin replay -- readings.jsonl
//!
//! Engine thresholds come from the same environment variables as `aqflow`.

use aqflow::pipeline::{decode_reading, DailyAggregationEngine, PipelineConfig};
use dotenv::dotenv;
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let path = env::args()
        .nth(1)
        .ok_or("usage: replay <readings.jsonl>")?;

    let config = PipelineConfig::from_env()?;
    let mut engine = DailyAggregationEngine::new(config.engine);

    let reader = BufReader::new(File::open(&path)?);
    let mut malformed = 0u64;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match decode_reading(&line) {
            Ok(reading) => {
                if let Some(aggregate) = engine.admit(reading) {
                    println!("{}", aggregate.to_json()?);
                }
            }
            Err(e) => {
                log::warn!("{}:{}: {}", path, line_no + 1, e);
                malformed += 1;
            }
        }
    }

    let snapshot = engine.snapshot();
    eprintln!("day         samples  finalized");
    for window in &snapshot.windows {
        eprintln!(
            "{}  {:>7}  {}",
            window.day,
            window.sample_count,
            if window.finalized { "yes" } else { "no" }
        );
    }
    eprintln!(
        "admitted={} outliers={} late={} malformed={}",
        snapshot.stats.admitted, snapshot.stats.outliers, snapshot.stats.late, malformed
    );

    Ok(())
}
