//! Replays a WAV file through the analyzer, one pass per block, and prints
//! a JSON summary of the decisions.

use std::path::PathBuf;
use std::time::Instant;

use adquiet_core::{
    audio::{wav::WavBackend, DEFAULT_BLOCK_SIZE, SAMPLE_RATE},
    AnalyzerSession,
};
use anyhow::{anyhow, bail, Context};
use serde::Serialize;

const DEFAULT_THRESHOLD: i32 = 70;

#[derive(Debug)]
struct Args {
    input: PathBuf,
    threshold: i32,
    block_size: usize,
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockResult {
    index: usize,
    start_secs: f64,
    low_energy: f64,
    mid_energy: f64,
    high_energy: f64,
    /// `null` for a silent block.
    loudness_db: f64,
    probability: f64,
    is_advertisement: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    input: String,
    threshold: i32,
    block_size: usize,
    blocks: usize,
    positives: usize,
    positive_rate: f64,
    avg_probability: f64,
    elapsed_ms: f64,
    results: Vec<BlockResult>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut input: Option<PathBuf> = None;
    let mut threshold = DEFAULT_THRESHOLD;
    let mut block_size = DEFAULT_BLOCK_SIZE;
    let mut output: Option<PathBuf> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--input" => {
                let v = it.next().ok_or_else(|| anyhow!("missing value for --input"))?;
                input = Some(PathBuf::from(v));
            }
            "--threshold" => {
                let v = it
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --threshold"))?;
                threshold = v
                    .parse::<i32>()
                    .with_context(|| format!("invalid value for --threshold: {v}"))?;
            }
            "--block-size" => {
                let v = it
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --block-size"))?;
                block_size = v
                    .parse::<usize>()
                    .with_context(|| format!("invalid value for --block-size: {v}"))?;
            }
            "--output" => {
                let v = it.next().ok_or_else(|| anyhow!("missing value for --output"))?;
                output = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: adquiet-replay --input <file.wav> [--threshold <n>] \\
  [--block-size <n>] [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    let Some(input) = input else {
        bail!("--input is required");
    };
    Ok(Args {
        input,
        threshold,
        block_size,
        output,
    })
}

fn run() -> anyhow::Result<()> {
    let args = parse_args()?;
    if !args.input.exists() {
        bail!("input file not found: {}", args.input.display());
    }

    let session = AnalyzerSession::new(WavBackend::new(&args.input, args.block_size))?;
    session
        .initialize()
        .with_context(|| format!("opening {}", args.input.display()))?;

    let started = Instant::now();
    let mut results = Vec::new();
    loop {
        let is_advertisement = session.detect_advertisement_blocking(args.threshold);
        // A short read at end of file leaves no classification behind.
        let Some(classification) = session.last_classification() else {
            break;
        };

        let index = results.len();
        let features = classification.features;
        results.push(BlockResult {
            index,
            start_secs: (index * args.block_size) as f64 / f64::from(SAMPLE_RATE),
            low_energy: features.low_energy,
            mid_energy: features.mid_energy,
            high_energy: features.high_energy,
            loudness_db: features.loudness_db,
            probability: classification.probability,
            is_advertisement,
        });
    }
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    session.release();

    let positives = results.iter().filter(|r| r.is_advertisement).count();
    let (positive_rate, avg_probability) = if results.is_empty() {
        (0.0, 0.0)
    } else {
        let n = results.len() as f64;
        (
            positives as f64 / n,
            results.iter().map(|r| r.probability).sum::<f64>() / n,
        )
    };

    let summary = Summary {
        input: args.input.display().to_string(),
        threshold: args.threshold,
        block_size: args.block_size,
        blocks: results.len(),
        positives,
        positive_rate,
        avg_probability,
        elapsed_ms,
        results,
    };

    println!(
        "{} blocks, {} positive ({:.1}%), {:.1} ms",
        summary.blocks,
        summary.positives,
        summary.positive_rate * 100.0,
        summary.elapsed_ms
    );

    let json = serde_json::to_string_pretty(&summary)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Summary written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("replay failed: {e:#}");
        std::process::exit(1);
    }
}
