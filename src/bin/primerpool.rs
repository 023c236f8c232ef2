//! Thin CLI demonstrating the `primerpool` library end to end: load a
//! primer FASTA, run either the fast preview or the full DE optimization,
//! and print a human-readable report (§4.9).

use std::process::ExitCode;

use clap::Parser;
use needletail::parse_fastx_file;
use primerpool::{EngineConfig, Primer};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Partition a set of primer pairs into compatible multiplex PCR pools")]
struct Args {
    /// FASTA file of primer records: each primer is two consecutive records
    /// with headers `<id>|<gene>|F` and `<id>|<gene>|R` (gene may be `-`).
    #[arg(short, long)]
    file: String,

    /// Number of pools to partition into.
    #[arg(short = 'k', long, default_value_t = 4)]
    pools: usize,

    /// Maximum primers per pool.
    #[arg(long, default_value_t = 96)]
    cap: usize,

    /// Maximum DE generations (ignored in --preview mode).
    #[arg(short, long, default_value_t = 1000)]
    generations: usize,

    /// RNG seed for the DE search.
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Print the fast-preview (no matrix, no search) instead of optimizing.
    #[arg(long, default_value_t = false)]
    preview: bool,
}

/// One primer's two sequences, assembled from matching `F`/`R` FASTA records.
struct RawPrimer {
    id: String,
    gene: String,
    forward: Option<String>,
    reverse: Option<String>,
}

fn load_primers(path: &str) -> anyhow::Result<Vec<Primer>> {
    let mut by_id: Vec<RawPrimer> = Vec::new();
    let mut reader = parse_fastx_file(path)?;
    while let Some(record) = reader.next() {
        let rec = record?;
        let header = String::from_utf8_lossy(rec.id()).to_string();
        let mut parts = header.splitn(3, '|');
        let id = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("malformed header {header:?}: missing id"))?
            .to_string();
        let gene = parts.next().unwrap_or("-").to_string();
        let strand = parts.next().unwrap_or("F").to_ascii_uppercase();
        let seq = String::from_utf8_lossy(&rec.seq()).to_string();

        let idx = match by_id.iter().position(|p| p.id == id) {
            Some(idx) => idx,
            None => {
                by_id.push(RawPrimer {
                    id: id.clone(),
                    gene: if gene == "-" { String::new() } else { gene },
                    forward: None,
                    reverse: None,
                });
                by_id.len() - 1
            }
        };
        if strand.starts_with('R') {
            by_id[idx].reverse = Some(seq);
        } else {
            by_id[idx].forward = Some(seq);
        }
    }

    by_id
        .into_iter()
        .map(|p| {
            let forward = p
                .forward
                .ok_or_else(|| anyhow::anyhow!("primer {:?} is missing a forward (F) record", p.id))?;
            let reverse = p
                .reverse
                .ok_or_else(|| anyhow::anyhow!("primer {:?} is missing a reverse (R) record", p.id))?;
            Ok(Primer::new(p.id, p.gene, forward, reverse))
        })
        .collect()
}

fn run(args: Args) -> anyhow::Result<()> {
    let primers = load_primers(&args.file)?;

    if args.preview {
        let preview = primerpool::fast_preview(&primers, args.pools)?;
        println!("fast preview over {} primers, {} pools", primers.len(), args.pools);
        for (pool, (&size, &avg_tm)) in preview
            .pool_sizes
            .iter()
            .zip(&preview.avg_tm_per_pool)
            .enumerate()
        {
            println!("  pool {pool}: {size} primers, avg Tm {avg_tm:.2}C");
        }
        return Ok(());
    }

    let mut config = EngineConfig::new(args.pools, args.cap)?;
    config.max_generations = args.generations;
    config.rng_seed = args.seed;

    let outcome = primerpool::optimize_uncancellable(&primers, &config)?;

    println!(
        "optimized {} primers into {} pools in {:.3}s ({} generations)",
        primers.len(),
        args.pools,
        outcome.duration.as_secs_f64(),
        outcome.generations_completed
    );
    println!("optimization score: {:.4}", outcome.metrics.optimization_score);
    for pool in &outcome.pools {
        println!(
            "  pool {}: {} primers, avg Tm {:.2}C, Tm range {:.2}, max dimer {:.1}",
            pool.pool_index, pool.size, pool.avg_tm, pool.tm_range, pool.max_dimer_score
        );
    }
    if !outcome.warnings.is_empty() {
        for w in &outcome.warnings {
            println!("warning: {w}");
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "primerpool failed");
            ExitCode::FAILURE
        }
    }
}
