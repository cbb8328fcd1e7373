use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use crossbeam_channel::bounded;

use tracestat::aggregate::{Aggregator, AggregatorConfig, StripeGeometry, TimeRange};
use tracestat::output::{
    print_top_volumes, write_day_csv, write_hour_csv, write_minute_csv, write_minute_volume_csv,
    write_stripe_heatmap_csv, write_stripe_ops_csv, write_stripe_update_csv,
    write_volume_by_minute_dir, write_volume_csv,
};
use tracestat::parsers::{parser_worker, Provider};
use tracestat::utils::{list_trace_files, stream_lines, Logger};
use tracestat::{log, log_error};

const TIME_ARG_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn print_usage(program: &str) {
    eprintln!("Usage:");
    eprintln!(
        "  {} -d <trace_dir> --provider <tencent|alicloud> [options]",
        program
    );
    eprintln!("\nOptions:");
    eprintln!("  -d <dir>               - directory containing .gz/.tgz/.tar.gz trace files (recursive)");
    eprintln!("  -o <dir>               - output directory (default: output)");
    eprintln!("  -w <n>                 - number of parser workers (default: number of CPUs)");
    eprintln!("  --provider <name>      - trace provider: tencent or alicloud");
    eprintln!("  --target-volume <id>   - volume ID to run stripe-level analysis on");
    eprintln!("  --stripe <b:d:p>       - stripe geometry: block size, data blocks, parity blocks");
    eprintln!("                           (default: 65536:10:4)");
    eprintln!("  --start <ts>           - inclusive lower bound, format \"YYYY-MM-DD HH:MM:SS\"");
    eprintln!("  --end <ts>             - inclusive upper bound, same format");
    eprintln!("  --window <n>           - retained minute buckets before FIFO eviction (default: 240)");
    eprintln!("  --no-minute-volume     - disable per-minute per-volume tracking entirely");
}

fn parse_time_arg(value: &str) -> Result<DateTime<Local>, String> {
    let naive = NaiveDateTime::parse_from_str(value, TIME_ARG_FORMAT)
        .map_err(|e| format!("invalid timestamp '{}': {}", value, e))?;
    Local
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| format!("ambiguous local timestamp '{}'", value))
}

fn parse_stripe_arg(value: &str) -> Result<StripeGeometry, String> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 3 {
        return Err(format!(
            "invalid stripe geometry '{}'. Expected block_size:data_blocks:parity_blocks",
            value
        ));
    }
    let block_size: u64 = parts[0]
        .parse()
        .map_err(|_| format!("invalid block size '{}'", parts[0]))?;
    let data_blocks: u32 = parts[1]
        .parse()
        .map_err(|_| format!("invalid data block count '{}'", parts[1]))?;
    let parity_blocks: u32 = parts[2]
        .parse()
        .map_err(|_| format!("invalid parity block count '{}'", parts[2]))?;
    if block_size == 0 || data_blocks == 0 {
        return Err("block size and data block count must be positive".to_string());
    }
    Ok(StripeGeometry {
        block_size,
        data_blocks,
        parity_blocks,
    })
}

struct CliOptions {
    trace_dir: PathBuf,
    out_dir: PathBuf,
    workers: usize,
    provider: Provider,
    target_volume: Option<String>,
    geometry: StripeGeometry,
    time_range: TimeRange,
    window_capacity: usize,
    minute_volume: bool,
}

fn option_value<'a>(args: &'a [String], i: usize) -> Result<&'a String, String> {
    args.get(i + 1)
        .ok_or_else(|| format!("option {} requires a value", args[i]))
}

fn parse_args(args: &[String]) -> Result<CliOptions, String> {
    let mut trace_dir: Option<PathBuf> = None;
    let mut out_dir = PathBuf::from("output");
    let mut workers = 0usize;
    let mut provider: Option<Provider> = None;
    let mut target_volume: Option<String> = None;
    let mut geometry = StripeGeometry::default();
    let mut time_range = TimeRange::default();
    let mut window_capacity = 240usize;
    let mut minute_volume = true;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" => {
                trace_dir = Some(PathBuf::from(option_value(args, i)?));
                i += 2;
            }
            "-o" => {
                out_dir = PathBuf::from(option_value(args, i)?);
                i += 2;
            }
            "-w" => {
                workers = option_value(args, i)?
                    .parse()
                    .map_err(|_| format!("invalid worker count '{}'", args[i + 1]))?;
                i += 2;
            }
            "--provider" => {
                let name = option_value(args, i)?;
                provider = Some(
                    Provider::from_name(name)
                        .ok_or_else(|| format!("unknown provider '{}'", name))?,
                );
                i += 2;
            }
            "--target-volume" => {
                target_volume = Some(option_value(args, i)?.clone());
                i += 2;
            }
            "--stripe" => {
                geometry = parse_stripe_arg(option_value(args, i)?)?;
                i += 2;
            }
            "--start" => {
                time_range.start = Some(parse_time_arg(option_value(args, i)?)?);
                i += 2;
            }
            "--end" => {
                time_range.end = Some(parse_time_arg(option_value(args, i)?)?);
                i += 2;
            }
            "--window" => {
                window_capacity = option_value(args, i)?
                    .parse()
                    .map_err(|_| format!("invalid window capacity '{}'", args[i + 1]))?;
                i += 2;
            }
            "--no-minute-volume" => {
                minute_volume = false;
                i += 1;
            }
            other => return Err(format!("unknown option '{}'", other)),
        }
    }

    let trace_dir = trace_dir.ok_or_else(|| "missing -d <trace_dir>".to_string())?;
    let provider = provider.ok_or_else(|| "missing --provider <tencent|alicloud>".to_string())?;
    if workers == 0 {
        workers = num_cpus::get();
    }

    Ok(CliOptions {
        trace_dir,
        out_dir,
        workers,
        provider,
        target_volume,
        geometry,
        time_range,
        window_capacity,
        minute_volume,
    })
}

fn write_time_reports(out_dir: &Path, aggregator: &Aggregator) {
    if let Err(e) = write_day_csv(&out_dir.join("time_stats_day.csv"), aggregator) {
        log_error!("failed to write day stats: {}", e);
    }
    if let Err(e) = write_hour_csv(&out_dir.join("time_stats_hour.csv"), aggregator) {
        log_error!("failed to write hour stats: {}", e);
    }
    if let Err(e) = write_minute_csv(&out_dir.join("time_stats_minute.csv"), aggregator) {
        log_error!("failed to write minute stats: {}", e);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        eprintln!("Error: no arguments provided");
        print_usage(&args[0]);
        process::exit(1);
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    Logger::init(&options.out_dir.to_string_lossy());

    let paths = match list_trace_files(&options.trace_dir) {
        Ok(paths) => paths,
        Err(e) => {
            log_error!("failed to scan {}: {}", options.trace_dir.display(), e);
            process::exit(1);
        }
    };
    if paths.is_empty() {
        log_error!("no .gz trace files under {}", options.trace_dir.display());
        process::exit(1);
    }

    log!(
        "files: {}, output: {}, workers: {}, provider: {}",
        paths.len(),
        options.out_dir.display(),
        options.workers,
        options.provider.as_str()
    );

    // Evicted minute buckets are flushed straight to disk so the window
    // stays bounded no matter how long the trace runs.
    let minute_dir = options.out_dir.join("volume_stats_minute");
    let notifier_dir = minute_dir.clone();
    let config = AggregatorConfig {
        minute_window_capacity: options.window_capacity,
        enable_minute_volume: options.minute_volume,
        eviction_notifier: Some(Box::new(move |minute_key, counts| {
            if let Err(e) = write_minute_volume_csv(&notifier_dir, minute_key, counts, true) {
                log_error!("failed to flush evicted minute {}: {}", minute_key, e);
            }
        })),
        target_volume: options.target_volume.clone(),
        geometry: options.geometry,
        time_range: options.time_range,
    };

    let aggregator = match Aggregator::with_config(config) {
        Ok(aggregator) => Arc::new(aggregator),
        Err(e) => {
            log_error!("invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let started = Instant::now();
    let (tx, rx) = bounded::<String>(10_000);
    let parsed = Arc::new(AtomicU64::new(0));
    let rejected = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::with_capacity(options.workers);
    for _ in 0..options.workers {
        let rx = rx.clone();
        let aggregator = Arc::clone(&aggregator);
        let parsed = Arc::clone(&parsed);
        let rejected = Arc::clone(&rejected);
        let provider = options.provider;
        handles.push(thread::spawn(move || {
            parser_worker(rx, provider, aggregator, parsed, rejected)
        }));
    }
    drop(rx);

    let mut streamed = 0u64;
    for path in &paths {
        log!("processing {}", path.display());
        match stream_lines(path, &tx) {
            Ok(count) => streamed += count,
            Err(e) => log_error!("failed to read {}: {}", path.display(), e),
        }
        // Partial results on disk for long runs
        write_time_reports(&options.out_dir, &aggregator);
    }

    drop(tx);
    for handle in handles {
        if handle.join().is_err() {
            log_error!("a parser worker panicked");
        }
    }

    let parsed = parsed.load(Ordering::Relaxed);
    let rejected = rejected.load(Ordering::Relaxed);
    log!(
        "done streaming {} lines in {:.2}s: parsed={}, rejected={}",
        streamed,
        started.elapsed().as_secs_f64(),
        parsed,
        rejected
    );

    write_time_reports(&options.out_dir, &aggregator);
    if let Err(e) = write_volume_csv(&options.out_dir.join("volume_stats.csv"), &aggregator) {
        log_error!("failed to write volume stats: {}", e);
    }
    if let Err(e) = write_volume_by_minute_dir(&minute_dir, &aggregator, true) {
        log_error!("failed to write per-minute volume stats: {}", e);
    }
    if options.target_volume.is_some() {
        if let Err(e) =
            write_stripe_update_csv(&options.out_dir.join("stripe_update_stats.csv"), &aggregator)
        {
            log_error!("failed to write stripe update stats: {}", e);
        }
        if let Err(e) =
            write_stripe_heatmap_csv(&options.out_dir.join("stripe_heatmap.csv"), &aggregator)
        {
            log_error!("failed to write stripe heatmap: {}", e);
        }
        if let Err(e) = write_stripe_ops_csv(&options.out_dir.join("stripe_ops.csv"), &aggregator) {
            log_error!("failed to write stripe op log: {}", e);
        }
    }

    print_top_volumes(&aggregator, 10);
    if let Err(e) = Logger::flush() {
        eprintln!("failed to flush log: {e}");
    }
}
