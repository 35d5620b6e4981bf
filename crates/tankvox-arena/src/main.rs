use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use tankvox_arena::report;
use tankvox_arena::runner::ArenaRunner;
use tankvox_arena::scenes::{self, RunConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut baseline_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut regression_threshold = 10.0f64;
    let mut tick_count = 600u32;
    let mut enemies: Option<u32> = None;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" => config_path = Some(PathBuf::from(flag_value::<String>(&args, &mut i, flag))),
            "--baseline" => baseline_path = Some(PathBuf::from(flag_value::<String>(&args, &mut i, flag))),
            "--output" => output_path = Some(PathBuf::from(flag_value::<String>(&args, &mut i, flag))),
            "--regression-threshold" => regression_threshold = flag_value(&args, &mut i, flag),
            "--ticks" => tick_count = flag_value(&args, &mut i, flag),
            "--enemies" => enemies = Some(flag_value(&args, &mut i, flag)),
            "--help" | "-h" => {
                eprintln!("Usage: arena-runner [OPTIONS]");
                eprintln!("  --config <path>                RON run config (world, arena, ai sections)");
                eprintln!("  --ticks <n>                    Ticks per scene (default: 600)");
                eprintln!("  --enemies <n>                  Enemies per scene (default: per preset)");
                eprintln!("  --baseline <path>              Load baseline JSON for comparison");
                eprintln!("  --output <path>                Save current results as JSON baseline");
                eprintln!("  --regression-threshold <pct>   Regression threshold percentage (default: 10)");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => load_config(&path),
        None => RunConfig::default(),
    };

    let mut runner = ArenaRunner::new(config, tick_count);
    if let Some(n) = enemies {
        runner = runner.with_enemies(n);
    }

    let mut results = Vec::new();
    for preset in &scenes::standard_scenes() {
        match runner.run_scene(preset) {
            Ok(result) => results.push(result),
            Err(e) => {
                log::error!("Scene '{}' failed: {e}", preset.name);
                process::exit(1);
            }
        }
    }

    println!("\n## Arena Results\n");
    println!("{}", report::format_markdown(&results));

    if let Some(ref path) = output_path {
        let baseline = report::Baseline {
            timestamp: run_timestamp(),
            results: results.clone(),
        };
        if let Err(e) = report::save_baseline(path, &baseline) {
            log::error!("Failed to save baseline to {}: {e}", path.display());
            process::exit(1);
        }
        log::info!("Saved baseline to {}", path.display());
    }

    if let Some(ref path) = baseline_path {
        if let Some(baseline) = report::load_baseline(path) {
            let regressions = report::compare(&results, &baseline, regression_threshold);
            println!("{}", report::format_comparison(&regressions, regression_threshold));
            if !regressions.is_empty() {
                eprintln!("ERROR: {} regressions detected, exiting with code 1", regressions.len());
                process::exit(1);
            }
        } else {
            log::warn!("Baseline file not found: {}", path.display());
        }
    }

    log::info!("Arena run complete.");
}

/// Parse the value following `flag`, exiting with a usage error when it is
/// missing or malformed.
fn flag_value<T: FromStr>(args: &[String], i: &mut usize, flag: &str) -> T {
    *i += 1;
    match args.get(*i).map(|v| v.parse::<T>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            eprintln!("invalid {flag} value: {}", args[*i]);
            process::exit(1);
        }
        None => {
            eprintln!("{flag} needs a value");
            process::exit(1);
        }
    }
}

fn load_config(path: &Path) -> RunConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            log::error!("Cannot read {}: {e}", path.display());
            process::exit(1);
        }
    };
    match RunConfig::from_ron_str(&text) {
        Ok(config) => {
            log::info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            log::error!("{}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn run_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("run-{secs}")
}
