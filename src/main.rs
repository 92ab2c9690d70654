//! Command-line entry point for collecting Wi-Fi samples and inspecting coverage.

use std::path::PathBuf;

use wifimap::config::{self, AppConfig};
use wifimap::logging;
use wifimap::model::ModelVariant;
use wifimap::pipeline::CoveragePipeline;
use wifimap::samples::{SqliteSampleLog, import_csv};
use wifimap::scan::{self, netsh};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init(options.verbose) {
        eprintln!("Logging disabled: {err}");
    }
    let config = match &options.config_path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;

    match options.command {
        Command::Stats => {
            let stats = open(config)?.stats().map_err(|err| err.to_string())?;
            print_json(&stats)
        }
        Command::Train { variant } => {
            let pipeline = open(config)?;
            let variant = variant.unwrap_or_else(|| pipeline.config().variant());
            let artifact = pipeline.train(variant).map_err(|err| err.to_string())?;
            println!(
                "Trained {} model on {} samples -> {}",
                artifact.variant,
                artifact.sample_count,
                pipeline.model_path().display()
            );
            Ok(())
        }
        Command::Predict { grid_size } => {
            let export = open(config)?.export(grid_size).map_err(|err| err.to_string())?;
            print_json(&export)
        }
        Command::Report => {
            let report = open(config)?.report().map_err(|err| err.to_string())?;
            println!("{report}");
            Ok(())
        }
        Command::Scan { location } => {
            let row = open(config)?
                .record_scan(location)
                .map_err(|err| format!("{err} ({})", scan_reason(&err)))?;
            print_json(&row)
        }
        Command::Networks => {
            let readings = scan::scan_all().map_err(|err| format!("{err} ({})", err.reason_code()))?;
            print_json(&readings)
        }
        Command::ParseScan { path } => {
            let text = std::fs::read_to_string(&path)
                .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
            let readings =
                netsh::parse_networks(&text).map_err(|err| format!("{err} ({})", err.reason_code()))?;
            print_json(&readings)
        }
        Command::ImportCsv { path } => {
            let text = std::fs::read_to_string(&path)
                .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
            let rows = import_csv(&text).map_err(|err| err.to_string())?;
            let log_path = config.sample_log_path().map_err(|err| err.to_string())?;
            let mut log = SqliteSampleLog::open(&log_path).map_err(|err| err.to_string())?;
            let inserted = log.append_batch(&rows).map_err(|err| err.to_string())?;
            println!("Imported {inserted} rows into {}", log_path.display());
            Ok(())
        }
    }
}

fn open(config: AppConfig) -> Result<CoveragePipeline<SqliteSampleLog>, String> {
    CoveragePipeline::open(config).map_err(|err| err.to_string())
}

fn scan_reason(err: &wifimap::pipeline::PipelineError) -> &'static str {
    match err {
        wifimap::pipeline::PipelineError::Scan(scan) => scan.reason_code(),
        _ => "error",
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Stats,
    Train { variant: Option<ModelVariant> },
    Predict { grid_size: Option<usize> },
    Report,
    Scan { location: Option<(f64, f64)> },
    Networks,
    ParseScan { path: PathBuf },
    ImportCsv { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    command: Command,
    config_path: Option<PathBuf>,
    verbose: bool,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut command_name: Option<String> = None;
    let mut positional: Option<String> = None;
    let mut config_path = None;
    let mut verbose = false;
    let mut variant = None;
    let mut grid_size = None;
    let mut latitude = None;
    let mut longitude = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "-v" | "--verbose" => verbose = true,
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                config_path = Some(PathBuf::from(value));
            }
            "--variant" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--variant requires a value".to_string())?;
                variant = Some(ModelVariant::parse_or_default(value));
            }
            "--grid" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--grid requires a value".to_string())?;
                grid_size = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --grid value: {value}"))?,
                );
            }
            "--lat" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--lat requires a value".to_string())?;
                latitude = Some(parse_coordinate("--lat", value)?);
            }
            "--lon" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--lon requires a value".to_string())?;
                longitude = Some(parse_coordinate("--lon", value)?);
            }
            flag if flag.starts_with('-') => {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            word if command_name.is_none() => command_name = Some(word.to_string()),
            word if positional.is_none() => positional = Some(word.to_string()),
            extra => return Err(format!("Unexpected argument: {extra}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let file_arg = |name: &str| {
        positional
            .clone()
            .map(PathBuf::from)
            .ok_or_else(|| format!("{name} requires a file path\n\n{}", help_text()))
    };
    let command = match command_name.as_deref().ok_or_else(help_text)? {
        "stats" => Command::Stats,
        "train" => Command::Train { variant },
        "predict" => Command::Predict { grid_size },
        "report" => Command::Report,
        "scan" => Command::Scan {
            location: latitude.zip(longitude),
        },
        "networks" => Command::Networks,
        "parse-scan" => Command::ParseScan {
            path: file_arg("parse-scan")?,
        },
        "import-csv" => Command::ImportCsv {
            path: file_arg("import-csv")?,
        },
        other => return Err(format!("Unknown command: {other}\n\n{}", help_text())),
    };
    Ok(CliOptions {
        command,
        config_path,
        verbose,
    })
}

fn parse_coordinate(flag: &str, value: &str) -> Result<f64, String> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("Invalid {flag} value: {value}"))
}

fn help_text() -> String {
    [
        "wifimap",
        "",
        "Collects Wi-Fi signal samples and predicts coverage over the sampled area.",
        "",
        "Usage:",
        "  wifimap [--config <file>] [--verbose] <command> [options]",
        "",
        "Commands:",
        "  stats                    Sample log summary as JSON.",
        "  train [--variant <v>]    Retrain the model (ensemble | neural).",
        "  predict [--grid <n>]     Grid predictions as JSON (n clamped to 1..=128).",
        "  report                   Plain-text coverage report.",
        "  scan [--lat <f> --lon <f>]  Record one reading into the sample log.",
        "  networks                 List visible networks (Windows only).",
        "  parse-scan <file>        Parse saved `netsh wlan show networks mode=bssid` output.",
        "  import-csv <file>        Append rows from a CSV export to the sample log.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_train_with_variant() {
        let options = parse_args(args(&["--verbose", "train", "--variant", "mlp"])).unwrap();
        assert!(options.verbose);
        assert_eq!(
            options.command,
            Command::Train {
                variant: Some(ModelVariant::Neural)
            }
        );
    }

    #[test]
    fn scan_needs_both_coordinates_for_a_location() {
        let options = parse_args(args(&["scan", "--lat", "51.5"])).unwrap();
        assert_eq!(options.command, Command::Scan { location: None });
        let options = parse_args(args(&["scan", "--lat", "51.5", "--lon", "-0.1"])).unwrap();
        assert_eq!(
            options.command,
            Command::Scan {
                location: Some((51.5, -0.1))
            }
        );
    }

    #[test]
    fn file_commands_require_a_path() {
        assert!(parse_args(args(&["parse-scan"])).is_err());
        let options = parse_args(args(&["import-csv", "rows.csv", "--config", "c.toml"])).unwrap();
        assert_eq!(
            options.command,
            Command::ImportCsv {
                path: PathBuf::from("rows.csv")
            }
        );
        assert_eq!(options.config_path, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(parse_args(args(&["frobnicate"])).is_err());
        assert!(parse_args(args(&["predict", "--grid", "many"])).is_err());
        assert!(parse_args(args(&["stats", "--bogus"])).is_err());
        assert!(parse_args(Vec::new()).is_err());
    }
}
