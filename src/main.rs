//! chartkit - Command-line tools for scan-line rhythm game charts.
//!
//! # Usage
//!
//! ```bash
//! chartkit convert song.txt -o song.json
//! chartkit retime song.json --plan plan.json -o fixed.json
//! chartkit retime song.json --legacy-drift
//! chartkit inspect a.json b.json legacy.txt
//! ```
//!
//! Set `RUST_LOG=chartkit=debug` to see what the library decides along the
//! way.

use anyhow::{bail, Context, Result};
use chartkit::chart::{convert_legacy, round_tick, Chart, RetimePlan, Tick};
use chartkit::geometry::{compile_pages, speed_changes, split_long_holds, PageGeometry};
use chartkit::grid::fixed_grid;
use chartkit::rhythm::{classify_chart, label_counts};
use chartkit::stats::ChartStatistics;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a retime plan comes from.
#[derive(Debug, Clone, PartialEq)]
enum PlanSource {
    File(PathBuf),
    LegacyDrift,
}

/// Subcommand and its arguments.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Convert {
        input: PathBuf,
        output: Option<PathBuf>,
    },
    Retime {
        input: PathBuf,
        plan: PlanSource,
        output: Option<PathBuf>,
    },
    Inspect {
        inputs: Vec<PathBuf>,
    },
    Help,
}

/// Command-line options for the application.
#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    command: Command,
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Result<Self> {
        Self::parse_from(std::env::args().skip(1).collect())
    }

    /// Parses arguments (without the program name).
    ///
    /// Supports:
    /// - `convert <legacy> [-o <out>]`
    /// - `retime <chart> (--plan <plan> | --legacy-drift) [-o <out>]`
    /// - `inspect <chart>...`
    /// - `--help` or `-h`
    fn parse_from(args: Vec<String>) -> Result<Self> {
        let Some((subcommand, rest)) = args.split_first() else {
            return Ok(Self {
                command: Command::Help,
            });
        };

        let mut positional: Vec<PathBuf> = Vec::new();
        let mut output: Option<PathBuf> = None;
        let mut plan: Option<PlanSource> = None;
        let mut i = 0;

        while i < rest.len() {
            match rest[i].as_str() {
                "--output" | "-o" => {
                    i += 1;
                    let Some(path) = rest.get(i) else {
                        bail!("--output requires a path argument");
                    };
                    output = Some(PathBuf::from(path));
                }
                "--plan" | "-p" => {
                    i += 1;
                    let Some(path) = rest.get(i) else {
                        bail!("--plan requires a path argument");
                    };
                    plan = Some(PlanSource::File(PathBuf::from(path)));
                }
                "--legacy-drift" => plan = Some(PlanSource::LegacyDrift),
                "--help" | "-h" => {
                    return Ok(Self {
                        command: Command::Help,
                    })
                }
                other if other.starts_with('-') => {
                    bail!("unknown option: {} (use --help for usage information)", other)
                }
                other => positional.push(PathBuf::from(other)),
            }
            i += 1;
        }

        let command = match subcommand.as_str() {
            "--help" | "-h" | "help" => Command::Help,
            "convert" => Command::Convert {
                input: single_input(positional, "convert")?,
                output,
            },
            "retime" => {
                let Some(plan) = plan else {
                    bail!("retime needs --plan <file> or --legacy-drift");
                };
                Command::Retime {
                    input: single_input(positional, "retime")?,
                    plan,
                    output,
                }
            }
            "inspect" => {
                if positional.is_empty() {
                    bail!("inspect needs at least one chart file");
                }
                Command::Inspect { inputs: positional }
            }
            other => bail!("unknown command: {} (use --help for usage information)", other),
        };

        Ok(Self { command })
    }
}

fn single_input(mut positional: Vec<PathBuf>, command: &str) -> Result<PathBuf> {
    if positional.len() != 1 {
        bail!("{} takes exactly one input file", command);
    }
    Ok(positional.remove(0))
}

fn print_help() {
    eprintln!("chartkit - Timing tools for scan-line rhythm game charts");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  chartkit convert <legacy.txt> [-o <out.json>]");
    eprintln!("  chartkit retime <chart.json> (--plan <plan.json> | --legacy-drift) [-o <out>]");
    eprintln!("  chartkit inspect <chart>...");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --output PATH   Write the result to PATH instead of stdout");
    eprintln!("  -p, --plan PATH     Retime plan: JSON list of {{\"tick\", \"ratio\"}} steps");
    eprintln!("      --legacy-drift  Apply the built-in correction for legacy conversions");
    eprintln!("  -h, --help          Print this help message");
    eprintln!();
    eprintln!("Inspect accepts tick-domain JSON charts and legacy text charts.");
}

/// Writes `text` to `output`, or stdout when no path is given.
fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn run_convert(input: &Path, output: Option<&Path>) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let conversion = convert_legacy(&text)
        .with_context(|| format!("failed to convert {}", input.display()))?;
    info!(
        page_size_ticks = conversion.page_size_ticks,
        bpm = conversion.bpm,
        "converted legacy chart"
    );
    write_output(&conversion.chart.to_json()?, output)
}

fn run_retime(input: &Path, plan: &PlanSource, output: Option<&Path>) -> Result<()> {
    let chart = Chart::load_from_file(input)
        .with_context(|| format!("failed to load chart {}", input.display()))?;
    let plan = match plan {
        PlanSource::File(path) => RetimePlan::load_from_file(path)
            .with_context(|| format!("failed to load retime plan {}", path.display()))?,
        PlanSource::LegacyDrift => RetimePlan::legacy_drift(),
    };
    let retimed = plan
        .apply(&chart)
        .with_context(|| format!("failed to retime {}", input.display()))?;
    info!(
        steps = plan.steps().len(),
        tempos = retimed.tempo_events().len(),
        "retimed chart"
    );
    write_output(&retimed.to_json()?, output)
}

/// How an inspected file was read.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum SourceFormat {
    Json,
    Legacy,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    path: String,
    format: SourceFormat,
    total_ticks: Tick,
    duration_ms: f64,
    statistics: ChartStatistics,
    pages: Vec<PageGeometry>,
    speed_changes: usize,
    long_hold_segments: usize,
    subdivisions: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_lines: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum InspectOutcome {
    Report(Box<InspectReport>),
    Failed { path: String, error: String },
}

/// Loads a JSON chart, falling back to the legacy text format.
fn load_any(path: &Path) -> Result<(Chart, SourceFormat, Option<Tick>)> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    match Chart::from_json(&text) {
        Ok(chart) => Ok((chart, SourceFormat::Json, None)),
        Err(json_error) => {
            debug!(
                path = %path.display(),
                error = %json_error,
                "not a JSON chart, trying legacy text"
            );
            match convert_legacy(&text) {
                Ok(conversion) => Ok((
                    conversion.chart,
                    SourceFormat::Legacy,
                    Some(round_tick(conversion.page_size_ticks)),
                )),
                Err(legacy_error) => bail!(
                    "{} is neither a JSON chart ({}) nor legacy text ({})",
                    path.display(),
                    json_error,
                    legacy_error
                ),
            }
        }
    }
}

fn inspect(path: &Path) -> Result<InspectReport> {
    let (chart, format, page_size_ticks) = load_any(path)?;
    let pages = compile_pages(&chart)
        .with_context(|| format!("failed to compile pages of {}", path.display()))?;
    let holds = split_long_holds(&chart)
        .with_context(|| format!("failed to split long holds of {}", path.display()))?;
    let total_ticks = chart.total_ticks();

    Ok(InspectReport {
        path: path.display().to_string(),
        format,
        total_ticks,
        duration_ms: chart.tick_to_time(total_ticks),
        statistics: ChartStatistics::collect(&chart),
        speed_changes: speed_changes(&pages).len(),
        pages,
        long_hold_segments: holds.len(),
        subdivisions: label_counts(&classify_chart(&chart)),
        page_lines: page_size_ticks.map(|step| fixed_grid(total_ticks, step).len()),
    })
}

fn run_inspect(inputs: &[PathBuf]) -> Result<()> {
    let outcomes: Vec<InspectOutcome> = inputs
        .par_iter()
        .map(|path| match inspect(path) {
            Ok(report) => InspectOutcome::Report(Box::new(report)),
            Err(e) => InspectOutcome::Failed {
                path: path.display().to_string(),
                error: format!("{:#}", e),
            },
        })
        .collect();

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, InspectOutcome::Failed { .. }))
        .count();
    println!("{}", serde_json::to_string_pretty(&outcomes)?);

    if failed > 0 {
        bail!("{} of {} inputs could not be inspected", failed, inputs.len());
    }
    Ok(())
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Convert { input, output } => run_convert(input, output.as_deref()),
        Command::Retime {
            input,
            plan,
            output,
        } => run_retime(input, plan, output.as_deref()),
        Command::Inspect { inputs } => run_inspect(inputs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse_from(args.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_convert() {
        let cli = parse(&["convert", "song.txt", "-o", "song.json"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Convert {
                input: PathBuf::from("song.txt"),
                output: Some(PathBuf::from("song.json")),
            }
        );
    }

    #[test]
    fn test_parse_retime() {
        let cli = parse(&["retime", "song.json", "--legacy-drift"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Retime {
                input: PathBuf::from("song.json"),
                plan: PlanSource::LegacyDrift,
                output: None,
            }
        );

        let cli = parse(&["retime", "song.json", "--plan", "plan.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Retime {
                plan: PlanSource::File(_),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_inspect_many() {
        let cli = parse(&["inspect", "a.json", "b.txt"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Inspect {
                inputs: vec![PathBuf::from("a.json"), PathBuf::from("b.txt")],
            }
        );
    }

    #[test]
    fn test_parse_help_and_empty() {
        assert_eq!(parse(&[]).unwrap().command, Command::Help);
        assert_eq!(parse(&["-h"]).unwrap().command, Command::Help);
        assert_eq!(parse(&["inspect", "--help"]).unwrap().command, Command::Help);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["retime", "song.json"]).is_err());
        assert!(parse(&["convert"]).is_err());
        assert!(parse(&["convert", "a.txt", "b.txt"]).is_err());
        assert!(parse(&["convert", "a.txt", "-o"]).is_err());
        assert!(parse(&["inspect"]).is_err());
        assert!(parse(&["frobnicate", "a.txt"]).is_err());
        assert!(parse(&["inspect", "a.json", "--verbose"]).is_err());
    }
}
