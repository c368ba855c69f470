//! novaload CLI Entry Point
//!
//! Runs the workloads of a task file and reports per-operation timings.
//!
//! # Usage
//!
//! ```bash
//! # Run every workload in a task file
//! novaload task.yaml
//!
//! # Run only one scenario of the task
//! novaload task.yaml --scenario NovaServers.mixed_complex_workload_two
//!
//! # List scenarios and built-in server actions
//! novaload --list
//!
//! # Simulate 20 ms per cloud call, keep reports elsewhere
//! novaload task.yaml --latency-ms 20 --report-dir /tmp/novaload
//! ```
//!
//! Exit status is 0 when every iteration succeeds, 1 when any iteration
//! fails and 2 for invalid input.

use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use log::{error, info, warn};

use novaload::cloud::{Cloud, SimulatedCloud};
use novaload::execution::Runner;
use novaload::scenario::{catalog, load_task};
use novaload::{ConfigurationError, APP_NAME, SERVER_ACTIONS, VERSION};

/// Default directory for run reports.
const DEFAULT_REPORT_DIR: &str = "reports";

/// Exit status for invalid input.
const EXIT_CONFIGURATION: u8 = 2;

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    task_path: Option<String>,
    scenario: Option<String>,
    list: bool,
    report_dir: PathBuf,
    no_report: bool,
    latency_ms: u64,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            task_path: None,
            scenario: None,
            list: false,
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            no_report: false,
            latency_ms: 0,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Server Lifecycle Workload Runner");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: novaload [OPTIONS] <TASK_FILE>");
    println!();
    println!("Arguments:");
    println!("  <TASK_FILE>          Path to task YAML file");
    println!();
    println!("Options:");
    println!("  --scenario NAME      Run only the workloads of this scenario");
    println!("  --list               List scenarios and built-in server actions");
    println!("  --report-dir PATH    Directory for JSON reports (default: {})", DEFAULT_REPORT_DIR);
    println!("  --no-report          Do not write JSON reports");
    println!("  --latency-ms N       Simulated latency per cloud call (default: 0)");
    println!("  --verbose            Enable debug logging");
    println!("  --help               Show this help message");
    println!("  --version            Show version information");
    println!();
    println!("Examples:");
    println!("  novaload task.yaml");
    println!("  novaload task.yaml --scenario NovaServers.mixed_complex_workload_one");
    println!("  novaload task.yaml --latency-ms 20 --no-report");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--list" => {
                config.list = true;
            }
            "--no-report" => {
                config.no_report = true;
            }
            "--scenario" => {
                i += 1;
                if i >= args.len() {
                    return Err("--scenario requires a name argument".to_string());
                }
                config.scenario = Some(args[i].clone());
            }
            "--report-dir" => {
                i += 1;
                if i >= args.len() {
                    return Err("--report-dir requires a path argument".to_string());
                }
                config.report_dir = PathBuf::from(&args[i]);
            }
            "--latency-ms" => {
                i += 1;
                if i >= args.len() {
                    return Err("--latency-ms requires a number argument".to_string());
                }
                config.latency_ms = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid latency value: {}", args[i]))?;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.task_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.task_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    if config.task_path.is_none() && !config.list {
        return Err("missing <TASK_FILE>".to_string());
    }

    Ok(config)
}

/// Prints the scenario catalog and the built-in actions.
fn print_catalog() {
    println!("{}", "Scenarios:".bold());
    for def in catalog::SCENARIOS {
        println!("  {}", def.name().cyan());
        println!("      {}", def.meta.description);
        println!("      default count: {}", def.default_count);
    }
    println!();
    println!("{}", "Server actions:".bold());
    for name in SERVER_ACTIONS.names() {
        println!("  {}", name);
    }
}

/// Runs every workload of the task. Returns whether all iterations passed.
fn run(config: Config) -> Result<bool, Box<dyn Error>> {
    setup_logging(config.verbose);
    print_banner();

    if config.list {
        print_catalog();
        return Ok(true);
    }

    let Some(task_path) = config.task_path else {
        return Err("missing <TASK_FILE>".into());
    };

    let mut task = load_task(&task_path)?;
    if let Some(ref scenario) = config.scenario {
        task = task.only(scenario)?;
        info!("Running only {}", scenario);
    }
    if task.workloads.is_empty() {
        warn!("Task '{}' contains no workloads", task_path);
        return Ok(true);
    }

    let mut simulated = SimulatedCloud::with_defaults();
    if config.latency_ms > 0 {
        simulated = simulated.with_latency(Duration::from_millis(config.latency_ms));
        info!("Simulated latency: {} ms per call", config.latency_ms);
    }
    let cloud: Arc<dyn Cloud> = Arc::new(simulated);

    let mut all_passed = true;
    for workload in task.workloads {
        let mut runner = Runner::new(workload.scenario, workload.args, Arc::clone(&cloud));
        runner.configure(&workload.runner);

        let report = runner.run()?;

        println!("{}", report.summary());
        let status = if report.is_success() {
            "PASSED".green().bold()
        } else {
            "FAILED".red().bold()
        };
        println!(
            "{} {}/{} iterations succeeded",
            status,
            report.success_count(),
            report.iterations.len()
        );
        for failed in report.iterations.iter().filter(|i| !i.is_success()) {
            if let Some(ref reason) = failed.error {
                println!("  #{}: {}", failed.index, reason.red());
            }
        }
        println!();

        if !config.no_report {
            let path = report.save(&config.report_dir)?;
            info!("Report: {}", path.display());
        }

        all_passed &= report.is_success();
    }

    Ok(all_passed)
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let config = match parse_arguments(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            return ExitCode::from(EXIT_CONFIGURATION);
        }
    };

    match run(config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            if e.downcast_ref::<ConfigurationError>().is_some() {
                error!("Invalid input, nothing was run");
                ExitCode::from(EXIT_CONFIGURATION)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
