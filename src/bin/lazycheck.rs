//! lazycheck command-line front end.
//!
//! `lazycheck run <property>` checks one of the built-in properties,
//! `lazycheck list` names them, and `lazycheck worker` serves a single
//! subprocess-sandbox request on stdin/stdout.

use std::fmt::Debug;
use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use lazycheck::engine::{Runner, RunnerConfig, EXIT_ABORTED};
use lazycheck::properties::{self, Demo};
use lazycheck::sandbox::{InProcess, Subprocess};
use lazycheck::RunError;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Run(#[from] RunError),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

struct RunOptions {
    config: RunnerConfig,
    subprocess: bool,
    timeout: Option<Duration>,
    report: Option<PathBuf>,
}

fn cli() -> Command {
    Command::new("lazycheck")
        .about("Property-based testing with lazy shrinking")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log every attempt"),
        )
        .subcommand(
            Command::new("run")
                .about("Check a built-in property")
                .arg(Arg::new("property").required(true).value_name("PROPERTY"))
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_name("SEED")
                        .value_parser(value_parser!(u64))
                        .help("Run seed (default: LAZYCHECK_SEED or 0)"),
                )
                .arg(
                    Arg::new("tests")
                        .long("tests")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .help("Number of inputs to try (default: LAZYCHECK_TESTS or 100)"),
                )
                .arg(
                    Arg::new("no-shrink")
                        .long("no-shrink")
                        .action(ArgAction::SetTrue)
                        .help("Report the first failing input as generated"),
                )
                .arg(
                    Arg::new("max-shrinks")
                        .long("max-shrinks")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .help("Stop minimizing after N accepted shrinks"),
                )
                .arg(
                    Arg::new("trace")
                        .long("trace")
                        .action(ArgAction::SetTrue)
                        .help("Log every shrink candidate and its verdict"),
                )
                .arg(
                    Arg::new("sandbox")
                        .long("sandbox")
                        .value_name("KIND")
                        .value_parser(["in-process", "subprocess"])
                        .default_value("in-process")
                        .help("Where the property runs"),
                )
                .arg(
                    Arg::new("timeout-ms")
                        .long("timeout-ms")
                        .value_name("MS")
                        .value_parser(value_parser!(u64))
                        .help("Kill a subprocess worker after MS milliseconds"),
                )
                .arg(
                    Arg::new("report-json")
                        .long("report-json")
                        .value_name("PATH")
                        .value_parser(value_parser!(PathBuf))
                        .help("Also write the report as JSON to PATH"),
                ),
        )
        .subcommand(Command::new("list").about("List the built-in properties"))
        .subcommand(Command::new("worker").about("Serve one sandbox request on stdin/stdout"))
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let code = match matches.subcommand() {
        Some(("run", args)) => run(args),
        Some(("list", _)) => {
            for (name, description) in properties::CATALOG {
                println!("{:<22} {}", name, description);
            }
            0
        }
        Some(("worker", _)) => worker(),
        _ => EXIT_ABORTED,
    };
    process::exit(code);
}

fn worker() -> i32 {
    let registry = properties::worker_registry();
    match registry.serve(io::stdin().lock(), io::stdout().lock()) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("lazycheck worker: {}", err);
            EXIT_ABORTED
        }
    }
}

fn run(args: &ArgMatches) -> i32 {
    let mut config = RunnerConfig::from_env();
    if let Some(seed) = args.get_one::<u64>("seed") {
        config.seed = *seed;
    }
    if let Some(tests) = args.get_one::<usize>("tests") {
        config.max_tests = *tests;
    }
    if args.get_flag("no-shrink") {
        config.shrink = false;
    }
    if let Some(max) = args.get_one::<usize>("max-shrinks") {
        config.max_shrinks = Some(*max);
    }
    if args.get_flag("trace") {
        config.trace_shrinks = true;
    }
    let options = RunOptions {
        config,
        subprocess: args.get_one::<String>("sandbox").map(String::as_str) == Some("subprocess"),
        timeout: args.get_one::<u64>("timeout-ms").map(|ms| Duration::from_millis(*ms)),
        report: args.get_one::<PathBuf>("report-json").cloned(),
    };

    let name = args.get_one::<String>("property").map(String::as_str).unwrap_or_default();
    let result = match name {
        "sum_reverse" => run_demo(name, properties::sum_reverse(), &options),
        "double_keeps_sorted" => run_demo(name, properties::double_keeps_sorted(), &options),
        "bounded_walk" => run_demo(name, properties::bounded_walk(), &options),
        "increasing_times" => run_demo(name, properties::increasing_times(), &options),
        "panics_on_long_lists" => run_demo(name, properties::panics_on_long_lists(), &options),
        other => {
            eprintln!("unknown property `{}`; see `lazycheck list`", other);
            return EXIT_ABORTED;
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("lazycheck: {}", err);
            EXIT_ABORTED
        }
    }
}

fn run_demo<T>(name: &str, demo: Demo<T>, options: &RunOptions) -> Result<i32, CliError>
where
    T: Clone + Debug + Serialize + 'static,
{
    let mut runner = Runner::new(options.config.clone());
    let report = if options.subprocess {
        let mut sandbox = Subprocess::new(std::env::current_exe()?, name).arg("worker");
        if let Some(timeout) = options.timeout {
            sandbox = sandbox.with_timeout(timeout);
        }
        runner.run(&demo.strategy, &mut sandbox)?
    } else {
        if options.timeout.is_some() {
            log::warn!("--timeout-ms only applies to the subprocess sandbox");
        }
        runner.run(&demo.strategy, &mut InProcess::new(demo.property))?
    };

    println!("{}", report);
    if let Some(path) = &options.report {
        std::fs::write(path, report.to_json()?)?;
    }
    Ok(report.exit_code())
}
