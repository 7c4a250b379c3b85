mod debug_report;

use cutsheet::{DirectoryRepository, LoadStrategy, Options, OrderRecord, calculate_verbose_with, parse_notes};
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_RULES_DIR: &str = "rules";
const RULES_DIR_ENV: &str = "CUTSHEET_RULES_DIR";
const LOG_ENV: &str = "CUTSHEET_LOG";

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    init_logging();

    if let Err(err) = run(&config) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).init();
}

fn run(config: &CliConfig) -> Result<(), String> {
    let order = match &config.input {
        Input::Notes(text) => parse_notes(text).map_err(|err| format!("error: {err}"))?,
        Input::Order(json) => {
            let value: serde_json::Value =
                serde_json::from_str(json).map_err(|err| format!("error: invalid --order JSON: {err}"))?;
            OrderRecord::from_json(&value).map_err(|err| format!("error: {err}"))?
        }
    };

    if config.parse_only {
        return print_json(&order);
    }

    let repo = DirectoryRepository::open(&config.rules_dir, LoadStrategy::Eager).map_err(|err| format!("error: {err}"))?;
    let res = calculate_verbose_with(&order, &repo, &Options::default());

    if config.json {
        print_json(&res.result)
    } else {
        debug_report::print_run(&order, &repo.snapshot(), &res, config.color);
        Ok(())
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|err| format!("error: failed to serialize output: {err}"))?;
    println!("{out}");
    Ok(())
}

enum Input {
    Notes(String),
    Order(String),
}

struct CliConfig {
    input: Input,
    rules_dir: PathBuf,
    parse_only: bool,
    json: bool,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut input: Option<Input> = None;
    let mut rules_dir: Option<PathBuf> = None;
    let mut parse_only = false;
    let mut json = false;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1).peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("cutsheet {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--parse-only" => parse_only = true,
            "--json" => json = true,
            "--rules" | "-r" => {
                let value = args.next().ok_or_else(|| "error: --rules expects a value".to_string())?;
                rules_dir = Some(PathBuf::from(value));
            }
            "--input" | "-i" => {
                let value = args.next().ok_or_else(|| "error: --input expects a value".to_string())?;
                set_input(&mut input, Input::Notes(value))?;
            }
            "--order" => {
                let value = args.next().ok_or_else(|| "error: --order expects a value".to_string())?;
                set_input(&mut input, Input::Order(value))?;
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    set_input(&mut input, Input::Notes(rest))?;
                }
                break;
            }
            _ if arg.starts_with("--rules=") => {
                rules_dir = Some(PathBuf::from(arg.trim_start_matches("--rules=")));
            }
            _ if arg.starts_with("--input=") => {
                set_input(&mut input, Input::Notes(arg.trim_start_matches("--input=").to_string()))?;
            }
            _ if arg.starts_with("--order=") => {
                set_input(&mut input, Input::Order(arg.trim_start_matches("--order=").to_string()))?;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                set_input(&mut input, Input::Notes(rest))?;
                break;
            }
        }
    }

    let input = match input {
        Some(value) => value,
        None => Input::Notes(read_stdin_input()?),
    };

    let blank = match &input {
        Input::Notes(text) | Input::Order(text) => text.trim().is_empty(),
    };
    if blank {
        return Err(format!("error: no input provided\n\n{}", help_text()));
    }

    let rules_dir = rules_dir
        .or_else(|| std::env::var_os(RULES_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_DIR));

    Ok(CliConfig { input, rules_dir, parse_only, json, color })
}

fn set_input(slot: &mut Option<Input>, value: Input) -> Result<(), String> {
    if slot.is_some() {
        return Err("error: input provided multiple times".to_string());
    }
    *slot = Some(value);
    Ok(())
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "cutsheet {version}

Order-note parser and rule-driven cut sheet calculator.

Usage:
  cutsheet [OPTIONS] [--] <notes...>
  cutsheet [OPTIONS] --input <text>
  cutsheet [OPTIONS] --order <json>

Options:
  -i, --input <text>         Order note text. If omitted, reads remaining args
                             or stdin when no args are provided.
  --order <json>             Calculate from an order record given as a JSON object.
  -r, --rules <dir>          Rule set directory.
                             Default: ${rules_env}, else ./{default_rules}
  --parse-only               Print the parsed order record as JSON and exit.
  --json                     Print the calculation result as JSON.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  {log_env}                Log filter (e.g. debug, cutsheet=debug). Default: warn

Exit codes:
  0  Success.
  1  Input error (unparseable order JSON, unreadable rules).
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        rules_env = RULES_DIR_ENV,
        default_rules = DEFAULT_RULES_DIR,
        log_env = LOG_ENV,
    )
}
