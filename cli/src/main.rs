//! tog CLI binary: answer a question over a knowledge-graph snapshot.
//!
//! Subcommands: `run` (explore and answer), `validate` (check a config without running).

mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cli::{build_collaborators, engine_options, format_result, resolve_config, CliError, ConfigArgs};
use tog::{ToGRunner, ToGConfig};

#[derive(Parser, Debug)]
#[command(name = "tog")]
#[command(about = "tog: Tree-of-Graphs question answering over a knowledge graph")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Explore the graph for a question and print the answer
    Run(RunArgs),
    /// Validate the effective configuration (flags + config.toml) and exit
    Validate(ValidateArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Question (words are joined with spaces)
    #[arg(required = true, trailing_var_arg = true)]
    question: Vec<String>,

    /// JSON graph snapshot ({"entities": [...], "edges": [...]})
    #[arg(short, long, value_name = "PATH", env = "TOG_GRAPH")]
    graph: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,

    /// With --json, pretty-print
    #[arg(long)]
    pretty: bool,

    /// Also print status, reasoning path and degradation notes
    #[arg(short, long)]
    verbose: bool,

    /// Truncate the printed answer to this many characters (0 = no limit)
    #[arg(long, value_name = "N", default_value_t = 0)]
    max_len: usize,
}

#[derive(clap::Args, Debug)]
struct ValidateArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Print the effective config as JSON when valid
    #[arg(long)]
    json: bool,
}

fn print_json(value: &impl serde::Serialize, pretty: bool) -> Result<(), CliError> {
    let s = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| CliError::Usage(format!("cannot encode output: {}", e)))?;
    println!("{}", s);
    Ok(())
}

async fn run(args: RunArgs) -> Result<(), CliError> {
    let settings = tog_config::load_settings("tog")?;
    let config = resolve_config(&args.config, &settings)?;
    config.ensure_valid()?;
    let options = engine_options(&args.config, &settings);
    let collaborators = build_collaborators(
        &args.graph,
        &settings,
        config.pruning_method,
        options.max_concurrency * 2,
    )?;
    let runner = ToGRunner::new(collaborators, options)?;

    let question = args.question.join(" ");
    let result = runner.run(&question, &config, None).await?;
    if args.json {
        print_json(&result, args.pretty)
    } else {
        println!("{}", format_result(&result, args.verbose, args.max_len));
        Ok(())
    }
}

fn validate(args: ValidateArgs) -> Result<bool, CliError> {
    let settings = tog_config::load_settings("tog")?;
    let config: ToGConfig = resolve_config(&args.config, &settings)?;
    let report = config.validate();
    if report.is_valid {
        if args.json {
            print_json(&config, true)?;
        } else {
            println!("config is valid");
        }
    } else {
        for issue in &report.errors {
            eprintln!("{}", issue);
        }
    }
    Ok(report.is_valid)
}

#[tokio::main]
async fn main() -> ExitCode {
    tog_config::load_and_apply("tog", None).ok();
    let _log_guard = match logging::init() {
        Ok(g) => g,
        Err(e) => {
            eprintln!("tog: logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args = Args::parse();
    let outcome = match args.cmd {
        Command::Run(a) => run(a).await.map(|_| true),
        Command::Validate(a) => validate(a),
    };
    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("tog: {}", e);
            ExitCode::FAILURE
        }
    }
}
