mod loader;
mod test_runner;

use std::collections::BTreeMap;
use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use evaluator::{EvalContext, Error, Value};
use schemacfg::Document;

#[derive(Parser)]
#[command(name = "schemacfg", version, about = "Schema configuration evaluator")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log evaluation details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate documents and print the resulting context
    Eval(EvalArgs),

    /// Run .test.toml fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct EvalArgs {
    /// Documents (TOML syntax trees), evaluated in order into one context
    #[arg(required = true)]
    files: Vec<String>,

    /// Input variable override, NAME=VALUE. Repeatable.
    #[arg(long = "var", value_name = "NAME=VALUE")]
    vars: Vec<String>,

    /// TOML file with input variable overrides
    #[arg(long)]
    vars_file: Option<String>,

    /// Print only the value at this dotted path (e.g. table.users.__ref)
    #[arg(short, long)]
    path: Option<String>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.toml file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Eval(eval_args) => do_eval(eval_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn do_eval(args: EvalArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let overrides = match collect_overrides(&args) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    // Set up codespan file database
    let mut files = SimpleFiles::new();
    let mut documents = Vec::new();
    for file in &args.files {
        match loader::load_document(Path::new(file), &mut files) {
            Ok(document) => documents.push(document),
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
    }

    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();

    let mut ctx = EvalContext::new();
    for document in &documents {
        if let Err(error) = evaluator::evaluate_document(&mut ctx, document, &overrides) {
            emit_error(&writer, &config, &files, document, &error);
            process::exit(1);
        }
    }

    match &args.path {
        Some(path) => match ctx.lookup(path) {
            Some(value) => println!("{:#}", value),
            None => {
                eprintln!("error: nothing is bound at \"{}\"", path);
                process::exit(1);
            }
        },
        None => {
            for (name, value) in ctx.variables() {
                println!("{} = {:#}", name, value);
            }
        }
    }
}

/// `--vars-file` first, then `--var` on top. `--var` values stay strings;
/// conversion to the declared type takes care of numbers and bools.
fn collect_overrides(args: &EvalArgs) -> Result<BTreeMap<String, Value>, String> {
    let mut overrides = match &args.vars_file {
        Some(path) => loader::load_overrides(Path::new(path))?,
        None => BTreeMap::new(),
    };
    for var in &args.vars {
        let (name, value) = var
            .split_once('=')
            .ok_or_else(|| format!("invalid --var \"{}\", expected NAME=VALUE", var))?;
        overrides.insert(name.trim().to_string(), Value::string(value));
    }
    Ok(overrides)
}

fn emit_error(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    document: &Document,
    error: &Error,
) {
    if document.source.is_none() {
        eprintln!("error: {}", error);
        return;
    }
    let diagnostics: Vec<Diagnostic<usize>> = match error {
        Error::Decode { errors } => errors.iter().map(|e| e.to_diagnostic()).collect(),
        other => {
            let labels = other
                .span()
                .map(|span| vec![Label::primary(document.source_id, span)])
                .unwrap_or_default();
            vec![Diagnostic::error()
                .with_message(other.to_string())
                .with_labels(labels)]
        }
    };
    for diagnostic in &diagnostics {
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, diagnostic);
    }
}
