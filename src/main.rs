use std::fs;
use std::path::{Path, PathBuf};

use calcdown::{Environment, tokenize};
use clap::Parser;
use clap::Subcommand;
use miette::IntoDiagnostic;
use miette::WrapErr;

#[derive(Parser, Debug)]
#[command(about = "Numi-style calculator with units, percentages and dates")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the tokens of every line in a file.
    Tokenize { filename: PathBuf },
    /// Evaluate a file as one block.
    Evaluate {
        filename: PathBuf,
        /// Print the structured result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Evaluate a single expression.
    Line {
        expression: String,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> miette::Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Tokenize { filename } => {
            let file_contents = read(&filename)?;
            let name = filename.display().to_string();

            for (index, line) in file_contents.lines().enumerate() {
                for token in tokenize(line) {
                    if let Some(error) = token.diagnostic(&name, line) {
                        eprintln!(
                            "[line {}:{}] Error: Unrecognized token: {}",
                            index + 1,
                            error.column(),
                            error.token
                        );
                        eprintln!("{:?}", miette::Report::new(error));
                        std::process::exit(65);
                    }
                    println!("{token}");
                }
            }
            println!("EOF  null");
        }
        Commands::Evaluate { filename, json } => {
            let file_contents = read(&filename)?;
            let name = filename.display().to_string();

            report_lexical_errors(&name, &file_contents);
            let block = calcdown::parse_block(&file_contents);

            if json {
                let rendered = serde_json::to_string_pretty(&block.to_structured())
                    .into_diagnostic()
                    .wrap_err("serializing block result failed")?;
                println!("{rendered}");
            } else {
                for line in &block.lines {
                    println!("{line}");
                }
            }
        }
        Commands::Line { expression, json } => {
            report_lexical_errors("<line>", &expression);
            let line = calcdown::parse_line(&expression, &Environment::new());

            if json {
                let rendered = serde_json::to_string_pretty(&line.to_structured())
                    .into_diagnostic()
                    .wrap_err("serializing line result failed")?;
                println!("{rendered}");
            } else {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn read(filename: &Path) -> miette::Result<String> {
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading `{}` failed", filename.display()))
}

/// Lexical errors do not stop evaluation; they are only reported.
fn report_lexical_errors(name: &str, text: &str) {
    for line in text.lines() {
        if let Some(error) = tokenize(line)
            .last()
            .and_then(|token| token.diagnostic(name, line))
        {
            eprintln!("{:?}", miette::Report::new(error));
        }
    }
}
