use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use scl_core::{Document, Grammars, Severity, ValidationConfig, ValidationContext};
use scl_lsp::line_index::LineIndex;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// SCL validation toolchain.
#[derive(Parser)]
#[command(name = "scl", version, about = "SCL validation toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate SCL files and print their diagnostics
    Check {
        /// Paths to the SCL files to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Cap on the total number of reported problems
        #[arg(long, default_value_t = 1000)]
        max_problems: usize,
        /// Do not require TO file targets for RETRIEVE and LIST
        #[arg(long)]
        rest: bool,
    },

    /// Run the language server over stdio
    Lsp,
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Check {
            files,
            max_problems,
            rest,
        } => {
            let code = run_check(&files, max_problems, rest, cli.output);
            process::exit(code);
        }
        Commands::Lsp => {
            if let Err(e) = scl_lsp::run() {
                eprintln!("scl lsp: {}", e);
                process::exit(1);
            }
        }
    }
}

fn run_check(
    files: &[PathBuf],
    max_problems: usize,
    rest: bool,
    output: OutputFormat,
) -> i32 {
    let grammars = match Grammars::load() {
        Ok(g) => g,
        Err(e) => {
            eprintln!("scl check: {}", e);
            return 2;
        }
    };
    let mut ctx = ValidationContext::new(ValidationConfig {
        max_number_of_problems: max_problems,
        is_rest: rest,
    });

    let mut any_errors = false;
    let mut reports = Vec::new();
    for path in files {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("scl check: {}: {}", path.display(), e);
                return 2;
            }
        };
        let document = Document::open(text, &grammars, &mut ctx);
        if document
            .diagnostics()
            .any(|d| d.severity == Severity::Error)
        {
            any_errors = true;
        }
        reports.push((path.clone(), document));
    }

    match output {
        OutputFormat::Text => print_text(&reports),
        OutputFormat::Json => print_json(&reports),
    }
    if any_errors {
        1
    } else {
        0
    }
}

fn print_text(reports: &[(PathBuf, Document)]) {
    for (path, document) in reports {
        let index = LineIndex::new(&document.text);
        for diagnostic in document.diagnostics() {
            let position = index.position(&document.text, diagnostic.start);
            let severity = match diagnostic.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            // Report one-based positions; the first message line keeps
            // the output grep-friendly.
            let message = diagnostic.message.lines().next().unwrap_or_default();
            println!(
                "{}:{}:{}: {}: {}",
                path.display(),
                position.line + 1,
                position.character + 1,
                severity,
                message
            );
            if let Some(related) = &diagnostic.related {
                println!("    {}", related.message);
            }
        }
    }
}

fn print_json(reports: &[(PathBuf, Document)]) {
    let entries: Vec<serde_json::Value> = reports
        .iter()
        .map(|(path, document)| {
            let diagnostics: Vec<serde_json::Value> = document
                .diagnostics()
                .map(|d| {
                    serde_json::json!({
                        "severity": match d.severity {
                            Severity::Error => "error",
                            Severity::Warning => "warning",
                        },
                        "start": d.start,
                        "end": d.end,
                        "message": d.message,
                        "related": d.related.as_ref().map(|r| r.message.clone()),
                    })
                })
                .collect();
            serde_json::json!({
                "file": path.display().to_string(),
                "diagnostics": diagnostics,
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::Value::Array(entries))
            .unwrap_or_else(|_| "[]".to_string())
    );
}
