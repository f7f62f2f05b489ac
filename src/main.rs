use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use fen::ast::{ExprId, Stmt};
use fen::ast_printer::AstPrinter;
use fen::diagnostics::Reporter;
use fen::interpreter::Interpreter;
use fen::parser::Parser;
use fen::resolver::Resolver;
use fen::scanner::Scanner;
use fen::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Fen language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to fen.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes a source file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Emit the token stream as JSON instead of the plain listing
        #[arg(long)]
        json: bool,
    },

    /// Parses a source file and prints its AST
    Parse { filename: PathBuf },

    /// Runs a source file as a Fen program
    Run { filename: PathBuf },

    /// Starts an interactive session
    Repl,
}

/// Memory-map a source file and hand back its contents as a `String`.
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    // SAFETY: the mapping is read-only and dropped before this function
    // returns; we copy the validated text out.
    let mmap = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    let source: &str = std::str::from_utf8(&mmap)
        .context(format!("File {:?} is not valid UTF-8", filename))?;

    info!("Read {} bytes from {:?}", source.len(), filename);

    Ok(source.to_owned())
}

fn init_logger() -> Result<()> {
    let log_file = File::create("fen.log").context("Failed to create fen.log")?;

    // Write to file with module path and source line.
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("fen::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to fen.log");
    Ok(())
}

/// Scan + parse one source string, reporting through `reporter`.
fn front_end(source: &str, reporter: &mut Reporter, base_id: ExprId) -> (Vec<Stmt>, ExprId) {
    let tokens: Vec<Token> = Scanner::new(source).scan_tokens(reporter);

    let mut parser = Parser::with_base_id(&tokens, reporter, base_id);
    let statements: Vec<Stmt> = parser.parse();
    let next_id: ExprId = parser.next_id();

    (statements, next_id)
}

fn run_file(filename: &PathBuf) -> Result<()> {
    let source: String = read_file(filename)?;

    let mut reporter = Reporter::new();
    let (statements, _) = front_end(&source, &mut reporter, 0);

    if reporter.had_error {
        debug!("Static errors during scan/parse, exiting with code 65");
        std::process::exit(65);
    }

    let mut interpreter = Interpreter::new();
    Resolver::new(&mut interpreter, &mut reporter).resolve(&statements);

    if reporter.had_error {
        debug!("Static errors during resolution, exiting with code 65");
        std::process::exit(65);
    }

    interpreter.interpret(&statements, &mut reporter);

    if reporter.had_runtime_error {
        debug!("Runtime error, exiting with code 70");
        std::process::exit(70);
    }

    Ok(())
}

fn run_repl() -> Result<()> {
    let mut reporter = Reporter::new();
    let mut interpreter = Interpreter::new();
    let mut base_id: ExprId = 0;

    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let (statements, next_id) = front_end(&line, &mut reporter, base_id);
        base_id = next_id;

        if reporter.had_error {
            reporter.reset(); // one typo must not poison the session
            continue;
        }

        Resolver::new(&mut interpreter, &mut reporter).resolve(&statements);

        if reporter.had_error {
            reporter.reset();
            continue;
        }

        interpreter.interpret(&statements, &mut reporter);
        reporter.had_runtime_error = false;
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided.
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            info!("Running Tokenize subcommand");

            let source: String = read_file(&filename)?;
            let mut reporter = Reporter::new();
            let tokens: Vec<Token> = Scanner::new(&source).scan_tokens(&mut reporter);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&tokens)
                        .context("Failed to serialize token stream")?
                );
            } else {
                for token in &tokens {
                    println!("{}", token);
                }
            }

            if reporter.had_error {
                debug!("Tokenization failed, exiting with code 65");
                std::process::exit(65);
            }
        }

        Commands::Parse { filename } => {
            info!("Running Parse subcommand");

            let source: String = read_file(&filename)?;
            let mut reporter = Reporter::new();
            let (statements, _) = front_end(&source, &mut reporter, 0);

            for stmt in &statements {
                println!("{}", AstPrinter::print_stmt(stmt));
            }

            if reporter.had_error {
                debug!("Parse failed, exiting with code 65");
                std::process::exit(65);
            }
        }

        Commands::Run { filename } => {
            info!("Running Run subcommand");
            run_file(&filename)?;
        }

        Commands::Repl => {
            info!("Starting REPL");
            run_repl()?;
        }
    }

    Ok(())
}
