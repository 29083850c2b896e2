//! Parser service CLI (spec section 6.3): `serve`, `extract-save`, and
//! `iter-save`. No async runtime — session mode is a synchronous
//! stdin/stdout loop (spec section 9), so unlike the teacher's
//! `#[tokio::main]` binary this `main` is plain.

use clap::{Parser, Subcommand};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use stellaris_parser::{
    observability, ArchiveLoader, ParserError, QueryEngine, SessionServer, ZipArchiveLoader,
    EXIT_INVALID_ARGS,
};

#[derive(Parser)]
#[command(name = "stellaris-parser", about = "Stellaris save-file parser service")]
struct Cli {
    /// Emit debug-level diagnostics on stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all but error-level diagnostics on stderr.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the line-delimited session server against one save archive.
    Serve {
        #[arg(long)]
        path: PathBuf,
    },

    /// One-shot: prints `extract_sections` output for the given archive, then exits.
    ExtractSave {
        archive: PathBuf,

        #[arg(long, value_delimiter = ',')]
        sections: Vec<String>,

        #[arg(long, default_value_t = 1)]
        schema_version: u32,

        #[arg(long, default_value = "-")]
        output: String,
    },

    /// One-shot streaming: JSON-per-line dump of a single section.
    IterSave {
        archive: PathBuf,

        #[arg(long)]
        section: String,

        #[arg(long, default_value = "jsonl")]
        format: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = observability::init_logging_with_level(cli.verbose, cli.quiet) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(EXIT_INVALID_ARGS as u8);
    }

    let code = match cli.command {
        Commands::Serve { path } => run_serve(&path),
        Commands::ExtractSave {
            archive,
            sections,
            schema_version,
            output,
        } => run_extract_save(&archive, &sections, schema_version, &output),
        Commands::IterSave {
            archive,
            section,
            format,
        } => run_iter_save(&archive, &section, &format),
    };

    ExitCode::from(code as u8)
}

fn load_engine(archive_path: &std::path::Path) -> Result<QueryEngine, ParserError> {
    let loader = ZipArchiveLoader;
    let loaded = loader.load(archive_path)?;
    let root = stellaris_parser::parse_document(&loaded.gamestate)?;
    Ok(QueryEngine::new(root, loaded.meta, loaded.gamestate))
}

fn run_serve(path: &std::path::Path) -> i32 {
    let engine = match load_engine(path) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{e}");
            return e.exit_code().unwrap_or(stellaris_parser::EXIT_ARCHIVE_ERROR);
        }
    };

    let mut server = SessionServer::new(engine);
    let stdin = io::stdin();
    let stdout = io::stdout();
    match server.run(stdin.lock(), BufWriter::new(stdout.lock())) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("session server I/O error: {e}");
            stellaris_parser::EXIT_ARCHIVE_ERROR
        }
    }
}

fn run_extract_save(archive: &std::path::Path, sections: &[String], schema_version: u32, output: &str) -> i32 {
    if schema_version != 1 {
        eprintln!("unsupported schema version {schema_version}");
        return EXIT_INVALID_ARGS;
    }

    let engine = match load_engine(archive) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{e}");
            return e.exit_code().unwrap_or(stellaris_parser::EXIT_ARCHIVE_ERROR);
        }
    };

    let result = engine.extract_sections(sections);
    let text = serde_json::to_string(&result).expect("Value always serializes");

    if output == "-" {
        println!("{text}");
    } else if let Err(e) = std::fs::write(output, text) {
        eprintln!("failed to write output '{output}': {e}");
        return EXIT_INVALID_ARGS;
    }

    stellaris_parser::EXIT_OK
}

fn run_iter_save(archive: &std::path::Path, section: &str, format: &str) -> i32 {
    if format != "jsonl" {
        eprintln!("unsupported format '{format}', only 'jsonl' is supported");
        return EXIT_INVALID_ARGS;
    }

    let engine = match load_engine(archive) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{e}");
            return e.exit_code().unwrap_or(stellaris_parser::EXIT_ARCHIVE_ERROR);
        }
    };

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    for (key, value) in engine.iter_section(section) {
        let line = serde_json::json!({ "key": key, "value": value });
        if let Err(e) = writeln!(writer, "{line}") {
            eprintln!("write error: {e}");
            return stellaris_parser::EXIT_ARCHIVE_ERROR;
        }
    }
    if let Err(e) = writer.flush() {
        eprintln!("write error: {e}");
        return stellaris_parser::EXIT_ARCHIVE_ERROR;
    }

    stellaris_parser::EXIT_OK
}
