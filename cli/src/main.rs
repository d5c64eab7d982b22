mod config;
mod error;
mod error_formatter;
mod formatter;
mod marshal;
mod request;
mod server;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::{ConfigArgs, ServerConfig};
use error::RunError;
use formatter::Formatter;
use request::{RequestHandler, RunRequest};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scl")]
#[command(about = "Run provenance-aware logic programs over typed facts.")]
#[command(
    long_about = "scl evaluates Scallop-style logic programs against typed input relations.\nRun it as an HTTP server (POST /api/run-scallop), evaluate a request file directly, or check a program for errors."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default: localhost:3000)
    ///
    /// Serves POST /api/run-scallop with {inputs, program, outputs}
    /// and GET /health. Every request gets its own engine context.
    Server {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Evaluate a request file and print the output relations
    ///
    /// The file holds the same JSON body the server accepts.
    Run {
        /// Path to the request JSON
        request: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Parse and compile a program file, reporting errors with source context
    Check {
        /// Path to the program
        program: PathBuf,
        /// Request JSON whose input relations the program reads
        #[arg(short, long)]
        request: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Server { config } => server_command(config),
        Commands::Run {
            request,
            format,
            config,
        } => run_command(request, *format, config),
        Commands::Check { program, request } => check_command(program, request.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{}", describe_error(&e));
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scl=info,scl_cli=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Program errors get a source excerpt, everything else its message
fn describe_error(err: &anyhow::Error) -> String {
    if let Some(run_err) = err.downcast_ref::<RunError>() {
        return match run_err {
            RunError::ProgramSyntaxError(scl_err) => error_formatter::format_error(scl_err),
            other => format!("Error: {}: {}", other.kind(), other),
        };
    }
    if let Some(scl_err) = err.downcast_ref::<scl::SclError>() {
        return error_formatter::format_error(scl_err);
    }
    format!("Error: {:#}", err)
}

fn server_command(args: &ConfigArgs) -> Result<()> {
    let config = ServerConfig::from_args(args)?;
    // Evaluation runs on the blocking pool; nested programs up to
    // max_expression_depth need more than the default 2 MiB stack
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(8 * 1024 * 1024)
        .build()?;
    rt.block_on(server::start_server(config))
}

fn read_request(path: &Path) -> Result<RunRequest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read request file {}", path.display()))?;
    let request = serde_json::from_str(&text)
        .map_err(|e| RunError::BadRequest(format!("{}: {}", path.display(), e)))?;
    Ok(request)
}

fn run_command(path: &Path, format: OutputFormat, args: &ConfigArgs) -> Result<()> {
    let config = ServerConfig::from_args(args)?;
    let request = read_request(path)?;
    let projection = request::run_request(request, &config)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&projection)?),
        OutputFormat::Table => print!("{}", Formatter::default().format_projection(&projection)),
    }
    Ok(())
}

fn check_command(program: &Path, request: Option<&Path>) -> Result<()> {
    let config = ServerConfig::default();
    let mut ctx = scl::Context::with_limits(config.provenance, config.limits.clone());

    if let Some(path) = request {
        let mut handler = RequestHandler::new();
        let validated = handler.validate(read_request(path)?, &config)?;
        for (schema, facts) in validated.relations {
            marshal::register(&mut ctx, &schema, facts)?;
        }
    }

    ctx.import_file(program)?;
    let compiled = ctx.compile()?;
    print!("{}", Formatter::default().format_program_summary(compiled));
    Ok(())
}
