use crate::marshal::{LoaderKind, ProgramLoader};
use clap::Args;
use scl::{ProvenanceMode, ResourceLimits};
use std::path::PathBuf;

/// Server and evaluation settings, read from flags or the environment
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Host address to bind to
    #[arg(long, env = "SCL_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to listen on
    #[arg(short, long, env = "SCL_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory for per-request program files (defaults to the system temp dir)
    #[arg(long, env = "SCL_TMP_DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// How program text is handed to the engine
    #[arg(long, env = "SCL_PROGRAM_LOADER", value_enum, default_value_t = LoaderKind::Inline)]
    pub program_loader: LoaderKind,

    /// Provenance used when a request does not choose one
    #[arg(long, env = "SCL_PROVENANCE", default_value = "topkproofs")]
    pub provenance: String,

    /// Number of proofs kept per tuple under topkproofs
    #[arg(long, env = "SCL_TOP_K", default_value_t = ProvenanceMode::DEFAULT_K)]
    pub top_k: usize,

    /// Evaluation budget per request in milliseconds
    #[arg(long, env = "SCL_EVAL_TIMEOUT_MS", default_value_t = 5_000)]
    pub eval_timeout_ms: u64,

    /// Largest accepted request body in bytes
    #[arg(long, env = "SCL_MAX_BODY_BYTES", default_value_t = 2 * 1024 * 1024)]
    pub max_body_bytes: usize,

    /// Most input facts accepted in one request
    #[arg(long, env = "SCL_MAX_FACTS")]
    pub max_facts: Option<usize>,
}

/// Validated configuration, built once at startup and shared read-only
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub loader: ProgramLoader,
    pub provenance: ProvenanceMode,
    pub limits: ResourceLimits,
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn from_args(args: &ConfigArgs) -> anyhow::Result<Self> {
        let provenance = ProvenanceMode::from_name(&args.provenance, Some(args.top_k))
            .map_err(|e| anyhow::anyhow!("invalid --provenance: {}", e))?;

        let tmp_dir = args.tmp_dir.clone().unwrap_or_else(std::env::temp_dir);
        if args.program_loader == LoaderKind::Tempfile && !tmp_dir.is_dir() {
            anyhow::bail!("tmp dir {} is not a directory", tmp_dir.display());
        }

        let mut limits = ResourceLimits::default().with_evaluation_time_ms(args.eval_timeout_ms);
        if let Some(max_facts) = args.max_facts {
            limits = limits.with_max_facts(max_facts);
        }

        Ok(Self {
            host: args.host.clone(),
            port: args.port,
            loader: ProgramLoader::new(args.program_loader, &tmp_dir),
            provenance,
            limits,
            max_body_bytes: args.max_body_bytes,
        })
    }

    pub fn eval_timeout_ms(&self) -> u64 {
        self.limits.max_evaluation_time_ms
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            loader: ProgramLoader::Inline,
            provenance: ProvenanceMode::default(),
            limits: ResourceLimits::default(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}
