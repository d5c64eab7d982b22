//! Request handling for one program run.
//!
//! A request moves through `Received → Validated → Executing → Responded`.
//! Everything that can be checked without the engine (names, declared
//! types, fact shapes, provenance) is checked during validation, so a
//! request that reaches `Executing` only fails for program or evaluation
//! reasons.

use crate::config::ServerConfig;
use crate::error::RunError;
use crate::marshal::{self, Projection, RawFact, RelationSchema};
use regex::Regex;
use scl::{Context, ProvenanceMode};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub inputs: Vec<InputRelation>,
    pub program: String,
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub runtime: Option<RuntimeSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputRelation {
    pub name: String,
    pub args: Vec<ArgSpec>,
    #[serde(default)]
    pub facts: Vec<RawFact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArgSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: String,
}

/// `{"name": "..."}`, or a bare relation name
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OutputSpec {
    Named { name: String },
    Bare(String),
}

impl OutputSpec {
    pub fn name(&self) -> &str {
        match self {
            OutputSpec::Named { name } | OutputSpec::Bare(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default)]
    pub provenance: Option<String>,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validated,
    Executing,
    Responded,
}

/// A request whose shape has been fully checked and marshaled
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub relations: Vec<(RelationSchema, Vec<marshal::facts::Fact>)>,
    pub program: String,
    pub outputs: Vec<String>,
    pub provenance: ProvenanceMode,
}

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_request_id() -> String {
    let sequence = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%3f"), sequence)
}

fn relation_name_pattern() -> Result<&'static Regex, RunError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$"))
        .as_ref()
        .map_err(|e| RunError::Internal(format!("relation name pattern: {}", e)))
}

/// Tracks one request through its states and logs each transition
#[derive(Debug)]
pub struct RequestHandler {
    id: String,
    state: RequestState,
    started: Instant,
}

impl Default for RequestHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestHandler {
    pub fn new() -> Self {
        let handler = Self {
            id: next_request_id(),
            state: RequestState::Received,
            started: Instant::now(),
        };
        debug!(request_id = %handler.id, "request received");
        handler
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    fn advance(&mut self, next: RequestState) {
        debug!(request_id = %self.id, from = ?self.state, to = ?next, "request state");
        self.state = next;
    }

    /// Check the request shape and marshal its facts without touching the engine
    pub fn validate(
        &mut self,
        request: RunRequest,
        config: &ServerConfig,
    ) -> Result<ValidatedRequest, RunError> {
        let provenance = resolve_provenance(request.runtime.as_ref(), config.provenance)?;

        let mut relations = Vec::with_capacity(request.inputs.len());
        for input in &request.inputs {
            check_name("input relation", &input.name)?;
            let args = input
                .args
                .iter()
                .enumerate()
                .map(|(position, arg)| {
                    marshal::resolve(&input.name, position, &arg.ty)
                        .map(|tag| (arg.name.clone(), tag))
                })
                .collect::<Result<Vec<_>, RunError>>()?;
            let schema = RelationSchema {
                name: input.name.clone(),
                args,
            };
            let facts = marshal::marshal(&schema, &input.facts)?;
            relations.push((schema, facts));
        }

        let outputs = request
            .outputs
            .iter()
            .map(|output| {
                check_name("output relation", output.name())?;
                Ok(output.name().to_string())
            })
            .collect::<Result<Vec<_>, RunError>>()?;

        self.advance(RequestState::Validated);
        Ok(ValidatedRequest {
            relations,
            program: request.program,
            outputs,
            provenance,
        })
    }

    /// Mark the start of engine work
    pub fn begin(&mut self, validated: &ValidatedRequest) {
        debug!(
            request_id = %self.id,
            provenance = %validated.provenance,
            inputs = validated.relations.len(),
            outputs = validated.outputs.len(),
            "executing"
        );
        self.advance(RequestState::Executing);
    }

    /// Log the outcome and close the request
    pub fn respond(&mut self, result: &Result<Projection, RunError>) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        match result {
            Ok(projection) => {
                let tuples: usize = projection.values().map(Vec::len).sum();
                info!(
                    request_id = %self.id,
                    outputs = projection.len(),
                    tuples,
                    elapsed_ms,
                    "request completed"
                );
            }
            Err(err) => {
                warn!(
                    request_id = %self.id,
                    error = err.kind(),
                    status = err.status().as_u16(),
                    elapsed_ms,
                    "request failed: {}",
                    err
                );
            }
        }
        self.advance(RequestState::Responded);
    }
}

fn check_name(what: &str, name: &str) -> Result<(), RunError> {
    if relation_name_pattern()?.is_match(name) {
        Ok(())
    } else {
        Err(RunError::BadRequest(format!(
            "{} name '{}' must start with a letter or '_' and contain only letters, digits and '_'",
            what, name
        )))
    }
}

fn resolve_provenance(
    settings: Option<&RuntimeSettings>,
    default: ProvenanceMode,
) -> Result<ProvenanceMode, RunError> {
    let Some(settings) = settings else {
        return Ok(default);
    };
    let name = settings.provenance.as_deref().unwrap_or(default.name());
    let default_k = match default {
        ProvenanceMode::TopKProofs { k } => k,
        _ => ProvenanceMode::DEFAULT_K,
    };
    ProvenanceMode::from_name(name, Some(settings.k.unwrap_or(default_k))).map_err(RunError::BadRequest)
}

/// Build a fresh context and carry a validated request through the engine
pub fn execute(validated: ValidatedRequest, config: &ServerConfig) -> Result<Projection, RunError> {
    let mut ctx = Context::with_limits(validated.provenance, config.limits.clone());
    for (schema, facts) in validated.relations {
        marshal::register(&mut ctx, &schema, facts)?;
    }
    config.loader.load(&mut ctx, &validated.program)?;
    ctx.run()
        .map_err(|e| RunError::from_engine(e, config.eval_timeout_ms()))?;
    marshal::project(&ctx, validated.outputs.iter().map(String::as_str))
}

/// Run a request end to end on the current thread
pub fn run_request(request: RunRequest, config: &ServerConfig) -> Result<Projection, RunError> {
    let mut handler = RequestHandler::new();
    let result = handler.validate(request, config).and_then(|validated| {
        handler.begin(&validated);
        execute(validated, config)
    });
    handler.respond(&result);
    result
}
