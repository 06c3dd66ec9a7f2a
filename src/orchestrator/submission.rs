use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::backend::TaskBackend;
use crate::store::{CollectionKey, PredictionId, TaskStore};
use crate::tasks::fingerprint::fingerprint;
use crate::tasks::record::{ServerTaskRecord, TaskKind, TaskRecord, TaskStatus};

pub const MAX_SMILES_LEN: usize = 300;
pub const EXHAUSTIVENESS_MIN: i64 = 1;
pub const EXHAUSTIVENESS_MAX: i64 = 64;

/// Pre-submission validation failures. These are user errors, reported
/// through the side channel and never stored.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("SMILES must not be empty.")]
    EmptySmiles,
    #[error("SMILES must be shorter than {MAX_SMILES_LEN} characters.")]
    SmilesTooLong,
    #[error("Exhaustiveness must be an integer.")]
    ExhaustivenessNotInteger,
    #[error("Exhaustiveness must be in the range {EXHAUSTIVENESS_MIN}-{EXHAUSTIVENESS_MAX}.")]
    ExhaustivenessOutOfRange,
    #[error("Expected {expected} parameters for a {} task, got {got}.", .kind.label())]
    WrongParameterCount {
        kind: TaskKind,
        expected: usize,
        got: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A queued record was appended and the dispatch request was issued.
    Submitted,
    /// Validation rejected the input; nothing was stored or sent.
    Rejected,
}

/// Rejection report delivered through the submission side channel: the
/// human-readable message plus, for docking, a locally runnable equivalent
/// command (the escape hatch for submissions rejected on cost grounds).
#[derive(Debug, Clone)]
pub struct InvalidInput {
    pub message: String,
    pub local_command: Option<String>,
}

pub type InvalidInputSink = Box<dyn Fn(InvalidInput) + Send + Sync>;

/// Validates task input, appends the queued record and dispatches the
/// submission to the worker pool.
pub struct SubmissionService {
    store: Arc<dyn TaskStore>,
    backend: Arc<dyn TaskBackend>,
    invalid_input: InvalidInputSink,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn TaskStore>, backend: Arc<dyn TaskBackend>) -> Self {
        Self {
            store,
            backend,
            invalid_input: Box::new(|input| warn!("Invalid task input: {}", input.message)),
        }
    }

    /// Route rejection reports somewhere visible (a UI message box, stderr).
    pub fn with_invalid_input_sink(mut self, sink: InvalidInputSink) -> Self {
        self.invalid_input = sink;
        self
    }

    /// Submit a remote task for the pocket at `pocket_index` (0-based; the
    /// stored rank is 1-based).
    ///
    /// Validation failure reports through the sink and returns `Rejected`
    /// without touching the store or the network. A failed dispatch marks the
    /// just-appended record failed synchronously; there is no retry here.
    pub async fn submit(
        &self,
        prediction: &PredictionId,
        kind: TaskKind,
        params: &[String],
        name: &str,
        pocket_index: u32,
    ) -> Result<SubmitOutcome> {
        if !kind.is_remote() {
            bail!("{} tasks are computed locally, not submitted", kind.label());
        }

        let pocket = pocket_index + 1;

        let params = match validate(kind, params) {
            Ok(normalized) => normalized,
            Err(e) => {
                let local_command = match kind {
                    TaskKind::Docking => {
                        // Validated fields may be the oversized ones, so the
                        // command uses the raw input.
                        Some(docking_command(
                            params.first().map(String::as_str).unwrap_or(""),
                            pocket,
                            params.get(1).map(String::as_str).unwrap_or(""),
                        ))
                    }
                    _ => None,
                };
                (self.invalid_input)(InvalidInput {
                    message: e.to_string(),
                    local_command,
                });
                return Ok(SubmitOutcome::Rejected);
            }
        };

        let hash = fingerprint(kind, pocket, &params);
        let created = Utc::now();
        let key = CollectionKey::server(prediction);

        self.store
            .append(
                &key,
                TaskRecord::Server(ServerTaskRecord {
                    kind,
                    name: name.to_string(),
                    pocket,
                    params: params.clone(),
                    created,
                    status: TaskStatus::Queued,
                    queue_position: None,
                    result: None,
                }),
            )
            .await?;

        let body = match kind {
            TaskKind::Docking => json!({
                "hash": hash,
                "pocket": pocket,
                "smiles": params[0],
                "exhaustiveness": params[1],
            }),
            _ => json!({
                "hash": hash,
                "pocket": pocket,
            }),
        };

        if let Err(e) = self.backend.post_task(prediction, kind, body).await {
            warn!(kind = kind.tag(), pocket, "Task dispatch failed: {:#}", e);
            self.store
                .update(
                    &key,
                    created,
                    Box::new(|record| {
                        if let TaskRecord::Server(r) = record {
                            r.status = TaskStatus::Failed;
                        }
                    }),
                )
                .await?;
        }

        Ok(SubmitOutcome::Submitted)
    }
}

/// Per-kind input validation. Returns the normalized parameter list that gets
/// stored and fingerprinted.
pub fn validate(kind: TaskKind, params: &[String]) -> Result<Vec<String>, ValidationError> {
    match kind {
        TaskKind::Docking => {
            if params.len() != 2 {
                return Err(ValidationError::WrongParameterCount {
                    kind,
                    expected: 2,
                    got: params.len(),
                });
            }
            let smiles: String = params[0].split_whitespace().collect();
            if smiles.is_empty() {
                return Err(ValidationError::EmptySmiles);
            }
            if smiles.len() > MAX_SMILES_LEN {
                return Err(ValidationError::SmilesTooLong);
            }

            let exhaustiveness = params[1].replace(',', ".").replace(' ', "");
            let value: i64 = exhaustiveness
                .parse()
                .map_err(|_| ValidationError::ExhaustivenessNotInteger)?;
            if !(EXHAUSTIVENESS_MIN..=EXHAUSTIVENESS_MAX).contains(&value) {
                return Err(ValidationError::ExhaustivenessOutOfRange);
            }

            Ok(vec![smiles, value.to_string()])
        }
        TaskKind::Tunnels => {
            if !params.is_empty() {
                return Err(ValidationError::WrongParameterCount {
                    kind,
                    expected: 0,
                    got: params.len(),
                });
            }
            Ok(Vec::new())
        }
        TaskKind::Volume => Ok(params.to_vec()),
    }
}

/// Shell command equivalent of a docking submission, offered when the remote
/// run is rejected so the user can dock locally with AutoDock Vina.
pub fn docking_command(smiles: &str, pocket: u32, exhaustiveness: &str) -> String {
    format!(
        "vina --receptor structure.pdbqt --ligand ligand.pdbqt \
         --pocket {} --exhaustiveness {} # ligand SMILES: {}",
        pocket, exhaustiveness, smiles
    )
}
