//! Worker-process side of the process pool: newline-delimited JSON over stdio.
//!
//! Each request line is a [`WorkerRequest`]; each answer is one [`WorkerReply`]
//! line carrying the same id. Logging must not go to the reply stream.

use crate::invoke;
use aurora_types::{CommandDelegate, CommandResult, JobCommand};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: Uuid,
    pub command: JobCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply {
    /// The command ran; `result` may itself be a failure.
    Done { id: Uuid, result: CommandResult },
    /// The request (or the reply) could not be marshalled.
    Rejected { id: Option<Uuid>, error: String },
}

/// Serve requests until `input` reaches EOF. Commands run one at a time.
pub fn serve<R, W>(delegate: &dyn CommandDelegate, input: R, mut output: W) -> std::io::Result<()>
where
    R: BufRead,
    W: Write,
{
    tracing::info!(pid = std::process::id(), "worker ready");
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(delegate, &line);
        let encoded = match serde_json::to_string(&reply) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(error = %e, "cannot encode worker reply");
                serde_json::to_string(&WorkerReply::Rejected {
                    id: reply_id(&reply),
                    error: format!("cannot encode result: {}", e),
                })?
            }
        };
        writeln!(output, "{}", encoded)?;
        output.flush()?;
    }
    tracing::info!(pid = std::process::id(), "worker input closed, exiting");
    Ok(())
}

fn handle_line(delegate: &dyn CommandDelegate, line: &str) -> WorkerReply {
    match serde_json::from_str::<WorkerRequest>(line) {
        Ok(request) => {
            tracing::info!(
                id = %request.id,
                op = %request.command.operation(),
                key = %request.command.key(),
                "worker running command"
            );
            WorkerReply::Done {
                id: request.id,
                result: invoke(delegate, &request.command),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "undecodable worker request");
            WorkerReply::Rejected {
                id: recover_id(line),
                error: format!("cannot decode request: {}", e),
            }
        }
    }
}

/// Best-effort id from a request that failed to decode as a whole.
fn recover_id(line: &str) -> Option<Uuid> {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()?
        .get("id")?
        .as_str()?
        .parse()
        .ok()
}

fn reply_id(reply: &WorkerReply) -> Option<Uuid> {
    match reply {
        WorkerReply::Done { id, .. } => Some(*id),
        WorkerReply::Rejected { id, .. } => *id,
    }
}

impl WorkerReply {
    pub fn id(&self) -> Option<Uuid> {
        reply_id(self)
    }

    /// Convenience for callers that only need the normalized result.
    pub fn into_result(self) -> Result<CommandResult, String> {
        match self {
            WorkerReply::Done { result, .. } => Ok(result),
            WorkerReply::Rejected { error, .. } => Err(error),
        }
    }
}
