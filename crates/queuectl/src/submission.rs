//! Turns an `enqueue` invocation (JSON payload, `--id`/`--command`
//! pair, or `--json-file`) into the two required fields. This is the
//! one place JSON parsing of submissions happens ("thin
//! wrappers ... specified only as the minimal API they consume").

use anyhow::Context;

use crate::cli::EnqueueArgs;

pub struct Submission {
    pub id: String,
    pub command: String,
}

/// How a failed submission should be reported.
pub enum SubmissionError {
    /// The invocation itself was malformed (no payload and no
    /// `--id`/`--command`/`--json-file`, or the file could not be
    /// read). Exit code 2.
    Usage(String),
    /// The supplied JSON parsed as JSON but was invalid or incomplete
    /// ("client errors"). Exit code 1.
    InvalidPayload(String),
}

pub fn resolve(args: &EnqueueArgs) -> Result<Submission, SubmissionError> {
    let raw_payload = if let Some(path) = &args.json_file {
        Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("could not read --json-file {path}"))
                .map_err(|e| SubmissionError::Usage(format!("{e:#}")))?,
        )
    } else {
        args.payload.clone()
    };

    if let Some(payload) = raw_payload {
        return parse_payload(&payload);
    }

    if let (Some(id), Some(command)) = (&args.id, &args.command) {
        return Ok(Submission {
            id: id.clone(),
            command: command.clone(),
        });
    }

    Err(SubmissionError::Usage(
        "provide JSON payload OR both --id and --command (or --json-file)".to_string(),
    ))
}

fn parse_payload(payload: &str) -> Result<Submission, SubmissionError> {
    let value: serde_json::Value = serde_json::from_str(payload.trim())
        .map_err(|e| SubmissionError::InvalidPayload(format!("invalid JSON: {e}")))?;

    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SubmissionError::InvalidPayload("missing required field: id".to_string()))?
        .to_string();
    let command = value
        .get("command")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            SubmissionError::InvalidPayload("missing required field: command".to_string())
        })?
        .to_string();

    Ok(Submission { id, command })
}
