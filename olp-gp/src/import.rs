//! Bulk grade import
//!
//! Accepts a CSV body of `user_id,score_given,score_maximum` rows and
//! reports a per-row outcome. A bad row never aborts the batch. The format
//! is plain comma-separated fields without quoting; grade exports from the
//! vendor tools this feeds from never quote these columns.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use olp_common::api::ApiError;
use olp_common::{store, Error};

use crate::models::{LineItem, LINE_ITEMS};
use crate::scores::{record_score, ScoreRequest};
use crate::{passback, AppState};

/// Required first line of the CSV body
pub const CSV_HEADER: &str = "user_id,score_given,score_maximum";

/// Upper bound on the CSV body (1 MiB)
pub const MAX_CSV_BYTES: usize = 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct ImportError {
    /// 1-based line number in the submitted body
    pub line: usize,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<ImportError>,
}

fn parse_row(line: &str) -> Result<ScoreRequest, Error> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(Error::Validation(format!(
            "Expected 3 fields, got {}",
            fields.len()
        )));
    }

    let user_id = fields[0];
    if user_id.is_empty() {
        return Err(Error::Validation("user_id must not be empty".to_string()));
    }
    let score_given: f64 = fields[1]
        .parse()
        .map_err(|_| Error::Validation(format!("Bad score_given '{}'", fields[1])))?;
    let score_maximum: f64 = fields[2]
        .parse()
        .map_err(|_| Error::Validation(format!("Bad score_maximum '{}'", fields[2])))?;

    Ok(ScoreRequest {
        user_id: user_id.to_string(),
        score_given,
        score_maximum,
        activity_progress: "Completed".to_string(),
        grading_progress: "Completed".to_string(),
    })
}

/// POST /api/line-items/:uuid/import-grades
pub async fn import_grades(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    body: String,
) -> Result<Json<ImportResponse>, ApiError> {
    if body.len() > MAX_CSV_BYTES {
        return Err(Error::PayloadTooLarge(format!(
            "CSV body exceeds {} bytes",
            MAX_CSV_BYTES
        ))
        .into());
    }

    let mut lines = body.lines();
    let header = lines.next().map(str::trim).unwrap_or("");
    if header.replace(' ', "") != CSV_HEADER {
        return Err(Error::Validation(format!(
            "First line must be the header '{}'",
            CSV_HEADER
        ))
        .into());
    }

    let mut tx = state.db.begin().await?;
    let item: LineItem = store::fetch(&mut *tx, LINE_ITEMS, uuid).await?.decode()?;

    let mut imported = Vec::new();
    let mut errors = Vec::new();
    for (index, line) in lines.enumerate() {
        let line_number = index + 2;
        if line.trim().is_empty() {
            continue;
        }

        let outcome = match parse_row(line) {
            Ok(req) => record_score(&mut *tx, &item, req).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(result) => imported.push(result),
            Err(e) => errors.push(ImportError {
                line: line_number,
                error: e.to_string(),
            }),
        }
    }
    tx.commit().await?;

    for result in &imported {
        passback::deliver(&state, result);
    }

    Ok(Json(ImportResponse {
        imported: imported.len(),
        failed: errors.len(),
        errors,
    }))
}
