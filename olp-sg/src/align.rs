//! Skill alignment scoring
//!
//! Ranks candidate documents against a source skill by text similarity over
//! title + description. The scorer is a trait seam so a remote embedding
//! backend can replace the lexical default without touching the handler;
//! only the lexical scorer ships (embedding APIs are external services).

use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use olp_common::api::{ApiError, HierarchyState};
use olp_common::hierarchy::NodeDocument;
use olp_common::{store, Error};

/// Default number of alignment results
pub const DEFAULT_TOP_K: usize = 10;

/// Upper bound on requested results
pub const MAX_TOP_K: usize = 50;

/// Pairwise text similarity in [0, 1]
pub trait SimilarityScorer {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Jaccard similarity over lowercased alphanumeric token sets
pub struct LexicalScorer;

impl LexicalScorer {
    fn tokens(text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect()
    }
}

impl SimilarityScorer for LexicalScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        let ta = Self::tokens(a);
        let tb = Self::tokens(b);
        if ta.is_empty() || tb.is_empty() {
            return 0.0;
        }

        let intersection = ta.intersection(&tb).count() as f64;
        let union = ta.union(&tb).count() as f64;
        intersection / union
    }
}

#[derive(Debug, Deserialize)]
pub struct AlignRequest {
    /// Collection to rank against (must exist in this service's rule table)
    pub target_collection: String,
    /// Number of results to return (default 10, capped at 50)
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AlignmentResult {
    pub uuid: Uuid,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct AlignResponse {
    pub skill_uuid: Uuid,
    pub target_collection: String,
    pub results: Vec<AlignmentResult>,
}

/// POST /api/skills/:uuid/align
///
/// Scores every non-archived document in the target collection against the
/// skill's title and description, descending by score.
pub async fn align_skill(
    State(state): State<HierarchyState>,
    Path(uuid): Path<Uuid>,
    Json(req): Json<AlignRequest>,
) -> Result<Json<AlignResponse>, ApiError> {
    state.rules.get(&req.target_collection)?;
    let top_k = req.top_k.unwrap_or(DEFAULT_TOP_K);
    if top_k == 0 || top_k > MAX_TOP_K {
        return Err(ApiError(Error::Validation(format!(
            "top_k must be between 1 and {}",
            MAX_TOP_K
        ))));
    }

    let mut conn = state.db.acquire().await?;
    let source = store::fetch(&mut *conn, "skills", uuid).await?;
    let source_node: NodeDocument = source.decode()?;
    let source_text = format!("{} {}", source_node.title, source_node.description);

    let scorer = LexicalScorer;
    let mut results = Vec::new();
    for doc in store::list_all(&mut *conn, &req.target_collection).await? {
        if doc.is_archived || (doc.collection == "skills" && doc.uuid == uuid) {
            continue;
        }
        let node: NodeDocument = doc.decode()?;
        let text = format!("{} {}", node.title, node.description);
        let score = scorer.score(&source_text, &text);
        results.push(AlignmentResult {
            uuid: doc.uuid,
            title: node.title,
            score,
        });
    }

    // Descending by score; UUID as tiebreak for a stable order
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.uuid.cmp(&b.uuid))
    });
    results.truncate(top_k);

    Ok(Json(AlignResponse {
        skill_uuid: uuid,
        target_collection: req.target_collection,
        results,
    }))
}
