// src/engine/response.rs

use axum::http::StatusCode;
use serde::Serialize;

use crate::engine::Visualization;
use crate::error::PipelineError;

/// JSON body returned by `POST /api/visualize` and `vizexec run`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VisualizeResponse {
    #[serde(rename_all = "camelCase")]
    Success {
        success: bool,
        viz_id: String,
        artifact_reference: String,
        visualization_url: String,
        #[serde(rename = "type")]
        kind: &'static str,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_rss_kb: Option<u64>,
    },
    Failure {
        success: bool,
        code: &'static str,
        error: String,
    },
}

impl VisualizeResponse {
    pub fn from_result(result: &Result<Visualization, PipelineError>) -> (StatusCode, Self) {
        match result {
            Ok(viz) => (
                StatusCode::OK,
                VisualizeResponse::Success {
                    success: true,
                    viz_id: viz.viz_id.to_string(),
                    artifact_reference: viz.artifact_reference.clone(),
                    visualization_url: viz.visualization_url.clone(),
                    kind: viz.kind.as_str(),
                    duration_ms: viz.duration_ms,
                    max_rss_kb: viz.max_rss_kb,
                },
            ),
            Err(e) => (e.status(), VisualizeResponse::failure(e)),
        }
    }

    pub fn failure(err: &PipelineError) -> Self {
        VisualizeResponse::Failure {
            success: false,
            code: err.code(),
            error: err.to_string(),
        }
    }
}
