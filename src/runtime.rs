use crate::{
    config::Config,
    engine::{response::VisualizeResponse, Pipeline, VisualizeRequest},
    error::PipelineError,
    prune::spawn_retention_sweeper,
};

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::Span;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/* ---------------- server ---------------- */

pub fn router(state: AppState, cors: bool) -> Router {
    let artifacts = ServeDir::new(state.pipeline.storage());

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/api/visualize", post(visualize))
        .nest_service("/visualizations", artifacts)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        path = %req.uri().path(),
                    )
                })
                .on_response(|res: &Response, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = res.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "request completed"
                    );
                }),
        );

    if cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

pub async fn serve(cfg: Config) -> anyhow::Result<()> {
    crate::util::ensure_dir(&cfg.storage.dir)?;

    if let Some(hours) = cfg.retention.max_age_hours {
        spawn_retention_sweeper(
            cfg.storage.dir.clone(),
            Duration::from_secs(hours * 3600),
            Duration::from_secs(cfg.retention.sweep_interval_secs.max(1)),
        );
    }

    let app = router(AppState::new(Pipeline::from_config(&cfg)), cfg.server.cors);

    let socket: SocketAddr = cfg.server.addr.parse()?;
    let listener = TcpListener::bind(socket).await?;

    tracing::info!(
        storage = %cfg.storage.dir.display(),
        timeout_secs = cfg.execution.timeout_secs,
        "vizexec listening on http://{}",
        socket
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/* ---------------- endpoints ---------------- */

async fn health() -> &'static str {
    "ok"
}

async fn visualize(
    State(state): State<AppState>,
    body: Result<Json<VisualizeRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            let err = PipelineError::validation(format!(
                "Invalid request body: {}",
                rejection.body_text()
            ));
            return (StatusCode::BAD_REQUEST, Json(VisualizeResponse::failure(&err)))
                .into_response();
        }
    };

    let result = state.pipeline.run(req).await;
    if let Err(e) = &result {
        tracing::debug!(code = e.code(), "visualize request failed");
    }

    let (status, body) = VisualizeResponse::from_result(&result);
    (status, Json(body)).into_response()
}
