//! Human-readable listings.

use axum::extract::{Path, State};

use gaugeline_core::{Metric, MetricKind};

use crate::error::ApiError;
use crate::state::AppState;

/// Lists every metric, gauges first.
///
/// `GET /`
pub async fn list_all(State(state): State<AppState>) -> Result<String, ApiError> {
    let metrics = state.call(|svc| svc.list(None)).await?;
    let mut out = render_section(MetricKind::Gauge, &metrics);
    out.push('\n');
    out.push_str(&render_section(MetricKind::Counter, &metrics));
    Ok(out)
}

/// Lists the metrics of one kind. An unknown kind has nothing to list.
///
/// `GET /value/{kind}`
pub async fn list_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<String, ApiError> {
    let kind: MetricKind = kind
        .parse()
        .map_err(|_| ApiError::NotFound(format!("no metric kind '{}'", kind)))?;
    let metrics = state.call(move |svc| svc.list(Some(kind))).await?;
    Ok(render_section(kind, &metrics))
}

fn render_section(kind: MetricKind, metrics: &[Metric]) -> String {
    let title = match kind {
        MetricKind::Gauge => "GAUGES",
        MetricKind::Counter => "COUNTERS",
    };
    let mut out = format!("{} LIST:\n", title);
    for metric in metrics.iter().filter(|m| m.kind() == kind) {
        out.push_str(&format!("{} = {}\n", metric.id, metric.value.to_plain_string()));
    }
    out
}
