//! JSON wire shape of a metric.
//!
//! [`MetricPayload`] mirrors the protocol exactly:
//! `{"id":..,"type":"gauge"|"counter","delta"?:..,"value"?:..,"hash"?:..}`.
//! It is deliberately loose (every measurement field optional, kind as a raw
//! string) so that decoding never fails on shape alone; the conversion into
//! [`Metric`] is where the invariants are enforced.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::integrity::Tag;
use crate::metric::{Metric, MetricKind, MetricValue};

/// One metric as it appears on the wire and in file snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl MetricPayload {
    /// A query payload: identity only, no measurement.
    pub fn query(id: impl Into<String>, kind: MetricKind) -> Self {
        MetricPayload {
            id: id.into(),
            kind: kind.as_str().to_string(),
            delta: None,
            value: None,
            hash: None,
        }
    }

    /// Parses the `type` field.
    pub fn metric_kind(&self) -> Result<MetricKind, CoreError> {
        self.kind.parse()
    }

    /// Decodes one JSON object.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decodes a JSON array of payloads.
    pub fn batch_from_json(bytes: &[u8]) -> Result<Vec<Self>, CoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl From<&Metric> for MetricPayload {
    fn from(metric: &Metric) -> Self {
        let (delta, value) = match metric.value {
            MetricValue::Gauge(v) => (None, Some(v)),
            MetricValue::Counter(d) => (Some(d), None),
        };
        MetricPayload {
            id: metric.id.clone(),
            kind: metric.kind().as_str().to_string(),
            delta,
            value,
            hash: metric.tag.as_ref().map(Tag::to_hex),
        }
    }
}

impl From<Metric> for MetricPayload {
    fn from(metric: Metric) -> Self {
        MetricPayload::from(&metric)
    }
}

impl TryFrom<MetricPayload> for Metric {
    type Error = CoreError;

    fn try_from(payload: MetricPayload) -> Result<Self, Self::Error> {
        let kind = payload.metric_kind()?;
        let value = match (kind, payload.value, payload.delta) {
            (MetricKind::Gauge, Some(v), None) => MetricValue::Gauge(v),
            (MetricKind::Counter, None, Some(d)) => MetricValue::Counter(d),
            (MetricKind::Gauge, None, _) | (MetricKind::Counter, _, None) => {
                return Err(CoreError::Malformed {
                    reason: format!("{} '{}' is missing its measurement", kind, payload.id),
                })
            }
            _ => {
                return Err(CoreError::Malformed {
                    reason: format!("{} '{}' carries both value and delta", kind, payload.id),
                })
            }
        };
        let tag = match payload.hash.as_deref() {
            None | Some("") => None,
            Some(hex) => Some(hex.parse::<Tag>()?),
        };
        let metric = Metric {
            id: payload.id,
            value,
            tag,
        };
        metric.validate()?;
        Ok(metric)
    }
}
