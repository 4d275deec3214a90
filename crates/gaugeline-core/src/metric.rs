//! The [`Metric`] type and its kind/value building blocks.
//!
//! A metric is identified by its `id` and carries exactly one measurement,
//! selected by kind: a gauge holds an `f64` value, a counter holds an `i64`
//! delta. [`MetricValue`] makes that invariant structural, so a metric with
//! both or neither field populated cannot be represented.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::integrity::{SigningKey, Tag};

/// The two supported metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Point-in-time measurement; last write wins.
    Gauge,
    /// Accumulating measurement; deltas are summed.
    Counter,
}

impl MetricKind {
    /// The lowercase name used on the wire, in URLs, and in the SQL `type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(CoreError::UnsupportedKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// A single measurement, tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Counter(i64),
}

impl MetricValue {
    /// Parses a path-encoded literal (`/update/{kind}/{name}/{literal}`).
    pub fn parse(kind: MetricKind, literal: &str) -> Result<Self, CoreError> {
        match kind {
            MetricKind::Gauge => literal
                .parse::<f64>()
                .map(MetricValue::Gauge)
                .map_err(|e| CoreError::malformed(format!("gauge value '{}': {}", literal, e))),
            MetricKind::Counter => literal
                .parse::<i64>()
                .map(MetricValue::Counter)
                .map_err(|e| CoreError::malformed(format!("counter delta '{}': {}", literal, e))),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }

    /// Human-facing rendering: gauges with three fractional digits, counters
    /// as plain integers.
    pub fn to_plain_string(&self) -> String {
        match self {
            MetricValue::Gauge(v) => format!("{:.3}", v),
            MetricValue::Counter(d) => d.to_string(),
        }
    }
}

/// A named measurement with an optional integrity tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Unique key within one storage instance.
    pub id: String,
    /// The measurement; its variant selects the metric kind.
    pub value: MetricValue,
    /// Keyed digest over [`Metric::canonical_string`], when signed.
    pub tag: Option<Tag>,
}

impl Metric {
    pub fn new(id: impl Into<String>, value: MetricValue) -> Self {
        Metric {
            id: id.into(),
            value,
            tag: None,
        }
    }

    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Metric::new(id, MetricValue::Gauge(value))
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Metric::new(id, MetricValue::Counter(delta))
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    /// Checks the invariants a metric must satisfy before it may be stored:
    /// a non-empty id, a finite gauge value, a non-negative counter delta.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::malformed("metric id is empty"));
        }
        match self.value {
            MetricValue::Gauge(v) if !v.is_finite() => Err(CoreError::malformed(format!(
                "gauge '{}' has non-finite value {}",
                self.id, v
            ))),
            MetricValue::Counter(d) if d < 0 => Err(CoreError::malformed(format!(
                "counter '{}' has negative delta {}",
                self.id, d
            ))),
            _ => Ok(()),
        }
    }

    /// The string the integrity tag is computed over:
    /// `"<id>:gauge:<value with 6 decimals>"` or `"<id>:counter:<delta>"`.
    pub fn canonical_string(&self) -> String {
        match self.value {
            MetricValue::Gauge(v) => format!("{}:{}:{:.6}", self.id, MetricKind::Gauge, v),
            MetricValue::Counter(d) => format!("{}:{}:{}", self.id, MetricKind::Counter, d),
        }
    }

    /// Recomputes the tag with `key`, or clears it when hashing is disabled.
    pub fn update_tag(&mut self, key: Option<&SigningKey>) {
        self.tag = key.map(|k| k.digest(self.canonical_string().as_bytes()));
    }

    /// Builder-style variant of [`Metric::update_tag`].
    pub fn signed(mut self, key: Option<&SigningKey>) -> Self {
        self.update_tag(key);
        self
    }

    /// Verifies the stored tag against `key` in constant time.
    ///
    /// A missing tag is a mismatch: callers decide beforehand whether an
    /// untagged metric is acceptable.
    pub fn verify(&self, key: &SigningKey) -> Result<(), CoreError> {
        let matches = self
            .tag
            .as_ref()
            .is_some_and(|tag| key.verify(self.canonical_string().as_bytes(), tag));
        if matches {
            Ok(())
        } else {
            Err(CoreError::IntegrityMismatch {
                id: self.id.clone(),
            })
        }
    }
}
