use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::MeasurementRecord;

/// Per-metric arithmetic means; `None` when there is nothing to average.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    #[serde(rename = "avg_flow")]
    pub flowrate: Option<f64>,
    #[serde(rename = "avg_press")]
    pub pressure: Option<f64>,
    #[serde(rename = "avg_temp")]
    pub temperature: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    pub eq_type: String,
    pub count: u64,
}

/// Derived statistics over one dataset. Never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregateSnapshot {
    pub count: u64,
    pub averages: Averages,
    pub distribution: HashMap<String, u64>,
}

impl AggregateSnapshot {
    /// Distribution sorted by type name.
    pub fn distribution_sorted(&self) -> Vec<TypeCount> {
        let mut out: Vec<TypeCount> = self
            .distribution
            .iter()
            .map(|(t, c)| TypeCount { eq_type: t.clone(), count: *c })
            .collect();
        out.sort_by(|a, b| a.eq_type.cmp(&b.eq_type));
        out
    }
}

/// The one aggregation routine behind summaries, history and reports.
pub fn aggregate(records: &[MeasurementRecord]) -> AggregateSnapshot {
    let mut distribution: HashMap<String, u64> = HashMap::new();
    for r in records {
        *distribution.entry(r.eq_type.clone()).or_default() += 1;
    }

    AggregateSnapshot {
        count: records.len() as u64,
        averages: Averages {
            flowrate: mean(records.iter().map(|r| r.flowrate), records.len()),
            pressure: mean(records.iter().map(|r| r.pressure), records.len()),
            temperature: mean(records.iter().map(|r| r.temperature), records.len()),
        },
        distribution,
    }
}

/// Arithmetic mean of finite values, in file order. Stays finite when the plain
/// sum would leave the f64 range.
fn mean<I>(values: I, count: usize) -> Option<f64>
where
    I: Iterator<Item = f64> + Clone,
{
    if count == 0 {
        return None;
    }
    let n = count as f64;

    let sum: f64 = values.clone().sum();
    if sum.is_finite() {
        return Some(sum / n);
    }
    Some(values.map(|v| v / n).sum())
}
