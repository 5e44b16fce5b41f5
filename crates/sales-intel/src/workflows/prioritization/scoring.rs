use serde::{Deserialize, Serialize};

use super::validation::ValidationError;
use crate::workflows::accounts::domain::{CustomerId, CustomerRecord};

/// Where a weighted signal is read from on a [`CustomerRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum SignalSource {
    Feature(String),
    Attribution(String),
}

impl SignalSource {
    pub fn name(&self) -> &str {
        match self {
            Self::Feature(name) | Self::Attribution(name) => name,
        }
    }

    fn read(&self, record: &CustomerRecord) -> Result<f64, ValidationError> {
        match self {
            Self::Feature(name) => {
                record
                    .feature(name)
                    .ok_or_else(|| ValidationError::MissingFeature {
                        customer: record.id.clone(),
                        feature: name.clone(),
                    })
            }
            Self::Attribution(name) => {
                record
                    .attribution(name)
                    .ok_or_else(|| ValidationError::MissingAttribution {
                        customer: record.id.clone(),
                        feature: name.clone(),
                    })
            }
        }
    }
}

/// One term of the priority formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedSignal {
    pub source: SignalSource,
    pub weight: f64,
    /// Business meaning of the term, e.g. "engagement urgency".
    pub role: String,
}

/// Versioned priority policy: `score = predicted + sum(weight * signal)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub version: u32,
    pub signals: Vec<WeightedSignal>,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            version: 1,
            signals: vec![
                WeightedSignal {
                    source: SignalSource::Feature("demo_requests".to_string()),
                    weight: 5.0,
                    role: "engagement urgency".to_string(),
                },
                WeightedSignal {
                    source: SignalSource::Feature("cloud_maturity_score".to_string()),
                    weight: 2.0,
                    role: "product fit".to_string(),
                },
                WeightedSignal {
                    source: SignalSource::Feature("csm_relationship_score".to_string()),
                    weight: 1.5,
                    role: "relationship strength".to_string(),
                },
            ],
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for signal in &self.signals {
            if !signal.weight.is_finite() || signal.weight < 0.0 {
                return Err(ValidationError::InvalidWeight {
                    signal: signal.source.name().to_string(),
                    weight: signal.weight,
                });
            }
        }
        Ok(())
    }
}

/// Contribution of one signal to a customer's score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreTerm {
    pub signal: String,
    pub role: String,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityScore {
    pub customer_id: CustomerId,
    pub score: f64,
    pub predicted: f64,
    pub terms: Vec<ScoreTerm>,
}

/// Stateless scorer applying a [`ScoringWeights`] policy to one record at a time.
#[derive(Debug, Clone)]
pub struct PriorityScorer {
    weights: ScoringWeights,
}

impl PriorityScorer {
    pub fn new(weights: ScoringWeights) -> Result<Self, ValidationError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score(&self, record: &CustomerRecord) -> Result<PriorityScore, ValidationError> {
        ensure_finite(&record.id, "predicted outcome", record.predicted)?;

        let mut score = record.predicted;
        let mut terms = Vec::with_capacity(self.weights.signals.len());
        for signal in &self.weights.signals {
            let value = signal.source.read(record)?;
            ensure_finite(&record.id, signal.source.name(), value)?;

            let contribution = signal.weight * value;
            score += contribution;
            terms.push(ScoreTerm {
                signal: signal.source.name().to_string(),
                role: signal.role.clone(),
                value,
                weight: signal.weight,
                contribution,
            });
        }

        ensure_finite(&record.id, "priority score", score)?;

        Ok(PriorityScore {
            customer_id: record.id.clone(),
            score,
            predicted: record.predicted,
            terms,
        })
    }

    pub fn score_all(&self, records: &[CustomerRecord]) -> Result<Vec<PriorityScore>, ValidationError> {
        records.iter().map(|record| self.score(record)).collect()
    }
}

fn ensure_finite(customer: &CustomerId, field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFiniteValue {
            customer: customer.clone(),
            field: field.to_string(),
            value,
        })
    }
}

/// Rescales scores to `0..=100` across the run; a flat run maps to all zeros.
pub fn min_max_rescale(scores: &mut [PriorityScore]) {
    let (min, max) = scores.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), entry| {
        (lo.min(entry.score), hi.max(entry.score))
    });
    let span = max - min;

    for entry in scores.iter_mut() {
        entry.score = if span > 0.0 {
            (entry.score - min) / span * 100.0
        } else {
            0.0
        };
    }
}
