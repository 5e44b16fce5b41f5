use serde::{Deserialize, Serialize};

use crate::workflows::accounts::domain::{display_name, CustomerId, CustomerRecord};
use crate::workflows::prioritization::ValidationError;

/// Number of named drivers shown before the remainder is bucketed.
pub const DEFAULT_DRIVER_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactDirection {
    Positive,
    Negative,
}

impl ImpactDirection {
    pub fn of(contribution: f64) -> Self {
        if contribution > 0.0 {
            Self::Positive
        } else {
            Self::Negative
        }
    }

    pub const fn verb(self) -> &'static str {
        match self {
            Self::Positive => "increases",
            Self::Negative => "decreases",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub feature: String,
    pub label: String,
    /// Customer's value for the feature, when the record carries it.
    pub value: Option<f64>,
    pub contribution: f64,
    pub direction: ImpactDirection,
}

/// Baseline, the strongest attributions, and everything else folded into one bucket.
///
/// `baseline + sum(drivers) + all_else == predicted` up to the record's own attribution gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionWaterfall {
    pub customer_id: CustomerId,
    pub baseline: f64,
    pub predicted: f64,
    pub drivers: Vec<Driver>,
    pub all_else: f64,
}

impl AttributionWaterfall {
    /// Keeps the `top_n` attributions by absolute value, ties broken by feature name.
    pub fn from_record(record: &CustomerRecord, top_n: usize) -> Result<Self, ValidationError> {
        let mut ranked: Vec<(&String, f64)> = Vec::with_capacity(record.attributions.len());
        for (feature, contribution) in &record.attributions {
            if !contribution.is_finite() {
                return Err(ValidationError::NonFiniteValue {
                    customer: record.id.clone(),
                    field: format!("attribution for {feature}"),
                    value: *contribution,
                });
            }
            ranked.push((feature, *contribution));
        }
        ranked.sort_by(|a, b| {
            b.1.abs()
                .total_cmp(&a.1.abs())
                .then_with(|| a.0.cmp(b.0))
        });

        let drivers: Vec<Driver> = ranked
            .iter()
            .take(top_n)
            .map(|(feature, contribution)| Driver {
                feature: (*feature).clone(),
                label: display_name(feature),
                value: record.feature(feature),
                contribution: *contribution,
                direction: ImpactDirection::of(*contribution),
            })
            .collect();
        let all_else = ranked.iter().skip(top_n).map(|(_, contribution)| contribution).sum();

        Ok(Self {
            customer_id: record.id.clone(),
            baseline: record.baseline,
            predicted: record.predicted,
            drivers,
            all_else,
        })
    }

    pub fn explained_total(&self) -> f64 {
        self.baseline + self.drivers.iter().map(|driver| driver.contribution).sum::<f64>() + self.all_else
    }
}
