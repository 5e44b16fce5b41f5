use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    CustomerProfile, CustomerRecord, FEATURE_SCHEMA, SEGMENT_BUDGET_QUARTER,
    SEGMENT_RECOMMENDED_PROMOTION,
};

/// Training knobs for [`ExpansionModel::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Ridge penalty applied to standardized coefficients.
    pub ridge_lambda: f64,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ridge_lambda: 1e-3,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("need at least {required} customers with an observed target, found {found}")]
    InsufficientData { required: usize, found: usize },
    #[error("customer {customer} is missing feature {feature}")]
    MissingFeature { customer: String, feature: String },
    #[error("normal equations are singular; features are degenerate")]
    Singular,
}

/// Goodness of fit on the train and held-out rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelFit {
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_r2: f64,
    pub test_r2: Option<f64>,
}

/// Per-customer decomposition of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub baseline: f64,
    pub prediction: f64,
    pub attributions: BTreeMap<String, f64>,
}

/// Linear model of expansion revenue potential.
///
/// Attributions are `weight * (value - training mean)`, the exact Shapley values of a linear
/// model under feature independence, so `baseline + sum(attributions)` equals the prediction
/// with `baseline` the mean training target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionModel {
    features: Vec<String>,
    means: Vec<f64>,
    weights: Vec<f64>,
    baseline: f64,
    fit: ModelFit,
}

const MIN_TRAINING_ROWS: usize = 2;

impl ExpansionModel {
    pub fn fit(profiles: &[CustomerProfile], config: &ModelConfig) -> Result<Self, ModelError> {
        let features: Vec<String> = FEATURE_SCHEMA
            .iter()
            .map(|spec| spec.name.to_string())
            .collect();

        let mut rows = Vec::new();
        for profile in profiles {
            let Some(target) = profile.expansion_revenue_potential else {
                continue;
            };
            rows.push((feature_vector(profile, &features)?, target));
        }

        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(config.seed));
        let test_rows = ((rows.len() as f64) * config.test_fraction.clamp(0.0, 0.9)).floor() as usize;
        let (test_idx, train_idx) = order.split_at(test_rows);

        if train_idx.len() < MIN_TRAINING_ROWS {
            return Err(ModelError::InsufficientData {
                required: MIN_TRAINING_ROWS,
                found: rows.len(),
            });
        }

        let train: Vec<&(Vec<f64>, f64)> = train_idx.iter().map(|&i| &rows[i]).collect();
        let (means, weights, baseline) = solve_ridge(&train, features.len(), config.ridge_lambda)?;

        let mut model = Self {
            features,
            means,
            weights,
            baseline,
            fit: ModelFit {
                train_rows: train_idx.len(),
                test_rows: test_idx.len(),
                train_r2: 0.0,
                test_r2: None,
            },
        };

        model.fit.train_r2 = model.r_squared(train.iter().copied());
        if !test_idx.is_empty() {
            model.fit.test_r2 = Some(model.r_squared(test_idx.iter().map(|&i| &rows[i])));
        }

        info!(
            train_rows = model.fit.train_rows,
            test_rows = model.fit.test_rows,
            train_r2 = model.fit.train_r2,
            test_r2 = ?model.fit.test_r2,
            baseline = model.baseline,
            "fitted expansion revenue model"
        );

        Ok(model)
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn fit_quality(&self) -> ModelFit {
        self.fit
    }

    pub fn feature_names(&self) -> &[String] {
        &self.features
    }

    pub fn predict(&self, profile: &CustomerProfile) -> Result<f64, ModelError> {
        Ok(self.explain(profile)?.prediction)
    }

    pub fn explain(&self, profile: &CustomerProfile) -> Result<Explanation, ModelError> {
        let values = feature_vector(profile, &self.features)?;
        let mut attributions = BTreeMap::new();
        let mut prediction = self.baseline;

        for (index, value) in values.iter().enumerate() {
            let contribution = self.weights[index] * (value - self.means[index]);
            prediction += contribution;
            attributions.insert(self.features[index].clone(), contribution);
        }

        Ok(Explanation {
            baseline: self.baseline,
            prediction,
            attributions,
        })
    }

    /// Attaches predictions, attributions and segments to every profile.
    pub fn explain_all(&self, profiles: &[CustomerProfile]) -> Result<Vec<CustomerRecord>, ModelError> {
        profiles
            .iter()
            .map(|profile| {
                let explanation = self.explain(profile)?;
                let mut segments = BTreeMap::new();
                segments.insert(
                    SEGMENT_BUDGET_QUARTER.to_string(),
                    profile.budget_quarter.label().to_string(),
                );
                if let Some(promotion) = profile.recommended_promotion() {
                    segments.insert(
                        SEGMENT_RECOMMENDED_PROMOTION.to_string(),
                        promotion.label().to_string(),
                    );
                }

                Ok(CustomerRecord {
                    id: profile.id.clone(),
                    company_name: profile.company_name.clone(),
                    features: profile.features.clone(),
                    segments,
                    predicted: explanation.prediction,
                    baseline: explanation.baseline,
                    attributions: explanation.attributions,
                })
            })
            .collect()
    }

    fn raw_predict(&self, values: &[f64]) -> f64 {
        values
            .iter()
            .zip(&self.means)
            .zip(&self.weights)
            .fold(self.baseline, |acc, ((value, mean), weight)| {
                acc + weight * (value - mean)
            })
    }

    fn r_squared<'a, I>(&self, rows: I) -> f64
    where
        I: Iterator<Item = &'a (Vec<f64>, f64)> + Clone,
    {
        let count = rows.clone().count();
        if count == 0 {
            return 0.0;
        }
        let mean = rows.clone().map(|(_, target)| target).sum::<f64>() / count as f64;
        let total: f64 = rows.clone().map(|(_, target)| (target - mean).powi(2)).sum();
        let residual: f64 = rows
            .map(|(values, target)| (target - self.raw_predict(values)).powi(2))
            .sum();

        if total <= f64::EPSILON {
            0.0
        } else {
            1.0 - residual / total
        }
    }
}

fn feature_vector(profile: &CustomerProfile, features: &[String]) -> Result<Vec<f64>, ModelError> {
    features
        .iter()
        .map(|name| {
            profile
                .feature(name)
                .ok_or_else(|| ModelError::MissingFeature {
                    customer: profile.id.0.clone(),
                    feature: name.clone(),
                })
        })
        .collect()
}

/// Solves ridge regression on standardized columns and maps the coefficients back to raw units.
fn solve_ridge(
    rows: &[&(Vec<f64>, f64)],
    width: usize,
    lambda: f64,
) -> Result<(Vec<f64>, Vec<f64>, f64), ModelError> {
    let n = rows.len() as f64;
    let design = DMatrix::from_fn(rows.len(), width, |row, column| rows[row].0[column]);
    let targets = DVector::from_iterator(rows.len(), rows.iter().map(|row| row.1));

    let means: Vec<f64> = design.column_iter().map(|column| column.mean()).collect();
    let scales: Vec<f64> = design
        .column_iter()
        .map(|column| column.variance().sqrt())
        .collect();
    let target_mean = targets.mean();

    let standardized = DMatrix::from_fn(rows.len(), width, |row, column| {
        standardize(design[(row, column)], means[column], scales[column])
    });
    let centered = targets.add_scalar(-target_mean);

    // Z'Z + lambda*n*I; constant columns get a unit diagonal so their coefficient is zero
    let mut gram = standardized.tr_mul(&standardized);
    for (index, scale) in scales.iter().enumerate() {
        gram[(index, index)] += lambda * n;
        if *scale == 0.0 {
            gram[(index, index)] += 1.0;
        }
    }
    let rhs = standardized.tr_mul(&centered);

    let coefficients = solve_normal_equations(gram, rhs)?;
    let weights = coefficients
        .iter()
        .zip(&scales)
        .map(|(beta, scale)| if *scale > 0.0 { beta / scale } else { 0.0 })
        .collect();

    Ok((means, weights, target_mean))
}

fn standardize(value: f64, mean: f64, scale: f64) -> f64 {
    if scale > 0.0 {
        (value - mean) / scale
    } else {
        0.0
    }
}

fn solve_normal_equations(gram: DMatrix<f64>, rhs: DVector<f64>) -> Result<DVector<f64>, ModelError> {
    let solution = gram.cholesky().ok_or(ModelError::Singular)?.solve(&rhs);
    if solution.iter().all(|value| value.is_finite()) {
        Ok(solution)
    } else {
        Err(ModelError::Singular)
    }
}
