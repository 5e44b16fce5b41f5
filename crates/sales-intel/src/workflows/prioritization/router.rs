use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::allocator::DemandPolicy;
use super::planner::{ActionPlanner, PlannerConfig, ScoreScale};
use super::scoring::ScoringWeights;
use super::summary::{AllocationSummary, SummaryOptions};
use super::validation::ValidationError;
use crate::workflows::accounts::domain::{CustomerId, CustomerRecord};
use crate::workflows::briefing::{AttributionWaterfall, DEFAULT_DRIVER_COUNT};

/// Per-request overrides applied on top of the service defaults.
#[derive(Debug, Default, Deserialize)]
pub struct AllocationRequest {
    pub records: Vec<CustomerRecord>,
    #[serde(default)]
    pub budget: Option<i64>,
    #[serde(default)]
    pub per_customer_cap: Option<i64>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub demand: Option<DemandPolicy>,
    #[serde(default)]
    pub scale: Option<ScoreScale>,
    #[serde(default)]
    pub weights: Option<ScoringWeights>,
    #[serde(default)]
    pub segment: Option<String>,
    #[serde(default)]
    pub include_zero_bucket: Option<bool>,
}

impl AllocationRequest {
    pub fn planner_config(&self, defaults: &PlannerConfig) -> PlannerConfig {
        let mut config = defaults.clone();
        if let Some(budget) = self.budget {
            config.policy.budget = budget;
        }
        if let Some(cap) = self.per_customer_cap {
            config.policy.per_customer_cap = cap;
        }
        if let Some(threshold) = self.threshold {
            config.policy.threshold = threshold;
        }
        if let Some(demand) = self.demand {
            config.policy.demand = demand;
        }
        if let Some(scale) = self.scale {
            config.scale = scale;
        }
        if let Some(weights) = &self.weights {
            config.weights = weights.clone();
        }
        if self.segment.is_some() {
            config.segment = self.segment.clone();
        }
        if let Some(include_zero_bucket) = self.include_zero_bucket {
            config.summary.include_zero_bucket = include_zero_bucket;
        }
        config
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub allocation: BTreeMap<CustomerId, i64>,
    #[serde(default)]
    pub per_customer_cap: Option<i64>,
    #[serde(default)]
    pub include_zero_bucket: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DriversRequest {
    pub record: CustomerRecord,
    #[serde(default)]
    pub top_n: Option<usize>,
}

/// Router exposing allocation, summary and driver endpoints over the given defaults.
pub fn planning_router(defaults: Arc<PlannerConfig>) -> Router {
    Router::new()
        .route("/api/v1/allocations", post(allocate_handler))
        .route("/api/v1/allocations/summary", post(summary_handler))
        .route("/api/v1/drivers", post(drivers_handler))
        .with_state(defaults)
}

pub(crate) async fn allocate_handler(
    State(defaults): State<Arc<PlannerConfig>>,
    Json(request): Json<AllocationRequest>,
) -> Response {
    let config = request.planner_config(&defaults);
    let result = ActionPlanner::new(config).and_then(|planner| planner.plan(&request.records));
    match result {
        Ok(plan) => (StatusCode::OK, Json(plan)).into_response(),
        Err(error) => validation_response(error),
    }
}

pub(crate) async fn summary_handler(
    State(defaults): State<Arc<PlannerConfig>>,
    Json(request): Json<SummaryRequest>,
) -> Response {
    let cap = request
        .per_customer_cap
        .unwrap_or(defaults.policy.per_customer_cap);
    let options = SummaryOptions {
        include_zero_bucket: request
            .include_zero_bucket
            .unwrap_or(defaults.summary.include_zero_bucket),
    };
    match AllocationSummary::from_counts(request.allocation, cap, options) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => validation_response(error),
    }
}

pub(crate) async fn drivers_handler(Json(request): Json<DriversRequest>) -> Response {
    let top_n = request.top_n.unwrap_or(DEFAULT_DRIVER_COUNT);
    match AttributionWaterfall::from_record(&request.record, top_n) {
        Ok(waterfall) => (StatusCode::OK, Json(waterfall)).into_response(),
        Err(error) => validation_response(error),
    }
}

fn validation_response(error: ValidationError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}
