use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::allocator::{AllocationOutcome, AllocationPolicy, CapacityAllocator};
use super::scoring::{min_max_rescale, PriorityScore, PriorityScorer, ScoringWeights};
use super::summary::{AllocationSummary, SummaryOptions};
use super::validation::ValidationError;
use crate::workflows::accounts::domain::{CustomerId, CustomerRecord};

/// Whether scores are allocated as computed or rescaled onto `0..=100` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    #[default]
    Raw,
    MinMax,
}

impl ScoreScale {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Raw => "Raw",
            Self::MinMax => "Min-max (0-100)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlannerConfig {
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub policy: AllocationPolicy,
    #[serde(default)]
    pub scale: ScoreScale,
    #[serde(default)]
    pub summary: SummaryOptions,
    /// Segment used to stratify the summary, e.g. `budget_cycle_quarter`.
    #[serde(default)]
    pub segment: Option<String>,
}

/// Revenue view of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub total_customers: usize,
    pub customers_with_actions: usize,
    pub total_actions: u64,
    pub total_predicted_revenue: f64,
    pub average_predicted_revenue: f64,
    /// Predicted revenue of customers that received at least one action.
    pub targeted_predicted_revenue: f64,
    pub promotion_mix: BTreeMap<String, usize>,
}

/// One customer's line in the plan, in allocation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    pub rank: usize,
    pub customer_id: CustomerId,
    pub company_name: String,
    pub priority_score: f64,
    pub predicted_revenue: f64,
    pub allocated_actions: u64,
    pub recommended_promotion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionPlan {
    pub generated_at: DateTime<Utc>,
    pub weights_version: u32,
    pub scale: ScoreScale,
    pub scores: Vec<PriorityScore>,
    pub outcome: AllocationOutcome,
    pub summary: AllocationSummary,
    pub pipeline: PipelineSummary,
    pub rows: Vec<PlanRow>,
}

impl ActionPlan {
    pub fn row(&self, customer: &CustomerId) -> Option<&PlanRow> {
        self.rows.iter().find(|row| &row.customer_id == customer)
    }

    pub fn score(&self, customer: &CustomerId) -> Option<&PriorityScore> {
        self.scores.iter().find(|score| &score.customer_id == customer)
    }

    /// Writes the ranked allocation table as CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// Scores, allocates and summarizes one batch of customer records.
#[derive(Debug, Clone)]
pub struct ActionPlanner {
    config: PlannerConfig,
    scorer: PriorityScorer,
    allocator: CapacityAllocator,
}

impl ActionPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self, ValidationError> {
        config.policy.validate()?;
        let scorer = PriorityScorer::new(config.weights.clone())?;
        let allocator = CapacityAllocator::new(config.policy.clone());
        Ok(Self {
            config,
            scorer,
            allocator,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn plan(&self, records: &[CustomerRecord]) -> Result<ActionPlan, ValidationError> {
        let mut scores = self.scorer.score_all(records)?;
        if self.config.scale == ScoreScale::MinMax {
            min_max_rescale(&mut scores);
        }

        let outcome = self.allocator.allocate_scored(&scores)?;
        let cap = self.config.policy.per_customer_cap;
        let summary = match &self.config.segment {
            Some(segment) => AllocationSummary::stratified(
                &outcome.allocation,
                cap,
                self.config.summary,
                records,
                segment,
            )?,
            None => AllocationSummary::from_allocation(&outcome.allocation, cap, self.config.summary)?,
        };

        let by_id: HashMap<&CustomerId, &CustomerRecord> =
            records.iter().map(|record| (&record.id, record)).collect();
        let rows: Vec<PlanRow> = outcome
            .ranking
            .iter()
            .filter_map(|ranked| {
                by_id.get(&ranked.customer_id).map(|record| PlanRow {
                    rank: ranked.rank,
                    customer_id: ranked.customer_id.clone(),
                    company_name: record.company_name.clone(),
                    priority_score: ranked.score,
                    predicted_revenue: record.predicted,
                    allocated_actions: ranked.allocated,
                    recommended_promotion: record
                        .recommended_promotion()
                        .map(|promotion| promotion.label().to_string()),
                })
            })
            .collect();

        let pipeline = pipeline_summary(&rows, &summary);

        info!(
            customers = pipeline.total_customers,
            actions = summary.total,
            customers_with_actions = summary.customers_with_actions,
            budget = outcome.budget,
            scale = self.config.scale.label(),
            weights_version = self.config.weights.version,
            "built sales action plan"
        );

        Ok(ActionPlan {
            generated_at: Utc::now(),
            weights_version: self.config.weights.version,
            scale: self.config.scale,
            scores,
            outcome,
            summary,
            pipeline,
            rows,
        })
    }
}

fn pipeline_summary(rows: &[PlanRow], summary: &AllocationSummary) -> PipelineSummary {
    let total_predicted_revenue: f64 = rows.iter().map(|row| row.predicted_revenue).sum();
    let targeted_predicted_revenue = rows
        .iter()
        .filter(|row| row.allocated_actions > 0)
        .map(|row| row.predicted_revenue)
        .sum();
    let average_predicted_revenue = if rows.is_empty() {
        0.0
    } else {
        total_predicted_revenue / rows.len() as f64
    };

    let mut promotion_mix = BTreeMap::new();
    for promotion in rows.iter().filter_map(|row| row.recommended_promotion.as_ref()) {
        *promotion_mix.entry(promotion.clone()).or_insert(0) += 1;
    }

    PipelineSummary {
        total_customers: rows.len(),
        customers_with_actions: summary.customers_with_actions,
        total_actions: summary.total,
        total_predicted_revenue,
        average_predicted_revenue,
        targeted_predicted_revenue,
        promotion_mix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::accounts::domain::SEGMENT_BUDGET_QUARTER;

    fn record(id: &str, predicted: f64, demos: f64, quarter: &str) -> CustomerRecord {
        let features: BTreeMap<String, f64> = [
            ("demo_requests", demos),
            ("cloud_maturity_score", 0.0),
            ("csm_relationship_score", 0.0),
            ("discount_sensitivity", 0.9),
            ("sla_sensitivity", 0.1),
            ("training_sensitivity", 0.2),
            ("implementation_support_sensitivity", 0.3),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

        CustomerRecord {
            id: id.into(),
            company_name: format!("{id} Holdings"),
            features,
            segments: [(SEGMENT_BUDGET_QUARTER.to_string(), quarter.to_string())]
                .into_iter()
                .collect(),
            predicted,
            baseline: predicted,
            attributions: BTreeMap::new(),
        }
    }

    fn planner(config: PlannerConfig) -> ActionPlanner {
        ActionPlanner::new(config).expect("valid config")
    }

    #[test]
    fn plan_ranks_allocates_and_summarizes() {
        let records = vec![
            record("C3", 10.0, 0.0, "Q2"),
            record("C1", 40.0, 2.0, "Q1"),
            record("C2", 30.0, 0.0, "Q1"),
        ];
        let plan = planner(PlannerConfig {
            policy: AllocationPolicy {
                budget: 6,
                ..AllocationPolicy::default()
            },
            segment: Some(SEGMENT_BUDGET_QUARTER.to_string()),
            ..PlannerConfig::default()
        })
        .plan(&records)
        .expect("plans");

        let order: Vec<&str> = plan.rows.iter().map(|row| row.customer_id.as_str()).collect();
        assert_eq!(order, ["C1", "C2", "C3"]);
        assert_eq!(plan.rows[0].priority_score, 50.0);
        assert_eq!(plan.outcome.allocation.get(&"C1".into()), 5);
        assert_eq!(plan.outcome.allocation.get(&"C2".into()), 1);
        assert_eq!(plan.summary.total, 6);

        let strata = plan.summary.strata.as_ref().expect("stratified");
        assert_eq!(strata.len(), 2);

        assert_eq!(plan.pipeline.total_customers, 3);
        assert!((plan.pipeline.total_predicted_revenue - 80.0).abs() < 1e-9);
        assert!((plan.pipeline.targeted_predicted_revenue - 70.0).abs() < 1e-9);
        assert_eq!(
            plan.pipeline.promotion_mix.get("Price Discount (15-20%)"),
            Some(&3)
        );
    }

    #[test]
    fn min_max_scale_rescales_before_allocation() {
        let records = vec![record("A", 10.0, 0.0, "Q1"), record("B", 20.0, 0.0, "Q1")];
        let plan = planner(PlannerConfig {
            scale: ScoreScale::MinMax,
            ..PlannerConfig::default()
        })
        .plan(&records)
        .expect("plans");

        assert_eq!(plan.score(&"B".into()).map(|s| s.score), Some(100.0));
        // The minimum maps to zero, which does not clear a zero threshold.
        assert_eq!(plan.outcome.allocation.get(&"A".into()), 0);
        assert_eq!(plan.outcome.allocation.get(&"B".into()), 5);
    }

    #[test]
    fn invalid_policy_fails_before_scoring() {
        let err = ActionPlanner::new(PlannerConfig {
            policy: AllocationPolicy {
                budget: -1,
                ..AllocationPolicy::default()
            },
            ..PlannerConfig::default()
        })
        .expect_err("negative budget");
        assert_eq!(err, ValidationError::NegativeBudget(-1));
    }

    #[test]
    fn csv_export_lists_rows_in_rank_order() {
        let records = vec![record("A", 10.0, 0.0, "Q1"), record("B", 20.0, 0.0, "Q1")];
        let plan = planner(PlannerConfig::default()).plan(&records).expect("plans");

        let mut buffer = Vec::new();
        plan.write_csv(&mut buffer).expect("writes csv");
        let text = String::from_utf8(buffer).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("rank,customer_id,company_name,priority_score,predicted_revenue,allocated_actions,recommended_promotion")
        );
        assert!(lines.next().is_some_and(|line| line.starts_with("1,B,")));
    }
}
