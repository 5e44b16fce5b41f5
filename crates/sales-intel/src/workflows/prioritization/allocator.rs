use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::scoring::PriorityScore;
use super::validation::ValidationError;
use crate::workflows::accounts::domain::CustomerId;

/// How many actions a qualifying customer asks for before the cap applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DemandPolicy {
    /// Every qualifying customer asks for the full per-customer cap.
    #[default]
    FillToCap,
    /// Demand is `ceil(score / band_width)`, so stronger scores ask for more actions.
    ScoreBands { band_width: f64 },
}

impl DemandPolicy {
    fn demand(self, score: f64, cap: u64) -> u64 {
        match self {
            Self::FillToCap => cap,
            Self::ScoreBands { band_width } => {
                let bands = (score / band_width).ceil();
                if bands <= 0.0 {
                    0
                } else {
                    (bands as u64).min(cap)
                }
            }
        }
    }
}

/// Capacity constraints for one allocation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPolicy {
    /// Total actions available to the run.
    pub budget: i64,
    pub per_customer_cap: i64,
    /// Only scores strictly above this value receive actions.
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub demand: DemandPolicy,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            budget: 250,
            per_customer_cap: 5,
            threshold: 0.0,
            demand: DemandPolicy::FillToCap,
        }
    }
}

impl AllocationPolicy {
    /// Returns the validated `(budget, cap)` pair.
    pub fn validate(&self) -> Result<(u64, u64), ValidationError> {
        if self.budget < 0 {
            return Err(ValidationError::NegativeBudget(self.budget));
        }
        if self.per_customer_cap <= 0 {
            return Err(ValidationError::NonPositiveCap(self.per_customer_cap));
        }
        if !self.threshold.is_finite() {
            return Err(ValidationError::NonFiniteThreshold(self.threshold));
        }
        if let DemandPolicy::ScoreBands { band_width } = self.demand {
            if !band_width.is_finite() || band_width <= 0.0 {
                return Err(ValidationError::InvalidBandWidth(band_width));
            }
        }
        Ok((self.budget as u64, self.per_customer_cap as u64))
    }
}

/// Assigned action counts keyed by customer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Allocation {
    counts: BTreeMap<CustomerId, u64>,
}

impl Allocation {
    /// Builds an allocation from externally supplied counts, rejecting negative values.
    pub fn try_from_counts(counts: BTreeMap<CustomerId, i64>) -> Result<Self, ValidationError> {
        let mut validated = BTreeMap::new();
        for (customer, count) in counts {
            if count < 0 {
                return Err(ValidationError::NegativeAllocation { customer, count });
            }
            validated.insert(customer, count as u64);
        }
        Ok(Self { counts: validated })
    }

    pub fn get(&self, customer: &CustomerId) -> u64 {
        self.counts.get(customer).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CustomerId, u64)> + '_ {
        self.counts.iter().map(|(customer, count)| (customer, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn customers_with_actions(&self) -> usize {
        self.counts.values().filter(|count| **count > 0).count()
    }

    pub fn as_map(&self) -> &BTreeMap<CustomerId, u64> {
        &self.counts
    }
}

/// Position of a customer in the greedy walk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCustomer {
    pub rank: usize,
    pub customer_id: CustomerId,
    pub score: f64,
    pub allocated: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationOutcome {
    pub allocation: Allocation,
    pub ranking: Vec<RankedCustomer>,
    pub customers_considered: usize,
    pub budget: u64,
    pub per_customer_cap: u64,
    pub consumed: u64,
}

impl AllocationOutcome {
    pub fn remaining(&self) -> u64 {
        self.budget - self.consumed
    }
}

/// Single-pass greedy allocator.
///
/// Customers are visited by score descending, ties broken by identifier ascending. Each
/// customer scoring above the threshold takes `min(demand, cap, remaining)` actions. This is a
/// heuristic, not a revenue-optimal assignment: a customer early in the order can absorb budget
/// that a different split would have spread across several later customers.
#[derive(Debug, Clone)]
pub struct CapacityAllocator {
    policy: AllocationPolicy,
}

impl CapacityAllocator {
    pub fn new(policy: AllocationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    pub fn allocate_scored(&self, scores: &[PriorityScore]) -> Result<AllocationOutcome, ValidationError> {
        let pairs: Vec<(CustomerId, f64)> = scores
            .iter()
            .map(|entry| (entry.customer_id.clone(), entry.score))
            .collect();
        self.allocate(&pairs)
    }

    pub fn allocate(&self, scores: &[(CustomerId, f64)]) -> Result<AllocationOutcome, ValidationError> {
        let (budget, cap) = self.policy.validate()?;

        let mut seen = HashSet::with_capacity(scores.len());
        for (customer, score) in scores {
            if !seen.insert(customer) {
                return Err(ValidationError::DuplicateCustomer(customer.clone()));
            }
            if !score.is_finite() {
                return Err(ValidationError::NonFiniteValue {
                    customer: customer.clone(),
                    field: "priority score".to_string(),
                    value: *score,
                });
            }
        }

        let mut order: Vec<&(CustomerId, f64)> = scores.iter().collect();
        order.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut remaining = budget;
        let mut counts = BTreeMap::new();
        let mut ranking = Vec::with_capacity(order.len());

        for (rank, (customer, score)) in order.into_iter().enumerate() {
            let allocated = if *score > self.policy.threshold && remaining > 0 {
                self.policy.demand.demand(*score, cap).min(remaining)
            } else {
                0
            };
            remaining -= allocated;

            counts.insert(customer.clone(), allocated);
            ranking.push(RankedCustomer {
                rank: rank + 1,
                customer_id: customer.clone(),
                score: *score,
                allocated,
            });
        }

        let consumed = budget - remaining;
        debug!(
            customers = scores.len(),
            budget,
            cap,
            consumed,
            "allocated sales actions"
        );

        Ok(AllocationOutcome {
            allocation: Allocation { counts },
            ranking,
            customers_considered: scores.len(),
            budget,
            per_customer_cap: cap,
            consumed,
        })
    }
}
