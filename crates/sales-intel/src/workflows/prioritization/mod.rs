//! Priority scoring, greedy capacity allocation, and allocation reporting.

pub mod allocator;
mod planner;
pub mod router;
pub mod scoring;
pub mod summary;
mod validation;

pub use allocator::{
    Allocation, AllocationOutcome, AllocationPolicy, CapacityAllocator, DemandPolicy,
    RankedCustomer,
};
pub use planner::{ActionPlan, ActionPlanner, PipelineSummary, PlanRow, PlannerConfig, ScoreScale};
pub use router::planning_router;
pub use scoring::{
    min_max_rescale, PriorityScore, PriorityScorer, ScoreTerm, ScoringWeights, SignalSource,
    WeightedSignal,
};
pub use summary::{ActionHistogram, AllocationSummary, HistogramBucket, SummaryOptions};
pub use validation::ValidationError;
