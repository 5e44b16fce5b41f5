use crate::workflows::accounts::domain::CustomerId;

/// Precondition failures raised by scoring, allocation and summarization.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("customer {customer} is missing required feature '{feature}'")]
    MissingFeature { customer: CustomerId, feature: String },
    #[error("customer {customer} is missing required attribution '{feature}'")]
    MissingAttribution { customer: CustomerId, feature: String },
    #[error("customer {customer} has a non-finite {field}: {value}")]
    NonFiniteValue {
        customer: CustomerId,
        field: String,
        value: f64,
    },
    #[error("weight for signal '{signal}' must be finite and non-negative, got {weight}")]
    InvalidWeight { signal: String, weight: f64 },
    #[error("global budget must be non-negative, got {0}")]
    NegativeBudget(i64),
    #[error("per-customer cap must be positive, got {0}")]
    NonPositiveCap(i64),
    #[error("priority threshold must be finite, got {0}")]
    NonFiniteThreshold(f64),
    #[error("score band width must be finite and positive, got {0}")]
    InvalidBandWidth(f64),
    #[error("customer {0} appears more than once")]
    DuplicateCustomer(CustomerId),
    #[error("customer {customer} has a negative allocation of {count}")]
    NegativeAllocation { customer: CustomerId, count: i64 },
    #[error("customer {customer} holds {count} actions, above the cap of {cap}")]
    AllocationExceedsCap {
        customer: CustomerId,
        count: u64,
        cap: u64,
    },
    #[error("customer {0} is not part of the action plan")]
    UnknownCustomer(CustomerId),
    #[error("customer {customer} has no '{segment}' segment for stratification")]
    MissingSegment { customer: CustomerId, segment: String },
}
