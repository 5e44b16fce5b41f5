//! Account data: feature schema, synthetic generation, CSV datasets, and the revenue model.

pub mod dataset;
pub mod domain;
pub mod model;
pub mod synthetic;

pub use dataset::{AccountDataset, DatasetError};
pub use domain::{
    BudgetQuarter, CustomerId, CustomerProfile, CustomerRecord, FeatureCategory, Promotion,
    PromotionalSensitivities, FEATURE_SCHEMA,
};
pub use model::{ExpansionModel, Explanation, ModelConfig, ModelError, ModelFit};
pub use synthetic::{GeneratorConfig, SyntheticAccounts};
