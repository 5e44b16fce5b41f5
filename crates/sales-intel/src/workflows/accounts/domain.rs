use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier for a customer account, e.g. `CUST_00042`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CustomerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Grouping used when presenting features to account teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    Firmographic,
    Engagement,
    ProductFit,
    Relationship,
    Market,
    PromotionalSensitivity,
}

impl FeatureCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Firmographic => "Firmographic",
            Self::Engagement => "Engagement",
            Self::ProductFit => "Product Fit",
            Self::Relationship => "Relationship",
            Self::Market => "Market",
            Self::PromotionalSensitivity => "Promotional Sensitivity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub category: FeatureCategory,
}

const fn feature(name: &'static str, category: FeatureCategory) -> FeatureSpec {
    FeatureSpec { name, category }
}

/// Numeric model inputs in column order.
pub const FEATURE_SCHEMA: [FeatureSpec; 27] = [
    feature("employee_count", FeatureCategory::Firmographic),
    feature("annual_revenue_m", FeatureCategory::Firmographic),
    feature("tech_stack_size", FeatureCategory::Firmographic),
    feature("cloud_maturity_score", FeatureCategory::Firmographic),
    feature("website_visits_30d", FeatureCategory::Engagement),
    feature("whitepaper_downloads", FeatureCategory::Engagement),
    feature("demo_requests", FeatureCategory::Engagement),
    feature("email_open_rate", FeatureCategory::Engagement),
    feature("webinar_attendance", FeatureCategory::Engagement),
    feature("competitor_product_count", FeatureCategory::ProductFit),
    feature("integration_needs", FeatureCategory::ProductFit),
    feature("security_compliance_req", FeatureCategory::ProductFit),
    feature("api_usage_intent", FeatureCategory::ProductFit),
    feature("relationship_age_months", FeatureCategory::Relationship),
    feature("previous_churn_risk", FeatureCategory::Relationship),
    feature("support_tickets_90d", FeatureCategory::Relationship),
    feature("csm_relationship_score", FeatureCategory::Relationship),
    feature("industry_growth_rate", FeatureCategory::Market),
    feature("competitive_pressure_idx", FeatureCategory::Market),
    feature("budget_cycle_q1", FeatureCategory::Market),
    feature("budget_cycle_q2", FeatureCategory::Market),
    feature("budget_cycle_q3", FeatureCategory::Market),
    feature("budget_cycle_q4", FeatureCategory::Market),
    feature("discount_sensitivity", FeatureCategory::PromotionalSensitivity),
    feature("sla_sensitivity", FeatureCategory::PromotionalSensitivity),
    feature("training_sensitivity", FeatureCategory::PromotionalSensitivity),
    feature(
        "implementation_support_sensitivity",
        FeatureCategory::PromotionalSensitivity,
    ),
];

pub fn feature_category(name: &str) -> Option<FeatureCategory> {
    FEATURE_SCHEMA
        .iter()
        .find(|spec| spec.name == name)
        .map(|spec| spec.category)
}

/// Turns `cloud_maturity_score` into `Cloud Maturity Score`.
pub fn display_name(feature: &str) -> String {
    feature
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fiscal quarter in which the customer plans budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BudgetQuarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl BudgetQuarter {
    pub const fn ordered() -> [Self; 4] {
        [Self::Q1, Self::Q2, Self::Q3, Self::Q4]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }

    pub const fn indicator_feature(self) -> &'static str {
        match self {
            Self::Q1 => "budget_cycle_q1",
            Self::Q2 => "budget_cycle_q2",
            Self::Q3 => "budget_cycle_q3",
            Self::Q4 => "budget_cycle_q4",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "Q1" => Some(Self::Q1),
            "Q2" => Some(Self::Q2),
            "Q3" => Some(Self::Q3),
            "Q4" => Some(Self::Q4),
            _ => None,
        }
    }
}

/// Commercial incentive offered alongside an allocated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Promotion {
    PriceDiscount,
    ExtendedSla,
    TrainingCredits,
    ImplementationSupport,
}

impl Promotion {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::PriceDiscount,
            Self::ExtendedSla,
            Self::TrainingCredits,
            Self::ImplementationSupport,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PriceDiscount => "Price Discount (15-20%)",
            Self::ExtendedSla => "Extended SLA (99.99% uptime)",
            Self::TrainingCredits => "Training Credits ($10K)",
            Self::ImplementationSupport => "Implementation Support (40 hours)",
        }
    }

    pub const fn short_label(self) -> &'static str {
        match self {
            Self::PriceDiscount => "Price Discount",
            Self::ExtendedSla => "Extended SLA",
            Self::TrainingCredits => "Training Credits",
            Self::ImplementationSupport => "Implementation Support",
        }
    }

    pub const fn sensitivity_feature(self) -> &'static str {
        match self {
            Self::PriceDiscount => "discount_sensitivity",
            Self::ExtendedSla => "sla_sensitivity",
            Self::TrainingCredits => "training_sensitivity",
            Self::ImplementationSupport => "implementation_support_sensitivity",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|promotion| promotion.label() == value || promotion.short_label() == value)
    }
}

/// Responsiveness to each promotion type, each in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromotionalSensitivities {
    pub discount: f64,
    pub sla: f64,
    pub training: f64,
    pub implementation_support: f64,
}

impl PromotionalSensitivities {
    pub fn from_features(features: &BTreeMap<String, f64>) -> Option<Self> {
        let get = |promotion: Promotion| features.get(promotion.sensitivity_feature()).copied();
        Some(Self {
            discount: get(Promotion::PriceDiscount)?,
            sla: get(Promotion::ExtendedSla)?,
            training: get(Promotion::TrainingCredits)?,
            implementation_support: get(Promotion::ImplementationSupport)?,
        })
    }

    pub fn get(&self, promotion: Promotion) -> f64 {
        match promotion {
            Promotion::PriceDiscount => self.discount,
            Promotion::ExtendedSla => self.sla,
            Promotion::TrainingCredits => self.training,
            Promotion::ImplementationSupport => self.implementation_support,
        }
    }

    /// Highest sensitivity wins; earlier promotions win ties.
    pub fn recommend(&self) -> Promotion {
        let mut best = Promotion::PriceDiscount;
        for promotion in Promotion::ordered().into_iter().skip(1) {
            if self.get(promotion) > self.get(best) {
                best = promotion;
            }
        }
        best
    }
}

/// Raw account snapshot before any model output is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: CustomerId,
    pub company_name: String,
    pub budget_quarter: BudgetQuarter,
    pub features: BTreeMap<String, f64>,
    /// Observed target, present on generated or historical data.
    pub expansion_revenue_potential: Option<f64>,
}

impl CustomerProfile {
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }

    pub fn sensitivities(&self) -> Option<PromotionalSensitivities> {
        PromotionalSensitivities::from_features(&self.features)
    }

    pub fn recommended_promotion(&self) -> Option<Promotion> {
        self.sensitivities().map(|sensitivities| sensitivities.recommend())
    }
}

/// Segment key holding the budget quarter label.
pub const SEGMENT_BUDGET_QUARTER: &str = "budget_cycle_quarter";
/// Segment key holding the recommended promotion label.
pub const SEGMENT_RECOMMENDED_PROMOTION: &str = "recommended_promotion";

/// Scored account: features plus the model prediction and its per-feature attributions.
///
/// `baseline + sum(attributions)` reconstructs `predicted` within floating-point tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: CustomerId,
    #[serde(default)]
    pub company_name: String,
    pub features: BTreeMap<String, f64>,
    #[serde(default)]
    pub segments: BTreeMap<String, String>,
    pub predicted: f64,
    #[serde(default)]
    pub baseline: f64,
    pub attributions: BTreeMap<String, f64>,
}

impl CustomerRecord {
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }

    pub fn attribution(&self, name: &str) -> Option<f64> {
        self.attributions.get(name).copied()
    }

    pub fn segment(&self, name: &str) -> Option<&str> {
        self.segments.get(name).map(String::as_str)
    }

    pub fn attribution_total(&self) -> f64 {
        self.attributions.values().sum()
    }

    /// Distance between the prediction and `baseline + sum(attributions)`.
    pub fn attribution_gap(&self) -> f64 {
        (self.baseline + self.attribution_total() - self.predicted).abs()
    }

    pub fn sensitivities(&self) -> Option<PromotionalSensitivities> {
        PromotionalSensitivities::from_features(&self.features)
    }

    pub fn recommended_promotion(&self) -> Option<Promotion> {
        self.segment(SEGMENT_RECOMMENDED_PROMOTION)
            .and_then(Promotion::from_label)
            .or_else(|| self.sensitivities().map(|s| s.recommend()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_title_cases_snake_case() {
        assert_eq!(display_name("cloud_maturity_score"), "Cloud Maturity Score");
        assert_eq!(display_name("website_visits_30d"), "Website Visits 30d");
    }

    #[test]
    fn recommend_prefers_highest_sensitivity_and_first_on_ties() {
        let sensitivities = PromotionalSensitivities {
            discount: 0.4,
            sla: 0.7,
            training: 0.7,
            implementation_support: 0.2,
        };
        assert_eq!(sensitivities.recommend(), Promotion::ExtendedSla);

        let flat = PromotionalSensitivities {
            discount: 0.5,
            sla: 0.5,
            training: 0.5,
            implementation_support: 0.5,
        };
        assert_eq!(flat.recommend(), Promotion::PriceDiscount);
    }

    #[test]
    fn promotion_labels_round_trip() {
        for promotion in Promotion::ordered() {
            assert_eq!(Promotion::from_label(promotion.label()), Some(promotion));
            assert_eq!(Promotion::from_label(promotion.short_label()), Some(promotion));
        }
    }

    #[test]
    fn schema_has_unique_feature_names() {
        let mut names: Vec<_> = FEATURE_SCHEMA.iter().map(|spec| spec.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FEATURE_SCHEMA.len());
        assert_eq!(
            feature_category("csm_relationship_score"),
            Some(FeatureCategory::Relationship)
        );
    }
}
