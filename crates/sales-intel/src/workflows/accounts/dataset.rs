use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::domain::{BudgetQuarter, CustomerId, CustomerProfile};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to access account dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid account CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("customer {customer} has unknown budget cycle quarter '{value}'")]
    UnknownQuarter { customer: String, value: String },
    #[error("customer {customer} has a non-finite value for {feature}")]
    NonFinite { customer: String, feature: &'static str },
    #[error("customer {0} appears more than once")]
    DuplicateCustomer(String),
    #[error("customer {customer} has no value for schema feature {feature}")]
    MissingFeature { customer: String, feature: &'static str },
    #[error("invalid generator parameter {parameter}: {reason}")]
    InvalidDistribution { parameter: &'static str, reason: String },
}

/// CSV import and export of account profiles.
pub struct AccountDataset;

impl AccountDataset {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<CustomerProfile>, DatasetError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<CustomerProfile>, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut profiles = Vec::new();
        let mut seen = HashSet::new();

        for row in csv_reader.deserialize::<AccountRow>() {
            let profile = row?.into_profile()?;
            if !seen.insert(profile.id.clone()) {
                return Err(DatasetError::DuplicateCustomer(profile.id.0));
            }
            profiles.push(profile);
        }

        Ok(profiles)
    }

    pub fn write_to_path<P: AsRef<Path>>(
        path: P,
        profiles: &[CustomerProfile],
    ) -> Result<(), DatasetError> {
        let file = File::create(path)?;
        Self::write_to(file, profiles)
    }

    pub fn write_to<W: Write>(writer: W, profiles: &[CustomerProfile]) -> Result<(), DatasetError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for profile in profiles {
            csv_writer.serialize(AccountRow::from_profile(profile)?)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

macro_rules! account_row {
    ($($feature:ident),* $(,)?) => {
        #[derive(Debug, Serialize, Deserialize)]
        struct AccountRow {
            customer_id: String,
            company_name: String,
            budget_cycle_quarter: String,
            $($feature: f64,)*
            #[serde(default)]
            expansion_revenue_potential: Option<f64>,
        }

        impl AccountRow {
            fn into_profile(self) -> Result<CustomerProfile, DatasetError> {
                let budget_quarter = BudgetQuarter::parse(&self.budget_cycle_quarter).ok_or_else(|| {
                    DatasetError::UnknownQuarter {
                        customer: self.customer_id.clone(),
                        value: self.budget_cycle_quarter.clone(),
                    }
                })?;

                let mut features = BTreeMap::new();
                $(
                    if !self.$feature.is_finite() {
                        return Err(DatasetError::NonFinite {
                            customer: self.customer_id,
                            feature: stringify!($feature),
                        });
                    }
                    features.insert(stringify!($feature).to_string(), self.$feature);
                )*

                Ok(CustomerProfile {
                    id: CustomerId(self.customer_id),
                    company_name: self.company_name,
                    budget_quarter,
                    features,
                    expansion_revenue_potential: self.expansion_revenue_potential,
                })
            }

            fn from_profile(profile: &CustomerProfile) -> Result<Self, DatasetError> {
                Ok(Self {
                    customer_id: profile.id.0.clone(),
                    company_name: profile.company_name.clone(),
                    budget_cycle_quarter: profile.budget_quarter.label().to_string(),
                    $($feature: profile.feature(stringify!($feature)).ok_or_else(|| {
                        DatasetError::MissingFeature {
                            customer: profile.id.0.clone(),
                            feature: stringify!($feature),
                        }
                    })?,)*
                    expansion_revenue_potential: profile.expansion_revenue_potential,
                })
            }
        }
    };
}

account_row!(
    employee_count,
    annual_revenue_m,
    tech_stack_size,
    cloud_maturity_score,
    website_visits_30d,
    whitepaper_downloads,
    demo_requests,
    email_open_rate,
    webinar_attendance,
    competitor_product_count,
    integration_needs,
    security_compliance_req,
    api_usage_intent,
    relationship_age_months,
    previous_churn_risk,
    support_tickets_90d,
    csm_relationship_score,
    industry_growth_rate,
    competitive_pressure_idx,
    budget_cycle_q1,
    budget_cycle_q2,
    budget_cycle_q3,
    budget_cycle_q4,
    discount_sensitivity,
    sla_sensitivity,
    training_sensitivity,
    implementation_support_sensitivity,
);
