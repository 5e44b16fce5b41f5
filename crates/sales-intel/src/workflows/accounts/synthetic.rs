use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Beta, Binomial, Distribution, Gamma, LogNormal, Normal, Poisson};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dataset::DatasetError;
use super::domain::{BudgetQuarter, CustomerId, CustomerProfile};

/// Controls synthetic account generation. The seed is the only source of randomness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub customers: usize,
    pub seed: u64,
    pub noise_std_dev: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            customers: 500,
            seed: 42,
            noise_std_dev: 5.0,
        }
    }
}

pub const TARGET_FLOOR: f64 = 5.0;
pub const TARGET_CEILING: f64 = 200.0;

/// Generator for B2B software accounts with a known expansion revenue signal (in $K).
pub struct SyntheticAccounts;

impl SyntheticAccounts {
    pub fn generate(config: &GeneratorConfig) -> Result<Vec<CustomerProfile>, DatasetError> {
        let draws = FeatureDraws::new(config.noise_std_dev)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let profiles: Vec<CustomerProfile> = (0..config.customers)
            .map(|index| draws.profile(index, &mut rng))
            .collect();

        debug!(
            customers = profiles.len(),
            seed = config.seed,
            "generated synthetic accounts"
        );
        Ok(profiles)
    }
}

fn distribution<D, E: fmt::Display>(
    parameter: &'static str,
    built: Result<D, E>,
) -> Result<D, DatasetError> {
    built.map_err(|err| DatasetError::InvalidDistribution {
        parameter,
        reason: err.to_string(),
    })
}

/// Per-feature distributions, built once per run.
struct FeatureDraws {
    employee_count: LogNormal<f64>,
    annual_revenue_m: LogNormal<f64>,
    tech_stack_size: Poisson<f64>,
    website_visits: Poisson<f64>,
    whitepaper_downloads: Poisson<f64>,
    demo_requests: Binomial,
    webinar_attendance: Poisson<f64>,
    competitor_products: Poisson<f64>,
    integration_needs: Poisson<f64>,
    security_compliance: Bernoulli,
    relationship_age: Gamma<f64>,
    support_tickets: Poisson<f64>,
    industry_growth: Normal<f64>,
    symmetric_beta: Beta<f64>,
    high_beta: Beta<f64>,
    low_beta: Beta<f64>,
    churn_risk: Beta<f64>,
    csm_relationship: Beta<f64>,
    implementation_support: Beta<f64>,
    noise: Normal<f64>,
}

impl FeatureDraws {
    fn new(noise_std_dev: f64) -> Result<Self, DatasetError> {
        Ok(Self {
            employee_count: distribution("employee_count", LogNormal::new(6.0, 1.5))?,
            annual_revenue_m: distribution("annual_revenue_m", LogNormal::new(4.0, 1.2))?,
            tech_stack_size: distribution("tech_stack_size", Poisson::new(12.0))?,
            website_visits: distribution("website_visits_30d", Poisson::new(8.0))?,
            whitepaper_downloads: distribution("whitepaper_downloads", Poisson::new(2.0))?,
            demo_requests: distribution("demo_requests", Binomial::new(3, 0.3))?,
            webinar_attendance: distribution("webinar_attendance", Poisson::new(1.5))?,
            competitor_products: distribution("competitor_product_count", Poisson::new(2.0))?,
            integration_needs: distribution("integration_needs", Poisson::new(5.0))?,
            security_compliance: distribution("security_compliance_req", Bernoulli::new(0.7))?,
            relationship_age: distribution("relationship_age_months", Gamma::new(3.0, 4.0))?,
            support_tickets: distribution("support_tickets_90d", Poisson::new(3.0))?,
            industry_growth: distribution("industry_growth_rate", Normal::new(0.05, 0.03))?,
            symmetric_beta: distribution("beta(2, 2)", Beta::new(2.0, 2.0))?,
            high_beta: distribution("beta(3, 2)", Beta::new(3.0, 2.0))?,
            low_beta: distribution("beta(2, 3)", Beta::new(2.0, 3.0))?,
            churn_risk: distribution("previous_churn_risk", Beta::new(2.0, 5.0))?,
            csm_relationship: distribution("csm_relationship_score", Beta::new(4.0, 2.0))?,
            implementation_support: distribution(
                "implementation_support_sensitivity",
                Beta::new(2.5, 2.0),
            )?,
            noise: distribution("noise_std_dev", Normal::new(0.0, noise_std_dev))?,
        })
    }

    fn profile(&self, index: usize, rng: &mut StdRng) -> CustomerProfile {
        let mut features = BTreeMap::new();
        let mut put = |name: &str, value: f64| {
            features.insert(name.to_string(), value);
        };

        // Firmographic
        put("employee_count", self.employee_count.sample(rng).floor());
        put("annual_revenue_m", self.annual_revenue_m.sample(rng));
        put("tech_stack_size", self.tech_stack_size.sample(rng));
        put("cloud_maturity_score", self.symmetric_beta.sample(rng) * 10.0);

        // Engagement
        put("website_visits_30d", self.website_visits.sample(rng));
        put("whitepaper_downloads", self.whitepaper_downloads.sample(rng));
        put("demo_requests", self.demo_requests.sample(rng) as f64);
        put("email_open_rate", self.high_beta.sample(rng));
        put("webinar_attendance", self.webinar_attendance.sample(rng));

        // Product fit
        put("competitor_product_count", self.competitor_products.sample(rng));
        put("integration_needs", self.integration_needs.sample(rng));
        let compliance = if self.security_compliance.sample(rng) { 1.0 } else { 0.0 };
        put("security_compliance_req", compliance);
        put("api_usage_intent", self.low_beta.sample(rng));

        // Relationship
        put("relationship_age_months", self.relationship_age.sample(rng));
        put("previous_churn_risk", self.churn_risk.sample(rng));
        put("support_tickets_90d", self.support_tickets.sample(rng));
        put("csm_relationship_score", self.csm_relationship.sample(rng) * 10.0);

        // Market
        put("industry_growth_rate", self.industry_growth.sample(rng));
        put("competitive_pressure_idx", self.symmetric_beta.sample(rng) * 10.0);
        let quarter = BudgetQuarter::ordered()[rng.gen_range(0..4)];
        for candidate in BudgetQuarter::ordered() {
            let indicator = if candidate == quarter { 1.0 } else { 0.0 };
            put(candidate.indicator_feature(), indicator);
        }

        // Promotional sensitivity
        put("discount_sensitivity", self.high_beta.sample(rng));
        put("sla_sensitivity", self.symmetric_beta.sample(rng));
        put("training_sensitivity", self.low_beta.sample(rng));
        put(
            "implementation_support_sensitivity",
            self.implementation_support.sample(rng),
        );

        let target = expansion_revenue_signal(&features) + self.noise.sample(rng);

        CustomerProfile {
            id: CustomerId(format!("CUST_{index:05}")),
            company_name: format!("Company_{index}"),
            budget_quarter: quarter,
            features,
            expansion_revenue_potential: Some(target.clamp(TARGET_FLOOR, TARGET_CEILING)),
        }
    }
}

/// Noise-free expansion revenue potential, including interaction terms.
pub fn expansion_revenue_signal(features: &BTreeMap<String, f64>) -> f64 {
    let get = |name: &str| features.get(name).copied().unwrap_or(0.0);

    let linear = get("annual_revenue_m") * 0.02
        + get("employee_count") * 0.001
        + get("tech_stack_size") * 2.0
        + get("cloud_maturity_score") * 3.0
        + get("website_visits_30d") * 0.5
        + get("demo_requests") * 5.0
        + get("email_open_rate") * 10.0
        + get("integration_needs") * 1.5
        + get("security_compliance_req") * 8.0
        + get("csm_relationship_score") * 2.0
        + get("industry_growth_rate") * 50.0;

    let interactions = get("demo_requests") * get("cloud_maturity_score") * 0.5
        + get("employee_count") * get("tech_stack_size") * 0.0001;

    linear + interactions
}
