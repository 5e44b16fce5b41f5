use serde::Serialize;

use super::knowledge::KnowledgeBase;
use super::waterfall::{AttributionWaterfall, DEFAULT_DRIVER_COUNT};
use crate::workflows::accounts::domain::{
    CustomerId, CustomerRecord, Promotion, PromotionalSensitivities, SEGMENT_BUDGET_QUARTER,
};
use crate::workflows::prioritization::{ActionPlan, ValidationError};

/// Everything an account executive needs about one customer before a call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreCallContext {
    pub customer_id: CustomerId,
    pub company_name: String,
    pub budget_quarter: Option<String>,
    pub predicted_revenue: f64,
    pub baseline_revenue: f64,
    pub priority_score: f64,
    pub allocated_actions: u64,
    pub recommended_promotion: Promotion,
    pub sensitivities: PromotionalSensitivities,
    pub waterfall: AttributionWaterfall,
}

impl PreCallContext {
    pub fn new(
        record: &CustomerRecord,
        priority_score: f64,
        allocated_actions: u64,
    ) -> Result<Self, ValidationError> {
        let sensitivities = match record.sensitivities() {
            Some(sensitivities) => sensitivities,
            None => {
                let missing = Promotion::ordered()
                    .into_iter()
                    .map(Promotion::sensitivity_feature)
                    .find(|feature| record.feature(feature).is_none())
                    .unwrap_or_default();
                return Err(ValidationError::MissingFeature {
                    customer: record.id.clone(),
                    feature: missing.to_string(),
                });
            }
        };
        let recommended_promotion = record
            .recommended_promotion()
            .unwrap_or_else(|| sensitivities.recommend());

        Ok(Self {
            customer_id: record.id.clone(),
            company_name: record.company_name.clone(),
            budget_quarter: record.segment(SEGMENT_BUDGET_QUARTER).map(str::to_string),
            predicted_revenue: record.predicted,
            baseline_revenue: record.baseline,
            priority_score,
            allocated_actions,
            recommended_promotion,
            sensitivities,
            waterfall: AttributionWaterfall::from_record(record, DEFAULT_DRIVER_COUNT)?,
        })
    }

    /// Looks the customer up in a finished plan.
    pub fn from_plan(record: &CustomerRecord, plan: &ActionPlan) -> Result<Self, ValidationError> {
        let row = plan
            .row(&record.id)
            .ok_or_else(|| ValidationError::UnknownCustomer(record.id.clone()))?;
        Self::new(record, row.priority_score, row.allocated_actions)
    }
}

const PLAN_SECTIONS: [(&str, &str); 8] = [
    (
        "Executive Summary",
        "2-3 sentences on why this customer is high-priority and what the meeting should accomplish.",
    ),
    (
        "Key Talking Points",
        "Capabilities and solutions to emphasize given the revenue drivers. Cite knowledge base documents.",
    ),
    (
        "Customer Pain Points & Needs",
        "What the driver analysis reveals about their situation and the problems they likely face.",
    ),
    (
        "Competitive Positioning",
        "How to position against competitors, with citations from the knowledge base.",
    ),
    (
        "Promotional Strategy",
        "Why the recommended promotion fits this customer's sensitivities and buying preferences.",
    ),
    (
        "Specific Actions to Propose",
        "Concrete next steps (demos, POCs, workshops, case studies) aligned with their drivers.",
    ),
    ("Success Metrics", "How to measure engagement success."),
    (
        "Risk Mitigation",
        "Likely objections and how to address them, citing relevant knowledge base content.",
    ),
];

/// Builds the pre-call planning prompt sent to the synthesizer.
pub fn render_prompt(context: &PreCallContext, knowledge: &KnowledgeBase) -> String {
    let mut prompt = String::from(
        "You are an expert enterprise sales strategist. Create a compelling pre-call plan for an \
         account executive preparing to engage with this B2B software customer.\n\n",
    );

    prompt.push_str("CUSTOMER PROFILE:\n");
    prompt.push_str(&format!("- Customer ID: {}\n", context.customer_id));
    prompt.push_str(&format!("- Company: {}\n", context.company_name));
    if let Some(quarter) = &context.budget_quarter {
        prompt.push_str(&format!("- Budget cycle: {quarter}\n"));
    }
    prompt.push_str(&format!("- Priority score: {:.1}\n\n", context.priority_score));

    prompt.push_str("REVENUE DRIVER ANALYSIS:\n");
    prompt.push_str(&format!(
        "The model predicts ${:.1}K expansion revenue potential (vs. ${:.1}K baseline).\n\n",
        context.predicted_revenue, context.baseline_revenue
    ));
    prompt.push_str(&format!("Top {} Revenue Drivers:\n", context.waterfall.drivers.len()));
    for driver in &context.waterfall.drivers {
        let value = driver
            .value
            .map(|value| format!("{value:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        prompt.push_str(&format!(
            "- {}: {} ({} revenue by ${:.1}K)\n",
            driver.label,
            value,
            driver.direction.verb(),
            driver.contribution.abs()
        ));
    }
    prompt.push_str(&format!(
        "- All other factors combined: {:+.1}K\n",
        context.waterfall.all_else
    ));

    prompt.push_str(&format!(
        "\nThis customer has been allocated {} high-priority actions.\n\n",
        context.allocated_actions
    ));

    prompt.push_str(&format!(
        "RECOMMENDED PROMOTION:\n{}\nPromotional Sensitivities:\n",
        context.recommended_promotion.label()
    ));
    for promotion in Promotion::ordered() {
        prompt.push_str(&format!(
            "- {}: {:.2}\n",
            promotion.short_label(),
            context.sensitivities.get(promotion)
        ));
    }

    prompt.push_str("\nKNOWLEDGE BASE:\n\n");
    if knowledge.is_empty() {
        prompt.push_str("(no documents supplied)\n\n");
    }
    for document in knowledge.documents() {
        prompt.push_str(&format!("--- {} ---\n{}", document.name, document.excerpt()));
        if document.is_truncated() {
            prompt.push_str("...");
        }
        prompt.push_str("\n\n");
    }

    prompt.push_str("CREATE A PRE-CALL PLAN with these sections:\n\n");
    for (index, (title, guidance)) in PLAN_SECTIONS.iter().enumerate() {
        prompt.push_str(&format!("{}. **{}**: {}\n", index + 1, title, guidance));
        if *title == "Promotional Strategy" {
            prompt.push_str(&format!(
                "   The recommended promotion is {}.\n",
                context.recommended_promotion.label()
            ));
        }
    }

    let example_source = knowledge
        .names()
        .first()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "document_name".to_string());
    prompt.push_str(&format!(
        "\nCRITICAL: When referencing information from the knowledge base, cite the source using \
         this format: [Source: {example_source}].\n\nMake this practical and actionable and \
         ALWAYS cite your sources.\n"
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::briefing::knowledge::{KnowledgeDocument, EXCERPT_CHARS};
    use std::collections::BTreeMap;

    fn record() -> CustomerRecord {
        let features: BTreeMap<String, f64> = [
            ("demo_requests", 4.0),
            ("discount_sensitivity", 0.2),
            ("sla_sensitivity", 0.7),
            ("training_sensitivity", 0.1),
            ("implementation_support_sensitivity", 0.4),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
        let attributions: BTreeMap<String, f64> = [("demo_requests", 11.0), ("employee_count", -3.0)]
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();

        CustomerRecord {
            id: "CUST_00003".into(),
            company_name: "Company_3".to_string(),
            features,
            segments: [(SEGMENT_BUDGET_QUARTER.to_string(), "Q2".to_string())]
                .into_iter()
                .collect(),
            predicted: 58.0,
            baseline: 50.0,
            attributions,
        }
    }

    #[test]
    fn context_recommends_most_sensitive_promotion() {
        let context = PreCallContext::new(&record(), 78.0, 4).expect("context");
        assert_eq!(context.recommended_promotion, Promotion::ExtendedSla);
        assert_eq!(context.budget_quarter.as_deref(), Some("Q2"));
        assert_eq!(context.waterfall.drivers.len(), 2);
    }

    #[test]
    fn missing_sensitivity_is_reported() {
        let mut record = record();
        record.features.remove("training_sensitivity");
        let err = PreCallContext::new(&record, 10.0, 0).expect_err("missing sensitivity");
        assert_eq!(
            err,
            ValidationError::MissingFeature {
                customer: "CUST_00003".into(),
                feature: "training_sensitivity".to_string(),
            }
        );
    }

    #[test]
    fn prompt_lists_drivers_promotion_and_sources() {
        let context = PreCallContext::new(&record(), 78.0, 4).expect("context");
        let knowledge = KnowledgeBase::new(vec![
            KnowledgeDocument::new("product_capabilities.md", "Zero-downtime migrations."),
            KnowledgeDocument::new("long.md", "x".repeat(EXCERPT_CHARS + 50)),
        ]);

        let prompt = render_prompt(&context, &knowledge);
        assert!(prompt.contains("$58.0K expansion revenue potential (vs. $50.0K baseline)"));
        assert!(prompt.contains("- Demo Requests: 4.00 (increases revenue by $11.0K)"));
        assert!(prompt.contains("- Employee Count: n/a (decreases revenue by $3.0K)"));
        assert!(prompt.contains("allocated 4 high-priority actions"));
        assert!(prompt.contains("RECOMMENDED PROMOTION:\nExtended SLA (99.99% uptime)"));
        assert!(prompt.contains("--- product_capabilities.md ---\nZero-downtime migrations.\n"));
        assert!(prompt.contains(&format!("{}...", "x".repeat(10))));
        assert!(!prompt.contains(&"x".repeat(EXCERPT_CHARS + 1)));
        assert!(prompt.contains("8. **Risk Mitigation**"));
        assert!(prompt.contains("[Source: product_capabilities.md]"));
    }
}
