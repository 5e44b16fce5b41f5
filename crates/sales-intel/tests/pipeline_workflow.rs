use std::fs;

use sales_intel::workflows::accounts::domain::{SEGMENT_BUDGET_QUARTER, SEGMENT_RECOMMENDED_PROMOTION};
use sales_intel::workflows::accounts::{
    AccountDataset, ExpansionModel, GeneratorConfig, ModelConfig, SyntheticAccounts,
};
use sales_intel::workflows::briefing::{EchoSynthesizer, KnowledgeBase, PreCallBriefing};
use sales_intel::workflows::prioritization::{
    ActionPlanner, AllocationPolicy, DemandPolicy, PlannerConfig, ScoreScale, ValidationError,
};

fn scored_accounts(customers: usize) -> Vec<sales_intel::workflows::accounts::CustomerRecord> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("accounts.csv");
    let generated = SyntheticAccounts::generate(&GeneratorConfig {
        customers,
        ..GeneratorConfig::default()
    })
    .expect("generates");
    AccountDataset::write_to_path(&path, &generated).expect("export succeeds");

    let profiles = AccountDataset::from_path(&path).expect("import succeeds");
    let model = ExpansionModel::fit(&profiles, &ModelConfig::default()).expect("model fits");
    model.explain_all(&profiles).expect("explains")
}

#[test]
fn csv_accounts_flow_through_scoring_allocation_and_summary() {
    let records = scored_accounts(200);
    assert_eq!(records.len(), 200);
    for record in &records {
        assert!(record.attribution_gap() < 1e-6, "{} attributions drift", record.id);
        assert!(record.segment(SEGMENT_BUDGET_QUARTER).is_some());
        assert!(record.segment(SEGMENT_RECOMMENDED_PROMOTION).is_some());
    }

    let plan = ActionPlanner::new(PlannerConfig {
        segment: Some(SEGMENT_BUDGET_QUARTER.to_string()),
        ..PlannerConfig::default()
    })
    .expect("valid config")
    .plan(&records)
    .expect("plans");

    assert!(plan.summary.total <= 250);
    assert_eq!(plan.summary.total, plan.outcome.allocation.total());
    assert_eq!(plan.rows.len(), 200);
    assert_eq!(plan.pipeline.total_actions, plan.summary.total);

    let stratified: usize = plan
        .summary
        .strata
        .as_ref()
        .expect("stratified")
        .values()
        .flat_map(|histogram| histogram.values())
        .sum();
    assert_eq!(stratified, 200);

    let promotions: usize = plan.pipeline.promotion_mix.values().sum();
    assert_eq!(promotions, 200);

    for pair in plan.rows.windows(2) {
        assert!(pair[0].priority_score >= pair[1].priority_score);
    }
}

#[test]
fn dashboard_scoring_allocates_by_score_band() {
    let records = scored_accounts(120);
    let plan = ActionPlanner::new(PlannerConfig {
        scale: ScoreScale::MinMax,
        policy: AllocationPolicy {
            demand: DemandPolicy::ScoreBands { band_width: 20.0 },
            ..AllocationPolicy::default()
        },
        ..PlannerConfig::default()
    })
    .expect("valid config")
    .plan(&records)
    .expect("plans");

    let top = &plan.rows[0];
    assert_eq!(top.priority_score, 100.0);
    assert_eq!(top.allocated_actions, 5);
    for row in &plan.rows {
        let band = (row.priority_score / 20.0).ceil() as u64;
        assert!(row.allocated_actions <= band.min(5));
    }
}

#[test]
fn briefing_cites_knowledge_documents_for_the_top_customer() {
    let records = scored_accounts(80);
    let plan = ActionPlanner::new(PlannerConfig::default())
        .expect("valid config")
        .plan(&records)
        .expect("plans");

    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("product_capabilities.md"),
        "# Capabilities\nNative multi-cloud deployment and SOC 2 controls.",
    )
    .expect("write doc");
    fs::write(
        dir.path().join("competitive_intelligence.txt"),
        "Competitors lack usage-based pricing.",
    )
    .expect("write doc");
    let knowledge = KnowledgeBase::load_dir(dir.path()).expect("knowledge loads");

    let top = &plan.rows[0];
    let record = records
        .iter()
        .find(|record| record.id == top.customer_id)
        .expect("top customer present");

    let briefing = PreCallBriefing::draft(record, &plan, &knowledge)
        .expect("drafts")
        .synthesize(&EchoSynthesizer)
        .expect("synthesizes");

    assert_eq!(briefing.context.allocated_actions, top.allocated_actions);
    assert!(briefing.context.waterfall.drivers.len() <= 5);
    let explained = briefing.context.waterfall.explained_total();
    assert!((explained - record.predicted).abs() < 1e-6);

    assert!(briefing.prompt.contains("--- competitive_intelligence.txt ---"));
    assert!(briefing.prompt.contains("[Source: competitive_intelligence.txt]"));
    assert!(briefing
        .prompt
        .contains(&format!("allocated {} high-priority actions", top.allocated_actions)));
    assert_eq!(briefing.plan.as_deref(), Some(briefing.prompt.as_str()));
}

#[test]
fn briefing_for_unplanned_customer_is_rejected() {
    let records = scored_accounts(30);
    let plan = ActionPlanner::new(PlannerConfig::default())
        .expect("valid config")
        .plan(&records[..10])
        .expect("plans");

    let outsider = &records[20];
    let err = PreCallBriefing::draft(outsider, &plan, &KnowledgeBase::default())
        .expect_err("customer outside plan");
    assert_eq!(
        err.to_string(),
        ValidationError::UnknownCustomer(outsider.id.clone()).to_string()
    );
}
