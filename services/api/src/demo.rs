use crate::commands::render_plan;
use crate::infra::format_revenue;
use clap::Args;
use sales_intel::config::AppConfig;
use sales_intel::error::AppError;
use sales_intel::workflows::accounts::domain::SEGMENT_BUDGET_QUARTER;
use sales_intel::workflows::accounts::{
    ExpansionModel, GeneratorConfig, ModelConfig, SyntheticAccounts,
};
use sales_intel::workflows::briefing::{KnowledgeBase, PreCallBriefing};
use sales_intel::workflows::prioritization::{ActionPlanner, DemandPolicy, ScoreScale};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Number of synthetic customers
    #[arg(long, default_value_t = 500)]
    pub(crate) customers: usize,
    /// Random seed (defaults to PLANNER_SEED)
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Rescale to 0-100 and allocate ceil(score / 20) actions per customer
    #[arg(long)]
    pub(crate) dashboard_scoring: bool,
    /// Rows to show in the ranked table
    #[arg(long, default_value_t = 10)]
    pub(crate) top: usize,
    /// Knowledge base used for the pre-call prompt preview
    #[arg(long)]
    pub(crate) knowledge_dir: Option<PathBuf>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let seed = args.seed.unwrap_or(config.planner.seed);

    println!("Account prioritization demo");
    let profiles = SyntheticAccounts::generate(&GeneratorConfig {
        customers: args.customers,
        seed,
        ..GeneratorConfig::default()
    })?;
    println!("- Generated {} synthetic accounts (seed {})", profiles.len(), seed);

    let model = ExpansionModel::fit(
        &profiles,
        &ModelConfig {
            seed,
            ..ModelConfig::default()
        },
    )?;
    let fit = model.fit_quality();
    println!(
        "- Expansion model: train R2 {:.3} ({} rows) | test R2 {} ({} rows) | baseline {}",
        fit.train_r2,
        fit.train_rows,
        fit.test_r2
            .map(|r2| format!("{r2:.3}"))
            .unwrap_or_else(|| "n/a".to_string()),
        fit.test_rows,
        format_revenue(model.baseline())
    );

    let records = model.explain_all(&profiles)?;
    let mut planner_config = config.planner.planner_config();
    planner_config.segment = Some(SEGMENT_BUDGET_QUARTER.to_string());
    if args.dashboard_scoring {
        planner_config.scale = ScoreScale::MinMax;
        planner_config.policy.demand = DemandPolicy::ScoreBands { band_width: 20.0 };
    }
    let plan = ActionPlanner::new(planner_config)?.plan(&records)?;

    println!();
    render_plan(&plan, args.top);

    let Some(top_row) = plan.rows.first() else {
        return Ok(());
    };
    let Some(record) = records.iter().find(|record| record.id == top_row.customer_id) else {
        return Ok(());
    };

    let knowledge = match &args.knowledge_dir {
        Some(dir) => KnowledgeBase::load_dir(dir)?,
        None => KnowledgeBase::default(),
    };
    let briefing = PreCallBriefing::draft(record, &plan, &knowledge)?;
    let waterfall = &briefing.context.waterfall;

    println!("\nRevenue drivers for {} ({})", record.id, record.company_name);
    println!("- Baseline: {}", format_revenue(waterfall.baseline));
    for driver in &waterfall.drivers {
        println!(
            "- {}: {:+.1}K ({})",
            driver.label,
            driver.contribution,
            driver.direction.verb()
        );
    }
    println!("- All else: {:+.1}K", waterfall.all_else);
    println!("- Predicted: {}", format_revenue(waterfall.predicted));
    println!(
        "- Recommended promotion: {}",
        briefing.context.recommended_promotion.label()
    );

    println!(
        "\nPre-call prompt preview ({} knowledge documents, {} characters)",
        knowledge.documents().len(),
        briefing.prompt.chars().count()
    );
    for line in briefing.prompt.lines().take(12) {
        println!("  {line}");
    }

    Ok(())
}
