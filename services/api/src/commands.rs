use crate::infra::{format_revenue, load_records};
use clap::Args;
use sales_intel::config::AppConfig;
use sales_intel::error::AppError;
use sales_intel::telemetry;
use sales_intel::workflows::accounts::{
    AccountDataset, CustomerId, GeneratorConfig, SyntheticAccounts,
};
use sales_intel::workflows::briefing::{
    AnthropicSynthesizer, KnowledgeBase, PreCallBriefing,
};
use sales_intel::workflows::prioritization::{
    ActionPlan, ActionPlanner, DemandPolicy, PlannerConfig, ScoreScale, ValidationError,
};
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub(crate) struct GenerateArgs {
    /// Number of synthetic customers
    #[arg(long, default_value_t = 500)]
    pub(crate) customers: usize,
    /// Random seed (defaults to PLANNER_SEED)
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Destination CSV file
    #[arg(long)]
    pub(crate) output: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct AllocateArgs {
    /// Account CSV (fitted on load) or JSON array of scored customer records
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Global action budget (defaults to PLANNER_BUDGET)
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) budget: Option<i64>,
    /// Maximum actions per customer (defaults to PLANNER_CAP)
    #[arg(long, allow_negative_numbers = true)]
    pub(crate) cap: Option<i64>,
    /// Only scores strictly above this value receive actions
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub(crate) threshold: f64,
    /// Ask for ceil(score / WIDTH) actions instead of the full cap
    #[arg(long, value_name = "WIDTH")]
    pub(crate) score_bands: Option<f64>,
    /// Rescale scores to 0-100 across the run before allocating
    #[arg(long)]
    pub(crate) min_max: bool,
    /// Segment to stratify the summary by, e.g. budget_cycle_quarter
    #[arg(long)]
    pub(crate) segment: Option<String>,
    /// Leave customers with zero actions out of the histogram
    #[arg(long)]
    pub(crate) omit_zero_bucket: bool,
    /// Write the ranked allocation table to this CSV file
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Print the full plan as JSON instead of the text report
    #[arg(long)]
    pub(crate) json: bool,
    /// Rows to show in the text report
    #[arg(long, default_value_t = 10)]
    pub(crate) top: usize,
}

#[derive(Args, Debug)]
pub(crate) struct PlanArgs {
    /// Account CSV (fitted on load) or JSON array of scored customer records
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Customer identifier, e.g. CUST_00042
    #[arg(long)]
    pub(crate) customer: String,
    /// Directory of .md/.txt reference documents
    #[arg(long)]
    pub(crate) knowledge_dir: Option<PathBuf>,
    /// Print the prompt without calling the synthesis service
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Write the plan (or prompt on dry runs) to this file
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

fn init_cli(config: &AppConfig) {
    if let Err(err) = telemetry::init(&config.telemetry) {
        eprintln!("telemetry disabled: {err}");
    }
}

pub(crate) fn run_generate(args: GenerateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    init_cli(&config);

    let generator = GeneratorConfig {
        customers: args.customers,
        seed: args.seed.unwrap_or(config.planner.seed),
        ..GeneratorConfig::default()
    };
    let profiles = SyntheticAccounts::generate(&generator)?;
    AccountDataset::write_to_path(&args.output, &profiles)?;

    info!(customers = profiles.len(), seed = generator.seed, path = %args.output.display(), "wrote synthetic accounts");
    println!(
        "Wrote {} synthetic accounts to {}",
        profiles.len(),
        args.output.display()
    );
    Ok(())
}

pub(crate) fn allocate_config(args: &AllocateArgs, defaults: PlannerConfig) -> PlannerConfig {
    let mut config = defaults;
    if let Some(budget) = args.budget {
        config.policy.budget = budget;
    }
    if let Some(cap) = args.cap {
        config.policy.per_customer_cap = cap;
    }
    config.policy.threshold = args.threshold;
    if let Some(band_width) = args.score_bands {
        config.policy.demand = DemandPolicy::ScoreBands { band_width };
    }
    if args.min_max {
        config.scale = ScoreScale::MinMax;
    }
    config.segment = args.segment.clone();
    config.summary.include_zero_bucket = !args.omit_zero_bucket;
    config
}

pub(crate) fn run_allocate(args: AllocateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    init_cli(&config);

    let planner_config = allocate_config(&args, config.planner.planner_config());
    let planner = ActionPlanner::new(planner_config)?;
    let loaded = load_records(&args.input, config.planner.seed)?;
    let plan = planner.plan(&loaded.records)?;

    if let Some(path) = &args.output {
        plan.write_csv(File::create(path)?)?;
        info!(path = %path.display(), rows = plan.rows.len(), "wrote allocation table");
    }

    if args.json {
        serde_json::to_writer_pretty(io::stdout().lock(), &plan)?;
        println!();
    } else {
        render_plan(&plan, args.top);
    }
    Ok(())
}

pub(crate) fn run_plan(args: PlanArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    init_cli(&config);

    let planner = ActionPlanner::new(config.planner.planner_config())?;
    let loaded = load_records(&args.input, config.planner.seed)?;
    let plan = planner.plan(&loaded.records)?;

    let customer = CustomerId(args.customer.clone());
    let record = loaded
        .records
        .iter()
        .find(|record| record.id == customer)
        .ok_or_else(|| ValidationError::UnknownCustomer(customer.clone()))?;

    let knowledge = match &args.knowledge_dir {
        Some(dir) => KnowledgeBase::load_dir(dir)?,
        None => KnowledgeBase::default(),
    };
    let briefing = PreCallBriefing::draft(record, &plan, &knowledge)?;

    let dry_run = args.dry_run || config.synthesis.api_key.is_none();
    if dry_run && !args.dry_run {
        warn!("ANTHROPIC_API_KEY is not set; printing the prompt instead of a plan");
    }

    let text = if dry_run {
        briefing.prompt.clone()
    } else {
        let synthesizer = AnthropicSynthesizer::new(config.synthesis.anthropic_settings())?;
        briefing.synthesize(&synthesizer)?.plan.unwrap_or_default()
    };

    match &args.output {
        Some(path) => {
            fs::write(path, &text)?;
            println!("Wrote pre-call material for {} to {}", customer, path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

pub(crate) fn render_plan(plan: &ActionPlan, top: usize) {
    let pipeline = &plan.pipeline;
    println!(
        "Sales action plan ({} scores, weights v{}, generated {})",
        plan.scale.label(),
        plan.weights_version,
        plan.generated_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
    );
    println!(
        "- {} customers | {} actions allocated of {} | {} customers with actions",
        pipeline.total_customers, plan.summary.total, plan.outcome.budget, plan.summary.customers_with_actions
    );
    println!(
        "- Pipeline {} total | {} avg | {} targeted",
        format_revenue(pipeline.total_predicted_revenue),
        format_revenue(pipeline.average_predicted_revenue),
        format_revenue(pipeline.targeted_predicted_revenue)
    );

    println!("\nActions per customer");
    for bucket in plan.summary.buckets() {
        println!("- {} actions: {} customers", bucket.actions, bucket.customers);
    }

    if let Some(strata) = &plan.summary.strata {
        println!("\nBy segment");
        for (segment, histogram) in strata {
            let buckets: Vec<String> = histogram
                .iter()
                .map(|(actions, customers)| format!("{actions}x{customers}"))
                .collect();
            println!("- {}: {}", segment, buckets.join(", "));
        }
    }

    if !pipeline.promotion_mix.is_empty() {
        println!("\nRecommended promotions");
        for (promotion, customers) in &pipeline.promotion_mix {
            println!("- {promotion}: {customers}");
        }
    }

    println!("\nTop {} customers", top.min(plan.rows.len()));
    for row in plan.rows.iter().take(top) {
        println!(
            "{:>4}. {} ({}) score {:.1} | predicted {} | {} actions | {}",
            row.rank,
            row.customer_id,
            row.company_name,
            row.priority_score,
            format_revenue(row.predicted_revenue),
            row.allocated_actions,
            row.recommended_promotion.as_deref().unwrap_or("no promotion")
        );
    }
}
