use metrics_exporter_prometheus::PrometheusHandle;
use sales_intel::error::AppError;
use sales_intel::workflows::accounts::{
    AccountDataset, CustomerRecord, ExpansionModel, ModelConfig, ModelFit,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Scored records plus the fit statistics when a model was trained to produce them.
pub(crate) struct LoadedRecords {
    pub(crate) records: Vec<CustomerRecord>,
    pub(crate) fit: Option<ModelFit>,
}

/// Reads customer records from `.json` (already scored) or CSV (fitted on load).
pub(crate) fn load_records(path: &Path, seed: u64) -> Result<LoadedRecords, AppError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let reader = BufReader::new(File::open(path)?);
        let records: Vec<CustomerRecord> = serde_json::from_reader(reader)?;
        info!(path = %path.display(), records = records.len(), "loaded scored customer records");
        return Ok(LoadedRecords { records, fit: None });
    }

    let profiles = AccountDataset::from_path(path)?;
    let model = ExpansionModel::fit(
        &profiles,
        &ModelConfig {
            seed,
            ..ModelConfig::default()
        },
    )?;
    let records = model.explain_all(&profiles)?;
    info!(path = %path.display(), records = records.len(), "scored account dataset");
    Ok(LoadedRecords {
        records,
        fit: Some(model.fit_quality()),
    })
}

pub(crate) fn format_revenue(thousands: f64) -> String {
    if thousands.abs() >= 1000.0 {
        format!("${:.1}M", thousands / 1000.0)
    } else {
        format!("${:.1}K", thousands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sales_intel::workflows::accounts::{GeneratorConfig, SyntheticAccounts};

    #[test]
    fn csv_input_is_fitted_and_explained() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("accounts.csv");
        let profiles = SyntheticAccounts::generate(&GeneratorConfig {
            customers: 60,
            ..GeneratorConfig::default()
        })
        .expect("generates");
        AccountDataset::write_to_path(&path, &profiles).expect("writes dataset");

        let loaded = load_records(&path, 7).expect("loads");
        assert_eq!(loaded.records.len(), 60);
        assert!(loaded.fit.is_some());
        assert!(loaded.records.iter().all(|record| record.attribution_gap() < 1e-6));
    }

    #[test]
    fn json_input_is_used_as_is() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.json");
        std::fs::write(
            &path,
            r#"[{"id":"A","features":{"demo_requests":1.0},"predicted":12.5,"attributions":{}}]"#,
        )
        .expect("writes json");

        let loaded = load_records(&path, 42).expect("loads");
        assert!(loaded.fit.is_none());
        assert_eq!(loaded.records[0].id.as_str(), "A");
        assert_eq!(loaded.records[0].predicted, 12.5);
    }

    #[test]
    fn revenue_formats_in_thousands_and_millions() {
        assert_eq!(format_revenue(42.26), "$42.3K");
        assert_eq!(format_revenue(12_500.0), "$12.5M");
    }
}
