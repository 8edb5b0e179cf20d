use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use agdrought::{
    build_snapshot, dashboard_router, init_logging, load_observations_csv, log_app_bind,
    log_app_start, log_classifier_selected, log_source_selected, logging_config_from_env,
    pipeline_config_from_env, process_series, DashboardSnapshotSource, DisplayRiskPolicy,
    DroughtClassifier, InMemorySnapshotSource, LinearSoftmaxClassifier, ThresholdClassifier,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("dashboard_server", &logging_cfg);

    let addr: SocketAddr = std::env::var("AGDROUGHT_DASHBOARD_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let source = source_from_env()?;
    let classifier = classifier_from_env()?;
    let app = dashboard_router(source, classifier);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn source_from_env() -> Result<Arc<dyn DashboardSnapshotSource>, Box<dyn std::error::Error>> {
    match std::env::var("AGDROUGHT_DATASET_PATH") {
        Ok(raw) if !raw.trim().is_empty() => {
            let path = PathBuf::from(raw.trim());
            let cfg = pipeline_config_from_env();
            let observations = load_observations_csv(&path)?;
            let processed = process_series(&observations, &cfg.features, &cfg.label_policy)?;
            log_source_selected("dataset", Some("AGDROUGHT_DATASET_PATH"));
            Ok(Arc::new(InMemorySnapshotSource::new(build_snapshot(
                &processed,
                &DisplayRiskPolicy::default(),
            ))))
        }
        _ => {
            log_source_selected("demo", None);
            Ok(Arc::new(InMemorySnapshotSource::demo()))
        }
    }
}

fn classifier_from_env() -> Result<Arc<dyn DroughtClassifier>, Box<dyn std::error::Error>> {
    match std::env::var("AGDROUGHT_MODEL_PATH") {
        Ok(raw) if !raw.trim().is_empty() => {
            let model = LinearSoftmaxClassifier::load(&PathBuf::from(raw.trim()))?;
            log_classifier_selected(model.name(), "AGDROUGHT_MODEL_PATH");
            Ok(Arc::new(model))
        }
        _ => {
            let model = ThresholdClassifier::default();
            log_classifier_selected(model.name(), "no_model_artifact");
            Ok(Arc::new(model))
        }
    }
}
