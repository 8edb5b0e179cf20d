//! Dashboard table primitives and HTTP routes, including the live predictor.

use std::sync::{Arc, RwLock};

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classifier::{class_categories, DroughtClassifier, CLASS_COUNT};
use crate::features::FeatureConfig;
use crate::labeling::{
    DisplayRiskPolicy, DroughtIndicators, HistoricalLabelPolicy, RiskAssessment,
};
use crate::observation::Observation;
use crate::pipeline::{process_series, ProcessedSeries};
use crate::summary::DroughtSummary;
use crate::vector::ManualInputs;

pub const DASHBOARD_HEADERS: [&str; 9] = [
    "Month",
    "Season",
    "NDVI",
    "VCI",
    "Precip (mm)",
    "3-Month Precip (mm)",
    "Precip Anomaly (%)",
    "Drought Category",
    "Risk Hint",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardRow {
    pub date: String,
    pub season: String,
    pub ndvi: f64,
    pub vci: f64,
    pub precipitation_mm: f64,
    pub precip_3month: f64,
    pub precip_anomaly: f64,
    pub drought_label: usize,
    pub drought_category: String,
    pub risk: Option<RiskAssessment>,
}

impl DashboardRow {
    pub fn to_cell_text_values(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.season.clone(),
            format!("{:.3}", self.ndvi),
            format!("{:.1}", self.vci),
            format!("{:.1}", self.precipitation_mm),
            format!("{:.1}", self.precip_3month),
            format!("{:+.1}", self.precip_anomaly),
            self.drought_category.clone(),
            self.risk
                .map(|r| format!("{} ({})", r.level.as_str(), r.score))
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub rows: Vec<DashboardRow>,
    pub summary: Option<DroughtSummary>,
}

impl DashboardSnapshot {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            summary: None,
        }
    }
}

pub fn build_snapshot(
    processed: &ProcessedSeries,
    risk_policy: &DisplayRiskPolicy,
) -> DashboardSnapshot {
    let rows = processed
        .rows
        .iter()
        .map(|row| {
            let f = &row.features;
            DashboardRow {
                date: f.observation.date_label(),
                season: row.season.as_str().to_string(),
                ndvi: f.observation.ndvi,
                vci: f.vci,
                precipitation_mm: f.observation.precipitation_mm,
                precip_3month: f.precip_3month,
                precip_anomaly: f.precip_anomaly,
                drought_label: row.label.index(),
                drought_category: row.label.category().to_string(),
                risk: risk_policy.assess(&DroughtIndicators::from(f)).ok(),
            }
        })
        .collect();

    DashboardSnapshot {
        rows,
        summary: Some(processed.summary.clone()),
    }
}

pub trait DashboardSnapshotSource: Send + Sync + 'static {
    fn snapshot(&self) -> DashboardSnapshot;
}

#[derive(Clone)]
pub struct InMemorySnapshotSource {
    inner: Arc<RwLock<DashboardSnapshot>>,
}

impl InMemorySnapshotSource {
    pub fn new(snapshot: DashboardSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub fn demo() -> Self {
        Self::new(demo_snapshot())
    }

    pub fn replace_snapshot(&self, snapshot: DashboardSnapshot) {
        let mut guard = self
            .inner
            .write()
            .expect("in-memory snapshot lock should not be poisoned");
        *guard = snapshot;
    }
}

impl DashboardSnapshotSource for InMemorySnapshotSource {
    fn snapshot(&self) -> DashboardSnapshot {
        self.inner
            .read()
            .expect("in-memory snapshot lock should not be poisoned")
            .clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub classifier: String,
    pub class_index: usize,
    pub category: String,
    pub confidence: f64,
    pub probabilities: [f64; CLASS_COUNT],
    pub categories: [String; CLASS_COUNT],
    pub risk: RiskAssessment,
    pub risk_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn dashboard_router(
    source: Arc<dyn DashboardSnapshotSource>,
    classifier: Arc<dyn DroughtClassifier>,
) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard_html))
        .route("/dashboard/snapshot", get(get_dashboard_snapshot))
        .route("/predict", get(get_prediction))
        .with_state(DashboardAppState {
            source,
            classifier,
            risk_policy: DisplayRiskPolicy::default(),
        })
}

/// Runs the model and the risk hint over one set of live inputs. The hint
/// comes from [`DisplayRiskPolicy`] and never feeds the predicted class.
pub fn predict_manual(
    inputs: &ManualInputs,
    classifier: &dyn DroughtClassifier,
    risk_policy: &DisplayRiskPolicy,
) -> Result<PredictResponse, String> {
    let vector = inputs.to_vector().map_err(|err| err.to_string())?;
    let prediction = classifier.predict(&vector).map_err(|err| err.to_string())?;
    let risk = risk_policy
        .assess(&vector.indicators())
        .map_err(|err| err.to_string())?;

    Ok(PredictResponse {
        classifier: classifier.name().to_string(),
        class_index: prediction.class_index(),
        category: prediction.class().category().to_string(),
        confidence: prediction.confidence(),
        probabilities: *prediction.probabilities(),
        categories: class_categories().map(str::to_string),
        risk,
        risk_label: risk.level.as_str().to_string(),
    })
}

pub fn render_dashboard_html(snapshot: &DashboardSnapshot) -> String {
    let now_utc = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<title>Drought Monitor</title>\n");
    out.push_str("</head><body><main>\n");
    out.push_str("<h1>Agricultural Drought Monitor</h1>\n");
    out.push_str(&format!("<p>Months: {}</p>", snapshot.rows.len()));
    out.push_str(&format!("<p>Generated: {}</p>\n", escape_html(&now_utc)));

    if let Some(summary) = &snapshot.summary {
        out.push_str("<ul id=\"distribution\">");
        for share in &summary.distribution {
            out.push_str(&format!(
                "<li>{}: {} months ({:.1}%)</li>",
                escape_html(&share.category),
                share.months,
                share.percent
            ));
        }
        out.push_str("</ul>\n");
    }

    out.push_str("<table id=\"drought-table\">\n<thead><tr>");
    for header in DASHBOARD_HEADERS {
        out.push_str("<th>");
        out.push_str(&escape_html(header));
        out.push_str("</th>");
    }
    out.push_str("</tr></thead><tbody>\n");

    for (idx, row) in snapshot.rows.iter().enumerate() {
        out.push_str(&format!(
            "<tr data-row=\"{idx}\" data-label=\"{}\">",
            row.drought_label
        ));
        for value in row.to_cell_text_values() {
            out.push_str("<td>");
            out.push_str(&escape_html(&value));
            out.push_str("</td>");
        }
        out.push_str("</tr>\n");
    }

    out.push_str("</tbody></table>\n");
    out.push_str("<p>Risk hints use an additive score and may differ from the drought category.</p>\n");
    out.push_str("</main></body></html>\n");
    out
}

/// Three years of synthetic monthly observations with a monsoon cycle and a
/// dry second year.
pub fn demo_observations() -> Vec<Observation> {
    const MONTHLY_RAIN: [f64; 12] = [
        4.0, 2.0, 6.0, 9.0, 18.0, 160.0, 280.0, 250.0, 170.0, 70.0, 20.0, 6.0,
    ];
    const MONTHLY_NDVI: [f64; 12] = [
        0.42, 0.38, 0.33, 0.30, 0.29, 0.36, 0.52, 0.61, 0.64, 0.58, 0.50, 0.46,
    ];
    const MONTHLY_TEMP: [f64; 12] = [
        22.0, 24.5, 28.5, 31.5, 33.0, 29.5, 26.5, 26.0, 26.5, 26.5, 24.5, 22.5,
    ];

    let mut out = Vec::with_capacity(36);
    for (year_idx, year) in (2021..=2023).enumerate() {
        let (rain_factor, ndvi_shift) = if year_idx == 1 { (0.45, -0.06) } else { (1.0, 0.0) };
        for month in 1..=12_u32 {
            let m = (month - 1) as usize;
            let temp = MONTHLY_TEMP[m] + if year_idx == 1 { 0.8 } else { 0.0 };
            out.push(
                Observation::new(
                    year,
                    month,
                    MONTHLY_NDVI[m] + ndvi_shift,
                    MONTHLY_RAIN[m] * rain_factor,
                )
                .with_temperatures(Some(temp), Some(temp + 6.5), Some(temp - 7.0)),
            );
        }
    }
    out
}

pub fn demo_snapshot() -> DashboardSnapshot {
    match process_series(
        &demo_observations(),
        &FeatureConfig::default(),
        &HistoricalLabelPolicy::default(),
    ) {
        Ok(processed) => build_snapshot(&processed, &DisplayRiskPolicy::default()),
        Err(err) => {
            warn!(
                component = "dashboard",
                event = "dashboard.demo.failed",
                error = %err
            );
            DashboardSnapshot::empty()
        }
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[derive(Clone)]
struct DashboardAppState {
    source: Arc<dyn DashboardSnapshotSource>,
    classifier: Arc<dyn DroughtClassifier>,
    risk_policy: DisplayRiskPolicy,
}

async fn get_dashboard_html(State(state): State<DashboardAppState>) -> impl IntoResponse {
    let snapshot = state.source.snapshot();
    info!(
        component = "dashboard",
        event = "http.dashboard.request",
        rows = snapshot.rows.len()
    );
    Html(render_dashboard_html(&snapshot))
}

async fn get_dashboard_snapshot(State(state): State<DashboardAppState>) -> impl IntoResponse {
    let snapshot = state.source.snapshot();
    info!(
        component = "dashboard",
        event = "http.snapshot.request",
        rows = snapshot.rows.len()
    );
    Json(snapshot)
}

async fn get_prediction(
    State(state): State<DashboardAppState>,
    query: Result<Query<ManualInputs>, QueryRejection>,
) -> Response {
    let result = match query {
        Ok(Query(inputs)) => {
            predict_manual(&inputs, state.classifier.as_ref(), &state.risk_policy)
        }
        Err(rejection) => Err(rejection.body_text()),
    };

    match result {
        Ok(response) => {
            info!(
                component = "dashboard",
                event = "http.predict.request",
                classifier = %response.classifier,
                class_index = response.class_index,
                confidence = response.confidence,
                risk_score = response.risk.score
            );
            Json(response).into_response()
        }
        Err(error) => {
            warn!(
                component = "dashboard",
                event = "http.predict.rejected",
                error = %error
            );
            (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
        }
    }
}
