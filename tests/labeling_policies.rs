use agdrought::{
    DisplayRiskPolicy, DroughtIndicators, DroughtLabel, HistoricalLabelPolicy, LabelError,
    RiskLevel,
};

fn indicators(vci: f64, ndvi: f64, precip: f64, precip_3month: f64) -> DroughtIndicators {
    DroughtIndicators {
        vci: Some(vci),
        ndvi: Some(ndvi),
        precipitation_mm: Some(precip),
        precip_3month: Some(precip_3month),
    }
}

#[test]
fn low_vci_alone_is_severe() {
    let policy = HistoricalLabelPolicy::default();
    let label = policy
        .label(&indicators(20.0, 0.5, 100.0, 300.0))
        .expect("label");
    assert_eq!(label, DroughtLabel::Severe);
    assert_eq!(label.index(), 2);
    assert_eq!(label.category(), "Severe Drought");
}

#[test]
fn severe_tier_is_checked_before_moderate() {
    let policy = HistoricalLabelPolicy::default();

    assert_eq!(
        policy.label(&indicators(60.0, 0.26, 100.0, 300.0)),
        Ok(DroughtLabel::Severe)
    );
    assert_eq!(
        policy.label(&indicators(60.0, 0.5, 10.0, 40.0)),
        Ok(DroughtLabel::Severe)
    );
    assert_eq!(
        policy.label(&indicators(30.0, 0.5, 100.0, 300.0)),
        Ok(DroughtLabel::Moderate)
    );
    assert_eq!(
        policy.label(&indicators(45.0, 0.5, 20.0, 90.0)),
        Ok(DroughtLabel::Moderate)
    );
}

#[test]
fn thresholds_are_strict_inequalities() {
    let policy = HistoricalLabelPolicy::default();
    assert_eq!(
        policy.label(&indicators(25.0, 0.5, 100.0, 300.0)),
        Ok(DroughtLabel::Moderate)
    );
    assert_eq!(
        policy.label(&indicators(40.0, 0.35, 30.0, 100.0)),
        Ok(DroughtLabel::NoDrought)
    );
}

#[test]
fn monthly_precip_criterion_needs_both_totals_low() {
    let policy = HistoricalLabelPolicy::default();
    assert_eq!(
        policy.label(&indicators(60.0, 0.5, 5.0, 400.0)),
        Ok(DroughtLabel::NoDrought)
    );
}

#[test]
fn historical_label_and_display_risk_may_disagree() {
    let historical = HistoricalLabelPolicy::default();
    let display = DisplayRiskPolicy::default();

    let wet_but_sparse = indicators(20.0, 0.6, 100.0, 300.0);
    assert_eq!(historical.label(&wet_but_sparse), Ok(DroughtLabel::Severe));
    let risk = display.assess(&wet_but_sparse).expect("risk");
    assert_eq!(risk.score, 3);
    assert_eq!(risk.level, RiskLevel::Low);

    let borderline = indicators(40.0, 0.36, 50.0, 150.0);
    assert_eq!(historical.label(&borderline), Ok(DroughtLabel::NoDrought));
    let risk = display.assess(&borderline).expect("risk");
    assert_eq!(risk.score, 6);
    assert_eq!(risk.level, RiskLevel::Medium);
}

#[test]
fn risk_score_bands_and_levels() {
    let display = DisplayRiskPolicy::default();
    assert_eq!(display.score(&indicators(10.0, 0.2, 0.0, 10.0)), Ok(9));
    assert_eq!(display.level_for_score(9), RiskLevel::High);
    assert_eq!(display.score(&indicators(80.0, 0.6, 0.0, 400.0)), Ok(0));
    assert_eq!(display.level_for_score(0), RiskLevel::Low);
    assert_eq!(display.level_for_score(4), RiskLevel::Medium);
    assert_eq!(display.level_for_score(7), RiskLevel::High);
    assert_eq!(RiskLevel::High.as_str(), "High Risk");
}

#[test]
fn missing_fields_are_reported_not_defaulted() {
    let historical = HistoricalLabelPolicy::default();
    let display = DisplayRiskPolicy::default();

    let mut partial = indicators(20.0, 0.5, 100.0, 300.0);
    partial.precip_3month = None;
    assert_eq!(
        historical.label(&partial),
        Err(LabelError::MissingField("precip_3month"))
    );
    assert_eq!(
        display.score(&partial),
        Err(LabelError::MissingField("precip_3month"))
    );

    let mut nan_vci = indicators(20.0, 0.5, 100.0, 300.0);
    nan_vci.vci = Some(f64::NAN);
    assert_eq!(
        historical.label(&nan_vci),
        Err(LabelError::MissingField("vci"))
    );
}

#[test]
fn display_score_ignores_monthly_precipitation() {
    let display = DisplayRiskPolicy::default();
    let mut no_monthly = indicators(30.0, 0.4, 0.0, 150.0);
    no_monthly.precipitation_mm = None;
    assert_eq!(display.score(&no_monthly), Ok(7));
}
