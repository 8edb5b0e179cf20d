use agdrought::{
    init_logging, log_app_start, logging_config_from_env, pipeline_config_from_env, run_pipeline,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("drought_pipeline", &logging_cfg);

    let cfg = pipeline_config_from_env();
    let processed = run_pipeline(&cfg)?;
    let summary = &processed.summary;

    println!(
        "Processed {} months ({} to {}) -> {}",
        summary.total_months,
        summary.first_period.as_deref().unwrap_or("-"),
        summary.last_period.as_deref().unwrap_or("-"),
        cfg.output_path.display()
    );

    println!("\nDrought distribution:");
    for share in &summary.distribution {
        println!(
            "  {:<17} {:>4} months ({:.1}%)",
            share.category, share.months, share.percent
        );
    }

    println!("\nDrought by season (% of season months):");
    println!(
        "  {:<13} {:>10} {:>10} {:>10}",
        "season", "none", "moderate", "severe"
    );
    for season in &summary.by_season {
        println!(
            "  {:<13} {:>10.1} {:>10.1} {:>10.1}",
            season.season.as_str(),
            season.label_percent[0],
            season.label_percent[1],
            season.label_percent[2]
        );
    }

    let report = &processed.report;
    if report.degenerate_vci {
        println!("\nNDVI range was degenerate; VCI fixed for every month.");
    }
    if !report.zero_mean_precip_months.is_empty() {
        println!(
            "Calendar months with zero mean precipitation (anomaly set to 0): {:?}",
            report.zero_mean_precip_months
        );
    }
    for fill in &report.temperature_fills {
        if fill.filled > 0 {
            println!(
                "Backfilled {} missing {} values with median {:.2}",
                fill.filled,
                fill.field,
                fill.median.unwrap_or_default()
            );
        }
    }

    Ok(())
}
