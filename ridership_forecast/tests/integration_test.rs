use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ridership_forecast::config::PipelineConfig;
use ridership_forecast::inference::WeeklyForecaster;
use ridership_forecast::pipeline::run;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const HEADER: &str = "Trip id,Starttime,Stoptime,Bikeid,Tripduration,From station id,From station name,To station id,To station name,Usertype";

struct Written {
    path: PathBuf,
    failed: usize,
}

/// Write a quarterly-style trip file covering `from..to`
fn write_trips(dir: &Path, name: &str, from: NaiveDate, to: NaiveDate, first_id: &mut u64) -> Written {
    let path = dir.join(name);
    let mut out = BufWriter::new(File::create(&path).unwrap());
    writeln!(out, "{}", HEADER).unwrap();

    let mut rng = StdRng::seed_from_u64(first_id.to_owned());
    let mut failed = 0;
    let mut day = from;
    while day < to {
        let season = (2.0 * std::f64::consts::PI * day.ordinal() as f64 / 365.0).sin();
        let rides = (12.0 + 6.0 * season).round() as u32 + rng.gen_range(0..4);
        for k in 0..rides {
            *first_id += 1;
            let (to_station, duration) = if k == 0 && day.day() % 10 == 0 {
                failed += 1;
                (1001, 45)
            } else {
                (1002 + k % 5, 300 + 10 * k)
            };
            writeln!(
                out,
                "{},{} 8:{:02},{} 9:{:02},{},{},1001,Penn Ave,{},Elsewhere,Subscriber",
                first_id,
                day.format("%-m/%-d/%Y"),
                k % 60,
                day.format("%-m/%-d/%Y"),
                k % 60,
                70000 + k,
                duration,
                to_station
            )
            .unwrap();
        }
        day += Duration::days(1);
    }
    // one row with an unreadable start time
    writeln!(out, "0,soon,{} 9:00,1,300,1001,Penn Ave,1002,Elsewhere,Customer", from.format("%-m/%-d/%Y")).unwrap();
    out.flush().unwrap();

    Written { path, failed }
}

#[test]
fn test_full_pipeline() {
    let dir = tempdir().unwrap();
    let mut next_id = 1;
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    let first = write_trips(dir.path(), "trips_2015_2016H1.csv", date(2015, 1, 1), date(2016, 7, 1), &mut next_id);
    let second = write_trips(dir.path(), "trips_2016H2_2017.csv", date(2016, 7, 1), date(2017, 8, 1), &mut next_id);

    let config = PipelineConfig {
        input_files: vec![first.path.clone(), second.path.clone()],
        model_path: dir.path().join("out").join("weekly_arima.json"),
        export_dir: Some(dir.path().join("exports")),
        ..Default::default()
    };

    let report = run(&config).unwrap();

    assert_eq!(report.ingest.files, 2);
    assert_eq!(report.ingest.rows_skipped, 2);
    assert_eq!(report.ingest.duplicates, 0);
    assert_eq!(report.failed_rides_removed, first.failed + second.failed);

    // 4 Jan 2015 .. 6 Aug 2017
    assert_eq!(report.weeks, 136);
    assert_eq!(report.missing_weeks, 0);
    assert_eq!(report.days, 943);
    assert!(report.diagnostics.is_some());
    assert_eq!(report.validation.train_weeks, 104);
    assert_eq!(report.validation.held_out.len(), 32);
    assert_eq!(
        report.validation.held_out[0].week_ending,
        date(2017, 1, 1)
    );
    assert!(report.validation.accuracy.mae.is_finite());
    assert!(report.validation.coverage > 0.5);
    assert_eq!(report.full_fit.params.names().len(), 5);

    for file in [
        "daily_counts.csv",
        "weekly_means.csv",
        "in_sample_predictions.csv",
        "validation_predictions.csv",
    ] {
        assert!(dir.path().join("exports").join(file).exists(), "{}", file);
    }

    let forecaster = WeeklyForecaster::from_file(&config.model_path).unwrap();
    let a = forecaster.forecast("Jan 3, 2017").unwrap();
    let b = forecaster.forecast("Jan 4, 2017").unwrap();
    assert_eq!(a, b);
    assert!(a > 0.0);
}

#[test]
fn test_pipeline_fits_across_a_missing_week() {
    let dir = tempdir().unwrap();
    let mut next_id = 1;
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    // nothing rides Mon 7 Mar .. Sun 13 Mar 2016
    let first = write_trips(dir.path(), "before_gap.csv", date(2015, 1, 1), date(2016, 3, 7), &mut next_id);
    let second = write_trips(dir.path(), "after_gap.csv", date(2016, 3, 14), date(2017, 8, 1), &mut next_id);

    let config = PipelineConfig {
        input_files: vec![first.path, second.path],
        model_path: dir.path().join("weekly_arima.json"),
        export_dir: Some(dir.path().join("exports")),
        ..Default::default()
    };

    let report = run(&config).unwrap();

    assert_eq!(report.weeks, 136);
    assert_eq!(report.missing_weeks, 1);
    assert_eq!(report.days, 936);
    assert!(report.diagnostics.is_none());
    assert!(report.full_fit.log_likelihood.is_finite());
    assert_eq!(report.validation.train_weeks, 104);
    assert!(config.model_path.exists());

    let forecaster = WeeklyForecaster::from_file(&config.model_path).unwrap();
    let gap = forecaster.forecast("2016-03-10").unwrap();
    assert!(gap.is_finite() && gap > 0.0);
    assert_eq!(forecaster.model().series().values()[62], None);
}
