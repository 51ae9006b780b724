use chrono::NaiveDate;
use ridership_forecast::error::ForecastError;
use ridership_math::MathError;
use std::io;
use std::path::PathBuf;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    match ForecastError::from(io_error) {
        ForecastError::IoError(_) => {}
        other => panic!("Expected IoError variant, got {:?}", other),
    }

    let parse_error = NaiveDate::parse_from_str("not a date", "%Y-%m-%d").unwrap_err();
    match ForecastError::from(parse_error) {
        ForecastError::DateParse(_) => {}
        other => panic!("Expected DateParse variant, got {:?}", other),
    }

    match ForecastError::from(MathError::Singular) {
        ForecastError::MathError(MathError::Singular) => {}
        other => panic!("Expected MathError variant, got {:?}", other),
    }

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(
        ForecastError::from(json_error),
        ForecastError::JsonError(_)
    ));
}

#[test]
fn test_error_display() {
    let error = ForecastError::MalformedRow {
        line: 12,
        reason: "missing trip id".to_string(),
    };
    assert_eq!(error.to_string(), "Malformed row at line 12: missing trip id");

    let error = ForecastError::InsufficientData { needed: 104, got: 80 };
    assert_eq!(
        error.to_string(),
        "Insufficient observations: need at least 104, got 80"
    );

    let error = ForecastError::ModelNotFound(PathBuf::from("weekly_arima.json"));
    assert!(error.to_string().contains("weekly_arima.json"));

    let error = ForecastError::DateOutOfRange {
        date: NaiveDate::from_ymd_opt(2014, 6, 1).unwrap(),
        first_week: NaiveDate::from_ymd_opt(2015, 1, 4).unwrap(),
    };
    assert_eq!(
        error.to_string(),
        "Date 2014-06-01 is before the first modelled week ending 2015-01-04"
    );

    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
    let error_string = ForecastError::from(io_error).to_string();
    assert!(error_string.contains("IO error"));
    assert!(error_string.contains("permission denied"));
}

#[test]
fn test_missing_values_message() {
    let error = ForecastError::MissingValues { count: 3 };
    assert!(error.to_string().starts_with("Series has 3 missing values"));
}
