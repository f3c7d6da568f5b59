//! Parsing of the benchmark tool's CSV summary report.

use csv::ReaderBuilder;

use bt_tuner::MetricRecord;
use bt_types::BenchmarkError;

/// Metric carrying the share of failed requests.
pub const ERROR_RATE_METRIC: &str = "error rate";

/// Parse a `Metric,Task,Value,Unit` report. Rows with fewer than three
/// fields are skipped.
pub fn parse_report(raw: &str) -> Result<Vec<MetricRecord>, BenchmarkError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let mut metrics = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| BenchmarkError::Results {
            message: e.to_string(),
        })?;
        if record.len() < 3 {
            continue;
        }
        metrics.push(MetricRecord {
            metric: record[0].to_string(),
            task: record[1].to_string(),
            value: record[2].to_string(),
            unit: record.get(3).unwrap_or_default().to_string(),
        });
    }
    Ok(metrics)
}

/// Highest error rate reported across tasks; zero when none is reported.
pub fn error_rate(metrics: &[MetricRecord]) -> Result<f64, BenchmarkError> {
    let mut worst: Option<f64> = None;
    for metric in metrics.iter().filter(|m| m.metric == ERROR_RATE_METRIC) {
        let value: f64 = metric.value.parse().map_err(|_| BenchmarkError::Results {
            message: format!("error rate '{}' is not a number", metric.value),
        })?;
        worst = Some(worst.map_or(value, |w| w.max(value)));
    }
    Ok(worst.unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Metric,Task,Value,Unit
Cumulative indexing time of primary shards,,1.234,min
Min Throughput,bulk,812.5,docs/s
Mean Throughput,bulk,901.2,docs/s
50th percentile latency,bulk,120.4,ms
error rate,bulk,0.25,%
error rate,warmup,1.50,%
";

    #[test]
    fn parses_all_rows() {
        let metrics = parse_report(REPORT).unwrap();
        assert_eq!(metrics.len(), 6);
        assert_eq!(metrics[0].task, "");
        assert_eq!(metrics[1].metric, "Min Throughput");
        assert_eq!(metrics[1].value, "812.5");
        assert_eq!(metrics[1].unit, "docs/s");
    }

    #[test]
    fn error_rate_is_worst_task() {
        let metrics = parse_report(REPORT).unwrap();
        assert_eq!(error_rate(&metrics).unwrap(), 1.5);
    }

    #[test]
    fn missing_error_rate_defaults_to_zero() {
        let metrics = parse_report("Metric,Task,Value,Unit\nStore size,,1.2,GB\n").unwrap();
        assert_eq!(error_rate(&metrics).unwrap(), 0.0);
    }

    #[test]
    fn short_rows_are_skipped() {
        let metrics = parse_report("Metric,Task,Value,Unit\n\nsomething\nerror rate,bulk,0,%\n").unwrap();
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn non_numeric_error_rate_is_an_error() {
        let metrics = parse_report("Metric,Task,Value,Unit\nerror rate,bulk,n/a,%\n").unwrap();
        assert!(matches!(
            error_rate(&metrics),
            Err(BenchmarkError::Results { .. })
        ));
    }
}
