//! Writes a side-by-side comparison of every run's reported metrics.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tabled::builder::Builder;
use tabled::settings::{object::Columns, Alignment, Modify, Style};

use bt_tuner::{ResultSet, RunResult};
use bt_types::{NumbersAlign, PublishError, PublishSettings};

/// Metrics published, in table order.
pub const METRIC_KEYS: &[&str] = &[
    "Cumulative indexing time of primary shards",
    "Min cumulative indexing time across primary shards",
    "Median cumulative indexing time across primary shards",
    "Max cumulative indexing time across primary shards",
    "Cumulative indexing throttle time of primary shards",
    "Min cumulative indexing throttle time across primary shards",
    "Median cumulative indexing throttle time across primary shards",
    "Max cumulative indexing throttle time across primary shards",
    "Cumulative merge time of primary shards",
    "Cumulative merge count of primary shards",
    "Min cumulative merge time across primary shards",
    "Median cumulative merge time across primary shards",
    "Max cumulative merge time across primary shards",
    "Cumulative merge throttle time of primary shards",
    "Min cumulative merge throttle time across primary shards",
    "Median cumulative merge throttle time across primary shards",
    "Max cumulative merge throttle time across primary shards",
    "Cumulative refresh time of primary shards",
    "Cumulative refresh count of primary shards",
    "Min cumulative refresh time across primary shards",
    "Median cumulative refresh time across primary shards",
    "Max cumulative refresh time across primary shards",
    "Cumulative flush time of primary shards",
    "Cumulative flush count of primary shards",
    "Min cumulative flush time across primary shards",
    "Median cumulative flush time across primary shards",
    "Max cumulative flush time across primary shards",
    "Total Young Gen GC time",
    "Total Young Gen GC count",
    "Total Old Gen GC time",
    "Total Old Gen GC count",
    "Store size",
    "Translog size",
    "Heap used for segments",
    "Heap used for doc values",
    "Heap used for terms",
    "Heap used for norms",
    "Heap used for points",
    "Heap used for stored fields",
    "Segment count",
    "Min Throughput",
    "Mean Throughput",
    "Median Throughput",
    "Max Throughput",
    "50th percentile latency",
    "90th percentile latency",
    "99th percentile latency",
    "99.9th percentile latency",
    "99.99th percentile latency",
    "100th percentile latency",
    "50th percentile service time",
    "90th percentile service time",
    "99th percentile service time",
    "99.9th percentile service time",
    "99.99th percentile service time",
    "100th percentile service time",
    "error rate",
    "Total time",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishFormat {
    Csv,
    Markdown,
}

impl PublishFormat {
    pub fn parse(format: &str) -> Result<Self, PublishError> {
        match format.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(PublishFormat::Csv),
            "markdown" | "md" => Ok(PublishFormat::Markdown),
            _ => Err(PublishError::UnknownFormat {
                format: format.to_string(),
            }),
        }
    }
}

/// A rendered comparison table.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    pub headers: Vec<String>,
    pub lines: Vec<Vec<String>>,
}

impl ComparisonTable {
    /// One column per run; one line per metric reported by at least one run.
    /// Task and unit come from the last run reporting the metric.
    pub fn build(results: &ResultSet, keys: &[&str]) -> Self {
        let runs: Vec<&RunResult> = results.iter().collect();

        let mut headers = vec!["Metric".to_string(), "Task".to_string()];
        headers.extend(runs.iter().map(|r| r.configuration.to_string()));
        headers.push("Unit".to_string());

        let mut lines = Vec::new();
        for key in keys {
            let Some(last) = runs.iter().rev().find_map(|r| r.metric(key)) else {
                continue;
            };
            let mut line = vec![key.to_string(), last.task.clone()];
            line.extend(
                runs.iter()
                    .map(|r| r.metric(key).map(|m| m.value.clone()).unwrap_or_default()),
            );
            line.push(last.unit.clone());
            lines.push(line);
        }

        Self { headers, lines }
    }

    pub fn to_csv(&self) -> Result<String, PublishError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let csv_error = |e: csv::Error| PublishError::Csv {
            message: e.to_string(),
        };
        writer.write_record(&self.headers).map_err(csv_error)?;
        for line in &self.lines {
            writer.write_record(line).map_err(csv_error)?;
        }
        let bytes = writer.into_inner().map_err(|e| PublishError::Csv {
            message: e.to_string(),
        })?;
        String::from_utf8(bytes).map_err(|e| PublishError::Csv {
            message: e.to_string(),
        })
    }

    /// Markdown pipe table. Run columns follow `align`; `|` in cells is escaped.
    pub fn to_markdown(&self, align: NumbersAlign) -> String {
        let escape = |cell: &String| cell.replace('|', "\\|");

        let mut builder = Builder::default();
        builder.push_record(self.headers.iter().map(escape));
        for line in &self.lines {
            builder.push_record(line.iter().map(escape));
        }

        let mut table = builder.build();
        table
            .with(Style::markdown())
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        // Metric, Task and Unit are text; the run columns hold numbers.
        let columns = self.headers.len();
        if align == NumbersAlign::Right && columns > 3 {
            table.with(Modify::new(Columns::new(2..columns - 1)).with(Alignment::right()));
        }

        let mut out = table.to_string();
        out.push('\n');
        out
    }
}

/// Appends comparison tables to a file.
#[derive(Debug, Clone)]
pub struct ResultsPublisher {
    settings: PublishSettings,
}

impl ResultsPublisher {
    pub fn new(settings: PublishSettings) -> Self {
        Self { settings }
    }

    pub fn render(&self, results: &ResultSet) -> Result<String, PublishError> {
        let table = ComparisonTable::build(results, METRIC_KEYS);
        match PublishFormat::parse(&self.settings.format)? {
            PublishFormat::Csv => table.to_csv(),
            PublishFormat::Markdown => Ok(table.to_markdown(self.settings.numbers_align)),
        }
    }

    pub fn publish(&self, results: &ResultSet) -> Result<(), PublishError> {
        let rendered = self.render(results)?;
        append(&self.settings.path, &rendered)?;
        tracing::info!(path = %self.settings.path.display(), runs = results.len(), "results published");
        Ok(())
    }
}

fn append(path: &Path, contents: &str) -> Result<(), PublishError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_tuner::{MetricRecord, RunStatus};
    use bt_types::{Configuration, StaticParams};
    use chrono::Utc;

    fn metric(name: &str, task: &str, value: &str, unit: &str) -> MetricRecord {
        MetricRecord {
            metric: name.into(),
            task: task.into(),
            value: value.into(),
            unit: unit.into(),
        }
    }

    fn result(sequence: usize, batch: u64, metrics: Vec<MetricRecord>) -> RunResult {
        let now = Utc::now();
        RunResult {
            sequence,
            configuration: Configuration::new(
                100,
                1,
                batch,
                StaticParams::new("/tmp", vec!["localhost:9200".into()]),
            ),
            status: RunStatus::Accepted,
            elapsed_secs: 1.0,
            error_rate: Some(0.0),
            metrics,
            started_at: now,
            finished_at: now,
        }
    }

    fn sample() -> ResultSet {
        let mut set = ResultSet::new();
        set.insert(result(
            0,
            10,
            vec![
                metric("Mean Throughput", "bulk", "900", "docs/s"),
                metric("error rate", "bulk", "0.00", "%"),
            ],
        ));
        set.insert(result(1, 20, vec![metric("Mean Throughput", "bulk", "1200", "docs/s")]));
        set
    }

    #[test]
    fn table_has_column_per_run() {
        let table = ComparisonTable::build(&sample(), METRIC_KEYS);
        assert_eq!(
            table.headers,
            vec![
                "Metric",
                "Task",
                "bulk size: 100, batch size: 10, number of clients: 1",
                "bulk size: 100, batch size: 20, number of clients: 1",
                "Unit",
            ]
        );
        assert_eq!(table.lines.len(), 2);
        assert_eq!(
            table.lines[0],
            vec!["Mean Throughput", "bulk", "900", "1200", "docs/s"]
        );
        // Missing values stay blank.
        assert_eq!(table.lines[1], vec!["error rate", "bulk", "0.00", "", "%"]);
    }

    #[test]
    fn csv_output() {
        let csv = ComparisonTable::build(&sample(), METRIC_KEYS).to_csv().unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Metric,Task,"));
        assert_eq!(lines.next().unwrap(), "Mean Throughput,bulk,900,1200,docs/s");
    }

    #[test]
    fn markdown_output_aligns_numbers() {
        let table = ComparisonTable::build(&sample(), METRIC_KEYS);

        let md = table.to_markdown(NumbersAlign::Right);
        let rows: Vec<&str> = md.lines().collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].starts_with("| Metric"));
        assert!(rows[1].starts_with("|-"));
        assert!(rows[2].starts_with("| Mean Throughput"));
        assert!(rows[2].contains("  900 |"));
        assert!(rows[2].ends_with("| docs/s |"));

        let md = table.to_markdown(NumbersAlign::Left);
        let rows: Vec<&str> = md.lines().collect();
        assert!(rows[2].contains("| 900  "));
        assert!(!rows[2].contains("  900 |"));
    }

    #[test]
    fn markdown_escapes_pipes() {
        let mut set = ResultSet::new();
        set.insert(result(0, 10, vec![metric("Store size", "a|b", "1.2", "GB")]));
        let md = ComparisonTable::build(&set, METRIC_KEYS).to_markdown(NumbersAlign::Right);
        let line = md.lines().nth(2).unwrap();
        assert!(line.contains("a\\|b"));
        // Metric, Task, one run and Unit: five unescaped separators.
        assert_eq!(line.replace("\\|", "").matches('|').count(), 5);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = ResultsPublisher::new(PublishSettings {
            format: "xml".into(),
            path: dir.path().join("out.xml"),
            numbers_align: NumbersAlign::Right,
        });
        assert!(matches!(
            publisher.publish(&sample()),
            Err(PublishError::UnknownFormat { .. })
        ));
    }

    #[test]
    fn publish_appends_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.csv");
        let publisher = ResultsPublisher::new(PublishSettings {
            format: "csv".into(),
            path: path.clone(),
            numbers_align: NumbersAlign::Left,
        });
        publisher.publish(&sample()).unwrap();
        publisher.publish(&sample()).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.matches("Metric,Task").count(), 2);
    }
}
