use super::{FeatureVector, ScoringEngine, FEATURE_COLUMNS, FEATURE_COUNT};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::Path;

/// Table-level batch failures. Row-level failures never abort the batch;
/// they are reported in the [`BatchReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("failed to read batch table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid batch CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("batch table is missing required columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },
}

/// One input row scored successfully, with its original cells preserved
/// for passthrough into the output table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub row_number: usize,
    pub cells: Vec<String>,
    pub predicted_cluster: usize,
    pub confidence: f64,
}

/// One input row that failed numeric parsing or validation. `row_number`
/// is 1-based over the data rows, matching the input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row_number: usize,
    pub reason: String,
}

/// Outcome of a batch run: input headers, scored rows in input order, and
/// the rows that failed.
#[derive(Debug)]
pub struct BatchReport {
    pub headers: Vec<String>,
    pub rows: Vec<ScoredRow>,
    pub failures: Vec<RowError>,
}

impl BatchReport {
    /// Writes the augmented table: every input column passed through, plus
    /// `Predicted_Cluster` and `Confidence` (2 decimal places). Failed rows
    /// are excluded.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), BatchError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = self.headers.clone();
        header.push(super::PREDICTED_CLUSTER_COLUMN.to_string());
        header.push(super::CONFIDENCE_COLUMN.to_string());
        csv_writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = row.cells.clone();
            record.push(row.predicted_cluster.to_string());
            record.push(format!("{:.2}", row.confidence));
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, BatchError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Applies the scoring pipeline to every row of a CSV table. Rows are
/// independent; output order matches input order. Nothing is logged.
pub struct BatchScorer<'a> {
    engine: &'a ScoringEngine,
}

impl<'a> BatchScorer<'a> {
    pub fn new(engine: &'a ScoringEngine) -> Self {
        Self { engine }
    }

    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<BatchReport, BatchError> {
        let file = std::fs::File::open(path)?;
        self.from_reader(file)
    }

    pub fn from_reader<R: Read>(&self, reader: R) -> Result<BatchReport, BatchError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

        let missing: Vec<String> = FEATURE_COLUMNS
            .iter()
            .filter(|column| !headers.iter().any(|header| header == *column))
            .map(|column| column.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(BatchError::MissingColumns { missing });
        }

        let mut positions = [0usize; FEATURE_COUNT];
        for (slot, column) in positions.iter_mut().zip(FEATURE_COLUMNS.iter()) {
            // Presence was checked above.
            if let Some(index) = headers.iter().position(|header| header == column) {
                *slot = index;
            }
        }

        let mut rows = Vec::new();
        let mut failures = Vec::new();

        for (offset, result) in csv_reader.records().enumerate() {
            let row_number = offset + 1;
            let record = match result {
                Ok(record) => record,
                Err(error) => {
                    failures.push(RowError {
                        row_number,
                        reason: format!("malformed row: {error}"),
                    });
                    continue;
                }
            };

            match parse_features(&record, &positions) {
                Ok(features) => match self.engine.score(&features) {
                    Ok(prediction) => rows.push(ScoredRow {
                        row_number,
                        cells: record.iter().map(str::to_string).collect(),
                        predicted_cluster: prediction.segment_id(),
                        confidence: prediction.rounded_confidence(),
                    }),
                    Err(error) => failures.push(RowError {
                        row_number,
                        reason: error.to_string(),
                    }),
                },
                Err(reason) => failures.push(RowError { row_number, reason }),
            }
        }

        Ok(BatchReport {
            headers,
            rows,
            failures,
        })
    }
}

fn parse_features(
    record: &csv::StringRecord,
    positions: &[usize; FEATURE_COUNT],
) -> Result<FeatureVector, String> {
    let floats = [
        parse_float(record, positions[0], FEATURE_COLUMNS[0])?,
        parse_float(record, positions[1], FEATURE_COLUMNS[1])?,
        parse_float(record, positions[3], FEATURE_COLUMNS[3])?,
    ];
    let integers = [
        parse_integer(record, positions[2], FEATURE_COLUMNS[2])?,
        parse_integer(record, positions[4], FEATURE_COLUMNS[4])?,
        parse_integer(record, positions[5], FEATURE_COLUMNS[5])?,
    ];

    Ok(FeatureVector {
        monthly_revenue: floats[0],
        total_revenue: floats[1],
        tenure_months: integers[0],
        avg_monthly_usage: floats[2],
        support_tickets: integers[1],
        last_active_days: integers[2],
    })
}

fn cell<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    column: &'static str,
) -> Result<&'r str, String> {
    record
        .get(index)
        .ok_or_else(|| format!("row is missing a value for {column}"))
}

fn parse_float(
    record: &csv::StringRecord,
    index: usize,
    column: &'static str,
) -> Result<f64, String> {
    let raw = cell(record, index, column)?;
    raw.parse::<f64>()
        .map_err(|_| format!("{column} value '{raw}' is not numeric"))
}

fn parse_integer(
    record: &csv::StringRecord,
    index: usize,
    column: &'static str,
) -> Result<u32, String> {
    let raw = cell(record, index, column)?;
    let value = raw
        .parse::<f64>()
        .map_err(|_| format!("{column} value '{raw}' is not numeric"))?;

    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(format!(
            "{column} value '{raw}' is not a non-negative whole number"
        ));
    }

    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelArtifacts;
    use std::io::Cursor;

    fn engine() -> ScoringEngine {
        ScoringEngine::new(ModelArtifacts::standard()).expect("engine builds")
    }

    const HEADER: &str = "Monthly_Revenue,Total_Revenue,Tenure_Months,Avg_Monthly_Usage,Support_Tickets,Last_Active_Days";

    #[test]
    fn missing_columns_fail_before_any_row_is_processed() {
        let engine = engine();
        let scorer = BatchScorer::new(&engine);
        let csv = "Monthly_Revenue,Total_Revenue,Tenure_Months,Avg_Monthly_Usage,Last_Active_Days\n\
                   100.0,1000.0,12,5.0,30\n";

        let error = scorer
            .from_reader(Cursor::new(csv))
            .expect_err("missing column must fail");
        match error {
            BatchError::MissingColumns { missing } => {
                assert_eq!(missing, vec!["Support_Tickets".to_string()]);
            }
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn extra_columns_pass_through_unchanged() {
        let engine = engine();
        let scorer = BatchScorer::new(&engine);
        let csv = format!("Customer_Id,{HEADER}\nc-001,100.0,1000.0,12,5.0,1,30\n");

        let report = scorer.from_reader(Cursor::new(csv)).expect("batch runs");
        assert_eq!(report.rows.len(), 1);
        assert!(report.failures.is_empty());
        assert_eq!(report.rows[0].cells[0], "c-001");

        let output = report.to_csv_string().expect("renders csv");
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some(format!("Customer_Id,{HEADER},Predicted_Cluster,Confidence").as_str())
        );
        let data = lines.next().expect("data row");
        assert!(data.starts_with("c-001,100.0,1000.0,12,5.0,1,30,"));
    }

    #[test]
    fn bad_rows_fail_alone_and_are_reported() {
        let engine = engine();
        let scorer = BatchScorer::new(&engine);
        let csv = format!(
            "{HEADER}\n100.0,1000.0,12,5.0,1,30\nnot-a-number,1000.0,12,5.0,1,30\n200.0,2000.0,6.5,4.0,0,12\n300.0,3000.0,3,2.0,0,45\n"
        );

        let report = scorer.from_reader(Cursor::new(csv)).expect("batch runs");
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].row_number, 1);
        assert_eq!(report.rows[1].row_number, 4);

        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].row_number, 2);
        assert!(report.failures[0].reason.contains("Monthly_Revenue"));
        assert_eq!(report.failures[1].row_number, 3);
        assert!(report.failures[1].reason.contains("Tenure_Months"));
    }

    #[test]
    fn confidence_column_uses_two_decimal_places() {
        let engine = engine();
        let scorer = BatchScorer::new(&engine);
        let csv = format!("{HEADER}\n2350.50,18890.00,26,15.4,1,10\n");

        let report = scorer.from_reader(Cursor::new(csv)).expect("batch runs");
        let output = report.to_csv_string().expect("renders csv");
        let confidence = output
            .lines()
            .nth(1)
            .and_then(|line| line.rsplit(',').next())
            .expect("confidence cell");
        let decimals = confidence.rsplit('.').next().expect("decimal part");
        assert_eq!(decimals.len(), 2, "confidence was '{confidence}'");
    }

    #[test]
    fn from_path_propagates_io_errors() {
        let engine = engine();
        let scorer = BatchScorer::new(&engine);
        assert!(matches!(
            scorer.from_path("./does-not-exist.csv"),
            Err(BatchError::Io(_))
        ));
    }
}
