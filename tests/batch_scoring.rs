use segment_ai::model::ModelArtifacts;
use segment_ai::scoring::{BatchError, BatchScorer, ScoringEngine};
use std::io::Cursor;

const HEADER: &str =
    "Monthly_Revenue,Total_Revenue,Tenure_Months,Avg_Monthly_Usage,Support_Tickets,Last_Active_Days";

fn engine() -> ScoringEngine {
    ScoringEngine::new(ModelArtifacts::standard()).expect("engine builds")
}

#[test]
fn missing_columns_are_enumerated_in_canonical_order() {
    let engine = engine();
    let scorer = BatchScorer::new(&engine);
    let csv = "Total_Revenue,Avg_Monthly_Usage,Last_Active_Days\n1000.0,5.0,30\n";

    let error = scorer
        .from_reader(Cursor::new(csv))
        .expect_err("validation fails");
    match error {
        BatchError::MissingColumns { missing } => {
            assert_eq!(
                missing,
                vec![
                    "Monthly_Revenue".to_string(),
                    "Tenure_Months".to_string(),
                    "Support_Tickets".to_string(),
                ]
            );
        }
        other => panic!("expected missing columns, got {other:?}"),
    }
}

#[test]
fn output_preserves_input_row_order() {
    let engine = engine();
    let scorer = BatchScorer::new(&engine);
    let csv = format!(
        "Row_Tag,{HEADER}\n\
         first,2350.50,18890.00,26,15.4,1,10\n\
         second,120.0,800.0,3,2.1,0,45\n\
         third,5000.0,90000.0,48,30.0,2,2\n"
    );

    let report = scorer.from_reader(Cursor::new(csv)).expect("batch runs");
    assert!(report.failures.is_empty());

    let tags: Vec<&str> = report.rows.iter().map(|row| row.cells[0].as_str()).collect();
    assert_eq!(tags, vec!["first", "second", "third"]);

    let output = report.to_csv_string().expect("renders csv");
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("first,"));
    assert!(lines[2].starts_with("second,"));
    assert!(lines[3].starts_with("third,"));
}

#[test]
fn rows_are_scored_independently_of_their_neighbors() {
    let engine = engine();
    let scorer = BatchScorer::new(&engine);
    let lone = format!("{HEADER}\n120.0,800.0,3,2.1,0,45\n");
    let crowded = format!(
        "{HEADER}\n2350.50,18890.00,26,15.4,1,10\n120.0,800.0,3,2.1,0,45\nbroken,800.0,3,2.1,0,45\n"
    );

    let lone_report = scorer.from_reader(Cursor::new(lone)).expect("batch runs");
    let crowded_report = scorer
        .from_reader(Cursor::new(crowded))
        .expect("batch runs");

    let lone_row = &lone_report.rows[0];
    let same_row = crowded_report
        .rows
        .iter()
        .find(|row| row.cells[0] == "120.0")
        .expect("row present");

    assert_eq!(lone_row.predicted_cluster, same_row.predicted_cluster);
    assert_eq!(lone_row.confidence, same_row.confidence);
}

#[test]
fn batch_runs_from_a_file_on_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("customers.csv");
    std::fs::write(
        &input,
        format!("{HEADER}\n2350.50,18890.00,26,15.4,1,10\n"),
    )
    .expect("write input");

    let engine = engine();
    let scorer = BatchScorer::new(&engine);
    let report = scorer.from_path(&input).expect("batch runs");
    assert_eq!(report.rows.len(), 1);

    let output = dir.path().join("scored.csv");
    let file = std::fs::File::create(&output).expect("create output");
    report.write_csv(file).expect("write output");

    let written = std::fs::read_to_string(&output).expect("output readable");
    assert!(written
        .lines()
        .next()
        .expect("header row")
        .ends_with("Predicted_Cluster,Confidence"));
}
