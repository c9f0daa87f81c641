//! Job files run end to end against temporary directories.

use std::fs;
use std::path::{Path, PathBuf};

use batchflow::Job;
use batchflow_core::InputType;

fn write_job(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("job.toml");
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_csv_to_fixed_job() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("orders.csv"),
        "count;amount;paid\n42;99.5;yes\n7;1234.5;no\n",
    )
    .unwrap();
    let path = write_job(
        dir.path(),
        r#"
        [source]
        kind = "csv"
        path = "orders.csv"
        delimiter = ";"

        [sink]
        kind = "fixed"
        path = "out/orders.txt"

        [[sink.fields]]
        name = "count"
        type = "integer"
        layout = "%05d"

        [[sink.fields]]
        name = "amount"
        type = "decimal"
        layout = "%010.2f|no_dot"

        [[sink.fields]]
        name = "paid"
        type = "boolean"
        layout = "%s"
        "#,
    );

    let job = Job::load(&path).unwrap();
    assert_eq!(job.run().unwrap(), 2);
    assert_eq!(
        fs::read_to_string(dir.path().join("out/orders.txt")).unwrap(),
        "000420000099501\n000070001234500\n"
    );
}

#[test]
fn test_mapped_fixed_to_csv_job() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("ledger.txt"),
        "0001Ada       2025-01 1.234,56\n0002Grace     2025-02   -17,5\n",
    )
    .unwrap();
    let path = write_job(
        dir.path(),
        r#"
        [source]
        kind = "fixed"
        path = "ledger.txt"
        widths = [["code", 4], ["holder", 10], ["period", 8], ["balance", 8]]

        [[source.fields]]
        name = "code"
        type = "string"

        [[source.fields]]
        name = "holder"
        type = "string"

        [[source.fields]]
        name = "period"
        type = "datetime"
        date_format = "Y-m"

        [[source.fields]]
        name = "balance"
        type = "decimal"
        notation = "international"

        [sink]
        kind = "csv"
        path = "ledger.csv"

        [[sink.fields]]
        name = "id"
        type = "integer"
        input = "code"

        [[sink.fields]]
        name = "name"
        type = "string"
        input = "holder"
        input_type = "raw"

        [[sink.fields]]
        name = "month"
        type = "datetime"
        format = "m/Y"
        input = "period"
        input_type = "value"

        [[sink.fields]]
        name = "balance"
        type = "decimal"
        format = "%.2f"
        input_type = "value"

        [[sink.fields]]
        name = "branch"
        type = "string"
        value = "north"
        "#,
    );

    let job = Job::load(&path).unwrap();
    let summary = job.check().unwrap();
    assert!(summary.mapped);
    assert_eq!(summary.fields[0].input, "code");
    assert_eq!(summary.fields[0].input_type, InputType::Cast);
    assert_eq!(summary.fields[4].input_type, InputType::Manual);

    assert_eq!(job.run().unwrap(), 2);
    assert_eq!(
        fs::read_to_string(dir.path().join("ledger.csv")).unwrap(),
        "id,name,month,balance,branch\n1,Ada,01/2025,1234.56,north\n2,Grace,02/2025,-17.50,north\n"
    );
}

#[test]
fn test_preview_stops_after_the_limit() {
    let dir = tempfile::tempdir().unwrap();
    let rows: String = (1..=50).map(|i| format!("{}\n", i)).collect();
    fs::write(dir.path().join("ids.csv"), format!("id\n{}", rows)).unwrap();
    let path = write_job(
        dir.path(),
        r#"
        [source]
        kind = "csv"
        path = "ids.csv"

        [sink]
        kind = "csv"
        path = "never-written.csv"

        [[sink.fields]]
        name = "id"
        type = "integer"
        format = "%03d"
        "#,
    );

    let preview = Job::load(&path).unwrap().preview(3).unwrap();
    assert_eq!(preview.columns, vec!["id"]);
    assert_eq!(
        preview.rows,
        vec![vec!["001".to_string()], vec!["002".to_string()], vec!["003".to_string()]]
    );
    assert!(!dir.path().join("never-written.csv").exists());
}

#[test]
fn test_directory_listing_job() {
    let dir = tempfile::tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    fs::create_dir(&inbox).unwrap();
    fs::write(inbox.join("b.dat"), "12345").unwrap();
    fs::write(inbox.join("a.dat"), "1").unwrap();
    fs::write(inbox.join("skip.tmp"), "").unwrap();
    let path = write_job(
        dir.path(),
        r#"
        [source]
        kind = "directory"
        path = "inbox"
        pattern = "*.dat"

        [sink]
        kind = "csv"
        path = "listing.csv"
        has_header = false

        [[sink.fields]]
        name = "basename"
        type = "string"

        [[sink.fields]]
        name = "size"
        type = "integer"

        [[sink.fields]]
        name = "is_file"
        type = "boolean"
        "#,
    );

    assert_eq!(Job::load(&path).unwrap().run().unwrap(), 2);
    assert_eq!(
        fs::read_to_string(dir.path().join("listing.csv")).unwrap(),
        "a,1,1\nb,5,1\n"
    );
}

#[test]
fn test_bad_row_fails_the_job_with_the_raw_value() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("in.csv"), "id\n1\nabc\n3\n").unwrap();
    let path = write_job(
        dir.path(),
        r#"
        [source]
        kind = "csv"
        path = "in.csv"

        [sink]
        kind = "csv"
        path = "out.csv"

        [[sink.fields]]
        name = "id"
        type = "integer"
        "#,
    );

    let err = Job::load(&path).unwrap().run().unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Job failed"));
    assert!(message.contains("'abc'"));
    assert_eq!(fs::read_to_string(dir.path().join("out.csv")).unwrap(), "id\n1\n");
}

#[test]
fn test_check_reports_unknown_columns_before_io() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_job(
        dir.path(),
        r#"
        [source]
        kind = "fixed"
        path = "missing.txt"
        columns = { id = { start = 0, length = 4 } }

        [sink]
        kind = "csv"
        path = "out.csv"

        [[sink.fields]]
        name = "name"
        type = "string"
        "#,
    );

    let err = Job::load(&path).unwrap().check().unwrap_err();
    assert!(format!("{:#}", err).contains("Field 'name' has no fixed-width column"));
}

#[test]
fn test_missing_job_file_is_helpful() {
    let dir = tempfile::tempdir().unwrap();
    let err = Job::load(&dir.path().join("absent.toml")).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Job file not found"));
    assert!(message.contains("TRY:"));
}

#[test]
fn test_check_rejects_fields_missing_from_the_csv_header() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("people.csv"), "id,name\n1,Ada\n").unwrap();
    let path = write_job(
        dir.path(),
        r#"
        [source]
        kind = "csv"
        path = "people.csv"

        [sink]
        kind = "csv"
        path = "out.csv"

        [[sink.fields]]
        name = "nmae"
        type = "string"
        "#,
    );

    let job = Job::load(&path).unwrap();
    let err = job.check().unwrap_err();
    assert!(format!("{:#}", err).contains("Field 'nmae' has no CSV column"));
    assert!(job.run().is_err());
    assert!(!dir.path().join("out.csv").exists());
}
