mod common;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::str::contains;
use rusqlite::Connection;
use tabular_load::profile::WidthProfile;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("tabular-load").expect("binary exists");
    cmd.env("RUST_LOG", "tabular_load=info");
    cmd
}

fn sample(ws: &TestWorkspace) {
    ws.write(
        "in/a.csv",
        "id,Name,Join Date\n1,Ann,2024-01-05\n2,Bob,01/15/2024\n",
    );
    ws.write("in/b.csv", "id,Name,Region\n3,Cy,North\n");
}

#[test]
fn load_writes_unioned_rows_into_sqlite() {
    let ws = TestWorkspace::new();
    sample(&ws);
    let db = ws.path().join("out.db");
    bin()
        .args(["load", "-d"])
        .arg(ws.path().join("in"))
        .arg("--database")
        .arg(&db)
        .args(["--table", "people", "--chunk-size", "1"])
        .assert()
        .success()
        .stderr(contains("Committed chunk 3"));

    let conn = Connection::open(&db).unwrap();
    let mut stmt = conn
        .prepare("SELECT id, name, join_date, region FROM people ORDER BY rowid")
        .unwrap();
    let rows: Vec<(String, String, Option<String>, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].2.as_deref(), Some("2024-01-15 00:00:00"));
    assert_eq!(rows[2].2, None);
    assert_eq!(rows[2].3.as_deref(), Some("North"));
}

#[test]
fn load_refuses_existing_table_in_fail_mode() {
    let ws = TestWorkspace::new();
    sample(&ws);
    let db = ws.path().join("out.db");
    for expect_ok in [true, false] {
        let assert = bin()
            .args(["load", "-d"])
            .arg(ws.path().join("in"))
            .arg("--database")
            .arg(&db)
            .args(["--table", "people", "--retry-delay-ms", "0"])
            .assert();
        if expect_ok {
            assert.success();
        } else {
            assert.failure().stderr(contains("already exists"));
        }
    }

    bin()
        .args(["load", "-d"])
        .arg(ws.path().join("in"))
        .arg("--database")
        .arg(&db)
        .args(["--table", "people", "--mode", "append"])
        .assert()
        .success();
    let conn = Connection::open(&db).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 6);
}

#[test]
fn raise_policy_fails_with_remediation() {
    let ws = TestWorkspace::new();
    let input = ws.write("o.csv", "order_dt\n2024-01-05\nsoon\n");
    bin()
        .args(["load", "--dry-run", "--date-policy", "raise", "-i"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("'soon'"))
        .stderr(contains("coerce"));

    bin()
        .args(["load", "--dry-run", "--date-policy", "coerce", "-i"])
        .arg(&input)
        .assert()
        .success();
}

#[test]
fn profile_prints_plan_and_writes_json() {
    let ws = TestWorkspace::new();
    sample(&ws);
    let output = ws.path().join("profile.json");
    bin()
        .args(["profile", "-d"])
        .arg(ws.path().join("in"))
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(contains("join_date"))
        .stdout(contains("timestamp"))
        .stdout(contains("varchar(5)"));

    let profile: WidthProfile =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(profile.width("name"), Some(3));
    assert_eq!(profile.width("region"), Some(5));
}

#[test]
fn run_file_supplies_inputs_and_destination() {
    let ws = TestWorkspace::new();
    sample(&ws);
    let config = ws.write(
        "run.yaml",
        "dirs: [in]\ndatabase: out.db\ntable: from_yaml\nchunk_size: 2\n",
    );
    bin()
        .args(["load", "--config"])
        .arg(&config)
        .assert()
        .success();
    let conn = Connection::open(ws.path().join("out.db")).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM from_yaml", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn missing_inputs_are_reported() {
    let ws = TestWorkspace::new();
    bin()
        .args(["profile", "-d"])
        .arg(ws.path().join("nowhere"))
        .assert()
        .failure()
        .stderr(contains("nowhere"));
}
