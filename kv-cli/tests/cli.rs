use assert_cmd::Command;
use predicates::prelude::*;

fn cmd(db_path: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("kvcli").unwrap();
    cmd.arg("--non-interactive").arg("--db").arg(db_path);
    cmd
}

#[test]
fn set_then_get_round_trips_through_a_piped_session() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");

    cmd(&db)
        .write_stdin("SET a 1\nGET a\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"))
        .stdout(predicate::str::contains("1"));
}

#[test]
fn data_survives_a_restart_via_log_replay() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");

    cmd(&db).write_stdin("SET a 1\nSET b 2\n").assert().success();

    cmd(&db)
        .write_stdin("GET a\nGET b\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("1"))
        .stdout(predicate::str::contains("2"));
}

#[test]
fn aborted_transaction_leaves_no_trace_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");

    cmd(&db).write_stdin("SET a 1\n").assert().success();
    cmd(&db).write_stdin("BEGIN\nSET a 2\nABORT\n").assert().success();

    cmd(&db)
        .write_stdin("GET a\n")
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));
}

#[test]
fn committed_transaction_is_durable_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");

    cmd(&db).write_stdin("BEGIN\nSET a 2\nCOMMIT\n").assert().success();

    cmd(&db)
        .write_stdin("GET a\n")
        .assert()
        .success()
        .stdout(predicate::str::diff("2\n"));
}

#[test]
fn expire_with_nonpositive_ms_deletes_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");

    cmd(&db)
        .write_stdin("SET a 1\nEXPIRE a 0\nEXISTS a\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("0"));
}

#[test]
fn range_reports_keys_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");

    cmd(&db)
        .write_stdin("SET b 1\nSET a 1\nSET c 1\nRANGE a c\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("a\nb\nc\nEND"));
}

#[test]
fn unknown_command_reports_a_protocol_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");

    cmd(&db)
        .write_stdin("BOGUS\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ERR invalid command or arguments"));
}
