//! End-to-end tests for the shm-bridge binary

use std::fs;
use std::process::{Child, Command as StdCommand, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use bridge_table::TableNames;
use bridge_table::segment::{self, Exclusive};
use predicates::prelude::*;
use tempfile::tempdir;

const BIN: &str = env!("CARGO_BIN_EXE_shm-bridge");

fn names(tag: &str) -> TableNames {
    TableNames::tagged(&format!("cli-{}-{tag}", std::process::id())).expect("valid names")
}

fn shm_available(names: &TableNames) -> bool {
    let scratch = format!("{}-scratch", names.segment);
    match segment::create_exclusive::<u64>(&scratch) {
        Ok(Exclusive::Created(mapping)) => {
            drop(mapping);
            let _ = segment::unlink(&scratch);
            true
        }
        Ok(Exclusive::AlreadyExists) => {
            let _ = segment::unlink(&scratch);
            true
        }
        Err(err) => {
            eprintln!("Skipping: shared memory unavailable: {err}");
            false
        }
    }
}

fn wait_all(mut children: Vec<Child>, limit: Duration) -> Vec<bool> {
    let deadline = Instant::now() + limit;
    let mut statuses = vec![None; children.len()];
    while statuses.iter().any(Option::is_none) {
        if Instant::now() > deadline {
            for child in &mut children {
                let _ = child.kill();
            }
            panic!("players did not finish within {limit:?}");
        }
        for (child, status) in children.iter_mut().zip(statuses.iter_mut()) {
            if status.is_none() {
                *status = child.try_wait().expect("try_wait");
            }
        }
        thread::sleep(Duration::from_millis(20));
    }
    statuses
        .into_iter()
        .map(|status| status.is_some_and(|s| s.success()))
        .collect()
}

#[test]
fn help_lists_table_options() {
    Command::cargo_bin("shm-bridge")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--segment"))
        .stdout(predicate::str::contains("--rehearse"))
        .stdout(predicate::str::contains("--no-group-kill"));
}

#[test]
fn rehearsal_plays_thirteen_tricks() {
    Command::cargo_bin("shm-bridge")
        .unwrap()
        .args(["--rehearse", "--seed", "7", "--no-group-kill"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Trick 13:"))
        .stdout(predicate::str::contains("North/South:"))
        .stdout(predicate::str::contains("East/West:"));
}

#[test]
fn invalid_segment_name_fails_with_status_one() {
    Command::cargo_bin("shm-bridge")
        .unwrap()
        .args(["--segment", "no-leading-slash", "--no-group-kill"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("table.segment"));
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempdir().expect("temp dir");
    let missing = dir.path().join("absent.yaml");
    Command::cargo_bin("shm-bridge")
        .unwrap()
        .arg("--config")
        .arg(&missing)
        .arg("--no-group-kill")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to read config"));
}

#[test]
fn config_file_drives_rehearsal() {
    let dir = tempdir().expect("temp dir");
    let config = dir.path().join("bridge.yaml");
    fs::write(&config, "deal:\n  seed: 99\n  shuffle_passes: 3\n").expect("write config");

    let first = Command::cargo_bin("shm-bridge")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["--rehearse", "--no-group-kill"])
        .output()
        .expect("run");
    let second = Command::cargo_bin("shm-bridge")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["--rehearse", "--no-group-kill"])
        .output()
        .expect("run");
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout, "seeded deal must replay");
}

#[test]
fn four_processes_share_one_table() {
    let names = names("four");
    if !shm_available(&names) {
        return;
    }
    let dir = tempdir().expect("temp dir");

    let children: Vec<Child> = (0..4)
        .map(|i| {
            StdCommand::new(BIN)
                .args(["--segment", names.segment.as_str()])
                .args(["--semaphore", names.semaphore.as_str()])
                .args(["--seed", "2024", "--no-group-kill"])
                .arg("--report")
                .arg(dir.path().join(format!("player-{i}.json")))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .expect("spawn player")
        })
        .collect();

    let finished = wait_all(children, Duration::from_secs(60));
    assert!(finished.iter().all(|ok| *ok), "exit statuses: {finished:?}");

    let mut seats = Vec::new();
    let mut destroyed = 0;
    for i in 0..4 {
        let raw = fs::read_to_string(dir.path().join(format!("player-{i}.json"))).expect("report");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("report json");
        assert_eq!(value["tricks"].as_array().map(Vec::len), Some(13));
        if value["departure"] == "destroyed" {
            destroyed += 1;
        }
        seats.push(value["seat"].as_str().expect("seat").to_string());
    }
    seats.sort();
    assert_eq!(seats, ["East", "North", "South", "West"]);
    assert_eq!(destroyed, 1);
    assert!(segment::open_existing::<u64>(&names.segment).is_err());
}
