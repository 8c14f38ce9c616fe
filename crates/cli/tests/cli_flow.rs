use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn imgfind(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("imgfind").expect("binary");
    cmd.current_dir(workdir)
        .env("IMGFIND_PROVIDER", "stub")
        .env_remove("RUST_LOG");
    cmd
}

fn run_json(workdir: &Path, args: &[&str]) -> Value {
    let output = imgfind(workdir).args(args).output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn setup_images() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let images = temp.path().join("downloaded_images");
    fs::create_dir_all(&images).unwrap();
    fs::write(images.join("beach_day.jpg"), b"beach").unwrap();
    fs::write(images.join("city-night.jpg"), b"city").unwrap();
    fs::write(images.join("old_barn.jpg"), b"barn").unwrap();
    fs::write(images.join("notes.txt"), b"not an image").unwrap();
    temp
}

#[test]
fn ingest_then_search_finds_matching_image() {
    let temp = setup_images();
    let root = temp.path();

    let stats = run_json(root, &["--dimension", "16", "ingest", "--json"]);
    assert_eq!(stats["scanned"], 3);
    assert_eq!(stats["added"], 3);
    assert_eq!(stats["failed"], 0);
    assert!(root.join(".imgfind/index.bin").exists());
    assert!(root.join(".imgfind/records.json").exists());

    let results = run_json(root, &["--dimension", "16", "search", "city", "--json"]);
    let results = results.as_array().expect("array");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["image_id"], "city-night.jpg");
    assert_eq!(results[0]["caption"], "city night");

    let limited = run_json(
        root,
        &["--dimension", "16", "search", "city", "--top-n", "1", "--json"],
    );
    assert_eq!(limited.as_array().expect("array").len(), 1);
}

#[test]
fn second_ingest_skips_known_images() {
    let temp = setup_images();
    let root = temp.path();

    run_json(root, &["--dimension", "16", "ingest", "--json"]);
    let again = run_json(root, &["--dimension", "16", "ingest", "--json"]);
    assert_eq!(again["added"], 0);
    assert_eq!(again["already_indexed"], 3);

    let info = run_json(root, &["--dimension", "16", "info", "--json"]);
    assert_eq!(info["exists"], true);
    assert_eq!(info["status"], "present");
    assert_eq!(info["records"], 3);
    assert_eq!(info["captioned"], 3);
    assert_eq!(info["dimension"], 16);
}

#[test]
fn config_file_supplies_folder_and_limit() {
    let temp = setup_images();
    let root = temp.path();
    fs::rename(root.join("downloaded_images"), root.join("pics")).unwrap();
    fs::write(
        root.join("imgfind.toml"),
        "[image]\nfolder = \"pics\"\nlimit = 2\n\n[index]\ndimension = 8\nsnapshot_dir = \"store\"\n",
    )
    .unwrap();

    let stats = run_json(root, &["ingest", "--json"]);
    assert_eq!(stats["added"], 2);
    assert!(root.join("store/index.bin").exists());
}

#[test]
fn info_without_snapshot_reports_missing() {
    let temp = tempdir().unwrap();
    let info = run_json(temp.path(), &["info", "--json"]);
    assert_eq!(info["exists"], false);
    assert_eq!(info["status"], "missing");
    assert_eq!(info["records"], 0);
}

#[test]
fn search_without_snapshot_fails() {
    let temp = tempdir().unwrap();
    imgfind(temp.path())
        .args(["search", "anything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("imgfind ingest"));
}

#[test]
fn blank_query_is_rejected() {
    let temp = setup_images();
    let root = temp.path();
    run_json(root, &["--dimension", "16", "ingest", "--json"]);

    imgfind(root)
        .args(["--dimension", "16", "search", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Empty query"));
}

#[test]
fn corrupted_snapshot_is_reported() {
    let temp = setup_images();
    let root = temp.path();
    run_json(root, &["--dimension", "16", "ingest", "--json"]);

    let index = root.join(".imgfind/index.bin");
    let mut bytes = fs::read(&index).unwrap();
    bytes[24] ^= 0xFF;
    fs::write(&index, bytes).unwrap();

    imgfind(root)
        .args(["--dimension", "16", "search", "city"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Corrupt snapshot"));
}

#[test]
fn dimension_mismatch_is_reported() {
    let temp = setup_images();
    let root = temp.path();
    run_json(root, &["--dimension", "16", "ingest", "--json"]);

    imgfind(root)
        .args(["--dimension", "8", "search", "city"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Snapshot dimension is 16"));
}

#[test]
fn half_present_snapshot_is_never_overwritten() {
    let temp = setup_images();
    let root = temp.path();
    run_json(root, &["--dimension", "16", "ingest", "--json"]);

    let index = root.join(".imgfind/index.bin");
    let index_before = fs::read(&index).unwrap();
    fs::remove_file(root.join(".imgfind/records.json")).unwrap();
    fs::remove_file(root.join("downloaded_images/beach_day.jpg")).unwrap();

    imgfind(root)
        .args(["--dimension", "16", "ingest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Corrupt snapshot"));
    assert_eq!(fs::read(&index).unwrap(), index_before);
    assert!(!root.join(".imgfind/records.json").exists());

    imgfind(root)
        .args(["--dimension", "16", "search", "city"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Corrupt snapshot"));

    let info = run_json(root, &["--dimension", "16", "info", "--json"]);
    assert_eq!(info["status"], "corrupt");
    assert_eq!(info["exists"], false);
    assert!(info["error"]
        .as_str()
        .expect("error text")
        .contains("records.json"));
}
