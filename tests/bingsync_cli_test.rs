use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const IMAGE_BYTES: usize = 60_000;

fn bingsync(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bingsync");
    cmd.current_dir(home)
        .env("BINGSYNC_HOME", home)
        .env("BINGSYNC_CONFIG_PATH", home.join("absent-config.toml"))
        .env("BINGSYNC_LOG", "warn")
        .env_remove("BINGSYNC_WALLPAPER_DIR")
        .env_remove("BINGSYNC_STATE_FILE")
        .env_remove("BINGSYNC_CATALOG_FILE")
        .env_remove("BINGSYNC_LOGS_DIR");
    cmd
}

fn write_catalog(home: &Path) {
    fs::write(
        home.join("image_dates.csv"),
        "date,month_key,item_id,filename\n\
         2025-01-01,202501,A,202501_A.jpg\n\
         2025-01-02,202501,B,202501_B.jpg\n\
         2025-01-03,202501,C,202501_C.jpg\n",
    )
    .expect("write catalog");
}

fn write_image(home: &Path, name: &str) {
    let dir = home.join("bing_wallpapers");
    fs::create_dir_all(&dir).expect("mkdir wallpapers");
    let mut bytes = vec![0u8; IMAGE_BYTES];
    bytes[0] = 0xFF;
    bytes[1] = 0xD8;
    fs::write(dir.join(name), bytes).expect("write image");
}

fn read_state(home: &Path) -> serde_json::Value {
    let raw = fs::read_to_string(home.join("scrape_state.json")).expect("read state");
    serde_json::from_str(&raw).expect("state json")
}

fn set_of(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("string").to_string())
        .collect()
}

#[test]
fn prepare_sync_clears_missing_item_and_reopens_month() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path();
    write_catalog(home);
    write_image(home, "202501_A.jpg");
    write_image(home, "202501_B.jpg");
    fs::write(
        home.join("scrape_state.json"),
        r#"{"done_months":["202501"],"done_images":["202501/C"],"failed_images":["202501/C"]}"#,
    )
    .expect("write state");

    bingsync(home)
        .args(["prepare-sync", "--start", "202501", "--end", "202501"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("202501: 1 missing: C"));

    let state = read_state(home);
    assert!(set_of(&state["done_months"]).is_empty());
    assert_eq!(
        set_of(&state["done_images"]),
        vec!["202501/A".to_string(), "202501/B".to_string()]
    );
    assert!(set_of(&state["failed_images"]).is_empty());
    assert!(home.join("logs/audit.log").exists());
}

#[test]
fn prepare_sync_marks_fully_present_month_done() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path();
    write_catalog(home);
    write_image(home, "202501_A.jpg");
    write_image(home, "202501_B.jpg");
    fs::create_dir_all(home.join("bing_wallpapers/high")).expect("mkdir high");
    write_image(home, "high/202501_C.jpg");

    bingsync(home)
        .args(["--json", "prepare-sync", "--start", "202501", "--end", "202501"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ok\": true"));

    let state = read_state(home);
    assert_eq!(set_of(&state["done_months"]), vec!["202501".to_string()]);
    assert_eq!(set_of(&state["done_images"]).len(), 3);
}

#[test]
fn undersized_file_counts_as_missing() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path();
    write_catalog(home);
    write_image(home, "202501_A.jpg");
    write_image(home, "202501_B.jpg");
    fs::write(home.join("bing_wallpapers/202501_C.jpg"), b"<html>error</html>")
        .expect("write stub");

    bingsync(home)
        .args(["prepare-sync", "--start", "202501", "--end", "202501"])
        .assert()
        .code(1);
}

#[test]
fn corrupt_state_is_fatal_without_reset() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path();
    write_catalog(home);
    fs::write(home.join("scrape_state.json"), "{ truncated").expect("write state");

    bingsync(home)
        .args(["prepare-sync", "--start", "202501", "--end", "202501"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("E002_STATE_CORRUPT"));

    assert_eq!(
        fs::read_to_string(home.join("scrape_state.json")).expect("read"),
        "{ truncated"
    );
}

#[test]
fn malformed_catalog_is_fatal() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path();
    fs::write(home.join("image_dates.csv"), "what,is,this\n1,2,3\n").expect("write");

    bingsync(home)
        .args(["prepare-sync"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("E003_CATALOG_CORRUPT"));
}

#[test]
fn invalid_month_key_is_fatal() {
    let tmp = tempdir().expect("tempdir");
    bingsync(tmp.path())
        .args(["prepare-sync", "--start", "2025-01"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("E004_INVALID_MONTH"));
}

#[test]
fn reversed_window_is_nothing_to_do() {
    let tmp = tempdir().expect("tempdir");
    bingsync(tmp.path())
        .args(["scrape", "--start", "202502", "--end", "202501"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to do"));
}

#[test]
fn path_flags_override_home_layout() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path();
    let elsewhere = home.join("elsewhere");
    fs::create_dir_all(&elsewhere).expect("mkdir");
    fs::write(
        elsewhere.join("dates.csv"),
        "date,yyyymm,image_id,filename\n2025-01-01,202501,A,202501_A.jpg\n",
    )
    .expect("write catalog");

    bingsync(home)
        .arg("--catalog")
        .arg(elsewhere.join("dates.csv"))
        .arg("--state-file")
        .arg(elsewhere.join("state.json"))
        .args(["prepare-sync", "--start", "202501", "--end", "202501"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("202501: 1 missing: A"));

    assert!(elsewhere.join("state.json").exists());
    assert!(!home.join("scrape_state.json").exists());
}

#[test]
fn status_prints_json_report() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path();
    write_catalog(home);

    let output = bingsync(home)
        .args(["status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).expect("json report");
    assert_eq!(report["command"], "status");
    assert_eq!(report["ok"], true);
    let details = set_of(&report["details"]);
    assert!(details.iter().any(|d| d == "catalog: entries=3 months=1"));
}
