use assert_cmd::prelude::*;
use std::{fs, process::Command};
use tempfile::TempDir;

const NSEC: &str = "nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5";
const NPUB: &str = "npub180cvv07tjdrrgpa0j7j7tmnyl2yr6yr7l8j4s3evf6u64th6gkwsyjh6w6";
const NPUB_HEX: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

fn postr() -> Command {
    Command::cargo_bin("postr").unwrap()
}

#[test]
fn convert_npub_to_hex() {
    let out = postr().args(["convert", NPUB]).assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.trim(), NPUB_HEX);
}

#[test]
fn convert_hex_to_npub() {
    let out = postr().args(["convert", NPUB_HEX]).assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout.trim(), NPUB);
}

#[test]
fn convert_rejects_garbage() {
    postr().args(["convert", "npub1notakey"]).assert().failure();
}

#[test]
fn derive_prints_npub_and_hex() {
    let out = postr()
        .args(["derive", "--nsec", NSEC])
        .assert()
        .success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let npub_line = stdout.lines().next().unwrap();
    let hex_line = stdout.lines().nth(1).unwrap();
    assert!(npub_line.starts_with("npub: npub1"));
    assert!(hex_line.starts_with("hex:  "));

    // The two printed forms must agree with each other.
    let npub = npub_line.trim_start_matches("npub: ").trim();
    let hex_key = hex_line.trim_start_matches("hex:").trim();
    let out = postr().args(["convert", npub]).assert().success();
    let converted = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    assert_eq!(converted.trim(), hex_key);
}

#[test]
fn sign_verify_and_id_agree() {
    let dir = TempDir::new().unwrap();
    let draft_path = dir.path().join("draft.json");
    fs::write(
        &draft_path,
        r#"{"kind":1,"created_at":1700000000,"tags":[["t","news"]],"content":"hello"}"#,
    )
    .unwrap();

    let out = postr()
        .args(["sign", draft_path.to_str().unwrap(), "--nsec", NSEC])
        .assert()
        .success();
    let signed = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let ev: serde_json::Value = serde_json::from_str(&signed).unwrap();
    let id = ev["id"].as_str().unwrap().to_string();

    let signed_path = dir.path().join("event.json");
    fs::write(&signed_path, &signed).unwrap();

    let out = postr()
        .args(["id", signed_path.to_str().unwrap()])
        .assert()
        .success();
    let computed = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    assert_eq!(computed.trim(), id);

    postr()
        .args(["verify", signed_path.to_str().unwrap()])
        .assert()
        .success();
}

#[test]
fn verify_rejects_mutated_event() {
    let dir = TempDir::new().unwrap();
    let draft_path = dir.path().join("draft.json");
    fs::write(
        &draft_path,
        r#"{"kind":1,"created_at":1700000000,"tags":[],"content":"original"}"#,
    )
    .unwrap();
    let out = postr()
        .args(["sign", draft_path.to_str().unwrap(), "--nsec", NSEC])
        .assert()
        .success();
    let signed = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let mut ev: serde_json::Value = serde_json::from_str(&signed).unwrap();
    ev["content"] = serde_json::Value::String("tampered".into());

    let tampered_path = dir.path().join("tampered.json");
    fs::write(&tampered_path, serde_json::to_string(&ev).unwrap()).unwrap();
    postr()
        .args(["verify", tampered_path.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn sign_without_key_fails() {
    let dir = TempDir::new().unwrap();
    let draft_path = dir.path().join("draft.json");
    fs::write(&draft_path, r#"{"content":"hello"}"#).unwrap();
    let env_path = dir.path().join(".env");
    fs::write(&env_path, "RELAYS=\n").unwrap();

    postr()
        .args([
            "--env",
            env_path.to_str().unwrap(),
            "sign",
            draft_path.to_str().unwrap(),
        ])
        .assert()
        .failure();
}

#[test]
fn publish_without_relays_fails() {
    let dir = TempDir::new().unwrap();
    let env_path = dir.path().join(".env");
    fs::write(&env_path, format!("RELAYS=\nNSEC={NSEC}\n")).unwrap();

    postr()
        .args(["--env", env_path.to_str().unwrap(), "publish", "hello"])
        .assert()
        .failure();
}
