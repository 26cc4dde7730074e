use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::tempdir;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/artifacts")
}

fn riskscreen(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_riskscreen"))
        .args(args)
        .output()
        .expect("run riskscreen cli")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn predict_prints_advisory_probability_and_label() {
    let artifacts = fixture_dir();
    let output = riskscreen(&[
        "predict",
        "--artifacts",
        artifacts.to_str().expect("path str"),
        "--sex",
        "Male",
        "--marital-status",
        "Married",
        "--labor-status",
        "Employed",
    ]);
    assert!(output.status.success(), "CLI exited with {:?}", output.status);
    let text = stdout(&output);
    assert!(text.contains("for screening purposes only"));
    assert!(text.contains("Estimated probability of diabetes: 0.65"));
    assert!(text.contains("High risk of diabetes (screen-positive)"));
}

#[test]
fn predict_standard_mode_and_json_output() {
    let artifacts = fixture_dir();
    let output = riskscreen(&[
        "predict",
        "--artifacts",
        artifacts.to_str().expect("path str"),
        "--sex",
        "male",
        "--marital-status",
        "married",
        "--labor-status",
        "employed",
        "--mode",
        "standard",
        "--json",
    ]);
    assert!(output.status.success(), "CLI exited with {:?}", output.status);
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid json");
    assert_eq!(value["decision"], "screen-negative");
    assert_eq!(value["probability_display"], "0.40");
    assert_eq!(value["threshold"], 0.5);
}

#[test]
fn threshold_flag_overrides_mode_default() {
    let artifacts = fixture_dir();
    let output = riskscreen(&[
        "predict",
        "--artifacts",
        artifacts.to_str().expect("path str"),
        "--threshold",
        "0.9",
    ]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Low risk of diabetes (screen-negative)"));
}

#[test]
fn out_of_range_flags_are_rejected_before_scoring() {
    let artifacts = fixture_dir();
    for args in [
        ["--age", "17"],
        ["--age", "101"],
        ["--bmi", "60.5"],
        ["--waist-circumference", "49"],
        ["--threshold", "1.5"],
    ] {
        let mut full = vec!["predict", "--artifacts", artifacts.to_str().expect("path str")];
        full.extend_from_slice(&args);
        let output = riskscreen(&full);
        assert!(!output.status.success(), "{args:?} should be rejected");
        assert!(!stdout(&output).contains("Estimated probability"));
    }
}

#[test]
fn missing_artifacts_print_failure_notice_and_exit_nonzero() {
    let tmp = tempdir().expect("temporary directory");
    let output = riskscreen(&[
        "predict",
        "--artifacts",
        tmp.path().to_str().expect("path str"),
    ]);
    assert!(!output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Risk could not be estimated"));
    assert!(!text.contains("Estimated probability"));
}

#[test]
fn config_file_sets_mode_and_artifact_dir() {
    let tmp = tempdir().expect("temporary directory");
    let config_path = tmp.path().join("riskscreen.toml");
    let config = format!(
        "[artifacts]\ndir = {:?}\n\n[screening]\nmode = \"standard\"\n",
        fixture_dir().to_str().expect("path str")
    );
    fs::write(&config_path, config).expect("write config");

    let output = riskscreen(&[
        "predict",
        "--config",
        config_path.to_str().expect("path str"),
        "--sex",
        "Male",
        "--marital-status",
        "Married",
        "--labor-status",
        "Employed",
        "--json",
    ]);
    assert!(output.status.success(), "CLI exited with {:?}", output.status);
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid json");
    assert_eq!(value["threshold"], 0.5);
}

#[test]
fn batch_scores_every_row_to_tsv() {
    let tmp = tempdir().expect("temporary directory");
    let input = tmp.path().join("patients.tsv");
    let data = "sample_id\tAge\tSex\tEducation_level\tMarital_status\tLabor_status\tSmoking\tAlcohol_drinking\tPhysical_inactivity\tHigh_salt_intake\tBMI\tWaist_circumference\n\
golden\t61\tMale\tLow\tMarried\tEmployed\tNo\tNo\tNo\tNo\t30.0\t90\n\
young\t25\tFemale\tHigh\tMarried\tEmployed\tNo\tNo\tNo\tNo\t20.0\t60\n";
    fs::write(&input, data).expect("write input");
    let predictions = tmp.path().join("predictions.tsv");

    let output = riskscreen(&[
        "batch",
        input.to_str().expect("path str"),
        "--output",
        predictions.to_str().expect("path str"),
        "--artifacts",
        fixture_dir().to_str().expect("path str"),
    ]);
    assert!(output.status.success(), "CLI exited with {:?}", output.status);

    let written = fs::read_to_string(&predictions).expect("predictions written");
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "sample_id\tprobability\tdecision");
    assert!(lines[1].starts_with("golden\t0.65"));
    assert!(lines[1].ends_with("screen-positive"));
    assert!(lines[2].starts_with("young\t0.006"));
    assert!(lines[2].ends_with("screen-negative"));
}

#[test]
fn batch_with_invalid_row_writes_nothing() {
    let tmp = tempdir().expect("temporary directory");
    let input = tmp.path().join("patients.tsv");
    let data = "Age\tSex\tEducation_level\tMarital_status\tLabor_status\tSmoking\tAlcohol_drinking\tPhysical_inactivity\tHigh_salt_intake\tBMI\tWaist_circumference\n\
61\tMale\tLow\tMarried\tEmployed\tNo\tNo\tNo\tNo\t30.0\t90\n\
12\tMale\tLow\tMarried\tEmployed\tNo\tNo\tNo\tNo\t30.0\t90\n";
    fs::write(&input, data).expect("write input");
    let predictions = tmp.path().join("predictions.tsv");

    let output = riskscreen(&[
        "batch",
        input.to_str().expect("path str"),
        "--output",
        predictions.to_str().expect("path str"),
        "--artifacts",
        fixture_dir().to_str().expect("path str"),
    ]);
    assert!(!output.status.success());
    assert!(!predictions.exists());
}

#[test]
fn inspect_lists_canonical_features() {
    let output = riskscreen(&[
        "inspect",
        "--artifacts",
        fixture_dir().to_str().expect("path str"),
    ]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Features (12)"));
    assert!(text.contains("High_salt_intake_Yes"));
    assert!(text.contains("Scaler: standard"));
    assert!(text.contains("high-sensitivity"));
}
