mod support;

use std::path::Path;

use serde_json::Value;
use soundalike::cli::{self, CliError};
use support::env::ConfigHomeGuard;
use support::wav::{sine, write_test_wav};
use tempfile::tempdir;

const SAMPLE_RATE: u32 = 22_050;

fn run_cli(root: &Path, command: &[&str]) -> Result<Value, CliError> {
    let mut args = vec![
        "--db".to_string(),
        root.join("data").join("soundalike.db").display().to_string(),
        "--upload-dir".to_string(),
        root.join("uploads").display().to_string(),
        "--config".to_string(),
        root.join("config.toml").display().to_string(),
    ];
    args.extend(command.iter().map(|arg| arg.to_string()));
    let options = cli::parse_args(args)?.expect("command, not help");
    let mut out = Vec::new();
    cli::run(options, &mut out)?;
    Ok(serde_json::from_slice(&out).expect("json output"))
}

#[test]
fn upload_analyze_recommend_and_link() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let low = root.join("low.wav");
    let high = root.join("high.wav");
    write_test_wav(&low, &sine(220.0, 1.0, SAMPLE_RATE), SAMPLE_RATE);
    write_test_wav(&high, &sine(880.0, 1.0, SAMPLE_RATE), SAMPLE_RATE);

    let uploaded = run_cli(
        root,
        &["upload", low.to_str().unwrap(), high.to_str().unwrap()],
    )
    .unwrap();
    let uploaded = uploaded.as_array().unwrap();
    assert_eq!(uploaded.len(), 2);
    assert_eq!(uploaded[0]["original_name"], "low.wav");
    assert!(uploaded[0]["filename"].as_str().unwrap().ends_with("_low.wav"));
    let low_id = uploaded[0]["id"].as_i64().unwrap();
    let high_id = uploaded[1]["id"].as_i64().unwrap();

    let analyzed = run_cli(root, &["analyze", "--all", "--workers", "2"]).unwrap();
    let reports = analyzed.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|report| report.get("error").is_none()));
    assert_eq!(reports[0]["features"]["key"], "A");

    let page = run_cli(root, &["recommend", &low_id.to_string()]).unwrap();
    assert_eq!(page["query_id"], low_id);
    assert_eq!(page["total"], 1);
    assert_eq!(page["recommendations"][0]["id"], high_id);
    assert_eq!(page["recommendations"][0]["metadata"], Value::Null);

    let similar = run_cli(root, &["similar", &low_id.to_string(), "--k", "3"]).unwrap();
    assert_eq!(similar["similar"][0]["id"], high_id);

    let linked = run_cli(
        root,
        &[
            "link",
            &high_id.to_string(),
            "abc123",
            "--name",
            "High Tone",
            "--popularity",
            "0",
        ],
    )
    .unwrap();
    assert_eq!(linked["external_id"], "abc123");
    assert_eq!(linked["external_url"], "https://open.spotify.com/track/abc123");
    assert_eq!(linked["track_name"], "High Tone");
    assert_eq!(linked["popularity"], 0);
    assert_eq!(linked["artist_name"], Value::Null);

    let listed = run_cli(root, &["list"]).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[test]
fn failed_analysis_reports_and_errors() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let bogus = root.join("bogus.wav");
    std::fs::write(&bogus, b"definitely not audio").unwrap();
    run_cli(root, &["upload", bogus.to_str().unwrap()]).unwrap();

    let err = run_cli(root, &["analyze", "1"]).unwrap_err();
    assert!(matches!(err, CliError::AnalysisFailed { failed: 1, total: 1 }));
    assert_eq!(err.exit_code(), 1);

    let err = run_cli(root, &["recommend", "1"]).unwrap_err();
    assert!(err.to_string().contains("not been analyzed"));
    let err = run_cli(root, &["recommend", "77"]).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn config_defaults_live_under_config_home() {
    let dir = tempdir().unwrap();
    let _guard = ConfigHomeGuard::set(dir.path().to_path_buf());

    let options = cli::parse_args(vec!["config".into(), "--init".into()])
        .unwrap()
        .unwrap();
    let mut out = Vec::new();
    cli::run(options, &mut out).unwrap();
    let shown: Value = serde_json::from_slice(&out).unwrap();

    let app_dir = dir.path().join(".soundalike");
    assert_eq!(shown["path"], app_dir.join("config.toml").display().to_string());
    assert_eq!(
        shown["database_path"],
        app_dir.join("soundalike.db").display().to_string()
    );
    assert_eq!(shown["settings"]["recommendations"]["default_k"], 5);
    assert!(app_dir.join("config.toml").is_file());
    assert!(app_dir.join("uploads").is_dir());
}
