use std::process::Command;

#[test]
fn ingest_dry_run_reports_pages_without_network() {
    let output = Command::new(env!("CARGO_BIN_EXE_pagecite-ingest"))
        .args(["tests/fixtures/one-page.pdf", "--dry-run"])
        .env_remove("OPENAI_API_KEY")
        .env("PAGECITE_LOG", "warn")
        .output()
        .expect("run ingest CLI");

    assert!(
        output.status.success(),
        "cli exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Total pages: 1"), "{stdout}");
    assert!(stdout.contains("dry-run enabled"), "{stdout}");
}

#[test]
fn ingest_reports_missing_pdf() {
    let output = Command::new(env!("CARGO_BIN_EXE_pagecite-ingest"))
        .args(["tests/fixtures/missing.pdf", "--dry-run"])
        .env("PAGECITE_LOG", "warn")
        .output()
        .expect("run ingest CLI");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to open pdf"), "{stderr}");
}

#[test]
fn ingest_without_api_key_fails_fast() {
    let output = Command::new(env!("CARGO_BIN_EXE_pagecite-ingest"))
        .arg("tests/fixtures/one-page.pdf")
        .env_remove("OPENAI_API_KEY")
        .env("PAGECITE_LOG", "warn")
        .output()
        .expect("run ingest CLI");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing OpenAI API key"), "{stderr}");
}

#[test]
fn chat_help_lists_providers() {
    let output = Command::new(env!("CARGO_BIN_EXE_pagecite-chat"))
        .arg("--help")
        .output()
        .expect("run chat CLI");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--provider"), "{stdout}");
    assert!(stdout.contains("chatnbx"), "{stdout}");
}
