use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn campus_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_campus"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("reseaux.txt"),
        "Le routage choisit le chemin des paquets.\n\nLa commutation relie les segments du réseau.",
    )
    .unwrap();
    fs::write(
        files_dir.join("bases.md"),
        "# Bases de données\n\nUne jointure combine deux tables selon une clé.",
    )
    .unwrap();
    fs::write(files_dir.join("notes.xyz"), "format inconnu").unwrap();
    fs::write(files_dir.join("vide.txt"), "   \n").unwrap();

    // Hashing embedder and unreachable backends: no network, no model.
    let config_content = format!(
        r#"[db]
path = "{}/data/campus.sqlite"

[embedding]
provider = "hashing"
dims = 64

[dedup]
ledger = "sqlite"

[backends.primary]
kind = "openai"
model = "test-model"
url = "http://127.0.0.1:9/v1"
api_key_env = "CAMPUS_TEST_UNSET_API_KEY"

[backends.secondary]
kind = "ollama"
model = "test-model"
url = "http://127.0.0.1:9"

[timeouts]
storage_secs = 5
backend_secs = 5

[logging]
level = "warn"
"#,
        root.display()
    );

    let config_path = config_dir.join("campus.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_campus(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = campus_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("CAMPUS_TEST_UNSET_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run campus binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn file(config_path: &Path, name: &str) -> String {
    let root = config_path.parent().unwrap().parent().unwrap();
    root.join("files").join(name).to_str().unwrap().to_string()
}

const SCOPE: &str = "1,2,3,4,3,42";

/// Ingest `name` and return its content hash.
fn ingest(config_path: &Path, name: &str) -> String {
    let path = file(config_path, name);
    let (stdout, stderr, success) = run_campus(config_path, &["ingest", &path, "--scope", SCOPE]);
    assert!(success, "ingest failed: {}{}", stdout, stderr);
    stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("hash: "))
        .map(str::to_string)
        .unwrap_or_else(|| panic!("no hash in output: {}", stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, _, success) = run_campus(&config, &["init"]);
    assert!(success);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data/campus.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    let (_, _, first) = run_campus(&config, &["init"]);
    let (_, _, second) = run_campus(&config, &["init"]);
    assert!(first && second);
}

#[test]
fn test_ingest_duplicate_and_force() {
    let (_tmp, config) = setup_test_env();
    let path = file(&config, "reseaux.txt");

    let (stdout, _, success) = run_campus(&config, &["ingest", &path, "--scope", SCOPE]);
    assert!(success);
    assert!(stdout.contains("chunks written: 1"));

    let (stdout, _, success) = run_campus(&config, &["ingest", &path, "--scope", SCOPE]);
    assert!(success);
    assert!(stdout.contains("already indexed"));

    let (stdout, _, success) =
        run_campus(&config, &["ingest", &path, "--scope", SCOPE, "--force"]);
    assert!(success);
    assert!(stdout.contains("chunks written: 1"));

    let (stdout, _, _) = run_campus(&config, &["stats"]);
    assert!(stdout.contains("Documents:   1"), "stats: {}", stdout);
}

#[test]
fn test_ingest_unsupported_and_blank_fail() {
    let (_tmp, config) = setup_test_env();

    let path = file(&config, "notes.xyz");
    let (stdout, _, success) = run_campus(&config, &["ingest", &path, "--scope", SCOPE]);
    assert!(!success);
    assert!(stdout.contains("xyz"), "stdout: {}", stdout);

    let path = file(&config, "vide.txt");
    let (_, _, success) = run_campus(&config, &["ingest", &path, "--scope", SCOPE]);
    assert!(!success);

    let (stdout, _, _) = run_campus(&config, &["documents"]);
    assert!(stdout.contains("No documents indexed."));
}

#[test]
fn test_invalid_scope_rejected() {
    let (_tmp, config) = setup_test_env();
    let path = file(&config, "reseaux.txt");
    let (_, stderr, success) = run_campus(&config, &["ingest", &path, "--scope", "1,2,3"]);
    assert!(!success);
    assert!(stderr.contains("6"), "stderr: {}", stderr);
}

#[test]
fn test_documents_and_info() {
    let (_tmp, config) = setup_test_env();
    let hash = ingest(&config, "bases.md");

    let (stdout, _, success) = run_campus(&config, &["documents"]);
    assert!(success);
    assert!(stdout.contains("bases.md"));
    assert!(stdout.contains(&hash[..16]));

    let (stdout, _, success) = run_campus(&config, &["info", &hash]);
    assert!(success);
    assert!(stdout.contains("--- Document ---"));
    assert!(stdout.contains("bases.md"));
    assert!(stdout.contains(SCOPE));
}

#[test]
fn test_delete_removes_document() {
    let (_tmp, config) = setup_test_env();
    let hash = ingest(&config, "reseaux.txt");

    let (stdout, _, success) = run_campus(&config, &["delete", &hash]);
    assert!(success);
    assert!(stdout.contains("1 vector(s)"));

    let (_, stderr, success) = run_campus(&config, &["info", &hash]);
    assert!(!success);
    assert!(stderr.contains("document not found"));

    // Ledger entry gone too: ingesting again indexes.
    let path = file(&config, "reseaux.txt");
    let (stdout, _, _) = run_campus(&config, &["ingest", &path, "--scope", SCOPE]);
    assert!(stdout.contains("chunks written"));
}

#[test]
fn test_retrieve_is_scoped() {
    let (_tmp, config) = setup_test_env();
    ingest(&config, "reseaux.txt");

    let (stdout, _, success) = run_campus(
        &config,
        &["retrieve", "routage paquets", "--scope", SCOPE, "--threshold=-1"],
    );
    assert!(success);
    assert!(stdout.contains("1 candidate(s)"), "stdout: {}", stdout);
    assert!(stdout.contains("routage"));

    let (stdout, _, success) = run_campus(
        &config,
        &["retrieve", "routage paquets", "--scope", "1,2,3,4,3,43"],
    );
    assert!(success);
    assert!(stdout.contains("0 candidate(s)"));
    assert!(stdout.contains("No result."));
}

#[test]
fn test_ask_with_backends_down_reports_error_and_logs() {
    let (_tmp, config) = setup_test_env();
    ingest(&config, "reseaux.txt");

    let (stdout, stderr, success) =
        run_campus(&config, &["ask", "Qu'est-ce que le routage ?", "--scope", SCOPE]);
    assert!(success, "stderr: {}", stderr);
    assert!(stdout.starts_with("Error: "), "stdout: {}", stdout);
    assert!(stderr.contains("unavailable"));

    let (stdout, _, success) = run_campus(&config, &["history", "--profile", "1"]);
    assert!(success);
    assert!(stdout.contains("Q: Qu'est-ce que le routage ?"));

    let (stdout, _, _) = run_campus(
        &config,
        &["history", "--profile", "3", "--program", "7"],
    );
    assert!(stdout.contains("No chat history."));
}

#[test]
fn test_summarize_and_quiz_unknown_hash() {
    let (_tmp, config) = setup_test_env();
    run_campus(&config, &["init"]);

    let (stdout, _, success) = run_campus(&config, &["summarize", "absent"]);
    assert!(success);
    assert!(stdout.contains("Aucun document trouvé pour ce hash."));

    let (_, _, success) = run_campus(&config, &["quiz", "absent", "--count", "2"]);
    assert!(!success);
}

#[test]
fn test_summarize_with_backends_down_fails() {
    let (_tmp, config) = setup_test_env();
    let hash = ingest(&config, "reseaux.txt");
    let (_, stderr, success) =
        run_campus(&config, &["summarize", &hash, "--level", "detailed"]);
    assert!(!success);
    assert!(stderr.contains("Error"), "stderr: {}", stderr);
}
