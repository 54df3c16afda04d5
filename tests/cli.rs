use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ideavoid_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ideavoid");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let ideas = serde_json::json!({
        "ideas": [
            {"name": "Meal Planner", "description": "Weekly meal planning app for busy families", "tags": ["food", "mobile"]},
            {"name": "Meal Planning Assistant", "description": "Meal planning app that builds grocery lists", "tags": ["food"]},
            {"name": "Dog Walker Finder", "description": "Marketplace for local dog walkers", "tags": ["pets"]},
            {"name": "Invoice Chaser", "description": "Automated reminders for unpaid invoices", "tags": ["finance", "payment"]},
            {"name": "Quantum Knitting", "description": "Knitting patterns generated by a quantum computer", "tags": []},
            {"name": "Trip Splitter", "description": "Split group travel costs", "tags": ["travel"]}
        ]
    });
    fs::write(
        root.join("ideas.json"),
        serde_json::to_string_pretty(&ideas).unwrap(),
    )
    .unwrap();

    let config_content = format!(
        r#"[data]
ideas_path = "{root}/ideas.json"
contributions_path = "{root}/data/contributions.json"
visitors_path = "{root}/data/visitors.json"

[search]
enabled = false

[batch]
batch_size = 4
delay_ms = 0
sample_size = 2
"#,
        root = root.display()
    );

    let config_path = config_dir.join("ideavoid.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ideavoid(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ideavoid_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .env_remove("GOOGLE_SEARCH_ENABLED")
        .env_remove("SEARCH_ENABLED")
        .env_remove("INTERNAL_VALIDATION_ENABLED")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ideavoid binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn read_ideas(root: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(root.join("ideas.json")).unwrap()).unwrap()
}

#[test]
fn test_enrich_sample_writes_nothing() {
    let (tmp, config) = setup_test_env();
    let before = fs::read_to_string(tmp.path().join("ideas.json")).unwrap();

    let (stdout, stderr, ok) = run_ideavoid(&config, &["enrich", "--sample"]);
    assert!(ok, "enrich failed: {}", stderr);
    assert!(stdout.contains("Enrichment sample complete"));
    assert!(stdout.contains("Ideas processed: 2"));
    assert!(stdout.contains("Sample mode: nothing was written"));

    let after = fs::read_to_string(tmp.path().join("ideas.json")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_enrich_fills_validation_and_category() {
    let (tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_ideavoid(&config, &["enrich"]);
    assert!(ok, "enrich failed: {}", stderr);
    assert!(stdout.contains("Ideas enriched:  6"));

    let doc = read_ideas(tmp.path());
    let ideas = doc["ideas"].as_array().unwrap();
    for idea in ideas {
        assert!(idea["validation"].is_object(), "missing validation: {}", idea);
        assert!(idea["saturation"].is_object(), "missing saturation: {}", idea);
        assert_eq!(idea["validation"]["aggregatedScore"]["confidence"], 0.3);
    }

    // Two near-identical meal planners find each other.
    assert_eq!(ideas[0]["validation"]["status"], "verified");
    assert_eq!(ideas[0]["category"], "tech");
    assert_eq!(ideas[3]["category"], "finance");
    assert_eq!(ideas[4]["category"], "other");
    assert_eq!(ideas[5]["category"], "travel");

    // A unique idea has no similar ideas and stays unverified.
    assert_eq!(ideas[4]["validation"]["status"], "unverified");
    assert_eq!(ideas[4]["saturation"]["level"], "low");

    assert_eq!(doc["metadata"]["enrichment"]["enrichedIdeas"], 6);
    assert_eq!(doc["metadata"]["enrichment"]["sampleMode"], false);
}

#[test]
fn test_validate_all_checkpoints_metadata() {
    let (tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_ideavoid(&config, &["validate-all", "--internal-only"]);
    assert!(ok, "validate-all failed: {}", stderr);
    assert!(stdout.contains("Validation complete"));
    assert!(stdout.contains("Ideas validated: 6"));

    let doc = read_ideas(tmp.path());
    let meta = &doc["metadata"]["validation"];
    assert_eq!(meta["totalIdeas"], 6);
    assert_eq!(meta["validatedIdeas"], 6);
    assert_eq!(meta["skippedIdeas"], 0);
    assert_eq!(meta["inProgress"], false);
    assert_eq!(meta["completed"], true);

    for idea in doc["ideas"].as_array().unwrap() {
        let sources = idea["validation"]["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["source"], "internal_database");
    }
}

#[test]
fn test_validate_all_skip_existing() {
    let (_tmp, config) = setup_test_env();

    let (_, stderr, ok) = run_ideavoid(&config, &["validate-all", "--internal-only"]);
    assert!(ok, "first run failed: {}", stderr);

    let (stdout, stderr, ok) = run_ideavoid(
        &config,
        &["validate-all", "--internal-only", "--skip-existing"],
    );
    assert!(ok, "second run failed: {}", stderr);
    assert!(stdout.contains("Ideas validated: 0"));
    assert!(stdout.contains("Ideas skipped:   6"));
}

#[test]
fn test_progress_report() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, ok) = run_ideavoid(&config, &["progress"]);
    assert!(ok);
    assert!(stdout.contains("Total ideas:  6"));
    assert!(stdout.contains("Validated:    0 (0.00%)"));

    run_ideavoid(&config, &["enrich"]);
    let (stdout, _, ok) = run_ideavoid(&config, &["progress"]);
    assert!(ok);
    assert!(stdout.contains("Validated:    6 (100.00%)"));
    assert!(stdout.contains("Recently validated:"));
    assert!(stdout.contains("Trip Splitter"));
}

#[test]
fn test_validate_single_idea() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_ideavoid(&config, &["validate", "1"]);
    assert!(ok, "validate failed: {}", stderr);
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(outcome["validation"]["status"].is_string());
    assert!(outcome["saturation"]["tam"].is_string());

    let (_, _, ok) = run_ideavoid(&config, &["validate", "999"]);
    assert!(!ok);
}

#[test]
fn test_export_writes_spreadsheet() {
    let (tmp, config) = setup_test_env();
    let out = tmp.path().join("out").join("ideas.xlsx");

    let (_, stderr, ok) = run_ideavoid(&config, &["export", out.to_str().unwrap()]);
    assert!(ok, "export failed: {}", stderr);
    let bytes = fs::read(&out).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn test_missing_ideas_file_errors() {
    let (tmp, config) = setup_test_env();
    fs::remove_file(tmp.path().join("ideas.json")).unwrap();

    let (_, _, ok) = run_ideavoid(&config, &["progress"]);
    assert!(!ok);
}
