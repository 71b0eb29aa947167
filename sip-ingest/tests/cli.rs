use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::{tempdir, NamedTempFile, TempDir};

/// Config whose staging root is an empty temp dir, so no transfer is ever staged.
fn create_empty_staging_config() -> (NamedTempFile, TempDir) {
    let staging = tempdir().expect("Creating staging dir failed");
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        format!(
            "pipeline:\n  staging_root: {}\n  normalized_dir: {}\n",
            staging.path().display(),
            staging.path().join("normalized").display()
        ),
    )
    .expect("Writing temp config failed");
    (config, staging)
}

#[test]
fn help_lists_both_commands() {
    let mut cmd = Command::cargo_bin("sip-ingest").expect("Binary exists");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("consume").and(predicate::str::contains("process")));
}

#[test]
fn process_without_staging_dir_reports_nothing_to_do() {
    let (config, _staging) = create_empty_staging_config();
    let mut cmd = Command::cargo_bin("sip-ingest").expect("Binary exists");

    cmd.arg("process")
        .arg("--config")
        .arg(config.path())
        .arg("--transfer-id")
        .arg("T-missing");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("nothing to do"));
}

#[test]
fn process_rejects_transfer_id_escaping_staging_root() {
    let (config, _staging) = create_empty_staging_config();
    let mut cmd = Command::cargo_bin("sip-ingest").expect("Binary exists");

    cmd.arg("process")
        .arg("--config")
        .arg(config.path())
        .arg("--transfer-id")
        .arg("../etc");

    cmd.assert().failure();
}

#[test]
fn process_fails_on_unparseable_config() {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(config.path(), b"pipeline: [:::").expect("Writing temp config failed");
    let mut cmd = Command::cargo_bin("sip-ingest").expect("Binary exists");

    cmd.arg("process")
        .arg("--config")
        .arg(config.path())
        .arg("--transfer-id")
        .arg("T1");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config YAML"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use sip_ingest::cli::{run, Cli, Commands};

    // The config path does not exist; the run fails after tracing starts.
    let cli = Cli {
        command: Commands::Process {
            config: Some(std::path::PathBuf::from("dummy.yaml")),
            transfer_id: "T1".to_string(),
            ra: None,
        },
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
