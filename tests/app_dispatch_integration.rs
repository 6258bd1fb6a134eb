//! CLI dispatch through the app layer with a captured output hook.

use std::sync::{Arc, Mutex};

use lanscout::app::{execute_command_with_context, AppContext, OutputHook};
use lanscout::CliCommand;

type CapturedLines = Arc<Mutex<Vec<String>>>;

fn make_test_context() -> (AppContext, CapturedLines) {
    let lines: CapturedLines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let output_hook: OutputHook = Arc::new(move |line| {
        sink.lock()
            .expect("output lock should not be poisoned")
            .push(line.to_string());
    });
    let context = AppContext::default().with_output_hook(output_hook);
    (context, lines)
}

#[tokio::test]
async fn help_command_writes_usage_to_output_hook() {
    let (context, lines) = make_test_context();

    execute_command_with_context(CliCommand::Help, &context)
        .await
        .expect("help command should succeed");

    let output = lines
        .lock()
        .expect("output lock should not be poisoned")
        .join("\n");
    assert!(output.contains("Usage:"));
    assert!(output.contains("lanscout"));
    assert!(output.contains("probe"));
}

#[tokio::test]
async fn version_command_reports_package_version() {
    let (context, lines) = make_test_context();

    execute_command_with_context(CliCommand::Version, &context)
        .await
        .expect("version command should succeed");

    let output = lines
        .lock()
        .expect("output lock should not be poisoned")
        .join("\n");
    assert!(output.contains(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn wake_with_invalid_mac_fails() {
    let (context, _lines) = make_test_context();

    let result = execute_command_with_context(
        CliCommand::Wake {
            mac: "not-a-mac".to_string(),
        },
        &context,
    )
    .await;

    // Either no interface is available in the environment or the MAC is
    // rejected; both are errors.
    assert!(result.is_err());
}
