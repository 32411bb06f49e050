//! Logging setup utilities for the Lobby binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events are enabled at the default level.
const WORKSPACE_CRATES: [&str; 3] = ["lobby_client", "lobby_server", "lobby_shared"];

/// Build the default filter directive for a binary.
///
/// Binary crates are named after the binary with `-` replaced by `_`, so
/// `lobby-client` logs under the `lobby_client` target.
pub fn default_directive(binary_name: &str, default_log_level: &str) -> String {
    let binary_target = binary_name.replace('-', "_");
    let mut targets: Vec<String> = WORKSPACE_CRATES
        .iter()
        .map(|name| format!("{}={}", name, default_log_level))
        .collect();
    if !WORKSPACE_CRATES.contains(&binary_target.as_str()) {
        targets.push(format!("{}={}", binary_target, default_log_level));
    }
    targets.join(",")
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "lobby-server", "lobby-client")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use lobby_shared::logger::setup_logger;
///
/// setup_logger("lobby-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_covers_workspace_crates() {
        // テスト項目: ワークスペースの全クレートにデフォルトレベルが設定される
        // given (前提条件):
        let binary_name = "lobby-server";

        // when (操作):
        let directive = default_directive(binary_name, "debug");

        // then (期待する結果):
        assert_eq!(
            directive,
            "lobby_client=debug,lobby_server=debug,lobby_shared=debug"
        );
    }

    #[test]
    fn test_default_directive_adds_foreign_binary_target() {
        // テスト項目: ワークスペース外のバイナリ名もフィルタに追加される
        // given (前提条件):
        let binary_name = "load-probe";

        // when (操作):
        let directive = default_directive(binary_name, "info");

        // then (期待する結果):
        assert!(directive.ends_with(",load_probe=info"));
        assert!(directive.starts_with("lobby_client=info"));
    }
}
