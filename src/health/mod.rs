//! Installation health check behind `docuforge health`.
//!
//! Each check yields one PASS/FAIL line; the process exits 0 only when all
//! of them pass. The live round trip is opt-in because it spends tokens.

use std::path::PathBuf;

use serde::Serialize;

use crate::agents::{AcademicSpecialist, AccessibilityTranslator};
use crate::llm::{AnthropicProvider, LlmProvider, LlmProviderExt};
use crate::pipeline::{open_library, PipelineConfig};
use crate::stage::Stage;

/// Secrets that must be set.
pub const REQUIRED_SECRETS: [&str; 2] = ["ANTHROPIC_API_KEY", "OPENAI_API_KEY"];

/// Secrets reported but never failed on.
pub const OPTIONAL_SECRETS: [&str; 1] = ["JSTOR_API_KEY"];

/// Reply the live round trip must contain.
pub const LIVE_EXPECTED_WORD: &str = "successful";

const LIVE_PROMPT: &str = "Reply with 'API test successful' and nothing else.";

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl HealthCheck {
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }

    /// `[PASS] name: detail`.
    pub fn line(&self) -> String {
        format!(
            "[{}] {}: {}",
            if self.passed { "PASS" } else { "FAIL" },
            self.name,
            self.detail
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthReport {
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Process exit code: 0 when every check passed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    /// One line per check plus a summary line.
    pub fn render(&self) -> String {
        let mut out: Vec<String> = self.checks.iter().map(HealthCheck::line).collect();
        out.push(format!(
            "Results: {}/{} checks passed",
            self.passed_count(),
            self.checks.len()
        ));
        out.join("\n")
    }
}

/// Whether an environment value is a real secret rather than an example placeholder.
pub fn is_configured(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => !(v.starts_with("your_") && v.ends_with("_here")),
        _ => false,
    }
}

fn check_runtime() -> HealthCheck {
    let version = env!("CARGO_PKG_VERSION");
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            HealthCheck::pass("runtime", format!("docuforge {} on multi-thread tokio", version))
        }
        Ok(_) => HealthCheck::fail("runtime", "tokio runtime is not multi-threaded"),
        Err(_) => HealthCheck::fail("runtime", "no tokio runtime"),
    }
}

async fn check_components(config: &PipelineConfig) -> HealthCheck {
    if let Err(e) = reqwest::Client::builder().build() {
        return HealthCheck::fail("components", format!("HTTP client: {}", e));
    }
    match open_library(config).await {
        Ok(store) => HealthCheck::pass(
            "components",
            format!("HTTP client ok, {} techniques available", store.len().await),
        ),
        Err(e) => HealthCheck::fail("components", format!("technique library: {}", e)),
    }
}

fn check_secrets(env: &dyn Fn(&str) -> Option<String>) -> Vec<HealthCheck> {
    let mut checks: Vec<HealthCheck> = REQUIRED_SECRETS
        .iter()
        .map(|key| {
            if is_configured(env(key).as_deref()) {
                HealthCheck::pass(*key, "configured")
            } else {
                HealthCheck::fail(*key, "not configured")
            }
        })
        .collect();
    checks.extend(OPTIONAL_SECRETS.iter().map(|key| {
        let status = if is_configured(env(key).as_deref()) {
            "configured (optional)"
        } else {
            "not configured (optional)"
        };
        HealthCheck::pass(*key, status)
    }));
    checks
}

fn check_directories(dirs: &[PathBuf]) -> HealthCheck {
    let missing: Vec<String> = dirs
        .iter()
        .filter(|d| !d.is_dir())
        .map(|d| d.display().to_string())
        .collect();
    if missing.is_empty() {
        HealthCheck::pass("directories", format!("{} present", dirs.len()))
    } else {
        HealthCheck::fail("directories", format!("missing: {}", missing.join(", ")))
    }
}

fn check_stages() -> HealthCheck {
    // Construction never touches the network, so any key will do.
    let provider = match AnthropicProvider::new("health-check") {
        Ok(provider) => std::sync::Arc::new(provider),
        Err(e) => return HealthCheck::fail("stages", e.to_string()),
    };
    let academic = AcademicSpecialist::new(provider.clone());
    let accessibility = AccessibilityTranslator::new(provider);
    let stages: [&dyn Stage; 2] = [&academic, &accessibility];
    let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
    if stages.iter().all(|s| !s.required_keys().is_empty()) {
        HealthCheck::pass("stages", format!("{} constructible", names.join(", ")))
    } else {
        HealthCheck::fail("stages", "stage declares no required inputs")
    }
}

/// One short completion that must mention [`LIVE_EXPECTED_WORD`].
pub async fn check_live(provider: &dyn LlmProvider, model: &str) -> HealthCheck {
    match provider.complete("", LIVE_PROMPT, model, 50, 0.0).await {
        Ok(reply) if reply.to_lowercase().contains(LIVE_EXPECTED_WORD) => {
            HealthCheck::pass("live", "round trip successful")
        }
        Ok(reply) => HealthCheck::fail(
            "live",
            format!("unexpected reply: {}", reply.chars().take(100).collect::<String>()),
        ),
        Err(e) => HealthCheck::fail("live", e.to_string()),
    }
}

/// Runs every offline check, plus the live round trip when `live` is given.
pub async fn run_health_checks(
    config: &PipelineConfig,
    env: &dyn Fn(&str) -> Option<String>,
    live: Option<&dyn LlmProvider>,
) -> HealthReport {
    let mut checks = vec![check_runtime(), check_components(config).await];
    checks.extend(check_secrets(env));
    checks.push(check_directories(&config.required_dirs));
    checks.push(check_stages());
    if let Some(provider) = live {
        checks.push(check_live(provider, &config.model).await);
    }

    for check in &checks {
        if check.passed {
            tracing::debug!(check = %check.name, detail = %check.detail, "Health check passed");
        } else {
            tracing::warn!(check = %check.name, detail = %check.detail, "Health check failed");
        }
    }
    HealthReport { checks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingProvider, ScriptedProvider};
    use tempfile::TempDir;

    fn env_with(keys: &[&'static str]) -> impl Fn(&str) -> Option<String> {
        let keys = keys.to_vec();
        move |key| keys.iter().any(|k| *k == key).then(|| "sk-test".to_string())
    }

    #[test]
    fn test_is_configured() {
        assert!(is_configured(Some("sk-ant-123")));
        assert!(!is_configured(Some("your_anthropic_api_key_here")));
        assert!(!is_configured(Some("  ")));
        assert!(!is_configured(None));
    }

    #[test]
    fn test_render_and_exit_code() {
        let report = HealthReport {
            checks: vec![HealthCheck::pass("runtime", "ok"), HealthCheck::fail("live", "timeout")],
        };
        assert_eq!(report.render(), "[PASS] runtime: ok\n[FAIL] live: timeout\nResults: 1/2 checks passed");
        assert_eq!(report.exit_code(), 1);
        assert_eq!(HealthReport::default().exit_code(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_all_pass_offline() {
        let tmp = TempDir::new().expect("tempdir");
        let config = PipelineConfig::default().with_required_dirs(vec![tmp.path().to_path_buf()]);
        let report = run_health_checks(
            &config,
            &env_with(&["ANTHROPIC_API_KEY", "OPENAI_API_KEY"]),
            None,
        )
        .await;

        assert!(report.all_passed(), "{}", report.render());
        assert!(report.checks.iter().any(|c| c.name == "JSTOR_API_KEY" && c.passed));
    }

    #[tokio::test]
    async fn test_missing_secret_and_dir_fail() {
        let tmp = TempDir::new().expect("tempdir");
        let config =
            PipelineConfig::default().with_required_dirs(vec![tmp.path().join("absent")]);
        let report = run_health_checks(&config, &env_with(&["ANTHROPIC_API_KEY"]), None).await;

        let failed: Vec<&str> = report
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect();
        // The default test runtime is current-thread.
        assert_eq!(failed, vec!["runtime", "OPENAI_API_KEY", "directories"]);
    }

    #[tokio::test]
    async fn test_live_round_trip() {
        let ok = ScriptedProvider::new(["API test successful"]);
        assert!(check_live(&ok, "m").await.passed);

        let odd = ScriptedProvider::new(["Hello"]);
        assert!(!check_live(&odd, "m").await.passed);

        let down = FailingProvider::transport("connection refused");
        let check = check_live(&down, "m").await;
        assert!(!check.passed);
        assert!(check.detail.contains("connection refused"));
    }
}
