use kopi_core::config::{AppConfig, LoadOptions};
use kopi_db::{connect_from_config, SqlOutletRepository};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => build_report(&config),
        Err(error) => config_failure_report(error.to_string()),
    };
    render(&report, json_output)
}

pub fn run_with_config(config: &AppConfig, json_output: bool) -> CommandResult {
    render(&build_report(config), json_output)
}

fn render(report: &DoctorReport, json_output: bool) -> CommandResult {
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(report)
    };

    CommandResult { exit_code, output }
}

fn build_report(config: &AppConfig) -> DoctorReport {
    let mut checks = vec![DoctorCheck {
        name: "config_validation",
        status: CheckStatus::Pass,
        details: "configuration loaded and validated".to_string(),
    }];
    checks.extend(check_database(config));
    checks.push(check_completion_provider(config));

    finish(checks)
}

fn config_failure_report(error: String) -> DoctorReport {
    let skipped = |name| DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because configuration did not load".to_string(),
    };

    finish(vec![
        DoctorCheck { name: "config_validation", status: CheckStatus::Fail, details: error },
        skipped("database_connectivity"),
        skipped("outlet_fixtures"),
        skipped("completion_provider"),
    ])
}

/// Skipped checks do not fail the report; only an explicit failure does.
fn finish(checks: Vec<DoctorCheck>) -> DoctorReport {
    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    runtime.block_on(async {
        let pool = match connect_from_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details: format!("failed to connect to database: {error}"),
                    },
                    DoctorCheck {
                        name: "outlet_fixtures",
                        status: CheckStatus::Skipped,
                        details: "skipped because the database is unreachable".to_string(),
                    },
                ];
            }
        };

        let connectivity = DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        };
        let fixtures = match SqlOutletRepository::new(pool.clone()).count().await {
            Ok(0) => DoctorCheck {
                name: "outlet_fixtures",
                status: CheckStatus::Fail,
                details: "outlets table is empty; run `kopi seed`".to_string(),
            },
            Ok(count) => DoctorCheck {
                name: "outlet_fixtures",
                status: CheckStatus::Pass,
                details: format!("{count} outlets available"),
            },
            Err(error) => DoctorCheck {
                name: "outlet_fixtures",
                status: CheckStatus::Fail,
                details: format!("outlets table unavailable ({error}); run `kopi migrate`"),
            },
        };

        pool.close().await;
        vec![connectivity, fixtures]
    })
}

fn check_completion_provider(config: &AppConfig) -> DoctorCheck {
    match config.llm.endpoint() {
        Some(endpoint) => DoctorCheck {
            name: "completion_provider",
            status: CheckStatus::Pass,
            details: format!("`{}` via {endpoint} using model `{}`", config.llm.provider.as_str(), config.llm.model),
        },
        None => DoctorCheck {
            name: "completion_provider",
            status: CheckStatus::Skipped,
            details: "provider disabled; outlet lookup and small talk fall back".to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use kopi_core::config::AppConfig;
    use serde_json::Value;

    use super::{config_failure_report, render, run_with_config};
    use crate::commands::seed;

    fn config_for(directory: &tempfile::TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", directory.path().join("kopi.db").display());
        config
    }

    #[test]
    fn unseeded_database_fails_the_fixture_check() {
        let directory = tempfile::tempdir().expect("temp dir");
        let config = config_for(&directory);

        let result = run_with_config(&config, true);
        let report: Value = serde_json::from_str(&result.output).expect("json report");

        assert_eq!(result.exit_code, 1);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(report["checks"][1]["status"], "pass");
        assert_eq!(report["checks"][2]["name"], "outlet_fixtures");
        assert_eq!(report["checks"][2]["status"], "fail");
        assert_eq!(report["checks"][3]["status"], "skipped");
    }

    #[test]
    fn seeded_database_passes() {
        let directory = tempfile::tempdir().expect("temp dir");
        let config = config_for(&directory);
        assert_eq!(seed::run_with_config(&config).exit_code, 0);

        let result = run_with_config(&config, false);

        assert_eq!(result.exit_code, 0, "{}", result.output);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] outlet_fixtures: 9 outlets available"));
        assert!(result.output.contains("- [skip] completion_provider"));
    }

    #[test]
    fn config_failure_skips_dependent_checks() {
        let result = render(&config_failure_report("bad url".to_string()), false);

        assert_eq!(result.exit_code, 1);
        assert!(result.output.contains("- [fail] config_validation: bad url"));
        assert!(result.output.contains("- [skip] database_connectivity"));
    }
}
