use serde::Serialize;
use supportdesk_core::config::{AppConfig, LlmProvider, LoadOptions};
use supportdesk_db::connect_with_settings;

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

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_provider_readiness(&config));
            checks.push(check_credential_readiness(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["provider_readiness", "credential_readiness", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_usable =
        checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_usable { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_usable {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_provider_readiness(config: &AppConfig) -> DoctorCheck {
    match config.llm.provider {
        LlmProvider::OpenAi => DoctorCheck {
            name: "provider_readiness",
            status: CheckStatus::Pass,
            details: format!("openai provider configured with model {}", config.llm.model),
        },
        LlmProvider::Disabled => DoctorCheck {
            name: "provider_readiness",
            status: CheckStatus::Pass,
            details: "provider disabled; chat will serve degraded responses".to_string(),
        },
    }
}

fn check_credential_readiness(config: &AppConfig) -> DoctorCheck {
    let missing: Vec<&str> = [
        ("auth.agent_secret", config.auth.agent_secret.is_none()),
        ("auth.admin_secret", config.auth.admin_secret.is_none()),
    ]
    .iter()
    .filter_map(|(name, absent)| absent.then_some(*name))
    .collect();

    if missing.is_empty() {
        DoctorCheck {
            name: "credential_readiness",
            status: CheckStatus::Pass,
            details: "agent and admin secrets configured".to_string(),
        }
    } else {
        DoctorCheck {
            name: "credential_readiness",
            status: CheckStatus::Pass,
            details: format!(
                "{} unset; the corresponding surfaces reject all callers",
                missing.join(", ")
            ),
        }
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: "database connection established".to_string(),
        },
        Err(details) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("  [{marker}] {}: {}", check.name, check.details));
    }
    lines.join("\n")
}
