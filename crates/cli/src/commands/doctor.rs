use routey_core::config::{AppConfig, LoadOptions};
use routey_core::routing::RoutingTables;
use serde::Serialize;

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
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    let tables = RoutingTables::philippine_network();
    match tables.validate() {
        Ok(()) => checks.push(DoctorCheck {
            name: "routing_tables",
            status: CheckStatus::Pass,
            details: format!(
                "{} fulfillment points validated with coordinates and contacts",
                tables.fulfillment_points().count()
            ),
        }),
        Err(error) => checks.push(DoctorCheck {
            name: "routing_tables",
            status: CheckStatus::Fail,
            details: error.to_string(),
        }),
    }

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_default_branch(&config, &tables));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "default_branch_alignment",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_default_branch(config: &AppConfig, tables: &RoutingTables) -> DoctorCheck {
    if tables.is_fulfillment_point(&config.delivery.default_branch) {
        DoctorCheck {
            name: "default_branch_alignment",
            status: CheckStatus::Pass,
            details: format!(
                "configured default branch `{}` is a fulfillment point",
                config.delivery.default_branch
            ),
        }
    } else {
        DoctorCheck {
            name: "default_branch_alignment",
            status: CheckStatus::Fail,
            details: format!(
                "configured default branch `{}` cannot receive routed records",
                config.delivery.default_branch
            ),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

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
