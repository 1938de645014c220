use serde::Serialize;

use orderdesk_core::config::{AppConfig, LoadOptions};
use orderdesk_db::connect_from_config;

use crate::commands::runtime;

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    passed: bool,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    healthy: bool,
    checks: Vec<DoctorCheck>,
}

pub fn run(json: bool) -> String {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config",
                passed: true,
                detail: "configuration loads and validates".to_string(),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(DoctorCheck { name: "config", passed: false, detail: error.to_string() });
            None
        }
    };

    if let Some(config) = &config {
        let detail = match runtime() {
            Ok(runtime) => runtime.block_on(async {
                match connect_from_config(&config.database).await {
                    Ok(pool) => {
                        let ping = sqlx::query("SELECT 1").execute(&pool).await;
                        pool.close().await;
                        match ping {
                            Ok(_) => Ok("database reachable".to_string()),
                            Err(error) => Err(error.to_string()),
                        }
                    }
                    Err(error) => Err(error.to_string()),
                }
            }),
            Err(error) => Err(error.to_string()),
        };
        match detail {
            Ok(detail) => checks.push(DoctorCheck { name: "database", passed: true, detail }),
            Err(detail) => checks.push(DoctorCheck { name: "database", passed: false, detail }),
        }
    }

    let report =
        DoctorReport { healthy: checks.iter().all(|check| check.passed), checks };

    if json {
        serde_json::to_string_pretty(&report)
            .unwrap_or_else(|error| format!("{{\"error\": \"{error}\"}}"))
    } else {
        let mut lines =
            vec![format!("doctor: {}", if report.healthy { "healthy" } else { "unhealthy" })];
        for check in &report.checks {
            lines.push(format!(
                "- {}: {} ({})",
                check.name,
                if check.passed { "ok" } else { "failed" },
                check.detail
            ));
        }
        lines.join("\n")
    }
}
