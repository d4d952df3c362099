//! orchestrator-status — 编排层健康与状态检查工具
//!
//! Usage:
//!   orchestrator-status health [--config <file>]    Probe the API and print the health verdict
//!   orchestrator-status status [--config <file>]    Print metrics, budget and cache state
//!   orchestrator-status config [--config <file>]    Print the effective configuration

use ai_lib_orchestrator::telemetry::init_tracing;
use ai_lib_orchestrator::{HealthStatus, Orchestrator, OrchestratorConfig};
use anyhow::Context;
use std::path::PathBuf;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "health" => run(&args[2..], cmd_health),
        "status" => run(&args[2..], cmd_status),
        "config" => cmd_config(&args[2..]),
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(0)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(0)
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            Ok(1)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    println!(
        r#"orchestrator-status — 编排层状态工具

USAGE:
    orchestrator-status <COMMAND> [OPTIONS]

COMMANDS:
    health [--config <file>]    Run a health check (exit 0 healthy, 1 degraded, 2 unhealthy)
    status [--config <file>]    Print metrics, rate-limit and cache state as JSON
    config [--config <file>]    Print the effective configuration (API key redacted)
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    AI_LIB_API_KEY              Bearer credential for the inference API
    AI_LIB_API_BASE_URL         API base URL; the health probe is skipped when unset
    AI_LIB_CONFIG               YAML configuration file (overridden by --config)
    RUST_LOG                    Log filter"#
    );
}

fn cmd_version() {
    println!("{}", version_line());
}

fn version_line() -> String {
    format!(
        "orchestrator-status {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_NAME"),
    )
}

fn resolve_config_path(args: &[String]) -> Option<PathBuf> {
    for (i, arg) in args.iter().enumerate() {
        if arg == "--config" {
            if let Some(path) = args.get(i + 1) {
                return Some(PathBuf::from(path));
            }
        }
    }
    std::env::var("AI_LIB_CONFIG").ok().map(PathBuf::from)
}

fn load_config(args: &[String]) -> anyhow::Result<OrchestratorConfig> {
    match resolve_config_path(args) {
        Some(path) => OrchestratorConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display())),
        None => OrchestratorConfig::from_env().context("reading AI_LIB_* environment"),
    }
}

fn cmd_config(args: &[String]) -> anyhow::Result<i32> {
    let config = load_config(args)?;
    config.validate()?;
    println!("{config:#?}");
    Ok(0)
}

type Command = fn(Orchestrator) -> futures::future::BoxFuture<'static, anyhow::Result<i32>>;

fn run(args: &[String], command: Command) -> anyhow::Result<i32> {
    let config = load_config(args)?;
    // A second subscriber is never installed here, so failure means a bad level.
    init_tracing(&config.monitoring)?;
    let runtime = tokio::runtime::Runtime::new().context("starting Tokio runtime")?;
    runtime.block_on(async move {
        let orchestrator = Orchestrator::new(config)?;
        let code = command(orchestrator.clone()).await;
        orchestrator.destroy().await;
        code
    })
}

fn cmd_health(orchestrator: Orchestrator) -> futures::future::BoxFuture<'static, anyhow::Result<i32>> {
    Box::pin(async move {
        let report = orchestrator.health_check().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(match report.status {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 2,
        })
    })
}

fn cmd_status(orchestrator: Orchestrator) -> futures::future::BoxFuture<'static, anyhow::Result<i32>> {
    Box::pin(async move {
        let status = orchestrator.status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_line_names_the_version_once() {
        let line = version_line();
        assert!(line.starts_with("orchestrator-status "));
        assert!(line.ends_with("(ai-lib-orchestrator)"));
        assert_eq!(line.matches(env!("CARGO_PKG_VERSION")).count(), 1);
    }

    #[test]
    fn test_config_flag_takes_precedence() {
        let args = vec!["--config".to_string(), "orchestrator.yaml".to_string()];
        assert_eq!(
            resolve_config_path(&args),
            Some(PathBuf::from("orchestrator.yaml"))
        );
    }
}
