mod report;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use paddock_core::{
    logging,
    metrics::gather_metrics,
    models::{OrganizationRole, PermissionAction, Principal},
    Config, EntitlementService, Gate, HttpEntitlementApi,
};

use report::{CheckReport, Decision, StatusReport};

#[derive(Parser, Debug)]
#[command(name = "paddock")]
#[command(about = "Evaluate Paddock entitlement gates against the backend", long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short, env = "PADDOCK_CONFIG")]
    config: Option<String>,

    /// Authenticated user
    #[arg(long, env = "PADDOCK_USER")]
    user: String,

    /// Active organization
    #[arg(long, env = "PADDOCK_ORG")]
    org: String,

    /// Active stable, if any
    #[arg(long, env = "PADDOCK_STABLE")]
    stable: Option<String>,

    /// Append Prometheus metrics to the output
    #[arg(long, default_value = "false")]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate gates for the principal; exits 1 if any gate denies
    Check {
        /// Permission action token, e.g. manage-horses
        #[arg(long = "permission", value_name = "ACTION")]
        permissions: Vec<PermissionAction>,

        /// Subscription module key
        #[arg(long = "feature", value_name = "MODULE")]
        features: Vec<String>,

        /// Organization role; passes if the principal holds any of them
        #[arg(long = "role", value_name = "ROLE")]
        roles: Vec<OrganizationRole>,

        /// Usage limit check
        #[arg(long = "limit", value_name = "KEY=COUNT", value_parser = parse_limit)]
        limits: Vec<(String, u64)>,

        /// Gate as JSON, e.g. '{"type":"feature","module":"lessons"}'
        #[arg(long = "gate", value_name = "JSON", value_parser = parse_gate)]
        gates: Vec<Gate>,
    },
    /// Print the resolved entitlement documents and load status
    Status,
}

fn parse_limit(raw: &str) -> Result<(String, u64), String> {
    let (key, count) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=COUNT, got {raw}"))?;
    let count = count
        .parse()
        .map_err(|e| format!("invalid count in {raw}: {e}"))?;
    Ok((key.to_string(), count))
}

fn parse_gate(raw: &str) -> Result<Gate, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid gate: {e}"))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    logging::init_logging(&config.logging)?;

    let api = HttpEntitlementApi::new(&config.api)?;
    info!(base_url = %api.base_url(), "Using entitlement backend");
    let service = EntitlementService::new(Arc::new(api), &config.cache);

    let mut principal = Principal::new(args.user, args.org);
    if let Some(stable) = args.stable {
        principal = principal.with_stable(stable);
    }
    service.on_context_changed(Some(principal));

    let code = match args.command {
        Command::Check {
            permissions,
            features,
            roles,
            limits,
            gates,
        } => {
            let mut requested: Vec<Gate> = permissions.into_iter().map(Gate::permission).collect();
            requested.extend(features.into_iter().map(Gate::feature));
            if !roles.is_empty() {
                requested.push(Gate::AnyRole { roles });
            }
            requested.extend(limits.into_iter().map(|(key, count)| Gate::within_limit(key, count)));
            requested.extend(gates);
            if requested.is_empty() {
                anyhow::bail!("Nothing to check: pass --permission, --feature, --role, --limit or --gate");
            }
            check(&service, requested).await?
        }
        Command::Status => status(&service).await?,
    };

    if args.metrics {
        println!("{}", gather_metrics()?);
    }

    Ok(code)
}

async fn check(service: &EntitlementService, gates: Vec<Gate>) -> Result<ExitCode> {
    let mut decisions = Vec::with_capacity(gates.len());
    for gate in gates {
        let allowed = service.gates().evaluate(&gate).await;
        decisions.push(Decision { gate, allowed });
    }

    let all_allowed = decisions.iter().all(|d| d.allowed);
    let report = CheckReport {
        principal: service.principal(),
        decisions,
        permission_status: service.permission_status(),
        subscription_status: service.subscription_status(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if all_allowed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn status(service: &EntitlementService) -> Result<ExitCode> {
    if let Err(e) = service.prefetch().await {
        warn!(error = %e, "Entitlement documents incomplete");
    }

    let report = StatusReport::collect(service);
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if report.is_complete() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit("horses=4").unwrap(), ("horses".to_string(), 4));
        assert!(parse_limit("horses").is_err());
        assert!(parse_limit("horses=-1").is_err());
    }

    #[test]
    fn test_parse_gate() {
        let gate = parse_gate(r#"{"type":"anyRole","roles":["owner","manager"]}"#).unwrap();
        assert_eq!(
            gate,
            Gate::AnyRole {
                roles: vec![OrganizationRole::Owner, OrganizationRole::Manager]
            }
        );
        assert!(parse_gate(r#"{"type":"sometimes"}"#).is_err());
    }

    #[test]
    fn test_check_arguments() {
        let args = Args::try_parse_from([
            "paddock",
            "--user",
            "u1",
            "--org",
            "o1",
            "check",
            "--permission",
            "manage-horses",
            "--limit",
            "horses=3",
        ])
        .unwrap();

        match args.command {
            Command::Check {
                permissions, limits, ..
            } => {
                assert_eq!(permissions, vec![PermissionAction::ManageHorses]);
                assert_eq!(limits, vec![("horses".to_string(), 3)]);
            }
            Command::Status => panic!("expected check"),
        }
    }

    #[test]
    fn test_unknown_permission_rejected() {
        let result = Args::try_parse_from(["paddock", "--user", "u1", "--org", "o1", "check", "--permission", "fly"]);
        assert!(result.is_err());
    }
}
