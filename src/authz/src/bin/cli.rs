//! Warden diagnostic CLI
//!
//! Loads a configuration and a seed document into an in-memory engine and runs
//! one diagnostic command against it.
//!
//! ```text
//! warden-cli --seed seed.toml decide --user 1 --resource doc --action read
//! warden-cli --seed seed.toml expand --user 1
//! warden-cli --seed seed.toml audit --user 1 --check doc:read --check doc:write
//! warden-cli --seed seed.toml metrics --user 1 --check doc:read
//! warden-cli --seed seed.toml inspect
//! warden-cli --config warden.toml check-config
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use warden_authz::seed::SeedDocument;
use warden_authz::{DecisionRequest, Grant, PermissionResolver, RequestContext, WardenConfig};

/// Warden authorization engine CLI
#[derive(Parser)]
#[command(name = "warden-cli")]
#[command(about = "Inspect access-control decisions against a seeded engine")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Seed document (overrides `seed.path` in the configuration)
    #[arg(short, long, env = "WARDEN_SEED")]
    seed: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide one request
    Decide {
        #[arg(short, long)]
        user: u64,

        #[arg(short, long)]
        resource: String,

        #[arg(short, long)]
        action: String,

        /// Client IP exposed to conditions as `client_ip`
        #[arg(long)]
        client_ip: Option<String>,

        /// Request metadata as key=value, repeatable
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a user's effective roles
    Expand {
        #[arg(short, long)]
        user: u64,
    },

    /// Run checks for a user, then print the user's audit trail
    Audit {
        #[arg(short, long)]
        user: u64,

        /// Request to decide first, as resource:action, repeatable
        #[arg(long = "check", value_parser = parse_check)]
        checks: Vec<(String, String)>,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Run checks for a user, then print metrics in Prometheus text format
    Metrics {
        #[arg(short, long, default_value_t = 0)]
        user: u64,

        /// Request to decide first, as resource:action, repeatable
        #[arg(long = "check", value_parser = parse_check)]
        checks: Vec<(String, String)>,
    },

    /// List every role and grant in the seeded engine, inactive ones included
    Inspect {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and print the effective values
    CheckConfig,
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn parse_check(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once(':')
        .map(|(r, a)| (r.trim().to_string(), a.trim().to_string()))
        .ok_or_else(|| format!("expected resource:action, got '{}'", s))
}

fn load_config(cli: &Cli) -> Result<WardenConfig> {
    let mut config = match &cli.config {
        Some(path) => WardenConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => WardenConfig::default(),
    };

    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    config.validate().context("Invalid configuration")?;

    if let Some(seed) = &cli.seed {
        config.seed.path = Some(seed.clone());
    }

    Ok(config)
}

async fn build_resolver(config: &WardenConfig) -> Result<PermissionResolver> {
    let resolver = PermissionResolver::in_memory(config.engine_config(), config.audit_config());

    match &config.seed.path {
        Some(path) => {
            let seed = SeedDocument::from_file(path)
                .with_context(|| format!("Failed to load seed from {}", path.display()))?;
            let summary = seed
                .apply(&resolver, 0)
                .await
                .context("Failed to apply seed")?;
            info!(?summary, path = %path.display(), "Seed loaded");
        }
        None => debug!("No seed document configured, engine is empty"),
    }

    Ok(resolver)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { config.logging.level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::CheckConfig => {
            let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered);
            println!("# configuration OK");
        }

        Command::Decide {
            user,
            resource,
            action,
            client_ip,
            metadata,
            json,
        } => {
            let resolver = build_resolver(&config).await?;

            let mut context = RequestContext::new();
            if let Some(ip) = client_ip {
                context = context.with_client_ip(ip.clone());
            }
            for (key, value) in metadata {
                context = context.with_metadata(key.clone(), value.clone());
            }

            let request = DecisionRequest::new(*user, resource.clone(), action.clone())
                .with_context(context);
            let decision = resolver.decide(&request).await.context("Decision failed")?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                println!(
                    "{} ({}) roles=[{}]",
                    if decision.allowed { "ALLOW" } else { "DENY" },
                    decision.reason,
                    decision.effective_roles.join(", ")
                );
            }

            resolver.shutdown().await;
        }

        Command::Expand { user } => {
            let resolver = build_resolver(&config).await?;
            let roles = resolver.expand_roles(*user).await?;

            if roles.is_empty() {
                println!("user {} has no effective roles", user);
            }
            for role in roles {
                println!("{}", role);
            }

            resolver.shutdown().await;
        }

        Command::Audit { user, checks, limit } => {
            if *limit == 0 {
                bail!("--limit must be greater than 0");
            }

            let resolver = build_resolver(&config).await?;

            for (resource, action) in checks {
                let request = DecisionRequest::new(*user, resource.clone(), action.clone());
                // Failures are audited too; the trail below shows them
                if let Err(e) = resolver.decide(&request).await {
                    eprintln!("{}:{} failed: {}", resource, action, e);
                }
            }

            for entry in resolver.query_audit_trail(*user, *limit).await? {
                println!(
                    "{} {:<7} {}:{} result={} reason={}",
                    entry.timestamp.to_rfc3339(),
                    format!("{:?}", entry.operation).to_lowercase(),
                    entry.resource,
                    entry.action,
                    entry.result,
                    entry.reason
                );
            }

            resolver.shutdown().await;
        }

        Command::Metrics { user, checks } => {
            let resolver = build_resolver(&config).await?;

            for (resource, action) in checks {
                let request = DecisionRequest::new(*user, resource.clone(), action.clone());
                if let Err(e) = resolver.decide(&request).await {
                    eprintln!("{}:{} failed: {}", resource, action, e);
                }
            }

            let Some(exported) = resolver.export_metrics() else {
                bail!("metrics are disabled (engine.enable_metrics = false)");
            };
            print!("{}", exported);

            resolver.shutdown().await;
        }

        Command::Inspect { json } => {
            let resolver = build_resolver(&config).await?;
            let roles = resolver.list_roles().await?;
            let grants = resolver.list_grants().await?;

            if *json {
                let listing = serde_json::json!({ "roles": roles, "grants": grants });
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for role in &roles {
                    let status = format!("{:?}", role.status).to_lowercase();
                    println!("role  {:>4} {:<8} {}", role.id, status, role.name);
                }
                for grant in &grants {
                    let status = format!("{:?}", grant.status()).to_lowercase();
                    match grant {
                        Grant::Simple(g) => println!(
                            "grant {:>4} {:<8} simple   {} -> {}:{}",
                            g.id, status, g.role, g.resource, g.action
                        ),
                        Grant::Extended(g) => println!(
                            "grant {:>4} {:<8} extended role={} resource={} action={} priority={} conditions={}",
                            g.id,
                            status,
                            g.role_id,
                            g.resource_id,
                            g.action_id,
                            g.priority,
                            g.conditions.as_ref().map_or(0, |c| c.clauses().len())
                        ),
                    }
                }
            }

            resolver.shutdown().await;
        }
    }

    Ok(())
}
