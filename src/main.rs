mod api;
mod audit;
mod cli;
mod config;
mod deactivation;
mod error;
mod model;
mod prompt;
mod render;
mod users;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fbs-admin",
    about = "User lifecycle administration for the facility booking system"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(long, global = true, env = "FBS_API_URL", help = "Backend API base URL")]
    pub base_url: Option<String>,

    #[arg(long, global = true, help = "API token (overrides config and env)")]
    pub token: Option<String>,

    #[arg(long, global = true, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "POLICY",
        help = "Booking cancellation policy: attempt-all, fail-fast"
    )]
    pub cascade: Option<String>,

    #[arg(short, long, global = true, help = "Answer yes to every confirmation")]
    pub yes: bool,

    #[arg(long, global = true, help = "Audit log directory")]
    pub audit_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Do not write an audit log")]
    pub no_audit: bool,

    #[arg(long, global = true, help = "Verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Debug output (print settings)")]
    pub debug: bool,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// List platform users
    Users {
        #[arg(long, default_value = "all", help = "all, active or deactive")]
        status: String,
        #[arg(long, default_value = "", help = "Case-insensitive name filter")]
        search: String,
    },
    /// Deactivate a user, cancelling future bookings first
    Deactivate { user_id: String },
    /// Activate a user
    Activate { user_id: String },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load()?
    };

    if let Some(base_url) = &args.base_url {
        cfg.api.base_url = Some(base_url.clone());
    }
    if let Some(token) = &args.token {
        cfg.api.token = Some(token.clone());
    }
    if let Some(policy) = &args.cascade {
        match config::CascadePolicy::from_str(policy) {
            Some(policy) => cfg.workflow.cascade = Some(policy),
            None => {
                return Err(anyhow::anyhow!(
                    "Invalid cascade policy: {}. Use: attempt-all, fail-fast",
                    policy
                ))
            }
        }
    }

    if let Err(errors) = cfg.validate() {
        for e in &errors {
            eprintln!("Config error: {}", e);
        }
        return Err(anyhow::anyhow!(
            "invalid configuration ({} problem(s))",
            errors.len()
        ));
    }

    let token = cfg.api.resolve_token();
    let has_token = token.is_some();
    let client = api::Client::new(&cfg.api, token);
    if args.debug {
        eprintln!("[DEBUG] Base URL: {}", client.base_url());
        eprintln!("[DEBUG] Auth header: {}", cfg.api.auth_header());
        eprintln!("[DEBUG] Token: {}", if has_token { "<set>" } else { "<none>" });
        eprintln!("[DEBUG] Timeout: {}ms", cfg.api.timeout_ms());
        eprintln!(
            "[DEBUG] Cascade: {} ({})",
            cfg.workflow.cascade().as_str(),
            if cfg.workflow.parallel() { "parallel" } else { "sequential" }
        );
    }
    if !has_token {
        eprintln!("Warning: no API token configured; set FBS_API_TOKEN or api.token");
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    let audit = if cfg.audit.enabled() && !args.no_audit {
        let dir = args.audit_dir.clone().unwrap_or_else(|| cfg.audit.dir());
        audit::AuditLog::open(&dir, &session_id)?
    } else {
        audit::AuditLog::disabled(&session_id)
    };

    let confirmer = prompt::Confirmer::new(args.yes);
    let ctx = cli::Context::new(args, Box::new(client), &cfg, confirmer, audit);

    match ctx.args.command.clone() {
        Some(Command::Users { status, search }) => {
            let filter = users::StatusFilter::from_str(&status).ok_or_else(|| {
                anyhow::anyhow!("Invalid status: {}. Use: all, active, deactive", status)
            })?;
            cli::list_users(&ctx, filter, &search)
        }
        Some(Command::Deactivate { user_id }) => {
            cli::deactivate(&ctx, &model::UserId::new(user_id))
        }
        Some(Command::Activate { user_id }) => cli::activate(&ctx, &model::UserId::new(user_id)),
        None => cli::run_repl(ctx),
    }
}
