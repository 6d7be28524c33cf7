use anyhow::Result;
use clap::Args;
use request_interceptor::{AllowReason, InstallOptions, Permission};
use serde::Serialize;

use super::output::{emit_structured, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Target URL (matched textually, never parsed)
    pub target: String,

    /// Host name of the page
    #[arg(long)]
    pub host: Option<String>,

    /// Exempt targets on the page's own host
    #[arg(long)]
    pub allow_current_host: bool,

    /// Evaluate as if the readiness signal had already fired
    #[arg(long)]
    pub ready: bool,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    target: &'a str,
    decision: &'static str,
    reason: Option<AllowReason>,
}

pub fn cmd_check(args: CheckArgs, mut options: InstallOptions, output: &OutputFormat) -> Result<()> {
    if let Some(host) = args.host {
        options.current_host = host;
    }
    if args.allow_current_host {
        options.allow_current_host = true;
    }

    let report = match options.policy().evaluate(&args.target, args.ready) {
        Permission::Allow(reason) => CheckReport {
            target: &args.target,
            decision: "dispatch",
            reason: Some(reason),
        },
        Permission::Defer => CheckReport {
            target: &args.target,
            decision: "defer",
            reason: None,
        },
    };

    if !emit_structured(output, &report)? {
        match report.reason {
            Some(reason) => println!("dispatch {} ({reason:?})", report.target),
            None => println!("defer    {}", report.target),
        }
    }
    Ok(())
}
