use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use request_interceptor::{metrics, InstallOptions};
use reqgate::simulation::{run_plan, Plan, SimulationReport, TraceEntry};

use super::output::{emit_structured, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// Plan file listing send/fetch/signal steps (JSON or YAML)
    #[arg(long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Host name of the simulated page (overrides the options file and the plan)
    #[arg(long)]
    pub host: Option<String>,

    /// Exempt targets on the page's own host
    #[arg(long)]
    pub allow_current_host: bool,

    /// How long to wait for fetches to settle before reporting them as pending
    #[arg(long, default_value = "1s")]
    pub settle_timeout: String,
}

pub async fn cmd_simulate(
    args: SimulateArgs,
    mut options: InstallOptions,
    output: &OutputFormat,
) -> Result<()> {
    let mut plan = Plan::load(&args.plan)?;
    if let Some(host) = args.host {
        plan.host = Some(host);
    }
    if args.allow_current_host {
        options.allow_current_host = true;
    }
    let settle_timeout: Duration = humantime::parse_duration(&args.settle_timeout)
        .with_context(|| format!("invalid settle timeout: {}", args.settle_timeout))?;

    let report = run_plan(&plan, options, settle_timeout).await;
    if !emit_structured(output, &report)? {
        print_human(&report);
    }
    Ok(())
}

fn print_human(report: &SimulationReport) {
    for entry in &report.trace {
        match entry {
            TraceEntry::Signal { name } => println!("signal   {name}"),
            TraceEntry::Dispatch { kind, target } => println!("dispatch {kind:<5} {target}"),
            TraceEntry::Settled { target, status } => println!("settled  {status}   {target}"),
            TraceEntry::Failed { target, error } => println!("failed   {target}: {error}"),
            TraceEntry::Pending { target } => println!("pending  {target}"),
        }
    }
    println!("gate ready: {}", report.ready);

    let totals = metrics::snapshot();
    println!(
        "totals: dispatched {} send / {} fetch, deferred {}, released {}",
        totals.dispatched_send, totals.dispatched_fetch, totals.deferred, totals.released
    );
}
