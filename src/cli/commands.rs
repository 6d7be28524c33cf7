use clap::Subcommand;

use super::check::CheckArgs;
use super::simulate::SimulateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Replay a scripted page against the gate and report what went out when
    Simulate(SimulateArgs),

    /// Show whether a single target would be dispatched or deferred
    Check(CheckArgs),
}
