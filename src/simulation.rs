//! Scripted page simulation: replays a plan of calls and signals against an installed gate
//! and a fake transport, recording what was dispatched and how each fetch settled.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use futures::FutureExt;
use request_interceptor::{
    install, DispatchHooks, FetchFuture, FetchHook, FetchRequest, FetchResponse, InstallOptions,
    SendHook, SendRequest, SignalBus, TransportError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One scripted action on the simulated page.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Send {
        target: String,
        #[serde(default)]
        body: Option<String>,
    },
    Fetch {
        target: String,
        /// Make the simulated transport fail this call.
        #[serde(default)]
        fail: bool,
        #[serde(default)]
        latency_ms: u64,
    },
    Signal {
        name: String,
    },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Plan {
    /// Host name of the simulated page; overrides the options file when set.
    #[serde(default)]
    pub host: Option<String>,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn parse(raw: &str) -> Result<Self> {
        match serde_json::from_str(raw) {
            Ok(plan) => Ok(plan),
            Err(json_err) => serde_yaml::from_str(raw).with_context(|| {
                format!("plan is neither valid JSON ({json_err}) nor valid YAML")
            }),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read plan {}", path.display()))?;
        Self::parse(&raw)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEntry {
    Signal { name: String },
    Dispatch { kind: String, target: String },
    Settled { target: String, status: u16 },
    Failed { target: String, error: String },
    Pending { target: String },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationReport {
    pub ready: bool,
    pub trace: Vec<TraceEntry>,
}

#[derive(Clone, Copy, Default)]
struct Behaviour {
    fail: bool,
    latency: Duration,
}

struct SimulatedTransport {
    trace: Rc<RefCell<Vec<TraceEntry>>>,
    behaviour: HashMap<String, Behaviour>,
}

impl SimulatedTransport {
    fn new(plan: &Plan, trace: Rc<RefCell<Vec<TraceEntry>>>) -> Self {
        let behaviour = plan
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::Fetch {
                    target,
                    fail,
                    latency_ms,
                } => Some((
                    target.clone(),
                    Behaviour {
                        fail: *fail,
                        latency: Duration::from_millis(*latency_ms),
                    },
                )),
                _ => None,
            })
            .collect();
        Self { trace, behaviour }
    }
}

impl SendHook for SimulatedTransport {
    fn send(&self, request: SendRequest) {
        self.trace.borrow_mut().push(TraceEntry::Dispatch {
            kind: "send".into(),
            target: request.target,
        });
    }
}

impl FetchHook for SimulatedTransport {
    fn fetch(&self, request: FetchRequest) -> FetchFuture {
        self.trace.borrow_mut().push(TraceEntry::Dispatch {
            kind: "fetch".into(),
            target: request.target.clone(),
        });
        let behaviour = self
            .behaviour
            .get(&request.target)
            .copied()
            .unwrap_or_default();
        async move {
            if !behaviour.latency.is_zero() {
                tokio::time::sleep(behaviour.latency).await;
            }
            if behaviour.fail {
                Err(TransportError::network(format!(
                    "simulated failure for {}",
                    request.target
                )))
            } else {
                Ok(FetchResponse::ok(&request, "simulated"))
            }
        }
        .boxed_local()
    }
}

/// Run `plan` against a fresh page. Fetches still unsettled after `settle_timeout` are
/// reported as pending.
pub async fn run_plan(
    plan: &Plan,
    mut options: InstallOptions,
    settle_timeout: Duration,
) -> SimulationReport {
    if let Some(host) = &plan.host {
        options.current_host = host.clone();
    }

    let trace = Rc::new(RefCell::new(Vec::new()));
    let transport = Rc::new(SimulatedTransport::new(plan, Rc::clone(&trace)));
    let hooks = DispatchHooks::new(transport.clone(), transport.clone());
    let bus = SignalBus::new(16);
    let interceptor = install(Rc::clone(&hooks), bus.clone(), options);

    let mut outstanding: Vec<(String, FetchFuture)> = Vec::new();
    for step in &plan.steps {
        debug!(?step, "running plan step");
        match step {
            Step::Send { target, body } => {
                let mut request = SendRequest::open("POST", target.clone());
                request.body = body.clone();
                hooks.send(request);
            }
            Step::Fetch { target, .. } => {
                let future = hooks.fetch(FetchRequest::get(target.clone()));
                outstanding.push((target.clone(), future));
            }
            Step::Signal { name } => {
                trace
                    .borrow_mut()
                    .push(TraceEntry::Signal { name: name.clone() });
                bus.fire(name);
            }
        }
    }

    let settled = join_all(outstanding.into_iter().map(|(target, future)| async move {
        let outcome = tokio::time::timeout(settle_timeout, future).await;
        (target, outcome)
    }))
    .await;

    let mut trace = trace.borrow().clone();
    for (target, outcome) in settled {
        trace.push(match outcome {
            Ok(Ok(response)) => TraceEntry::Settled {
                target,
                status: response.status,
            },
            Ok(Err(err)) => TraceEntry::Failed {
                target,
                error: err.to_string(),
            },
            Err(_) => TraceEntry::Pending { target },
        });
    }

    SimulationReport {
        ready: interceptor.is_ready(),
        trace,
    }
}
