//! Decides, per outbound call, whether it may be dispatched now.
//!
//! Matching is purely textual: no URL parsing takes place, so a whitelist entry of
//! `example.com` exempts `http://sub.example.com/x` as well as `http://evil.test/?example.com`.

use serde::{Deserialize, Serialize};

/// Exemptions fixed at installation time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    pub whitelist: Vec<String>,
    pub allow_current_host: bool,
    pub current_host: String,
}

/// Why a call was allowed through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowReason {
    Ready,
    Whitelisted,
    CurrentHost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Allow(AllowReason),
    Defer,
}

impl Permission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Permission::Allow(_))
    }
}

impl GatePolicy {
    pub fn evaluate(&self, target: &str, ready: bool) -> Permission {
        if ready {
            Permission::Allow(AllowReason::Ready)
        } else if self.is_whitelisted(target) {
            Permission::Allow(AllowReason::Whitelisted)
        } else if self.allow_current_host && self.is_on_current_host(target) {
            Permission::Allow(AllowReason::CurrentHost)
        } else {
            Permission::Defer
        }
    }

    pub fn is_permitted(&self, target: &str, ready: bool) -> bool {
        self.evaluate(target, ready).is_allowed()
    }

    /// True when any whitelist entry occurs in `target` (case-sensitive, unanchored).
    pub fn is_whitelisted(&self, target: &str) -> bool {
        self.whitelist.iter().any(|entry| target.contains(entry.as_str()))
    }

    /// True when the page's host name is non-empty and occurs in `target`.
    pub fn is_on_current_host(&self, target: &str) -> bool {
        !self.current_host.is_empty() && target.contains(self.current_host.as_str())
    }
}
