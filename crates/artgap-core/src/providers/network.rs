//! Outbound gate for model providers.
//!
//! Every provider call passes through [`check_outbound`]. The environment
//! variable wins over the in-process policy, so `ARTGAP_NETWORK_POLICY=deny`
//! guarantees an offline run even when code installs an allow scope.

use std::sync::{Mutex, OnceLock};
use tracing::warn;

pub const NETWORK_POLICY_ENV: &str = "ARTGAP_NETWORK_POLICY";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkPolicy {
    Allow,
    /// Blocked, with the reason shown to the user.
    Deny(String),
}

impl NetworkPolicy {
    /// `allow`, or `deny`/`offline`, case-insensitive. Anything else is `None`.
    pub fn from_env_value(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "allow" => Some(NetworkPolicy::Allow),
            mode @ ("deny" | "offline") => {
                Some(NetworkPolicy::Deny(format!("{NETWORK_POLICY_ENV}={mode}")))
            }
            _ => None,
        }
    }
}

fn scoped() -> &'static Mutex<NetworkPolicy> {
    static SCOPED: OnceLock<Mutex<NetworkPolicy>> = OnceLock::new();
    SCOPED.get_or_init(|| Mutex::new(NetworkPolicy::Allow))
}

/// Installs a policy for the current scope; the previous one comes back on drop.
pub struct NetworkPolicyGuard {
    restore: NetworkPolicy,
}

impl NetworkPolicyGuard {
    pub fn set(policy: NetworkPolicy) -> Self {
        let mut slot = scoped().lock().unwrap_or_else(|p| p.into_inner());
        Self {
            restore: std::mem::replace(&mut *slot, policy),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self::set(NetworkPolicy::Deny(reason.into()))
    }
}

impl Drop for NetworkPolicyGuard {
    fn drop(&mut self) {
        let mut slot = scoped().lock().unwrap_or_else(|p| p.into_inner());
        *slot = self.restore.clone();
    }
}

/// Policy in force right now: a recognised env value, else the scoped one.
pub fn current_policy() -> NetworkPolicy {
    if let Ok(raw) = std::env::var(NETWORK_POLICY_ENV) {
        match NetworkPolicy::from_env_value(&raw) {
            Some(NetworkPolicy::Deny(reason)) => return NetworkPolicy::Deny(reason),
            Some(NetworkPolicy::Allow) => {}
            None => warn!(value = %raw, "ignoring unrecognised {}", NETWORK_POLICY_ENV),
        }
    }
    scoped().lock().unwrap_or_else(|p| p.into_inner()).clone()
}

/// Fails when the current policy blocks requests to `url`.
pub fn check_outbound(url: &str) -> anyhow::Result<()> {
    let NetworkPolicy::Deny(reason) = current_policy() else {
        return Ok(());
    };
    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string());
    anyhow::bail!("outbound network blocked by policy (host={host}): {reason}")
}
