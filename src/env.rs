//! Deterministic environment rendering of updates.
//!
//! [`marshal`] turns an [`Update`] into a lexicographically sorted list of
//! `KEY=VALUE` strings suitable for a child process environment. Pure and
//! deterministic: the same update always yields the same list in the same
//! order.

use std::net::IpAddr;

use crate::monitor::Update;
use crate::network::{Address, IpFamily, Route, filter};

/// Renders an update as sorted `KEY=VALUE` pairs.
///
/// Key families:
/// - `IPMON_TYPE`, `IPMON_CHANGE` (first change tag only)
/// - `IPMON_ADDR`/`IPMON_MASK`/`IPMON_GW`/`IPMON_SRC`/`IPMON_LINK` for the
///   single change the update describes
/// - per interface: `IPMON_LL_IPV{4,6}_<iface>` for link-local addresses,
///   `IPMON_IPV{4,6}_<iface>` (+`_MASK_`, +`_TTL_`) for global addresses
///   (unique-local IPv6 excluded), and `IPMON_UP_<iface>`
/// - `IPMON_IPV{4,6}`/`_IF`/`_GW` for the preferred default route of each
///   family
#[must_use]
pub fn marshal(update: &Update) -> Vec<String> {
    let mut env = Vec::new();

    env.push(format!("IPMON_TYPE={}", update.kind.label()));
    if let Some(change) = update.changes().first() {
        env.push(format!("IPMON_CHANGE={change}"));
    }
    if let Some(address) = update.address() {
        env.push(format!("IPMON_ADDR={}", address.address));
        env.push(format!("IPMON_MASK={}", address.prefix_len));
    }
    if let Some(gateway) = update.gateway() {
        env.push(format!("IPMON_GW={gateway}"));
    }
    if let Some(source) = update.source() {
        env.push(format!("IPMON_SRC={source}"));
    }

    for (name, interface) in &update.interfaces {
        for address in &interface.addresses {
            marshal_address(&mut env, name, address);
        }
        env.push(format!("IPMON_UP_{name}={}", u8::from(interface.up)));
    }

    if !update.link().is_empty() {
        env.push(format!("IPMON_LINK={}", update.link()));
    }

    marshal_default_route(&mut env, &update.routes, IpFamily::V4, "IPMON_IPV4");
    marshal_default_route(&mut env, &update.routes, IpFamily::V6, "IPMON_IPV6");

    env.sort();
    env
}

fn marshal_address(env: &mut Vec<String>, name: &str, address: &Address) {
    let ip = address.address;
    if filter::is_link_local_unicast(&ip) {
        match ip {
            IpAddr::V4(_) => env.push(format!("IPMON_LL_IPV4_{name}={ip}")),
            IpAddr::V6(_) => env.push(format!("IPMON_LL_IPV6_{name}={ip}")),
        }
    }
    if !filter::is_global_unicast(&ip) {
        return;
    }
    match ip {
        IpAddr::V4(_) => {
            if address.valid_lft > 0 {
                env.push(format!("IPMON_IPV4_TTL_{name}={}", address.valid_lft));
            }
            env.push(format!("IPMON_IPV4_{name}={ip}"));
            env.push(format!("IPMON_IPV4_MASK_{name}={}", address.prefix_len));
        }
        IpAddr::V6(v6) => {
            // unique-local addresses never make it into the environment
            if v6.is_unique_local() {
                return;
            }
            if address.valid_lft > 0 {
                env.push(format!("IPMON_IPV6_TTL_{name}={}", address.valid_lft));
            }
            env.push(format!("IPMON_IPV6_{name}={ip}"));
            env.push(format!("IPMON_IPV6_MASK_{name}={}", address.prefix_len));
        }
    }
}

/// Emits the preferred default route of one family: the lowest priority
/// value wins, the first route seen keeps ties.
fn marshal_default_route(env: &mut Vec<String>, routes: &[Route], family: IpFamily, prefix: &str) {
    let mut best: Option<&Route> = None;
    for route in routes
        .iter()
        .filter(|route| route.is_default() && route.family() == family)
    {
        if best.is_none_or(|current| route.priority() < current.priority()) {
            best = Some(route);
        }
    }
    let Some(route) = best else { return };

    if let Some(source) = route.source {
        env.push(format!("{prefix}={source}"));
    }
    env.push(format!("{prefix}_IF={}", route.link));
    if let Some(gateway) = route.gateway {
        env.push(format!("{prefix}_GW={gateway}"));
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
