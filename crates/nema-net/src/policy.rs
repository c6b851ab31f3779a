// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Network access policy and the identity queries it gates.
//!
//! Hosts embedding the runtime let their operators restrict what loaded
//! programs may reach: everything, only the local machine, or nothing.
//! The policy gates the two identity queries here. A program that may
//! only talk to the local machine is told its host is "localhost", and a
//! program with no network access is told nothing at all, so it cannot
//! even learn the machine's name.

use std::net::{IpAddr, Ipv4Addr};

use sysinfo::{Networks, System};

/// How far out a program may reach.
///
/// Ordered by restriction: [`Open`](NetAccess::Open) is the least
/// restricted, [`Denied`](NetAccess::Denied) the most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NetAccess {
    /// Any network access is allowed.
    Open,
    /// Only the local machine may be contacted.
    LocalOnly,
    /// No network access at all.
    Denied,
}

/// The client-side and server-side access levels, set by the embedding
/// host's operator.
///
/// The two sides gate identity queries jointly: as long as *either* side
/// may reach beyond the local machine, the real identity is visible,
/// because a program that can reach out can discover it anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetPolicy {
    /// Restriction on outbound connections.
    pub client: NetAccess,
    /// Restriction on listening and accepting.
    pub server: NetAccess,
}

impl NetPolicy {
    /// Full network access on both sides.
    pub fn open_access() -> Self {
        Self {
            client: NetAccess::Open,
            server: NetAccess::Open,
        }
    }

    /// Local machine only, both sides.
    pub fn localhost_only() -> Self {
        Self {
            client: NetAccess::LocalOnly,
            server: NetAccess::LocalOnly,
        }
    }

    /// No network access at all.
    pub fn denied() -> Self {
        Self {
            client: NetAccess::Denied,
            server: NetAccess::Denied,
        }
    }

    /// The restriction that governs identity visibility: the least
    /// restrictive of the two sides.
    pub fn effective(&self) -> NetAccess {
        self.client.min(self.server)
    }

    /// The host name this policy lets a program see.
    ///
    /// `None` under full denial, `"localhost"` under local-only access,
    /// and the machine's real name otherwise. A lookup failure is
    /// reported as `None` rather than a fabricated name.
    pub fn host_name(&self) -> Option<String> {
        match self.effective() {
            NetAccess::Denied => None,
            NetAccess::LocalOnly => Some("localhost".to_string()),
            NetAccess::Open => System::host_name(),
        }
    }

    /// The host IP address this policy lets a program see.
    ///
    /// `None` under full denial, `127.0.0.1` under local-only access, and
    /// the first non-loopback interface address otherwise.
    pub fn host_ip(&self) -> Option<IpAddr> {
        match self.effective() {
            NetAccess::Denied => None,
            NetAccess::LocalOnly => Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            NetAccess::Open => first_local_ip(),
        }
    }
}

/// The operator-unconfigured default is full denial: network access is
/// something hosts opt into.
impl Default for NetPolicy {
    fn default() -> Self {
        Self::denied()
    }
}

/// Scans the machine's interfaces for a non-loopback address, preferring
/// IPv4 over IPv6.
fn first_local_ip() -> Option<IpAddr> {
    let networks = Networks::new_with_refreshed_list();
    let mut v6 = None;
    for (name, network) in &networks {
        for ip_network in network.ip_networks() {
            let addr = ip_network.addr;
            if addr.is_loopback() {
                continue;
            }
            match addr {
                IpAddr::V4(_) => {
                    log::debug!("Using {addr} from interface {name} as the local identity");
                    return Some(addr);
                }
                IpAddr::V6(_) => v6 = v6.or(Some(addr)),
            }
        }
    }
    if v6.is_none() {
        log::debug!("No non-loopback interface address found");
    }
    v6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_denies_everything() {
        let policy = NetPolicy::default();
        assert_eq!(policy.effective(), NetAccess::Denied);
        assert_eq!(policy.host_name(), None);
        assert_eq!(policy.host_ip(), None);
    }

    #[test]
    fn localhost_policy_reports_the_loopback_identity() {
        let policy = NetPolicy::localhost_only();
        assert_eq!(policy.host_name(), Some("localhost".to_string()));
        assert_eq!(policy.host_ip(), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn least_restrictive_side_governs() {
        let mixed = NetPolicy {
            client: NetAccess::Open,
            server: NetAccess::Denied,
        };
        assert_eq!(mixed.effective(), NetAccess::Open);
        // With one side open, identity queries behave exactly as under a
        // fully open policy.
        assert_eq!(mixed.host_name(), NetPolicy::open_access().host_name());

        let half_local = NetPolicy {
            client: NetAccess::LocalOnly,
            server: NetAccess::Denied,
        };
        assert_eq!(half_local.effective(), NetAccess::LocalOnly);
        assert_eq!(half_local.host_name(), Some("localhost".to_string()));
    }

    #[test]
    fn open_queries_do_not_fabricate_loopback() {
        // The real identity can legitimately be absent (no interfaces, no
        // host name), but it must never silently degrade to the localhost
        // placeholder that LocalOnly uses.
        let policy = NetPolicy::open_access();
        if let Some(ip) = policy.host_ip() {
            assert!(!ip.is_loopback());
        }
    }

    #[test]
    fn restriction_ordering_matches_declaration() {
        assert!(NetAccess::Open < NetAccess::LocalOnly);
        assert!(NetAccess::LocalOnly < NetAccess::Denied);
        assert_eq!(NetAccess::Open.min(NetAccess::Denied), NetAccess::Open);
    }
}
