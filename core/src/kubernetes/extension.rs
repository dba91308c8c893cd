//! The `telepath.io` kubeconfig cluster extension and the remote override
//! that the traffic manager hands out.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Subnet;

/// Key of the cluster extension read from the kubeconfig.
pub const EXTENSION_NAME: &str = "telepath.io";

/// A hostname that should resolve as another name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsMapping {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "alias-for")]
    pub alias_for: String,
}

/// DNS settings of the extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfig {
    /// Address of the local DNS server.
    #[serde(default, alias = "local-ip", skip_serializing_if = "Option::is_none")]
    pub local_ip: Option<IpAddr>,

    /// Address of the cluster's DNS service.
    #[serde(default, alias = "remote-ip", skip_serializing_if = "Option::is_none")]
    pub remote_ip: Option<IpAddr>,

    #[serde(default, alias = "exclude-suffixes", skip_serializing_if = "Vec::is_empty")]
    pub exclude_suffixes: Vec<String>,

    #[serde(default, alias = "include-suffixes", skip_serializing_if = "Vec::is_empty")]
    pub include_suffixes: Vec<String>,

    /// Hostnames never resolved even if they exist.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<DnsMapping>,

    /// Maximum time to wait for a cluster side lookup.
    #[serde(
        default,
        alias = "lookup-timeout",
        with = "crate::humantime_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub lookup_timeout: Option<Duration>,
}

/// Where to find the traffic manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub namespace: String,
}

/// The extension read from the selected kubeconfig cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeconfigExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsConfig>,

    #[serde(default, alias = "also-proxy", skip_serializing_if = "Vec::is_empty")]
    pub also_proxy: Vec<Subnet>,

    #[serde(default, alias = "never-proxy", skip_serializing_if = "Vec::is_empty")]
    pub never_proxy: Vec<Subnet>,

    #[serde(default)]
    pub manager: ManagerConfig,
}

// ============================================================================
// Remote Override
// ============================================================================

/// DNS part of the remote override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDns {
    #[serde(default, rename = "localIP")]
    pub local_ip: Option<IpAddr>,
    #[serde(default, rename = "remoteIP")]
    pub remote_ip: Option<IpAddr>,
    #[serde(default)]
    pub exclude_suffixes: Vec<String>,
    #[serde(default)]
    pub include_suffixes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub mappings: Vec<DnsMapping>,
    #[serde(default, with = "crate::humantime_serde::option")]
    pub lookup_timeout: Option<Duration>,
}

/// Routing part of the remote override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRouting {
    #[serde(default)]
    pub also_proxy: Vec<Subnet>,
    #[serde(default)]
    pub never_proxy: Vec<Subnet>,
}

/// The YAML document sent by the traffic manager.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteExtension {
    #[serde(default)]
    pub dns: Option<RemoteDns>,
    #[serde(default)]
    pub routing: Option<RemoteRouting>,
}

impl KubeconfigExtension {
    /// Merges a remote override. Scalars are only filled when unset; lists
    /// are appended without removing duplicates.
    ///
    /// `dns` is always present afterwards, even when the override carries no
    /// DNS section, so consumers never have to handle a missing section.
    pub fn merge_remote(&mut self, remote: RemoteExtension) {
        let dns = self.dns.get_or_insert_with(DnsConfig::default);
        if let Some(r) = remote.dns {
            if dns.local_ip.is_none() {
                dns.local_ip = r.local_ip;
            }
            if dns.remote_ip.is_none() {
                dns.remote_ip = r.remote_ip;
            }
            dns.exclude_suffixes.extend(r.exclude_suffixes);
            dns.include_suffixes.extend(r.include_suffixes);
            dns.excludes.extend(r.excludes);
            dns.mappings.extend(r.mappings);
            if dns.lookup_timeout.map_or(true, |t| t.is_zero()) {
                dns.lookup_timeout = r.lookup_timeout;
            }
        }
        if let Some(routing) = remote.routing {
            self.also_proxy.extend(routing.also_proxy);
            self.never_proxy.extend(routing.never_proxy);
        }
    }
}
