//! Domain models shared by discovery backends and the aggregator.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the cluster a registry represents. Empty means "no cluster".
pub type ClusterId = String;

/// Fully qualified service hostname, the key that identifies a logical
/// service across registries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hostname(String);

impl Hostname {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Hostname {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Hostname {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of discovery platform behind a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryKind {
    Kubernetes,
    Consul,
    Eureka,
    CloudFoundry,
    #[serde(rename = "MCP")]
    Mcp,
    #[serde(rename = "MockRegistry")]
    Mock,
}

impl RegistryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kubernetes => "Kubernetes",
            Self::Consul => "Consul",
            Self::Eureka => "Eureka",
            Self::CloudFoundry => "CloudFoundry",
            Self::Mcp => "MCP",
            Self::Mock => "MockRegistry",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change notification kind delivered to service and instance handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Add,
    Update,
    Delete,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Application protocol spoken on a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "GRPC")]
    Grpc,
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTP2")]
    Http2,
    #[serde(rename = "HTTPS")]
    Https,
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
    Mongo,
    Redis,
    #[serde(rename = "UnsupportedProtocol")]
    Unsupported,
}

impl Protocol {
    /// Whether the protocol is routed at L7 as HTTP.
    #[must_use]
    pub const fn is_http(self) -> bool {
        matches!(self, Self::Http | Self::Http2 | Self::Grpc)
    }
}

/// A named port of a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    /// Ascii-only port name, unique within a service.
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl Port {
    #[must_use]
    pub fn new(name: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            name: name.into(),
            port,
            protocol,
        }
    }
}

/// Ordered list of service ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortList(Vec<Port>);

impl PortList {
    #[must_use]
    pub fn new(ports: Vec<Port>) -> Self {
        Self(ports)
    }

    /// Looks up a port by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Port> {
        self.0.iter().find(|p| p.name == name)
    }

    /// Looks up a port by number.
    #[must_use]
    pub fn get_by_port(&self, num: u16) -> Option<&Port> {
        self.0.iter().find(|p| p.port == num)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Port> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a PortList {
    type Item = &'a Port;
    type IntoIter = std::slice::Iter<'a, Port>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Port> for PortList {
    fn from_iter<I: IntoIterator<Item = Port>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How a sidecar resolves the endpoints of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Proxy load-balances across the instances it was told about.
    #[default]
    ClientSideLb,
    /// Proxy resolves the hostname through DNS.
    DnsLb,
    /// Proxy forwards to the original destination.
    Passthrough,
}

/// A logical service as reported by a registry.
///
/// After aggregation there is exactly one `Service` per hostname; the
/// `addresses` map then carries the address the service has in each cluster
/// that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub hostname: Hostname,
    /// Address (VIP) of the service in the reporting registry.
    pub address: String,
    /// Per-cluster addresses, keyed by cluster id.
    #[serde(default)]
    pub addresses: HashMap<ClusterId, String>,
    #[serde(default)]
    pub ports: PortList,
    #[serde(default)]
    pub external_name: Option<String>,
    #[serde(default)]
    pub service_account: Option<String>,
    #[serde(default)]
    pub mesh_external: bool,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
}

impl Service {
    #[must_use]
    pub fn new(hostname: impl Into<Hostname>, address: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            addresses: HashMap::new(),
            ports: PortList::default(),
            external_name: None,
            service_account: None,
            mesh_external: false,
            resolution: Resolution::default(),
            creation_time: None,
        }
    }

    #[must_use]
    pub fn with_ports(mut self, ports: PortList) -> Self {
        self.ports = ports;
        self
    }

    #[must_use]
    pub fn with_service_account(mut self, account: impl Into<String>) -> Self {
        self.service_account = Some(account.into());
        self
    }

    /// Address of the service inside `cluster_id`, falling back to the
    /// service's own address when that cluster did not report one.
    #[must_use]
    pub fn get_cluster_local_address(&self, cluster_id: &str) -> &str {
        self.addresses
            .get(cluster_id)
            .map_or(self.address.as_str(), String::as_str)
    }
}

/// Label set attached to a workload. Ordered so that rendering is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// True if every label in `self` is present with the same value in `that`.
    /// An empty label set is a subset of everything.
    #[must_use]
    pub fn subset_of(&self, that: &Self) -> bool {
        self.0
            .iter()
            .all(|(k, v)| that.0.get(k).is_some_and(|tv| tv == v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Label filter: an instance matches when any of the label sets is a subset
/// of its labels. An empty collection matches every instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelsCollection(Vec<Labels>);

impl LabelsCollection {
    #[must_use]
    pub fn new(labels: Vec<Labels>) -> Self {
        Self(labels)
    }

    #[must_use]
    pub fn has_subset_of(&self, that: &Labels) -> bool {
        self.0.is_empty() || self.0.iter().any(|l| l.subset_of(that))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Tcp,
    Unix,
}

/// Where a single instance of a service can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    #[serde(default)]
    pub family: AddressFamily,
    /// IP address or unix socket path.
    pub address: String,
    /// Zero for unix sockets.
    pub port: u16,
    /// Service port this endpoint backs.
    pub service_port: Port,
}

impl NetworkEndpoint {
    #[must_use]
    pub fn tcp(address: impl Into<String>, port: u16, service_port: Port) -> Self {
        Self {
            family: AddressFamily::Tcp,
            address: address.into(),
            port,
            service_port,
        }
    }
}

/// One endpoint of a service together with the workload labels.
///
/// Instances are never merged across registries.
#[derive(Debug, Clone)]
pub struct ServiceInstance {
    pub endpoint: NetworkEndpoint,
    pub service: Arc<Service>,
    pub labels: Labels,
    pub availability_zone: Option<String>,
    pub service_account: Option<String>,
}

impl ServiceInstance {
    #[must_use]
    pub fn new(service: Arc<Service>, endpoint: NetworkEndpoint) -> Self {
        Self {
            endpoint,
            service,
            labels: Labels::default(),
            availability_zone: None,
            service_account: None,
        }
    }

    #[must_use]
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    /// Applies a label filter to this instance.
    #[must_use]
    pub fn matches(&self, filter: &LabelsCollection) -> bool {
        filter.has_subset_of(&self.labels)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    #[default]
    Sidecar,
    Ingress,
    Router,
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sidecar => "sidecar",
            Self::Ingress => "ingress",
            Self::Router => "router",
        })
    }
}

/// A workload proxy connected to the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub kind: ProxyKind,
    pub ip_address: String,
    pub id: String,
    pub domain: String,
    /// Cluster the proxy runs in; filled in once a registry claims it.
    #[serde(default)]
    pub cluster_id: ClusterId,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Proxy {
    #[must_use]
    pub fn new(
        kind: ProxyKind,
        ip_address: impl Into<String>,
        id: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            ip_address: ip_address.into(),
            id: id.into(),
            domain: domain.into(),
            cluster_id: ClusterId::new(),
            metadata: HashMap::new(),
        }
    }

    /// Node identifier in `kind~ip~id~domain` form.
    #[must_use]
    pub fn service_node(&self) -> String {
        format!("{}~{}~{}~{}", self.kind, self.ip_address, self.id, self.domain)
    }
}
