use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::{DEFAULT_MAX_DEPTH, DNS_PORT};

/// IPv4 addresses of a.root-servers.net through m.root-servers.net
pub const ROOT_SERVERS: [Ipv4Addr; 13] = [
    Ipv4Addr::new(198, 41, 0, 4),
    Ipv4Addr::new(170, 247, 170, 2),
    Ipv4Addr::new(192, 33, 4, 12),
    Ipv4Addr::new(199, 7, 91, 13),
    Ipv4Addr::new(192, 203, 230, 10),
    Ipv4Addr::new(192, 5, 5, 241),
    Ipv4Addr::new(192, 112, 36, 4),
    Ipv4Addr::new(198, 97, 190, 53),
    Ipv4Addr::new(192, 36, 148, 17),
    Ipv4Addr::new(192, 58, 128, 30),
    Ipv4Addr::new(193, 0, 14, 129),
    Ipv4Addr::new(199, 7, 83, 42),
    Ipv4Addr::new(202, 12, 27, 33),
];

/// Settings of a `Resolver`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Where every walk without a cached delegation starts
    pub root_servers: Vec<IpAddr>,
    /// Port used for every upstream server
    pub port: u16,
    /// How long to wait for a matching reply to one attempt
    pub timeout: Duration,
    /// Attempts per server set, spread round robin over its servers
    pub max_attempts: usize,
    /// Referrals plus CNAME hops allowed in one chain
    pub max_depth: usize,
    /// How deep nameserver-address lookups may nest
    pub max_nesting: usize,
    /// Upstream queries allowed for one top-level resolution
    pub max_queries: usize,
    /// Advertised EDNS0 payload size and receive limit for UDP
    pub udp_payload_size: u16,
    /// Use AAAA glue as well as A glue
    pub ipv6: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            root_servers: ROOT_SERVERS.iter().map(|&ip| IpAddr::V4(ip)).collect(),
            port: DNS_PORT,
            timeout: Duration::from_secs(2),
            max_attempts: 3,
            max_depth: DEFAULT_MAX_DEPTH,
            max_nesting: 4,
            max_queries: 128,
            udp_payload_size: 1232,
            ipv6: true,
        }
    }
}

impl ResolverConfig {
    /// Parses a comma separated list of root server addresses
    pub fn parse_root_servers(list: &str) -> Result<Vec<IpAddr>, std::net::AddrParseError> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect()
    }

    pub fn with_root_servers(mut self, root_servers: Vec<IpAddr>) -> Self {
        self.root_servers = root_servers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Receive buffer for one UDP response; never below the classic 512
    pub(crate) fn udp_receive_limit(&self) -> usize {
        usize::from(self.udp_payload_size.max(512))
    }
}
