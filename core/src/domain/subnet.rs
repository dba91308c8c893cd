//! CIDR subnet used by the proxy include/exclude lists.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An IP network in CIDR notation. The address is always the network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subnet {
    addr: IpAddr,
    prefix: u8,
}

impl Subnet {
    /// Creates a subnet, masking off host bits.
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, String> {
        let max = max_prefix(&addr);
        if prefix > max {
            return Err(format!("prefix length {} exceeds {}", prefix, max));
        }
        Ok(Self {
            addr: mask(addr, prefix),
            prefix,
        })
    }

    /// Network address.
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Prefix length.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Returns true if `ip` is inside this subnet.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                mask(ip, self.prefix) == self.addr
            }
            _ => false,
        }
    }
}

fn max_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask(addr: IpAddr, prefix: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let m = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
            IpAddr::V4(Ipv4Addr::from(bits & m))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let m = if prefix == 0 { 0 } else { u128::MAX << (128 - prefix) };
            IpAddr::V6(Ipv6Addr::from(bits & m))
        }
    }
}

impl FromStr for Subnet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| format!("invalid CIDR address {:?}", s))?;
        let prefix = match prefix {
            Some(p) => p
                .parse::<u8>()
                .map_err(|_| format!("invalid CIDR prefix in {:?}", s))?,
            None => max_prefix(&addr),
        };
        Subnet::new(addr, prefix).map_err(|e| format!("invalid CIDR {:?}: {}", s, e))
    }
}

impl TryFrom<String> for Subnet {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Subnet> for String {
    fn from(subnet: Subnet) -> Self {
        subnet.to_string()
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_masks_host_bits() {
        let subnet: Subnet = "10.1.2.3/8".parse().unwrap();
        assert_eq!(subnet.to_string(), "10.0.0.0/8");
        assert!(subnet.contains("10.200.0.1".parse().unwrap()));
        assert!(!subnet.contains("11.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_parse_bare_address() {
        let subnet: Subnet = "192.168.0.7".parse().unwrap();
        assert_eq!(subnet.to_string(), "192.168.0.7/32");

        let subnet: Subnet = "fd00::1".parse().unwrap();
        assert_eq!(subnet.prefix(), 128);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("10.0.0.0/33".parse::<Subnet>().is_err());
        assert!("not-an-ip/8".parse::<Subnet>().is_err());
        assert!("10.0.0.0/x".parse::<Subnet>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let subnet: Subnet = serde_json::from_str("\"172.16.0.0/12\"").unwrap();
        assert_eq!(subnet.prefix(), 12);
        assert_eq!(serde_json::to_string(&subnet).unwrap(), "\"172.16.0.0/12\"");
        assert!(serde_json::from_str::<Subnet>("\"bogus\"").is_err());
    }
}
