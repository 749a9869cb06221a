//! Identities and the store keys derived from them.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Anything that can be rate limited.
///
/// `canonical` must be stable for the same identity and distinct for
/// different identities.
pub trait Identity {
    fn canonical(&self) -> String;
}

impl Identity for IpAddr {
    /// IPv4-mapped IPv6 addresses collapse to their IPv4 form
    fn canonical(&self) -> String {
        self.to_canonical().to_string()
    }
}

impl Identity for Ipv4Addr {
    fn canonical(&self) -> String {
        self.to_string()
    }
}

impl Identity for Ipv6Addr {
    fn canonical(&self) -> String {
        IpAddr::V6(*self).canonical()
    }
}

impl Identity for SocketAddr {
    /// Only the host counts; every port of a peer shares one window
    fn canonical(&self) -> String {
        self.ip().canonical()
    }
}

impl Identity for str {
    /// Text that parses as an IP address is keyed like the address itself
    fn canonical(&self) -> String {
        match self.parse::<IpAddr>() {
            Ok(ip) => ip.canonical(),
            Err(_) => self.to_string(),
        }
    }
}

impl Identity for String {
    fn canonical(&self) -> String {
        self.as_str().canonical()
    }
}

impl<T: Identity + ?Sized> Identity for &T {
    fn canonical(&self) -> String {
        (**self).canonical()
    }
}

/// Turns identities into store keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Store key for an identity
    pub fn key<I: Identity + ?Sized>(&self, identity: &I) -> String {
        format!("{}{}", self.prefix, identity.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_canonical() {
        let ip: IpAddr = "137.70.0.1".parse().unwrap();
        assert_eq!(ip.canonical(), "137.70.0.1");
    }

    #[test]
    fn test_ipv4_mapped_collapses() {
        let mapped: IpAddr = "::ffff:137.70.0.1".parse().unwrap();
        let plain: IpAddr = "137.70.0.1".parse().unwrap();
        assert_eq!(mapped.canonical(), plain.canonical());

        let v6: Ipv6Addr = "::ffff:10.0.0.1".parse().unwrap();
        assert_eq!(v6.canonical(), "10.0.0.1");
    }

    #[test]
    fn test_ipv6_is_normalized() {
        let a: IpAddr = "2001:0db8:0000:0000:0000:0000:0000:0001".parse().unwrap();
        let b: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(a.canonical(), "2001:db8::1");
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_socket_addr_ignores_port() {
        let a: SocketAddr = "192.168.1.1:4000".parse().unwrap();
        let b: SocketAddr = "192.168.1.1:5000".parse().unwrap();
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_ip_text_matches_parsed_ip() {
        let ip: IpAddr = "::ffff:10.0.0.1".parse().unwrap();
        assert_eq!("::ffff:10.0.0.1".canonical(), ip.canonical());
        assert_eq!("2001:0db8::0001".to_string().canonical(), "2001:db8::1");
        assert_eq!("user-7".canonical(), "user-7");
    }

    #[test]
    fn test_key_builder() {
        let bare = KeyBuilder::default();
        assert_eq!(bare.key("137.70.0.1"), "137.70.0.1");

        let namespaced = KeyBuilder::new("limiter:");
        let ip: IpAddr = "10.1.2.3".parse().unwrap();
        assert_eq!(namespaced.key(&ip), "limiter:10.1.2.3");
        assert_eq!(namespaced.key(&"user-7".to_string()), "limiter:user-7");
    }
}
