//! Service discovery: resolve a service name to a concrete endpoint.
//!
//! A [`Selector`] maps a service name to an address string. The built-in
//! default returns the empty string, which tells the client transport to
//! fall back to the explicitly configured target. Directory-backed
//! selectors compose a [`Resolver`] (name → node list) with a named load
//! balancer from [`balance`].

pub mod balance;

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::registry::Registry;

/// A service-directory entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Directory key; ends in the endpoint address `host:port`.
    pub key: String,
    /// Opaque directory value.
    pub value: Vec<u8>,
    /// Relative weight for weighted balancing.
    pub weight: i32,
}

impl Node {
    pub fn new(key: impl Into<String>, weight: i32) -> Self {
        Self { key: key.into(), value: Vec::new(), weight }
    }

    /// The endpoint address: the last `/`-separated component of the key.
    pub fn address(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Resolve a service name to an endpoint address.
pub trait Selector: Send + Sync {
    /// Returns an address, or the empty string to defer to the caller's
    /// configured target.
    fn select(&self, service_name: &str) -> Result<String>;
}

/// The default selector always defers to the configured target.
pub struct DefaultSelector;

impl Selector for DefaultSelector {
    fn select(&self, _service_name: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// Resolve a service name to the full node list of a directory.
pub trait Resolver: Send + Sync {
    fn resolve(&self, service_name: &str) -> Result<Vec<Node>>;
}

/// A selector that resolves the node list through a directory and picks
/// one node with a named balancer.
pub struct BalancedSelector {
    resolver: Arc<dyn Resolver>,
    balancer_name: String,
}

impl BalancedSelector {
    pub fn new(resolver: Arc<dyn Resolver>, balancer_name: impl Into<String>) -> Self {
        Self { resolver, balancer_name: balancer_name.into() }
    }
}

impl Selector for BalancedSelector {
    fn select(&self, service_name: &str) -> Result<String> {
        use balance::Balancer as _;

        let nodes = self.resolver.resolve(service_name)?;
        if nodes.is_empty() {
            return Err(Error::server_internal(format!(
                "no nodes available for service {service_name}"
            )));
        }
        let balancer = balance::get(&self.balancer_name);
        let node = balancer
            .balance(service_name, &nodes)
            .ok_or_else(|| Error::server_internal("balancer returned no node"))?;
        Ok(node.address().to_string())
    }
}

static SELECTORS: Lazy<Registry<dyn Selector>> =
    Lazy::new(|| Registry::new("default", Arc::new(DefaultSelector)));

/// Register a selector under a name, replacing any prior entry.
pub fn register(name: impl Into<String>, selector: Arc<dyn Selector>) {
    SELECTORS.register(name, selector);
}

/// Look up a selector by name; unknown names get the default.
pub fn get(name: &str) -> Arc<dyn Selector> {
    SELECTORS.get(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticResolver(Vec<Node>);

    impl Resolver for StaticResolver {
        fn resolve(&self, _service_name: &str) -> Result<Vec<Node>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_node_address_is_last_key_segment() {
        let node = Node::new("/services/echo/127.0.0.1:8000", 1);
        assert_eq!(node.address(), "127.0.0.1:8000");

        let bare = Node::new("127.0.0.1:9000", 1);
        assert_eq!(bare.address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_default_selector_returns_empty() {
        assert_eq!(DefaultSelector.select("anything").unwrap(), "");
        assert_eq!(get("no-such-selector").select("svc").unwrap(), "");
    }

    #[test]
    fn test_balanced_selector_picks_a_node() {
        let resolver = Arc::new(StaticResolver(vec![
            Node::new("/svc/10.0.0.1:80", 1),
            Node::new("/svc/10.0.0.2:80", 1),
        ]));
        let selector = BalancedSelector::new(resolver, balance::RANDOM);
        let addr = selector.select("svc").unwrap();
        assert!(addr == "10.0.0.1:80" || addr == "10.0.0.2:80");
    }

    #[test]
    fn test_balanced_selector_empty_directory_is_an_error() {
        let selector = BalancedSelector::new(Arc::new(StaticResolver(vec![])), balance::RANDOM);
        assert!(selector.select("svc").is_err());
    }
}
