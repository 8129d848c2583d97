//! Discovery of locally reachable storage-daemon addresses.
//!
//! The orchestrator re-resolves the candidate list at the start of every
//! operation; nothing here is cached across calls. The production resolver
//! reads the management-interface host entries the storage VMs register in
//! `/etc/hosts`, matching the original deployment convention.

use crate::error::{DrError, DrResult};
use async_trait::async_trait;
use std::path::PathBuf;

/// Default host aliases of the storage-cluster management interfaces.
pub const DEFAULT_MANAGEMENT_ALIASES: [&str; 3] = ["scvm1-mngt", "scvm2-mngt", "scvm3-mngt"];

/// Ordered discovery of daemon candidate addresses.
#[async_trait]
pub trait DaemonEndpointResolver: Send + Sync {
    /// Return the ordered candidate list. An empty list is not an error
    /// here; operations that need the daemon treat it as a hard failure.
    async fn resolve(&self) -> DrResult<Vec<String>>;
}

/// Resolver backed by `/etc/hosts` management-alias entries.
pub struct HostsFileResolver {
    path: PathBuf,
    aliases: Vec<String>,
}

impl HostsFileResolver {
    pub fn new() -> Self {
        Self::with_path("/etc/hosts")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            aliases: DEFAULT_MANAGEMENT_ALIASES
                .iter()
                .map(|a| a.to_string())
                .collect(),
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    fn parse(&self, contents: &str) -> Vec<String> {
        let mut addrs = Vec::new();
        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(addr) = fields.next() else { continue };
            let names: Vec<&str> = fields.collect();
            let matched = names
                .iter()
                .any(|n| self.aliases.iter().any(|a| n.contains(a.as_str())));
            if matched && !addrs.iter().any(|existing| existing == addr) {
                addrs.push(addr.to_string());
            }
        }
        addrs
    }
}

impl Default for HostsFileResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DaemonEndpointResolver for HostsFileResolver {
    async fn resolve(&self) -> DrResult<Vec<String>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DrError::transport(format!("reading {}: {}", self.path.display(), e)))?;
        Ok(self.parse(&contents))
    }
}

/// Fixed candidate list, used for tests and single-daemon deployments.
pub struct StaticResolver(pub Vec<String>);

#[async_trait]
impl DaemonEndpointResolver for StaticResolver {
    async fn resolve(&self) -> DrResult<Vec<String>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HOSTS: &str = "\
127.0.0.1 localhost
10.10.1.11 scvm1-mngt scvm1
10.10.1.12 scvm2-mngt # management interface
10.10.1.13 scvm3-mngt
10.10.2.13 scvm3 # data interface, not management
";

    #[test]
    fn parses_management_entries_in_file_order() {
        let resolver = HostsFileResolver::with_path("/dev/null");
        let addrs = resolver.parse(HOSTS);
        assert_eq!(addrs, vec!["10.10.1.11", "10.10.1.12", "10.10.1.13"]);
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let resolver = HostsFileResolver::with_path("/dev/null");
        let addrs = resolver.parse("# 10.9.9.9 scvm1-mngt\n\n10.0.0.1 scvm2-mngt\n");
        assert_eq!(addrs, vec!["10.0.0.1"]);
    }

    #[test]
    fn deduplicates_repeated_addresses() {
        let resolver = HostsFileResolver::with_path("/dev/null");
        let addrs = resolver.parse("10.0.0.1 scvm1-mngt\n10.0.0.1 scvm2-mngt\n");
        assert_eq!(addrs, vec!["10.0.0.1"]);
    }

    #[tokio::test]
    async fn resolves_from_a_real_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HOSTS.as_bytes()).unwrap();
        let resolver = HostsFileResolver::with_path(file.path());
        let addrs = resolver.resolve().await.unwrap();
        assert_eq!(addrs.len(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_a_transport_error() {
        let resolver = HostsFileResolver::with_path("/nonexistent/hosts");
        assert!(matches!(
            resolver.resolve().await,
            Err(DrError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn static_resolver_returns_fixed_list() {
        let resolver = StaticResolver(vec!["10.1.1.1".into(), "10.1.1.2".into()]);
        assert_eq!(resolver.resolve().await.unwrap().len(), 2);
    }
}
