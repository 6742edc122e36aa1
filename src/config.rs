use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};

const DEFAULT_REPOSITORIES: &str = "https://repo1.maven.org/maven2@id=central";
const DEFAULT_TIMEOUT_SECONDS: &str = "60";

/// One configured remote repository, parsed from the
/// `url[@flag]*@id=name[@flag]*` syntax Maven tooling uses for repository
/// lists. The id is the value after the last `id=` token; every other
/// `@`-separated part is a behavioral flag and never affects id extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySpec {
    pub url: String,
    pub id: String,
    pub flags: HashSet<String>,
}

impl FromStr for RepositorySpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<RepositorySpec, anyhow::Error> {
        let mut parts = s.split('@');
        let url = parts
            .next()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow!("repository spec without a URL: {:?}", s))?;

        let mut id = None;
        let mut flags = HashSet::new();
        for part in parts {
            if let Some(value) = part.strip_prefix("id=") {
                id = Some(value.to_string());
            } else {
                flags.insert(part.to_string());
            }
        }

        Ok(RepositorySpec {
            url: url.to_string(),
            id: id.ok_or_else(|| anyhow!("repository spec without an id: {:?}", s))?,
            flags,
        })
    }
}

impl RepositorySpec {
    pub fn serves_snapshots(&self) -> bool {
        self.flags.contains("snapshots")
    }

    pub fn serves_releases(&self) -> bool {
        !self.flags.contains("noreleases")
    }
}

/// An authenticating HTTP proxy to route upstream fetches through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundProxy {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub non_proxy_hosts: Vec<String>,
}

impl OutboundProxy {
    pub fn uri(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// nonProxyHosts entries support a leading `*` wildcard, everything else
    /// is an exact host match.
    pub fn bypasses(&self, host: &str) -> bool {
        self.non_proxy_hosts.iter().any(|pattern| match pattern.strip_prefix('*') {
            Some(suffix) => host.ends_with(suffix),
            None => host == pattern,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub local_repository: PathBuf,
    pub remote_repositories: Vec<RepositorySpec>,
    pub request_timeout: Duration,
    pub outbound_proxy: Option<OutboundProxy>,
}

impl ServerConfig {
    /// Reads the configuration from `MAVEN_PROXY_*` environment variables;
    /// everything has a usable default except proxy credentials.
    pub fn load() -> anyhow::Result<ServerConfig> {
        let listen = env_or("MAVEN_PROXY_LISTEN", "127.0.0.1:3000")
            .parse()
            .context("invalid MAVEN_PROXY_LISTEN")?;

        let local_repository = PathBuf::from(env_or(
            "MAVEN_PROXY_LOCAL_REPOSITORY",
            "maven-proxy-repository",
        ));

        let remote_repositories = parse_repository_list(&env_or(
            "MAVEN_PROXY_REPOSITORIES",
            DEFAULT_REPOSITORIES,
        ))?;

        let request_timeout = Duration::from_secs(
            env_or("MAVEN_PROXY_TIMEOUT_SECONDS", DEFAULT_TIMEOUT_SECONDS)
                .parse()
                .context("invalid MAVEN_PROXY_TIMEOUT_SECONDS")?,
        );

        Ok(ServerConfig {
            listen,
            local_repository,
            remote_repositories,
            request_timeout,
            outbound_proxy: load_outbound_proxy()?,
        })
    }
}

/// Parses the comma-separated repository list.
pub fn parse_repository_list(list: &str) -> anyhow::Result<Vec<RepositorySpec>> {
    list.split(',')
        .map(str::trim)
        .filter(|spec| !spec.is_empty())
        .map(RepositorySpec::from_str)
        .collect()
}

fn load_outbound_proxy() -> anyhow::Result<Option<OutboundProxy>> {
    let host = match env::var("MAVEN_PROXY_HTTP_PROXY_HOST") {
        Ok(host) if !host.is_empty() => host,
        _ => return Ok(None),
    };

    Ok(Some(OutboundProxy {
        protocol: env_or("MAVEN_PROXY_HTTP_PROXY_PROTOCOL", "http"),
        host,
        port: env_or("MAVEN_PROXY_HTTP_PROXY_PORT", "8080")
            .parse()
            .context("invalid MAVEN_PROXY_HTTP_PROXY_PORT")?,
        username: env::var("MAVEN_PROXY_HTTP_PROXY_USERNAME").ok(),
        password: env::var("MAVEN_PROXY_HTTP_PROXY_PASSWORD").ok(),
        non_proxy_hosts: env::var("MAVEN_PROXY_HTTP_PROXY_NON_PROXY_HOSTS")
            .map(|hosts| {
                hosts
                    .split('|')
                    .map(str::trim)
                    .filter(|host| !host.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    }))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
