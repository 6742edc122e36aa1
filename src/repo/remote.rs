use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use headers::Authorization;
use hex::FromHex;
use hyper::client::HttpConnector;
use hyper::header::{CONTENT_LENGTH, USER_AGENT};
use hyper::{Body, Client, Request, Response, StatusCode, Uri};
use hyper_proxy::{Custom, Intercept, Proxy, ProxyConnector};
use hyper_tls::HttpsConnector;
use tracing::{debug, warn};

use crate::config::{OutboundProxy, RepositorySpec};
use crate::repo::resolver::RemoteSource;
use crate::util::checksum_stream::{ChecksumStream, ExpectedChecksums};

const PROXY_USER_AGENT: &str = concat!("maven-proxy/", env!("CARGO_PKG_VERSION"));

/// A file fetched from a remote repository. The body is validated against any
/// checksums the server advertised while it streams through.
pub struct RemoteFile {
    pub content_length: Option<u64>,
    pub data: ChecksumStream,
}

/// One configured remote repository. Requests go through the configured
/// outbound HTTP proxy unless the target host matches a non-proxy-host
/// pattern.
///
/// The hyper client caches connections internally, so instances are meant to
/// live for the lifetime of the resolver.
pub struct RemoteRepository {
    id: String,
    base_uri: String, // with trailing '/'
    client: Client<ProxyConnector<HttpsConnector<HttpConnector>>>,
    snapshots: bool,
    releases: bool,
}

impl RemoteRepository {
    pub fn new(
        spec: &RepositorySpec,
        outbound_proxy: Option<&OutboundProxy>,
    ) -> anyhow::Result<RemoteRepository> {
        let mut base_uri = spec.url.clone();
        if !base_uri.ends_with('/') {
            base_uri.push('/');
        }

        // fail at configuration time on an unusable base URI
        Uri::try_from(base_uri.clone())
            .with_context(|| format!("invalid URL for repository {:?}", spec.id))?;

        Ok(RemoteRepository {
            id: spec.id.clone(),
            base_uri,
            client: Client::builder().build::<_, Body>(build_connector(outbound_proxy)?),
            snapshots: spec.serves_snapshots(),
            releases: spec.serves_releases(),
        })
    }
}

#[async_trait]
impl RemoteSource for RemoteRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn serves_snapshots(&self) -> bool {
        self.snapshots
    }

    fn serves_releases(&self) -> bool {
        self.releases
    }

    async fn fetch(&self, path: &str) -> anyhow::Result<Option<RemoteFile>> {
        let uri = Uri::try_from(format!("{}{}", self.base_uri, path))?;
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header(USER_AGENT, PROXY_USER_AGENT)
            .body(Body::empty())?;

        debug!("fetching {} from repository {:?}", path, self.id);
        let response = self.client.request(request).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(into_remote_file(response))),
            status => Err(anyhow!(
                "repository {:?} answered {} for {}",
                self.id,
                status,
                path
            )),
        }
    }
}

fn into_remote_file(response: Response<Body>) -> RemoteFile {
    let content_length = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    let expected = ExpectedChecksums {
        sha1: checksum_header::<20>(&response, &["x-checksum-sha1", "x-goog-meta-checksum-sha1"]),
        md5: checksum_header::<16>(&response, &["x-checksum-md5", "x-goog-meta-checksum-md5"]),
    };
    if !expected.is_empty() {
        debug!("upstream advertised checksums, validating the body stream");
    }

    RemoteFile {
        content_length,
        data: ChecksumStream::new(response.into_body(), expected),
    }
}

fn checksum_header<const N: usize>(response: &Response<Body>, names: &[&str]) -> Option<[u8; N]>
where
    [u8; N]: FromHex,
{
    let value = names.iter().find_map(|name| response.headers().get(*name))?;
    let text = value.to_str().ok()?;
    match <[u8; N]>::from_hex(text.trim()) {
        Ok(hash) => Some(hash),
        Err(_) => {
            warn!("ignoring unparseable checksum header {:?}", text);
            None
        }
    }
}

/// Builds the upstream connector. Without an outbound proxy configured the
/// `ProxyConnector` has no proxies registered and passes connections through.
fn build_connector(
    outbound_proxy: Option<&OutboundProxy>,
) -> anyhow::Result<ProxyConnector<HttpsConnector<HttpConnector>>> {
    let mut connector = ProxyConnector::new(HttpsConnector::new())?;

    if let Some(proxy_config) = outbound_proxy {
        let proxy_uri = Uri::try_from(proxy_config.uri()).context("invalid outbound proxy address")?;

        let bypass = proxy_config.clone();
        let intercept = Intercept::Custom(Custom::from(
            move |_scheme: Option<&str>, host: Option<&str>, _port: Option<u16>| {
                host.map(|host| !bypass.bypasses(host)).unwrap_or(true)
            },
        ));

        let mut proxy = Proxy::new(intercept, proxy_uri);
        if let Some(username) = &proxy_config.username {
            let password = proxy_config.password.as_deref().unwrap_or("");
            proxy.set_authorization(Authorization::basic(username, password));
        }
        connector.add_proxy(proxy);
    }

    Ok(connector)
}
