//! Purpose: Blocking HTTP client for the broker management API.
//! Exports: `ManagementClient`, `DEFAULT_TIMEOUT`.
//! Role: Builds `/api/...` URLs, sends JSON, and maps broker failures onto `ErrorKind`.
//! Invariants: Path segments are percent-encoded individually (vhost `/` becomes `%2F`).
//! Invariants: Credentials travel as URL userinfo and never appear in logs or errors.
//! Invariants: Schema-less responses are decoded through `core::codec`.
#![allow(clippy::result_large_err)]

use super::model::{
    Binding, Exchange, ExchangeDeclare, Overview, Policy, PolicyDefinition, Queue, QueueDeclare,
    Vhost,
};
use crate::core::codec;
use crate::core::error::{Error, ErrorKind};
use crate::core::value::DynamicValue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

type ApiResult<T> = Result<T, Error>;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ManagementClient {
    inner: Arc<ClientInner>,
}

#[derive(Clone)]
struct ClientInner {
    base_url: Url,
    timeout: Duration,
    tls: Option<Arc<ureq::rustls::ClientConfig>>,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct BrokerError {
    error: Option<String>,
    reason: Option<String>,
}

impl ManagementClient {
    /// `base_url` is the management listener, optionally with a reverse-proxy path prefix.
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let mut base_url = normalize_base_url(base_url.into())?;
        set_credentials(&mut base_url, "guest", "guest")?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                timeout: DEFAULT_TIMEOUT,
                tls: None,
                agent: build_agent(DEFAULT_TIMEOUT, None),
            }),
        })
    }

    pub fn with_credentials(
        mut self,
        username: impl AsRef<str>,
        password: impl AsRef<str>,
    ) -> ApiResult<Self> {
        let inner = Arc::make_mut(&mut self.inner);
        set_credentials(&mut inner.base_url, username.as_ref(), password.as_ref())?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let inner = Arc::make_mut(&mut self.inner);
        inner.timeout = timeout;
        inner.agent = build_agent(timeout, inner.tls.clone());
        self
    }

    pub fn with_tls_ca_file(mut self, path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let cert_bytes = std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("failed to read TLS CA/certificate file")
                .with_path(path.display().to_string())
                .with_source(err)
        })?;
        let mut cert_reader = Cursor::new(cert_bytes);
        let certs = rustls_pemfile::certs(&mut cert_reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("failed to parse TLS CA/certificate file")
                    .with_path(path.display().to_string())
                    .with_source(err)
            })?;
        if certs.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("TLS CA/certificate file contains no certificates")
                .with_path(path.display().to_string()));
        }

        let _ = ureq::rustls::crypto::aws_lc_rs::default_provider().install_default();
        let mut root_store = ureq::rustls::RootCertStore::empty();
        let (added, _) = root_store.add_parsable_certificates(certs);
        if added == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("TLS CA/certificate file contains no parsable certificates")
                .with_path(path.display().to_string()));
        }

        let tls_config = Arc::new(
            ureq::rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let inner = Arc::make_mut(&mut self.inner);
        inner.agent = build_agent(inner.timeout, Some(tls_config.clone()));
        inner.tls = Some(tls_config);
        Ok(self)
    }

    /// Base URL without credentials.
    pub fn base_url(&self) -> Url {
        redacted(&self.inner.base_url)
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn overview(&self) -> ApiResult<Overview> {
        self.get(&["overview"])
    }

    pub fn list_vhosts(&self) -> ApiResult<Vec<Vhost>> {
        self.get(&["vhosts"])
    }

    pub fn list_queues(&self, vhost: Option<&str>) -> ApiResult<Vec<Queue>> {
        self.get(&scoped("queues", vhost))
    }

    pub fn get_queue(&self, vhost: &str, name: &str) -> ApiResult<Queue> {
        self.get(&["queues", vhost, name])
    }

    pub fn declare_queue(&self, vhost: &str, name: &str, body: &QueueDeclare) -> ApiResult<()> {
        self.send_no_content("PUT", &["queues", vhost, name], Some(body))
    }

    pub fn delete_queue(&self, vhost: &str, name: &str) -> ApiResult<()> {
        self.send_no_content::<()>("DELETE", &["queues", vhost, name], None)
    }

    pub fn list_exchanges(&self, vhost: Option<&str>) -> ApiResult<Vec<Exchange>> {
        self.get(&scoped("exchanges", vhost))
    }

    pub fn get_exchange(&self, vhost: &str, name: &str) -> ApiResult<Exchange> {
        self.get(&["exchanges", vhost, name])
    }

    pub fn declare_exchange(
        &self,
        vhost: &str,
        name: &str,
        body: &ExchangeDeclare,
    ) -> ApiResult<()> {
        self.send_no_content("PUT", &["exchanges", vhost, name], Some(body))
    }

    pub fn delete_exchange(&self, vhost: &str, name: &str) -> ApiResult<()> {
        self.send_no_content::<()>("DELETE", &["exchanges", vhost, name], None)
    }

    pub fn list_bindings(&self, vhost: Option<&str>) -> ApiResult<Vec<Binding>> {
        self.get(&scoped("bindings", vhost))
    }

    pub fn list_policies(&self, vhost: Option<&str>) -> ApiResult<Vec<Policy>> {
        self.get(&scoped("policies", vhost))
    }

    pub fn get_policy(&self, vhost: &str, name: &str) -> ApiResult<Policy> {
        self.get(&["policies", vhost, name])
    }

    pub fn put_policy(&self, vhost: &str, name: &str, body: &PolicyDefinition) -> ApiResult<()> {
        self.send_no_content("PUT", &["policies", vhost, name], Some(body))
    }

    pub fn delete_policy(&self, vhost: &str, name: &str) -> ApiResult<()> {
        self.send_no_content::<()>("DELETE", &["policies", vhost, name], None)
    }

    /// GET any endpoint below `/api` and decode the body without a schema.
    pub fn get_json(&self, segments: &[&str]) -> ApiResult<DynamicValue> {
        let url = build_url(&self.inner.base_url, segments)?;
        let response = self.send::<()>("GET", &url, None)?;
        let body = read_body(response)?;
        codec::from_str(&body).map_err(|err| err.with_hint(format!("response of {}", url.path())))
    }

    fn get<R: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<R> {
        let url = build_url(&self.inner.base_url, segments)?;
        let response = self.send::<()>("GET", &url, None)?;
        let body = read_body(response)?;
        serde_json::from_str(&body).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("invalid response json")
                .with_path(url.path())
                .with_source(err)
        })
    }

    fn send_no_content<T: Serialize>(
        &self,
        method: &str,
        segments: &[&str],
        body: Option<&T>,
    ) -> ApiResult<()> {
        let url = build_url(&self.inner.base_url, segments)?;
        self.send(method, &url, body)?;
        Ok(())
    }

    fn send<T: Serialize>(
        &self,
        method: &str,
        url: &Url,
        body: Option<&T>,
    ) -> ApiResult<ureq::Response> {
        debug!(method, path = url.path(), "management request");
        let request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        let response = match body {
            None => request.call(),
            Some(body) => {
                let payload = serde_json::to_string(body).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                request
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            }
        };

        match response {
            Ok(resp) => {
                debug!(method, path = url.path(), status = resp.status(), "management response");
                Ok(resp)
            }
            Err(ureq::Error::Status(code, resp)) => {
                Err(parse_error_response(code, resp).with_path(url.path()))
            }
            // Transport errors render the full URL, userinfo included; keep only kind and detail.
            Err(ureq::Error::Transport(err)) => {
                let message = match err.message() {
                    Some(detail) => format!("request failed: {}: {detail}", err.kind()),
                    None => format!("request failed: {}", err.kind()),
                };
                Err(Error::new(ErrorKind::Io)
                    .with_message(message)
                    .with_path(url.path()))
            }
        }
    }
}

fn build_agent(timeout: Duration, tls: Option<Arc<ureq::rustls::ClientConfig>>) -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new().timeout(timeout);
    if let Some(tls) = tls {
        builder = builder.tls_config(tls);
    }
    builder.build()
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid management base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("management base url must use http or https scheme"));
    }
    if url.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::Usage).with_message("management base url cannot be a base"));
    }
    let trimmed = url.path().trim_end_matches('/').to_string();
    let trimmed = trimmed.strip_suffix("/api").unwrap_or(&trimmed).to_string();
    url.set_path(&trimmed);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn set_credentials(url: &mut Url, username: &str, password: &str) -> ApiResult<()> {
    url.set_username(username)
        .and_then(|()| url.set_password(Some(password)))
        .map_err(|()| Error::new(ErrorKind::Usage).with_message("base url cannot carry credentials"))
}

fn redacted(url: &Url) -> Url {
    let mut url = url.clone();
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url
}

fn scoped<'a>(resource: &'a str, vhost: Option<&'a str>) -> Vec<&'a str> {
    match vhost {
        Some(vhost) => vec![resource, vhost],
        None => vec![resource],
    }
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("management base url cannot be a base")
        })?;
        path.pop_if_empty();
        path.push("api");
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn read_body(response: ureq::Response) -> ApiResult<String> {
    response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let kind = error_kind_from_status(status);
    let body = response.into_string().unwrap_or_default();
    let message = match serde_json::from_str::<BrokerError>(&body) {
        Ok(BrokerError {
            error: Some(error),
            reason: Some(reason),
        }) if error != reason => format!("{error}: {reason}"),
        Ok(BrokerError {
            error: Some(message),
            ..
        })
        | Ok(BrokerError {
            reason: Some(message),
            ..
        }) => message,
        Ok(_) => format!("broker returned status {status}"),
        Err(err) => {
            if !body.trim().is_empty() {
                warn!(status, error = %err, "broker error body is not json");
            }
            format!("broker returned status {status}")
        }
    };
    Error::new(kind).with_message(message).with_status(status)
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::Usage,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        500..=599 => ErrorKind::Remote,
        _ => ErrorKind::Io,
    }
}
