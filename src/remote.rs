use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::CommandRunner;
use crate::config::RemoteConfig;
use crate::credentials::Credentials;
use crate::errors::{AppError, AppResult, CommandError};

pub const SMBCLIENT: &str = "smbclient";

/// The print server after hostname resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub ip: IpAddr,
    pub domain: String,
}

impl ServerEndpoint {
    /// Resolves the configured host, unless an IP override is configured.
    /// IPv4 addresses are preferred.
    pub async fn resolve(config: &RemoteConfig) -> AppResult<Self> {
        if let Some(ip) = config.server_ip {
            return Ok(Self::new(&config.host, ip, &config.domain));
        }

        let addrs: Vec<IpAddr> = tokio::net::lookup_host((config.host.as_str(), 445))
            .await
            .map_err(|e| AppError::Resolve {
                host: config.host.clone(),
                reason: e.to_string(),
            })?
            .map(|addr| addr.ip())
            .collect();

        let ip = addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| AppError::Resolve {
                host: config.host.clone(),
                reason: "no addresses returned".to_string(),
            })?;

        debug!("Resolved {} to {}", config.host, ip);
        Ok(Self::new(&config.host, ip, &config.domain))
    }

    pub fn new(host: &str, ip: IpAddr, domain: &str) -> Self {
        Self {
            host: host.to_string(),
            ip,
            domain: domain.to_string(),
        }
    }

    /// `DOMAIN\auid%password`, as smbclient expects for `-U`.
    pub fn smb_user(&self, credentials: &Credentials) -> String {
        format!(
            "{}\\{}%{}",
            self.domain,
            credentials.auid,
            urlencoding::encode(&credentials.password)
        )
    }

    /// Device URI handed to CUPS for a share on this server.
    pub fn printer_url(&self, credentials: &Credentials, raw_name: &str) -> String {
        format!(
            "smb://{}\\{}:{}@{}/{}",
            self.domain,
            credentials.auid,
            urlencoding::encode(&credentials.password),
            self.ip,
            raw_name
        )
    }
}

/// The printers shared by the print server, as seen with one set of
/// credentials.
///
/// Obtaining one is the login check itself. There is no way to construct it
/// without a successful listing.
pub struct RemoteDirectory {
    endpoint: ServerEndpoint,
    printers: BTreeMap<String, String>,
}

impl RemoteDirectory {
    pub async fn connect(
        config: &RemoteConfig,
        runner: Arc<dyn CommandRunner>,
        credentials: &Credentials,
    ) -> AppResult<Self> {
        let endpoint = ServerEndpoint::resolve(config).await?;
        Self::connect_to(endpoint, runner, credentials).await
    }

    pub async fn connect_to(
        endpoint: ServerEndpoint,
        runner: Arc<dyn CommandRunner>,
        credentials: &Credentials,
    ) -> AppResult<Self> {
        info!("Authenticating {} against {}", credentials.auid, endpoint.host);

        let printers = fetch_printers(&endpoint, runner.as_ref(), credentials).await?;
        info!("Found {} shared printers", printers.len());

        Ok(Self { endpoint, printers })
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    /// Share name to description, sorted by share name.
    pub fn printers(&self) -> &BTreeMap<String, String> {
        &self.printers
    }

    pub fn contains(&self, raw_name: &str) -> bool {
        self.printers.contains_key(raw_name)
    }

    /// Share names starting with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.printers
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect()
    }
}

async fn fetch_printers(
    endpoint: &ServerEndpoint,
    runner: &dyn CommandRunner,
    credentials: &Credentials,
) -> AppResult<BTreeMap<String, String>> {
    let args = vec![
        "-I".to_string(),
        endpoint.ip.to_string(),
        "-L".to_string(),
        endpoint.host.clone(),
        "-U".to_string(),
        endpoint.smb_user(credentials),
    ];

    match runner.run(SMBCLIENT, &args).await {
        Ok(out) => Ok(parse_share_listing(&out)),
        // Bad credentials and an unreachable host look the same from here
        Err(CommandError::Failed { code, .. }) => {
            warn!("Share listing rejected (exit {:?})", code);
            Err(AppError::Authentication)
        }
        Err(e) => Err(e.into()),
    }
}

/// Picks the printer shares out of `smbclient -L` output.
///
/// Only tab-indented lines with a name, a type of `Printer` and a description
/// count.
pub fn parse_share_listing(output: &str) -> BTreeMap<String, String> {
    let mut printers = BTreeMap::new();

    for line in output.lines() {
        if !line.starts_with('\t') {
            continue;
        }

        let line = line.trim();
        let mut fields = line.splitn(2, char::is_whitespace);
        let name = match fields.next() {
            Some(name) if !name.is_empty() => name,
            _ => continue,
        };
        let rest = fields.next().unwrap_or("").trim_start();
        let mut fields = rest.splitn(2, char::is_whitespace);
        let kind = fields.next().unwrap_or("");
        let description = fields.next().unwrap_or("").trim_start();

        if kind != "Printer" || description.is_empty() {
            continue;
        }

        printers.insert(name.to_string(), description.to_string());
    }

    printers
}
