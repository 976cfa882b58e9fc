use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::CommandRunner;
use crate::config::SpoolerConfig;
use crate::credentials::Credentials;
use crate::errors::{AppError, AppResult};
use crate::naming;
use crate::remote::{RemoteDirectory, ServerEndpoint};

pub const LPSTAT: &str = "lpstat";
pub const LPADMIN: &str = "lpadmin";

/// A CUPS queue that prints to a share on the print server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPrinterEntry {
    /// Share name on the print server.
    pub raw_name: String,
    /// Queue name in the local spooler.
    pub install_name: String,
}

pub struct LocalPrinterRegistry {
    runner: Arc<dyn CommandRunner>,
    endpoint: ServerEndpoint,
    ppd_path: PathBuf,
    mangle_queue_names: bool,
}

impl LocalPrinterRegistry {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        endpoint: ServerEndpoint,
        config: &SpoolerConfig,
    ) -> Self {
        Self {
            runner,
            endpoint,
            ppd_path: config.ppd_path.clone(),
            mangle_queue_names: config.mangle_queue_names,
        }
    }

    /// Installed queues backed by the print server. Spooler failures yield
    /// an empty list.
    pub async fn list(&self) -> Vec<LocalPrinterEntry> {
        match self.runner.run(LPSTAT, &["-v".to_string()]).await {
            Ok(out) => {
                let entries = self.parse_device_listing(&out);
                debug!("Found {} installed printers", entries.len());
                entries
            }
            Err(e) => {
                debug!("No local printers listed: {}", e);
                Vec::new()
            }
        }
    }

    /// Looks up the installed queue for a share name.
    pub async fn find(&self, raw_name: &str) -> Option<LocalPrinterEntry> {
        self.list()
            .await
            .into_iter()
            .find(|entry| entry.raw_name == raw_name)
    }

    /// The spooler queue name `install` would create for `install_name`.
    pub fn queue_name(&self, install_name: &str) -> String {
        if self.mangle_queue_names {
            naming::mangle(install_name)
        } else {
            install_name.to_string()
        }
    }

    /// Registers `raw_name` as a CUPS queue and returns the queue name used.
    pub async fn install(
        &self,
        remote: &RemoteDirectory,
        raw_name: &str,
        install_name: &str,
        credentials: &Credentials,
    ) -> AppResult<String> {
        if !remote.contains(raw_name) {
            return Err(AppError::PrinterNotFound {
                name: raw_name.to_string(),
            });
        }

        let queue = self.queue_name(install_name);
        info!("Installing {} as {}", raw_name, queue);

        let args = vec![
            "-p".to_string(),
            queue.clone(),
            "-E".to_string(),
            "-P".to_string(),
            self.ppd_path.to_string_lossy().into_owned(),
            "-v".to_string(),
            self.endpoint.printer_url(credentials, raw_name),
        ];
        self.lpadmin(&args).await?;

        Ok(queue)
    }

    /// Points an installed queue at the same share with new credentials.
    pub async fn update_credentials(
        &self,
        raw_name: &str,
        install_name: &str,
        credentials: &Credentials,
    ) -> AppResult<()> {
        info!("Updating credentials for {} at {}", raw_name, install_name);

        let args = vec![
            "-p".to_string(),
            install_name.to_string(),
            "-v".to_string(),
            self.endpoint.printer_url(credentials, raw_name),
        ];
        self.lpadmin(&args).await
    }

    pub async fn delete(&self, raw_name: &str) -> AppResult<()> {
        let entry = self
            .find(raw_name)
            .await
            .ok_or_else(|| AppError::PrinterNotFound {
                name: raw_name.to_string(),
            })?;

        info!("Deleting queue {} for {}", entry.install_name, raw_name);
        self.lpadmin(&["-x".to_string(), entry.install_name]).await
    }

    async fn lpadmin(&self, args: &[String]) -> AppResult<()> {
        self.runner.run(LPADMIN, args).await.map_err(|e| {
            warn!("lpadmin failed: {}", e);
            AppError::Spooler(e.to_string())
        })?;
        Ok(())
    }

    /// Parses `lpstat -v` lines of the form `device for <queue>: <uri>`.
    ///
    /// Only the position of the queue and the URI is relied on, so a
    /// translated `device for` still parses.
    fn parse_device_listing(&self, output: &str) -> Vec<LocalPrinterEntry> {
        output
            .lines()
            .filter_map(|line| {
                let (head, uri) = line.trim().split_once(": ")?;
                let queue = head.split_whitespace().last()?;
                let raw_name = share_on_server(uri.trim(), &self.endpoint)?;
                if self.mangle_queue_names && naming::demangle(queue).is_none() {
                    return None;
                }
                Some(LocalPrinterEntry {
                    raw_name,
                    install_name: queue.to_string(),
                })
            })
            .collect()
    }
}

/// Share name of an `smb://` URI that points at `endpoint`, with or without
/// credentials in front of the host.
fn share_on_server(uri: &str, endpoint: &ServerEndpoint) -> Option<String> {
    let rest = uri.strip_prefix("smb://")?;
    let (authority, path) = rest.split_once('/')?;
    let host = authority.rsplit('@').next()?;
    if host != endpoint.ip.to_string() {
        return None;
    }

    let share = path.rsplit('/').next()?;
    if share.is_empty() {
        return None;
    }
    Some(share.to_string())
}
