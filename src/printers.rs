use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::command::CommandRunner;
use crate::errors::{AppError, AppResult};
use crate::local::LocalPrinterRegistry;

pub const LPR: &str = "lpr";

#[derive(Debug, Clone)]
pub struct PrintJob {
    /// Share name of an installed printer.
    pub printer: String,
    pub file_path: PathBuf,
}

pub struct PrintJobSubmitter<'a> {
    runner: Arc<dyn CommandRunner>,
    registry: &'a LocalPrinterRegistry,
}

impl<'a> PrintJobSubmitter<'a> {
    pub fn new(runner: Arc<dyn CommandRunner>, registry: &'a LocalPrinterRegistry) -> Self {
        Self { runner, registry }
    }

    /// Sends a file to the queue installed for `job.printer`.
    ///
    /// This only means CUPS accepted the job. The print itself can still fail
    /// later on the server.
    pub async fn print(&self, job: &PrintJob) -> AppResult<()> {
        let entry = self
            .registry
            .find(&job.printer)
            .await
            .ok_or_else(|| AppError::PrinterNotFound {
                name: job.printer.clone(),
            })?;

        if !job.file_path.is_file() {
            return Err(AppError::FileNotFound {
                path: job.file_path.display().to_string(),
            });
        }

        info!(
            "Submitting {:?} to {} ({})",
            job.file_path, entry.install_name, entry.raw_name
        );

        let args = vec![
            "-E".to_string(),
            "-P".to_string(),
            entry.install_name.clone(),
            job.file_path.to_string_lossy().into_owned(),
        ];

        match self.runner.run(LPR, &args).await {
            Ok(_) => {
                info!("Print job accepted by {}", entry.install_name);
                Ok(())
            }
            Err(e) => {
                warn!("Print job failed: {}", e);
                Err(AppError::Submission(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{MockResponse, MockRunner};
    use crate::config::SpoolerConfig;
    use crate::local::LPSTAT;
    use crate::remote::ServerEndpoint;
    use std::io::Write;

    fn registry(runner: Arc<MockRunner>) -> LocalPrinterRegistry {
        runner.set_response(
            LPSTAT,
            MockResponse::Output(
                "device for auprint-turing-101: smb://10.0.0.5/5341-101\n".to_string(),
            ),
        );
        LocalPrinterRegistry::new(
            runner,
            ServerEndpoint::new("print.uni.au.dk", "10.0.0.5".parse().unwrap(), "uni"),
            &SpoolerConfig {
                ppd_path: PathBuf::from("/tmp/generic.ppd"),
                mangle_queue_names: true,
            },
        )
    }

    fn document() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "%PDF-1.4").unwrap();
        file
    }

    #[tokio::test]
    async fn test_print_submits_to_installed_queue() {
        let runner = Arc::new(MockRunner::new());
        let registry = registry(runner.clone());
        let submitter = PrintJobSubmitter::new(runner.clone(), &registry);
        let file = document();

        let job = PrintJob {
            printer: "5341-101".to_string(),
            file_path: file.path().to_path_buf(),
        };
        submitter.print(&job).await.unwrap();

        let calls = runner.calls_to(LPR);
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].args,
            vec![
                "-E".to_string(),
                "-P".to_string(),
                "auprint-turing-101".to_string(),
                file.path().to_string_lossy().into_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn test_print_to_missing_printer() {
        let runner = Arc::new(MockRunner::new());
        let registry = registry(runner.clone());
        let submitter = PrintJobSubmitter::new(runner.clone(), &registry);
        let file = document();

        let job = PrintJob {
            printer: "5342-010".to_string(),
            file_path: file.path().to_path_buf(),
        };
        let result = submitter.print(&job).await;
        assert!(matches!(result, Err(AppError::PrinterNotFound { .. })));
        assert!(runner.calls_to(LPR).is_empty());
    }

    #[tokio::test]
    async fn test_print_missing_file() {
        let runner = Arc::new(MockRunner::new());
        let registry = registry(runner.clone());
        let submitter = PrintJobSubmitter::new(runner.clone(), &registry);

        let job = PrintJob {
            printer: "5341-101".to_string(),
            file_path: PathBuf::from("/nonexistent/auprint/document.pdf"),
        };
        let result = submitter.print(&job).await;
        assert!(matches!(result, Err(AppError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_print_rejected_by_lpr() {
        let runner = Arc::new(MockRunner::new().respond(LPR, MockResponse::Exit(1)));
        let registry = registry(runner.clone());
        let submitter = PrintJobSubmitter::new(runner.clone(), &registry);
        let file = document();

        let job = PrintJob {
            printer: "5341-101".to_string(),
            file_path: file.path().to_path_buf(),
        };
        let result = submitter.print(&job).await;
        assert!(matches!(result, Err(AppError::Submission(_))));
    }
}
