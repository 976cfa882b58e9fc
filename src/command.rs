// External command execution for smbclient, lpstat, lpadmin and lpr

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::errors::CommandError;

/// Runs an external program and hands back its stdout.
///
/// A non-zero exit is reported as [`CommandError::Failed`]. Callers decide
/// whether that is fatal or just means "nothing found".
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError>;
}

/// Environment every command runs with. The spooler tools translate their
/// output, and the parsers expect the untranslated form.
pub const COMMAND_ENV: &[(&str, &str)] = &[("LC_ALL", "C")];

/// Runs commands on the host with a bounded wait.
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        // Arguments can carry passwords, so only their count is logged
        debug!("Running {} with {} arguments", program, args.len());

        let child = tokio::process::Command::new(program)
            .args(args)
            .envs(COMMAND_ENV.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CommandError::TimedOut {
                program: program.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!("{} failed with {:?}", program, output.status.code());
            return Err(CommandError::Failed {
                program: program.to_string(),
                code: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// A single recorded call made through [`MockRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Output(String),
    Exit(i32),
}

/// Canned command runner for tests.
///
/// Responses queued for a program are handed out in order and the last one
/// repeats. Programs without a configured response succeed with empty output.
#[derive(Default)]
pub struct MockRunner {
    responses: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    calls: Mutex<Vec<Invocation>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, program: &str, response: MockResponse) -> Self {
        self.queue_response(program, response);
        self
    }

    /// Replaces everything queued for `program` with a single response.
    pub fn set_response(&self, program: &str, response: MockResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(program.to_string(), VecDeque::from([response]));
        }
    }

    pub fn queue_response(&self, program: &str, response: MockResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses
                .entry(program.to_string())
                .or_default()
                .push_back(response);
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|call| call.program == program)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Invocation {
                program: program.to_string(),
                args: args.to_vec(),
            });
        }

        let response = self.responses.lock().ok().and_then(|mut responses| {
            let queue = responses.get_mut(program)?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });

        match response {
            Some(MockResponse::Output(stdout)) => Ok(stdout),
            Some(MockResponse::Exit(code)) => Err(CommandError::Failed {
                program: program.to_string(),
                code: Some(code),
                stderr: String::new(),
            }),
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_mock_runner_records_calls() {
        let runner = MockRunner::new().respond("lpstat", MockResponse::Output("out".to_string()));

        let out = runner.run("lpstat", &args(&["-v"])).await.unwrap();
        assert_eq!(out, "out");

        let calls = runner.calls_to("lpstat");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["-v".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_runner_exit_code() {
        let runner = MockRunner::new().respond("lpadmin", MockResponse::Exit(1));
        let result = runner.run("lpadmin", &args(&["-x", "q"])).await;
        assert!(matches!(
            result,
            Err(CommandError::Failed { code: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_runner_queued_responses() {
        let runner = MockRunner::new()
            .respond("smbclient", MockResponse::Exit(1))
            .respond("smbclient", MockResponse::Output("listing".to_string()));

        assert!(runner.run("smbclient", &[]).await.is_err());
        assert_eq!(runner.run("smbclient", &[]).await.unwrap(), "listing");
        assert_eq!(runner.run("smbclient", &[]).await.unwrap(), "listing");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_captures_stdout() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let out = runner.run("echo", &args(&["hello"])).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_reports_failure() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let result = runner.run("false", &[]).await;
        assert!(matches!(result, Err(CommandError::Failed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_times_out() {
        let runner = SystemRunner::new(Duration::from_millis(100));
        let result = runner.run("sleep", &args(&["5"])).await;
        assert!(matches!(result, Err(CommandError::TimedOut { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_forces_untranslated_output() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let out = runner.run("printenv", &args(&["LC_ALL"])).await.unwrap();
        assert_eq!(out.trim(), "C");
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let result = runner
            .run("auprint-definitely-not-installed", &[])
            .await;
        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }
}
