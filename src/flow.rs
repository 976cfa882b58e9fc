// Terminal session: login with cached credentials, then manage printers

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::command::CommandRunner;
use crate::config::Config;
use crate::credentials::{is_valid_auid, CredentialStore, Credentials, AUID_PREFIX};
use crate::errors::{AppError, AppResult};
use crate::local::{LocalPrinterEntry, LocalPrinterRegistry};
use crate::naming;
use crate::printers::{PrintJob, PrintJobSubmitter};
use crate::remote::RemoteDirectory;

/// Line-oriented user interaction.
pub trait Prompter {
    /// Reads a line. An empty answer yields `default` when one is given.
    fn input(&mut self, prompt: &str, default: Option<&str>) -> AppResult<String>;

    fn password(&mut self, prompt: &str) -> AppResult<String>;

    fn say(&mut self, message: &str);
}

/// Prompts on the controlling terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str, default: Option<&str>) -> AppResult<String> {
        let mut input = dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input
            .interact_text()
            .map_err(|e| AppError::Prompt(e.to_string()))
    }

    fn password(&mut self, prompt: &str) -> AppResult<String> {
        dialoguer::Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(|e| AppError::Prompt(e.to_string()))
    }

    fn say(&mut self, message: &str) {
        println!("{}", message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    AwaitingCredentials,
    Authenticating,
    LoggedIn,
}

/// A successful login: the listing it produced and the credentials behind it.
pub struct LoggedIn {
    pub directory: RemoteDirectory,
    pub credentials: Credentials,
}

pub struct InteractiveFlow<'a, P: Prompter> {
    config: &'a Config,
    runner: Arc<dyn CommandRunner>,
    store: &'a CredentialStore,
    prompter: P,
    state: LoginState,
}

impl<'a, P: Prompter> InteractiveFlow<'a, P> {
    pub fn new(
        config: &'a Config,
        runner: Arc<dyn CommandRunner>,
        store: &'a CredentialStore,
        prompter: P,
    ) -> Self {
        Self {
            config,
            runner,
            store,
            prompter,
            state: LoginState::AwaitingCredentials,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    fn transition(&mut self, next: LoginState) {
        debug!("Login state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Logs in with cached credentials, prompting for whatever is missing.
    /// Rejected credentials are forgotten and asked for again.
    pub async fn login(&mut self) -> AppResult<LoggedIn> {
        loop {
            let cached = self.store.load();

            let auid = match cached.auid.filter(|auid| is_valid_auid(auid)) {
                Some(auid) => auid,
                None => self.prompt_auid()?,
            };
            let password = match cached.password {
                Some(password) => password,
                None => self.prompt_password()?,
            };

            self.transition(LoginState::Authenticating);
            let credentials = Credentials::new(auid, password)?;

            match RemoteDirectory::connect(&self.config.remote, self.runner.clone(), &credentials)
                .await
            {
                Ok(directory) => {
                    self.transition(LoginState::LoggedIn);
                    info!("Logged in as {}", credentials.auid);
                    return Ok(LoggedIn {
                        directory,
                        credentials,
                    });
                }
                Err(AppError::Authentication) => {
                    self.prompter.say("Invalid auid/password combination");
                    self.store.clear()?;
                    self.transition(LoginState::AwaitingCredentials);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn prompt_auid(&mut self) -> AppResult<String> {
        loop {
            let auid = self.prompter.input("AUID", None)?.trim().to_string();
            if is_valid_auid(&auid) {
                self.store.save_username(&auid)?;
                return Ok(auid);
            }
            self.prompter
                .say(&format!("AUID must start with '{}'", AUID_PREFIX));
        }
    }

    fn prompt_password(&mut self) -> AppResult<String> {
        loop {
            let password = self.prompter.password("Password")?.trim().to_string();
            if !password.is_empty() {
                self.store.save_password(&password)?;
                return Ok(password);
            }
        }
    }

    fn registry(&self, session: &LoggedIn) -> LocalPrinterRegistry {
        LocalPrinterRegistry::new(
            self.runner.clone(),
            session.directory.endpoint().clone(),
            &self.config.spooler,
        )
    }

    /// Re-registers every installed queue with the current password.
    pub async fn update_passwords(&mut self, session: &LoggedIn) -> AppResult<usize> {
        let registry = self.registry(session);
        let entries = registry.list().await;
        if entries.is_empty() {
            self.prompter.say("No installed printers found");
            return Ok(0);
        }

        for entry in &entries {
            registry
                .update_credentials(&entry.raw_name, &entry.install_name, &session.credentials)
                .await?;
            self.prompter.say(&format!(
                "Updated password for {} at {}",
                entry.raw_name, entry.install_name
            ));
        }

        Ok(entries.len())
    }

    /// Walks the user through picking a printer in a building and installing
    /// it. Returns the queue name, or `None` when nothing was installed.
    pub async fn install_printer(&mut self, session: &LoggedIn) -> AppResult<Option<String>> {
        let building = self.prompter.input("Building number/name", None)?;
        let code = naming::building_name_to_code(&building);

        let matched = session.directory.matching(&code);
        if matched.is_empty() {
            self.prompter.say("No printers found");
            return Ok(None);
        }

        self.prompter.say("Available printers: ");
        for (i, printer) in matched.iter().enumerate() {
            let description = session
                .directory
                .printers()
                .get(printer)
                .map(String::as_str)
                .unwrap_or("");
            self.prompter
                .say(&format!("({})\t{}\t{}", i + 1, printer, description));
        }

        let choice = self.prompter.input("Printer to install", None)?;
        let printer = match choice
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| matched.get(i))
        {
            Some(printer) => printer.clone(),
            None => {
                self.prompter.say("No printer selected");
                return Ok(None);
            }
        };

        let default_name = naming::to_display_name(&printer);
        self.prompter.say("");
        self.prompter.say(&format!("Selected {}", printer));
        let name = self.prompter.input("Install name", Some(&default_name))?;
        let name = match name.trim() {
            "" => default_name,
            custom => custom.to_string(),
        };

        let queue = self
            .registry(session)
            .install(&session.directory, &printer, &name, &session.credentials)
            .await?;
        self.prompter
            .say(&format!("Successfully added printer {} as {}", printer, queue));

        Ok(Some(queue))
    }

    /// Shows installed queues and everything the server shares.
    pub async fn list_printers(&mut self, session: &LoggedIn) -> Vec<LocalPrinterEntry> {
        let installed = self.registry(session).list().await;

        self.prompter.say("Installed printers:");
        if installed.is_empty() {
            self.prompter.say("  (none)");
        }
        for entry in &installed {
            self.prompter
                .say(&format!("  {}\t{}", entry.raw_name, entry.install_name));
        }

        self.prompter.say("Available printers:");
        for (name, description) in session.directory.printers() {
            self.prompter.say(&format!(
                "  {}\t{}\t{}",
                name,
                naming::to_display_name(name),
                description
            ));
        }

        installed
    }

    /// Deletes the queue for a printer given by share or display name.
    pub async fn remove_printer(&mut self, session: &LoggedIn, printer: &str) -> AppResult<()> {
        let raw_name = naming::to_raw_name(printer);
        self.registry(session).delete(&raw_name).await?;
        self.prompter.say(&format!("Removed printer {}", raw_name));
        Ok(())
    }

    pub async fn print_file(
        &mut self,
        session: &LoggedIn,
        printer: &str,
        file_path: PathBuf,
    ) -> AppResult<()> {
        let registry = self.registry(session);
        let submitter = PrintJobSubmitter::new(self.runner.clone(), &registry);
        let job = PrintJob {
            printer: naming::to_raw_name(printer),
            file_path,
        };
        submitter.print(&job).await?;
        self.prompter
            .say(&format!("Sent {} to {}", job.file_path.display(), job.printer));
        Ok(())
    }
}
