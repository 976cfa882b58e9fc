// Library module organization

pub mod command;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod flow;
pub mod local;
pub mod naming;
pub mod printers;
pub mod remote;
pub mod routes;
pub mod session;
pub mod state;

// Re-export commonly used types for convenience
pub use command::{CommandRunner, MockRunner, SystemRunner};
pub use config::Config;
pub use credentials::{CredentialStore, Credentials, SecretStore};
pub use errors::{AppError, AppResult};
pub use flow::{InteractiveFlow, Prompter, TerminalPrompter};
pub use local::{LocalPrinterEntry, LocalPrinterRegistry};
pub use printers::{PrintJob, PrintJobSubmitter};
pub use remote::{RemoteDirectory, ServerEndpoint};
pub use state::AppState;
