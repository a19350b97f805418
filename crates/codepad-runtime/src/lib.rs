pub mod config;
pub mod connectivity;
pub mod error;
pub mod language;
pub mod local;
pub mod orchestrator;
pub mod remote;
pub mod result;
pub mod simulator;

pub use config::{RemoteConfig, RuntimeConfig, SandboxConfig};
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use error::{Result, RuntimeError};
pub use language::LanguageDescriptor;
pub use local::LocalExecutor;
pub use orchestrator::{Execution, Orchestrator, Strategy};
pub use remote::{Judge0Client, RemoteExecutor, RemoteRequest};
pub use result::{ErrorKind, ExecutionResult};
pub use simulator::simulate;


#[cfg(test)]
mod tests;
