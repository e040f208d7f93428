//! Check executor (component C, spec.md §4.2) and connector client
//! (component D, spec.md §4.3).

pub mod connector;
pub mod process;
pub mod result;

pub use connector::ConnectorClient;
pub use process::ProcessExecutor;
pub use result::{parse_output, CheckResult, ExitStatus};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Routes a check invocation either straight through a [`ProcessExecutor`] or
/// through a named [`ConnectorClient`] (spec.md §4.3: "a command is routed
/// through a connector when its `CommandDef::connector` is set").
#[derive(Clone)]
pub struct Dispatch {
    direct: Arc<ProcessExecutor>,
    connectors: Arc<HashMap<String, Arc<ConnectorClient>>>,
}

impl Dispatch {
    pub fn new(connectors: HashMap<String, Arc<ConnectorClient>>) -> Self {
        Self {
            direct: Arc::new(ProcessExecutor::new()),
            connectors: Arc::new(connectors),
        }
    }

    pub async fn execute(
        &self,
        connector: Option<&str>,
        argv: &[String],
        cmdline: &str,
        timeout: Duration,
        timeout_exit_code: i32,
    ) -> CheckResult {
        match connector.and_then(|name| self.connectors.get(name)) {
            Some(client) => client.execute(cmdline, timeout, timeout_exit_code).await,
            None => self.direct.execute(argv, timeout, timeout_exit_code).await,
        }
    }
}
