use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::{CliCommand, CrawlOptions, parse_cli_args, usage_text, version_text};
use crate::command_handlers::{handle_discover, handle_rescan, handle_ssh_probe, handle_summary};
use crate::config::{DiscoveryConfig, db_path_override};
use crate::database::Database;
use crate::discovery::{LocalSystem, LocalSystemChain};
use crate::scanner::{AgentChain, OpenSshTransport, SnmpAgent, SshTransport};

/// Receives each line of command output
pub type OutputHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Everything a command needs from its surroundings. The CLI builds it from
/// the environment; tests swap in their own store path, fakes and output sink.
#[derive(Clone)]
pub struct AppContext {
    db_path: Option<PathBuf>,
    config: DiscoveryConfig,
    output_hook: Option<OutputHook>,
    snmp_agent: Option<Arc<dyn SnmpAgent>>,
    local_system: Option<Arc<dyn LocalSystem>>,
    ssh_transport: Option<Arc<dyn SshTransport>>,
}

impl AppContext {
    pub fn from_env() -> Self {
        Self {
            db_path: db_path_override(),
            config: DiscoveryConfig::from_env(),
            output_hook: None,
            snmp_agent: None,
            local_system: None,
            ssh_transport: None,
        }
    }

    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = Some(path);
        self
    }

    pub fn with_config(mut self, config: DiscoveryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_output_hook(mut self, hook: OutputHook) -> Self {
        self.output_hook = Some(hook);
        self
    }

    pub fn with_snmp_agent(mut self, agent: Arc<dyn SnmpAgent>) -> Self {
        self.snmp_agent = Some(agent);
        self
    }

    pub fn with_local_system(mut self, local: Arc<dyn LocalSystem>) -> Self {
        self.local_system = Some(local);
        self
    }

    pub fn with_ssh_transport(mut self, transport: Arc<dyn SshTransport>) -> Self {
        self.ssh_transport = Some(transport);
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub(crate) fn emit(&self, line: &str) {
        match &self.output_hook {
            Some(hook) => hook(line),
            None => println!("{}", line),
        }
    }

    pub(crate) fn emit_json<T: serde::Serialize>(&self, value: &T, what: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {}", what))?;
        self.emit(&json);
        Ok(())
    }

    /// Per-command overrides take precedence over the context path
    pub(crate) fn open_database(&self, path: Option<&PathBuf>) -> Result<Database> {
        let path = path
            .or(self.db_path.as_ref())
            .cloned()
            .unwrap_or_else(Database::default_path);
        Database::new(path.clone())
            .with_context(|| format!("Failed to open inventory database {}", path.display()))
    }

    pub(crate) fn crawl_config(&self, options: &CrawlOptions) -> DiscoveryConfig {
        let mut config = self.config.clone();
        if let Some(community) = &options.community {
            config = config.with_community(community.clone());
        }
        if let Some(modules) = &options.modules {
            config = config.with_modules(modules.clone());
        }
        config
    }

    pub(crate) fn snmp_agent(&self, config: &DiscoveryConfig) -> Arc<dyn SnmpAgent> {
        match &self.snmp_agent {
            Some(agent) => Arc::clone(agent),
            None => Arc::new(AgentChain::production(config.snmp.clone())),
        }
    }

    pub(crate) fn local_system(&self) -> Arc<dyn LocalSystem> {
        match &self.local_system {
            Some(local) => Arc::clone(local),
            None => Arc::new(LocalSystemChain::production()),
        }
    }

    pub(crate) fn ssh_transport(&self) -> Arc<dyn SshTransport> {
        match &self.ssh_transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(OpenSshTransport::new(self.config.ssh_timeout)),
        }
    }
}

/// Run the app by parsing CLI-style args and dispatching the command.
pub async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let command = parse_cli_args(args)?;
    execute_command(command).await
}

/// Execute a pre-parsed command against the environment.
pub async fn execute_command(command: CliCommand) -> Result<()> {
    execute_command_with_context(command, &AppContext::from_env()).await
}

/// Execute a pre-parsed command. This is reusable for non-CLI entrypoints.
pub async fn execute_command_with_context(command: CliCommand, context: &AppContext) -> Result<()> {
    match command {
        CliCommand::Help => {
            context.emit(&usage_text());
            Ok(())
        }
        CliCommand::Version => {
            context.emit(&version_text());
            Ok(())
        }
        CliCommand::Discover { seed, options } => handle_discover(context, &seed, &options).await,
        CliCommand::Rescan { options } => handle_rescan(context, &options).await,
        CliCommand::SshProbe {
            address,
            username,
            password,
            device_type,
            db,
        } => {
            handle_ssh_probe(
                context,
                &address,
                username.as_deref(),
                password.as_deref(),
                &device_type,
                db.as_ref(),
            )
            .await
        }
        CliCommand::Summary { db } => handle_summary(context, db.as_ref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleSet;
    use std::sync::Mutex;

    fn capturing_context() -> (AppContext, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let hook: OutputHook = Arc::new(move |line| sink.lock().unwrap().push(line.to_string()));
        (
            AppContext::from_env()
                .with_config(DiscoveryConfig::default())
                .with_output_hook(hook),
            lines,
        )
    }

    #[tokio::test]
    async fn version_goes_through_output_hook() {
        let (context, lines) = capturing_context();
        execute_command_with_context(CliCommand::Version, &context)
            .await
            .unwrap();
        assert_eq!(lines.lock().unwrap().as_slice(), [version_text()]);
    }

    #[test]
    fn crawl_options_override_context_config() {
        let (context, _) = capturing_context();
        let options = CrawlOptions {
            community: Some("s3cret".into()),
            modules: Some(ModuleSet::parse("bgp").unwrap()),
            db: None,
        };
        let config = context.crawl_config(&options);
        assert_eq!(config.community, "s3cret");
        assert_eq!(config.modules.to_string(), "bgp");

        let untouched = context.crawl_config(&CrawlOptions::default());
        assert_eq!(untouched.community, "public");
    }
}
