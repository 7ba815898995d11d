//! SSH connectors
//!
//! Both connectors drive the system OpenSSH client through the process
//! runner. A remote command `cmd` becomes
//!
//! ```text
//! ssh -o BatchMode=yes [-p port] [-i identity] [user@]host -- cmd
//! ```
//!
//! The identity file is resolved through the secrets manager, so it may be
//! stored encrypted and decoded to a temporary location.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use schemata_core::{ChangeFile, Configuration, Error, Result};

use super::{run_process, shell_command, Connector, ConnectorFactory};
use crate::context::CommandContext;

/// Connector type served by [`SshCommandsConnectorFactory`]
pub const SSH_COMMANDS_TYPE: &str = "ssh-commands";
/// Connector type served by [`SshScriptConnectorFactory`]
pub const SSH_SCRIPT_TYPE: &str = "ssh-script";

const DEFAULT_SSH_COMMAND: &str = "ssh";
const DEFAULT_REMOTE_TEMP_DIRECTORY: &str = "/tmp";

/// Remote host and client options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    ssh_command: String,
    host: String,
    user: Option<String>,
    port: Option<u16>,
    identity_file: Option<PathBuf>,
}

impl SshTarget {
    /// Read `host`, `user`, `port`, `identity-file` and `ssh-command`
    pub fn from_configuration(name: &str, config: &Configuration, ctx: &CommandContext) -> Result<Self> {
        let host = config.require("host").map_err(|_| {
            Error::configuration(format!("connector '{}' requires 'host'", name))
        })?;
        let port = match config.get("port") {
            Some(port) => Some(port.trim().parse::<u16>().map_err(|_| {
                Error::configuration(format!("connector '{}' has invalid port '{}'", name, port))
            })?),
            None => None,
        };
        let identity_file = match config.get("identity-file").filter(|f| !f.trim().is_empty()) {
            Some(file) => Some(ctx.require_secrets()?.decoded_file_path(Path::new(file))?),
            None => None,
        };
        Ok(SshTarget {
            ssh_command: config.get_or("ssh-command", DEFAULT_SSH_COMMAND).to_string(),
            host: host.to_string(),
            user: config.get("user").filter(|u| !u.trim().is_empty()).map(String::from),
            port,
            identity_file,
        })
    }

    /// `user@host` or `host`
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// Client invocation running `remote` on the target
    pub fn command(&self, remote: &str) -> Command {
        let mut command = Command::new(&self.ssh_command);
        command.arg("-o").arg("BatchMode=yes");
        if let Some(port) = self.port {
            command.arg("-p").arg(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            command.arg("-i").arg(identity);
        }
        command.arg(self.destination()).arg("--").arg(remote);
        command
    }
}

/// Single-quote `value` for a POSIX shell
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Runs each non-blank line of a change file as a remote command
#[derive(Debug, Clone)]
pub struct SshCommandsConnector {
    name: String,
    target: SshTarget,
}

impl Connector for SshCommandsConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, change_file: &dyn ChangeFile, ctx: &CommandContext) -> Result<()> {
        let content = std::fs::read_to_string(change_file.file())?;
        let id = change_file.id();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            ctx.cancellation().check("remote commands")?;
            info!(target: "schemata::connector", connector = %self.name, change = %id, line = number + 1, "Running remote command");
            let label = format!("{}:{} ({})", id, number + 1, self.name);
            run_process(self.target.command(line), None, &label, ctx.cancellation())?;
        }
        Ok(())
    }
}

/// Factory for `ssh-commands` connectors
#[derive(Debug, Default)]
pub struct SshCommandsConnectorFactory;

impl ConnectorFactory for SshCommandsConnectorFactory {
    fn connector_type(&self) -> &str {
        SSH_COMMANDS_TYPE
    }

    fn create_connector(
        &self,
        name: &str,
        config: &Configuration,
        ctx: &CommandContext,
    ) -> Result<Arc<dyn Connector>> {
        Ok(Arc::new(SshCommandsConnector {
            name: name.to_string(),
            target: SshTarget::from_configuration(name, config, ctx)?,
        }))
    }
}

/// Uploads a change file, runs it remotely and removes it
#[derive(Debug, Clone)]
pub struct SshScriptConnector {
    name: String,
    target: SshTarget,
    shell: Vec<String>,
    remote_temp_directory: String,
}

impl SshScriptConnector {
    fn remote_path(&self, extension: &str) -> String {
        format!(
            "{}/schemata-{}.{}",
            self.remote_temp_directory.trim_end_matches('/'),
            Uuid::new_v4(),
            extension
        )
    }

    fn run_uploaded(&self, remote: &str, content: &[u8], label: &str, ctx: &CommandContext) -> Result<()> {
        let quoted = quote(remote);
        run_process(
            self.target.command(&format!("cat > {}", quoted)),
            Some(content),
            &format!("{} upload", label),
            ctx.cancellation(),
        )?;
        run_process(
            self.target.command(&format!("chmod +x {}", quoted)),
            None,
            &format!("{} chmod", label),
            ctx.cancellation(),
        )?;
        let shell = self.shell.iter().map(|part| quote(part)).collect::<Vec<_>>().join(" ");
        run_process(
            self.target.command(&format!("{} {}", shell, quoted)),
            None,
            label,
            ctx.cancellation(),
        )?;
        Ok(())
    }
}

impl Connector for SshScriptConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, change_file: &dyn ChangeFile, ctx: &CommandContext) -> Result<()> {
        let content = std::fs::read(change_file.file())?;
        let id = change_file.id();
        let remote = self.remote_path(id.extension());
        let label = format!("{} ({})", id, self.name);
        info!(target: "schemata::connector", connector = %self.name, change = %id, %remote, "Running remote script");

        let result = self.run_uploaded(&remote, &content, &label, ctx);

        // Removal must run even after cancellation, so it gets its own token
        let cleanup = run_process(
            self.target.command(&format!("rm -f {}", quote(&remote))),
            None,
            &format!("{} cleanup", label),
            &Default::default(),
        );
        if let Err(e) = cleanup {
            warn!(target: "schemata::connector", connector = %self.name, %remote, error = %e, "Failed to remove remote script");
        }
        result
    }
}

/// Factory for `ssh-script` connectors
#[derive(Debug, Default)]
pub struct SshScriptConnectorFactory;

impl ConnectorFactory for SshScriptConnectorFactory {
    fn connector_type(&self) -> &str {
        SSH_SCRIPT_TYPE
    }

    fn create_connector(
        &self,
        name: &str,
        config: &Configuration,
        ctx: &CommandContext,
    ) -> Result<Arc<dyn Connector>> {
        Ok(Arc::new(SshScriptConnector {
            name: name.to_string(),
            target: SshTarget::from_configuration(name, config, ctx)?,
            shell: match config.get("shell") {
                Some(_) => shell_command(config),
                None => vec!["sh".to_string()],
            },
            remote_temp_directory: config
                .get_or("remote-temp-directory", DEFAULT_REMOTE_TEMP_DIRECTORY)
                .to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemata_core::PlainSecretsManager;

    fn ctx() -> CommandContext {
        let ctx = CommandContext::new();
        ctx.set_secrets(Arc::new(PlainSecretsManager)).unwrap();
        ctx
    }

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_target_command_line() {
        let config = Configuration::new()
            .with("host", "db.example.com")
            .with("user", "deploy")
            .with("port", "2222");
        let target = SshTarget::from_configuration("remote", &config, &ctx()).unwrap();
        assert_eq!(target.destination(), "deploy@db.example.com");
        let command = target.command("uptime");
        assert_eq!(command.get_program(), "ssh");
        assert_eq!(
            args(&command),
            vec!["-o", "BatchMode=yes", "-p", "2222", "deploy@db.example.com", "--", "uptime"]
        );
    }

    #[test]
    fn test_target_requires_host_and_valid_port() {
        assert!(matches!(
            SshTarget::from_configuration("remote", &Configuration::new(), &ctx()),
            Err(Error::Configuration(_))
        ));
        let config = Configuration::new().with("host", "h").with("port", "99999");
        assert!(matches!(
            SshTarget::from_configuration("remote", &config, &ctx()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_identity_file_resolved_through_secrets() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let config = Configuration::new()
            .with("host", "h")
            .with("identity-file", key.path().display().to_string());
        let target = SshTarget::from_configuration("remote", &config, &ctx()).unwrap();
        assert!(args(&target.command("true")).contains(&key.path().display().to_string()));

        let missing = Configuration::new()
            .with("host", "h")
            .with("identity-file", "/definitely/not/here");
        assert!(matches!(
            SshTarget::from_configuration("remote", &missing, &ctx()),
            Err(Error::Secrets(_))
        ));

        // Secrets must be initialized when an identity file is configured
        assert!(matches!(
            SshTarget::from_configuration("remote", &config, &CommandContext::new()),
            Err(Error::ContextValueMissing(_))
        ));
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("/tmp/a b"), "'/tmp/a b'");
        assert_eq!(quote("it's"), r"'it'\''s'");
    }
}
