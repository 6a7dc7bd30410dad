use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use hearth_core::kernel::error::Result;
use hearth_core::plugin_system::PluginManager;
use hearth_core::utils::error_chain;

/// A command typed into the admin console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    List,
    Enable(String),
    Disable(String),
    Help,
    Quit,
    Unknown(String),
}

impl AdminCommand {
    /// Parse one console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?.to_lowercase();
        let argument = words.collect::<Vec<_>>().join(" ");
        let command = match (verb.as_str(), argument.is_empty()) {
            ("list", _) => AdminCommand::List,
            ("enable", false) => AdminCommand::Enable(argument),
            ("disable", false) => AdminCommand::Disable(argument),
            ("help", _) => AdminCommand::Help,
            ("quit" | "exit", _) => AdminCommand::Quit,
            _ => AdminCommand::Unknown(line.trim().to_string()),
        };
        Some(command)
    }
}

/// Execute a command against the plugin manager and return the text to print.
pub async fn execute<M: PluginManager + ?Sized>(manager: &M, command: &AdminCommand) -> String {
    match command {
        AdminCommand::List => format!("Plugins: {}", manager.readable_plugin_list().await),
        AdminCommand::Enable(name) => match manager.enable_plugin(name).await {
            Ok(()) => format!("Enabled {}", name),
            Err(e) => format!("Cannot enable {}: {}", name, error_chain(&e)),
        },
        AdminCommand::Disable(name) => match manager.disable_plugin(name).await {
            Ok(()) => format!("Disabled {}", name),
            Err(e) => format!("Cannot disable {}: {}", name, error_chain(&e)),
        },
        AdminCommand::Help => "Commands: list, enable <plugin>, disable <plugin>, quit".to_string(),
        AdminCommand::Quit => "Bye".to_string(),
        AdminCommand::Unknown(line) => format!("Unknown command '{}'; try 'help'", line),
    }
}

/// Read admin commands from stdin until `quit` or end of input.
pub async fn run_console<M: PluginManager + ?Sized>(manager: &M) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| hearth_core::KernelError::io(e, "read_stdin", "<stdin>".into()))?
    {
        let Some(command) = AdminCommand::parse(&line) else {
            continue;
        };
        let output = execute(manager, &command).await;
        stdout
            .write_all(format!("{}\n", output).as_bytes())
            .await
            .map_err(|e| hearth_core::KernelError::io(e, "write_stdout", "<stdout>".into()))?;
        stdout
            .flush()
            .await
            .map_err(|e| hearth_core::KernelError::io(e, "write_stdout", "<stdout>".into()))?;
        if command == AdminCommand::Quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_commands() {
        assert_eq!(AdminCommand::parse("  "), None);
        assert_eq!(AdminCommand::parse("LIST"), Some(AdminCommand::List));
        assert_eq!(
            AdminCommand::parse("enable  My Plugin"),
            Some(AdminCommand::Enable("My Plugin".to_string()))
        );
        assert_eq!(AdminCommand::parse("disable core"), Some(AdminCommand::Disable("core".to_string())));
        assert_eq!(AdminCommand::parse("enable"), Some(AdminCommand::Unknown("enable".to_string())));
        assert_eq!(AdminCommand::parse("exit"), Some(AdminCommand::Quit));
        assert_eq!(AdminCommand::parse("dance"), Some(AdminCommand::Unknown("dance".to_string())));
    }
}
