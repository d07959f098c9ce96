use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Chat commands typed as `/name [argument]` in the composer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Select a model, or list the available ones
    Model,
    /// Fetch the model list again
    Models,
    /// Export the conversation
    Export,
    /// Quit
    Bye,
    Help,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

impl SlashCommand {
    /// One-line summary for the palette and help overlay
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Model => "select a model (/model <id>), or list models",
            SlashCommand::Models => "fetch the model list again",
            SlashCommand::Export => "export the conversation to a file",
            SlashCommand::Bye => "leave streamchat",
            SlashCommand::Help => "list commands and aliases",
        }
    }

    /// Keyword typed after the slash
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command can be run while a reply is streaming.
    pub fn available_during_streaming(self) -> bool {
        match self {
            SlashCommand::Model | SlashCommand::Models => false,
            SlashCommand::Export | SlashCommand::Bye | SlashCommand::Help => true,
        }
    }
}

/// Parse `/keyword [argument]`; unknown keywords are not commands
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    let tail: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(head).ok().or_else(|| match head.to_lowercase().as_str() {
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        "refresh" => Some(SlashCommand::Models),
        "save" => Some(SlashCommand::Export),
        _ => None,
    })?;

    let argument = if tail.is_empty() {
        None
    } else {
        Some(tail.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Text for the help overlay
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n");
    for entry in command_entries() {
        help.push_str(&format!("/{} - {}\n", entry.keyword, entry.description));
    }

    help.push_str("\nAliases: /q for /bye, /refresh for /models, /save for /export.");
    help.push_str("\nPress Enter to send. Input is disabled while a reply streams.");

    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_argument() {
        assert_eq!(
            parse_slash_command("/model qwen2.5:32b"),
            Some(ParsedCommand {
                command: SlashCommand::Model,
                argument: Some("qwen2.5:32b".to_string()),
            })
        );
    }

    #[test]
    fn parses_aliases() {
        assert_eq!(parse_slash_command("/q").map(|c| c.command), Some(SlashCommand::Bye));
        assert_eq!(
            parse_slash_command("/refresh").map(|c| c.command),
            Some(SlashCommand::Models)
        );
    }

    #[test]
    fn plain_text_and_unknown_commands_are_not_commands() {
        assert_eq!(parse_slash_command("hello"), None);
        assert_eq!(parse_slash_command("/nope"), None);
        assert_eq!(parse_slash_command("/"), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = get_help_text();
        for command in SlashCommand::iter() {
            assert!(help.contains(&format!("/{}", command.command())));
        }
    }
}
