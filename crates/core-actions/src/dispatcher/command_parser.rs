//! Classification of an assembled command line into built-ins and shell commands.
//!
//! Pure and synchronous: no filesystem access happens here. `cd` resolution
//! against the working directory lives in `command.rs`.
//!
//! `cd` is matched as a whole word only (`cd`, `cd..`, or `cd` followed by
//! whitespace), so programs such as `cdrecord` fall through to the shell.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdTarget {
    Home,
    Parent,
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Empty,
    Clear,
    Exit,
    Cd(CdTarget),
    Run(String),
}

pub struct CommandParser;

impl CommandParser {
    pub fn parse(raw: &str) -> ParsedCommand {
        let s = raw.trim();
        match s {
            "" => return ParsedCommand::Empty,
            "clear" | "cls" => return ParsedCommand::Clear,
            "exit" => return ParsedCommand::Exit,
            "cd" => return ParsedCommand::Cd(CdTarget::Home),
            "cd.." => return ParsedCommand::Cd(CdTarget::Parent),
            _ => {}
        }
        if let Some(rest) = s.strip_prefix("cd")
            && rest.starts_with(char::is_whitespace)
        {
            return ParsedCommand::Cd(parse_cd_target(rest.trim()));
        }
        ParsedCommand::Run(s.to_string())
    }
}

fn parse_cd_target(dest: &str) -> CdTarget {
    let dest = strip_quotes(dest);
    match dest {
        "" | "~" => CdTarget::Home,
        ".." => CdTarget::Parent,
        other => CdTarget::Path(other.to_string()),
    }
}

fn strip_quotes(s: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner;
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_and_whitespace() {
        assert_eq!(CommandParser::parse(""), ParsedCommand::Empty);
        assert_eq!(CommandParser::parse("  \t "), ParsedCommand::Empty);
    }

    #[test]
    fn parse_clear_aliases() {
        assert_eq!(CommandParser::parse("clear"), ParsedCommand::Clear);
        assert_eq!(CommandParser::parse(" cls "), ParsedCommand::Clear);
    }

    #[test]
    fn parse_exit() {
        assert_eq!(CommandParser::parse("exit"), ParsedCommand::Exit);
        assert_eq!(
            CommandParser::parse("exit 1"),
            ParsedCommand::Run("exit 1".into())
        );
    }

    #[test]
    fn parse_cd_forms() {
        assert_eq!(CommandParser::parse("cd"), ParsedCommand::Cd(CdTarget::Home));
        assert_eq!(CommandParser::parse("cd ~"), ParsedCommand::Cd(CdTarget::Home));
        assert_eq!(CommandParser::parse("cd.."), ParsedCommand::Cd(CdTarget::Parent));
        assert_eq!(
            CommandParser::parse("cd   .."),
            ParsedCommand::Cd(CdTarget::Parent)
        );
        assert_eq!(
            CommandParser::parse("cd my dir"),
            ParsedCommand::Cd(CdTarget::Path("my dir".into()))
        );
        assert_eq!(
            CommandParser::parse("cd \"with space\""),
            ParsedCommand::Cd(CdTarget::Path("with space".into()))
        );
    }

    #[test]
    fn cd_prefix_programs_run_in_shell() {
        assert_eq!(
            CommandParser::parse("cdrecord -v"),
            ParsedCommand::Run("cdrecord -v".into())
        );
    }

    #[test]
    fn parse_run_is_trimmed() {
        assert_eq!(
            CommandParser::parse("  echo hi  "),
            ParsedCommand::Run("echo hi".into())
        );
    }
}
