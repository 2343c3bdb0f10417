//! Shell line grammar: `<instance> <tool> <action> [args...]`, plus a few
//! bare commands. Free text (memo bodies, event content, node names) takes
//! the rest of the line verbatim.

use thiserror::Error;
use toolshare_core::ToolId;
use toolshare_tools::RewriteStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Help,
    Quit,
    Instances,
    Run { instance: usize, action: ToolAction },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAction {
    MemoShow,
    MemoSave(String),
    MemoClear,
    TimerShow,
    TimerStart(u32),
    TimerStop,
    CalendarShow,
    CalendarSave { date: String, content: String },
    CalendarDelete(String),
    CalendarMonth(Option<String>),
    CalendarNext,
    CalendarPrev,
    MapShow,
    MapAdd { parent: String, name: String },
    MapDone { id: String, done: bool },
    MapRemove(String),
    QrShow,
    QrGenerate(String),
    RewriteShow,
    Rewrite { style: RewriteStyle, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("unknown command `{0}`, try `help`")]
    UnknownCommand(String),
    #[error("instance numbers start at 1, got `{0}`")]
    BadInstance(String),
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("`{tool}` has no shell action `{action}`")]
    UnknownAction { tool: String, action: String },
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("`{0}` is not a number of seconds")]
    BadSeconds(String),
    #[error("unknown style `{0}`, use formal, casual, business or academic")]
    UnknownStyle(String),
}

pub const HELP: &str = "\
Commands:
  <n> memo show | save <text> | clear
  <n> timer show | start <seconds> | stop
  <n> calendar show | save <YYYY-MM-DD> <content> | delete <YYYY-MM-DD>
  <n> calendar month [YYYY-MM] | next | prev
  <n> map show | add <parent-id> <name> | done <id> | undone <id> | remove <id>
  <n> qr show | gen <text>
  <n> rewrite show | <formal|casual|business|academic> <text>
  instances   list attached instances
  help        show this help
  quit        leave the shell
<n> is the instance number, starting at 1.";

/// Parse one line. Blank lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<ShellInput>, LineError> {
    let (head, rest) = split_word(line);
    let input = match head {
        "" => return Ok(None),
        "help" | "?" => ShellInput::Help,
        "quit" | "exit" => ShellInput::Quit,
        "instances" => ShellInput::Instances,
        number if number.starts_with(|c: char| c.is_ascii_digit()) => {
            let instance = number
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| LineError::BadInstance(number.to_string()))?;
            ShellInput::Run {
                instance,
                action: parse_action(rest)?,
            }
        }
        other => return Err(LineError::UnknownCommand(other.to_string())),
    };
    Ok(Some(input))
}

fn parse_action(line: &str) -> Result<ToolAction, LineError> {
    let (tool_name, rest) = split_word(line);
    if tool_name.is_empty() {
        return Err(LineError::Missing("tool name"));
    }
    let tool: ToolId = tool_name
        .parse()
        .map_err(|_| LineError::UnknownTool(tool_name.to_string()))?;
    let (action, args) = split_word(rest);

    let parsed = match (tool, action) {
        (ToolId::Memo, "show" | "") => ToolAction::MemoShow,
        (ToolId::Memo, "save") => ToolAction::MemoSave(args.to_string()),
        (ToolId::Memo, "clear") => ToolAction::MemoClear,
        (ToolId::Timer, "show" | "") => ToolAction::TimerShow,
        (ToolId::Timer, "start") => {
            let (seconds, _) = split_word(args);
            if seconds.is_empty() {
                return Err(LineError::Missing("seconds"));
            }
            ToolAction::TimerStart(
                seconds
                    .parse()
                    .map_err(|_| LineError::BadSeconds(seconds.to_string()))?,
            )
        }
        (ToolId::Timer, "stop") => ToolAction::TimerStop,
        (ToolId::Calendar, "show" | "") => ToolAction::CalendarShow,
        (ToolId::Calendar, "save") => {
            let (date, content) = split_word(args);
            if date.is_empty() {
                return Err(LineError::Missing("date"));
            }
            ToolAction::CalendarSave {
                date: date.to_string(),
                content: content.to_string(),
            }
        }
        (ToolId::Calendar, "delete" | "del") => {
            ToolAction::CalendarDelete(required_word(args, "date")?)
        }
        (ToolId::Calendar, "month") => {
            let (month, _) = split_word(args);
            ToolAction::CalendarMonth((!month.is_empty()).then(|| month.to_string()))
        }
        (ToolId::Calendar, "next") => ToolAction::CalendarNext,
        (ToolId::Calendar, "prev") => ToolAction::CalendarPrev,
        (ToolId::Map, "show" | "") => ToolAction::MapShow,
        (ToolId::Map, "add") => {
            let (parent, name) = split_word(args);
            if parent.is_empty() {
                return Err(LineError::Missing("parent id"));
            }
            ToolAction::MapAdd {
                parent: parent.to_string(),
                name: name.to_string(),
            }
        }
        (ToolId::Map, "done") => ToolAction::MapDone {
            id: required_word(args, "node id")?,
            done: true,
        },
        (ToolId::Map, "undone") => ToolAction::MapDone {
            id: required_word(args, "node id")?,
            done: false,
        },
        (ToolId::Map, "remove" | "rm") => ToolAction::MapRemove(required_word(args, "node id")?),
        (ToolId::Qr, "show" | "") => ToolAction::QrShow,
        (ToolId::Qr, "gen" | "generate") => ToolAction::QrGenerate(args.to_string()),
        (ToolId::Rewrite, "show" | "") => ToolAction::RewriteShow,
        (ToolId::Rewrite, style) => ToolAction::Rewrite {
            style: style
                .parse()
                .map_err(|_| LineError::UnknownStyle(style.to_string()))?,
            text: args.to_string(),
        },
        (_, action) => {
            return Err(LineError::UnknownAction {
                tool: tool_name.to_string(),
                action: action.to_string(),
            });
        }
    };
    Ok(parsed)
}

fn required_word(args: &str, what: &'static str) -> Result<String, LineError> {
    match split_word(args).0 {
        "" => Err(LineError::Missing(what)),
        word => Ok(word.to_string()),
    }
}

/// First whitespace-separated word and the trimmed remainder.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn run(instance: usize, action: ToolAction) -> Option<ShellInput> {
        Some(ShellInput::Run { instance, action })
    }

    #[rstest]
    #[case("1 memo save hello world", run(1, ToolAction::MemoSave("hello world".into())))]
    #[case("2 memo show", run(2, ToolAction::MemoShow))]
    #[case("2 memo", run(2, ToolAction::MemoShow))]
    #[case("1 timer start 5", run(1, ToolAction::TimerStart(5)))]
    #[case("  3   timer   stop ", run(3, ToolAction::TimerStop))]
    #[case(
        "1 calendar save 2026-05-01 Team lunch",
        run(1, ToolAction::CalendarSave { date: "2026-05-01".into(), content: "Team lunch".into() })
    )]
    #[case("2 calendar delete 2026-05-01", run(2, ToolAction::CalendarDelete("2026-05-01".into())))]
    #[case(
        "1 map add root Write docs",
        run(1, ToolAction::MapAdd { parent: "root".into(), name: "Write docs".into() })
    )]
    #[case("1 map undone abc", run(1, ToolAction::MapDone { id: "abc".into(), done: false }))]
    #[case("1 qr gen https://example.com", run(1, ToolAction::QrGenerate("https://example.com".into())))]
    #[case("1 calendar month 2026-05", run(1, ToolAction::CalendarMonth(Some("2026-05".into()))))]
    #[case("1 calendar month", run(1, ToolAction::CalendarMonth(None)))]
    #[case("2 calendar next", run(2, ToolAction::CalendarNext))]
    #[case(
        "1 rewrite casual we do not stop",
        run(1, ToolAction::Rewrite { style: RewriteStyle::Casual, text: "we do not stop".into() })
    )]
    #[case("1 rewrite", run(1, ToolAction::RewriteShow))]
    #[case("help", Some(ShellInput::Help))]
    #[case("exit", Some(ShellInput::Quit))]
    #[case("   ", None)]
    fn parses_valid_lines(#[case] line: &str, #[case] expected: Option<ShellInput>) {
        assert_eq!(parse_line(line).unwrap(), expected);
    }

    #[rstest]
    #[case("0 memo show", LineError::BadInstance("0".into()))]
    #[case("1x memo show", LineError::BadInstance("1x".into()))]
    #[case("1", LineError::Missing("tool name"))]
    #[case("1 speech start", LineError::UnknownTool("speech".into()))]
    #[case("1 memo shout", LineError::UnknownAction { tool: "memo".into(), action: "shout".into() })]
    #[case("1 ocr show", LineError::UnknownAction { tool: "ocr".into(), action: "show".into() })]
    #[case("1 timer start", LineError::Missing("seconds"))]
    #[case("1 timer start soon", LineError::BadSeconds("soon".into()))]
    #[case("1 map done", LineError::Missing("node id"))]
    #[case("1 rewrite poetic roses", LineError::UnknownStyle("poetic".into()))]
    #[case("dance", LineError::UnknownCommand("dance".into()))]
    fn rejects_invalid_lines(#[case] line: &str, #[case] expected: LineError) {
        assert_eq!(parse_line(line).unwrap_err(), expected);
    }
}
