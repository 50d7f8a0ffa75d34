use std::path::PathBuf;

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Channels,
    Join(String),
    Older,
    Attach(PathBuf),
    /// Send the draft, optionally replacing its text first.
    Send(Option<String>),
    Help,
    Quit,
    Unknown(String),
}

/// `None` for blank lines. Text without a leading `/` is a send.
pub fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Send(Some(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let arg = (!arg.is_empty()).then(|| arg.to_string());

    let command = match (name, arg) {
        ("channels", _) => Command::Channels,
        ("join", Some(channel)) => Command::Join(channel),
        ("older", _) => Command::Older,
        ("attach", Some(path)) => Command::Attach(PathBuf::from(path)),
        ("send", text) => Command::Send(text),
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

pub const HELP: &str = "\
/channels          list channels with unread counts
/join <channel>    open a channel by name or id
/older             load the page before the oldest shown message
/attach <path>     attach a file to the next message
/send [text]       send the draft (plain text lines send too)
/quit              leave";
