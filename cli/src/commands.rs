//! REPL line parsing.

/// One line of user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Plain text for the model. May be empty when an image is staged.
    Send(&'a str),
    /// PNG file path or `data:` URL.
    Capture(&'a str),
    ClearImage,
    Mount(&'a str),
    Status,
    Help,
    Quit,
    MissingArgument { command: &'static str, usage: &'static str },
    Unknown(&'a str),
}

pub const HELP_TEXT: &str = "\
Commands:
  /capture <png-file|data-url>  stage a screen capture for the next message
  /clear-image                  drop the staged capture
  /mount <dir>                  mount a workspace directory for file tools
  /status                       show model, workspace and capture state
  /help                         show this help
  /quit                         exit
Anything else is sent to the model. An empty line sends a staged capture alone.";

pub fn parse(line: &str) -> Command<'_> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line);
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "capture" | "c" => with_arg(
            arg,
            "/capture",
            "/capture <png-file|data-url>",
            Command::Capture,
        ),
        "clear-image" => Command::ClearImage,
        "mount" | "m" => with_arg(arg, "/mount", "/mount <dir>", Command::Mount),
        "status" => Command::Status,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        _ => Command::Unknown(name),
    }
}

fn with_arg<'a>(
    arg: &'a str,
    command: &'static str,
    usage: &'static str,
    build: fn(&'a str) -> Command<'a>,
) -> Command<'a> {
    if arg.is_empty() {
        Command::MissingArgument { command, usage }
    } else {
        build(arg)
    }
}
