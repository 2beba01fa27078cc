//! Interactive session: reads commands from stdin while documents load in
//! the background, and prints each document as it becomes current.

use std::io::{BufRead as _, Write as _};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::commands;
use crate::config::Config;
use crate::diagnostics;
use crate::error::Error;
use crate::loader::Loaded;
use crate::session::{Request, Session};

/// How often the input loop checks for finished loads.
const POLL_MS: u64 = 50;

/// Body lines printed when a document is first shown.
const PAGE_LINES: usize = 40;

/// Help text for the `help` command.
const HELP: &str = "\
go <address>      open a path, URL, forge shorthand, or #anchor
follow <link>     open a link relative to the current document
back, forward     move through history
reload            refetch the current document
jump <anchor>     scroll to a heading
show              print the rest of the current document from the scroll position
toc               list headings
bookmark [title]  bookmark the current document
bookmarks         list bookmarks
history           list this session's history
cancel            abandon the load in progress
quit              leave
";

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    /// Step back.
    Back,
    /// Bookmark the current document.
    Bookmark(Option<&'a str>),
    /// List bookmarks.
    Bookmarks,
    /// Supersede the in-flight load.
    Cancel,
    /// Blank line.
    Empty,
    /// Open a link in the current document.
    Follow(&'a str),
    /// Step forward.
    Forward,
    /// Open typed input.
    Go(&'a str),
    /// Print help.
    Help,
    /// List history.
    History,
    /// Scroll to an anchor.
    Jump(&'a str),
    /// Leave.
    Quit,
    /// Refetch the current document.
    Reload,
    /// Print the current document from the scroll position.
    Show,
    /// List headings.
    Toc,
    /// Unrecognised input.
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    /// Split a line into a command word and its argument.
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let (word, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, a)| return (w, a.trim()));
        let arg_opt = (!arg.is_empty()).then_some(arg);

        return match (word, arg_opt) {
            ("", _) => Self::Empty,
            ("b" | "back", None) => Self::Back,
            ("bookmark", title) => Self::Bookmark(title),
            ("bookmarks", None) => Self::Bookmarks,
            ("cancel", None) => Self::Cancel,
            ("f" | "follow", Some(href)) => Self::Follow(href),
            ("forward", None) => Self::Forward,
            ("g" | "go", Some(input)) => Self::Go(input),
            ("h" | "help" | "?", None) => Self::Help,
            ("history", None) => Self::History,
            ("j" | "jump", Some(anchor)) => Self::Jump(anchor.trim_start_matches('#')),
            ("q" | "quit" | "exit", None) => Self::Quit,
            ("r" | "reload", None) => Self::Reload,
            ("s" | "show", None) => Self::Show,
            ("toc", None) => Self::Toc,
            _ => Self::Unknown(line),
        };
    }
}

/// Session plus the bookkeeping for the load in flight.
struct Browser {
    /// Whether a background load has been requested and not yet answered.
    pending: bool,
    /// Navigation state.
    session: Session,
    /// How long to wait for a load before giving up at exit.
    wait: Duration,
}

impl Browser {
    /// Apply a finished load if it is still wanted.
    fn apply(&mut self, loaded: Loaded) {
        if self.session.loader().is_current(loaded.ticket) {
            self.pending = false;
        }
        match self.session.accept(loaded) {
            Ok(Some(_)) => self.show(Some(PAGE_LINES)),
            Ok(None) => {},
            Err(e) => report(&e),
        }
    }

    /// Run one command. Returns `false` to leave.
    fn dispatch(&mut self, command: Command<'_>) -> bool {
        if matches!(command, Command::Back | Command::Forward | Command::Jump(_) | Command::Reload) {
            // The session abandons the load in flight on these moves.
            self.pending = false;
        }
        match command {
            Command::Back => {
                let moved = self.session.back();
                self.shown(moved.map(drop));
            },
            Command::Bookmark(title) => match self.session.bookmark_current(title) {
                Ok(true) => println!("bookmarked"),
                Ok(false) => println!("already bookmarked"),
                Err(e) => report(&e),
            },
            Command::Bookmarks => {
                for (i, bookmark) in self.session.bookmarks().list().enumerate() {
                    println!("{i:>3}  {}  {}", bookmark.title, bookmark.address);
                }
            },
            Command::Cancel => {
                self.session.loader().cancel();
                self.pending = false;
            },
            Command::Empty => {},
            Command::Follow(href) => {
                let request = self.session.request_link(href);
                self.start(request);
            },
            Command::Forward => {
                let moved = self.session.forward();
                self.shown(moved.map(drop));
            },
            Command::Go(input) => {
                let request = self.session.request(input);
                self.start(request);
            },
            Command::Help => print!("{HELP}"),
            Command::History => self.print_history(),
            Command::Jump(anchor) => {
                let jumped = self.session.jump(anchor);
                self.shown(jumped.map(drop));
            },
            Command::Quit => return false,
            Command::Reload => {
                let reloaded = self.session.reload();
                self.shown(reloaded.map(drop));
            },
            Command::Show => self.show(None),
            Command::Toc => match self.session.current() {
                Ok(entry) => print!("{}", commands::render_toc(entry.document().toc())),
                Err(e) => report(&e),
            },
            Command::Unknown(line) => eprintln!("unknown command `{line}`, try `help`"),
        }
        return true;
    }

    /// Wait out the load in flight so its visit is recorded before exit.
    fn finish(&mut self) {
        while self.pending {
            let Some(loaded) = self.session.loader().recv_timeout(self.wait) else {
                eprintln!("gave up waiting for the load in progress");
                return;
            };
            self.apply(loaded);
        }
    }

    /// Apply every load that has finished.
    fn poll(&mut self) {
        while let Some(loaded) = self.session.loader().try_recv() {
            self.apply(loaded);
        }
    }

    /// This session's stack, the current entry marked.
    fn print_history(&self) {
        let cursor = self.session.history().cursor();
        for (i, entry) in self.session.history().entries().enumerate() {
            let mark = if Some(i) == cursor { '>' } else { ' ' };
            println!("{mark}{i:>3}  {}", entry.location());
        }
    }

    /// Print the current document from its scroll position, at most
    /// `limit` lines.
    fn show(&self, limit: Option<usize>) {
        let entry = match self.session.current() {
            Ok(entry) => entry,
            Err(e) => {
                report(&e);
                return;
            },
        };
        let document = entry.document();
        println!("── {} ({})", document.title(), document.location());
        let lines = document.body().lines().skip(entry.scroll_position());
        for line in lines.take(limit.unwrap_or(usize::MAX)) {
            println!("{line}");
        }
    }

    /// Show the outcome of a synchronous move.
    fn shown(&self, outcome: Result<(), Error>) {
        match outcome {
            Ok(()) => self.show(Some(PAGE_LINES)),
            Err(e) => report(&e),
        }
    }

    /// Note a request: anchors have already moved, loads are now pending.
    fn start(&mut self, request: Result<Request, Error>) {
        match request {
            Ok(Request::Jumped { .. }) => {
                self.pending = false;
                self.show(Some(PAGE_LINES));
            },
            Ok(Request::Pending(_)) => {
                self.pending = true;
                eprintln!("loading...");
            },
            Err(e) => report(&e),
        }
    }
}

/// Print the prompt without a newline.
fn prompt() {
    print!("mdnav> ");
    let _ = std::io::stdout().flush();
}

/// Print an error. Boundary errors get one line, others the full diagnostic.
fn report(e: &Error) {
    if e.is_boundary() {
        eprintln!("{e}");
    } else {
        diagnostics::print_error(e);
    }
}

/// Entry point for the browse command.
///
/// Opens `address` if given, otherwise reopens the last location from
/// saved history, then reads commands until `quit` or end of input.
///
/// # Errors
///
/// Returns errors from opening the session. Errors from individual
/// commands are printed and the session continues.
pub fn run(config: &Config, address: Option<&str>) -> Result<(), Error> {
    let mut browser = Browser {
        pending: false,
        session: Session::open(config)?,
        wait: config.timeout().saturating_mul(4),
    };

    match address {
        Some(input) => {
            browser.dispatch(Command::Go(input));
        },
        None => match browser.session.restore() {
            Ok(Some(_)) => browser.show(Some(PAGE_LINES)),
            Ok(None) => eprintln!("No saved history. Type `go <address>` or `help`."),
            Err(e) => report(&e),
        },
    }

    let lines = spawn_reader();
    let poll = Duration::from_millis(POLL_MS);
    prompt();
    loop {
        browser.poll();
        match lines.recv_timeout(poll) {
            Ok(line) => {
                if !browser.dispatch(Command::parse(&line)) {
                    break;
                }
                prompt();
            },
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => {
                browser.finish();
                break;
            },
        }
    }
    println!();
    return Ok(());
}

/// Forward stdin lines to a channel so input and loads can be interleaved.
fn spawn_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                return;
            };
            if tx.send(line).is_err() {
                return;
            }
        }
    });
    return rx;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(Command::parse("go  gh foo/bar "), Command::Go("gh foo/bar"));
        assert_eq!(Command::parse("jump #install"), Command::Jump("install"));
        assert_eq!(Command::parse("bookmark"), Command::Bookmark(None));
        assert_eq!(Command::parse("bookmark My Notes"), Command::Bookmark(Some("My Notes")));
        assert_eq!(Command::parse("   "), Command::Empty);
    }

    #[test]
    fn missing_or_extra_arguments_are_unknown() {
        assert_eq!(Command::parse("go"), Command::Unknown("go"));
        assert_eq!(Command::parse("back now"), Command::Unknown("back now"));
    }
}
