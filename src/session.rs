//! The interactive loop: read a command, run it through the reducer, print the new frame.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::config::Registry;
use crate::loader::LoadState;
use crate::nav::{self, Event, NavState};
use crate::render::{self, View};
use crate::style::Theme;

pub const HELP: &str = "\
Commands:
  Enter, f, l, >     forward (predictions, then answer, then next step)
  b, h, <            back
  j, +, down         next dataset
  k, -, up           previous dataset
  d <n|title>        switch to dataset n (1-based) or by title
  r, reset           back to the first step of this dataset
  ?, help            this help
  q, quit            exit (also Ctrl-D)
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nav(Event),
    Help,
    Quit,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Frame(String),
    Message(String),
    Exit,
}

pub fn parse_command(line: &str, registry: &Registry) -> Command {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word {
        "" | "f" | "l" | ">" | "right" => Command::Nav(Event::Forward),
        "b" | "h" | "<" | "left" => Command::Nav(Event::Backward),
        "j" | "+" | "down" => Command::Nav(Event::NextDataset),
        "k" | "-" | "up" => Command::Nav(Event::PrevDataset),
        "r" | "reset" => Command::Nav(Event::Reset),
        "?" | "help" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        "d" | "dataset" => match dataset_index(rest, registry) {
            Some(i) => Command::Nav(Event::ChangeDataset(i)),
            None => Command::Unknown(format!("no dataset \"{rest}\"")),
        },
        _ => Command::Unknown(format!("unknown command \"{line}\"")),
    }
}

fn dataset_index(arg: &str, registry: &Registry) -> Option<usize> {
    if let Ok(n) = arg.parse::<usize>() {
        return n.checked_sub(1).filter(|i| *i < registry.datasets.len());
    }
    registry.position(arg)
}

pub struct Session {
    registry: Registry,
    load: LoadState,
    nav: NavState,
    theme: Theme,
}

impl Session {
    pub fn new(registry: Registry, load: LoadState, theme: Theme) -> Session {
        let mut res = Session {
            registry,
            load,
            nav: NavState::default(),
            theme,
        };
        res.heal();
        res
    }

    pub fn state(&self) -> NavState {
        self.nav
    }

    pub fn dispatch(&mut self, event: Event) {
        let Some(datasets) = self.load.datasets() else {
            return;
        };
        let next = nav::reduce(self.nav, event, datasets);
        if next != self.nav {
            tracing::debug!(?event, from = ?self.nav, to = ?next, "navigation");
        }
        self.nav = next;
        self.heal();
    }

    fn heal(&mut self) {
        if let Some(datasets) = self.load.datasets() {
            if nav::needs_reset(self.nav, datasets) {
                tracing::warn!(cursor = ?self.nav.cursor, "cursor out of bounds; resetting");
                self.nav = nav::reduce(self.nav, Event::Reset, datasets);
            }
        }
    }

    pub fn frame(&self) -> String {
        render::frame(&View {
            load: &self.load,
            nav: self.nav,
            registry: &self.registry,
            theme: &self.theme,
        })
    }

    pub fn prompt(&self) -> String {
        match &self.load {
            LoadState::Loaded(_) => format!("{}> ", render::progress(&self.nav)),
            _ => "> ".to_string(),
        }
    }

    pub fn handle(&mut self, line: &str) -> Reply {
        match parse_command(line, &self.registry) {
            Command::Nav(event) => {
                self.dispatch(event);
                Reply::Frame(self.frame())
            }
            Command::Help => Reply::Message(HELP.to_string()),
            Command::Quit => Reply::Exit,
            Command::Unknown(msg) => Reply::Message(format!("{msg}; type ? for help")),
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut editor = DefaultEditor::new()?;
        println!("{}", self.frame());

        loop {
            match editor.readline(&self.prompt()) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.trim());
                    }
                    match self.handle(&line) {
                        Reply::Frame(frame) => println!("{frame}"),
                        Reply::Message(msg) => println!("{msg}"),
                        Reply::Exit => break,
                    }
                }
                Err(ReadlineError::Interrupted) => println!("^C"),
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
