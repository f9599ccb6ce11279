// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL over a module registry.

use crate::manifest::Manifest;
use crate::render::{format_exports, format_status};
use owo_colors::OwoColorize;
use reqload_core::Registry;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// REPL configuration constants
const HISTORY_FILE: &str = ".reqload_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// Words that start a module operation
const VERBS: &[&str] = &["require", "resolve"];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Modules,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        let rest = input.strip_prefix('.')?;

        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "clear" | "cls" => Some((ReplCommand::Clear, arg)),
            "version" | "v" => Some((ReplCommand::Version, arg)),
            "load" | "l" => Some((ReplCommand::Load, arg)),
            "modules" | "m" => Some((ReplCommand::Modules, arg)),
            _ => None,
        }
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            ("require <ref>", "Require a module and print its exports"),
            ("resolve <ref> [base]", "Print the canonical path of a reference"),
            (".modules", "List defined modules and their status"),
            (".load <file>", "Define every module in a manifest"),
            (".help", "Show this help message"),
            (".version", "Show version information"),
            (".clear", "Clear the screen"),
            (".exit", "Exit the REPL"),
        ]
    }
}

/// A parsed line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput<'a> {
    /// Dot command
    Command(ReplCommand, Option<&'a str>),
    /// `require <ref>`
    Require(&'a str),
    /// `resolve <ref> [base]`
    Resolve(&'a str, &'a str),
    /// Anything else
    Unknown(&'a str),
}

impl<'a> ReplInput<'a> {
    /// Parse one trimmed, non-empty line
    pub fn parse(line: &'a str) -> Self {
        if let Some((cmd, arg)) = ReplCommand::parse(line) {
            return ReplInput::Command(cmd, arg);
        }

        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next(), words.next()) {
            (Some("require"), Some(reference), None, None) => ReplInput::Require(reference),
            (Some("resolve"), Some(reference), base, None) => {
                ReplInput::Resolve(reference, base.unwrap_or(""))
            }
            _ => ReplInput::Unknown(line),
        }
    }
}

/// Helper struct for rustyline that provides completion and hints
struct ReqloadHelper {
    /// Module paths are offered as completions
    registry: Registry,
}

impl ReqloadHelper {
    fn new(registry: Registry) -> Self {
        Self { registry }
    }

    fn candidates(&self) -> Vec<String> {
        let mut words: Vec<String> = VERBS.iter().map(|v| v.to_string()).collect();
        words.extend(
            ReplCommand::all_commands()
                .iter()
                .filter(|(cmd, _)| cmd.starts_with('.'))
                .map(|&(cmd, _)| cmd.split_whitespace().next().unwrap_or(cmd).to_string()),
        );
        words.extend(self.registry.paths());
        words
    }

    /// Dimmed remainder of the first candidate extending the last word
    fn hint_for(&self, line: &str) -> Option<String> {
        let word = &line[word_start(line)..];
        if word.len() < 2 {
            return None;
        }

        self.candidates()
            .into_iter()
            .find(|candidate| candidate.starts_with(word) && candidate.len() > word.len())
            .map(|candidate| (&candidate[word.len()..]).dimmed().to_string())
    }
}

/// Start of the word under the cursor
fn word_start(line: &str) -> usize {
    line.rfind(char::is_whitespace).map(|i| i + 1).unwrap_or(0)
}

impl Completer for ReqloadHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = word_start(&line[..pos]);
        let word = &line[start..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches: Vec<Pair> = self
            .candidates()
            .into_iter()
            .filter(|candidate| candidate.starts_with(word))
            .map(|candidate| Pair {
                replacement: candidate[word.len()..].to_string(),
                display: candidate,
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for ReqloadHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        self.hint_for(line)
    }
}

impl Highlighter for ReqloadHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let verb_end = line.find(char::is_whitespace).unwrap_or(line.len());
        let (verb, rest) = line.split_at(verb_end);

        if VERBS.contains(&verb) {
            Cow::Owned(format!("{}{}", verb.magenta().bold(), rest.green()))
        } else if verb.starts_with('.') {
            Cow::Owned(format!("{}{}", verb.magenta(), rest))
        } else {
            Cow::Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Validator for ReqloadHelper {}

impl Helper for ReqloadHelper {}

/// The interactive REPL
pub struct Repl {
    registry: Registry,
    editor: Editor<ReqloadHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance over a registry
    pub fn new(registry: Registry) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ReqloadHelper::new(registry.clone())));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reqload")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        // Missing history on first run is expected
        let _ = editor.load_history(&history_path);

        Ok(Self {
            registry,
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "reqload>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match ReplInput::parse(trimmed) {
                        ReplInput::Command(cmd, arg) => {
                            if let CommandResult::Exit = self.execute_command(cmd, arg) {
                                break;
                            }
                        }
                        ReplInput::Require(reference) => self.require_and_print(reference),
                        ReplInput::Resolve(reference, base) => {
                            println!("{}", self.registry.resolve(reference, base).cyan());
                        }
                        ReplInput::Unknown(input) => {
                            eprintln!(
                                "{}: unknown input '{}', try {}",
                                "Error".red().bold(),
                                input,
                                ".help".cyan()
                            );
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        if let Err(e) = self.editor.save_history(&self.history_path) {
            tracing::warn!("Could not save history to {}: {}", self.history_path.display(), e);
        }

        println!();
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} {} {}",
            "reqload".white().bold(),
            "v".dimmed(),
            reqload_core::VERSION.bright_yellow()
        );
        println!(
            "  {} {} {}",
            self.registry.len().to_string().cyan(),
            "modules defined, failure policy".dimmed(),
            self.registry.config().failure_policy.to_string().cyan()
        );
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => {
                println!("{}: {}", "reqload".bright_cyan().bold(), reqload_core::VERSION.yellow());
            }
            ReplCommand::Load => match arg {
                Some(path) => self.load_manifest(Path::new(path)),
                None => eprintln!(
                    "{}: {} {}",
                    "Error".red().bold(),
                    ".load".cyan(),
                    "requires a file path".dimmed()
                ),
            },
            ReplCommand::Modules => self.print_modules(),
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Commands:".white().bold());
        println!();
        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:22} {}", cmd.cyan(), desc.dimmed());
        }
        println!();
    }

    fn print_modules(&self) {
        if self.registry.is_empty() {
            println!("{}", "no modules defined".dimmed());
            return;
        }
        for path in self.registry.paths() {
            if let Some(status) = self.registry.status(&path) {
                println!("  {:30} {}", path, format_status(status));
            }
        }
    }

    fn load_manifest(&mut self, path: &Path) {
        match Manifest::from_file(path) {
            Ok(manifest) => {
                let defined = manifest.install(&self.registry);
                println!(
                    "{} {} {}",
                    "defined".dimmed(),
                    defined.to_string().cyan(),
                    "modules".dimmed()
                );
            }
            Err(e) => eprintln!("{}: {:#}", "Error".red().bold(), e),
        }
    }

    fn require_and_print(&mut self, reference: &str) {
        match self.registry.require(reference) {
            Ok(exports) => println!("{}", format_exports(&exports)),
            Err(e) => eprintln!("{}: {}", "Error".red().bold(), e),
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}
