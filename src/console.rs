//! Line-based front end.
//!
//! [`ConsoleRenderer`] projects the store onto a text listing (radio rows for
//! buckets, checkbox rows for files). [`Console`] reads commands, asks for
//! confirmation before destructive or long-running actions and forwards
//! everything into the session.

use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::config::UiConfig;
use crate::error::AppResult;
use crate::session::{BucketSession, FilesOutcome};
use crate::store::{ListRenderer, SelectionStore, StoreChange};
use crate::transport::Transport;

pub const HELP: &str = "\
Commands:
  ls | refresh          reload buckets and files
  select <bucket>       choose a bucket and load its files
  deselect              clear the bucket selection
  check <file>...       select files
  uncheck <file>...     deselect files
  all | none            select all files / clear file selection
  mkbucket <name>       create a bucket
  rmbucket              delete the selected bucket
  rm                    delete the selected files
  upload <path>...      upload local files into the selected bucket
  download [dir]        download the selected files
  process <alg>...      run algorithms on the selected files
  help                  show this text
  quit                  exit";

/// Writes the bucket and file lists for the current store state.
pub fn render_lists<W: Write>(store: &SelectionStore, loading: bool, out: &mut W) -> io::Result<()> {
    writeln!(out, "Buckets:")?;
    if store.buckets().is_empty() {
        writeln!(out, "  (none)")?;
    }
    for bucket in store.buckets() {
        let mark = if store.selected_bucket() == Some(bucket) { '*' } else { ' ' };
        writeln!(out, "  ({}) {}", mark, bucket)?;
    }

    match store.selected_bucket() {
        None => writeln!(out, "Files: (no bucket selected)")?,
        Some(_) if loading => writeln!(out, "Files: (loading...)")?,
        Some(bucket) => {
            writeln!(
                out,
                "Files in '{}' ({} of {} selected):",
                bucket,
                store.selected_files().len(),
                store.files().len()
            )?;
            if store.files().is_empty() {
                writeln!(out, "  (none)")?;
            }
            for file in store.files() {
                let mark = if store.selected_files().contains(file) { 'x' } else { ' ' };
                writeln!(out, "  [{}] {}", mark, file)?;
            }
        }
    }
    Ok(())
}

/// Redraws both lists on every store change.
pub struct ConsoleRenderer<W> {
    out: W,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ListRenderer for ConsoleRenderer<W> {
    fn render(&mut self, change: &StoreChange, store: &SelectionStore) {
        let loading = matches!(change, StoreChange::BucketSelected { .. });
        let result = render_lists(store, loading, &mut self.out).and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!(error = %e, "failed to redraw lists");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Select(String),
    Deselect,
    Check(Vec<String>),
    Uncheck(Vec<String>),
    CheckAll,
    CheckNone,
    MakeBucket(String),
    RemoveBucket,
    RemoveFiles,
    Upload(Vec<PathBuf>),
    Download(Option<PathBuf>),
    Process(Vec<String>),
    Help,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines yield `Ok(None)`; errors carry a
    /// usage hint for the user.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let args: Vec<String> = words.map(str::to_string).collect();

        let single = |usage: &str| -> Result<String, String> {
            match args.as_slice() {
                [one] => Ok(one.clone()),
                _ => Err(format!("usage: {}", usage)),
            }
        };
        let at_least_one = |usage: &str| -> Result<Vec<String>, String> {
            if args.is_empty() {
                Err(format!("usage: {}", usage))
            } else {
                Ok(args.clone())
            }
        };
        let none = |cmd: Command| -> Result<Command, String> {
            if args.is_empty() {
                Ok(cmd)
            } else {
                Err(format!("'{}' takes no arguments", head))
            }
        };

        let cmd = match head {
            "ls" | "refresh" => none(Command::Refresh)?,
            "select" => Command::Select(single("select <bucket>")?),
            "deselect" => none(Command::Deselect)?,
            "check" => Command::Check(at_least_one("check <file>...")?),
            "uncheck" => Command::Uncheck(at_least_one("uncheck <file>...")?),
            "all" => none(Command::CheckAll)?,
            "none" => none(Command::CheckNone)?,
            "mkbucket" => Command::MakeBucket(single("mkbucket <name>")?),
            "rmbucket" => none(Command::RemoveBucket)?,
            "rm" => none(Command::RemoveFiles)?,
            "upload" => Command::Upload(
                at_least_one("upload <path>...")?
                    .into_iter()
                    .map(PathBuf::from)
                    .collect(),
            ),
            "download" => match args.as_slice() {
                [] => Command::Download(None),
                [dir] => Command::Download(Some(PathBuf::from(dir))),
                _ => return Err("usage: download [dir]".to_string()),
            },
            "process" => Command::Process(at_least_one("process <algorithm>...")?),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command '{}', type 'help'", other)),
        };
        Ok(Some(cmd))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub struct Console<T> {
    session: BucketSession<T>,
    ui: UiConfig,
}

impl<T: Transport + 'static> Console<T> {
    pub fn new(session: BucketSession<T>, ui: UiConfig) -> Self {
        Self { session, ui }
    }

    pub fn session(&self) -> &BucketSession<T> {
        &self.session
    }

    /// Reads commands from `input` until `quit` or end of input.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = LinesStream::new(input.lines());
        if let Err(e) = self.session.refresh_buckets().await {
            writeln!(out, "Error fetching buckets: {}", e)?;
        }
        writeln!(out, "Type 'help' for commands.")?;

        while let Some(line) = lines.next().await {
            let cmd = match Command::parse(&line?) {
                Ok(Some(cmd)) => cmd,
                Ok(None) => continue,
                Err(hint) => {
                    writeln!(out, "{}", hint)?;
                    continue;
                }
            };
            if cmd == Command::Quit {
                break;
            }

            if let Some(prompt) = self.confirmation_prompt(&cmd) {
                write!(out, "{} [y/N] ", prompt)?;
                out.flush()?;
                let answer = lines.next().await.transpose()?.unwrap_or_default();
                if !is_yes(&answer) {
                    writeln!(out, "Cancelled.")?;
                    continue;
                }
            }

            match self.execute(cmd).await {
                Ok(Some(message)) => writeln!(out, "{}", message)?,
                Ok(None) => {}
                Err(e) => writeln!(out, "Error: {}", e)?,
            }
            out.flush()?;
        }
        Ok(())
    }

    /// Prompt for destructive commands whose preconditions hold. Commands that
    /// would fail validation anyway go straight to `execute`.
    fn confirmation_prompt(&self, cmd: &Command) -> Option<String> {
        if !self.ui.confirm_destructive {
            return None;
        }
        let store = self.session.store();
        match cmd {
            Command::RemoveBucket => store
                .selected_bucket()
                .map(|b| format!("Are you sure you want to delete the bucket '{}'?", b)),
            Command::RemoveFiles if store.selected_bucket().is_some() => {
                match store.selected_files().len() {
                    0 => None,
                    n => Some(format!("Are you sure you want to delete the {} selected file(s)?", n)),
                }
            }
            Command::Process(algorithms) if store.selected_bucket().is_some() => {
                match store.selected_files().len() {
                    0 => None,
                    n => Some(format!(
                        "Process the {} selected file(s) with {}?",
                        n,
                        algorithms.join(", ")
                    )),
                }
            }
            _ => None,
        }
    }

    pub async fn execute(&mut self, cmd: Command) -> AppResult<Option<String>> {
        match cmd {
            Command::Refresh => {
                self.session.refresh_buckets().await?;
                if self.session.store().selected_bucket().is_some() {
                    self.session.refresh_files().await?;
                }
                Ok(None)
            }
            Command::Select(name) => match self.session.select_bucket(&name).await? {
                FilesOutcome::Applied => Ok(None),
                FilesOutcome::Stale => Ok(Some("Selection changed, file list discarded.".to_string())),
            },
            Command::Deselect => {
                self.session.store_mut().deselect_bucket();
                Ok(None)
            }
            Command::Check(names) => self.toggle_files(&names, true),
            Command::Uncheck(names) => self.toggle_files(&names, false),
            Command::CheckAll => {
                self.session.store_mut().select_all_files();
                Ok(None)
            }
            Command::CheckNone => {
                self.session.store_mut().clear_selected_files();
                Ok(None)
            }
            Command::MakeBucket(name) => {
                let bucket = self.session.create_bucket(&name).await?;
                Ok(Some(format!("Bucket '{}' created.", bucket)))
            }
            Command::RemoveBucket => {
                let bucket = self.session.delete_selected_bucket().await?;
                Ok(Some(format!("Bucket '{}' deleted successfully.", bucket)))
            }
            Command::RemoveFiles => {
                let count = self.session.delete_selected_files().await?;
                Ok(Some(format!("{} file(s) deleted successfully.", count)))
            }
            Command::Upload(paths) => {
                self.session.upload_paths(&paths).await?;
                Ok(Some(format!("{} file(s) uploaded.", paths.len())))
            }
            Command::Download(dir) => {
                let dir = dir.unwrap_or_else(|| self.ui.download_dir.clone());
                let written = self.session.download_selected(&dir).await?;
                Ok(Some(format!("{} file(s) saved to {}.", written.len(), dir.display())))
            }
            Command::Process(algorithms) => {
                let count = self.session.process_selected(&algorithms).await?;
                Ok(Some(format!(
                    "{} file(s) submitted for processing with {}.",
                    count,
                    algorithms.join(", ")
                )))
            }
            Command::Help => Ok(Some(HELP.to_string())),
            Command::Quit => Ok(None),
        }
    }

    fn toggle_files(&mut self, names: &[String], selected: bool) -> AppResult<Option<String>> {
        self.session
            .store_mut()
            .set_files_selected(names.iter().map(String::as_str), selected)?;
        Ok(None)
    }
}
