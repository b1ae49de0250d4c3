//! Tab completion for the command line
//!
//! Command names complete against the script runtime's identifiers. A command
//! registered with `complete`/`listcomplete` completes its first argument
//! from a directory listing or a fixed word list instead.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::script::{escape_id, escape_string, explode_list, validate_block, ScriptRuntime};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilesKind {
    Directory,
    List,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct FilesKey {
    kind: FilesKind,
    dir: String,
    ext: Option<String>,
}

/// A candidate source shared by every command registered with the same
/// (kind, dir, ext)
#[derive(Debug)]
pub struct FilesVal {
    pub kind: FilesKind,
    /// Directory path, or the raw list text for `List`
    pub dir: String,
    pub ext: Option<String>,
    pub files: Vec<String>,
    /// Session stamp of the last directory scan
    refreshed_at: Option<u64>,
}

impl FilesVal {
    fn new(kind: FilesKind, dir: &str, ext: Option<&str>) -> Self {
        let files = match kind {
            FilesKind::List => explode_list(dir),
            FilesKind::Directory => Vec::new(),
        };
        Self {
            kind,
            dir: dir.to_string(),
            ext: ext.map(str::to_string),
            files,
            refreshed_at: None,
        }
    }

    /// Rescan a directory source once per command line session
    fn update(&mut self, session: u64) {
        if self.kind != FilesKind::Directory || self.refreshed_at.is_some_and(|t| t >= session) {
            return;
        }
        self.files = match list_files(Path::new(&self.dir), self.ext.as_deref()) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("{:#}", e);
                Vec::new()
            }
        };
        self.files.sort();
        self.files.dedup();
        self.refreshed_at = Some(session);
    }
}

/// Entries of `dir`; with `ext`, only names ending in `.ext`, with the
/// extension removed
fn list_files(dir: &Path, ext: Option<&str>) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list completion directory {:?}", dir))?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.context("Failed to read directory entry")?;
        let name = entry.file_name().to_string_lossy().into_owned();
        match ext {
            Some(ext) => {
                if let Some(stem) = name.strip_suffix(ext).and_then(|s| s.strip_suffix('.')) {
                    out.push(stem.to_string());
                }
            }
            None => out.push(name),
        }
    }
    Ok(out)
}

#[derive(Default)]
pub struct TextCompletionIndex {
    sources: Vec<FilesVal>,
    interned: HashMap<FilesKey, usize>,
    /// Command name to source index
    completions: BTreeMap<String, usize>,
    /// Prefix length fixed by the first Tab of a cycle (0 = no cycle)
    complete_size: usize,
    last_complete: Option<String>,
}

impl TextCompletionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the current Tab cycle. Called on every edit.
    pub fn reset(&mut self) {
        self.complete_size = 0;
    }

    /// Complete `command`'s argument from files in `dir` with extension
    /// `ext`. An empty `dir` unregisters the command; an `ext` containing
    /// `*` means any file.
    pub fn add_complete(&mut self, command: &str, dir: &str, ext: &str) {
        let dir = dir.trim_end_matches(['/', '\\']);
        let ext = (!ext.is_empty() && !ext.contains('*')).then_some(ext);
        self.add(command, FilesKind::Directory, dir, ext);
    }

    /// Complete `command`'s argument from a whitespace separated list
    pub fn add_list_complete(&mut self, command: &str, list: &str) {
        self.add(command, FilesKind::List, list, None);
    }

    fn add(&mut self, command: &str, kind: FilesKind, dir: &str, ext: Option<&str>) {
        if dir.is_empty() {
            if self.completions.remove(command).is_some() {
                tracing::debug!("Removed completion for {}", command);
            }
            return;
        }
        let key = FilesKey {
            kind,
            dir: dir.to_string(),
            ext: ext.map(str::to_string),
        };
        let idx = match self.interned.get(&key) {
            Some(&idx) => idx,
            None => {
                self.sources.push(FilesVal::new(kind, dir, ext));
                let idx = self.sources.len() - 1;
                self.interned.insert(key, idx);
                idx
            }
        };
        tracing::debug!("Registered {:?} completion for {}", kind, command);
        self.completions.insert(command.to_string(), idx);
    }

    /// The candidate source registered for `command`
    pub fn source(&self, command: &str) -> Option<&FilesVal> {
        self.completions.get(command).map(|&idx| &self.sources[idx])
    }

    pub fn clear(&mut self) {
        self.sources.clear();
        self.interned.clear();
        self.completions.clear();
        self.reset();
        self.last_complete = None;
    }

    /// Replace the word being typed in `line` with the next candidate.
    ///
    /// The first call of a cycle fixes the prefix. Each further call moves to
    /// the smallest candidate greater than the last one. After the last
    /// candidate one call finds nothing and leaves the line alone; the call
    /// after that starts over from the first candidate.
    pub fn complete(
        &mut self,
        line: &mut String,
        max_len: usize,
        cmd_prefix: Option<&str>,
        session: u64,
        rt: &dyn ScriptRuntime,
    ) {
        let mut cmdlen = 0;
        if let Some(prefix) = cmd_prefix {
            cmdlen = prefix.len();
            if !line.starts_with(prefix) {
                line.insert_str(0, prefix);
                truncate_to(line, max_len);
            }
        }
        if line.len() <= cmdlen {
            return;
        }
        if self.complete_size == 0 {
            self.complete_size = line.len() - cmdlen;
            self.last_complete = None;
        }

        let rest = &line[cmdlen..];
        let source = rest
            .find(' ')
            .and_then(|sp| self.completions.get(&rest[..sp]).map(|&idx| (idx, cmdlen + sp + 1)));

        let (head_len, next) = match source {
            Some((idx, command_size)) => {
                let files = &mut self.sources[idx];
                files.update(session);
                let match_len = (self.complete_size + cmdlen).saturating_sub(command_size);
                let end = (command_size + match_len).min(line.len());
                let want = line.get(command_size..end).unwrap_or("");
                let next = next_candidate(files.files.iter().map(String::as_str), want, self.last_complete.as_deref());
                (command_size, next)
            }
            None => {
                let end = (cmdlen + self.complete_size).min(line.len());
                let want = line.get(cmdlen..end).unwrap_or("");
                let names = rt.ident_names();
                let next = next_candidate(names.iter().map(String::as_str), want, self.last_complete.as_deref());
                (cmdlen, next)
            }
        };

        self.last_complete = None;
        if let Some(next) = next {
            line.truncate(head_len);
            line.push_str(&next);
            truncate_to(line, max_len);
            self.last_complete = Some(next);
        }
    }

    /// Persisted `complete` / `listcomplete` lines, sorted by command
    pub fn write_completions(&self) -> String {
        let mut out = String::new();
        for (command, &idx) in &self.completions {
            let files = &self.sources[idx];
            match files.kind {
                FilesKind::List => {
                    let list = if validate_block(&files.dir) {
                        format!("[{}]", files.dir)
                    } else {
                        escape_string(&files.dir)
                    };
                    out.push_str(&format!("listcomplete {} {}\n", escape_id(command), list));
                }
                FilesKind::Directory => {
                    out.push_str(&format!(
                        "complete {} {} {}\n",
                        escape_id(command),
                        escape_string(&files.dir),
                        escape_string(files.ext.as_deref().unwrap_or("*"))
                    ));
                }
            }
        }
        out
    }
}

/// Smallest candidate starting with `want` that sorts after `last`
fn next_candidate<'a>(
    candidates: impl Iterator<Item = &'a str>,
    want: &str,
    last: Option<&str>,
) -> Option<String> {
    candidates
        .filter(|c| c.starts_with(want))
        .filter(|c| last.map_or(true, |l| *c > l))
        .min()
        .map(str::to_string)
}

fn truncate_to(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
