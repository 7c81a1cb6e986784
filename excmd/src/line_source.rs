//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Producers of command lines: typed input, sourced scripts, function
//! bodies, and the replay decorator used to run loop bodies again.

use std::collections::VecDeque;
use std::io::BufRead;

use crate::state::EditorState;

/// What a line source executes; decides how errors and `:finish` behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Interactive,
    Script,
    Function,
    Other,
}

pub trait LineSource {
    /// Produce the next line, `None` at the end. `indent` is a hint for
    /// typed input inside a block.
    fn next_line(&mut self, st: &mut EditorState, indent: usize) -> Option<String>;

    /// Look at the next line without consuming it.
    fn peek(&self) -> Option<&str> {
        None
    }

    fn kind(&self) -> SourceKind;

    /// The script executed `:finish`.
    fn finished(&self, st: &EditorState) -> bool {
        self.kind() == SourceKind::Script && st.sourcing.last().is_some_and(|f| f.finished)
    }

    /// The function returned or aborted.
    fn ended(&self, st: &EditorState) -> bool {
        self.kind() == SourceKind::Function && crate::userfunc::func_has_ended(st)
    }

    /// Lines that could not be consumed are gone. Used by the binary to
    /// stop reading typed input.
    fn at_eof(&self) -> bool {
        false
    }
}

/// Lines from a string or a list of strings, as given to `:execute` or
/// the `-c` option.
#[derive(Debug, Default)]
pub struct StrSource {
    lines: VecDeque<String>,
}

impl StrSource {
    pub fn new(text: &str) -> StrSource {
        StrSource {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn from_lines(lines: Vec<String>) -> StrSource {
        StrSource {
            lines: lines.into(),
        }
    }
}

impl LineSource for StrSource {
    fn next_line(&mut self, _st: &mut EditorState, _indent: usize) -> Option<String> {
        self.lines.pop_front()
    }

    fn peek(&self) -> Option<&str> {
        self.lines.front().map(String::as_str)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Other
    }

    fn at_eof(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Commands typed on standard input.
pub struct StdinSource<R: BufRead> {
    reader: R,
    eof: bool,
}

impl<R: BufRead> StdinSource<R> {
    pub fn new(reader: R) -> StdinSource<R> {
        StdinSource { reader, eof: false }
    }
}

impl<R: BufRead> LineSource for StdinSource<R> {
    fn next_line(&mut self, st: &mut EditorState, _indent: usize) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                self.eof = true;
                None
            }
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                st.key_typed = true;
                Some(line)
            }
            Err(err) => {
                log::warn!("reading commands: {err}");
                self.eof = true;
                None
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Interactive
    }

    fn at_eof(&self) -> bool {
        self.eof
    }
}

/// Lines of a sourced file. Continuation lines starting with a
/// backslash are joined to the line before them.
#[derive(Debug)]
pub struct ScriptSource {
    lines: Vec<String>,
    idx: usize,
    /// Join continuation lines; off when 'cpoptions' has 'C'.
    concat: bool,
}

impl ScriptSource {
    pub fn new(text: &str, concat: bool) -> ScriptSource {
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        // a DOS line ending on the first line makes all of them DOS
        if lines.first().is_some_and(|l| l.ends_with('\r')) {
            for l in lines.iter_mut() {
                if l.ends_with('\r') {
                    l.pop();
                }
            }
        }
        ScriptSource {
            lines,
            idx: 0,
            concat,
        }
    }

    fn continues(line: &str) -> Option<&str> {
        let t = line.trim_start_matches([' ', '\t']);
        if let Some(rest) = t.strip_prefix('\\') {
            return Some(rest);
        }
        // "\ is a comment inside a continued line
        if t.starts_with("\"\\ ") {
            return Some("");
        }
        None
    }
}

impl LineSource for ScriptSource {
    fn next_line(&mut self, st: &mut EditorState, _indent: usize) -> Option<String> {
        if self.idx >= self.lines.len() || self.finished(st) {
            return None;
        }
        let mut line = self.lines[self.idx].clone();
        self.idx += 1;
        st.set_sourcing_lnum(self.idx as i64);

        if self.concat {
            while self.idx < self.lines.len() {
                let next = &self.lines[self.idx];
                let Some(rest) = Self::continues(next) else {
                    break;
                };
                if !next.trim_start().starts_with('"') {
                    line.push_str(rest);
                }
                self.idx += 1;
            }
        }
        Some(line)
    }

    fn peek(&self) -> Option<&str> {
        self.lines.get(self.idx).map(String::as_str)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Script
    }

    fn at_eof(&self) -> bool {
        self.idx >= self.lines.len()
    }
}

/// One line stored while running a loop body for the first time.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopLine {
    pub text: String,
    pub lnum: i64,
}

/// Wraps the source of the runner while a `:while` or `:for` is active.
/// The first pass reads from `inner` and stores each line; later passes
/// replay the stored lines and end past the last one. `current` is the
/// index of the line being executed.
pub struct ReplaySource<'a> {
    inner: &'a mut dyn LineSource,
    lines: &'a mut Vec<LoopLine>,
    pub current: usize,
    repeating: bool,
}

impl<'a> ReplaySource<'a> {
    pub fn new(
        inner: &'a mut dyn LineSource,
        lines: &'a mut Vec<LoopLine>,
        current: usize,
        repeating: bool,
    ) -> ReplaySource<'a> {
        ReplaySource {
            inner,
            lines,
            current,
            repeating,
        }
    }
}

impl LineSource for ReplaySource<'_> {
    fn next_line(&mut self, st: &mut EditorState, indent: usize) -> Option<String> {
        if self.current + 1 >= self.lines.len() {
            if self.repeating {
                // reading past the end of the loop
                return None;
            }
            let line = self.inner.next_line(st, indent)?;
            self.lines.push(LoopLine {
                text: line.clone(),
                lnum: st.sourcing_lnum(),
            });
            self.current += 1;
            return Some(line);
        }

        st.key_typed = false;
        self.current += 1;
        let stored = &self.lines[self.current];
        st.set_sourcing_lnum(stored.lnum);
        Some(stored.text.clone())
    }

    fn peek(&self) -> Option<&str> {
        match self.lines.get(self.current + 1) {
            Some(l) => Some(&l.text),
            None if !self.repeating => self.inner.peek(),
            None => None,
        }
    }

    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    fn finished(&self, st: &EditorState) -> bool {
        self.inner.finished(st)
    }

    fn ended(&self, st: &EditorState) -> bool {
        self.inner.ended(st)
    }

    fn at_eof(&self) -> bool {
        self.inner.at_eof()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn state() -> EditorState {
        EditorState::new(Box::new(MemHost::new()), false)
    }

    #[test]
    fn continuation_lines_join() {
        let mut st = state();
        let mut src = ScriptSource::new("let x = [\n  \\ 1,\n  \"\\ note\n  \\ 2]\necho x", true);
        assert_eq!(src.next_line(&mut st, 0).as_deref(), Some("let x = [ 1, 2]"));
        assert_eq!(src.next_line(&mut st, 0).as_deref(), Some("echo x"));
        assert!(src.next_line(&mut st, 0).is_none());
    }

    #[test]
    fn no_join_when_disabled() {
        let mut st = state();
        let mut src = ScriptSource::new("a\n\\b", false);
        assert_eq!(src.next_line(&mut st, 0).as_deref(), Some("a"));
        assert_eq!(src.next_line(&mut st, 0).as_deref(), Some("\\b"));
    }

    #[test]
    fn replay_stores_then_repeats() {
        let mut st = state();
        let mut inner = StrSource::from_lines(vec!["b".into(), "c".into()]);
        let mut lines = vec![LoopLine {
            text: "a".into(),
            lnum: 0,
        }];
        {
            let mut replay = ReplaySource::new(&mut inner, &mut lines, 0, false);
            assert_eq!(replay.next_line(&mut st, 0).as_deref(), Some("b"));
            assert_eq!(replay.next_line(&mut st, 0).as_deref(), Some("c"));
        }
        assert_eq!(lines.len(), 3);

        let mut replay = ReplaySource::new(&mut inner, &mut lines, 0, true);
        assert_eq!(replay.next_line(&mut st, 0).as_deref(), Some("b"));
        assert_eq!(replay.next_line(&mut st, 0).as_deref(), Some("c"));
        assert!(replay.next_line(&mut st, 0).is_none());
    }

    #[test]
    fn stdin_lines() {
        let mut st = state();
        let mut src = StdinSource::new(std::io::Cursor::new("echo 1\r\necho 2\n"));
        assert_eq!(src.next_line(&mut st, 0).as_deref(), Some("echo 1"));
        assert_eq!(src.next_line(&mut st, 0).as_deref(), Some("echo 2"));
        assert!(src.next_line(&mut st, 0).is_none());
        assert!(src.at_eof());
        assert_eq!(src.kind(), SourceKind::Interactive);
    }
}
