//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! In-memory buffers: numbered line storage with marks and snapshot undo.

use std::collections::HashMap;

/// Mark adjustment amount that deletes the marks in the range.
pub const MAXLNUM: i64 = i64::MAX;

/// A cursor or mark position. Lines count from 1, columns from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Pos {
    pub lnum: i64,
    pub col: usize,
}

impl Pos {
    pub fn new(lnum: i64, col: usize) -> Pos {
        Pos { lnum, col }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    /// Set by the first pass of `:global`; follows the line when lines
    /// above it are inserted or deleted.
    pub marked: bool,
}

impl Line {
    fn new(text: String) -> Line {
        Line {
            text,
            marked: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    lines: Vec<String>,
    empty: bool,
    cursor: i64,
}

#[derive(Debug)]
pub struct Buffer {
    pub fnum: usize,
    pub name: Option<String>,
    lines: Vec<Line>,
    /// The buffer holds no text; the single line is a placeholder.
    empty: bool,
    marks: HashMap<char, Pos>,
    undo: Vec<Snapshot>,
    redo: Vec<Snapshot>,
    synced: bool,
    pub listed: bool,
    pub loaded: bool,
    pub changedtick: u64,
    /// Cursor position remembered when the last window on it is closed.
    pub last_cursor: Pos,
}

impl Buffer {
    pub fn new(fnum: usize, name: Option<String>) -> Buffer {
        Buffer {
            fnum,
            name,
            lines: vec![Line::new(String::new())],
            empty: true,
            marks: HashMap::new(),
            undo: Vec::new(),
            redo: Vec::new(),
            synced: true,
            listed: true,
            loaded: true,
            changedtick: 0,
            last_cursor: Pos::new(1, 0),
        }
    }

    /// Replace the whole content with `text`, split at newlines. The undo
    /// history is dropped.
    pub fn load_text(&mut self, text: &str) {
        self.lines.clear();
        self.lines.extend(text.lines().map(|l| Line::new(l.to_string())));
        self.empty = self.lines.is_empty();
        if self.empty {
            self.lines.push(Line::new(String::new()));
        }
        self.undo.clear();
        self.redo.clear();
        self.synced = true;
        self.marks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn line_count(&self) -> i64 {
        self.lines.len() as i64
    }

    /// Text of line `lnum`; out-of-range lines read as empty.
    pub fn get(&self, lnum: i64) -> &str {
        if lnum < 1 {
            return "";
        }
        self.lines
            .get((lnum - 1) as usize)
            .map(|l| l.text.as_str())
            .unwrap_or("")
    }

    pub fn lines(&self, line1: i64, line2: i64) -> Vec<String> {
        (line1..=line2).map(|l| self.get(l).to_string()).collect()
    }

    /// All lines joined with newlines, for writing.
    pub fn text(&self) -> String {
        if self.empty {
            return String::new();
        }
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }

    pub fn set_line(&mut self, lnum: i64, text: String) {
        if let Some(line) = self.lines.get_mut((lnum - 1).max(0) as usize) {
            line.text = text;
            self.empty = false;
            self.changedtick += 1;
        }
    }

    /// Insert `new` below line `after`; 0 inserts above the first line.
    pub fn append(&mut self, after: i64, new: Vec<String>) {
        if new.is_empty() {
            return;
        }
        let count = new.len() as i64;
        let at = after.clamp(0, self.line_count()) as usize;
        let was_empty = self.empty;
        self.lines
            .splice(at..at, new.into_iter().map(Line::new));
        if was_empty {
            // drop the placeholder line
            let placeholder = if at == 0 { count as usize } else { 0 };
            self.lines.remove(placeholder);
            self.empty = false;
        } else {
            self.mark_adjust(after + 1, MAXLNUM - 1, count, count);
        }
        self.changedtick += 1;
    }

    /// Delete lines `line1..=line2` and return their text.
    pub fn delete(&mut self, line1: i64, line2: i64) -> Vec<String> {
        let line1 = line1.max(1);
        let line2 = line2.min(self.line_count());
        if line1 > line2 {
            return Vec::new();
        }
        let removed: Vec<String> = self
            .lines
            .drain((line1 - 1) as usize..line2 as usize)
            .map(|l| l.text)
            .collect();
        let count = removed.len() as i64;
        if self.lines.is_empty() {
            self.lines.push(Line::new(String::new()));
            self.empty = true;
        }
        self.mark_adjust(line1, line2, MAXLNUM, -count);
        self.changedtick += 1;
        removed
    }

    /// Shift marks: those in `line1..=line2` move by `amount` (deleted when
    /// `amount` is [`MAXLNUM`]), those below `line2` move by `amount_after`.
    pub fn mark_adjust(&mut self, line1: i64, line2: i64, amount: i64, amount_after: i64) {
        self.marks.retain(|_, pos| {
            if pos.lnum >= line1 && pos.lnum <= line2 {
                if amount == MAXLNUM {
                    return false;
                }
                pos.lnum += amount;
            } else if pos.lnum > line2 && amount_after != 0 {
                pos.lnum += amount_after;
            }
            true
        });
    }

    pub fn set_mark(&mut self, name: char, pos: Pos) {
        self.marks.insert(name, pos);
    }

    pub fn mark(&self, name: char) -> Option<Pos> {
        self.marks.get(&name).copied()
    }

    pub fn marks(&self) -> impl Iterator<Item = (&char, &Pos)> {
        self.marks.iter()
    }

    pub fn set_marked(&mut self, lnum: i64) {
        if let Some(line) = self.lines.get_mut((lnum - 1).max(0) as usize) {
            line.marked = true;
        }
    }

    /// Clear and return the first line marked by [`Buffer::set_marked`].
    pub fn take_first_marked(&mut self) -> Option<i64> {
        let idx = self.lines.iter().position(|l| l.marked)?;
        self.lines[idx].marked = false;
        Some(idx as i64 + 1)
    }

    pub fn clear_marked(&mut self) {
        for line in &mut self.lines {
            line.marked = false;
        }
    }

    /// Record the current text before the first change of a command.
    pub fn u_save(&mut self, cursor: i64) {
        if !self.synced {
            return;
        }
        self.undo.push(self.snapshot(cursor));
        self.redo.clear();
        self.synced = false;
    }

    /// Close the current undo block.
    pub fn u_sync(&mut self) {
        self.synced = true;
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    fn snapshot(&self, cursor: i64) -> Snapshot {
        Snapshot {
            lines: self.lines.iter().map(|l| l.text.clone()).collect(),
            empty: self.empty,
            cursor,
        }
    }

    fn restore(&mut self, snap: Snapshot) -> i64 {
        self.lines = snap.lines.into_iter().map(Line::new).collect();
        self.empty = snap.empty;
        self.changedtick += 1;
        snap.cursor
    }

    /// Undo one block. Returns the cursor line to restore, or `None` when
    /// there is nothing to undo.
    pub fn undo(&mut self, cursor: i64) -> Option<i64> {
        let snap = self.undo.pop()?;
        self.redo.push(self.snapshot(cursor));
        self.synced = true;
        Some(self.restore(snap))
    }

    pub fn redo(&mut self, cursor: i64) -> Option<i64> {
        let snap = self.redo.pop()?;
        self.undo.push(self.snapshot(cursor));
        self.synced = true;
        Some(self.restore(snap))
    }

    /// Trim the undo history to `levels` entries.
    pub fn limit_undo(&mut self, levels: i64) {
        if levels < 0 {
            self.undo.clear();
            return;
        }
        let keep = levels as usize;
        if self.undo.len() > keep {
            let excess = self.undo.len() - keep;
            self.undo.drain(..excess);
        }
    }
}

/// All buffers, in creation order.
#[derive(Debug, Default)]
pub struct BufferList {
    bufs: Vec<Buffer>,
    next_fnum: usize,
}

impl BufferList {
    pub fn new() -> BufferList {
        BufferList {
            bufs: Vec::new(),
            next_fnum: 1,
        }
    }

    pub fn add(&mut self, name: Option<String>) -> usize {
        let fnum = self.next_fnum;
        self.next_fnum += 1;
        self.bufs.push(Buffer::new(fnum, name));
        fnum
    }

    pub fn get(&self, fnum: usize) -> Option<&Buffer> {
        self.bufs.iter().find(|b| b.fnum == fnum)
    }

    pub fn get_mut(&mut self, fnum: usize) -> Option<&mut Buffer> {
        self.bufs.iter_mut().find(|b| b.fnum == fnum)
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.bufs
            .iter()
            .find(|b| b.name.as_deref() == Some(name))
            .map(|b| b.fnum)
    }

    /// Buffers whose name contains `pat`; an exact match wins.
    pub fn find_matching(&self, pat: &str) -> Vec<usize> {
        if let Some(fnum) = self.find_by_name(pat) {
            return vec![fnum];
        }
        self.bufs
            .iter()
            .filter(|b| b.name.as_deref().is_some_and(|n| n.contains(pat)))
            .map(|b| b.fnum)
            .collect()
    }

    pub fn remove(&mut self, fnum: usize) -> Option<Buffer> {
        let idx = self.bufs.iter().position(|b| b.fnum == fnum)?;
        Some(self.bufs.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buffer> {
        self.bufs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Buffer> {
        self.bufs.iter_mut()
    }

    pub fn first_fnum(&self) -> usize {
        self.bufs.first().map(|b| b.fnum).unwrap_or(0)
    }

    pub fn last_fnum(&self) -> usize {
        self.bufs.last().map(|b| b.fnum).unwrap_or(0)
    }

    /// Listed buffers in order, used by `:bnext` and friends.
    pub fn listed(&self) -> Vec<usize> {
        self.bufs.iter().filter(|b| b.listed).map(|b| b.fnum).collect()
    }

    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn buf(text: &str) -> Buffer {
        let mut b = Buffer::new(1, None);
        b.load_text(text);
        b
    }

    #[test]
    fn empty_buffer_has_one_line() {
        let mut b = Buffer::new(1, None);
        assert!(b.is_empty());
        assert_eq!(b.line_count(), 1);
        assert_eq!(b.text(), "");
        b.append(0, vec!["x".into()]);
        assert!(!b.is_empty());
        assert_eq!(b.line_count(), 1);
        assert_eq!(b.get(1), "x");
    }

    #[test]
    fn delete_everything_leaves_placeholder() {
        let mut b = buf("a\nb\n");
        assert_eq!(b.delete(1, 2), vec!["a", "b"]);
        assert!(b.is_empty());
        assert_eq!(b.line_count(), 1);
    }

    #[test]
    fn marks_follow_edits() {
        let mut b = buf("a\nb\nc\nd\n");
        b.set_mark('x', Pos::new(3, 0));
        b.set_mark('y', Pos::new(2, 0));
        b.append(1, vec!["new".into()]);
        assert_eq!(b.mark('x'), Some(Pos::new(4, 0)));
        b.delete(3, 3);
        assert_eq!(b.mark('y'), None);
        assert_eq!(b.mark('x'), Some(Pos::new(3, 0)));
    }

    #[test]
    fn marked_lines_survive_deletes_above() {
        let mut b = buf("a\nfoo\nb\nfoo\n");
        b.set_marked(2);
        b.set_marked(4);
        assert_eq!(b.take_first_marked(), Some(2));
        b.delete(2, 2);
        assert_eq!(b.take_first_marked(), Some(3));
        assert_eq!(b.take_first_marked(), None);
    }

    #[test]
    fn undo_redo_blocks() {
        let mut b = buf("a\nb\n");
        b.u_save(1);
        b.delete(1, 1);
        b.append(1, vec!["c".into()]);
        b.u_sync();
        assert_eq!(b.text(), "b\nc\n");
        assert_eq!(b.undo(2), Some(1));
        assert_eq!(b.text(), "a\nb\n");
        assert_eq!(b.redo(1), Some(2));
        assert_eq!(b.text(), "b\nc\n");
        assert_eq!(b.redo(1), None);
    }
}
