//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Tab pages, windows, the argument list and the quickfix list.
//!
//! There is no screen; windows only carry the buffer they show and a
//! cursor, which is all the address resolver and handlers look at.

use crate::buffer::Pos;

#[derive(Debug, Clone)]
pub struct Window {
    pub id: usize,
    pub buf: usize,
    pub cursor: Pos,
    /// Alternate buffer for `#` and `:e #`.
    pub alt: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct TabPage {
    pub windows: Vec<Window>,
    pub cur: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QfEntry {
    pub fname: String,
    pub lnum: i64,
    pub text: String,
    pub valid: bool,
}

#[derive(Debug)]
pub struct Layout {
    pub tabs: Vec<TabPage>,
    pub cur_tab: usize,
    next_winid: usize,
    pub args: Vec<String>,
    pub arg_idx: usize,
    pub qf: Vec<QfEntry>,
    /// Index of the current quickfix entry.
    pub qf_idx: usize,
}

impl Layout {
    /// A single tab with a single window showing `buf`.
    pub fn new(buf: usize) -> Layout {
        Layout {
            tabs: vec![TabPage {
                windows: vec![Window {
                    id: 1000,
                    buf,
                    cursor: Pos::new(1, 0),
                    alt: None,
                }],
                cur: 0,
            }],
            cur_tab: 0,
            next_winid: 1001,
            args: Vec::new(),
            arg_idx: 0,
            qf: Vec::new(),
            qf_idx: 0,
        }
    }

    pub fn tab(&self) -> &TabPage {
        &self.tabs[self.cur_tab]
    }

    pub fn tab_mut(&mut self) -> &mut TabPage {
        &mut self.tabs[self.cur_tab]
    }

    pub fn win(&self) -> &Window {
        let tab = self.tab();
        &tab.windows[tab.cur]
    }

    pub fn win_mut(&mut self) -> &mut Window {
        let tab = self.tab_mut();
        let cur = tab.cur;
        &mut tab.windows[cur]
    }

    /// 1-based number of the current window in the current tab.
    pub fn win_nr(&self) -> i64 {
        self.tab().cur as i64 + 1
    }

    pub fn win_count(&self) -> i64 {
        self.tab().windows.len() as i64
    }

    pub fn tab_nr(&self) -> i64 {
        self.cur_tab as i64 + 1
    }

    pub fn tab_count(&self) -> i64 {
        self.tabs.len() as i64
    }

    fn new_window(&mut self, buf: usize, cursor: Pos) -> Window {
        let id = self.next_winid;
        self.next_winid += 1;
        Window {
            id,
            buf,
            cursor,
            alt: None,
        }
    }

    /// Split the current window. `above` puts the new window before the
    /// current one. Returns the new window id.
    pub fn split(&mut self, buf: usize, above: bool) -> usize {
        let cursor = if buf == self.win().buf {
            self.win().cursor
        } else {
            Pos::new(1, 0)
        };
        let mut win = self.new_window(buf, cursor);
        win.alt = self.win().alt;
        let id = win.id;
        let tab = self.tab_mut();
        let at = if above { tab.cur } else { tab.cur + 1 };
        tab.windows.insert(at, win);
        tab.cur = at;
        id
    }

    /// Close the window at `idx` in the current tab. Returns the buffer it
    /// showed, or `None` for the last window.
    pub fn close(&mut self, idx: usize) -> Option<Window> {
        let tab = self.tab_mut();
        if tab.windows.len() <= 1 || idx >= tab.windows.len() {
            return None;
        }
        let win = tab.windows.remove(idx);
        if tab.cur > idx || tab.cur >= tab.windows.len() {
            tab.cur = tab.cur.saturating_sub(1);
        }
        Some(win)
    }

    /// Open a new tab page after tab `after` (0 puts it first).
    pub fn new_tab(&mut self, buf: usize, after: usize) -> usize {
        let win = self.new_window(buf, Pos::new(1, 0));
        let id = win.id;
        let at = after.min(self.tabs.len());
        self.tabs.insert(
            at,
            TabPage {
                windows: vec![win],
                cur: 0,
            },
        );
        self.cur_tab = at;
        id
    }

    pub fn close_tab(&mut self, idx: usize) -> Option<TabPage> {
        if self.tabs.len() <= 1 || idx >= self.tabs.len() {
            return None;
        }
        let tab = self.tabs.remove(idx);
        if self.cur_tab > idx || self.cur_tab >= self.tabs.len() {
            self.cur_tab = self.cur_tab.saturating_sub(1);
        }
        Some(tab)
    }

    /// Every window in every tab.
    pub fn all_windows(&self) -> impl Iterator<Item = &Window> {
        self.tabs.iter().flat_map(|t| t.windows.iter())
    }

    pub fn all_windows_mut(&mut self) -> impl Iterator<Item = &mut Window> {
        self.tabs.iter_mut().flat_map(|t| t.windows.iter_mut())
    }

    pub fn buf_shown(&self, buf: usize) -> bool {
        self.all_windows().any(|w| w.buf == buf)
    }

    pub fn qf_valid_count(&self) -> i64 {
        self.qf.iter().filter(|e| e.valid).count() as i64
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn split_and_close() {
        let mut l = Layout::new(1);
        let first = l.win().id;
        l.split(2, false);
        assert_eq!(l.win_count(), 2);
        assert_eq!(l.win_nr(), 2);
        assert_eq!(l.win().buf, 2);
        let closed = l.close(1).unwrap();
        assert_eq!(closed.buf, 2);
        assert_eq!(l.win().id, first);
        assert!(l.close(0).is_none());
    }

    #[test]
    fn tabs() {
        let mut l = Layout::new(1);
        l.new_tab(1, 1);
        assert_eq!(l.tab_count(), 2);
        assert_eq!(l.tab_nr(), 2);
        assert!(l.close_tab(1).is_some());
        assert_eq!(l.tab_nr(), 1);
        assert!(l.close_tab(0).is_none());
    }
}
