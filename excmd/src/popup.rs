//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Position, size and selection of the completion popup menu. Drawing is
//! left to the user interface; this only decides where the menu goes and
//! which items are visible.

use crate::options::Opt;
use crate::state::EditorState;

/// Height used when 'pumheight' is zero.
const PUM_DEF_HEIGHT: i64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumItem {
    pub text: String,
    pub kind: String,
    pub extra: String,
    pub info: String,
}

impl PumItem {
    pub fn new(text: &str) -> PumItem {
        PumItem {
            text: text.to_string(),
            ..Default::default()
        }
    }
}

/// Where the completed text is on the screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Anchor {
    pub win: usize,
    /// Screen position of the cursor.
    pub row: i64,
    pub col: i64,
    /// First screen row of the cursor line and its height, for wrapped
    /// lines.
    pub line_row: i64,
    pub line_height: i64,
    pub rightleft: bool,
}

/// The screen and the options the geometry depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub columns: i64,
    /// Row of the command line: the menu stays above it.
    pub cmdline_row: i64,
    pub pumheight: i64,
    pub pumwidth: i64,
}

impl Screen {
    pub fn from_options(st: &EditorState) -> Screen {
        Screen {
            columns: st.p_num(Opt::Columns),
            cmdline_row: st.p_num(Opt::Lines) - st.p_num(Opt::Cmdheight),
            pumheight: st.p_num(Opt::Pumheight),
            pumwidth: st.p_num(Opt::Pumwidth),
        }
    }
}

/// Corner of the info popup that is placed at the given position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BotLeft,
    BotRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoPlacement {
    pub row: i64,
    pub col: i64,
    pub corner: Corner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupState {
    pub items: Vec<PumItem>,
    /// First visible item.
    pub first: usize,
    pub selected: Option<usize>,
    pub row: i64,
    pub col: i64,
    pub width: i64,
    pub height: i64,
    pub scrollbar: bool,
    pub base_width: i64,
    pub kind_width: i64,
    pub extra_width: i64,
    pub anchor: Anchor,
    pub info: Option<InfoPlacement>,
}

fn text_width(s: &str) -> i64 {
    s.chars().count() as i64
}

impl PopupState {
    /// Compute where the menu for `items` goes. `None` when there is no
    /// room for it.
    pub fn new(items: Vec<PumItem>, anchor: Anchor, screen: &Screen) -> Option<PopupState> {
        let size = items.len() as i64;
        if size == 0 {
            return None;
        }
        let above_row = 0;
        let below_row = screen.cmdline_row;

        let mut want = size.min(PUM_DEF_HEIGHT);
        if screen.pumheight > 0 {
            want = want.min(screen.pumheight);
        }

        let row;
        let mut height;
        let room_below_small = anchor.row + 2 >= below_row - want;
        if room_below_small && anchor.row - above_row > (below_row - above_row) / 2 {
            // above the cursor, with up to two lines of context
            let context = (anchor.row - anchor.line_row).clamp(0, 2);
            let (mut r, h) = if anchor.row >= size + context {
                (anchor.row - size - context, size)
            } else {
                (0, anchor.row - context)
            };
            height = h;
            if screen.pumheight > 0 && height > screen.pumheight {
                r += height - screen.pumheight;
                height = screen.pumheight;
            }
            row = r;
        } else {
            // below the cursor line
            let context = (anchor.line_row + anchor.line_height.max(1) - anchor.row).clamp(1, 3);
            row = anchor.row + context;
            height = size.min(below_row - row);
            if screen.pumheight > 0 {
                height = height.min(screen.pumheight);
            }
        }
        if height < 1 || (height == 1 && size > 1) {
            log::trace!("no room for a popup menu of {size} items");
            return None;
        }

        let base_width = items.iter().map(|i| text_width(&i.text)).max().unwrap_or(0);
        let col_width = |f: fn(&PumItem) -> &str| {
            let w = items.iter().map(|i| text_width(f(i))).max().unwrap_or(0);
            if w > 0 {
                w + 1
            } else {
                0
            }
        };
        let kind_width = col_width(|i| i.kind.as_str());
        let extra_width = col_width(|i| i.extra.as_str());
        let scrollbar = height < size;

        let mut pum = PopupState {
            items,
            first: 0,
            selected: None,
            row,
            col: 0,
            width: 0,
            height,
            scrollbar,
            base_width,
            kind_width,
            extra_width,
            anchor,
            info: None,
        };
        pum.place_columns(screen);
        Some(pum)
    }

    /// Choose the column and width. Right-to-left windows are handled by
    /// computing in mirrored coordinates.
    fn place_columns(&mut self, screen: &Screen) {
        let columns = screen.columns;
        let pw = screen.pumwidth.max(1);
        let sb = i64::from(self.scrollbar);
        let cursor_col = if self.anchor.rightleft {
            columns - 1 - self.anchor.col
        } else {
            self.anchor.col
        };
        let max_width = self.base_width;
        let needed = max_width + self.kind_width + self.extra_width + 1;
        let def_width = pw.max(max_width);

        let (col, width) = if cursor_col < columns - pw || cursor_col < columns - max_width {
            // aligned with the cursor, narrowed to what the items need
            let mut width = columns - cursor_col - sb;
            if width > needed && width > pw {
                width = needed.max(pw);
            }
            (cursor_col, width)
        } else if columns < def_width {
            (0, columns - 1)
        } else {
            // shifted left so the menu fits
            let w = max_width.min(pw);
            (columns - w, w - sb)
        };

        self.width = width.max(1);
        self.col = if self.anchor.rightleft {
            (columns - col - self.width).max(0)
        } else {
            col.max(0)
        };
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Visible items with their screen rows.
    pub fn visible(&self) -> impl Iterator<Item = (i64, &PumItem)> {
        self.items
            .iter()
            .skip(self.first)
            .take(self.height.max(0) as usize)
            .enumerate()
            .map(move |(i, item)| (self.row + i as i64, item))
    }

    /// Select item `n`, or nothing, and scroll so it is visible with some
    /// context.
    pub fn select(&mut self, n: Option<usize>) {
        self.selected = n.filter(|&n| n < self.size());
        let Some(sel) = self.selected else {
            return;
        };
        let sel = sel as i64;
        let height = self.height;
        let context = if height > 2 { (height / 2).min(3) } else { 0 };
        let mut first = self.first as i64;
        if sel < first + context {
            first = sel - context;
        } else if sel > first + height - 1 - context {
            first = sel + context + 1 - height;
        }
        let max_first = (self.size() as i64 - height).max(0);
        self.first = first.clamp(0, max_first) as usize;
    }

    /// Move the selection by `delta`; moving past either end deselects,
    /// and moving again wraps around.
    pub fn select_relative(&mut self, delta: i64) {
        let size = self.size() as i64;
        let next = match self.selected {
            None if delta > 0 => Some(0),
            None => Some(size - 1),
            Some(cur) => {
                let n = cur as i64 + delta;
                (0..size).contains(&n).then_some(n)
            }
        };
        self.select(next.map(|n| n as usize));
    }

    /// Select and place the info popup of `info_width` by `info_height`
    /// beside the menu.
    pub fn select_with_info(&mut self, n: Option<usize>, info_width: i64, info_height: i64, screen: &Screen) {
        self.select(n);
        self.info = self
            .selected
            .and_then(|_| self.info_position(info_width, info_height, screen));
    }

    /// Where an info popup goes: right of the menu if it fits, else left;
    /// level with the selected item if it fits below, else ending there.
    pub fn info_position(&self, width: i64, height: i64, screen: &Screen) -> Option<InfoPlacement> {
        let sel = self.selected? as i64;
        let sel_row = self.row + sel - self.first as i64;
        let right = self.col + self.width + i64::from(self.scrollbar);
        let fits_right = right + width <= screen.columns;
        let fits_left = self.col >= width;
        let fits_below = sel_row + height <= screen.cmdline_row;

        let (col, left_corner) = if fits_right {
            (right, true)
        } else if fits_left {
            (self.col - 1, false)
        } else {
            return None;
        };
        let (row, corner) = match (fits_below, left_corner) {
            (true, true) => (sel_row, Corner::TopLeft),
            (true, false) => (sel_row, Corner::TopRight),
            (false, true) => (sel_row + 1, Corner::BotLeft),
            (false, false) => (sel_row + 1, Corner::BotRight),
        };
        Some(InfoPlacement { row, col, corner })
    }
}

impl EditorState {
    /// Show the popup menu for `items` at `anchor`, sized by the current
    /// options. Returns whether there was room.
    pub fn pum_display(&mut self, items: Vec<PumItem>, anchor: Anchor) -> bool {
        let screen = Screen::from_options(self);
        self.popup = PopupState::new(items, anchor, &screen);
        self.popup.is_some()
    }

    pub fn pum_undisplay(&mut self) {
        self.popup = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn screen() -> Screen {
        Screen {
            columns: 80,
            cmdline_row: 23,
            pumheight: 0,
            pumwidth: 15,
        }
    }

    fn items(n: usize) -> Vec<PumItem> {
        (0..n).map(|i| PumItem::new(&format!("item{i}"))).collect()
    }

    fn at(row: i64, col: i64) -> Anchor {
        Anchor {
            row,
            col,
            line_row: row,
            line_height: 1,
            ..Default::default()
        }
    }

    #[test]
    fn below_the_cursor() {
        let pum = PopupState::new(items(5), at(3, 10), &screen()).unwrap();
        assert_eq!((pum.row, pum.height, pum.col), (4, 5, 10));
        assert!(!pum.scrollbar);
        assert_eq!(pum.width, 15);
    }

    #[test]
    fn above_when_no_room_below() {
        let pum = PopupState::new(items(5), at(20, 10), &screen()).unwrap();
        assert_eq!((pum.row, pum.height), (15, 5));
    }

    #[test]
    fn height_is_limited() {
        // the default height only decides above or below
        let pum = PopupState::new(items(30), at(1, 0), &screen()).unwrap();
        assert_eq!(pum.height, 21);
        assert!(pum.scrollbar);

        let mut s = screen();
        s.pumheight = 4;
        let pum = PopupState::new(items(30), at(1, 0), &s).unwrap();
        assert_eq!(pum.height, 4);
    }

    #[test]
    fn no_room_at_all() {
        let mut s = screen();
        s.cmdline_row = 2;
        assert!(PopupState::new(items(3), at(0, 0), &s).is_none());
        assert!(PopupState::new(Vec::new(), at(0, 0), &screen()).is_none());
    }

    #[test]
    fn shifted_left_at_the_edge() {
        let pum = PopupState::new(items(3), at(2, 75), &screen()).unwrap();
        assert!(pum.col + pum.width <= 80);
        assert!(pum.col <= 75);
    }

    #[test]
    fn right_to_left_mirrors() {
        let mut anchor = at(2, 70);
        anchor.rightleft = true;
        let pum = PopupState::new(items(3), anchor, &screen()).unwrap();
        assert_eq!(pum.col + pum.width - 1, 70);
    }

    #[test]
    fn selection_scrolls_with_context() {
        let mut s = screen();
        s.pumheight = 10;
        let mut pum = PopupState::new(items(30), at(1, 0), &s).unwrap();
        pum.select(Some(9));
        assert_eq!(pum.first, 3);
        pum.select(Some(29));
        assert_eq!(pum.first, 20);
        pum.select(Some(0));
        assert_eq!(pum.first, 0);
        pum.select(None);
        assert_eq!(pum.selected, None);
    }

    #[test]
    fn relative_selection_wraps_through_none() {
        let mut pum = PopupState::new(items(3), at(1, 0), &screen()).unwrap();
        pum.select_relative(1);
        assert_eq!(pum.selected, Some(0));
        pum.select_relative(-1);
        assert_eq!(pum.selected, None);
        pum.select_relative(-1);
        assert_eq!(pum.selected, Some(2));
    }

    #[test]
    fn info_beside_menu() {
        let s = screen();
        let mut pum = PopupState::new(items(5), at(3, 10), &s).unwrap();
        pum.select_with_info(Some(1), 20, 3, &s);
        assert_eq!(
            pum.info,
            Some(InfoPlacement {
                row: 5,
                col: 25,
                corner: Corner::TopLeft
            })
        );

        let mut pum = PopupState::new(items(5), at(3, 60), &s).unwrap();
        pum.select_with_info(Some(0), 30, 30, &s);
        assert_eq!(pum.info.map(|i| i.corner), Some(Corner::BotRight));
    }
}
