//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Ex addresses: line numbers, marks, patterns and offsets, and the
//! ranges built from them.

use crate::charset::{getdigits, skipwhite_at};
use crate::cmds::{Cmd, CmdFlags};
use crate::docmd::ExArgs;
use crate::error::{e, invalid, runtime, Error, Result};
use crate::search::{skip_regexp, Dir, PatKind};
use crate::state::EditorState;

/// What the numbers of a range count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddrType {
    #[default]
    Lines,
    /// Any buffer number, loaded or not.
    Buffers,
    LoadedBuffers,
    Windows,
    Tabs,
    /// Tab page offset, as for `:tabnext 2` after `:tabmove`.
    TabsRelative,
    Arguments,
    Quickfix,
    QuickfixValid,
    /// A plain count, no special items.
    Unsigned,
    /// No range allowed.
    None,
    Other,
}

impl AddrType {
    /// Name used by `:command -addr=`.
    pub fn name(self) -> &'static str {
        match self {
            AddrType::Lines => "lines",
            AddrType::Buffers => "buffers",
            AddrType::LoadedBuffers => "loaded_buffers",
            AddrType::Windows => "windows",
            AddrType::Tabs => "tabs",
            AddrType::TabsRelative => "tabs_relative",
            AddrType::Arguments => "arguments",
            AddrType::Quickfix => "quickfix",
            AddrType::QuickfixValid => "quickfix_valid",
            AddrType::Unsigned => "unsigned",
            AddrType::None => "none",
            AddrType::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Option<AddrType> {
        Some(match name {
            "lines" => AddrType::Lines,
            "arguments" | "arg" => AddrType::Arguments,
            "buffers" | "buf" => AddrType::Buffers,
            "loaded_buffers" | "load" => AddrType::LoadedBuffers,
            "windows" | "win" => AddrType::Windows,
            "tabs" | "tab" => AddrType::Tabs,
            "quickfix" | "qf" => AddrType::Quickfix,
            "other" | "?" => AddrType::Other,
            _ => return None,
        })
    }
}

/// Skip over a range at `at` without evaluating it. Colons and blanks
/// after the range are skipped too, and with `skip_star` a `*` for the
/// Visual area unless `cpo_star` says it is a command.
pub fn skip_range(line: &str, at: usize, skip_star: bool, cpo_star: bool) -> usize {
    let b = line.as_bytes();
    let mut i = at;
    while i < b.len() && b" \t0123456789.$%'/?-+,;\\".contains(&b[i]) {
        match b[i] {
            b'\\' => {
                if matches!(b.get(i + 1), Some(b'?' | b'/' | b'&')) {
                    i += 1;
                } else {
                    break;
                }
            }
            b'\'' => {
                // the mark name may be a multibyte character
                i += 1;
                i += line[i..].chars().next().map_or(0, char::len_utf8);
                continue;
            }
            b'/' | b'?' => {
                let delim = b[i];
                i += 1;
                while i < b.len() && b[i] != delim {
                    if b[i] == b'\\' && i + 1 < b.len() {
                        i += 1;
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        if i < b.len() {
            i += 1;
        }
    }
    while b.get(i) == Some(&b':') {
        i = skipwhite_at(line, i + 1);
    }
    if skip_star && b.get(i) == Some(&b'*') && !cpo_star {
        i = skipwhite_at(line, i + 1);
    }
    i.min(line.len())
}

fn addr_error(addr_type: AddrType) -> Error {
    if addr_type == AddrType::None {
        runtime(e::NORANGE)
    } else {
        runtime(e::INVADDR)
    }
}

/// Index of the current quickfix entry, 1-based, 0 without a list.
fn qf_cur_idx(st: &EditorState) -> i64 {
    if st.layout.qf.is_empty() {
        0
    } else {
        st.layout.qf_idx as i64 + 1
    }
}

/// Number of valid entries up to and including the current one.
fn qf_cur_valid_idx(st: &EditorState) -> i64 {
    let qf = &st.layout.qf;
    if qf.is_empty() {
        return 0;
    }
    let upto = st.layout.qf_idx.min(qf.len() - 1);
    qf[..=upto].iter().filter(|e| e.valid).count() as i64
}

fn qf_valid_size(st: &EditorState) -> i64 {
    st.layout.qf_valid_count()
}

fn arg_count(st: &EditorState) -> i64 {
    st.layout.args.len() as i64
}

/// First and last buffer numbers, only loaded ones for `loaded`.
fn buffer_bounds(st: &EditorState, loaded: bool) -> (i64, i64) {
    let all: Vec<(i64, bool)> = st.bufs.iter().map(|b| (b.fnum as i64, b.loaded)).collect();
    let wanted = |(_, l): &&(i64, bool)| !loaded || *l;
    let first = all
        .iter()
        .find(wanted)
        .or_else(|| all.last())
        .map_or(0, |(f, _)| *f);
    let last = all
        .iter()
        .rev()
        .find(wanted)
        .or_else(|| all.first())
        .map_or(0, |(f, _)| *f);
    (first, last)
}

/// Move `offset` buffers from buffer `lnum`, skipping unloaded ones for
/// `LoadedBuffers`. Stops at the first or last buffer.
fn buffer_local_count(st: &EditorState, addr_type: AddrType, lnum: i64, offset: i64) -> i64 {
    let bufs: Vec<(i64, bool)> = st.bufs.iter().map(|b| (b.fnum as i64, b.loaded)).collect();
    if bufs.is_empty() {
        return lnum;
    }
    let only_loaded = addr_type == AddrType::LoadedBuffers;
    let mut idx = bufs
        .iter()
        .position(|(f, _)| *f >= lnum)
        .unwrap_or(bufs.len() - 1);
    let step = |i: usize, back: bool| -> Option<usize> {
        if back {
            i.checked_sub(1)
        } else if i + 1 < bufs.len() {
            Some(i + 1)
        } else {
            None
        }
    };

    let mut count = offset;
    while count != 0 {
        count += if offset < 0 { 1 } else { -1 };
        let Some(next) = step(idx, offset < 0) else {
            break;
        };
        idx = next;
        if only_loaded {
            while !bufs[idx].1 {
                match step(idx, offset < 0) {
                    Some(n) => idx = n,
                    None => break,
                }
            }
        }
    }
    // went too far when the last buffer is not loaded
    if only_loaded {
        while !bufs[idx].1 {
            match step(idx, offset >= 0) {
                Some(n) => idx = n,
                None => break,
            }
        }
    }
    bufs[idx].0
}

/// The address used when none is typed.
fn default_address(st: &EditorState, ea: &ExArgs) -> i64 {
    match ea.addr_type {
        AddrType::Lines | AddrType::Other => st.cursor().lnum,
        AddrType::Windows => st.layout.win_nr(),
        AddrType::Arguments => (st.layout.arg_idx as i64 + 1).min(arg_count(st)),
        AddrType::LoadedBuffers | AddrType::Buffers => st.curbuf_fnum() as i64,
        AddrType::Tabs => st.layout.tab_nr(),
        AddrType::TabsRelative | AddrType::Unsigned => 1,
        AddrType::Quickfix => qf_cur_idx(st),
        AddrType::QuickfixValid => qf_cur_valid_idx(st),
        AddrType::None => 0,
    }
}

/// Line of mark `c` in the current buffer.
fn mark_line(st: &EditorState, c: char) -> Result<i64> {
    let name = match c {
        '`' => '\'',
        'a'..='z' | 'A'..='Z' | '0'..='9' | '<' | '>' | '[' | ']' | '\'' | '"' | '^' | '.' => c,
        _ => return Err(runtime(e::UNKNOWN_MARK)),
    };
    let Some(pos) = st.curbuf().mark(name) else {
        return Err(runtime(e::MARKNOTSET));
    };
    if pos.lnum <= 0 {
        return Err(runtime(e::MARKNOTSET));
    }
    if pos.lnum > st.line_count() {
        return Err(runtime("E19: Mark has invalid line number"));
    }
    Ok(pos.lnum)
}

/// Read one address of `line` at `*pos`, with any trailing offsets, and
/// move `*pos` past it. `Ok(None)` when there is no address. With `skip`
/// the address is only skipped; with `silent` a failed search reports
/// nothing. `address_count` is 1 for the first address of a range.
pub fn get_address(
    st: &mut EditorState,
    line: &str,
    pos: &mut usize,
    addr_type: AddrType,
    skip: bool,
    silent: bool,
    address_count: i32,
) -> Result<Option<i64>> {
    let b = line.as_bytes();
    let mut i = skipwhite_at(line, *pos);
    let mut lnum: Option<i64> = None;
    let _ = address_count;

    loop {
        match b.get(i) {
            Some(b'.') => {
                i += 1;
                lnum = Some(match addr_type {
                    AddrType::Lines | AddrType::Other => st.cursor().lnum,
                    AddrType::Windows => st.layout.win_nr(),
                    AddrType::Arguments => st.layout.arg_idx as i64 + 1,
                    AddrType::LoadedBuffers | AddrType::Buffers => st.curbuf_fnum() as i64,
                    AddrType::Tabs => st.layout.tab_nr(),
                    AddrType::None | AddrType::TabsRelative | AddrType::Unsigned => {
                        return Err(addr_error(addr_type));
                    }
                    AddrType::Quickfix => qf_cur_idx(st),
                    AddrType::QuickfixValid => qf_cur_valid_idx(st),
                });
            }
            Some(b'$') => {
                i += 1;
                lnum = Some(match addr_type {
                    AddrType::Lines | AddrType::Other => st.line_count(),
                    AddrType::Windows => st.layout.win_count(),
                    AddrType::Arguments => arg_count(st),
                    AddrType::LoadedBuffers => buffer_bounds(st, true).1,
                    AddrType::Buffers => buffer_bounds(st, false).1,
                    AddrType::Tabs => st.layout.tab_count(),
                    AddrType::None | AddrType::TabsRelative | AddrType::Unsigned => {
                        return Err(addr_error(addr_type));
                    }
                    AddrType::Quickfix => (st.layout.qf.len() as i64).max(1),
                    AddrType::QuickfixValid => qf_valid_size(st).max(1),
                });
            }
            Some(b'\'') => {
                i += 1;
                let Some(c) = line[i..].chars().next() else {
                    return Err(Error::Aborted);
                };
                if addr_type != AddrType::Lines {
                    return Err(addr_error(addr_type));
                }
                i += c.len_utf8();
                if !skip {
                    lnum = Some(mark_line(st, c)?);
                }
            }
            Some(&c @ (b'/' | b'?')) => {
                i += 1;
                if addr_type != AddrType::Lines {
                    return Err(addr_error(addr_type));
                }
                let end = i + skip_regexp(&line[i..], c as char);
                let pat = &line[i..end];
                i = end;
                if b.get(i) == Some(&c) {
                    i += 1;
                }
                if !skip {
                    // a search after another address starts there
                    let from = match lnum {
                        Some(n) if n > 0 => n.min(st.line_count()),
                        _ => st.cursor().lnum,
                    };
                    let (dir, from) = if c == b'/' {
                        (Dir::Forward, from)
                    } else {
                        (Dir::Backward, from.max(1))
                    };
                    match st.search_line(pat, PatKind::Search, dir, from) {
                        Ok(found) => lnum = Some(found),
                        Err(_) if silent => return Err(Error::Aborted),
                        Err(err) => return Err(err),
                    }
                }
            }
            Some(b'\\') => {
                i += 1;
                if addr_type != AddrType::Lines {
                    return Err(addr_error(addr_type));
                }
                let kind = match b.get(i) {
                    Some(b'&') => PatKind::Subst,
                    Some(b'?' | b'/') => PatKind::Search,
                    _ => return Err(runtime(e::BACKSLASH)),
                };
                if !skip {
                    let from = lnum.unwrap_or_else(|| st.cursor().lnum);
                    let dir = if b.get(i) == Some(&b'?') {
                        Dir::Backward
                    } else {
                        Dir::Forward
                    };
                    lnum = Some(st.search_line("", kind, dir, from)?);
                }
                i += 1;
            }
            Some(d) if d.is_ascii_digit() => {
                let Some((n, end)) = getdigits(line, i) else {
                    return Err(runtime(e::LNUM_RANGE));
                };
                lnum = Some(n);
                i = end;
            }
            _ => {}
        }

        loop {
            i = skipwhite_at(line, i);
            let Some(&c) = b.get(i) else {
                break;
            };
            if c != b'-' && c != b'+' && !c.is_ascii_digit() {
                break;
            }

            let base = match lnum {
                Some(n) => n,
                None => match addr_type {
                    // "+1" is the same as ".+1"
                    AddrType::Lines | AddrType::Other => st.cursor().lnum,
                    AddrType::Windows => st.layout.win_nr(),
                    AddrType::Arguments => st.layout.arg_idx as i64 + 1,
                    AddrType::LoadedBuffers | AddrType::Buffers => st.curbuf_fnum() as i64,
                    AddrType::Tabs => st.layout.tab_nr(),
                    AddrType::TabsRelative => 1,
                    AddrType::Quickfix => qf_cur_idx(st),
                    AddrType::QuickfixValid => qf_cur_valid_idx(st),
                    AddrType::None | AddrType::Unsigned => 0,
                },
            };

            let sign = if c.is_ascii_digit() {
                b'+'
            } else {
                i += 1;
                c
            };
            let n = if b.get(i).is_some_and(u8::is_ascii_digit) {
                match getdigits(line, i) {
                    Some((n, end)) => {
                        i = end;
                        n
                    }
                    None => return Err(runtime(e::LNUM_RANGE)),
                }
            } else {
                1
            };

            lnum = Some(match addr_type {
                AddrType::TabsRelative => return Err(runtime(e::INVRANGE)),
                AddrType::LoadedBuffers | AddrType::Buffers => {
                    buffer_local_count(st, addr_type, base, if sign == b'-' { -n } else { n })
                }
                _ if sign == b'-' => base.checked_sub(n).ok_or_else(|| runtime(e::LNUM_RANGE))?,
                _ => base.checked_add(n).ok_or_else(|| runtime(e::LNUM_RANGE))?,
            });
        }

        if !matches!(b.get(i), Some(b'/' | b'?')) {
            break;
        }
    }

    *pos = i;
    Ok(lnum)
}

/// Parse the range of `ea` at `ea.pos`: all `,` and `;` separated
/// addresses, `%` and `*`. Sets line1, line2 and addr_count.
pub fn parse_cmd_range(st: &mut EditorState, ea: &mut ExArgs, silent: bool) -> Result<()> {
    let mut address_count = 1;
    let mut lnum = None;
    let mut need_check_cursor = false;
    let line = ea.cmdline.clone();
    let b = line.as_bytes();

    let result = (|| -> Result<()> {
        loop {
            ea.line1 = ea.line2;
            ea.line2 = default_address(st, ea);
            ea.pos = skipwhite_at(&line, ea.pos);
            lnum = get_address(
                st,
                &line,
                &mut ea.pos,
                ea.addr_type,
                ea.skip,
                silent,
                address_count,
            )?;
            address_count += 1;

            match lnum {
                None if b.get(ea.pos) == Some(&b'%') => {
                    ea.pos += 1;
                    match ea.addr_type {
                        AddrType::Lines | AddrType::Other => {
                            ea.line1 = 1;
                            ea.line2 = st.line_count();
                        }
                        AddrType::LoadedBuffers => {
                            (ea.line1, ea.line2) = buffer_bounds(st, true);
                        }
                        AddrType::Buffers => {
                            (ea.line1, ea.line2) = buffer_bounds(st, false);
                        }
                        AddrType::Windows | AddrType::Tabs => {
                            // no builtin command takes "%" for these
                            if ea.cmd != Cmd::User {
                                return Err(invalid(e::INVRANGE));
                            }
                            ea.line1 = 1;
                            ea.line2 = if ea.addr_type == AddrType::Windows {
                                st.layout.win_count()
                            } else {
                                st.layout.tab_count()
                            };
                        }
                        AddrType::TabsRelative | AddrType::Unsigned | AddrType::Quickfix => {
                            return Err(invalid(e::INVRANGE));
                        }
                        AddrType::Arguments => {
                            if arg_count(st) == 0 {
                                ea.line1 = 0;
                                ea.line2 = 0;
                            } else {
                                ea.line1 = 1;
                                ea.line2 = arg_count(st);
                            }
                        }
                        AddrType::QuickfixValid => {
                            ea.line1 = 1;
                            ea.line2 = qf_valid_size(st).max(1);
                        }
                        // a range is rejected later
                        AddrType::None => {}
                    }
                    ea.addr_count += 1;
                }
                None if b.get(ea.pos) == Some(&b'*') && !st.cpo_has('*') => {
                    // the Visual area
                    if ea.addr_type != AddrType::Lines {
                        return Err(invalid(e::INVRANGE));
                    }
                    ea.pos += 1;
                    if !ea.skip {
                        ea.line1 = mark_line(st, '<')?;
                        ea.line2 = mark_line(st, '>')?;
                        ea.addr_count += 1;
                    }
                }
                None => {}
                Some(n) => ea.line2 = n,
            }
            ea.addr_count += 1;

            match b.get(ea.pos) {
                Some(b';') => {
                    if !ea.skip {
                        // zero is accepted so that "0;/pat" matches in line 1
                        let count = st.line_count();
                        st.curwin_mut().cursor.lnum = ea.line2.min(count).max(0);
                        need_check_cursor = true;
                    }
                }
                Some(b',') => {}
                _ => break,
            }
            ea.pos += 1;
        }

        // one address given: set start and end lines
        if ea.addr_count == 1 {
            ea.line1 = ea.line2;
            // but only an implicit one: really no address given
            if lnum.is_none() {
                ea.addr_count = 0;
            }
        }
        Ok(())
    })();

    if need_check_cursor {
        let cur = st.cursor().lnum;
        st.set_cursor_line(cur);
    }
    result
}

/// Set the range to everything, for commands that default to the whole
/// buffer (or list) when no range is given.
pub fn address_default_all(st: &EditorState, ea: &mut ExArgs) -> Result<()> {
    ea.line1 = 1;
    match ea.addr_type {
        AddrType::Lines | AddrType::Other => ea.line2 = st.line_count(),
        AddrType::LoadedBuffers => (ea.line1, ea.line2) = buffer_bounds(st, true),
        AddrType::Buffers => (ea.line1, ea.line2) = buffer_bounds(st, false),
        AddrType::Windows => ea.line2 = st.layout.win_count(),
        AddrType::Tabs => ea.line2 = st.layout.tab_count(),
        AddrType::TabsRelative => ea.line2 = 1,
        AddrType::Arguments => {
            if arg_count(st) == 0 {
                ea.line1 = 0;
                ea.line2 = 0;
            } else {
                ea.line2 = arg_count(st);
            }
        }
        AddrType::QuickfixValid => ea.line2 = qf_valid_size(st).max(1),
        AddrType::None | AddrType::Unsigned | AddrType::Quickfix => {
            return Err(Error::Fatal(
                "cannot default to all with this address type".to_string(),
            ));
        }
    }
    Ok(())
}

/// Check the range of `ea`. Returns the message for an invalid one.
pub fn invalid_range(st: &EditorState, ea: &ExArgs) -> Option<&'static str> {
    if ea.line1 < 0 || ea.line2 < 0 || ea.line1 > ea.line2 {
        return Some(e::INVRANGE);
    }
    if !ea.argt.contains(CmdFlags::RANGE) {
        return None;
    }
    let bad = match ea.addr_type {
        AddrType::Lines => ea.line2 > st.line_count(),
        AddrType::Arguments => {
            let count = arg_count(st);
            // one more when there are no arguments
            ea.line2 > count + i64::from(count == 0)
        }
        AddrType::Buffers => {
            // only a boundary check, the buffers need not exist
            let highest = st.bufs.iter().map(|b| b.fnum as i64).max().unwrap_or(0);
            ea.line1 < 1 || ea.line2 > highest
        }
        AddrType::LoadedBuffers => {
            if !st.bufs.iter().any(|b| b.loaded) {
                return Some(e::INVRANGE);
            }
            let (first, last) = buffer_bounds(st, true);
            ea.line1 < first || ea.line2 > last
        }
        AddrType::Windows => ea.line2 > st.layout.win_count(),
        AddrType::Tabs => ea.line2 > st.layout.tab_count(),
        AddrType::TabsRelative | AddrType::Other => false,
        AddrType::Quickfix => {
            // too big is fine, the last entry is used; an empty list
            // without a count is left to the command
            ea.line2 <= 0 && ea.addr_count > 0
        }
        AddrType::QuickfixValid => {
            (ea.line2 != 1 && ea.line2 > qf_valid_size(st)) || ea.line2 < 0
        }
        // reported elsewhere
        AddrType::Unsigned | AddrType::None => false,
    };
    bad.then_some(e::INVRANGE)
}

/// Line zero becomes one for commands that do not accept it.
pub fn correct_range(ea: &mut ExArgs) {
    if !ea.argt.contains(CmdFlags::ZEROR) {
        if ea.line1 == 0 {
            ea.line1 = 1;
        }
        if ea.line2 == 0 {
            ea.line2 = 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::buffer::Pos;
    use crate::host::MemHost;
    use test_log::test;

    fn state(text: &str) -> EditorState {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        st.curbuf_mut().load_text(text);
        st
    }

    fn addr(st: &mut EditorState, line: &str) -> Result<(Option<i64>, usize)> {
        let mut pos = 0;
        let n = get_address(st, line, &mut pos, AddrType::Lines, false, false, 1)?;
        Ok((n, pos))
    }

    fn range(st: &mut EditorState, line: &str) -> Result<ExArgs> {
        let mut ea = ExArgs::new(line);
        ea.argt = CmdFlags::RANGE;
        parse_cmd_range(st, &mut ea, false)?;
        Ok(ea)
    }

    #[test]
    fn skipping_ranges() {
        assert_eq!(skip_range("1,$d", 0, false, false), 3);
        assert_eq!(skip_range("'a,'bs/x/y/", 0, false, false), 5);
        assert_eq!(skip_range("/a\\/b/,?c?p", 0, false, false), 10);
        assert_eq!(skip_range("3 ::p", 0, false, false), 4);
        assert_eq!(skip_range("* p", 0, true, false), 2);
        assert_eq!(skip_range("* p", 0, true, true), 0);
        assert_eq!(skip_range("\\/x", 0, false, false), 2);
        assert_eq!(skip_range("\\x", 0, false, false), 0);
        assert_eq!(skip_range("'\u{e9}p", 0, false, false), 3);
    }

    #[test]
    fn simple_addresses() {
        let mut st = state("a\nb\nc\nd\ne");
        st.set_cursor_line(2);
        assert_eq!(addr(&mut st, ".").unwrap(), (Some(2), 1));
        assert_eq!(addr(&mut st, "$").unwrap(), (Some(5), 1));
        assert_eq!(addr(&mut st, "3p").unwrap(), (Some(3), 1));
        assert_eq!(addr(&mut st, "+").unwrap().0, Some(3));
        assert_eq!(addr(&mut st, "-- ").unwrap().0, Some(0));
        assert_eq!(addr(&mut st, "$-2+1").unwrap().0, Some(4));
        assert_eq!(addr(&mut st, ".3").unwrap().0, Some(5));
        assert_eq!(addr(&mut st, "d").unwrap(), (None, 0));
    }

    #[test]
    fn marks_and_searches() {
        let mut st = state("a\nfoo\nb\nfoo\nc");
        st.curbuf_mut().set_mark('x', Pos::new(3, 0));
        assert_eq!(addr(&mut st, "'x").unwrap().0, Some(3));
        assert!(addr(&mut st, "'y").is_err());
        assert!(addr(&mut st, "'!").is_err());

        st.set_cursor_line(1);
        assert_eq!(addr(&mut st, "/foo/").unwrap(), (Some(2), 5));
        assert_eq!(addr(&mut st, "/foo//foo/").unwrap().0, Some(4));
        assert_eq!(addr(&mut st, "3/foo").unwrap().0, Some(4));
        assert_eq!(addr(&mut st, "?b?-1").unwrap().0, Some(2));
        // the last pattern is now "b"
        assert_eq!(addr(&mut st, "\\/").unwrap().0, Some(3));
        assert!(matches!(addr(&mut st, "\\x"), Err(Error::Runtime(_))));
    }

    #[test]
    fn multibyte_mark_name_is_unknown() {
        let host = MemHost::new();
        let mut st = EditorState::new(Box::new(host.clone()), false);
        st.curbuf_mut().load_text("a\nb");
        assert!(matches!(addr(&mut st, "'\u{e9}"), Err(Error::Runtime(_))));
        crate::runner::do_cmdline_cmd(&mut st, "'\u{e9}").unwrap();
        crate::runner::do_cmdline_cmd(&mut st, "'\u{e9}p").unwrap();
        let errs = host.errors();
        assert_eq!(errs.len(), 2, "{errs:?}");
        assert!(errs.iter().all(|e| e.starts_with("E78")), "{errs:?}");
    }

    #[test]
    fn offsets_do_not_overflow() {
        let mut st = state("a\nb");
        assert!(addr(&mut st, "$-9223372036854775807-9223372036854775807").is_err());
        assert!(addr(&mut st, "$+9223372036854775807").is_err());
    }

    #[test]
    fn skipped_search_does_not_move() {
        let mut st = state("a\nb");
        let mut pos = 0;
        let n = get_address(&mut st, "/zzz/d", &mut pos, AddrType::Lines, true, false, 1).unwrap();
        assert_eq!(n, None);
        assert_eq!(pos, 5);
    }

    #[test]
    fn ranges() {
        let mut st = state("1\n2\n3\n4\n5\n6");
        st.set_cursor_line(3);
        let ea = range(&mut st, "1,$").unwrap();
        assert_eq!((ea.line1, ea.line2, ea.addr_count), (1, 6, 2));

        let ea = range(&mut st, "%").unwrap();
        assert_eq!((ea.line1, ea.line2, ea.addr_count), (1, 6, 2));

        let ea = range(&mut st, "").unwrap();
        assert_eq!((ea.line1, ea.line2, ea.addr_count), (3, 3, 0));

        let ea = range(&mut st, "2;+1").unwrap();
        assert_eq!((ea.line1, ea.line2), (2, 3));
        assert_eq!(st.cursor().lnum, 2);

        let ea = range(&mut st, "4").unwrap();
        assert_eq!((ea.line1, ea.line2, ea.addr_count), (4, 4, 1));

        let ea = range(&mut st, "1,2,3").unwrap();
        assert_eq!((ea.line1, ea.line2, ea.addr_count), (2, 3, 3));
    }

    #[test]
    fn visual_star() {
        let mut st = state("1\n2\n3");
        st.curbuf_mut().set_mark('<', Pos::new(1, 0));
        st.curbuf_mut().set_mark('>', Pos::new(2, 0));
        let ea = range(&mut st, "*").unwrap();
        assert_eq!((ea.line1, ea.line2), (1, 2));
        assert_eq!(ea.addr_count, 2);
    }

    #[test]
    fn range_checks() {
        let mut st = state("1\n2\n3");
        let mut ea = ExArgs::new("");
        ea.argt = CmdFlags::RANGE;
        (ea.line1, ea.line2) = (3, 1);
        assert_eq!(invalid_range(&st, &ea), Some(e::INVRANGE));
        (ea.line1, ea.line2) = (1, 4);
        assert_eq!(invalid_range(&st, &ea), Some(e::INVRANGE));
        (ea.line1, ea.line2) = (0, 3);
        assert_eq!(invalid_range(&st, &ea), None);
        correct_range(&mut ea);
        assert_eq!(ea.line1, 1);

        ea.argt |= CmdFlags::ZEROR;
        ea.line1 = 0;
        correct_range(&mut ea);
        assert_eq!(ea.line1, 0);

        ea.addr_type = AddrType::Tabs;
        (ea.line1, ea.line2) = (1, 2);
        assert_eq!(invalid_range(&st, &ea), Some(e::INVRANGE));
        st.layout.new_tab(1, 1);
        assert_eq!(invalid_range(&st, &ea), None);
    }

    #[test]
    fn window_and_buffer_ranges() {
        let mut st = state("x");
        let mut ea = ExArgs::new("%");
        ea.addr_type = AddrType::Windows;
        assert!(parse_cmd_range(&mut st, &mut ea, false).is_err());

        ea = ExArgs::new("$");
        ea.addr_type = AddrType::Tabs;
        parse_cmd_range(&mut st, &mut ea, false).unwrap();
        assert_eq!(ea.line2, 1);

        ea = ExArgs::new(".+1");
        ea.addr_type = AddrType::TabsRelative;
        assert!(parse_cmd_range(&mut st, &mut ea, false).is_err());

        ea = ExArgs::new("");
        ea.addr_type = AddrType::Lines;
        address_default_all(&st, &mut ea).unwrap();
        assert_eq!((ea.line1, ea.line2), (1, 1));
        ea.addr_type = AddrType::Unsigned;
        assert!(matches!(address_default_all(&st, &mut ea), Err(Error::Fatal(_))));
    }
}
