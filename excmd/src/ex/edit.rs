//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Line editing commands on the current buffer: printing, inserting,
//! deleting, copying, joining, shifting, marks, undo, `:substitute` and
//! `:global`.

use regex::Regex;

use crate::address;
use crate::buffer::Pos;
use crate::charset::transstr;
use crate::cmds::Cmd;
use crate::docmd::{check_nextcmd, get_flags, CmdCtx, ExArgs, ExFlags};
use crate::error::{e, invalid, runtime, Error, Result};
use crate::eval::Value;
use crate::line_source::StrSource;
use crate::options::Opt;
use crate::registers::RegContent;
use crate::runner::{do_cmdline, RunFlags};
use crate::search::{expand_replacement, regtilde, skip_regexp, vim_regex, PatKind};
use crate::state::EditorState;

/// Text of line `lnum` the way `:print` shows it.
fn render_line(st: &EditorState, lnum: i64, number: bool, list: bool) -> String {
    let text = st.curbuf().get(lnum);
    let mut out = String::new();
    if number || st.p_flag(Opt::Number) {
        out.push_str(&format!("{lnum:>3} "));
    }
    if list || st.p_flag(Opt::List) {
        out.push_str(&transstr(text));
        out.push('$');
        return out;
    }
    let ts = st.p_num(Opt::Tabstop).max(1) as usize;
    let mut col = 0;
    for c in text.chars() {
        if c == '\t' {
            let n = ts - col % ts;
            out.extend(std::iter::repeat(' ').take(n));
            col += n;
        } else {
            let shown = transstr(&c.to_string());
            col += shown.chars().count();
            out.push_str(&shown);
        }
    }
    out
}

fn print_line(st: &mut EditorState, lnum: i64, number: bool, list: bool) {
    let line = render_line(st, lnum, number, list);
    st.msg(&line);
}

/// Print the cursor line when the command had `p`, `#` or `l` flags.
fn ex_may_print(st: &mut EditorState, ea: &ExArgs) {
    if !ea.flags.is_empty() {
        let lnum = st.cursor().lnum;
        print_line(
            st,
            lnum,
            ea.flags.contains(ExFlags::NR),
            ea.flags.contains(ExFlags::LIST),
        );
    }
}

/// Print the range of `ea`, for `:print` and a bare range followed by `|`.
pub fn print_lines(st: &mut EditorState, ea: &mut ExArgs) -> Result<()> {
    if st.curbuf().is_empty() {
        return Err(runtime(e::EMPTYBUF));
    }
    let number = matches!(ea.cmd, Cmd::Number | Cmd::Hash) || ea.flags.contains(ExFlags::NR);
    let list = ea.cmd == Cmd::List || ea.flags.contains(ExFlags::LIST);
    for lnum in ea.line1..=ea.line2 {
        if st.exc.got_int {
            break;
        }
        print_line(st, lnum, number, list);
    }
    st.cursor_to_line_start(ea.line2);
    Ok(())
}

/// `:print`, `:list`, `:number` and `:#`
pub fn ex_print(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    print_lines(st, ea)
}

/// Report a change in the number of lines when it is over 'report'.
fn msgmore(st: &mut EditorState, n: i64) {
    if st.global_busy > 0 || n == 0 {
        return;
    }
    let pn = n.abs();
    if pn <= st.p_num(Opt::Report) {
        return;
    }
    let text = match (n > 0, pn) {
        (true, 1) => "1 more line".to_string(),
        (true, _) => format!("{pn} more lines"),
        (false, 1) => "1 line less".to_string(),
        (false, _) => format!("{pn} fewer lines"),
    };
    st.msg(&text);
}

/// Lines for `:append`: from the text after a `|`, else from the line
/// source, up to a line with a single `.`.
fn read_append_lines(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(rest) = ea.nextcmd.take().filter(|s| !s.is_empty()) {
        let mut parts = rest.split('\n');
        for part in parts.by_ref() {
            if part == "." {
                break;
            }
            lines.push(part.to_string());
        }
        let left: Vec<&str> = parts.collect();
        if !left.is_empty() {
            ea.nextcmd = Some(left.join("\n"));
        }
        return lines;
    }
    while let Some(line) = ctx.source.next_line(st, 0) {
        if line == "." {
            break;
        }
        lines.push(line);
        if st.exc.got_int {
            break;
        }
    }
    lines
}

fn append_after(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx, after: i64) -> Result<()> {
    let lines = read_append_lines(st, ea, ctx);
    let mut lnum = after;
    if !lines.is_empty() {
        st.u_save()?;
        lnum += lines.len() as i64;
        st.curbuf_mut().append(after, lines);
        st.changed();
    }
    st.cursor_to_line_start(lnum.max(1));
    Ok(())
}

/// `:append` and `:insert`
pub fn ex_append(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let after = if ea.cmd == Cmd::Insert {
        (ea.line2 - 1).max(0)
    } else {
        ea.line2
    };
    append_after(st, ea, ctx, after)
}

/// `:change` replaces the range with lines read like `:append`.
pub fn ex_change(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    if ea.line2 >= ea.line1 {
        st.u_save()?;
        st.curbuf_mut().delete(ea.line1, ea.line2);
        st.changed();
    }
    append_after(st, ea, ctx, ea.line1 - 1)
}

/// `:copy`, `:t` and `:move`
pub fn ex_copymove(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let line = ea.cmdline.clone();
    let mut pos = ea.arg;
    let dest = address::get_address(st, &line, &mut pos, ea.addr_type, false, false, 1)?;
    ea.arg = pos.min(ea.cmdline.len());
    ea.advance_arg(0);
    get_flags(ea);
    if !ea.arg_str().is_empty() {
        return Err(invalid(format!("{}: {}", e::TRAILING, ea.arg_str())));
    }
    let dest = match dest {
        Some(n) if n >= 0 && n <= st.line_count() => n,
        _ => return Err(invalid(e::INVRANGE)),
    };

    if ea.cmd == Cmd::Move {
        do_move(st, ea.line1, ea.line2, dest)?;
    } else {
        let lines = st.curbuf().lines(ea.line1, ea.line2);
        let count = lines.len() as i64;
        st.u_save()?;
        st.curbuf_mut().append(dest, lines);
        st.changed();
        st.cursor_to_line_start(dest + count);
        msgmore(st, count);
    }
    ex_may_print(st, ea);
    Ok(())
}

/// Move `line1..=line2` below `dest`. Marks on the moved lines go along.
fn do_move(st: &mut EditorState, line1: i64, line2: i64, dest: i64) -> Result<()> {
    if dest >= line1 && dest < line2 {
        return Err(runtime(e::MOVE_INTO));
    }
    let count = line2 - line1 + 1;
    let lines = st.curbuf().lines(line1, line2);
    let moved_marks: Vec<(char, Pos)> = st
        .curbuf()
        .marks()
        .filter(|(_, p)| p.lnum >= line1 && p.lnum <= line2)
        .map(|(c, p)| (*c, *p))
        .collect();

    st.u_save()?;
    let buf = st.curbuf_mut();
    let first_new = if dest >= line2 {
        buf.append(dest, lines);
        buf.delete(line1, line2);
        dest - count + 1
    } else {
        buf.delete(line1, line2);
        buf.append(dest, lines);
        dest + 1
    };
    for (name, pos) in moved_marks {
        buf.set_mark(name, Pos::new(pos.lnum - line1 + first_new, pos.col));
    }
    st.changed();
    st.cursor_to_line_start(first_new + count - 1);

    if st.global_busy == 0 && count > st.p_num(Opt::Report) {
        let text = if count == 1 {
            "1 line moved".to_string()
        } else {
            format!("{count} lines moved")
        };
        st.msg(&text);
    }
    Ok(())
}

/// Indent width of `text` with tabs of `ts` columns.
fn indent_width(text: &str, ts: usize) -> usize {
    let mut col = 0;
    for c in text.chars() {
        match c {
            ' ' => col += 1,
            '\t' => col += ts - col % ts,
            _ => break,
        }
    }
    col
}

fn shift_line(text: &str, left: bool, amount: i64, st: &EditorState) -> String {
    let ts = st.p_num(Opt::Tabstop).max(1) as usize;
    let sw = match st.p_num(Opt::Shiftwidth) {
        0 => ts,
        n => n as usize,
    };
    let width = indent_width(text, ts);
    let delta = sw * amount.max(0) as usize;
    let new_width = if left {
        width.saturating_sub(delta)
    } else {
        width + delta
    };
    let body = text.trim_start_matches([' ', '\t']);
    let mut out = String::new();
    if st.p_flag(Opt::Expandtab) {
        out.extend(std::iter::repeat(' ').take(new_width));
    } else {
        out.extend(std::iter::repeat('\t').take(new_width / ts));
        out.extend(std::iter::repeat(' ').take(new_width % ts));
    }
    out.push_str(body);
    out
}

/// `:delete`, `:yank`, `:<` and `:>`
pub fn ex_operators(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let count = ea.line2 - ea.line1 + 1;
    match ea.cmd {
        Cmd::Delete => {
            st.u_save()?;
            let removed = st.curbuf_mut().delete(ea.line1, ea.line2);
            st.regs.record_delete(ea.regname, RegContent::lines(removed));
            st.changed();
            st.cursor_to_line_start(ea.line1);
            msgmore(st, -count);
        }
        Cmd::Yank => {
            let lines = st.curbuf().lines(ea.line1, ea.line2);
            st.regs.record_yank(ea.regname, RegContent::lines(lines));
            if count > st.p_num(Opt::Report) && st.global_busy == 0 {
                let mut text = if count == 1 {
                    "1 line yanked".to_string()
                } else {
                    format!("{count} lines yanked")
                };
                if let Some(r) = ea.regname {
                    text.push_str(&format!(" into \"{r}"));
                }
                st.msg(&text);
            }
            st.cursor_to_line_start(ea.line1);
        }
        _ => {
            let left = ea.cmd == Cmd::Lshift;
            st.u_save()?;
            for lnum in ea.line1..=ea.line2 {
                let text = st.curbuf().get(lnum).to_string();
                // empty lines are not shifted right
                if text.is_empty() {
                    continue;
                }
                let new = shift_line(&text, left, ea.amount, st);
                if new != text {
                    st.curbuf_mut().set_line(lnum, new);
                }
            }
            st.changed();
            if count > st.p_num(Opt::Report) && st.global_busy == 0 {
                let op = if left { '<' } else { '>' };
                let times = if ea.amount == 1 {
                    "1 time".to_string()
                } else {
                    format!("{} times", ea.amount)
                };
                let lines = if count == 1 {
                    "1 line".to_string()
                } else {
                    format!("{count} lines")
                };
                st.msg(&format!("{lines} {op}ed {times}"));
            }
            st.cursor_to_line_start(ea.line2);
            ex_may_print(st, ea);
        }
    }
    Ok(())
}

/// Lines of register `r` for `:put`.
fn put_lines(st: &mut EditorState, r: char) -> Result<Vec<String>> {
    if r == '=' {
        let text = st.vars.expr_line.clone().unwrap_or_default();
        return Ok(match st.eval_str(&text)? {
            Value::List(items) => items
                .borrow()
                .iter()
                .map(|v| v.to_str())
                .collect::<Result<Vec<_>>>()?,
            v => {
                let s = v.to_str()?;
                s.strip_suffix('\n').unwrap_or(&s).split('\n').map(str::to_string).collect()
            }
        });
    }
    if let Some(content) = st.regs.get(r) {
        return Ok(content.lines.clone());
    }
    let text = st.register_value(r)?;
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(text
        .strip_suffix('\n')
        .unwrap_or(&text)
        .split('\n')
        .map(str::to_string)
        .collect())
}

/// `:[line]put [x]` and `:put!`; the text always goes in as whole lines.
pub fn ex_put(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let r = ea.regname.unwrap_or('"');
    let lines = put_lines(st, r)?;
    if lines.is_empty() {
        return Err(runtime(format!("{} {r}", e::NOTHING_IN_REG)));
    }
    let after = if ea.forceit {
        (ea.line2 - 1).max(0)
    } else {
        ea.line2
    };
    let count = lines.len() as i64;
    st.u_save()?;
    st.curbuf_mut().append(after, lines);
    st.changed();
    st.cursor_to_line_start(after + count);
    msgmore(st, count);
    Ok(())
}

/// `:join`; with `!` no white space is inserted or removed.
pub fn ex_join(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let line_count = st.line_count();
    if ea.line1 == ea.line2 {
        // ":2,2join" does nothing
        if ea.addr_count >= 2 {
            return Ok(());
        }
        if ea.line2 == line_count {
            return Ok(());
        }
        ea.line2 += 1;
    }

    let mut joined = st.curbuf().get(ea.line1).to_string();
    let mut col = 0;
    for lnum in ea.line1 + 1..=ea.line2 {
        let next = st.curbuf().get(lnum);
        if ea.forceit {
            col = joined.len();
            joined.push_str(next);
            continue;
        }
        let next = next.trim_start_matches([' ', '\t']);
        let ends_white = joined.ends_with([' ', '\t']);
        if !next.is_empty() && !joined.is_empty() && !ends_white && !next.starts_with(')') {
            joined.push(' ');
        }
        col = joined.len();
        joined.push_str(next);
    }

    st.u_save()?;
    let buf = st.curbuf_mut();
    buf.set_line(ea.line1, joined);
    buf.delete(ea.line1 + 1, ea.line2);
    st.changed();
    st.set_cursor_line(ea.line1);
    st.curwin_mut().cursor.col = col;
    ex_may_print(st, ea);
    Ok(())
}

/// `:mark x` and `:kx`
pub fn ex_mark(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let arg = ea.arg_str();
    let mut chars = arg.chars();
    let Some(c) = chars.next() else {
        return Err(invalid(e::ARGREQ));
    };
    if chars.next().is_some() {
        return Err(invalid(format!("{}: {}", e::TRAILING, arg)));
    }
    let name = match c {
        'a'..='z' | 'A'..='Z' | '[' | ']' | '<' | '>' => c,
        '\'' | '`' => '\'',
        _ => return Err(runtime(e::INVMARK)),
    };
    let pos = Pos::new(ea.line2, 0);
    st.curbuf_mut().set_mark(name, pos);
    Ok(())
}

/// `:undo [N]`: without a count undo one change, with a count go to the
/// state after change N.
pub fn ex_undo(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    if ea.addr_count == 0 {
        let cursor = st.cursor().lnum;
        match st.curbuf_mut().undo(cursor) {
            Some(lnum) => {
                st.changed();
                st.cursor_to_line_start(lnum);
            }
            None => st.msg("Already at oldest change"),
        }
        return Ok(());
    }
    let target = ea.line2.max(0) as usize;
    loop {
        let depth = st.curbuf().undo_depth();
        let cursor = st.cursor().lnum;
        let moved = if depth > target {
            st.curbuf_mut().undo(cursor)
        } else if depth < target {
            st.curbuf_mut().redo(cursor)
        } else {
            break;
        };
        match moved {
            Some(lnum) => {
                st.changed();
                st.cursor_to_line_start(lnum);
            }
            None => return Err(runtime(format!("E830: Undo number {target} not found"))),
        }
    }
    Ok(())
}

pub fn ex_redo(st: &mut EditorState, _ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let cursor = st.cursor().lnum;
    match st.curbuf_mut().redo(cursor) {
        Some(lnum) => {
            st.changed();
            st.cursor_to_line_start(lnum);
        }
        None => st.msg("Already at newest change"),
    }
    Ok(())
}

/// `:=` shows the last line number, `:.=` the given one.
pub fn ex_equal(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    st.msg(&ea.line2.to_string());
    ex_may_print(st, ea);
    Ok(())
}

/// Flags of one `:substitute`.
#[derive(Debug, Clone, Default)]
struct SubFlags {
    global: bool,
    confirm: bool,
    count_only: bool,
    no_error: bool,
    /// `Some(true)` for `i`, `Some(false)` for `I`.
    ignore_case: Option<bool>,
    use_last_search: bool,
    print: ExFlags,
}

impl SubFlags {
    /// Parse flag letters at the start of `s`; returns their length.
    fn parse(&mut self, s: &str) -> usize {
        let mut len = 0;
        for c in s.chars() {
            match c {
                'g' => self.global = !self.global,
                'c' => self.confirm = !self.confirm,
                'n' => self.count_only = true,
                'e' => self.no_error = true,
                'r' => self.use_last_search = true,
                'i' => self.ignore_case = Some(true),
                'I' => self.ignore_case = Some(false),
                'p' => self.print |= ExFlags::PRINT,
                '#' => self.print |= ExFlags::NR,
                'l' => self.print |= ExFlags::LIST,
                _ => break,
            }
            len += 1;
        }
        len
    }
}

/// The replacement side of a `:s`: a template or a `\=` expression.
enum Replacement {
    Template(String),
    Expr(String),
}

impl Replacement {
    fn expand(&self, st: &mut EditorState, caps: &regex::Captures, magic: bool) -> Result<String> {
        match self {
            Replacement::Template(sub) => Ok(expand_replacement(sub, caps, magic)),
            Replacement::Expr(expr) => {
                st.search.submatches = (0..caps.len())
                    .map(|i| caps.get(i).map_or(String::new(), |m| m.as_str().to_string()))
                    .collect();
                let value = st.eval_str(expr);
                st.search.submatches.clear();
                Ok(match value? {
                    Value::List(items) => items
                        .borrow()
                        .iter()
                        .map(|v| v.to_str())
                        .collect::<Result<Vec<_>>>()?
                        .join("\r"),
                    v => v.to_str()?.replace('\n', "\r"),
                })
            }
        }
    }
}

/// `:substitute`, `:&` and `:~`
pub fn ex_substitute(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let arg = ea.arg_str().to_string();
    let magic = st.p_flag(Opt::Magic);
    let mut kind = PatKind::Subst;
    let mut pat: Option<String> = None;
    let mut sub: Option<String> = None;
    let mut p = 0;

    let first = arg.chars().next();
    let new_pattern = ea.cmd == Cmd::Substitute
        && first.is_some_and(|c| !c.is_whitespace() && !"0123456789cegriIp|\"".contains(c));
    if new_pattern {
        let delim = first.unwrap_or('/');
        if delim.is_ascii_alphanumeric() || delim == '\\' {
            return Err(invalid(e::REGEX_LETTERS));
        }
        p += delim.len_utf8();
        let plen = skip_regexp(&arg[p..], delim);
        pat = Some(arg[p..p + plen].to_string());
        p += plen;
        if arg[p..].starts_with(delim) {
            p += delim.len_utf8();
        }
        // the replacement ends at an unescaped delimiter
        let start = p;
        let mut chars = arg[p..].char_indices();
        let mut end = arg.len();
        while let Some((i, c)) = chars.next() {
            if c == delim {
                end = start + i;
                break;
            }
            if c == '\\' {
                chars.next();
            }
        }
        sub = Some(arg[start..end].to_string());
        p = if end < arg.len() {
            end + delim.len_utf8()
        } else {
            end
        };
        if pat.as_deref() == Some("") {
            kind = PatKind::LastUsed;
        }
    } else if ea.cmd == Cmd::Tilde {
        kind = PatKind::LastUsed;
    }

    let mut flags = SubFlags::default();
    if arg[p..].starts_with('&') {
        p += 1;
        let previous = st.search.last_sub_flags.clone();
        flags.parse(&previous);
        // print flags are not kept
        flags.print = ExFlags::empty();
    }
    let flag_text_start = p;
    p += flags.parse(&arg[p..]);
    if flags.use_last_search && pat.is_none() {
        kind = PatKind::LastUsed;
    }
    let flag_text = arg[flag_text_start..p].to_string();

    // a count: the range starts at the last line
    let mut count: Option<i64> = None;
    let rest = arg[p..].trim_start_matches([' ', '\t']);
    p = arg.len() - rest.len();
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        let n: i64 = rest[..digits].parse().unwrap_or(i64::MAX);
        if n <= 0 {
            return Err(invalid(e::POSCOUNT));
        }
        count = Some(n);
        p += digits;
    }
    let rest = &arg[p..];
    if let Some(next) = check_nextcmd(rest) {
        ea.nextcmd = Some(next);
    } else if !rest.trim_start().is_empty() && !rest.trim_start().starts_with('"') {
        return Err(invalid(format!("{}: {}", e::TRAILING, rest.trim_start())));
    }
    if ea.skip {
        return Ok(());
    }

    if let Some(n) = count {
        ea.line1 = ea.line2;
        ea.line2 = (ea.line2 + n - 1).min(st.line_count());
    }

    let template = match sub {
        Some(s) => {
            let s = regtilde(&s, st.search.last_replacement.as_deref(), magic);
            st.search.last_replacement = Some(s.clone());
            st.search.last_sub_flags = flag_text;
            s
        }
        None => match st.search.last_replacement.clone() {
            Some(s) => s,
            None => return Err(runtime(e::NOPREVSUB)),
        },
    };
    let replacement = match template.strip_prefix("\\=") {
        Some(expr) => Replacement::Expr(expr.to_string()),
        None => Replacement::Template(template),
    };

    let (mut re, used) = st.search_regex(pat.as_deref().unwrap_or(""), kind)?;
    if let Some(ic) = flags.ignore_case {
        re = vim_regex(&used, magic, ic)?;
    }
    if pat.as_deref().is_some_and(|p| !p.is_empty()) {
        st.save_pattern(&used, PatKind::Subst);
    }

    if st.global_busy == 0 {
        st.search.sub_nsubs = 0;
        st.search.sub_nlines = 0;
    }
    let before = st.search.sub_nsubs;
    let last = do_sub_lines(st, ea, &re, &replacement, &flags, magic)?;

    if st.search.sub_nsubs > before {
        if !flags.count_only {
            st.cursor_to_line_start(last);
        }
        if st.global_busy == 0 {
            do_sub_msg(st, flags.count_only);
        }
        if !flags.print.is_empty() {
            let lnum = st.cursor().lnum;
            print_line(
                st,
                lnum,
                flags.print.contains(ExFlags::NR),
                flags.print.contains(ExFlags::LIST),
            );
        }
        return Ok(());
    }
    if st.exc.got_int {
        return Err(Error::Interrupt);
    }
    if st.global_busy == 0 && !flags.no_error {
        return Err(runtime(format!("{}: {}", e::PATNOTF, used)));
    }
    Ok(())
}

/// Run the substitution over the range. Returns the last line changed.
fn do_sub_lines(
    st: &mut EditorState,
    ea: &ExArgs,
    re: &Regex,
    replacement: &Replacement,
    flags: &SubFlags,
    magic: bool,
) -> Result<i64> {
    let mut line2 = ea.line2;
    let mut lnum = ea.line1;
    let mut last = ea.line1;
    let mut saved = false;

    while lnum <= line2 && lnum <= st.line_count() {
        if st.exc.got_int {
            break;
        }
        let text = st.curbuf().get(lnum).to_string();
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut start = 0;
        let mut nsubs = 0;
        let mut quit = false;

        while start <= text.len() {
            let Some(caps) = re.captures_at(&text, start) else {
                break;
            };
            let Some(m) = caps.get(0) else {
                break;
            };
            let mut take = true;
            if flags.confirm && !flags.count_only {
                let prompt = format!("replace with {} (y/n/a/q/l/^E/^Y)?", replacement_text(replacement));
                take = st.host.ask_yesno(&prompt);
                if st.exc.got_int {
                    quit = true;
                    break;
                }
            }
            if take {
                nsubs += 1;
                if !flags.count_only {
                    out.push_str(&text[copied..m.start()]);
                    let new = replacement.expand(st, &caps, magic)?;
                    out.push_str(&new);
                    copied = m.end();
                }
            }
            if !flags.global {
                break;
            }
            // step over an empty match
            start = if m.end() == m.start() {
                match text[m.end()..].chars().next() {
                    Some(c) => m.end() + c.len_utf8(),
                    None => break,
                }
            } else {
                m.end()
            };
        }

        if nsubs > 0 {
            st.search.sub_nsubs += nsubs;
            st.search.sub_nlines += 1;
            last = lnum;
            if !flags.count_only {
                out.push_str(&text[copied..]);
                if !saved {
                    st.u_save()?;
                    saved = true;
                }
                // a line break in the replacement splits the line
                let mut parts: Vec<String> = out.split('\r').map(str::to_string).collect();
                let first = parts.remove(0);
                let added = parts.len() as i64;
                st.curbuf_mut().set_line(lnum, first);
                if added > 0 {
                    st.curbuf_mut().append(lnum, parts);
                    lnum += added;
                    line2 += added;
                    last = lnum;
                }
                st.changed();
            }
        }
        if quit {
            break;
        }
        lnum += 1;
    }
    Ok(last)
}

fn replacement_text(r: &Replacement) -> String {
    match r {
        Replacement::Template(s) => s.clone(),
        Replacement::Expr(e) => format!("\\={e}"),
    }
}

/// Report the number of substitutions when over 'report'.
fn do_sub_msg(st: &mut EditorState, count_only: bool) {
    let n = st.search.sub_nsubs;
    let lines = st.search.sub_nlines;
    if n <= st.p_num(Opt::Report) && !count_only {
        return;
    }
    let what = match (count_only, n) {
        (true, 1) => "1 match".to_string(),
        (true, _) => format!("{n} matches"),
        (false, 1) => "1 substitution".to_string(),
        (false, _) => format!("{n} substitutions"),
    };
    let on = if lines == 1 {
        "1 line".to_string()
    } else {
        format!("{lines} lines")
    };
    st.msg(&format!("{what} on {on}"));
}

/// `:global` and `:vglobal`: mark the matching lines, then run the
/// command on each marked line. Deleting lines keeps the other marks.
pub fn ex_global(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let invert = ea.cmd == Cmd::Vglobal || ea.forceit;
    if st.global_busy > 0 && (ea.line1 != 1 || ea.line2 != st.line_count()) {
        return Err(runtime(e::GLOBAL_RANGE));
    }

    let arg = ea.arg_str().to_string();
    let mut kind = PatKind::LastUsed;
    let (pat, cmd) = if let Some(rest) = arg.strip_prefix('\\') {
        // "\/cmd", "\?cmd" and "\&cmd" use a remembered pattern
        match rest.chars().next() {
            Some('/') | Some('?') => {
                kind = PatKind::Search;
                (String::new(), rest[1..].to_string())
            }
            Some('&') => {
                kind = PatKind::Subst;
                (String::new(), rest[1..].to_string())
            }
            _ => return Err(invalid(e::BACKSLASH)),
        }
    } else {
        let Some(delim) = arg.chars().next() else {
            return Err(invalid(e::GLOBAL_NOPAT));
        };
        if delim.is_ascii_alphanumeric() {
            return Err(invalid(e::REGEX_LETTERS));
        }
        let body = &arg[delim.len_utf8()..];
        let plen = skip_regexp(body, delim);
        let cmd = body[plen..].strip_prefix(delim).unwrap_or(&body[plen..]);
        (body[..plen].to_string(), cmd.to_string())
    };

    let (re, used) = st.search_regex(&pat, kind)?;
    if !pat.is_empty() {
        st.save_pattern(&used, PatKind::Search);
        st.save_pattern(&used, PatKind::Subst);
    }

    if st.global_busy > 0 {
        // inside another :global only the current line is used
        let lnum = st.cursor().lnum;
        if re.is_match(st.curbuf().get(lnum)) != invert {
            global_exe_one(st, &cmd, lnum);
        }
        return Ok(());
    }

    let mut ndone = 0;
    for lnum in ea.line1..=ea.line2 {
        if st.exc.got_int || st.host.interrupted() {
            st.exc.got_int = true;
            break;
        }
        if re.is_match(st.curbuf().get(lnum)) != invert {
            st.curbuf_mut().set_marked(lnum);
            ndone += 1;
        }
    }

    if st.exc.got_int {
        st.curbuf_mut().clear_marked();
        st.msg(e::INTERRUPTED);
        return Ok(());
    }
    if ndone == 0 {
        let text = if invert {
            format!("Pattern found in every line: {used}")
        } else {
            format!("Pattern not found: {used}")
        };
        st.msg(&text);
        return Ok(());
    }
    log::debug!("global: {ndone} lines marked for {cmd:?}");
    global_exe(st, &cmd);
    Ok(())
}

fn global_exe_one(st: &mut EditorState, cmd: &str, lnum: i64) {
    st.curwin_mut().cursor = Pos::new(lnum, 0);
    let cmd = if cmd.is_empty() || cmd == "\n" { "p" } else { cmd };
    let mut source = StrSource::default();
    // errors are reported by the commands themselves
    let _ = do_cmdline(st, Some(cmd), &mut source, RunFlags::NOWAIT);
}

/// Execute `cmd` on all marked lines until an error or interrupt.
fn global_exe(st: &mut EditorState, cmd: &str) {
    let old_count = st.line_count();
    st.global_busy = 1;
    st.search.sub_nsubs = 0;
    st.search.sub_nlines = 0;
    let fnum = st.curbuf_fnum();
    while !st.exc.got_int && st.global_busy == 1 {
        // the command may have switched buffers
        let Some(lnum) = st.bufs.get_mut(fnum).and_then(|b| b.take_first_marked()) else {
            break;
        };
        if st.curbuf_fnum() != fnum {
            break;
        }
        global_exe_one(st, cmd, lnum);
    }
    st.global_busy = 0;
    if let Some(b) = st.bufs.get_mut(fnum) {
        b.clear_marked();
    }
    st.check_cursors();
    if st.curbuf_fnum() == fnum {
        let lnum = st.cursor().lnum;
        st.cursor_to_line_start(lnum);
        let new_count = st.line_count();
        msgmore(st, new_count - old_count);
    }
    if st.search.sub_nsubs > 0 {
        do_sub_msg(st, false);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use crate::runner::do_cmdline_cmd;
    use test_log::test;

    fn state(text: &str) -> (EditorState, MemHost) {
        let host = MemHost::new();
        let mut st = EditorState::new(Box::new(host.clone()), false);
        st.curbuf_mut().load_text(text);
        (st, host)
    }

    fn run(st: &mut EditorState, cmd: &str) {
        do_cmdline_cmd(st, cmd).unwrap();
    }

    fn text(st: &EditorState) -> String {
        st.curbuf().text()
    }

    #[test]
    fn global_delete() {
        let (mut st, host) = state("a\nfoo\nb\nfoo\nc\n");
        run(&mut st, "1,$g/foo/d");
        assert_eq!(text(&st), "a\nb\nc\n");
        assert!(host.errors().is_empty());
        assert_eq!(st.global_busy, 0);
    }

    #[test]
    fn vglobal_and_bang() {
        let (mut st, _) = state("x1\ny\nx2\n");
        run(&mut st, "v/x/d");
        assert_eq!(text(&st), "x1\nx2\n");
        run(&mut st, "g!/1/s/x/z/");
        assert_eq!(text(&st), "x1\nz2\n");
    }

    #[test]
    fn global_default_command_prints() {
        let (mut st, host) = state("one\ntwo\nthree\n");
        run(&mut st, "g/o/");
        assert_eq!(host.output(), vec!["one", "two"]);
    }

    #[test]
    fn global_stops_at_error() {
        let (mut st, host) = state("a\na\na\n");
        run(&mut st, "g/a/nosuchcmd");
        assert_eq!(host.errors().len(), 1);
    }

    #[test]
    fn global_no_match_is_a_message() {
        let (mut st, host) = state("a\n");
        run(&mut st, "g/zzz/d");
        assert_eq!(host.output(), vec!["Pattern not found: zzz"]);
        assert!(host.errors().is_empty());
    }

    #[test]
    fn global_recursive_with_range() {
        let (mut st, host) = state("a\nb\n");
        run(&mut st, "g/a/1,1g/b/d");
        assert_eq!(host.errors(), vec![e::GLOBAL_RANGE]);
    }

    #[test]
    fn substitute_flags() {
        let (mut st, host) = state("aaa\nbab\n");
        run(&mut st, "%s/a/x/");
        assert_eq!(text(&st), "xaa\nbxb\n");
        run(&mut st, "%s/a/y/g");
        assert_eq!(text(&st), "xyy\nbxb\n");
        run(&mut st, "s/Q/z/e");
        assert!(host.errors().is_empty());
        run(&mut st, "s/Q/z/");
        assert_eq!(host.errors(), vec!["E486: Pattern not found: Q"]);
    }

    #[test]
    fn substitute_groups_and_case() {
        let (mut st, _) = state("hello world\n");
        run(&mut st, "s/\\(\\w\\+\\) \\(\\w\\+\\)/\\u\\2 \\U\\1/");
        assert_eq!(text(&st), "World HELLO\n");
        run(&mut st, "s/world/there/i");
        assert_eq!(text(&st), "there HELLO\n");
    }

    #[test]
    fn substitute_repeat_and_tilde() {
        let (mut st, _) = state("a a\na a\n");
        run(&mut st, "1s/a/b/g");
        run(&mut st, "2&&");
        assert_eq!(text(&st), "b b\nb b\n");
        let (mut st, _) = state("cat\ncat dog\n");
        run(&mut st, "1s/cat/dog/");
        run(&mut st, "2s/dog/~s/");
        assert_eq!(text(&st), "dog\ncat dogs\n");
    }

    #[test]
    fn substitute_line_break_and_count() {
        let (mut st, _) = state("a,b\nc,d\ne,f\n");
        run(&mut st, "s/,/\\r/");
        assert_eq!(text(&st), "a\nb\nc,d\ne,f\n");
        run(&mut st, "3s/,/-/ 2");
        assert_eq!(text(&st), "a\nb\nc-d\ne-f\n");
    }

    #[test]
    fn substitute_count_only() {
        let (mut st, host) = state("aa\nba\n");
        run(&mut st, "%s/a//gn");
        assert_eq!(text(&st), "aa\nba\n");
        assert_eq!(host.output(), vec!["3 matches on 2 lines"]);
    }

    #[test]
    fn substitute_expression() {
        let (mut st, _) = state("x 3\n");
        run(&mut st, "s/\\d/\\=submatch(0) * 2/");
        assert_eq!(text(&st), "x 6\n");
    }

    #[test]
    fn substitute_confirm() {
        let (mut st, host) = state("a a a\n");
        host.data.borrow_mut().answers.extend([true, false, true]);
        run(&mut st, "s/a/b/gc");
        assert_eq!(text(&st), "b a b\n");
    }

    #[test]
    fn substitute_in_skipped_block_finds_bar() {
        let (mut st, host) = state("a\n");
        run(&mut st, "if 0 | s/a/b/ | endif | echo 'ok'");
        assert_eq!(text(&st), "a\n");
        assert_eq!(host.output(), vec!["ok"]);
    }

    #[test]
    fn delete_yank_put() {
        let (mut st, _) = state("1\n2\n3\n4\n");
        run(&mut st, "2,3d x");
        assert_eq!(text(&st), "1\n4\n");
        assert_eq!(st.register_value('x').unwrap(), "2\n3\n");
        run(&mut st, "$put x");
        assert_eq!(text(&st), "1\n4\n2\n3\n");
        assert_eq!(st.cursor().lnum, 4);
        run(&mut st, "1y | 0put");
        assert_eq!(text(&st), "1\n1\n4\n2\n3\n");
        run(&mut st, "2d 2");
        assert_eq!(text(&st), "1\n2\n3\n");
    }

    #[test]
    fn put_expression_and_empty_register() {
        let (mut st, host) = state("a\n");
        run(&mut st, "put =['x', 'y']");
        assert_eq!(text(&st), "a\nx\ny\n");
        run(&mut st, "put q");
        assert_eq!(host.errors(), vec!["E353: Nothing in register q"]);
    }

    #[test]
    fn copy_and_move() {
        let (mut st, _) = state("a\nb\nc\n");
        run(&mut st, "1t$");
        assert_eq!(text(&st), "a\nb\nc\na\n");
        run(&mut st, "1,2m$");
        assert_eq!(text(&st), "c\na\na\nb\n");
        run(&mut st, "4m0");
        assert_eq!(text(&st), "b\nc\na\na\n");
        assert_eq!(st.cursor().lnum, 1);
    }

    #[test]
    fn move_into_itself() {
        let (mut st, host) = state("a\nb\nc\n");
        run(&mut st, "1,3m2");
        assert_eq!(host.errors(), vec![e::MOVE_INTO]);
    }

    #[test]
    fn move_keeps_marks() {
        let (mut st, _) = state("a\nb\nc\n");
        run(&mut st, "1mark x | 1m$");
        assert_eq!(st.curbuf().mark('x'), Some(Pos::new(3, 0)));
    }

    #[test]
    fn join_lines() {
        let (mut st, _) = state("a\n   b\n)c\nd\n");
        run(&mut st, "1,3j");
        assert_eq!(text(&st), "a b)c\nd\n");
        run(&mut st, "j!");
        assert_eq!(text(&st), "a b)cd\n");
    }

    #[test]
    fn shift_lines() {
        let (mut st, _) = state("a\n\n\tb\n");
        run(&mut st, "set sw=4 | 1,3>");
        assert_eq!(text(&st), "    a\n\n\t    b\n");
        run(&mut st, "3<<");
        assert_eq!(text(&st), "    a\n\n    b\n");
    }

    #[test]
    fn append_and_change() {
        let (mut st, _) = state("a\nb\n");
        let mut src = StrSource::new("1append\nx\ny\n.\n$insert\nz\n.");
        do_cmdline(&mut st, None, &mut src, RunFlags::VERBOSE | RunFlags::REPEAT).unwrap();
        assert_eq!(text(&st), "a\nx\ny\nz\nb\n");
        run(&mut st, "execute \"2,3change\\nnew\\n.\"");
        assert_eq!(text(&st), "a\nnew\nz\nb\n");
    }

    #[test]
    fn print_variants() {
        let (mut st, host) = state("a\tb\nc\n");
        run(&mut st, "1p | 1l | 2#");
        assert_eq!(host.output(), vec!["a       b", "a^Ib$", "  2 c"]);
        assert_eq!(st.cursor().lnum, 2);
        run(&mut st, "=");
        assert_eq!(host.output().last().map(String::as_str), Some("2"));
    }

    #[test]
    fn print_empty_buffer() {
        let (mut st, host) = state("");
        run(&mut st, "p");
        assert_eq!(host.errors(), vec![e::EMPTYBUF]);
    }

    #[test]
    fn undo_redo() {
        let (mut st, host) = state("a\n");
        run(&mut st, "s/a/b/");
        run(&mut st, "s/b/c/");
        run(&mut st, "undo");
        assert_eq!(text(&st), "b\n");
        run(&mut st, "undo 0");
        assert_eq!(text(&st), "a\n");
        run(&mut st, "redo");
        assert_eq!(text(&st), "b\n");
        run(&mut st, "undo | undo");
        assert_eq!(host.output().last().map(String::as_str), Some("Already at oldest change"));
    }

    #[test]
    fn mark_arguments() {
        let (mut st, host) = state("a\nb\n");
        run(&mut st, "2k q");
        assert_eq!(st.curbuf().mark('q'), Some(Pos::new(2, 0)));
        run(&mut st, "mark 1");
        assert_eq!(host.errors(), vec![e::INVMARK]);
    }

    #[test]
    fn report_more_lines() {
        let (mut st, host) = state("1\n2\n3\n4\n");
        run(&mut st, "1,3d");
        assert_eq!(host.output(), vec!["3 fewer lines"]);
    }
}
