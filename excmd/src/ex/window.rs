//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Buffer list, window, tab page, argument list and quickfix commands.

use crate::cmds::Cmd;
use crate::docmd::{check_nextcmd, CmdCtx, ExArgs};
use crate::error::{e, invalid, runtime, Error, Result};
use crate::ex::files::{buf_enter, check_changed, do_ecmd, readfile, switch_buffer};
use crate::options::Opt;
use crate::runner::do_cmdline_cmd;
use crate::state::EditorState;

fn compatible(st: &EditorState) -> bool {
    st.p_flag(Opt::Compatible)
}

fn no_such_buffer(n: i64) -> Error {
    runtime(format!("E86: Buffer {n} does not exist"))
}

/// Find the buffer for `pat`: `%` is the current buffer, `#` the
/// alternate one, else a unique buffer whose name matches.
pub fn buflist_findpat(st: &EditorState, pat: &str, unlisted: bool) -> Result<usize> {
    match pat {
        "%" => return Ok(st.curbuf_fnum()),
        "#" => return st.curwin().alt.ok_or_else(|| runtime(e::NOALT)),
        _ => {}
    }
    let wanted = |fnum: &usize| unlisted || st.bufs.get(*fnum).is_some_and(|b| b.listed);
    let matches: Vec<usize> = st
        .bufs
        .find_matching(pat)
        .into_iter()
        .filter(wanted)
        .collect();
    match matches.as_slice() {
        [one] => Ok(*one),
        [] => Err(runtime(format!("{} {pat}", e::NO_MATCHING_BUF))),
        _ => Err(runtime(format!("{} {pat}", e::MULTI_MATCH))),
    }
}

/// Buffer named `name`, created when there is none.
fn buflist_new(st: &mut EditorState, name: Option<&str>) -> usize {
    if let Some(fnum) = name.and_then(|n| st.bufs.find_by_name(n)) {
        return fnum;
    }
    let fnum = st.bufs.add(name.map(str::to_string));
    let compat = compatible(st);
    st.options.init_buf(fnum, compat);
    if name.is_some() {
        if let Some(b) = st.bufs.get_mut(fnum) {
            b.loaded = false;
        }
    }
    fnum
}

fn shown_count(st: &EditorState, fnum: usize) -> usize {
    st.layout.all_windows().filter(|w| w.buf == fnum).count()
}

/// Whether closing the last window on `fnum` would lose changes.
fn would_abandon(st: &EditorState, fnum: usize, forceit: bool) -> bool {
    !forceit && !st.p_flag(Opt::Hidden) && shown_count(st, fnum) <= 1 && st.buf_modified(fnum)
}

/// Make `fnum` the current buffer, loading it when needed.
fn goto_buffer(st: &mut EditorState, fnum: usize, forceit: bool) -> Result<()> {
    let cur = st.curbuf_fnum();
    if fnum == cur {
        return Ok(());
    }
    if st.bufs.get(fnum).is_none() {
        return Err(no_such_buffer(fnum as i64));
    }
    if would_abandon(st, cur, false) {
        check_changed(st, cur, forceit)?;
    }
    switch_buffer(st, fnum);
    let loaded = st.bufs.get(fnum).is_some_and(|b| b.loaded);
    if let Some(b) = st.bufs.get_mut(fnum) {
        b.listed = true;
    }
    if !loaded {
        readfile(st, fnum)?;
        st.cursor_to_line_start(1);
    }
    buf_enter(st);
    Ok(())
}

fn run_ecmd_cmd(st: &mut EditorState, ea: &ExArgs) -> Result<()> {
    if let Some(cmd) = &ea.do_ecmd_cmd {
        do_cmdline_cmd(st, cmd)?;
    }
    Ok(())
}

/// `:buffer N` and `:buffer name`
pub fn ex_buffer(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    if ea.addr_count == 0 && ea.arg_str().is_empty() {
        return run_ecmd_cmd(st, ea);
    }
    let fnum = usize::try_from(ea.line2).map_err(|_| no_such_buffer(ea.line2))?;
    goto_buffer(st, fnum, ea.forceit)?;
    run_ecmd_cmd(st, ea)
}

/// `:bnext [N]` and `:bprevious [N]` cycle through the listed buffers.
pub fn ex_bnext(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let listed = st.bufs.listed();
    if listed.is_empty() {
        return Err(runtime(e::NOMOREBUF));
    }
    let count = if ea.addr_count > 0 { ea.line2.max(1) } else { 1 } as usize;
    let cur = st.curbuf_fnum();
    let len = listed.len();
    let pos = listed.iter().position(|&f| f == cur);
    let idx = match (ea.cmd == Cmd::Bprevious, pos) {
        (false, Some(p)) => (p + count) % len,
        (false, None) => (count - 1) % len,
        (true, Some(p)) => (p + len - count % len) % len,
        (true, None) => (len - count % len) % len,
    };
    goto_buffer(st, listed[idx], ea.forceit)?;
    run_ecmd_cmd(st, ea)
}

/// `:bfirst`
pub fn ex_brewind(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let Some(&first) = st.bufs.listed().first() else {
        return Err(runtime(e::NOMOREBUF));
    };
    goto_buffer(st, first, ea.forceit)?;
    run_ecmd_cmd(st, ea)
}

/// `:blast`
pub fn ex_blast(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let Some(&last) = st.bufs.listed().last() else {
        return Err(runtime(e::NOMOREBUF));
    };
    goto_buffer(st, last, ea.forceit)?;
    run_ecmd_cmd(st, ea)
}

/// Buffers named by the range and the remaining arguments of
/// `:bdelete` and `:bwipeout`.
fn bufdel_targets(st: &EditorState, ea: &ExArgs) -> Result<Vec<usize>> {
    let mut targets = Vec::new();
    if ea.addr_count == 0 && ea.arg_str().is_empty() {
        targets.push(st.curbuf_fnum());
        return Ok(targets);
    }
    if ea.addr_count > 0 {
        let first = if ea.addr_count >= 2 { ea.line1 } else { ea.line2 };
        for n in first..=ea.line2 {
            if let Some(b) = usize::try_from(n).ok().and_then(|f| st.bufs.get(f)) {
                targets.push(b.fnum);
            } else if ea.addr_count == 1 {
                return Err(no_such_buffer(n));
            }
        }
    }
    let unlisted = ea.cmd == Cmd::Bwipeout;
    for word in ea.arg_str().split_whitespace() {
        let fnum = match word.parse::<usize>() {
            Ok(n) => st.bufs.get(n).map(|b| b.fnum).ok_or_else(|| no_such_buffer(n as i64))?,
            Err(_) => buflist_findpat(st, word, unlisted)?,
        };
        targets.push(fnum);
    }
    Ok(targets)
}

/// Remove buffer `fnum` from every window, showing another buffer there.
fn unshow_buffer(st: &mut EditorState, fnum: usize) {
    if shown_count(st, fnum) == 0 {
        return;
    }
    let other = st
        .bufs
        .listed()
        .into_iter()
        .find(|&f| f != fnum)
        .unwrap_or_else(|| buflist_new(st, None));
    let loaded = st.bufs.get(other).is_some_and(|b| b.loaded);
    let cur_shows = st.curbuf_fnum() == fnum;
    for win in st.layout.all_windows_mut() {
        if win.buf == fnum {
            win.buf = other;
            win.cursor = crate::buffer::Pos::new(1, 0);
        }
        if win.alt == Some(fnum) {
            win.alt = None;
        }
    }
    if !loaded {
        // errors reading the replacement leave it empty
        let _ = readfile(st, other);
    }
    st.check_cursors();
    if cur_shows {
        buf_enter(st);
    }
}

/// `:bdelete` unlists and unloads buffers, `:bwipeout` removes them.
pub fn ex_bunload(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let targets = bufdel_targets(st, ea)?;
    let wipe = ea.cmd == Cmd::Bwipeout;
    let mut done: i64 = 0;
    for fnum in targets {
        if st.buf_modified(fnum) && !ea.forceit {
            st.emsg(&format!(
                "E89: No write since last change for buffer {fnum} (add ! to override)"
            ));
            continue;
        }
        unshow_buffer(st, fnum);
        if wipe {
            st.bufs.remove(fnum);
            st.options.drop_buf(fnum);
        } else if let Some(b) = st.bufs.get_mut(fnum) {
            b.listed = false;
            b.loaded = false;
            b.load_text("");
            st.set_buf_modified(fnum, false);
        }
        done += 1;
    }
    if done == 0 {
        return Err(runtime(e::NO_BUF_DELETED));
    }
    if done > st.p_num(Opt::Report) {
        let what = if wipe { "wiped out" } else { "deleted" };
        let text = if done == 1 {
            format!("1 buffer {what}")
        } else {
            format!("{done} buffers {what}")
        };
        st.msg(&text);
    }
    Ok(())
}

/// `:ls`, `:buffers` and `:files`; with `!` unlisted buffers too.
pub fn ex_buflist(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let cur = st.curbuf_fnum();
    let alt = st.curwin().alt;
    let mut lines = Vec::new();
    for buf in st.bufs.iter() {
        if !buf.listed && !ea.forceit {
            continue;
        }
        let unlisted = if buf.listed { ' ' } else { 'u' };
        let which = if buf.fnum == cur {
            '%'
        } else if Some(buf.fnum) == alt {
            '#'
        } else {
            ' '
        };
        let active = match (buf.loaded, st.layout.buf_shown(buf.fnum)) {
            (true, true) => 'a',
            (true, false) => 'h',
            _ => ' ',
        };
        let modified = if st.buf_modified(buf.fnum) { '+' } else { ' ' };
        let name = buf.name.as_deref().unwrap_or("[No Name]");
        let mut line = format!(
            "{:>3}{unlisted}{which}{active} {modified} \"{name}\"",
            buf.fnum
        );
        let width = line.chars().count();
        line.push_str(&" ".repeat(40usize.saturating_sub(width).max(1)));
        let lnum = if buf.fnum == cur {
            st.cursor().lnum
        } else {
            buf.last_cursor.lnum
        };
        line.push_str(&format!("line {lnum}"));
        lines.push(line);
    }
    for line in lines {
        st.msg_list_line(&line);
    }
    Ok(())
}

/// Close window `idx` of the current tab page.
fn close_window(st: &mut EditorState, idx: usize, forceit: bool) -> Result<()> {
    if st.layout.win_count() <= 1 {
        return Err(runtime(e::LASTWIN));
    }
    let Some(win) = st.layout.tab().windows.get(idx).cloned() else {
        return Err(invalid(e::INVRANGE));
    };
    if would_abandon(st, win.buf, forceit) {
        return Err(runtime(e::NOWRITE));
    }
    let before = st.curbuf_fnum();
    if let Some(closed) = st.layout.close(idx) {
        st.options.drop_win(closed.id);
        if let Some(b) = st.bufs.get_mut(closed.buf) {
            b.last_cursor = closed.cursor;
        }
    }
    if st.curbuf_fnum() != before {
        buf_enter(st);
    }
    Ok(())
}

/// Index of the window a count names, the current one without a count.
fn window_index(st: &EditorState, ea: &ExArgs) -> usize {
    if ea.addr_count > 0 {
        let n = ea.line2.clamp(1, st.layout.win_count());
        (n - 1) as usize
    } else {
        st.layout.tab().cur
    }
}

/// `:close [N]`
pub fn ex_close(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let idx = window_index(st, ea);
    close_window(st, idx, ea.forceit)
}

/// `:only` closes every other window of the tab page.
pub fn ex_only(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let keep_idx = window_index(st, ea);
    only_window(st, keep_idx, ea.forceit)
}

/// Close all windows but `keep_idx`. Windows whose changes would be
/// lost stay open.
fn only_window(st: &mut EditorState, keep_idx: usize, forceit: bool) -> Result<()> {
    st.layout.tab_mut().cur = keep_idx;
    let keep = st.layout.win().id;
    let mut kept_changed = false;
    let mut idx = 0;
    while idx < st.layout.tab().windows.len() {
        let win = st.layout.tab().windows[idx].clone();
        if win.id == keep {
            idx += 1;
            continue;
        }
        if would_abandon(st, win.buf, forceit) {
            kept_changed = true;
            idx += 1;
            continue;
        }
        if let Some(closed) = st.layout.close(idx) {
            st.options.drop_win(closed.id);
        }
    }
    if let Some(cur) = st.layout.tab().windows.iter().position(|w| w.id == keep) {
        st.layout.tab_mut().cur = cur;
    }
    if kept_changed {
        return Err(runtime(e::OTHER_WIN_CHANGED));
    }
    Ok(())
}

/// `:split`, `:vsplit` and `:new`. Split windows share the layout
/// model, the direction is not kept.
pub fn ex_splitview(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let old_id = st.curwin().id;
    let arg = ea.arg_str().to_string();
    let new_empty = ea.cmd == Cmd::New && arg.is_empty();
    let buf = if new_empty {
        buflist_new(st, None)
    } else {
        st.curbuf_fnum()
    };
    let id = st.layout.split(buf, true);
    let compat = compatible(st);
    st.options.init_win(id, Some(old_id), compat);
    if new_empty {
        st.curwin_mut().alt = None;
        buf_enter(st);
    }
    if arg.is_empty() {
        return run_ecmd_cmd(st, ea);
    }
    do_ecmd(st, Some(&arg), ea.forceit, ea.do_ecmd_cmd.as_deref())
}

/// First modified buffer that no window shows.
fn hidden_changed_buffer(st: &EditorState) -> Option<usize> {
    st.bufs
        .iter()
        .map(|b| b.fnum)
        .find(|&f| st.buf_modified(f) && !st.layout.buf_shown(f))
}

/// Leave the editor when nothing would be lost.
fn check_exit(st: &EditorState, forceit: bool) -> Result<()> {
    if forceit {
        return Ok(());
    }
    if st.buf_modified(st.curbuf_fnum()) && !st.p_flag(Opt::Hidden) {
        return Err(runtime(e::NOWRITE));
    }
    let changed = st
        .bufs
        .iter()
        .map(|b| b.fnum)
        .find(|&f| st.buf_modified(f));
    if let Some(fnum) = changed.or_else(|| hidden_changed_buffer(st)) {
        let name = st
            .bufs
            .get(fnum)
            .and_then(|b| b.name.clone())
            .unwrap_or_else(|| "[No Name]".to_string());
        return Err(runtime(format!("{} \"{name}\"", e::NOWRITE_BUF)));
    }
    Ok(())
}

/// Close the current window; the last one ends the editor.
pub fn quit_window(st: &mut EditorState, forceit: bool) -> Result<()> {
    if st.layout.win_count() > 1 {
        let idx = st.layout.tab().cur;
        return close_window(st, idx, forceit);
    }
    if st.layout.tab_count() > 1 {
        let idx = st.layout.cur_tab;
        return close_tab(st, idx, forceit);
    }
    check_exit(st, forceit)?;
    log::debug!("last window closed");
    Err(Error::Exit(0))
}

/// `:quit [N]`
pub fn ex_quit(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    if ea.addr_count > 0 && st.layout.win_count() > 1 {
        let idx = window_index(st, ea);
        return close_window(st, idx, ea.forceit);
    }
    quit_window(st, ea.forceit)
}

/// `:qall`
pub fn ex_quit_all(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    if !ea.forceit {
        if let Some(fnum) = st.bufs.iter().map(|b| b.fnum).find(|&f| st.buf_modified(f)) {
            let name = st
                .bufs
                .get(fnum)
                .and_then(|b| b.name.clone())
                .unwrap_or_else(|| "[No Name]".to_string());
            return Err(runtime(format!("{} \"{name}\"", e::NOWRITE_BUF)));
        }
    }
    Err(Error::Exit(0))
}

/// `:cquit [N]` leaves with exit code N, 1 by default.
pub fn ex_cquit(_st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let code = if ea.addr_count > 0 { ea.line2 } else { 1 };
    Err(Error::Exit(i32::try_from(code).unwrap_or(1)))
}

/// Make window `idx` of the current tab page the current one.
fn goto_window(st: &mut EditorState, idx: usize) {
    let before = st.curbuf_fnum();
    let tab = st.layout.tab_mut();
    tab.cur = idx.min(tab.windows.len() - 1);
    if st.curbuf_fnum() != before {
        buf_enter(st);
    }
}

/// `:wincmd {c}`
pub fn ex_wincmd(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let arg = ea.arg_str().to_string();
    let mut chars = arg.chars();
    let Some(c) = chars.next() else {
        return Err(invalid(e::ARGREQ));
    };
    let rest = chars.as_str();
    match check_nextcmd(rest) {
        Some(next) => ea.nextcmd = Some(next),
        None if !rest.trim().is_empty() => return Err(invalid(e::INVARG)),
        None => {}
    }

    let count = if ea.addr_count > 0 { Some(ea.line2.max(0)) } else { None };
    let n = st.layout.win_count() as usize;
    let cur = st.layout.tab().cur;
    let step = count.unwrap_or(1) as usize;
    match c {
        'w' | 'W' if count.is_some() => goto_window(st, step.max(1) - 1),
        'w' => goto_window(st, (cur + 1) % n),
        'W' => goto_window(st, (cur + n - 1) % n),
        'j' | 'l' => goto_window(st, (cur + step).min(n - 1)),
        'k' | 'h' => goto_window(st, cur.saturating_sub(step)),
        't' => goto_window(st, 0),
        'b' => goto_window(st, n - 1),
        'c' => close_window(st, cur, false)?,
        'o' => only_window(st, cur, false)?,
        'q' => quit_window(st, false)?,
        's' | 'S' | 'v' | 'n' => {
            let cmd = if c == 'n' { "new" } else { "split" };
            do_cmdline_cmd(st, cmd)?;
        }
        _ => return Err(invalid(e::INVARG)),
    }
    Ok(())
}

/// Close tab page `idx`.
fn close_tab(st: &mut EditorState, idx: usize, forceit: bool) -> Result<()> {
    if st.layout.tab_count() <= 1 {
        return Err(runtime(e::LASTTAB));
    }
    let Some(tab) = st.layout.tabs.get(idx) else {
        return Err(invalid(e::INVRANGE));
    };
    for win in &tab.windows {
        let elsewhere = st.layout.all_windows().filter(|w| w.buf == win.buf).count()
            > tab.windows.iter().filter(|w| w.buf == win.buf).count();
        if !forceit && !elsewhere && !st.p_flag(Opt::Hidden) && st.buf_modified(win.buf) {
            return Err(runtime(e::NOWRITE));
        }
    }
    let before = st.curbuf_fnum();
    if let Some(tab) = st.layout.close_tab(idx) {
        for win in tab.windows {
            st.options.drop_win(win.id);
        }
    }
    if st.curbuf_fnum() != before {
        buf_enter(st);
    }
    Ok(())
}

/// `:tabnew [file]` opens a tab page after the current one or after
/// tab page N.
pub fn ex_tabnew(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let after = if ea.addr_count > 0 {
        ea.line2.clamp(0, st.layout.tab_count()) as usize
    } else {
        st.layout.cur_tab + 1
    };
    let arg = ea.arg_str().to_string();
    let name = (!arg.is_empty()).then_some(arg.as_str());
    let fnum = buflist_new(st, name);
    let old_id = st.curwin().id;
    let id = st.layout.new_tab(fnum, after);
    let compat = compatible(st);
    st.options.init_win(id, Some(old_id), compat);
    let loaded = st.bufs.get(fnum).is_some_and(|b| b.loaded);
    if let Some(b) = st.bufs.get_mut(fnum) {
        b.listed = true;
    }
    if !loaded {
        readfile(st, fnum)?;
        st.cursor_to_line_start(1);
    }
    buf_enter(st);
    run_ecmd_cmd(st, ea)
}

/// Tab page number from a `:tabclose` or `:tabnext` argument: `N`,
/// `+N`, `-N` or `$`.
fn tab_arg(st: &EditorState, arg: &str) -> Result<Option<i64>> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Ok(None);
    }
    let cur = st.layout.tab_nr();
    let parse = |s: &str| -> Result<i64> {
        if s.is_empty() {
            return Ok(1);
        }
        s.parse::<i64>().map_err(|_| invalid(format!("{}: {arg}", e::INVARG)))
    };
    let n = if arg == "$" {
        st.layout.tab_count()
    } else if let Some(rel) = arg.strip_prefix('+') {
        cur + parse(rel)?
    } else if let Some(rel) = arg.strip_prefix('-') {
        cur - parse(rel)?
    } else {
        parse(arg)?
    };
    if n < 1 || n > st.layout.tab_count() {
        return Err(invalid(format!("{}: {arg}", e::INVARG)));
    }
    Ok(Some(n))
}

/// `:tabclose [N]`
pub fn ex_tabclose(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let n = match tab_arg(st, ea.arg_str())? {
        Some(n) => n,
        None if ea.addr_count > 0 => ea.line2.max(1),
        None => st.layout.tab_nr(),
    };
    close_tab(st, (n - 1) as usize, ea.forceit)
}

fn goto_tab(st: &mut EditorState, idx: usize) {
    let before = st.curbuf_fnum();
    st.layout.cur_tab = idx.min(st.layout.tabs.len() - 1);
    if st.curbuf_fnum() != before {
        buf_enter(st);
    }
}

/// `:tabnext [N]` goes to tab page N; `:tabprevious [N]` goes N back.
pub fn ex_tabnext(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let count = st.layout.tab_count() as usize;
    let cur = st.layout.cur_tab;
    if ea.cmd == Cmd::Tabprevious {
        let n = match ea.arg_str().trim() {
            "" if ea.addr_count > 0 => ea.line2.max(1) as usize,
            "" => 1,
            s => s
                .parse::<usize>()
                .map_err(|_| invalid(format!("{}: {s}", e::INVARG)))?,
        };
        goto_tab(st, (cur + count - n % count) % count);
        return Ok(());
    }
    let target = match tab_arg(st, ea.arg_str())? {
        Some(n) => (n - 1) as usize,
        None if ea.addr_count > 0 => (ea.line2.clamp(1, count as i64) - 1) as usize,
        None => (cur + 1) % count,
    };
    goto_tab(st, target);
    Ok(())
}

/// File names of an argument list, split at unescaped blanks.
fn split_file_args(arg: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut chars = arg.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(n) = chars.next() {
                    cur.push(n);
                }
            }
            ' ' | '\t' => {
                if !cur.is_empty() {
                    out.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// Edit argument `idx` of the argument list.
fn do_argfile(st: &mut EditorState, ea: &ExArgs, idx: i64) -> Result<()> {
    let len = st.layout.args.len() as i64;
    if idx < 0 || idx >= len {
        return Err(runtime(if len <= 1 {
            e::ONLY_ONE_FILE
        } else if idx < 0 {
            e::ARGFIRST
        } else {
            e::ARGLAST
        }));
    }
    let name = st.layout.args[idx as usize].clone();
    do_ecmd(st, Some(&name), ea.forceit, ea.do_ecmd_cmd.as_deref())?;
    st.layout.arg_idx = idx as usize;
    Ok(())
}

/// `:args` lists the argument list, `:args files` replaces it and edits
/// the first file.
pub fn ex_args(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let arg = ea.arg_str().to_string();
    if arg.is_empty() {
        let shown: Vec<String> = st
            .layout
            .args
            .iter()
            .enumerate()
            .map(|(i, a)| {
                if i == st.layout.arg_idx {
                    format!("[{a}]")
                } else {
                    a.clone()
                }
            })
            .collect();
        if !shown.is_empty() {
            st.msg(&shown.join(" "));
        }
        return Ok(());
    }
    st.layout.args = split_file_args(&arg);
    st.layout.arg_idx = 0;
    do_argfile(st, ea, 0)
}

/// `:next [N]` or `:next files`
pub fn ex_next(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    if !ea.arg_str().is_empty() {
        return ex_args(st, ea, ctx);
    }
    let n = if ea.addr_count > 0 { ea.line2 } else { 1 };
    let idx = st.layout.arg_idx as i64 + n;
    do_argfile(st, ea, idx)
}

/// `:previous [N]` and `:Next [N]`
pub fn ex_previous(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let n = if ea.addr_count > 0 { ea.line2 } else { 1 };
    let idx = st.layout.arg_idx as i64 - n;
    do_argfile(st, ea, idx)
}

/// `:rewind` and `:first`
pub fn ex_rewind(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    do_argfile(st, ea, 0)
}

pub fn ex_last(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let last = st.layout.args.len() as i64 - 1;
    do_argfile(st, ea, last)
}

/// `:argument [N]`
pub fn ex_argument(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let idx = if ea.addr_count > 0 {
        ea.line2 - 1
    } else {
        st.layout.arg_idx as i64
    };
    do_argfile(st, ea, idx)
}

/// Go to quickfix entry `idx`, or the nearest valid one after it.
fn qf_jump(st: &mut EditorState, idx: usize, forceit: bool) -> Result<()> {
    let qf = &st.layout.qf;
    if qf.is_empty() || qf.iter().all(|e| !e.valid) {
        return Err(runtime(e::NOERRORS));
    }
    let start = idx.min(qf.len() - 1);
    let Some(idx) = (start..qf.len())
        .chain((0..start).rev())
        .find(|&i| qf[i].valid)
    else {
        return Err(runtime(e::NOERRORS));
    };
    let entry = qf[idx].clone();
    let total = qf.len();
    st.layout.qf_idx = idx;
    if st.curbuf().name.as_deref() != Some(entry.fname.as_str()) {
        do_ecmd(st, Some(&entry.fname), forceit, None)?;
    }
    st.cursor_to_line_start(entry.lnum);
    st.msg(&format!("({} of {total}): {}", idx + 1, entry.text));
    Ok(())
}

/// `:cc [N]`, `:cfirst [N]` and `:clast [N]`
pub fn ex_cc(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let len = st.layout.qf.len();
    if len == 0 {
        return Err(runtime(e::NOERRORS));
    }
    let nr = match ea.cmd {
        Cmd::Cfirst if ea.addr_count == 0 => 1,
        Cmd::Clast if ea.addr_count == 0 => len as i64,
        Cmd::Cc if ea.addr_count == 0 => st.layout.qf_idx as i64 + 1,
        _ => ea.line2,
    };
    let idx = (nr.clamp(1, len as i64) - 1) as usize;
    qf_jump(st, idx, ea.forceit)
}

/// `:cnext [N]` and `:cprevious [N]` move over valid entries.
pub fn ex_cnext(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let valid: Vec<usize> = st
        .layout
        .qf
        .iter()
        .enumerate()
        .filter(|(_, e)| e.valid)
        .map(|(i, _)| i)
        .collect();
    if valid.is_empty() {
        return Err(runtime(e::NOERRORS));
    }
    let count = if ea.addr_count > 0 { ea.line2.max(1) } else { 1 } as usize;
    let cur = st.layout.qf_idx;
    let target = if ea.cmd == Cmd::Cprevious {
        let before: Vec<usize> = valid.iter().copied().filter(|&i| i < cur).collect();
        before.len().checked_sub(count).map(|k| before[k])
    } else {
        let after: Vec<usize> = valid.iter().copied().filter(|&i| i > cur).collect();
        after.get(count - 1).copied()
    };
    match target {
        Some(idx) => qf_jump(st, idx, ea.forceit),
        None => Err(runtime(e::NO_MORE_ITEMS)),
    }
}

/// `:cdo {cmd}` runs the command at each valid entry in the range.
pub fn ex_cdo(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let cmd = ea.arg_str().to_string();
    let valid: Vec<usize> = st
        .layout
        .qf
        .iter()
        .enumerate()
        .filter(|(_, e)| e.valid)
        .map(|(i, _)| i)
        .collect();
    if valid.is_empty() {
        return Err(runtime(e::NOERRORS));
    }
    let first = ea.line1.max(1) as usize;
    let last = (ea.line2.max(0) as usize).min(valid.len());
    for n in first..=last {
        qf_jump(st, valid[n - 1], ea.forceit)?;
        do_cmdline_cmd(st, &cmd)?;
        if st.aborting() || st.exiting.is_some() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn state(host: &MemHost) -> EditorState {
        EditorState::new(Box::new(host.clone()), false)
    }

    fn run(st: &mut EditorState, cmd: &str) {
        do_cmdline_cmd(st, cmd).unwrap();
    }

    fn three_files() -> MemHost {
        MemHost::new()
            .with_file("a.txt", "a1\na2\n")
            .with_file("b.txt", "b1\n")
            .with_file("c.txt", "c1\nc2\nc3\n")
    }

    fn curname(st: &EditorState) -> String {
        st.curbuf().name.clone().unwrap_or_default()
    }

    #[test]
    fn find_buffer_by_pattern() {
        let host = three_files();
        let mut st = state(&host);
        run(&mut st, "e a.txt | e b.txt");
        assert_eq!(buflist_findpat(&st, "a.t", false).unwrap(), 2);
        assert_eq!(buflist_findpat(&st, "%", false).unwrap(), 3);
        assert_eq!(buflist_findpat(&st, "#", false).unwrap(), 2);
        let err = buflist_findpat(&st, ".txt", false).unwrap_err();
        assert_eq!(err.message(), "E93: More than one match for .txt");
        let err = buflist_findpat(&st, "zzz", false).unwrap_err();
        assert_eq!(err.message(), "E94: No matching buffer for zzz");
    }

    #[test]
    fn buffer_switching() {
        let host = three_files();
        let mut st = state(&host);
        run(&mut st, "e a.txt | e b.txt | e c.txt");
        run(&mut st, "buffer a.txt");
        assert_eq!(curname(&st), "a.txt");
        run(&mut st, "bnext");
        assert_eq!(curname(&st), "b.txt");
        run(&mut st, "bprevious 2");
        assert_eq!(st.curbuf_fnum(), 1);
        run(&mut st, "blast");
        assert_eq!(curname(&st), "c.txt");
        run(&mut st, "bfirst");
        assert_eq!(st.curbuf_fnum(), 1);
        run(&mut st, "3buffer");
        assert_eq!(curname(&st), "b.txt");
    }

    #[test]
    fn buffer_switch_keeps_changes_safe() {
        let host = three_files();
        let mut st = state(&host);
        run(&mut st, "e a.txt | e b.txt | s/b/x/");
        run(&mut st, "buffer a.txt");
        assert_eq!(host.errors(), vec![e::NOWRITE]);
        run(&mut st, "set hidden | buffer a.txt");
        assert_eq!(curname(&st), "a.txt");
        assert!(st.buf_modified(3));
    }

    #[test]
    fn list_buffers() {
        let host = three_files();
        let mut st = state(&host);
        run(&mut st, "e a.txt | e b.txt");
        host.data.borrow_mut().output.clear();
        run(&mut st, "ls");
        assert_eq!(
            host.output(),
            vec![
                format!("{:<40}line 1", "  1  h   \"[No Name]\""),
                format!("{:<40}line 1", "  2 #h   \"a.txt\""),
                format!("{:<40}line 1", "  3 %a   \"b.txt\""),
            ]
        );
    }

    #[test]
    fn delete_and_wipe_buffers() {
        let host = three_files();
        let mut st = state(&host);
        run(&mut st, "e a.txt | e b.txt | e c.txt");
        run(&mut st, "bdelete a.txt");
        assert!(!st.bufs.get(2).unwrap().listed);
        run(&mut st, "bwipeout");
        assert!(st.bufs.get(4).is_none());
        assert_ne!(st.curbuf_fnum(), 4);
        run(&mut st, "bdelete 99");
        assert_eq!(host.errors(), vec!["E86: Buffer 99 does not exist"]);
    }

    #[test]
    fn split_close_only() {
        let host = three_files();
        let mut st = state(&host);
        run(&mut st, "split a.txt | vsplit b.txt | new");
        assert_eq!(st.layout.win_count(), 4);
        assert!(st.curbuf().name.is_none());
        run(&mut st, "close");
        assert_eq!(st.layout.win_count(), 3);
        assert_eq!(curname(&st), "b.txt");
        run(&mut st, "only");
        assert_eq!(st.layout.win_count(), 1);
        run(&mut st, "close");
        assert_eq!(host.errors(), vec![e::LASTWIN]);
    }

    #[test]
    fn wincmd_moves() {
        let host = three_files();
        let mut st = state(&host);
        run(&mut st, "split a.txt | split b.txt");
        assert_eq!(st.layout.win_nr(), 1);
        run(&mut st, "wincmd j");
        assert_eq!(st.layout.win_nr(), 2);
        run(&mut st, "wincmd b | wincmd W");
        assert_eq!(st.layout.win_nr(), 2);
        run(&mut st, "1wincmd w");
        assert_eq!(curname(&st), "b.txt");
        run(&mut st, "wincmd o");
        assert_eq!(st.layout.win_count(), 1);
        run(&mut st, "wincmd x");
        assert_eq!(host.errors().len(), 1);
    }

    #[test]
    fn quit_closes_then_exits() {
        let host = MemHost::new();
        let mut st = state(&host);
        run(&mut st, "split");
        run(&mut st, "quit");
        assert_eq!(st.layout.win_count(), 1);
        assert_eq!(st.exiting, None);
        run(&mut st, "s/^/x/ | quit");
        assert_eq!(host.errors(), vec![e::NOWRITE]);
        assert_eq!(st.exiting, None);
        run(&mut st, "quit!");
        assert_eq!(st.exiting, Some(0));
    }

    #[test]
    fn qall_checks_every_buffer() {
        let host = three_files();
        let mut st = state(&host);
        run(&mut st, "e a.txt | s/a/z/ | set hidden | e b.txt | qall");
        assert_eq!(host.errors(), vec!["E162: No write since last change for buffer \"a.txt\""]);
        run(&mut st, "qall!");
        assert_eq!(st.exiting, Some(0));
    }

    #[test]
    fn cquit_code() {
        let host = MemHost::new();
        let mut st = state(&host);
        run(&mut st, "cquit 4");
        assert_eq!(st.exiting, Some(4));
        let mut st = state(&host);
        run(&mut st, "cquit");
        assert_eq!(st.exiting, Some(1));
    }

    #[test]
    fn tab_pages() {
        let host = three_files();
        let mut st = state(&host);
        run(&mut st, "tabnew a.txt | tabnew b.txt");
        assert_eq!(st.layout.tab_count(), 3);
        assert_eq!(st.layout.tab_nr(), 3);
        run(&mut st, "tabnext");
        assert_eq!(st.layout.tab_nr(), 1);
        run(&mut st, "tabprevious");
        assert_eq!(curname(&st), "b.txt");
        run(&mut st, "tabnext 2");
        assert_eq!(curname(&st), "a.txt");
        run(&mut st, "tabclose");
        assert_eq!(st.layout.tab_count(), 2);
        run(&mut st, "tabclose $ | tabclose");
        assert_eq!(host.errors(), vec![e::LASTTAB]);
    }

    #[test]
    fn argument_list() {
        let host = three_files();
        let mut st = state(&host);
        run(&mut st, "args a.txt b.txt c.txt");
        assert_eq!(curname(&st), "a.txt");
        run(&mut st, "next");
        assert_eq!(curname(&st), "b.txt");
        host.data.borrow_mut().output.clear();
        run(&mut st, "args");
        assert_eq!(host.output(), vec!["a.txt [b.txt] c.txt"]);
        run(&mut st, "last | previous 2");
        assert_eq!(curname(&st), "a.txt");
        run(&mut st, "previous");
        assert_eq!(host.errors(), vec![e::ARGFIRST]);
        run(&mut st, "2argument");
        assert_eq!(curname(&st), "b.txt");
        run(&mut st, "rewind");
        assert_eq!(st.layout.arg_idx, 0);
    }

    #[test]
    fn quickfix_navigation() {
        let host = three_files();
        let mut st = state(&host);
        run(
            &mut st,
            "call setqflist(['a.txt:2:first', 'junk', 'c.txt:3:second', 'c.txt:1:third'])",
        );
        run(&mut st, "cc");
        assert_eq!((curname(&st), st.cursor().lnum), ("a.txt".to_string(), 2));
        run(&mut st, "cnext");
        assert_eq!((curname(&st), st.cursor().lnum), ("c.txt".to_string(), 3));
        assert_eq!(host.output().last().map(String::as_str), Some("(3 of 4): second"));
        run(&mut st, "cnext | cnext");
        assert_eq!(host.errors(), vec![e::NO_MORE_ITEMS]);
        run(&mut st, "cprevious 2");
        assert_eq!(curname(&st), "a.txt");
        run(&mut st, "clast");
        assert_eq!(st.cursor().lnum, 1);
    }

    #[test]
    fn cdo_runs_at_each_entry() {
        let host = MemHost::new().with_file("x.txt", "foo\nbar\nfoo\n");
        let mut st = state(&host);
        run(&mut st, "set hidden");
        run(&mut st, "call setqflist(['x.txt:1:a', 'x.txt:3:b'])");
        run(&mut st, "cdo s/foo/baz/");
        assert_eq!(st.curbuf().text(), "baz\nbar\nbaz\n");
    }

    #[test]
    fn empty_quickfix() {
        let host = MemHost::new();
        let mut st = state(&host);
        run(&mut st, "cc");
        run(&mut st, "2cc");
        // the command is not appended to a runtime error
        assert_eq!(host.errors(), vec![e::NOERRORS, e::NOERRORS]);
    }

    #[test]
    fn split_file_names() {
        assert_eq!(split_file_args("a b\\ c  d"), vec!["a", "b c", "d"]);
    }
}
