//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! File commands: `:edit`, `:enew`, `:read`, `:write`, `:update`,
//! `:wall`, `:wq`, `:xit`, `:file` and `:!`.

use crate::autocmd::{apply_autocmds, Event};
use crate::buffer::Pos;
use crate::cmds::Cmd;
use crate::docmd::{CmdCtx, ExArgs};
use crate::error::{e, invalid, runtime, Result};
use crate::modeline::do_modelines;
use crate::options::{Opt, OptCtx, OptVal};
use crate::runner::do_cmdline_cmd;
use crate::state::EditorState;

/// "3L, 12B" or "3 lines, 12 bytes", following the `l` flag of
/// 'shortmess'.
fn line_byte_counts(st: &EditorState, lines: usize, bytes: usize) -> String {
    if st.p_str(Opt::Shortmess).contains('l') {
        return format!("{lines}L, {bytes}B");
    }
    let l = if lines == 1 { "line" } else { "lines" };
    let b = if bytes == 1 { "byte" } else { "bytes" };
    format!("{lines} {l}, {bytes} {b}")
}

fn new_file_tag(st: &EditorState) -> &'static str {
    if st.p_str(Opt::Shortmess).contains('n') {
        "[New]"
    } else {
        "[New File]"
    }
}

fn count_lines(text: &str) -> usize {
    text.lines().count()
}

fn compatible(st: &EditorState) -> bool {
    st.p_flag(Opt::Compatible)
}

/// Shell commands are refused in the sandbox and from a modeline.
pub fn check_shell_allowed(st: &EditorState) -> Result<()> {
    if st.sandbox > 0 {
        return Err(runtime(e::SANDBOX));
    }
    if st.secure > 0 {
        return Err(runtime(e::NOT_ALLOWED));
    }
    Ok(())
}

/// Run `cmd` with 'shell' and 'shellcmdflag'.
pub fn call_shell(st: &mut EditorState, cmd: &str, input: Option<&str>) -> Result<(String, i32)> {
    check_shell_allowed(st)?;
    let shell = st.p_str(Opt::Shell);
    let flag = st.p_str(Opt::Shellcmdflag);
    log::debug!("running {cmd:?} with {shell}");
    Ok(st.host.shell(&shell, &flag, cmd, input)?)
}

/// Whether buffer `fnum` may be abandoned. With 'autowrite' a named
/// buffer is written first.
pub fn check_changed(st: &mut EditorState, fnum: usize, forceit: bool) -> Result<()> {
    if forceit || !st.buf_modified(fnum) {
        return Ok(());
    }
    let named = st.bufs.get(fnum).is_some_and(|b| b.name.is_some());
    if st.p_flag(Opt::Autowrite) && named {
        return write_whole_buffer(st, fnum);
    }
    Err(runtime(e::NOWRITE))
}

/// Load the file of buffer `fnum` into it.
pub(crate) fn readfile(st: &mut EditorState, fnum: usize) -> Result<()> {
    let Some(name) = st.bufs.get(fnum).and_then(|b| b.name.clone()) else {
        if let Some(b) = st.bufs.get_mut(fnum) {
            b.load_text("");
        }
        return Ok(());
    };
    let quiet = st.p_str(Opt::Shortmess).contains('F');
    if st.host.file_exists(&name) {
        let text = st.host.read_file(&name)?;
        let info = line_byte_counts(st, count_lines(&text), text.len());
        if let Some(b) = st.bufs.get_mut(fnum) {
            b.load_text(&text);
            b.loaded = true;
        }
        st.set_buf_modified(fnum, false);
        if !quiet {
            st.msg(&format!("\"{name}\" {info}"));
        }
        apply_autocmds(st, Event::BufRead, &name, Some(fnum));
    } else {
        if let Some(b) = st.bufs.get_mut(fnum) {
            b.load_text("");
            b.loaded = true;
        }
        st.set_buf_modified(fnum, false);
        if !quiet {
            let tag = new_file_tag(st);
            st.msg(&format!("\"{name}\" {tag}"));
        }
        apply_autocmds(st, Event::BufNewFile, &name, Some(fnum));
    }
    Ok(())
}

/// Show buffer `fnum` in the current window. The BufEnter event is left
/// to the caller, to fire once the buffer is loaded.
pub(crate) fn switch_buffer(st: &mut EditorState, fnum: usize) {
    let old = st.curbuf_fnum();
    if old != fnum {
        let old_name = st.curbuf().name.clone().unwrap_or_default();
        apply_autocmds(st, Event::BufLeave, &old_name, Some(old));
        let cursor = st.cursor();
        if let Some(b) = st.bufs.get_mut(old) {
            b.last_cursor = cursor;
        }
        let win = st.curwin_mut();
        win.alt = Some(old);
        win.buf = fnum;
    }
    let cursor = st
        .bufs
        .get(fnum)
        .map_or(Pos::new(1, 0), |b| b.last_cursor);
    st.curwin_mut().cursor = cursor;
    st.check_cursors();
}

pub(crate) fn buf_enter(st: &mut EditorState) {
    let fnum = st.curbuf_fnum();
    let name = st.curbuf().name.clone().unwrap_or_default();
    apply_autocmds(st, Event::BufEnter, &name, Some(fnum));
}

/// Edit file `fname` in the current window; `None` re-edits the current
/// file. `command` runs once the file is loaded.
pub fn do_ecmd(
    st: &mut EditorState,
    fname: Option<&str>,
    forceit: bool,
    command: Option<&str>,
) -> Result<()> {
    let cur = st.curbuf_fnum();
    let same = match fname {
        None => true,
        Some(name) => st.curbuf().name.as_deref() == Some(name),
    };

    if same {
        if st.curbuf().name.is_none() {
            return Err(runtime(e::NOFILENAME));
        }
        if st.buf_modified(cur) && !forceit {
            return Err(runtime(e::NOWRITE));
        }
        let lnum = st.cursor().lnum;
        readfile(st, cur)?;
        st.set_cursor_line(lnum);
    } else {
        let name = fname.unwrap_or_default().to_string();
        let shown_elsewhere = st
            .layout
            .all_windows()
            .filter(|w| w.buf == cur)
            .count()
            > 1;
        if !st.p_flag(Opt::Hidden) && !shown_elsewhere {
            check_changed(st, cur, forceit)?;
        }
        let fnum = match st.bufs.find_by_name(&name) {
            Some(fnum) => fnum,
            None => {
                let fnum = st.bufs.add(Some(name.clone()));
                let compat = compatible(st);
                st.options.init_buf(fnum, compat);
                if let Some(b) = st.bufs.get_mut(fnum) {
                    b.loaded = false;
                }
                fnum
            }
        };
        let loaded = st.bufs.get(fnum).is_some_and(|b| b.loaded);
        if let Some(b) = st.bufs.get_mut(fnum) {
            b.listed = true;
        }
        // abandoning changes with ! drops them
        if forceit && st.buf_modified(cur) && !st.p_flag(Opt::Hidden) && !shown_elsewhere {
            if let Some(b) = st.bufs.get_mut(cur) {
                b.loaded = false;
            }
            st.set_buf_modified(cur, false);
        }
        switch_buffer(st, fnum);
        if !loaded {
            readfile(st, fnum)?;
            st.cursor_to_line_start(1);
        }
        buf_enter(st);
    }

    do_modelines(st);
    if let Some(cmd) = command {
        do_cmdline_cmd(st, cmd)?;
    }
    Ok(())
}

/// Apply `++ff` and `++bin` to the current buffer.
fn apply_file_opts(st: &mut EditorState, ea: &ExArgs) {
    let ctx = st.opt_ctx();
    if let Some(ff) = &ea.force_ff {
        st.options
            .set_local(Opt::Fileformat, ctx, Some(OptVal::Str(ff.clone())));
    }
    if let Some(bin) = ea.force_bin {
        st.options.set_local(Opt::Binary, ctx, Some(OptVal::Bool(bin)));
    }
}

/// `:edit [file]` and `:enew`
pub fn ex_edit(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    if ea.cmd == Cmd::Enew {
        let cur = st.curbuf_fnum();
        if !st.p_flag(Opt::Hidden) {
            check_changed(st, cur, ea.forceit)?;
        }
        let fnum = st.bufs.add(None);
        let compat = compatible(st);
        st.options.init_buf(fnum, compat);
        switch_buffer(st, fnum);
        buf_enter(st);
        return Ok(());
    }
    let arg = ea.arg_str().to_string();
    let fname = (!arg.is_empty()).then_some(arg.as_str());
    do_ecmd(st, fname, ea.forceit, ea.do_ecmd_cmd.as_deref())?;
    apply_file_opts(st, ea);
    Ok(())
}

/// Text of `line1..=line2` of buffer `fnum` as it goes into a file.
fn buffer_text(st: &EditorState, fnum: usize, line1: i64, line2: i64) -> String {
    let Some(buf) = st.bufs.get(fnum) else {
        return String::new();
    };
    if buf.is_empty() {
        return String::new();
    }
    let mut text = buf.lines(line1, line2).join("\n");
    text.push('\n');
    text
}

/// Write `line1..=line2` of buffer `fnum` to `fname`.
fn buf_write(
    st: &mut EditorState,
    fnum: usize,
    fname: &str,
    range: (i64, i64),
    append: bool,
    forceit: bool,
) -> Result<()> {
    if !st.p_flag(Opt::Write) {
        return Err(runtime(e::WRITE_DISABLED));
    }
    let ctx = OptCtx {
        buf: fnum,
        win: st.curwin().id,
    };
    let buf_name = st.bufs.get(fnum).and_then(|b| b.name.clone());
    let own_file = buf_name.as_deref() == Some(fname);
    if own_file && st.options.flag(Opt::Readonly, ctx) && !forceit {
        return Err(runtime(e::READONLY));
    }
    let exists = st.host.file_exists(fname);
    if exists && !own_file && !append && !forceit && !st.p_flag(Opt::Writeany) {
        return Err(runtime(e::FILE_EXISTS));
    }

    let whole = st
        .bufs
        .get(fnum)
        .is_some_and(|b| range.0 <= 1 && range.1 >= b.line_count());
    apply_autocmds(st, Event::BufWritePre, fname, Some(fnum));
    let text = buffer_text(st, fnum, range.0, range.1);
    if let Err(err) = st.host.write_file(fname, &text, append) {
        log::debug!("writing {fname} failed: {err}");
        return Err(runtime(e::CANT_WRITE));
    }
    if whole && own_file && !append {
        st.set_buf_modified(fnum, false);
    }
    apply_autocmds(st, Event::BufWritePost, fname, Some(fnum));

    let mut info = format!("\"{fname}\" ");
    if !exists {
        info.push_str(new_file_tag(st));
        info.push(' ');
    }
    info.push_str(&line_byte_counts(st, count_lines(&text), text.len()));
    info.push_str(if append { " appended" } else { " written" });
    st.msg(&info);
    Ok(())
}

fn write_whole_buffer(st: &mut EditorState, fnum: usize) -> Result<()> {
    let Some(buf) = st.bufs.get(fnum) else {
        return Err(runtime(e::NOBUF));
    };
    let Some(name) = buf.name.clone() else {
        return Err(runtime(format!("{} {fnum}", e::NONAME_BUF)));
    };
    let count = buf.line_count();
    buf_write(st, fnum, &name, (1, count), false, false)
}

/// `:write`, `:update`, `:w >> file` and `:w !cmd`
pub fn ex_write(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    if ea.usefilter {
        let cmd = ea.arg_str().to_string();
        let fnum = st.curbuf_fnum();
        let input = buffer_text(st, fnum, ea.line1, ea.line2);
        let (output, code) = call_shell(st, &cmd, Some(&input))?;
        for line in output.lines() {
            st.msg(line);
        }
        if code != 0 {
            st.msg(&format!("shell returned {code}"));
        }
        return Ok(());
    }

    let fnum = st.curbuf_fnum();
    if ea.cmd == Cmd::Update && !st.buf_modified(fnum) {
        return Ok(());
    }
    do_write(st, ea)
}

fn do_write(st: &mut EditorState, ea: &ExArgs) -> Result<()> {
    let fnum = st.curbuf_fnum();
    let arg = ea.arg_str().to_string();
    let fname = if arg.is_empty() {
        match st.curbuf().name.clone() {
            Some(name) => name,
            None => return Err(runtime(e::NOFILENAME)),
        }
    } else {
        // an unnamed buffer takes the name it is written to
        if st.curbuf().name.is_none() && st.cpo_has('F') && !ea.append {
            st.curbuf_mut().name = Some(arg.clone());
        }
        arg
    };
    buf_write(st, fnum, &fname, (ea.line1, ea.line2), ea.append, ea.forceit)
}

/// `:wall` writes every changed buffer.
pub fn ex_wall(st: &mut EditorState, _ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let changed: Vec<usize> = st
        .bufs
        .iter()
        .map(|b| b.fnum)
        .filter(|&f| st.buf_modified(f))
        .collect();
    let mut failed = None;
    for fnum in changed {
        if let Err(err) = write_whole_buffer(st, fnum) {
            st.emsg(&err.message());
            failed = Some(err);
        }
    }
    match failed {
        Some(_) => Err(crate::error::Error::Aborted),
        None => Ok(()),
    }
}

/// `:wq` writes and quits, `:xit` and `:exit` write only when changed.
pub fn ex_exit(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let fnum = st.curbuf_fnum();
    let write = ea.cmd == Cmd::Wq || st.buf_modified(fnum) || !ea.arg_str().is_empty();
    if write {
        do_write(st, ea)?;
    }
    crate::ex::window::quit_window(st, ea.forceit)
}

/// Information about the current file, as `:file` shows it.
pub fn fileinfo(st: &mut EditorState) {
    let name = st
        .curbuf()
        .name
        .clone()
        .unwrap_or_else(|| "[No Name]".to_string());
    let fnum = st.curbuf_fnum();
    let modified = if st.buf_modified(fnum) {
        " [Modified]"
    } else {
        ""
    };
    let text = if st.curbuf().is_empty() {
        format!("\"{name}\"{modified} --No lines in buffer--")
    } else {
        let count = st.line_count();
        let lnum = st.cursor().lnum;
        let pct = lnum * 100 / count;
        format!("\"{name}\"{modified} line {lnum} of {count} --{pct}%--")
    };
    st.msg(&text);
}

/// `:file` shows the file name, `:file {name}` renames the buffer and
/// `:0file` removes the name.
pub fn ex_file(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let arg = ea.arg_str().to_string();
    if ea.addr_count > 0 {
        if ea.line2 != 0 || !arg.is_empty() {
            return Err(invalid(e::INVARG));
        }
        st.curbuf_mut().name = None;
        fileinfo(st);
        return Ok(());
    }
    if !arg.is_empty() {
        let old = st.curbuf().name.clone();
        // the old name becomes the alternate file
        if let Some(old) = old {
            let alt = match st.bufs.find_by_name(&old) {
                Some(f) if f != st.curbuf_fnum() => f,
                _ => {
                    let f = st.bufs.add(Some(old));
                    let compat = compatible(st);
                    st.options.init_buf(f, compat);
                    if let Some(b) = st.bufs.get_mut(f) {
                        b.listed = false;
                        b.loaded = false;
                    }
                    f
                }
            };
            st.curwin_mut().alt = Some(alt);
        }
        st.curbuf_mut().name = Some(arg);
    }
    fileinfo(st);
    Ok(())
}

/// `:read file` and `:read !cmd` insert below the given line.
pub fn ex_read(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let text = if ea.usefilter {
        let cmd = ea.arg_str().to_string();
        st.last_shell_cmd = Some(cmd.clone());
        call_shell(st, &cmd, None)?.0
    } else {
        let arg = ea.arg_str().to_string();
        let fname = if arg.is_empty() {
            match st.curbuf().name.clone() {
                Some(name) => name,
                None => return Err(runtime(e::NOFILENAME)),
            }
        } else {
            arg
        };
        let text = match st.host.read_file(&fname) {
            Ok(text) => text,
            Err(err) => {
                log::debug!("cannot read {fname}: {err}");
                return Err(runtime(format!("{} {fname}", e::NOTREAD)));
            }
        };
        let info = line_byte_counts(st, count_lines(&text), text.len());
        st.msg(&format!("\"{fname}\" {info}"));
        text
    };

    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    if lines.is_empty() {
        return Ok(());
    }
    st.u_save()?;
    st.curbuf_mut().append(ea.line2, lines);
    st.changed();
    st.cursor_to_line_start(ea.line2 + 1);
    Ok(())
}

/// Replace each unescaped `!` in `cmd` with the previous command.
fn expand_bang(st: &EditorState, cmd: &str) -> Result<String> {
    let mut out = String::with_capacity(cmd.len());
    let mut chars = cmd.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'!') => {
                out.push('!');
                chars.next();
            }
            '!' => match &st.last_shell_cmd {
                Some(prev) => out.push_str(prev),
                None => return Err(runtime(e::NOSHELL)),
            },
            c => out.push(c),
        }
    }
    Ok(out)
}

/// `:!cmd` runs a command, `:{range}!cmd` filters lines through it and
/// `:!!` repeats the last one.
pub fn ex_bang(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let mut cmd = expand_bang(st, ea.arg_str())?;
    if ea.forceit {
        match &st.last_shell_cmd {
            Some(prev) => cmd = format!("{prev}{cmd}"),
            None => return Err(runtime(e::NOSHELL)),
        }
    }
    if cmd.is_empty() {
        return Err(invalid(e::ARGREQ));
    }
    st.last_shell_cmd = Some(cmd.clone());

    if ea.addr_count == 0 {
        let (output, code) = call_shell(st, &cmd, None)?;
        for line in output.lines() {
            st.msg(line);
        }
        if code != 0 {
            st.msg(&format!("shell returned {code}"));
        }
        return Ok(());
    }

    let fnum = st.curbuf_fnum();
    let input = buffer_text(st, fnum, ea.line1, ea.line2);
    let (output, _) = call_shell(st, &cmd, Some(&input))?;
    let new: Vec<String> = output.lines().map(str::to_string).collect();
    let count = ea.line2 - ea.line1 + 1;
    st.u_save()?;
    st.curbuf_mut().delete(ea.line1, ea.line2);
    st.curbuf_mut().append(ea.line1 - 1, new);
    st.changed();
    st.cursor_to_line_start(ea.line1);
    if count > st.p_num(Opt::Report) {
        let text = if count == 1 {
            "1 line filtered".to_string()
        } else {
            format!("{count} lines filtered")
        };
        st.msg(&text);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::eval::Value;
    use crate::host::MemHost;
    use test_log::test;

    fn state(host: &MemHost) -> EditorState {
        EditorState::new(Box::new(host.clone()), false)
    }

    fn run(st: &mut EditorState, cmd: &str) {
        do_cmdline_cmd(st, cmd).unwrap();
    }

    #[test]
    fn edit_reads_the_file() {
        let host = MemHost::new().with_file("a.txt", "one\ntwo\n");
        let mut st = state(&host);
        run(&mut st, "edit a.txt");
        assert_eq!(st.curbuf().text(), "one\ntwo\n");
        assert_eq!(st.curbuf().name.as_deref(), Some("a.txt"));
        assert_eq!(host.output(), vec!["\"a.txt\" 2L, 8B"]);
        assert!(!st.buf_modified(st.curbuf_fnum()));
    }

    #[test]
    fn edit_new_file_and_plus_command() {
        let host = MemHost::new().with_file("b.txt", "1\n2\n3\n");
        let mut st = state(&host);
        run(&mut st, "edit new.txt");
        assert_eq!(host.output(), vec!["\"new.txt\" [New]"]);
        run(&mut st, "edit +2 b.txt");
        assert_eq!(st.cursor().lnum, 2);
        let alt = st.curwin().alt.and_then(|f| st.bufs.get(f));
        assert_eq!(alt.and_then(|b| b.name.clone()).as_deref(), Some("new.txt"));
    }

    #[test]
    fn edit_refuses_to_drop_changes() {
        let host = MemHost::new().with_file("c.txt", "x\n");
        let mut st = state(&host);
        run(&mut st, "edit c.txt | s/x/y/");
        run(&mut st, "edit other.txt");
        assert_eq!(host.errors(), vec![e::NOWRITE]);
        run(&mut st, "edit!");
        assert_eq!(st.curbuf().text(), "x\n");
    }

    #[test]
    fn edit_autocommands_and_modelines() {
        let host = MemHost::new()
            .with_file("m.txt", "text\n# vim: set ts=4 :\n");
        let mut st = state(&host);
        run(&mut st, "autocmd BufRead *.txt let g:read = expand('<afile>')");
        run(&mut st, "autocmd BufNewFile *.txt let g:newfile = 1");
        run(&mut st, "edit m.txt");
        assert_eq!(st.get_var("g:read"), Some(Value::str("m.txt")));
        assert_eq!(st.p_num(Opt::Tabstop), 4);
        run(&mut st, "edit fresh.txt");
        assert_eq!(st.get_var("g:newfile"), Some(Value::Number(1)));
    }

    #[test]
    fn write_and_append() {
        let host = MemHost::new();
        let mut st = state(&host);
        st.curbuf_mut().load_text("a\nb\nc\n");
        run(&mut st, "write out.txt");
        assert_eq!(host.file("out.txt").as_deref(), Some("a\nb\nc\n"));
        assert_eq!(st.curbuf().name.as_deref(), Some("out.txt"));
        run(&mut st, "2,3w >> out.txt");
        assert_eq!(host.file("out.txt").as_deref(), Some("a\nb\nc\nb\nc\n"));
        assert_eq!(
            host.output(),
            vec!["\"out.txt\" [New] 3L, 6B written", "\"out.txt\" 2L, 4B appended"]
        );
    }

    #[test]
    fn write_existing_file_needs_bang() {
        let host = MemHost::new().with_file("there.txt", "old\n");
        let mut st = state(&host);
        st.curbuf_mut().load_text("new\n");
        run(&mut st, "edit! mine.txt | s/^/x/ | w there.txt");
        assert_eq!(host.errors(), vec![e::FILE_EXISTS]);
        run(&mut st, "w! there.txt");
        assert_eq!(host.file("there.txt").as_deref(), Some("x\n"));
    }

    #[test]
    fn update_writes_only_changes() {
        let host = MemHost::new().with_file("u.txt", "a\n");
        let mut st = state(&host);
        run(&mut st, "edit u.txt");
        host.data.borrow_mut().files.insert("u.txt".into(), "outside\n".into());
        run(&mut st, "update");
        assert_eq!(host.file("u.txt").as_deref(), Some("outside\n"));
        run(&mut st, "s/a/b/ | update");
        assert_eq!(host.file("u.txt").as_deref(), Some("b\n"));
        assert!(!st.buf_modified(st.curbuf_fnum()));
    }

    #[test]
    fn write_autocommands() {
        let host = MemHost::new();
        let mut st = state(&host);
        run(&mut st, "autocmd BufWritePre * let g:pre = 1");
        run(&mut st, "autocmd BufWritePost * let g:post = g:pre + 1");
        run(&mut st, "w f.txt");
        assert_eq!(st.get_var("g:post"), Some(Value::Number(2)));
    }

    #[test]
    fn write_without_name() {
        let host = MemHost::new();
        let mut st = state(&host);
        run(&mut st, "write");
        assert_eq!(host.errors(), vec![e::NOFILENAME]);
    }

    #[test]
    fn read_file_and_command() {
        let host = MemHost::new().with_file("r.txt", "x\ny\n");
        host.data
            .borrow_mut()
            .shell_replies
            .insert("date".into(), ("today\n".into(), 0));
        let mut st = state(&host);
        st.curbuf_mut().load_text("1\n2\n");
        run(&mut st, "1read r.txt");
        assert_eq!(st.curbuf().text(), "1\nx\ny\n2\n");
        assert_eq!(st.cursor().lnum, 2);
        run(&mut st, "$r !date");
        assert_eq!(st.curbuf().text(), "1\nx\ny\n2\ntoday\n");
        assert_eq!(st.last_shell_cmd.as_deref(), Some("date"));
    }

    #[test]
    fn bang_filters_lines() {
        let host = MemHost::new();
        host.data
            .borrow_mut()
            .shell_replies
            .insert("sort".into(), ("a\nb\nc\n".into(), 0));
        let mut st = state(&host);
        st.curbuf_mut().load_text("c\nb\na\n");
        run(&mut st, "%!sort");
        assert_eq!(st.curbuf().text(), "a\nb\nc\n");
        assert_eq!(
            host.data.borrow().shell_log[0],
            ("sort".to_string(), Some("c\nb\na\n".to_string()))
        );
        assert_eq!(host.output(), vec!["3 lines filtered"]);
    }

    #[test]
    fn bang_repeats_previous() {
        let host = MemHost::new();
        let mut st = state(&host);
        run(&mut st, "!!");
        assert_eq!(host.errors(), vec![e::NOSHELL]);
        run(&mut st, "!ls");
        run(&mut st, "!!");
        run(&mut st, "!echo \\! !");
        let log: Vec<String> = host.data.borrow().shell_log.iter().map(|(c, _)| c.clone()).collect();
        assert_eq!(log, vec!["ls", "ls", "echo ! ls"]);
    }

    #[test]
    fn shell_refused_in_sandbox() {
        let host = MemHost::new();
        let mut st = state(&host);
        run(&mut st, "sandbox !ls");
        assert_eq!(host.errors().len(), 1);
        assert!(host.errors()[0].starts_with(e::SANDBOX));
    }

    #[test]
    fn file_shows_and_renames() {
        let host = MemHost::new();
        let mut st = state(&host);
        st.curbuf_mut().load_text("a\nb\n");
        run(&mut st, "file");
        run(&mut st, "file one.txt");
        run(&mut st, "file two.txt");
        assert_eq!(
            host.output(),
            vec![
                "\"[No Name]\" line 1 of 2 --50%--",
                "\"one.txt\" line 1 of 2 --50%--",
                "\"two.txt\" line 1 of 2 --50%--",
            ]
        );
        let alt = st.curwin().alt.and_then(|f| st.bufs.get(f));
        assert_eq!(alt.and_then(|b| b.name.clone()).as_deref(), Some("one.txt"));
    }

    #[test]
    fn wq_exits() {
        let host = MemHost::new();
        let mut st = state(&host);
        st.curbuf_mut().load_text("z\n");
        run(&mut st, "wq out.txt");
        assert_eq!(host.file("out.txt").as_deref(), Some("z\n"));
        assert_eq!(st.exiting, Some(0));
    }
}
