//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Breakpoints and debug mode.
//!
//! Debug mode reads its commands from [`Debugger::input`]; when that runs
//! out it continues as if `cont` was typed.

use std::collections::VecDeque;

use regex::Regex;

use crate::docmd::{CmdCtx, ExArgs};
use crate::error::{e, invalid, runtime, Result};
use crate::line_source::StrSource;
use crate::runner::{do_cmdline, RunFlags};
use crate::state::EditorState;

/// `break_level` when not stepping.
const NO_BREAK: i32 = -1;
/// `break_level` that stops at every command.
const STEP_ALL: i32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    Func,
    File,
}

#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub nr: i64,
    pub kind: BreakKind,
    pub name: String,
    regex: Regex,
    pub lnum: i64,
}

#[derive(Debug)]
pub struct Debugger {
    /// Incremented whenever breakpoints change.
    pub tick: u64,
    breakpoints: Vec<Breakpoint>,
    last_nr: i64,
    /// Stop at commands nested this deep or less; -1 when not stepping.
    pub break_level: i32,
    /// Set by a breakpoint, reported before the next command.
    hit: Option<(String, i64)>,
    /// Lines typed at the debug prompt.
    pub input: VecDeque<String>,
    /// Inside debug mode.
    active: bool,
}

impl Default for Debugger {
    fn default() -> Debugger {
        Debugger {
            tick: 0,
            breakpoints: Vec::new(),
            last_nr: 0,
            break_level: NO_BREAK,
            hit: None,
            input: VecDeque::new(),
            active: false,
        }
    }
}

impl Debugger {
    /// Line of the first breakpoint after `after` in the script or
    /// function `name`, 0 when there is none.
    pub fn find_breakpoint(&self, is_file: bool, name: &str, after: i64) -> i64 {
        let kind = if is_file { BreakKind::File } else { BreakKind::Func };
        let tail = name.rsplit('/').next().unwrap_or(name);
        self.breakpoints
            .iter()
            .filter(|bp| bp.kind == kind && bp.lnum > after)
            .filter(|bp| bp.regex.is_match(name) || (is_file && bp.regex.is_match(tail)))
            .map(|bp| bp.lnum)
            .min()
            .unwrap_or(0)
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }
}

/// A breakpoint was reached at line `lnum` of `name`; debug mode starts
/// before the next command.
pub fn dbg_breakpoint(st: &mut EditorState, name: &str, lnum: i64) {
    if !name.is_empty() && lnum != 0 {
        log::debug!("breakpoint reached in {name} line {lnum}");
        st.debug.hit = Some((name.to_string(), lnum));
    }
}

/// Called before each command: enter debug mode at a breakpoint or when
/// stepping.
pub fn dbg_check_breakpoint(st: &mut EditorState, ea: &ExArgs) {
    if st.debug.active || ea.skip {
        return;
    }
    let cmd = ea.cmdline[ea.pos.min(ea.cmdline.len())..].to_string();
    if let Some((name, lnum)) = st.debug.hit.take() {
        st.msg(&format!("Breakpoint in \"{name}\" line {lnum}"));
        do_debug(st, &cmd);
    } else if st.debug.break_level >= 0 && st.ex_nesting_level <= st.debug.break_level {
        do_debug(st, &cmd);
    }
}

/// Debug commands and the length of their shortest form.
const DEBUG_CMDS: &[(&str, usize)] = &[
    ("cont", 1),
    ("next", 1),
    ("step", 1),
    ("finish", 1),
    ("quit", 1),
    ("interrupt", 1),
    ("backtrace", 2),
    ("where", 1),
    ("frame", 2),
    ("up", 2),
    ("down", 1),
];

fn debug_cmd(line: &str) -> Option<&'static str> {
    let word = line.trim();
    if word == "bt" {
        return Some("backtrace");
    }
    let (head, _) = word.split_once(' ').unwrap_or((word, ""));
    DEBUG_CMDS
        .iter()
        .find(|(name, min)| head.len() >= *min && name.starts_with(head))
        .map(|&(name, _)| name)
}

fn show_backtrace(st: &mut EditorState) {
    let frames: Vec<String> = st
        .sourcing
        .iter()
        .rev()
        .enumerate()
        .map(|(i, f)| {
            let mark = if i == 0 { "->" } else { "  " };
            format!("{mark}{i} {}, line {}", f.name, f.lnum)
        })
        .collect();
    for frame in frames {
        st.msg(&frame);
    }
}

/// Debug mode: show where we are and execute debug commands until one
/// continues execution.
pub fn do_debug(st: &mut EditorState, cmd: &str) {
    let saved_silent = (st.msg_silent, st.emsg_silent);
    st.msg_silent = 0;
    st.emsg_silent = 0;
    st.debug.active = true;
    st.debug.break_level = NO_BREAK;

    st.msg("Entering Debug mode.  Type \"cont\" to continue.");
    if let Some(name) = st.sourcing_name().map(str::to_string) {
        st.msg(&name);
    }
    let lnum = st.sourcing_lnum();
    if lnum != 0 {
        st.msg(&format!("line {lnum}: {cmd}"));
    } else {
        st.msg(&format!("cmd: {cmd}"));
    }

    loop {
        let line = st.debug.input.pop_front().unwrap_or_else(|| "cont".to_string());
        log::debug!("debug> {line}");
        match debug_cmd(&line) {
            Some("cont") => break,
            Some("next") => {
                st.debug.break_level = st.ex_nesting_level;
                break;
            }
            Some("step") => {
                st.debug.break_level = STEP_ALL;
                break;
            }
            Some("finish") => {
                st.debug.break_level = st.ex_nesting_level - 1;
                break;
            }
            Some("quit") => {
                st.exc.got_int = true;
                break;
            }
            Some("interrupt") => {
                st.exc.got_int = true;
                st.debug.break_level = STEP_ALL;
                break;
            }
            Some("backtrace" | "where" | "frame" | "up" | "down") => show_backtrace(st),
            _ => {
                // anything else is a command run in the current context
                let snap = st.save_dbg_stuff();
                let mut source = StrSource::default();
                if let Err(err) = do_cmdline(
                    st,
                    Some(&line),
                    &mut source,
                    RunFlags::VERBOSE | RunFlags::EXCRESET,
                ) {
                    st.emsg(&err.message());
                }
                st.restore_dbg_stuff(snap);
            }
        }
    }

    st.debug.active = false;
    st.msg_silent = saved_silent.0;
    st.emsg_silent = saved_silent.1;
}

/// `:debug {cmd}`: execute `cmd` stepping from its first command.
pub fn ex_debug(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let saved = st.debug.break_level;
    st.debug.break_level = STEP_ALL;
    let cmd = ea.arg_str().to_string();
    let result = crate::runner::do_cmdline_cmd(st, &cmd);
    st.debug.break_level = saved;
    result
}

/// Parse `func|file [lnum] name` or `here`.
fn parse_breakpoint(st: &EditorState, arg: &str) -> Result<(BreakKind, i64, String)> {
    let arg = arg.trim();
    if arg == "here" {
        let name = st
            .curbuf()
            .name
            .clone()
            .ok_or_else(|| runtime(e::NOFILENAME))?;
        return Ok((BreakKind::File, st.cursor().lnum, name));
    }
    let (kind_word, rest) = arg.split_once([' ', '\t']).unwrap_or((arg, ""));
    let kind = match kind_word {
        "func" => BreakKind::Func,
        "file" => BreakKind::File,
        _ => return Err(invalid(format!("{}: {arg}", e::INVARG))),
    };
    let rest = rest.trim_start();
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let lnum = if digits > 0 {
        rest[..digits].parse().unwrap_or(1)
    } else {
        1
    };
    let name = rest[digits..].trim();
    if name.is_empty() {
        return Err(invalid(format!("{}: {arg}", e::INVARG)));
    }
    Ok((kind, lnum.max(1), name.to_string()))
}

/// `:breakadd func|file [lnum] {name}` or `:breakadd here`
pub fn ex_breakadd(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let (kind, lnum, name) = parse_breakpoint(st, ea.arg_str())?;
    let pattern = match kind {
        BreakKind::Func => name.strip_prefix("g:").unwrap_or(&name).to_string(),
        BreakKind::File => name.clone(),
    };
    let regex = crate::autocmd::pattern_to_regex(&pattern)?;
    st.debug.last_nr += 1;
    let nr = st.debug.last_nr;
    st.debug.breakpoints.push(Breakpoint {
        nr,
        kind,
        name,
        regex,
        lnum,
    });
    st.debug.tick += 1;
    Ok(())
}

/// `:breakdel {nr}`, `:breakdel *` or `:breakdel func|file [lnum] {name}`
pub fn ex_breakdel(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let arg = ea.arg_str().trim().to_string();
    if arg == "*" {
        st.debug.breakpoints.clear();
        st.debug.tick += 1;
        return Ok(());
    }
    let idx = if arg.bytes().all(|b| b.is_ascii_digit()) && !arg.is_empty() {
        let nr: i64 = arg.parse().unwrap_or(0);
        st.debug.breakpoints.iter().position(|bp| bp.nr == nr)
    } else {
        let (kind, lnum, name) = parse_breakpoint(st, &arg)?;
        st.debug
            .breakpoints
            .iter()
            .position(|bp| bp.kind == kind && bp.name == name && bp.lnum == lnum)
    };
    match idx {
        Some(i) => {
            st.debug.breakpoints.remove(i);
            st.debug.tick += 1;
            Ok(())
        }
        None => Err(runtime(format!("E161: Breakpoint not found: {arg}"))),
    }
}

/// `:breaklist`
pub fn ex_breaklist(st: &mut EditorState, _ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    if st.debug.breakpoints.is_empty() {
        st.msg("No breakpoints defined");
        return Ok(());
    }
    let rows: Vec<String> = st
        .debug
        .breakpoints
        .iter()
        .map(|bp| {
            let kind = match bp.kind {
                BreakKind::Func => "func",
                BreakKind::File => "file",
            };
            format!("{:3}  {kind} {}  line {}", bp.nr, bp.name, bp.lnum)
        })
        .collect();
    for row in rows {
        st.msg_list_line(&row);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use crate::runner::do_cmdline_cmd;
    use test_log::test;

    fn state() -> (EditorState, MemHost) {
        let host = MemHost::new();
        (EditorState::new(Box::new(host.clone()), false), host)
    }

    #[test]
    fn add_list_delete() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "breakadd func 3 Foo").unwrap();
        do_cmdline_cmd(&mut st, "breakadd file *.vim").unwrap();
        do_cmdline_cmd(&mut st, "breaklist").unwrap();
        assert_eq!(
            host.output(),
            vec!["  1  func Foo  line 3", "  2  file *.vim  line 1"]
        );
        assert_eq!(st.debug.find_breakpoint(false, "Foo", 0), 3);
        assert_eq!(st.debug.find_breakpoint(false, "Foo", 3), 0);
        assert_eq!(st.debug.find_breakpoint(true, "/tmp/x.vim", 0), 1);

        do_cmdline_cmd(&mut st, "breakdel 1").unwrap();
        do_cmdline_cmd(&mut st, "breakdel 1").unwrap();
        assert_eq!(host.errors(), vec!["E161: Breakpoint not found: 1"]);
        do_cmdline_cmd(&mut st, "breakdel *").unwrap();
        assert!(st.debug.breakpoints().is_empty());
    }

    #[test]
    fn tick_changes() {
        let (mut st, _) = state();
        let tick = st.debug.tick;
        do_cmdline_cmd(&mut st, "breakadd func Bar").unwrap();
        assert_ne!(st.debug.tick, tick);
    }

    #[test]
    fn breakpoint_in_function_enters_debug_mode() {
        let (mut st, host) = state();
        let mut source = StrSource::from_lines(vec![
            "function F()".into(),
            "  let x = 1".into(),
            "  let x = 2".into(),
            "endfunction".into(),
        ]);
        do_cmdline(&mut st, None, &mut source, RunFlags::REPEAT).unwrap();
        do_cmdline_cmd(&mut st, "breakadd func 2 F").unwrap();
        st.debug.input.push_back("echo 'in debug'".into());
        st.debug.input.push_back("cont".into());
        do_cmdline_cmd(&mut st, "call F()").unwrap();
        let out = host.output();
        assert!(out.contains(&"Breakpoint in \"F\" line 2".to_string()), "{out:?}");
        assert!(out.contains(&"in debug".to_string()));
    }

    #[test]
    fn debug_command_steps() {
        let (mut st, host) = state();
        st.debug.input.push_back("cont".into());
        do_cmdline_cmd(&mut st, "debug echo 'x'").unwrap();
        let out = host.output();
        assert_eq!(out[0], "Entering Debug mode.  Type \"cont\" to continue.");
        assert_eq!(out.last().map(String::as_str), Some("x"));
    }

    #[test]
    fn debug_commands_abbreviate() {
        assert_eq!(debug_cmd("c"), Some("cont"));
        assert_eq!(debug_cmd("bt"), Some("backtrace"));
        assert_eq!(debug_cmd("echo 1"), None);
    }
}
