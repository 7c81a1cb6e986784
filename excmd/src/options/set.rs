//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The `:set` language and the single entry point through which every
//! option change goes.

use super::did_set::OptSetArgs;
use super::{key_to_termcode, Opt, OptFlags, OptKind, OptLevel, OptVal, OPTIONS};
use crate::autocmd::Event;
use crate::charset::{is_white, str2nr, transstr, NumBases};
use crate::cmds::Cmd;
use crate::docmd::{CmdCtx, ExArgs};
use crate::error::{e, runtime, Result};
use crate::eval::Value;
use crate::state::EditorState;

/// Width of a column in the option listing.
const INC: usize = 20;
const GAP: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Prefix {
    No,
    Set,
    Inv,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    /// Nothing after the name.
    None,
    Assign,
    Add,
    Sub,
    Prepend,
    Query,
    Invert,
    Default,
    DefaultVi,
    DefaultVim,
    FromGlobal,
}

/// Which options a listing shows.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Show {
    Changed,
    All,
}

/// `:set`, `:setlocal` and `:setglobal`
pub fn ex_set(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let level = match ea.cmd {
        Cmd::Setglobal => OptLevel::Global,
        Cmd::Setlocal => OptLevel::Local,
        _ => OptLevel::Both,
    };
    let arg = ea.arg_str().to_string();
    if ea.forceit && arg.is_empty() {
        return show_options(st, Show::All, level);
    }
    do_set(st, &arg, level, false)
}

/// Parse and apply the arguments of a `:set` command. With `modeline` the
/// secure rules of modelines apply.
pub fn do_set(st: &mut EditorState, arg: &str, level: OptLevel, modeline: bool) -> Result<()> {
    if arg.trim().is_empty() {
        return show_options(st, Show::Changed, level);
    }

    let mut p = 0;
    let b = arg.as_bytes();
    while p < b.len() {
        let start = p;
        let rest = &arg[p..];

        if rest.starts_with("all") && end_of_word(rest, 3) {
            show_options(st, Show::All, level)?;
            p += 3;
        } else if rest.starts_with("all&") && end_of_word(rest, 4) {
            set_all_default(st);
            p += 4;
        } else if rest.starts_with("termcap") && end_of_word(rest, 7) {
            show_termcodes(st);
            p += 7;
        } else {
            p = set_one(st, arg, p, level, modeline).map_err(|err| {
                let end = token_end(arg, start);
                runtime(format!("{}: {}", err.message(), &arg[start..end]))
            })?;
        }

        if p < b.len() && !is_white(b[p]) {
            let end = token_end(arg, start);
            return Err(runtime(format!("{}: {}", e::TRAILING, &arg[start..end])));
        }
        p = crate::charset::skipwhite_at(arg, p);
    }
    Ok(())
}

fn end_of_word(s: &str, n: usize) -> bool {
    s.as_bytes().get(n).map_or(true, |&c| is_white(c))
}

/// End of the argument starting at `start`, honoring backslash escapes.
fn token_end(arg: &str, start: usize) -> usize {
    crate::charset::skiptowhite_esc(arg, start)
}

/// Handle one `name[op][value]` argument starting at `p`. Returns the
/// offset just past it.
fn set_one(st: &mut EditorState, arg: &str, mut p: usize, level: OptLevel, modeline: bool) -> Result<usize> {
    let b = arg.as_bytes();

    // a name in <>: a key code or <t_xx>
    if b[p] == b'<' {
        let close = arg[p..]
            .find('>')
            .map(|i| p + i + 1)
            .ok_or_else(|| runtime(e::UNKNOWN_OPTION))?;
        let code = key_to_termcode(&arg[p..close]).ok_or_else(|| runtime(e::UNKNOWN_OPTION))?;
        return set_termcode(st, arg, close, &code, modeline);
    }

    let name_end = |from: usize| {
        let mut q = from;
        while q < b.len() && (b[q].is_ascii_alphanumeric() || b[q] == b'_') {
            q += 1;
        }
        q
    };

    // terminal codes may use any two characters
    if arg[p..].starts_with("t_") && arg.is_char_boundary(p + 4) && p + 4 <= b.len() {
        let code = arg[p..p + 4].to_string();
        return set_termcode(st, arg, p + 4, &code, modeline);
    }

    let mut prefix = Prefix::Set;
    let mut end = name_end(p);
    let mut opt = st.options.find(&arg[p..end]);
    if opt.is_none() {
        if let Some(name) = arg[p..end].strip_prefix("no") {
            prefix = Prefix::No;
            opt = st.options.find(name);
            p += 2;
        } else if let Some(name) = arg[p..end].strip_prefix("inv") {
            prefix = Prefix::Inv;
            opt = st.options.find(name);
            p += 3;
        }
    }
    let Some(opt) = opt else {
        return Err(runtime(e::UNKNOWN_OPTION));
    };
    end = name_end(p);

    let (op, value_at) = parse_op(arg, end);
    let spec = opt.spec();
    let kind = spec.kind();

    if prefix != Prefix::Set && kind != OptKind::Bool {
        return Err(runtime(e::INVARG));
    }
    if kind != OptKind::Bool && op == Op::Invert {
        return Err(runtime(e::INVARG));
    }
    if kind == OptKind::Bool && matches!(op, Op::Assign | Op::Add | Op::Sub | Op::Prepend) {
        return Err(runtime(e::INVARG));
    }

    let ctx = st.opt_ctx();
    let show = matches!(op, Op::Query) || (op == Op::None && kind != OptKind::Bool && prefix == Prefix::Set);
    if show {
        if !spec.flags.contains(OptFlags::HIDDEN) {
            let line = format_option(st, opt, level);
            st.msg(&line);
        }
        return Ok(value_at);
    }

    if modeline {
        if spec.flags.intersects(OptFlags::SECURE | OptFlags::NO_ML) {
            return Err(runtime(e::NOT_IN_MODELINE));
        }
        if spec.flags.contains(OptFlags::MLE) && !st.p_flag(Opt::Modelineexpr) {
            return Err(runtime(e::MLE_OFF));
        }
    }
    if (st.secure > 0 || st.sandbox > 0) && spec.flags.contains(OptFlags::SECURE) {
        return Err(runtime(e::NOT_ALLOWED));
    }

    let cur = st.options.get(opt, level, ctx);
    let mut p = value_at;
    let new = match op {
        Op::Default | Op::DefaultVi | Op::DefaultVim => {
            let compatible = match op {
                Op::DefaultVi => true,
                Op::DefaultVim => false,
                _ => st.p_flag(Opt::Compatible),
            };
            st.options.default_value(opt, compatible)
        }
        Op::FromGlobal => {
            if spec.scope.is_both() {
                st.options.set_local(opt, ctx, None);
                log::debug!("{} local value unset", spec.name);
                return Ok(p);
            }
            st.options.get_global(opt).clone()
        }
        Op::Invert => OptVal::Bool(!cur.as_bool()),
        Op::None => OptVal::Bool(match prefix {
            Prefix::No => false,
            Prefix::Set => true,
            Prefix::Inv => !cur.as_bool(),
        }),
        Op::Assign | Op::Add | Op::Sub | Op::Prepend if kind == OptKind::Number => {
            let (n, len) = parse_number(&arg[p..])?;
            p += len;
            let c = cur.as_num();
            OptVal::Num(match op {
                Op::Add => c.wrapping_add(n),
                Op::Sub => c.wrapping_sub(n),
                Op::Prepend => c.wrapping_mul(n),
                _ => n,
            })
        }
        Op::Assign | Op::Add | Op::Sub | Op::Prepend => {
            let (mut value, len) = parse_string_value(&arg[p..]);
            p += len;
            if spec.flags.contains(OptFlags::EXPAND) {
                value = expand_env(&value, spec.flags.contains(OptFlags::COMMA));
            }
            OptVal::Str(combine(spec.flags, cur.as_str(), &value, op))
        }
        Op::Query => return Ok(p),
    };

    if spec.flags.contains(OptFlags::HIDDEN) {
        return Ok(p);
    }
    set_option_value(st, opt, new, level, modeline)?;
    Ok(p)
}

fn parse_op(arg: &str, at: usize) -> (Op, usize) {
    let rest = &arg[at..];
    for (tok, op) in [
        ("&vim", Op::DefaultVim),
        ("&vi", Op::DefaultVi),
        ("+=", Op::Add),
        ("-=", Op::Sub),
        ("^=", Op::Prepend),
        ("&", Op::Default),
        ("<", Op::FromGlobal),
        ("?", Op::Query),
        ("!", Op::Invert),
        ("=", Op::Assign),
        (":", Op::Assign),
    ] {
        if rest.starts_with(tok) {
            return (op, at + tok.len());
        }
    }
    (Op::None, at)
}

fn parse_number(s: &str) -> Result<(i64, usize)> {
    let end = s.bytes().position(is_white).unwrap_or(s.len());
    match str2nr(&s[..end], NumBases::ALL) {
        Some((n, len)) if len == end => Ok((n, len)),
        _ => Err(runtime(e::NUMBER_REQUIRED)),
    }
}

/// A string value up to the first unescaped blank. A backslash takes the
/// next character literally.
fn parse_string_value(s: &str) -> (String, usize) {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            ' ' | '\t' => return (out, i),
            '\\' => match chars.next() {
                Some((_, n)) => out.push(n),
                None => out.push('\\'),
            },
            c => out.push(c),
        }
    }
    (out, s.len())
}

/// Expand `~` and `$VAR` in a value; for a comma list, in each item.
pub fn expand_env(value: &str, comma: bool) -> String {
    if comma {
        return value
            .split(',')
            .map(|item| expand_env(item, false))
            .collect::<Vec<_>>()
            .join(",");
    }
    let mut out = String::new();
    let mut rest = value;
    if let Some(tail) = rest.strip_prefix('~') {
        if tail.is_empty() || tail.starts_with('/') {
            match std::env::var("HOME") {
                Ok(home) => out.push_str(&home),
                Err(_) => out.push('~'),
            }
            rest = tail;
        }
    }
    while let Some(i) = rest.find('$') {
        out.push_str(&rest[..i]);
        let after = &rest[i + 1..];
        let (name, skip) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(close) => (&braced[..close], close + 2),
                None => ("", 0),
            },
            None => {
                let n = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..n], n)
            }
        };
        match std::env::var(name) {
            Ok(v) if !name.is_empty() => {
                out.push_str(&v);
                rest = &after[skip..];
            }
            _ => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Apply `+=`, `-=` or `^=` to a string value, aware of comma lists and
/// flag lists.
fn combine(flags: OptFlags, cur: &str, value: &str, op: Op) -> String {
    let comma = flags.contains(OptFlags::COMMA);
    let flaglist = flags.contains(OptFlags::FLAGLIST) && !comma;
    match op {
        Op::Add | Op::Prepend => {
            if value.is_empty() {
                return cur.to_string();
            }
            if comma && flags.contains(OptFlags::NODUP) && cur.split(',').any(|i| i == value) {
                return cur.to_string();
            }
            if flaglist {
                let extra: String = value.chars().filter(|&c| !cur.contains(c)).collect();
                return if op == Op::Add {
                    format!("{cur}{extra}")
                } else {
                    format!("{extra}{cur}")
                };
            }
            let sep = if comma && !cur.is_empty() { "," } else { "" };
            if op == Op::Add {
                format!("{cur}{sep}{value}")
            } else {
                format!("{value}{sep}{cur}")
            }
        }
        Op::Sub => {
            if comma {
                let items: Vec<&str> = cur.split(',').collect();
                match items.iter().position(|&i| i == value) {
                    Some(pos) => {
                        let mut items = items;
                        items.remove(pos);
                        items.join(",")
                    }
                    None => cur.to_string(),
                }
            } else if flaglist {
                cur.chars().filter(|&c| !value.contains(c)).collect()
            } else {
                cur.replacen(value, "", 1)
            }
        }
        _ => value.to_string(),
    }
}

fn to_value(v: &OptVal) -> Value {
    match v {
        OptVal::Bool(b) => Value::from(*b),
        OptVal::Num(n) => Value::Number(*n),
        OptVal::Str(s) => Value::str(s.as_str()),
    }
}

fn install(st: &mut EditorState, opt: Opt, val: &OptVal, level: OptLevel) {
    let spec = opt.spec();
    let ctx = st.opt_ctx();
    if !spec.scope.is_local() {
        st.options.set_global(opt, val.clone());
        return;
    }
    match level {
        OptLevel::Global => st.options.set_global(opt, val.clone()),
        OptLevel::Local => st.options.set_local(opt, ctx, Some(val.clone())),
        OptLevel::Both => {
            st.options.set_global(opt, val.clone());
            // a global-local option then follows the global value
            let local = if spec.scope.is_both() { None } else { Some(val.clone()) };
            st.options.set_local(opt, ctx, local);
        }
    }
}

/// Give `opt` a new value at `level`: install it, run its callback, mark
/// it set, record where it came from and trigger OptionSet. A callback
/// error restores the previous value.
pub fn set_option_value(
    st: &mut EditorState,
    opt: Opt,
    new: OptVal,
    level: OptLevel,
    modeline: bool,
) -> Result<()> {
    let ctx = st.opt_ctx();
    let old = st.options.get(opt, level, ctx);
    let old_global = st.options.get_global(opt).clone();
    let old_local = st.options.get_local(opt, ctx);

    install(st, opt, &new, level);

    if let Some(cb) = opt.spec().did_set {
        let mut args = OptSetArgs {
            opt,
            old: old.clone(),
            new: new.clone(),
            level,
            ctx,
        };
        if let Err(err) = cb(st, &mut args) {
            st.options.set_global(opt, old_global);
            if opt.spec().scope.is_local() {
                st.options.set_local(opt, ctx, old_local);
            }
            return Err(err);
        }
        if args.new != new {
            install(st, opt, &args.new, level);
        }
    }

    let insecure = st.secure > 0 || st.sandbox > 0 || st.execute_depth > 0 || modeline;
    st.options.set_insecure(opt, level, ctx, insecure);
    st.options.mark_set(opt);

    let new = st.options.get(opt, level, ctx);
    log::debug!("set {} ({level:?}): {old} -> {new}", opt.name());

    if st.autocmds.has_event(Event::OptionSet) {
        let command = if modeline {
            "modeline"
        } else {
            match level {
                OptLevel::Both => "set",
                OptLevel::Local => "setlocal",
                OptLevel::Global => "setglobal",
            }
        };
        let local = old_local.unwrap_or_else(|| old_global.clone());
        st.vars.set_vim("option_new", to_value(&new));
        st.vars.set_vim("option_old", to_value(&old));
        st.vars.set_vim("option_oldlocal", to_value(&local));
        st.vars.set_vim("option_oldglobal", to_value(&old_global));
        st.vars.set_vim(
            "option_type",
            Value::str(if level == OptLevel::Local { "local" } else { "global" }),
        );
        st.vars.set_vim("option_command", Value::str(command));
        crate::autocmd::apply_autocmds(st, Event::OptionSet, opt.name(), None);
        for name in [
            "option_new",
            "option_old",
            "option_oldlocal",
            "option_oldglobal",
            "option_type",
            "option_command",
        ] {
            st.vars.set_vim(name, Value::str(""));
        }
    }
    Ok(())
}

fn set_termcode(st: &mut EditorState, arg: &str, end: usize, code: &str, modeline: bool) -> Result<usize> {
    let (op, at) = parse_op(arg, end);
    match op {
        Op::Assign => {
            if modeline || st.secure > 0 {
                return Err(runtime(e::NOT_IN_MODELINE));
            }
            let (value, len) = parse_string_value(&arg[at..]);
            log::debug!("terminal code {code} set");
            st.options.set_termcode(code, &value);
            Ok(at + len)
        }
        Op::None | Op::Query => match st.options.termcode(code).map(str::to_string) {
            Some(value) => {
                st.msg(&format!("{code}={}", transstr(&value)));
                Ok(at)
            }
            None if code.len() == 4 => Err(runtime(e::KEYCODE_NOT_SET)),
            None => Err(runtime(e::NOT_FOUND_TERMCAP)),
        },
        _ => Err(runtime(e::INVARG)),
    }
}

/// The form `:set opt?` shows.
fn format_option(st: &EditorState, opt: Opt, level: OptLevel) -> String {
    let spec = opt.spec();
    let val = st.options.get(opt, level, st.opt_ctx());
    match val {
        OptVal::Bool(true) => format!("  {}", spec.name),
        OptVal::Bool(false) => format!("no{}", spec.name),
        OptVal::Num(n) => format!("  {}={n}", spec.name),
        OptVal::Str(s) if opt == Opt::Key && !s.is_empty() => format!("  {}=*****", spec.name),
        OptVal::Str(s) => format!("  {}={}", spec.name, transstr(&s)),
    }
}

fn differs_from_default(st: &EditorState, opt: Opt, level: OptLevel) -> bool {
    let cur = st.options.get(opt, level, st.opt_ctx());
    cur != st.options.default_value(opt, st.p_flag(Opt::Compatible))
}

/// `:set`, `:set all`: short items in columns, long ones one per line.
fn show_options(st: &mut EditorState, which: Show, level: OptLevel) -> Result<()> {
    st.msg("--- Options ---");
    let mut items: Vec<String> = Vec::new();
    for spec in OPTIONS {
        if spec.flags.contains(OptFlags::HIDDEN) {
            continue;
        }
        if level == OptLevel::Local && !spec.scope.is_local() {
            continue;
        }
        if which == Show::Changed && !differs_from_default(st, spec.opt, level) {
            continue;
        }
        items.push(format_option(st, spec.opt, level));
    }

    let columns = st.p_num(Opt::Columns).max(1) as usize;
    let (short, long): (Vec<&String>, Vec<&String>) =
        items.iter().partition(|s| s.len() <= INC - GAP);

    let cols = ((columns + GAP).saturating_sub(3) / INC).max(1);
    let rows = short.len().div_ceil(cols);
    for row in 0..rows {
        let mut line = String::new();
        for col in 0..cols {
            if let Some(item) = short.get(row + col * rows) {
                let pad = (col * INC).saturating_sub(line.len());
                line.extend(std::iter::repeat(' ').take(pad));
                line.push_str(item);
            }
        }
        st.msg_list_line(line.trim_end());
    }
    for item in long {
        st.msg_list_line(item);
    }
    Ok(())
}

fn show_termcodes(st: &mut EditorState) {
    st.msg("--- Terminal codes ---");
    let lines: Vec<String> = st
        .options
        .termcodes()
        .map(|(k, v)| format!("{k}={}", transstr(v)))
        .collect();
    for line in lines {
        st.msg_list_line(&line);
    }
}

/// `:set all&`: every option back to its default, without callbacks.
fn set_all_default(st: &mut EditorState) {
    let compatible = st.p_flag(Opt::Compatible);
    let ctx = st.opt_ctx();
    for spec in OPTIONS {
        if spec.flags.intersects(OptFlags::NODEFAULT | OptFlags::HIDDEN) || spec.opt == Opt::Compatible {
            continue;
        }
        let val = st.options.default_value(spec.opt, compatible);
        st.options.set_global(spec.opt, val.clone());
        if spec.scope.is_local() {
            let local = if spec.scope.is_both() { None } else { Some(val) };
            st.options.set_local(spec.opt, ctx, local);
        }
        st.options.set_insecure(spec.opt, OptLevel::Both, ctx, false);
    }
    log::debug!("all options reset to defaults");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn state() -> (EditorState, MemHost) {
        let host = MemHost::new();
        (EditorState::new(Box::new(host.clone()), false), host)
    }

    fn set(st: &mut EditorState, arg: &str) -> Result<()> {
        do_set(st, arg, OptLevel::Both, false)
    }

    #[test]
    fn booleans() {
        let (mut st, _) = state();
        set(&mut st, "ic").unwrap();
        assert!(st.p_flag(Opt::Ignorecase));
        set(&mut st, "noic").unwrap();
        assert!(!st.p_flag(Opt::Ignorecase));
        set(&mut st, "invic").unwrap();
        assert!(st.p_flag(Opt::Ignorecase));
        set(&mut st, "ic!").unwrap();
        assert!(!st.p_flag(Opt::Ignorecase));
        assert!(set(&mut st, "ic=1").is_err());
        assert!(set(&mut st, "nots").is_err());
    }

    #[test]
    fn numbers() {
        let (mut st, _) = state();
        set(&mut st, "ts=4").unwrap();
        assert_eq!(st.p_num(Opt::Tabstop), 4);
        set(&mut st, "ts+=4 sw=0x10").unwrap();
        assert_eq!(st.p_num(Opt::Tabstop), 8);
        assert_eq!(st.p_num(Opt::Shiftwidth), 16);
        set(&mut st, "ts^=2").unwrap();
        assert_eq!(st.p_num(Opt::Tabstop), 16);
        let err = set(&mut st, "ts=x").unwrap_err();
        assert_eq!(err.message(), "E521: Number required after =: ts=x");
        let err = set(&mut st, "ts=0").unwrap_err();
        assert_eq!(err.message(), "E487: Argument must be positive: ts=0");
        assert_eq!(st.p_num(Opt::Tabstop), 16);
    }

    #[test]
    fn comma_lists() {
        let (mut st, _) = state();
        set(&mut st, "bs=indent").unwrap();
        set(&mut st, "bs+=eol").unwrap();
        assert_eq!(st.p_str(Opt::Backspace), "indent,eol");
        set(&mut st, "bs+=eol").unwrap();
        assert_eq!(st.p_str(Opt::Backspace), "indent,eol");
        set(&mut st, "bs^=start").unwrap();
        assert_eq!(st.p_str(Opt::Backspace), "start,indent,eol");
        set(&mut st, "bs-=indent").unwrap();
        assert_eq!(st.p_str(Opt::Backspace), "start,eol");
    }

    #[test]
    fn backspace_number_is_converted() {
        let (mut st, _) = state();
        set(&mut st, "backspace=1").unwrap();
        assert_eq!(st.p_str(Opt::Backspace), "indent,eol");
    }

    #[test]
    fn escaped_blank_in_value() {
        let (mut st, _) = state();
        set(&mut st, "filetype=python\\ 2").unwrap();
        assert_eq!(st.p_str(Opt::Filetype), "python 2");
    }

    #[test]
    fn flag_lists() {
        let (mut st, _) = state();
        set(&mut st, "shm=a").unwrap();
        set(&mut st, "shm+=aI").unwrap();
        assert_eq!(st.p_str(Opt::Shortmess), "aI");
        set(&mut st, "shm-=a").unwrap();
        assert_eq!(st.p_str(Opt::Shortmess), "I");
    }

    #[test]
    fn defaults_and_global_copy() {
        let (mut st, _) = state();
        set(&mut st, "cpo=a").unwrap();
        set(&mut st, "cpo&vi").unwrap();
        assert_eq!(st.p_str(Opt::Cpoptions), "aAbBcCdDeEfFgHiIjJkKlLmMnoOpPqrRsStuvwWxXyZ$!%*-+<>;");
        set(&mut st, "cpo&").unwrap();
        assert_eq!(st.p_str(Opt::Cpoptions), "aABceFs");

        do_set(&mut st, "ul=5", OptLevel::Local, false).unwrap();
        assert_eq!(st.p_num(Opt::Undolevels), 5);
        do_set(&mut st, "ul<", OptLevel::Local, false).unwrap();
        assert_eq!(st.p_num(Opt::Undolevels), 1000);
    }

    #[test]
    fn query_shows_value() {
        let (mut st, host) = state();
        set(&mut st, "ts? ic? bs=eol").unwrap();
        set(&mut st, "bs").unwrap();
        assert_eq!(host.output(), vec!["  tabstop=8", "noignorecase", "  backspace=eol"]);
    }

    #[test]
    fn unknown_option_names_the_token() {
        let (mut st, _) = state();
        let err = set(&mut st, "nosuch=3").unwrap_err();
        assert_eq!(err.message(), "E518: Unknown option: nosuch=3");
    }

    #[test]
    fn modeline_rules() {
        let (mut st, _) = state();
        let err = do_set(&mut st, "shell=evil", OptLevel::Local, true).unwrap_err();
        assert!(err.message().starts_with("E520"));
        let err = do_set(&mut st, "foldexpr=x", OptLevel::Local, true).unwrap_err();
        assert!(err.message().starts_with("E992"));
        do_set(&mut st, "ts=4", OptLevel::Local, true).unwrap();
        assert!(!st.option_trusted(Opt::Tabstop));
        set(&mut st, "ts=4").unwrap();
        assert!(st.option_trusted(Opt::Tabstop));
    }

    #[test]
    fn terminal_codes() {
        let (mut st, host) = state();
        set(&mut st, "t_Co=16").unwrap();
        set(&mut st, "t_Co?").unwrap();
        set(&mut st, "<Up>=x").unwrap();
        assert_eq!(st.options.termcode("t_ku"), Some("x"));
        assert!(set(&mut st, "t_zz?").is_err());
        assert_eq!(host.output(), vec!["t_Co=16"]);
    }

    #[test]
    fn listing_changed_options() {
        let (mut st, host) = state();
        set(&mut st, "ts=4 ic").unwrap();
        set(&mut st, "").unwrap();
        let out = host.output();
        assert_eq!(out[0], "--- Options ---");
        let listing = out[1..].join("\n");
        assert!(listing.contains("  ignorecase"));
        assert!(listing.contains("  tabstop=4"));
        assert!(!listing.contains("shiftwidth"));
    }

    #[test]
    fn all_reset() {
        let (mut st, _) = state();
        set(&mut st, "ts=3 ic").unwrap();
        set(&mut st, "all&").unwrap();
        assert_eq!(st.p_num(Opt::Tabstop), 8);
        assert!(!st.p_flag(Opt::Ignorecase));
    }

    #[test]
    fn env_expansion() {
        std::env::set_var("EXCMD_TEST_DIR", "/opt/x");
        assert_eq!(expand_env("$EXCMD_TEST_DIR/bin,${EXCMD_TEST_DIR}", true), "/opt/x/bin,/opt/x");
        assert_eq!(expand_env("$NO_SUCH_EXCMD_VAR", false), "$NO_SUCH_EXCMD_VAR");
    }
}
