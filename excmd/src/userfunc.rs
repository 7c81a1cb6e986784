//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! User defined functions: `:function`, `:call`, `:return` and the
//! line source that feeds a function body to the runner.

use std::collections::BTreeMap;
use std::rc::Rc;

use bitflags::bitflags;

use crate::charset::{ends_excmd, skipwhite_at};
use crate::cond::{CondFlags, Pending};
use crate::docmd::{check_nextcmd, CmdCtx, ExArgs};
use crate::error::{e, invalid, runtime, Error, Result};
use crate::eval::parser::{parse_expr, Expr};
use crate::eval::{Value, VarMap};
use crate::except::report_make_pending;
use crate::line_source::{LineSource, SourceKind};
use crate::options::Opt;
use crate::runner::{do_cmdline, RunFlags};
use crate::state::{EditorState, SourceFrame};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FuncFlags: u8 {
        /// Stop at the first error.
        const ABORT = 0x01;
        /// Called once for a range instead of once per line.
        const RANGE = 0x02;
        const DICT = 0x04;
        const CLOSURE = 0x08;
    }
}

#[derive(Debug)]
pub struct UserFunc {
    pub name: String,
    pub args: Vec<String>,
    /// Takes `...` extra arguments.
    pub varargs: bool,
    pub lines: Vec<String>,
    pub flags: FuncFlags,
    /// Script that defined it.
    pub sid: usize,
}

impl UserFunc {
    fn head(&self) -> String {
        let mut args = self.args.clone();
        if self.varargs {
            args.push("...".to_string());
        }
        let mut s = format!("function {}({})", self.name, args.join(", "));
        for (flag, word) in [
            (FuncFlags::RANGE, " range"),
            (FuncFlags::ABORT, " abort"),
            (FuncFlags::DICT, " dict"),
            (FuncFlags::CLOSURE, " closure"),
        ] {
            if self.flags.contains(flag) {
                s.push_str(word);
            }
        }
        s
    }
}

#[derive(Debug, Default)]
pub struct FuncTable {
    funcs: BTreeMap<String, Rc<UserFunc>>,
}

impl FuncTable {
    pub fn get(&self, name: &str) -> Option<Rc<UserFunc>> {
        self.funcs.get(name.strip_prefix("g:").unwrap_or(name)).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn insert(&mut self, func: UserFunc) {
        self.funcs.insert(func.name.clone(), Rc::new(func));
    }

    fn remove(&mut self, name: &str) -> Option<Rc<UserFunc>> {
        self.funcs.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<UserFunc>> {
        self.funcs.values()
    }
}

/// One active call of a user function.
#[derive(Debug)]
pub struct FuncCall {
    pub func: Rc<UserFunc>,
    /// `l:` variables.
    pub locals: VarMap,
    /// `a:` variables.
    pub args: VarMap,
    /// `:return` was executed.
    pub returned: bool,
    pub rettv: Option<Value>,
}

/// Feeds the lines of a function body to the runner, stopping once the
/// function returned or aborted.
struct FuncSource {
    func: Rc<UserFunc>,
    idx: usize,
}

impl LineSource for FuncSource {
    fn next_line(&mut self, st: &mut EditorState, _indent: usize) -> Option<String> {
        if func_has_ended(st) {
            return None;
        }
        let line = self.func.lines.get(self.idx)?.clone();
        self.idx += 1;
        st.set_sourcing_lnum(self.idx as i64);
        Some(line)
    }

    fn peek(&self) -> Option<&str> {
        self.func.lines.get(self.idx).map(String::as_str)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Function
    }
}

/// `s:Name` and `<SID>Name` become `<SNR>{sid}_Name`; `g:Name` is
/// `Name`.
fn trans_function_name(st: &EditorState, name: &str) -> String {
    if let Some(rest) = name.strip_prefix("s:").or_else(|| name.strip_prefix("<SID>")) {
        return format!("<SNR>{}_{rest}", st.current_sid());
    }
    name.strip_prefix("g:").unwrap_or(name).to_string()
}

fn valid_func_name(raw: &str, name: &str) -> bool {
    let body = name
        .strip_prefix("<SNR>")
        .map(|r| r.trim_start_matches(|c: char| c.is_ascii_digit()).trim_start_matches('_'));
    let chars_ok = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '#')
    };
    match body {
        Some(b) => chars_ok(b),
        None => {
            chars_ok(name)
                && (name.starts_with(|c: char| c.is_ascii_uppercase())
                    || name.contains('#')
                    || raw.starts_with("g:") && name.starts_with(|c: char| c.is_ascii_uppercase()))
        }
    }
}

/// The function ended: it returned, or an error stopped a function with
/// "abort".
pub fn func_has_ended(st: &EditorState) -> bool {
    st.fcalls.last().is_some_and(|fc| {
        fc.returned
            || (fc.func.flags.contains(FuncFlags::ABORT) && st.exc.did_emsg && !st.exc.force_abort)
    })
}

pub fn func_has_abort(st: &EditorState) -> bool {
    st.fcalls
        .last()
        .is_some_and(|fc| fc.func.flags.contains(FuncFlags::ABORT))
}

pub fn current_func_returned(st: &EditorState) -> bool {
    st.fcalls.last().is_some_and(|fc| fc.returned)
}

/// Call a user function. Without a range the cursor line is used for
/// `a:firstline` and `a:lastline`.
pub fn call_user_func(st: &mut EditorState, name: &str, args: Vec<Value>) -> Result<Value> {
    call_user_func_range(st, name, args, None)
}

pub fn call_user_func_range(
    st: &mut EditorState,
    name: &str,
    args: Vec<Value>,
    range: Option<(i64, i64)>,
) -> Result<Value> {
    let fname = trans_function_name(st, name);
    let Some(func) = st.funcs.get(&fname) else {
        return Err(runtime(format!("{}: {}", e::UNKNOWN_FUNC, name)));
    };
    if st.fcalls.len() as i64 >= st.p_num(Opt::Maxfuncdepth) {
        return Err(runtime(e::FUNCDEPTH));
    }
    if args.len() < func.args.len() {
        return Err(runtime(format!("{}: {}", e::NOT_ENOUGH_ARGS, name)));
    }
    if !func.varargs && args.len() > func.args.len() {
        return Err(runtime(format!("{}: {}", e::TOO_MANY_ARGS, name)));
    }

    let (first, last) = range.unwrap_or_else(|| {
        let lnum = st.cursor().lnum;
        (lnum, lnum)
    });
    let shown: Vec<String> = args.iter().map(Value::string_repr).collect();
    let mut amap = VarMap::new();
    let extra: Vec<Value> = args[func.args.len()..].to_vec();
    amap.insert("0".to_string(), Value::Number(extra.len() as i64));
    for (i, v) in extra.iter().enumerate() {
        amap.insert((i + 1).to_string(), v.clone());
    }
    amap.insert("000".to_string(), Value::list(extra));
    for (arg, v) in func.args.iter().zip(args) {
        amap.insert(arg.clone(), v);
    }
    amap.insert("firstline".to_string(), Value::Number(first));
    amap.insert("lastline".to_string(), Value::Number(last));

    st.fcalls.push(FuncCall {
        func: Rc::clone(&func),
        locals: VarMap::new(),
        args: amap,
        returned: false,
        rettv: None,
    });
    st.sourcing.push(SourceFrame {
        kind: SourceKind::Function,
        name: func.name.clone(),
        lnum: 0,
        sid: func.sid,
        level: st.ex_nesting_level,
        finished: false,
    });
    st.ex_nesting_level += 1;
    log::debug!("calling {}({})", func.name, shown.join(", "));
    st.verbose_msg(12, &format!("calling function {}({})", func.name, shown.join(", ")));

    let saved_did_emsg = std::mem::take(&mut st.exc.did_emsg);
    let mut source = FuncSource {
        func: Rc::clone(&func),
        idx: 0,
    };
    let run = do_cmdline(
        st,
        None,
        &mut source,
        RunFlags::NOWAIT | RunFlags::VERBOSE | RunFlags::REPEAT,
    );

    let call = st.fcalls.pop();
    let failed = st.exc.did_emsg && func.flags.contains(FuncFlags::ABORT);
    let rettv = if failed {
        Value::Number(-1)
    } else {
        call.and_then(|c| c.rettv).unwrap_or(Value::Number(0))
    };
    st.verbose_msg(
        12,
        &format!("function {} returning {}", func.name, rettv.string_repr()),
    );
    st.sourcing.pop();
    st.exc.did_emsg |= saved_did_emsg;
    run?;
    Ok(rettv)
}

/// Carry out a `:return`, or make it pending when a `:finally` has to run
/// first. With `reanimate` a return that was already done is made
/// pending again. Returns `true` when the function returns now.
pub fn do_return(
    st: &mut EditorState,
    ctx: &mut CmdCtx,
    reanimate: bool,
    is_cmd: bool,
    rettv: Option<Value>,
) -> bool {
    if reanimate {
        if let Some(fc) = st.fcalls.last_mut() {
            fc.returned = false;
        }
    }

    match st.cleanup_conditionals(ctx.cstack, CondFlags::empty(), true) {
        Some(idx) => {
            let value = if reanimate {
                st.fcalls.last_mut().and_then(|fc| fc.rettv.take())
            } else {
                rettv
            };
            let frame = &mut ctx.cstack.frames[idx];
            frame.pending = Pending::RETURN;
            frame.rettv = value;
            log::trace!("return made pending (command: {is_cmd})");
            report_make_pending(st, Pending::RETURN);
            false
        }
        None => {
            if let Some(fc) = st.fcalls.last_mut() {
                fc.returned = true;
                if !reanimate {
                    if let Some(v) = rettv {
                        fc.rettv = Some(v);
                    }
                }
            }
            true
        }
    }
}

/// `:return [expr]`
pub fn ex_return(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    if st.fcalls.is_empty() {
        return Err(invalid(e::RETURN_OUTSIDE));
    }
    let mut returning = false;
    if !ends_excmd(ea.arg_str().bytes().next()) {
        match st.eval_arg(ea, ea.skip) {
            Ok(v) if !ea.skip => returning = do_return(st, ctx, false, true, Some(v)),
            Ok(_) => {}
            Err(err) if err.is_control() => return Err(err),
            // return anyway when the expression failed
            Err(_) if !ea.skip && !st.aborting() => {
                returning = do_return(st, ctx, false, true, None);
            }
            Err(_) => {}
        }
    } else {
        ea.nextcmd = check_nextcmd(ea.arg_str());
        if !ea.skip && !st.aborting() {
            returning = do_return(st, ctx, false, true, None);
        }
    }
    if returning {
        ea.nextcmd = None;
    }
    Ok(())
}

/// `:[range]call {name}({args})`
pub fn ex_call(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    if ea.skip {
        // only find the end of the command
        return st.eval_arg(ea, true).map(|_| ());
    }
    let text = ea.arg_str().to_string();
    let (expr, len) = match parse_expr(&text) {
        Ok(parsed) => parsed,
        Err(err) => {
            st.emsg(&err.message());
            return Err(Error::Aborted);
        }
    };
    let Expr::Call(name, arg_exprs) = expr else {
        return Err(invalid(format!("{}: {}", e::FUNC_NAME_REQUIRED, text)));
    };
    ea.nextcmd = check_nextcmd(&text[len..]);
    if ea.nextcmd.is_none() && len < text.len() {
        return Err(invalid(format!("{}: {}", e::TRAILING, &text[len..])));
    }

    let mut args = Vec::with_capacity(arg_exprs.len());
    for a in &arg_exprs {
        match st.eval(a) {
            Ok(v) => args.push(v),
            Err(err) if err.is_control() || matches!(err, Error::Aborted) => return Err(err),
            Err(err) => {
                st.emsg(&err.message());
                return Err(Error::Aborted);
            }
        }
    }

    let user = st.funcs.get(&trans_function_name(st, &name));
    let per_line = ea.addr_count > 0 && user.as_ref().is_some_and(|f| !f.flags.contains(FuncFlags::RANGE));
    if !per_line {
        return match user {
            Some(_) if ea.addr_count > 0 => {
                call_user_func_range(st, &name, args, Some((ea.line1, ea.line2))).map(|_| ())
            }
            _ => st.call_function(&name, args).map(|_| ()),
        };
    }

    for lnum in ea.line1..=ea.line2 {
        if lnum > st.line_count() {
            break;
        }
        st.cursor_to_line_start(lnum);
        call_user_func_range(st, &name, args.clone(), Some((lnum, lnum)))?;
        if st.aborting() {
            break;
        }
    }
    Ok(())
}

fn list_func(st: &mut EditorState, func: &UserFunc, with_body: bool) {
    if !with_body {
        st.msg_list_line(&func.head());
        return;
    }
    st.msg_list_line(&format!("   {}", func.head()));
    for (i, line) in func.lines.iter().enumerate() {
        st.msg_list_line(&format!("{:<3}{line}", i + 1));
    }
    st.msg_list_line("   endfunction");
}

/// Length of `word` abbreviated at `at`, at least `min` characters and
/// not followed by a letter.
fn abbrev_at(line: &str, at: usize, word: &str, min: usize) -> bool {
    let rest = &line[at..];
    let n = rest
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .count();
    n >= min && word.starts_with(&rest[..n])
}

/// Nesting change of one body line: +1 for a nested `:function` with an
/// argument list, -1 for `:endfunction`. Returns the offset after the
/// `:endfunction` name for the text that may follow it.
fn body_nesting(line: &str) -> (i32, usize) {
    let mut p = skipwhite_at(line, 0);
    while line.as_bytes().get(p) == Some(&b':') {
        p = skipwhite_at(line, p + 1);
    }
    if line[p..].starts_with('"') {
        return (0, 0);
    }
    if abbrev_at(line, p, "endfunction", 4) {
        let n = line[p..].bytes().take_while(u8::is_ascii_alphabetic).count();
        return (-1, p + n);
    }
    if abbrev_at(line, p, "function", 2) {
        let n = line[p..].bytes().take_while(u8::is_ascii_alphabetic).count();
        let rest = &line[p + n..];
        let rest = rest.trim_start_matches('!');
        if rest.starts_with([' ', '\t']) && rest.contains('(') {
            return (1, 0);
        }
    }
    (0, 0)
}

/// Parse `(a, b, ...)` and the flags after it.
fn parse_signature(sig: &str) -> Result<(Vec<String>, bool, FuncFlags)> {
    let close = sig
        .find(')')
        .ok_or_else(|| invalid(format!("{}: {}", e::FUNC_ILLEGAL_ARG, sig)))?;
    let mut args: Vec<String> = Vec::new();
    let mut varargs = false;
    for raw in sig[1..close].split(',') {
        let arg = raw.trim();
        if arg.is_empty() {
            if args.is_empty() && !varargs && sig[1..close].trim().is_empty() {
                break;
            }
            return Err(invalid(format!("{}: {}", e::FUNC_ILLEGAL_ARG, sig)));
        }
        if varargs {
            return Err(invalid(format!("{}: {}", e::FUNC_ILLEGAL_ARG, arg)));
        }
        if arg == "..." {
            varargs = true;
            continue;
        }
        let ok = arg.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
            && arg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !matches!(arg, "firstline" | "lastline");
        if !ok {
            return Err(invalid(format!("{}: {}", e::FUNC_ILLEGAL_ARG, arg)));
        }
        if args.iter().any(|a| a == arg) {
            return Err(invalid(format!("{}: {}", e::FUNC_DUP_ARG, arg)));
        }
        args.push(arg.to_string());
    }

    let mut flags = FuncFlags::empty();
    for word in sig[close + 1..].split_whitespace() {
        if word.starts_with('"') {
            break;
        }
        flags |= match word {
            "range" => FuncFlags::RANGE,
            "abort" => FuncFlags::ABORT,
            "dict" => FuncFlags::DICT,
            "closure" => FuncFlags::CLOSURE,
            _ => return Err(invalid(format!("{}: {}", e::TRAILING, word))),
        };
    }
    Ok((args, varargs, flags))
}

/// `:function`, `:function /pat`, `:function Name` and
/// `:function[!] Name(args) [range] [abort] [dict] [closure]`
pub fn ex_function(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let arg = ea.arg_str().to_string();

    if ends_excmd(arg.bytes().next()) {
        if !ea.skip {
            let funcs: Vec<Rc<UserFunc>> = st.funcs.iter().cloned().collect();
            for f in funcs {
                // script-local functions are only listed with their prefix
                list_func(st, &f, false);
            }
        }
        ea.nextcmd = check_nextcmd(&arg);
        return Ok(());
    }

    if let Some(pat) = arg.strip_prefix('/') {
        let pat = pat.strip_suffix('/').unwrap_or(pat);
        if !ea.skip {
            let re = crate::search::vim_regex(pat, st.p_flag(Opt::Magic), false)?;
            let funcs: Vec<Rc<UserFunc>> = st
                .funcs
                .iter()
                .filter(|f| re.is_match(&f.name))
                .cloned()
                .collect();
            for f in funcs {
                list_func(st, &f, false);
            }
        }
        return Ok(());
    }

    let name_end = arg.find(['(', ' ', '\t', '|']).unwrap_or(arg.len());
    let raw_name = arg[..name_end].to_string();
    let raw_name = raw_name.as_str();
    let name = trans_function_name(st, raw_name);
    let rest = arg[name_end..].trim_start();

    if !rest.starts_with('(') {
        // list one function
        ea.nextcmd = check_nextcmd(rest);
        if ea.skip {
            return Ok(());
        }
        return match st.funcs.get(&name) {
            Some(f) => {
                list_func(st, &f, true);
                Ok(())
            }
            None => Err(runtime(format!("{}: {}", e::FUNC_UNDEFINED, raw_name))),
        };
    }

    let bad_name = !valid_func_name(raw_name, &name);
    let signature = parse_signature(rest);

    // read the body, also when skipping or when the head is bad
    let def_lnum = st.sourcing_lnum();
    let mut lines = Vec::new();
    let mut nesting = 0;
    let mut ended = false;
    while let Some(line) = ctx.source.next_line(st, 2) {
        let (delta, after) = body_nesting(&line);
        if delta < 0 && nesting == 0 {
            ea.nextcmd = check_nextcmd(&line[after..]);
            ended = true;
            break;
        }
        nesting += delta;
        lines.push(line);
    }
    if !ended {
        return Err(invalid(e::MISSING_ENDFUNCTION));
    }
    if ea.skip {
        return Ok(());
    }
    if bad_name {
        return Err(invalid(format!("{}: {}", e::FUNC_NAME_CAPITAL, raw_name)));
    }
    let (args, varargs, flags) = signature?;

    if let Some(old) = st.funcs.get(&name) {
        if !ea.forceit {
            return Err(runtime(format!("{}: {}", e::FUNC_EXISTS, raw_name)));
        }
        if Rc::strong_count(&old) > 2 {
            return Err(runtime(format!("{} {raw_name}: It is in use", e::FUNC_IN_USE)));
        }
    }
    log::debug!("define function {name} at line {def_lnum}, {} lines", lines.len());
    let sid = st.current_sid();
    st.funcs.insert(UserFunc {
        name,
        args,
        varargs,
        lines,
        flags,
        sid,
    });
    Ok(())
}

/// A stray `:endfunction`; inside a definition it is consumed by
/// `:function`.
pub fn ex_endfunction(_st: &mut EditorState, _ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    Err(invalid(e::ENDFUNCTION_OUTSIDE))
}

/// `:delfunction[!] {name}`
pub fn ex_delfunction(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let arg = ea.arg_str().to_string();
    let end = arg.find([' ', '\t', '|', '"']).unwrap_or(arg.len());
    let raw = &arg[..end];
    ea.nextcmd = check_nextcmd(&arg[end..]);
    if raw.is_empty() {
        return Err(invalid(e::FUNC_NAME_REQUIRED));
    }
    if ea.skip {
        return Ok(());
    }
    let name = trans_function_name(st, raw);
    match st.funcs.get(&name) {
        None if ea.forceit => Ok(()),
        None => Err(runtime(format!("{}: {}", e::FUNC_UNDEF, raw))),
        Some(f) if Rc::strong_count(&f) > 2 => {
            Err(runtime(format!("{} {raw}: It is in use", e::FUNC_DELETE_IN_USE)))
        }
        Some(_) => {
            st.funcs.remove(&name);
            log::debug!("deleted function {name}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use crate::line_source::StrSource;
    use crate::runner::do_cmdline_cmd;
    use test_log::test;

    fn state() -> (EditorState, MemHost) {
        let host = MemHost::new();
        (EditorState::new(Box::new(host.clone()), false), host)
    }

    fn run(st: &mut EditorState, text: &str) {
        let mut source = StrSource::new(text);
        do_cmdline(st, None, &mut source, RunFlags::VERBOSE | RunFlags::REPEAT).unwrap();
    }

    #[test]
    fn define_and_call() {
        let (mut st, host) = state();
        run(
            &mut st,
            "function Add(a, b)\n  return a:a + a:b\nendfunction\necho Add(2, 3)",
        );
        assert_eq!(host.output(), vec!["5"]);
        assert!(st.funcs.exists("Add"));
    }

    #[test]
    fn varargs_and_locals() {
        let (mut st, host) = state();
        run(
            &mut st,
            "function! Count(...)\n let n = a:0\n return n . ':' . join(a:000, ',')\nendfunction\necho Count(1, 2, 3)",
        );
        assert_eq!(host.output(), vec!["3:1,2,3"]);
        assert!(st.get_var("g:n").is_none());
    }

    #[test]
    fn redefine_needs_bang() {
        let (mut st, host) = state();
        run(&mut st, "function F()\nendfunction\nfunction F()\nendfunction");
        assert_eq!(
            host.errors(),
            vec!["E122: Function already exists, add ! to replace it: F"]
        );
    }

    #[test]
    fn lowercase_name_is_rejected() {
        let (mut st, host) = state();
        run(&mut st, "function f()\nendfunction\necho 'after'");
        assert!(host.errors()[0].starts_with("E128"));
        assert_eq!(host.output(), vec!["after"]);
    }

    #[test]
    fn argument_count_is_checked() {
        let (mut st, host) = state();
        run(&mut st, "function F(x)\nendfunction\ncall F()\ncall F(1, 2)");
        assert_eq!(
            host.errors(),
            vec![
                "E119: Not enough arguments for function: F",
                "E118: Too many arguments for function: F"
            ]
        );
    }

    #[test]
    fn abort_stops_at_first_error() {
        let (mut st, host) = state();
        run(
            &mut st,
            "function A() abort\n  nosuch\n  echo 'no'\nendfunction\n\
             function B()\n  nosuch\n  echo 'yes'\nendfunction\n\
             let r = A()\ncall B()",
        );
        assert_eq!(host.output(), vec!["yes"]);
        assert_eq!(st.get_var("g:r").map(|v| v.to_number().unwrap()), Some(-1));
    }

    #[test]
    fn depth_is_limited() {
        let (mut st, host) = state();
        run(
            &mut st,
            "set maxfuncdepth=5\nfunction R(n)\n  return R(a:n + 1)\nendfunction\ncall R(0)",
        );
        assert!(host.errors().iter().any(|m| m.starts_with("E132")));
        assert!(st.fcalls.is_empty());
    }

    #[test]
    fn return_in_try_runs_finally() {
        let (mut st, host) = state();
        run(
            &mut st,
            "function F()\n  try\n    return 1\n  finally\n    echo 'fin'\n  endtry\n  return 2\nendfunction\necho F()",
        );
        assert_eq!(host.output(), vec!["fin", "1"]);
    }

    #[test]
    fn return_outside_function() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "return 1").unwrap();
        assert_eq!(host.errors(), vec!["E133: :return not inside a function: return 1"]);
    }

    #[test]
    fn range_call_runs_per_line() {
        let (mut st, _) = state();
        st.curbuf_mut().load_text("a\nb\nc\n");
        run(
            &mut st,
            "let g:seen = []\nfunction L()\n  call add(g:seen, line('.'))\nendfunction\n1,3call L()",
        );
        let seen = st.get_var("g:seen").unwrap().string_repr();
        assert_eq!(seen, "[1, 2, 3]");
    }

    #[test]
    fn listing_and_delete() {
        let (mut st, host) = state();
        run(&mut st, "function G(x) abort\n  echo a:x\nendfunction\nfunction G\ndelfunction G");
        assert_eq!(
            host.output(),
            vec!["   function G(x) abort", "1    echo a:x", "   endfunction"]
        );
        assert!(!st.funcs.exists("G"));
        do_cmdline_cmd(&mut st, "delfunction G").unwrap();
        assert_eq!(host.errors(), vec!["E130: Unknown function: G"]);
    }

    #[test]
    fn script_local_names() {
        let (mut st, host) = state();
        run(&mut st, "function s:Hidden()\n  return 7\nendfunction\necho s:Hidden()");
        assert_eq!(host.output(), vec!["7"]);
        assert!(st.funcs.exists("<SNR>0_Hidden"));
    }

    #[test]
    fn nested_definition_body() {
        assert_eq!(body_nesting("  function Inner()").0, 1);
        assert_eq!(body_nesting("endfunc | echo 1"), (-1, 7));
        assert_eq!(body_nesting("\" endfunction").0, 0);
        assert_eq!(body_nesting("  endif").0, 0);
    }
}
