//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Commands built on the expression evaluator: `:echo` and friends,
//! `:execute`, `:eval`, `:let`, `:unlet` and `:messages`.

use crate::charset::skipwhite_at;
use crate::cmds::Cmd;
use crate::docmd::{check_nextcmd, CmdCtx, ExArgs};
use crate::error::{e, invalid, runtime, Error, Result};
use crate::eval::parser::{self, BinOp};
use crate::eval::{binary, Value, VarMap};
use crate::options::{OptKind, OptLevel, OptVal};
use crate::registers::{valid_yank_reg, RegContent};
use crate::runner::{do_cmdline, RunFlags};
use crate::search::PatKind;
use crate::state::EditorState;

/// Evaluate the blank separated expressions of the argument. Stops at a
/// `|` and sets the next command. An error is reported here.
fn eval_list(st: &mut EditorState, ea: &mut ExArgs) -> Result<Vec<Value>> {
    let skip = ea.skip;
    let mut values = Vec::new();
    let mut p = ea.arg;
    loop {
        p = skipwhite_at(&ea.cmdline, p);
        let rest = ea.cmdline[p..].to_string();
        if rest.is_empty() {
            break;
        }
        if let Some(next) = check_nextcmd(&rest) {
            ea.nextcmd = Some(next);
            break;
        }
        if skip {
            st.exc.emsg_skip += 1;
        }
        let result = st.eval_expr(&rest, skip);
        if skip {
            st.exc.emsg_skip -= 1;
        }
        match result {
            Ok((v, len)) => {
                if !skip {
                    values.push(v);
                }
                p += len.max(1);
            }
            Err(err) if err.is_control() => return Err(err),
            Err(Error::Aborted) => return Err(Error::Aborted),
            Err(err) => {
                if !st.aborting() {
                    st.emsg(&err.message());
                }
                return Err(Error::Aborted);
            }
        }
    }
    Ok(values)
}

/// `:echo` and `:echon`
pub fn ex_echo(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let values = eval_list(st, ea)?;
    if ea.skip {
        return Ok(());
    }
    if ea.cmd == Cmd::Echon {
        for v in &values {
            st.msg_partial(&v.to_string());
        }
        return Ok(());
    }
    let text: Vec<String> = values.iter().map(Value::to_string).collect();
    let text = text.join(" ");
    // a string with line breaks is shown as several lines
    for line in text.split('\n') {
        st.msg(line);
    }
    Ok(())
}

/// `:execute`, `:echomsg` and `:echoerr`: the values are joined with a
/// space, then executed or shown.
pub fn ex_execute(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let values = eval_list(st, ea)?;
    if ea.skip {
        return Ok(());
    }
    let mut parts = Vec::with_capacity(values.len());
    for v in &values {
        parts.push(if ea.cmd == Cmd::Execute {
            v.to_str()?
        } else {
            v.to_string()
        });
    }
    let text = parts.join(" ");

    match ea.cmd {
        Cmd::Echomsg => {
            st.msg_hist(&text);
            Ok(())
        }
        Cmd::Echoerr => {
            st.emsg(&text);
            Ok(())
        }
        _ => {
            log::trace!("execute {text:?}");
            // the executed line may read more lines from the same source
            st.execute_depth += 1;
            let res = do_cmdline(
                st,
                Some(&text),
                &mut *ctx.source,
                RunFlags::NOWAIT | RunFlags::VERBOSE,
            );
            st.execute_depth -= 1;
            res
        }
    }
}

/// `:eval expr` evaluates and drops the value.
pub fn ex_eval(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let skip = ea.skip;
    st.eval_arg(ea, skip).map(|_| ())
}

/// What `:let` assigns to.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    Var(String),
    Item(String, String),
    Option { name: String, scope: Option<char> },
    Register(char),
    Env(String),
    Unpack { names: Vec<String>, rest: Option<String> },
}

fn bad_name(text: &str) -> Error {
    invalid(format!("E461: Illegal variable name: {text}"))
}

/// Parse one name with its optional `x:` scope at the start of `s`.
/// Returns the name and its length.
fn var_name(s: &str) -> Result<(String, usize)> {
    match parser::name(s) {
        Ok((rest, name)) => Ok((name.to_string(), s.len() - rest.len())),
        Err(_) => Err(bad_name(s)),
    }
}

/// Parse the target of `:let` at the start of `s`. Returns the target
/// and its length.
fn parse_target(s: &str) -> Result<(Target, usize)> {
    let b = s.as_bytes();
    match b.first() {
        Some(b'&') => {
            let (scope, at) = match (b.get(1), b.get(2)) {
                (Some(&c @ (b'l' | b'g')), Some(b':')) => (Some(c as char), 3),
                _ => (None, 1),
            };
            let len = s[at..]
                .bytes()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == b'_')
                .count();
            if len == 0 {
                return Err(invalid(format!("E112: Option name missing: {s}")));
            }
            Ok((
                Target::Option {
                    name: s[at..at + len].to_string(),
                    scope,
                },
                at + len,
            ))
        }
        Some(b'@') => match s[1..].chars().next() {
            Some(c) => Ok((Target::Register(c), 1 + c.len_utf8())),
            None => Err(invalid(format!("{}: {}", e::INVARG, s))),
        },
        Some(b'$') => {
            let len = s[1..]
                .bytes()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == b'_')
                .count();
            if len == 0 {
                return Err(invalid(format!("E475: Invalid argument: {s}")));
            }
            Ok((Target::Env(s[1..1 + len].to_string()), 1 + len))
        }
        Some(b'[') => {
            let mut names = Vec::new();
            let mut rest = None;
            let mut p = 1;
            loop {
                p = skipwhite_at(s, p);
                let (name, len) = var_name(&s[p..])?;
                p = skipwhite_at(s, p + len);
                match b.get(p) {
                    Some(b',') if rest.is_none() => names.push(name),
                    Some(b';') if rest.is_none() => {
                        names.push(name);
                        p = skipwhite_at(s, p + 1);
                        let (r, len) = var_name(&s[p..])?;
                        rest = Some(r);
                        p = skipwhite_at(s, p + len);
                        if b.get(p) != Some(&b']') {
                            return Err(invalid(format!("E452: Double ; in list of variables: {s}")));
                        }
                        return Ok((Target::Unpack { names, rest }, p + 1));
                    }
                    Some(b']') => {
                        names.push(name);
                        return Ok((Target::Unpack { names, rest }, p + 1));
                    }
                    _ => return Err(invalid(format!("E475: Invalid argument: {s}"))),
                }
                p += 1;
            }
        }
        _ => {
            let (name, len) = var_name(s)?;
            if b.get(len) == Some(&b'[') {
                let (_, ilen) = parser::parse_expr(&s[len + 1..])?;
                let close = skipwhite_at(s, len + 1 + ilen);
                if b.get(close) != Some(&b']') {
                    return Err(invalid(format!("E111: Missing ']': {s}")));
                }
                let index = s[len + 1..len + 1 + ilen].to_string();
                return Ok((Target::Item(name, index), close + 1));
            }
            Ok((Target::Var(name), len))
        }
    }
}

/// The assignment operator at the start of `s`: the arithmetic to apply
/// and its length. `None` for a plain `=`.
fn parse_op(s: &str) -> Option<(Option<BinOp>, usize)> {
    let ops: [(&str, Option<BinOp>); 8] = [
        ("..=", Some(BinOp::Concat)),
        (".=", Some(BinOp::Concat)),
        ("+=", Some(BinOp::Add)),
        ("-=", Some(BinOp::Sub)),
        ("*=", Some(BinOp::Mul)),
        ("/=", Some(BinOp::Div)),
        ("%=", Some(BinOp::Mod)),
        ("=", None),
    ];
    ops.iter()
        .find(|(tok, _)| s.starts_with(tok) && !s[tok.len()..].starts_with('='))
        .map(|(tok, op)| (*op, tok.len()))
}

/// `:let`
pub fn ex_let(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let arg = ea.arg_str().to_string();
    if arg.is_empty() || arg.starts_with('"') {
        if !ea.skip {
            list_all_vars(st);
        }
        return Ok(());
    }
    if let Some(next) = check_nextcmd(&arg) {
        ea.nextcmd = Some(next);
        if !ea.skip {
            list_all_vars(st);
        }
        return Ok(());
    }

    let (target, tlen) = parse_target(&arg)?;
    let at = skipwhite_at(&arg, tlen);
    let rest = &arg[at..];

    if let Some(body) = rest.strip_prefix("=<<") {
        let lines = heredoc(st, body, ctx)?;
        if ea.skip {
            return Ok(());
        }
        return assign(st, &target, None, Value::list(lines.into_iter().map(Value::String).collect()));
    }

    let Some((op, oplen)) = parse_op(rest) else {
        // ":let a b" lists the named variables
        return list_named_vars(st, ea, &arg);
    };
    let skip = ea.skip;
    let value = st.eval_arg_at(ea, at + oplen, skip)?;
    if skip {
        return Ok(());
    }
    assign(st, &target, op, value)
}

/// Lines of a `:let x =<< [trim] END` block, read from the line source.
fn heredoc(st: &mut EditorState, spec: &str, ctx: &mut CmdCtx) -> Result<Vec<String>> {
    let mut words: Vec<&str> = spec.split_whitespace().collect();
    let trim = words.first() == Some(&"trim");
    if trim {
        words.remove(0);
    }
    let marker = match words.as_slice() {
        [] => return Err(invalid("E172: Missing marker")),
        [m] => m.to_string(),
        _ => return Err(invalid(format!("{}: {}", e::TRAILING, spec.trim()))),
    };
    if marker.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid(format!("E221: Marker cannot start with lower case letter: {marker}")));
    }

    let mut lines = Vec::new();
    let mut indent: Option<String> = None;
    loop {
        let Some(line) = ctx.source.next_line(st, 0) else {
            return Err(runtime(format!("E990: Missing end marker '{marker}'")));
        };
        let text = if trim { line.trim_start() } else { line.as_str() };
        if text == marker {
            break;
        }
        if trim {
            let ind = indent.get_or_insert_with(|| {
                let n = line.len() - line.trim_start().len();
                line[..n].to_string()
            });
            lines.push(line.strip_prefix(ind.as_str()).unwrap_or(&line).to_string());
        } else {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn apply_op(op: Option<BinOp>, old: Option<Value>, value: Value, name: &str) -> Result<Value> {
    match op {
        None => Ok(value),
        Some(op) => {
            let old = old.ok_or_else(|| runtime(format!("{}: {}", e::UNDEFVAR, name)))?;
            binary(op, old, value)
        }
    }
}

fn assign(st: &mut EditorState, target: &Target, op: Option<BinOp>, value: Value) -> Result<()> {
    match target {
        Target::Var(name) => {
            let new = apply_op(op, st.get_var(name), value, name)?;
            st.set_var(name, new)
        }
        Target::Item(name, index) => {
            let Some(Value::List(list)) = st.get_var(name) else {
                return Err(runtime(format!("E689: Can only index a List: {name}")));
            };
            let idx = st.eval_str(index)?.to_number()?;
            let len = list.borrow().len() as i64;
            let i = if idx < 0 { len + idx } else { idx };
            if i < 0 || i >= len {
                return Err(runtime(format!("{}: {}", e::LIST_INDEX, idx)));
            }
            let old = list.borrow()[i as usize].clone();
            let new = apply_op(op, Some(old), value, name)?;
            list.borrow_mut()[i as usize] = new;
            Ok(())
        }
        Target::Option { name, scope } => {
            let opt = st
                .options
                .find(name)
                .ok_or_else(|| runtime(format!("E355: Unknown option: {name}")))?;
            let spec = opt.spec();
            if (st.secure > 0 || st.sandbox > 0)
                && spec.flags.contains(crate::options::OptFlags::SECURE)
            {
                return Err(runtime(e::NOT_ALLOWED));
            }
            let old = st.option_value(name, *scope)?;
            let new = apply_op(op, Some(old), value, name)?;
            let val = match spec.kind() {
                OptKind::Bool => OptVal::Bool(new.to_number()? != 0),
                OptKind::Number => OptVal::Num(new.to_number()?),
                OptKind::String => OptVal::Str(new.to_str()?),
            };
            let level = match scope {
                Some('l') => OptLevel::Local,
                Some('g') => OptLevel::Global,
                _ => OptLevel::Both,
            };
            crate::options::set::set_option_value(st, opt, val, level, false)
        }
        Target::Register(r) => {
            let old = Some(Value::String(st.register_value(*r)?));
            let text = apply_op(op, old, value, "@")?.to_str()?;
            match r {
                '/' => {
                    st.save_pattern(&text, PatKind::Search);
                    Ok(())
                }
                '@' => {
                    st.regs.set('"', reg_content(&text));
                    Ok(())
                }
                c if valid_yank_reg(*c, true) => {
                    st.regs.set(*c, reg_content(&text));
                    Ok(())
                }
                c => Err(runtime(format!("E354: Invalid register name: '{c}'"))),
            }
        }
        Target::Env(name) => {
            let old = Some(Value::String(std::env::var(name).unwrap_or_default()));
            let text = apply_op(op, old, value, name)?.to_str()?;
            std::env::set_var(name, text);
            Ok(())
        }
        Target::Unpack { names, rest } => {
            let Value::List(list) = value else {
                return Err(runtime(e::LIST_REQUIRED));
            };
            let items = list.borrow().clone();
            let n = names.len();
            if items.len() < n {
                return Err(runtime("E688: More targets than List items"));
            }
            if rest.is_none() && items.len() > n {
                return Err(runtime("E687: Less targets than List items"));
            }
            for (name, v) in names.iter().zip(items.iter()) {
                assign(st, &Target::Var(name.clone()), op, v.clone())?;
            }
            if let Some(rest) = rest {
                assign(st, &Target::Var(rest.clone()), op, Value::list(items[n..].to_vec()))?;
            }
            Ok(())
        }
    }
}

/// A string ending in a line break is stored linewise.
fn reg_content(text: &str) -> RegContent {
    match text.strip_suffix('\n') {
        Some(body) => RegContent::lines(body.split('\n').map(str::to_string).collect()),
        None => RegContent::chars(text),
    }
}

/// One line of a variable listing: name, type mark, value.
fn var_line(name: &str, v: &Value) -> String {
    let mut line = format!("{name} ");
    while line.len() < 22 {
        line.push(' ');
    }
    let shown = v.to_string();
    match v {
        Value::Number(_) => line.push('#'),
        Value::Func(_) => line.push('*'),
        _ => line.push(' '),
    }
    line.push_str(&shown);
    line
}

fn list_map(st: &mut EditorState, prefix: &str, vars: &VarMap) {
    for (name, v) in vars {
        st.msg_list_line(&var_line(&format!("{prefix}{name}"), v));
    }
}

fn list_all_vars(st: &mut EditorState) {
    let fnum = st.curbuf_fnum();
    let winid = st.curwin().id;
    let tab = st.layout.cur_tab;
    let sid = st.current_sid();
    let scoped: Vec<(&str, VarMap)> = vec![
        ("b:", st.vars.buf.get(&fnum).cloned().unwrap_or_default()),
        ("w:", st.vars.win.get(&winid).cloned().unwrap_or_default()),
        ("t:", st.vars.tab.get(&tab).cloned().unwrap_or_default()),
        ("", st.vars.globals.clone()),
        ("s:", st.vars.script.get(&sid).cloned().unwrap_or_default()),
        (
            "l:",
            st.fcalls.last().map(|f| f.locals.clone()).unwrap_or_default(),
        ),
    ];
    for (prefix, vars) in scoped {
        list_map(st, prefix, &vars);
    }
}

fn list_named_vars(st: &mut EditorState, ea: &mut ExArgs, arg: &str) -> Result<()> {
    let mut p = 0;
    loop {
        p = skipwhite_at(arg, p);
        let rest = &arg[p..];
        if rest.is_empty() {
            break;
        }
        if let Some(next) = check_nextcmd(rest) {
            ea.nextcmd = Some(next);
            break;
        }
        let (target, len) = parse_target(rest)?;
        let after = arg.as_bytes().get(p + len);
        if after.is_some_and(|&c| !matches!(c, b' ' | b'\t' | b'|')) {
            return Err(invalid(format!("{}: {}", e::TRAILING, &rest[len..])));
        }
        p += len;
        if ea.skip {
            continue;
        }
        match target {
            Target::Var(name) => match st.get_var(&name) {
                Some(v) => st.msg_list_line(&var_line(&name, &v)),
                None => return Err(runtime(format!("{}: {}", e::UNDEFVAR, name))),
            },
            Target::Option { name, scope } => {
                let v = st.option_value(&name, scope)?;
                st.msg_list_line(&var_line(&format!("&{name}"), &v));
            }
            Target::Register(r) => {
                let v = Value::String(st.register_value(r)?);
                st.msg_list_line(&var_line(&format!("@{r}"), &v));
            }
            Target::Env(name) => {
                let v = Value::String(std::env::var(&name).unwrap_or_default());
                st.msg_list_line(&var_line(&format!("${name}"), &v));
            }
            _ => return Err(invalid(format!("E475: Invalid argument: {rest}"))),
        }
    }
    Ok(())
}

/// `:unlet[!] {name} ...`
pub fn ex_unlet(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let arg = ea.arg_str().to_string();
    let mut p = 0;
    loop {
        p = skipwhite_at(&arg, p);
        let rest = &arg[p..];
        if rest.is_empty() {
            break;
        }
        if let Some(next) = check_nextcmd(rest) {
            ea.nextcmd = Some(next);
            break;
        }
        let (target, len) = parse_target(rest)?;
        p += len;
        if ea.skip {
            continue;
        }
        match target {
            Target::Var(name) => st.unlet_var(&name, ea.forceit)?,
            Target::Env(name) => std::env::remove_var(name),
            Target::Item(name, index) => {
                let Some(Value::List(list)) = st.get_var(&name) else {
                    return Err(runtime(format!("E689: Can only index a List: {name}")));
                };
                let idx = st.eval_str(&index)?.to_number()?;
                let len = list.borrow().len() as i64;
                let i = if idx < 0 { len + idx } else { idx };
                if i < 0 || i >= len {
                    return Err(runtime(format!("{}: {}", e::LIST_INDEX, idx)));
                }
                list.borrow_mut().remove(i as usize);
            }
            _ => return Err(invalid(format!("E475: Invalid argument: {rest}"))),
        }
    }
    Ok(())
}

/// `:[N]messages [clear]`
pub fn ex_messages(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    match ea.arg_str() {
        "" => {}
        "clear" => {
            if ea.addr_count == 0 {
                st.msgs.history.clear();
            } else {
                // keep the newest N
                let keep = ea.line2.max(0) as usize;
                let len = st.msgs.history.len();
                st.msgs.history.drain(..len.saturating_sub(keep));
            }
            return Ok(());
        }
        other => return Err(invalid(format!("{}: {}", e::INVARG, other))),
    }
    let history = st.msgs.history.clone();
    let start = if ea.addr_count > 0 {
        history.len().saturating_sub(ea.line2.max(0) as usize)
    } else {
        0
    };
    // listing the history must not grow it
    for line in &history[start..] {
        st.msg(line);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use crate::options::Opt;
    use crate::runner::do_cmdline_cmd;
    use test_log::test;

    fn state() -> (EditorState, MemHost) {
        let host = MemHost::new();
        (EditorState::new(Box::new(host.clone()), false), host)
    }

    fn run(st: &mut EditorState, cmd: &str) {
        do_cmdline_cmd(st, cmd).unwrap();
    }

    #[test]
    fn echo_joins_with_spaces() {
        let (mut st, host) = state();
        run(&mut st, "echo 'a' 1 [2, 'x'] | echon 'p' 'q'");
        st.msg_end();
        assert_eq!(host.output(), vec!["a 1 [2, 'x']", "pq"]);
    }

    #[test]
    fn echo_error_stops_the_line() {
        let (mut st, host) = state();
        run(&mut st, "echo nosuch | echo 'after'");
        assert_eq!(host.errors(), vec!["E121: Undefined variable: nosuch"]);
        assert!(host.output().is_empty());
    }

    #[test]
    fn execute_runs_the_joined_text() {
        let (mut st, host) = state();
        run(&mut st, "let cmd = 'echo' | execute cmd '\"hi\"'");
        assert_eq!(host.output(), vec!["hi"]);
        run(&mut st, "execute 'let g:a = 1 | let g:b = 2'");
        assert_eq!(st.get_var("g:b"), Some(Value::Number(2)));
    }

    #[test]
    fn echomsg_keeps_history() {
        let (mut st, host) = state();
        run(&mut st, "echomsg 'one' | echo 'two' | echomsg 'three'");
        assert_eq!(host.output(), vec!["one", "two", "three"]);
        assert_eq!(st.msgs.history, vec!["one", "three"]);
        run(&mut st, "1messages");
        assert_eq!(host.output().last().map(String::as_str), Some("three"));
        run(&mut st, "messages clear");
        assert!(st.msgs.history.is_empty());
    }

    #[test]
    fn echoerr_inside_try_is_an_exception() {
        let (mut st, _host) = state();
        run(
            &mut st,
            "try | echoerr 'bad' | catch | let g:exc = v:exception | endtry",
        );
        assert_eq!(st.get_var("g:exc"), Some(Value::str("Vim(echoerr):bad")));
    }

    #[test]
    fn let_operators() {
        let (mut st, _) = state();
        run(&mut st, "let n = 5 | let n += 2 | let n *= 3 | let n -= 1 | let n /= 4");
        assert_eq!(st.get_var("n"), Some(Value::Number(5)));
        run(&mut st, "let s = 'a' | let s .= 'b' | let s ..= 'c'");
        assert_eq!(st.get_var("s"), Some(Value::str("abc")));
        run(&mut st, "let l = [1] | let l += [2]");
        assert_eq!(st.get_var("l").map(|v| v.to_string()), Some("[1, 2]".to_string()));
    }

    #[test]
    fn let_unpack_and_index() {
        let (mut st, _) = state();
        run(&mut st, "let [a, b; rest] = [1, 2, 3, 4]");
        assert_eq!(st.get_var("a"), Some(Value::Number(1)));
        assert_eq!(st.get_var("b"), Some(Value::Number(2)));
        assert_eq!(st.get_var("rest").map(|v| v.to_string()), Some("[3, 4]".to_string()));
        run(&mut st, "let rest[-1] = 9 | let rest[0] += 1");
        assert_eq!(st.get_var("rest").map(|v| v.to_string()), Some("[4, 9]".to_string()));
    }

    #[test]
    fn let_unpack_count_mismatch() {
        let (mut st, host) = state();
        run(&mut st, "let [a, b] = [1]");
        assert_eq!(host.errors(), vec!["E688: More targets than List items"]);
    }

    #[test]
    fn let_option_register_env() {
        let (mut st, _) = state();
        run(&mut st, "let &tabstop = 4 | let &ts += 2");
        assert_eq!(st.p_num(Opt::Tabstop), 6);
        run(&mut st, "let &l:shiftwidth = 3");
        assert_eq!(st.p_num(Opt::Shiftwidth), 3);
        run(&mut st, "let &ignorecase = 1");
        assert!(st.p_flag(Opt::Ignorecase));
        run(&mut st, "let @a = 'text' | let @A = '!'");
        assert_eq!(st.register_value('a').unwrap(), "text!");
        run(&mut st, "let @/ = 'pat'");
        assert_eq!(st.search.last_search.as_deref(), Some("pat"));
        run(&mut st, "let $EXCMD_LET_TEST = 'env'");
        assert_eq!(std::env::var("EXCMD_LET_TEST").as_deref(), Ok("env"));
    }

    #[test]
    fn let_unknown_option() {
        let (mut st, host) = state();
        run(&mut st, "let &nosuchopt = 1");
        assert_eq!(host.errors(), vec!["E355: Unknown option: nosuchopt"]);
    }

    #[test]
    fn let_lists_variables() {
        let (mut st, host) = state();
        run(&mut st, "let g:num = 3 | let g:str = 'x' | let num str");
        assert_eq!(
            host.output(),
            vec![
                "num                   #3".to_string(),
                "str                    x".to_string()
            ]
        );
        run(&mut st, "let undefined_one");
        assert_eq!(host.errors(), vec!["E121: Undefined variable: undefined_one"]);
    }

    #[test]
    fn heredoc_reads_following_lines() {
        let (mut st, _) = state();
        let mut src = crate::line_source::StrSource::new(
            "let lines =<< trim END\n    one\n      two\n    END\necho 'x'",
        );
        do_cmdline(&mut st, None, &mut src, RunFlags::VERBOSE | RunFlags::REPEAT).unwrap();
        assert_eq!(
            st.get_var("lines").map(|v| v.to_string()),
            Some("['one', '  two']".to_string())
        );
    }

    #[test]
    fn unlet_variables() {
        let (mut st, host) = state();
        run(&mut st, "let g:x = 1 | let l = [1, 2, 3] | unlet g:x l[1]");
        assert_eq!(st.get_var("g:x"), None);
        assert_eq!(st.get_var("l").map(|v| v.to_string()), Some("[1, 3]".to_string()));
        run(&mut st, "unlet! g:x");
        assert!(host.errors().is_empty());
        run(&mut st, "unlet g:x");
        assert_eq!(host.errors(), vec!["E108: No such variable: g:x"]);
    }

    #[test]
    fn skipped_let_does_nothing() {
        let (mut st, _) = state();
        run(&mut st, "if 0 | let g:x = nosuch | endif");
        assert_eq!(st.get_var("g:x"), None);
    }

    #[test]
    fn eval_discards_value() {
        let (mut st, host) = state();
        run(&mut st, "eval 1 + 2");
        assert!(host.output().is_empty() && host.errors().is_empty());
    }
}
