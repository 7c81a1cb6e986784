//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Builtin functions callable from expressions.

use crate::charset::{str2nr, NumBases};
use crate::error::{e, invalid, runtime, Result};
use crate::eval::Value;
use crate::options::Opt;
use crate::registers::RegContent;
use crate::state::EditorState;

type BuiltinFn = fn(&mut EditorState, &[Value]) -> Result<Value>;

struct Builtin {
    name: &'static str,
    min_args: usize,
    max_args: usize,
    func: BuiltinFn,
}

macro_rules! builtins {
    ($($name:literal, $min:literal, $max:literal, $func:ident;)*) => {
        static BUILTINS: &[Builtin] = &[
            $(Builtin { name: $name, min_args: $min, max_args: $max, func: $func },)*
        ];
    };
}

// sorted by name
builtins! {
    "abs", 1, 1, f_abs;
    "add", 2, 2, f_add;
    "append", 2, 2, f_append;
    "argc", 0, 0, f_argc;
    "argv", 0, 1, f_argv;
    "bufname", 0, 1, f_bufname;
    "bufnr", 0, 1, f_bufnr;
    "call", 2, 2, f_call;
    "col", 1, 1, f_col;
    "copy", 1, 1, f_copy;
    "count", 2, 3, f_count;
    "deepcopy", 1, 1, f_deepcopy;
    "empty", 1, 1, f_empty;
    "escape", 2, 2, f_escape;
    "exists", 1, 1, f_exists;
    "expand", 1, 1, f_expand;
    "filereadable", 1, 1, f_filereadable;
    "fnamemodify", 2, 2, f_fnamemodify;
    "function", 1, 1, f_function;
    "get", 2, 3, f_get;
    "getline", 1, 2, f_getline;
    "getreg", 0, 1, f_getreg;
    "has", 1, 1, f_has;
    "index", 2, 4, f_index;
    "insert", 2, 3, f_insert;
    "join", 1, 2, f_join;
    "len", 1, 1, f_len;
    "line", 1, 1, f_line;
    "match", 2, 2, f_match;
    "matchstr", 2, 2, f_matchstr;
    "max", 1, 1, f_max;
    "min", 1, 1, f_min;
    "printf", 1, 20, f_printf;
    "range", 1, 3, f_range;
    "remove", 2, 3, f_remove;
    "repeat", 2, 2, f_repeat;
    "reverse", 1, 1, f_reverse;
    "setline", 2, 2, f_setline;
    "setqflist", 1, 1, f_setqflist;
    "setreg", 2, 3, f_setreg;
    "sort", 1, 2, f_sort;
    "split", 1, 3, f_split;
    "str2nr", 1, 2, f_str2nr;
    "string", 1, 1, f_string;
    "strlen", 1, 1, f_strlen;
    "submatch", 1, 1, f_submatch;
    "substitute", 4, 4, f_substitute;
    "tabpagenr", 0, 1, f_tabpagenr;
    "tolower", 1, 1, f_tolower;
    "toupper", 1, 1, f_toupper;
    "tr", 3, 3, f_tr;
    "trim", 1, 1, f_trim;
    "type", 1, 1, f_type;
    "winnr", 0, 1, f_winnr;
}

fn find(name: &str) -> Option<&'static Builtin> {
    BUILTINS
        .binary_search_by(|b| b.name.cmp(name))
        .ok()
        .map(|i| &BUILTINS[i])
}

pub fn is_builtin(name: &str) -> bool {
    find(name).is_some()
}

/// Run builtin `name`. `None` when there is no such builtin.
pub fn call_builtin(st: &mut EditorState, name: &str, args: &[Value]) -> Option<Result<Value>> {
    let b = find(name)?;
    if args.len() < b.min_args {
        return Some(Err(runtime(format!("{}: {}", e::NOT_ENOUGH_ARGS, name))));
    }
    if args.len() > b.max_args {
        return Some(Err(runtime(format!("{}: {}", e::TOO_MANY_ARGS, name))));
    }
    Some((b.func)(st, args))
}

fn list_arg(v: &Value) -> Result<crate::eval::ListRef> {
    match v {
        Value::List(l) => Ok(l.clone()),
        _ => Err(runtime(e::LIST_REQUIRED)),
    }
}

/// A line number argument: a number or a position such as ".", "$" or
/// "'a".
fn lnum_arg(st: &EditorState, v: &Value) -> Result<i64> {
    if let Value::String(s) = v {
        return Ok(match s.as_str() {
            "." => st.cursor().lnum,
            "$" => st.line_count(),
            s if s.starts_with('\'') => s[1..]
                .chars()
                .next()
                .and_then(|c| st.curbuf().mark(c))
                .map(|p| p.lnum)
                .unwrap_or(0),
            s => str2nr(s, NumBases::ALL).map(|(n, _)| n).unwrap_or(0),
        });
    }
    v.to_number()
}

fn f_abs(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::Number(a[0].to_number()?.wrapping_abs()))
}

fn f_add(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    list_arg(&a[0])?.borrow_mut().push(a[1].clone());
    Ok(a[0].clone())
}

fn lines_of(v: &Value) -> Result<Vec<String>> {
    match v {
        Value::List(l) => l.borrow().iter().map(|v| v.to_str()).collect(),
        other => Ok(vec![other.to_str()?]),
    }
}

fn f_append(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let lnum = lnum_arg(st, &a[0])?;
    if lnum < 0 || lnum > st.line_count() {
        return Ok(Value::Number(1));
    }
    let lines = lines_of(&a[1])?;
    st.u_save()?;
    st.curbuf_mut().append(lnum, lines);
    st.changed();
    Ok(Value::Number(0))
}

fn buf_arg(st: &EditorState, v: Option<&Value>) -> Option<usize> {
    match v {
        None => Some(st.curbuf_fnum()),
        Some(Value::Number(n)) => st.bufs.get(*n as usize).map(|b| b.fnum),
        Some(v) => {
            let s = v.to_str().ok()?;
            match s.as_str() {
                "" | "%" => Some(st.curbuf_fnum()),
                "#" => st.curwin().alt,
                "$" => Some(st.bufs.last_fnum()),
                name => st.bufs.find_by_name(name).or_else(|| {
                    let m = st.bufs.find_matching(name);
                    (m.len() == 1).then(|| m[0])
                }),
            }
        }
    }
}

fn f_argc(st: &mut EditorState, _a: &[Value]) -> Result<Value> {
    Ok(Value::Number(st.layout.args.len() as i64))
}

/// `argv()` is the list of arguments, `argv(n)` the n-th one.
fn f_argv(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    match a.first() {
        Some(v) => {
            let idx = v.to_number()?;
            let arg = usize::try_from(idx)
                .ok()
                .and_then(|i| st.layout.args.get(i).cloned())
                .unwrap_or_default();
            Ok(Value::String(arg))
        }
        None => Ok(Value::list(
            st.layout.args.iter().map(|s| Value::str(s.as_str())).collect(),
        )),
    }
}

fn f_bufname(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let name = buf_arg(st, a.first())
        .and_then(|n| st.bufs.get(n))
        .and_then(|b| b.name.clone())
        .unwrap_or_default();
    Ok(Value::String(name))
}

fn f_bufnr(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::Number(
        buf_arg(st, a.first()).map(|n| n as i64).unwrap_or(-1),
    ))
}

fn f_call(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let name = a[0].to_str()?;
    let args = list_arg(&a[1])?.borrow().clone();
    st.call_function(&name, args)
}

fn f_col(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let s = a[0].to_str()?;
    Ok(Value::Number(match s.as_str() {
        "." => st.cursor().col as i64 + 1,
        "$" => {
            let lnum = st.cursor().lnum;
            st.curbuf().get(lnum).len() as i64 + 1
        }
        _ => 0,
    }))
}

fn f_copy(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(match &a[0] {
        Value::List(l) => Value::list(l.borrow().clone()),
        other => other.clone(),
    })
}

fn deep(v: &Value) -> Value {
    match v {
        Value::List(l) => Value::list(l.borrow().iter().map(deep).collect()),
        other => other.clone(),
    }
}

fn f_deepcopy(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(deep(&a[0]))
}

fn f_count(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let ic = match a.get(2) {
        Some(v) => v.truthy()?,
        None => false,
    };
    let mut n = 0;
    match &a[0] {
        Value::List(l) => {
            for item in l.borrow().iter() {
                if item.type_nr() == a[1].type_nr() && item.equals(&a[1], ic)? {
                    n += 1;
                }
            }
        }
        other => {
            let (hay, needle) = (other.to_str()?, a[1].to_str()?);
            if !needle.is_empty() {
                n = if ic {
                    hay.to_lowercase().matches(&needle.to_lowercase()).count()
                } else {
                    hay.matches(&needle).count()
                } as i64;
            }
        }
    }
    Ok(Value::Number(n))
}

fn f_empty(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::from(a[0].is_empty()))
}

fn f_escape(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let chars = a[1].to_str()?;
    let mut out = String::new();
    for c in a[0].to_str()?.chars() {
        if chars.contains(c) || c == '\\' && chars.contains('\\') {
            out.push('\\');
        }
        out.push(c);
    }
    Ok(Value::String(out))
}

fn f_exists(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let name = a[0].to_str()?;
    let found = if let Some(opt) = name.strip_prefix('&').or_else(|| name.strip_prefix('+')) {
        let opt = opt.strip_prefix("l:").or_else(|| opt.strip_prefix("g:")).unwrap_or(opt);
        st.options.find(opt).is_some()
    } else if let Some(var) = name.strip_prefix('$') {
        std::env::var_os(var).is_some()
    } else if let Some(f) = name.strip_prefix('*') {
        is_builtin(f) || st.funcs.exists(f)
    } else if let Some(cmd) = name.strip_prefix(':') {
        let (c, end, _) = crate::cmds::find_command(cmd, 0, false);
        if c != crate::cmds::Cmd::None && end == cmd.len() {
            return Ok(Value::Number(if c.name() == cmd { 2 } else { 1 }));
        }
        return Ok(Value::Number(
            match st.user_cmds.find(cmd, st.curbuf_fnum()) {
                crate::usercmd::UcmdLookup::Found(i) if st.user_cmds.cmds[i].name == cmd => 2,
                crate::usercmd::UcmdLookup::Found(_) => 1,
                crate::usercmd::UcmdLookup::Ambiguous => 3,
                crate::usercmd::UcmdLookup::NotFound => 0,
            },
        ));
    } else {
        st.get_var(&name).is_some()
    };
    Ok(Value::from(found))
}

fn f_expand(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let s = a[0].to_str()?;
    Ok(Value::String(crate::filename::expand_special(st, &s)?))
}

fn f_filereadable(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::from(st.host.file_exists(&a[0].to_str()?)))
}

fn f_fnamemodify(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let (name, mods) = (a[0].to_str()?, a[1].to_str()?);
    let (out, _) = crate::filename::modify_fname(&mods, &name)?;
    Ok(Value::String(out))
}

fn f_function(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let name = a[0].to_str()?;
    if !is_builtin(&name) && !st.funcs.exists(&name) {
        return Err(runtime(format!("E700: Unknown function: {name}")));
    }
    Ok(Value::Func(name))
}

fn f_get(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let l = list_arg(&a[0])?;
    let l = l.borrow();
    let idx = a[1].to_number()?;
    let i = if idx < 0 { l.len() as i64 + idx } else { idx };
    Ok(usize::try_from(i)
        .ok()
        .and_then(|i| l.get(i).cloned())
        .or_else(|| a.get(2).cloned())
        .unwrap_or(Value::Number(0)))
}

fn f_getline(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let l1 = lnum_arg(st, &a[0])?;
    let count = st.line_count();
    match a.get(1) {
        None => Ok(Value::str(if (1..=count).contains(&l1) {
            st.curbuf().get(l1)
        } else {
            ""
        })),
        Some(end) => {
            let l2 = lnum_arg(st, end)?.min(count);
            let l1 = l1.max(1);
            if l1 > l2 {
                return Ok(Value::list(Vec::new()));
            }
            Ok(Value::list(
                st.curbuf()
                    .lines(l1, l2)
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ))
        }
    }
}

fn f_getreg(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let r = match a.first() {
        Some(v) => v.to_str()?.chars().next().unwrap_or('"'),
        None => '"',
    };
    Ok(Value::String(st.register_value(r)?))
}

const FEATURES: &[&str] = &[
    "autocmd",
    "eval",
    "ex_extra",
    "file_in_path",
    "modify_fname",
    "quickfix",
    "user_commands",
    "vertsplit",
    "vimscript-1",
    "windows",
    #[cfg(unix)]
    "unix",
];

fn f_has(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let f = a[0].to_str()?;
    Ok(Value::from(FEATURES.contains(&f.as_str())))
}

fn f_index(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let l = list_arg(&a[0])?;
    let l = l.borrow();
    let start = match a.get(2) {
        Some(v) => {
            let n = v.to_number()?;
            if n < 0 {
                (l.len() as i64 + n).max(0) as usize
            } else {
                n as usize
            }
        }
        None => 0,
    };
    let ic = match a.get(3) {
        Some(v) => v.truthy()?,
        None => false,
    };
    for (i, item) in l.iter().enumerate().skip(start) {
        if item.type_nr() == a[1].type_nr() && item.equals(&a[1], ic)? {
            return Ok(Value::Number(i as i64));
        }
    }
    Ok(Value::Number(-1))
}

fn f_insert(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let l = list_arg(&a[0])?;
    let len = l.borrow().len() as i64;
    let idx = match a.get(2) {
        Some(v) => v.to_number()?,
        None => 0,
    };
    let i = if idx < 0 { len + idx } else { idx };
    if i < 0 || i > len {
        return Err(runtime(format!("{}: {}", e::LIST_INDEX, idx)));
    }
    l.borrow_mut().insert(i as usize, a[1].clone());
    Ok(a[0].clone())
}

fn f_join(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let sep = match a.get(1) {
        Some(v) => v.to_str()?,
        None => " ".to_string(),
    };
    let l = list_arg(&a[0])?;
    let parts: Vec<String> = l
        .borrow()
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.string_repr(),
        })
        .collect();
    Ok(Value::String(parts.join(&sep)))
}

fn f_len(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::Number(match &a[0] {
        Value::List(l) => l.borrow().len() as i64,
        Value::Func(_) => return Err(runtime("E701: Invalid type for len()")),
        other => other.to_str()?.len() as i64,
    }))
}

fn f_line(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let s = a[0].to_str()?;
    let n = match s.as_str() {
        "." => st.cursor().lnum,
        "$" => st.line_count(),
        s if s.starts_with('\'') => s[1..]
            .chars()
            .next()
            .and_then(|c| st.curbuf().mark(c))
            .map(|p| p.lnum)
            .unwrap_or(0),
        _ => 0,
    };
    Ok(Value::Number(n))
}

fn regex_of(st: &EditorState, pat: &str) -> Result<regex::Regex> {
    crate::search::vim_regex(pat, st.p_flag(Opt::Magic), st.p_flag(Opt::Ignorecase))
}

fn f_match(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let re = regex_of(st, &a[1].to_str()?)?;
    let text = a[0].to_str()?;
    Ok(Value::Number(
        re.find(&text).map(|m| m.start() as i64).unwrap_or(-1),
    ))
}

fn f_matchstr(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let re = regex_of(st, &a[1].to_str()?)?;
    let text = a[0].to_str()?;
    Ok(Value::str(re.find(&text).map(|m| m.as_str()).unwrap_or("")))
}

fn extreme(a: &Value, want_max: bool) -> Result<Value> {
    let l = list_arg(a)?;
    let mut best: Option<i64> = None;
    for v in l.borrow().iter() {
        let n = v.to_number()?;
        best = Some(match best {
            Some(b) if (want_max && b >= n) || (!want_max && b <= n) => b,
            _ => n,
        });
    }
    Ok(Value::Number(best.unwrap_or(0)))
}

fn f_max(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    extreme(&a[0], true)
}

fn f_min(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    extreme(&a[0], false)
}

/// `%s`, `%d`, `%x`, `%X`, `%o`, `%c` and `%%`, with `-`, `0` and a
/// width.
fn f_printf(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let fmt = a[0].to_str()?;
    let mut args = a[1..].iter();
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut left = false;
        let mut zero = false;
        while let Some(&f) = chars.peek() {
            match f {
                '-' => left = true,
                '0' => zero = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = 0usize;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            width = width * 10 + d as usize;
            chars.next();
        }
        let conv = chars.next().unwrap_or('%');
        if conv == '%' {
            out.push('%');
            continue;
        }
        let arg = args
            .next()
            .ok_or_else(|| runtime("E766: Insufficient arguments for printf()"))?;
        let body = match conv {
            's' => match arg {
                Value::String(s) => s.clone(),
                other => other.string_repr(),
            },
            'd' => arg.to_number()?.to_string(),
            'x' => format!("{:x}", arg.to_number()?),
            'X' => format!("{:X}", arg.to_number()?),
            'o' => format!("{:o}", arg.to_number()?),
            'c' => char::from_u32(arg.to_number()? as u32)
                .map(String::from)
                .unwrap_or_default(),
            other => return Err(invalid(format!("E767: Invalid format specifier: %{other}"))),
        };
        let pad = width.saturating_sub(body.chars().count());
        if left {
            out.push_str(&body);
            out.extend(std::iter::repeat(' ').take(pad));
        } else if zero && conv != 's' {
            let (sign, digits) = match body.strip_prefix('-') {
                Some(d) => ("-", d),
                None => ("", body.as_str()),
            };
            out.push_str(sign);
            out.extend(std::iter::repeat('0').take(pad));
            out.push_str(digits);
        } else {
            out.extend(std::iter::repeat(' ').take(pad));
            out.push_str(&body);
        }
    }
    if args.next().is_some() {
        return Err(runtime("E767: Too many arguments for printf()"));
    }
    Ok(Value::String(out))
}

fn f_range(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let (start, end) = match a.len() {
        1 => (0, a[0].to_number()? - 1),
        _ => (a[0].to_number()?, a[1].to_number()?),
    };
    let stride = match a.get(2) {
        Some(v) => v.to_number()?,
        None => 1,
    };
    if stride == 0 {
        return Err(runtime("E726: Stride is zero"));
    }
    if (stride > 0 && end + 1 < start) || (stride < 0 && end - 1 > start) {
        return Err(runtime("E727: Start past end"));
    }
    let mut out = Vec::new();
    let mut i = start;
    while (stride > 0 && i <= end) || (stride < 0 && i >= end) {
        out.push(Value::Number(i));
        i += stride;
    }
    Ok(Value::list(out))
}

fn f_remove(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let l = list_arg(&a[0])?;
    let len = l.borrow().len() as i64;
    let norm = |n: i64| if n < 0 { len + n } else { n };
    let idx = a[1].to_number()?;
    let i = norm(idx);
    if i < 0 || i >= len {
        return Err(runtime(format!("{}: {}", e::LIST_INDEX, idx)));
    }
    match a.get(2) {
        None => Ok(l.borrow_mut().remove(i as usize)),
        Some(end) => {
            let j = norm(end.to_number()?);
            if j < i || j >= len {
                return Err(runtime(e::INVRANGE));
            }
            let removed: Vec<Value> = l.borrow_mut().drain(i as usize..=j as usize).collect();
            Ok(Value::list(removed))
        }
    }
}

fn f_repeat(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let n = a[1].to_number()?.max(0) as usize;
    Ok(match &a[0] {
        Value::List(l) => {
            let items = l.borrow();
            let mut out = Vec::with_capacity(items.len() * n);
            for _ in 0..n {
                out.extend(items.iter().cloned());
            }
            Value::list(out)
        }
        other => Value::String(other.to_str()?.repeat(n)),
    })
}

fn f_reverse(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    list_arg(&a[0])?.borrow_mut().reverse();
    Ok(a[0].clone())
}

fn f_setline(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let lnum = lnum_arg(st, &a[0])?;
    let lines = lines_of(&a[1])?;
    let count = st.line_count();
    if lnum < 1 || lnum > count + 1 {
        return Ok(Value::Number(1));
    }
    st.u_save()?;
    for (i, text) in lines.into_iter().enumerate() {
        let l = lnum + i as i64;
        let buf = st.curbuf_mut();
        if l <= buf.line_count() {
            buf.set_line(l, text);
        } else {
            buf.append(l - 1, vec![text]);
        }
    }
    st.changed();
    Ok(Value::Number(0))
}

fn f_setreg(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let Some(r) = a[0].to_str()?.chars().next() else {
        return Ok(Value::Number(1));
    };
    let linewise = match a.get(2) {
        Some(v) => v.to_str()?.contains(['l', 'V']),
        None => matches!(a[1], Value::List(_)),
    };
    let content = match &a[1] {
        Value::List(_) => RegContent {
            lines: lines_of(&a[1])?,
            linewise,
        },
        other => {
            let mut c = RegContent::chars(&other.to_str()?);
            if linewise {
                if c.lines.last().is_some_and(String::is_empty) && c.lines.len() > 1 {
                    c.lines.pop();
                }
                c.linewise = true;
            }
            c
        }
    };
    match r {
        '/' => st.search.last_search = Some(content.lines.join("\n")),
        '=' => crate::eval::set_expr_line(st, &content.lines.join("\n")),
        r if crate::registers::valid_yank_reg(r, true) => st.regs.set(r, content),
        _ => return Ok(Value::Number(1)),
    }
    Ok(Value::Number(0))
}

fn f_sort(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let how = match a.get(1) {
        Some(v) => v.to_str()?,
        None => String::new(),
    };
    let l = list_arg(&a[0])?;
    let mut items = l.borrow().clone();
    if how == "n" {
        let mut keyed = Vec::with_capacity(items.len());
        for v in items {
            keyed.push((v.to_number().unwrap_or(0), v));
        }
        keyed.sort_by_key(|(k, _)| *k);
        items = keyed.into_iter().map(|(_, v)| v).collect();
    } else {
        let ic = how == "i" || how == "1";
        items.sort_by_cached_key(|v| {
            let s = match v {
                Value::String(s) => s.clone(),
                other => other.string_repr(),
            };
            if ic {
                s.to_lowercase()
            } else {
                s
            }
        });
    }
    *l.borrow_mut() = items;
    Ok(a[0].clone())
}

fn f_split(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let text = a[0].to_str()?;
    let pat = match a.get(1) {
        Some(v) if !v.to_str()?.is_empty() => v.to_str()?,
        _ => "\\s\\+".to_string(),
    };
    let keepempty = match a.get(2) {
        Some(v) => v.truthy()?,
        None => false,
    };
    let re = regex_of(st, &pat)?;
    let mut parts: Vec<&str> = re.split(&text).collect();
    // only an empty first or last item is dropped
    if !keepempty {
        if parts.last().is_some_and(|s| s.is_empty()) {
            parts.pop();
        }
        if parts.first().is_some_and(|s| s.is_empty()) {
            parts.remove(0);
        }
    }
    Ok(Value::list(parts.into_iter().map(Value::str).collect()))
}

fn f_str2nr(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let s = a[0].to_str()?;
    let s = s.trim_start();
    let base = match a.get(1) {
        Some(v) => v.to_number()?,
        None => 10,
    };
    let n = match base {
        10 => str2nr(s, NumBases::DEC).map(|(n, _)| n).unwrap_or(0),
        2 | 8 | 16 => {
            let (neg, digits) = match s.strip_prefix('-') {
                Some(d) => (true, d),
                None => (false, s),
            };
            let digits = match base {
                16 => digits.trim_start_matches("0x").trim_start_matches("0X"),
                2 => digits.trim_start_matches("0b").trim_start_matches("0B"),
                _ => digits,
            };
            let end = digits
                .find(|c: char| !c.is_digit(base as u32))
                .unwrap_or(digits.len());
            let n = i64::from_str_radix(&digits[..end], base as u32).unwrap_or(0);
            if neg {
                -n
            } else {
                n
            }
        }
        _ => return Err(runtime(e::INVARG)),
    };
    Ok(Value::Number(n))
}

fn f_string(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::String(a[0].string_repr()))
}

fn f_strlen(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::Number(a[0].to_str()?.len() as i64))
}

fn f_submatch(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let n = a[0].to_number()?;
    if !(0..=9).contains(&n) {
        return Err(runtime(format!("E935: Invalid submatch number: {n}")));
    }
    Ok(Value::String(
        st.search.submatches.get(n as usize).cloned().unwrap_or_default(),
    ))
}

fn f_substitute(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let text = a[0].to_str()?;
    let re = crate::search::vim_regex(&a[1].to_str()?, st.p_flag(Opt::Magic), false)?;
    let sub = a[2].to_str()?;
    let global = a[3].to_str()?.contains('g');
    let mut out = String::new();
    let mut last = 0;
    for caps in re.captures_iter(&text) {
        let Some(m) = caps.get(0) else { continue };
        out.push_str(&text[last..m.start()]);
        out.push_str(&crate::search::expand_replacement(&sub, &caps, true).replace('\r', "\n"));
        last = m.end();
        if !global {
            break;
        }
    }
    out.push_str(&text[last..]);
    Ok(Value::String(out))
}

/// Replace the quickfix list with "file:lnum:text" items. Items not in
/// that form are kept as invalid entries.
fn f_setqflist(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let items = list_arg(&a[0])?.borrow().clone();
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let text = item.to_str()?;
        let mut parts = text.splitn(3, ':');
        let fname = parts.next().unwrap_or_default();
        let lnum = parts.next().and_then(|n| n.trim().parse::<i64>().ok());
        let entry = match (lnum, parts.next()) {
            (Some(lnum), Some(msg)) if !fname.is_empty() => crate::layout::QfEntry {
                fname: fname.to_string(),
                lnum,
                text: msg.trim_start().to_string(),
                valid: true,
            },
            _ => crate::layout::QfEntry {
                fname: String::new(),
                lnum: 0,
                text,
                valid: false,
            },
        };
        entries.push(entry);
    }
    st.layout.qf = entries;
    st.layout.qf_idx = 0;
    Ok(Value::Number(0))
}

fn f_tabpagenr(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let last = match a.first() {
        Some(v) => v.to_str()? == "$",
        None => false,
    };
    Ok(Value::Number(if last {
        st.layout.tab_count()
    } else {
        st.layout.tab_nr()
    }))
}

fn f_tolower(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::String(a[0].to_str()?.to_lowercase()))
}

fn f_toupper(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::String(a[0].to_str()?.to_uppercase()))
}

fn f_tr(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let from: Vec<char> = a[1].to_str()?.chars().collect();
    let to: Vec<char> = a[2].to_str()?.chars().collect();
    if from.len() != to.len() {
        return Err(runtime(format!("{}: {}", e::INVARG, a[1].to_str()?)));
    }
    let out = a[0]
        .to_str()?
        .chars()
        .map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to[i],
            None => c,
        })
        .collect();
    Ok(Value::String(out))
}

fn f_trim(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::str(a[0].to_str()?.trim()))
}

fn f_type(_st: &mut EditorState, a: &[Value]) -> Result<Value> {
    Ok(Value::Number(a[0].type_nr()))
}

fn f_winnr(st: &mut EditorState, a: &[Value]) -> Result<Value> {
    let last = match a.first() {
        Some(v) => v.to_str()? == "$",
        None => false,
    };
    Ok(Value::Number(if last {
        st.layout.win_count()
    } else {
        st.layout.win_nr()
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn ev(st: &mut EditorState, text: &str) -> String {
        st.eval_str(text).unwrap().to_string()
    }

    #[test]
    fn table_is_sorted() {
        assert!(BUILTINS.windows(2).all(|w| w[0].name < w[1].name));
    }

    #[test]
    fn list_functions() {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        assert_eq!(ev(&mut st, "len([1, 2, 3])"), "3");
        assert_eq!(ev(&mut st, "range(3)"), "[0, 1, 2]");
        assert_eq!(ev(&mut st, "range(5, 1, -2)"), "[5, 3, 1]");
        assert_eq!(ev(&mut st, "join(['a', 1], '-')"), "a-1");
        assert_eq!(ev(&mut st, "split('a b  c')"), "['a', 'b', 'c']");
        assert_eq!(ev(&mut st, "sort([3, 1, 2], 'n')"), "[1, 2, 3]");
        assert_eq!(ev(&mut st, "index([1, 2, 3], 2)"), "1");
        assert_eq!(ev(&mut st, "max([4, 9, 2])"), "9");
        assert_eq!(ev(&mut st, "get([1], 5, 'x')"), "x");
        assert!(st.eval_str("range(1, 2, 0)").is_err());
    }

    #[test]
    fn string_functions() {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        assert_eq!(ev(&mut st, "toupper('abc')"), "ABC");
        assert_eq!(ev(&mut st, "substitute('aXbX', 'X', '-', 'g')"), "a-b-");
        assert_eq!(ev(&mut st, "substitute('aXbX', 'X', '-', '')"), "a-bX");
        assert_eq!(ev(&mut st, "printf('%-3s|%03d', 'a', 7)"), "a  |007");
        assert_eq!(ev(&mut st, "escape('a b', ' ')"), "a\\ b");
        assert_eq!(ev(&mut st, "str2nr('0x1f', 16)"), "31");
        assert_eq!(ev(&mut st, "tr('abc', 'ab', 'xy')"), "xyc");
        assert_eq!(ev(&mut st, "string('it''s')"), "'it''s'");
        assert_eq!(ev(&mut st, "matchstr('foo123', '[0-9]\\+')"), "123");
    }

    #[test]
    fn argument_count_is_checked() {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        let err = st.eval_str("len()").unwrap_err();
        assert_eq!(err.message(), "E119: Not enough arguments for function: len");
        let err = st.eval_str("abs(1, 2)").unwrap_err();
        assert_eq!(err.message(), "E118: Too many arguments for function: abs");
        let err = st.eval_str("nosuch(1)").unwrap_err();
        assert_eq!(err.message(), "E117: Unknown function: nosuch");
    }

    #[test]
    fn buffer_access() {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        st.curbuf_mut().load_text("one\ntwo\n");
        assert_eq!(ev(&mut st, "getline(2)"), "two");
        assert_eq!(ev(&mut st, "line('$')"), "2");
        st.eval_str("setline(1, 'ONE')").unwrap();
        assert_eq!(st.curbuf().get(1), "ONE");
        st.eval_str("append(0, ['zero'])").unwrap();
        assert_eq!(ev(&mut st, "getline(1, '$')"), "['zero', 'ONE', 'two']");
        assert_eq!(ev(&mut st, "exists('*len')"), "1");
        assert_eq!(ev(&mut st, "exists(':echo')"), "2");
        assert_eq!(ev(&mut st, "exists('&tabstop')"), "1");
    }
}
