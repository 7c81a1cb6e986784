//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Variables and expression evaluation.

pub mod builtins;
pub mod parser;
pub mod value;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::docmd::{check_nextcmd, ExArgs};
use crate::error::{e, invalid, runtime, Error, Result};
use crate::options::{OptLevel, OptVal};
use crate::state::EditorState;
use parser::{BinOp, CaseRule, CmpOp, Expr};
pub use value::{ListRef, Value};

pub type VarMap = BTreeMap<String, Value>;

/// `v:` variables a script may assign.
const VIM_WRITABLE: &[&str] = &["errmsg", "statusmsg", "warningmsg", "this_session", "option_new"];

/// `v:` variables also reachable without the prefix.
const VIM_COMPAT: &[&str] = &["count", "errmsg", "shell_error", "this_session", "version"];

/// Where a variable name lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scope {
    Global,
    Script(usize),
    Local,
    Arg,
    Vim,
    Buf(usize),
    Win(usize),
    Tab(usize),
}

#[derive(Debug, Default)]
pub struct Vars {
    pub globals: VarMap,
    /// `s:` variables by script id.
    pub script: HashMap<usize, VarMap>,
    pub buf: HashMap<usize, VarMap>,
    pub win: HashMap<usize, VarMap>,
    pub tab: HashMap<usize, VarMap>,
    vim: VarMap,
    /// Text of the expression register.
    pub expr_line: Option<String>,
}

impl Vars {
    pub fn new() -> Vars {
        Vars::default()
    }

    pub fn init_vim_vars(&mut self) {
        for (name, value) in [
            ("count", Value::Number(0)),
            ("count1", Value::Number(1)),
            ("errmsg", Value::str("")),
            ("statusmsg", Value::str("")),
            ("warningmsg", Value::str("")),
            ("exception", Value::str("")),
            ("throwpoint", Value::str("")),
            ("shell_error", Value::Number(0)),
            ("this_session", Value::str("")),
            ("version", Value::Number(900)),
            ("option_new", Value::str("")),
            ("option_old", Value::str("")),
            ("option_oldlocal", Value::str("")),
            ("option_oldglobal", Value::str("")),
            ("option_type", Value::str("")),
            ("option_command", Value::str("")),
            ("cmdarg", Value::str("")),
            ("true", Value::Number(1)),
            ("false", Value::Number(0)),
        ] {
            self.vim.insert(name.to_string(), value);
        }
    }

    pub fn set_vim(&mut self, name: &str, value: Value) {
        self.vim.insert(name.to_string(), value);
    }

    pub fn get_vim(&self, name: &str) -> Option<&Value> {
        self.vim.get(name)
    }

    pub fn take_vim(&mut self, name: &str) -> Option<Value> {
        self.vim.remove(name)
    }

    pub fn vim_vars(&self) -> &VarMap {
        &self.vim
    }
}

/// Store the expression of the `=` register.
pub fn set_expr_line(st: &mut EditorState, text: &str) {
    st.vars.expr_line = Some(text.to_string());
}

fn valid_var_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '#')
}

fn undefined(name: &str) -> Error {
    runtime(format!("{}: {}", e::UNDEFVAR, name))
}

impl EditorState {
    /// Split a variable name into its scope and the name within it. An
    /// unprefixed name is local inside a function and global elsewhere.
    pub fn var_scope<'a>(&self, name: &'a str) -> (Scope, &'a str) {
        let b = name.as_bytes();
        if b.len() >= 2 && b[1] == b':' {
            let key = &name[2..];
            let scope = match b[0] {
                b'g' => Scope::Global,
                b's' => Scope::Script(self.current_sid()),
                b'l' => Scope::Local,
                b'a' => Scope::Arg,
                b'v' => Scope::Vim,
                b'b' => Scope::Buf(self.curbuf_fnum()),
                b'w' => Scope::Win(self.curwin().id),
                b't' => Scope::Tab(self.layout.cur_tab),
                _ => return (Scope::Global, name),
            };
            return (scope, key);
        }
        if self.fcalls.is_empty() {
            (Scope::Global, name)
        } else {
            (Scope::Local, name)
        }
    }

    fn var_map(&self, scope: Scope) -> Option<&VarMap> {
        match scope {
            Scope::Global => Some(&self.vars.globals),
            Scope::Script(sid) => self.vars.script.get(&sid),
            Scope::Local => self.fcalls.last().map(|f| &f.locals),
            Scope::Arg => self.fcalls.last().map(|f| &f.args),
            Scope::Vim => Some(&self.vars.vim),
            Scope::Buf(n) => self.vars.buf.get(&n),
            Scope::Win(n) => self.vars.win.get(&n),
            Scope::Tab(n) => self.vars.tab.get(&n),
        }
    }

    fn var_map_mut(&mut self, scope: Scope) -> Option<&mut VarMap> {
        match scope {
            Scope::Global => Some(&mut self.vars.globals),
            Scope::Script(sid) => Some(self.vars.script.entry(sid).or_default()),
            Scope::Local => self.fcalls.last_mut().map(|f| &mut f.locals),
            Scope::Arg => self.fcalls.last_mut().map(|f| &mut f.args),
            Scope::Vim => Some(&mut self.vars.vim),
            Scope::Buf(n) => Some(self.vars.buf.entry(n).or_default()),
            Scope::Win(n) => Some(self.vars.win.entry(n).or_default()),
            Scope::Tab(n) => Some(self.vars.tab.entry(n).or_default()),
        }
    }

    pub fn get_var(&self, name: &str) -> Option<Value> {
        let (scope, key) = self.var_scope(name);
        if let Some(v) = self.var_map(scope).and_then(|m| m.get(key)) {
            return Some(v.clone());
        }
        if scope == Scope::Global && !name.contains(':') && VIM_COMPAT.contains(&key) {
            return self.vars.vim.get(key).cloned();
        }
        None
    }

    pub fn set_var(&mut self, name: &str, value: Value) -> Result<()> {
        let (scope, key) = self.var_scope(name);
        if !valid_var_name(key) {
            return Err(invalid(format!("E461: Illegal variable name: {name}")));
        }
        match scope {
            Scope::Arg => {
                return Err(runtime(format!("E46: Cannot change read-only variable {name}")))
            }
            Scope::Vim if !VIM_WRITABLE.contains(&key) => {
                return Err(runtime(format!("E46: Cannot change read-only variable {name}")))
            }
            Scope::Local if self.fcalls.is_empty() => {
                return Err(invalid(format!("E461: Illegal variable name: {name}")))
            }
            Scope::Global | Scope::Local
                if matches!(value, Value::Func(_))
                    && !key.starts_with(|c: char| c.is_ascii_uppercase())
                    && !name.contains(':') =>
            {
                return Err(runtime(format!(
                    "E704: Funcref variable name must start with a capital: {name}"
                )))
            }
            _ => {}
        }
        if self.sandbox > 0 && matches!(scope, Scope::Global | Scope::Buf(_) | Scope::Win(_)) {
            return Err(runtime(e::SANDBOX));
        }
        log::trace!("let {name} = {}", value.string_repr());
        if let Some(map) = self.var_map_mut(scope) {
            map.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// `:unlet`; a missing variable is an error unless `forceit`.
    pub fn unlet_var(&mut self, name: &str, forceit: bool) -> Result<()> {
        let (scope, key) = self.var_scope(name);
        if matches!(scope, Scope::Arg | Scope::Vim) {
            return Err(runtime(format!("E795: Cannot delete variable {name}")));
        }
        let removed = self
            .var_map_mut(scope)
            .and_then(|m| m.remove(key))
            .is_some();
        if !removed && !forceit {
            return Err(runtime(format!("{}: {}", e::CANNOT_UNLET, name)));
        }
        Ok(())
    }

    /// Parse the expression at the start of `text` and, unless skipping,
    /// evaluate it. Returns the value and the byte length consumed.
    pub fn eval_expr(&mut self, text: &str, skip: bool) -> Result<(Value, usize)> {
        let (expr, len) = parser::parse_expr(text)?;
        if skip {
            return Ok((Value::Number(0), len));
        }
        let v = self.eval(&expr)?;
        Ok((v, len))
    }

    /// Evaluate a whole string as one expression.
    pub fn eval_str(&mut self, text: &str) -> Result<Value> {
        let (v, len) = self.eval_expr(text, false)?;
        if len < text.len() {
            return Err(invalid(format!("{}: {}", e::INVEXPR_STR, text)));
        }
        Ok(v)
    }

    /// Evaluate the argument of `ea` from offset `at`, setting the next
    /// command. Errors are reported here and come back as `Aborted`.
    pub fn eval_arg_at(&mut self, ea: &mut ExArgs, at: usize, skip: bool) -> Result<Value> {
        let start = (ea.arg + at).min(ea.cmdline.len());
        let text = ea.cmdline[start..].to_string();
        if skip {
            self.exc.emsg_skip += 1;
        }
        let result = self.eval_expr(&text, skip).and_then(|(v, len)| {
            let rest = &text[len..];
            ea.nextcmd = check_nextcmd(rest);
            if ea.nextcmd.is_none() && !rest.is_empty() {
                return Err(invalid(format!("{}: {}", e::TRAILING, rest)));
            }
            Ok(v)
        });
        let result = match result {
            Err(err) if err.is_control() => Err(err),
            Err(Error::Aborted) => Err(Error::Aborted),
            Err(err) => {
                self.emsg(&err.message());
                Err(Error::Aborted)
            }
            Ok(v) => Ok(v),
        };
        if skip {
            self.exc.emsg_skip -= 1;
        }
        result
    }

    pub fn eval_arg(&mut self, ea: &mut ExArgs, skip: bool) -> Result<Value> {
        self.eval_arg_at(ea, 0, skip)
    }

    /// The condition of `:if` and `:while`. `None` when it could not be
    /// evaluated; the error was already given.
    pub fn eval_to_bool(&mut self, ea: &mut ExArgs, skip: bool) -> Option<bool> {
        let v = self.eval_arg(ea, skip).ok()?;
        if skip {
            return Some(false);
        }
        match v.truthy() {
            Ok(b) => Some(b),
            Err(err) => {
                self.emsg(&err.message());
                None
            }
        }
    }

    /// Value of an option as an expression sees it.
    pub fn option_value(&self, name: &str, scope: Option<char>) -> Result<Value> {
        let opt = self
            .options
            .find(name)
            .ok_or_else(|| runtime(format!("E113: Unknown option: {name}")))?;
        let ctx = self.opt_ctx();
        let val = match scope {
            Some('g') => self.options.get(opt, OptLevel::Global, ctx),
            Some('l') => self.options.get(opt, OptLevel::Local, ctx),
            _ => self.options.get(opt, OptLevel::Both, ctx),
        };
        Ok(match val {
            OptVal::Bool(b) => Value::from(b),
            OptVal::Num(n) => Value::Number(n),
            OptVal::Str(s) if opt == crate::options::Opt::Key && !s.is_empty() => {
                Value::String("*****".into())
            }
            OptVal::Str(s) => Value::String(s),
        })
    }

    /// Map a file name through 'includeexpr' with `v:fname` set to it.
    /// The name is kept when the option is empty. A value that was set
    /// from an untrusted place is not evaluated.
    pub fn eval_includeexpr(&mut self, fname: &str) -> Result<String> {
        let expr = self.p_str(crate::options::Opt::Includeexpr);
        if expr.is_empty() {
            return Ok(fname.to_string());
        }
        if !self.option_trusted(crate::options::Opt::Includeexpr) {
            log::debug!("not evaluating insecure 'includeexpr': {expr}");
            return Err(runtime(e::SANDBOX));
        }
        self.vars.set_vim("fname", Value::str(fname));
        let res = self.eval_str(&expr);
        self.vars.set_vim("fname", Value::str(""));
        res?.to_str()
    }

    /// Contents of register `r` for `@r` and `getreg()`.
    pub fn register_value(&mut self, r: char) -> Result<String> {
        Ok(match r {
            ':' => self.regs.last_cmdline.clone().unwrap_or_default(),
            '/' => self.search.last_search.clone().unwrap_or_default(),
            '%' => self.curbuf().name.clone().unwrap_or_default(),
            '#' => self
                .curwin()
                .alt
                .and_then(|n| self.bufs.get(n))
                .and_then(|b| b.name.clone())
                .unwrap_or_default(),
            '=' => match self.vars.expr_line.clone() {
                Some(text) => self.eval_str(&text)?.to_str()?,
                None => String::new(),
            },
            '@' => self.register_value('"')?,
            r => self
                .regs
                .get(r)
                .map(|c| c.as_string())
                .unwrap_or_default(),
        })
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::str(s.as_str())),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?);
                }
                Ok(Value::list(out))
            }
            Expr::Var(name) => self.get_var(name).ok_or_else(|| undefined(name)),
            Expr::Option { name, scope } => self.option_value(name, *scope),
            Expr::Env(name) => Ok(Value::String(std::env::var(name).unwrap_or_default())),
            Expr::Register(r) => Ok(Value::String(self.register_value(*r)?)),
            Expr::Not(inner) => Ok(Value::from(!self.eval(inner)?.truthy()?)),
            Expr::Neg(inner) => Ok(Value::Number(self.eval(inner)?.to_number()?.wrapping_neg())),
            Expr::Plus(inner) => Ok(Value::Number(self.eval(inner)?.to_number()?)),
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                binary(*op, a, b)
            }
            Expr::Compare(op, case, lhs, rhs) => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                let ic = match case {
                    CaseRule::Match => false,
                    CaseRule::Ignore => true,
                    CaseRule::Option => self.p_flag(crate::options::Opt::Ignorecase),
                };
                let magic = self.p_flag(crate::options::Opt::Magic);
                compare(*op, ic, magic, &a, &b).map(Value::from)
            }
            Expr::And(lhs, rhs) => {
                if !self.eval(lhs)?.truthy()? {
                    return Ok(Value::Number(0));
                }
                Ok(Value::from(self.eval(rhs)?.truthy()?))
            }
            Expr::Or(lhs, rhs) => {
                if self.eval(lhs)?.truthy()? {
                    return Ok(Value::Number(1));
                }
                Ok(Value::from(self.eval(rhs)?.truthy()?))
            }
            Expr::Ternary(cond, then, other) => {
                if self.eval(cond)?.truthy()? {
                    self.eval(then)
                } else {
                    self.eval(other)
                }
            }
            Expr::Index(base, idx) => {
                let base = self.eval(base)?;
                let idx = self.eval(idx)?.to_number()?;
                index(&base, idx)
            }
            Expr::Slice(base, lo, hi) => {
                let base = self.eval(base)?;
                let lo = match lo {
                    Some(e) => self.eval(e)?.to_number()?,
                    None => 0,
                };
                let hi = match hi {
                    Some(e) => self.eval(e)?.to_number()?,
                    None => -1,
                };
                slice(&base, lo, hi)
            }
            Expr::Call(name, args) => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval(a)?);
                }
                self.call_function(name, values)
            }
        }
    }

    /// Call a builtin, a user function, or the function a Funcref
    /// variable refers to.
    pub fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let is_user_name = name.contains(':')
            || name.contains('#')
            || name.starts_with(|c: char| c.is_ascii_uppercase());
        if !is_user_name {
            if let Some(result) = builtins::call_builtin(self, name, &args) {
                return result;
            }
        }
        let target = match self.get_var(name) {
            Some(Value::Func(f)) if !self.funcs.exists(name) => f,
            _ => name.to_string(),
        };
        if !is_user_name && target == name {
            return Err(runtime(format!("{}: {}", e::UNKNOWN_FUNC, name)));
        }
        let v = crate::userfunc::call_user_func(self, &target, args)?;
        if self.aborting() {
            return Err(Error::Aborted);
        }
        Ok(v)
    }
}

pub(crate) fn binary(op: BinOp, a: Value, b: Value) -> Result<Value> {
    if op == BinOp::Concat {
        return Ok(Value::String(a.to_str()? + &b.to_str()?));
    }
    if op == BinOp::Add {
        if let (Value::List(x), Value::List(y)) = (&a, &b) {
            let mut items = x.borrow().clone();
            items.extend(y.borrow().iter().cloned());
            return Ok(Value::list(items));
        }
    }
    let x = a.to_number()?;
    let y = b.to_number()?;
    Ok(Value::Number(match op {
        BinOp::Add => x.wrapping_add(y),
        BinOp::Sub => x.wrapping_sub(y),
        BinOp::Mul => x.wrapping_mul(y),
        BinOp::Div => match (x, y) {
            (0, 0) => i64::MIN,
            (x, 0) if x > 0 => i64::MAX,
            (_, 0) => -i64::MAX,
            (x, y) => x.wrapping_div(y),
        },
        BinOp::Mod => {
            if y == 0 {
                0
            } else {
                x.wrapping_rem(y)
            }
        }
        BinOp::Concat => unreachable!(),
    }))
}

fn compare(op: CmpOp, ic: bool, magic: bool, a: &Value, b: &Value) -> Result<bool> {
    match op {
        CmpOp::Is | CmpOp::IsNot => {
            let same = match (a, b) {
                (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
                (x, y) => x.type_nr() == y.type_nr() && x.equals(y, ic)?,
            };
            return Ok(same == (op == CmpOp::Is));
        }
        CmpOp::Match | CmpOp::NoMatch => {
            let text = a.to_str()?;
            let re = crate::search::vim_regex(&b.to_str()?, magic, ic)?;
            return Ok(re.is_match(&text) == (op == CmpOp::Match));
        }
        _ => {}
    }
    if matches!(a, Value::List(_)) || matches!(b, Value::List(_)) {
        return match op {
            CmpOp::Eq => a.equals(b, ic),
            CmpOp::Ne => Ok(!a.equals(b, ic)?),
            _ => Err(runtime("E692: Invalid operation for List")),
        };
    }
    let ord = match (a, b) {
        (Value::String(x), Value::String(y)) => {
            if ic {
                x.to_lowercase().cmp(&y.to_lowercase())
            } else {
                x.cmp(y)
            }
        }
        (x, y) => x.to_number()?.cmp(&y.to_number()?),
    };
    Ok(match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Le => ord != Ordering::Greater,
        _ => unreachable!(),
    })
}

fn index(base: &Value, idx: i64) -> Result<Value> {
    match base {
        Value::List(l) => {
            let l = l.borrow();
            let i = if idx < 0 { l.len() as i64 + idx } else { idx };
            if i < 0 || i as usize >= l.len() {
                return Err(runtime(format!("{}: {}", e::LIST_INDEX, idx)));
            }
            Ok(l[i as usize].clone())
        }
        Value::Func(_) => Err(runtime("E695: Cannot index a Funcref")),
        other => {
            let s = other.to_str()?;
            // a byte index; a negative index gives an empty string
            let out = if idx < 0 {
                String::new()
            } else {
                s.as_bytes()
                    .get(idx as usize)
                    .map(|&b| String::from_utf8_lossy(&[b]).into_owned())
                    .unwrap_or_default()
            };
            Ok(Value::String(out))
        }
    }
}

fn slice(base: &Value, lo: i64, hi: i64) -> Result<Value> {
    let clamp = |n: i64, len: usize| -> i64 {
        if n < 0 {
            (len as i64 + n).max(-1)
        } else {
            n
        }
    };
    match base {
        Value::List(l) => {
            let l = l.borrow();
            let (lo, hi) = (clamp(lo, l.len()).max(0), clamp(hi, l.len()));
            let hi = hi.min(l.len() as i64 - 1);
            if hi < lo {
                return Ok(Value::list(Vec::new()));
            }
            Ok(Value::list(l[lo as usize..=hi as usize].to_vec()))
        }
        Value::Func(_) => Err(runtime("E695: Cannot index a Funcref")),
        other => {
            let s = other.to_str()?;
            let b = s.as_bytes();
            let (lo, hi) = (clamp(lo, b.len()).max(0), clamp(hi, b.len()));
            let hi = hi.min(b.len() as i64 - 1);
            if hi < lo {
                return Ok(Value::str(""));
            }
            Ok(Value::String(
                String::from_utf8_lossy(&b[lo as usize..=hi as usize]).into_owned(),
            ))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn state() -> EditorState {
        EditorState::new(Box::new(MemHost::new()), false)
    }

    fn ev(st: &mut EditorState, text: &str) -> Value {
        st.eval_str(text).unwrap()
    }

    #[test]
    fn key_option_is_masked() {
        let host = MemHost::new();
        let mut st = EditorState::new(Box::new(host.clone()), false);
        assert_eq!(ev(&mut st, "&key"), Value::str(""));
        crate::runner::do_cmdline_cmd(&mut st, "set key=secret | echo &key").unwrap();
        assert_eq!(host.output(), vec!["*****"]);
    }

    #[test]
    fn includeexpr_set_by_execute_is_not_evaluated() {
        let mut st = state();
        assert_eq!(st.eval_includeexpr("foo").unwrap(), "foo");
        crate::runner::do_cmdline_cmd(&mut st, "set includeexpr=v:fname..'.h'").unwrap();
        assert!(st.option_trusted(crate::options::Opt::Includeexpr));
        assert_eq!(st.eval_includeexpr("foo").unwrap(), "foo.h");

        crate::runner::do_cmdline_cmd(&mut st, "execute 'set includeexpr=MyFunc()'").unwrap();
        assert_eq!(st.execute_depth, 0);
        assert!(!st.option_trusted(crate::options::Opt::Includeexpr));
        let err = st.eval_includeexpr("foo").unwrap_err();
        assert_eq!(err.message(), e::SANDBOX);
    }

    #[test]
    fn arithmetic_and_strings() {
        let mut st = state();
        assert_eq!(ev(&mut st, "1 + 2 * 3"), Value::Number(7));
        assert_eq!(ev(&mut st, "'a' . 1 .. 'b'"), Value::str("a1b"));
        assert_eq!(ev(&mut st, "7 % 3 - -1"), Value::Number(2));
        assert_eq!(ev(&mut st, "5 / 0"), Value::Number(i64::MAX));
        assert_eq!(ev(&mut st, "'10' + 5"), Value::Number(15));
    }

    #[test]
    fn comparisons_follow_ignorecase() {
        let mut st = state();
        assert_eq!(ev(&mut st, "'abc' ==# 'ABC'"), Value::Number(0));
        assert_eq!(ev(&mut st, "'abc' ==? 'ABC'"), Value::Number(1));
        crate::runner::do_cmdline_cmd(&mut st, "set ignorecase").unwrap();
        assert_eq!(ev(&mut st, "'abc' == 'ABC'"), Value::Number(1));
        assert_eq!(ev(&mut st, "'foobar' =~ 'o\\+b'"), Value::Number(1));
        assert_eq!(ev(&mut st, "2 < 10"), Value::Number(1));
    }

    #[test]
    fn scopes() {
        let mut st = state();
        st.set_var("g:x", Value::Number(3)).unwrap();
        assert_eq!(st.get_var("x"), Some(Value::Number(3)));
        st.set_var("s:n", Value::Number(1)).unwrap();
        assert_eq!(st.vars.script[&0]["n"], Value::Number(1));
        assert!(st.set_var("v:count", Value::Number(1)).is_err());
        assert!(st.set_var("a:x", Value::Number(1)).is_err());
        assert!(st.set_var("l:x", Value::Number(1)).is_err());
        assert_eq!(ev(&mut st, "count"), Value::Number(0));
        assert!(st.unlet_var("g:nope", false).is_err());
        assert!(st.unlet_var("g:nope", true).is_ok());
    }

    #[test]
    fn lists_share_and_slice() {
        let mut st = state();
        let list = ev(&mut st, "[1, 2, 3, 4]");
        st.set_var("g:l", list).unwrap();
        assert_eq!(ev(&mut st, "l[-1]"), Value::Number(4));
        assert_eq!(ev(&mut st, "l[1:2]").to_string(), "[2, 3]");
        assert_eq!(ev(&mut st, "l[2:]").to_string(), "[3, 4]");
        assert_eq!(ev(&mut st, "'hello'[1:3]"), Value::str("ell"));
        assert_eq!(ev(&mut st, "l + [5]").to_string(), "[1, 2, 3, 4, 5]");
        assert!(st.eval_str("l[9]").is_err());
        assert_eq!(ev(&mut st, "l is l"), Value::Number(1));
        assert_eq!(ev(&mut st, "[1] is [1]"), Value::Number(0));
    }

    #[test]
    fn options_and_registers() {
        let mut st = state();
        assert_eq!(ev(&mut st, "&shiftwidth"), Value::Number(8));
        assert!(st.eval_str("&nosuchoption").is_err());
        st.regs.set('a', crate::registers::RegContent::chars("text"));
        assert_eq!(ev(&mut st, "@a"), Value::str("text"));
        set_expr_line(&mut st, "6 * 7");
        assert_eq!(ev(&mut st, "@="), Value::str("42"));
    }

    #[test]
    fn arg_errors_are_reported_once() {
        let host = MemHost::new();
        let mut st = EditorState::new(Box::new(host.clone()), false);
        let mut ea = ExArgs::new("nosuchvar");
        assert!(matches!(st.eval_arg(&mut ea, false), Err(Error::Aborted)));
        assert_eq!(host.errors(), vec!["E121: Undefined variable: nosuchvar"]);

        let mut ea = ExArgs::new("nosuchvar | echo 1");
        assert!(st.eval_arg(&mut ea, true).is_ok());
        assert_eq!(ea.nextcmd.as_deref(), Some(" echo 1"));
        assert_eq!(host.errors().len(), 1);
    }

    #[test]
    fn trailing_text_is_an_error() {
        let host = MemHost::new();
        let mut st = EditorState::new(Box::new(host.clone()), false);
        let mut ea = ExArgs::new("1 2");
        assert!(st.eval_arg(&mut ea, false).is_err());
        assert_eq!(host.errors(), vec!["E488: Trailing characters: 2"]);
    }
}
