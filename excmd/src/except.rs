//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Exception handling: turning errors and interrupts into exceptions,
//! throwing, catching and finishing them, and the `:try` family.

use std::rc::Rc;

use crate::cond::{CondFlags, CondStack, Pending, CSTACK_LEN};
use crate::docmd::{check_nextcmd, CmdCtx, ExArgs};
use crate::error::{e, Error, Result};
use crate::eval::Value;
use crate::search::vim_regex;
use crate::state::{EditorState, SourceFrame};
use crate::line_source::SourceKind;

/// Level of 'verbose' at which exceptions are reported.
const VERBOSE_EXCEPTIONS: i64 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcType {
    User,
    Error,
    Interrupt,
}

/// An error message collected while a command runs inside `:try`.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrMsg {
    pub msg: String,
    pub sfile: Option<String>,
    pub slnum: i64,
}

/// Messages of the command being executed. `throw_msg` becomes the
/// value of the error exception.
#[derive(Debug, Clone, Default)]
pub struct MsgList {
    pub items: Vec<ErrMsg>,
    pub throw_msg: String,
}

#[derive(Debug)]
pub struct Exception {
    pub kind: ExcType,
    pub value: String,
    /// Messages to report if an error exception is not caught.
    pub messages: Vec<ErrMsg>,
    pub throw_name: String,
    pub throw_lnum: i64,
}

/// What a `:throw` or a failing command hands to [`EditorState::throw_exception`].
pub enum ThrowValue {
    User(String),
    Error(MsgList),
    Interrupt,
}

#[derive(Debug, Default)]
pub struct ExceptionCtx {
    /// Number of active `:try` conditionals in all runners.
    pub trylevel: i32,
    /// An aborting error or uncaught exception: skip everything until the
    /// top level.
    pub force_abort: bool,
    /// Do not turn errors into exceptions any more.
    pub suppress_errthrow: bool,
    /// An error turned into an exception would have been aborting.
    pub cause_abort: bool,
    pub did_throw: bool,
    /// An exception escaped a nested runner and must be rethrown.
    pub need_rethrow: bool,
    pub current: Option<Rc<Exception>>,
    /// Caught exceptions, innermost last.
    pub caught: Vec<Rc<Exception>>,
    pub did_emsg: bool,
    /// The last error was a syntax error in a typed line.
    pub did_emsg_syntax: bool,
    pub got_int: bool,
    /// Collected messages of the runner's current command. `None` outside
    /// any runner.
    pub msg_list: Option<MsgList>,
    /// Errors are not reported at all while non-zero.
    pub emsg_skip: i32,
}

/// Exception state saved around code that must not see it, such as the
/// debugger prompt or an autocommand.
#[derive(Debug, Default)]
pub struct DebugSnapshot {
    trylevel: i32,
    force_abort: bool,
    caught: Vec<Rc<Exception>>,
    v_exception: Option<Value>,
    v_throwpoint: Option<Value>,
    did_emsg: bool,
    got_int: bool,
    did_throw: bool,
    need_rethrow: bool,
    check_cstack: bool,
    current: Option<Rc<Exception>>,
}

/// Build the value of an error exception: `Vim(cmd):E123: text`. A
/// message of the form `"fname" E123: text` becomes `E123: text (fname)`.
pub fn error_exception_value(mesg: &str, cmdname: Option<&str>) -> String {
    let mut val = match cmdname {
        Some(name) if !name.is_empty() => format!("Vim({name}):"),
        _ => "Vim:".to_string(),
    };
    let b = mesg.as_bytes();
    let is_enum = |p: usize| {
        b.get(p) == Some(&b'E') && {
            let digits = b[p + 1..].iter().take_while(|c| c.is_ascii_digit()).count();
            (1..=3).contains(&digits) && b.get(p + 1 + digits) == Some(&b':')
        }
    };
    let found = (0..b.len()).find(|&p| {
        is_enum(p) && (p == 0 || (b[0] == b'"' && p >= 3 && b[p - 2] == b'"' && b[p - 1] == b' '))
    });
    match found {
        Some(p) if p > 0 => {
            val.push_str(&mesg[p..]);
            val.push_str(&format!(" ({})", &mesg[1..p - 2]));
        }
        _ => val.push_str(mesg),
    }
    val
}

impl EditorState {
    /// Whether the commands being executed should stop: an aborting
    /// error, an interrupt or an exception.
    pub fn aborting(&self) -> bool {
        (self.exc.did_emsg && self.exc.force_abort) || self.exc.got_int || self.exc.did_throw
    }

    /// After `retcode` failure, whether the caller should give up.
    pub fn should_abort(&self, failed: bool) -> bool {
        (failed && self.exc.trylevel != 0 && self.emsg_silent == 0) || self.aborting()
    }

    /// Collect an error message for an error exception instead of showing
    /// it. Returns `true` when the message was taken; `ignore` is set when
    /// the message should not even set the error flag.
    pub fn cause_errthrow(&mut self, mesg: &str, severe: bool, ignore: &mut bool) -> bool {
        if self.exc.suppress_errthrow {
            return false;
        }

        // An error that occurs while an interrupt exception or an error
        // exception is pending makes the command abort.
        if !self.exc.did_emsg {
            self.exc.cause_abort = self.exc.force_abort;
            self.exc.force_abort = false;
        }

        if ((self.exc.trylevel == 0 && !self.exc.cause_abort) || self.emsg_silent != 0)
            && !self.exc.did_throw
        {
            return false;
        }

        if mesg == e::INTERRUPTED {
            *ignore = true;
            return true;
        }

        self.exc.cause_abort = true;

        if self.exc.did_throw {
            if let Some(cur) = &self.exc.current {
                if cur.kind == ExcType::Interrupt {
                    self.exc.got_int = false;
                }
            }
            self.discard_current_exception();
        }

        let sfile = self.sourcing_name().map(str::to_string);
        let slnum = self.sourcing_lnum();
        if let Some(list) = self.exc.msg_list.as_mut() {
            let first = list.items.is_empty();
            list.items.push(ErrMsg {
                msg: mesg.to_string(),
                sfile,
                slnum,
            });
            if first || severe {
                // the extra "Vim " prefix of E458-style messages is dropped
                let b = mesg.as_bytes();
                let vim_prefixed = mesg.starts_with("Vim E")
                    && b.len() > 9
                    && b[5..8].iter().all(u8::is_ascii_digit)
                    && b[8] == b':'
                    && b[9] == b' ';
                list.throw_msg = if vim_prefixed {
                    mesg[4..].to_string()
                } else {
                    mesg.to_string()
                };
            }
        }
        true
    }

    /// Throw the error messages collected for the command `cmdname`.
    pub fn do_errthrow(&mut self, cstack: Option<&mut CondStack>, cmdname: Option<&str>) {
        if self.exc.cause_abort {
            self.exc.cause_abort = false;
            self.exc.force_abort = true;
        }

        let Some(list) = self.exc.msg_list.as_mut() else {
            return;
        };
        if list.items.is_empty() {
            return;
        }
        let list = std::mem::take(list);
        if self.throw_exception(ThrowValue::Error(list), cmdname) {
            match cstack {
                Some(cs) => self.do_throw(cs),
                None => self.exc.need_rethrow = true,
            }
        }
    }

    /// Turn a pending interrupt into an exception when inside `:try`.
    pub fn do_intthrow(&mut self, cstack: &mut CondStack) -> bool {
        if !self.exc.got_int || (self.exc.trylevel == 0 && !self.exc.did_throw) {
            return false;
        }

        if self.exc.did_throw {
            if let Some(cur) = &self.exc.current {
                if cur.kind == ExcType::Interrupt {
                    return false;
                }
            }
            self.discard_current_exception();
        }

        if self.throw_exception(ThrowValue::Interrupt, None) {
            self.do_throw(cstack);
        }
        true
    }

    /// Make a new exception the current one. Fails for user values that
    /// could be taken for a Vim error.
    pub fn throw_exception(&mut self, value: ThrowValue, cmdname: Option<&str>) -> bool {
        let (kind, text, messages) = match value {
            ThrowValue::User(v) => {
                let b = v.as_bytes();
                if v.starts_with("Vim") && matches!(b.get(3), None | Some(b':') | Some(b'(')) {
                    self.emsg(e::VIM_PREFIX);
                    self.exc.current = None;
                    return false;
                }
                (ExcType::User, v, Vec::new())
            }
            ThrowValue::Error(list) => {
                let text = error_exception_value(&list.throw_msg, cmdname);
                (ExcType::Error, text, list.items)
            }
            ThrowValue::Interrupt => (ExcType::Interrupt, "Vim:Interrupt".to_string(), Vec::new()),
        };

        let (throw_name, throw_lnum) = match messages.first() {
            Some(m) if m.sfile.is_some() => (m.sfile.clone().unwrap_or_default(), m.slnum),
            _ => (self.estack_sfile(), self.sourcing_lnum()),
        };

        log::debug!("exception thrown: {text}");
        self.verbose_msg(VERBOSE_EXCEPTIONS, &format!("Exception thrown: {text}"));

        self.exc.current = Some(Rc::new(Exception {
            kind,
            value: text,
            messages,
            throw_name,
            throw_lnum,
        }));
        true
    }

    fn report_exception(&mut self, what: &str, exc: &Exception) {
        log::debug!("exception {what}: {}", exc.value);
        let text = format!("Exception {what}: {}", exc.value);
        self.verbose_msg(VERBOSE_EXCEPTIONS, &text);
    }

    /// Drop the exception owned by a conditional frame.
    pub fn discard_exception(&mut self, exc: Rc<Exception>, was_finished: bool) {
        if let Some(cur) = &self.exc.current {
            if Rc::ptr_eq(cur, &exc) {
                self.exc.current = None;
            }
        }
        self.report_exception(if was_finished { "finished" } else { "discarded" }, &exc);
    }

    pub fn discard_current_exception(&mut self) {
        if let Some(cur) = self.exc.current.take() {
            self.report_exception("discarded", &cur);
        }
        self.exc.did_throw = false;
        self.exc.need_rethrow = false;
    }

    fn set_exception_vars(&mut self, exc: Option<&Rc<Exception>>) {
        match exc {
            Some(exc) => {
                let throwpoint = if exc.throw_name.is_empty() {
                    String::new()
                } else if exc.throw_lnum != 0 {
                    format!("{}, line {}", exc.throw_name, exc.throw_lnum)
                } else {
                    exc.throw_name.clone()
                };
                self.vars.set_vim("exception", Value::str(exc.value.as_str()));
                self.vars.set_vim("throwpoint", Value::str(throwpoint));
            }
            None => {
                self.vars.set_vim("exception", Value::str(""));
                self.vars.set_vim("throwpoint", Value::str(""));
            }
        }
    }

    /// Put an exception on the caught stack and expose it in `v:exception`.
    pub fn catch_exception(&mut self, exc: Rc<Exception>) {
        self.set_exception_vars(Some(&exc));
        self.report_exception("caught", &exc);
        self.exc.caught.push(exc);
    }

    /// Leave the catch clause of `exc`.
    pub fn finish_exception(&mut self, exc: Rc<Exception>) {
        match self.exc.caught.last() {
            Some(top) if Rc::ptr_eq(top, &exc) => {
                self.exc.caught.pop();
            }
            _ => self.iemsg(&format!("{}: finish_exception()", e::INTERR)),
        }
        let top = self.exc.caught.last().cloned();
        self.set_exception_vars(top.as_ref());
        self.discard_exception(exc, true);
    }

    /// Report an exception nobody caught, then stop script execution.
    pub fn handle_did_throw(&mut self) {
        let Some(exc) = self.exc.current.clone() else {
            self.exc.did_throw = false;
            return;
        };
        let msg = match exc.kind {
            ExcType::User => Some(format!("{}: {}", e::NOT_CAUGHT, exc.value)),
            _ => None,
        };

        self.sourcing.push(SourceFrame {
            kind: SourceKind::Other,
            name: exc.throw_name.clone(),
            lnum: exc.throw_lnum,
            sid: self.current_sid(),
            level: self.ex_nesting_level,
            finished: false,
        });

        self.discard_current_exception();

        // an uncaught exception is not fatal under ":silent!"
        if self.emsg_silent == 0 {
            self.exc.suppress_errthrow = true;
        }
        self.exc.force_abort = true;

        if exc.kind == ExcType::Error {
            for m in &exc.messages {
                self.emsg(&m.msg);
            }
        } else if let Some(msg) = msg {
            self.emsg(&msg);
        }
        self.sourcing.pop();
    }

    /// Unwind to the innermost `:try` that can handle the current
    /// exception and hand it over.
    pub fn do_throw(&mut self, cstack: &mut CondStack) {
        if let Some(idx) = self.cleanup_conditionals(cstack, CondFlags::empty(), false) {
            let frame = &mut cstack.frames[idx];
            if !frame.flags.contains(CondFlags::CAUGHT) {
                if frame.flags.contains(CondFlags::ACTIVE) {
                    frame.flags |= CondFlags::THROWN;
                } else {
                    // a discarded catchable exception may have left this
                    frame.flags.remove(CondFlags::THROWN);
                }
            }
            frame.flags.remove(CondFlags::ACTIVE);
            frame.exception = self.exc.current.clone();
        }
        self.exc.did_throw = true;
    }

    pub fn save_dbg_stuff(&mut self) -> DebugSnapshot {
        DebugSnapshot {
            trylevel: std::mem::take(&mut self.exc.trylevel),
            force_abort: std::mem::take(&mut self.exc.force_abort),
            caught: std::mem::take(&mut self.exc.caught),
            v_exception: self.vars.take_vim("exception"),
            v_throwpoint: self.vars.take_vim("throwpoint"),
            did_emsg: std::mem::take(&mut self.exc.did_emsg),
            got_int: std::mem::take(&mut self.exc.got_int),
            did_throw: std::mem::take(&mut self.exc.did_throw),
            need_rethrow: std::mem::take(&mut self.exc.need_rethrow),
            check_cstack: std::mem::take(&mut self.check_cstack),
            current: self.exc.current.take(),
        }
    }

    pub fn restore_dbg_stuff(&mut self, snap: DebugSnapshot) {
        self.exc.trylevel = snap.trylevel;
        self.exc.force_abort = snap.force_abort;
        self.exc.caught = snap.caught;
        if let Some(v) = snap.v_exception {
            self.vars.set_vim("exception", v);
        }
        if let Some(v) = snap.v_throwpoint {
            self.vars.set_vim("throwpoint", v);
        }
        self.exc.did_emsg = snap.did_emsg;
        self.exc.got_int = snap.got_int;
        self.exc.did_throw = snap.did_throw;
        self.exc.need_rethrow = snap.need_rethrow;
        self.check_cstack = snap.check_cstack;
        self.exc.current = snap.current;
    }
}

/// `:throw {expr}`
pub fn ex_throw(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    // a leading '"' starts a string here, not a comment
    if matches!(ea.arg_str().bytes().next(), None | Some(b'|') | Some(b'\n')) {
        return Err(crate::error::invalid(e::ARGREQ));
    }
    let value = st.eval_arg(ea, ea.skip)?;
    if ea.skip {
        return Ok(());
    }
    Err(Error::UserThrow(value.to_str()?))
}

/// `:try`
pub fn ex_try(st: &mut EditorState, _ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let cs = &mut *ctx.cstack;
    if cs.frames.len() >= CSTACK_LEN {
        return Err(crate::error::runtime(e::TRY_NESTING));
    }
    let parent_inactive = cs.parent_inactive();
    cs.push(CondFlags::TRY);
    cs.trylevel += 1;

    let skip = st.exc.did_emsg || st.exc.got_int || st.exc.did_throw || parent_inactive;
    if !skip {
        let frame = cs.top_mut();
        frame.flags |= CondFlags::ACTIVE | CondFlags::TRUE;
        // errors inside this :try are caught again, even under ":silent!"
        if st.emsg_silent != 0 {
            frame.saved_emsg_silent = Some(st.emsg_silent);
            frame.flags |= CondFlags::SILENT;
            st.emsg_silent = 0;
        }
    }
    Ok(())
}

/// Index of the innermost TRY frame below the top one, not below 1.
fn find_try_below_top(cs: &CondStack) -> usize {
    let mut idx = cs.frames.len() - 1;
    loop {
        if idx == 0 {
            break;
        }
        idx -= 1;
        if idx == 0 || cs.frames[idx].flags.contains(CondFlags::TRY) {
            break;
        }
    }
    idx
}

fn no_try(cs: &CondStack) -> bool {
    cs.trylevel <= 0 || cs.frames.is_empty()
}

/// `:catch [/{pattern}/]`
pub fn ex_catch(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let mut give_up = false;
    let mut skip = false;
    let mut idx = 0;
    let mut errmsg: Option<&'static str> = None;

    let cs = &mut *ctx.cstack;
    if no_try(cs) {
        errmsg = Some(e::CATCH_WITHOUT_TRY);
        give_up = true;
    } else {
        idx = cs.frames.len() - 1;
        if !cs.top().flags.contains(CondFlags::TRY) {
            // report the missing ":end..." and ignore this ":catch"
            errmsg = Some(cs.get_end_emsg());
            skip = true;
            idx = find_try_below_top(cs);
        }
        if cs.frames[idx].flags.contains(CondFlags::FINALLY) {
            errmsg = Some(e::CATCH_AFTER_FINALLY);
            give_up = true;
        } else {
            cs.rewind(idx, CondFlags::WHILE | CondFlags::FOR);
        }
    }

    // the pattern is optional
    let arg = ea.arg_str().to_string();
    let (pat, rest) = if crate::charset::ends_excmd(arg.bytes().next()) {
        (".*".to_string(), arg.as_str())
    } else {
        let delim = arg.chars().next().unwrap_or('/');
        let body = &arg[delim.len_utf8()..];
        let end = crate::search::skip_regexp(body, delim);
        let rest = body[end..].strip_prefix(delim).unwrap_or(&body[end..]);
        (body[..end].to_string(), rest)
    };

    if !give_up {
        // no exception, or the :try never got active
        if !st.exc.did_throw || !ctx.cstack.frames[idx].flags.contains(CondFlags::TRUE) {
            skip = true;
        }

        let mut caught = false;
        let flags = ctx.cstack.frames[idx].flags;
        if !skip && flags.contains(CondFlags::THROWN) && !flags.contains(CondFlags::CAUGHT) {
            if !crate::charset::ends_excmd(crate::charset::skipwhite(rest).bytes().next()) {
                return Err(crate::error::parse_err(e::TRAILING));
            }
            let value = st
                .exc
                .current
                .as_ref()
                .map(|c| c.value.clone())
                .unwrap_or_default();
            // an interrupt while matching must not be lost
            let prev_got_int = st.exc.got_int;
            st.exc.got_int = false;
            let ic = st.p_flag(crate::options::Opt::Ignorecase);
            caught = match vim_regex(&pat, true, ic) {
                Ok(re) => re.is_match(&value),
                Err(_) => {
                    st.emsg(&format!("{}: {}", e::INVARG, pat));
                    false
                }
            };
            st.exc.got_int |= prev_got_int;
        }

        if caught {
            let frame = &mut ctx.cstack.frames[idx];
            frame.flags |= CondFlags::ACTIVE | CondFlags::CAUGHT;
            st.exc.did_emsg = false;
            st.exc.got_int = false;
            st.exc.did_throw = false;
            if let Some(exc) = frame.exception.clone() {
                st.catch_exception(exc);
            }
        } else {
            // finish the exception of a preceding catch clause and make
            // the rest of the :try inactive
            st.cleanup_conditionals(ctx.cstack, CondFlags::TRY, true);
        }
    }

    ea.nextcmd = check_nextcmd(rest);
    match errmsg {
        Some(msg) => Err(crate::error::invalid(msg)),
        None => Ok(()),
    }
}

/// `:finally`
pub fn ex_finally(st: &mut EditorState, _ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let cs = &mut *ctx.cstack;
    if no_try(cs) {
        return Err(crate::error::invalid(e::FINALLY_WITHOUT_TRY));
    }

    let mut errmsg = None;
    let mut pending = Pending::NONE;
    let mut idx = cs.frames.len() - 1;
    if !cs.top().flags.contains(CondFlags::TRY) {
        errmsg = Some(cs.get_end_emsg());
        idx = find_try_below_top(cs);
        // the error is pending so that the finally clause still runs
        pending = Pending::ERROR;
    }

    if cs.frames[idx].flags.contains(CondFlags::FINALLY) {
        return Err(crate::error::invalid(e::MULTIPLE_FINALLY));
    }
    cs.rewind(idx, CondFlags::WHILE | CondFlags::FOR);

    // skip when the :try never got active
    if cs.top().flags.contains(CondFlags::TRUE) {
        // finish a caught exception and deactivate the catch clauses
        st.cleanup_conditionals(cs, CondFlags::TRY, false);

        if pending == Pending::ERROR || st.exc.did_emsg || st.exc.got_int || st.exc.did_throw {
            let frame = &mut cs.frames[idx];
            if frame.pending == Pending::RETURN {
                frame.rettv = None;
            }
            // a missing ":end..." found here is thrown at the ":endtry"
            if (pending == Pending::ERROR && !st.exc.did_emsg) || st.exc.did_throw {
                pending |= Pending::THROW;
            }
            if st.exc.did_emsg {
                pending |= Pending::ERROR;
            }
            if st.exc.got_int {
                pending |= Pending::INTERRUPT;
            }
            frame.pending = pending;

            if st.exc.did_throw && frame.exception.is_none() {
                st.iemsg(&format!("{}: ex_finally()", e::INTERR));
            }
        }

        // the runner resets the error flags and activates the clause
        cs.lflags |= crate::cond::LoopFlags::HAD_FINA;
    }

    match errmsg {
        Some(msg) => Err(crate::error::invalid(msg)),
        None => Ok(()),
    }
}

/// `:endtry`
pub fn ex_endtry(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let cs = &mut *ctx.cstack;
    if no_try(cs) {
        return Err(crate::error::invalid(e::ENDTRY_WITHOUT_TRY));
    }

    // nothing is resumed after an error, interrupt or throw since the
    // ":try", or when the try block never got active
    let mut skip = st.exc.did_emsg
        || st.exc.got_int
        || st.exc.did_throw
        || !cs.top().flags.contains(CondFlags::TRUE);
    let mut rethrow = false;
    let mut errmsg = None;
    let idx;

    if !cs.top().flags.contains(CondFlags::TRY) {
        errmsg = Some(cs.get_end_emsg());
        idx = find_try_below_top(cs);
        cs.rewind(idx, CondFlags::WHILE | CondFlags::FOR);
        skip = true;
        // the error message would discard it anyway
        if st.exc.did_throw {
            st.discard_current_exception();
        }
        // the missing ":end..." is reported even after another error
        st.exc.did_emsg = false;
    } else {
        idx = cs.frames.len() - 1;
        let flags = cs.frames[idx].flags;
        // an exception from the try block or a catch clause passes on
        // when there is no finally clause
        if st.exc.did_throw && flags.contains(CondFlags::TRUE) && !flags.contains(CondFlags::FINALLY) {
            rethrow = true;
        }
    }

    let mut pending = Pending::NONE;
    let mut rettv = None;
    if !skip {
        let frame = &mut cs.frames[idx];
        pending = frame.pending;
        frame.pending = Pending::NONE;
        if pending == Pending::RETURN {
            rettv = frame.rettv.take();
        } else if pending.contains(Pending::THROW) {
            st.exc.current = frame.exception.clone();
        }
    }

    // discard what is pending after an error in the finally clause,
    // finish a caught exception, restore "emsg_silent"
    st.cleanup_conditionals(cs, CondFlags::TRY | CondFlags::SILENT, true);

    if cs.top_opt().map_or(false, |f| f.flags.contains(CondFlags::TRY)) {
        cs.pop();
    }
    cs.trylevel -= 1;

    if !skip {
        report_resume_pending(st, pending);
        if pending == Pending::CONTINUE {
            crate::cond::ex_continue(st, ea, ctx)?;
        } else if pending == Pending::BREAK {
            crate::cond::ex_break(st, ea, ctx)?;
        } else if pending == Pending::RETURN {
            crate::userfunc::do_return(st, ctx, false, false, rettv);
        } else if pending == Pending::FINISH {
            crate::ex::source::do_finish(st, ctx, false);
        } else {
            // an error or interrupt made pending at the ":finally"
            if pending.contains(Pending::ERROR) {
                st.exc.did_emsg = true;
            }
            if pending.contains(Pending::INTERRUPT) {
                st.exc.got_int = true;
            }
            if pending.contains(Pending::THROW) {
                rethrow = true;
            }
        }
    }

    if rethrow {
        st.do_throw(ctx.cstack);
    }
    match errmsg {
        Some(msg) => Err(crate::error::invalid(msg)),
        None => Ok(()),
    }
}

fn report_resume_pending(st: &mut EditorState, pending: Pending) {
    report_pending(st, pending, "resumed");
}

/// Tell at a high 'verbose' level that a `:finally` made something wait
/// for its `:endtry`.
pub fn report_make_pending(st: &mut EditorState, pending: Pending) {
    report_pending(st, pending, "made pending");
}

fn report_pending(st: &mut EditorState, pending: Pending, how: &str) {
    if pending.is_empty() {
        return;
    }
    log::trace!("{how} {pending:?}");
    if st.p_num(crate::options::Opt::Verbose) >= VERBOSE_EXCEPTIONS {
        let what = if pending == Pending::CONTINUE {
            ":continue"
        } else if pending == Pending::BREAK {
            ":break"
        } else if pending == Pending::RETURN {
            ":return"
        } else if pending == Pending::FINISH {
            ":finish"
        } else if pending.contains(Pending::THROW) {
            "Exception"
        } else if pending.contains(Pending::ERROR) {
            "Error and interrupt"
        } else {
            "Interrupt"
        };
        st.msg(&format!("{what} {how}"));
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

    #[test]
    fn error_values() {
        assert_eq!(
            error_exception_value("E492: Not an editor command: foo", Some("foo")),
            "Vim(foo):E492: Not an editor command: foo"
        );
        assert_eq!(error_exception_value("E15: bad", None), "Vim:E15: bad");
        assert_eq!(
            error_exception_value("\"x.txt\" E212: Can't open", Some("write")),
            "Vim(write):E212: Can't open (x.txt)"
        );
        assert_eq!(error_exception_value("no number", None), "Vim:no number");
    }

    #[test]
    fn vim_prefix_is_rejected() {
        let mut st = state();
        assert!(!st.throw_exception(ThrowValue::User("Vim:oops".into()), None));
        assert!(st.exc.current.is_none());
        assert!(st.throw_exception(ThrowValue::User("Vimx".into()), None));
        assert_eq!(st.exc.current.as_ref().unwrap().value, "Vimx");
    }

    #[test]
    fn errors_outside_try_are_not_collected() {
        let mut st = state();
        st.exc.msg_list = Some(MsgList::default());
        let mut ignore = false;
        assert!(!st.cause_errthrow("E1: x", false, &mut ignore));
        st.exc.trylevel = 1;
        assert!(st.cause_errthrow("Vim E123: x", false, &mut ignore));
        let list = st.exc.msg_list.as_ref().unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.throw_msg, "E123: x");
    }

    #[test]
    fn catch_and_finish_restore_vars() {
        let mut st = state();
        st.throw_exception(ThrowValue::User("one".into()), None);
        let one = st.exc.current.clone().unwrap();
        st.catch_exception(one.clone());
        st.throw_exception(ThrowValue::User("two".into()), None);
        let two = st.exc.current.clone().unwrap();
        st.catch_exception(two.clone());
        assert_eq!(st.vars.get_vim("exception").unwrap().to_string(), "two");
        st.finish_exception(two);
        assert_eq!(st.vars.get_vim("exception").unwrap().to_string(), "one");
        st.finish_exception(one);
        assert_eq!(st.vars.get_vim("exception").unwrap().to_string(), "");
        assert!(st.exc.caught.is_empty());
    }

    #[test]
    fn throw_takes_a_double_quoted_string() {
        let mut st = state();
        crate::runner::do_cmdline_cmd(
            &mut st,
            "try | throw \"x\" | catch /x/ | let g:caught = 1 | endtry",
        )
        .unwrap();
        assert_eq!(
            st.get_var("g:caught"),
            Some(crate::eval::Value::Number(1))
        );
    }

    #[test]
    fn snapshot_round_trip() {
        let mut st = state();
        st.exc.trylevel = 2;
        st.exc.did_emsg = true;
        let snap = st.save_dbg_stuff();
        assert_eq!(st.exc.trylevel, 0);
        assert!(!st.exc.did_emsg);
        st.restore_dbg_stuff(snap);
        assert_eq!(st.exc.trylevel, 2);
        assert!(st.exc.did_emsg);
    }
}
