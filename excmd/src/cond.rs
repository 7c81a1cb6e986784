//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The conditional stack of one runner: `:if`, `:while`, `:for` and
//! `:try` frames, and the handlers that push and pop them.

use std::rc::Rc;

use bitflags::bitflags;

use crate::docmd::{CmdCtx, ExArgs};
use crate::error::{e, invalid, Result};
use crate::eval::{ListRef, Value};
use crate::except::Exception;
use crate::state::EditorState;

/// Maximum nesting of conditionals in one runner.
pub const CSTACK_LEN: usize = 50;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CondFlags: u16 {
        /// The condition was true, or the frame must never become active.
        const TRUE = 1 << 0;
        /// Commands are executed.
        const ACTIVE = 1 << 1;
        /// `:else` seen.
        const ELSE = 1 << 2;
        const WHILE = 1 << 3;
        const FOR = 1 << 4;
        const TRY = 1 << 5;
        /// In the finally clause.
        const FINALLY = 1 << 6;
        /// An exception was thrown in the try block.
        const THROWN = 1 << 7;
        /// The exception was caught by a catch clause.
        const CAUGHT = 1 << 8;
        /// The caught exception was finished.
        const FINISHED = 1 << 9;
        /// `emsg_silent` was reset on entering the `:try`.
        const SILENT = 1 << 10;
    }
}

bitflags! {
    /// What a `:try` frame has made pending until its `:endtry`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pending: u8 {
        const NONE = 0;
        const ERROR = 1 << 0;
        const INTERRUPT = 1 << 1;
        const THROW = 1 << 2;
        const BREAK = 1 << 3;
        const CONTINUE = 1 << 4;
        const RETURN = Self::BREAK.bits() | Self::CONTINUE.bits();
        const FINISH = 1 << 5;
    }
}

bitflags! {
    /// Messages from loop handlers to the runner.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LoopFlags: u8 {
        /// Jumped back from `:endwhile`/`:endfor` (or just entered a loop).
        const HAD_LOOP = 1 << 0;
        const HAD_ENDLOOP = 1 << 1;
        const HAD_CONT = 1 << 2;
        const HAD_FINA = 1 << 3;
    }
}

/// State of a `:for` loop between iterations.
#[derive(Debug, Clone)]
pub struct ForIter {
    /// Loop variables; more than one when unpacking `[a, b]`.
    targets: Vec<String>,
    /// Variable after `;` receiving the remaining items.
    rest: Option<String>,
    unpack: bool,
    items: ForItems,
    idx: usize,
}

#[derive(Debug, Clone)]
enum ForItems {
    List(ListRef),
    Chars(Vec<char>),
}

#[derive(Debug, Default)]
pub struct CondFrame {
    pub flags: CondFlags,
    pub pending: Pending,
    /// Return value of a pending `:return`.
    pub rettv: Option<Value>,
    /// The exception thrown in or pending for this `:try`.
    pub exception: Option<Rc<Exception>>,
    pub saved_emsg_silent: Option<i32>,
    /// Index in the stored loop lines of the `:while`/`:for` line.
    pub line: Option<usize>,
    pub for_iter: Option<ForIter>,
}

#[derive(Debug, Default)]
pub struct CondStack {
    pub frames: Vec<CondFrame>,
    /// Number of `:try` frames.
    pub trylevel: i32,
    /// Number of `:while`/`:for` frames.
    pub looplevel: i32,
    pub lflags: LoopFlags,
}

impl CondStack {
    pub fn new() -> CondStack {
        CondStack::default()
    }

    pub fn push(&mut self, flags: CondFlags) {
        self.frames.push(CondFrame {
            flags,
            ..Default::default()
        });
    }

    pub fn pop(&mut self) -> Option<CondFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> &CondFrame {
        &self.frames[self.frames.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut CondFrame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn top_opt(&self) -> Option<&CondFrame> {
        self.frames.last()
    }

    /// The innermost frame is inactive, so a frame pushed now must not
    /// become active.
    pub fn parent_inactive(&self) -> bool {
        self.frames
            .last()
            .is_some_and(|f| !f.flags.contains(CondFlags::ACTIVE))
    }

    /// The frame enclosing the top one is inactive.
    fn enclosing_inactive(&self) -> bool {
        let n = self.frames.len();
        n > 1 && !self.frames[n - 2].flags.contains(CondFlags::ACTIVE)
    }

    /// Pop frames above `idx`. Popped frames of a kind in `kinds`
    /// decrement the matching level.
    pub fn rewind(&mut self, idx: usize, kinds: CondFlags) {
        self.truncate(idx + 1, kinds);
    }

    /// Pop frames until `len` remain.
    pub fn truncate(&mut self, len: usize, kinds: CondFlags) {
        while self.frames.len() > len {
            if let Some(frame) = self.frames.pop() {
                if frame.flags.intersects(kinds) {
                    if kinds.contains(CondFlags::TRY) {
                        self.trylevel -= 1;
                    } else {
                        self.looplevel -= 1;
                    }
                }
            }
        }
    }

    /// The error for a conditional left open at the top.
    pub fn get_end_emsg(&self) -> &'static str {
        match self.frames.last() {
            Some(f) if f.flags.contains(CondFlags::WHILE) => e::MISSING_ENDWHILE,
            Some(f) if f.flags.contains(CondFlags::FOR) => e::MISSING_ENDFOR,
            _ => e::MISSING_ENDIF,
        }
    }
}

impl EditorState {
    /// Make conditionals inactive from the top down to the innermost one
    /// matching `searched` (with an empty `searched`, a `:try` not in its
    /// finally clause). `inclusive` makes the found one inactive too.
    /// Pending actions are discarded where an error, interrupt or finally
    /// clause ends them, and a caught exception of a catch clause that is
    /// left is finished. Returns the index where the search stopped.
    pub fn cleanup_conditionals(
        &mut self,
        cs: &mut CondStack,
        searched: CondFlags,
        inclusive: bool,
    ) -> Option<usize> {
        let mut stop = false;
        let mut idx = cs.frames.len();
        while idx > 0 {
            idx -= 1;
            let flags = cs.frames[idx].flags;
            if flags.contains(CondFlags::TRY) {
                if self.exc.did_emsg || self.exc.got_int || flags.contains(CondFlags::FINALLY) {
                    let frame = &mut cs.frames[idx];
                    let pending = frame.pending;
                    if pending == Pending::CONTINUE
                        || pending == Pending::BREAK
                        || pending == Pending::FINISH
                    {
                        log::trace!("discarding pending {pending:?}");
                        frame.pending = Pending::NONE;
                    } else if pending == Pending::RETURN {
                        log::trace!("discarding pending return");
                        frame.rettv = None;
                        frame.pending = Pending::NONE;
                    } else if !pending.is_empty() && flags.contains(CondFlags::FINALLY) {
                        if pending.contains(Pending::THROW) {
                            if let Some(exc) = frame.exception.take() {
                                self.discard_exception(exc, false);
                            }
                        }
                        cs.frames[idx].pending = Pending::NONE;
                    }
                }

                // stop at a try conditional not in its finally clause
                if !flags.contains(CondFlags::FINALLY) {
                    if flags.contains(CondFlags::ACTIVE | CondFlags::CAUGHT)
                        && !flags.contains(CondFlags::FINISHED)
                    {
                        if let Some(exc) = cs.frames[idx].exception.clone() {
                            self.finish_exception(exc);
                        }
                        cs.frames[idx].flags |= CondFlags::FINISHED;
                    }
                    // unless the try block never got active
                    if flags.contains(CondFlags::TRUE) {
                        if searched.is_empty() && !inclusive {
                            return Some(idx);
                        }
                        stop = true;
                    }
                }
            }

            if cs.frames[idx].flags.intersects(searched) {
                if !inclusive {
                    return Some(idx);
                }
                stop = true;
            }
            cs.frames[idx].flags.remove(CondFlags::ACTIVE);
            if stop && searched != (CondFlags::TRY | CondFlags::SILENT) {
                return Some(idx);
            }

            // leaving a :try that reset emsg_silent
            let frame = &mut cs.frames[idx];
            if frame.flags.contains(CondFlags::TRY | CondFlags::SILENT) {
                if let Some(saved) = frame.saved_emsg_silent.take() {
                    self.emsg_silent = saved;
                }
                frame.flags.remove(CondFlags::SILENT);
            }
            if stop {
                return Some(idx);
            }
        }
        None
    }
}

fn frame_skip(st: &EditorState) -> bool {
    st.exc.did_emsg || st.exc.got_int || st.exc.did_throw
}

/// `:if {expr}`
pub fn ex_if(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    if ctx.cstack.frames.len() >= CSTACK_LEN {
        return Err(invalid(e::IF_NESTING));
    }
    let skip = frame_skip(st) || ctx.cstack.parent_inactive();
    ctx.cstack.push(CondFlags::empty());

    let result = st.eval_to_bool(ea, skip);
    ctx.cstack.top_mut().flags = match (skip, result) {
        (false, Some(true)) => CondFlags::ACTIVE | CondFlags::TRUE,
        (false, Some(false)) => CondFlags::empty(),
        // never gets active
        _ => CondFlags::TRUE,
    };
    Ok(())
}

/// `:endif`
pub fn ex_endif(_st: &mut EditorState, _ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let cs = &mut *ctx.cstack;
    match cs.top_opt() {
        Some(f) if !f.flags.intersects(CondFlags::WHILE | CondFlags::FOR | CondFlags::TRY) => {
            cs.pop();
            Ok(())
        }
        _ => Err(invalid(e::ENDIF_WITHOUT_IF)),
    }
}

/// `:else` and `:elseif {expr}`
pub fn ex_else(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let is_elseif = ea.cmd == crate::cmds::Cmd::Elseif;
    let mut skip = frame_skip(st) || ctx.cstack.enclosing_inactive();
    let mut errmsg = None;

    let top = ctx.cstack.top_opt().map(|f| f.flags);
    match top {
        None => {
            if !is_elseif {
                return Err(invalid(e::ELSE_WITHOUT_IF));
            }
            errmsg = Some(e::ELSEIF_WITHOUT_IF);
            skip = true;
        }
        Some(f) if f.intersects(CondFlags::WHILE | CondFlags::FOR | CondFlags::TRY) => {
            if !is_elseif {
                return Err(invalid(e::ELSE_WITHOUT_IF));
            }
            errmsg = Some(e::ELSEIF_WITHOUT_IF);
            skip = true;
        }
        Some(f) if f.contains(CondFlags::ELSE) => {
            if !is_elseif {
                return Err(invalid(e::MULTIPLE_ELSE));
            }
            errmsg = Some(e::ELSEIF_AFTER_ELSE);
            skip = true;
        }
        Some(_) => {}
    }

    // the frame is only touched when it is the :if being continued
    let own = errmsg.is_none();

    if skip || top.is_some_and(|f| f.contains(CondFlags::TRUE)) {
        if own {
            ctx.cstack.top_mut().flags = CondFlags::TRUE;
        }
        // an :elseif is not evaluated
        skip = true;
    } else if own {
        ctx.cstack.top_mut().flags = CondFlags::ACTIVE;
    }

    if is_elseif {
        let arg = ea.arg_str();
        let mut result = None;
        // a missing expression is an error even when skipping
        if skip && !arg.starts_with('"') && crate::charset::ends_excmd(arg.bytes().next()) {
            st.emsg(&format!("{}: {}", e::INVEXPR_STR, arg));
        } else {
            result = st.eval_to_bool(ea, skip);
        }
        if own {
            match (skip, result) {
                (false, Some(true)) => {
                    ctx.cstack.top_mut().flags = CondFlags::ACTIVE | CondFlags::TRUE
                }
                (false, Some(false)) => ctx.cstack.top_mut().flags = CondFlags::empty(),
                _ => ctx.cstack.top_mut().flags = CondFlags::TRUE,
            }
        }
    } else if own {
        ctx.cstack.top_mut().flags |= CondFlags::ELSE;
    }

    match errmsg {
        Some(msg) => Err(invalid(msg)),
        None => Ok(()),
    }
}

/// `:while {expr}` and `:for {var} in {expr}`
pub fn ex_while(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let is_for = ea.cmd == crate::cmds::Cmd::For;
    let cs = &mut *ctx.cstack;
    if cs.frames.len() >= CSTACK_LEN {
        return Err(invalid(e::WHILE_NESTING));
    }

    // HAD_LOOP is set when jumping back from the :endwhile/:endfor
    let again = cs.lflags.contains(LoopFlags::HAD_LOOP);
    if !again {
        cs.push(CondFlags::empty());
        cs.looplevel += 1;
        cs.top_mut().line = None;
    }
    cs.top_mut().flags = if is_for {
        CondFlags::FOR
    } else {
        CondFlags::WHILE
    };

    let skip = frame_skip(st) || ctx.cstack.enclosing_inactive();
    let outcome = if is_for {
        let iter = if again {
            // reuse the list evaluated on the first pass
            ea.nextcmd = None;
            let taken = ctx.cstack.top_mut().for_iter.take();
            skip_for_expr(st, ea);
            taken.map(|fi| Ok(Some(fi)))
        } else {
            Some(eval_for_line(st, ea, skip))
        };
        match iter {
            Some(Ok(Some(mut fi))) if !skip => {
                let more = next_for_item(st, &mut fi);
                match more {
                    Ok(true) => {
                        ctx.cstack.top_mut().for_iter = Some(fi);
                        Some(true)
                    }
                    Ok(false) => Some(false),
                    Err(err) => {
                        st.emsg(&err.message());
                        None
                    }
                }
            }
            Some(Err(err)) => {
                st.emsg(&err.message());
                None
            }
            Some(Ok(_)) | None => {
                if skip {
                    Some(false)
                } else {
                    None
                }
            }
        }
    } else {
        st.eval_to_bool(ea, skip)
    };

    let cs = &mut *ctx.cstack;
    match (skip, outcome) {
        (false, Some(true)) => {
            cs.top_mut().flags |= CondFlags::ACTIVE | CondFlags::TRUE;
            // tells the runner to remember the line the first time and
            // is cleared when executing the header again
            cs.lflags.toggle(LoopFlags::HAD_LOOP);
        }
        (false, Some(false)) => {
            cs.lflags.remove(LoopFlags::HAD_LOOP);
            cs.top_mut().flags |= CondFlags::TRUE;
        }
        _ => cs.lflags.remove(LoopFlags::HAD_LOOP),
    }
    Ok(())
}

/// Split `for {var} in` or `for [{a}, {b}; {rest}] in`. Returns the
/// targets and the offset of the list expression.
fn parse_for_head(arg: &str) -> Result<(Vec<String>, Option<String>, bool, usize)> {
    let mut targets = Vec::new();
    let mut rest = None;
    let mut p;
    let unpack = arg.starts_with('[');
    if unpack {
        p = 1;
        loop {
            p = crate::charset::skipwhite_at(arg, p);
            let (tail, name) = crate::eval::parser::name(&arg[p..])
                .map_err(|_| invalid(format!("{}: {}", e::INVARG, arg)))?;
            p = arg.len() - tail.len();
            p = crate::charset::skipwhite_at(arg, p);
            if rest.is_some() {
                return Err(invalid(format!("{}: {}", e::INVARG, arg)));
            }
            match arg.as_bytes().get(p) {
                Some(b',') => {
                    targets.push(name.to_string());
                    p += 1;
                }
                Some(b';') => {
                    targets.push(name.to_string());
                    p += 1;
                    p = crate::charset::skipwhite_at(arg, p);
                    let (tail, r) = crate::eval::parser::name(&arg[p..])
                        .map_err(|_| invalid(format!("{}: {}", e::INVARG, arg)))?;
                    rest = Some(r.to_string());
                    p = crate::charset::skipwhite_at(arg, arg.len() - tail.len());
                    if arg.as_bytes().get(p) != Some(&b']') {
                        return Err(invalid(format!("{}: {}", e::INVARG, arg)));
                    }
                    p += 1;
                    break;
                }
                Some(b']') => {
                    targets.push(name.to_string());
                    p += 1;
                    break;
                }
                _ => return Err(invalid(format!("{}: {}", e::INVARG, arg))),
            }
        }
    } else {
        let (tail, name) = crate::eval::parser::name(arg)
            .map_err(|_| invalid(format!("{}: {}", e::INVARG, arg)))?;
        targets.push(name.to_string());
        p = arg.len() - tail.len();
    }

    p = crate::charset::skipwhite_at(arg, p);
    let after_in = arg[p..]
        .strip_prefix("in")
        .filter(|t| t.starts_with([' ', '\t']));
    match after_in {
        Some(t) => Ok((
            targets,
            rest,
            unpack,
            crate::charset::skipwhite_at(arg, arg.len() - t.len()),
        )),
        None => Err(invalid("E690: Missing \"in\" after :for")),
    }
}

fn eval_for_line(st: &mut EditorState, ea: &mut ExArgs, skip: bool) -> Result<Option<ForIter>> {
    let (targets, rest, unpack, at) = parse_for_head(ea.arg_str())?;
    let value = st.eval_arg_at(ea, at, skip)?;
    if skip {
        return Ok(None);
    }
    let items = match value {
        Value::List(l) => ForItems::List(l),
        Value::String(s) => ForItems::Chars(s.chars().collect()),
        _ => return Err(crate::error::runtime("E1098: String, List or Blob required")),
    };
    Ok(Some(ForIter {
        targets,
        rest,
        unpack,
        items,
        idx: 0,
    }))
}

/// On a jump back to the `:for` only find where the next command starts.
fn skip_for_expr(st: &mut EditorState, ea: &mut ExArgs) {
    if let Ok((_, _, _, at)) = parse_for_head(ea.arg_str()) {
        let _ = st.eval_arg_at(ea, at, true);
    }
}

/// Assign the next item to the loop variables. `false` past the end.
fn next_for_item(st: &mut EditorState, fi: &mut ForIter) -> Result<bool> {
    let item = match &fi.items {
        ForItems::List(l) => l.borrow().get(fi.idx).cloned(),
        ForItems::Chars(c) => c.get(fi.idx).map(|c| Value::str(c.to_string())),
    };
    let Some(item) = item else {
        return Ok(false);
    };
    fi.idx += 1;

    if !fi.unpack {
        st.set_var(&fi.targets[0], item)?;
        return Ok(true);
    }
    let Value::List(l) = item else {
        return Err(crate::error::runtime(e::LIST_REQUIRED));
    };
    let values = l.borrow().clone();
    let n = fi.targets.len();
    if values.len() < n || (fi.rest.is_none() && values.len() > n) {
        return Err(crate::error::runtime(if values.len() < n {
            "E688: More targets than List items"
        } else {
            "E687: Less targets than List items"
        }));
    }
    for (name, v) in fi.targets.iter().zip(values.iter()) {
        st.set_var(name, v.clone())?;
    }
    if let Some(rest) = &fi.rest {
        st.set_var(rest, Value::list(values[n..].to_vec()))?;
    }
    Ok(true)
}

/// `:continue`
pub fn ex_continue(st: &mut EditorState, _ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let cs = &mut *ctx.cstack;
    if cs.looplevel <= 0 || cs.frames.is_empty() {
        return Err(invalid(e::CONT_WITHOUT_LOOP));
    }
    // may stop at a :try not in its finally clause, which then runs next
    let idx = st.cleanup_conditionals(cs, CondFlags::WHILE | CondFlags::FOR, false);
    match idx {
        Some(i) if cs.frames[i].flags.intersects(CondFlags::WHILE | CondFlags::FOR) => {
            cs.rewind(i, CondFlags::TRY);
            cs.lflags |= LoopFlags::HAD_CONT;
        }
        Some(i) => {
            cs.frames[i].pending = Pending::CONTINUE;
            log::trace!(":continue made pending");
        }
        None => {}
    }
    Ok(())
}

/// `:break`
pub fn ex_break(st: &mut EditorState, _ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let cs = &mut *ctx.cstack;
    if cs.looplevel <= 0 || cs.frames.is_empty() {
        return Err(invalid(e::BREAK_WITHOUT_LOOP));
    }
    let idx = st.cleanup_conditionals(cs, CondFlags::WHILE | CondFlags::FOR, true);
    if let Some(i) = idx {
        if !cs.frames[i].flags.intersects(CondFlags::WHILE | CondFlags::FOR) {
            cs.frames[i].pending = Pending::BREAK;
            log::trace!(":break made pending");
        }
    }
    Ok(())
}

/// `:endwhile` and `:endfor`
pub fn ex_endwhile(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let (err, csf) = if ea.cmd == crate::cmds::Cmd::Endwhile {
        (e::ENDWHILE_WITHOUT_WHILE, CondFlags::WHILE)
    } else {
        (e::ENDFOR_WITHOUT_FOR, CondFlags::FOR)
    };

    let cs = &mut *ctx.cstack;
    if cs.looplevel <= 0 || cs.frames.is_empty() {
        return Err(invalid(err));
    }

    let mut errmsg = None;
    let fl = cs.top().flags;
    if !fl.contains(csf) {
        // the wrong end command does not rewind to an enclosing loop
        if fl.contains(CondFlags::WHILE) {
            errmsg = Some(e::ENDFOR_WITH_WHILE);
        } else if fl.contains(CondFlags::FOR) {
            errmsg = Some(e::ENDWHILE_WITH_FOR);
        }
    }
    if !fl.intersects(CondFlags::WHILE | CondFlags::FOR) {
        if !fl.contains(CondFlags::TRY) {
            errmsg = Some(e::MISSING_ENDIF);
        } else if fl.contains(CondFlags::FINALLY) {
            errmsg = Some(e::MISSING_ENDTRY);
        }
        // find the matching loop and report what is missing
        let mut idx = cs.frames.len() - 1;
        while idx > 0 {
            let f = cs.frames[idx].flags;
            if f.contains(CondFlags::TRY) && !f.contains(CondFlags::FINALLY) {
                // ignore the end command at a :try not in its finally clause
                return Err(invalid(err));
            }
            if f.contains(csf) {
                break;
            }
            idx -= 1;
        }
        st.cleanup_conditionals(cs, CondFlags::WHILE | CondFlags::FOR, false);
        cs.rewind(idx, CondFlags::TRY);
    }

    cs.lflags |= LoopFlags::HAD_ENDLOOP;
    match errmsg {
        Some(msg) => Err(invalid(msg)),
        None => Ok(()),
    }
}

/// Whether `line` starts with `:while` or `:for`, after modifiers.
pub fn has_loop_cmd(line: &str) -> bool {
    let mut p = line;
    loop {
        p = p.trim_start_matches([' ', '\t', ':']);
        let len = crate::modifiers::modifier_len(p);
        if len == 0 {
            break;
        }
        p = &p[len..];
    }
    p.starts_with("wh") || p.starts_with("for")
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn loop_commands_are_recognized() {
        assert!(has_loop_cmd("  while 1"));
        assert!(has_loop_cmd(":for i in x"));
        // a bang modifier is not skipped, so the loop is not seen
        assert!(!has_loop_cmd("silent! while x"));
        assert!(has_loop_cmd("silent while x"));
        assert!(!has_loop_cmd("echo 'while'"));
        assert!(!has_loop_cmd("fo"));
    }

    #[test]
    fn rewind_counts_levels() {
        let mut cs = CondStack::new();
        cs.push(CondFlags::WHILE);
        cs.looplevel += 1;
        cs.push(CondFlags::TRY);
        cs.trylevel += 1;
        cs.push(CondFlags::FOR);
        cs.looplevel += 1;
        cs.rewind(1, CondFlags::WHILE | CondFlags::FOR);
        assert_eq!(cs.frames.len(), 2);
        assert_eq!(cs.looplevel, 1);
        cs.rewind(0, CondFlags::TRY);
        assert_eq!(cs.trylevel, 0);
        assert_eq!(cs.get_end_emsg(), e::MISSING_ENDWHILE);
    }

    #[test]
    fn for_heads() {
        let (t, r, u, at) = parse_for_head("i in [1, 2]").unwrap();
        assert_eq!(t, vec!["i"]);
        assert!(r.is_none() && !u);
        assert_eq!(at, 5);
        let (t, r, u, _) = parse_for_head("[a, b; c] in x").unwrap();
        assert_eq!(t, vec!["a", "b"]);
        assert_eq!(r.as_deref(), Some("c"));
        assert!(u);
        assert!(parse_for_head("i of x").is_err());
    }

    #[test]
    fn cleanup_stops_at_try() {
        let mut st = EditorState::new(Box::new(crate::host::MemHost::new()), false);
        let mut cs = CondStack::new();
        cs.push(CondFlags::WHILE | CondFlags::ACTIVE | CondFlags::TRUE);
        cs.push(CondFlags::TRY | CondFlags::ACTIVE | CondFlags::TRUE);
        cs.push(CondFlags::ACTIVE | CondFlags::TRUE);
        let idx = st.cleanup_conditionals(&mut cs, CondFlags::WHILE | CondFlags::FOR, false);
        assert_eq!(idx, Some(1));
        assert!(!cs.frames[2].flags.contains(CondFlags::ACTIVE));
        assert!(cs.frames[0].flags.contains(CondFlags::ACTIVE));
    }
}
