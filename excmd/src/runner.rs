//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The command-line runner: executes lines from a [`LineSource`] until
//! the source ends, an error stops it, or there is nothing left to do.
//!
//! Loops are run by storing every line executed inside a `:while` or
//! `:for` and replaying them from the stored copy when an `:endwhile`
//! jumps back.

use bitflags::bitflags;

use crate::cond::{has_loop_cmd, CondFlags, CondStack, LoopFlags, Pending};
use crate::docmd::{do_one_cmd, CmdCtx};
use crate::error::{e, Error, Result};
use crate::except::{report_make_pending, MsgList};
use crate::line_source::{LineSource, LoopLine, ReplaySource, SourceKind, StrSource};
use crate::options::Opt;
use crate::state::EditorState;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RunFlags: u8 {
        /// Append the command to error messages.
        const VERBOSE = 0x01;
        /// Do not wait for return at the end.
        const NOWAIT = 0x02;
        /// Keep reading lines until the source ends.
        const REPEAT = 0x04;
        /// The command counts as typed.
        const KEYTYPED = 0x08;
        /// Run with a fresh exception state, restored at the end.
        const EXCRESET = 0x10;
        /// Remember the first typed line for repeating.
        const KEEPLINE = 0x20;
    }
}

/// At this many nested runners `:execute` and friends give up, unless
/// 'maxfuncdepth' is larger.
const MAX_CALL_DEPTH: i32 = 200;

/// Breakpoint bookkeeping of one runner over a script or function.
struct BreakTracker {
    is_file: bool,
    name: String,
    next: i64,
    tick: u64,
}

impl BreakTracker {
    fn new(st: &EditorState, kind: SourceKind) -> Option<BreakTracker> {
        if !matches!(kind, SourceKind::Script | SourceKind::Function) {
            return None;
        }
        let name = st.sourcing.last()?.name.clone();
        let is_file = kind == SourceKind::Script;
        Some(BreakTracker {
            next: st.debug.find_breakpoint(is_file, &name, 0),
            is_file,
            name,
            tick: st.debug.tick,
        })
    }

    /// Stop when the line being executed is at or past the next
    /// breakpoint.
    fn check(&mut self, st: &mut EditorState) {
        let lnum = st.sourcing_lnum();
        if self.tick != st.debug.tick {
            self.next = st.debug.find_breakpoint(self.is_file, &self.name, lnum - 1);
            self.tick = st.debug.tick;
        }
        if self.next != 0 && self.next <= lnum {
            crate::debug::dbg_breakpoint(st, &self.name, lnum);
            self.next = st.debug.find_breakpoint(self.is_file, &self.name, lnum);
            self.tick = st.debug.tick;
        }
    }

    /// After jumping back to a loop start, look again from there.
    fn rewind(&mut self, st: &EditorState, lnum: i64) {
        self.next = st.debug.find_breakpoint(self.is_file, &self.name, lnum - 1);
        self.tick = st.debug.tick;
    }
}

/// Execute `cmd` as if typed, with the command appended to errors.
pub fn do_cmdline_cmd(st: &mut EditorState, cmd: &str) -> Result<()> {
    let mut source = StrSource::default();
    do_cmdline(
        st,
        Some(cmd),
        &mut source,
        RunFlags::VERBOSE | RunFlags::NOWAIT | RunFlags::KEYTYPED,
    )
}

/// Execute `cmdline`, or lines from `source` when it is `None`. Lines
/// after the first are read from `source` as needed by `:if`, `:while`,
/// `:try` and with [`RunFlags::REPEAT`].
///
/// Returns an error only when the runner could not start; errors of the
/// commands are reported as they happen.
pub fn do_cmdline(
    st: &mut EditorState,
    cmdline: Option<&str>,
    source: &mut dyn LineSource,
    flags: RunFlags,
) -> Result<()> {
    let kind = source.kind();
    let is_func = kind == SourceKind::Function;
    let interactive = kind == SourceKind::Interactive;

    let saved_msg_list = st.exc.msg_list.replace(MsgList::default());
    let saved_sticky = std::mem::take(&mut st.sticky_cmdmod);

    let maxfuncdepth = st.p_num(Opt::Maxfuncdepth);
    if st.call_depth >= MAX_CALL_DEPTH && i64::from(st.call_depth) >= maxfuncdepth {
        st.emsg(e::TOO_RECURSIVE);
        // not an error of a specific command
        st.do_errthrow(None, None);
        st.exc.msg_list = saved_msg_list;
        st.sticky_cmdmod = saved_sticky;
        if is_func {
            st.ex_nesting_level -= 1;
        }
        return Err(Error::Aborted);
    }
    st.call_depth += 1;
    log::trace!("runner enter: depth {} kind {:?}", st.call_depth, kind);

    if st.ex_nesting_level == 0 {
        st.exc.force_abort = false;
        st.exc.suppress_errthrow = false;
    }
    let debug_saved = flags
        .contains(RunFlags::EXCRESET)
        .then(|| st.save_dbg_stuff());
    let initial_trylevel = st.exc.trylevel;
    st.exc.did_throw = false;
    st.exc.did_emsg = false;
    if !flags.contains(RunFlags::KEYTYPED) && !interactive {
        st.key_typed = false;
    }

    // boxed to keep the frame small for :execute and :source recursion
    let mut cstack = Box::new(CondStack::new());
    let mut lines: Vec<LoopLine> = Vec::new();
    let mut current_line = 0usize;
    let mut used_getline = false;
    let mut typed_line: Option<String> = None;
    let mut breaks = BreakTracker::new(st, kind);
    let mut next_cmdline: Option<String> = cmdline.map(str::to_string);

    loop {
        // stop skipping commands for an error after all endif/while/for
        if next_cmdline.is_none()
            && !st.exc.force_abort
            && cstack.frames.is_empty()
            && !(is_func && crate::userfunc::func_has_abort(st))
        {
            st.exc.did_emsg = false;
        }

        // 1. repeating a loop: take the stored line
        if cstack.looplevel > 0 && current_line < lines.len() {
            // the rest after a '|' was stored as a line of its own and is
            // dropped here
            if source.ended(st) || source.finished(st) {
                break;
            }
            let stored = &lines[current_line];
            next_cmdline = Some(stored.text.clone());
            st.set_sourcing_lnum(stored.lnum);
            if let Some(b) = breaks.as_mut() {
                b.check(st);
            }
        }

        // 2. read a new line
        if next_cmdline.is_none() {
            let indent = cstack.frames.len() * 2;
            match source.next_line(st, indent) {
                Some(line) => {
                    used_getline = true;
                    st.sticky_cmdmod = Default::default();
                    if st.host.interrupted() {
                        st.exc.got_int = true;
                    }
                    if interactive {
                        typed_line = Some(line.clone());
                    }
                    if let Some(b) = breaks.as_mut() {
                        b.check(st);
                    }
                    next_cmdline = Some(line);
                }
                None => break,
            }
        }
        let Some(line) = next_cmdline.take() else {
            break;
        };

        // inside a loop, or at its start: store the line for replaying
        let use_replay = cstack.looplevel > 0 || has_loop_cmd(&line);
        let repeating = current_line < lines.len();
        if use_replay && current_line == lines.len() {
            lines.push(LoopLine {
                text: line.clone(),
                lnum: st.sourcing_lnum(),
            });
        }

        let verbose = st.p_num(Opt::Verbose);
        if (verbose >= 15 && st.sourcing_name().is_some()) || verbose >= 16 {
            let lnum = st.sourcing_lnum();
            st.msg(&format!("line {lnum}: {line}"));
        }

        // 3. execute one '|' separated command
        next_cmdline = if use_replay {
            let mut replay = ReplaySource::new(&mut *source, &mut lines, current_line, repeating);
            let next = {
                let mut ctx = CmdCtx {
                    cstack: &mut cstack,
                    source: &mut replay,
                };
                do_one_cmd(st, line, flags, &mut ctx)
            };
            // defining a function inside the loop reads more lines
            current_line = replay.current;
            next
        } else {
            let mut ctx = CmdCtx {
                cstack: &mut cstack,
                source: &mut *source,
            };
            do_one_cmd(st, line, flags, &mut ctx)
        };

        if next_cmdline.is_none() {
            // remember a typed line for ":@:" after executing it
            if let Some(line) = typed_line.take() {
                st.regs.last_cmdline = Some(line);
            }
        }

        // an error in a function without "abort" does not stop it
        if st.exc.did_emsg
            && !st.exc.force_abort
            && is_func
            && !crate::userfunc::func_has_abort(st)
        {
            st.exc.did_emsg = false;
        }

        if cstack.looplevel > 0 {
            current_line += 1;

            // :endwhile, :endfor and :continue jump back to the loop start
            if cstack.lflags.intersects(LoopFlags::HAD_CONT | LoopFlags::HAD_ENDLOOP) {
                cstack
                    .lflags
                    .remove(LoopFlags::HAD_CONT | LoopFlags::HAD_ENDLOOP);
                let target = cstack.top_opt().and_then(|f| {
                    let looping = f.flags.intersects(CondFlags::WHILE | CondFlags::FOR)
                        && f.flags.contains(CondFlags::ACTIVE);
                    if looping {
                        f.line
                    } else {
                        None
                    }
                });
                match target {
                    Some(line)
                        if !st.exc.did_emsg && !st.exc.got_int && !st.exc.did_throw =>
                    {
                        current_line = line;
                        cstack.lflags.insert(LoopFlags::HAD_LOOP);
                        if st.host.interrupted() {
                            st.exc.got_int = true;
                        }
                        if let (Some(b), Some(stored)) = (breaks.as_mut(), lines.get(line)) {
                            b.rewind(st, stored.lnum);
                        }
                    }
                    _ => {
                        // only an :endwhile or :endfor gets here
                        let n = cstack.frames.len();
                        if n > 0 {
                            cstack.truncate(n - 1, CondFlags::WHILE | CondFlags::FOR);
                        }
                    }
                }
            } else if cstack.lflags.contains(LoopFlags::HAD_LOOP) {
                // remember the line of a :while or :for
                cstack.lflags.remove(LoopFlags::HAD_LOOP);
                cstack.top_mut().line = Some(current_line - 1);
            }
        }

        if cstack.looplevel == 0 {
            if let Some(last) = lines.last() {
                st.set_sourcing_lnum(last.lnum);
            }
            lines.clear();
            current_line = 0;
        }

        // a :finally makes errors, interrupts and exceptions pending until
        // its :endtry, and runs the finally clause
        if cstack.lflags.contains(LoopFlags::HAD_FINA) {
            cstack.lflags.remove(LoopFlags::HAD_FINA);
            let pending =
                cstack.top().pending & (Pending::ERROR | Pending::INTERRUPT | Pending::THROW);
            report_make_pending(st, pending);
            st.exc.did_emsg = false;
            st.exc.got_int = false;
            st.exc.did_throw = false;
            cstack.top_mut().flags |= CondFlags::ACTIVE | CondFlags::FINALLY;
        }

        st.exc.trylevel = initial_trylevel + cstack.trylevel;

        // leaving the outermost try conditional normally restores the
        // abort-on-error behavior
        if st.exc.trylevel == 0 && !st.exc.did_emsg && !st.exc.got_int && !st.exc.did_throw {
            st.exc.force_abort = false;
        }
        st.do_intthrow(&mut cstack);

        let aborted = (st.exc.got_int
            || (st.exc.did_emsg && st.exc.force_abort)
            || st.exc.did_throw)
            && cstack.trylevel == 0;
        // typed lines stop at an error, unless a :try can handle it
        let typed_error = st.exc.did_emsg
            && (cstack.trylevel == 0 || st.exc.did_emsg_syntax)
            && used_getline
            && interactive;
        let more = next_cmdline.is_some()
            || !cstack.frames.is_empty()
            || flags.contains(RunFlags::REPEAT);
        if aborted || typed_error || !more || st.exiting.is_some() {
            break;
        }
    }

    st.exc.did_emsg_syntax = false;
    drop(lines);

    if !cstack.frames.is_empty() {
        // a script or function ran to its end with a block still open
        let ran_to_end = match kind {
            SourceKind::Script => !source.finished(st),
            SourceKind::Function => !source.ended(st),
            _ => false,
        };
        if !st.exc.got_int && !st.exc.did_throw && !st.aborting() && ran_to_end {
            let flags = cstack.top().flags;
            let msg = if flags.contains(CondFlags::TRY) {
                e::MISSING_ENDTRY
            } else if flags.contains(CondFlags::WHILE) {
                e::MISSING_ENDWHILE
            } else if flags.contains(CondFlags::FOR) {
                e::MISSING_ENDFOR
            } else {
                e::MISSING_ENDIF
            };
            st.emsg(msg);
        }

        // finish caught exceptions and drop anything pending
        while !cstack.frames.is_empty() {
            let keep = st
                .cleanup_conditionals(&mut cstack, CondFlags::empty(), true)
                .unwrap_or(0);
            cstack.truncate(keep, CondFlags::WHILE | CondFlags::FOR);
        }
        st.exc.trylevel = initial_trylevel;
    }

    // an error reported above may become an exception now
    st.do_errthrow(Some(&mut *cstack), is_func.then_some("endfunction"));

    if st.exc.trylevel == 0 {
        if st.exc.did_throw {
            // leaving the outermost try conditional with an exception
            st.handle_did_throw();
        } else if st.exc.got_int || (st.exc.did_emsg && st.exc.force_abort) {
            st.exc.suppress_errthrow = true;
        }
    }

    // an uncaught exception is rethrown in the enclosing runner; a
    // :return or :finish of a nested runner is checked by the command
    // that started it
    if st.exc.did_throw {
        st.exc.need_rethrow = true;
    }
    let frame_level = st
        .sourcing
        .iter()
        .rev()
        .find(|f| f.kind == kind)
        .map(|f| f.level);
    let nested = match (kind, frame_level) {
        (SourceKind::Script, Some(level)) => st.ex_nesting_level > level,
        (SourceKind::Function, Some(level)) => st.ex_nesting_level > level + 1,
        _ => false,
    };
    if nested {
        if !st.exc.did_throw {
            st.check_cstack = true;
        }
    } else {
        if is_func {
            st.ex_nesting_level -= 1;
        }
        let stepping = matches!(kind, SourceKind::Script | SourceKind::Function)
            && st.ex_nesting_level + 1 <= st.debug.break_level;
        if stepping {
            let what = if is_func {
                "End of function"
            } else {
                "End of sourced file"
            };
            crate::debug::do_debug(st, what);
        }
    }

    if let Some(snap) = debug_saved {
        st.restore_dbg_stuff(snap);
    }
    st.exc.msg_list = saved_msg_list;
    st.sticky_cmdmod = saved_sticky;
    if st.call_depth == 1 {
        // changes of one typed line undo together
        let levels = st.p_num(Opt::Undolevels);
        for buf in st.bufs.iter_mut() {
            buf.u_sync();
            buf.limit_undo(levels);
        }
    }
    st.call_depth -= 1;
    log::trace!("runner leave: depth {}", st.call_depth);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn state() -> (EditorState, MemHost) {
        let host = MemHost::new();
        let st = EditorState::new(Box::new(host.clone()), false);
        (st, host)
    }

    fn run(st: &mut EditorState, text: &str) {
        let mut source = StrSource::new(text);
        do_cmdline(st, None, &mut source, RunFlags::VERBOSE | RunFlags::REPEAT).unwrap();
    }

    #[test]
    fn bar_separated() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "echo 1 | echo 2").unwrap();
        assert_eq!(host.output(), vec!["1", "2"]);
    }

    #[test]
    fn silent_bang_covers_the_line() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "silent! echo 1 | echo 2").unwrap();
        assert!(host.output().is_empty());
        assert_eq!(st.msg_silent, 0);
        assert_eq!(st.emsg_silent, 0);
    }

    #[test]
    fn while_loop_replays_lines() {
        let (mut st, host) = state();
        run(
            &mut st,
            "let i = 0\nwhile i < 3\necho i\nlet i += 1\nendwhile\necho 'done'",
        );
        assert_eq!(host.output(), vec!["0", "1", "2", "done"]);
    }

    #[test]
    fn for_loop_on_one_line() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "for x in [1, 2] | echo x | endfor").unwrap();
        assert_eq!(host.output(), vec!["1", "2"]);
    }

    #[test]
    fn error_skips_rest_of_block() {
        let (mut st, host) = state();
        run(&mut st, "if 1\nnosuchcmd\necho 'not here'\nendif\necho 'after'");
        assert_eq!(host.errors(), vec!["E492: Not an editor command: nosuchcmd"]);
        assert_eq!(host.output(), vec!["after"]);
    }

    #[test]
    fn missing_endif_is_reported() {
        let (mut st, host) = state();
        let mut source = crate::line_source::ScriptSource::new("if 1\necho 1", false);
        st.sourcing.push(crate::state::SourceFrame {
            kind: SourceKind::Script,
            name: "x.vim".to_string(),
            lnum: 0,
            sid: 1,
            level: 0,
            finished: false,
        });
        do_cmdline(&mut st, None, &mut source, RunFlags::VERBOSE | RunFlags::REPEAT).unwrap();
        assert!(host.errors().iter().any(|m| m == e::MISSING_ENDIF));
    }

    #[test]
    fn execute_recursion_is_limited() {
        // the stack of a main thread rather than a test thread
        let handle = std::thread::Builder::new()
            .stack_size(8 << 20)
            .spawn(|| {
                let (mut st, host) = state();
                do_cmdline_cmd(&mut st, "let g:c = 'execute g:c' | execute g:c").unwrap();
                (st.call_depth, st.execute_depth, host.errors())
            })
            .unwrap();
        let (call_depth, execute_depth, errors) = handle.join().unwrap();
        assert_eq!((call_depth, execute_depth), (0, 0));
        assert!(errors.iter().any(|m| m == e::TOO_RECURSIVE), "{errors:?}");
    }

    #[test]
    fn recursion_is_limited() {
        let (mut st, host) = state();
        st.call_depth = MAX_CALL_DEPTH;
        let mut source = StrSource::default();
        assert!(do_cmdline(&mut st, Some("echo 1"), &mut source, RunFlags::empty()).is_err());
        assert_eq!(host.errors(), vec![e::TOO_RECURSIVE]);
    }
}
