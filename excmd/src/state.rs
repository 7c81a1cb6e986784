//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The editor-wide state threaded through every command.

use crate::autocmd::Autocmds;
use crate::buffer::{Buffer, BufferList, Pos};
use crate::debug::Debugger;
use crate::eval::Vars;
use crate::except::ExceptionCtx;
use crate::host::Host;
use crate::layout::{Layout, Window};
use crate::line_source::SourceKind;
use crate::messages::Messages;
use crate::modifiers::CmdMod;
use crate::options::{Opt, OptCtx, OptVal, OptionStore};
use crate::popup::PopupState;
use crate::registers::Registers;
use crate::search::SearchState;
use crate::usercmd::UserCmds;
use crate::userfunc::{FuncCall, FuncTable};

/// Something being executed that has a name and a current line: a sourced
/// script or a user function.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub kind: SourceKind,
    pub name: String,
    pub lnum: i64,
    pub sid: usize,
    /// `ex_nesting_level` of the command that started it.
    pub level: i32,
    /// `:finish` was executed in this script.
    pub finished: bool,
}

pub struct EditorState {
    pub options: OptionStore,
    pub bufs: BufferList,
    pub layout: Layout,
    pub regs: Registers,
    pub vars: Vars,
    pub exc: ExceptionCtx,
    pub msgs: Messages,
    pub search: SearchState,
    pub funcs: FuncTable,
    pub user_cmds: UserCmds,
    pub autocmds: Autocmds,
    pub debug: Debugger,
    pub host: Box<dyn Host>,
    pub popup: Option<PopupState>,

    /// Active user function calls, innermost last.
    pub fcalls: Vec<FuncCall>,
    /// Scripts and functions being executed, innermost last.
    pub sourcing: Vec<SourceFrame>,
    /// Names of sourced scripts; the index is the script id. Id 0 is the
    /// command line.
    pub scripts: Vec<String>,

    /// Modifiers of the command being executed.
    pub cmdmod: CmdMod,
    /// `:silent` flags carried to the next command after a `|`.
    pub sticky_cmdmod: crate::modifiers::CmdModFlags,
    pub msg_silent: i32,
    pub emsg_silent: i32,
    pub sandbox: i32,
    /// Non-zero while executing a modeline.
    pub secure: i32,
    /// Nesting of `:execute`; options set meanwhile are not trusted.
    pub execute_depth: i32,
    /// Nesting of the command-line runner.
    pub call_depth: i32,
    pub ex_nesting_level: i32,
    /// Non-zero while `:global` runs its command; incremented on errors.
    pub global_busy: i32,
    /// A nested runner ended in a way the enclosing command must check.
    pub check_cstack: bool,
    /// The current command was typed rather than sourced.
    pub key_typed: bool,
    pub ex_exitval: i32,
    /// Last `:!` command, for `!!`.
    pub last_shell_cmd: Option<String>,
    /// The CmdUndefined event is being handled.
    pub cmd_undefined_busy: bool,
    /// Set by `:quit` and friends: leave with this exit code.
    pub exiting: Option<i32>,
}

impl EditorState {
    pub fn new(host: Box<dyn Host>, compatible: bool) -> EditorState {
        let mut options = OptionStore::new(compatible);
        let mut bufs = BufferList::new();
        let fnum = bufs.add(None);
        let layout = Layout::new(fnum);
        options.init_buf(fnum, compatible);
        options.init_win(layout.win().id, None, compatible);

        let mut st = EditorState {
            options,
            bufs,
            layout,
            regs: Registers::new(),
            vars: Vars::new(),
            exc: ExceptionCtx::default(),
            msgs: Messages::default(),
            search: SearchState::default(),
            funcs: FuncTable::default(),
            user_cmds: UserCmds::default(),
            autocmds: Autocmds::default(),
            debug: Debugger::default(),
            host,
            popup: None,
            fcalls: Vec::new(),
            sourcing: Vec::new(),
            scripts: vec![String::new()],
            cmdmod: CmdMod::default(),
            sticky_cmdmod: crate::modifiers::CmdModFlags::empty(),
            msg_silent: 0,
            emsg_silent: 0,
            sandbox: 0,
            secure: 0,
            execute_depth: 0,
            call_depth: 0,
            ex_nesting_level: 0,
            global_busy: 0,
            check_cstack: false,
            key_typed: false,
            ex_exitval: 0,
            last_shell_cmd: None,
            cmd_undefined_busy: false,
            exiting: None,
        };
        st.vars.init_vim_vars();
        st
    }

    pub fn opt_ctx(&self) -> OptCtx {
        OptCtx {
            buf: self.layout.win().buf,
            win: self.layout.win().id,
        }
    }

    pub fn p_num(&self, opt: Opt) -> i64 {
        self.options.num(opt, self.opt_ctx())
    }

    pub fn p_flag(&self, opt: Opt) -> bool {
        self.options.flag(opt, self.opt_ctx())
    }

    pub fn p_str(&self, opt: Opt) -> String {
        self.options.string(opt, self.opt_ctx())
    }

    /// Whether `flag` is in 'cpoptions'.
    pub fn cpo_has(&self, flag: char) -> bool {
        self.p_str(Opt::Cpoptions).contains(flag)
    }

    pub fn curwin(&self) -> &Window {
        self.layout.win()
    }

    pub fn curwin_mut(&mut self) -> &mut Window {
        self.layout.win_mut()
    }

    pub fn curbuf_fnum(&self) -> usize {
        self.layout.win().buf
    }

    pub fn curbuf(&self) -> &Buffer {
        let fnum = self.curbuf_fnum();
        match self.bufs.get(fnum) {
            Some(b) => b,
            None => unreachable!("window shows missing buffer {fnum}"),
        }
    }

    pub fn curbuf_mut(&mut self) -> &mut Buffer {
        let fnum = self.curbuf_fnum();
        match self.bufs.get_mut(fnum) {
            Some(b) => b,
            None => unreachable!("window shows missing buffer {fnum}"),
        }
    }

    pub fn cursor(&self) -> Pos {
        self.layout.win().cursor
    }

    pub fn line_count(&self) -> i64 {
        self.curbuf().line_count()
    }

    /// Move the cursor to `lnum`, clamped to the buffer, first column.
    pub fn set_cursor_line(&mut self, lnum: i64) {
        let last = self.line_count();
        self.curwin_mut().cursor = Pos::new(lnum.clamp(1, last), 0);
    }

    /// Cursor on the first non-blank of `lnum`, as `:1` does.
    pub fn cursor_to_line_start(&mut self, lnum: i64) {
        self.set_cursor_line(lnum);
        let lnum = self.cursor().lnum;
        let text = self.curbuf().get(lnum);
        let col = text.len() - text.trim_start_matches([' ', '\t']).len();
        self.curwin_mut().cursor.col = col;
    }

    /// Start an undoable change of the current buffer.
    pub fn u_save(&mut self) -> crate::error::Result<()> {
        if !self.p_flag(Opt::Modifiable) {
            return Err(crate::error::runtime(crate::error::e::MODIFIABLE));
        }
        let cursor = self.cursor().lnum;
        self.curbuf_mut().u_save(cursor);
        Ok(())
    }

    /// Record that the current buffer changed.
    pub fn changed(&mut self) {
        let ctx = self.opt_ctx();
        self.options.set_local(Opt::Modified, ctx, Some(OptVal::Bool(true)));
    }

    pub fn buf_modified(&self, fnum: usize) -> bool {
        let ctx = OptCtx {
            buf: fnum,
            win: self.layout.win().id,
        };
        self.options.flag(Opt::Modified, ctx)
    }

    pub fn set_buf_modified(&mut self, fnum: usize, modified: bool) {
        let ctx = OptCtx {
            buf: fnum,
            win: self.layout.win().id,
        };
        self.options
            .set_local(Opt::Modified, ctx, Some(OptVal::Bool(modified)));
    }

    /// Keep every window's cursor inside its buffer after a change.
    pub fn check_cursors(&mut self) {
        let counts: Vec<(usize, i64)> = self
            .bufs
            .iter()
            .map(|b| (b.fnum, b.line_count()))
            .collect();
        for win in self.layout.all_windows_mut() {
            if let Some((_, count)) = counts.iter().find(|(f, _)| *f == win.buf) {
                win.cursor.lnum = win.cursor.lnum.clamp(1, *count);
            }
        }
    }

    /// Line of the script or function being executed, 0 when typed.
    pub fn sourcing_lnum(&self) -> i64 {
        self.sourcing.last().map(|f| f.lnum).unwrap_or(0)
    }

    pub fn set_sourcing_lnum(&mut self, lnum: i64) {
        if let Some(frame) = self.sourcing.last_mut() {
            frame.lnum = lnum;
        }
    }

    pub fn sourcing_name(&self) -> Option<&str> {
        self.sourcing.last().map(|f| f.name.as_str())
    }

    /// Script id of the code being executed.
    pub fn current_sid(&self) -> usize {
        self.sourcing.last().map(|f| f.sid).unwrap_or(0)
    }

    /// Name used for `<sfile>` and throw points: the script, or the
    /// chain of function names.
    pub fn estack_sfile(&self) -> String {
        let mut funcs = Vec::new();
        for frame in self.sourcing.iter().rev() {
            match frame.kind {
                SourceKind::Function => funcs.push(frame.name.clone()),
                _ => {
                    if funcs.is_empty() {
                        return frame.name.clone();
                    }
                    break;
                }
            }
        }
        if funcs.is_empty() {
            return String::new();
        }
        funcs.reverse();
        format!("function {}", funcs.join(".."))
    }

    pub fn in_function(&self) -> bool {
        !self.fcalls.is_empty()
            && matches!(self.sourcing.last().map(|f| f.kind), Some(SourceKind::Function))
    }

    /// Whether the text of an option set from an untrusted place may be
    /// evaluated.
    pub fn option_trusted(&self, opt: Opt) -> bool {
        !self.options.is_insecure(opt, self.opt_ctx())
    }
}
