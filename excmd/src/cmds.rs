//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The table of built-in Ex commands.

use bitflags::bitflags;

use crate::address::AddrType;
use crate::docmd::{CmdCtx, ExArgs};
use crate::error::Result;
use crate::state::EditorState;
use crate::{autocmd, cond, debug, except, ex, options, usercmd, userfunc};

bitflags! {
    /// How a command takes its range and arguments.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CmdFlags: u32 {
        const RANGE = 0x001;
        const BANG = 0x002;
        const EXTRA = 0x004;
        /// Expand file name macros and wildcards in the argument.
        const XFILE = 0x008;
        /// No spaces allowed in the argument.
        const NOSPC = 0x010;
        /// Default range is the whole buffer.
        const DFLALL = 0x020;
        const WHOLEFOLD = 0x040;
        const NEEDARG = 0x080;
        /// A `|` ends the command.
        const TRLBAR = 0x100;
        const REGSTR = 0x200;
        const COUNT = 0x400;
        /// No trailing comment allowed.
        const NOTRLCOM = 0x800;
        const ZEROR = 0x1000;
        const CTRLV = 0x2000;
        /// Allow a `+command` argument.
        const CMDARG = 0x4000;
        const BUFNAME = 0x8000;
        const BUFUNL = 0x10000;
        /// Allow `++opt=val` arguments.
        const ARGOPT = 0x20000;
        const SBOXOK = 0x40000;
        const CMDWIN = 0x80000;
        /// Not allowed in a buffer without 'modifiable'.
        const MODIFY = 0x100000;
        /// Allow `l`, `p` and `#` flags.
        const FLAGS = 0x200000;
        const RESTRICT = 0x400000;
        const LOCK_OK = 0x1000000;
        const NONWHITE_OK = 0x2000000;
        /// The argument is an expression.
        const EXPR_ARG = 0x8000000;

        const FILES = Self::XFILE.bits() | Self::EXTRA.bits();
        const FILE1 = Self::FILES.bits() | Self::NOSPC.bits();
        const WORD1 = Self::EXTRA.bits() | Self::NOSPC.bits();
    }
}

pub type ExFunc = fn(&mut EditorState, &mut ExArgs, &mut CmdCtx) -> Result<()>;

pub struct CmdInfo {
    pub cmd: Cmd,
    pub name: &'static str,
    /// Shortest accepted abbreviation.
    pub min: usize,
    pub func: ExFunc,
    pub argt: CmdFlags,
    pub addr_type: AddrType,
}

macro_rules! cf {
    ($($f:ident)|+) => {
        CmdFlags::from_bits_retain(0 $(| CmdFlags::$f.bits())+)
    };
}

macro_rules! ex_cmds {
    (
        $(
            $variant:ident: $name:literal, $min:literal, $func:path,
                [$($flag:ident)|+], $addr:ident;
        )*
    ) => {
        /// Built-in commands, plus `User` for user-defined ones and `None`
        /// before a command is found.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum Cmd {
            $($variant,)*
            User,
            #[default]
            None,
        }

        /// Ordered as the lookup must try them: the first entry matching
        /// a typed prefix wins.
        pub static CMDS: &[CmdInfo] = &[
            $(
                CmdInfo {
                    cmd: Cmd::$variant,
                    name: $name,
                    min: $min,
                    func: $func,
                    argt: cf!($($flag)|+),
                    addr_type: AddrType::$addr,
                }
            ),*
        ];
    };
}

ex_cmds! {
    Append: "append", 1, ex::edit::ex_append,
        [BANG | RANGE | ZEROR | TRLBAR | CMDWIN | LOCK_OK | MODIFY], Lines;
    Args: "args", 2, ex::window::ex_args,
        [BANG | FILES | CMDARG | ARGOPT | TRLBAR], None;
    Argument: "argument", 4, ex::window::ex_argument,
        [BANG | RANGE | COUNT | EXTRA | CMDARG | ARGOPT | TRLBAR], Arguments;
    Autocmd: "autocmd", 2, autocmd::ex_autocmd,
        [BANG | EXTRA | NOTRLCOM | CTRLV | CMDWIN | LOCK_OK], None;
    Augroup: "augroup", 3, autocmd::ex_augroup,
        [BANG | WORD1 | TRLBAR | CMDWIN | LOCK_OK], None;
    Buffer: "buffer", 1, ex::window::ex_buffer,
        [BANG | RANGE | BUFNAME | BUFUNL | COUNT | EXTRA | CMDARG | TRLBAR], Buffers;
    Bdelete: "bdelete", 2, ex::window::ex_bunload,
        [BANG | RANGE | BUFNAME | COUNT | EXTRA | TRLBAR], Buffers;
    Bfirst: "bfirst", 2, ex::window::ex_brewind,
        [BANG | RANGE | CMDARG | TRLBAR], Other;
    Blast: "blast", 2, ex::window::ex_blast,
        [BANG | RANGE | CMDARG | TRLBAR], Other;
    Bnext: "bnext", 2, ex::window::ex_bnext,
        [BANG | RANGE | ZEROR | COUNT | CMDARG | TRLBAR], Other;
    Bprevious: "bprevious", 2, ex::window::ex_bnext,
        [BANG | RANGE | ZEROR | COUNT | CMDARG | TRLBAR], Other;
    Break: "break", 4, cond::ex_break,
        [TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    Breakadd: "breakadd", 6, debug::ex_breakadd,
        [EXTRA | TRLBAR | CMDWIN | LOCK_OK], None;
    Breakdel: "breakdel", 6, debug::ex_breakdel,
        [EXTRA | TRLBAR | CMDWIN | LOCK_OK], None;
    Breaklist: "breaklist", 6, debug::ex_breaklist,
        [EXTRA | TRLBAR | CMDWIN | LOCK_OK], None;
    Buffers: "buffers", 7, ex::window::ex_buflist,
        [BANG | EXTRA | TRLBAR | CMDWIN | LOCK_OK], None;
    Bwipeout: "bwipeout", 2, ex::window::ex_bunload,
        [BANG | RANGE | BUFNAME | BUFUNL | COUNT | EXTRA | TRLBAR], Buffers;
    Change: "change", 1, ex::edit::ex_change,
        [BANG | WHOLEFOLD | RANGE | COUNT | TRLBAR | CMDWIN | LOCK_OK | MODIFY], Lines;
    Call: "call", 3, userfunc::ex_call,
        [RANGE | NEEDARG | EXTRA | NOTRLCOM | SBOXOK | CMDWIN | LOCK_OK], Lines;
    Catch: "catch", 3, except::ex_catch,
        [EXTRA | SBOXOK | CMDWIN | LOCK_OK], None;
    Cc: "cc", 2, ex::window::ex_cc,
        [RANGE | COUNT | TRLBAR | BANG], Quickfix;
    Cdo: "cdo", 3, ex::window::ex_cdo,
        [BANG | NEEDARG | EXTRA | NOTRLCOM | RANGE | DFLALL], QuickfixValid;
    Cfirst: "cfirst", 4, ex::window::ex_cc,
        [RANGE | COUNT | TRLBAR | BANG], Unsigned;
    Clast: "clast", 3, ex::window::ex_cc,
        [RANGE | COUNT | TRLBAR | BANG], Unsigned;
    Close: "close", 3, ex::window::ex_close,
        [BANG | RANGE | COUNT | TRLBAR | CMDWIN | LOCK_OK], Windows;
    Cnext: "cnext", 2, ex::window::ex_cnext,
        [RANGE | COUNT | TRLBAR | BANG], Other;
    Copy: "copy", 2, ex::edit::ex_copymove,
        [RANGE | WHOLEFOLD | EXTRA | TRLBAR | CMDWIN | LOCK_OK | MODIFY], Lines;
    Command: "command", 3, usercmd::ex_command,
        [EXTRA | BANG | NOTRLCOM | CTRLV | CMDWIN | LOCK_OK], None;
    Comclear: "comclear", 4, usercmd::ex_comclear,
        [TRLBAR | CMDWIN | LOCK_OK], None;
    Continue: "continue", 3, cond::ex_continue,
        [TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    Cprevious: "cprevious", 2, ex::window::ex_cnext,
        [RANGE | COUNT | TRLBAR | BANG], Other;
    Cquit: "cquit", 2, ex::window::ex_cquit,
        [RANGE | COUNT | ZEROR | TRLBAR | BANG], Unsigned;
    Debug: "debug", 3, debug::ex_debug,
        [NEEDARG | EXTRA | TRLBAR | NOTRLCOM | CTRLV | CMDWIN | LOCK_OK], None;
    Delete: "delete", 1, ex::edit::ex_operators,
        [RANGE | WHOLEFOLD | REGSTR | COUNT | TRLBAR | CMDWIN | LOCK_OK | MODIFY], Lines;
    Delcommand: "delcommand", 4, usercmd::ex_delcommand,
        [BANG | NEEDARG | WORD1 | TRLBAR | CMDWIN | LOCK_OK], None;
    Delfunction: "delfunction", 4, userfunc::ex_delfunction,
        [BANG | NEEDARG | WORD1 | CMDWIN | LOCK_OK], None;
    Doautocmd: "doautocmd", 2, autocmd::ex_doautocmd,
        [EXTRA | TRLBAR | CMDWIN | LOCK_OK], None;
    Edit: "edit", 1, ex::files::ex_edit,
        [BANG | FILE1 | CMDARG | ARGOPT | TRLBAR], None;
    Echo: "echo", 2, ex::eval_cmds::ex_echo,
        [EXTRA | NOTRLCOM | EXPR_ARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Echoerr: "echoerr", 5, ex::eval_cmds::ex_execute,
        [EXTRA | NOTRLCOM | EXPR_ARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Echomsg: "echomsg", 5, ex::eval_cmds::ex_execute,
        [EXTRA | NOTRLCOM | EXPR_ARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Echon: "echon", 5, ex::eval_cmds::ex_echo,
        [EXTRA | NOTRLCOM | EXPR_ARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Else: "else", 2, cond::ex_else,
        [TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    Elseif: "elseif", 5, cond::ex_else,
        [EXTRA | NOTRLCOM | EXPR_ARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Endif: "endif", 2, cond::ex_endif,
        [TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    Endfunction: "endfunction", 4, userfunc::ex_endfunction,
        [TRLBAR | CMDWIN | LOCK_OK], None;
    Endfor: "endfor", 5, cond::ex_endwhile,
        [TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    Endtry: "endtry", 4, except::ex_endtry,
        [TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    Endwhile: "endwhile", 4, cond::ex_endwhile,
        [TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    Enew: "enew", 3, ex::files::ex_edit,
        [BANG | TRLBAR], None;
    Eval: "eval", 2, ex::eval_cmds::ex_eval,
        [EXTRA | NOTRLCOM | EXPR_ARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Execute: "execute", 3, ex::eval_cmds::ex_execute,
        [EXTRA | NOTRLCOM | EXPR_ARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Exit: "exit", 3, ex::files::ex_exit,
        [RANGE | WHOLEFOLD | BANG | FILE1 | ARGOPT | DFLALL | TRLBAR | CMDWIN | LOCK_OK], Lines;
    File: "file", 1, ex::files::ex_file,
        [RANGE | ZEROR | BANG | FILE1 | TRLBAR], Other;
    Finally: "finally", 4, except::ex_finally,
        [TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    Finish: "finish", 4, ex::source::ex_finish,
        [TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    First: "first", 3, ex::window::ex_rewind,
        [EXTRA | BANG | CMDARG | ARGOPT | TRLBAR], None;
    For: "for", 3, cond::ex_while,
        [EXTRA | NOTRLCOM | SBOXOK | CMDWIN | LOCK_OK], None;
    Function: "function", 2, userfunc::ex_function,
        [EXTRA | BANG | SBOXOK | CMDWIN | LOCK_OK], None;
    Global: "global", 1, ex::edit::ex_global,
        [RANGE | WHOLEFOLD | BANG | EXTRA | DFLALL | SBOXOK | CMDWIN | LOCK_OK | NONWHITE_OK],
        Lines;
    Insert: "insert", 1, ex::edit::ex_append,
        [BANG | RANGE | TRLBAR | CMDWIN | LOCK_OK | MODIFY], Lines;
    If: "if", 2, cond::ex_if,
        [EXTRA | NOTRLCOM | EXPR_ARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Join: "join", 1, ex::edit::ex_join,
        [BANG | RANGE | WHOLEFOLD | COUNT | FLAGS | TRLBAR | CMDWIN | LOCK_OK | MODIFY], Lines;
    K: "k", 1, ex::edit::ex_mark,
        [RANGE | WORD1 | TRLBAR | SBOXOK | CMDWIN | LOCK_OK], Lines;
    List: "list", 1, ex::edit::ex_print,
        [RANGE | WHOLEFOLD | COUNT | FLAGS | TRLBAR | CMDWIN | LOCK_OK], Lines;
    Last: "last", 2, ex::window::ex_last,
        [EXTRA | BANG | CMDARG | ARGOPT | TRLBAR], None;
    Let: "let", 3, ex::eval_cmds::ex_let,
        [EXTRA | NOTRLCOM | SBOXOK | CMDWIN | LOCK_OK], None;
    Ls: "ls", 2, ex::window::ex_buflist,
        [BANG | EXTRA | TRLBAR | CMDWIN | LOCK_OK], None;
    Move: "move", 1, ex::edit::ex_copymove,
        [RANGE | WHOLEFOLD | EXTRA | TRLBAR | CMDWIN | LOCK_OK | MODIFY], Lines;
    Mark: "mark", 2, ex::edit::ex_mark,
        [RANGE | WORD1 | TRLBAR | SBOXOK | CMDWIN | LOCK_OK], Lines;
    Messages: "messages", 3, ex::eval_cmds::ex_messages,
        [EXTRA | TRLBAR | RANGE | CMDWIN | LOCK_OK], Other;
    Next: "next", 1, ex::window::ex_next,
        [RANGE | BANG | FILES | CMDARG | ARGOPT | TRLBAR], Other;
    New: "new", 3, ex::window::ex_splitview,
        [BANG | FILE1 | RANGE | CMDARG | ARGOPT | TRLBAR], Other;
    Number: "number", 2, ex::edit::ex_print,
        [RANGE | WHOLEFOLD | COUNT | FLAGS | TRLBAR | CMDWIN | LOCK_OK], Lines;
    Only: "only", 2, ex::window::ex_only,
        [BANG | RANGE | COUNT | TRLBAR], Windows;
    Print: "print", 1, ex::edit::ex_print,
        [RANGE | WHOLEFOLD | COUNT | FLAGS | TRLBAR | CMDWIN | LOCK_OK | SBOXOK], Lines;
    Previous: "previous", 4, ex::window::ex_previous,
        [EXTRA | RANGE | COUNT | BANG | CMDARG | ARGOPT | TRLBAR], Other;
    Put: "put", 2, ex::edit::ex_put,
        [RANGE | WHOLEFOLD | BANG | REGSTR | TRLBAR | ZEROR | CMDWIN | LOCK_OK | MODIFY], Lines;
    Quit: "quit", 1, ex::window::ex_quit,
        [BANG | RANGE | COUNT | TRLBAR | CMDWIN | LOCK_OK], Windows;
    Qall: "qall", 2, ex::window::ex_quit_all,
        [BANG | TRLBAR | CMDWIN | LOCK_OK], None;
    Read: "read", 1, ex::files::ex_read,
        [BANG | RANGE | WHOLEFOLD | FILE1 | ARGOPT | TRLBAR | ZEROR | CMDWIN | LOCK_OK | MODIFY],
        Lines;
    Redo: "redo", 3, ex::edit::ex_redo,
        [TRLBAR | CMDWIN | LOCK_OK], None;
    Return: "return", 4, userfunc::ex_return,
        [EXTRA | NOTRLCOM | EXPR_ARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Rewind: "rewind", 3, ex::window::ex_rewind,
        [EXTRA | BANG | CMDARG | ARGOPT | TRLBAR], None;
    Substitute: "substitute", 1, ex::edit::ex_substitute,
        [RANGE | WHOLEFOLD | EXTRA | CMDWIN | LOCK_OK | NONWHITE_OK], Lines;
    Scriptnames: "scriptnames", 3, ex::source::ex_scriptnames,
        [BANG | FILES | TRLBAR | CMDWIN | LOCK_OK | RANGE | COUNT], Other;
    Set: "set", 2, options::set::ex_set,
        [BANG | TRLBAR | EXTRA | CMDWIN | LOCK_OK | SBOXOK], None;
    Setglobal: "setglobal", 4, options::set::ex_set,
        [BANG | TRLBAR | EXTRA | CMDWIN | LOCK_OK | SBOXOK], None;
    Setlocal: "setlocal", 4, options::set::ex_set,
        [BANG | TRLBAR | EXTRA | CMDWIN | LOCK_OK | SBOXOK], None;
    Source: "source", 2, ex::source::ex_source,
        [FILE1 | TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    Split: "split", 2, ex::window::ex_splitview,
        [BANG | FILE1 | RANGE | CMDARG | ARGOPT | TRLBAR], Other;
    T: "t", 1, ex::edit::ex_copymove,
        [RANGE | WHOLEFOLD | EXTRA | TRLBAR | CMDWIN | LOCK_OK | MODIFY], Lines;
    Tabclose: "tabclose", 4, ex::window::ex_tabclose,
        [BANG | RANGE | ZEROR | EXTRA | NOSPC | TRLBAR | CMDWIN | LOCK_OK], Tabs;
    Tabnext: "tabnext", 4, ex::window::ex_tabnext,
        [RANGE | ZEROR | EXTRA | NOSPC | TRLBAR], TabsRelative;
    Tabnew: "tabnew", 6, ex::window::ex_tabnew,
        [BANG | FILE1 | RANGE | ZEROR | CMDARG | ARGOPT | TRLBAR], Tabs;
    Tabprevious: "tabprevious", 4, ex::window::ex_tabnext,
        [RANGE | ZEROR | EXTRA | NOSPC | TRLBAR], TabsRelative;
    Throw: "throw", 2, except::ex_throw,
        [EXTRA | NEEDARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Try: "try", 3, except::ex_try,
        [TRLBAR | SBOXOK | CMDWIN | LOCK_OK], None;
    Undo: "undo", 1, ex::edit::ex_undo,
        [RANGE | COUNT | ZEROR | TRLBAR | CMDWIN | LOCK_OK], Other;
    Unlet: "unlet", 3, ex::eval_cmds::ex_unlet,
        [BANG | EXTRA | NEEDARG | SBOXOK | CMDWIN | LOCK_OK], None;
    Update: "update", 2, ex::files::ex_write,
        [RANGE | WHOLEFOLD | BANG | FILE1 | ARGOPT | DFLALL | TRLBAR], Lines;
    Vglobal: "vglobal", 1, ex::edit::ex_global,
        [RANGE | WHOLEFOLD | EXTRA | DFLALL | CMDWIN | LOCK_OK | NONWHITE_OK], Lines;
    Vsplit: "vsplit", 2, ex::window::ex_splitview,
        [BANG | FILE1 | RANGE | CMDARG | ARGOPT | TRLBAR], Other;
    Write: "write", 1, ex::files::ex_write,
        [RANGE | WHOLEFOLD | BANG | FILE1 | ARGOPT | DFLALL | TRLBAR | CMDWIN | LOCK_OK], Lines;
    Wall: "wall", 2, ex::files::ex_wall,
        [BANG | TRLBAR | CMDWIN | LOCK_OK], None;
    While: "while", 2, cond::ex_while,
        [EXTRA | NOTRLCOM | SBOXOK | CMDWIN | LOCK_OK], None;
    Wincmd: "wincmd", 4, ex::window::ex_wincmd,
        [NEEDARG | WORD1 | RANGE | CMDWIN | LOCK_OK], Other;
    Wq: "wq", 2, ex::files::ex_exit,
        [RANGE | WHOLEFOLD | BANG | FILE1 | ARGOPT | DFLALL | TRLBAR], Lines;
    Xit: "xit", 1, ex::files::ex_exit,
        [RANGE | WHOLEFOLD | BANG | FILE1 | ARGOPT | DFLALL | TRLBAR | CMDWIN | LOCK_OK], Lines;
    Yank: "yank", 1, ex::edit::ex_operators,
        [RANGE | WHOLEFOLD | REGSTR | COUNT | TRLBAR | CMDWIN | LOCK_OK], Lines;
    Bang: "!", 1, ex::files::ex_bang,
        [RANGE | WHOLEFOLD | BANG | FILES | CMDWIN | LOCK_OK], Lines;
    Hash: "#", 1, ex::edit::ex_print,
        [RANGE | WHOLEFOLD | COUNT | FLAGS | TRLBAR | CMDWIN | LOCK_OK], Lines;
    And: "&", 1, ex::edit::ex_substitute,
        [RANGE | WHOLEFOLD | EXTRA | CMDWIN | LOCK_OK | MODIFY], Lines;
    Lshift: "<", 1, ex::edit::ex_operators,
        [RANGE | WHOLEFOLD | COUNT | FLAGS | TRLBAR | CMDWIN | LOCK_OK | MODIFY], Lines;
    Equal: "=", 1, ex::edit::ex_equal,
        [RANGE | TRLBAR | DFLALL | FLAGS | CMDWIN | LOCK_OK], Lines;
    Rshift: ">", 1, ex::edit::ex_operators,
        [RANGE | WHOLEFOLD | COUNT | FLAGS | TRLBAR | CMDWIN | LOCK_OK | MODIFY], Lines;
    Tilde: "~", 1, ex::edit::ex_substitute,
        [RANGE | WHOLEFOLD | EXTRA | CMDWIN | LOCK_OK | MODIFY], Lines;
}

impl Cmd {
    pub fn info(self) -> Option<&'static CmdInfo> {
        CMDS.get(self as usize)
    }

    /// Full name, empty for user commands.
    pub fn name(self) -> &'static str {
        self.info().map(|i| i.name).unwrap_or("")
    }

    pub fn is_builtin(self) -> bool {
        !matches!(self, Cmd::User | Cmd::None)
    }

    /// Commands that keep running while the surrounding block is skipped:
    /// they track the nesting, or find the `|` after their argument.
    pub fn runs_when_skipped(self) -> bool {
        matches!(
            self,
            Cmd::While
                | Cmd::Endwhile
                | Cmd::For
                | Cmd::Endfor
                | Cmd::If
                | Cmd::Elseif
                | Cmd::Else
                | Cmd::Endif
                | Cmd::Try
                | Cmd::Catch
                | Cmd::Finally
                | Cmd::Endtry
                | Cmd::Function
                | Cmd::Call
                | Cmd::Delfunction
                | Cmd::Echo
                | Cmd::Echoerr
                | Cmd::Echomsg
                | Cmd::Echon
                | Cmd::Eval
                | Cmd::Execute
                | Cmd::Let
                | Cmd::Return
                | Cmd::Substitute
                | Cmd::Throw
                | Cmd::Tilde
                | Cmd::Unlet
                | Cmd::Wincmd
        )
    }
}

/// `:k` and, outside Vim9 script, `:s` directly followed by its flags.
fn one_letter_cmd(name: &[u8]) -> Option<Cmd> {
    let at = |i: usize| name.get(i).copied().unwrap_or(0);
    if at(0) == b'k' {
        return Some(Cmd::K);
    }
    if at(0) == b's'
        && ((at(1) == b'c'
            && (at(2) == 0
                || (at(2) != b's' && at(2) != b'r' && (at(3) == 0 || (at(3) != b'i' && at(4) != b'p')))))
            || at(1) == b'g'
            || (at(1) == b'i' && at(2) != b'm' && at(2) != b'l' && at(2) != b'g')
            || at(1) == b'I'
            || (at(1) == b'r' && at(2) != b'e'))
    {
        return Some(Cmd::Substitute);
    }
    None
}

/// Name of the command at `at` in `line`: returns the command, the end
/// of its name and any `l`/`p` flag glued to `:delete`. `Cmd::None`
/// with the end of an alphanumeric run when the name is not built in;
/// the caller tries user commands from there.
pub fn find_command(line: &str, at: usize, vim9: bool) -> (Cmd, usize, Option<char>) {
    let b = line.as_bytes();
    let start = at;
    if !vim9 {
        if let Some(cmd) = one_letter_cmd(&b[start..]) {
            return (cmd, start + 1, None);
        }
    }

    let mut p = start;
    while b.get(p).is_some_and(u8::is_ascii_alphabetic) {
        p += 1;
    }
    if p == start && b.get(p).is_some_and(|c| b"@*!=><&~#".contains(c)) {
        p += 1;
    }
    let mut len = p - start;
    if len == 0 {
        return (Cmd::None, start, None);
    }

    // ":dl", ":dell" and so on are ":delete" with the 'l' flag
    let mut flag = None;
    if !vim9 && b[start] == b'd' && matches!(b[p - 1], b'l' | b'p') {
        let typed = &b[start..p];
        let same = typed
            .iter()
            .zip(b"delete".iter())
            .take_while(|(x, y)| x == y)
            .count();
        if same == len - 1 {
            len -= 1;
            flag = Some(b[p - 1] as char);
        }
    }

    let typed = &line[start..start + len];
    let found = CMDS
        .iter()
        .find(|info| info.name.starts_with(typed) && len >= info.min);
    match found {
        Some(info) => (info.cmd, p, flag),
        None => {
            let mut q = p;
            while b.get(q).is_some_and(u8::is_ascii_alphanumeric) {
                q += 1;
            }
            (Cmd::None, q, None)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn find(s: &str) -> Cmd {
        find_command(s, 0, false).0
    }

    #[test]
    fn table_matches_enum() {
        for (i, info) in CMDS.iter().enumerate() {
            assert_eq!(info.cmd as usize, i, "{}", info.name);
            assert!(info.min >= 1 && info.min <= info.name.len(), "{}", info.name);
        }
    }

    #[test]
    fn abbreviations() {
        assert_eq!(find("s/a/b/"), Cmd::Substitute);
        assert_eq!(find("se"), Cmd::Set);
        assert_eq!(find("setl"), Cmd::Setlocal);
        assert_eq!(find("setg"), Cmd::Setglobal);
        assert_eq!(find("sp"), Cmd::Split);
        assert_eq!(find("so"), Cmd::Source);
        assert_eq!(find("co"), Cmd::Copy);
        assert_eq!(find("con"), Cmd::Continue);
        assert_eq!(find("com"), Cmd::Command);
        assert_eq!(find("ec"), Cmd::Echo);
        assert_eq!(find("echom"), Cmd::Echomsg);
        assert_eq!(find("el"), Cmd::Else);
        assert_eq!(find("elsei"), Cmd::Elseif);
        assert_eq!(find("en"), Cmd::Endif);
        assert_eq!(find("endf"), Cmd::Endfunction);
        assert_eq!(find("endfo"), Cmd::Endfor);
        assert_eq!(find("fina"), Cmd::Finally);
        assert_eq!(find("fini"), Cmd::Finish);
        assert_eq!(find("fu"), Cmd::Function);
        assert_eq!(find("pu"), Cmd::Put);
        assert_eq!(find("p"), Cmd::Print);
        assert_eq!(find("retu"), Cmd::Return);
        assert_eq!(find("th"), Cmd::Throw);
        assert_eq!(find("unl"), Cmd::Unlet);
        assert_eq!(find("up"), Cmd::Update);
        assert_eq!(find("wh"), Cmd::While);
        assert_eq!(find("tabn"), Cmd::Tabnext);
        assert_eq!(find("tabnew"), Cmd::Tabnew);
        assert_eq!(find("g/x/d"), Cmd::Global);
        assert_eq!(find("v/x/d"), Cmd::Vglobal);
    }

    #[test]
    fn too_short_or_unknown() {
        assert_eq!(find("le"), Cmd::None);
        assert_eq!(find("ret"), Cmd::None);
        assert_eq!(find("Foo"), Cmd::None);
        assert_eq!(find_command("Foo2 x", 0, false).1, 4);
    }

    #[test]
    fn one_letter_forms() {
        assert_eq!(find("ka"), Cmd::K);
        assert_eq!(find("sg"), Cmd::Substitute);
        assert_eq!(find("sI"), Cmd::Substitute);
        assert_eq!(find("scr"), Cmd::Scriptnames);
        assert_eq!(find("sil"), Cmd::None);
    }

    #[test]
    fn punctuation_commands() {
        assert_eq!(find_command("!ls", 0, false), (Cmd::Bang, 1, None));
        assert_eq!(find(">>"), Cmd::Rshift);
        assert_eq!(find("&&"), Cmd::And);
        assert_eq!(find("="), Cmd::Equal);
        assert_eq!(find("~"), Cmd::Tilde);
    }

    #[test]
    fn delete_with_flag() {
        assert_eq!(find_command("dl", 0, false), (Cmd::Delete, 2, Some('l')));
        assert_eq!(find_command("deletep", 0, false), (Cmd::Delete, 7, Some('p')));
        assert_eq!(find_command("delete", 0, false), (Cmd::Delete, 6, None));
    }
}
