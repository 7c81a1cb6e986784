//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The static option table.

use bitflags::bitflags;

use super::did_set::{self, DidSetFn};

bitflags! {
    /// Static attributes of an option.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OptFlags: u32 {
        /// Expand `$VAR` and `~` when set.
        const EXPAND = 1 << 0;
        /// Comma-separated list.
        const COMMA = 1 << 1;
        /// Comma list that does not allow an empty item.
        const ONECOMMA = (1 << 2) | (1 << 1);
        /// Items may not appear twice.
        const NODUP = 1 << 3;
        /// Each character is a flag.
        const FLAGLIST = 1 << 4;
        /// Not allowed from a modeline or the sandbox.
        const SECURE = 1 << 5;
        /// The Vi default is used for both modes.
        const VI_DEF = 1 << 6;
        /// Reset when 'compatible' is toggled.
        const VIM = 1 << 7;
        const NODEFAULT = 1 << 8;
        const ALLOCED = 1 << 9;
        const DEF_ALLOCED = 1 << 10;
        const RALL = 1 << 11;
        const RWIN = 1 << 12;
        const RSTAT = 1 << 13;
        const RCLR = 1 << 14;
        const RBUF = 1 << 15;
        /// Not written by `:mkvimrc`.
        const NO_MKRC = 1 << 16;
        /// Allowed from a modeline only with 'modelineexpr'.
        const MLE = 1 << 17;
        /// Never allowed from a modeline.
        const NO_ML = 1 << 18;
        /// `:setglobal` is not allowed.
        const NOGLOB = 1 << 19;
        /// Only file name characters allowed.
        const NFNAME = 1 << 20;
        /// Vi-compatibility option without a value.
        const HIDDEN = 1 << 21;
        /// Expression option that must not be evaluated when insecure.
        const EXPR = 1 << 22;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptKind {
    Bool,
    Number,
    String,
}

/// Where the value of an option lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptScope {
    Global,
    /// Local to a buffer; the global value seeds new buffers.
    Buf,
    /// Local to a window; the global value seeds new windows.
    Win,
    /// Global with an optional buffer-local override.
    BothBuf,
    /// Global with an optional window-local override.
    BothWin,
}

impl OptScope {
    pub fn is_both(self) -> bool {
        matches!(self, OptScope::BothBuf | OptScope::BothWin)
    }

    pub fn is_local(self) -> bool {
        !matches!(self, OptScope::Global)
    }

    pub fn is_buffer(self) -> bool {
        matches!(self, OptScope::Buf | OptScope::BothBuf)
    }
}

/// Default values are compile-time constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefVal {
    Bool(bool),
    Num(i64),
    Str(&'static str),
}

impl DefVal {
    pub fn kind(self) -> OptKind {
        match self {
            DefVal::Bool(_) => OptKind::Bool,
            DefVal::Num(_) => OptKind::Number,
            DefVal::Str(_) => OptKind::String,
        }
    }
}

pub struct OptionSpec {
    pub opt: Opt,
    pub name: &'static str,
    pub short: &'static str,
    pub scope: OptScope,
    pub flags: OptFlags,
    pub vi: DefVal,
    pub vim: DefVal,
    pub did_set: Option<DidSetFn>,
}

impl OptionSpec {
    pub fn kind(&self) -> OptKind {
        self.vi.kind()
    }

    pub fn default_for(&self, compatible: bool) -> DefVal {
        if compatible || self.flags.contains(OptFlags::VI_DEF) {
            self.vi
        } else {
            self.vim
        }
    }
}

macro_rules! fl {
    () => { OptFlags::empty() };
    ($($f:ident)|+) => {
        OptFlags::from_bits_retain(0 $(| OptFlags::$f.bits())+)
    };
}

macro_rules! option_table {
    (
        $(
            $variant:ident: $name:literal, $short:literal, $scope:ident, [$($flag:ident)|*],
                $vi:expr, $vim:expr, $cb:expr;
        )*
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Opt {
            $($variant),*
        }

        pub static OPTIONS: &[OptionSpec] = &[
            $(
                OptionSpec {
                    opt: Opt::$variant,
                    name: $name,
                    short: $short,
                    scope: OptScope::$scope,
                    flags: fl!($($flag)|*),
                    vi: $vi,
                    vim: $vim,
                    did_set: $cb,
                }
            ),*
        ];

        impl Opt {
            pub fn all() -> &'static [Opt] {
                &[$(Opt::$variant),*]
            }
        }
    };
}

use DefVal::{Bool as B, Num as N, Str as S};

const CPO_VIM: &str = "aABceFs";
const CPO_VI: &str = "aAbBcCdDeEfFgHiIjJkKlLmMnoOpPqrRsStuvwWxXyZ$!%*-+<>;";
pub const CPO_ALL: &str = "aAbBcCdDeEfFgHiIjJkKlLmMnoOpPqrRsStuvwWxXyZ$!%*-+<>#{|&/\\.;";
pub const SHM_POSIX: &str = "AS";
pub const SHM_ALL: &str = "rmfixlnwaWtToOsAIcCqFS";

option_table! {
    Autoindent: "autoindent", "ai", Buf, [VI_DEF], B(false), B(false), None;
    Autoprint: "autoprint", "ap", Global, [VI_DEF | HIDDEN], B(false), B(false), None;
    Autoread: "autoread", "ar", BothBuf, [VI_DEF], B(false), B(false), None;
    Autowrite: "autowrite", "aw", Global, [VI_DEF], B(false), B(false), None;
    Backspace: "backspace", "bs", Global, [VI_DEF | VIM | ONECOMMA | NODUP],
        S(""), S(""), Some(did_set::backspace);
    Backup: "backup", "bk", Global, [VI_DEF | VIM], B(false), B(false), None;
    Backupskip: "backupskip", "bsk", Global, [VI_DEF | ONECOMMA | NODUP],
        S(""), S(""), None;
    Balloonexpr: "balloonexpr", "bexpr", BothBuf, [VI_DEF | MLE | EXPR | ALLOCED],
        S(""), S(""), None;
    Beautify: "beautify", "bf", Global, [VI_DEF | HIDDEN], B(false), B(false), None;
    Binary: "binary", "bin", Buf, [VI_DEF | RSTAT], B(false), B(false), None;
    Cdpath: "cdpath", "cd", Global, [EXPAND | VI_DEF | SECURE | COMMA | NODUP],
        S(",,"), S(",,"), None;
    Cmdheight: "cmdheight", "ch", Global, [VI_DEF | RALL], N(1), N(1), Some(did_set::positive);
    Columns: "columns", "co", Global, [NODEFAULT | NO_MKRC | VI_DEF | RCLR],
        N(80), N(80), Some(did_set::positive);
    Compatible: "compatible", "cp", Global, [RALL], B(true), B(false),
        Some(did_set::compatible);
    Completeopt: "completeopt", "cot", Global, [VI_DEF | ONECOMMA | NODUP],
        S("menu,preview"), S("menu,preview"), None;
    Cpoptions: "cpoptions", "cpo", Global, [VIM | RALL | FLAGLIST],
        S(CPO_VI), S(CPO_VIM), Some(did_set::cpoptions);
    Cursorline: "cursorline", "cul", Win, [VI_DEF | RWIN], B(false), B(false), None;
    Directory: "directory", "dir", Global, [EXPAND | VI_DEF | ONECOMMA | NODUP | SECURE],
        S(".,~/tmp,/var/tmp,/tmp"), S(".,~/tmp,/var/tmp,/tmp"), None;
    Encoding: "encoding", "enc", Global, [VI_DEF | RCLR | NO_ML],
        S("utf-8"), S("utf-8"), Some(did_set::encoding);
    Endofline: "endofline", "eol", Buf, [NO_MKRC | VI_DEF | RSTAT], B(true), B(true), None;
    Errorbells: "errorbells", "eb", Global, [VI_DEF], B(false), B(false), None;
    Eventignore: "eventignore", "ei", Global, [VI_DEF | ONECOMMA | NODUP],
        S(""), S(""), Some(did_set::eventignore);
    Expandtab: "expandtab", "et", Buf, [VI_DEF | VIM], B(false), B(false), None;
    Exrc: "exrc", "ex", Global, [VI_DEF | SECURE], B(false), B(false), None;
    Fileencoding: "fileencoding", "fenc", Buf, [ALLOCED | VI_DEF | RSTAT | RBUF | NO_MKRC],
        S(""), S(""), None;
    Fileformat: "fileformat", "ff", Buf, [ALLOCED | VI_DEF | RSTAT | NO_MKRC],
        S("unix"), S("unix"), Some(did_set::fileformat);
    Fileformats: "fileformats", "ffs", Global, [VIM | ONECOMMA | NODUP],
        S("unix,dos"), S("unix,dos"), Some(did_set::fileformats);
    Filetype: "filetype", "ft", Buf, [ALLOCED | VI_DEF | NOGLOB | NFNAME],
        S(""), S(""), Some(did_set::filetype);
    Foldenable: "foldenable", "fen", Win, [VI_DEF | RWIN], B(true), B(true), None;
    Foldexpr: "foldexpr", "fde", Win, [ALLOCED | VIM | VI_DEF | RWIN | MLE | EXPR],
        S("0"), S("0"), None;
    Foldlevel: "foldlevel", "fdl", Win, [VI_DEF | RWIN], N(0), N(0), None;
    Formatoptions: "formatoptions", "fo", Buf, [ALLOCED | VIM | FLAGLIST],
        S("vt"), S("tcq"), None;
    Hidden: "hidden", "hid", Global, [VI_DEF], B(false), B(false), None;
    History: "history", "hi", Global, [VIM], N(0), N(50), Some(did_set::non_negative);
    Hlsearch: "hlsearch", "hls", Global, [VI_DEF | VIM | RALL], B(false), B(false), None;
    Ignorecase: "ignorecase", "ic", Global, [VI_DEF], B(false), B(false), None;
    Includeexpr: "includeexpr", "inex", Buf, [ALLOCED | VI_DEF | MLE | EXPR],
        S(""), S(""), None;
    Incsearch: "incsearch", "is", Global, [VI_DEF | VIM], B(false), B(false), None;
    Indentexpr: "indentexpr", "inde", Buf, [ALLOCED | VI_DEF | VIM | MLE | EXPR],
        S(""), S(""), None;
    Iskeyword: "iskeyword", "isk", Buf, [ALLOCED | VIM | COMMA | NODUP],
        S("@,48-57,_"), S("@,48-57,_,192-255"), None;
    Key: "key", "", Buf, [ALLOCED | VI_DEF | NO_MKRC], S(""), S(""), None;
    Keywordprg: "keywordprg", "kp", BothBuf, [EXPAND | VI_DEF | SECURE],
        S("man"), S("man"), None;
    Laststatus: "laststatus", "ls", Global, [VI_DEF | RALL], N(1), N(1),
        Some(did_set::non_negative);
    Lazyredraw: "lazyredraw", "lz", Global, [VI_DEF], B(false), B(false), None;
    Lines: "lines", "", Global, [NODEFAULT | NO_MKRC | VI_DEF | RCLR], N(24), N(24),
        Some(did_set::positive);
    List: "list", "", Win, [VI_DEF | RWIN], B(false), B(false), None;
    Listchars: "listchars", "lcs", BothWin, [VI_DEF | RALL | ONECOMMA | NODUP],
        S("eol:$"), S("eol:$"), None;
    Magic: "magic", "", Global, [VI_DEF], B(true), B(true), None;
    Makeprg: "makeprg", "mp", BothBuf, [EXPAND | VI_DEF | SECURE], S("make"), S("make"), None;
    Matchpairs: "matchpairs", "mps", Buf, [ALLOCED | VI_DEF | ONECOMMA | NODUP],
        S("(:),{:},[:]"), S("(:),{:},[:]"), None;
    Maxfuncdepth: "maxfuncdepth", "mfd", Global, [VI_DEF], N(100), N(100), None;
    Maxmempattern: "maxmempattern", "mmp", Global, [VI_DEF], N(1000), N(1000), None;
    Modeline: "modeline", "ml", Buf, [VIM], B(false), B(true), None;
    Modelineexpr: "modelineexpr", "mle", Global, [VI_DEF | SECURE], B(false), B(false), None;
    Modelines: "modelines", "mls", Global, [VI_DEF], N(5), N(5), Some(did_set::non_negative);
    Modifiable: "modifiable", "ma", Buf, [VI_DEF | NOGLOB], B(true), B(true), None;
    Modified: "modified", "mod", Buf, [NO_MKRC | VI_DEF | RSTAT], B(false), B(false), None;
    More: "more", "", Global, [VIM], B(false), B(true), None;
    Mouse: "mouse", "", Global, [VI_DEF | FLAGLIST], S(""), S(""), None;
    Novice: "novice", "", Global, [VI_DEF | HIDDEN], B(false), B(false), None;
    Number: "number", "nu", Win, [VI_DEF | RWIN], B(false), B(false), None;
    Numberwidth: "numberwidth", "nuw", Win, [RWIN | VIM], N(8), N(4),
        Some(did_set::numberwidth);
    Path: "path", "pa", BothBuf, [EXPAND | VI_DEF | COMMA | NODUP],
        S(".,/usr/include,,"), S(".,/usr/include,,"), None;
    Pumheight: "pumheight", "ph", Global, [VI_DEF], N(0), N(0), Some(did_set::non_negative);
    Pumwidth: "pumwidth", "pw", Global, [VI_DEF], N(15), N(15), Some(did_set::non_negative);
    Readonly: "readonly", "ro", Buf, [VI_DEF | RSTAT | NOGLOB], B(false), B(false), None;
    Redraw: "redraw", "", Global, [VI_DEF | HIDDEN], B(false), B(false), None;
    Relativenumber: "relativenumber", "rnu", Win, [VI_DEF | RWIN], B(false), B(false), None;
    Report: "report", "", Global, [VI_DEF], N(2), N(2), Some(did_set::non_negative);
    Ruler: "ruler", "ru", Global, [VI_DEF | VIM | RSTAT], B(false), B(false), None;
    Runtimepath: "runtimepath", "rtp", Global, [EXPAND | VI_DEF | ONECOMMA | NODUP | SECURE],
        S("~/.vim"), S("~/.vim"), None;
    Scroll: "scroll", "scr", Win, [NO_MKRC | VI_DEF], N(0), N(0), Some(did_set::non_negative);
    Scrolloff: "scrolloff", "so", BothWin, [VI_DEF | VIM | RALL], N(0), N(0), None;
    Secure: "secure", "", Global, [VI_DEF | SECURE], B(false), B(false), None;
    Shell: "shell", "sh", Global, [EXPAND | VI_DEF | SECURE], S("sh"), S("sh"), None;
    Shellcmdflag: "shellcmdflag", "shcf", Global, [VI_DEF | SECURE], S("-c"), S("-c"), None;
    Shiftwidth: "shiftwidth", "sw", Buf, [VI_DEF], N(8), N(8), Some(did_set::shiftwidth_tabstop);
    Shortmess: "shortmess", "shm", Global, [VIM | FLAGLIST], S("S"), S("filnxtToOS"),
        Some(did_set::shortmess);
    Showcmd: "showcmd", "sc", Global, [VIM], B(false), B(true), None;
    Showmatch: "showmatch", "sm", Global, [VI_DEF], B(false), B(false), None;
    Showmode: "showmode", "smd", Global, [VIM], B(false), B(true), None;
    Sidescrolloff: "sidescrolloff", "siso", BothWin, [VI_DEF | VIM | RBUF], N(0), N(0), None;
    Slowopen: "slowopen", "slow", Global, [VI_DEF | HIDDEN], B(false), B(false), None;
    Smartcase: "smartcase", "scs", Global, [VI_DEF | VIM], B(false), B(false), None;
    Smartindent: "smartindent", "si", Buf, [VI_DEF | VIM], B(false), B(false), None;
    Softtabstop: "softtabstop", "sts", Buf, [VI_DEF | VIM], N(0), N(0), None;
    Sourceany: "sourceany", "", Global, [VI_DEF | HIDDEN], B(false), B(false), None;
    Spell: "spell", "", Win, [VI_DEF | RWIN], B(false), B(false), None;
    Startofline: "startofline", "sol", Global, [VI_DEF | VIM], B(true), B(false), None;
    Statusline: "statusline", "stl", BothWin, [ALLOCED | RSTAT | MLE | EXPR], S(""), S(""), None;
    Syntax: "syntax", "syn", Buf, [ALLOCED | VI_DEF | NOGLOB | NFNAME], S(""), S(""),
        Some(did_set::filetype);
    Tabstop: "tabstop", "ts", Buf, [VI_DEF | RBUF], N(8), N(8), Some(did_set::shiftwidth_tabstop);
    Tags: "tags", "tag", BothBuf, [EXPAND | VI_DEF | ONECOMMA | NODUP],
        S("./tags,tags"), S("./tags,tags"), None;
    Terse: "terse", "", Global, [VI_DEF], B(false), B(false), None;
    Textwidth: "textwidth", "tw", Buf, [VI_DEF | VIM | RBUF], N(0), N(0),
        Some(did_set::non_negative);
    Timeoutlen: "timeoutlen", "tm", Global, [VI_DEF], N(1000), N(1000), None;
    Title: "title", "", Global, [VI_DEF], B(false), B(false), None;
    Undolevels: "undolevels", "ul", BothBuf, [VI_DEF], N(1000), N(1000), None;
    Updatetime: "updatetime", "ut", Global, [VI_DEF], N(4000), N(4000),
        Some(did_set::non_negative);
    Verbose: "verbose", "vbs", Global, [VI_DEF], N(0), N(0), None;
    Visualbell: "visualbell", "vb", Global, [VI_DEF], B(false), B(false), None;
    Whichwrap: "whichwrap", "ww", Global, [VIM | ONECOMMA | FLAGLIST], S(""), S("b,s"),
        Some(did_set::whichwrap);
    Wildchar: "wildchar", "wc", Global, [VIM], N(5), N(9), None;
    Wildmode: "wildmode", "wim", Global, [VI_DEF | ONECOMMA], S("full"), S("full"), None;
    Wrap: "wrap", "", Win, [VI_DEF | RWIN], B(true), B(true), None;
    Wrapmargin: "wrapmargin", "wm", Buf, [VI_DEF], N(0), N(0), None;
    Wrapscan: "wrapscan", "ws", Global, [VI_DEF], B(true), B(true), None;
    Write: "write", "", Global, [VI_DEF], B(true), B(true), None;
    Writeany: "writeany", "wa", Global, [VI_DEF], B(false), B(false), None;
}

impl Opt {
    pub fn spec(self) -> &'static OptionSpec {
        &OPTIONS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn kind(self) -> OptKind {
        self.spec().kind()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Key names accepted in `:set <Key>=...`, mapped to their terminal code.
pub static KEY_NAMES: &[(&str, &str)] = &[
    ("Up", "ku"),
    ("Down", "kd"),
    ("Left", "kl"),
    ("Right", "kr"),
    ("Home", "kh"),
    ("End", "@7"),
    ("Del", "kD"),
    ("Insert", "kI"),
    ("PageUp", "kP"),
    ("PageDown", "kN"),
    ("F1", "k1"),
    ("F2", "k2"),
    ("F3", "k3"),
    ("F4", "k4"),
    ("F5", "k5"),
    ("F6", "k6"),
    ("F7", "k7"),
    ("F8", "k8"),
    ("F9", "k9"),
    ("F10", "k;"),
];

/// Terminal codes present at startup; `:set termcap` lists these.
pub static DEFAULT_TERMCODES: &[(&str, &str)] = &[
    ("t_Co", "8"),
    ("t_cl", "\x1b[H\x1b[2J"),
    ("t_md", "\x1b[1m"),
    ("t_me", "\x1b[m"),
    ("t_so", "\x1b[7m"),
    ("t_se", "\x1b[m"),
    ("t_ku", "\x1bOA"),
    ("t_kd", "\x1bOB"),
    ("t_kl", "\x1bOD"),
    ("t_kr", "\x1bOC"),
];

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn table_is_indexed_by_variant() {
        for (i, spec) in OPTIONS.iter().enumerate() {
            assert_eq!(spec.opt.index(), i, "{}", spec.name);
            assert_eq!(spec.vi.kind(), spec.vim.kind(), "{}", spec.name);
        }
    }

    #[test]
    fn table_is_sorted() {
        for pair in OPTIONS.windows(2) {
            assert!(pair[0].name < pair[1].name, "{} >= {}", pair[0].name, pair[1].name);
        }
    }

    #[test]
    fn onecomma_implies_comma() {
        assert!(Opt::Backspace.spec().flags.contains(OptFlags::COMMA));
        assert!(!Opt::Cdpath.spec().flags.contains(OptFlags::ONECOMMA));
    }
}
