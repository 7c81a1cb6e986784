//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Typed, scoped option storage.
//!
//! Every option has a global slot. Buffer and window options also keep one
//! slot per buffer or window; for global-local options that slot may be
//! unset, in which case reads fall through to the global value.

pub mod defs;
pub mod did_set;
pub mod env;
pub mod set;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bitflags::bitflags;
use once_cell::sync::Lazy;

pub use defs::{DefVal, Opt, OptFlags, OptKind, OptScope, OptionSpec, OPTIONS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptVal {
    Bool(bool),
    Num(i64),
    Str(String),
}

impl OptVal {
    pub fn as_bool(&self) -> bool {
        match self {
            OptVal::Bool(b) => *b,
            OptVal::Num(n) => *n != 0,
            OptVal::Str(s) => !s.is_empty(),
        }
    }

    pub fn as_num(&self) -> i64 {
        match self {
            OptVal::Bool(b) => *b as i64,
            OptVal::Num(n) => *n,
            OptVal::Str(_) => 0,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OptVal::Str(s) => s,
            _ => "",
        }
    }
}

impl From<DefVal> for OptVal {
    fn from(d: DefVal) -> Self {
        match d {
            DefVal::Bool(b) => OptVal::Bool(b),
            DefVal::Num(n) => OptVal::Num(n),
            DefVal::Str(s) => OptVal::Str(s.to_string()),
        }
    }
}

impl fmt::Display for OptVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptVal::Bool(b) => write!(f, "{}", *b as i64),
            OptVal::Num(n) => write!(f, "{n}"),
            OptVal::Str(s) => write!(f, "{s}"),
        }
    }
}

bitflags! {
    /// Runtime state tracked per option.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OptState: u8 {
        /// Explicitly set since startup.
        const WAS_SET = 1 << 0;
        /// Last set from a modeline, the sandbox or `:execute`.
        const INSECURE = 1 << 1;
    }
}

/// Which slot a read or write addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptLevel {
    /// `:set`: the effective value.
    Both,
    /// `:setglobal`.
    Global,
    /// `:setlocal`.
    Local,
}

/// The buffer and window that local slots are resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptCtx {
    pub buf: usize,
    pub win: usize,
}

#[derive(Debug, Clone, Default)]
struct LocalSlot {
    val: Option<OptVal>,
    insecure: bool,
}

pub struct OptionStore {
    global: Vec<OptVal>,
    state: Vec<OptState>,
    buf_local: HashMap<usize, BTreeMap<Opt, LocalSlot>>,
    win_local: HashMap<usize, BTreeMap<Opt, LocalSlot>>,
    termcodes: BTreeMap<String, String>,
    /// Defaults replaced at startup from the environment.
    env_defaults: HashMap<Opt, OptVal>,
}

/// Options by the first two bytes of their full and short names.
static QUICK: Lazy<HashMap<(u8, u8), Vec<Opt>>> = Lazy::new(|| {
    let mut quick: HashMap<(u8, u8), Vec<Opt>> = HashMap::new();
    for spec in OPTIONS {
        quick.entry(quick_key(spec.name)).or_default().push(spec.opt);
        if !spec.short.is_empty() && quick_key(spec.short) != quick_key(spec.name) {
            quick.entry(quick_key(spec.short)).or_default().push(spec.opt);
        }
    }
    quick
});

fn quick_key(name: &str) -> (u8, u8) {
    let b = name.as_bytes();
    (b.first().copied().unwrap_or(0), b.get(1).copied().unwrap_or(0))
}

impl OptionStore {
    pub fn new(compatible: bool) -> OptionStore {
        let termcodes = defs::DEFAULT_TERMCODES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        OptionStore {
            global: OPTIONS
                .iter()
                .map(|spec| spec.default_for(compatible).into())
                .collect(),
            state: vec![OptState::empty(); OPTIONS.len()],
            buf_local: HashMap::new(),
            win_local: HashMap::new(),
            termcodes,
            env_defaults: HashMap::new(),
        }
    }

    /// Replace the default of `opt` in both modes; the global value
    /// follows.
    pub fn set_default(&mut self, opt: Opt, val: OptVal) {
        self.global[opt.index()] = val.clone();
        self.env_defaults.insert(opt, val);
    }

    pub fn default_value(&self, opt: Opt, compatible: bool) -> OptVal {
        match self.env_defaults.get(&opt) {
            Some(val) => val.clone(),
            None => opt.spec().default_for(compatible).into(),
        }
    }

    /// Look an option up by full or short name.
    pub fn find(&self, name: &str) -> Option<Opt> {
        if name.is_empty() {
            return None;
        }
        QUICK
            .get(&quick_key(name))?
            .iter()
            .copied()
            .find(|opt| {
                let spec = opt.spec();
                spec.name == name || (!spec.short.is_empty() && spec.short == name)
            })
    }

    /// Create the local slots of a new buffer. Options flagged NOGLOB start
    /// from their default rather than the global value.
    pub fn init_buf(&mut self, fnum: usize, compatible: bool) {
        let slots = self.local_seed(true, compatible);
        self.buf_local.insert(fnum, slots);
    }

    /// Create the local slots of a new window, copying them from `from`
    /// when given.
    pub fn init_win(&mut self, winid: usize, from: Option<usize>, compatible: bool) {
        let slots = match from.and_then(|w| self.win_local.get(&w)) {
            Some(src) => src.clone(),
            None => self.local_seed(false, compatible),
        };
        self.win_local.insert(winid, slots);
    }

    fn local_seed(&self, buffer: bool, compatible: bool) -> BTreeMap<Opt, LocalSlot> {
        OPTIONS
            .iter()
            .filter(|spec| spec.scope.is_local() && spec.scope.is_buffer() == buffer)
            .map(|spec| {
                let val = if spec.scope.is_both() {
                    None
                } else if spec.flags.contains(OptFlags::NOGLOB) {
                    Some(spec.default_for(compatible).into())
                } else {
                    Some(self.global[spec.opt.index()].clone())
                };
                (
                    spec.opt,
                    LocalSlot {
                        val,
                        insecure: false,
                    },
                )
            })
            .collect()
    }

    pub fn drop_buf(&mut self, fnum: usize) {
        self.buf_local.remove(&fnum);
    }

    pub fn drop_win(&mut self, winid: usize) {
        self.win_local.remove(&winid);
    }

    fn slot(&self, opt: Opt, ctx: OptCtx) -> Option<&LocalSlot> {
        let spec = opt.spec();
        let map = if spec.scope.is_buffer() {
            self.buf_local.get(&ctx.buf)
        } else {
            self.win_local.get(&ctx.win)
        };
        map?.get(&opt)
    }

    fn slot_mut(&mut self, opt: Opt, ctx: OptCtx) -> &mut LocalSlot {
        let spec = opt.spec();
        let map = if spec.scope.is_buffer() {
            self.buf_local.entry(ctx.buf).or_default()
        } else {
            self.win_local.entry(ctx.win).or_default()
        };
        map.entry(opt).or_default()
    }

    /// The value seen at `level`. For [`OptLevel::Local`] on a global-local
    /// option without a local value, the global value is returned.
    pub fn get(&self, opt: Opt, level: OptLevel, ctx: OptCtx) -> OptVal {
        let spec = opt.spec();
        if level == OptLevel::Global || !spec.scope.is_local() {
            return self.global[opt.index()].clone();
        }
        match self.slot(opt, ctx).and_then(|s| s.val.as_ref()) {
            Some(v) => v.clone(),
            None => self.global[opt.index()].clone(),
        }
    }

    /// The raw local slot, `None` when unset or when the option is global.
    pub fn get_local(&self, opt: Opt, ctx: OptCtx) -> Option<OptVal> {
        if !opt.spec().scope.is_local() {
            return None;
        }
        self.slot(opt, ctx).and_then(|s| s.val.clone())
    }

    pub fn get_global(&self, opt: Opt) -> &OptVal {
        &self.global[opt.index()]
    }

    pub fn set_global(&mut self, opt: Opt, val: OptVal) {
        self.global[opt.index()] = val;
    }

    /// Store `val` in the local slot. `None` unsets a global-local value.
    pub fn set_local(&mut self, opt: Opt, ctx: OptCtx, val: Option<OptVal>) {
        if opt.spec().scope.is_local() {
            self.slot_mut(opt, ctx).val = val;
        } else if let Some(v) = val {
            self.set_global(opt, v);
        }
    }

    pub fn num(&self, opt: Opt, ctx: OptCtx) -> i64 {
        self.get(opt, OptLevel::Both, ctx).as_num()
    }

    pub fn flag(&self, opt: Opt, ctx: OptCtx) -> bool {
        self.get(opt, OptLevel::Both, ctx).as_bool()
    }

    pub fn string(&self, opt: Opt, ctx: OptCtx) -> String {
        match self.get(opt, OptLevel::Both, ctx) {
            OptVal::Str(s) => s,
            other => other.to_string(),
        }
    }

    pub fn state(&self, opt: Opt) -> OptState {
        self.state[opt.index()]
    }

    pub fn mark_set(&mut self, opt: Opt) {
        self.state[opt.index()] |= OptState::WAS_SET;
    }

    pub fn is_insecure(&self, opt: Opt, ctx: OptCtx) -> bool {
        let spec = opt.spec();
        if spec.scope.is_local() {
            if let Some(slot) = self.slot(opt, ctx) {
                if slot.val.is_some() {
                    return slot.insecure;
                }
            }
        }
        self.state[opt.index()].contains(OptState::INSECURE)
    }

    pub fn set_insecure(&mut self, opt: Opt, level: OptLevel, ctx: OptCtx, insecure: bool) {
        if level != OptLevel::Local {
            self.state[opt.index()].set(OptState::INSECURE, insecure);
        }
        if level != OptLevel::Global && opt.spec().scope.is_local() {
            self.slot_mut(opt, ctx).insecure = insecure;
        }
    }

    pub fn termcode(&self, name: &str) -> Option<&str> {
        self.termcodes.get(name).map(String::as_str)
    }

    pub fn set_termcode(&mut self, name: &str, value: &str) {
        self.termcodes.insert(name.to_string(), value.to_string());
    }

    pub fn termcodes(&self) -> impl Iterator<Item = (&String, &String)> {
        self.termcodes.iter()
    }
}

/// Convert a `<Key>` or `<t_xx>` name to its terminal code name `t_xx`.
pub fn key_to_termcode(name: &str) -> Option<String> {
    let inner = name.strip_prefix('<')?.strip_suffix('>')?;
    if let Some(code) = inner.strip_prefix("t_") {
        if code.len() == 2 {
            return Some(inner.to_string());
        }
        return None;
    }
    defs::KEY_NAMES
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(inner))
        .map(|(_, code)| format!("t_{code}"))
}

/// Escape a value so that `:set name=<escaped>` reproduces it.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ' ' | '\t' | '\\' | '"' | '|') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    const CTX: OptCtx = OptCtx { buf: 1, win: 1 };

    fn store() -> OptionStore {
        let mut s = OptionStore::new(false);
        s.init_buf(1, false);
        s.init_win(1, None, false);
        s
    }

    #[test]
    fn lookup_by_either_name() {
        let s = store();
        assert_eq!(s.find("ts"), Some(Opt::Tabstop));
        assert_eq!(s.find("tabstop"), Some(Opt::Tabstop));
        assert_eq!(s.find("bs"), Some(Opt::Backspace));
        assert_eq!(s.find("nosuch"), None);
        assert_eq!(s.find(""), None);
    }

    #[test]
    fn vim_and_vi_defaults() {
        assert_eq!(
            OptionStore::new(false).get_global(Opt::Cpoptions),
            &OptVal::Str("aABceFs".into())
        );
        assert_eq!(
            OptionStore::new(true).get_global(Opt::Shortmess),
            &OptVal::Str("S".into())
        );
    }

    #[test]
    fn global_local_falls_through() {
        let mut s = store();
        s.set_global(Opt::Undolevels, OptVal::Num(50));
        assert_eq!(s.num(Opt::Undolevels, CTX), 50);
        s.set_local(Opt::Undolevels, CTX, Some(OptVal::Num(7)));
        assert_eq!(s.num(Opt::Undolevels, CTX), 7);
        assert_eq!(s.get(Opt::Undolevels, OptLevel::Global, CTX), OptVal::Num(50));
        s.set_local(Opt::Undolevels, CTX, None);
        assert_eq!(s.num(Opt::Undolevels, CTX), 50);
    }

    #[test]
    fn new_buffers_copy_global_values() {
        let mut s = store();
        s.set_global(Opt::Shiftwidth, OptVal::Num(2));
        s.set_global(Opt::Filetype, OptVal::Str("c".into()));
        s.init_buf(2, false);
        let ctx = OptCtx { buf: 2, win: 1 };
        assert_eq!(s.num(Opt::Shiftwidth, ctx), 2);
        assert_eq!(s.string(Opt::Filetype, ctx), "");
    }

    #[test]
    fn key_names() {
        assert_eq!(key_to_termcode("<Up>").as_deref(), Some("t_ku"));
        assert_eq!(key_to_termcode("<t_xy>").as_deref(), Some("t_xy"));
        assert_eq!(key_to_termcode("<Nope>"), None);
    }

    #[test]
    fn escaping_for_set() {
        assert_eq!(escape_value("python 2"), r"python\ 2");
        assert_eq!(escape_value(r"a\b|c"), r"a\\b\|c");
    }
}
