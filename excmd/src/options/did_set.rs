//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Callbacks run after an option got its new value. A callback may
//! normalize the value in `new`; an error puts the old value back.

use super::defs::{CPO_ALL, SHM_ALL};
use super::{Opt, OptCtx, OptLevel, OptState, OptVal, OPTIONS};
use crate::autocmd::Event;
use crate::error::{e, invalid, Result};
use crate::state::EditorState;

pub struct OptSetArgs {
    pub opt: Opt,
    pub old: OptVal,
    /// The value being installed; a callback may rewrite it.
    pub new: OptVal,
    pub level: OptLevel,
    pub ctx: OptCtx,
}

pub type DidSetFn = fn(&mut EditorState, &mut OptSetArgs) -> Result<()>;

fn illegal_char(c: char) -> crate::error::Error {
    invalid(format!("E539: Illegal character <{c}>"))
}

/// Every character of the value must appear in `allowed`.
fn check_flags(value: &str, allowed: &str) -> Result<()> {
    match value.chars().find(|&c| !allowed.contains(c)) {
        Some(c) => Err(illegal_char(c)),
        None => Ok(()),
    }
}

/// Every comma-separated item must be one of `allowed`.
fn check_items(value: &str, allowed: &[&str]) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    if value.split(',').all(|item| allowed.contains(&item)) {
        Ok(())
    } else {
        Err(invalid(e::INVARG))
    }
}

/// 'backspace': a single digit stands for the equivalent item list.
pub fn backspace(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    let value = args.new.as_str().to_string();
    if value.starts_with(|c: char| c.is_ascii_digit()) {
        let items = match value.as_str() {
            "0" => "",
            "1" => "indent,eol",
            "2" => "indent,eol,start",
            "3" => "indent,eol,nostop",
            _ => return Err(invalid(e::INVARG)),
        };
        args.new = OptVal::Str(items.to_string());
        return Ok(());
    }
    check_items(&value, &["indent", "eol", "start", "nostop"])
}

pub fn positive(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    if args.new.as_num() < 1 {
        return Err(invalid(e::ZERO_NOT_ALLOWED));
    }
    Ok(())
}

pub fn non_negative(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    if args.new.as_num() < 0 {
        return Err(invalid(e::ZERO_NOT_ALLOWED));
    }
    Ok(())
}

/// Toggling 'compatible' puts every option that follows it and was not set
/// explicitly back to its default for the new mode.
pub fn compatible(st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    let on = args.new.as_bool();
    if on == args.old.as_bool() {
        return Ok(());
    }
    log::debug!("'compatible' is now {on}, resetting defaults");
    for spec in OPTIONS {
        if !spec.flags.contains(super::OptFlags::VIM) {
            continue;
        }
        if st.options.state(spec.opt).contains(OptState::WAS_SET) {
            continue;
        }
        let val = st.options.default_value(spec.opt, on);
        st.options.set_global(spec.opt, val.clone());
        if spec.scope.is_local() && !spec.scope.is_both() {
            st.options.set_local(spec.opt, args.ctx, Some(val));
        }
    }
    Ok(())
}

pub fn cpoptions(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    check_flags(args.new.as_str(), CPO_ALL)
}

pub fn shortmess(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    check_flags(args.new.as_str(), SHM_ALL)
}

pub fn encoding(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    let name = args.new.as_str().to_ascii_lowercase();
    let canon = match name.as_str() {
        "utf8" | "utf-8" => "utf-8",
        "latin1" | "iso-8859-1" | "iso8859-1" => "latin1",
        "ucs-2" | "ucs2" => "ucs-2",
        "cp1252" => "cp1252",
        _ => return Err(invalid(e::INVARG)),
    };
    args.new = OptVal::Str(canon.to_string());
    Ok(())
}

pub fn eventignore(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    for item in args.new.as_str().split(',').filter(|s| !s.is_empty()) {
        if !item.eq_ignore_ascii_case("all") && Event::from_name(item).is_none() {
            return Err(invalid(e::INVARG));
        }
    }
    Ok(())
}

const FILEFORMATS: &[&str] = &["unix", "dos", "mac"];

pub fn fileformat(st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    if !FILEFORMATS.contains(&args.new.as_str()) {
        return Err(invalid(e::INVARG));
    }
    if args.level != OptLevel::Global && args.old != args.new {
        // the file changes when written
        st.set_buf_modified(args.ctx.buf, true);
    }
    Ok(())
}

pub fn fileformats(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    check_items(args.new.as_str(), FILEFORMATS)
}

/// 'filetype' and 'syntax': only file name characters. A new 'filetype'
/// triggers the FileType event.
pub fn filetype(st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    let bad: &[char] = if st.secure > 0 {
        &['/', '\\', '*', '?', '[', '|', ';', '&', '<', '>', '\r', '\n']
    } else {
        &['/', '\\', '*', '?', '[', '<', '>', '\r', '\n']
    };
    let value = args.new.as_str().to_string();
    if value.contains(bad) {
        return Err(invalid(e::INVARG));
    }
    if args.opt == Opt::Filetype && args.old != args.new {
        crate::autocmd::apply_autocmds(st, Event::FileType, &value, Some(args.ctx.buf));
    }
    Ok(())
}

pub fn numberwidth(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    match args.new.as_num() {
        n if n < 1 => Err(invalid(e::ZERO_NOT_ALLOWED)),
        n if n > 20 => Err(invalid(e::INVARG)),
        _ => Ok(()),
    }
}

pub fn shiftwidth_tabstop(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    let n = args.new.as_num();
    match args.opt {
        Opt::Tabstop if n <= 0 => Err(invalid(e::ZERO_NOT_ALLOWED)),
        Opt::Tabstop if n > 9999 => Err(invalid(e::INVARG)),
        _ if n < 0 => Err(invalid("E487: Argument must be positive")),
        _ => Ok(()),
    }
}

/// 'whichwrap': a number stands for a set of flags, as in Vi.
pub fn whichwrap(_st: &mut EditorState, args: &mut OptSetArgs) -> Result<()> {
    let value = args.new.as_str().to_string();
    if value.starts_with(|c: char| c.is_ascii_digit()) {
        let n: u32 = value.parse().map_err(|_| invalid(e::INVARG))?;
        let mut items = Vec::new();
        for (bit, flags) in [(1, "b"), (2, "s"), (4, "h,l"), (8, "<,>"), (16, "[,]")] {
            if n & bit != 0 {
                items.push(flags);
            }
        }
        args.new = OptVal::Str(items.join(","));
        return Ok(());
    }
    for item in value.split(',').filter(|s| !s.is_empty()) {
        if item.chars().count() != 1 {
            return Err(invalid(e::INVARG));
        }
    }
    check_flags(&value.replace(',', ""), "bshl<>[]~")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn args(st: &EditorState, opt: Opt, new: OptVal) -> OptSetArgs {
        OptSetArgs {
            opt,
            old: st.options.get(opt, OptLevel::Both, st.opt_ctx()),
            new,
            level: OptLevel::Both,
            ctx: st.opt_ctx(),
        }
    }

    #[test]
    fn backspace_numbers_become_items() {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        let mut a = args(&st, Opt::Backspace, OptVal::Str("2".into()));
        backspace(&mut st, &mut a).unwrap();
        assert_eq!(a.new, OptVal::Str("indent,eol,start".into()));
        let mut a = args(&st, Opt::Backspace, OptVal::Str("4".into()));
        assert!(backspace(&mut st, &mut a).is_err());
        let mut a = args(&st, Opt::Backspace, OptVal::Str("eol,bogus".into()));
        assert!(backspace(&mut st, &mut a).is_err());
    }

    #[test]
    fn whichwrap_numbers_become_flags() {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        let mut a = args(&st, Opt::Whichwrap, OptVal::Str("7".into()));
        whichwrap(&mut st, &mut a).unwrap();
        assert_eq!(a.new, OptVal::Str("b,s,h,l".into()));
        let mut a = args(&st, Opt::Whichwrap, OptVal::Str("b,x".into()));
        assert!(whichwrap(&mut st, &mut a).is_err());
    }

    #[test]
    fn flag_lists_reject_unknown_characters() {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        let mut a = args(&st, Opt::Shortmess, OptVal::Str("aZ".into()));
        let err = shortmess(&mut st, &mut a).unwrap_err();
        assert_eq!(err.message(), "E539: Illegal character <Z>");
    }

    #[test]
    fn encoding_is_canonical() {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        let mut a = args(&st, Opt::Encoding, OptVal::Str("UTF8".into()));
        encoding(&mut st, &mut a).unwrap();
        assert_eq!(a.new.as_str(), "utf-8");
    }
}
