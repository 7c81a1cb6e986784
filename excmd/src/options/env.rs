//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Option defaults taken from the environment at startup.

use super::defs::{CPO_ALL, SHM_POSIX};
use super::{Opt, OptVal};
use crate::eval::Value;
use crate::state::EditorState;

/// Directories whose files are never backed up; empty means `/tmp`.
const TEMP_DIRS: [&str; 4] = ["", "TMPDIR", "TEMP", "TMP"];

/// `cdpath` from `$CDPATH`: a leading empty entry for the current
/// directory, colons become commas.
fn cdpath_from(env: &str) -> String {
    let mut out = String::from(",");
    for c in env.chars() {
        match c {
            ':' => out.push(','),
            ',' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Encoding named by the codeset part of a locale, `en_US.UTF-8` gives
/// `utf-8`.
fn encoding_from_locale(lang: &str) -> Option<&'static str> {
    let codeset = lang.split_once('.')?.1;
    let codeset = codeset.split('@').next().unwrap_or(codeset);
    match codeset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Some("utf-8"),
        "iso-8859-1" | "iso8859-1" | "iso88591" => Some("latin1"),
        "iso-8859-15" | "iso8859-15" => Some("iso-8859-15"),
        _ => None,
    }
}

/// Initialize option defaults from the environment. `getenv` looks a
/// variable up; empty values count as unset.
pub fn init_from_env(st: &mut EditorState, getenv: impl Fn(&str) -> Option<String>) {
    let getenv = |name: &str| getenv(name).filter(|v| !v.is_empty());

    let shell = getenv("SHELL").or_else(|| {
        if cfg!(windows) {
            getenv("COMSPEC")
        } else {
            None
        }
    });
    if let Some(shell) = shell {
        log::debug!("shell from environment: {shell}");
        st.options.set_default(Opt::Shell, OptVal::Str(shell));
    }

    let mut skip: Vec<String> = Vec::new();
    for name in TEMP_DIRS {
        let dir = if name.is_empty() {
            Some("/tmp".to_string())
        } else {
            getenv(name)
        };
        let Some(dir) = dir else { continue };
        let item = format!("{}/*", dir.trim_end_matches('/'));
        if !skip.contains(&item) {
            skip.push(item);
        }
    }
    st.options
        .set_default(Opt::Backupskip, OptVal::Str(skip.join(",")));

    if let Some(cdpath) = getenv("CDPATH") {
        st.options
            .set_default(Opt::Cdpath, OptVal::Str(cdpath_from(&cdpath)));
    }

    if getenv("VIM_POSIX").is_some() {
        log::debug!("POSIX defaults from VIM_POSIX");
        set_posix_defaults(st);
    }

    if let Some(lang) = getenv("LC_ALL")
        .or_else(|| getenv("LC_CTYPE"))
        .or_else(|| getenv("LANG"))
    {
        if let Some(enc) = encoding_from_locale(&lang) {
            st.options
                .set_default(Opt::Encoding, OptVal::Str(enc.to_string()));
        }
        st.vars.set_vim("lang", Value::str(&lang));
        st.vars.set_vim("ctype", Value::str(&lang));
    }
    // mlterm does bidi itself; nothing to draw here but scripts may ask
    let mlterm = getenv("MLTERM").is_some();
    st.vars.set_vim("termbidi", Value::Number(i64::from(mlterm)));
}

/// The defaults `--posix` and `$VIM_POSIX` select.
pub fn set_posix_defaults(st: &mut EditorState) {
    st.options
        .set_default(Opt::Cpoptions, OptVal::Str(CPO_ALL.to_string()));
    st.options
        .set_default(Opt::Shortmess, OptVal::Str(SHM_POSIX.to_string()));
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use crate::runner::do_cmdline_cmd;
    use std::collections::HashMap;
    use test_log::test;

    fn env_state(vars: &[(&str, &str)]) -> EditorState {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        init_from_env(&mut st, |name| env.get(name).cloned());
        st
    }

    #[test]
    fn shell_and_temp_dirs() {
        let st = env_state(&[("SHELL", "/bin/zsh"), ("TMPDIR", "/var/tmp/"), ("TMP", "/tmp")]);
        assert_eq!(st.p_str(Opt::Shell), "/bin/zsh");
        assert_eq!(st.p_str(Opt::Backupskip), "/tmp/*,/var/tmp/*");
    }

    #[test]
    fn empty_environment() {
        let st = env_state(&[("SHELL", "")]);
        assert_eq!(st.p_str(Opt::Shell), "sh");
        assert_eq!(st.p_str(Opt::Backupskip), "/tmp/*");
        assert_eq!(st.p_str(Opt::Cdpath), ",,");
    }

    #[test]
    fn cdpath_conversion() {
        let st = env_state(&[("CDPATH", "/src:/my dir")]);
        assert_eq!(st.p_str(Opt::Cdpath), ",/src,/my\\ dir");
    }

    #[test]
    fn posix_defaults_survive_reset() {
        let mut st = env_state(&[("VIM_POSIX", "1")]);
        assert_eq!(st.p_str(Opt::Cpoptions), CPO_ALL);
        assert_eq!(st.p_str(Opt::Shortmess), "AS");
        do_cmdline_cmd(&mut st, "set cpo=a | set cpo&").unwrap();
        assert_eq!(st.p_str(Opt::Cpoptions), CPO_ALL);
    }

    #[test]
    fn locale() {
        let st = env_state(&[("LANG", "de_DE.UTF-8"), ("MLTERM", "3.9")]);
        assert_eq!(st.p_str(Opt::Encoding), "utf-8");
        assert_eq!(st.vars.get_vim("lang"), Some(&Value::str("de_DE.UTF-8")));
        assert_eq!(st.vars.get_vim("termbidi"), Some(&Value::Number(1)));
        assert_eq!(encoding_from_locale("C"), None);
        assert_eq!(encoding_from_locale("fr_FR.ISO-8859-1@euro"), Some("latin1"));
    }
}
