//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The Ex command-line core: parsing and executing `:` commands, the
//! option store and its `:set` language, command modifiers, line ranges,
//! conditionals and exceptions.
//!
//! Buffers, windows and the outside world are kept deliberately small;
//! see [`state::EditorState`] and [`host::Host`].

pub mod address;
pub mod autocmd;
pub mod buffer;
pub mod charset;
pub mod cmds;
pub mod cond;
pub mod debug;
pub mod docmd;
pub mod error;
pub mod eval;
pub mod ex;
pub mod except;
pub mod filename;
pub mod host;
pub mod layout;
pub mod line_source;
pub mod messages;
pub mod modeline;
pub mod modifiers;
pub mod options;
pub mod popup;
pub mod registers;
pub mod runner;
pub mod search;
pub mod state;
pub mod usercmd;
pub mod userfunc;

use std::io::{BufRead, IsTerminal};

use error::Result;
use host::{Host, StdHost};
use line_source::{LineSource, StdinSource};
use options::Opt;
use runner::{do_cmdline, do_cmdline_cmd, RunFlags};
use state::EditorState;

#[derive(Debug, clap::Parser, Clone, Default)]
#[command(version, about = "excmd - execute Ex commands")]
pub struct Args {
    /// Execute CMD after the file is loaded; may be repeated.
    #[arg(short = 'c', value_name = "CMD")]
    pub commands: Vec<String>,

    /// Source FILE after the -c commands; may be repeated.
    #[arg(short = 'S', value_name = "FILE")]
    pub scripts: Vec<String>,

    /// Batch mode: no prompts and no file info messages.
    #[arg(short = 's')]
    pub silent: bool,

    /// Initialization script; NONE skips initialization.
    #[arg(short = 'u', value_name = "NONE|FILE")]
    pub init: Option<String>,

    /// POSIX-strict defaults, as with $VIM_POSIX.
    #[arg(long)]
    pub posix: bool,

    /// File to load into the first buffer.
    pub file: Option<String>,
}

/// Set up an editor for `args` on `host`: environment, init script and
/// the first file.
pub fn startup(
    args: &Args,
    host: Box<dyn Host>,
    getenv: impl Fn(&str) -> Option<String>,
) -> EditorState {
    let mut st = EditorState::new(host, false);
    let exinit = getenv("EXINIT");
    options::env::init_from_env(&mut st, &getenv);
    if args.posix {
        options::env::set_posix_defaults(&mut st);
    }
    if args.silent {
        let shm = st.p_str(Opt::Shortmess);
        if !shm.contains('F') {
            st.options
                .set_global(Opt::Shortmess, options::OptVal::Str(format!("{shm}F")));
        }
    }

    match args.init.as_deref() {
        Some("NONE") => {}
        Some(script) => {
            log::debug!("init script {script}");
            run_logged(&mut st, &format!("source {}", escape_fname(script)));
        }
        None => {
            if let Some(cmds) = exinit.filter(|c| !c.is_empty()) {
                log::debug!("EXINIT: {cmds}");
                run_logged(&mut st, &cmds);
            }
        }
    }

    if let Some(file) = &args.file {
        run_logged(&mut st, &format!("edit {}", escape_fname(file)));
    }
    crate::autocmd::apply_autocmds(&mut st, crate::autocmd::Event::VimEnter, "", None);
    st
}

fn escape_fname(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, ' ' | '\t' | '\\' | '|' | '"' | '%' | '#') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn run_logged(st: &mut EditorState, cmd: &str) {
    if let Err(err) = do_cmdline_cmd(st, cmd) {
        log::warn!("{cmd}: {err}");
    }
}

/// Run the `-c` and `-S` commands, then the lines of `input` as typed
/// commands. Returns the exit code.
pub fn run_commands<R: BufRead>(st: &mut EditorState, args: &Args, input: R) -> i32 {
    let queued = args
        .commands
        .iter()
        .cloned()
        .chain(args.scripts.iter().map(|s| format!("source {}", escape_fname(s))));
    for cmd in queued {
        if st.exiting.is_some() {
            break;
        }
        run_logged(st, &cmd);
    }

    let mut source = StdinSource::new(input);
    while st.exiting.is_none() && !source.at_eof() {
        if let Err(err) = do_cmdline(st, None, &mut source, RunFlags::empty()) {
            log::warn!("typed command: {err}");
        }
    }
    let code = st.exiting.unwrap_or(0) + st.ex_exitval;
    log::debug!("exit code {code}");
    code
}

/// The `excmd` binary: commands from the arguments, then from stdin.
pub fn run(args: Args) -> Result<i32> {
    let stdin = std::io::stdin();
    let batch = args.silent || !stdin.is_terminal();
    let mut st = startup(&args, Box::new(StdHost::new(batch)), |name| {
        std::env::var(name).ok()
    });
    Ok(run_commands(&mut st, &args, stdin.lock()))
}
