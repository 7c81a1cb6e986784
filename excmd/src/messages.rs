//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Normal and error messages, the message history and the error-source
//! banner shown for errors in scripts and functions.

use crate::eval::Value;
use crate::state::EditorState;

/// Number of entries kept for `:messages`.
const HISTORY_LEN: usize = 200;

#[derive(Debug, Default)]
pub struct Messages {
    pub history: Vec<String>,
    /// Text written by `:echon` that has not been terminated yet.
    pending: String,
    last_source_name: Option<String>,
    last_source_lnum: i64,
    /// Number of `emsg` calls, reported or not.
    pub called_emsg: u64,
}

impl Messages {
    pub fn add_history(&mut self, text: &str) {
        if self.history.len() >= HISTORY_LEN {
            self.history.remove(0);
        }
        self.history.push(text.to_string());
    }
}

impl EditorState {
    fn flush_pending(&mut self) {
        if !self.msgs.pending.is_empty() {
            let text = std::mem::take(&mut self.msgs.pending);
            self.host.write_msg(&text, false);
        }
    }

    /// Show a message line unless messages are silenced.
    pub fn msg(&mut self, text: &str) {
        if self.msg_silent != 0 {
            return;
        }
        self.flush_pending();
        self.host.write_msg(text, false);
    }

    /// A message that is also kept in the history, as `:echomsg` does.
    pub fn msg_hist(&mut self, text: &str) {
        self.msgs.add_history(text);
        self.msg(text);
    }

    /// Append to the current line without ending it.
    pub fn msg_partial(&mut self, text: &str) {
        if self.msg_silent != 0 {
            return;
        }
        self.msgs.pending.push_str(text);
    }

    /// Terminate a line started with [`EditorState::msg_partial`].
    pub fn msg_end(&mut self) {
        self.flush_pending();
    }

    /// A line of a listing. Honors `:filter`.
    pub fn msg_list_line(&mut self, text: &str) {
        if let Some(filter) = &self.cmdmod.filter {
            if filter.regex.is_match(text) == filter.negated {
                return;
            }
        }
        self.msg(text);
    }

    /// Message shown at 'verbose' level `level` or higher.
    pub fn verbose_msg(&mut self, level: i64, text: &str) {
        if self.p_num(crate::options::Opt::Verbose) >= level {
            self.msg(text);
        }
    }

    /// Report an error. The message may instead become part of an error
    /// exception, or be dropped under `:silent!`. Always returns `true` so
    /// callers can use it in a condition.
    pub fn emsg(&mut self, text: &str) -> bool {
        self.emsg_core(text, false)
    }

    /// An error that replaces any earlier error of the same command in an
    /// exception.
    pub fn emsg_severe(&mut self, text: &str) -> bool {
        self.emsg_core(text, true)
    }

    fn emsg_core(&mut self, text: &str, severe: bool) -> bool {
        if self.exc.emsg_skip > 0 {
            return true;
        }
        self.msgs.called_emsg += 1;
        log::debug!("emsg: {text}");

        let mut ignore = false;
        if self.cause_errthrow(text, severe, &mut ignore) {
            if !ignore {
                self.exc.did_emsg = true;
            }
            return true;
        }

        self.vars.set_vim("errmsg", Value::str(text));

        if self.emsg_silent != 0 {
            return true;
        }

        self.ex_exitval = 1;
        self.msg_silent = 0;
        if self.global_busy > 0 {
            self.global_busy += 1;
        }
        self.exc.did_emsg = true;

        self.msg_source();
        self.flush_pending();
        self.msgs.add_history(text);
        self.host.write_msg(text, true);
        true
    }

    /// Show where the error happened when it is inside a script or a
    /// function and that place differs from the last error.
    fn msg_source(&mut self) {
        let Some(frame) = self.sourcing.last() else {
            return;
        };
        let name = if frame.kind == crate::line_source::SourceKind::Function {
            self.estack_sfile()
        } else {
            frame.name.clone()
        };
        let lnum = frame.lnum;
        if name.is_empty() {
            return;
        }

        let other_name = self.msgs.last_source_name.as_deref() != Some(name.as_str());
        if other_name {
            let banner = format!("Error detected while processing {name}:");
            self.msgs.add_history(&banner);
            self.host.write_msg(&banner, true);
            self.msgs.last_source_name = Some(name);
        }
        if (other_name || lnum != self.msgs.last_source_lnum) && lnum != 0 {
            let line = format!("line {lnum:4}:");
            self.msgs.add_history(&line);
            self.host.write_msg(&line, true);
            self.msgs.last_source_lnum = lnum;
        }
    }

    /// Forget the last error source, so the next error in the same place
    /// shows the banner again.
    pub fn reset_last_sourcing(&mut self) {
        self.msgs.last_source_name = None;
        self.msgs.last_source_lnum = 0;
    }

    /// Internal error: reported even under `:silent!`.
    pub fn iemsg(&mut self, text: &str) {
        log::warn!("internal error: {text}");
        self.flush_pending();
        self.msgs.add_history(text);
        self.host.write_msg(text, true);
        self.exc.did_emsg = true;
    }
}

#[cfg(test)]
mod test {
    use crate::host::MemHost;
    use crate::line_source::SourceKind;
    use crate::state::{EditorState, SourceFrame};
    use test_log::test;

    fn state() -> (EditorState, MemHost) {
        let host = MemHost::new();
        (EditorState::new(Box::new(host.clone()), false), host)
    }

    #[test]
    fn silent_drops_messages() {
        let (mut st, host) = state();
        st.msg_silent = 1;
        st.msg("hidden");
        st.msg_silent = 0;
        st.msg("shown");
        assert_eq!(host.output(), vec!["shown"]);
    }

    #[test]
    fn error_resets_msg_silent() {
        let (mut st, host) = state();
        st.msg_silent = 2;
        st.emsg("E1: boom");
        assert_eq!(st.msg_silent, 0);
        assert!(st.exc.did_emsg);
        assert_eq!(host.errors(), vec!["E1: boom"]);
        assert_eq!(st.vars.get_vim("errmsg").unwrap().to_string(), "E1: boom");
    }

    #[test]
    fn emsg_silent_keeps_errmsg() {
        let (mut st, host) = state();
        st.emsg_silent = 1;
        st.emsg("E2: quiet");
        assert!(host.errors().is_empty());
        assert!(!st.exc.did_emsg);
        assert_eq!(st.vars.get_vim("errmsg").unwrap().to_string(), "E2: quiet");
    }

    #[test]
    fn script_errors_show_their_source_once() {
        let (mut st, host) = state();
        st.sourcing.push(SourceFrame {
            kind: SourceKind::Script,
            name: "x.vim".into(),
            lnum: 3,
            sid: 1,
            level: 0,
            finished: false,
        });
        st.emsg("E1: a");
        st.emsg("E1: b");
        st.set_sourcing_lnum(5);
        st.emsg("E1: c");
        assert_eq!(
            host.errors(),
            vec![
                "Error detected while processing x.vim:",
                "line    3:",
                "E1: a",
                "E1: b",
                "line    5:",
                "E1: c"
            ]
        );
    }

    #[test]
    fn echon_joins_parts() {
        let (mut st, host) = state();
        st.msg_partial("a");
        st.msg_partial("b");
        st.msg("c");
        st.msg_end();
        assert_eq!(host.output(), vec!["ab", "c"]);
    }
}
