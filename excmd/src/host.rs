//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The outside world as seen by command handlers: files, the shell, the
//! terminal and the interrupt flag.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::rc::Rc;

/// Longest command handed to the shell.
const MAX_COMMAND_LEN: usize = 8192;

pub trait Host {
    fn read_file(&mut self, path: &str) -> io::Result<String>;

    fn write_file(&mut self, path: &str, text: &str, append: bool) -> io::Result<()>;

    fn file_exists(&self, path: &str) -> bool;

    /// Run `cmd` through `shell shellcmdflag`, feeding `input` on stdin.
    /// Returns the captured stdout and the exit status.
    fn shell(&mut self, shell: &str, flag: &str, cmd: &str, input: Option<&str>)
        -> io::Result<(String, i32)>;

    /// Ask a yes/no question; `true` means yes.
    fn ask_yesno(&mut self, prompt: &str) -> bool;

    /// Deliver a message line to the user.
    fn write_msg(&mut self, text: &str, is_error: bool);

    /// Poll for a pending interrupt. Returns `true` once per interrupt.
    fn interrupted(&mut self) -> bool;
}

/// The real filesystem, `sh -c` and the process' stdout/stderr.
pub struct StdHost {
    batch: bool,
}

impl StdHost {
    pub fn new(batch: bool) -> StdHost {
        StdHost { batch }
    }
}

impl Host for StdHost {
    fn read_file(&mut self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_file(&mut self, path: &str, text: &str, append: bool) -> io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        file.write_all(text.as_bytes())
    }

    fn file_exists(&self, path: &str) -> bool {
        std::path::Path::new(path).exists()
    }

    fn shell(
        &mut self,
        shell: &str,
        flag: &str,
        cmd: &str,
        input: Option<&str>,
    ) -> io::Result<(String, i32)> {
        if cmd.len() > MAX_COMMAND_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "command too long"));
        }
        log::debug!("shell: {shell} {flag} {cmd:?}");

        let mut child = Command::new(shell)
            .arg(flag)
            .arg(cmd)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(text.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        Ok((
            String::from_utf8_lossy(&output.stdout).into_owned(),
            output.status.code().unwrap_or(-1),
        ))
    }

    fn ask_yesno(&mut self, prompt: &str) -> bool {
        if self.batch {
            return false;
        }
        eprint!("{prompt} (y/n)?");
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim_start().chars().next(), Some('y') | Some('Y'))
    }

    fn write_msg(&mut self, text: &str, is_error: bool) {
        if is_error {
            eprintln!("{text}");
        } else {
            println!("{text}");
        }
    }

    fn interrupted(&mut self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct MemHostData {
    pub files: BTreeMap<String, String>,
    pub output: Vec<String>,
    pub errors: Vec<String>,
    /// Canned replies for `ask_yesno`; an empty queue answers no.
    pub answers: VecDeque<bool>,
    /// Interrupt after this many polls.
    pub interrupt_after: Option<usize>,
    /// Shell commands seen, with their stdin.
    pub shell_log: Vec<(String, Option<String>)>,
    /// Replies for shell commands, matched by exact command text.
    pub shell_replies: BTreeMap<String, (String, i32)>,
}

/// An in-memory host whose state stays inspectable through a shared handle.
#[derive(Clone, Default)]
pub struct MemHost {
    pub data: Rc<RefCell<MemHostData>>,
}

impl MemHost {
    pub fn new() -> MemHost {
        MemHost::default()
    }

    pub fn with_file(self, path: &str, text: &str) -> MemHost {
        self.data
            .borrow_mut()
            .files
            .insert(path.to_string(), text.to_string());
        self
    }

    pub fn output(&self) -> Vec<String> {
        self.data.borrow().output.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.data.borrow().errors.clone()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.data.borrow().files.get(path).cloned()
    }
}

impl Host for MemHost {
    fn read_file(&mut self, path: &str) -> io::Result<String> {
        self.data
            .borrow()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn write_file(&mut self, path: &str, text: &str, append: bool) -> io::Result<()> {
        let mut data = self.data.borrow_mut();
        let entry = data.files.entry(path.to_string()).or_default();
        if !append {
            entry.clear();
        }
        entry.push_str(text);
        Ok(())
    }

    fn file_exists(&self, path: &str) -> bool {
        self.data.borrow().files.contains_key(path)
    }

    fn shell(
        &mut self,
        _shell: &str,
        _flag: &str,
        cmd: &str,
        input: Option<&str>,
    ) -> io::Result<(String, i32)> {
        let mut data = self.data.borrow_mut();
        data.shell_log
            .push((cmd.to_string(), input.map(str::to_string)));
        Ok(data
            .shell_replies
            .get(cmd)
            .cloned()
            .unwrap_or_else(|| (String::new(), 0)))
    }

    fn ask_yesno(&mut self, _prompt: &str) -> bool {
        self.data.borrow_mut().answers.pop_front().unwrap_or(false)
    }

    fn write_msg(&mut self, text: &str, is_error: bool) {
        let mut data = self.data.borrow_mut();
        if is_error {
            data.errors.push(text.to_string());
        } else {
            data.output.push(text.to_string());
        }
    }

    fn interrupted(&mut self) -> bool {
        let mut data = self.data.borrow_mut();
        match data.interrupt_after {
            Some(0) => {
                data.interrupt_after = None;
                true
            }
            Some(n) => {
                data.interrupt_after = Some(n - 1);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn mem_host_files_and_messages() {
        let host = MemHost::new().with_file("a.txt", "one\n");
        let mut h: Box<dyn Host> = Box::new(host.clone());
        assert_eq!(h.read_file("a.txt").unwrap(), "one\n");
        h.write_file("a.txt", "two\n", true).unwrap();
        assert_eq!(host.file("a.txt").as_deref(), Some("one\ntwo\n"));
        assert!(h.read_file("missing").is_err());
        h.write_msg("hi", false);
        h.write_msg("E1: bad", true);
        assert_eq!(host.output(), vec!["hi"]);
        assert_eq!(host.errors(), vec!["E1: bad"]);
    }

    #[test]
    fn scheduled_interrupt_fires_once() {
        let host = MemHost::new();
        host.data.borrow_mut().interrupt_after = Some(1);
        let mut h = host.clone();
        assert!(!h.interrupted());
        assert!(h.interrupted());
        assert!(!h.interrupted());
    }
}
