//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Registers used by `:yank`, `:delete`, `:put` and `@r` in expressions.
//!
//! Uppercase names append to the lowercase register. Deletes shift the
//! numbered registers 1-9; yanks fill register 0.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegContent {
    pub lines: Vec<String>,
    pub linewise: bool,
}

impl RegContent {
    pub fn lines(lines: Vec<String>) -> RegContent {
        RegContent {
            lines,
            linewise: true,
        }
    }

    pub fn chars(text: &str) -> RegContent {
        RegContent {
            lines: text.split('\n').map(str::to_string).collect(),
            linewise: false,
        }
    }

    /// The register as a string, as `@r` evaluates it.
    pub fn as_string(&self) -> String {
        let mut s = self.lines.join("\n");
        if self.linewise {
            s.push('\n');
        }
        s
    }
}

#[derive(Debug, Default)]
pub struct Registers {
    named: HashMap<char, RegContent>,
    numbered: [Option<RegContent>; 10],
    small_delete: Option<RegContent>,
    /// Last executed command line, `":`.
    pub last_cmdline: Option<String>,
    /// Last search pattern, `"/`.
    pub last_search: Option<String>,
}

/// Whether `c` names a register. `writing` excludes the read-only ones.
pub fn valid_yank_reg(c: char, writing: bool) -> bool {
    c.is_ascii_alphanumeric()
        || c == '"'
        || c == '-'
        || (!writing && matches!(c, ':' | '/' | '%' | '#' | '.' | '='))
}

impl Registers {
    pub fn new() -> Registers {
        Registers::default()
    }

    pub fn get(&self, name: char) -> Option<&RegContent> {
        match name {
            '"' => self.named.get(&'"'),
            'a'..='z' => self.named.get(&name),
            'A'..='Z' => self.named.get(&name.to_ascii_lowercase()),
            '0'..='9' => self.numbered[name as usize - '0' as usize].as_ref(),
            '-' => self.small_delete.as_ref(),
            _ => None,
        }
    }

    /// Store into `name`; an uppercase name appends.
    pub fn set(&mut self, name: char, content: RegContent) {
        match name {
            'A'..='Z' => {
                let lower = name.to_ascii_lowercase();
                match self.named.get_mut(&lower) {
                    Some(existing) => {
                        if existing.linewise || content.linewise {
                            existing.lines.extend(content.lines);
                            existing.linewise = true;
                        } else if let Some(last) = existing.lines.last_mut() {
                            let mut rest = content.lines.into_iter();
                            if let Some(first) = rest.next() {
                                last.push_str(&first);
                            }
                            existing.lines.extend(rest);
                        }
                    }
                    None => {
                        self.named.insert(lower, content);
                    }
                }
            }
            'a'..='z' | '"' => {
                self.named.insert(name, content);
            }
            '0'..='9' => self.numbered[name as usize - '0' as usize] = Some(content),
            '-' => self.small_delete = Some(content),
            _ => {}
        }
    }

    /// Text removed by `:delete`: goes to `name` or the numbered registers,
    /// and always to the unnamed one.
    pub fn record_delete(&mut self, name: Option<char>, content: RegContent) {
        match name {
            Some(n) if n != '"' => self.set(n, content.clone()),
            _ => {
                for i in (2..10).rev() {
                    self.numbered[i] = self.numbered[i - 1].take();
                }
                self.numbered[1] = Some(content.clone());
            }
        }
        self.named.insert('"', content);
    }

    /// Text copied by `:yank`.
    pub fn record_yank(&mut self, name: Option<char>, content: RegContent) {
        match name {
            Some(n) if n != '"' => self.set(n, content.clone()),
            _ => self.numbered[0] = Some(content.clone()),
        }
        let unnamed = match name {
            Some(n) if n.is_ascii_uppercase() => self.get(n).cloned().unwrap_or(content),
            _ => content,
        };
        self.named.insert('"', unnamed);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn uppercase_appends() {
        let mut r = Registers::new();
        r.set('a', RegContent::lines(vec!["one".into()]));
        r.set('A', RegContent::lines(vec!["two".into()]));
        assert_eq!(r.get('a').unwrap().lines, vec!["one", "two"]);
        assert_eq!(r.get('a').unwrap().as_string(), "one\ntwo\n");
    }

    #[test]
    fn deletes_shift_numbered() {
        let mut r = Registers::new();
        r.record_delete(None, RegContent::lines(vec!["x".into()]));
        r.record_delete(None, RegContent::lines(vec!["y".into()]));
        assert_eq!(r.get('1').unwrap().lines, vec!["y"]);
        assert_eq!(r.get('2').unwrap().lines, vec!["x"]);
        assert_eq!(r.get('"').unwrap().lines, vec!["y"]);
    }

    #[test]
    fn yank_fills_zero() {
        let mut r = Registers::new();
        r.record_yank(None, RegContent::lines(vec!["y".into()]));
        assert_eq!(r.get('0').unwrap().lines, vec!["y"]);
        assert!(valid_yank_reg('a', true));
        assert!(!valid_yank_reg(':', true));
        assert!(valid_yank_reg(':', false));
    }
}
