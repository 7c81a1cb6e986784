//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Error kinds and the numbered diagnostics reported through `emsg`.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Raised by the command parser before a handler runs.
    #[error("{0}")]
    Parse(String),
    /// A handler rejected its range or argument.
    #[error("{0}")]
    Validation(String),
    /// A handler failed mid-execution.
    #[error("{0}")]
    Runtime(String),
    #[error("Interrupted")]
    Interrupt,
    /// `:throw` with the thrown value.
    #[error("{0}")]
    UserThrow(String),
    /// Internal invariant break. Never catchable from a script.
    #[error("E685: Internal error: {0}")]
    Fatal(String),
    #[error("Error processing io: {0}")]
    Io(#[from] std::io::Error),
    #[error("Program requested an exit with code {0}")]
    Exit(i32),
    /// The command failed and already reported why.
    #[error("")]
    Aborted,
}

impl Error {
    /// Text handed to the error sink for this error.
    pub fn message(&self) -> String {
        match self {
            Error::Io(e) => format!("E484: Can't open file: {e}"),
            other => other.to_string(),
        }
    }

    /// Errors that stop the surrounding command chain without going
    /// through the error sink.
    pub fn is_control(&self) -> bool {
        matches!(self, Error::Exit(_) | Error::Interrupt)
    }
}

impl From<nom::Err<nom::error::Error<&str>>> for Error {
    fn from(error: nom::Err<nom::error::Error<&str>>) -> Self {
        Self::Parse(match error {
            nom::Err::Incomplete(_) => e::INVEXPR.to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("{}: {}", e::INVEXPR_STR, e.input)
            }
        })
    }
}

impl From<regex::Error> for Error {
    fn from(error: regex::Error) -> Self {
        log::debug!("regex compile failure: {error}");
        Self::Validation(e::INVPAT.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait GetExitCode {
    fn get_exit_code(&self) -> i32;
}

impl<T> GetExitCode for Result<T> {
    fn get_exit_code(&self) -> i32 {
        match self {
            Ok(_) => 0,
            Err(Error::Exit(code)) => *code,
            Err(_) => 1,
        }
    }
}

/// Shorthand constructors used by handlers.
pub fn parse_err(msg: impl Into<String>) -> Error {
    Error::Parse(msg.into())
}

pub fn invalid(msg: impl Into<String>) -> Error {
    Error::Validation(msg.into())
}

pub fn runtime(msg: impl Into<String>) -> Error {
    Error::Runtime(msg.into())
}

/// Numbered diagnostics.
pub mod e {
    pub const INTERR: &str = "E685: Internal error";
    pub const INTERRUPTED: &str = "Interrupted";
    pub const NOTEDITORCMD: &str = "E492: Not an editor command";
    pub const AMBIGUOUS: &str = "E464: Ambiguous use of user-defined command";
    pub const INVRANGE: &str = "E16: Invalid range";
    pub const INVADDR: &str = "E14: Invalid address";
    pub const NORANGE: &str = "E481: No range allowed";
    pub const NOBANG: &str = "E477: No ! allowed";
    pub const BACKWARDS: &str = "E493: Backwards range given";
    pub const ARGREQ: &str = "E471: Argument required";
    pub const TRAILING: &str = "E488: Trailing characters";
    pub const INVARG: &str = "E474: Invalid argument";
    pub const INVCMD: &str = "E476: Invalid command";
    pub const POSCOUNT: &str = "E939: Positive count required";
    pub const SANDBOX: &str = "E48: Not allowed in sandbox";
    pub const MODIFIABLE: &str = "E21: Cannot make changes, 'modifiable' is off";
    pub const USE_W: &str = "E494: Use w or w>>";
    pub const LNUM_RANGE: &str = "E1247: Line number out of range";
    pub const BACKSLASH: &str = "E10: \\ should be followed by /, ? or &";
    pub const NOPREVRE: &str = "E35: No previous regular expression";
    pub const PATNOTF: &str = "E486: Pattern not found";
    pub const SEARCH_BOTTOM: &str = "E385: Search hit BOTTOM without match for";
    pub const SEARCH_TOP: &str = "E384: Search hit TOP without match for";
    pub const INVPAT: &str = "E383: Invalid search string";
    pub const MARKNOTSET: &str = "E20: Mark not set";
    pub const UNKNOWN_MARK: &str = "E78: Unknown mark";
    pub const INVMARK: &str = "E191: Argument must be a letter or forward/backward quote";
    pub const EMPTYBUF: &str = "E749: Empty buffer";
    pub const NOTHING_IN_REG: &str = "E353: Nothing in register";
    pub const MOVE_INTO: &str = "E134: Cannot move a range of lines into itself";
    pub const TOO_RECURSIVE: &str = "E169: Command too recursive";
    pub const FUNCDEPTH: &str = "E132: Function call depth is higher than 'maxfuncdepth'";
    pub const NOERRORS: &str = "E42: No Errors";
    pub const NOMATCH: &str = "E480: No match";
    pub const NOBUF: &str = "E86: Buffer does not exist";
    pub const NOMOREBUF: &str = "E85: There is no listed buffer";
    pub const NOALT: &str = "E23: No alternate file";
    pub const NOFILENAME: &str = "E32: No file name";
    pub const NOWRITE: &str = "E37: No write since last change (add ! to override)";
    pub const NOSHELL: &str = "E34: No previous command";
    pub const ARGLAST: &str = "E165: Cannot go beyond last file";
    pub const ARGFIRST: &str = "E164: Cannot go before first file";
    pub const LASTWIN: &str = "E444: Cannot close last window";
    pub const LASTTAB: &str = "E784: Cannot close last tab page";
    pub const NOTREAD: &str = "E484: Can't open file";
    pub const FILE_EXISTS: &str = "E13: File exists (add ! to override)";
    pub const READONLY: &str = "E45: 'readonly' option is set (add ! to override)";
    pub const WRITE_DISABLED: &str = "E142: File not written: Writing is disabled by 'write' option";
    pub const CANT_WRITE: &str = "E212: Can't open file for writing";
    pub const NONAME_BUF: &str = "E141: No file name for buffer";
    pub const NOWRITE_BUF: &str = "E162: No write since last change for buffer";
    pub const MULTI_MATCH: &str = "E93: More than one match for";
    pub const NO_MATCHING_BUF: &str = "E94: No matching buffer for";
    pub const NO_BUF_DELETED: &str = "E516: No buffers were deleted";
    pub const ONLY_ONE_FILE: &str = "E163: There is only one file to edit";
    pub const NO_MORE_ITEMS: &str = "E553: No more items";
    pub const OTHER_WIN_CHANGED: &str = "E445: Other window contains changes";
    pub const GLOBAL_RANGE: &str = "E147: Cannot do :global recursive with a range";
    pub const GLOBAL_NOPAT: &str = "E148: Regular expression missing from :global";
    pub const REGEX_LETTERS: &str =
        "E146: Regular expressions can't be delimited by letters";
    pub const NOPREVSUB: &str = "E35: No previous regular expression";
    pub const SUB_TRAILING: &str = "E488: Trailing characters";

    pub const IF_NESTING: &str = "E579: :if nesting too deep";
    pub const WHILE_NESTING: &str = "E585: :while/:for nesting too deep";
    pub const TRY_NESTING: &str = "E601: :try nesting too deep";
    pub const ENDIF_WITHOUT_IF: &str = "E580: :endif without :if";
    pub const ELSE_WITHOUT_IF: &str = "E581: :else without :if";
    pub const ELSEIF_WITHOUT_IF: &str = "E582: :elseif without :if";
    pub const MULTIPLE_ELSE: &str = "E583: Multiple :else";
    pub const ELSEIF_AFTER_ELSE: &str = "E584: :elseif after :else";
    pub const CONT_WITHOUT_LOOP: &str = "E586: :continue without :while or :for";
    pub const BREAK_WITHOUT_LOOP: &str = "E587: :break without :while or :for";
    pub const ENDWHILE_WITHOUT_WHILE: &str = "E588: :endwhile without :while";
    pub const ENDFOR_WITHOUT_FOR: &str = "E588: :endfor without :for";
    pub const ENDFOR_WITH_WHILE: &str = "E732: Using :endfor with :while";
    pub const ENDWHILE_WITH_FOR: &str = "E733: Using :endwhile with :for";
    pub const CATCH_WITHOUT_TRY: &str = "E603: :catch without :try";
    pub const CATCH_AFTER_FINALLY: &str = "E604: :catch after :finally";
    pub const FINALLY_WITHOUT_TRY: &str = "E606: :finally without :try";
    pub const MULTIPLE_FINALLY: &str = "E607: Multiple :finally";
    pub const ENDTRY_WITHOUT_TRY: &str = "E602: :endtry without :try";
    pub const MISSING_ENDTRY: &str = "E600: Missing :endtry";
    pub const MISSING_ENDWHILE: &str = "E170: Missing :endwhile";
    pub const MISSING_ENDFOR: &str = "E170: Missing :endfor";
    pub const MISSING_ENDIF: &str = "E171: Missing :endif";
    pub const VIM_PREFIX: &str = "E608: Cannot :throw exceptions with 'Vim' prefix";
    pub const NOT_CAUGHT: &str = "E605: Exception not caught";
    pub const RETURN_OUTSIDE: &str = "E133: :return not inside a function";
    pub const FINISH_OUTSIDE: &str = "E168: :finish used outside of a sourced file";
    pub const ENDFUNCTION_OUTSIDE: &str = "E193: :endfunction not inside a function";
    pub const MISSING_ENDFUNCTION: &str = "E126: Missing :endfunction";

    pub const UNKNOWN_OPTION: &str = "E518: Unknown option";
    pub const NOT_SUPPORTED: &str = "E519: Option not supported";
    pub const NOT_IN_MODELINE: &str = "E520: Not allowed in a modeline";
    pub const NUMBER_REQUIRED: &str = "E521: Number required after =";
    pub const NOT_FOUND_TERMCAP: &str = "E522: Not found in termcap";
    pub const INVALID_ARGUMENT: &str = "E474: Invalid argument";
    pub const NOT_ALLOWED_HERE: &str = "E12: Command not allowed from exrc/vimrc in current dir or tag search";
    pub const NOT_ALLOWED: &str = "E523: Not allowed here";
    pub const MLE_OFF: &str = "E992: Not allowed in a modeline when 'modelineexpr' is off";
    pub const KEYCODE_NOT_SET: &str = "E846: Key code not set";
    pub const ZERO_NOT_ALLOWED: &str = "E487: Argument must be positive";

    pub const INVEXPR: &str = "E15: Invalid expression";
    pub const INVEXPR_STR: &str = "E15: Invalid expression";
    pub const UNDEFVAR: &str = "E121: Undefined variable";
    pub const UNKNOWN_FUNC: &str = "E117: Unknown function";
    pub const FUNC_EXISTS: &str = "E122: Function already exists, add ! to replace it";
    pub const FUNC_UNDEF: &str = "E130: Unknown function";
    pub const TOO_MANY_ARGS: &str = "E118: Too many arguments for function";
    pub const NOT_ENOUGH_ARGS: &str = "E119: Not enough arguments for function";
    pub const LIST_REQUIRED: &str = "E714: List required";
    pub const LIST_INDEX: &str = "E684: List index out of range";
    pub const NUMBER_AS_STRING: &str = "E730: Using a List as a String";
    pub const DIVZERO: &str = "E1154: Divide by zero";
    pub const CANNOT_UNLET: &str = "E108: No such variable";
    pub const FUNC_NAME_CAPITAL: &str = "E128: Function name must start with a capital or \"s:\"";
    pub const FUNC_NAME_REQUIRED: &str = "E129: Function name required";
    pub const FUNC_UNDEFINED: &str = "E123: Undefined function";
    pub const FUNC_ILLEGAL_ARG: &str = "E125: Illegal argument";
    pub const FUNC_DUP_ARG: &str = "E853: Duplicate argument name";
    pub const FUNC_IN_USE: &str = "E127: Cannot redefine function";
    pub const FUNC_DELETE_IN_USE: &str = "E131: Cannot delete function";

    pub const CMD_EXISTS: &str = "E174: Command already exists: add ! to replace it";
    pub const NO_SUCH_CMD: &str = "E184: No such user-defined command";
    pub const INVALID_NARGS: &str = "E176: Invalid number of arguments";
    pub const CMD_UPPERCASE: &str = "E183: User defined commands must start with an uppercase letter";
    pub const INVALID_ATTR: &str = "E181: Invalid attribute";
    pub const INVALID_ADDR_TYPE: &str = "E180: Invalid address type value";
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn exit_codes() {
        let ok: Result<()> = Ok(());
        assert_eq!(ok.get_exit_code(), 0);
        let quit: Result<()> = Err(Error::Exit(3));
        assert_eq!(quit.get_exit_code(), 3);
        let other: Result<()> = Err(invalid(e::INVRANGE));
        assert_eq!(other.get_exit_code(), 1);
    }

    #[test]
    fn messages_keep_vim_numbers() {
        assert_eq!(invalid(e::NORANGE).message(), "E481: No range allowed");
        assert!(Error::Exit(1).is_control());
        assert!(!parse_err("x").is_control());
    }
}
