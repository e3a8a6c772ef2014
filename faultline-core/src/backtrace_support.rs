//! Capture and local cleanup of native stacks.
//!
//! Capture is kept cheap: [`current_raw_stack`] walks the stack without
//! resolving symbols, which makes it safe to call from a panic hook. The
//! expensive part, symbol resolution and cleanup, happens later in
//! [`resolve_stack`] on the conversion path.

use std::borrow::Cow;
use std::thread;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::protocol::{Addr, FrameRecord, RawFrame};

static HASH_FUNC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        ^(.*)::h[a-f0-9]{16}$
    "#,
    )
    .unwrap()
});

static CRATE_HASH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b(\[[a-f0-9]{16}\])
    ",
    )
    .unwrap()
});

// Frames belonging to the panic machinery or to the agent itself. These
// carry no information about the crash site and sit in one contiguous block
// at the inner end of every captured stack.
const INTERNAL_FRAMES: &[&str] = &[
    "backtrace::",
    "std::panicking::",
    "core::panicking::",
    "std::panic::",
    "std::sys::backtrace::",
    "rust_begin_unwind",
    "__rust_",
    "___rust_",
    "faultline_core::",
    "faultline::",
];

/// Strips the compiler-generated hash suffixes from a symbol.
pub(crate) fn strip_symbol(s: &str) -> Cow<'_, str> {
    let stripped_trailing_hash = HASH_FUNC_RE
        .captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(s);

    CRATE_HASH_RE.replace_all(stripped_trailing_hash, "")
}

/// Checks whether the function name starts with the given pattern.
///
/// In trait implementations, the original type name is wrapped in "_< ... >"
/// and colons are replaced with dots. This function accounts for differences
/// while checking.
pub(crate) fn function_starts_with(mut func_name: &str, mut pattern: &str) -> bool {
    if pattern.starts_with('<') {
        while pattern.starts_with('<') {
            pattern = &pattern[1..];

            if func_name.starts_with('<') {
                func_name = &func_name[1..];
            } else if func_name.starts_with("_<") {
                func_name = &func_name[2..];
            } else {
                return false;
            }
        }
    } else {
        func_name = func_name.trim_start_matches('<').trim_start_matches("_<");
    }

    if !func_name.is_char_boundary(pattern.len()) {
        return false;
    }

    func_name
        .chars()
        .zip(pattern.chars())
        .all(|(f, p)| f == p || f == '.' && p == ':')
}

/// Walks the current stack without resolving symbols.
pub(crate) fn current_raw_stack() -> Vec<RawFrame> {
    backtrace::Backtrace::new_unresolved()
        .frames()
        .iter()
        .map(|frame| RawFrame {
            instruction_addr: Some(Addr(frame.ip() as usize as u64)),
            symbol: None,
        })
        .collect()
}

/// Resolves raw frames into structured frame records.
///
/// Frames that already carry a symbol string keep it and only get local
/// cleanup. Address-only frames are resolved in-process; whatever cannot be
/// resolved keeps its raw address for server side symbolication. The result
/// is ordered oldest call first and trimmed of panic machinery and agent
/// internals.
pub(crate) fn resolve_stack(raw: &[RawFrame]) -> Vec<FrameRecord> {
    let mut frames: Vec<FrameRecord> = raw.iter().map(resolve_frame).collect();
    frames.reverse();
    trim_agent_frames(&mut frames);
    frames
}

fn resolve_frame(raw: &RawFrame) -> FrameRecord {
    if let Some(symbol) = &raw.symbol {
        let function = strip_symbol(symbol).into_owned();
        return FrameRecord {
            instruction_addr: raw.instruction_addr,
            symbol: if *symbol != function {
                Some(symbol.clone())
            } else {
                None
            },
            function: Some(function),
            filename: None,
            lineno: None,
        };
    }

    let mut record = FrameRecord {
        instruction_addr: raw.instruction_addr,
        ..Default::default()
    };

    if let Some(addr) = raw.instruction_addr {
        backtrace::resolve(addr.0 as usize as *mut std::ffi::c_void, |sym| {
            if record.function.is_none() {
                if let Some(name) = sym.name() {
                    let symbol = name.to_string();
                    let function = strip_symbol(&symbol).into_owned();
                    record.symbol = if symbol != function { Some(symbol) } else { None };
                    record.function = Some(function);
                }
                record.filename = sym
                    .filename()
                    .map(|path| path.to_string_lossy().into_owned());
                record.lineno = sym.lineno();
            }
        });
    }

    record
}

/// Cuts panic machinery and agent internals off a stack ordered oldest call
/// first.
pub(crate) fn trim_agent_frames(frames: &mut Vec<FrameRecord>) {
    let junk = frames
        .iter()
        .rev()
        .take_while(|frame| match frame.function {
            Some(ref func) => INTERNAL_FRAMES
                .iter()
                .any(|pattern| function_starts_with(func, pattern)),
            None => false,
        })
        .count();
    frames.truncate(frames.len() - junk);
}

/// Identity of the current thread as an id string plus an optional name.
// NOTE: `ThreadId::as_u64` is nightly only, so the id is parsed out of the
// Debug form. See https://github.com/rust-lang/rust/issues/67939
pub(crate) fn thread_label() -> (String, Option<String>) {
    let current = thread::current();
    let id = format!("{:?}", current.id());
    let id = id
        .trim_start_matches("ThreadId(")
        .trim_end_matches(')')
        .to_owned();
    (id, current.name().map(str::to_owned))
}
