//! Stack traces for diagnostic packets.

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::panic;
use std::sync::Once;

/// Frames dropped from the top of a trace taken inside the panic hook
/// (the backtrace machinery and the hook itself).
const PANIC_HOOK_SKIP: usize = 3;

thread_local! {
    static PANIC_TRACE: RefCell<Option<Stacktrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// A rendered stack trace, one entry per frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stacktrace {
    frames: Vec<String>,
}

impl Stacktrace {
    /// Captures the current stack, dropping the first `skip` frames.
    pub fn capture(skip: usize) -> Self {
        Self::parse(&Backtrace::force_capture().to_string(), skip)
    }

    /// Parses the `Display` output of a [`Backtrace`].
    pub fn parse(rendered: &str, skip: usize) -> Self {
        let mut frames: Vec<String> = Vec::new();

        for line in rendered.lines() {
            let trimmed = line.trim_start();
            let is_frame_start = trimmed
                .split_once(':')
                .is_some_and(|(index, _)| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()));

            if is_frame_start {
                frames.push(trimmed.to_string());
            } else if let Some(frame) = frames.last_mut() {
                frame.push('\n');
                frame.push_str(line);
            }
        }

        Self {
            frames: frames.into_iter().skip(skip).collect(),
        }
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for Stacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            writeln!(f, "{frame}")?;
        }
        Ok(())
    }
}

/// Installs a process panic hook that remembers the panic-site trace for the
/// panicking thread. The previously installed hook still runs afterwards.
///
/// Safe to call repeatedly; only the first call installs anything.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Stacktrace::capture(PANIC_HOOK_SKIP);
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Takes the trace recorded by the most recent panic on this thread.
pub fn take_panic_trace() -> Option<Stacktrace> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}
