//! Bounded call-stack capture and ancestor trimming.
//!
//! A [`Tracer`] records up to [`MAX_STACK_DEPTH`] raw instruction
//! addresses at node construction, innermost frame first, and is immutable
//! afterwards. Before rendering, a trace is trimmed against the enclosing
//! node's trace: the longest common suffix of frame addresses (the shared
//! outer call path) is dropped, and the remaining frames keep their
//! original depth index. Symbol resolution happens lazily, only for the
//! frames that survive trimming.

use std::ffi::c_void;

use serde::Serialize;

/// Upper bound on captured frames per trace.
pub const MAX_STACK_DEPTH: usize = 64;

/// An immutable call-stack snapshot of raw instruction addresses.
#[derive(Debug, Clone, Default)]
pub struct Tracer {
    frames: Vec<usize>,
}

/// One rendered stack frame: a depth-labeled symbol and its source line.
#[derive(Debug, Clone, Serialize)]
pub struct TraceInfoItem {
    /// `"[<depth>] <symbol>"`, depth counted from the outermost frame.
    pub func: String,
    /// `"<file>:<line>"`, or the raw address when unresolvable.
    pub line: String,
}

impl Tracer {
    /// Captures the current call stack, skipping `skip` frames above this
    /// function so the first recorded frame is the annotation call site.
    pub(crate) fn capture(skip: usize) -> Tracer {
        let mut frames = Vec::with_capacity(MAX_STACK_DEPTH);
        // The first frame observed is this function itself.
        let mut to_skip = skip + 1;
        backtrace::trace(|frame| {
            if to_skip > 0 {
                to_skip -= 1;
                return true;
            }
            frames.push(frame.ip() as usize);
            frames.len() < MAX_STACK_DEPTH
        });
        Tracer { frames }
    }

    /// Builds a tracer from raw addresses, innermost first.
    pub(crate) fn from_frames(frames: Vec<usize>) -> Tracer {
        Tracer { frames }
    }

    /// Raw instruction addresses, innermost frame first.
    pub fn frames(&self) -> &[usize] {
        &self.frames
    }

    /// Length of the longest common suffix of frame addresses shared with
    /// `parent`: the outer frames both traces walked through.
    fn shared_suffix(&self, parent: &Tracer) -> usize {
        self.frames
            .iter()
            .rev()
            .zip(parent.frames.iter().rev())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Resolves this trace into rendered frames, trimming any suffix
    /// shared with `parent`. Frames are emitted innermost first; each
    /// keeps its depth index in the untrimmed stack (innermost frame is
    /// `len - 1`, counting down to the number of trimmed frames).
    pub(crate) fn info_stack(&self, parent: Option<&Tracer>) -> Vec<TraceInfoItem> {
        let same = parent.map_or(0, |p| self.shared_suffix(p));
        let total = self.frames.len();
        let mut items = Vec::with_capacity(total - same);
        for (i, &ip) in self.frames[..total - same].iter().enumerate() {
            let (func, line) = symbolize(ip);
            items.push(TraceInfoItem {
                func: format!("[{}] {}", total - 1 - i, func),
                line,
            });
        }
        items
    }
}

/// Resolves one instruction address to `(symbol, file:line)`, falling
/// back to the hex address for either half when resolution fails.
fn symbolize(ip: usize) -> (String, String) {
    let mut func = None;
    let mut line = None;
    backtrace::resolve(ip as *mut c_void, |symbol| {
        if func.is_none() {
            if let Some(name) = symbol.name() {
                func = Some(name.to_string());
            }
            if let (Some(file), Some(no)) = (symbol.filename(), symbol.lineno()) {
                line = Some(format!("{}:{}", file.display(), no));
            }
        }
    });
    (
        func.unwrap_or_else(|| format!("{:#x}", ip)),
        line.unwrap_or_else(|| format!("{:#x}", ip)),
    )
}
