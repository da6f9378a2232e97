//! Ambient trace propagation.
//!
//! The `context` module maintains the "current trace" association: the
//! [`TraceContext`] that spans started without an explicit parent should
//! attach to. The association is scoped to the executing logical unit of
//! work — concurrently running threads or tasks never observe each other's
//! value — and is managed through RAII guards rather than a mutable global.
//!
//! # Managing the active trace
//!
//! A trace becomes active on the current thread via [`TraceContext::attach`],
//! which returns a [`TraceScope`] guard. Dropping the guard restores whatever
//! was active before. [`TraceContext::current`] returns a snapshot of the
//! active value.
//!
//! ```
//! use tracekit::Tracer;
//! use tracekit::trace::TraceContext;
//!
//! let tracer = Tracer::new("orders");
//! let cx = tracer.start_trace("handle_request", None);
//!
//! assert!(TraceContext::current().is_none());
//! {
//!     let _scope = cx.attach();
//!     assert_eq!(
//!         TraceContext::current().map(|active| active.trace_id()),
//!         Some(cx.trace_id()),
//!     );
//! }
//! // Dropping the scope restores the previous (empty) state.
//! assert!(TraceContext::current().is_none());
//! ```
//!
//! # Crossing task boundaries
//!
//! Thread-local state does not follow a future that migrates between worker
//! threads. Wrap the future with [`FutureTraceExt::with_active_trace`] (or
//! [`FutureTraceExt::with_trace`]) so the captured trace is re-attached
//! around every poll — a spawned task inherits a snapshot of its parent's
//! value at spawn time and keeps it for its whole execution.

use crate::internal_logging::internal_warn;
use crate::trace::TraceContext;
use std::cell::RefCell;
use std::marker::PhantomData;


mod future_ext;

pub use future_ext::{FutureTraceExt, StreamTraceExt, WithTrace};

thread_local! {
    static ACTIVE_TRACE: RefCell<TraceStack> = RefCell::new(TraceStack::default());
}

impl TraceContext {
    /// Returns a snapshot of the trace active on the current thread, if any.
    pub fn current() -> Option<TraceContext> {
        Self::map_active(|cx| cx.cloned())
    }

    /// Applies a function to the active trace without cloning it.
    ///
    /// Note: attaching another trace while the active one is still borrowed
    /// inside `f` will panic.
    pub fn map_active<T>(f: impl FnOnce(Option<&TraceContext>) -> T) -> T {
        ACTIVE_TRACE.with(|stack| stack.borrow().map_active(f))
    }

    /// Makes this trace the active one on the current thread.
    ///
    /// Dropping the returned [`TraceScope`] restores the previously active
    /// value. Scopes nest; see the [module docs](crate::context) for an
    /// example.
    pub fn attach(&self) -> TraceScope {
        activate(Some(self.clone()))
    }
}

/// Replaces the active trace on this thread with the given value.
///
/// `activate(None)` shields the enclosed scope from any ambient trace, which
/// is how a logical unit of work is isolated from its surroundings:
///
/// ```
/// use tracekit::{context, Tracer};
/// use tracekit::trace::TraceContext;
///
/// let tracer = Tracer::new("orders");
/// let _outer = tracer.start_trace("outer", None).attach();
///
/// {
///     let _blank = context::activate(None);
///     // Spans started here begin a fresh trace instead of nesting.
///     assert!(TraceContext::current().is_none());
/// }
/// assert!(TraceContext::current().is_some());
/// ```
pub fn activate(trace: Option<TraceContext>) -> TraceScope {
    let pos = ACTIVE_TRACE.with(|stack| stack.borrow_mut().push(trace));

    TraceScope {
        pos,
        _marker: PhantomData,
    }
}

/// A guard that restores the previously active trace when dropped.
#[derive(Debug)]
pub struct TraceScope {
    // Position of the replaced value in the thread's stack, used to pop it.
    pos: u16,
    // Ensure this type is !Send as it relies on thread locals
    _marker: PhantomData<*const ()>,
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        if self.pos > TraceStack::BASE_POS && self.pos < TraceStack::MAX_POS {
            ACTIVE_TRACE.with(|stack| stack.borrow_mut().pop_pos(self.pos));
        }
    }
}

/// A stack of the trace values that have been attached to this thread.
///
/// Guards may be dropped out of declaration order; popping by position
/// tolerates that by clearing mid-stack entries and only restoring when the
/// top is popped. Positions handed out by `push` stay valid because
/// [`TraceScope`] cannot move to another thread.
struct TraceStack {
    /// The value active on this thread, kept out of the stack for fast reads.
    active: Option<TraceContext>,
    /// Previously attached values; `None` entries were popped out of order.
    stack: Vec<Option<Option<TraceContext>>>,
    // Ensure this type is !Send as it relies on thread locals
    _marker: PhantomData<*const ()>,
}

impl TraceStack {
    const BASE_POS: u16 = 0;
    const MAX_POS: u16 = u16::MAX;
    const INITIAL_CAPACITY: usize = 8;

    #[inline(always)]
    fn push(&mut self, trace: Option<TraceContext>) -> u16 {
        // Position 0 is reserved for the empty base state, so the first
        // pushed entry gets position 1.
        let next_pos = self.stack.len() + 1;
        if next_pos < TraceStack::MAX_POS.into() {
            let previous = std::mem::replace(&mut self.active, trace);
            self.stack.push(Some(previous));
            next_pos as u16
        } else {
            internal_warn!(
                name: "TraceScope.AttachFailed",
                message = "too many nested trace scopes; the active trace is unchanged"
            );
            TraceStack::MAX_POS
        }
    }

    #[inline(always)]
    fn pop_pos(&mut self, pos: u16) {
        let len: u16 = self.stack.len() as u16;
        if pos == len {
            // Drop any entries already popped out of order, then restore the
            // most recent remaining value.
            while let Some(None) = self.stack.last() {
                _ = self.stack.pop();
            }
            if let Some(Some(previous)) = self.stack.pop() {
                self.active = previous;
            }
        } else if pos < len {
            // Out of order pop: clear the entry, restore nothing yet.
            _ = self.stack[pos as usize].take();
        } else {
            internal_warn!(
                name: "TraceScope.PopOutOfBounds",
                position = pos,
                stack_length = len
            );
        }
    }

    #[inline(always)]
    fn map_active<T>(&self, f: impl FnOnce(Option<&TraceContext>) -> T) -> T {
        f(self.active.as_ref())
    }
}

impl Default for TraceStack {
    fn default() -> Self {
        TraceStack {
            active: None,
            stack: Vec::with_capacity(TraceStack::INITIAL_CAPACITY),
            _marker: PhantomData,
        }
    }
}
