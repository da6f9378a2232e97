//! Self-diagnostics for the tracing core.
//!
//! These macros report the documented misuse hazards (trace-id reuse, double
//! finish, out-of-order finish, context-stack misuse) and housekeeping events
//! (eviction) without ever raising into the instrumented code. With the
//! `internal-logs` feature enabled they emit `tracing` events targeted at
//! this crate's name; without it they compile to nothing.

macro_rules! internal_debug {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            ::tracing::debug!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name $(, $key = $value)*);
        }

        #[cfg(not(feature = "internal-logs"))]
        {
            let _ = ($name $(, &$value)*);
        }
    };
}

macro_rules! internal_warn {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            ::tracing::warn!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name $(, $key = $value)*);
        }

        #[cfg(not(feature = "internal-logs"))]
        {
            let _ = ($name $(, &$value)*);
        }
    };
}

pub(crate) use internal_debug;
pub(crate) use internal_warn;
