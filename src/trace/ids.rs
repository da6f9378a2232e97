use rand::{rngs, Rng, SeedableRng};
use std::cell::RefCell;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// A 16-byte identifier naming one trace, shared by all of its spans.
///
/// Formats as 32 lowercase hex characters, the representation used in
/// exports and for correlation with caller-supplied identifiers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(u128);

impl TraceId {
    /// The invalid (all zero) trace id.
    pub const INVALID: TraceId = TraceId(0);

    /// Parses a trace id from its hex representation.
    pub fn from_hex(hex: &str) -> Result<Self, ParseIntError> {
        u128::from_str_radix(hex, 16).map(TraceId)
    }
}

impl From<u128> for TraceId {
    fn from(value: u128) -> Self {
        TraceId(value)
    }
}

impl FromStr for TraceId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TraceId::from_hex(s)
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({:032x})", self.0)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// An 8-byte identifier naming one span within a trace.
///
/// Formats as 16 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(u64);

impl SpanId {
    /// The invalid (all zero) span id.
    pub const INVALID: SpanId = SpanId(0);

    /// Parses a span id from its hex representation.
    pub fn from_hex(hex: &str) -> Result<Self, ParseIntError> {
        u64::from_str_radix(hex, 16).map(SpanId)
    }
}

impl From<u64> for SpanId {
    fn from(value: u64) -> Self {
        SpanId(value)
    }
}

impl FromStr for SpanId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpanId::from_hex(s)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({:016x})", self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Interface for generating trace and span ids.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Generate a new `TraceId`.
    fn new_trace_id(&self) -> TraceId;

    /// Generate a new `SpanId`.
    fn new_span_id(&self) -> SpanId;
}

/// Default [`IdGenerator`] implementation.
///
/// Generates trace and span ids from a per-thread random number generator.
#[derive(Clone, Debug, Default)]
pub struct RandomIdGenerator {
    _private: (),
}

impl IdGenerator for RandomIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        CURRENT_RNG.with(|rng| TraceId::from(rng.borrow_mut().random::<u128>()))
    }

    fn new_span_id(&self) -> SpanId {
        CURRENT_RNG.with(|rng| SpanId::from(rng.borrow_mut().random::<u64>()))
    }
}

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<rngs::SmallRng> = RefCell::new(rngs::SmallRng::from_os_rng());
}

#[cfg(any(test, feature = "testing"))]
pub use increment::IncrementIdGenerator;

#[cfg(any(test, feature = "testing"))]
mod increment {
    use super::{IdGenerator, SpanId, TraceId};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// [`IdGenerator`] implementation that increments a counter for each new
    /// id, producing predictable values for assertions.
    #[derive(Clone, Debug, Default)]
    pub struct IncrementIdGenerator(Arc<AtomicU64>);

    impl IncrementIdGenerator {
        /// Create a new `IncrementIdGenerator` starting at 1.
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl IdGenerator for IncrementIdGenerator {
        fn new_trace_id(&self) -> TraceId {
            TraceId::from(self.0.fetch_add(1, Ordering::SeqCst) as u128 + 1)
        }

        fn new_span_id(&self) -> SpanId {
            SpanId::from(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let trace_id = TraceId::from(0x4bf9_2f35_77b3_4da6_a3ce_929d_0e0e_4736u128);
        let hex = trace_id.to_string();
        assert_eq!(hex.len(), 32);
        assert_eq!(TraceId::from_hex(&hex).unwrap(), trace_id);

        let span_id = SpanId::from(0x00f0_67aa_0ba9_02b7u64);
        let hex = span_id.to_string();
        assert_eq!(hex, "00f067aa0ba902b7");
        assert_eq!(hex.parse::<SpanId>().unwrap(), span_id);
    }

    #[test]
    fn random_ids_are_distinct() {
        let generator = RandomIdGenerator::default();
        assert_ne!(generator.new_trace_id(), generator.new_trace_id());
        assert_ne!(generator.new_span_id(), generator.new_span_id());
    }

    #[test]
    fn increment_ids_are_predictable() {
        let generator = IncrementIdGenerator::new();
        assert_eq!(generator.new_trace_id(), TraceId::from(1u128));
        assert_eq!(generator.new_span_id(), SpanId::from(2u64));
        assert_eq!(generator.new_span_id(), SpanId::from(3u64));
    }
}
