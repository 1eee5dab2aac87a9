//! Data filtering and smoothing.

pub mod ema;

/// A stateless filter for values of type `V`.
///
/// The filter itself only holds its parameters; the accumulated history lives in a separate
/// [`Filter::State`] value, so one filter can be shared by many independent streams.
pub trait Filter<V> {
    /// Per-stream filter state.
    type State: Default;

    /// Adds `value` to the stream tracked by `state` and returns the filtered value.
    fn filter(&self, state: &mut Self::State, value: V) -> V;
}
