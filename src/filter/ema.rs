//! Exponential Moving Average.

use super::Filter;

/// An Exponential Moving Average (EMA) filter.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
}

impl Ema {
    /// Creates a new Exponential Moving Average filter.
    ///
    /// `alpha` defines how quickly the weight of older values decays. Values closer to 1.0 favor
    /// recent values.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is not in range `0.0..=1.0`.
    pub fn new(alpha: f32) -> Self {
        assert!((0.0..=1.0).contains(&alpha), "invalid EMA alpha {alpha}");
        Self { alpha }
    }
}

/// Filter state for [`Ema`] filters.
#[derive(Debug, Default, Clone)]
pub struct EmaState {
    last: Option<f32>,
}

impl Filter<f32> for Ema {
    type State = EmaState;

    fn filter(&self, state: &mut Self::State, value: f32) -> f32 {
        let avg = match state.last {
            Some(last) => self.alpha * value + (1.0 - self.alpha) * last,
            None => value,
        };
        state.last = Some(avg);
        avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema() {
        let ema = Ema::new(0.5);
        let mut state = EmaState::default();
        assert_eq!(ema.filter(&mut state, 1.0), 1.0);
        assert_eq!(ema.filter(&mut state, 2.0), 1.5);
        assert_eq!(ema.filter(&mut state, 2.0), 1.75);
    }

    #[test]
    fn independent_states() {
        let ema = Ema::new(0.5);
        let mut a = EmaState::default();
        let mut b = EmaState::default();
        ema.filter(&mut a, 10.0);
        assert_eq!(ema.filter(&mut b, 2.0), 2.0);
        assert_eq!(ema.filter(&mut a, 0.0), 5.0);
    }

    #[test]
    #[should_panic]
    fn rejects_invalid_alpha() {
        Ema::new(1.5);
    }
}
