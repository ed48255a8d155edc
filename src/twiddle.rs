//! Twiddle factors for the real-FFT post-processing step.
//!
//! A [`TwiddleTable`] for length `N` holds `exp(-2πi·k/N)` for every
//! `k in 0..N`. Tables are built once per length and shared read-only with
//! every launch through an [`Arc`]; [`TwiddleCache`] keeps the most recently
//! used ones around.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::fft::{check_len, FftError};
use crate::num::{Complex, Float};

/// Maximum number of tables retained by a [`TwiddleCache`].
pub const MAX_CACHE_ENTRIES: usize = 64;

const NEG_TWO_PI: f64 = -core::f64::consts::TAU;

/// Rotation factor `exp(-2πi·index/n)`, evaluated in `f64`.
#[inline]
pub fn compute_twiddle<T: Float>(index: usize, n: usize) -> Complex<T> {
    let angle = NEG_TWO_PI * index as f64 / n as f64;
    let (sin, cos) = angle.sin_cos();
    Complex::new(T::from_f64(cos), T::from_f64(sin))
}

#[derive(Clone, Debug, PartialEq)]
pub struct TwiddleTable<T: Float> {
    n: usize,
    factors: Vec<Complex<T>>,
}

impl<T: Float> TwiddleTable<T> {
    /// Build the table for a real transform of length `n`.
    ///
    /// Each entry is computed directly from its angle rather than by
    /// repeated rotation, so entry `k` carries no error from entries before it.
    pub fn generate(n: usize) -> Result<Self, FftError> {
        check_len(n)?;
        let factors = (0..n).map(|k| compute_twiddle(k, n)).collect();
        Ok(Self { n, factors })
    }

    /// Transform length the table was built for.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, k: usize) -> Complex<T> {
        self.factors[k]
    }

    pub fn as_slice(&self) -> &[Complex<T>] {
        &self.factors
    }
}

/// Twiddle tables keyed by transform length, evicted least recently used.
pub struct TwiddleCache<T: Float> {
    cache: HashMap<usize, Arc<TwiddleTable<T>>>,
    order: VecDeque<usize>,
}

impl<T: Float> Default for TwiddleCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> TwiddleCache<T> {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Retrieve or build the table for length `n`.
    pub fn get(&mut self, n: usize) -> Result<Arc<TwiddleTable<T>>, FftError> {
        let table = match self.cache.get(&n) {
            Some(table) => Arc::clone(table),
            None => {
                let table = Arc::new(TwiddleTable::generate(n)?);
                if self.cache.len() == MAX_CACHE_ENTRIES {
                    if let Some(old) = self.order.pop_front() {
                        self.cache.remove(&old);
                    }
                }
                self.cache.insert(n, Arc::clone(&table));
                table
            }
        };
        self.order.retain(|&x| x != n);
        self.order.push_back(n);
        Ok(table)
    }

    /// Number of tables currently cached.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::{Complex32, Complex64};

    #[test]
    fn first_entry_is_exactly_one() {
        for n in (4..=64).step_by(2) {
            let t = TwiddleTable::<f32>::generate(n).unwrap();
            assert_eq!(t.get(0), Complex32::new(1.0, 0.0));
            assert_eq!(t.len(), n);
            assert_eq!(t.as_slice().len(), n);
        }
    }

    #[test]
    fn entries_lie_on_unit_circle() {
        let t = TwiddleTable::<f64>::generate(30).unwrap();
        for w in t.as_slice() {
            assert!((w.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn quarter_turn_points() {
        let t = TwiddleTable::<f64>::generate(8).unwrap();
        let q = t.get(2);
        assert!(q.re.abs() < 1e-15);
        assert!((q.im + 1.0).abs() < 1e-15);
        let h = t.get(4);
        assert!((h.re + 1.0).abs() < 1e-15);
        assert_eq!(t.get(1), compute_twiddle::<f64>(1, 8));
        let expected = Complex64::expi(-core::f64::consts::PI / 4.0);
        assert!((t.get(1).re - expected.re).abs() < 1e-15);
    }

    #[test]
    fn generate_is_idempotent() {
        let a = TwiddleTable::<f32>::generate(14).unwrap();
        let b = TwiddleTable::<f32>::generate(14).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_invalid_lengths() {
        assert_eq!(
            TwiddleTable::<f32>::generate(7).unwrap_err(),
            FftError::InvalidLength(7)
        );
        assert!(TwiddleTable::<f32>::generate(2).is_err());
        assert!(TwiddleTable::<f32>::generate(0).is_err());
    }

    #[test]
    fn cache_shares_tables() {
        let mut cache = TwiddleCache::<f32>::new();
        let a = cache.get(16).unwrap();
        let b = cache.get(16).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_evicts_least_recent() {
        let mut cache = TwiddleCache::<f32>::new();
        let first = cache.get(4).unwrap();
        for i in 0..(MAX_CACHE_ENTRIES + 5) {
            cache.get(6 + 2 * i).unwrap();
        }
        assert!(cache.len() <= MAX_CACHE_ENTRIES);
        let again = cache.get(4).unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(*first, *again);
    }
}
