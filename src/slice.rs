//! Python-style slicing.
//!
//! A [`Slice`] has up to three optional integers, `start:stop:step`, with the
//! usual Python meaning: negative bounds count from the end, out-of-range
//! bounds are clamped, and a negative step walks backwards.
//!
//! ```
//! use remespath::slice::Slice;
//!
//! let items = [0, 1, 2, 3, 4, 5];
//! let rev = Slice::new(None, None, Some(-2));
//! assert_eq!(rev.apply(&items).unwrap(), vec![&5, &3, &1]);
//! assert_eq!(Slice::new(Some(-2), None, None).apply(&items).unwrap(), vec![&4, &5]);
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SliceError {
    /// `x[::0]`
    ZeroStep,
}

impl fmt::Display for SliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceError::ZeroStep => write!(f, "slice step cannot be zero"),
        }
    }
}

impl std::error::Error for SliceError {}

/// Resolve a possibly negative index against a sequence length.
/// Returns `None` when the index is out of range either way.
pub fn wrap_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { index + len } else { index };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Slice { start, stop, step }
    }

    /// Positions selected by this slice in a sequence of length `len`, in order.
    pub fn indices(&self, len: usize) -> Result<Vec<usize>, SliceError> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(SliceError::ZeroStep);
        }
        let len = len as i64;
        let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };

        let clamp = |bound: i64| -> i64 {
            if bound < 0 {
                (bound + len).max(lower)
            } else {
                bound.min(upper)
            }
        };
        let start = self.start.map_or(if step > 0 { lower } else { upper }, clamp);
        let stop = self.stop.map_or(if step > 0 { upper } else { lower }, clamp);

        let mut out = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            out.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
        Ok(out)
    }

    pub fn apply<'a, T>(&self, items: &'a [T]) -> Result<Vec<&'a T>, SliceError> {
        Ok(self.indices(items.len())?.into_iter().map(|i| &items[i]).collect())
    }

    /// Slice a string by characters (not bytes).
    pub fn slice_str(&self, s: &str) -> Result<String, SliceError> {
        let chars: Vec<char> = s.chars().collect();
        Ok(self.apply(&chars)?.into_iter().collect())
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |x: Option<i64>| x.map(|n| n.to_string()).unwrap_or_default();
        write!(f, "{}:{}", part(self.start), part(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{}", step)?;
        }
        Ok(())
    }
}
