//! Typed binding of placeholder values from a matched path.

use std::fmt;

use thiserror::Error;

use crate::router::pattern::{Pattern, Segment, split_segments};

/// Errors raised by [`Baton::scan`](super::Baton::scan).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("no route has been matched for this request")]
    NoRoute,

    #[error("path has {path} segments but the route pattern has {pattern}")]
    SegmentCountMismatch { path: usize, pattern: usize },

    #[error("path has {captured} parameters but {expected} destinations were supplied")]
    ParameterCountMismatch { captured: usize, expected: usize },

    #[error("path parameter {index} could not be converted to {target}")]
    Coercion { index: usize, target: TargetKind },
}

/// The type a [`ScanTarget`] coerces into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Str,
    U32,
    U64,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Str => "a string",
            Self::U32 => "an unsigned 32-bit integer",
            Self::U64 => "an unsigned 64-bit integer",
        })
    }
}

/// A typed destination for one captured path parameter.
///
/// Built from a mutable reference with `.into()`:
///
/// ```
/// use baton::context::ScanTarget;
///
/// let mut id = 0_u64;
/// let mut name = String::new();
/// let targets: [ScanTarget<'_>; 2] = [(&mut id).into(), (&mut name).into()];
/// assert_eq!(targets.len(), 2);
/// ```
#[derive(Debug)]
pub enum ScanTarget<'a> {
    Str(&'a mut String),
    U32(&'a mut u32),
    U64(&'a mut u64),
}

impl ScanTarget<'_> {
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Str(_) => TargetKind::Str,
            Self::U32(_) => TargetKind::U32,
            Self::U64(_) => TargetKind::U64,
        }
    }

    // `index` is 1-based and only used for the error.
    fn assign(&mut self, index: usize, raw: &str) -> Result<(), ScanError> {
        let target = self.kind();
        let coercion = || ScanError::Coercion { index, target };
        match self {
            Self::Str(dst) => {
                dst.clear();
                dst.push_str(raw);
            }
            Self::U32(dst) => **dst = raw.parse().map_err(|_| coercion())?,
            Self::U64(dst) => **dst = raw.parse().map_err(|_| coercion())?,
        }
        Ok(())
    }
}

impl<'a> From<&'a mut String> for ScanTarget<'a> {
    fn from(dst: &'a mut String) -> Self {
        Self::Str(dst)
    }
}

impl<'a> From<&'a mut u32> for ScanTarget<'a> {
    fn from(dst: &'a mut u32) -> Self {
        Self::U32(dst)
    }
}

impl<'a> From<&'a mut u64> for ScanTarget<'a> {
    fn from(dst: &'a mut u64) -> Self {
        Self::U64(dst)
    }
}

/// Binds the placeholder segments of `path` into `targets`, left to right.
///
/// Stops at the first failure; destinations before it may already hold their
/// new value.
pub(crate) fn bind(
    pattern: &Pattern,
    path: &str,
    targets: &mut [ScanTarget<'_>],
) -> Result<(), ScanError> {
    let parts: Vec<&str> = split_segments(path).collect();
    let segments = pattern.segments();

    if parts.len() != segments.len() {
        return Err(ScanError::SegmentCountMismatch {
            path: parts.len(),
            pattern: segments.len(),
        });
    }

    let captured: Vec<&str> = segments
        .iter()
        .zip(&parts)
        .filter(|(segment, _)| matches!(segment, Segment::Placeholder(_)))
        .map(|(_, part)| *part)
        .collect();

    if captured.len() != targets.len() {
        return Err(ScanError::ParameterCountMismatch {
            captured: captured.len(),
            expected: targets.len(),
        });
    }

    for (i, (target, raw)) in targets.iter_mut().zip(captured).enumerate() {
        // `str::parse` would also take a leading `+`.
        let numeric = !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit());
        if !numeric && target.kind() != TargetKind::Str {
            return Err(ScanError::Coercion {
                index: i + 1,
                target: target.kind(),
            });
        }
        target.assign(i + 1, raw)?;
    }

    Ok(())
}
