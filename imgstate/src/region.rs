use crate::range::SubresourceRange;
use std::fmt;

/// State of a subresource before the first transition observed during the capture.
///
/// `Untransitioned` means no transition touching the subresource has been seen yet, so its
/// prior state is unknown. It is replaced exactly once, by the first transition's old state.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrevState<S> {
    Untransitioned,
    Known(S),
}

impl<S: Copy> PrevState<S> {
    pub fn is_untransitioned(&self) -> bool {
        matches!(self, PrevState::Untransitioned)
    }

    pub fn known(&self) -> Option<S> {
        match *self {
            PrevState::Known(state) => Some(state),
            PrevState::Untransitioned => None,
        }
    }

    /// Returns the known state, or `fallback` if untransitioned.
    pub fn unwrap_or(&self, fallback: S) -> S {
        self.known().unwrap_or(fallback)
    }
}

impl<S> From<S> for PrevState<S> {
    fn from(state: S) -> Self {
        PrevState::Known(state)
    }
}

impl<S: fmt::Debug> fmt::Debug for PrevState<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrevState::Untransitioned => f.write_str("UNTRANSITIONED"),
            PrevState::Known(state) => state.fmt(f),
        }
    }
}

/// One entry of a ledger: the state history of a subresource range.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct ImageRegionState<S> {
    pub range: SubresourceRange,
    /// State before the first transition recorded for this range.
    pub old: PrevState<S>,
    /// State after the last transition recorded for this range.
    pub new: S,
}

impl<S: Copy + Eq> ImageRegionState<S> {
    pub fn new(range: SubresourceRange, old: impl Into<PrevState<S>>, new: S) -> ImageRegionState<S> {
        ImageRegionState {
            range,
            old: old.into(),
            new,
        }
    }

    /// A transition that leaves the range in the state it started in.
    pub fn is_noop(&self) -> bool {
        self.old == PrevState::Known(self.new)
    }

    /// Folds a later transition into this entry.
    ///
    /// The prior state is first-write-wins: it is only taken from `old` while this entry is
    /// still untransitioned. The current state always becomes `new`.
    pub fn advance(&mut self, old: PrevState<S>, new: S) {
        if self.old.is_untransitioned() {
            self.old = old;
        }
        self.new = new;
    }
}

impl<S: fmt::Debug> fmt::Debug for ImageRegionState<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:?}] {:?} -> {:?}", self.range, self.old, self.new)
    }
}
