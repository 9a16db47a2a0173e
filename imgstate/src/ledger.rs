//! Per-image subresource state ledger.
//!
//! A ledger is an ordered list of [`ImageRegionState`] entries. Every entry holds exactly one
//! aspect bit, entries of the same aspect never overlap, and entries are sorted by
//! [`SubresourceRange::sort_key`]. Images start with one entry per aspect covering the whole
//! image; entries are exploded into single subresources only when a transition touches part
//! of them.
//!
//! The key orders layers before mips on purpose: an entry split slice-major stays sorted in
//! place, and the scan can stop at the first entry starting past the last layer of a range.
use crate::{
    range::{AspectMask, Extent, SubresourceRange},
    region::{ImageRegionState, PrevState},
};
use std::fmt;
use tracing::trace;

/// How much of an incoming range was matched by existing entries.
enum Coverage {
    /// Every subresource of the range was matched.
    Complete,
    /// Some subresources were matched, these were not (single-subresource ranges).
    Partial(Vec<SubresourceRange>),
    /// Nothing in the ledger overlapped the range.
    Untouched,
}

/// Result of applying a transition to a ledger, see [`SubresourceStates::apply`].
#[derive(Clone, Debug)]
pub struct AppliedTransition<S> {
    /// State the first matched entry was in before the transition.
    pub prior: Option<S>,
    /// One entry per matched ledger range, from the state it was in to the requested state.
    pub barriers: Vec<ImageRegionState<S>>,
    /// Parts of the requested range that no ledger entry covered.
    pub unmatched: Vec<SubresourceRange>,
}

/// The ordered state entries of one image.
#[derive(Clone, Eq, PartialEq)]
pub struct SubresourceStates<S> {
    entries: Vec<ImageRegionState<S>>,
}

impl<S> Default for SubresourceStates<S> {
    fn default() -> Self {
        SubresourceStates { entries: Vec::new() }
    }
}

impl<S: Copy + Eq + fmt::Debug> SubresourceStates<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger with one untransitioned entry per aspect, covering the whole image.
    pub fn whole(aspects: AspectMask, extent: Extent, initial: S) -> Self {
        SubresourceStates {
            entries: aspects
                .iter()
                .map(|aspect| ImageRegionState {
                    range: SubresourceRange::whole(aspect, extent),
                    old: PrevState::Untransitioned,
                    new: initial,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ImageRegionState<S>] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRegionState<S>> {
        self.entries.iter()
    }

    /// Returns the entry tracking the given subresource, if any.
    pub fn state_at(&self, aspect: AspectMask, mip_level: u32, array_layer: u32) -> Option<&ImageRegionState<S>> {
        self.entries.iter().find(|entry| {
            entry.range.aspect_mask.intersects(aspect) && entry.range.contains_subresource(mip_level, array_layer)
        })
    }

    /// Integrates a transition over a resolved range into the ledger.
    ///
    /// Matching entries keep their first known prior state and take the transition's new state.
    /// Entries spanning several subresources that are only partially covered are exploded
    /// first. Subresources of the range that no entry tracks get new entries carrying the
    /// transition as-is.
    pub fn record(&mut self, transition: &ImageRegionState<S>) {
        debug_assert!(transition.range.is_resolved());
        for aspect in transition.range.aspect_mask.iter() {
            let range = transition.range.with_aspect(aspect);
            let coverage = self.integrate(range, &mut |entry: &mut ImageRegionState<S>| {
                entry.advance(transition.old, transition.new)
            });
            match coverage {
                Coverage::Complete => {}
                Coverage::Untouched => self.insert(ImageRegionState {
                    range,
                    ..*transition
                }),
                Coverage::Partial(gaps) => {
                    for gap in gaps {
                        self.insert(ImageRegionState {
                            range: gap,
                            ..*transition
                        })
                    }
                }
            }
        }
    }

    /// Advances the tracked state of a resolved range to `transition.new`.
    ///
    /// Unlike [`record`](Self::record), this reports the state every matched entry was in and
    /// never creates entries: subresources that are not tracked are returned in `unmatched`.
    pub fn apply(&mut self, transition: &ImageRegionState<S>) -> AppliedTransition<S> {
        debug_assert!(transition.range.is_resolved());
        let mut applied = AppliedTransition {
            prior: None,
            barriers: Vec::new(),
            unmatched: Vec::new(),
        };
        for aspect in transition.range.aspect_mask.iter() {
            let range = transition.range.with_aspect(aspect);
            let coverage = self.integrate(range, &mut |entry: &mut ImageRegionState<S>| {
                applied.prior.get_or_insert(entry.new);
                applied
                    .barriers
                    .push(ImageRegionState::new(entry.range, entry.new, transition.new));
                entry.advance(transition.old, transition.new);
            });
            match coverage {
                Coverage::Complete => {}
                Coverage::Untouched => applied.unmatched.push(range),
                Coverage::Partial(gaps) => applied.unmatched.extend(gaps),
            }
        }
        applied
    }

    /// Parts of a resolved range that no entry tracks, reported like [`apply`](Self::apply)
    /// reports them (one range per aspect with nothing tracked, single subresources otherwise).
    pub fn untracked(&self, range: &SubresourceRange) -> Vec<SubresourceRange> {
        let mut untracked = Vec::new();
        for aspect in range.aspect_mask.iter() {
            let range = range.with_aspect(aspect);
            let gaps: Vec<_> = range
                .subresources()
                .filter(|sub| self.state_at(aspect, sub.base_mip_level, sub.base_array_layer).is_none())
                .collect();
            if gaps.len() == range.subresource_count() {
                untracked.push(range);
            } else {
                untracked.extend(gaps);
            }
        }
        untracked
    }

    /// Walks the entries of one aspect that intersect `range`, calling `visit` on each entry that
    /// lies entirely within it.
    fn integrate(&mut self, range: SubresourceRange, visit: &mut dyn FnMut(&mut ImageRegionState<S>)) -> Coverage {
        let aspect_bits = range.aspect_mask.bits();
        let mut covered = vec![false; range.subresource_count()];
        let mut i = self
            .entries
            .partition_point(|entry| entry.range.aspect_mask.bits() < aspect_bits);

        while let Some(entry) = self.entries.get(i) {
            // sorted by (aspect, layer, mip): nothing past this point can intersect
            if entry.range.aspect_mask != range.aspect_mask || entry.range.base_array_layer >= range.layer_end() {
                break;
            }

            if entry.range == range {
                visit(&mut self.entries[i]);
                return Coverage::Complete;
            }

            if entry.range.is_within(&range) {
                let matched = entry.range;
                visit(&mut self.entries[i]);
                for sub in matched.subresources() {
                    covered[range.slice_major_index(sub.base_mip_level, sub.base_array_layer)] = true;
                }
                i += 1;
                continue;
            }

            if !entry.range.is_single_subresource() && entry.range.overlaps(&range) {
                // re-examine the first exploded entry on the next iteration
                self.explode(i);
                continue;
            }

            i += 1;
        }

        let gaps: Vec<_> = range
            .subresources()
            .zip(covered.iter())
            .filter(|&(_, &hit)| !hit)
            .map(|(sub, _)| sub)
            .collect();
        if gaps.is_empty() {
            Coverage::Complete
        } else if gaps.len() == covered.len() {
            Coverage::Untouched
        } else {
            Coverage::Partial(gaps)
        }
    }

    /// Replaces the entry at `index` with one entry per subresource, laid out slice-major, each
    /// inheriting the entry's states.
    ///
    /// The new list is built in a separate buffer. Exploded entries are merged with the
    /// following entries so the list stays sorted; entries before `index` are untouched and the
    /// first exploded entry lands at `index`.
    fn explode(&mut self, index: usize) {
        let entry = self.entries[index];
        trace!(?entry, count = entry.range.subresource_count(), "splitting ledger entry");

        let mut rebuilt = Vec::with_capacity(self.entries.len() + entry.range.subresource_count() - 1);
        rebuilt.extend_from_slice(&self.entries[..index]);

        let mut pieces = entry
            .range
            .subresources()
            .map(|range| ImageRegionState { range, ..entry })
            .peekable();
        let mut tail = self.entries[index + 1..].iter().copied().peekable();
        while let Some(piece) = pieces.peek() {
            match tail.peek() {
                Some(next) if next.range.sort_key() < piece.range.sort_key() => rebuilt.extend(tail.next()),
                _ => rebuilt.extend(pieces.next()),
            }
        }
        rebuilt.extend(tail);

        self.entries = rebuilt;
    }

    fn insert(&mut self, region: ImageRegionState<S>) {
        let key = region.range.sort_key();
        let pos = self.entries.partition_point(|entry| entry.range.sort_key() < key);
        trace!(?region, pos, "inserting ledger entry");
        self.entries.insert(pos, region);
    }

    /// Collapses every aspect that has been split into single subresources covering the whole
    /// image back into one entry, when all of its entries agree on both states.
    pub fn compact(&mut self, extent: Extent) {
        let mut compacted = Vec::with_capacity(self.entries.len());
        let mut start = 0;
        while start < self.entries.len() {
            let aspect = self.entries[start].range.aspect_mask;
            let end = start
                + self.entries[start..]
                    .iter()
                    .take_while(|entry| entry.range.aspect_mask == aspect)
                    .count();
            let group = &self.entries[start..end];
            let first = group[0];
            let collapsible = group.len() > 1
                && group.len() == extent.subresource_count()
                && group.iter().all(|entry| {
                    entry.range.is_single_subresource() && entry.old == first.old && entry.new == first.new
                });
            if collapsible {
                compacted.push(ImageRegionState {
                    range: SubresourceRange::whole(aspect, extent),
                    ..first
                });
            } else {
                compacted.extend_from_slice(group);
            }
            start = end;
        }
        self.entries = compacted;
    }

    /// The minimal entry list to persist: optionally compacted, without no-op entries.
    pub fn flatten(&self, extent: Extent, compact: bool) -> Vec<ImageRegionState<S>> {
        let mut states = self.clone();
        if compact {
            states.compact(extent);
        }
        states.entries.retain(|entry| !entry.is_noop());
        states.entries
    }
}

impl<S: fmt::Debug> fmt::Debug for SubresourceStates<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Ledger of one image plus the extent its ranges are resolved against.
#[derive(Clone, Debug)]
pub struct ImageLayouts<S> {
    pub aspects: AspectMask,
    pub mip_levels: u32,
    pub array_size: u32,
    pub(crate) states: SubresourceStates<S>,
}

impl<S: Copy + Eq + fmt::Debug> ImageLayouts<S> {
    /// Layout tracking for a newly created image, every aspect in `initial`.
    pub fn new(aspects: AspectMask, extent: Extent, initial: S) -> ImageLayouts<S> {
        ImageLayouts {
            aspects,
            mip_levels: extent.mip_levels,
            array_size: extent.array_size,
            states: SubresourceStates::whole(aspects, extent, initial),
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.mip_levels, self.array_size)
    }

    pub fn states(&self) -> &SubresourceStates<S> {
        &self.states
    }

    /// Resolves a range against the image: its aspects must be non-empty aspects of the image,
    /// and its mips and layers must fit the extent.
    pub fn resolve(&self, range: &SubresourceRange) -> Option<SubresourceRange> {
        if range.aspect_mask.is_empty() || !self.aspects.contains(range.aspect_mask) {
            return None;
        }
        range.resolve(self.extent())
    }
}
