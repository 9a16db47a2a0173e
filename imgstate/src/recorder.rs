//! Per-submission transition lists.
//!
//! Each command stream records the transitions it issues into its own [`TransitionList`]. Lists
//! are folded together (or into the global ledger) only at an explicit synchronization point, in
//! the order they were produced: merging is not commutative.
use crate::{
    error::LedgerError,
    ledger::{ImageLayouts, SubresourceStates},
    range::SubresourceRange,
    record::ResourceId,
    region::{ImageRegionState, PrevState},
};
use std::{collections::BTreeMap, fmt};
use tracing::{debug, trace_span, warn};

/// Global ledger: the layout tracking of every live image.
pub type ImageLayoutMap<S> = BTreeMap<ResourceId, ImageLayouts<S>>;

/// A transition as issued by the traced application (one element of a barrier command).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransitionRequest<S> {
    pub resource: ResourceId,
    /// May contain `REMAINING` sentinels.
    pub range: SubresourceRange,
    pub old: S,
    pub new: S,
}

/// Transitions recorded by one command stream, per resource.
#[derive(Clone, Debug)]
pub struct TransitionList<S> {
    resources: BTreeMap<ResourceId, SubresourceStates<S>>,
}

impl<S> Default for TransitionList<S> {
    fn default() -> Self {
        TransitionList {
            resources: BTreeMap::new(),
        }
    }
}

impl<S: Copy + Eq + fmt::Debug> TransitionList<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Total number of entries, over all resources.
    pub fn len(&self) -> usize {
        self.resources.values().map(SubresourceStates::len).sum()
    }

    pub fn get(&self, id: ResourceId) -> Option<&SubresourceStates<S>> {
        self.resources.get(&id)
    }

    pub fn resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources.keys().copied()
    }

    /// All entries, ordered by resource, then by range.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &ImageRegionState<S>)> {
        self.resources
            .iter()
            .flat_map(|(&id, states)| states.iter().map(move |state| (id, state)))
    }

    /// Integrates one resolved transition into the list of `id`.
    pub fn record_single(&mut self, id: ResourceId, transition: &ImageRegionState<S>) {
        self.resources.entry(id).or_default().record(transition);
    }
}

/// Resolves a batch of transitions against the image extents in `layouts` and records them in
/// order into `list`.
///
/// A transition that can't be resolved (unknown resource, aspects the image doesn't have,
/// out-of-bounds range) is dropped and reported; the rest of the batch is still recorded.
pub fn record_transitions<S: Copy + Eq + fmt::Debug>(
    list: &mut TransitionList<S>,
    layouts: &ImageLayoutMap<S>,
    batch: &[TransitionRequest<S>],
) -> Vec<LedgerError> {
    let _span = trace_span!("record_transitions", count = batch.len()).entered();
    let mut errors = Vec::new();
    for request in batch {
        match resolve_request(layouts, request) {
            Ok(transition) => list.record_single(request.resource, &transition),
            Err(err) => {
                warn!(?request, "dropping transition: {}", err);
                errors.push(err);
            }
        }
    }
    debug!("recorded {} transitions, list has {} entries", batch.len() - errors.len(), list.len());
    errors
}

pub(crate) fn resolve_request<S: Copy + Eq + fmt::Debug>(
    layouts: &ImageLayoutMap<S>,
    request: &TransitionRequest<S>,
) -> Result<ImageRegionState<S>, LedgerError> {
    let id = request.resource;
    let image = layouts.get(&id).ok_or(LedgerError::StaleResource { id })?;
    let range = image.resolve(&request.range).ok_or(LedgerError::RangeResolution {
        id,
        range: request.range,
        extent: image.extent(),
    })?;
    Ok(ImageRegionState::new(range, PrevState::Known(request.old), request.new))
}

/// Folds the transitions of `src` into `dst`, as if they had been recorded into `dst` directly
/// after its own.
pub fn merge_transitions<S: Copy + Eq + fmt::Debug>(dst: &mut TransitionList<S>, src: &TransitionList<S>) {
    let _span = trace_span!("merge_transitions", count = src.len()).entered();
    for (id, transition) in src.iter() {
        dst.record_single(id, transition);
    }
    debug!("post-merge, there are {} entries", dst.len());
}
