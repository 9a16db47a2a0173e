//! Resource manager: the session object owning resource records and the global image ledger.
use crate::{
    backend::Backend,
    config::{ApplyMode, TrackerConfig},
    error::LedgerError,
    ledger::ImageLayouts,
    range::{AspectMask, Extent},
    record::{FrameRefType, ResourceId, ResourceRecord},
    recorder::{self, ImageLayoutMap, TransitionList, TransitionRequest},
    region::{ImageRegionState, PrevState},
    serial::{self, SerialisedImage},
};
use bytes::Bytes;
use fxhash::FxHashMap;
use slotmap::SlotMap;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tracing::{debug, error, trace, trace_span, warn};

#[derive(Copy, Clone, Debug)]
pub struct ResourceRegistrationInfo<'a> {
    pub name: &'a str,
    /// Exempt from serialisation (e.g. swapchain images).
    pub special: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct ImageRegistrationInfo<'a> {
    pub resource: ResourceRegistrationInfo<'a>,
    /// All aspects of the image format.
    pub aspects: AspectMask,
    pub extent: Extent,
}

/// Result of [`ResourceManager::apply_transitions`].
#[derive(Debug)]
pub struct ApplyReport<S> {
    /// Transitions to issue on the device, one per matched ledger entry, from the state the entry
    /// was in.
    pub barriers: Vec<(ResourceId, ImageRegionState<S>)>,
    /// Problems that were skipped over.
    pub errors: Vec<LedgerError>,
}

impl<S> Default for ApplyReport<S> {
    fn default() -> Self {
        ApplyReport {
            barriers: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Result of [`ResourceManager::load_image_states`].
#[derive(Debug)]
pub struct LoadedImageStates<S> {
    /// Transitions bringing every live image from its current layout to the serialised one.
    /// No-op transitions are omitted.
    pub barriers: Vec<(ResourceId, ImageRegionState<S>)>,
    pub errors: Vec<LedgerError>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Tracks the resources of one capture or replay session.
///
/// The manager owns the global image ledger: per-submission [`TransitionList`]s are folded into it
/// with [`merge_transitions`](Self::merge_transitions), and it is read back with
/// [`apply_transitions`](Self::apply_transitions) at replay time. Records are shared behind `Arc`
/// so that their reference counts can be changed from other threads; everything else requires
/// exclusive access.
pub struct ResourceManager<B: Backend> {
    backend: B,
    config: TrackerConfig,
    records: SlotMap<ResourceId, Arc<ResourceRecord>>,
    image_layouts: ImageLayoutMap<B::State>,
    frame_refs: FxHashMap<ResourceId, FrameRefType>,
    dirty: BTreeSet<ResourceId>,
    pending_dirty: BTreeSet<ResourceId>,
    initial_contents: BTreeMap<ResourceId, B::InitialContents>,
    original_to_live: FxHashMap<ResourceId, ResourceId>,
    live_to_original: FxHashMap<ResourceId, ResourceId>,
    replacements: FxHashMap<ResourceId, ResourceId>,
    /// The device/context resource, never serialised.
    context_id: Option<ResourceId>,
}

impl<B: Backend> ResourceManager<B> {
    pub fn new(backend: B, config: TrackerConfig) -> ResourceManager<B> {
        ResourceManager {
            backend,
            config,
            records: SlotMap::with_key(),
            image_layouts: ImageLayoutMap::new(),
            frame_refs: Default::default(),
            dirty: BTreeSet::new(),
            pending_dirty: BTreeSet::new(),
            initial_contents: BTreeMap::new(),
            original_to_live: Default::default(),
            live_to_original: Default::default(),
            replacements: Default::default(),
            context_id: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Records

    /// Registers a resource and returns its id. The record starts with one reference.
    pub fn register_resource(&mut self, info: ResourceRegistrationInfo) -> ResourceId {
        let id = self
            .records
            .insert_with_key(|id| Arc::new(ResourceRecord::new(id, info.name, info.special)));
        debug!(?id, name = info.name, special = info.special, "register_resource");
        id
    }

    /// Registers an image resource, with every aspect in the backend's initial state.
    pub fn register_image_resource(&mut self, info: ImageRegistrationInfo) -> ResourceId {
        let id = self.register_resource(info.resource);
        let initial = self.backend.initial_state();
        self.image_layouts
            .insert(id, ImageLayouts::new(info.aspects, info.extent, initial));
        id
    }

    /// Designates the device/context resource of the session.
    pub fn set_context_resource(&mut self, id: ResourceId) {
        self.context_id = Some(id);
    }

    pub fn record(&self, id: ResourceId) -> Option<Arc<ResourceRecord>> {
        self.records.get(id).cloned()
    }

    fn record_ref(&self, id: ResourceId) -> Result<&Arc<ResourceRecord>, LedgerError> {
        self.records.get(id).ok_or(LedgerError::StaleResource { id })
    }

    pub fn add_ref(&self, id: ResourceId) -> Result<(), LedgerError> {
        self.record_ref(id)?.add_ref();
        Ok(())
    }

    /// Drops one reference to a resource.
    ///
    /// When the last reference goes, the record is removed, its parents are released, and its
    /// ledger is retired (unless initial contents still refer to it). Returns `true` in that case.
    pub fn release_resource(&mut self, id: ResourceId) -> Result<bool, LedgerError> {
        if !self.record_ref(id)?.release() {
            return Ok(false);
        }
        let Some(record) = self.records.remove(id) else {
            return Ok(false);
        };
        debug!(?id, name = record.name(), "releasing resource");

        for parent in record.take_parents() {
            if let Err(err) = self.release_resource(parent) {
                warn!(?id, ?parent, "failed to release parent: {}", err);
            }
        }

        self.frame_refs.remove(&id);
        self.dirty.remove(&id);
        self.pending_dirty.remove(&id);
        if !self.initial_contents.contains_key(&id) {
            self.image_layouts.remove(&id);
        }
        if let Some(original) = self.live_to_original.remove(&id) {
            self.original_to_live.remove(&original);
        }
        self.backend.release_resource(id);
        Ok(true)
    }

    /// Makes `child` depend on `parent`. The parent is kept alive until the child is released.
    pub fn add_parent(&self, child: ResourceId, parent: ResourceId) -> Result<(), LedgerError> {
        let parent_record = self.record_ref(parent)?;
        if self.record_ref(child)?.add_parent(parent) {
            parent_record.add_ref();
        }
        Ok(())
    }

    /// The records to write to the capture for the resources in `ids`, parents before their
    /// children. Every record is returned once per capture, until
    /// [`mark_records_unwritten`](Self::mark_records_unwritten).
    pub fn records_to_write(&self, ids: &[ResourceId]) -> Vec<ResourceId> {
        let mut order = Vec::new();
        for &id in ids {
            if let Some(record) = self.records.get(id) {
                self.insert_record(record, &mut order);
            }
        }
        order
    }

    fn insert_record(&self, record: &ResourceRecord, order: &mut Vec<ResourceId>) {
        let written = record.mark_data_written();
        for parent in record.parents() {
            match self.records.get(parent) {
                Some(parent) if !parent.is_data_written() => self.insert_record(parent, order),
                _ => {}
            }
        }
        if !written {
            order.push(record.id());
        }
    }

    /// Starts a new capture: every record is written again.
    pub fn mark_records_unwritten(&self) {
        for record in self.records.values() {
            record.mark_data_unwritten();
        }
    }

    /// Whether the resource is written to captures.
    pub fn serialisable(&self, id: ResourceId) -> bool {
        match self.records.get(id) {
            Some(record) => !record.is_special() && self.context_id != Some(id),
            None => false,
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Frame references

    /// Records a use of a resource in the captured frame. The first use takes a reference on the
    /// record, released by [`release_frame_references`](Self::release_frame_references).
    pub fn mark_frame_referenced(&mut self, id: ResourceId, ref_type: FrameRefType) -> Result<FrameRefType, LedgerError> {
        let record = self.record_ref(id)?;
        let existing = self.frame_refs.get(&id).copied();
        if existing.is_none() {
            record.add_ref();
        }
        let merged = FrameRefType::merge(existing, ref_type);
        trace!(?id, ?existing, ?ref_type, ?merged, "frame reference");
        self.frame_refs.insert(id, merged);
        Ok(merged)
    }

    pub fn frame_ref(&self, id: ResourceId) -> Option<FrameRefType> {
        self.frame_refs.get(&id).copied()
    }

    /// Whether the resource was read in the captured frame before being written.
    pub fn read_before_write(&self, id: ResourceId) -> bool {
        self.frame_refs.get(&id) == Some(&FrameRefType::ReadBeforeWrite)
    }

    /// Ends the frame: drops the references taken by [`mark_frame_referenced`](Self::mark_frame_referenced).
    pub fn release_frame_references(&mut self) -> Vec<LedgerError> {
        let ids: Vec<_> = self.frame_refs.drain().map(|(id, _)| id).collect();
        let mut errors = Vec::new();
        for id in ids {
            if let Err(err) = self.release_resource(id) {
                warn!(?id, "failed to release frame reference: {}", err);
                errors.push(err);
            }
        }
        errors
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Dirty tracking

    pub fn mark_dirty(&mut self, id: ResourceId) {
        self.dirty.insert(id);
    }

    /// Marks a resource dirty once the current frame is over (e.g. written by a command buffer
    /// that is still recording).
    pub fn mark_pending_dirty(&mut self, id: ResourceId) {
        self.pending_dirty.insert(id);
    }

    pub fn flush_pending_dirty(&mut self) {
        let pending = std::mem::take(&mut self.pending_dirty);
        self.dirty.extend(pending);
    }

    pub fn mark_clean(&mut self, id: ResourceId) {
        self.dirty.remove(&id);
        self.pending_dirty.remove(&id);
    }

    pub fn is_dirty(&self, id: ResourceId) -> bool {
        self.dirty.contains(&id)
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Initial contents

    /// Snapshots every dirty, serialisable resource before the captured frame starts.
    ///
    /// Returns the number of snapshots taken.
    pub fn prepare_initial_contents(&mut self) -> usize {
        let _span = trace_span!("prepare_initial_contents").entered();
        let mut count = 0;
        let dirty: Vec<_> = self.dirty.iter().copied().collect();
        for id in dirty {
            if !self.serialisable(id) {
                continue;
            }
            let Some(record) = self.records.get(id).cloned() else {
                continue;
            };
            if let Some(contents) = self
                .backend
                .prepare_initial_state(id, &record, self.image_layouts.get(&id))
            {
                self.initial_contents.insert(id, contents);
                record.set_initial_state(true);
                count += 1;
            }
        }
        debug!("prepared initial contents of {} resources", count);
        count
    }

    /// Stores initial contents loaded from a capture, keyed by original id.
    pub fn set_initial_contents(&mut self, id: ResourceId, contents: B::InitialContents) {
        if let Some(record) = self.records.get(id) {
            record.set_initial_state(true);
        }
        self.initial_contents.insert(id, contents);
    }

    pub fn initial_contents(&self, id: ResourceId) -> Option<&B::InitialContents> {
        self.initial_contents.get(&id)
    }

    /// Restores every stored snapshot onto its live resource.
    pub fn apply_initial_contents(&mut self) -> Vec<LedgerError> {
        let _span = trace_span!("apply_initial_contents").entered();
        let mut errors = Vec::new();
        for (&id, contents) in &self.initial_contents {
            let live = self.replacements.get(&id).copied().unwrap_or_else(|| {
                self.original_to_live.get(&id).copied().unwrap_or(id)
            });
            if !self.records.contains_key(live) {
                warn!(?id, ?live, "no live resource for initial contents");
                errors.push(LedgerError::StaleResource { id });
                continue;
            }
            self.backend.apply_initial_state(live, contents);
        }
        errors
    }

    /// Drops every stored snapshot, and the ledgers that were only kept alive by them.
    pub fn free_initial_contents(&mut self) {
        for id in std::mem::take(&mut self.initial_contents).into_keys() {
            match self.records.get(id) {
                Some(record) => record.set_initial_state(false),
                None => {
                    self.image_layouts.remove(&id);
                }
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Live/original ids

    /// Associates a resource id from a capture with the id of the resource recreated on replay.
    pub fn add_live_resource(&mut self, original: ResourceId, live: ResourceId) {
        if let Some(previous) = self.original_to_live.insert(original, live) {
            if previous != live {
                warn!(?original, ?previous, ?live, "original resource remapped");
                self.live_to_original.remove(&previous);
            }
        }
        self.live_to_original.insert(live, original);
    }

    pub fn has_live_resource(&self, original: ResourceId) -> bool {
        self.original_to_live.contains_key(&original)
    }

    pub fn live_id(&self, original: ResourceId) -> Option<ResourceId> {
        self.original_to_live.get(&original).copied()
    }

    pub fn original_id(&self, live: ResourceId) -> Option<ResourceId> {
        self.live_to_original.get(&live).copied()
    }

    /// Redirects every use of `from` to `to` (e.g. a shader replaced while debugging).
    pub fn replace_resource(&mut self, from: ResourceId, to: ResourceId) {
        self.replacements.insert(from, to);
    }

    pub fn remove_replacement(&mut self, from: ResourceId) {
        self.replacements.remove(&from);
    }

    /// The live resource a serialised id refers to: its replacement, its mapped live resource, or
    /// itself when the capture was made in this session.
    pub fn resolve_live(&self, original: ResourceId) -> Option<ResourceId> {
        if let Some(&replacement) = self.replacements.get(&original) {
            return Some(replacement);
        }
        if let Some(&live) = self.original_to_live.get(&original) {
            return Some(live);
        }
        self.records.contains_key(original).then_some(original)
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Transitions

    pub fn image_layouts(&self) -> &ImageLayoutMap<B::State> {
        &self.image_layouts
    }

    pub fn image_layout(&self, id: ResourceId) -> Option<&ImageLayouts<B::State>> {
        self.image_layouts.get(&id)
    }

    /// Records a batch of transitions into a per-submission list, resolving ranges against the
    /// extents of the tracked images. Transitions naming released resources are dropped.
    pub fn record_transitions(
        &self,
        list: &mut TransitionList<B::State>,
        batch: &[TransitionRequest<B::State>],
    ) -> Vec<LedgerError> {
        let (live, stale): (Vec<_>, Vec<_>) = batch
            .iter()
            .copied()
            .partition(|request| self.records.contains_key(request.resource));
        let mut errors: Vec<_> = stale
            .into_iter()
            .map(|request| {
                warn!(?request, "dropping transition of a released resource");
                LedgerError::StaleResource { id: request.resource }
            })
            .collect();
        errors.extend(recorder::record_transitions(list, &self.image_layouts, &live));
        errors
    }

    /// Folds a per-submission list into the global ledger.
    ///
    /// Lists must be merged in the order their submissions were made.
    pub fn merge_transitions(&mut self, src: &TransitionList<B::State>) -> Vec<LedgerError> {
        let _span = trace_span!("merge_transitions", count = src.len()).entered();
        let mut errors = Vec::new();
        for (id, transition) in src.iter() {
            match self.image_layouts.get_mut(&id) {
                Some(layouts) => layouts.states.record(transition),
                None => {
                    warn!(?id, "merging transitions of an untracked resource");
                    errors.push(LedgerError::StaleResource { id });
                }
            }
        }
        debug!("merged {} transitions into the global ledger", src.len());
        errors
    }

    /// Advances the global ledger by a set of transitions.
    ///
    /// Each transition's `old` is overwritten with the state its range was actually in, and its
    /// range with the resolved range. The returned barriers describe, per ledger entry, the
    /// transition to issue on the device.
    ///
    /// Transitions of untracked resources and transitions whose range doesn't fit the image are
    /// skipped and reported. Subresources without a ledger entry are reported as
    /// [`LedgerError::InvariantViolation`]; in [`ApplyMode::Strict`] the whole call is checked
    /// first, and the first one fails it before anything is changed.
    pub fn apply_transitions(
        &mut self,
        transitions: &mut [(ResourceId, ImageRegionState<B::State>)],
    ) -> Result<ApplyReport<B::State>, LedgerError> {
        let _span = trace_span!("apply_transitions", count = transitions.len()).entered();
        if self.config.apply_mode == ApplyMode::Strict {
            self.check_tracked(transitions)?;
        }
        let mut report = ApplyReport::default();
        for (id, transition) in transitions.iter_mut() {
            let id = *id;
            let Some(layouts) = self.image_layouts.get_mut(&id) else {
                warn!(?id, "skipping transition of an untracked resource");
                report.errors.push(LedgerError::StaleResource { id });
                continue;
            };
            let Some(range) = layouts.resolve(&transition.range) else {
                let extent = layouts.extent();
                warn!(?id, range = ?transition.range, ?extent, "skipping out-of-bounds transition");
                report.errors.push(LedgerError::RangeResolution {
                    id,
                    range: transition.range,
                    extent,
                });
                continue;
            };
            transition.range = range;

            let applied = layouts.states.apply(transition);
            if let Some(prior) = applied.prior {
                transition.old = PrevState::Known(prior);
            }
            report
                .barriers
                .extend(applied.barriers.into_iter().map(|barrier| (id, barrier)));

            for range in applied.unmatched {
                error!(?id, ?range, "no ledger entry for transitioned subresources");
                report.errors.push(LedgerError::InvariantViolation { id, range });
            }
        }
        debug!(
            "applied {} transitions: {} barriers, {} errors",
            transitions.len(),
            report.barriers.len(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Fails on the first subresource of `transitions` that has no ledger entry. Applying never
    /// adds or removes tracked subresources, so checking against the current ledger is enough.
    fn check_tracked(&self, transitions: &[(ResourceId, ImageRegionState<B::State>)]) -> Result<(), LedgerError> {
        for (id, transition) in transitions {
            let Some(layouts) = self.image_layouts.get(id) else {
                continue;
            };
            let Some(range) = layouts.resolve(&transition.range) else {
                continue;
            };
            if let Some(&range) = layouts.states.untracked(&range).first() {
                error!(?id, ?range, "no ledger entry for transitioned subresources");
                return Err(LedgerError::InvariantViolation { id: *id, range });
            }
        }
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Serialisation

    /// Writes the flattened ledger of every serialisable image.
    pub fn serialise_image_states(&self) -> Bytes {
        let _span = trace_span!("serialise_image_states").entered();
        let images: Vec<_> = self
            .image_layouts
            .iter()
            .filter(|&(&id, _)| self.serialisable(id))
            .map(|(&id, layouts)| {
                let extent = layouts.extent();
                SerialisedImage {
                    id,
                    aspects: layouts.aspects,
                    extent,
                    states: layouts.states.flatten(extent, self.config.compact_on_flatten),
                }
            })
            .collect();
        debug!("serialising the layouts of {} images", images.len());
        serial::write_image_states(&self.backend, &images)
    }

    /// Reads image states written by [`serialise_image_states`](Self::serialise_image_states)
    /// and brings the global ledger of the live images to them.
    ///
    /// Returns the barriers to issue on the device before replaying. Images that have no live
    /// counterpart are skipped and reported.
    pub fn load_image_states(&mut self, data: &[u8]) -> Result<LoadedImageStates<B::State>, LedgerError> {
        let _span = trace_span!("load_image_states", len = data.len()).entered();
        let images = serial::read_image_states(&self.backend, data)?;
        let initial = self.backend.initial_state();

        let mut errors = Vec::new();
        let mut transitions = Vec::new();
        for image in images {
            let Some(live) = self.resolve_live(image.id) else {
                warn!(id = ?image.id, "no live resource for serialised image states");
                errors.push(LedgerError::StaleResource { id: image.id });
                continue;
            };
            for stored in image.states {
                let new = if self.config.replace_presentable_on_load {
                    self.backend.replay_state(stored.new)
                } else {
                    stored.new
                };
                transitions.push((live, ImageRegionState::new(stored.range, initial, new)));
            }
        }

        let report = self.apply_transitions(&mut transitions)?;
        errors.extend(report.errors);
        let barriers: Vec<_> = report
            .barriers
            .into_iter()
            .filter(|(_, barrier)| !barrier.is_noop())
            .collect();

        for layouts in self.image_layouts.values_mut() {
            let extent = layouts.extent();
            layouts.states.compact(extent);
        }
        debug!("loaded image states: {} barriers, {} errors", barriers.len(), errors.len());
        Ok(LoadedImageStates { barriers, errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger::SubresourceStates, range::SubresourceRange};

    /// States are plain integers, 0 being the initial one.
    struct Plain;

    impl Backend for Plain {
        type State = u32;
        type InitialContents = ();

        fn initial_state(&self) -> u32 {
            0
        }

        fn state_to_raw(&self, state: u32) -> u32 {
            state
        }

        fn state_from_raw(&self, raw: u32) -> Option<u32> {
            Some(raw)
        }

        fn prepare_initial_state(
            &mut self,
            _id: ResourceId,
            _record: &ResourceRecord,
            _layouts: Option<&ImageLayouts<u32>>,
        ) -> Option<()> {
            None
        }

        fn apply_initial_state(&mut self, _live: ResourceId, _contents: &()) {}
    }

    fn image(manager: &mut ResourceManager<Plain>, name: &str, extent: Extent) -> ResourceId {
        manager.register_image_resource(ImageRegistrationInfo {
            resource: ResourceRegistrationInfo { name, special: false },
            aspects: AspectMask::COLOR,
            extent,
        })
    }

    fn transition(range: SubresourceRange, old: u32, new: u32) -> ImageRegionState<u32> {
        ImageRegionState::new(range, old, new)
    }

    /// Drops every ledger entry of `id`, as if the ledger had lost track of it.
    fn forget_entries(manager: &mut ResourceManager<Plain>, id: ResourceId) {
        if let Some(layouts) = manager.image_layouts.get_mut(&id) {
            layouts.states = SubresourceStates::new();
        }
    }

    fn untouched(manager: &ResourceManager<Plain>, id: ResourceId) -> bool {
        manager
            .image_layout(id)
            .map(|layouts| {
                layouts
                    .states()
                    .iter()
                    .all(|entry| entry.old == PrevState::Untransitioned && entry.new == 0)
            })
            .unwrap_or(false)
    }

    #[test]
    fn strict_apply_fails_before_changing_the_ledger() {
        let mut manager = ResourceManager::new(Plain, TrackerConfig::default().with_apply_mode(ApplyMode::Strict));
        let kept = image(&mut manager, "kept", Extent::new(2, 1));
        let broken = image(&mut manager, "broken", Extent::new(1, 1));
        forget_entries(&mut manager, broken);

        let whole = SubresourceRange::whole(AspectMask::COLOR, Extent::new(2, 1));
        let single = SubresourceRange::single(AspectMask::COLOR, 0, 0);
        let mut transitions = [
            (kept, transition(whole, 0, 1)),
            (broken, transition(single, 0, 1)),
        ];
        match manager.apply_transitions(&mut transitions) {
            Err(LedgerError::InvariantViolation { id, range }) => {
                assert_eq!(id, broken);
                assert_eq!(range, single);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(untouched(&manager, kept));
        assert_eq!(transitions[0].1.old, PrevState::Known(0));

        manager.config.apply_mode = ApplyMode::Lenient;
        let report = manager.apply_transitions(&mut transitions).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], LedgerError::InvariantViolation { id, .. } if id == broken));
        assert!(report.errors[0].is_fatal());
        assert_eq!(report.barriers.len(), 1);
        assert_eq!(report.barriers[0].0, kept);
        assert!(manager.image_layout(kept).unwrap().states().iter().all(|entry| entry.new == 1));
    }

    #[test]
    fn strict_load_leaves_the_ledger_alone() {
        let extent = Extent::new(1, 1);
        let single = SubresourceRange::single(AspectMask::COLOR, 0, 0);
        let mut capture = ResourceManager::new(Plain, TrackerConfig::default());
        let ids = [image(&mut capture, "a", extent), image(&mut capture, "b", extent)];
        for id in ids {
            let mut list = TransitionList::new();
            let request = TransitionRequest {
                resource: id,
                range: single,
                old: 0,
                new: 2,
            };
            assert!(capture.record_transitions(&mut list, &[request]).is_empty());
            assert!(capture.merge_transitions(&list).is_empty());
        }
        let data = capture.serialise_image_states();

        // same registration order, so the replay ids are the captured ones
        let mut replay = ResourceManager::new(Plain, TrackerConfig::default().with_apply_mode(ApplyMode::Strict));
        let live = [image(&mut replay, "a", extent), image(&mut replay, "b", extent)];
        assert_eq!(live, ids);
        forget_entries(&mut replay, live[1]);

        assert!(matches!(
            replay.load_image_states(&data),
            Err(LedgerError::InvariantViolation { id, .. }) if id == live[1]
        ));
        assert!(untouched(&replay, live[0]));
    }
}
