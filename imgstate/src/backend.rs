use crate::{ledger::ImageLayouts, record::ResourceId, record::ResourceRecord};
use std::fmt;

/// API-specific hooks of a `ResourceManager`.
///
/// The ledger itself only compares states for equality; everything that needs to know what a
/// state *is* goes through this trait.
pub trait Backend {
    /// Layout (or resource state) of a subresource.
    type State: Copy + Eq + fmt::Debug;
    /// Snapshot of a resource taken at the start of a capture.
    type InitialContents;

    /// State of a freshly created image.
    fn initial_state(&self) -> Self::State;

    /// State to use at replay time for a state recorded during capture.
    fn replay_state(&self, state: Self::State) -> Self::State {
        state
    }

    /// Encodes a state for serialisation. `u32::MAX` is reserved.
    fn state_to_raw(&self, state: Self::State) -> u32;

    /// Decodes a serialised state, `None` if unknown.
    fn state_from_raw(&self, raw: u32) -> Option<Self::State>;

    /// Takes a snapshot of a resource before the captured frame starts.
    ///
    /// `layouts` is the resource's ledger, if it is an image. Returns `None` if nothing needs to
    /// be restored for this resource.
    fn prepare_initial_state(
        &mut self,
        id: ResourceId,
        record: &ResourceRecord,
        layouts: Option<&ImageLayouts<Self::State>>,
    ) -> Option<Self::InitialContents>;

    /// Restores a snapshot onto the live resource `live`.
    fn apply_initial_state(&mut self, live: ResourceId, contents: &Self::InitialContents);

    /// Called once the last reference to a resource is gone.
    fn release_resource(&mut self, _id: ResourceId) {}
}
