#![allow(dead_code)]

use imgstate::{
    Backend, ImageLayouts, ImageRegionState, ImageRegistrationInfo, ResourceId, ResourceManager, ResourceRecord,
    ResourceRegistrationInfo, AspectMask, Extent, TrackerConfig,
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Layout {
    Undefined,
    General,
    ShaderRead,
    TransferDst,
    ColorAttachment,
    Present,
}

const LAYOUTS: [Layout; 6] = [
    Layout::Undefined,
    Layout::General,
    Layout::ShaderRead,
    Layout::TransferDst,
    Layout::ColorAttachment,
    Layout::Present,
];

/// Backend with plain enum states, recording what the manager asks of it.
#[derive(Default)]
pub struct TestBackend {
    pub applied: Vec<(ResourceId, Vec<ImageRegionState<Layout>>)>,
    pub released: Vec<ResourceId>,
}

impl Backend for TestBackend {
    type State = Layout;
    type InitialContents = Vec<ImageRegionState<Layout>>;

    fn initial_state(&self) -> Layout {
        Layout::Undefined
    }

    fn replay_state(&self, state: Layout) -> Layout {
        match state {
            Layout::Present => Layout::General,
            other => other,
        }
    }

    fn state_to_raw(&self, state: Layout) -> u32 {
        state as u32
    }

    fn state_from_raw(&self, raw: u32) -> Option<Layout> {
        LAYOUTS.get(raw as usize).copied()
    }

    fn prepare_initial_state(
        &mut self,
        _id: ResourceId,
        _record: &ResourceRecord,
        layouts: Option<&ImageLayouts<Layout>>,
    ) -> Option<Self::InitialContents> {
        layouts.map(|layouts| layouts.states().entries().to_vec())
    }

    fn apply_initial_state(&mut self, live: ResourceId, contents: &Self::InitialContents) {
        self.applied.push((live, contents.clone()));
    }

    fn release_resource(&mut self, id: ResourceId) {
        self.released.push(id);
    }
}

pub fn manager(config: TrackerConfig) -> ResourceManager<TestBackend> {
    init_tracing();
    ResourceManager::new(TestBackend::default(), config)
}

pub fn color_image<B: Backend>(manager: &mut ResourceManager<B>, name: &str, extent: Extent) -> ResourceId {
    manager.register_image_resource(ImageRegistrationInfo {
        resource: ResourceRegistrationInfo { name, special: false },
        aspects: AspectMask::COLOR,
        extent,
    })
}
