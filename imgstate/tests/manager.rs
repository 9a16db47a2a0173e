mod common;

use common::{color_image, manager, Layout};
use imgstate::{
    ApplyMode, AspectMask, Extent, FrameRefType, ImageRegionState, ImageRegistrationInfo, LedgerError, PrevState,
    ResourceRegistrationInfo, SubresourceRange, TrackerConfig, TransitionList, TransitionRequest, REMAINING,
};

fn single(mip: u32) -> SubresourceRange {
    SubresourceRange::single(AspectMask::COLOR, mip, 0)
}

#[test]
fn released_images_retire_their_ledger() {
    let mut manager = manager(TrackerConfig::default());
    let image = color_image(&mut manager, "image", Extent::new(2, 2));
    assert_eq!(manager.image_layout(image).unwrap().states().len(), 1);

    manager.add_ref(image).unwrap();
    assert!(!manager.release_resource(image).unwrap());
    assert!(manager.image_layout(image).is_some());
    assert!(manager.release_resource(image).unwrap());
    assert!(manager.image_layout(image).is_none());
    assert!(manager.record(image).is_none());
    assert_eq!(manager.backend().released, vec![image]);

    assert!(matches!(
        manager.release_resource(image),
        Err(LedgerError::StaleResource { id }) if id == image
    ));
}

#[test]
fn references_taken_on_other_threads() {
    let mut manager = manager(TrackerConfig::default());
    let image = color_image(&mut manager, "image", Extent::new(1, 1));
    let record = manager.record(image).unwrap();
    std::thread::spawn(move || record.add_ref()).join().unwrap();
    assert_eq!(manager.record(image).unwrap().ref_count(), 2);

    assert!(!manager.release_resource(image).unwrap());
    assert!(manager.release_resource(image).unwrap());
    assert!(manager.image_layout(image).is_none());
    assert_eq!(manager.backend().released, vec![image]);
}

#[test]
fn parents_outlive_children() {
    let mut manager = manager(TrackerConfig::default());
    let memory = manager.register_resource(ResourceRegistrationInfo {
        name: "memory",
        special: false,
    });
    let image = color_image(&mut manager, "image", Extent::new(1, 1));
    manager.add_parent(image, memory).unwrap();
    // adding the same parent twice takes a single reference
    manager.add_parent(image, memory).unwrap();
    assert_eq!(manager.record(memory).unwrap().ref_count(), 2);
    assert_eq!(manager.record(image).unwrap().parents(), vec![memory]);

    assert!(!manager.release_resource(memory).unwrap());
    assert!(manager.record(memory).is_some());
    assert!(manager.release_resource(image).unwrap());
    assert!(manager.record(memory).is_none());
}

#[test]
fn frame_references() {
    let mut manager = manager(TrackerConfig::default());
    let image = color_image(&mut manager, "image", Extent::new(1, 1));

    assert_eq!(manager.mark_frame_referenced(image, FrameRefType::Read).unwrap(), FrameRefType::ReadOnly);
    assert_eq!(
        manager.mark_frame_referenced(image, FrameRefType::Write).unwrap(),
        FrameRefType::ReadBeforeWrite
    );
    assert!(manager.read_before_write(image));
    assert_eq!(manager.record(image).unwrap().ref_count(), 2);

    // the application lets go, the frame still holds the image
    assert!(!manager.release_resource(image).unwrap());
    assert!(manager.release_frame_references().is_empty());
    assert!(manager.record(image).is_none());
    assert_eq!(manager.frame_ref(image), None);
}

#[test]
fn dirty_tracking() {
    let mut manager = manager(TrackerConfig::default());
    let a = color_image(&mut manager, "a", Extent::new(1, 1));
    let b = color_image(&mut manager, "b", Extent::new(1, 1));
    manager.mark_dirty(a);
    manager.mark_pending_dirty(b);
    assert!(manager.is_dirty(a));
    assert!(!manager.is_dirty(b));
    manager.flush_pending_dirty();
    assert!(manager.is_dirty(b));
    manager.mark_clean(a);
    assert!(!manager.is_dirty(a));
}

#[test]
fn initial_contents_keep_the_ledger_alive() {
    let mut manager = manager(TrackerConfig::default());
    let image = color_image(&mut manager, "image", Extent::new(2, 1));
    let swapchain = manager.register_image_resource(ImageRegistrationInfo {
        resource: ResourceRegistrationInfo {
            name: "swapchain",
            special: true,
        },
        aspects: AspectMask::COLOR,
        extent: Extent::new(1, 1),
    });
    manager.mark_dirty(image);
    manager.mark_dirty(swapchain);

    assert_eq!(manager.prepare_initial_contents(), 1);
    assert!(manager.record(image).unwrap().has_initial_state());
    assert!(manager.initial_contents(image).is_some());
    assert!(manager.initial_contents(swapchain).is_none());

    assert!(manager.apply_initial_contents().is_empty());
    assert_eq!(manager.backend().applied.len(), 1);
    assert_eq!(manager.backend().applied[0].0, image);

    assert!(manager.release_resource(image).unwrap());
    assert!(manager.image_layout(image).is_some());
    manager.free_initial_contents();
    assert!(manager.image_layout(image).is_none());
}

#[test]
fn initial_contents_are_restored_onto_live_resources() {
    let extent = Extent::new(2, 1);
    let mut capture = manager(TrackerConfig::default());
    let image = color_image(&mut capture, "image", extent);
    capture.mark_dirty(image);
    assert_eq!(capture.prepare_initial_contents(), 1);
    let contents = capture.initial_contents(image).unwrap().clone();

    let mut replay = manager(TrackerConfig::default());
    let _unrelated = color_image(&mut replay, "unrelated", extent);
    let live = color_image(&mut replay, "image", extent);
    assert_ne!(live, image);
    replay.add_live_resource(image, live);
    replay.set_initial_contents(image, contents.clone());

    assert!(replay.apply_initial_contents().is_empty());
    assert_eq!(replay.backend().applied, vec![(live, contents)]);
}

#[test]
fn records_are_written_once_per_capture() {
    let mut manager = manager(TrackerConfig::default());
    let memory = manager.register_resource(ResourceRegistrationInfo {
        name: "memory",
        special: false,
    });
    let image = color_image(&mut manager, "image", Extent::new(1, 1));
    let view = color_image(&mut manager, "view", Extent::new(1, 1));
    manager.add_parent(image, memory).unwrap();
    manager.add_parent(view, image).unwrap();

    assert_eq!(manager.records_to_write(&[view, memory]), vec![memory, image, view]);
    assert!(manager.record(image).unwrap().is_data_written());
    assert!(manager.records_to_write(&[view, image]).is_empty());

    manager.mark_records_unwritten();
    assert_eq!(manager.records_to_write(&[image]), vec![memory, image]);
}

#[test]
fn live_ids() {
    let mut manager = manager(TrackerConfig::default());
    let original = color_image(&mut manager, "original", Extent::new(1, 1));
    let live = color_image(&mut manager, "live", Extent::new(1, 1));
    let replacement = color_image(&mut manager, "replacement", Extent::new(1, 1));

    assert_eq!(manager.resolve_live(original), Some(original));
    manager.add_live_resource(original, live);
    assert!(manager.has_live_resource(original));
    assert_eq!(manager.live_id(original), Some(live));
    assert_eq!(manager.original_id(live), Some(original));
    assert_eq!(manager.resolve_live(original), Some(live));

    manager.replace_resource(original, replacement);
    assert_eq!(manager.resolve_live(original), Some(replacement));
    manager.remove_replacement(original);
    assert_eq!(manager.resolve_live(original), Some(live));

    assert!(manager.release_resource(live).unwrap());
    assert!(!manager.has_live_resource(original));
}

#[test]
fn serialisable_resources() {
    let mut manager = manager(TrackerConfig::default());
    let device = manager.register_resource(ResourceRegistrationInfo {
        name: "device",
        special: false,
    });
    manager.set_context_resource(device);
    let image = color_image(&mut manager, "image", Extent::new(1, 1));
    assert!(!manager.serialisable(device));
    assert!(manager.serialisable(image));
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn apply_reports_the_real_prior_state() {
    let mut manager = manager(TrackerConfig::default());
    let image = color_image(&mut manager, "image", Extent::new(4, 1));
    let mut list = TransitionList::new();
    manager.record_transitions(
        &mut list,
        &[TransitionRequest {
            resource: image,
            range: SubresourceRange::whole(AspectMask::COLOR, Extent::new(4, 1)),
            old: Layout::Undefined,
            new: Layout::General,
        }],
    );
    assert!(manager.merge_transitions(&list).is_empty());

    let mut transitions = [(image, ImageRegionState::new(single(2), Layout::Undefined, Layout::ShaderRead))];
    let report = manager.apply_transitions(&mut transitions).unwrap();
    assert!(report.errors.is_empty());
    assert_eq!(transitions[0].1.old, PrevState::Known(Layout::General));
    assert_eq!(report.barriers.len(), 1);
    assert_eq!(report.barriers[0].0, image);
    assert_eq!(report.barriers[0].1.old, PrevState::Known(Layout::General));
    assert_eq!(report.barriers[0].1.new, Layout::ShaderRead);

    let states = manager.image_layout(image).unwrap().states();
    let mip2 = states.state_at(AspectMask::COLOR, 2, 0).unwrap();
    assert_eq!(mip2.old, PrevState::Known(Layout::Undefined));
    assert_eq!(mip2.new, Layout::ShaderRead);
    assert_eq!(states.state_at(AspectMask::COLOR, 3, 0).unwrap().new, Layout::General);
}

#[test]
fn apply_advances_from_the_current_state() {
    let mut manager = manager(TrackerConfig::default());
    let image = color_image(&mut manager, "image", Extent::new(2, 1));
    let whole = SubresourceRange {
        aspect_mask: AspectMask::COLOR,
        base_mip_level: 0,
        mip_levels: REMAINING,
        base_array_layer: 0,
        array_size: REMAINING,
    };
    let mut transitions = [
        (image, ImageRegionState::new(whole, Layout::Undefined, Layout::TransferDst)),
        (image, ImageRegionState::new(single(1), Layout::Undefined, Layout::ShaderRead)),
    ];
    let report = manager.apply_transitions(&mut transitions).unwrap();
    assert!(report.errors.is_empty());
    assert_eq!(transitions[0].1.range.mip_levels, 2);
    assert_eq!(transitions[0].1.old, PrevState::Known(Layout::Undefined));
    assert_eq!(transitions[1].1.old, PrevState::Known(Layout::TransferDst));
    assert_eq!(report.barriers.len(), 2);
}

#[test]
fn untracked_resources_are_skipped() {
    let mut manager = manager(TrackerConfig::default().with_apply_mode(ApplyMode::Strict));
    let gone = color_image(&mut manager, "gone", Extent::new(1, 1));
    let image = color_image(&mut manager, "image", Extent::new(1, 1));
    manager.release_resource(gone).unwrap();

    let mut transitions = [
        (gone, ImageRegionState::new(single(0), Layout::Undefined, Layout::General)),
        (image, ImageRegionState::new(single(0), Layout::Undefined, Layout::General)),
    ];
    let report = manager.apply_transitions(&mut transitions).unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0], LedgerError::StaleResource { id } if id == gone));
    assert_eq!(report.barriers.len(), 1);
    assert_eq!(transitions[0].1.old, PrevState::Known(Layout::Undefined));
}

#[test]
fn ranges_outside_the_image_are_skipped() {
    let mut manager = manager(TrackerConfig::default().with_apply_mode(ApplyMode::Strict));
    let image = color_image(&mut manager, "image", Extent::new(2, 1));
    let past_the_end = SubresourceRange {
        mip_levels: REMAINING,
        ..single(2)
    };
    let mut transitions = [
        (image, ImageRegionState::new(past_the_end, Layout::Undefined, Layout::General)),
        (image, ImageRegionState::new(single(0).with_aspect(AspectMask::DEPTH), Layout::Undefined, Layout::General)),
        (image, ImageRegionState::new(single(0).with_aspect(AspectMask::empty()), Layout::Undefined, Layout::General)),
        (image, ImageRegionState::new(single(1), Layout::Undefined, Layout::ShaderRead)),
    ];
    let report = manager.apply_transitions(&mut transitions).unwrap();
    assert_eq!(report.errors.len(), 3);
    for (err, transition) in report.errors.iter().zip(&transitions) {
        match err {
            LedgerError::RangeResolution { id, range, extent } => {
                assert_eq!(*id, image);
                assert_eq!(*range, transition.1.range);
                assert_eq!(*extent, Extent::new(2, 1));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(report.barriers.len(), 1);
    assert_eq!(report.barriers[0].1.range, single(1));

    let states = manager.image_layout(image).unwrap().states();
    assert!(states.iter().all(|entry| entry.range.aspect_mask == AspectMask::COLOR));
    assert_eq!(states.state_at(AspectMask::COLOR, 0, 0).unwrap().new, Layout::Undefined);
    assert_eq!(states.state_at(AspectMask::COLOR, 1, 0).unwrap().new, Layout::ShaderRead);
}

#[test]
fn foreign_aspects_are_not_recorded() {
    let mut manager = manager(TrackerConfig::default());
    let image = color_image(&mut manager, "image", Extent::new(1, 1));
    let mut list = TransitionList::new();
    let errors = manager.record_transitions(
        &mut list,
        &[TransitionRequest {
            resource: image,
            range: single(0).with_aspect(AspectMask::DEPTH),
            old: Layout::Undefined,
            new: Layout::General,
        }],
    );
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], LedgerError::RangeResolution { id, .. } if id == image));
    assert!(list.is_empty());
    assert!(manager.merge_transitions(&list).is_empty());
    assert_eq!(manager.image_layout(image).unwrap().states().len(), 1);
}
