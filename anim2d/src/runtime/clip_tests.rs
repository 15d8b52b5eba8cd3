use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{
    AttachmentKey, AttachmentSpec, BoneSpec, BoneTimelinesSpec, ClipInstance, ClipSettings,
    ClipSpec, CurveSpec, DeformKeySpec, DrawOrderKey, DrawOrderOffsetSpec, EventKey, EventSink,
    RotationKey, SkeletonBuilder, SkeletonData, SkeletonInstance, SlotSpec, SlotTimelinesSpec,
    Vec2Key, DEFAULT_SKIN,
};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn bone(name: &str, parent: Option<&str>) -> BoneSpec {
    BoneSpec {
        name: name.to_string(),
        parent: parent.map(str::to_string),
        ..BoneSpec::default()
    }
}

fn slot(name: &str, bone: &str) -> SlotSpec {
    SlotSpec {
        name: name.to_string(),
        bone: bone.to_string(),
        ..SlotSpec::default()
    }
}

fn rotation_clip(bone: &str, keys: Vec<RotationKey>) -> ClipSpec {
    let mut bones = HashMap::new();
    bones.insert(
        bone.to_string(),
        BoneTimelinesSpec {
            rotation: keys,
            ..BoneTimelinesSpec::default()
        },
    );
    ClipSpec {
        bones,
        ..ClipSpec::default()
    }
}

fn single_bone_rig(clips: HashMap<String, ClipSpec>) -> Arc<SkeletonData> {
    Arc::new(
        SkeletonBuilder {
            bones: vec![
                bone("root", None),
                BoneSpec {
                    length: 10.0,
                    ..bone("a", Some("root"))
                },
            ],
            clips,
            ..SkeletonBuilder::default()
        }
        .finalize()
        .unwrap(),
    )
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(String, i32, f32, String)>>,
}

impl EventSink for RecordingSink {
    fn dispatch(&self, name: &str, int_value: i32, float_value: f32, string_value: &str) {
        self.events.lock().unwrap().push((
            name.to_string(),
            int_value,
            float_value,
            string_value.to_string(),
        ));
    }
}

#[test]
fn linear_rotation_key_interpolates_to_midpoint() {
    let mut clips = HashMap::new();
    clips.insert(
        "turn".to_string(),
        rotation_clip(
            "a",
            vec![
                RotationKey {
                    time: 0.0,
                    curve: CurveSpec::Linear,
                    angle: 0.0,
                },
                RotationKey {
                    time: 1.0,
                    curve: CurveSpec::Linear,
                    angle: 90.0,
                },
            ],
        ),
    );
    let data = single_bone_rig(clips);
    let mut instance = SkeletonInstance::new(data, None);
    let mut clip = ClipInstance::new(&mut instance, "turn", ClipSettings::default()).unwrap();

    clip.evaluate(&mut instance, 0.5, 1.0, false);
    instance.apply_cache();
    instance.pose_skinning_palette();

    // A pure 45-degree rotation about the origin.
    let m = instance.skinning_palette()[1];
    let cos45 = std::f32::consts::FRAC_PI_4.cos();
    assert_approx(m.m00, cos45);
    assert_approx(m.m10, cos45);
    assert_approx(m.m01, -cos45);
    assert_approx(m.tx, 0.0);
}

#[test]
fn stepped_keys_hold_the_previous_value() {
    let mut clips = HashMap::new();
    clips.insert(
        "snap".to_string(),
        rotation_clip(
            "a",
            vec![
                RotationKey {
                    time: 0.0,
                    curve: CurveSpec::Stepped,
                    angle: 10.0,
                },
                RotationKey {
                    time: 1.0,
                    curve: CurveSpec::Linear,
                    angle: 90.0,
                },
            ],
        ),
    );
    let data = single_bone_rig(clips);
    let mut instance = SkeletonInstance::new(data, None);
    let mut clip = ClipInstance::new(&mut instance, "snap", ClipSettings::default()).unwrap();

    clip.evaluate(&mut instance, 0.999, 1.0, false);
    instance.apply_cache();
    assert_approx(instance.bones()[1].rotation, 10.0);

    clip.evaluate(&mut instance, 1.0, 1.0, false);
    instance.apply_cache();
    assert_approx(instance.bones()[1].rotation, 90.0);
}

#[test]
fn identity_bezier_matches_linear_interpolation() {
    let mut clips = HashMap::new();
    clips.insert(
        "ease".to_string(),
        rotation_clip(
            "a",
            vec![
                RotationKey {
                    time: 0.0,
                    curve: CurveSpec::Bezier([0.0, 0.0, 1.0, 1.0]),
                    angle: 0.0,
                },
                RotationKey {
                    time: 1.0,
                    curve: CurveSpec::Linear,
                    angle: 90.0,
                },
            ],
        ),
    );
    let data = single_bone_rig(clips);
    let mut instance = SkeletonInstance::new(data, None);
    let mut clip = ClipInstance::new(&mut instance, "ease", ClipSettings::default()).unwrap();

    clip.evaluate(&mut instance, 0.5, 1.0, false);
    instance.apply_cache();
    assert!((instance.bones()[1].rotation - 45.0).abs() < 0.1);
}

#[test]
fn evaluation_clamps_to_the_last_key_and_skips_before_the_first() {
    let mut clips = HashMap::new();
    clips.insert(
        "late".to_string(),
        rotation_clip(
            "a",
            vec![
                RotationKey {
                    time: 0.5,
                    curve: CurveSpec::Linear,
                    angle: 30.0,
                },
                RotationKey {
                    time: 1.0,
                    curve: CurveSpec::Linear,
                    angle: 60.0,
                },
            ],
        ),
    );
    let data = single_bone_rig(clips);
    let mut instance = SkeletonInstance::new(data, None);
    let mut clip = ClipInstance::new(&mut instance, "late", ClipSettings::default()).unwrap();

    // Before the first key: no contribution, the bone stays at setup.
    clip.evaluate(&mut instance, 0.25, 1.0, false);
    instance.apply_cache();
    assert_approx(instance.bones()[1].rotation, 0.0);

    // Past the last key: both bracket ends collapse onto it.
    clip.evaluate(&mut instance, 5.0, 1.0, false);
    instance.apply_cache();
    assert_approx(instance.bones()[1].rotation, 60.0);

    // Time moving backwards resets the bracket hint.
    clip.evaluate(&mut instance, 0.75, 1.0, false);
    instance.apply_cache();
    assert_approx(instance.bones()[1].rotation, 45.0);
}

#[test]
fn weighted_rotation_scales_the_contribution() {
    let mut clips = HashMap::new();
    clips.insert(
        "turn".to_string(),
        rotation_clip(
            "a",
            vec![RotationKey {
                time: 0.0,
                curve: CurveSpec::Linear,
                angle: 90.0,
            }],
        ),
    );
    let data = single_bone_rig(clips);
    let mut instance = SkeletonInstance::new(data, None);
    let mut clip = ClipInstance::new(&mut instance, "turn", ClipSettings::default()).unwrap();

    clip.evaluate(&mut instance, 0.0, 0.5, false);
    instance.apply_cache();
    assert_approx(instance.bones()[1].rotation, 45.0);
}

#[test]
fn evaluator_order_does_not_change_the_committed_pose() {
    let mut bones_a = HashMap::new();
    bones_a.insert(
        "a".to_string(),
        BoneTimelinesSpec {
            rotation: vec![RotationKey {
                time: 0.0,
                curve: CurveSpec::Linear,
                angle: 30.0,
            }],
            translation: vec![Vec2Key {
                time: 0.0,
                curve: CurveSpec::Linear,
                x: 3.0,
                y: 1.0,
            }],
            ..BoneTimelinesSpec::default()
        },
    );
    let mut bones_b = HashMap::new();
    bones_b.insert(
        "a".to_string(),
        BoneTimelinesSpec {
            rotation: vec![RotationKey {
                time: 0.0,
                curve: CurveSpec::Linear,
                angle: 20.0,
            }],
            translation: vec![Vec2Key {
                time: 0.0,
                curve: CurveSpec::Linear,
                x: -1.0,
                y: 2.0,
            }],
            ..BoneTimelinesSpec::default()
        },
    );
    let mut clips = HashMap::new();
    clips.insert(
        "one".to_string(),
        ClipSpec {
            bones: bones_a,
            ..ClipSpec::default()
        },
    );
    clips.insert(
        "two".to_string(),
        ClipSpec {
            bones: bones_b,
            ..ClipSpec::default()
        },
    );
    let data = single_bone_rig(clips);

    let mut forward = SkeletonInstance::new(Arc::clone(&data), None);
    let mut one = ClipInstance::new(&mut forward, "one", ClipSettings::default()).unwrap();
    let mut two = ClipInstance::new(&mut forward, "two", ClipSettings::default()).unwrap();
    one.evaluate(&mut forward, 0.0, 0.4, false);
    two.evaluate(&mut forward, 0.0, 0.6, false);
    forward.apply_cache();

    let mut reverse = SkeletonInstance::new(data, None);
    let mut one = ClipInstance::new(&mut reverse, "one", ClipSettings::default()).unwrap();
    let mut two = ClipInstance::new(&mut reverse, "two", ClipSettings::default()).unwrap();
    two.evaluate(&mut reverse, 0.0, 0.6, false);
    one.evaluate(&mut reverse, 0.0, 0.4, false);
    reverse.apply_cache();

    assert_eq!(forward.bones()[1], reverse.bones()[1]);
}

fn attachment_rig() -> Arc<SkeletonData> {
    let mut slots_timelines = HashMap::new();
    slots_timelines.insert(
        "front".to_string(),
        SlotTimelinesSpec {
            attachment: vec![AttachmentKey {
                time: 0.0,
                attachment: Some("keyed".to_string()),
            }],
            ..SlotTimelinesSpec::default()
        },
    );
    let mut clips = HashMap::new();
    clips.insert(
        "swap".to_string(),
        ClipSpec {
            slots: slots_timelines,
            ..ClipSpec::default()
        },
    );
    Arc::new(
        SkeletonBuilder {
            bones: vec![bone("root", None)],
            slots: vec![SlotSpec {
                attachment: Some("setup".to_string()),
                ..slot("front", "root")
            }],
            clips,
            ..SkeletonBuilder::default()
        }
        .finalize()
        .unwrap(),
    )
}

#[test]
fn partial_weight_attachments_are_skipped_unless_blending_discrete() {
    let data = attachment_rig();
    let mut instance = SkeletonInstance::new(data, None);
    let mut clip = ClipInstance::new(&mut instance, "swap", ClipSettings::default()).unwrap();

    clip.evaluate(&mut instance, 0.0, 0.5, false);
    instance.apply_cache();
    assert_eq!(instance.slots()[0].attachment.as_deref(), Some("setup"));

    clip.evaluate(&mut instance, 0.0, 0.5, true);
    instance.apply_cache();
    assert_eq!(instance.slots()[0].attachment.as_deref(), Some("keyed"));
}

#[test]
fn draw_order_offsets_build_a_permutation() {
    let mut clips = HashMap::new();
    clips.insert(
        "shuffle".to_string(),
        ClipSpec {
            draw_order: vec![DrawOrderKey {
                time: 0.0,
                offsets: vec![DrawOrderOffsetSpec {
                    slot: "s1".to_string(),
                    offset: 2,
                }],
            }],
            ..ClipSpec::default()
        },
    );
    let data = Arc::new(
        SkeletonBuilder {
            bones: vec![bone("root", None)],
            slots: vec![
                slot("s0", "root"),
                slot("s1", "root"),
                slot("s2", "root"),
                slot("s3", "root"),
            ],
            clips,
            ..SkeletonBuilder::default()
        }
        .finalize()
        .unwrap(),
    );
    let mut instance = SkeletonInstance::new(data, None);
    let mut clip = ClipInstance::new(&mut instance, "shuffle", ClipSettings::default()).unwrap();

    clip.evaluate(&mut instance, 0.0, 1.0, false);
    instance.apply_cache();
    assert_eq!(instance.draw_order(), &[0, 2, 3, 1]);

    // The next frame has no draw order contribution; the commit falls
    // back to the identity order.
    instance.apply_cache();
    assert_eq!(instance.draw_order(), &[0, 1, 2, 3]);
}

fn deform_rig() -> Arc<SkeletonData> {
    let mesh = AttachmentSpec::Mesh {
        path: None,
        color: [255; 4],
        width: 1.0,
        height: 1.0,
        hull: 0,
        uvs: vec![0.0, 0.0, 1.0, 0.0],
        triangles: vec![],
        vertices: vec![0.0, 0.0, 5.0, 0.0],
    };
    let mut by_attachment = HashMap::new();
    by_attachment.insert("m".to_string(), mesh);
    let mut by_slot = HashMap::new();
    by_slot.insert("body".to_string(), by_attachment);
    let mut skins = HashMap::new();
    skins.insert(DEFAULT_SKIN.to_string(), by_slot);

    let mut deform_by_attachment = HashMap::new();
    deform_by_attachment.insert(
        "m".to_string(),
        vec![
            DeformKeySpec {
                time: 0.5,
                curve: CurveSpec::Linear,
                offset: 0,
                vertices: vec![1.0, 2.0, 3.0, 4.0],
            },
            DeformKeySpec {
                time: 1.0,
                curve: CurveSpec::Linear,
                offset: 0,
                vertices: vec![5.0, 6.0, 7.0, 8.0],
            },
        ],
    );
    let mut deform_by_slot = HashMap::new();
    deform_by_slot.insert("body".to_string(), deform_by_attachment);
    let mut deforms = HashMap::new();
    deforms.insert(DEFAULT_SKIN.to_string(), deform_by_slot);

    let mut clips = HashMap::new();
    clips.insert(
        "bend".to_string(),
        ClipSpec {
            deforms,
            ..ClipSpec::default()
        },
    );

    Arc::new(
        SkeletonBuilder {
            bones: vec![bone("root", None)],
            slots: vec![SlotSpec {
                attachment: Some("m".to_string()),
                ..slot("body", "root")
            }],
            skins,
            clips,
            ..SkeletonBuilder::default()
        }
        .finalize()
        .unwrap(),
    )
}

#[test]
fn deform_buffers_follow_evaluator_lifetime() {
    let data = deform_rig();
    let mut instance = SkeletonInstance::new(data, None);

    assert!(instance.deform(DEFAULT_SKIN, "body", "m").is_none());

    let mut clip = ClipInstance::new(&mut instance, "bend", ClipSettings::default()).unwrap();
    clip.evaluate(&mut instance, 0.5, 1.0, false);

    // One dense float pair per base vertex.
    let buffer = instance.deform(DEFAULT_SKIN, "body", "m").unwrap();
    assert_eq!(buffer, &[1.0, 2.0, 3.0, 4.0]);

    clip.retire(&mut instance);
    assert!(instance.deform(DEFAULT_SKIN, "body", "m").is_none());

    // A fresh evaluator recreates the buffer.
    let mut clip = ClipInstance::new(&mut instance, "bend", ClipSettings::default()).unwrap();
    clip.evaluate(&mut instance, 1.0, 1.0, false);
    let buffer = instance.deform(DEFAULT_SKIN, "body", "m").unwrap();
    assert_eq!(buffer, &[5.0, 6.0, 7.0, 8.0]);
    clip.retire(&mut instance);
}

#[test]
fn partial_weight_deforms_blend_additively_into_the_buffer() {
    let data = deform_rig();
    let mut instance = SkeletonInstance::new(data, None);
    let mut clip = ClipInstance::new(&mut instance, "bend", ClipSettings::default()).unwrap();

    // First write snaps regardless of weight.
    clip.evaluate(&mut instance, 0.5, 0.25, false);
    assert_eq!(
        instance.deform(DEFAULT_SKIN, "body", "m").unwrap(),
        &[1.0, 2.0, 3.0, 4.0]
    );

    // Later writes move the buffer toward the sampled value by alpha.
    clip.evaluate(&mut instance, 1.0, 0.5, false);
    assert_eq!(
        instance.deform(DEFAULT_SKIN, "body", "m").unwrap(),
        &[3.0, 4.0, 5.0, 6.0]
    );
    clip.retire(&mut instance);
}

#[test]
fn deform_before_first_key_drops_a_sole_buffer() {
    let data = deform_rig();
    let mut instance = SkeletonInstance::new(data, None);
    let mut clip = ClipInstance::new(&mut instance, "bend", ClipSettings::default()).unwrap();

    clip.evaluate(&mut instance, 0.75, 1.0, false);
    assert!(instance.deform(DEFAULT_SKIN, "body", "m").is_some());

    clip.evaluate(&mut instance, 0.0, 1.0, false);
    assert!(instance.deform(DEFAULT_SKIN, "body", "m").is_none());
    clip.retire(&mut instance);
}

fn event_rig() -> Arc<SkeletonData> {
    let mut clips = HashMap::new();
    clips.insert(
        "cues".to_string(),
        ClipSpec {
            events: vec![
                EventKey {
                    time: 0.0,
                    event: "start".to_string(),
                    int_value: Some(7),
                    ..EventKey::default()
                },
                EventKey {
                    time: 0.25,
                    event: "quarter".to_string(),
                    ..EventKey::default()
                },
                EventKey {
                    time: 0.5,
                    event: "half".to_string(),
                    string_value: Some("midway".to_string()),
                    ..EventKey::default()
                },
            ],
            ..ClipSpec::default()
        },
    );
    Arc::new(
        SkeletonBuilder {
            bones: vec![bone("root", None)],
            clips,
            ..SkeletonBuilder::default()
        }
        .finalize()
        .unwrap(),
    )
}

#[test]
fn event_ranges_are_open_start_closed_end_with_zero_special_case() {
    let data = event_rig();
    let sink = Arc::new(RecordingSink::default());
    let mut instance = SkeletonInstance::new(data, Some(sink.clone()));
    let mut clip = ClipInstance::new(&mut instance, "cues", ClipSettings::default()).unwrap();

    clip.evaluate_range(&mut instance, 0.0, 0.25, 1.0);
    {
        let events = sink.events.lock().unwrap();
        let names = events.iter().map(|e| e.0.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["start", "quarter"]);
        assert_eq!(events[0].1, 7);
    }

    clip.evaluate_range(&mut instance, 0.25, 0.5, 1.0);
    {
        let events = sink.events.lock().unwrap();
        let names = events.iter().map(|e| e.0.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["start", "quarter", "half"]);
        assert_eq!(events[2].3, "midway");
    }
}

#[test]
fn events_below_the_mix_threshold_are_suppressed() {
    let data = event_rig();
    let sink = Arc::new(RecordingSink::default());
    let mut instance = SkeletonInstance::new(data, Some(sink.clone()));
    let settings = ClipSettings {
        event_mix_threshold: 0.5,
    };
    let mut clip = ClipInstance::new(&mut instance, "cues", settings).unwrap();

    clip.evaluate_range(&mut instance, 0.0, 1.0, 0.25);
    assert!(sink.events.lock().unwrap().is_empty());

    clip.evaluate_range(&mut instance, 0.0, 1.0, 0.75);
    assert_eq!(sink.events.lock().unwrap().len(), 3);
}

#[test]
fn next_event_time_scans_strictly_forward() {
    let data = event_rig();
    let mut instance = SkeletonInstance::new(data, None);
    let clip = ClipInstance::new(&mut instance, "cues", ClipSettings::default()).unwrap();

    assert_eq!(clip.next_event_time("half", 0.0), Some(0.5));
    assert_eq!(clip.next_event_time("half", 0.5), None);
    assert_eq!(clip.next_event_time("quarter", 0.0), Some(0.25));
    assert_eq!(clip.next_event_time("missing", 0.0), None);
}

#[test]
fn max_time_spans_all_channels() {
    let data = event_rig();
    let mut instance = SkeletonInstance::new(data, None);
    let clip = ClipInstance::new(&mut instance, "cues", ClipSettings::default()).unwrap();
    assert_approx(clip.max_time(), 0.5);

    assert!(matches!(
        ClipInstance::new(&mut instance, "missing", ClipSettings::default()),
        Err(crate::Error::UnknownClip { .. })
    ));
}
