use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    AttachmentSpec, BoneSpec, IkSpec, PathSpec, PositionMode, RotateMode, SkeletonBuilder,
    SkeletonData, SkeletonInstance, SlotSpec, SpacingMode, DEFAULT_SKIN,
};

fn bone(name: &str, parent: Option<&str>) -> BoneSpec {
    BoneSpec {
        name: name.to_string(),
        parent: parent.map(str::to_string),
        ..BoneSpec::default()
    }
}

#[test]
fn two_bone_ik_reaches_a_target_inside_the_chain_span() {
    let data = Arc::new(
        SkeletonBuilder {
            bones: vec![
                bone("root", None),
                BoneSpec {
                    length: 10.0,
                    ..bone("hip", Some("root"))
                },
                BoneSpec {
                    x: 10.0,
                    length: 10.0,
                    ..bone("knee", Some("hip"))
                },
                BoneSpec {
                    x: 15.0,
                    y: 5.0,
                    ..bone("target", Some("root"))
                },
            ],
            ik: vec![IkSpec {
                name: "leg".to_string(),
                bones: vec!["hip".to_string(), "knee".to_string()],
                target: "target".to_string(),
                ..IkSpec::default()
            }],
            ..SkeletonBuilder::default()
        }
        .finalize()
        .unwrap(),
    );
    let instance = SkeletonInstance::new(data, None);

    let tip = instance.skinning_palette()[2].transform_position([10.0, 0.0]);
    assert!(
        (tip[0] - 15.0).abs() <= 1.0e-3 && (tip[1] - 5.0).abs() <= 1.0e-3,
        "tip at ({}, {}) instead of (15, 5)",
        tip[0],
        tip[1]
    );
}

#[test]
fn two_bone_ik_bend_direction_flips_the_knee() {
    fn solve(bend_positive: bool) -> f32 {
        let data = Arc::new(
            SkeletonBuilder {
                bones: vec![
                    bone("root", None),
                    BoneSpec {
                        length: 10.0,
                        ..bone("hip", Some("root"))
                    },
                    BoneSpec {
                        x: 10.0,
                        length: 10.0,
                        ..bone("knee", Some("hip"))
                    },
                    BoneSpec {
                        x: 12.0,
                        ..bone("target", Some("root"))
                    },
                ],
                ik: vec![IkSpec {
                    name: "leg".to_string(),
                    bones: vec!["hip".to_string(), "knee".to_string()],
                    target: "target".to_string(),
                    bend_positive,
                    ..IkSpec::default()
                }],
                ..SkeletonBuilder::default()
            }
            .finalize()
            .unwrap(),
        );
        let instance = SkeletonInstance::new(data, None);
        // World y of the knee joint.
        instance.skinning_palette()[2].ty
    }

    let positive = solve(true);
    let negative = solve(false);
    assert!(
        positive < -0.1,
        "positive bend folds the joint below the chain, got {positive}"
    );
    assert!(negative > 0.1, "negative bend folds it above, got {negative}");
    assert!((positive + negative).abs() < 1.0e-3, "bends are mirrored");
}

#[test]
fn unreachable_ik_target_straightens_the_chain() {
    let data = Arc::new(
        SkeletonBuilder {
            bones: vec![
                bone("root", None),
                BoneSpec {
                    length: 10.0,
                    ..bone("hip", Some("root"))
                },
                BoneSpec {
                    x: 10.0,
                    length: 10.0,
                    ..bone("knee", Some("hip"))
                },
                BoneSpec {
                    x: 40.0,
                    ..bone("target", Some("root"))
                },
            ],
            ik: vec![IkSpec {
                name: "leg".to_string(),
                bones: vec!["hip".to_string(), "knee".to_string()],
                target: "target".to_string(),
                ..IkSpec::default()
            }],
            ..SkeletonBuilder::default()
        }
        .finalize()
        .unwrap(),
    );
    let instance = SkeletonInstance::new(data, None);

    // Fully extended along +x: the tip sits at the 20-unit reach.
    let tip = instance.skinning_palette()[2].transform_position([10.0, 0.0]);
    assert!((tip[0] - 20.0).abs() <= 1.0e-3, "tip x {}", tip[0]);
    assert!(tip[1].abs() <= 1.0e-3, "tip y {}", tip[1]);
}

/// A straight 100-unit path along +x built from one cubic segment:
/// anchors at 0 and 100 with collinear handles.
fn straight_path() -> AttachmentSpec {
    AttachmentSpec::Path {
        closed: false,
        constant_speed: true,
        lengths: vec![100.0],
        vertex_count: 6,
        vertices: vec![
            -10.0, 0.0, // lead-in handle (unused for open paths)
            0.0, 0.0, // first anchor
            33.0, 0.0, // out handle
            66.0, 0.0, // in handle
            100.0, 0.0, // second anchor
            110.0, 0.0, // lead-out handle (unused for open paths)
        ],
    }
}

fn path_rig(paths: Vec<PathSpec>, bones: Vec<BoneSpec>) -> Arc<SkeletonData> {
    let mut by_attachment = HashMap::new();
    by_attachment.insert("rail".to_string(), straight_path());
    let mut by_slot = HashMap::new();
    by_slot.insert("track".to_string(), by_attachment);
    let mut skins = HashMap::new();
    skins.insert(DEFAULT_SKIN.to_string(), by_slot);

    Arc::new(
        SkeletonBuilder {
            bones,
            slots: vec![SlotSpec {
                name: "track".to_string(),
                bone: "root".to_string(),
                attachment: Some("rail".to_string()),
                ..SlotSpec::default()
            }],
            skins,
            paths,
            ..SkeletonBuilder::default()
        }
        .finalize()
        .unwrap(),
    )
}

#[test]
fn path_constraint_places_a_bone_at_the_percent_position() {
    let data = path_rig(
        vec![PathSpec {
            name: "follow".to_string(),
            bones: vec!["b1".to_string()],
            target: "track".to_string(),
            rotate_mode: RotateMode::Tangent,
            position_mode: PositionMode::Percent,
            position: 0.5,
            ..PathSpec::default()
        }],
        vec![
            bone("root", None),
            BoneSpec {
                length: 10.0,
                ..bone("b1", Some("root"))
            },
        ],
    );
    let instance = SkeletonInstance::new(data, None);

    let m = instance.skinning_palette()[1];
    assert!((m.tx - 50.0).abs() < 0.1, "tx {}", m.tx);
    assert!(m.ty.abs() < 0.1, "ty {}", m.ty);
    // Tangent of a straight +x path leaves the rotation untouched.
    assert!(m.m10.abs() < 1.0e-3);
}

#[test]
fn path_constraint_chain_spaces_bones_by_length() {
    let data = path_rig(
        vec![PathSpec {
            name: "follow".to_string(),
            bones: vec!["b1".to_string(), "b2".to_string()],
            target: "track".to_string(),
            rotate_mode: RotateMode::Chain,
            spacing_mode: SpacingMode::Length,
            position_mode: PositionMode::Percent,
            position: 0.0,
            ..PathSpec::default()
        }],
        vec![
            bone("root", None),
            BoneSpec {
                length: 50.0,
                ..bone("b1", Some("root"))
            },
            BoneSpec {
                x: 50.0,
                length: 50.0,
                ..bone("b2", Some("b1"))
            },
        ],
    );
    let instance = SkeletonInstance::new(data, None);

    let m1 = instance.skinning_palette()[1];
    let m2 = instance.skinning_palette()[2];
    assert!(m1.tx.abs() < 0.1, "b1 tx {}", m1.tx);
    assert!((m2.tx - 50.0).abs() < 0.1, "b2 tx {}", m2.tx);
    assert!(m1.m10.abs() < 1.0e-3 && m2.m10.abs() < 1.0e-3);
}

#[test]
fn path_constraint_position_mix_blends_toward_the_path() {
    let data = path_rig(
        vec![PathSpec {
            name: "follow".to_string(),
            bones: vec!["b1".to_string()],
            target: "track".to_string(),
            rotate_mode: RotateMode::Tangent,
            position_mode: PositionMode::Percent,
            position: 1.0,
            position_mix: 0.5,
            rotation_mix: 0.0,
            ..PathSpec::default()
        }],
        vec![
            bone("root", None),
            BoneSpec {
                length: 10.0,
                ..bone("b1", Some("root"))
            },
        ],
    );
    let instance = SkeletonInstance::new(data, None);

    // Halfway between the bone's rest position (0) and the path end.
    let m = instance.skinning_palette()[1];
    assert!((m.tx - 50.0).abs() < 0.1, "tx {}", m.tx);
}

#[test]
fn inactive_path_mixes_leave_the_pose_alone() {
    let data = path_rig(
        vec![PathSpec {
            name: "follow".to_string(),
            bones: vec!["b1".to_string()],
            target: "track".to_string(),
            position: 0.75,
            position_mix: 0.0,
            rotation_mix: 0.0,
            ..PathSpec::default()
        }],
        vec![
            bone("root", None),
            BoneSpec {
                x: 7.0,
                length: 10.0,
                ..bone("b1", Some("root"))
            },
        ],
    );
    let instance = SkeletonInstance::new(data, None);
    assert!((instance.skinning_palette()[1].tx - 7.0).abs() < 1.0e-4);
}
