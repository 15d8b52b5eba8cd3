use std::collections::HashMap;

use crate::{
    AttachmentData, AttachmentSpec, BoneSpec, ClipSpec, CurveSpec, CurveType, Error, IkSpec,
    MeshVertices, PathSpec, PoseTask, RotationKey, SkeletonBuilder, SlotSpec, BoneTimelinesSpec,
    DeformKeySpec, DEFAULT_SKIN,
};

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

fn skin_with(
    slot: &str,
    attachment: &str,
    spec: AttachmentSpec,
) -> HashMap<String, HashMap<String, AttachmentSpec>> {
    let mut by_attachment = HashMap::new();
    by_attachment.insert(attachment.to_string(), spec);
    let mut by_slot = HashMap::new();
    by_slot.insert(slot.to_string(), by_attachment);
    by_slot
}

#[test]
fn finalize_resolves_parent_indices() {
    let builder = SkeletonBuilder {
        bones: vec![bone("root", None), bone("hip", Some("root")), bone("leg", Some("hip"))],
        ..SkeletonBuilder::default()
    };
    let data = builder.finalize().unwrap();
    assert_eq!(data.bones[0].parent, None);
    assert_eq!(data.bones[1].parent, Some(0));
    assert_eq!(data.bones[2].parent, Some(1));
    assert_eq!(data.bone_index["leg"], 2);
}

#[test]
fn finalize_rejects_unknown_parent() {
    let builder = SkeletonBuilder {
        bones: vec![bone("root", None), bone("hip", Some("missing"))],
        ..SkeletonBuilder::default()
    };
    assert!(matches!(
        builder.finalize(),
        Err(Error::UnknownBoneParent { .. })
    ));
}

#[test]
fn finalize_rejects_non_topological_order() {
    let builder = SkeletonBuilder {
        bones: vec![bone("root", None), bone("a", Some("b")), bone("b", Some("root"))],
        ..SkeletonBuilder::default()
    };
    assert!(matches!(
        builder.finalize(),
        Err(Error::NonTopologicalBone { .. })
    ));
}

#[test]
fn finalize_rejects_parentless_non_root() {
    let builder = SkeletonBuilder {
        bones: vec![bone("root", None), bone("stray", None)],
        ..SkeletonBuilder::default()
    };
    assert!(matches!(
        builder.finalize(),
        Err(Error::MissingBoneParent { .. })
    ));
}

#[test]
fn finalize_rejects_missing_ik_target() {
    let builder = SkeletonBuilder {
        bones: vec![bone("root", None), bone("arm", Some("root"))],
        ik: vec![IkSpec {
            name: "aim".to_string(),
            bones: vec!["arm".to_string()],
            target: "missing".to_string(),
            ..IkSpec::default()
        }],
        ..SkeletonBuilder::default()
    };
    assert!(matches!(
        builder.finalize(),
        Err(Error::UnknownConstraintTarget { .. })
    ));
}

#[test]
fn finalize_rejects_empty_constraint_chain() {
    let builder = SkeletonBuilder {
        bones: vec![bone("root", None), bone("target", Some("root"))],
        ik: vec![IkSpec {
            name: "aim".to_string(),
            bones: Vec::new(),
            target: "target".to_string(),
            ..IkSpec::default()
        }],
        ..SkeletonBuilder::default()
    };
    assert!(matches!(
        builder.finalize(),
        Err(Error::EmptyConstraintChain { .. })
    ));
}

#[test]
fn path_and_clipping_vertex_counts_are_doubled() {
    let path = AttachmentSpec::Path {
        closed: false,
        constant_speed: true,
        lengths: vec![100.0],
        vertex_count: 6,
        vertices: vec![
            -10.0, 0.0, 0.0, 0.0, 33.0, 0.0, 66.0, 0.0, 100.0, 0.0, 110.0, 0.0,
        ],
    };
    let mut skins = HashMap::new();
    skins.insert(DEFAULT_SKIN.to_string(), skin_with("track", "track", path));

    let builder = SkeletonBuilder {
        bones: vec![bone("root", None)],
        slots: vec![slot("track", "root")],
        skins,
        ..SkeletonBuilder::default()
    };
    let data = builder.finalize().unwrap();
    let attachment = data.skins[DEFAULT_SKIN].attachment(0, "track").unwrap();
    let AttachmentData::Path(path) = attachment else {
        panic!("expected a path attachment");
    };
    assert_eq!(path.vertex_count, 12);
    assert_eq!(path.vertices.vertex_count(), 6);
}

#[test]
fn weighted_vertex_streams_unpack_into_bone_links() {
    // Two vertices, each weighted to a single bone:
    // (count, bone, x, y, weight) per vertex.
    let stream = vec![1.0, 0.0, 1.5, 2.5, 1.0, 1.0, 1.0, -3.0, 4.0, 1.0];
    let bbox = AttachmentSpec::BoundingBox {
        vertex_count: 2,
        vertices: stream,
    };
    let mut skins = HashMap::new();
    skins.insert(DEFAULT_SKIN.to_string(), skin_with("box", "box", bbox));

    let builder = SkeletonBuilder {
        bones: vec![bone("root", None), bone("limb", Some("root"))],
        slots: vec![slot("box", "root")],
        skins,
        ..SkeletonBuilder::default()
    };
    let data = builder.finalize().unwrap();
    let AttachmentData::BoundingBox(bbox) = data.skins[DEFAULT_SKIN].attachment(0, "box").unwrap()
    else {
        panic!("expected a bounding box");
    };
    let MeshVertices::Weighted(vertices) = &bbox.vertices else {
        panic!("expected weighted vertices");
    };
    assert_eq!(vertices.len(), 2);
    assert_eq!(vertices[0].len(), 1);
    assert_eq!(vertices[0][0].bone, 0);
    assert_eq!(vertices[1][0].bone, 1);
    assert_eq!(vertices[1][0].x, -3.0);
}

#[test]
fn linked_mesh_resolves_into_the_mesh_arena() {
    let mesh = AttachmentSpec::Mesh {
        path: None,
        color: [255; 4],
        width: 10.0,
        height: 10.0,
        hull: 4,
        uvs: vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
        triangles: vec![0, 1, 2, 2, 3, 0],
        vertices: vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0],
    };
    let link = AttachmentSpec::LinkedMesh {
        skin: Some(DEFAULT_SKIN.to_string()),
        parent: "base".to_string(),
        deform: true,
        color: [255; 4],
        width: 10.0,
        height: 10.0,
    };

    let mut skins = HashMap::new();
    skins.insert(DEFAULT_SKIN.to_string(), skin_with("body", "base", mesh));
    skins.insert("red".to_string(), skin_with("body", "tinted", link));

    let builder = SkeletonBuilder {
        bones: vec![bone("root", None)],
        slots: vec![slot("body", "root")],
        skins,
        ..SkeletonBuilder::default()
    };
    let data = builder.finalize().unwrap();

    let AttachmentData::Mesh(base_index) = data.skins[DEFAULT_SKIN].attachment(0, "base").unwrap()
    else {
        panic!("expected a mesh");
    };
    let AttachmentData::LinkedMesh(link) = data.skins["red"].attachment(0, "tinted").unwrap()
    else {
        panic!("expected a linked mesh");
    };
    assert_eq!(link.mesh, *base_index);
    assert_eq!(data.meshes[link.mesh].name, "base");
}

#[test]
fn linked_mesh_with_missing_parent_fails() {
    let link = AttachmentSpec::LinkedMesh {
        skin: None,
        parent: "missing".to_string(),
        deform: true,
        color: [255; 4],
        width: 0.0,
        height: 0.0,
    };
    let mut skins = HashMap::new();
    skins.insert(DEFAULT_SKIN.to_string(), skin_with("body", "tinted", link));

    let builder = SkeletonBuilder {
        bones: vec![bone("root", None)],
        slots: vec![slot("body", "root")],
        skins,
        ..SkeletonBuilder::default()
    };
    assert!(matches!(
        builder.finalize(),
        Err(Error::LinkedMeshUnknownParent { .. })
    ));
}

#[test]
fn clip_timelines_for_unknown_bones_are_dropped() {
    let mut clips = HashMap::new();
    let mut bones = HashMap::new();
    bones.insert(
        "ghost".to_string(),
        BoneTimelinesSpec {
            rotation: vec![RotationKey {
                time: 0.0,
                curve: CurveSpec::Linear,
                angle: 10.0,
            }],
            ..BoneTimelinesSpec::default()
        },
    );
    bones.insert(
        "root".to_string(),
        BoneTimelinesSpec {
            rotation: vec![RotationKey {
                time: 0.0,
                curve: CurveSpec::Linear,
                angle: 10.0,
            }],
            ..BoneTimelinesSpec::default()
        },
    );
    clips.insert(
        "wave".to_string(),
        ClipSpec {
            bones,
            ..ClipSpec::default()
        },
    );

    let builder = SkeletonBuilder {
        bones: vec![bone("root", None)],
        clips,
        ..SkeletonBuilder::default()
    };
    let data = builder.finalize().unwrap();
    let (_, clip) = data.clip("wave").unwrap();
    assert!(clip.bones.contains_key("root"));
    assert!(!clip.bones.contains_key("ghost"));
}

#[test]
fn bezier_keys_share_the_curve_pool() {
    let mut clips = HashMap::new();
    let mut bones = HashMap::new();
    bones.insert(
        "root".to_string(),
        BoneTimelinesSpec {
            rotation: vec![
                RotationKey {
                    time: 0.0,
                    curve: CurveSpec::Bezier([0.25, 0.1, 0.25, 1.0]),
                    angle: 0.0,
                },
                RotationKey {
                    time: 1.0,
                    curve: CurveSpec::Stepped,
                    angle: 90.0,
                },
            ],
            ..BoneTimelinesSpec::default()
        },
    );
    clips.insert(
        "wave".to_string(),
        ClipSpec {
            bones,
            ..ClipSpec::default()
        },
    );

    let builder = SkeletonBuilder {
        bones: vec![bone("root", None)],
        clips,
        ..SkeletonBuilder::default()
    };
    let data = builder.finalize().unwrap();
    assert_eq!(data.curves.len(), 1);

    let (_, clip) = data.clip("wave").unwrap();
    let frames = &clip.bones["root"].rotation;
    assert_eq!(frames[0].curve.curve_type(), CurveType::Bezier);
    assert_eq!(frames[0].curve.bezier_offset(), 0);
    assert_eq!(frames[1].curve.curve_type(), CurveType::Stepped);

    // The tabulated x samples must be non-decreasing so the bracket
    // search in the evaluator is well defined.
    let table = &data.curves[0];
    let mut prev = 0.0f32;
    for i in (0..table.len()).step_by(2) {
        assert!(table[i] >= prev, "x samples must not decrease");
        prev = table[i];
    }
    assert!(prev <= 1.0 + 1.0e-4);
}

#[test]
fn deform_keys_expand_against_the_base_vertices() {
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
    let mut skins = HashMap::new();
    skins.insert(DEFAULT_SKIN.to_string(), skin_with("body", "m", mesh));

    let mut deforms = HashMap::new();
    let mut by_slot = HashMap::new();
    let mut by_attachment = HashMap::new();
    by_attachment.insert(
        "m".to_string(),
        vec![DeformKeySpec {
            time: 0.0,
            curve: CurveSpec::Linear,
            offset: 2,
            vertices: vec![1.0, -1.0],
        }],
    );
    by_slot.insert("body".to_string(), by_attachment);
    deforms.insert(DEFAULT_SKIN.to_string(), by_slot);

    let mut clips = HashMap::new();
    clips.insert(
        "bend".to_string(),
        ClipSpec {
            deforms,
            ..ClipSpec::default()
        },
    );

    let builder = SkeletonBuilder {
        bones: vec![bone("root", None)],
        slots: vec![slot("body", "root")],
        skins,
        clips,
        ..SkeletonBuilder::default()
    };
    let data = builder.finalize().unwrap();
    let (_, clip) = data.clip("bend").unwrap();
    let frames = &clip.deforms[DEFAULT_SKIN]["body"]["m"];
    assert_eq!(frames[0].vertices, vec![0.0, 0.0, 1.0, -1.0]);
}

#[test]
fn deform_keys_past_the_base_vertices_fail() {
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
    let mut skins = HashMap::new();
    skins.insert(DEFAULT_SKIN.to_string(), skin_with("body", "m", mesh));

    let mut deforms = HashMap::new();
    let mut by_slot = HashMap::new();
    let mut by_attachment = HashMap::new();
    by_attachment.insert(
        "m".to_string(),
        vec![DeformKeySpec {
            time: 0.0,
            curve: CurveSpec::Linear,
            offset: 3,
            vertices: vec![1.0, -1.0],
        }],
    );
    by_slot.insert("body".to_string(), by_attachment);
    deforms.insert(DEFAULT_SKIN.to_string(), by_slot);

    let mut clips = HashMap::new();
    clips.insert(
        "bend".to_string(),
        ClipSpec {
            deforms,
            ..ClipSpec::default()
        },
    );

    let builder = SkeletonBuilder {
        bones: vec![bone("root", None)],
        slots: vec![slot("body", "root")],
        skins,
        clips,
        ..SkeletonBuilder::default()
    };
    assert!(matches!(
        builder.finalize(),
        Err(Error::DeformVertexOverflow { .. })
    ));
}

#[test]
fn pose_tasks_visit_dependencies_before_constraints() {
    // root -> a -> b, plus a separate target bone; one IK on b.
    let builder = SkeletonBuilder {
        bones: vec![
            bone("root", None),
            bone("a", Some("root")),
            bone("b", Some("a")),
            bone("target", Some("root")),
        ],
        ik: vec![IkSpec {
            name: "aim".to_string(),
            bones: vec!["b".to_string()],
            target: "target".to_string(),
            ..IkSpec::default()
        }],
        ..SkeletonBuilder::default()
    };
    let data = builder.finalize().unwrap();
    assert_eq!(
        data.pose_tasks,
        vec![
            PoseTask::Bone(3),
            PoseTask::Bone(1),
            PoseTask::Bone(2),
            PoseTask::Ik(0),
        ]
    );
}

#[test]
fn pose_tasks_revisit_children_of_constrained_bones() {
    // root -> a -> b; IK manipulates a, so b must be posed after it.
    let builder = SkeletonBuilder {
        bones: vec![
            bone("root", None),
            bone("a", Some("root")),
            bone("b", Some("a")),
            bone("target", Some("root")),
        ],
        ik: vec![IkSpec {
            name: "aim".to_string(),
            bones: vec!["a".to_string()],
            target: "target".to_string(),
            ..IkSpec::default()
        }],
        ..SkeletonBuilder::default()
    };
    let data = builder.finalize().unwrap();
    let ik_at = data
        .pose_tasks
        .iter()
        .position(|t| *t == PoseTask::Ik(0))
        .unwrap();
    let b_at = data
        .pose_tasks
        .iter()
        .position(|t| *t == PoseTask::Bone(2))
        .unwrap();
    assert!(b_at > ik_at, "child of a constrained bone reposes after the constraint");

    // Every non-root bone appears at most once as a bone task.
    for bone_index in 1..data.bones.len() {
        let visits = data
            .pose_tasks
            .iter()
            .filter(|t| **t == PoseTask::Bone(bone_index))
            .count();
        assert!(visits <= 1);
    }
}

#[test]
fn path_constraints_require_a_default_skin() {
    let builder = SkeletonBuilder {
        bones: vec![bone("root", None), bone("b1", Some("root"))],
        slots: vec![slot("track", "root")],
        paths: vec![PathSpec {
            name: "rail".to_string(),
            bones: vec!["b1".to_string()],
            target: "track".to_string(),
            ..PathSpec::default()
        }],
        ..SkeletonBuilder::default()
    };
    assert!(matches!(
        builder.finalize(),
        Err(Error::PathConstraintMissingDefaultSkin { .. })
    ));
}
