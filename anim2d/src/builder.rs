//! Two-phase construction of [`SkeletonData`].
//!
//! The builder holds a shell of the definition in which every reference
//! is a string id, curves are raw control points and vertex streams are
//! in their serialized interleaved form. [`SkeletonBuilder::finalize`]
//! resolves ids to indices, unpacks vertex streams, populates the shared
//! Bezier pool and computes the pose task list. The shell types derive
//! `serde::Deserialize` behind the `json` feature; the finalized model
//! never does.

use std::collections::HashMap;

use crate::error::Error;
use crate::model::*;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum CurveSpec {
    #[default]
    Linear,
    Stepped,
    Bezier([f32; 4]),
}

#[cfg(feature = "json")]
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum CurveSpecRepr {
    Name(String),
    ControlPoints([f32; 4]),
}

#[cfg(feature = "json")]
impl TryFrom<CurveSpecRepr> for CurveSpec {
    type Error = String;

    fn try_from(repr: CurveSpecRepr) -> Result<Self, String> {
        match repr {
            CurveSpecRepr::Name(name) => match name.as_str() {
                "linear" => Ok(CurveSpec::Linear),
                "stepped" => Ok(CurveSpec::Stepped),
                other => Err(format!("unknown curve type '{other}'")),
            },
            CurveSpecRepr::ControlPoints(cp) => Ok(CurveSpec::Bezier(cp)),
        }
    }
}

#[cfg(feature = "json")]
impl<'de> serde::Deserialize<'de> for CurveSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr = CurveSpecRepr::deserialize(deserializer)?;
        CurveSpec::try_from(repr).map_err(serde::de::Error::custom)
    }
}

fn white() -> [u8; 4] {
    [255, 255, 255, 255]
}

#[cfg(feature = "json")]
fn one() -> f32 {
    1.0
}

#[cfg(feature = "json")]
fn yes() -> bool {
    true
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct BoneSpec {
    pub name: String,
    pub parent: Option<String>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub transform_mode: TransformMode,
}

impl Default for BoneSpec {
    fn default() -> Self {
        BoneSpec {
            name: String::new(),
            parent: None,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            transform_mode: TransformMode::Normal,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct SlotSpec {
    pub name: String,
    pub bone: String,
    pub attachment: Option<String>,
    pub color: [u8; 4],
    pub dark_color: Option<[u8; 3]>,
    pub blend: BlendMode,
}

impl Default for SlotSpec {
    fn default() -> Self {
        SlotSpec {
            name: String::new(),
            bone: String::new(),
            attachment: None,
            color: white(),
            dark_color: None,
            blend: BlendMode::Normal,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct IkSpec {
    pub name: String,
    pub order: i32,
    pub bones: Vec<String>,
    pub target: String,
    pub mix: f32,
    pub softness: f32,
    pub bend_positive: bool,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
}

impl Default for IkSpec {
    fn default() -> Self {
        IkSpec {
            name: String::new(),
            order: 0,
            bones: Vec::new(),
            target: String::new(),
            mix: 1.0,
            softness: 0.0,
            bend_positive: true,
            compress: false,
            stretch: false,
            uniform: false,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct PathSpec {
    pub name: String,
    pub order: i32,
    pub bones: Vec<String>,
    /// Target slot id.
    pub target: String,
    pub position_mode: PositionMode,
    pub spacing_mode: SpacingMode,
    pub rotate_mode: RotateMode,
    pub offset_rotation: f32,
    pub position: f32,
    pub spacing: f32,
    pub position_mix: f32,
    pub rotation_mix: f32,
}

impl Default for PathSpec {
    fn default() -> Self {
        PathSpec {
            name: String::new(),
            order: 0,
            bones: Vec::new(),
            target: String::new(),
            position_mode: PositionMode::Percent,
            spacing_mode: SpacingMode::Length,
            rotate_mode: RotateMode::Tangent,
            offset_rotation: 0.0,
            position: 0.0,
            spacing: 0.0,
            position_mix: 1.0,
            rotation_mix: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct TransformSpec {
    pub name: String,
    pub order: i32,
    pub bones: Vec<String>,
    pub target: String,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_rotation: f32,
    pub offset_scale_x: f32,
    pub offset_scale_y: f32,
    pub offset_shear_y: f32,
    pub position_mix: f32,
    pub rotation_mix: f32,
    pub scale_mix: f32,
    pub shear_mix: f32,
    pub local: bool,
    pub relative: bool,
}

impl Default for TransformSpec {
    fn default() -> Self {
        TransformSpec {
            name: String::new(),
            order: 0,
            bones: Vec::new(),
            target: String::new(),
            offset_x: 0.0,
            offset_y: 0.0,
            offset_rotation: 0.0,
            offset_scale_x: 0.0,
            offset_scale_y: 0.0,
            offset_shear_y: 0.0,
            position_mix: 1.0,
            rotation_mix: 1.0,
            scale_mix: 1.0,
            shear_mix: 1.0,
            local: false,
            relative: false,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(tag = "type", rename_all = "camelCase"))]
pub enum AttachmentSpec {
    #[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
    Region {
        #[cfg_attr(feature = "json", serde(default))]
        path: Option<String>,
        #[cfg_attr(feature = "json", serde(default))]
        x: f32,
        #[cfg_attr(feature = "json", serde(default))]
        y: f32,
        #[cfg_attr(feature = "json", serde(default))]
        rotation: f32,
        #[cfg_attr(feature = "json", serde(default = "one"))]
        scale_x: f32,
        #[cfg_attr(feature = "json", serde(default = "one"))]
        scale_y: f32,
        #[cfg_attr(feature = "json", serde(default))]
        width: f32,
        #[cfg_attr(feature = "json", serde(default))]
        height: f32,
        #[cfg_attr(feature = "json", serde(default = "white"))]
        color: [u8; 4],
    },
    #[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
    BoundingBox {
        vertex_count: usize,
        vertices: Vec<f32>,
    },
    #[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
    Mesh {
        #[cfg_attr(feature = "json", serde(default))]
        path: Option<String>,
        #[cfg_attr(feature = "json", serde(default = "white"))]
        color: [u8; 4],
        #[cfg_attr(feature = "json", serde(default))]
        width: f32,
        #[cfg_attr(feature = "json", serde(default))]
        height: f32,
        #[cfg_attr(feature = "json", serde(default))]
        hull: i32,
        /// Flat `(u, v)` pairs; their count is the logical vertex count.
        uvs: Vec<f32>,
        triangles: Vec<u16>,
        vertices: Vec<f32>,
    },
    #[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
    LinkedMesh {
        #[cfg_attr(feature = "json", serde(default))]
        skin: Option<String>,
        parent: String,
        #[cfg_attr(feature = "json", serde(default = "yes"))]
        deform: bool,
        #[cfg_attr(feature = "json", serde(default = "white"))]
        color: [u8; 4],
        #[cfg_attr(feature = "json", serde(default))]
        width: f32,
        #[cfg_attr(feature = "json", serde(default))]
        height: f32,
    },
    #[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
    Path {
        #[cfg_attr(feature = "json", serde(default))]
        closed: bool,
        #[cfg_attr(feature = "json", serde(default = "yes"))]
        constant_speed: bool,
        #[cfg_attr(feature = "json", serde(default))]
        lengths: Vec<f32>,
        vertex_count: usize,
        vertices: Vec<f32>,
    },
    #[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
    Point {
        #[cfg_attr(feature = "json", serde(default))]
        x: f32,
        #[cfg_attr(feature = "json", serde(default))]
        y: f32,
        #[cfg_attr(feature = "json", serde(default))]
        rotation: f32,
    },
    #[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
    Clipping {
        #[cfg_attr(feature = "json", serde(default))]
        end_slot: Option<String>,
        vertex_count: usize,
        vertices: Vec<f32>,
    },
}

/// Slot id -> attachment id -> attachment.
pub type SkinSpec = HashMap<String, HashMap<String, AttachmentSpec>>;

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct RotationKey {
    pub time: f32,
    pub curve: CurveSpec,
    pub angle: f32,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct Vec2Key {
    pub time: f32,
    pub curve: CurveSpec,
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct ScaleKey {
    pub time: f32,
    pub curve: CurveSpec,
    pub x: f32,
    pub y: f32,
}

impl Default for ScaleKey {
    fn default() -> Self {
        ScaleKey {
            time: 0.0,
            curve: CurveSpec::Linear,
            x: 1.0,
            y: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct IkKey {
    pub time: f32,
    pub curve: CurveSpec,
    pub mix: f32,
    pub softness: f32,
    pub bend_positive: bool,
    pub compress: bool,
    pub stretch: bool,
}

impl Default for IkKey {
    fn default() -> Self {
        IkKey {
            time: 0.0,
            curve: CurveSpec::Linear,
            mix: 1.0,
            softness: 0.0,
            bend_positive: true,
            compress: false,
            stretch: false,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct PathMixKey {
    pub time: f32,
    pub curve: CurveSpec,
    pub position_mix: f32,
    pub rotation_mix: f32,
}

impl Default for PathMixKey {
    fn default() -> Self {
        PathMixKey {
            time: 0.0,
            curve: CurveSpec::Linear,
            position_mix: 1.0,
            rotation_mix: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct ValueKey {
    pub time: f32,
    pub curve: CurveSpec,
    pub value: f32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct TransformKey {
    pub time: f32,
    pub curve: CurveSpec,
    pub position_mix: f32,
    pub rotation_mix: f32,
    pub scale_mix: f32,
    pub shear_mix: f32,
}

impl Default for TransformKey {
    fn default() -> Self {
        TransformKey {
            time: 0.0,
            curve: CurveSpec::Linear,
            position_mix: 1.0,
            rotation_mix: 1.0,
            scale_mix: 1.0,
            shear_mix: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct ColorKey {
    pub time: f32,
    pub curve: CurveSpec,
    pub color: [u8; 4],
}

impl Default for ColorKey {
    fn default() -> Self {
        ColorKey {
            time: 0.0,
            curve: CurveSpec::Linear,
            color: white(),
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct TwoColorKey {
    pub time: f32,
    pub curve: CurveSpec,
    pub light: [u8; 4],
    pub dark: [u8; 3],
}

impl Default for TwoColorKey {
    fn default() -> Self {
        TwoColorKey {
            time: 0.0,
            curve: CurveSpec::Linear,
            light: white(),
            dark: [0, 0, 0],
        }
    }
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct AttachmentKey {
    pub time: f32,
    pub attachment: Option<String>,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct DeformKeySpec {
    pub time: f32,
    pub curve: CurveSpec,
    /// Offset (in floats) of `vertices` within the dense base array.
    pub offset: usize,
    pub vertices: Vec<f32>,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct DrawOrderOffsetSpec {
    pub slot: String,
    pub offset: i32,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct DrawOrderKey {
    pub time: f32,
    pub offsets: Vec<DrawOrderOffsetSpec>,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct EventKey {
    pub time: f32,
    pub event: String,
    pub int_value: Option<i32>,
    pub float_value: Option<f32>,
    pub string_value: Option<String>,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct BoneTimelinesSpec {
    pub rotation: Vec<RotationKey>,
    pub translation: Vec<Vec2Key>,
    pub scale: Vec<ScaleKey>,
    pub shear: Vec<Vec2Key>,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct SlotTimelinesSpec {
    pub attachment: Vec<AttachmentKey>,
    pub color: Vec<ColorKey>,
    pub two_color: Vec<TwoColorKey>,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct PathTimelinesSpec {
    pub mix: Vec<PathMixKey>,
    pub position: Vec<ValueKey>,
    pub spacing: Vec<ValueKey>,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct ClipSpec {
    pub bones: HashMap<String, BoneTimelinesSpec>,
    pub slots: HashMap<String, SlotTimelinesSpec>,
    pub ik: HashMap<String, Vec<IkKey>>,
    pub paths: HashMap<String, PathTimelinesSpec>,
    pub transforms: HashMap<String, Vec<TransformKey>>,
    /// Skin id -> slot id -> attachment id -> keys.
    pub deforms: HashMap<String, HashMap<String, HashMap<String, Vec<DeformKeySpec>>>>,
    pub draw_order: Vec<DrawOrderKey>,
    pub events: Vec<EventKey>,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct SkeletonBuilder {
    pub meta: MetaData,
    pub bones: Vec<BoneSpec>,
    pub slots: Vec<SlotSpec>,
    pub ik: Vec<IkSpec>,
    pub paths: Vec<PathSpec>,
    pub transforms: Vec<TransformSpec>,
    pub skins: HashMap<String, SkinSpec>,
    pub events: HashMap<String, EventData>,
    pub clips: HashMap<String, ClipSpec>,
}

/// Tabulates 9 `(x, y)` samples of the cubic Bezier
/// `(0,0) -> (cx0,cy0) -> (cx1,cy1) -> (1,1)` by forward differences.
fn populate_curve(control_points: [f32; 4]) -> BezierCurve {
    let [cx0, cy0, cx1, cy1] = control_points;

    let tmp_x = (-cx0 * 2.0 + cx1) * 0.03;
    let tmp_y = (-cy0 * 2.0 + cy1) * 0.03;

    let dddx = ((cx0 - cx1) * 3.0 + 1.0) * 0.006;
    let dddy = ((cy0 - cy1) * 3.0 + 1.0) * 0.006;

    let mut ddx = tmp_x * 2.0 + dddx;
    let mut ddy = tmp_y * 2.0 + dddy;

    let mut dx = cx0 * 0.3 + tmp_x + dddx * 0.16666667;
    let mut dy = cy0 * 0.3 + tmp_y + dddy * 0.16666667;

    let mut x = dx;
    let mut y = dy;

    let mut out = [0.0f32; 18];
    for i in (0..out.len()).step_by(2) {
        out[i] = x;
        out[i + 1] = y;
        dx += ddx;
        dy += ddy;
        ddx += dddx;
        ddy += dddy;
        x += dx;
        y += dy;
    }
    out
}

struct CurvePool {
    curves: Vec<BezierCurve>,
}

impl CurvePool {
    fn resolve(&mut self, spec: &CurveSpec) -> Curve {
        match spec {
            CurveSpec::Linear => Curve::LINEAR,
            CurveSpec::Stepped => Curve::STEPPED,
            CurveSpec::Bezier(cp) => {
                let offset = self.curves.len();
                self.curves.push(populate_curve(*cp));
                Curve::bezier(offset)
            }
        }
    }
}

fn sort_by_time<T>(frames: &mut [T], time: impl Fn(&T) -> f32) {
    frames.sort_by(|a, b| time(a).total_cmp(&time(b)));
}

/// Splits a serialized vertex stream into unweighted pairs or weighted
/// per-vertex bone links. The stream is unweighted exactly when it holds
/// `vertex_count * 2` floats; otherwise it is interleaved as
/// `(bone_count, (bone, x, y, weight) * bone_count)` per vertex.
fn unpack_vertices(
    attachment: &str,
    vertex_count: usize,
    raw: &[f32],
) -> Result<MeshVertices, Error> {
    if raw.len() == vertex_count * 2 {
        let v = raw.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
        return Ok(MeshVertices::Unweighted(v));
    }

    let mut out = Vec::with_capacity(vertex_count);
    let mut i = 0usize;
    while i < raw.len() {
        let n = raw[i] as usize;
        i += 1;
        if i + n * 4 > raw.len() {
            return Err(Error::InvalidVertexStream {
                attachment: attachment.to_string(),
                message: format!("truncated weight group at float {i}"),
            });
        }
        let mut weights = Vec::with_capacity(n);
        for _ in 0..n {
            weights.push(VertexWeight {
                bone: raw[i] as usize,
                x: raw[i + 1],
                y: raw[i + 2],
                weight: raw[i + 3],
            });
            i += 4;
        }
        out.push(weights);
    }
    if out.len() != vertex_count {
        return Err(Error::InvalidVertexStream {
            attachment: attachment.to_string(),
            message: format!("expected {vertex_count} vertices, found {}", out.len()),
        });
    }
    Ok(MeshVertices::Weighted(out))
}

impl SkeletonBuilder {
    pub fn finalize(self) -> Result<SkeletonData, Error> {
        let SkeletonBuilder {
            meta,
            bones: bone_specs,
            slots: slot_specs,
            ik: ik_specs,
            paths: path_specs,
            transforms: transform_specs,
            skins: skin_specs,
            events,
            clips: clip_specs,
        } = self;

        // Bones: id table, parent resolution, topological check.
        let mut bone_index = HashMap::with_capacity(bone_specs.len());
        for (i, bone) in bone_specs.iter().enumerate() {
            if bone_index.insert(bone.name.clone(), i).is_some() {
                return Err(Error::DuplicateId {
                    kind: "bone",
                    id: bone.name.clone(),
                });
            }
        }
        let mut bones = Vec::with_capacity(bone_specs.len());
        for (i, spec) in bone_specs.iter().enumerate() {
            let parent = match &spec.parent {
                Some(parent_id) => {
                    if i == 0 {
                        return Err(Error::RootBoneHasParent {
                            bone: spec.name.clone(),
                        });
                    }
                    let parent =
                        *bone_index
                            .get(parent_id)
                            .ok_or_else(|| Error::UnknownBoneParent {
                                bone: spec.name.clone(),
                                parent: parent_id.clone(),
                            })?;
                    if parent >= i {
                        return Err(Error::NonTopologicalBone {
                            bone: spec.name.clone(),
                            parent: parent_id.clone(),
                        });
                    }
                    Some(parent)
                }
                None if i == 0 => None,
                None => {
                    return Err(Error::MissingBoneParent {
                        bone: spec.name.clone(),
                    });
                }
            };
            bones.push(BoneData {
                name: spec.name.clone(),
                parent,
                length: spec.length,
                x: spec.x,
                y: spec.y,
                rotation: spec.rotation,
                scale_x: spec.scale_x,
                scale_y: spec.scale_y,
                shear_x: spec.shear_x,
                shear_y: spec.shear_y,
                transform_mode: spec.transform_mode,
            });
        }

        // Slots.
        let mut slot_index = HashMap::with_capacity(slot_specs.len());
        let mut slots = Vec::with_capacity(slot_specs.len());
        for (i, spec) in slot_specs.iter().enumerate() {
            if slot_index.insert(spec.name.clone(), i).is_some() {
                return Err(Error::DuplicateId {
                    kind: "slot",
                    id: spec.name.clone(),
                });
            }
            let bone = *bone_index
                .get(&spec.bone)
                .ok_or_else(|| Error::UnknownSlotBone {
                    slot: spec.name.clone(),
                    bone: spec.bone.clone(),
                })?;
            slots.push(SlotData {
                name: spec.name.clone(),
                bone,
                attachment: spec.attachment.clone(),
                color: spec.color,
                dark_color: spec.dark_color,
                blend: spec.blend,
            });
        }

        // Constraints.
        let resolve_chain = |kind: &'static str,
                             constraint: &str,
                             ids: &[String]|
         -> Result<Vec<usize>, Error> {
            if ids.is_empty() {
                return Err(Error::EmptyConstraintChain {
                    kind,
                    constraint: constraint.to_string(),
                });
            }
            ids.iter()
                .map(|id| {
                    bone_index
                        .get(id)
                        .copied()
                        .ok_or_else(|| Error::UnknownConstraintBone {
                            kind,
                            constraint: constraint.to_string(),
                            bone: id.clone(),
                        })
                })
                .collect()
        };

        let mut ik_index = HashMap::with_capacity(ik_specs.len());
        let mut ik_constraints = Vec::with_capacity(ik_specs.len());
        for (i, spec) in ik_specs.iter().enumerate() {
            if ik_index.insert(spec.name.clone(), i).is_some() {
                return Err(Error::DuplicateId {
                    kind: "ik constraint",
                    id: spec.name.clone(),
                });
            }
            let target =
                *bone_index
                    .get(&spec.target)
                    .ok_or_else(|| Error::UnknownConstraintTarget {
                        kind: "ik",
                        constraint: spec.name.clone(),
                        target: spec.target.clone(),
                    })?;
            ik_constraints.push(IkConstraintData {
                name: spec.name.clone(),
                order: spec.order,
                bones: resolve_chain("ik", &spec.name, &spec.bones)?,
                target,
                mix: spec.mix,
                softness: spec.softness,
                bend_positive: spec.bend_positive,
                compress: spec.compress,
                stretch: spec.stretch,
                uniform: spec.uniform,
            });
        }

        let mut path_index = HashMap::with_capacity(path_specs.len());
        let mut path_constraints = Vec::with_capacity(path_specs.len());
        for (i, spec) in path_specs.iter().enumerate() {
            if path_index.insert(spec.name.clone(), i).is_some() {
                return Err(Error::DuplicateId {
                    kind: "path constraint",
                    id: spec.name.clone(),
                });
            }
            let target = *slot_index.get(&spec.target).ok_or_else(|| {
                Error::UnknownPathConstraintTargetSlot {
                    constraint: spec.name.clone(),
                    target: spec.target.clone(),
                }
            })?;
            path_constraints.push(PathConstraintData {
                name: spec.name.clone(),
                order: spec.order,
                bones: resolve_chain("path", &spec.name, &spec.bones)?,
                target,
                position_mode: spec.position_mode,
                spacing_mode: spec.spacing_mode,
                rotate_mode: spec.rotate_mode,
                offset_rotation: spec.offset_rotation,
                position: spec.position,
                spacing: spec.spacing,
                position_mix: spec.position_mix,
                rotation_mix: spec.rotation_mix,
            });
        }

        let mut transform_index = HashMap::with_capacity(transform_specs.len());
        let mut transform_constraints = Vec::with_capacity(transform_specs.len());
        for (i, spec) in transform_specs.iter().enumerate() {
            if transform_index.insert(spec.name.clone(), i).is_some() {
                return Err(Error::DuplicateId {
                    kind: "transform constraint",
                    id: spec.name.clone(),
                });
            }
            let target =
                *bone_index
                    .get(&spec.target)
                    .ok_or_else(|| Error::UnknownConstraintTarget {
                        kind: "transform",
                        constraint: spec.name.clone(),
                        target: spec.target.clone(),
                    })?;
            transform_constraints.push(TransformConstraintData {
                name: spec.name.clone(),
                order: spec.order,
                bones: resolve_chain("transform", &spec.name, &spec.bones)?,
                target,
                offset_x: spec.offset_x,
                offset_y: spec.offset_y,
                offset_rotation: spec.offset_rotation,
                offset_scale_x: spec.offset_scale_x,
                offset_scale_y: spec.offset_scale_y,
                offset_shear_y: spec.offset_shear_y,
                position_mix: spec.position_mix,
                rotation_mix: spec.rotation_mix,
                scale_mix: spec.scale_mix,
                shear_mix: spec.shear_mix,
                local: spec.local,
                relative: spec.relative,
            });
        }

        // Skins. Meshes go into the arena first so linked meshes can be
        // resolved by (skin, slot, parent) key in a second pass.
        let mut meshes = Vec::new();
        let mut mesh_lookup: HashMap<(String, String, String), usize> = HashMap::new();
        let mut skins: HashMap<String, SkinData> = HashMap::new();
        let mut linked: Vec<(String, usize, String)> = Vec::new();

        let mut skin_names = skin_specs.keys().cloned().collect::<Vec<_>>();
        skin_names.sort();
        for skin_name in &skin_names {
            let spec = &skin_specs[skin_name];
            let mut attachments = vec![HashMap::new(); slots.len()];
            let mut slot_names = spec.keys().cloned().collect::<Vec<_>>();
            slot_names.sort();
            for slot_name in &slot_names {
                let slot = *slot_index
                    .get(slot_name)
                    .ok_or_else(|| Error::UnknownSkinSlot {
                        skin: skin_name.clone(),
                        slot: slot_name.clone(),
                    })?;
                let mut attachment_names = spec[slot_name].keys().cloned().collect::<Vec<_>>();
                attachment_names.sort();
                for attachment_name in &attachment_names {
                    let attachment = finalize_attachment(
                        skin_name,
                        slot_name,
                        slot,
                        attachment_name,
                        &spec[slot_name][attachment_name],
                        &slot_index,
                        &mut meshes,
                        &mut mesh_lookup,
                        &mut linked,
                    )?;
                    attachments[slot]
                        .insert(attachment_name.clone(), attachment);
                }
            }
            skins.insert(
                skin_name.clone(),
                SkinData {
                    name: skin_name.clone(),
                    attachments,
                },
            );
        }

        // Second pass: resolve linked-mesh parents against the arena.
        for (skin_name, slot, attachment_name) in linked {
            let slot_name = slots[slot].name.clone();
            let (parent, source_skin) = {
                let Some(AttachmentData::LinkedMesh(link)) = skins
                    .get(&skin_name)
                    .and_then(|s| s.attachment(slot, &attachment_name))
                else {
                    continue;
                };
                (link.parent.clone(), link.skin.clone())
            };
            if !skin_specs.contains_key(&source_skin) {
                return Err(Error::LinkedMeshUnknownSkin {
                    attachment: attachment_name,
                    skin: source_skin,
                });
            }
            if !skin_specs[&source_skin].contains_key(&slot_name) {
                return Err(Error::LinkedMeshUnknownSlot {
                    attachment: attachment_name,
                    skin: source_skin,
                    slot: slot_name,
                });
            }
            let Some(target) = skin_specs[&source_skin][&slot_name].get(&parent) else {
                return Err(Error::LinkedMeshUnknownParent {
                    attachment: attachment_name,
                    skin: source_skin,
                    slot: slot_name,
                    parent,
                });
            };
            if !matches!(target, AttachmentSpec::Mesh { .. }) {
                return Err(Error::LinkedMeshParentNotMesh {
                    attachment: attachment_name,
                    parent,
                });
            }
            let mesh = mesh_lookup[&(source_skin, slot_name, parent)];
            if let Some(AttachmentData::LinkedMesh(link)) = skins
                .get_mut(&skin_name)
                .and_then(|s| s.attachments[slot].get_mut(&attachment_name))
            {
                link.mesh = mesh;
            }
        }

        let mut data = SkeletonData {
            meta,
            bones,
            slots,
            ik_constraints,
            path_constraints,
            transform_constraints,
            skins,
            meshes,
            events,
            clips: Vec::new(),
            curves: Vec::new(),
            pose_tasks: Vec::new(),
            bone_index,
            slot_index,
            ik_index,
            path_index,
            transform_index,
            clip_index: HashMap::new(),
        };

        data.pose_tasks = compute_pose_tasks(&data)?;

        // Clips last: they need the resolved definition for binding
        // checks and deform expansion. Sorted names keep clip indices
        // deterministic.
        let mut pool = CurvePool { curves: Vec::new() };
        let mut clip_names = clip_specs.keys().cloned().collect::<Vec<_>>();
        clip_names.sort();
        for name in clip_names {
            let clip = finalize_clip(&data, &name, &clip_specs[&name], &mut pool)?;
            data.clip_index.insert(name, data.clips.len());
            data.clips.push(clip);
        }
        data.curves = pool.curves;

        Ok(data)
    }
}

#[allow(clippy::too_many_arguments)]
fn finalize_attachment(
    skin_name: &str,
    slot_name: &str,
    slot: usize,
    attachment_name: &str,
    spec: &AttachmentSpec,
    slot_index: &HashMap<String, usize>,
    meshes: &mut Vec<MeshAttachmentData>,
    mesh_lookup: &mut HashMap<(String, String, String), usize>,
    linked: &mut Vec<(String, usize, String)>,
) -> Result<AttachmentData, Error> {
    match spec {
        AttachmentSpec::Region {
            path,
            x,
            y,
            rotation,
            scale_x,
            scale_y,
            width,
            height,
            color,
        } => Ok(AttachmentData::Region(RegionAttachmentData {
            name: attachment_name.to_string(),
            path: path.clone().unwrap_or_else(|| attachment_name.to_string()),
            color: *color,
            x: *x,
            y: *y,
            rotation: *rotation,
            scale_x: *scale_x,
            scale_y: *scale_y,
            width: *width,
            height: *height,
        })),
        AttachmentSpec::BoundingBox {
            vertex_count,
            vertices,
        } => Ok(AttachmentData::BoundingBox(BoundingBoxAttachmentData {
            name: attachment_name.to_string(),
            vertex_count: *vertex_count,
            vertices: unpack_vertices(attachment_name, *vertex_count, vertices)?,
        })),
        AttachmentSpec::Mesh {
            path,
            color,
            width,
            height,
            hull,
            uvs,
            triangles,
            vertices,
        } => {
            let uv_pairs = uvs
                .chunks_exact(2)
                .map(|c| [c[0], c[1]])
                .collect::<Vec<_>>();
            let mesh = MeshAttachmentData {
                name: attachment_name.to_string(),
                path: path.clone().unwrap_or_else(|| attachment_name.to_string()),
                color: *color,
                width: *width,
                height: *height,
                hull: *hull,
                vertices: unpack_vertices(attachment_name, uv_pairs.len(), vertices)?,
                uvs: uv_pairs,
                triangles: triangles.clone(),
            };
            let index = meshes.len();
            meshes.push(mesh);
            mesh_lookup.insert(
                (
                    skin_name.to_string(),
                    slot_name.to_string(),
                    attachment_name.to_string(),
                ),
                index,
            );
            Ok(AttachmentData::Mesh(index))
        }
        AttachmentSpec::LinkedMesh {
            skin,
            parent,
            deform,
            color,
            width,
            height,
        } => {
            linked.push((skin_name.to_string(), slot, attachment_name.to_string()));
            Ok(AttachmentData::LinkedMesh(LinkedMeshAttachmentData {
                name: attachment_name.to_string(),
                mesh: usize::MAX, // patched by the second pass
                skin: skin.clone().unwrap_or_else(|| DEFAULT_SKIN.to_string()),
                parent: parent.clone(),
                inherit_deform: *deform,
                color: *color,
                width: *width,
                height: *height,
            }))
        }
        AttachmentSpec::Path {
            closed,
            constant_speed,
            lengths,
            vertex_count,
            vertices,
        } => Ok(AttachmentData::Path(PathAttachmentData {
            name: attachment_name.to_string(),
            closed: *closed,
            constant_speed: *constant_speed,
            lengths: lengths.clone(),
            // Doubled relative to the serialized count, mirroring the
            // editor pipeline; the solver consumes the doubled value as
            // a float-component count.
            vertex_count: vertex_count * 2,
            vertices: unpack_vertices(attachment_name, *vertex_count, vertices)?,
        })),
        AttachmentSpec::Point { x, y, rotation } => {
            Ok(AttachmentData::Point(PointAttachmentData {
                name: attachment_name.to_string(),
                x: *x,
                y: *y,
                rotation: *rotation,
            }))
        }
        AttachmentSpec::Clipping {
            end_slot,
            vertex_count,
            vertices,
        } => {
            let end_slot = match end_slot {
                None => None,
                Some(id) => Some(*slot_index.get(id).ok_or_else(|| Error::UnknownSkinSlot {
                    skin: skin_name.to_string(),
                    slot: id.clone(),
                })?),
            };
            Ok(AttachmentData::Clipping(ClippingAttachmentData {
                name: attachment_name.to_string(),
                end_slot,
                vertex_count: vertex_count * 2,
                vertices: unpack_vertices(attachment_name, *vertex_count, vertices)?,
            }))
        }
    }
}

/// Computes the ordered task list the solver executes each frame. Bones
/// manipulated by a constraint are owned by that constraint's task; their
/// children become eligible for re-evaluation afterwards.
fn compute_pose_tasks(data: &SkeletonData) -> Result<Vec<PoseTask>, Error> {
    #[derive(Copy, Clone)]
    enum Kind {
        Ik,
        Path,
        Transform,
    }

    let bone_count = data.bones.len();
    let mut tasks = Vec::with_capacity(bone_count + data.ik_constraints.len());
    let mut evaluated = vec![false; bone_count];

    fn eval_bone(
        bones: &[BoneData],
        bone: usize,
        evaluated: &mut [bool],
        tasks: &mut Vec<PoseTask>,
    ) {
        if evaluated[bone] {
            return;
        }
        if let Some(parent) = bones[bone].parent {
            eval_bone(bones, parent, evaluated, tasks);
        }
        evaluated[bone] = true;
        // The root is posed outside the task list.
        if bone != 0 {
            tasks.push(PoseTask::Bone(bone));
        }
    }

    fn eval_reset_children(bones: &[BoneData], parent: usize, evaluated: &mut [bool]) {
        for i in (parent + 1)..bones.len() {
            if bones[i].parent == Some(parent) {
                if evaluated[i] {
                    eval_reset_children(bones, i, evaluated);
                }
                evaluated[i] = false;
            }
        }
    }

    let mut ordered = Vec::with_capacity(
        data.ik_constraints.len() + data.path_constraints.len() + data.transform_constraints.len(),
    );
    for (i, c) in data.ik_constraints.iter().enumerate() {
        ordered.push((c.order, Kind::Ik, i));
    }
    for (i, c) in data.path_constraints.iter().enumerate() {
        ordered.push((c.order, Kind::Path, i));
    }
    for (i, c) in data.transform_constraints.iter().enumerate() {
        ordered.push((c.order, Kind::Transform, i));
    }
    ordered.sort_by_key(|&(order, _, _)| order);

    for (_, kind, index) in ordered {
        match kind {
            Kind::Ik => {
                let ik = &data.ik_constraints[index];
                eval_bone(&data.bones, ik.target, &mut evaluated, &mut tasks);
                let first = ik.bones[0];
                eval_bone(&data.bones, first, &mut evaluated, &mut tasks);
                tasks.push(PoseTask::Ik(index));
                eval_reset_children(&data.bones, first, &mut evaluated);
                evaluated[*ik.bones.last().unwrap_or(&first)] = true;
            }
            Kind::Path => {
                let path = &data.path_constraints[index];
                let target_slot = &data.slots[path.target];

                // Path attachments live on the default skin; resolve
                // every attachment the target slot can expose and make
                // sure any bones weighting them are posed first.
                let default_skin = data.skins.get(DEFAULT_SKIN).ok_or_else(|| {
                    Error::PathConstraintMissingDefaultSkin {
                        constraint: path.name.clone(),
                    }
                })?;
                let slot_map = default_skin.attachments.get(path.target);
                let Some(slot_map) = slot_map.filter(|m| !m.is_empty()) else {
                    return Err(Error::PathConstraintNoAttachments {
                        constraint: path.name.clone(),
                        slot: target_slot.name.clone(),
                    });
                };
                let mut attachment_names = slot_map.keys().collect::<Vec<_>>();
                attachment_names.sort();
                for name in attachment_names {
                    let AttachmentData::Path(attachment) = &slot_map[name] else {
                        return Err(Error::PathConstraintNonPathAttachment {
                            constraint: path.name.clone(),
                            attachment: name.clone(),
                        });
                    };
                    if let MeshVertices::Weighted(vertices) = &attachment.vertices {
                        for weights in vertices {
                            for w in weights {
                                eval_bone(&data.bones, w.bone, &mut evaluated, &mut tasks);
                            }
                        }
                    }
                }

                // The target slot's bone supplies the world transform of
                // unweighted path vertices.
                eval_bone(&data.bones, target_slot.bone, &mut evaluated, &mut tasks);
                for &bone in &path.bones {
                    eval_bone(&data.bones, bone, &mut evaluated, &mut tasks);
                }
                tasks.push(PoseTask::Path(index));
                for &bone in &path.bones {
                    eval_reset_children(&data.bones, bone, &mut evaluated);
                }
                for &bone in &path.bones {
                    evaluated[bone] = true;
                }
            }
            Kind::Transform => {
                let transform = &data.transform_constraints[index];
                eval_bone(&data.bones, transform.target, &mut evaluated, &mut tasks);
                for &bone in &transform.bones {
                    if transform.local {
                        if let Some(parent) = data.bones[bone].parent {
                            eval_bone(&data.bones, parent, &mut evaluated, &mut tasks);
                        }
                    }
                    eval_bone(&data.bones, bone, &mut evaluated, &mut tasks);
                }
                tasks.push(PoseTask::Transform(index));
                for &bone in &transform.bones {
                    eval_reset_children(&data.bones, bone, &mut evaluated);
                }
                for &bone in &transform.bones {
                    evaluated[bone] = true;
                }
            }
        }
    }

    for bone in 1..bone_count {
        if !evaluated[bone] {
            tasks.push(PoseTask::Bone(bone));
        }
    }

    Ok(tasks)
}

fn finalize_clip(
    data: &SkeletonData,
    name: &str,
    spec: &ClipSpec,
    pool: &mut CurvePool,
) -> Result<Clip, Error> {
    let mut clip = Clip {
        name: name.to_string(),
        ..Clip::default()
    };

    // Bone timelines for unknown bones are dropped silently so clips can
    // be retargeted onto reduced skeletons.
    for (bone_id, timelines) in &spec.bones {
        if !data.bone_index.contains_key(bone_id) {
            continue;
        }
        let mut out = BoneTimelines::default();
        out.rotation = timelines
            .rotation
            .iter()
            .map(|k| RotationFrame {
                time: k.time,
                curve: pool.resolve(&k.curve),
                angle: k.angle,
            })
            .collect();
        sort_by_time(&mut out.rotation, |f| f.time);
        out.translation = vec2_frames(&timelines.translation, pool);
        out.scale = timelines
            .scale
            .iter()
            .map(|k| Vec2Frame {
                time: k.time,
                curve: pool.resolve(&k.curve),
                x: k.x,
                y: k.y,
            })
            .collect();
        sort_by_time(&mut out.scale, |f| f.time);
        out.shear = vec2_frames(&timelines.shear, pool);
        clip.bones.insert(bone_id.clone(), out);
    }

    for (slot_id, timelines) in &spec.slots {
        if !data.slot_index.contains_key(slot_id) {
            return Err(Error::UnknownClipSlot {
                clip: name.to_string(),
                slot: slot_id.clone(),
            });
        }
        let mut out = SlotTimelines::default();
        out.attachment = timelines
            .attachment
            .iter()
            .map(|k| AttachmentFrame {
                time: k.time,
                attachment: k.attachment.clone(),
            })
            .collect();
        sort_by_time(&mut out.attachment, |f| f.time);
        out.color = timelines
            .color
            .iter()
            .map(|k| ColorFrame {
                time: k.time,
                curve: pool.resolve(&k.curve),
                color: k.color,
            })
            .collect();
        sort_by_time(&mut out.color, |f| f.time);
        out.two_color = timelines
            .two_color
            .iter()
            .map(|k| TwoColorFrame {
                time: k.time,
                curve: pool.resolve(&k.curve),
                light: k.light,
                dark: k.dark,
            })
            .collect();
        sort_by_time(&mut out.two_color, |f| f.time);
        clip.slots.insert(slot_id.clone(), out);
    }

    for (ik_id, keys) in &spec.ik {
        if !data.ik_index.contains_key(ik_id) {
            return Err(Error::UnknownClipConstraint {
                clip: name.to_string(),
                kind: "ik",
                constraint: ik_id.clone(),
            });
        }
        let mut frames = keys
            .iter()
            .map(|k| IkFrame {
                time: k.time,
                curve: pool.resolve(&k.curve),
                mix: k.mix,
                softness: k.softness,
                bend_positive: k.bend_positive,
                compress: k.compress,
                stretch: k.stretch,
            })
            .collect::<Vec<_>>();
        sort_by_time(&mut frames, |f| f.time);
        clip.ik.insert(ik_id.clone(), frames);
    }

    for (path_id, timelines) in &spec.paths {
        if !data.path_index.contains_key(path_id) {
            return Err(Error::UnknownClipConstraint {
                clip: name.to_string(),
                kind: "path",
                constraint: path_id.clone(),
            });
        }
        let mut out = PathTimelines::default();
        out.mix = timelines
            .mix
            .iter()
            .map(|k| PathMixFrame {
                time: k.time,
                curve: pool.resolve(&k.curve),
                position_mix: k.position_mix,
                rotation_mix: k.rotation_mix,
            })
            .collect();
        sort_by_time(&mut out.mix, |f| f.time);
        out.position = float_frames(&timelines.position, pool);
        out.spacing = float_frames(&timelines.spacing, pool);
        clip.paths.insert(path_id.clone(), out);
    }

    for (transform_id, keys) in &spec.transforms {
        if !data.transform_index.contains_key(transform_id) {
            return Err(Error::UnknownClipConstraint {
                clip: name.to_string(),
                kind: "transform",
                constraint: transform_id.clone(),
            });
        }
        let mut frames = keys
            .iter()
            .map(|k| TransformFrame {
                time: k.time,
                curve: pool.resolve(&k.curve),
                position_mix: k.position_mix,
                rotation_mix: k.rotation_mix,
                scale_mix: k.scale_mix,
                shear_mix: k.shear_mix,
            })
            .collect::<Vec<_>>();
        sort_by_time(&mut frames, |f| f.time);
        clip.transforms.insert(transform_id.clone(), frames);
    }

    for (skin_id, by_slot) in &spec.deforms {
        let skin = data
            .skins
            .get(skin_id)
            .ok_or_else(|| Error::UnknownDeformSkin {
                clip: name.to_string(),
                skin: skin_id.clone(),
            })?;
        let mut out_by_slot = HashMap::new();
        for (slot_id, by_attachment) in by_slot {
            let slot =
                *data
                    .slot_index
                    .get(slot_id)
                    .ok_or_else(|| Error::UnknownDeformSlot {
                        clip: name.to_string(),
                        skin: skin_id.clone(),
                        slot: slot_id.clone(),
                    })?;
            let mut out_by_attachment = HashMap::new();
            for (attachment_id, keys) in by_attachment {
                let attachment = skin.attachment(slot, attachment_id).ok_or_else(|| {
                    Error::UnknownDeformAttachment {
                        clip: name.to_string(),
                        skin: skin_id.clone(),
                        slot: slot_id.clone(),
                        attachment: attachment_id.clone(),
                    }
                })?;
                let base_len = deform_base_len(data, attachment).ok_or_else(|| {
                    Error::DeformTargetNotDeformable {
                        attachment: attachment_id.clone(),
                    }
                })?;
                let mut frames = Vec::with_capacity(keys.len());
                for key in keys {
                    if key.offset + key.vertices.len() > base_len {
                        return Err(Error::DeformVertexOverflow {
                            clip: name.to_string(),
                            attachment: attachment_id.clone(),
                            offset: key.offset,
                            len: key.vertices.len(),
                            base: base_len,
                        });
                    }
                    let mut dense = vec![0.0f32; base_len];
                    dense[key.offset..key.offset + key.vertices.len()]
                        .copy_from_slice(&key.vertices);
                    frames.push(DeformFrame {
                        time: key.time,
                        curve: pool.resolve(&key.curve),
                        vertices: dense,
                    });
                }
                sort_by_time(&mut frames, |f| f.time);
                out_by_attachment.insert(attachment_id.clone(), frames);
            }
            out_by_slot.insert(slot_id.clone(), out_by_attachment);
        }
        clip.deforms.insert(skin_id.clone(), out_by_slot);
    }

    for key in &spec.draw_order {
        let mut offsets = Vec::with_capacity(key.offsets.len());
        for offset in &key.offsets {
            let slot = *data.slot_index.get(&offset.slot).ok_or_else(|| {
                Error::UnknownDrawOrderSlot {
                    clip: name.to_string(),
                    slot: offset.slot.clone(),
                }
            })?;
            offsets.push(DrawOrderOffset {
                slot,
                offset: offset.offset,
            });
        }
        clip.draw_order.push(DrawOrderFrame {
            time: key.time,
            offsets,
        });
    }
    sort_by_time(&mut clip.draw_order, |f| f.time);

    for key in &spec.events {
        let defaults = data.events.get(&key.event);
        clip.events.push(EventFrame {
            time: key.time,
            event: key.event.clone(),
            int_value: key
                .int_value
                .unwrap_or_else(|| defaults.map(|d| d.int_value).unwrap_or(0)),
            float_value: key
                .float_value
                .unwrap_or_else(|| defaults.map(|d| d.float_value).unwrap_or(0.0)),
            string_value: key.string_value.clone().unwrap_or_else(|| {
                defaults.map(|d| d.string_value.clone()).unwrap_or_default()
            }),
        });
    }
    sort_by_time(&mut clip.events, |f| f.time);

    Ok(clip)
}

fn deform_base_len(data: &SkeletonData, attachment: &AttachmentData) -> Option<usize> {
    match attachment {
        AttachmentData::Mesh(index) => Some(data.meshes[*index].vertices.deform_len()),
        AttachmentData::LinkedMesh(link) if link.inherit_deform => {
            Some(data.meshes[link.mesh].vertices.deform_len())
        }
        AttachmentData::Path(a) => Some(a.vertices.deform_len()),
        AttachmentData::BoundingBox(a) => Some(a.vertices.deform_len()),
        AttachmentData::Clipping(a) => Some(a.vertices.deform_len()),
        _ => None,
    }
}

fn vec2_frames(keys: &[Vec2Key], pool: &mut CurvePool) -> Vec<Vec2Frame> {
    let mut frames = keys
        .iter()
        .map(|k| Vec2Frame {
            time: k.time,
            curve: pool.resolve(&k.curve),
            x: k.x,
            y: k.y,
        })
        .collect::<Vec<_>>();
    sort_by_time(&mut frames, |f| f.time);
    frames
}

fn float_frames(keys: &[ValueKey], pool: &mut CurvePool) -> Vec<FloatFrame> {
    let mut frames = keys
        .iter()
        .map(|k| FloatFrame {
            time: k.time,
            curve: pool.resolve(&k.curve),
            value: k.value,
        })
        .collect::<Vec<_>>();
    sort_by_time(&mut frames, |f| f.time);
    frames
}
