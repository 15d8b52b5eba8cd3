//! Immutable, shared definition data: skeleton, constraints, skins,
//! attachments and animation clips.
//!
//! A [`SkeletonData`] is produced by [`crate::SkeletonBuilder::finalize`]
//! and is read-only afterwards; it is safe to share across threads behind
//! an `Arc`. Mutable per-session state lives in
//! [`crate::SkeletonInstance`].

use std::collections::HashMap;

/// Name of the skin that hosts path attachments and serves as the
/// fallback for attachment resolution.
pub const DEFAULT_SKIN: &str = "default";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
pub enum TransformMode {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

#[derive(Clone, Debug)]
pub struct BoneData {
    pub name: String,
    /// Always `Some` except for the root at index 0. Finalization
    /// guarantees `parent < self` (topological order).
    pub parent: Option<usize>,
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

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

#[derive(Clone, Debug)]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    /// Setup attachment id; `None` means the slot starts empty.
    pub attachment: Option<String>,
    pub color: [u8; 4],
    /// Present only for two-color tinted slots.
    pub dark_color: Option<[u8; 3]>,
    pub blend: BlendMode,
}

#[derive(Clone, Debug)]
pub struct IkConstraintData {
    pub name: String,
    pub order: i32,
    /// One or two bones; parent first.
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub bend_positive: bool,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
pub enum PositionMode {
    #[default]
    Percent,
    Fixed,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
pub enum SpacingMode {
    #[default]
    Length,
    Fixed,
    Percent,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "camelCase"))]
pub enum RotateMode {
    #[default]
    Tangent,
    Chain,
    ChainScale,
}

#[derive(Clone, Debug)]
pub struct PathConstraintData {
    pub name: String,
    pub order: i32,
    pub bones: Vec<usize>,
    /// Target slot index; the slot's active attachment must be a path for
    /// the constraint to apply.
    pub target: usize,
    pub position_mode: PositionMode,
    pub spacing_mode: SpacingMode,
    pub rotate_mode: RotateMode,
    pub offset_rotation: f32,
    pub position: f32,
    pub spacing: f32,
    pub position_mix: f32,
    pub rotation_mix: f32,
}

#[derive(Clone, Debug)]
pub struct TransformConstraintData {
    pub name: String,
    pub order: i32,
    pub bones: Vec<usize>,
    pub target: usize,
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

#[derive(Clone, Debug)]
pub struct VertexWeight {
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

#[derive(Clone, Debug)]
pub enum MeshVertices {
    Unweighted(Vec<[f32; 2]>),
    Weighted(Vec<Vec<VertexWeight>>),
}

impl MeshVertices {
    pub fn vertex_count(&self) -> usize {
        match self {
            MeshVertices::Unweighted(v) => v.len(),
            MeshVertices::Weighted(v) => v.len(),
        }
    }

    /// Length of a dense deform buffer covering these vertices: two
    /// floats per vertex for unweighted data, two per weight entry for
    /// weighted data.
    pub fn deform_len(&self) -> usize {
        match self {
            MeshVertices::Unweighted(v) => v.len() * 2,
            MeshVertices::Weighted(v) => v.iter().map(|w| w.len() * 2).sum(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegionAttachmentData {
    pub name: String,
    pub path: String,
    pub color: [u8; 4],
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug)]
pub struct BoundingBoxAttachmentData {
    pub name: String,
    pub vertex_count: usize,
    pub vertices: MeshVertices,
}

/// Mesh payloads live in `SkeletonData::meshes`; skins reference them by
/// index so linked meshes can share a parent without cyclic ownership.
#[derive(Clone, Debug)]
pub struct MeshAttachmentData {
    pub name: String,
    pub path: String,
    pub color: [u8; 4],
    pub width: f32,
    pub height: f32,
    pub hull: i32,
    pub uvs: Vec<[f32; 2]>,
    pub triangles: Vec<u16>,
    pub vertices: MeshVertices,
}

#[derive(Clone, Debug)]
pub struct LinkedMeshAttachmentData {
    pub name: String,
    /// Resolved arena index of the parent mesh.
    pub mesh: usize,
    /// Skin the parent was resolved in (defaults to [`DEFAULT_SKIN`]).
    pub skin: String,
    pub parent: String,
    /// Whether deform timelines targeting the parent also apply here.
    pub inherit_deform: bool,
    pub color: [u8; 4],
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug)]
pub struct PathAttachmentData {
    pub name: String,
    pub closed: bool,
    pub constant_speed: bool,
    /// Cumulative per-curve lengths from the editor; used directly when
    /// `constant_speed` is false.
    pub lengths: Vec<f32>,
    /// Doubled at finalization relative to the serialized value.
    pub vertex_count: usize,
    pub vertices: MeshVertices,
}

#[derive(Clone, Debug)]
pub struct PointAttachmentData {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

#[derive(Clone, Debug)]
pub struct ClippingAttachmentData {
    pub name: String,
    pub end_slot: Option<usize>,
    /// Doubled at finalization relative to the serialized value.
    pub vertex_count: usize,
    pub vertices: MeshVertices,
}

#[derive(Clone, Debug)]
pub enum AttachmentData {
    Region(RegionAttachmentData),
    BoundingBox(BoundingBoxAttachmentData),
    Mesh(usize),
    LinkedMesh(LinkedMeshAttachmentData),
    Path(PathAttachmentData),
    Point(PointAttachmentData),
    Clipping(ClippingAttachmentData),
}

#[derive(Clone, Debug)]
pub struct SkinData {
    pub name: String,
    /// Indexed by slot; each map is attachment id to attachment.
    pub attachments: Vec<HashMap<String, AttachmentData>>,
}

impl SkinData {
    pub fn attachment(&self, slot_index: usize, attachment_id: &str) -> Option<&AttachmentData> {
        self.attachments
            .get(slot_index)
            .and_then(|slot_map| slot_map.get(attachment_id))
    }
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct EventData {
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: String,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "json", derive(serde::Deserialize))]
#[cfg_attr(feature = "json", serde(default, rename_all = "camelCase"))]
pub struct MetaData {
    pub position_x: f32,
    pub position_y: f32,
    pub fps: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CurveType {
    Linear,
    Stepped,
    Bezier,
}

/// Interpolation handle stored on keyframes: 2-bit curve type plus a
/// 30-bit offset into [`SkeletonData::curves`] for Bezier keys.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Curve(u32);

impl Curve {
    pub const LINEAR: Curve = Curve(0);
    pub const STEPPED: Curve = Curve(1);

    pub fn bezier(offset: usize) -> Curve {
        debug_assert!(offset < (1 << 30));
        Curve(2 | ((offset as u32) << 2))
    }

    pub fn curve_type(self) -> CurveType {
        match self.0 & 3 {
            0 => CurveType::Linear,
            1 => CurveType::Stepped,
            _ => CurveType::Bezier,
        }
    }

    pub fn bezier_offset(self) -> usize {
        (self.0 >> 2) as usize
    }
}

impl Default for Curve {
    fn default() -> Self {
        Curve::LINEAR
    }
}

/// Piecewise-linear sampling of one cubic Bezier: 9 `(x, y)` pairs.
pub type BezierCurve = [f32; 18];

#[derive(Copy, Clone, Debug)]
pub struct RotationFrame {
    pub time: f32,
    pub curve: Curve,
    /// Degrees, relative to the bone's rest rotation.
    pub angle: f32,
}

#[derive(Copy, Clone, Debug)]
pub struct Vec2Frame {
    pub time: f32,
    pub curve: Curve,
    pub x: f32,
    pub y: f32,
}

#[derive(Copy, Clone, Debug)]
pub struct IkFrame {
    pub time: f32,
    pub curve: Curve,
    pub mix: f32,
    pub softness: f32,
    pub bend_positive: bool,
    pub compress: bool,
    pub stretch: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct PathMixFrame {
    pub time: f32,
    pub curve: Curve,
    pub position_mix: f32,
    pub rotation_mix: f32,
}

#[derive(Copy, Clone, Debug)]
pub struct FloatFrame {
    pub time: f32,
    pub curve: Curve,
    pub value: f32,
}

#[derive(Copy, Clone, Debug)]
pub struct TransformFrame {
    pub time: f32,
    pub curve: Curve,
    pub position_mix: f32,
    pub rotation_mix: f32,
    pub scale_mix: f32,
    pub shear_mix: f32,
}

#[derive(Copy, Clone, Debug)]
pub struct ColorFrame {
    pub time: f32,
    pub curve: Curve,
    pub color: [u8; 4],
}

#[derive(Copy, Clone, Debug)]
pub struct TwoColorFrame {
    pub time: f32,
    pub curve: Curve,
    pub light: [u8; 4],
    pub dark: [u8; 3],
}

#[derive(Clone, Debug)]
pub struct AttachmentFrame {
    pub time: f32,
    /// `None` clears the slot.
    pub attachment: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DeformFrame {
    pub time: f32,
    pub curve: Curve,
    /// Dense per-vertex data, expanded at finalization; every frame of a
    /// timeline has the same length.
    pub vertices: Vec<f32>,
}

#[derive(Copy, Clone, Debug)]
pub struct DrawOrderOffset {
    pub slot: usize,
    pub offset: i32,
}

#[derive(Clone, Debug)]
pub struct DrawOrderFrame {
    pub time: f32,
    /// Empty offsets commit the identity order.
    pub offsets: Vec<DrawOrderOffset>,
}

#[derive(Clone, Debug)]
pub struct EventFrame {
    pub time: f32,
    pub event: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: String,
}

#[derive(Clone, Debug, Default)]
pub struct BoneTimelines {
    pub rotation: Vec<RotationFrame>,
    pub translation: Vec<Vec2Frame>,
    pub scale: Vec<Vec2Frame>,
    pub shear: Vec<Vec2Frame>,
}

#[derive(Clone, Debug, Default)]
pub struct SlotTimelines {
    pub attachment: Vec<AttachmentFrame>,
    pub color: Vec<ColorFrame>,
    pub two_color: Vec<TwoColorFrame>,
}

#[derive(Clone, Debug, Default)]
pub struct PathTimelines {
    pub mix: Vec<PathMixFrame>,
    pub position: Vec<FloatFrame>,
    pub spacing: Vec<FloatFrame>,
}

/// Deform timelines: skin id, then slot id, then attachment id.
pub type DeformTimelines = HashMap<String, HashMap<String, HashMap<String, Vec<DeformFrame>>>>;

#[derive(Clone, Debug, Default)]
pub struct Clip {
    pub name: String,
    pub bones: HashMap<String, BoneTimelines>,
    pub slots: HashMap<String, SlotTimelines>,
    pub ik: HashMap<String, Vec<IkFrame>>,
    pub paths: HashMap<String, PathTimelines>,
    pub transforms: HashMap<String, Vec<TransformFrame>>,
    pub deforms: DeformTimelines,
    pub draw_order: Vec<DrawOrderFrame>,
    pub events: Vec<EventFrame>,
}

/// One entry of the solver's fixed execution order. The root bone is
/// never listed; it is posed first as a special case.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PoseTask {
    Bone(usize),
    Ik(usize),
    Path(usize),
    Transform(usize),
}

#[derive(Clone, Debug)]
pub struct SkeletonData {
    pub meta: MetaData,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub ik_constraints: Vec<IkConstraintData>,
    pub path_constraints: Vec<PathConstraintData>,
    pub transform_constraints: Vec<TransformConstraintData>,
    pub skins: HashMap<String, SkinData>,
    pub meshes: Vec<MeshAttachmentData>,
    pub events: HashMap<String, EventData>,
    pub clips: Vec<Clip>,
    pub curves: Vec<BezierCurve>,
    pub pose_tasks: Vec<PoseTask>,

    pub bone_index: HashMap<String, usize>,
    pub slot_index: HashMap<String, usize>,
    pub ik_index: HashMap<String, usize>,
    pub path_index: HashMap<String, usize>,
    pub transform_index: HashMap<String, usize>,
    pub clip_index: HashMap<String, usize>,
}

impl SkeletonData {
    pub fn clip(&self, name: &str) -> Option<(usize, &Clip)> {
        let index = *self.clip_index.get(name)?;
        Some((index, &self.clips[index]))
    }

    pub fn skin(&self, name: &str) -> Option<&SkinData> {
        self.skins.get(name)
    }

    pub fn mesh(&self, index: usize) -> &MeshAttachmentData {
        &self.meshes[index]
    }

    /// Resolves an attachment by skin, slot and id, falling back to the
    /// default skin when the named skin does not carry it.
    pub fn attachment(
        &self,
        skin: &str,
        slot_index: usize,
        attachment_id: &str,
    ) -> Option<&AttachmentData> {
        if let Some(skin) = self.skins.get(skin) {
            if let Some(att) = skin.attachment(slot_index, attachment_id) {
                return Some(att);
            }
        }
        if skin != DEFAULT_SKIN {
            if let Some(default_skin) = self.skins.get(DEFAULT_SKIN) {
                return default_skin.attachment(slot_index, attachment_id);
            }
        }
        None
    }
}
