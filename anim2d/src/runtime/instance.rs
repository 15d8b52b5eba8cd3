//! Mutable per-session animation state and the pose solver.
//!
//! A [`SkeletonInstance`] owns the current bone/slot/constraint values,
//! the per-frame [`Cache`], the deform buffers and the skinning palette.
//! Each frame runs: clip evaluation into the cache, [`apply_cache`],
//! then [`pose_skinning_palette`], which executes the definition's pose
//! task list in order.
//!
//! [`apply_cache`]: SkeletonInstance::apply_cache
//! [`pose_skinning_palette`]: SkeletonInstance::pose_skinning_palette

use std::collections::HashMap;
use std::sync::Arc;

use crate::math::{clamp_degrees, clamp_radians, Matrix2x2, Matrix2x3};
use crate::model::{
    AttachmentData, BoneData, IkConstraintData, MeshVertices, PathAttachmentData, PositionMode,
    RotateMode, SkeletonData, SlotData, SpacingMode, TransformConstraintData, TransformMode,
    DEFAULT_SKIN,
};
use crate::runtime::cache::Cache;

/// Zero epsilon used by the path solver, matching the editor runtime.
const PATH_EPSILON: f32 = 0.00001;
const PATH_EPSILON_LOOSE: f32 = 0.001;

/// Receiver for keyed events dispatched from
/// [`crate::ClipInstance::evaluate_range`]. Dispatch is synchronous and
/// must not fail.
pub trait EventSink {
    fn dispatch(&self, name: &str, int_value: i32, float_value: f32, string_value: &str);
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoneInstance {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
}

impl BoneInstance {
    fn from_data(data: &BoneData) -> BoneInstance {
        BoneInstance {
            x: data.x,
            y: data.y,
            rotation: data.rotation,
            scale_x: data.scale_x,
            scale_y: data.scale_y,
            shear_x: data.shear_x,
            shear_y: data.shear_y,
        }
    }

    pub fn world_transform(&self) -> Matrix2x3 {
        Matrix2x3::from_local(
            self.x,
            self.y,
            self.rotation,
            self.scale_x,
            self.scale_y,
            self.shear_x,
            self.shear_y,
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlotInstance {
    pub attachment: Option<String>,
    pub color: [u8; 4],
    pub dark_color: Option<[u8; 3]>,
}

impl SlotInstance {
    fn from_data(data: &SlotData) -> SlotInstance {
        SlotInstance {
            attachment: data.attachment.clone(),
            color: data.color,
            dark_color: data.dark_color,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IkInstance {
    pub mix: f32,
    pub softness: f32,
    pub bend_positive: bool,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
}

impl IkInstance {
    fn from_data(data: &IkConstraintData) -> IkInstance {
        IkInstance {
            mix: data.mix,
            softness: data.softness,
            bend_positive: data.bend_positive,
            compress: data.compress,
            stretch: data.stretch,
            uniform: data.uniform,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct PathScratch {
    pub spaces: Vec<f32>,
    pub lengths: Vec<f32>,
    pub positions: Vec<f32>,
    pub world: Vec<f32>,
    pub curves: Vec<f32>,
    pub segments: [f32; 10],
}

#[derive(Clone, Debug)]
pub struct PathInstance {
    pub position: f32,
    pub position_mix: f32,
    pub rotation_mix: f32,
    pub spacing: f32,
    pub(crate) scratch: PathScratch,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TransformConstraintInstance {
    pub position_mix: f32,
    pub rotation_mix: f32,
    pub scale_mix: f32,
    pub shear_mix: f32,
}

impl TransformConstraintInstance {
    fn from_data(data: &TransformConstraintData) -> TransformConstraintInstance {
        TransformConstraintInstance {
            position_mix: data.position_mix,
            rotation_mix: data.rotation_mix,
            scale_mix: data.scale_mix,
            shear_mix: data.shear_mix,
        }
    }
}

/// Identifies one deform buffer: the skin, slot and attachment the
/// deform timeline targets.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DeformKey {
    pub skin: String,
    pub slot: String,
    pub attachment: String,
}

pub struct SkeletonInstance {
    data: Arc<SkeletonData>,
    event_sink: Option<Arc<dyn EventSink>>,
    cache: Cache,
    bones: Vec<BoneInstance>,
    slots: Vec<SlotInstance>,
    ik: Vec<IkInstance>,
    paths: Vec<PathInstance>,
    transforms: Vec<TransformConstraintInstance>,
    palette: Vec<Matrix2x3>,
    draw_order: Vec<usize>,
    pub(crate) deforms: HashMap<DeformKey, Vec<f32>>,
    pub(crate) deform_refs: HashMap<DeformKey, i32>,
}

impl SkeletonInstance {
    pub fn new(data: Arc<SkeletonData>, event_sink: Option<Arc<dyn EventSink>>) -> Self {
        let bones = data.bones.iter().map(BoneInstance::from_data).collect();
        let slots = data
            .slots
            .iter()
            .map(SlotInstance::from_data)
            .collect::<Vec<_>>();
        let ik = data.ik_constraints.iter().map(IkInstance::from_data).collect();
        let paths = data
            .path_constraints
            .iter()
            .map(|c| PathInstance {
                position: c.position,
                position_mix: c.position_mix,
                rotation_mix: c.rotation_mix,
                spacing: c.spacing,
                scratch: PathScratch::default(),
            })
            .collect();
        let transforms = data
            .transform_constraints
            .iter()
            .map(TransformConstraintInstance::from_data)
            .collect();
        let palette = vec![Matrix2x3::IDENTITY; data.bones.len()];
        let draw_order = (0..slots.len()).collect();

        let mut out = SkeletonInstance {
            data,
            event_sink,
            cache: Cache::default(),
            bones,
            slots,
            ik,
            paths,
            transforms,
            palette,
            draw_order,
            deforms: HashMap::new(),
            deform_refs: HashMap::new(),
        };
        out.pose_skinning_palette();
        out
    }

    /// Deep copy of the animated state. Deform buffers are copied;
    /// deform reference counts are not, since they track live clip
    /// evaluator registrations which do not transfer.
    pub fn clone_instance(&self) -> SkeletonInstance {
        SkeletonInstance {
            data: Arc::clone(&self.data),
            event_sink: self.event_sink.clone(),
            cache: Cache::default(),
            bones: self.bones.clone(),
            slots: self.slots.clone(),
            ik: self.ik.clone(),
            paths: self.paths.clone(),
            transforms: self.transforms.clone(),
            palette: self.palette.clone(),
            draw_order: self.draw_order.clone(),
            deforms: self.deforms.clone(),
            deform_refs: HashMap::new(),
        }
    }

    pub fn data(&self) -> &Arc<SkeletonData> {
        &self.data
    }

    pub fn event_sink(&self) -> Option<&Arc<dyn EventSink>> {
        self.event_sink.as_ref()
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }

    pub fn bones(&self) -> &[BoneInstance] {
        &self.bones
    }

    pub fn bones_mut(&mut self) -> &mut [BoneInstance] {
        &mut self.bones
    }

    pub fn slots(&self) -> &[SlotInstance] {
        &self.slots
    }

    pub fn ik(&self) -> &[IkInstance] {
        &self.ik
    }

    pub fn paths(&self) -> &[PathInstance] {
        &self.paths
    }

    pub fn transform_constraints(&self) -> &[TransformConstraintInstance] {
        &self.transforms
    }

    pub fn draw_order(&self) -> &[usize] {
        &self.draw_order
    }

    pub fn skinning_palette(&self) -> &[Matrix2x3] {
        &self.palette
    }

    pub fn deform(&self, skin: &str, slot: &str, attachment: &str) -> Option<&[f32]> {
        self.deforms
            .get(&DeformKey {
                skin: skin.to_string(),
                slot: slot.to_string(),
                attachment: attachment.to_string(),
            })
            .map(|v| v.as_slice())
    }

    pub(crate) fn deform_ref_count(&self, key: &DeformKey) -> i32 {
        self.deform_refs.get(key).copied().unwrap_or(0)
    }

    /// Applies the accumulated cache to the instance state and clears
    /// the cache. Must run after all clip evaluation for the frame and
    /// before [`Self::pose_skinning_palette`].
    pub fn apply_cache(&mut self) {
        let data = Arc::clone(&self.data);

        // Draw order.
        if self.cache.draw_order.is_empty() {
            self.draw_order.clear();
            self.draw_order.extend(0..data.slots.len());
        } else {
            self.draw_order.clear();
            self.draw_order
                .extend(self.cache.draw_order.iter().map(|&i| i as usize));
        }

        // Attachments: order by weight so the highest-weight group is
        // applied last, then reset every slot not in that group to its
        // setup attachment.
        if !self.cache.attachments.is_empty() {
            self.cache.attachments.sort_by(|a, b| {
                a.alpha
                    .total_cmp(&b.alpha)
                    .then_with(|| a.slot.cmp(&b.slot))
            });

            let size = self.cache.attachments.len();
            let mut u = size - 1;
            while u > 0 {
                if self.cache.attachments[u - 1].alpha < self.cache.attachments[u].alpha {
                    break;
                }
                u -= 1;
            }
            for e in &self.cache.attachments[u..] {
                self.slots[e.slot].attachment = e.attachment.clone();
                self.cache.slot_scratch.insert(e.slot);
            }
        }
        for (slot, state) in self.slots.iter_mut().enumerate() {
            if self.cache.slot_scratch.contains(&slot) {
                continue;
            }
            state.attachment = data.slots[slot].attachment.clone();
        }

        // Colors. Deltas are in 0-255 space; rounded, then clamped.
        for (slot, state) in self.slots.iter_mut().enumerate() {
            let base = &data.slots[slot];
            match self.cache.color.get(&slot) {
                None => state.color = base.color,
                Some(v) => {
                    for (c, delta) in v.iter().enumerate() {
                        state.color[c] =
                            (base.color[c] as f32 + delta + 0.5).clamp(0.0, 255.0) as u8;
                    }
                }
            }

            match (self.cache.two_color.get(&slot), base.dark_color) {
                (Some(e), Some(dark_base)) => {
                    for (c, delta) in e.light.iter().enumerate() {
                        state.color[c] =
                            (base.color[c] as f32 + delta + 0.5).clamp(0.0, 255.0) as u8;
                    }
                    let mut dark = [0u8; 3];
                    for (c, delta) in e.dark.iter().enumerate() {
                        dark[c] = (dark_base[c] as f32 + delta + 0.5).clamp(0.0, 255.0) as u8;
                    }
                    state.dark_color = Some(dark);
                }
                _ => state.dark_color = base.dark_color,
            }
        }

        // Ik.
        fn float_to_bool(base: bool, delta: f32) -> bool {
            (if base { 1.0 } else { 0.0 }) + delta >= 0.5
        }
        for (i, state) in self.ik.iter_mut().enumerate() {
            let base = &data.ik_constraints[i];
            match self.cache.ik.get(&i) {
                None => {
                    state.mix = base.mix;
                    state.softness = base.softness;
                    state.bend_positive = base.bend_positive;
                    state.compress = base.compress;
                    state.stretch = base.stretch;
                }
                Some(e) => {
                    state.mix = base.mix + e.mix;
                    state.softness = base.softness + e.softness;
                    state.bend_positive = float_to_bool(base.bend_positive, e.bend_positive);
                    state.compress = float_to_bool(base.compress, e.compress);
                    state.stretch = float_to_bool(base.stretch, e.stretch);
                }
            }
        }

        // Paths.
        for (i, state) in self.paths.iter_mut().enumerate() {
            let base = &data.path_constraints[i];
            match self.cache.path_mix.get(&i) {
                None => {
                    state.position_mix = base.position_mix;
                    state.rotation_mix = base.rotation_mix;
                }
                Some(v) => {
                    state.position_mix = base.position_mix + v[0];
                    state.rotation_mix = base.rotation_mix + v[1];
                }
            }
            state.position = match self.cache.path_position.get(&i) {
                None => base.position,
                Some(f) => base.position + f,
            };
            state.spacing = match self.cache.path_spacing.get(&i) {
                None => base.spacing,
                Some(f) => base.spacing + f,
            };
        }

        // Transform constraints.
        for (i, state) in self.transforms.iter_mut().enumerate() {
            let base = &data.transform_constraints[i];
            match self.cache.transform.get(&i) {
                None => {
                    state.position_mix = base.position_mix;
                    state.rotation_mix = base.rotation_mix;
                    state.scale_mix = base.scale_mix;
                    state.shear_mix = base.shear_mix;
                }
                Some(v) => {
                    state.position_mix = base.position_mix + v[0];
                    state.rotation_mix = base.rotation_mix + v[1];
                    state.scale_mix = base.scale_mix + v[2];
                    state.shear_mix = base.shear_mix + v[3];
                }
            }
        }

        // Bones.
        for (i, state) in self.bones.iter_mut().enumerate() {
            let base = &data.bones[i];

            match self.cache.position.get(&i) {
                None => {
                    state.x = base.x;
                    state.y = base.y;
                }
                Some(v) => {
                    state.x = base.x + v[0];
                    state.y = base.y + v[1];
                }
            }

            state.rotation = match self.cache.rotation.get(&i) {
                None => base.rotation,
                Some(f) => clamp_degrees(base.rotation + f),
            };

            match self.cache.scale.get(&i) {
                None => {
                    state.scale_x = base.scale_x;
                    state.scale_y = base.scale_y;
                }
                Some(v) => {
                    let base_alpha = 1.0 - v[2].clamp(0.0, 1.0);
                    state.scale_x = base.scale_x * v[0] + base.scale_x * base_alpha;
                    state.scale_y = base.scale_y * v[1] + base.scale_y * base_alpha;
                }
            }

            match self.cache.shear.get(&i) {
                None => {
                    state.shear_x = base.shear_x;
                    state.shear_y = base.shear_y;
                }
                Some(v) => {
                    state.shear_x = base.shear_x + v[0];
                    state.shear_y = base.shear_y + v[1];
                }
            }
        }

        self.cache.clear();
    }

    /// Re-poses the skinning palette from the current instance state by
    /// executing the definition's pose task list.
    pub fn pose_skinning_palette(&mut self) {
        if self.palette.is_empty() {
            return;
        }

        // The root is posed first and never revisited; finalization
        // guarantees it appears in no task.
        self.palette[0] = self.bones[0].world_transform();

        let data = Arc::clone(&self.data);
        for task in &data.pose_tasks {
            match *task {
                crate::model::PoseTask::Bone(i) => self.pose_bone(i),
                crate::model::PoseTask::Ik(i) => self.pose_ik(i),
                crate::model::PoseTask::Path(i) => self.pose_path_constraint(i),
                crate::model::PoseTask::Transform(i) => self.pose_transform_constraint(i),
            }
        }
    }

    fn pose_bone(&mut self, bone: usize) {
        let state = self.bones[bone];
        self.pose_bone_with(
            bone,
            state.x,
            state.y,
            state.rotation,
            state.scale_x,
            state.scale_y,
            state.shear_x,
            state.shear_y,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn pose_bone_with(
        &mut self,
        bone: usize,
        position_x: f32,
        position_y: f32,
        rotation: f32,
        scale_x: f32,
        scale_y: f32,
        shear_x: f32,
        shear_y: f32,
    ) {
        let data = &self.data.bones[bone];
        let Some(parent_index) = data.parent else {
            // Only the root has no parent and it is posed outside the
            // task list; nothing to do here.
            return;
        };
        let parent = self.palette[parent_index];

        let local = |rx_deg: f32, ry_deg: f32| Matrix2x2 {
            m00: rx_deg.to_radians().cos() * scale_x,
            m01: ry_deg.to_radians().cos() * scale_y,
            m10: rx_deg.to_radians().sin() * scale_x,
            m11: ry_deg.to_radians().sin() * scale_y,
        };

        self.palette[bone] = match data.transform_mode {
            TransformMode::Normal => {
                let world = Matrix2x3::from_local(
                    position_x, position_y, rotation, scale_x, scale_y, shear_x, shear_y,
                );
                parent.mul(&world)
            }
            TransformMode::OnlyTranslation => {
                let world = Matrix2x3::from_local(
                    position_x, position_y, rotation, scale_x, scale_y, shear_x, shear_y,
                );
                Matrix2x3::from_parts(
                    world.upper2x2(),
                    parent.transform_position([position_x, position_y]),
                )
            }
            TransformMode::NoRotationOrReflection => {
                // Keep the parent's scale but strip its rotation and
                // reflection before composing.
                let mut p = parent.upper2x2();
                let mut s = p.m00 * p.m00 + p.m10 * p.m10;
                let r;
                if s > 1.0e-4 {
                    s = p.determinant().abs() / s;
                    p.m01 = p.m10 * s;
                    p.m11 = p.m00 * s;
                    r = p.m10.atan2(p.m00).to_degrees();
                } else {
                    p.m00 = 0.0;
                    p.m10 = 0.0;
                    r = 90.0 - p.m11.atan2(p.m01).to_degrees();
                }
                p.m01 = -p.m01;

                let bone2x2 = local(rotation + shear_x - r, rotation + shear_y - r + 90.0);
                Matrix2x3::from_parts(
                    p.mul(&bone2x2),
                    parent.transform_position([position_x, position_y]),
                )
            }
            TransformMode::NoScale | TransformMode::NoScaleOrReflection => {
                // The bone's rotation folds into a renormalized parent
                // axis; the local part keeps only scale and shear.
                let rotation_radians = rotation.to_radians();
                let cos = rotation_radians.cos();
                let sin = rotation_radians.sin();

                let mut p = Matrix2x2 {
                    m00: parent.m00 * cos + parent.m01 * sin,
                    m01: 0.0,
                    m10: parent.m10 * cos + parent.m11 * sin,
                    m11: 0.0,
                };
                let mut s = (p.m00 * p.m00 + p.m10 * p.m10).sqrt();
                if s > 1.0e-4 {
                    s = 1.0 / s;
                }
                p.m00 *= s;
                p.m10 *= s;
                s = (p.m00 * p.m00 + p.m10 * p.m10).sqrt();

                let r = std::f32::consts::FRAC_PI_2 + p.m10.atan2(p.m00);
                p.m01 = r.cos() * s;
                p.m11 = r.sin() * s;

                let bone2x2 = local(shear_x, shear_y + 90.0);
                let mut out = Matrix2x3::from_parts(
                    p.mul(&bone2x2),
                    parent.transform_position([position_x, position_y]),
                );
                if data.transform_mode == TransformMode::NoScale
                    && parent.determinant_upper2x2() < 0.0
                {
                    out.m01 = -out.m01;
                    out.m11 = -out.m11;
                }
                out
            }
        };
    }

    fn pose_ik(&mut self, index: usize) {
        let data = Arc::clone(&self.data);
        let constraint = &data.ik_constraints[index];
        let state = self.ik[index];
        let target = self.palette[constraint.target].translation();

        match constraint.bones.as_slice() {
            [parent] => self.pose_ik1(
                *parent,
                target,
                state.mix,
                state.compress,
                state.stretch,
                state.uniform,
            ),
            [parent, child] => self.pose_ik2(
                *parent,
                *child,
                target,
                state.mix,
                if state.bend_positive { 1.0 } else { -1.0 },
                state.stretch,
                state.softness,
            ),
            _ => {}
        }
    }

    /// One-bone IK: rotate (and optionally scale) `parent` so its x axis
    /// points at the target.
    fn pose_ik1(
        &mut self,
        parent: usize,
        target: [f32; 2],
        alpha: f32,
        compress: bool,
        stretch: bool,
        uniform: bool,
    ) {
        let bone_data = &self.data.bones[parent];
        let state = self.bones[parent];
        let Some(pp_index) = bone_data.parent else {
            return;
        };
        let m_pp = self.palette[pp_index];

        let pa = m_pp.m00;
        let mut pb = m_pp.m01;
        let pc = m_pp.m10;
        let mut pd = m_pp.m11;

        let mut rotation_ik = -state.shear_x - state.rotation;
        let (mut tx, mut ty);
        match bone_data.transform_mode {
            TransformMode::OnlyTranslation => {
                tx = target[0] - m_pp.tx;
                ty = target[1] - m_pp.ty;
            }
            TransformMode::NoRotationOrReflection => {
                rotation_ik += pc.atan2(pa).to_degrees();
                let denom = (pa * pa + pc * pc).max(1.0e-4);
                let ps = (pa * pd - pb * pc).abs() / denom;
                pb = -pc * ps;
                pd = pa * ps;

                let x = target[0] - m_pp.tx;
                let y = target[1] - m_pp.ty;
                let det = pa * pd - pb * pc;
                if det.abs() <= 1.0e-4 {
                    tx = 0.0;
                    ty = 0.0;
                } else {
                    tx = (x * pd - y * pb) / det - state.x;
                    ty = (y * pa - x * pc) / det - state.y;
                }
            }
            _ => {
                let x = target[0] - m_pp.tx;
                let y = target[1] - m_pp.ty;
                let det = pa * pd - pb * pc;
                if det.abs() <= 1.0e-4 {
                    tx = 0.0;
                    ty = 0.0;
                } else {
                    tx = (x * pd - y * pb) / det - state.x;
                    ty = (y * pa - x * pc) / det - state.y;
                }
            }
        }

        rotation_ik += ty.atan2(tx).to_degrees();
        if state.scale_x < 0.0 {
            rotation_ik += 180.0;
        }
        rotation_ik = clamp_degrees(rotation_ik);

        let mut scale_x = state.scale_x;
        let mut scale_y = state.scale_y;
        if compress || stretch {
            if matches!(
                bone_data.transform_mode,
                TransformMode::NoScale | TransformMode::NoScaleOrReflection
            ) {
                tx = target[0] - m_pp.tx;
                ty = target[1] - m_pp.ty;
            }
            let b = bone_data.length * scale_x;
            let dd = (tx * tx + ty * ty).sqrt();
            if (compress && dd < b) || (stretch && dd > b && b > 1.0e-4) {
                let s = ((dd / b) - 1.0) * alpha + 1.0;
                scale_x *= s;
                if uniform {
                    scale_y *= s;
                }
            }
        }

        self.pose_bone_with(
            parent,
            state.x,
            state.y,
            state.rotation + rotation_ik * alpha,
            scale_x,
            scale_y,
            state.shear_x,
            state.shear_y,
        );
    }

    /// Two-bone planar IK with softness, stretch and bend direction.
    #[allow(clippy::too_many_arguments)]
    fn pose_ik2(
        &mut self,
        parent: usize,
        child: usize,
        target: [f32; 2],
        alpha: f32,
        bend_direction: f32,
        stretch: bool,
        softness: f32,
    ) {
        const EPSILON: f32 = 1.0e-4;
        const PI: f32 = std::f32::consts::PI;

        if alpha == 0.0 {
            self.pose_bone(child);
            return;
        }

        let data = Arc::clone(&self.data);
        let child_data = &data.bones[child];
        let parent_data = &data.bones[parent];
        let state_c = self.bones[child];
        let state_p = self.bones[parent];
        let m_p = self.palette[parent];

        let px = state_p.x;
        let py = state_p.y;
        let mut psx = state_p.scale_x;
        let mut sx = psx;
        let mut psy = state_p.scale_y;
        let mut csx = state_c.scale_x;

        let (os1, mut s2) = if psx < 0.0 {
            psx = -psx;
            (180.0f32, -1.0f32)
        } else {
            (0.0, 1.0)
        };
        if psy < 0.0 {
            psy = -psy;
            s2 = -s2;
        }
        let os2 = if csx < 0.0 {
            csx = -csx;
            180.0f32
        } else {
            0.0
        };

        let cx = state_c.x;
        let u = (psx - psy).abs() <= EPSILON;
        let (cy, cwx, cwy) = if !u {
            (0.0, m_p.m00 * cx + m_p.tx, m_p.m10 * cx + m_p.ty)
        } else {
            (
                state_c.y,
                m_p.m00 * cx + m_p.m01 * state_c.y + m_p.tx,
                m_p.m10 * cx + m_p.m11 * state_c.y + m_p.ty,
            )
        };

        let Some(pp_index) = parent_data.parent else {
            return;
        };
        let m_pp = self.palette[pp_index];
        let mut a = m_pp.m00;
        let mut b = m_pp.m01;
        let mut c = m_pp.m10;
        let mut d = m_pp.m11;

        let cross = a * d - b * c;
        let id = if cross.abs() <= PATH_EPSILON {
            0.0
        } else {
            1.0 / cross
        };
        let mut x = cwx - m_pp.tx;
        let mut y = cwy - m_pp.ty;
        let dx = (x * d - y * b) * id - px;
        let dy = (y * a - x * c) * id - py;
        let l1 = (dx * dx + dy * dy).sqrt();
        let mut l2 = child_data.length * csx;
        if l1 < EPSILON {
            self.pose_ik1(parent, target, alpha, false, stretch, false);
            self.pose_bone_with(
                child,
                cx,
                cy,
                0.0,
                state_c.scale_x,
                state_c.scale_y,
                state_c.shear_x,
                state_c.shear_y,
            );
            return;
        }

        x = target[0] - m_pp.tx;
        y = target[1] - m_pp.ty;
        let mut tx = (x * d - y * b) * id - px;
        let mut ty = (y * a - x * c) * id - py;
        let mut dd = tx * tx + ty * ty;

        if softness != 0.0 {
            let softness = softness * (psx * (csx + 1.0)) / 2.0;
            let td = dd.sqrt();
            let sd = td - l1 - (l2 * psx) + softness;
            if sd > 0.0 {
                let mut p = (sd / (softness * 2.0)).min(1.0) - 1.0;
                p = (sd - softness * (1.0 - p * p)) / td.max(EPSILON);
                tx -= p * tx;
                ty -= p * ty;
                dd = tx * tx + ty * ty;
            }
        }

        let mut a1;
        let mut a2;
        if u {
            l2 *= psx;
            let mut cos = (dd - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
            if cos < -1.0 {
                cos = -1.0;
            } else if cos > 1.0 {
                cos = 1.0;
                if stretch {
                    sx *= ((dd.sqrt() / (l1 + l2)) - 1.0) * alpha + 1.0;
                }
            }

            a2 = cos.acos() * bend_direction;
            a = l1 + l2 * cos;
            b = l2 * a2.sin();
            a1 = (ty * a - tx * b).atan2(tx * a + ty * b);
        } else {
            a = psx * l2;
            b = psy * l2;
            let aa = a * a;
            let bb = b * b;
            let ta = ty.atan2(tx);
            c = bb * l1 * l1 + aa * dd - aa * bb;
            let c1 = -2.0 * bb * l1;
            let c2 = bb - aa;
            d = c1 * c1 - 4.0 * c2 * c;

            let solved = 'quadratic: {
                if d < 0.0 {
                    break 'quadratic None;
                }
                let mut q = d.sqrt();
                if c1 < 0.0 {
                    q = -q;
                }
                q = -(c1 + q) / 2.0;
                let r0 = q / c2;
                let r1 = c / q;
                let r = if r0.abs() < r1.abs() { r0 } else { r1 };
                if r * r > dd {
                    break 'quadratic None;
                }
                let qy = (dd - r * r).sqrt() * bend_direction;
                Some((ta - qy.atan2(r), (qy / psy).atan2((r - l1) / psx)))
            };

            if let Some((q1, q2)) = solved {
                a1 = q1;
                a2 = q2;
            } else {
                // Off the reachable ellipse: snap to its nearest or
                // farthest point.
                let mut min_angle = PI;
                let mut min_x = l1 - a;
                let mut min_dist = min_x * min_x;
                let mut min_y = 0.0f32;
                let mut max_angle = 0.0f32;
                let mut max_x = l1 + a;
                let mut max_dist = max_x * max_x;
                let mut max_y = 0.0f32;

                c = -a * l1 / (aa - bb);
                if (-1.0..=1.0).contains(&c) {
                    c = c.acos();
                    x = a * c.cos() + l1;
                    y = b * c.sin();
                    d = x * x + y * y;
                    if d < min_dist {
                        min_angle = c;
                        min_dist = d;
                        min_x = x;
                        min_y = y;
                    }
                    if d > max_dist {
                        max_angle = c;
                        max_dist = d;
                        max_x = x;
                        max_y = y;
                    }
                }

                if dd <= (min_dist + max_dist) / 2.0 {
                    a1 = ta - (min_y * bend_direction).atan2(min_x);
                    a2 = min_angle * bend_direction;
                } else {
                    a1 = ta - (max_y * bend_direction).atan2(max_x);
                    a2 = max_angle * bend_direction;
                }
            }
        }

        let os = cy.atan2(cx) * s2;
        let rotation = state_p.rotation;
        a1 = clamp_degrees((a1 - os).to_degrees() + os1 - rotation);
        self.pose_bone_with(
            parent,
            px,
            py,
            rotation + a1 * alpha,
            sx,
            state_p.scale_y,
            0.0,
            0.0,
        );

        let rotation = state_c.rotation;
        a2 = clamp_degrees(((a2 + os).to_degrees() - state_c.shear_x) * s2 + os2 - rotation);
        self.pose_bone_with(
            child,
            cx,
            cy,
            rotation + a2 * alpha,
            state_c.scale_x,
            state_c.scale_y,
            state_c.shear_x,
            state_c.shear_y,
        );
    }

    fn path_attachment<'a>(
        data: &'a SkeletonData,
        slots: &[SlotInstance],
        target: usize,
    ) -> Option<&'a PathAttachmentData> {
        let attachment_id = slots[target].attachment.as_deref()?;
        // Path attachments always live on the default skin.
        // TODO: resolve through the active skin once instances track one.
        let skin = data.skins.get(DEFAULT_SKIN)?;
        match skin.attachment(target, attachment_id)? {
            AttachmentData::Path(path) => Some(path),
            _ => None,
        }
    }

    fn pose_path_constraint(&mut self, index: usize) {
        let data = Arc::clone(&self.data);
        let constraint = &data.path_constraints[index];

        let (position, position_mix, rotation_mix, spacing) = {
            let state = &self.paths[index];
            (
                state.position,
                state.position_mix,
                state.rotation_mix,
                state.spacing,
            )
        };
        let rotation = rotation_mix > 0.0;
        if position_mix <= 0.0 && !rotation {
            return;
        }

        let Some(path) = Self::path_attachment(&data, &self.slots, constraint.target) else {
            return;
        };

        let percent_spacing = constraint.spacing_mode == SpacingMode::Percent;
        let tangents = constraint.rotate_mode == RotateMode::Tangent;
        let scale = constraint.rotate_mode == RotateMode::ChainScale;
        let bone_count = constraint.bones.len();
        let spaces_count = if tangents { bone_count } else { bone_count + 1 };

        let mut scratch = std::mem::take(&mut self.paths[index].scratch);
        scratch.spaces.clear();
        scratch.spaces.resize(spaces_count, 0.0);

        // Spacing per chain link, proportional to each bone's world
        // length unless percent spacing is in effect.
        if scale || !percent_spacing {
            if scale {
                scratch.lengths.clear();
                scratch.lengths.resize(bone_count, 0.0);
            }
            let length_spacing = constraint.spacing_mode == SpacingMode::Length;
            let mut i = 0usize;
            let n = spaces_count - 1;
            while i < n {
                let bone = constraint.bones[i];
                let setup_length = data.bones[bone].length;
                if setup_length < PATH_EPSILON {
                    if scale {
                        scratch.lengths[i] = 0.0;
                    }
                    i += 1;
                    scratch.spaces[i] = 0.0;
                } else if percent_spacing {
                    if scale {
                        let m = &self.palette[bone];
                        let x = setup_length * m.m00;
                        let y = setup_length * m.m10;
                        scratch.lengths[i] = (x * x + y * y).sqrt();
                    }
                    i += 1;
                    scratch.spaces[i] = spacing;
                } else {
                    let m = &self.palette[bone];
                    let x = setup_length * m.m00;
                    let y = setup_length * m.m10;
                    let length = (x * x + y * y).sqrt();
                    if scale {
                        scratch.lengths[i] = length;
                    }
                    i += 1;
                    scratch.spaces[i] = (if length_spacing {
                        setup_length + spacing
                    } else {
                        spacing
                    }) * (length / setup_length);
                }
            }
        } else {
            for space in scratch.spaces.iter_mut().skip(1) {
                *space = spacing;
            }
        }

        let deform_key = DeformKey {
            skin: DEFAULT_SKIN.to_string(),
            slot: data.slots[constraint.target].name.clone(),
            attachment: path.name.clone(),
        };

        self.compute_path_points(
            constraint.target,
            path,
            self.deforms.get(&deform_key).map(|v| v.as_slice()),
            &mut scratch,
            spaces_count,
            tangents,
            constraint.position_mode == PositionMode::Percent,
            percent_spacing,
            position,
        );

        if scratch.positions.len() < spaces_count * 3 + 2 {
            self.paths[index].scratch = scratch;
            return;
        }

        let mut bone_x = scratch.positions[0];
        let mut bone_y = scratch.positions[1];
        let offset_rotation = constraint.offset_rotation;
        let tip = constraint.rotate_mode == RotateMode::Chain && offset_rotation == 0.0;

        let mut p = 3usize;
        for i in 0..bone_count {
            let bone = constraint.bones[i];
            let bone_data = &data.bones[bone];
            {
                let m = &mut self.palette[bone];
                m.tx += (bone_x - m.tx) * position_mix;
                m.ty += (bone_y - m.ty) * position_mix;
            }

            let x = scratch.positions[p];
            let y = scratch.positions[p + 1];
            let dx = x - bone_x;
            let dy = y - bone_y;

            if scale {
                let length = scratch.lengths[i];
                if length >= PATH_EPSILON {
                    let s = (((dx * dx + dy * dy).sqrt() / length) - 1.0) * rotation_mix + 1.0;
                    let m = &mut self.palette[bone];
                    m.m00 *= s;
                    m.m10 *= s;
                }
            }

            bone_x = x;
            bone_y = y;

            if rotation {
                let (a, b, c, d) = {
                    let m = &self.palette[bone];
                    (m.m00, m.m01, m.m10, m.m11)
                };
                let mut r = if tangents {
                    scratch.positions[p - 1]
                } else if scratch.spaces[i + 1] < PATH_EPSILON {
                    scratch.positions[p + 2]
                } else {
                    dy.atan2(dx)
                };
                r -= c.atan2(a) - offset_rotation.to_radians();

                if tip {
                    let cos = r.cos();
                    let sin = r.sin();
                    let length = bone_data.length;
                    bone_x += (length * (cos * a - sin * c) - dx) * rotation_mix;
                    bone_y += (length * (sin * a + cos * c) - dy) * rotation_mix;
                }

                r = clamp_radians(r) * rotation_mix;
                let cos = r.cos();
                let sin = r.sin();
                let m = &mut self.palette[bone];
                m.m00 = cos * a - sin * c;
                m.m01 = cos * b - sin * d;
                m.m10 = sin * a + cos * c;
                m.m11 = sin * b + cos * d;
            }

            p += 3;
        }

        self.paths[index].scratch = scratch;
    }

    /// Transforms a run of a path attachment's local vertices to world
    /// space. `start` and `count` are float component offsets into the
    /// logical vertex stream. An active deform buffer overrides the rest
    /// vertices.
    #[allow(clippy::too_many_arguments)]
    fn path_vertices_to_world(
        &self,
        world_matrix: &Matrix2x3,
        path: &PathAttachmentData,
        deform: Option<&[f32]>,
        start: usize,
        count: usize,
        out: &mut [f32],
        offset: usize,
    ) {
        let end = offset + count;
        match &path.vertices {
            MeshVertices::Unweighted(vertices) => {
                let mut v = start;
                let mut w = offset;
                while w < end {
                    let vi = v / 2;
                    let (x, y) = match deform {
                        Some(d) if d.len() >= v + 2 => (d[v], d[v + 1]),
                        _ => {
                            let p = vertices.get(vi).copied().unwrap_or([0.0, 0.0]);
                            (p[0], p[1])
                        }
                    };
                    let world = world_matrix.transform_position([x, y]);
                    out[w] = world[0];
                    out[w + 1] = world[1];
                    v += 2;
                    w += 2;
                }
            }
            MeshVertices::Weighted(vertices) => {
                // Skip whole weight groups preceding `start`.
                let start_vertex = start / 2;
                let mut f = 0usize;
                for weights in vertices.iter().take(start_vertex) {
                    f += weights.len() * 2;
                }

                let mut vi = start_vertex;
                let mut w = offset;
                while w < end {
                    let mut wx = 0.0f32;
                    let mut wy = 0.0f32;
                    for weight in vertices.get(vi).into_iter().flatten() {
                        let (x, y) = match deform {
                            Some(d) if d.len() >= f + 2 => (d[f], d[f + 1]),
                            _ => (weight.x, weight.y),
                        };
                        let m = &self.palette[weight.bone];
                        let world = m.transform_position([x, y]);
                        wx += world[0] * weight.weight;
                        wy += world[1] * weight.weight;
                        f += 2;
                    }
                    out[w] = wx;
                    out[w + 1] = wy;
                    vi += 1;
                    w += 2;
                }
            }
        }
    }

    /// Samples `spaces_count` positions (and tangents when requested)
    /// along the path into `scratch.positions` as `(x, y, r)` triples.
    #[allow(clippy::too_many_arguments)]
    fn compute_path_points(
        &self,
        target_slot: usize,
        path: &PathAttachmentData,
        deform: Option<&[f32]>,
        scratch: &mut PathScratch,
        spaces_count: usize,
        tangents: bool,
        percent_position: bool,
        percent_spacing: bool,
        mut position: f32,
    ) {
        const NONE: i32 = -1;
        const BEFORE: i32 = -2;
        const AFTER: i32 = -3;

        let world_matrix = self.palette[self.data.slots[target_slot].bone];
        let closed = path.closed;
        let mut vertex_components = path.vertex_count;

        scratch.positions.clear();
        if vertex_components < 6 || spaces_count == 0 {
            return;
        }
        scratch.positions.resize(spaces_count * 3 + 2, 0.0);

        let mut curve_count = (vertex_components / 6) as i32;
        let mut prev_curve = NONE;

        if !path.constant_speed {
            let lengths = path.lengths.as_slice();
            curve_count -= if closed { 1 } else { 2 };
            if curve_count < 0 || curve_count as usize >= lengths.len() {
                scratch.positions.clear();
                return;
            }
            let curve_count = curve_count as usize;
            let path_length = lengths[curve_count];
            if percent_position {
                position *= path_length;
            }
            if percent_spacing {
                for space in scratch.spaces.iter_mut().skip(1) {
                    *space *= path_length;
                }
            }

            scratch.world.clear();
            scratch.world.resize(8, 0.0);
            let mut curve = 0usize;
            for i in 0..spaces_count {
                let space = scratch.spaces[i];
                position += space;
                let mut p = position;

                if closed {
                    p = p.rem_euclid(path_length);
                    curve = 0;
                } else if p < 0.0 {
                    if prev_curve != BEFORE {
                        prev_curve = BEFORE;
                        let mut world = std::mem::take(&mut scratch.world);
                        self.path_vertices_to_world(
                            &world_matrix,
                            path,
                            deform,
                            2,
                            4,
                            &mut world,
                            0,
                        );
                        scratch.world = world;
                    }
                    add_before_position(p, &scratch.world, 0, &mut scratch.positions, i * 3);
                    continue;
                } else if p > path_length {
                    if prev_curve != AFTER {
                        prev_curve = AFTER;
                        let mut world = std::mem::take(&mut scratch.world);
                        self.path_vertices_to_world(
                            &world_matrix,
                            path,
                            deform,
                            vertex_components - 6,
                            4,
                            &mut world,
                            0,
                        );
                        scratch.world = world;
                    }
                    add_after_position(
                        p - path_length,
                        &scratch.world,
                        0,
                        &mut scratch.positions,
                        i * 3,
                    );
                    continue;
                }

                loop {
                    let length = lengths[curve];
                    if p > length {
                        curve += 1;
                        continue;
                    }
                    if curve == 0 {
                        p /= length.max(PATH_EPSILON);
                    } else {
                        let prev = lengths[curve - 1];
                        p = (p - prev) / (length - prev).max(PATH_EPSILON);
                    }
                    break;
                }

                if curve as i32 != prev_curve {
                    prev_curve = curve as i32;
                    let mut world = std::mem::take(&mut scratch.world);
                    if closed && curve == curve_count {
                        self.path_vertices_to_world(
                            &world_matrix,
                            path,
                            deform,
                            vertex_components - 4,
                            4,
                            &mut world,
                            0,
                        );
                        self.path_vertices_to_world(
                            &world_matrix,
                            path,
                            deform,
                            0,
                            4,
                            &mut world,
                            4,
                        );
                    } else {
                        self.path_vertices_to_world(
                            &world_matrix,
                            path,
                            deform,
                            curve * 6 + 2,
                            8,
                            &mut world,
                            0,
                        );
                    }
                    scratch.world = world;
                }

                let w = &scratch.world;
                add_curve_position(
                    p,
                    w[0],
                    w[1],
                    w[2],
                    w[3],
                    w[4],
                    w[5],
                    w[6],
                    w[7],
                    &mut scratch.positions,
                    i * 3,
                    tangents || (i > 0 && space < PATH_EPSILON),
                );
            }
            return;
        }

        // Constant speed: flatten the whole path into world space, build
        // a cumulative arc-length table per curve and invert it.
        let mut curve_count = curve_count as usize;
        scratch.world.clear();
        if closed {
            vertex_components += 2;
            scratch.world.resize(vertex_components, 0.0);
            let mut world = std::mem::take(&mut scratch.world);
            self.path_vertices_to_world(
                &world_matrix,
                path,
                deform,
                2,
                vertex_components - 4,
                &mut world,
                0,
            );
            self.path_vertices_to_world(
                &world_matrix,
                path,
                deform,
                0,
                2,
                &mut world,
                vertex_components - 4,
            );
            world[vertex_components - 2] = world[0];
            world[vertex_components - 1] = world[1];
            scratch.world = world;
        } else {
            curve_count -= 1;
            vertex_components -= 4;
            scratch.world.resize(vertex_components, 0.0);
            let mut world = std::mem::take(&mut scratch.world);
            self.path_vertices_to_world(
                &world_matrix,
                path,
                deform,
                2,
                vertex_components,
                &mut world,
                0,
            );
            scratch.world = world;
        }
        if curve_count == 0 {
            scratch.positions.clear();
            return;
        }

        scratch.curves.clear();
        scratch.curves.resize(curve_count, 0.0);
        let mut path_length = 0.0f32;
        let world = scratch.world.as_slice();
        let mut x1 = world[0];
        let mut y1 = world[1];
        let mut cx1 = 0.0f32;
        let mut cy1 = 0.0f32;
        let mut cx2 = 0.0f32;
        let mut cy2 = 0.0f32;
        let mut x2 = 0.0f32;
        let mut y2 = 0.0f32;
        let mut w = 2usize;
        for curve in scratch.curves.iter_mut() {
            cx1 = world[w];
            cy1 = world[w + 1];
            cx2 = world[w + 2];
            cy2 = world[w + 3];
            x2 = world[w + 4];
            y2 = world[w + 5];

            let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.1875;
            let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.1875;
            let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.09375;
            let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.09375;
            let mut ddfx = tmpx * 2.0 + dddfx;
            let mut ddfy = tmpy * 2.0 + dddfy;
            let mut dfx = (cx1 - x1) * 0.75 + tmpx + dddfx * 0.16666667;
            let mut dfy = (cy1 - y1) * 0.75 + tmpy + dddfy * 0.16666667;

            path_length += (dfx * dfx + dfy * dfy).sqrt();
            dfx += ddfx;
            dfy += ddfy;
            ddfx += dddfx;
            ddfy += dddfy;
            path_length += (dfx * dfx + dfy * dfy).sqrt();
            dfx += ddfx;
            dfy += ddfy;
            path_length += (dfx * dfx + dfy * dfy).sqrt();
            dfx += ddfx + dddfx;
            dfy += ddfy + dddfy;
            path_length += (dfx * dfx + dfy * dfy).sqrt();

            *curve = path_length;
            x1 = x2;
            y1 = y2;
            w += 6;
        }

        if percent_position {
            position *= path_length;
        } else if curve_count > 0 {
            // Fixed positions are authored against the editor lengths;
            // rescale into the flattened length.
            match path.lengths.get(curve_count - 1) {
                Some(&authored) if authored > PATH_EPSILON => {
                    position *= path_length / authored;
                }
                _ => {}
            }
        }
        if percent_spacing {
            for space in scratch.spaces.iter_mut().skip(1) {
                *space *= path_length;
            }
        }

        let mut curve_length = 0.0f32;
        let mut curve = 0usize;
        let mut segment = 0usize;
        for i in 0..spaces_count {
            let space = scratch.spaces[i];
            position += space;
            let mut p = position;

            if closed {
                p = p.rem_euclid(path_length);
                curve = 0;
            } else if p < 0.0 {
                add_before_position(p, &scratch.world, 0, &mut scratch.positions, i * 3);
                continue;
            } else if p > path_length {
                add_after_position(
                    p - path_length,
                    &scratch.world,
                    vertex_components - 4,
                    &mut scratch.positions,
                    i * 3,
                );
                continue;
            }

            loop {
                if curve >= scratch.curves.len() {
                    break;
                }
                let length = scratch.curves[curve];
                if p > length {
                    curve += 1;
                    continue;
                }
                if curve == 0 {
                    p /= length.max(PATH_EPSILON);
                } else {
                    let prev = scratch.curves[curve - 1];
                    p = (p - prev) / (length - prev).max(PATH_EPSILON);
                }
                break;
            }

            if curve as i32 != prev_curve {
                prev_curve = curve as i32;
                let world = scratch.world.as_slice();
                let ii = curve * 6;
                x1 = world[ii];
                y1 = world[ii + 1];
                cx1 = world[ii + 2];
                cy1 = world[ii + 3];
                cx2 = world[ii + 4];
                cy2 = world[ii + 5];
                x2 = world[ii + 6];
                y2 = world[ii + 7];

                let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.03;
                let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.03;
                let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.006;
                let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.006;
                let mut ddfx = tmpx * 2.0 + dddfx;
                let mut ddfy = tmpy * 2.0 + dddfy;
                let mut dfx = (cx1 - x1) * 0.3 + tmpx + dddfx * 0.16666667;
                let mut dfy = (cy1 - y1) * 0.3 + tmpy + dddfy * 0.16666667;

                curve_length = (dfx * dfx + dfy * dfy).sqrt();
                scratch.segments[0] = curve_length;
                for ii in 1..8 {
                    dfx += ddfx;
                    dfy += ddfy;
                    ddfx += dddfx;
                    ddfy += dddfy;
                    curve_length += (dfx * dfx + dfy * dfy).sqrt();
                    scratch.segments[ii] = curve_length;
                }
                dfx += ddfx;
                dfy += ddfy;
                curve_length += (dfx * dfx + dfy * dfy).sqrt();
                scratch.segments[8] = curve_length;
                dfx += ddfx + dddfx;
                dfy += ddfy + dddfy;
                curve_length += (dfx * dfx + dfy * dfy).sqrt();
                scratch.segments[9] = curve_length;
                segment = 0;
            }

            // Weight by segment length.
            p *= curve_length;
            loop {
                let length = scratch.segments[segment];
                if p > length {
                    segment += 1;
                    if segment >= 10 {
                        segment = 9;
                        break;
                    }
                    continue;
                }
                if segment == 0 {
                    p /= length.max(PATH_EPSILON);
                } else {
                    let prev = scratch.segments[segment - 1];
                    p = segment as f32 + (p - prev) / (length - prev).max(PATH_EPSILON);
                }
                break;
            }

            add_curve_position(
                p * 0.1,
                x1,
                y1,
                cx1,
                cy1,
                cx2,
                cy2,
                x2,
                y2,
                &mut scratch.positions,
                i * 3,
                tangents || (i > 0 && space < PATH_EPSILON),
            );
        }
    }

    fn pose_transform_constraint(&mut self, index: usize) {
        let data = Arc::clone(&self.data);
        let constraint = &data.transform_constraints[index];
        if constraint.local {
            if constraint.relative {
                self.pose_transform_relative_local(constraint, index);
            } else {
                self.pose_transform_absolute_local(constraint, index);
            }
        } else if constraint.relative {
            self.pose_transform_relative_world(constraint, index);
        } else {
            self.pose_transform_absolute_world(constraint, index);
        }
    }

    fn pose_transform_absolute_world(&mut self, data: &TransformConstraintData, index: usize) {
        let state = self.transforms[index];
        let target = self.palette[data.target];

        let mut offset_rotation = data.offset_rotation.to_radians();
        let mut offset_shear = data.offset_shear_y.to_radians();
        if target.determinant_upper2x2() <= 0.0 {
            offset_rotation = -offset_rotation;
            offset_shear = -offset_shear;
        }

        for &bone in &data.bones {
            let m = &mut self.palette[bone];

            if state.rotation_mix > 0.0 {
                let t0 = target.column(0);
                let b0 = m.column(0);
                let radians = state.rotation_mix
                    * clamp_radians(t0[1].atan2(t0[0]) - b0[1].atan2(b0[0]) + offset_rotation);
                let rotated = Matrix2x2::from_rotation(radians).mul(&m.upper2x2());
                m.set_upper2x2(rotated);
            }

            if state.position_mix > 0.0 {
                let target_position =
                    target.transform_position([data.offset_x, data.offset_y]);
                let translation = m.translation();
                m.set_translation([
                    translation[0] + (target_position[0] - translation[0]) * state.position_mix,
                    translation[1] + (target_position[1] - translation[1]) * state.position_mix,
                ]);
            }

            if state.scale_mix > 0.0 {
                let b0 = m.column(0);
                let bone_scale_x = (b0[0] * b0[0] + b0[1] * b0[1]).sqrt();
                let t0 = target.column(0);
                let target_scale_x = (t0[0] * t0[0] + t0[1] * t0[1]).sqrt();
                let scale_x = if bone_scale_x.abs() <= 1.0e-5 {
                    0.0
                } else {
                    (bone_scale_x
                        + (target_scale_x - bone_scale_x + data.offset_scale_x) * state.scale_mix)
                        / bone_scale_x
                };

                let b1 = m.column(1);
                let bone_scale_y = (b1[0] * b1[0] + b1[1] * b1[1]).sqrt();
                let t1 = target.column(1);
                let target_scale_y = (t1[0] * t1[0] + t1[1] * t1[1]).sqrt();
                let scale_y = if bone_scale_y.abs() <= 1.0e-5 {
                    0.0
                } else {
                    (bone_scale_y
                        + (target_scale_y - bone_scale_y + data.offset_scale_y) * state.scale_mix)
                        / bone_scale_y
                };

                m.set_column(0, [b0[0] * scale_x, b0[1] * scale_x]);
                m.set_column(1, [b1[0] * scale_y, b1[1] * scale_y]);
            }

            if state.shear_mix > 0.0 {
                let t0 = target.column(0);
                let t1 = target.column(1);
                let b0 = m.column(0);
                let b1 = m.column(1);

                let by = b1[1].atan2(b1[0]);
                let r = clamp_radians(
                    t1[1].atan2(t1[0]) - t0[1].atan2(t0[0]) - (by - b0[1].atan2(b0[0])),
                );
                let s = (b1[0] * b1[0] + b1[1] * b1[1]).sqrt();
                let final_rotation = by + (r + offset_shear) * state.shear_mix;

                m.m01 = final_rotation.cos() * s;
                m.m11 = final_rotation.sin() * s;
            }
        }
    }

    fn pose_transform_relative_world(&mut self, data: &TransformConstraintData, index: usize) {
        let state = self.transforms[index];
        let target = self.palette[data.target];

        let mut offset_rotation = data.offset_rotation.to_radians();
        let mut offset_shear = data.offset_shear_y.to_radians();
        if target.determinant_upper2x2() <= 0.0 {
            offset_rotation = -offset_rotation;
            offset_shear = -offset_shear;
        }

        for &bone in &data.bones {
            let m = &mut self.palette[bone];

            if state.rotation_mix > 0.0 {
                let t0 = target.column(0);
                let radians =
                    state.rotation_mix * clamp_radians(t0[1].atan2(t0[0]) + offset_rotation);
                let rotated = Matrix2x2::from_rotation(radians).mul(&m.upper2x2());
                m.set_upper2x2(rotated);
            }

            if state.position_mix > 0.0 {
                let offset = target.transform_position([data.offset_x, data.offset_y]);
                m.tx += offset[0] * state.position_mix;
                m.ty += offset[1] * state.position_mix;
            }

            if state.scale_mix > 0.0 {
                let t0 = target.column(0);
                let target_scale_x = (t0[0] * t0[0] + t0[1] * t0[1]).sqrt();
                let scale_x = 1.0 + (target_scale_x - 1.0 + data.offset_scale_x) * state.scale_mix;

                let t1 = target.column(1);
                let target_scale_y = (t1[0] * t1[0] + t1[1] * t1[1]).sqrt();
                let scale_y = 1.0 + (target_scale_y - 1.0 + data.offset_scale_y) * state.scale_mix;

                let b0 = m.column(0);
                let b1 = m.column(1);
                m.set_column(0, [b0[0] * scale_x, b0[1] * scale_x]);
                m.set_column(1, [b1[0] * scale_y, b1[1] * scale_y]);
            }

            if state.shear_mix > 0.0 {
                let t0 = target.column(0);
                let t1 = target.column(1);
                let b1 = m.column(1);

                let by = b1[1].atan2(b1[0]);
                let r = clamp_radians(t1[1].atan2(t1[0]) - t0[1].atan2(t0[0]));
                let s = (b1[0] * b1[0] + b1[1] * b1[1]).sqrt();
                let final_rotation =
                    by + (r - std::f32::consts::FRAC_PI_2 + offset_shear) * state.shear_mix;

                m.m01 = final_rotation.cos() * s;
                m.m11 = final_rotation.sin() * s;
            }
        }
    }

    fn pose_transform_absolute_local(&mut self, data: &TransformConstraintData, index: usize) {
        let state = self.transforms[index];
        let target = self.bones[data.target];

        for &bone_index in &data.bones {
            let bone = self.bones[bone_index];

            let mut rotation = bone.rotation;
            if state.rotation_mix != 0.0 {
                let r = target.rotation - rotation + data.offset_rotation;
                rotation += r * state.rotation_mix;
            }

            let mut x = bone.x;
            let mut y = bone.y;
            if state.position_mix != 0.0 {
                x += (target.x - x + data.offset_x) * state.position_mix;
                y += (target.y - y + data.offset_y) * state.position_mix;
            }

            let mut scale_x = bone.scale_x;
            let mut scale_y = bone.scale_y;
            if state.scale_mix != 0.0 {
                if scale_x != 0.0 {
                    scale_x = (scale_x
                        + (target.scale_x - scale_x + data.offset_scale_x) * state.scale_mix)
                        / scale_x;
                }
                if scale_y != 0.0 {
                    scale_y = (scale_y
                        + (target.scale_y - scale_y + data.offset_scale_y) * state.scale_mix)
                        / scale_y;
                }
            }

            let mut shear_y = bone.shear_y;
            if state.shear_mix != 0.0 {
                let r = target.shear_y - shear_y + data.offset_shear_y;
                shear_y += r * state.shear_mix;
            }

            self.pose_bone_with(
                bone_index,
                x,
                y,
                rotation,
                scale_x,
                scale_y,
                bone.shear_x,
                shear_y,
            );
        }
    }

    fn pose_transform_relative_local(&mut self, data: &TransformConstraintData, index: usize) {
        let state = self.transforms[index];
        let target = self.bones[data.target];

        for &bone_index in &data.bones {
            let bone = self.bones[bone_index];

            let mut rotation = bone.rotation;
            if state.rotation_mix != 0.0 {
                rotation += (target.rotation + data.offset_rotation) * state.rotation_mix;
            }

            let mut x = bone.x;
            let mut y = bone.y;
            if state.position_mix != 0.0 {
                x += (target.x + data.offset_x) * state.position_mix;
                y += (target.y + data.offset_y) * state.position_mix;
            }

            let mut scale_x = bone.scale_x;
            let mut scale_y = bone.scale_y;
            if state.scale_mix != 0.0 {
                scale_x *= ((target.scale_x - 1.0 + data.offset_scale_x) * state.scale_mix) + 1.0;
                scale_y *= ((target.scale_y - 1.0 + data.offset_scale_y) * state.scale_mix) + 1.0;
            }

            let mut shear_y = bone.shear_y;
            if state.shear_mix != 0.0 {
                shear_y += (target.shear_y + data.offset_shear_y) * state.shear_mix;
            }

            self.pose_bone_with(
                bone_index,
                x,
                y,
                rotation,
                scale_x,
                scale_y,
                bone.shear_x,
                shear_y,
            );
        }
    }
}

fn add_before_position(p: f32, temp: &[f32], i: usize, output: &mut [f32], o: usize) {
    let x1 = temp[i];
    let y1 = temp[i + 1];
    let dx = temp[i + 2] - x1;
    let dy = temp[i + 3] - y1;
    let r = dy.atan2(dx);
    output[o] = x1 + p * r.cos();
    output[o + 1] = y1 + p * r.sin();
    output[o + 2] = r;
}

fn add_after_position(p: f32, temp: &[f32], i: usize, output: &mut [f32], o: usize) {
    let x1 = temp[i + 2];
    let y1 = temp[i + 3];
    let dx = x1 - temp[i];
    let dy = y1 - temp[i + 1];
    let r = dy.atan2(dx);
    output[o] = x1 + p * r.cos();
    output[o + 1] = y1 + p * r.sin();
    output[o + 2] = r;
}

#[allow(clippy::too_many_arguments)]
fn add_curve_position(
    p: f32,
    x1: f32,
    y1: f32,
    cx1: f32,
    cy1: f32,
    cx2: f32,
    cy2: f32,
    x2: f32,
    y2: f32,
    output: &mut [f32],
    o: usize,
    tangents: bool,
) {
    if p < PATH_EPSILON || p.is_nan() {
        output[o] = x1;
        output[o + 1] = y1;
        output[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        return;
    }

    let tt = p * p;
    let ttt = tt * p;
    let u = 1.0 - p;
    let uu = u * u;
    let uuu = uu * u;
    let ut = u * p;
    let ut3 = ut * 3.0;
    let uut3 = u * ut3;
    let utt3 = ut3 * p;
    let x = x1 * uuu + cx1 * uut3 + cx2 * utt3 + x2 * ttt;
    let y = y1 * uuu + cy1 * uut3 + cy2 * utt3 + y2 * ttt;
    output[o] = x;
    output[o + 1] = y;

    if tangents {
        if p < PATH_EPSILON_LOOSE {
            output[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        } else {
            output[o + 2] = (y - (y1 * uu + cy1 * ut * 2.0 + cy2 * tt))
                .atan2(x - (x1 * uu + cx1 * ut * 2.0 + cx2 * tt));
        }
    }
}
