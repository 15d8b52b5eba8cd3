//! Per-clip evaluation: one evaluator per non-empty timeline channel,
//! all writing weighted contributions into the instance [`Cache`].
//!
//! Evaluators are a sum over channel kinds; the only shared state is a
//! cached bracket hint (`last_key`) that resets when time moves
//! backwards. Accumulation is commutative per channel, so evaluator
//! order within a frame does not affect the committed result.
//!
//! [`Cache`]: crate::Cache

use std::sync::Arc;

use crate::error::Error;
use crate::math::{lerp, lerp_degrees};
use crate::model::{
    BezierCurve, ColorFrame, Curve, CurveType, DeformFrame, IkFrame, PathMixFrame, RotationFrame,
    SkeletonData, TransformFrame, TwoColorFrame, Vec2Frame,
};
use crate::runtime::cache::{set_default_draw_order, IkEntry, TwoColorEntry};
use crate::runtime::instance::{DeformKey, SkeletonInstance};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClipSettings {
    /// Below this blend weight, event dispatch is suppressed.
    pub event_mix_threshold: f32,
}

impl Default for ClipSettings {
    fn default() -> Self {
        ClipSettings {
            event_mix_threshold: 0.0,
        }
    }
}

/// The editor rounds key times to 4 decimal places. Quantizing input
/// times the same way makes sure stepped and discrete keys land on the
/// exact frame they were authored on.
fn to_editor_time(seconds: f32) -> f32 {
    ((seconds as f64 * 10000.0).round() / 10000.0) as f32
}

trait Keyed {
    fn time(&self) -> f32;
    fn curve(&self) -> Curve;
}

macro_rules! impl_keyed {
    ($($frame:ty),+) => {
        $(impl Keyed for $frame {
            fn time(&self) -> f32 {
                self.time
            }

            fn curve(&self) -> Curve {
                self.curve
            }
        })+
    };
}

impl_keyed!(
    RotationFrame,
    Vec2Frame,
    IkFrame,
    PathMixFrame,
    crate::model::FloatFrame,
    TransformFrame,
    ColorFrame,
    TwoColorFrame,
    DeformFrame
);

fn curve_alpha<T: Keyed>(curves: &[BezierCurve], k0: &T, k1: &T, time: f32) -> f32 {
    let linear = {
        let denom = k1.time() - k0.time();
        if denom <= 1.0e-12 {
            0.0
        } else {
            ((time - k0.time()) / denom).clamp(0.0, 1.0)
        }
    };
    match k0.curve().curve_type() {
        CurveType::Linear => linear,
        CurveType::Stepped => 0.0,
        CurveType::Bezier => bezier_alpha(linear, &curves[k0.curve().bezier_offset()]),
    }
}

/// Maps a linear 0..1 parameter through a precomputed piecewise-linear
/// Bezier table (9 `(x, y)` samples): find the first sample at or past
/// the input and interpolate from the preceding one.
fn bezier_alpha(linear: f32, curve: &BezierCurve) -> f32 {
    let mut x = curve[0];
    if x >= linear {
        if x <= 1.0e-12 {
            return 0.0;
        }
        return (curve[1] * linear) / x;
    }

    let mut i = 2usize;
    while i < curve.len() {
        x = curve[i];
        if x >= linear {
            let prev_x = curve[i - 2];
            let prev_y = curve[i - 1];
            let denom = x - prev_x;
            if denom <= 1.0e-12 {
                return prev_y;
            }
            return prev_y + ((curve[i + 1] - prev_y) * (linear - prev_x)) / denom;
        }
        i += 2;
    }

    let y = curve[curve.len() - 1];
    let denom = 1.0 - x;
    if denom <= 1.0e-12 {
        return y;
    }
    y + ((1.0 - y) * (linear - x)) / denom
}

/// Locates the bracketing keys for `time`, reusing `last_key` as a scan
/// hint. Both ends collapse to the same key before the first frame and
/// past the last.
fn bracket<'a, T: Keyed>(
    frames: &'a [T],
    curves: &[BezierCurve],
    time: f32,
    last_key: &mut usize,
) -> (&'a T, &'a T, f32) {
    if frames[*last_key].time() > time {
        if *last_key == 0 {
            let k = &frames[0];
            return (k, k, curve_alpha(curves, k, k, time));
        }
        *last_key = 0;
    }

    let size = frames.len();
    while *last_key + 1 < size {
        if frames[*last_key + 1].time() > time {
            let k0 = &frames[*last_key];
            let k1 = &frames[*last_key + 1];
            return (k0, k1, curve_alpha(curves, k0, k1, time));
        }
        *last_key += 1;
    }

    let k = &frames[*last_key];
    (k, k, curve_alpha(curves, k, k, time))
}

fn lerp_boolean(base: bool, b0: bool, b1: bool, t: f32, alpha: f32) -> f32 {
    let fb = if base { 1.0 } else { 0.0 };
    let f0 = if b0 { 1.0 } else { 0.0 };
    let f1 = if b1 { 1.0 } else { 0.0 };
    (lerp(f0, f1, t) - fb) * alpha
}

#[derive(Clone, Debug)]
enum EvaluatorKind {
    Rotation { bone_id: String, bone: usize },
    Translation { bone_id: String, bone: usize },
    Scale { bone_id: String, bone: usize },
    Shear { bone_id: String, bone: usize },
    Ik { id: String, ik: usize },
    PathMix { id: String, path: usize },
    PathPosition { id: String, path: usize },
    PathSpacing { id: String, path: usize },
    Transform { id: String, transform: usize },
    SlotAttachment { id: String, slot: usize },
    SlotColor { id: String, slot: usize },
    SlotTwoColor { id: String, slot: usize },
    Deform { key: DeformKey },
    DrawOrder,
}

#[derive(Clone, Debug)]
struct Evaluator {
    last_key: usize,
    kind: EvaluatorKind,
}

impl Evaluator {
    fn new(kind: EvaluatorKind) -> Evaluator {
        Evaluator { last_key: 0, kind }
    }
}

/// Runtime binding of one clip to one instance. Construction registers
/// deform buffer references; [`ClipInstance::retire`] releases them.
pub struct ClipInstance {
    data: Arc<SkeletonData>,
    clip: usize,
    settings: ClipSettings,
    max_time: f32,
    evaluators: Vec<Evaluator>,
    has_events: bool,
}

impl ClipInstance {
    pub fn new(
        instance: &mut SkeletonInstance,
        clip_name: &str,
        settings: ClipSettings,
    ) -> Result<ClipInstance, Error> {
        let data = Arc::clone(instance.data());
        let Some((clip_index, clip)) = data.clip(clip_name) else {
            return Err(Error::UnknownClip {
                name: clip_name.to_string(),
            });
        };

        let mut max_time = 0.0f32;
        let mut track = |frames_last_time: Option<f32>| {
            if let Some(t) = frames_last_time {
                max_time = max_time.max(t);
            }
        };

        let mut evaluators = Vec::new();

        // Bones first. Unknown bones were already dropped during
        // finalization (retargeting support).
        let mut bone_ids = clip.bones.keys().cloned().collect::<Vec<_>>();
        bone_ids.sort();
        for bone_id in bone_ids {
            let Some(&bone) = data.bone_index.get(&bone_id) else {
                continue;
            };
            let timelines = &clip.bones[&bone_id];
            if !timelines.rotation.is_empty() {
                track(timelines.rotation.last().map(|f| f.time));
                evaluators.push(Evaluator::new(EvaluatorKind::Rotation {
                    bone_id: bone_id.clone(),
                    bone,
                }));
            }
            if !timelines.scale.is_empty() {
                track(timelines.scale.last().map(|f| f.time));
                evaluators.push(Evaluator::new(EvaluatorKind::Scale {
                    bone_id: bone_id.clone(),
                    bone,
                }));
            }
            if !timelines.shear.is_empty() {
                track(timelines.shear.last().map(|f| f.time));
                evaluators.push(Evaluator::new(EvaluatorKind::Shear {
                    bone_id: bone_id.clone(),
                    bone,
                }));
            }
            if !timelines.translation.is_empty() {
                track(timelines.translation.last().map(|f| f.time));
                evaluators.push(Evaluator::new(EvaluatorKind::Translation {
                    bone_id: bone_id.clone(),
                    bone,
                }));
            }
        }

        // Deforms; each evaluator holds one buffer reference for its
        // lifetime.
        let mut skin_ids = clip.deforms.keys().cloned().collect::<Vec<_>>();
        skin_ids.sort();
        for skin_id in skin_ids {
            let by_slot = &clip.deforms[&skin_id];
            let mut slot_ids = by_slot.keys().cloned().collect::<Vec<_>>();
            slot_ids.sort();
            for slot_id in slot_ids {
                let by_attachment = &by_slot[&slot_id];
                let mut attachment_ids = by_attachment.keys().cloned().collect::<Vec<_>>();
                attachment_ids.sort();
                for attachment_id in attachment_ids {
                    track(by_attachment[&attachment_id].last().map(|f| f.time));
                    let key = DeformKey {
                        skin: skin_id.clone(),
                        slot: slot_id.clone(),
                        attachment: attachment_id,
                    };
                    *instance.deform_refs.entry(key.clone()).or_insert(0) += 1;
                    evaluators.push(Evaluator::new(EvaluatorKind::Deform { key }));
                }
            }
        }

        // Draw order.
        if !clip.draw_order.is_empty() {
            track(clip.draw_order.last().map(|f| f.time));
            evaluators.push(Evaluator::new(EvaluatorKind::DrawOrder));
        }

        // Events (range-dispatched; no per-frame evaluator entry).
        let has_events = !clip.events.is_empty();
        track(clip.events.last().map(|f| f.time));

        // Ik.
        let mut ik_ids = clip.ik.keys().cloned().collect::<Vec<_>>();
        ik_ids.sort();
        for id in ik_ids {
            let Some(&ik) = data.ik_index.get(&id) else {
                continue;
            };
            track(clip.ik[&id].last().map(|f| f.time));
            evaluators.push(Evaluator::new(EvaluatorKind::Ik { id, ik }));
        }

        // Paths.
        let mut path_ids = clip.paths.keys().cloned().collect::<Vec<_>>();
        path_ids.sort();
        for id in path_ids {
            let Some(&path) = data.path_index.get(&id) else {
                continue;
            };
            let timelines = &clip.paths[&id];
            if !timelines.mix.is_empty() {
                track(timelines.mix.last().map(|f| f.time));
                evaluators.push(Evaluator::new(EvaluatorKind::PathMix {
                    id: id.clone(),
                    path,
                }));
            }
            if !timelines.position.is_empty() {
                track(timelines.position.last().map(|f| f.time));
                evaluators.push(Evaluator::new(EvaluatorKind::PathPosition {
                    id: id.clone(),
                    path,
                }));
            }
            if !timelines.spacing.is_empty() {
                track(timelines.spacing.last().map(|f| f.time));
                evaluators.push(Evaluator::new(EvaluatorKind::PathSpacing {
                    id: id.clone(),
                    path,
                }));
            }
        }

        // Slots.
        let mut slot_ids = clip.slots.keys().cloned().collect::<Vec<_>>();
        slot_ids.sort();
        for id in slot_ids {
            let Some(&slot) = data.slot_index.get(&id) else {
                continue;
            };
            let timelines = &clip.slots[&id];
            if !timelines.attachment.is_empty() {
                track(timelines.attachment.last().map(|f| f.time));
                evaluators.push(Evaluator::new(EvaluatorKind::SlotAttachment {
                    id: id.clone(),
                    slot,
                }));
            }
            if !timelines.color.is_empty() {
                track(timelines.color.last().map(|f| f.time));
                evaluators.push(Evaluator::new(EvaluatorKind::SlotColor {
                    id: id.clone(),
                    slot,
                }));
            }
            if !timelines.two_color.is_empty() {
                track(timelines.two_color.last().map(|f| f.time));
                evaluators.push(Evaluator::new(EvaluatorKind::SlotTwoColor {
                    id: id.clone(),
                    slot,
                }));
            }
        }

        // Transforms.
        let mut transform_ids = clip.transforms.keys().cloned().collect::<Vec<_>>();
        transform_ids.sort();
        for id in transform_ids {
            let Some(&transform) = data.transform_index.get(&id) else {
                continue;
            };
            track(clip.transforms[&id].last().map(|f| f.time));
            evaluators.push(Evaluator::new(EvaluatorKind::Transform { id, transform }));
        }

        Ok(ClipInstance {
            data,
            clip: clip_index,
            settings,
            max_time,
            evaluators,
            has_events,
        })
    }

    pub fn clip_name(&self) -> &str {
        &self.data.clips[self.clip].name
    }

    /// Time of the latest keyframe across all channels.
    pub fn max_time(&self) -> f32 {
        self.max_time
    }

    /// Accumulates this clip's channels into the instance cache at
    /// `time` with blend weight `alpha`. Discrete channels (attachment
    /// keys) only contribute at partial weight when `blend_discrete` is
    /// set.
    pub fn evaluate(
        &mut self,
        instance: &mut SkeletonInstance,
        time: f32,
        alpha: f32,
        blend_discrete: bool,
    ) {
        let time = to_editor_time(time);
        let data = Arc::clone(&self.data);
        let clip = &data.clips[self.clip];

        for evaluator in &mut self.evaluators {
            let last_key = &mut evaluator.last_key;
            match &evaluator.kind {
                EvaluatorKind::Rotation { bone_id, bone } => {
                    let frames = &clip.bones[bone_id].rotation;
                    if time < frames[0].time {
                        continue;
                    }
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    instance
                        .cache_mut()
                        .accum_rotation(*bone, alpha * lerp_degrees(k0.angle, k1.angle, t));
                }
                EvaluatorKind::Translation { bone_id, bone } => {
                    let frames = &clip.bones[bone_id].translation;
                    if time < frames[0].time {
                        continue;
                    }
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    instance.cache_mut().accum_position(
                        *bone,
                        [alpha * lerp(k0.x, k1.x, t), alpha * lerp(k0.y, k1.y, t)],
                    );
                }
                EvaluatorKind::Scale { bone_id, bone } => {
                    let frames = &clip.bones[bone_id].scale;
                    if time < frames[0].time {
                        continue;
                    }
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    instance.cache_mut().accum_scale(
                        *bone,
                        [alpha * lerp(k0.x, k1.x, t), alpha * lerp(k0.y, k1.y, t)],
                        alpha,
                    );
                }
                EvaluatorKind::Shear { bone_id, bone } => {
                    let frames = &clip.bones[bone_id].shear;
                    if time < frames[0].time {
                        continue;
                    }
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    instance.cache_mut().accum_shear(
                        *bone,
                        [alpha * lerp(k0.x, k1.x, t), alpha * lerp(k0.y, k1.y, t)],
                    );
                }
                EvaluatorKind::Ik { id, ik } => {
                    let frames = &clip.ik[id];
                    if time < frames[0].time {
                        continue;
                    }
                    let base = &data.ik_constraints[*ik];
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    let entry = IkEntry {
                        mix: (lerp(k0.mix, k1.mix, t) - base.mix) * alpha,
                        softness: (lerp(k0.softness, k1.softness, t) - base.softness) * alpha,
                        bend_positive: lerp_boolean(
                            base.bend_positive,
                            k0.bend_positive,
                            k1.bend_positive,
                            t,
                            alpha,
                        ),
                        compress: lerp_boolean(base.compress, k0.compress, k1.compress, t, alpha),
                        stretch: lerp_boolean(base.stretch, k0.stretch, k1.stretch, t, alpha),
                    };
                    instance.cache_mut().accum_ik(*ik, entry);
                }
                EvaluatorKind::PathMix { id, path } => {
                    let frames = &clip.paths[id].mix;
                    if time < frames[0].time {
                        continue;
                    }
                    let base = &data.path_constraints[*path];
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    instance.cache_mut().accum_path_mix(
                        *path,
                        [
                            (lerp(k0.position_mix, k1.position_mix, t) - base.position_mix)
                                * alpha,
                            (lerp(k0.rotation_mix, k1.rotation_mix, t) - base.rotation_mix)
                                * alpha,
                        ],
                    );
                }
                EvaluatorKind::PathPosition { id, path } => {
                    let frames = &clip.paths[id].position;
                    if time < frames[0].time {
                        continue;
                    }
                    let base = &data.path_constraints[*path];
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    instance
                        .cache_mut()
                        .accum_path_position(*path, (lerp(k0.value, k1.value, t) - base.position) * alpha);
                }
                EvaluatorKind::PathSpacing { id, path } => {
                    let frames = &clip.paths[id].spacing;
                    if time < frames[0].time {
                        continue;
                    }
                    let base = &data.path_constraints[*path];
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    instance
                        .cache_mut()
                        .accum_path_spacing(*path, (lerp(k0.value, k1.value, t) - base.spacing) * alpha);
                }
                EvaluatorKind::Transform { id, transform } => {
                    let frames = &clip.transforms[id];
                    if time < frames[0].time {
                        continue;
                    }
                    let base = &data.transform_constraints[*transform];
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    instance.cache_mut().accum_transform(
                        *transform,
                        [
                            (lerp(k0.position_mix, k1.position_mix, t) - base.position_mix)
                                * alpha,
                            (lerp(k0.rotation_mix, k1.rotation_mix, t) - base.rotation_mix)
                                * alpha,
                            (lerp(k0.scale_mix, k1.scale_mix, t) - base.scale_mix) * alpha,
                            (lerp(k0.shear_mix, k1.shear_mix, t) - base.shear_mix) * alpha,
                        ],
                    );
                }
                EvaluatorKind::SlotAttachment { id, slot } => {
                    let frames = &clip.slots[id].attachment;
                    if time < frames[0].time {
                        continue;
                    }
                    // Discrete state only participates in partial-weight
                    // blends when the caller opted in.
                    if !blend_discrete && alpha != 1.0 {
                        continue;
                    }
                    let mut u = 0usize;
                    while u + 1 < frames.len() && frames[u + 1].time <= time {
                        u += 1;
                    }
                    instance.cache_mut().accum_slot_attachment(
                        *slot,
                        frames[u].attachment.clone(),
                        alpha,
                    );
                }
                EvaluatorKind::SlotColor { id, slot } => {
                    let frames = &clip.slots[id].color;
                    if time < frames[0].time {
                        continue;
                    }
                    let base = &data.slots[*slot];
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    let mut delta = [0.0f32; 4];
                    for (c, out) in delta.iter_mut().enumerate() {
                        *out = (lerp(k0.color[c] as f32, k1.color[c] as f32, t)
                            - base.color[c] as f32)
                            * alpha;
                    }
                    instance.cache_mut().accum_slot_color(*slot, delta);
                }
                EvaluatorKind::SlotTwoColor { id, slot } => {
                    let frames = &clip.slots[id].two_color;
                    if time < frames[0].time {
                        continue;
                    }
                    let base = &data.slots[*slot];
                    let base_dark = base.dark_color.unwrap_or([0, 0, 0]);
                    let (k0, k1, t) = bracket(frames, &data.curves, time, last_key);
                    let mut entry = TwoColorEntry::default();
                    for (c, out) in entry.light.iter_mut().enumerate() {
                        *out = (lerp(k0.light[c] as f32, k1.light[c] as f32, t)
                            - base.color[c] as f32)
                            * alpha;
                    }
                    for (c, out) in entry.dark.iter_mut().enumerate() {
                        *out = (lerp(k0.dark[c] as f32, k1.dark[c] as f32, t)
                            - base_dark[c] as f32)
                            * alpha;
                    }
                    instance.cache_mut().accum_slot_two_color(*slot, entry);
                }
                EvaluatorKind::Deform { key } => {
                    let frames = &clip.deforms[&key.skin][&key.slot][&key.attachment];
                    evaluate_deform(instance, key, frames, &data.curves, time, alpha, last_key);
                }
                EvaluatorKind::DrawOrder => {
                    evaluate_draw_order(instance, &data, &clip.draw_order, time);
                }
            }
        }
    }

    /// Dispatches events with `time in (start, end]` to the instance's
    /// event sink. When `start` is zero and the first event sits at
    /// zero, the range closes on the left so time-zero events fire.
    pub fn evaluate_range(
        &mut self,
        instance: &mut SkeletonInstance,
        start: f32,
        end: f32,
        alpha: f32,
    ) {
        if !self.has_events {
            return;
        }
        if alpha < self.settings.event_mix_threshold {
            return;
        }
        let Some(sink) = instance.event_sink().cloned() else {
            return;
        };

        let start = to_editor_time(start);
        let end = to_editor_time(end);
        let events = &self.data.clips[self.clip].events;

        let mut u = 0usize;
        if start != 0.0 || events[0].time != 0.0 {
            while u < events.len() && events[u].time <= start {
                u += 1;
            }
        }
        while u < events.len() {
            let e = &events[u];
            if e.time > end {
                break;
            }
            sink.dispatch(&e.event, e.int_value, e.float_value, &e.string_value);
            u += 1;
        }
    }

    /// Time of the next event named `name` strictly after `start_time`.
    pub fn next_event_time(&self, name: &str, start_time: f32) -> Option<f32> {
        let start = to_editor_time(start_time);
        let events = &self.data.clips[self.clip].events;
        let begin = events.partition_point(|e| e.time <= start);
        events[begin..]
            .iter()
            .find(|e| e.event == name)
            .map(|e| e.time)
    }

    /// Releases this clip's deform buffer references. The last release
    /// of a key frees its buffer.
    pub fn retire(self, instance: &mut SkeletonInstance) {
        for evaluator in &self.evaluators {
            if let EvaluatorKind::Deform { key } = &evaluator.kind {
                release_deform(instance, key);
            }
        }
    }
}

fn release_deform(instance: &mut SkeletonInstance, key: &DeformKey) {
    let Some(count) = instance.deform_refs.get_mut(key) else {
        debug_assert!(false, "unbalanced deform release");
        return;
    };
    *count -= 1;
    debug_assert!(*count >= 0);
    if *count <= 0 {
        instance.deform_refs.remove(key);
        instance.deforms.remove(key);
    }
}

fn evaluate_deform(
    instance: &mut SkeletonInstance,
    key: &DeformKey,
    frames: &[DeformFrame],
    curves: &[BezierCurve],
    time: f32,
    alpha: f32,
    last_key: &mut usize,
) {
    if time < frames[0].time {
        // Ahead of the first key this clip contributes nothing; if this
        // evaluator is the only owner, drop the buffer so the rest pose
        // shows through.
        if instance.deform_ref_count(key) == 1 {
            instance.deforms.remove(key);
        }
        return;
    }

    let (k0, k1, t) = bracket(frames, curves, time, last_key);
    let v0 = &k0.vertices;
    let v1 = &k1.vertices;
    debug_assert_eq!(v0.len(), v1.len());

    let mut alpha = alpha;
    let buffer = instance.deforms.entry(key.clone()).or_insert_with(|| {
        // First write initializes the buffer; blending against zeroes
        // would dip toward the rest pose, so snap.
        alpha = 1.0;
        vec![0.0f32; v0.len()]
    });

    if alpha < 1.0 {
        for (i, out) in buffer.iter_mut().enumerate() {
            *out += (lerp(v0[i], v1[i], t) - *out) * alpha;
        }
    } else {
        for (i, out) in buffer.iter_mut().enumerate() {
            *out = lerp(v0[i], v1[i], t);
        }
    }
}

fn evaluate_draw_order(
    instance: &mut SkeletonInstance,
    data: &SkeletonData,
    frames: &[crate::model::DrawOrderFrame],
    time: f32,
) {
    if time < frames[0].time {
        return;
    }

    let mut u = 0usize;
    while u + 1 < frames.len() && frames[u + 1].time <= time {
        u += 1;
    }
    let offsets = &frames[u].offsets;

    // No explicit changes: leave the cache empty so the commit applies
    // the identity order.
    if offsets.is_empty() {
        return;
    }

    let slot_count = data.slots.len();
    let cache = instance.cache_mut();

    set_default_draw_order(slot_count, &mut cache.draw_order_scratch);
    cache.draw_order.clear();
    cache.draw_order.resize(slot_count, -1);

    // Pin each moved slot at its final position and vacate its source.
    for offset in offsets {
        let target = offset.slot as i32 + offset.offset;
        if target < 0 || target >= slot_count as i32 {
            continue;
        }
        cache.draw_order[target as usize] = offset.slot as i32;
        cache.draw_order_scratch[offset.slot] = -1;
    }

    // Sweep high to low, filling unresolved cells with the next unused
    // source slot; restore the scratch to sequential order as we go.
    let mut out_slot = slot_count as i32 - 1;
    for i in (0..slot_count).rev() {
        while out_slot >= 0 && cache.draw_order_scratch[out_slot as usize] < 0 {
            cache.draw_order_scratch[out_slot as usize] = out_slot;
            out_slot -= 1;
        }
        if cache.draw_order[i] >= 0 {
            continue;
        }
        debug_assert!(out_slot >= 0);
        cache.draw_order[i] = out_slot;
        out_slot -= 1;
    }
    while out_slot >= 0 {
        debug_assert!(cache.draw_order_scratch[out_slot as usize] < 0);
        cache.draw_order_scratch[out_slot as usize] = out_slot;
        out_slot -= 1;
    }

    #[cfg(debug_assertions)]
    {
        let mut copy = cache.draw_order.clone();
        copy.sort_unstable();
        for (i, v) in copy.iter().enumerate() {
            debug_assert_eq!(i as i32, *v);
        }
        for (i, v) in cache.draw_order_scratch.iter().enumerate() {
            debug_assert_eq!(i as i32, *v);
        }
    }
}
