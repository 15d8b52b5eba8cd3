//! Per-frame accumulator the clip evaluators write into.
//!
//! Every continuous channel accumulates weighted deltas from the setup
//! value, keyed by the owning bone, slot or constraint index. Addition is
//! commutative per channel, so evaluators may run in any order within a
//! frame. [`crate::SkeletonInstance::apply_cache`] folds the totals into
//! instance state and clears the cache.

use std::collections::{HashMap, HashSet};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct IkEntry {
    pub mix: f32,
    pub softness: f32,
    /// Booleans travel through the cache as weighted floats and are
    /// re-thresholded at commit.
    pub bend_positive: f32,
    pub compress: f32,
    pub stretch: f32,
}

impl std::ops::AddAssign for IkEntry {
    fn add_assign(&mut self, rhs: IkEntry) {
        self.mix += rhs.mix;
        self.softness += rhs.softness;
        self.bend_positive += rhs.bend_positive;
        self.compress += rhs.compress;
        self.stretch += rhs.stretch;
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TwoColorEntry {
    pub light: [f32; 4],
    pub dark: [f32; 3],
}

impl std::ops::AddAssign for TwoColorEntry {
    fn add_assign(&mut self, rhs: TwoColorEntry) {
        for (a, b) in self.light.iter_mut().zip(rhs.light) {
            *a += b;
        }
        for (a, b) in self.dark.iter_mut().zip(rhs.dark) {
            *a += b;
        }
    }
}

#[derive(Clone, Debug)]
pub struct SlotAttachmentEntry {
    pub slot: usize,
    pub attachment: Option<String>,
    pub alpha: f32,
}

fn accum<K: std::hash::Hash + Eq, V: Copy + std::ops::AddAssign>(
    table: &mut HashMap<K, V>,
    key: K,
    value: V,
) {
    table
        .entry(key)
        .and_modify(|v| *v += value)
        .or_insert(value);
}

fn accum2(table: &mut HashMap<usize, [f32; 2]>, key: usize, value: [f32; 2]) {
    table
        .entry(key)
        .and_modify(|v| {
            v[0] += value[0];
            v[1] += value[1];
        })
        .or_insert(value);
}

fn accum4(table: &mut HashMap<usize, [f32; 4]>, key: usize, value: [f32; 4]) {
    table
        .entry(key)
        .and_modify(|v| {
            for (a, b) in v.iter_mut().zip(value) {
                *a += b;
            }
        })
        .or_insert(value);
}

#[derive(Clone, Debug, Default)]
pub struct Cache {
    pub attachments: Vec<SlotAttachmentEntry>,
    pub color: HashMap<usize, [f32; 4]>,
    pub two_color: HashMap<usize, TwoColorEntry>,
    /// Committed as-is when non-empty. `i32` so the draw-order evaluator
    /// can use `-1` markers while it fills the permutation in.
    pub draw_order: Vec<i32>,
    pub ik: HashMap<usize, IkEntry>,
    pub path_mix: HashMap<usize, [f32; 2]>,
    pub path_position: HashMap<usize, f32>,
    pub path_spacing: HashMap<usize, f32>,
    pub position: HashMap<usize, [f32; 2]>,
    pub rotation: HashMap<usize, f32>,
    /// `(sx * w, sy * w, w_sum)`; the commit fades the setup scale back
    /// in by `1 - clamp(w_sum, 0, 1)`.
    pub scale: HashMap<usize, [f32; 3]>,
    pub shear: HashMap<usize, [f32; 2]>,
    pub transform: HashMap<usize, [f32; 4]>,

    // Commit-time scratch, not channel state.
    pub(crate) slot_scratch: HashSet<usize>,
    pub(crate) draw_order_scratch: Vec<i32>,
}

impl Cache {
    pub fn accum_ik(&mut self, index: usize, entry: IkEntry) {
        accum(&mut self.ik, index, entry);
    }

    pub fn accum_path_mix(&mut self, index: usize, value: [f32; 2]) {
        accum2(&mut self.path_mix, index, value);
    }

    pub fn accum_path_position(&mut self, index: usize, value: f32) {
        accum(&mut self.path_position, index, value);
    }

    pub fn accum_path_spacing(&mut self, index: usize, value: f32) {
        accum(&mut self.path_spacing, index, value);
    }

    pub fn accum_position(&mut self, index: usize, value: [f32; 2]) {
        accum2(&mut self.position, index, value);
    }

    pub fn accum_rotation(&mut self, index: usize, degrees: f32) {
        accum(&mut self.rotation, index, degrees);
    }

    pub fn accum_scale(&mut self, index: usize, value: [f32; 2], alpha: f32) {
        self.scale
            .entry(index)
            .and_modify(|v| {
                v[0] += value[0];
                v[1] += value[1];
                v[2] += alpha;
            })
            .or_insert([value[0], value[1], alpha]);
    }

    pub fn accum_shear(&mut self, index: usize, value: [f32; 2]) {
        accum2(&mut self.shear, index, value);
    }

    pub fn accum_slot_attachment(
        &mut self,
        slot: usize,
        attachment: Option<String>,
        alpha: f32,
    ) {
        self.attachments.push(SlotAttachmentEntry {
            slot,
            attachment,
            alpha,
        });
    }

    pub fn accum_slot_color(&mut self, index: usize, value: [f32; 4]) {
        accum4(&mut self.color, index, value);
    }

    pub fn accum_slot_two_color(&mut self, index: usize, entry: TwoColorEntry) {
        accum(&mut self.two_color, index, entry);
    }

    pub fn accum_transform(&mut self, index: usize, value: [f32; 4]) {
        accum4(&mut self.transform, index, value);
    }

    pub fn clear(&mut self) {
        self.attachments.clear();
        self.color.clear();
        self.two_color.clear();
        self.draw_order.clear();
        self.ik.clear();
        self.path_mix.clear();
        self.path_position.clear();
        self.path_spacing.clear();
        self.position.clear();
        self.rotation.clear();
        self.scale.clear();
        self.shear.clear();
        self.transform.clear();
        self.slot_scratch.clear();
    }

    pub fn is_dirty(&self) -> bool {
        !self.attachments.is_empty()
            || !self.color.is_empty()
            || !self.two_color.is_empty()
            || !self.draw_order.is_empty()
            || !self.ik.is_empty()
            || !self.path_mix.is_empty()
            || !self.path_position.is_empty()
            || !self.path_spacing.is_empty()
            || !self.position.is_empty()
            || !self.rotation.is_empty()
            || !self.scale.is_empty()
            || !self.shear.is_empty()
            || !self.transform.is_empty()
    }
}

pub(crate) fn set_default_draw_order(slots: usize, out: &mut Vec<i32>) {
    out.clear();
    out.extend(0..slots as i32);
}
