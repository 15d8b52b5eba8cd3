use std::path::PathBuf;
use std::sync::Arc;

use anim2d::json::skeleton_from_json_str;
use anim2d::{ClipInstance, ClipSettings, SkeletonInstance};
use serde_json::json;

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let path = args
        .first()
        .map(PathBuf::from)
        .expect("usage: pose_dump <skeleton.json> [clip] [time]");
    let clip_name = args.get(1).cloned();
    let time: f32 = args
        .get(2)
        .and_then(|t| t.parse().ok())
        .unwrap_or(0.0);

    let text = std::fs::read_to_string(&path).expect("read skeleton json");
    let data = Arc::new(skeleton_from_json_str(&text).expect("parse skeleton"));

    let mut instance = SkeletonInstance::new(Arc::clone(&data), None);
    if let Some(clip_name) = &clip_name {
        let mut clip = ClipInstance::new(&mut instance, clip_name, ClipSettings::default())
            .expect("bind clip");
        clip.evaluate(&mut instance, time, 1.0, true);
        instance.apply_cache();
        instance.pose_skinning_palette();
        clip.retire(&mut instance);
    }

    let bones: Vec<_> = instance
        .skinning_palette()
        .iter()
        .enumerate()
        .map(|(i, m)| {
            json!({
                "i": i,
                "name": data.bones[i].name,
                "world": {
                    "m00": m.m00, "m01": m.m01, "tx": m.tx,
                    "m10": m.m10, "m11": m.m11, "ty": m.ty,
                },
            })
        })
        .collect();

    let slots: Vec<_> = instance
        .slots()
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            json!({
                "i": i,
                "name": data.slots[i].name,
                "attachment": slot.attachment,
                "color": slot.color,
                "darkColor": slot.dark_color,
            })
        })
        .collect();

    let out = json!({
        "clip": clip_name,
        "time": time,
        "bones": bones,
        "slots": slots,
        "drawOrder": instance.draw_order(),
    });
    println!("{}", serde_json::to_string(&out).expect("json"));
}
