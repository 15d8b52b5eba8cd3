use crate::runtime::cache::{Cache, IkEntry, TwoColorEntry};

#[test]
fn accumulators_insert_then_add() {
    let mut cache = Cache::default();
    assert!(!cache.is_dirty());

    cache.accum_rotation(2, 10.0);
    cache.accum_rotation(2, 5.0);
    assert_eq!(cache.rotation[&2], 15.0);

    cache.accum_position(0, [1.0, 2.0]);
    cache.accum_position(0, [3.0, -2.0]);
    assert_eq!(cache.position[&0], [4.0, 0.0]);

    cache.accum_scale(1, [0.5, 0.5], 0.5);
    cache.accum_scale(1, [0.5, 0.5], 0.5);
    assert_eq!(cache.scale[&1], [1.0, 1.0, 1.0]);

    assert!(cache.is_dirty());
}

#[test]
fn ik_entries_sum_field_wise() {
    let mut cache = Cache::default();
    cache.accum_ik(
        0,
        IkEntry {
            mix: 0.25,
            softness: 1.0,
            bend_positive: 0.5,
            compress: 0.0,
            stretch: 0.1,
        },
    );
    cache.accum_ik(
        0,
        IkEntry {
            mix: 0.25,
            softness: -1.0,
            bend_positive: 0.5,
            compress: 0.0,
            stretch: 0.2,
        },
    );
    let e = cache.ik[&0];
    assert_eq!(e.mix, 0.5);
    assert_eq!(e.softness, 0.0);
    assert_eq!(e.bend_positive, 1.0);
    assert!((e.stretch - 0.3).abs() < 1.0e-6);
}

#[test]
fn two_color_entries_sum_field_wise() {
    let mut cache = Cache::default();
    cache.accum_slot_two_color(
        3,
        TwoColorEntry {
            light: [10.0, 0.0, 0.0, 0.0],
            dark: [0.0, 5.0, 0.0],
        },
    );
    cache.accum_slot_two_color(
        3,
        TwoColorEntry {
            light: [-4.0, 1.0, 0.0, 0.0],
            dark: [0.0, 5.0, 1.0],
        },
    );
    let e = cache.two_color[&3];
    assert_eq!(e.light, [6.0, 1.0, 0.0, 0.0]);
    assert_eq!(e.dark, [0.0, 10.0, 1.0]);
}

#[test]
fn clear_resets_every_channel() {
    let mut cache = Cache::default();
    cache.accum_rotation(0, 1.0);
    cache.accum_slot_color(0, [1.0, 1.0, 1.0, 1.0]);
    cache.accum_path_position(0, 0.5);
    cache.accum_slot_attachment(0, Some("a".to_string()), 1.0);
    cache.draw_order.push(0);
    assert!(cache.is_dirty());

    cache.clear();
    assert!(!cache.is_dirty());
    assert!(cache.rotation.is_empty());
    assert!(cache.attachments.is_empty());
    assert!(cache.draw_order.is_empty());
}
