use super::*;
use crate::foundation::config::GpuConfig;
use crate::foundation::core::Size;
use crate::gpu::GpuContext;

fn chain(w: u32, h: u32) -> Arc<Chain> {
    Chain::new(Size::new(w, h), GpuContext::shared(&GpuConfig::default()))
}

#[test]
fn params_default_from_null_and_reject_unknown_fields() {
    let node = PatternNode::from_value(&serde_json::Value::Null).unwrap();
    assert_eq!(node.params(), &PatternParams::default());

    let err = PatternNode::from_value(&serde_json::json!({ "colour": [1, 2, 3, 4] })).unwrap_err();
    assert!(matches!(err, VidgraphError::Validation(_)));

    let err = PatternNode::from_value(&serde_json::json!({ "cell": 0 })).unwrap_err();
    assert!(err.to_string().contains("pattern.cell"));
}

#[test]
fn checker_paints_alternating_cells() {
    let c = chain(4, 2);
    let mut node = PatternNode::from_value(&serde_json::json!({
        "pattern": "checker",
        "cell": 2,
        "color": [255, 0, 0, 255],
        "color2": [0, 0, 255, 255]
    }))
    .unwrap();
    let t = node.paint(&c, &[]).unwrap();
    let frame = c.gpu().read_pixels(t).unwrap();
    assert_eq!(frame.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(frame.pixel(2, 0), Some([0, 0, 255, 255]));
    assert_eq!(frame.pixel(3, 1), Some([0, 0, 255, 255]));
}

#[test]
fn copies_share_one_texture_per_chain() {
    let c = chain(8, 8);
    let live = PatternNode::new(PatternParams::default()).unwrap();
    let mut first = live.copy_for_rendering(&c).unwrap();
    let mut second = live.copy_for_rendering(&c).unwrap();

    let t1 = first.paint(&c, &[]).unwrap();
    let t2 = second.paint(&c, &[]).unwrap();
    assert_eq!(t1, t2);
    assert_eq!(c.gpu().stats().allocated_total, 1);
    assert_eq!(live.cached_chains(), vec![c.id()]);
}

#[test]
fn param_change_repaints_the_cached_texture() {
    let c = chain(2, 2);
    let mut live = PatternNode::new(PatternParams::default()).unwrap();
    let t = live.copy_for_rendering(&c).unwrap().paint(&c, &[]).unwrap();
    assert_eq!(c.gpu().read_pixels(t).unwrap().pixel(1, 1), Some([255, 255, 255, 255]));

    live.set_param("color", &serde_json::json!([0, 255, 0, 255]))
        .unwrap();
    let t2 = live.copy_for_rendering(&c).unwrap().paint(&c, &[]).unwrap();
    assert_eq!(t, t2);
    assert_eq!(c.gpu().read_pixels(t).unwrap().pixel(1, 1), Some([0, 255, 0, 255]));
    assert_eq!(live.serialize()["color"], serde_json::json!([0, 255, 0, 255]));
}

#[test]
fn retain_chains_releases_dead_chain_textures() {
    let gpu = GpuContext::shared(&GpuConfig::default());
    let a = Chain::new(Size::new(4, 4), Arc::clone(&gpu));
    let b = Chain::new(Size::new(16, 16), Arc::clone(&gpu));
    let mut live = PatternNode::new(PatternParams::default()).unwrap();
    live.paint(&a, &[]).unwrap();
    live.paint(&b, &[]).unwrap();
    assert_eq!(gpu.stats().live_textures, 2);

    assert_eq!(live.retain_chains(&HashSet::from([b.id()])), 1);
    assert_eq!(live.cached_chains(), vec![b.id()]);
    assert_eq!(gpu.stats().live_textures, 1);
}

#[test]
fn allocation_failure_is_reported_and_retried() {
    let gpu = GpuContext::shared(&GpuConfig {
        max_texture_bytes: Some(4 * 4 * 4),
        ..GpuConfig::default()
    });
    let small = Chain::new(Size::new(4, 4), Arc::clone(&gpu));
    let big = Chain::new(Size::new(8, 8), Arc::clone(&gpu));
    let mut live = PatternNode::new(PatternParams::default()).unwrap();

    assert!(matches!(live.paint(&big, &[]), Err(VidgraphError::Resource(_))));
    assert!(live.cached_chains().is_empty());
    assert!(live.paint(&small, &[]).unwrap().is_some());
}
