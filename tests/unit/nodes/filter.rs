use super::*;
use crate::foundation::config::GpuConfig;
use crate::foundation::core::Size;
use crate::gpu::GpuContext;

fn chain() -> Arc<Chain> {
    Chain::new(Size::new(2, 2), GpuContext::shared(&GpuConfig::default()))
}

fn solid(c: &Arc<Chain>, rgba: [u8; 4]) -> TextureId {
    let id = c.gpu().allocate(c.size()).unwrap();
    c.gpu()
        .render_to(id, &[], |dst, _| {
            kernels::fill(dst, Rgba8Premul::from_straight_rgba(rgba[0], rgba[1], rgba[2], rgba[3]))
        })
        .unwrap();
    id
}

fn filter(v: serde_json::Value) -> FilterNode {
    FilterNode::from_value(&v).unwrap()
}

#[test]
fn input_count_follows_op() {
    assert_eq!(filter(serde_json::json!({ "op": "invert" })).input_count(), 1);
    assert_eq!(filter(serde_json::json!({ "op": "tint" })).input_count(), 1);
    assert_eq!(filter(serde_json::json!({ "op": "mix" })).input_count(), 2);
    assert_eq!(filter(serde_json::json!({ "op": "over" })).input_count(), 2);
}

#[test]
fn invert_flips_opaque_colour() {
    let c = chain();
    let src = solid(&c, [200, 100, 0, 255]);
    let mut f = filter(serde_json::json!({ "op": "invert" }));
    let t = f.paint(&c, &[src]).unwrap();
    assert_ne!(t, src);
    assert_eq!(c.gpu().read_pixels(t).unwrap().pixel(0, 0), Some([55, 155, 255, 255]));
}

#[test]
fn missing_input_reads_as_transparent() {
    let c = chain();
    let mut f = filter(serde_json::json!({ "op": "invert" }));
    let t = f.paint(&c, &[TextureId::NONE]).unwrap();
    assert!(t.is_some());
    assert_eq!(c.gpu().read_pixels(t).unwrap().pixel(1, 1), Some([0, 0, 0, 0]));
}

#[test]
fn mix_and_over_blend_two_inputs() {
    let c = chain();
    let red = solid(&c, [255, 0, 0, 255]);
    let blue = solid(&c, [0, 0, 255, 255]);

    let mut m = filter(serde_json::json!({ "op": "mix", "amount": 0.0 }));
    let t = m.paint(&c, &[red, blue]).unwrap();
    assert_eq!(c.gpu().read_pixels(t).unwrap().pixel(0, 0), Some([255, 0, 0, 255]));

    let mut o = filter(serde_json::json!({ "op": "over", "amount": 1.0 }));
    let t = o.paint(&c, &[red, blue]).unwrap();
    assert_eq!(c.gpu().read_pixels(t).unwrap().pixel(0, 0), Some([0, 0, 255, 255]));

    let t = o.paint(&c, &[red, TextureId::NONE]).unwrap();
    assert_eq!(c.gpu().read_pixels(t).unwrap().pixel(0, 0), Some([255, 0, 0, 255]));
}

#[test]
fn params_are_validated_on_create_and_update() {
    assert!(FilterNode::from_value(&serde_json::json!({ "amount": 1.5 })).is_err());
    assert!(FilterNode::from_value(&serde_json::json!({ "op": "blur" })).is_err());

    let mut f = filter(serde_json::json!({ "op": "mix" }));
    f.set_param("amount", &serde_json::json!(0.25)).unwrap();
    assert_eq!(f.params().amount, 0.25);
    assert!(f.set_param("amount", &serde_json::json!(-1.0)).is_err());
    assert!(f.set_param("op", &serde_json::json!("invert")).is_err());
    assert_eq!(f.op(), FilterOp::Mix);
}

#[test]
fn each_chain_gets_its_own_target() {
    let gpu = GpuContext::shared(&GpuConfig::default());
    let a = Chain::new(Size::new(2, 2), Arc::clone(&gpu));
    let b = Chain::new(Size::new(4, 4), Arc::clone(&gpu));
    let live = filter(serde_json::json!({ "op": "invert" }));
    let ta = live.copy_for_rendering(&a).unwrap().paint(&a, &[TextureId::NONE]).unwrap();
    let tb = live.copy_for_rendering(&b).unwrap().paint(&b, &[TextureId::NONE]).unwrap();
    assert_ne!(ta, tb);
    assert_eq!(gpu.texture_size(tb), Some(Size::new(4, 4)));
    assert_eq!(live.cached_chains().len(), 2);
}
