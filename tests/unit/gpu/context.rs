use super::*;

fn gpu() -> Arc<GpuContext> {
    GpuContext::shared(&GpuConfig::default())
}

#[test]
fn allocate_starts_transparent_and_never_returns_none() {
    let g = gpu();
    let id = g.allocate(Size::new(4, 2)).unwrap();
    assert!(id.is_some());
    let frame = g.read_pixels(id).unwrap();
    assert_eq!((frame.width, frame.height), (4, 2));
    assert!(frame.data.iter().all(|&v| v == 0));
    assert!(frame.premultiplied);
}

#[test]
fn release_returns_bytes_and_ignores_unknown() {
    let g = gpu();
    let id = g.allocate(Size::new(8, 8)).unwrap();
    assert_eq!(g.stats().live_bytes, 8 * 8 * 4);
    g.release(id);
    g.release(id);
    g.release(TextureId::NONE);
    let st = g.stats();
    assert_eq!(st.live_textures, 0);
    assert_eq!(st.live_bytes, 0);
    assert_eq!(st.released_total, 1);
}

#[test]
fn budget_exhaustion_is_a_resource_error() {
    let g = GpuContext::shared(&GpuConfig {
        max_texture_bytes: Some(16 * 16 * 4),
        ..GpuConfig::default()
    });
    let _a = g.allocate(Size::new(16, 16)).unwrap();
    let err = g.allocate(Size::new(1, 1)).unwrap_err();
    assert!(matches!(err, VidgraphError::Resource(_)));
}

#[test]
fn ids_skip_live_textures_after_wraparound() {
    let g = gpu();
    let first = g.allocate(Size::new(1, 1)).unwrap();
    assert_eq!(first, TextureId(1));
    g.table().next_id = u32::MAX;

    let last = g.allocate(Size::new(1, 1)).unwrap();
    assert_eq!(last, TextureId(u32::MAX));
    let wrapped = g.allocate(Size::new(2, 2)).unwrap();
    assert_eq!(wrapped, TextureId(2));
    assert_eq!(g.texture_size(first), Some(Size::new(1, 1)));
    assert_eq!(g.stats().live_textures, 3);
}

#[test]
fn empty_size_is_rejected() {
    assert!(gpu().allocate(Size::new(0, 4)).is_err());
}

#[test]
fn render_to_sees_inputs_but_not_itself() {
    let g = gpu();
    let src = g.allocate(Size::new(1, 1)).unwrap();
    let dst = g.allocate(Size::new(1, 1)).unwrap();
    g.with_texture_mut(src, |t| t.data.copy_from_slice(&[1, 2, 3, 4]))
        .unwrap();

    let seen = g
        .render_to(dst, &[src, dst, TextureId::NONE], |target, inputs| {
            target.data.copy_from_slice(&inputs[0].unwrap().data);
            (inputs[1].is_none(), inputs[2].is_none())
        })
        .unwrap();
    assert_eq!(seen, (true, true));
    assert_eq!(g.read_pixels(dst).unwrap().data, vec![1, 2, 3, 4]);
}

#[test]
fn render_to_missing_target_fails() {
    let g = gpu();
    assert!(g.render_to(TextureId(99), &[], |_, _| ()).is_err());
}

#[test]
fn chain_texture_releases_on_drop() {
    let g = gpu();
    {
        let t = ChainTexture::allocate(&g, Size::new(2, 2)).unwrap();
        assert!(g.contains(t.id()));
        assert_eq!(g.stats().live_textures, 1);
    }
    assert_eq!(g.stats().live_textures, 0);
}

#[test]
fn contexts_have_distinct_ids() {
    assert_ne!(gpu().id(), gpu().id());
}

#[test]
fn sample_scales_nearest() {
    let tex = Texture {
        size: Size::new(2, 1),
        data: vec![10, 10, 10, 255, 20, 20, 20, 255],
    };
    let dst = Size::new(4, 2);
    assert_eq!(tex.sample(dst, 0, 0), [10, 10, 10, 255]);
    assert_eq!(tex.sample(dst, 1, 1), [10, 10, 10, 255]);
    assert_eq!(tex.sample(dst, 2, 0), [20, 20, 20, 255]);
    assert_eq!(tex.sample(dst, 3, 1), [20, 20, 20, 255]);
}

#[test]
fn unpremultiply_for_export() {
    let frame = FrameRGBA {
        width: 1,
        height: 1,
        data: vec![64, 0, 0, 128],
        premultiplied: true,
    };
    let img = frame.to_rgba_image().unwrap();
    assert_eq!(img.get_pixel(0, 0).0, [128, 0, 0, 128]);
}
