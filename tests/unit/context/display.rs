use super::*;
use crate::context::session::{Context, ContextOptions};
use crate::foundation::config::GpuConfig;
use crate::foundation::core::{Size, TextureId};
use crate::gpu::GpuContext;
use crate::graph::Model;
use crate::nodes::{PatternNode, PatternParams};

fn context() -> Context {
    Context::new(
        ContextOptions {
            preview: true,
            preview_size: Size::new(6, 6),
        },
        GpuContext::shared(&GpuConfig::default()),
    )
}

#[test]
fn unattached_surface_renders_nothing() {
    let surface = DisplaySurface::new();
    assert!(!surface.is_attached());
    assert_eq!(surface.about_to_synchronize(), None);
}

#[test]
fn attached_surface_renders_the_preview() {
    let mut ctx = context();
    let model = Arc::new(Model::new());
    let node = model.add_node(Box::new(
        PatternNode::new(PatternParams {
            color: [0, 255, 0, 255],
            ..PatternParams::default()
        })
        .unwrap(),
    )).unwrap();
    ctx.set_model(Some(model));

    let surface = DisplaySurface::new();
    ctx.set_preview_window(Some(Arc::clone(&surface))).unwrap();
    assert!(surface.is_attached());

    assert_eq!(surface.about_to_synchronize(), Some(1));
    assert_ne!(ctx.preview_texture(node), TextureId::NONE);
    let frame = ctx.preview_frame(node).unwrap();
    assert_eq!(frame.pixel(5, 5), Some([0, 255, 0, 255]));
}

#[test]
fn replacing_or_dropping_the_context_detaches_the_surface() {
    let first = DisplaySurface::new();
    let second = DisplaySurface::new();
    let mut ctx = context();

    ctx.set_preview_window(Some(Arc::clone(&first))).unwrap();
    ctx.set_preview_window(Some(Arc::clone(&second))).unwrap();
    assert!(!first.is_attached());
    assert!(second.is_attached());

    drop(ctx);
    assert!(!second.is_attached());
    assert_eq!(second.about_to_synchronize(), None);
}
