use super::*;
use crate::foundation::config::GpuConfig;
use crate::foundation::core::Size;
use crate::gpu::GpuContext;

fn chain() -> Arc<Chain> {
    Chain::new(Size::new(4, 4), GpuContext::shared(&GpuConfig::default()))
}

#[test]
fn state_is_created_once_per_chain() {
    let states: RenderStates<u32> = RenderStates::new();
    let c = chain();
    let mut creates = 0;
    for _ in 0..3 {
        states
            .with_state(
                &c,
                || {
                    creates += 1;
                    Ok(0)
                },
                |s| {
                    *s += 1;
                    Ok(())
                },
            )
            .unwrap();
    }
    assert_eq!(creates, 1);
    let v = states.with_state(&c, || Ok(100), |s| Ok(*s)).unwrap();
    assert_eq!(v, 3);
}

#[test]
fn clones_share_entries() {
    let live: RenderStates<&'static str> = RenderStates::new();
    let copy = live.clone();
    let c = chain();
    copy.with_state(&c, || Ok("painted"), |_| Ok(())).unwrap();
    assert!(live.contains(c.id()));
    assert_eq!(live.len(), 1);
}

#[test]
fn failed_create_leaves_no_entry() {
    let states: RenderStates<u8> = RenderStates::new();
    let c = chain();
    let err = states
        .with_state(&c, || Err(VidgraphError::resource("no memory")), |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, VidgraphError::Resource(_)));
    assert!(states.is_empty());

    states.with_state(&c, || Ok(7), |_| Ok(())).unwrap();
    assert!(states.contains(c.id()));
}

#[test]
fn retain_drops_only_dead_chains() {
    let states: RenderStates<u8> = RenderStates::new();
    let a = chain();
    let b = chain();
    states.with_state(&a, || Ok(1), |_| Ok(())).unwrap();
    states.with_state(&b, || Ok(2), |_| Ok(())).unwrap();

    let live: HashSet<ChainId> = [a.id()].into_iter().collect();
    assert_eq!(states.retain(&live), 1);
    assert_eq!(states.chains(), vec![a.id()]);
    assert_eq!(states.retain(&live), 0);

    assert!(states.remove(a.id()));
    assert!(!states.remove(a.id()));
    assert!(states.is_empty());
}

#[test]
fn dropping_state_releases_chain_textures() {
    let c = chain();
    let states: RenderStates<crate::gpu::ChainTexture> = RenderStates::new();
    states
        .with_state(
            &c,
            || crate::gpu::ChainTexture::allocate(c.gpu(), c.size()),
            |_| Ok(()),
        )
        .unwrap();
    assert_eq!(c.gpu().stats().live_textures, 1);
    states.retain(&HashSet::new());
    assert_eq!(c.gpu().stats().live_textures, 0);
}

#[test]
fn default_set_param_rejects_unknown_keys() {
    struct Bare;
    impl VideoNode for Bare {
        fn kind(&self) -> &'static str {
            "bare"
        }
        fn input_count(&self) -> usize {
            0
        }
        fn copy_for_rendering(&self, _: &Arc<Chain>) -> VidgraphResult<Box<dyn VideoNode>> {
            Ok(Box::new(Bare))
        }
        fn paint(&mut self, _: &Arc<Chain>, _: &[TextureId]) -> VidgraphResult<TextureId> {
            Ok(TextureId::NONE)
        }
        fn serialize(&self) -> serde_json::Value {
            serde_json::Value::Null
        }
    }
    let err = Bare
        .set_param("speed", &serde_json::json!(2))
        .unwrap_err();
    assert!(err.to_string().contains("bare node has no parameter 'speed'"));
}
