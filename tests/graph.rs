use std::cell::RefCell;

use anyhow::{anyhow, Result};

use framegraph::graph::dependency_graph::{DependencyGraph, EdgeKind, GraphNode};
use framegraph::prelude::*;

use framework::{Event, MockAllocator, MockDriver};

mod framework;

#[derive(Debug, Default, Clone)]
struct Single {
    texture: FrameGraphId<Texture>,
}

#[derive(Debug, Default, Clone)]
struct ColorDepth {
    color: FrameGraphId<Texture>,
    depth: FrameGraphId<Texture>,
    rt: u32,
}

fn is_error(error: &anyhow::Error, predicate: impl Fn(&Error) -> bool) -> bool {
    error.downcast_ref::<Error>().map_or(false, &predicate)
        || error.chain().filter_map(|e| e.downcast_ref::<Error>()).any(&predicate)
}

/// Records the name of every executed pass.
struct Recorder<'a>(&'a RefCell<Vec<String>>);

impl PassExecutor for Recorder<'_> {
    fn execute(&mut self, resources: &FrameGraphResources, _driver: &mut dyn Driver) -> Result<()> {
        self.0.borrow_mut().push(resources.pass_name().to_owned());
        Ok(())
    }
}

#[derive(Debug)]
struct StringNode(String);

impl GraphNode for StringNode {
    fn name(&self) -> &str {
        &self.0
    }
}

#[test]
pub fn dependency_graph_culls_unreferenced_nodes() -> Result<()> {
    let mut graph = DependencyGraph::new();
    let a = graph.add_node(StringNode("a".into()));
    let b = graph.add_node(StringNode("b".into()));
    let c = graph.add_node(StringNode("c".into()));
    let d = graph.add_node(StringNode("d".into()));
    graph.add_edge(a, b, EdgeKind::Write);
    graph.add_edge(b, c, EdgeKind::Read);
    let dangling = graph.add_edge(a, d, EdgeKind::Write);
    graph.make_target(c);
    graph.cull();

    assert!(!graph.is_culled(a));
    assert!(!graph.is_culled(b));
    assert!(!graph.is_culled(c));
    assert!(graph.is_culled(d));
    assert!(!graph.is_edge_valid(dangling));
    // `a` only keeps the reference from `b`.
    assert_eq!(graph.refcount(a), 1);
    assert!(graph.is_acyclic());
    Ok(())
}

#[test]
pub fn dependency_graph_link_is_deduplicated() -> Result<()> {
    let mut graph = DependencyGraph::new();
    let a = graph.add_node(StringNode("a".into()));
    let b = graph.add_node(StringNode("b".into()));
    let first = graph.link(a, b);
    let second = graph.link(a, b);
    assert_eq!(first, second);
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.edge_kind(first), EdgeKind::Dependency);
    Ok(())
}

#[test]
pub fn write_after_write_creates_new_version() -> Result<()> {
    framework::init_logger();
    let mut graph = FrameGraph::new();
    let a = graph.add_pass::<Single, _, _>(
        "A",
        |builder, data| {
            let x = builder.create::<Texture>("X", framework::texture(64));
            data.texture = builder.write(x, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |_, _, _| Ok(()),
    );
    // First write on a fresh resource keeps the version.
    assert_eq!(a.texture.version(), 0);

    let b = graph.add_pass::<Single, _, _>(
        "B",
        |builder, data| {
            let x = builder.read(a.texture, TextureUsage::SAMPLEABLE).unwrap();
            data.texture = builder.write(x, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |_, _, _| Ok(()),
    );
    assert_eq!(b.texture.version(), 1);
    assert!(!graph.is_valid(a.texture));
    assert!(graph.is_valid(b.texture));

    graph.add_pass::<(), _, _>(
        "C",
        |builder, _| {
            builder.read(b.texture, TextureUsage::SAMPLEABLE).unwrap();
            builder.side_effect();
        },
        |_, _, _| Ok(()),
    );

    let stats = graph.compile();
    assert_eq!(stats.passes, 3);
    assert_eq!(stats.culled_passes, 0);
    assert_eq!(stats.live_resources, 1);

    let info = graph.resource_info(b.texture).unwrap();
    assert_eq!(info.name, "X");
    assert_eq!(info.version, 1);
    // Passes are counted once, even if they read and write.
    assert_eq!(info.refcount, 3);
    assert_eq!(info.first.map(|pass| pass.index()), Some(0));
    assert_eq!(info.last.map(|pass| pass.index()), Some(2));
    assert_eq!(
        graph.usage(b.texture),
        Some(TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLEABLE)
    );

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;
    assert_eq!(allocator.created_textures(), vec![String::from("X")]);
    assert_eq!(allocator.live_objects(), 0);
    Ok(())
}

#[test]
pub fn stale_handles_are_rejected() -> Result<()> {
    framework::init_logger();
    let mut graph = FrameGraph::new();
    let first = graph.add_pass::<Single, _, _>(
        "first",
        |builder, data| {
            let x = builder.create::<Texture>("X", framework::texture(16));
            data.texture = builder.write(x, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |_, _, _| Ok(()),
    );
    graph.add_pass::<(), _, _>(
        "second",
        |builder, _| {
            let newer = builder.write(first.texture, TextureUsage::COLOR_ATTACHMENT).unwrap();
            assert!(newer.version() > first.texture.version());

            let error = builder.read(first.texture, TextureUsage::SAMPLEABLE).unwrap_err();
            assert!(is_error(&error, |e| matches!(e, Error::InvalidHandle { version: 0, .. })));
            let error = builder.write(first.texture, TextureUsage::SAMPLEABLE).unwrap_err();
            assert!(is_error(&error, |e| matches!(e, Error::InvalidHandle { .. })));
            let error = builder
                .read(FrameGraphId::<Texture>::default(), TextureUsage::SAMPLEABLE)
                .unwrap_err();
            assert!(is_error(&error, |e| matches!(e, Error::InvalidHandle { .. })));
            assert!(builder.descriptor(first.texture).is_err());
            assert_eq!(builder.descriptor(newer).unwrap().width, 16);
            // Names can still be looked up through stale handles.
            assert_eq!(builder.name(first.texture), Some("X"));
        },
        |_, _, _| Ok(()),
    );
    Ok(())
}

#[test]
pub fn unused_pass_is_culled() -> Result<()> {
    framework::init_logger();
    let executed = RefCell::new(Vec::<String>::new());
    let mut graph = FrameGraph::new();
    let d = graph.add_pass_with_executor(
        "D",
        |builder| {
            let y = builder.create::<Texture>("Y", framework::texture(32));
            builder.write(y, TextureUsage::COLOR_ATTACHMENT).unwrap();
            let scratch = builder.create::<Buffer>("scratch", BufferDescriptor {
                size: 256,
            });
            builder.write(scratch, BufferUsage::STORAGE).unwrap();
        },
        Recorder(&executed),
    );
    let kept = graph.add_pass::<Single, _, _>(
        "kept",
        |builder, data| {
            let z = builder.create::<Texture>("Z", framework::texture(32));
            data.texture = builder.write(z, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |resources, _, _| {
            executed.borrow_mut().push(resources.pass_name().to_owned());
            Ok(())
        },
    );
    graph.add_present_pass(|builder| {
        builder.read(kept.texture, TextureUsage::SAMPLEABLE).unwrap();
    });

    let stats = graph.compile();
    assert_eq!(stats.culled_passes, 1);
    assert_eq!(stats.resources, 3);
    assert_eq!(stats.live_resources, 1);
    assert!(graph.is_culled(d));
    assert_eq!(graph.pass_state(d), Some(PassState::Culled));

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;
    assert_eq!(allocator.created_textures(), vec![String::from("Z")]);
    assert!(!allocator
        .events
        .iter()
        .any(|event| matches!(event, Event::CreateBuffer(..))));
    assert_eq!(executed.borrow().as_slice(), &[String::from("kept")]);
    Ok(())
}

#[test]
pub fn culled_resources_have_no_references() -> Result<()> {
    let mut graph = FrameGraph::new();
    let y = graph.add_pass::<Single, _, _>(
        "D",
        |builder, data| {
            let y = builder.create::<Texture>("Y", framework::texture(32));
            data.texture = builder.write(y, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |_, _, _| Ok(()),
    );
    graph.add_present_pass(|_| {});
    graph.compile();
    let info = graph.resource_info(y.texture).unwrap();
    assert_eq!(info.refcount, 0);
    assert_eq!(info.first, None);
    assert_eq!(info.last, None);
    Ok(())
}

#[test]
pub fn imported_usage_mask_is_enforced() -> Result<()> {
    framework::init_logger();
    let mut graph = FrameGraph::new();
    let swapchain = graph.import_render_target(
        "swapchain",
        ImportedRenderTargetDescriptor::default(),
        TextureUsage::PRESENT,
        RenderTargetHandle::new(7),
    );
    graph.add_pass::<(), _, _>(
        "color",
        |builder, _| {
            let error = builder
                .write(swapchain, TextureUsage::COLOR_ATTACHMENT | TextureUsage::PRESENT)
                .unwrap_err();
            assert!(is_error(&error, |e| matches!(e, Error::UsageViolation { .. })));
            // A rejected write does not create a new version.
            assert!(builder.is_valid(swapchain));
            assert!(builder.read(swapchain, TextureUsage::SAMPLEABLE).is_err());

            let mut color = swapchain;
            builder.use_as_render_target(Some(&mut color), None);
            assert!(!color.is_initialized());
        },
        |_, _, _| Ok(()),
    );
    graph.add_present_pass(|builder| {
        builder.read(swapchain, TextureUsage::PRESENT).unwrap();
    });
    assert_eq!(graph.resource_info(swapchain).unwrap().version, 0);

    graph.compile();
    // No edge was added for the rejected connections, so the pass has no outputs.
    assert!(graph.is_culled(PassId::default()));
    assert_eq!(graph.usage(swapchain), Some(TextureUsage::PRESENT));
    Ok(())
}

#[test]
pub fn resources_live_exactly_between_first_and_last_pass() -> Result<()> {
    framework::init_logger();
    #[derive(Default, Clone)]
    struct Blur {
        input: FrameGraphId<Texture>,
        output: FrameGraphId<Texture>,
    }

    let executed = RefCell::new(Vec::<String>::new());
    let mut graph = FrameGraph::new();
    let a = graph.add_pass::<Single, _, _>(
        "A",
        |builder, data| {
            let t1 = builder.create::<Texture>("T1", framework::texture(128));
            data.texture = builder.write(t1, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |resources, data, _| {
            assert!(!resources.get(data.texture)?.handle.is_null());
            executed.borrow_mut().push(resources.pass_name().to_owned());
            Ok(())
        },
    );
    let b = graph.add_pass::<Blur, _, _>(
        "B",
        |builder, data| {
            data.input = builder.read(a.texture, TextureUsage::SAMPLEABLE).unwrap();
            let t2 = builder.create::<Texture>("T2", framework::texture(64));
            data.output = builder.write(t2, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |resources, data, _| {
            resources.get(data.input)?;
            resources.get(data.output)?;
            assert_eq!(resources.descriptor(data.output)?.width, 64);
            assert_eq!(resources.usage(data.input)?, TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLEABLE);
            executed.borrow_mut().push(resources.pass_name().to_owned());
            Ok(())
        },
    );
    graph.add_present_pass(|builder| {
        builder.read(b.output, TextureUsage::SAMPLEABLE).unwrap();
    });
    graph.compile();
    assert!(graph.is_acyclic());

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;

    assert_eq!(
        allocator.events,
        vec![
            Event::CreateTexture(String::from("T1"), TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLEABLE),
            Event::CreateTexture(String::from("T2"), TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLEABLE),
            Event::DestroyTexture(0),
            Event::DestroyTexture(1),
        ]
    );
    assert_eq!(executed.borrow().as_slice(), &[String::from("A"), String::from("B")]);
    assert_eq!(driver.flushes(), 1);
    assert!(driver.markers_balanced());
    // Executing resets the graph.
    assert_eq!(graph.pass_count(), 0);
    assert!(!graph.is_valid(b.output));
    Ok(())
}

#[cfg(feature = "debug-markers")]
#[test]
pub fn passes_are_bracketed_by_markers() -> Result<()> {
    let mut graph = FrameGraph::new();
    graph.add_pass::<(), _, _>("side effect", |builder, _| builder.side_effect(), |_, _, _| Ok(()));
    graph.add_present_pass(|_| {});
    graph.compile();

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;
    assert_eq!(
        driver.events,
        vec![
            Event::PushMarker(String::from("FrameGraph")),
            Event::PushMarker(String::from("side effect")),
            Event::PopMarker,
            Event::PushMarker(String::from("Present")),
            Event::PopMarker,
            Event::Flush,
            Event::PopMarker,
        ]
    );
    Ok(())
}

#[test]
pub fn sub_resource_usage_propagates_to_parent() -> Result<()> {
    framework::init_logger();
    #[derive(Default, Clone)]
    struct Mip {
        parent: FrameGraphId<Texture>,
        mip: FrameGraphId<Texture>,
    }

    let mut graph = FrameGraph::new();
    let data = graph.add_pass::<Mip, _, _>(
        "downsample",
        |builder, data| {
            data.parent = builder.create::<Texture>("bloom", framework::texture(128).levels(2));
            let mip = builder
                .create_subresource(data.parent, "bloom.mip1", TextureSubResourceDescriptor {
                    level: 1,
                    layer: 0,
                })
                .unwrap();
            data.mip = builder.write(mip, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |resources, data, _| {
            let mip = resources.get(data.mip)?;
            assert!(!mip.handle.is_null());
            assert_eq!(resources.sub_resource_descriptor(data.mip)?.level, 1);
            // The pass never declared the parent itself.
            let error = resources.get(data.parent).unwrap_err();
            assert!(is_error(&error, |e| matches!(e, Error::UndeclaredResource { .. })));
            Ok(())
        },
    );
    graph.add_present_pass(|builder| {
        builder.read(data.parent, TextureUsage::SAMPLEABLE).unwrap();
    });

    let stats = graph.compile();
    // The write to the mip keeps the downsample pass alive through the parent.
    assert_eq!(stats.culled_passes, 0);
    let parent_usage = graph.usage(data.parent).unwrap();
    let mip_usage = graph.usage(data.mip).unwrap();
    assert!(parent_usage.contains(mip_usage));
    assert_eq!(parent_usage, TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLEABLE);
    let mip_info = graph.resource_info(data.mip).unwrap();
    assert!(mip_info.sub_resource);
    let parent_info = graph.resource_info(data.parent).unwrap();
    assert!(parent_info.first <= mip_info.first);
    assert!(parent_info.last >= mip_info.last);

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;
    // Sub-resources alias their parent.
    assert_eq!(allocator.created_textures(), vec![String::from("bloom")]);
    assert_eq!(allocator.live_objects(), 0);
    Ok(())
}

#[test]
pub fn render_targets_derive_load_and_store_behaviour() -> Result<()> {
    framework::init_logger();
    let infos = RefCell::new(Vec::<RenderPassInfo>::new());
    let mut graph = FrameGraph::new();

    let opaque = graph.add_pass::<ColorDepth, _, _>(
        "opaque",
        |builder, data| {
            let color = builder.create::<Texture>("color", TextureDescriptor::new(256, 128));
            let depth = builder.create::<Texture>(
                "depth",
                TextureDescriptor::new(256, 128).format(vk::Format::D32_SFLOAT),
            );
            let mut descriptor = RenderTargetDescriptor {
                clear_flags: TargetBufferFlags::COLOR0 | TargetBufferFlags::DEPTH,
                clear_color: [0.0, 0.0, 0.0, 1.0],
                ..Default::default()
            };
            descriptor.attachments.color[0] = color;
            descriptor.attachments.depth = depth;
            let target = builder.declare_render_target("opaque target", descriptor);
            data.color = target.attachments.color[0];
            data.depth = target.attachments.depth;
            data.rt = target.id;
        },
        |resources, data, _| {
            infos.borrow_mut().push(resources.render_pass_info(data.rt)?);
            Ok(())
        },
    );
    let transparent = graph.add_pass::<ColorDepth, _, _>(
        "transparent",
        |builder, data| {
            data.color = opaque.color;
            data.depth = opaque.depth;
            data.rt = builder.use_as_render_target(Some(&mut data.color), Some(&mut data.depth));
        },
        |resources, data, _| {
            infos.borrow_mut().push(resources.render_pass_info(data.rt)?);
            assert!(resources.render_pass_info(data.rt + 1).is_err());
            Ok(())
        },
    );
    assert_eq!(transparent.color.version(), opaque.color.version() + 1);
    graph.add_present_pass(|builder| {
        builder.read(transparent.color, TextureUsage::SAMPLEABLE).unwrap();
    });

    graph.compile();
    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;

    let infos = infos.borrow();
    assert_eq!(infos.len(), 2);
    let both = TargetBufferFlags::COLOR0 | TargetBufferFlags::DEPTH;

    let first = infos[0].params;
    assert_eq!(first.flags.clear, both);
    assert_eq!(first.flags.discard_start, both);
    assert_eq!(first.flags.discard_end, TargetBufferFlags::empty());
    assert_eq!(first.viewport.extent, vk::Extent2D {
        width: 256,
        height: 128,
    });
    assert_eq!(first.clear_color, [0.0, 0.0, 0.0, 1.0]);

    let second = infos[1].params;
    assert_eq!(second.flags.clear, TargetBufferFlags::empty());
    assert_eq!(second.flags.discard_start, TargetBufferFlags::empty());
    // Nothing reads the depth buffer afterwards.
    assert_eq!(second.flags.discard_end, TargetBufferFlags::DEPTH);

    assert_eq!(allocator.render_targets.len(), 2);
    assert!(allocator
        .events
        .contains(&Event::CreateRenderTarget(String::from("opaque target"), both)));
    assert!(allocator
        .events
        .contains(&Event::CreateRenderTarget(String::from("color"), both)));
    assert_eq!(allocator.render_targets[0].width, 256);
    assert_eq!(allocator.render_targets[0].height, 128);
    assert!(!allocator.render_targets[0].color[0].texture.is_null());
    assert!(!allocator.render_targets[0].depth.texture.is_null());
    assert_eq!(allocator.live_objects(), 0);
    Ok(())
}

#[test]
pub fn imported_render_target_is_used_directly() -> Result<()> {
    framework::init_logger();
    let infos = RefCell::new(Vec::<RenderPassInfo>::new());
    let mut graph = FrameGraph::new();
    let swapchain = graph.import_render_target(
        "swapchain",
        ImportedRenderTargetDescriptor {
            viewport: vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
            },
            clear_flags: TargetBufferFlags::COLOR0,
            clear_color: [0.1, 0.2, 0.3, 1.0],
            ..Default::default()
        },
        TextureUsage::COLOR_ATTACHMENT | TextureUsage::PRESENT,
        RenderTargetHandle::new(42),
    );
    let ui = graph.add_pass::<Single, _, _>(
        "ui",
        |builder, data| {
            data.texture = swapchain;
            let id = builder.use_as_render_target(Some(&mut data.texture), None);
            assert_eq!(id, 0);
        },
        |resources, _, _| {
            infos.borrow_mut().push(resources.render_pass_info(0)?);
            Ok(())
        },
    );
    graph.add_present_pass(|builder| {
        builder.read(ui.texture, TextureUsage::PRESENT).unwrap();
    });
    graph.compile();

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;

    let infos = infos.borrow();
    assert_eq!(infos[0].target, RenderTargetHandle::new(42));
    let params = infos[0].params;
    assert_eq!(params.viewport.extent.width, 800);
    assert_eq!(params.viewport.extent.height, 600);
    assert_eq!(params.clear_color, [0.1, 0.2, 0.3, 1.0]);
    assert_eq!(params.flags.clear, TargetBufferFlags::COLOR0);
    assert_eq!(params.flags.discard_start, TargetBufferFlags::COLOR0);
    assert_eq!(params.flags.discard_end, TargetBufferFlags::empty());
    // Imported resources and render targets are never created or destroyed.
    assert!(allocator.events.is_empty());
    Ok(())
}

#[test]
#[should_panic]
pub fn render_target_on_present_pass_panics() {
    let mut graph = FrameGraph::new();
    let texture = graph.create::<Texture>("texture", framework::texture(8));
    graph.add_present_pass(|builder| {
        let mut color = texture;
        builder.use_as_render_target(Some(&mut color), None);
    });
}

#[test]
pub fn execute_requires_compile() -> Result<()> {
    let mut graph = FrameGraph::new();
    graph.add_present_pass(|_| {});
    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    let error = graph.execute(&mut allocator, &mut driver).unwrap_err();
    assert!(is_error(&error, |e| matches!(e, Error::NotCompiled)));
    assert!(driver.events.is_empty());
    // The graph is left untouched.
    assert_eq!(graph.pass_count(), 1);
    Ok(())
}

#[test]
pub fn failing_pass_releases_live_resources() -> Result<()> {
    framework::init_logger();
    let executed = RefCell::new(Vec::<String>::new());
    let mut graph = FrameGraph::new();
    let a = graph.add_pass::<Single, _, _>(
        "A",
        |builder, data| {
            let t = builder.create::<Texture>("T1", framework::texture(32));
            data.texture = builder.write(t, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |resources, _, _| {
            executed.borrow_mut().push(resources.pass_name().to_owned());
            Ok(())
        },
    );
    let b = graph.add_pass::<Single, _, _>(
        "B",
        |builder, data| {
            builder.read(a.texture, TextureUsage::SAMPLEABLE).unwrap();
            let t = builder.create::<Texture>("T2", framework::texture(32));
            data.texture = builder.write(t, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |_, _, _| Err(anyhow!("device lost")),
    );
    graph.add_pass::<(), _, _>(
        "C",
        |builder, _| {
            builder.read(b.texture, TextureUsage::SAMPLEABLE).unwrap();
            builder.read(a.texture, TextureUsage::SAMPLEABLE).unwrap();
            builder.side_effect();
        },
        |resources, _, _| {
            executed.borrow_mut().push(resources.pass_name().to_owned());
            Ok(())
        },
    );
    graph.compile();

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    let error = graph.execute(&mut allocator, &mut driver).unwrap_err();
    assert_eq!(error.to_string(), "device lost");
    assert_eq!(executed.borrow().as_slice(), &[String::from("A")]);
    assert_eq!(allocator.created_textures().len(), 2);
    assert_eq!(allocator.live_objects(), 0);
    assert_eq!(driver.flushes(), 1);
    assert!(driver.markers_balanced());
    assert!(!graph.is_compiled());
    assert_eq!(graph.pass_count(), 0);
    Ok(())
}

#[test]
pub fn allocation_failure_is_reported() -> Result<()> {
    framework::init_logger();
    let mut graph = FrameGraph::new();
    let a = graph.add_pass::<Single, _, _>(
        "A",
        |builder, data| {
            let t = builder.create::<Texture>("T1", framework::texture(32));
            data.texture = builder.write(t, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |_, _, _| Ok(()),
    );
    graph.add_pass::<(), _, _>(
        "B",
        |builder, _| {
            builder.read(a.texture, TextureUsage::SAMPLEABLE).unwrap();
            let t = builder.create::<Texture>("T2", framework::texture(32));
            builder.write(t, TextureUsage::COLOR_ATTACHMENT).unwrap();
            builder.side_effect();
        },
        |_, _, _| Ok(()),
    );
    graph.compile();

    let mut allocator = MockAllocator::new();
    allocator.fail_on = Some(String::from("T2"));
    let mut driver = MockDriver::new();
    let error = graph.execute(&mut allocator, &mut driver).unwrap_err();
    assert!(is_error(&error, |e| matches!(e, Error::AllocationFailed(name) if name == "T2")));
    assert_eq!(allocator.live_objects(), 0);
    Ok(())
}

#[test]
pub fn graphviz_export_marks_culled_nodes() -> Result<()> {
    let mut graph = FrameGraph::new();
    graph.add_pass::<(), _, _>(
        "unused",
        |builder, _| {
            let t = builder.create::<Texture>("garbage", framework::texture(4));
            builder.write(t, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |_, _, _| Ok(()),
    );
    graph.add_present_pass(|_| {});
    graph.compile();
    let dot = graph.graphviz();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("unused"));
    assert!(dot.contains("garbage"));
    assert!(dot.contains("Present"));
    assert!(dot.contains("lightgray"));
    assert!(dot.contains("dashed"));
    Ok(())
}

#[test]
pub fn culled_consumer_releases_written_sub_resource() -> Result<()> {
    framework::init_logger();
    let mut graph = FrameGraph::new();
    let mip = graph.add_pass::<Single, _, _>(
        "downsample",
        |builder, data| {
            let bloom = builder.create::<Texture>("bloom", framework::texture(128).levels(2));
            let mip = builder
                .create_subresource(bloom, "bloom.mip1", TextureSubResourceDescriptor {
                    level: 1,
                    layer: 0,
                })
                .unwrap();
            data.texture = builder.write(mip, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |_, _, _| Ok(()),
    );
    let consumer = graph.add_pass_with_executor(
        "consumer",
        |builder| {
            builder.read(mip.texture, TextureUsage::SAMPLEABLE).unwrap();
        },
        EmptyPassExecutor::new(),
    );
    graph.add_present_pass(|_| {});

    assert!(graph.is_acyclic());
    let stats = graph.compile();
    assert_eq!(stats.culled_passes, 2);
    assert_eq!(stats.live_resources, 0);
    assert!(graph.is_culled(consumer));
    assert!(graph.is_culled(PassId::default()));

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;
    assert!(allocator.events.is_empty());
    Ok(())
}

/// Declares a bloom texture with three mip levels, where every pass samples the previous mip and renders the next.
fn downsample_chain(graph: &mut FrameGraph<'_>) -> FrameGraphId<Texture> {
    let mut data = graph.add_pass::<Single, _, _>(
        "mip0",
        |builder, data| {
            let bloom = builder.create::<Texture>("bloom", framework::texture(256).levels(3));
            let mip = builder
                .create_subresource(bloom, "bloom.mip0", TextureSubResourceDescriptor::default())
                .unwrap();
            builder.write(mip, TextureUsage::COLOR_ATTACHMENT).unwrap();
            data.texture = bloom;
        },
        |_, _, _| Ok(()),
    );
    let mut previous = 0;
    for level in 1..3u8 {
        let bloom = data.texture;
        data = graph.add_pass::<Single, _, _>(
            format!("mip{level}"),
            move |builder, data| {
                let source = builder
                    .create_subresource(bloom, format!("bloom.mip{previous}"), TextureSubResourceDescriptor {
                        level: previous,
                        layer: 0,
                    })
                    .unwrap();
                builder.read(source, TextureUsage::SAMPLEABLE).unwrap();
                let target = builder
                    .create_subresource(bloom, format!("bloom.mip{level}"), TextureSubResourceDescriptor {
                        level,
                        layer: 0,
                    })
                    .unwrap();
                builder.write(target, TextureUsage::COLOR_ATTACHMENT).unwrap();
                data.texture = bloom;
            },
            |_, _, _| Ok(()),
        );
        previous = level;
    }
    data.texture
}

#[test]
pub fn downsample_chain_survives_when_consumed() -> Result<()> {
    framework::init_logger();
    let mut graph = FrameGraph::new();
    let bloom = downsample_chain(&mut graph);
    assert!(graph.is_valid(bloom));
    graph.add_present_pass(|builder| {
        builder.read(bloom, TextureUsage::SAMPLEABLE).unwrap();
    });
    assert!(graph.is_acyclic());

    let stats = graph.compile();
    assert_eq!(stats.passes, 4);
    assert_eq!(stats.culled_passes, 0);
    let info = graph.resource_info(bloom).unwrap();
    assert_eq!(info.first.map(|pass| pass.index()), Some(0));
    assert_eq!(info.last.map(|pass| pass.index()), Some(3));

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;
    assert_eq!(allocator.created_textures(), vec![String::from("bloom")]);
    assert_eq!(allocator.live_objects(), 0);
    Ok(())
}

#[test]
pub fn downsample_chain_is_culled_without_consumer() -> Result<()> {
    framework::init_logger();
    let mut graph = FrameGraph::new();
    downsample_chain(&mut graph);
    graph.add_present_pass(|_| {});
    assert!(graph.is_acyclic());

    let stats = graph.compile();
    assert_eq!(stats.culled_passes, 3);
    assert_eq!(stats.live_resources, 0);

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;
    assert!(allocator.events.is_empty());
    Ok(())
}

#[test]
pub fn reading_sub_resource_keeps_parent_writer_alive() -> Result<()> {
    framework::init_logger();
    let mut graph = FrameGraph::new();
    let fill = graph.add_pass::<Single, _, _>(
        "fill",
        |builder, data| {
            let bloom = builder.create::<Texture>("bloom", framework::texture(128).levels(2));
            data.texture = builder.write(bloom, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |_, _, _| Ok(()),
    );
    let sample = graph.add_pass::<Single, _, _>(
        "sample",
        |builder, data| {
            let mip = builder
                .create_subresource(fill.texture, "bloom.mip1", TextureSubResourceDescriptor {
                    level: 1,
                    layer: 0,
                })
                .unwrap();
            data.texture = builder.read(mip, TextureUsage::SAMPLEABLE).unwrap();
            builder.side_effect();
        },
        |resources, data, _| {
            assert!(!resources.get(data.texture)?.handle.is_null());
            Ok(())
        },
    );
    assert!(graph.is_acyclic());

    let stats = graph.compile();
    assert_eq!(stats.culled_passes, 0);
    assert!(!graph.is_culled(PassId::default()));
    let parent = graph.resource_info(fill.texture).unwrap();
    assert_eq!(parent.first.map(|pass| pass.index()), Some(0));
    assert_eq!(parent.last.map(|pass| pass.index()), Some(1));
    assert_eq!(
        graph.usage(fill.texture),
        Some(TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLEABLE)
    );
    assert_eq!(graph.resource_info(sample.texture).unwrap().first.map(|pass| pass.index()), Some(1));

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;
    assert_eq!(allocator.created_textures(), vec![String::from("bloom")]);
    assert_eq!(allocator.live_objects(), 0);
    Ok(())
}

#[test]
pub fn writing_and_reading_sibling_mips_in_one_pass_stays_acyclic() -> Result<()> {
    let mut graph = FrameGraph::new();
    let pass = graph.add_pass_with_executor(
        "mip blit",
        |builder| {
            let bloom = builder.create::<Texture>("bloom", framework::texture(64).levels(2));
            let mip1 = builder
                .create_subresource(bloom, "bloom.mip1", TextureSubResourceDescriptor {
                    level: 1,
                    layer: 0,
                })
                .unwrap();
            let mip0 = builder
                .create_subresource(bloom, "bloom.mip0", TextureSubResourceDescriptor::default())
                .unwrap();
            builder.write(mip1, TextureUsage::BLIT_DST).unwrap();
            builder.read(mip0, TextureUsage::BLIT_SRC).unwrap();
            builder.side_effect();
        },
        EmptyPassExecutor::new(),
    );
    assert!(graph.is_acyclic());
    graph.compile();
    assert!(!graph.is_culled(pass));
    Ok(())
}

#[test]
pub fn compiling_twice_keeps_lifetimes() -> Result<()> {
    framework::init_logger();
    let mut graph = FrameGraph::new();
    let a = graph.add_pass::<Single, _, _>(
        "A",
        |builder, data| {
            let x = builder.create::<Texture>("X", framework::texture(32));
            data.texture = builder.write(x, TextureUsage::COLOR_ATTACHMENT).unwrap();
        },
        |_, _, _| Ok(()),
    );
    graph.add_present_pass(|builder| {
        builder.read(a.texture, TextureUsage::SAMPLEABLE).unwrap();
    });

    let first = graph.compile();
    let info = graph.resource_info(a.texture).unwrap();
    let usage = graph.usage(a.texture);
    assert_eq!(info.refcount, 2);

    assert_eq!(graph.compile(), first);
    assert_eq!(graph.resource_info(a.texture).unwrap(), info);
    assert_eq!(graph.usage(a.texture), usage);

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;
    assert_eq!(allocator.created_textures(), vec![String::from("X")]);
    assert_eq!(allocator.live_objects(), 0);
    Ok(())
}

#[test]
pub fn oversized_viewport_saturates_render_target_size() -> Result<()> {
    let mut graph = FrameGraph::new();
    graph.add_pass::<(), _, _>(
        "wide",
        |builder, _| {
            let color = builder.create::<Texture>("color", framework::texture(16));
            let mut descriptor = RenderTargetDescriptor {
                viewport: Some(vk::Rect2D {
                    offset: vk::Offset2D {
                        x: 16,
                        y: 0,
                    },
                    extent: vk::Extent2D {
                        width: u32::MAX,
                        height: 16,
                    },
                }),
                ..Default::default()
            };
            descriptor.attachments.color[0] = color;
            builder.declare_render_target("wide target", descriptor);
            builder.side_effect();
        },
        |_, _, _| Ok(()),
    );
    graph.compile();

    let mut allocator = MockAllocator::new();
    let mut driver = MockDriver::new();
    graph.execute(&mut allocator, &mut driver)?;
    assert_eq!(allocator.render_targets[0].width, u32::MAX);
    assert_eq!(allocator.render_targets[0].height, 16);
    Ok(())
}
