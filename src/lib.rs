//! Frame graph scheduler for GPU render passes.
//!
//! Rendering code describes *what* a frame needs: passes, the virtual resources they create, read and write,
//! and the render targets they draw into. The frame graph then works out which passes and resources actually
//! contribute to the frame, computes the lifetime of every resource, and allocates and frees the concrete GPU
//! objects exactly around the passes that use them.
//!
//! To get started, the easiest way is to simply
//! ```
//! // Import types under a namespace.
//! use framegraph::prelude as fg;
//!
//! // Or, if you dont care about using the types under a namespace
//! use framegraph::prelude::*;
//! ```
//!
//! # Example
//!
//! A frame consists of three phases. During setup, passes are added and declare their resource usage through a
//! [`Builder`](crate::graph::frame_graph::Builder). Then the graph is compiled, which culls everything that does
//! not contribute to a pass with side effects. Finally it is executed against a
//! [`ResourceAllocator`](crate::backend::ResourceAllocator) and a [`Driver`](crate::backend::Driver).
//! ```ignore
//! use framegraph::prelude::*;
//!
//! #[derive(Default, Clone)]
//! struct ColorPassData {
//!     color: FrameGraphId<Texture>,
//!     rt: u32,
//! }
//!
//! let mut graph = FrameGraph::new();
//! let data = graph.add_pass::<ColorPassData, _, _>(
//!     "color",
//!     |builder, data| {
//!         let color = builder.create::<Texture>("color", TextureDescriptor::new(1280, 720));
//!         data.color = color;
//!         data.rt = builder.use_as_render_target(Some(&mut data.color), None);
//!     },
//!     |resources, data, _driver| {
//!         let info = resources.render_pass_info(data.rt)?;
//!         // Record draw commands into `info.target` here.
//!         Ok(())
//!     },
//! );
//! graph.add_present_pass(|builder| {
//!     builder.read(data.color, TextureUsage::SAMPLEABLE).ok();
//! });
//! graph.compile();
//! graph.execute(&mut allocator, &mut driver)?;
//! ```
//! For further documentation, check out the following modules
//! - [`graph`] for the frame graph itself, the pass builder and the resources view.
//! - [`resource`] for the resource kinds that can live in a frame graph.
//! - [`backend`] for the interfaces the frame graph uses to talk to the GPU backend.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod backend;
pub mod error;
pub mod graph;
pub mod resource;
