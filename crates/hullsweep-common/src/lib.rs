#![allow(clippy::needless_range_loop, clippy::too_many_arguments, clippy::float_cmp,
         clippy::manual_range_contains, clippy::comparison_chain)]

pub mod shared;
pub mod hull;
pub mod sweep;
pub mod sat;
pub mod bsp;
pub mod descent;
pub mod world;
pub mod pmove;
pub mod cvar;

pub use bsp::{BspLeaf, BspNode, BspTree, TreeError};
pub use cvar::{CvarError, CvarRegistry, MoveConfig};
pub use descent::{Descent, TraceStats};
pub use hull::{span, BoxHull, ConvexHull, Hull, HullData};
pub use pmove::{
    clip_velocity, move_climb, move_slide, move_stop, respond_stop, slide_tick, MoveOutcome,
    SlideOutcome, SlideState,
};
pub use sat::collide;
pub use shared::{ContactState, EntityId, Mat3, SourceMask, Trace, Vec3};
pub use world::{CollisionWorld, Solid, TraceFilter, Tracer, WorldTracer};
