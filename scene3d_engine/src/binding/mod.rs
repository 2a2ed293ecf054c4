/// Resource binding between render stages
///
/// A stage publishes values through `OutputSlot`s; later stages read them
/// through `InputSlot`s bound by name while the pipeline is built.

pub mod slot;
pub mod binding_graph;
pub mod texture_ref;

pub use slot::{OutputSlot, InputSlot};
pub use binding_graph::BindingGraph;
pub use texture_ref::TextureRef;
