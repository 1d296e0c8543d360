mod geometry;
mod projection;
mod renderer;

pub use projection::{ViewWindow, WindowError};
pub use renderer::{MarkerLayer, MarkerSet, RenderedTile, SceneRenderer, StyleOptions};
