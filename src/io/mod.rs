// Purpose - the edges of the core: pointer input, asset loading, view output

pub mod gesture;
pub mod loader;
pub mod view;

pub use gesture::{normalize, Point, Surface};
pub use loader::{AssetLoader, AssetRequest, LoadError, LoadedAssets, SynthesizedLoader, WavLoader};
pub use view::{Snapshot, ViewSlot};
