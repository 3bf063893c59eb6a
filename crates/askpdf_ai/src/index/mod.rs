pub mod model;
pub mod similarity;
pub mod store;
pub mod vector;

pub use model::{IndexBuildInput, IndexManifest, IndexedChunk, SearchHit, INDEX_FORMAT_VERSION};
pub use store::IndexStore;
pub use vector::VectorIndex;
