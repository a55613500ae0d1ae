pub mod cache;
pub mod catalog;
pub mod loaders;
pub mod providers;
pub mod splits;
pub mod storage;
pub mod transform;

pub use cache::*;
pub use catalog::*;
pub use loaders::*;
pub use providers::*;
pub use splits::*;
pub use storage::*;
pub use transform::*;
