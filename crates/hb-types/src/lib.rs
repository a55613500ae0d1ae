pub mod benchmark;
pub mod budget;
pub mod dataset;
pub mod errors;
pub mod space;
pub mod stats;
pub mod trajectory;

pub use benchmark::*;
pub use budget::*;
pub use dataset::*;
pub use errors::*;
pub use space::*;
pub use stats::*;
pub use trajectory::*;
