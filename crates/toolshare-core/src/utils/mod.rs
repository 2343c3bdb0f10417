pub mod paths;
pub mod tracing;

pub use paths::AppPaths;
