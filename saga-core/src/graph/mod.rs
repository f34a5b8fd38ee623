mod dependency;
mod model;

pub use dependency::build_dependency_graph;
pub use model::DependencyGraph;
