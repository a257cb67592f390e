//! UI components: the graph engine and the shells hosting it.

pub mod force_graph;
pub mod shell;
