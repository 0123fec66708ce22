pub mod exec;
pub mod graph;
pub mod list;
pub mod run;
pub mod schema;
