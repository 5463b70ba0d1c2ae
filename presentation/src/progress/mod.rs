//! Progress reporting while a workflow runs

pub mod reporter;
