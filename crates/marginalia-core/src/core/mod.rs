//! Core module: UI-agnostic conversation tree and selection threads.
//!
//! This module contains:
//! - `model`: Message nodes, thread annotations and their ids
//! - `tree`: Branching conversation tree (arena keyed by node id)
//! - `conversation`: A titled tree plus snapshot conversion
//! - `occurrence`: Locating the n-th literal occurrence of a selection
//! - `highlight`: Turning annotations into highlight ranges
//! - `annotations`: Thread engine (create, enter, exit, send, delete)
//! - `persistence`: Snapshot schema and stores
//! - `switcher`: Background conversation loading
//! - `generation`: "Most recent request wins" tokens
//! - `render`, `notify`, `text`: Boundaries to the UI

pub mod annotations;
pub mod conversation;
pub mod generation;
pub mod highlight;
pub mod model;
pub mod notify;
pub mod occurrence;
pub mod persistence;
pub mod render;
pub mod switcher;
pub mod text;
pub mod tree;
