//! Core of the inactive users process: stage table, rendering, dispatch,
//! per-user state, work queues and the workers that drain them.

pub mod directory;
pub mod dispatcher;
pub mod lease;
pub mod queue;
pub mod runner;
pub mod settings;
pub mod stages;
pub mod template;
pub mod user_data;
pub mod workers;
