pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod discovery;
pub mod mcp;
pub mod state;
