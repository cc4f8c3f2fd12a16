//! Vigil CLI library
//!
//! Everything the `vigil` binary needs, exposed as a library so commands can
//! be exercised from integration tests.

pub mod cmd;
pub mod logging;
pub mod refresh;
pub mod render;
pub mod session;
pub mod system_config;
pub mod util;
