//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `serve`  | `Serve`          |
//! | `apply`  | `Apply`          |
//! | `config` | `Config`         |

pub mod apply;
pub mod config;
pub mod serve;

pub use apply::cmd_apply;
pub use config::cmd_config;
pub use serve::cmd_serve;
