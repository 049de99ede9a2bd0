//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `watch`   | `Watch`          |
//! | `replay`  | `Replay`         |
//! | `mock`    | `MockBackend`    |
//! | `config`  | `Config`         |

pub mod config;
pub mod mock;
pub mod replay;
pub mod watch;

pub use config::cmd_config;
pub use mock::cmd_mock_backend;
pub use replay::cmd_replay;
pub use watch::cmd_watch;
