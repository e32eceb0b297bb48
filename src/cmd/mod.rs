//! CLI command implementations.
//!
//! | Module     | Commands handled                |
//! |------------|---------------------------------|
//! | `run`      | `Run`                           |
//! | `targets`  | `List`, `Status`, `Reset`       |
//! | `config`   | `Config`                        |

pub mod config;
pub mod run;
pub mod targets;

pub use config::cmd_config;
pub use run::run_batch;
pub use targets::{cmd_list, cmd_reset, cmd_status};
