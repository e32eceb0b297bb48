pub mod analysis;
pub mod artifact;
pub mod audit;
pub mod config;
pub mod diff;
pub mod errors;
pub mod forge;
pub mod imports;
pub mod logging;
pub mod orchestrator;
pub mod pocer_config;
pub mod prompts;
pub mod session;
pub mod stage;
pub mod status;
pub mod stream;
pub mod target;
pub mod ui;
pub mod util;
