pub mod cmd;
pub mod config;
pub mod czar;
pub mod daemon;
pub mod dag;
pub mod errors;
pub mod eventlog;
pub mod hopper;
pub mod launch;
pub mod phase_ctl;
pub mod repo;
pub mod session;
pub mod status;
pub mod tracing_setup;
pub mod wiggum;
pub mod worker;
