//! Scripted demo: a simulated issue tracker page driven by a timeline

mod renderer;
mod runner;
mod scenario;

pub use runner::run;
pub use scenario::load_scenario;
