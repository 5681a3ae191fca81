mod bootstrap;
mod host;
mod loop_runner;
mod roster;
mod settings;

pub(crate) use loop_runner::run;
