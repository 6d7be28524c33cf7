pub mod app;
pub mod check;
pub mod commands;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod runtime;
pub mod simulate;
