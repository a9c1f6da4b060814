pub mod aim;
pub mod commands;
pub mod dispatcher;
pub mod input;
