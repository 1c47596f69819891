//! Greeter core: the stateless `Command` capability and argument handling
//! shared by every transport.

pub mod args;
pub mod command;

pub use args::{single_param, split_record};
pub use command::{
    Command, CommandKind, EchoCommand, FnCommand, HelloCommand, UnknownCommand, DEFAULT_GREETING,
};
