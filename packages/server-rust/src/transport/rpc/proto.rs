//! Wire messages and generated service code for `greeter.v1.Command`.
//!
//! ```text
//! service Command {
//!   rpc Handle(CommandArguments) returns (CommandResult);
//!   rpc HandleStream(stream CommandArguments) returns (stream CommandResult);
//! }
//! ```

/// One request: the ordered argument list.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CommandArguments {
    #[prost(string, repeated, tag = "1")]
    pub args: Vec<String>,
}

/// One response: the command's result.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CommandResult {
    #[prost(string, tag = "1")]
    pub result: String,
}

include!(concat!(env!("OUT_DIR"), "/greeter.v1.Command.rs"));
