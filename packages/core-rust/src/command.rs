//! The `Command` capability consumed by every transport.
//!
//! A command maps an ordered argument list to a single result string. It is
//! stateless and shared read-only across all in-flight requests, so
//! implementations must be `Send + Sync` and free of interior mutability.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Greeting returned when no arguments are given.
pub const DEFAULT_GREETING: &str = "Hello!";

/// Stateless capability mapping an argument list to a result string.
///
/// Implementations must be pure: the same arguments always produce the same
/// result, and no call may observe the effects of a previous one.
pub trait Command: Send + Sync {
    /// Produces the result for one request.
    fn invoke(&self, args: &[String]) -> String;
}

impl<C: Command + ?Sized> Command for Arc<C> {
    fn invoke(&self, args: &[String]) -> String {
        (**self).invoke(args)
    }
}

impl<C: Command + ?Sized> Command for Box<C> {
    fn invoke(&self, args: &[String]) -> String {
        (**self).invoke(args)
    }
}

/// Greets the first argument, or returns [`DEFAULT_GREETING`] when there is none.
///
/// Further arguments are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HelloCommand;

impl Command for HelloCommand {
    fn invoke(&self, args: &[String]) -> String {
        match args.first() {
            Some(name) => format!("Hello, {name}!"),
            None => DEFAULT_GREETING.to_string(),
        }
    }
}

/// Joins all arguments with a single space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoCommand;

impl Command for EchoCommand {
    fn invoke(&self, args: &[String]) -> String {
        args.join(" ")
    }
}

/// Adapts a plain function or closure into a [`Command`].
pub struct FnCommand<F>(F);

impl<F> FnCommand<F>
where
    F: Fn(&[String]) -> String + Send + Sync,
{
    /// Wraps `f` so it can be handed to any transport.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Command for FnCommand<F>
where
    F: Fn(&[String]) -> String + Send + Sync,
{
    fn invoke(&self, args: &[String]) -> String {
        (self.0)(args)
    }
}

impl<F> fmt::Debug for FnCommand<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand").finish_non_exhaustive()
    }
}

/// Names the built-in commands so they can be selected from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// [`HelloCommand`].
    #[default]
    Hello,
    /// [`EchoCommand`].
    Echo,
}

impl CommandKind {
    /// Returns the lowercase name used on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Echo => "echo",
        }
    }

    /// Instantiates the command behind a shared handle.
    #[must_use]
    pub fn build(self) -> Arc<dyn Command> {
        match self {
            Self::Hello => Arc::new(HelloCommand),
            Self::Echo => Arc::new(EchoCommand),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown command name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0} (expected hello or echo)")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandKind {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hello" => Ok(Self::Hello),
            "echo" => Ok(Self::Echo),
            _ => Err(UnknownCommand(s.to_string())),
        }
    }
}
