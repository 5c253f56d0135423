//! Built-in step handlers
//!
//! - `script` - run an executable from the workspace (`script` and `verify`)
//! - `collect` - fetch charms with the configured collect command
//! - `deploy` - resolve a bundle, deploy it and optionally wait for it to settle

pub mod collect;
pub mod deploy;
pub mod script;

pub use collect::CollectHandler;
pub use deploy::DeployHandler;
pub use script::ScriptHandler;

use crate::engine::error::HandlerError;
use crate::manifest::StepArgs;

/// Look up an argument that a handler cannot run without
pub(crate) fn required_arg<'a>(args: &'a StepArgs, key: &str) -> Result<&'a str, HandlerError> {
    args.get(key)
        .map(String::as_str)
        .ok_or_else(|| HandlerError::MissingArgument(key.to_string()))
}
