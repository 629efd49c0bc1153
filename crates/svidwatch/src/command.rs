//! Line-oriented commands read by the `svidwatch` binary.
//!
//! ```text
//! add <type:value> [<type:value>...]   start one watch over the selectors
//! del <id>                             stop the watch with this id
//! list                                 show registered watches
//! quit                                 close the stream and exit
//! ```

use core::str::FromStr;
use svidwatch_core::{Error, Result, Selector, SelectorSet, SubscriptionId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Add(SelectorSet),
    Remove(SubscriptionId),
    List,
    Quit,
    /// A blank line.
    Empty,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(Self::Empty);
        };
        let args: Vec<&str> = words.collect();

        match verb {
            "add" => {
                if args.is_empty() {
                    return Err(usage("add <type:value> [<type:value>...]"));
                }
                let selectors = args
                    .into_iter()
                    .map(str::parse::<Selector>)
                    .collect::<Result<SelectorSet>>()?;
                Ok(Self::Add(selectors))
            }
            "del" | "rm" => match args.as_slice() {
                [id] => id.parse().map(Self::Remove).map_err(|_| Error::InvalidRequest {
                    reason: format!("\"{id}\" is not a subscription id"),
                }),
                _ => Err(usage("del <id>")),
            },
            "list" | "ls" if args.is_empty() => Ok(Self::List),
            "list" | "ls" => Err(usage("list")),
            "quit" | "exit" if args.is_empty() => Ok(Self::Quit),
            "quit" | "exit" => Err(usage("quit")),
            other => Err(Error::InvalidRequest {
                reason: format!("unknown command \"{other}\" (expected add, del, list or quit)"),
            }),
        }
    }
}

fn usage(form: &str) -> Error {
    Error::InvalidRequest {
        reason: format!("usage: {form}"),
    }
}
