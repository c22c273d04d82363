//! Watch tokens.
//!
//! Watch events carry no request id; they are demultiplexed by the token
//! the watcher supplied. To route events to the right subscriber even
//! when two watchers pick the same user string, the wire token is
//! `<tag>:<user>` where `tag` is a locally issued unique number and
//! `user` is the caller's string, preserved verbatim.

use std::fmt;

use super::ids::fresh_id;

/// A watch token: `<tag>:<user>` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Mint a token for a user-supplied string, prefixing a fresh tag.
    pub fn from_user(user: &str) -> Token {
        Token(format!("{}:{}", fresh_id(), user))
    }

    /// Adopt a marshalled token verbatim, without regenerating the tag.
    ///
    /// Used on the receive side: a watch event's token must compare
    /// byte-exact with what was sent.
    pub fn from_wire(raw: &str) -> Token {
        Token(raw.to_string())
    }

    /// The user's projection: everything after the first `:`.
    ///
    /// Further colons belong to the user string and are preserved. A
    /// token without a separator (not minted here) is returned whole.
    pub fn user(&self) -> &str {
        match self.0.split_once(':') {
            Some((_, user)) => user,
            None => &self.0,
        }
    }

    /// The full wire form, tag included.
    pub fn as_wire(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
