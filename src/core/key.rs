//! Structured variable identifiers.
//!
//! A [`Key`] names one variable in a [`Values`](crate::core::values::Values) store. It is a
//! triple of a letter plus optional `sub` and `super` indices, e.g. `x_3` for the third pose or
//! `l_7_2` for landmark 7 seen in session 2.
//!
//! Ordering is lexical over `(letter, sub, super)`, where an absent index sorts before any
//! present one. This matches tuple comparison in which a shorter tuple precedes a longer one
//! sharing its prefix.

use std::fmt;

use crate::core::{CoreError, CoreResult};

/// Identifier of a single optimization variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Key {
    letter: char,
    sub: Option<i64>,
    superscript: Option<i64>,
}

impl Key {
    /// Create a key with only a letter.
    pub const fn new(letter: char) -> Self {
        Self {
            letter,
            sub: None,
            superscript: None,
        }
    }

    /// Create a key with a letter and a sub index.
    pub const fn with_sub(letter: char, sub: i64) -> Self {
        Self {
            letter,
            sub: Some(sub),
            superscript: None,
        }
    }

    /// Create a key with a letter, a sub index and a super index.
    pub const fn with_sub_super(letter: char, sub: i64, superscript: i64) -> Self {
        Self {
            letter,
            sub: Some(sub),
            superscript: Some(superscript),
        }
    }

    /// Create a key from external input, rejecting letters that are not printable ASCII.
    pub fn try_new(letter: char, sub: Option<i64>, superscript: Option<i64>) -> CoreResult<Self> {
        if !letter.is_ascii_graphic() {
            return Err(CoreError::InvalidInput(format!(
                "Key letter must be a printable ASCII character, got {letter:?}"
            ))
            .log());
        }
        Ok(Self {
            letter,
            sub,
            superscript,
        })
    }

    /// Copy of this key with the super index replaced.
    #[must_use]
    pub const fn with_super(&self, superscript: i64) -> Self {
        Self {
            letter: self.letter,
            sub: self.sub,
            superscript: Some(superscript),
        }
    }

    pub const fn letter(&self) -> char {
        self.letter
    }

    pub const fn sub(&self) -> Option<i64> {
        self.sub
    }

    pub const fn superscript(&self) -> Option<i64> {
        self.superscript
    }

    /// Strict lexical ordering, absent indices first.
    pub fn lexical_less_than(a: &Key, b: &Key) -> bool {
        a < b
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter)?;
        if let Some(sub) = self.sub {
            write!(f, "_{sub}")?;
        }
        if let Some(superscript) = self.superscript {
            write!(f, "_{superscript}")?;
        }
        Ok(())
    }
}
