//! Placeholder translation between the canonical query form and each backend.
//!
//! Application queries are written once with `?` for every positional
//! argument. SQLite accepts that as-is; PostgreSQL wants `$1, $2, ...`.
//!
//! The rewrite is purely textual: it scans left to right and does not know
//! about string literals, quoted identifiers or comments. A `?` inside a
//! literal is rewritten like any other. Queries must keep placeholders out of
//! literals (and away from PostgreSQL's JSONB `?` operators).

use std::borrow::Cow;

use super::traits::BackendKind;

/// The canonical placeholder token.
pub const PLACEHOLDER: char = '?';

/// Parameter-binding dialect of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `?` placeholders, passed through unchanged
    Sqlite,
    /// `$N` placeholders, numbered from 1
    Postgres,
}

impl Dialect {
    /// The dialect spoken by a backend kind
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Embedded => Self::Sqlite,
            BackendKind::Networked => Self::Postgres,
        }
    }

    /// Rewrite a canonical query into this dialect.
    ///
    /// The Nth `?` in the input always becomes the placeholder for the Nth
    /// argument.
    pub fn translate<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        match self {
            Self::Sqlite => Cow::Borrowed(sql),
            Self::Postgres => {
                if !sql.contains(PLACEHOLDER) {
                    return Cow::Borrowed(sql);
                }

                let mut out = String::with_capacity(sql.len() + 8);
                let mut index = 0usize;
                for ch in sql.chars() {
                    if ch == PLACEHOLDER {
                        index += 1;
                        out.push('$');
                        out.push_str(&index.to_string());
                    } else {
                        out.push(ch);
                    }
                }
                Cow::Owned(out)
            }
        }
    }
}
