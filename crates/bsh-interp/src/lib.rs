// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builds shell command strings from literal text and typed arguments.
//!
//! Every interpolated value is an [`Arg`]: plain strings are double-quoted
//! with embedded `"` escaped, lists expand into space-separated arguments,
//! [`raw`] fragments pass through untouched and [`squote`] fragments are
//! wrapped in single quotes. The [`cmd!`] macro is the everyday entry point:
//!
//! ```
//! use bsh_interp::{cmd, raw};
//!
//! let file = "my notes.txt";
//! assert_eq!(
//!     cmd!("wc -l {} {}", file, raw("| sort")),
//!     r#"wc -l "my notes.txt" | sort"#,
//! );
//! ```
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::borrow::Cow;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Arg
// ---------------------------------------------------------------------------

/// A value interpolated into a command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// A string argument, double-quoted on render.
    Plain(String),
    /// A fragment inserted verbatim.
    Raw(String),
    /// A fragment wrapped in single quotes verbatim.
    SingleQuoted(String),
    /// A non-string value (number, bool) rendered with its natural text.
    Literal(String),
    /// An absent value; renders as the empty string.
    Null,
    /// A sequence flattened into a space-joined argument list.
    List(Vec<Arg>),
}

/// Mark `s` for verbatim insertion, with no quoting.
pub fn raw(s: impl Into<String>) -> Arg {
    Arg::Raw(s.into())
}

/// Mark `s` for insertion inside single quotes, so the shell performs no
/// expansion on it.
pub fn squote(s: impl Into<String>) -> Arg {
    Arg::SingleQuoted(s.into())
}

/// Wrap `s` in double quotes, escaping embedded double quotes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl Arg {
    /// Render this argument as it appears in the final command string.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Arg::Plain(s) => Cow::Owned(quote(s)),
            Arg::Raw(s) | Arg::Literal(s) => Cow::Borrowed(s),
            Arg::SingleQuoted(s) => Cow::Owned(format!("'{s}'")),
            Arg::Null => Cow::Borrowed(""),
            Arg::List(items) => Cow::Owned(
                items
                    .iter()
                    .map(|a| a.render())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Plain(s.to_owned())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Plain(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Plain(s.clone())
    }
}

impl From<&Path> for Arg {
    fn from(p: &Path) -> Self {
        Arg::Plain(p.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for Arg {
    fn from(p: PathBuf) -> Self {
        Arg::from(p.as_path())
    }
}

impl From<&PathBuf> for Arg {
    fn from(p: &PathBuf) -> Self {
        Arg::from(p.as_path())
    }
}

macro_rules! literal_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Arg::Literal(v.to_string())
                }
            }
        )*
    };
}

literal_from!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool);

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        v.map_or(Arg::Null, Into::into)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(items: Vec<T>) -> Self {
        Arg::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Arg> + Clone> From<&[T]> for Arg {
    fn from(items: &[T]) -> Self {
        Arg::List(items.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<Arg>, const N: usize> From<[T; N]> for Arg {
    fn from(items: [T; N]) -> Self {
        Arg::List(items.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

/// Join literal `parts` with rendered `values`.
///
/// `parts[i]` is followed by `values[i]`. Slots without a value render empty
/// and surplus values are ignored, so `parts.len()` decides the shape.
pub fn interpolate<S: AsRef<str>>(parts: &[S], values: &[Arg]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        out.push_str(part.as_ref());
        if let Some(v) = values.get(i) {
            out.push_str(&v.render());
        }
    }
    out
}

/// A command template with `{}` slots.
///
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<String>,
}

impl Template {
    /// Split `fmt` into literal parts around its `{}` slots.
    pub fn parse(fmt: &str) -> Self {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = fmt.chars().peekable();
        while let Some(c) = chars.next() {
            match (c, chars.peek()) {
                ('{', Some('{')) | ('}', Some('}')) => {
                    chars.next();
                    current.push(c);
                }
                ('{', Some('}')) => {
                    chars.next();
                    parts.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            }
        }
        parts.push(current);
        Self { parts }
    }

    /// Number of `{}` slots in the template.
    pub fn slots(&self) -> usize {
        self.parts.len() - 1
    }

    /// The literal text between slots.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Fill the slots with `values`.
    pub fn render(&self, values: &[Arg]) -> String {
        interpolate(&self.parts, values)
    }
}

/// Build a command string from a `{}` template and interpolated values.
///
/// ```
/// use bsh_interp::cmd;
///
/// let files = vec!["a b", "c"];
/// assert_eq!(cmd!("rm {}", files), r#"rm "a b" "c""#);
/// assert_eq!(cmd!("sleep {}", 2u32), "sleep 2");
/// ```
#[macro_export]
macro_rules! cmd {
    ($fmt:expr $(,)?) => {
        $crate::Template::parse($fmt).render(&[])
    };
    ($fmt:expr, $($arg:expr),+ $(,)?) => {
        $crate::Template::parse($fmt).render(&[$($crate::Arg::from($arg)),+])
    };
}
