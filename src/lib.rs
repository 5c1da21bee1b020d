//! weft: expand a text template into a set of concrete strings.
//!
//! A template is ordinary text with expression regions between backticks.
//! Each region evaluates to a scalar or a list; a list multiplies the output
//! set, Cartesian-style, with the text around it:
//!
//! - Scalars: integers, double-quoted strings.
//! - Lists: `[a, b, c]`, with half-open integer ranges `[1..4]` → `1 2 3`.
//! - Arithmetic, comparison, `&&`/`||`, `!`, and ternary `?:`.
//! - A map suffix `expr { body }` that applies `body` to each element of
//!   `expr`, binding `$` to the current element.
//! - Variables and function calls resolved through a caller-supplied
//!   [`Host`].
//!
//! Template-level `\\` and `` \` `` escape a backslash and a backtick.
//!
//! # Quick start
//!
//! ```rust
//! let out = weft::run(None, "node`[1..3]`.example.com").unwrap();
//! assert_eq!(out, vec!["node1.example.com", "node2.example.com"]);
//!
//! let out = weft::run(None, "`[1,2]`-`[\"a\",\"b\"]`").unwrap();
//! assert_eq!(out, vec!["1-a", "1-b", "2-a", "2-b"]);
//!
//! let mut host = weft::MapHost::new().var("env", "prod");
//! let out = weft::run(Some(&mut host), "`env`-`[1..3]{$*10}`").unwrap();
//! assert_eq!(out, vec!["prod-10", "prod-20"]);
//! ```
//!
//! Errors surface as a single [`Error`] whose `Display` form is the
//! diagnostic string; nothing panics on malformed input.

pub mod cli;
pub mod error;
pub mod expand;
pub mod expr;
pub mod host;
pub mod scanner;
pub mod value;

// Re-exports for convenience.
pub use error::Error;
pub use expand::{run, run_with_limits, Limits, StringPool};
pub use expr::eval_str;
pub use host::{Host, MapHost};
pub use value::Value;
