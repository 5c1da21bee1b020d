//! Command-line argument parsing.
//!
//! Usage:
//!   weft [-D <name>=<value>]... [-e <template>] [<file>]
//!
//! The template comes from `-e`, from a file argument, or from stdin when
//! neither is given. Each `-D` defines a string variable visible to the
//! template's expressions.

use std::path::PathBuf;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Variable definitions (`-D name=value`), in order.
    pub defines: Vec<(String, String)>,
    /// Inline template (`-e <template>`).
    pub template: Option<String>,
    /// Template file (positional argument).
    pub file: Option<PathBuf>,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    parse_arg_list(std::env::args().skip(1))
}

/// Parse an explicit argument list (used by tests).
pub fn parse_arg_list(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut out = CliArgs::default();

    while let Some(arg) = args.next() {
        if let Some(rest) = arg.strip_prefix("-D") {
            // -Dname=value or -D name=value
            let spec = if rest.is_empty() {
                args.next().ok_or("-D requires a name=value argument")?
            } else {
                rest.to_owned()
            };
            let (name, value) = spec
                .split_once('=')
                .ok_or_else(|| format!("-D expects name=value, got '{spec}'"))?;
            if name.is_empty() {
                return Err(format!("-D expects name=value, got '{spec}'"));
            }
            out.defines.push((name.to_owned(), value.to_owned()));
        } else if let Some(rest) = arg.strip_prefix("-e") {
            let template = if rest.is_empty() {
                args.next().ok_or("-e requires a template argument")?
            } else {
                rest.to_owned()
            };
            if out.template.is_some() {
                return Err("-e given more than once".into());
            }
            out.template = Some(template);
        } else if arg == "-" || !arg.starts_with('-') {
            if out.file.is_some() {
                return Err(format!("unexpected extra argument '{arg}'"));
            }
            out.file = Some(PathBuf::from(arg));
        } else {
            return Err(format!("unknown option '{arg}'"));
        }
    }

    if out.template.is_some() && out.file.is_some() {
        return Err("-e and a file argument are mutually exclusive".into());
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
