//! Template expander: turns one template into a set of output strings.
//!
//! The walk is a single pass over the input bytes. Literal text accumulates
//! into a segment; each backtick hands control to the expression evaluator,
//! whose value is flattened to a list of interned strings and folded into
//! the working result set as a Cartesian product. A two-element list midway
//! through a template therefore doubles every output built so far.
//!
//! All string bytes (literal segments, string values, rendered integers)
//! live in a [`StringPool`]; the result set holds only cheap references
//! into it until the final join.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::Error;
use crate::expr::eval_region;
use crate::host::Host;
use crate::value::Value;

// ── String pool ───────────────────────────────────────────────────────────────

/// Deduplicating owner of string bytes.
///
/// `intern` hands out references that stay valid for the pool's lifetime;
/// byte-equal inputs yield pointer-equal references.
#[derive(Default)]
pub struct StringPool {
    entries: HashSet<Rc<str>>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Rc<str> {
        if let Some(hit) = self.entries.get(s) {
            return hit.clone();
        }
        let entry: Rc<str> = Rc::from(s);
        self.entries.insert(entry.clone());
        entry
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Limits ────────────────────────────────────────────────────────────────────

/// Caps on pathological expansion.
///
/// Both the list-range syntax and the set product can blow up on tiny
/// inputs (`` `[1..1000000]` `` repeated once per backtick region), so both
/// are bounded.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Most elements a single `a..b` range may expand to.
    pub max_range: usize,
    /// Most in-progress outputs the result set may hold.
    pub max_outputs: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_range: 1 << 16,
            max_outputs: 1 << 20,
        }
    }
}

// ── Expander ──────────────────────────────────────────────────────────────────

struct Expander {
    pool: StringPool,
    /// Each inner vec is one in-progress output.
    result_set: Vec<Vec<Rc<str>>>,
    limits: Limits,
}

fn is_template_escape(b: u8) -> bool {
    matches!(b, b'\\' | b'`')
}

impl Expander {
    fn run(&mut self, input: &str, mut host: Option<&mut dyn Host>) -> Result<Vec<String>, Error> {
        let bytes = input.as_bytes();
        let mut segment = String::new();
        let mut run = 0;
        let mut i = 0;
        let mut regions = 0usize;

        while i < bytes.len() {
            match bytes[i] {
                b'\\' if i + 1 < bytes.len() && is_template_escape(bytes[i + 1]) => {
                    segment.push_str(&input[run..i]);
                    segment.push(bytes[i + 1] as char);
                    i += 2;
                    run = i;
                }
                b'`' => {
                    segment.push_str(&input[run..i]);
                    i += 1;
                    if !segment.is_empty() {
                        let s = self.pool.intern(&segment);
                        self.expand_segment(s);
                        segment.clear();
                    }

                    let reborrow: Option<&mut dyn Host> = match host {
                        Some(ref mut h) => Some(&mut **h),
                        None => None,
                    };
                    let (val, end) = eval_region(input, i, reborrow, &self.limits)?;
                    if bytes.get(end).copied() != Some(b'`') {
                        return Err(Error::expand(
                            "the expression needs to be ended with \"`\"",
                        ));
                    }
                    regions += 1;

                    let mut strings = Vec::new();
                    self.value_to_strings(&val, &mut strings)?;
                    trace!(region = regions, expansion = strings.len(), "region flattened");
                    self.concatenate(strings)?;

                    i = end + 1;
                    run = i;
                }
                _ => i += 1,
            }
        }

        segment.push_str(&input[run..]);
        if !segment.is_empty() {
            let s = self.pool.intern(&segment);
            self.expand_segment(s);
        }

        let outputs = self.generate_result();
        debug!(
            regions,
            outputs = outputs.len(),
            interned = self.pool.len(),
            "template expanded"
        );
        Ok(outputs)
    }

    /// Append one literal segment to every in-progress output, seeding the
    /// set if it is still empty.
    fn expand_segment(&mut self, s: Rc<str>) {
        if self.result_set.is_empty() {
            self.result_set.push(vec![s]);
        } else {
            for out in &mut self.result_set {
                out.push(s.clone());
            }
        }
    }

    /// Fold an expression's flattened strings into the result set as a
    /// Cartesian product: every existing output times every string, in
    /// that nesting order. An empty `strings` multiplies by zero and
    /// empties the set.
    fn concatenate(&mut self, strings: Vec<Rc<str>>) -> Result<(), Error> {
        if self.result_set.is_empty() {
            self.check_output_cap(strings.len())?;
            self.result_set = strings.into_iter().map(|s| vec![s]).collect();
            return Ok(());
        }
        let total = self.result_set.len().saturating_mul(strings.len());
        self.check_output_cap(total)?;
        let mut next = Vec::with_capacity(total);
        for existing in &self.result_set {
            for s in &strings {
                let mut out = existing.clone();
                out.push(s.clone());
                next.push(out);
            }
        }
        self.result_set = next;
        Ok(())
    }

    fn check_output_cap(&self, total: usize) -> Result<(), Error> {
        if total > self.limits.max_outputs {
            return Err(Error::expand(format!(
                "expansion produces {total} outputs, more than the configured limit of {}",
                self.limits.max_outputs
            )));
        }
        Ok(())
    }

    /// Flatten a value into interned strings: scalars render to one string,
    /// lists flatten recursively (a list of lists yields the same sequence
    /// as the flat list of its scalars).
    fn value_to_strings(&mut self, val: &Value, out: &mut Vec<Rc<str>>) -> Result<(), Error> {
        match val {
            Value::Str(s) => out.push(self.pool.intern(s)),
            Value::Int(n) => out.push(self.pool.intern(&n.to_string())),
            Value::List(items) => {
                for v in items {
                    self.value_to_strings(v, out)?;
                }
            }
            Value::Null => {
                return Err(Error::expand("the expression produced a null value"));
            }
        }
        Ok(())
    }

    /// Join every in-progress output into its final string, in insertion
    /// order.
    fn generate_result(&self) -> Vec<String> {
        self.result_set
            .iter()
            .map(|out| {
                let cap = out.iter().map(|s| s.len()).sum();
                let mut joined = String::with_capacity(cap);
                for s in out {
                    joined.push_str(s);
                }
                joined
            })
            .collect()
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Expand `input` into its output strings with default [`Limits`].
///
/// Without a host, any variable or function reference in the template is an
/// error. An empty template yields an empty vec.
pub fn run(host: Option<&mut dyn Host>, input: &str) -> Result<Vec<String>, Error> {
    run_with_limits(host, input, Limits::default())
}

/// [`run`] with explicit expansion caps.
pub fn run_with_limits(
    host: Option<&mut dyn Host>,
    input: &str,
    limits: Limits,
) -> Result<Vec<String>, Error> {
    let mut expander = Expander {
        pool: StringPool::new(),
        result_set: Vec::new(),
        limits,
    };
    expander.run(input, host)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
