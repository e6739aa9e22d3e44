//! Built-in WGSL kernel sources.
//!
//! Each program is a named WGSL module that may hold several entry
//! points.  Every kernel reads its scalar arguments from a uniform
//! `Params` block padded to 16 bytes, bound after its storage buffers.

use std::borrow::Cow;

use log::debug;

use crate::error::{Error, Result};

const VECTOR_ADD: &str = include_str!("vector_add.wgsl");
const MATVEC: &str = include_str!("matvec.wgsl");
const MATMUL: &str = include_str!("matmul.wgsl");
const CONVOLUTION: &str = include_str!("convolution.wgsl");
const NBODY: &str = include_str!("nbody.wgsl");

/// Names accepted by [`KernelSource::load`].
pub const PROGRAMS: [&str; 5] = [
    "vector_add",
    "matvec",
    "matrix_multiply",
    "convolution",
    "nbody",
];

/// A named WGSL module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    pub name: String,
    pub text: Cow<'static, str>,
}

impl KernelSource {
    /// Look up a built-in program by name.
    pub fn load(name: &str) -> Result<Self> {
        let text = match name {
            "vector_add" => VECTOR_ADD,
            "matvec" => MATVEC,
            "matrix_multiply" => MATMUL,
            "convolution" => CONVOLUTION,
            "nbody" => NBODY,
            other => {
                return Err(Error::config(format!(
                    "unknown kernel program `{other}` (expected one of {})",
                    PROGRAMS.join(", ")
                )))
            }
        };
        Ok(Self {
            name: name.to_string(),
            text: Cow::Borrowed(text),
        })
    }

    /// Wrap caller-supplied WGSL.
    pub fn from_text<N: Into<String>, T: Into<String>>(name: N, text: T) -> Self {
        Self {
            name: name.into(),
            text: Cow::Owned(text.into()),
        }
    }

    /// Replace the value of a module-scope `const NAME: u32 = ...;`.
    ///
    /// Work-group sizes are fixed when WGSL is compiled, so tiled
    /// variants are specialised by rewriting their tile constant before
    /// the module is built.  A source without the constant is returned
    /// unchanged.
    pub fn with_constant(self, name: &str, value: u32) -> Self {
        let prefix = format!("const {name}: u32 =");
        if !self.text.lines().any(|l| l.trim_start().starts_with(&prefix)) {
            debug!("program `{}` has no constant {name}", self.name);
            return self;
        }
        let mut text = String::with_capacity(self.text.len());
        for line in self.text.lines() {
            if line.trim_start().starts_with(&prefix) {
                text.push_str(&format!("{prefix} {value}u;"));
            } else {
                text.push_str(line);
            }
            text.push('\n');
        }
        Self {
            name: self.name,
            text: Cow::Owned(text),
        }
    }

    /// Names of the `@compute` entry points, in declaration order.
    /// Helper functions are not listed.
    pub fn entry_points(&self) -> Vec<&str> {
        let mut found = Vec::new();
        let mut rest: &str = &self.text;
        while let Some(at) = rest.find("@compute") {
            rest = &rest[at + "@compute".len()..];
            let Some(decl) = rest.find("fn ") else {
                break;
            };
            let name = rest[decl + 3..].trim_start();
            let end = name
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(name.len());
            found.push(&name[..end]);
            rest = &name[end..];
        }
        found
    }

    /// Whether the module has a compute entry point called `entry_point`.
    pub fn declares(&self, entry_point: &str) -> bool {
        self.entry_points().contains(&entry_point)
    }
}
