//! Resolved module metadata: the parsed AST plus inferred widths.

use crate::rom::RomData;
use galena_common::Ident;
use galena_source::SourceFile;
use galena_sv_parser::ast::ModuleDecl;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Direction of a resolved port.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PortDirection {
    /// Driven by the environment.
    Input,
    /// Driven by the module.
    Output,
}

/// A resolved port with its final width.
#[derive(Clone, Debug)]
pub struct Port {
    /// The port name.
    pub name: Ident,
    /// Input or output.
    pub direction: PortDirection,
    /// Width in bits, at least 1.
    pub width: u32,
    /// Whether the port was declared `signed`.
    pub signed: bool,
}

/// A memory array declared in a module.
#[derive(Clone, Copy, Debug)]
pub struct MemoryInfo {
    /// Element width in bits.
    pub width: u32,
    /// Number of elements.
    pub depth: u64,
}

/// A fully resolved module: the AST annotated with everything the
/// evaluators need: port order and widths, net widths, memory shapes,
/// signedness, the sequential flag, and ROM contents for primitives.
///
/// `ModuleInfo` is immutable once built; the cache hands out `Arc`s and
/// evaluators only read.
#[derive(Debug)]
pub struct ModuleInfo {
    /// The module name.
    pub name: Ident,
    /// The module name as text, for error messages.
    pub name_text: String,
    /// Absolute path of the defining file.
    pub path: PathBuf,
    /// The shared source file, for span resolution in error messages.
    pub source: Arc<SourceFile>,
    /// The parsed declaration.
    pub ast: ModuleDecl,
    /// Ports in declaration order.
    pub ports: Vec<Port>,
    /// Final width of every port and declared net. Nets whose width could
    /// not be inferred statically are absent and default to the width of
    /// the first value bound to them.
    pub net_widths: HashMap<Ident, u32>,
    /// Names declared `signed`.
    pub signed_nets: HashSet<Ident>,
    /// Memory arrays by name.
    pub memories: HashMap<Ident, MemoryInfo>,
    /// Whether the module contains any `always_ff` block.
    pub is_sequential: bool,
    /// ROM contents, for `rom_` primitives only.
    pub rom: Option<RomData>,
}

impl ModuleInfo {
    /// The directory containing this module's file; children are resolved
    /// relative to it.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Looks up a port by name.
    pub fn port(&self, name: Ident) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// The input ports in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = &Port> {
        self.ports
            .iter()
            .filter(|p| p.direction == PortDirection::Input)
    }

    /// The output ports in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = &Port> {
        self.ports
            .iter()
            .filter(|p| p.direction == PortDirection::Output)
    }

    /// The statically known width of a port or net.
    pub fn width_of(&self, name: Ident) -> Option<u32> {
        self.net_widths.get(&name).copied()
    }

    /// Whether `name` was declared `signed`.
    pub fn is_signed(&self, name: Ident) -> bool {
        self.signed_nets.contains(&name)
    }

    /// Whether this module is a ROM primitive.
    pub fn is_rom(&self) -> bool {
        self.rom.is_some()
    }

    /// Renders a span inside this module's file as `path:line:col`.
    pub fn locate(&self, span: galena_source::Span) -> String {
        if span.is_none() {
            return self.path.display().to_string();
        }
        let (line, col) = self.source.line_col(span.start);
        format!("{}:{line}:{col}", self.path.display())
    }
}
