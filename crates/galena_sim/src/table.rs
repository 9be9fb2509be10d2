//! Truth-table enumeration for combinational modules.

use crate::comb;
use crate::error::SimError;
use galena_common::Bits;
use galena_resolve::{ModuleCache, ModuleInfo};
use std::collections::HashMap;
use std::fmt::Write as _;

/// An enumerated truth table.
pub struct TruthTable {
    /// Input columns: `(name, width)` in port order.
    pub inputs: Vec<(String, u32)>,
    /// Output columns: `(name, width)` in port order.
    pub outputs: Vec<(String, u32)>,
    /// One row per tested combination: input values then output values,
    /// in column order.
    pub rows: Vec<(Vec<u64>, Vec<u64>)>,
    /// Whether the combination space was cut off at the row limit.
    pub truncated: bool,
}

/// Enumerates a combinational module over its input space.
///
/// Input bits are assigned most-significant-first in port order, so the
/// first input cycles slowest. A module with zero input bits produces a
/// single row. At most `max_rows` combinations are evaluated; designs
/// with more report [`TruthTable::truncated`].
pub fn enumerate(
    cache: &ModuleCache,
    module: &ModuleInfo,
    max_rows: usize,
) -> Result<TruthTable, SimError> {
    let in_ports: Vec<_> = module.inputs().cloned().collect();
    let out_ports: Vec<_> = module.outputs().cloned().collect();
    let total_bits: u32 = in_ports.iter().map(|p| p.width).sum();

    let combinations: u128 = 1u128 << total_bits.min(127);
    let truncated = combinations > max_rows as u128;
    let count = combinations.min(max_rows as u128) as usize;

    let mut rows = Vec::with_capacity(count);
    for i in 0..count {
        let mut inputs = HashMap::new();
        let mut row_in = Vec::with_capacity(in_ports.len());
        let mut offset = 0u32;
        for port in &in_ports {
            let shift = total_bits - offset - port.width;
            let value = ((i as u128) >> shift) as u64;
            let bits = Bits::new(port.width, value);
            row_in.push(bits.value());
            inputs.insert(port.name, bits);
            offset += port.width;
        }

        let outputs = comb::evaluate(cache, module, &inputs)?;
        let row_out = out_ports
            .iter()
            .map(|p| outputs[&p.name].value())
            .collect();
        rows.push((row_in, row_out));
    }

    Ok(TruthTable {
        inputs: in_ports
            .iter()
            .map(|p| (cache.interner().resolve(p.name).to_string(), p.width))
            .collect(),
        outputs: out_ports
            .iter()
            .map(|p| (cache.interner().resolve(p.name).to_string(), p.width))
            .collect(),
        rows,
        truncated,
    })
}

impl TruthTable {
    /// Formats the table with bus-annotated headers and right-aligned
    /// decimal cells.
    pub fn render(&self) -> String {
        let header = |name: &str, width: u32| {
            if width > 1 {
                format!("{name}[{}:0]", width - 1)
            } else {
                name.to_string()
            }
        };
        let in_headers: Vec<String> = self.inputs.iter().map(|(n, w)| header(n, *w)).collect();
        let out_headers: Vec<String> = self.outputs.iter().map(|(n, w)| header(n, *w)).collect();

        let cell = |s: &str| format!("{s:>8}");
        let mut out = String::from("Truth Table:\n");
        let left: Vec<String> = in_headers.iter().map(|h| cell(h)).collect();
        let right: Vec<String> = out_headers.iter().map(|h| cell(h)).collect();
        let header_line = format!("{} | {}", left.join(" "), right.join(" "));
        let _ = writeln!(out, "{header_line}");
        let _ = writeln!(out, "{}", "-".repeat(header_line.len()));

        for (ins, outs) in &self.rows {
            let left: Vec<String> = ins.iter().map(|v| cell(&v.to_string())).collect();
            let right: Vec<String> = outs.iter().map(|v| cell(&v.to_string())).collect();
            let _ = writeln!(out, "{} | {}", left.join(" "), right.join(" "));
        }
        if self.truncated {
            let _ = writeln!(out, "(truncated to {} rows)", self.rows.len());
        }
        out
    }
}
