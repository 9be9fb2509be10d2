//! End-to-end scenarios on real on-disk module trees: primitive gates up
//! to a small CPU.

use galena_common::Bits;
use galena_resolve::ModuleCache;
use galena_sim::sequence::{run_sequence, SequenceStep};
use galena_sim::{comb, table, SeqSim};
use std::collections::HashMap;
use std::path::Path;

fn write(dir: &Path, name: &str, text: &str) {
    std::fs::write(dir.join(name), text).unwrap();
}

fn step(inputs: &[(&str, u64)], expected: &[(&str, u64)]) -> SequenceStep {
    SequenceStep {
        inputs: inputs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        expected: expected.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

const NAND: &str = "module nand_gate(input inA, input inB, output outY);
    assign outY = ~(inA & inB);
endmodule
";

/// Gate-level library: AND, OR, XOR built from nand_gate leaves.
fn write_gate_library(dir: &Path) {
    write(dir, "nand_gate.sv", NAND);
    write(
        dir,
        "and_gate.sv",
        "module and_gate(input a, input b, output y);
            nand_gate n1 (.inA(a), .inB(b), .outY(t));
            nand_gate n2 (.inA(t), .inB(t), .outY(y));
        endmodule",
    );
    write(
        dir,
        "or_gate.sv",
        "module or_gate(input a, input b, output y);
            nand_gate n1 (.inA(a), .inB(a), .outY(na));
            nand_gate n2 (.inA(b), .inB(b), .outY(nb));
            nand_gate n3 (.inA(na), .inB(nb), .outY(y));
        endmodule",
    );
    write(
        dir,
        "xor_gate.sv",
        "module xor_gate(input a, input b, output y);
            nand_gate n1 (.inA(a), .inB(b), .outY(t1));
            nand_gate n2 (.inA(a), .inB(t1), .outY(t2));
            nand_gate n3 (.inA(t1), .inB(b), .outY(t3));
            nand_gate n4 (.inA(t2), .inB(t3), .outY(y));
        endmodule",
    );
    write(
        dir,
        "half_adder.sv",
        "module half_adder(input a, input b, output sum, output carry);
            xor_gate x1 (.a(a), .b(b), .y(sum));
            and_gate a1 (.a(a), .b(b), .y(carry));
        endmodule",
    );
    write(
        dir,
        "full_adder.sv",
        "module full_adder(input A, input B, input Cin,
                           output Sum, output Cout);
            half_adder ha1 (.a(A), .b(B), .sum(s1), .carry(c1));
            half_adder ha2 (.a(s1), .b(Cin), .sum(Sum), .carry(c2));
            or_gate o1 (.a(c1), .b(c2), .y(Cout));
        endmodule",
    );
}

// ----------------------------------------------------------------------
// Scenario 1: NAND
// ----------------------------------------------------------------------

#[test]
fn nand_gate_truth_table_and_cost() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "nand_gate.sv", NAND);
    let cache = ModuleCache::new();
    let module = cache.resolve("nand_gate", dir.path()).unwrap();

    let table = table::enumerate(&cache, &module, 256).unwrap();
    let rows: Vec<(Vec<u64>, Vec<u64>)> = table.rows.clone();
    assert_eq!(
        rows,
        vec![
            (vec![0, 0], vec![1]),
            (vec![0, 1], vec![1]),
            (vec![1, 0], vec![1]),
            (vec![1, 1], vec![0]),
        ]
    );
    assert_eq!(cache.gate_cost(&module).unwrap(), 1);
}

// ----------------------------------------------------------------------
// Scenario 2: full adder from two half adders
// ----------------------------------------------------------------------

#[test]
fn full_adder_from_half_adders() {
    let dir = tempfile::tempdir().unwrap();
    write_gate_library(dir.path());
    let cache = ModuleCache::new();
    let fa = cache.resolve("full_adder", dir.path()).unwrap();

    let mut inputs = HashMap::new();
    for (name, v) in [("A", 1u64), ("B", 1), ("Cin", 1)] {
        inputs.insert(cache.interner().intern(name), Bits::new(1, v));
    }
    let outputs = comb::evaluate(&cache, &fa, &inputs).unwrap();
    assert_eq!(outputs[&cache.interner().intern("Sum")].value(), 1);
    assert_eq!(outputs[&cache.interner().intern("Cout")].value(), 1);

    // Cost is the sum over children: two half adders plus the carry OR.
    let ha = cache.resolve("half_adder", dir.path()).unwrap();
    let or = cache.resolve("or_gate", dir.path()).unwrap();
    let ha_cost = cache.gate_cost(&ha).unwrap();
    let or_cost = cache.gate_cost(&or).unwrap();
    assert_eq!(ha_cost, 6); // 4-NAND XOR + 2-NAND AND
    assert_eq!(
        cache.gate_cost(&fa).unwrap(),
        2 * ha_cost + or_cost
    );
}

#[test]
fn full_adder_exhaustive_against_arithmetic() {
    let dir = tempfile::tempdir().unwrap();
    write_gate_library(dir.path());
    let cache = ModuleCache::new();
    let fa = cache.resolve("full_adder", dir.path()).unwrap();

    for a in 0..2u64 {
        for b in 0..2u64 {
            for cin in 0..2u64 {
                let mut inputs = HashMap::new();
                inputs.insert(cache.interner().intern("A"), Bits::new(1, a));
                inputs.insert(cache.interner().intern("B"), Bits::new(1, b));
                inputs.insert(cache.interner().intern("Cin"), Bits::new(1, cin));
                let outputs = comb::evaluate(&cache, &fa, &inputs).unwrap();
                let total = a + b + cin;
                assert_eq!(
                    outputs[&cache.interner().intern("Sum")].value(),
                    total & 1,
                    "sum({a},{b},{cin})"
                );
                assert_eq!(
                    outputs[&cache.interner().intern("Cout")].value(),
                    total >> 1,
                    "carry({a},{b},{cin})"
                );
            }
        }
    }
}

// ----------------------------------------------------------------------
// Scenario 3: 4-bit ripple-carry adder
// ----------------------------------------------------------------------

fn write_ripple_adder(dir: &Path) {
    write_gate_library(dir);
    write(
        dir,
        "adder4.sv",
        "module adder4(input [3:0] A, input [3:0] B, input Cin,
                       output [3:0] Sum, output Cout);
            full_adder fa0 (.A(A[0]), .B(B[0]), .Cin(Cin),  .Sum(Sum[0]), .Cout(c0));
            full_adder fa1 (.A(A[1]), .B(B[1]), .Cin(c0),   .Sum(Sum[1]), .Cout(c1));
            full_adder fa2 (.A(A[2]), .B(B[2]), .Cin(c1),   .Sum(Sum[2]), .Cout(c2));
            full_adder fa3 (.A(A[3]), .B(B[3]), .Cin(c2),   .Sum(Sum[3]), .Cout(Cout));
        endmodule",
    );
}

#[test]
fn ripple_carry_adder_wraps_at_four_bits() {
    let dir = tempfile::tempdir().unwrap();
    write_ripple_adder(dir.path());
    let cache = ModuleCache::new();
    let adder = cache.resolve("adder4", dir.path()).unwrap();

    let mut inputs = HashMap::new();
    inputs.insert(cache.interner().intern("A"), Bits::new(4, 15));
    inputs.insert(cache.interner().intern("B"), Bits::new(4, 1));
    inputs.insert(cache.interner().intern("Cin"), Bits::new(1, 0));
    let outputs = comb::evaluate(&cache, &adder, &inputs).unwrap();
    assert_eq!(outputs[&cache.interner().intern("Sum")].value(), 0);
    assert_eq!(outputs[&cache.interner().intern("Cout")].value(), 1);

    let fa = cache.resolve("full_adder", dir.path()).unwrap();
    assert_eq!(
        cache.gate_cost(&adder).unwrap(),
        4 * cache.gate_cost(&fa).unwrap()
    );
}

#[test]
fn ripple_carry_adder_random_spot_checks() {
    let dir = tempfile::tempdir().unwrap();
    write_ripple_adder(dir.path());
    let cache = ModuleCache::new();
    let adder = cache.resolve("adder4", dir.path()).unwrap();

    for (a, b, cin) in [(3u64, 5u64, 0u64), (7, 8, 1), (9, 9, 0), (15, 15, 1)] {
        let mut inputs = HashMap::new();
        inputs.insert(cache.interner().intern("A"), Bits::new(4, a));
        inputs.insert(cache.interner().intern("B"), Bits::new(4, b));
        inputs.insert(cache.interner().intern("Cin"), Bits::new(1, cin));
        let outputs = comb::evaluate(&cache, &adder, &inputs).unwrap();
        let total = a + b + cin;
        assert_eq!(
            outputs[&cache.interner().intern("Sum")].value(),
            total & 0xF,
            "{a}+{b}+{cin}"
        );
        assert_eq!(
            outputs[&cache.interner().intern("Cout")].value(),
            total >> 4,
            "{a}+{b}+{cin}"
        );
    }
}

// ----------------------------------------------------------------------
// Scenario 4: 8-bit counter with reset, enable, hold
// ----------------------------------------------------------------------

#[test]
fn counter_sequence() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "counter.sv",
        "module counter(input clk, input reset, input enable,
                        output logic [7:0] count);
            always_ff @(posedge clk) begin
                if (reset)
                    count <= 8'd0;
                else if (enable)
                    count <= count + 8'd1;
            end
        endmodule",
    );
    let cache = ModuleCache::new();
    let top = cache.resolve("counter", dir.path()).unwrap();

    let steps = vec![
        step(&[("clk", 1), ("reset", 1)], &[("count", 0)]),
        step(&[("clk", 1), ("reset", 0), ("enable", 1)], &[("count", 1)]),
        step(&[("clk", 1), ("enable", 1)], &[("count", 2)]),
        step(&[("clk", 1), ("enable", 1)], &[("count", 3)]),
        step(&[("clk", 1), ("enable", 1)], &[("count", 4)]),
        step(&[("clk", 1), ("enable", 0)], &[("count", 4)]),
    ];
    let result = run_sequence(&cache, top, "counter", &steps, &[]).unwrap();
    assert!(result.passed(), "mismatches: {:?}", result.mismatches);
}

// ----------------------------------------------------------------------
// Scenario 5: ROM primitive
// ----------------------------------------------------------------------

#[test]
fn rom_primitive_enumerates_its_data() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "rom_deadbeef.sv",
        "module rom_deadbeef(input [1:0] addr, output [7:0] data); endmodule",
    );
    write(
        dir.path(),
        "deadbeef.txt",
        "11011110\n10101101\n10111110\n11101111\n",
    );
    let cache = ModuleCache::new();
    let rom = cache.resolve("rom_deadbeef", dir.path()).unwrap();
    assert!(rom.is_rom());

    let table = table::enumerate(&cache, &rom, 256).unwrap();
    let data: Vec<u64> = table.rows.iter().map(|(_, outs)| outs[0]).collect();
    assert_eq!(data, vec![222, 173, 190, 239]);

    // A bare lookup table costs no gates.
    assert_eq!(cache.gate_cost(&rom).unwrap(), 0);
}

// ----------------------------------------------------------------------
// Scenario 6: small CPU
// ----------------------------------------------------------------------

/// Three-instruction program: LDI R0, 42; MOV R1, R0; ADD R3, R1, R2.
///
/// Instruction format, 16 bits: opcode [15:12], rd [11:9], rs [8:6],
/// rt [5:3]; LDI reads its immediate from [7:0].
fn write_cpu(dir: &Path) {
    write(
        dir,
        "pc_unit.sv",
        "module pc_unit(input clk, input reset, input [2:0] next_pc,
                        output logic [2:0] pc);
            always_ff @(posedge clk) begin
                if (reset)
                    pc <= 3'd0;
                else
                    pc <= next_pc;
            end
        endmodule",
    );
    write(
        dir,
        "decoder.sv",
        "module decoder(input [15:0] instr,
                        output [3:0] opcode, output [2:0] rd,
                        output [2:0] rs, output [2:0] rt,
                        output [7:0] imm);
            assign opcode = instr[15:12];
            assign rd = instr[11:9];
            assign rs = instr[8:6];
            assign rt = instr[5:3];
            assign imm = instr[7:0];
        endmodule",
    );
    write(
        dir,
        "alu.sv",
        "module alu(input [7:0] a, input [7:0] b, input [3:0] op,
                    output [7:0] result);
            assign result = (op == 4'd3) ? a + b : a;
        endmodule",
    );
    write(
        dir,
        "rom_prog.sv",
        "module rom_prog(input [1:0] addr, output [15:0] data); endmodule",
    );
    // 0x102A = LDI R0, 42; 0x2200 = MOV R1, R0; 0x3650 = ADD R3, R1, R2
    write(
        dir,
        "prog.txt",
        "0001000000101010\n0010001000000000\n0011011001010000\n",
    );
    write(
        dir,
        "cpu.sv",
        "module cpu(input clk, input reset, input [7:0] in_port,
                    output [7:0] r3);
            reg [7:0] regs [5:0];

            pc_unit pc0 (.clk(clk), .reset(reset), .next_pc(next_pc), .pc(pc));
            rom_prog prog0 (.addr(pc[1:0]), .data(instr));
            decoder dec0 (.instr(instr), .opcode(opcode), .rd(rd),
                          .rs(rs), .rt(rt), .imm(imm));
            alu alu0 (.a(regs[rs]), .b(regs[rt]), .op(opcode),
                      .result(alu_out));

            assign next_pc = pc + 3'd1;
            assign r3 = regs[3'd3];

            always_ff @(posedge clk) begin
                if (reset) begin
                end else begin
                    case (opcode)
                        4'd1: regs[rd] <= imm;
                        4'd2: regs[rd] <= regs[rs];
                        4'd3: regs[rd] <= alu_out;
                        default: ;
                    endcase
                end
            end
        endmodule",
    );
}

#[test]
fn cpu_executes_three_instructions() {
    let dir = tempfile::tempdir().unwrap();
    write_cpu(dir.path());
    let cache = ModuleCache::new();
    let top = cache.resolve("cpu", dir.path()).unwrap();
    let mut sim = SeqSim::new(&cache, top);

    let tick = |sim: &mut SeqSim, reset: u64| {
        let mut inputs = HashMap::new();
        inputs.insert(cache.interner().intern("clk"), Bits::bit(true));
        inputs.insert(cache.interner().intern("reset"), Bits::new(1, reset));
        inputs.insert(cache.interner().intern("in_port"), Bits::new(8, 0));
        sim.tick(&inputs).unwrap()
    };

    // Reset, then three instruction cycles.
    tick(&mut sim, 1);
    tick(&mut sim, 0); // LDI R0, 42
    tick(&mut sim, 0); // MOV R1, R0
    let outs = tick(&mut sim, 0); // ADD R3, R1 + R2

    assert_eq!(outs[&cache.interner().intern("r3")].value(), 42);
}

#[test]
fn cpu_sequence_facade_checks_r3() {
    let dir = tempfile::tempdir().unwrap();
    write_cpu(dir.path());
    let cache = ModuleCache::new();
    let top = cache.resolve("cpu", dir.path()).unwrap();

    let steps = vec![
        step(&[("clk", 1), ("reset", 1), ("in_port", 0)], &[("r3", 0)]),
        step(&[("clk", 1), ("in_port", 0)], &[("r3", 0)]),
        step(&[("clk", 1), ("in_port", 0)], &[("r3", 0)]),
        step(&[("clk", 1), ("in_port", 0)], &[("r3", 42)]),
    ];
    let result = run_sequence(&cache, top, "ldi-mov-add", &steps, &[]).unwrap();
    assert!(result.passed(), "mismatches: {:?}", result.mismatches);
}

// ----------------------------------------------------------------------
// Cross-cutting properties
// ----------------------------------------------------------------------

#[test]
fn nand_leaf_count_matches_instantiation_tree() {
    // For a design made only of nand_gate leaves, the reported cost is
    // exactly the number of leaves in the expanded tree.
    let dir = tempfile::tempdir().unwrap();
    write_ripple_adder(dir.path());
    let cache = ModuleCache::new();
    let adder = cache.resolve("adder4", dir.path()).unwrap();

    // adder4 = 4 full adders; full adder = 2 half adders (6 each) + or (3).
    assert_eq!(cache.gate_cost(&adder).unwrap(), 4 * (2 * 6 + 3));
    assert!(cache.take_cost_cycle_reports().is_empty());
}

#[test]
fn cache_clear_is_visible_to_drivers() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "nand_gate.sv", NAND);
    let cache = ModuleCache::new();
    let before = cache.resolve("nand_gate", dir.path()).unwrap();

    // Edit the module on disk: outY becomes AND instead of NAND.
    write(
        dir.path(),
        "nand_gate.sv",
        "module nand_gate(input inA, input inB, output outY);
            assign outY = inA & inB;
        endmodule",
    );
    let cached = cache.resolve("nand_gate", dir.path()).unwrap();
    assert!(std::sync::Arc::ptr_eq(&before, &cached));

    cache.clear();
    let reloaded = cache.resolve("nand_gate", dir.path()).unwrap();
    assert!(!std::sync::Arc::ptr_eq(&before, &reloaded));

    let mut inputs = HashMap::new();
    inputs.insert(cache.interner().intern("inA"), Bits::bit(true));
    inputs.insert(cache.interner().intern("inB"), Bits::bit(true));
    let outputs = comb::evaluate(&cache, &reloaded, &inputs).unwrap();
    assert_eq!(outputs[&cache.interner().intern("outY")].value(), 1);
}
