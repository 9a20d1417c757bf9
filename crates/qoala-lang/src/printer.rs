// =============================================================================
// Qoala Node Runtime - Program Text Printer
// =============================================================================
// Table of Contents:
//   1. Meta Section
//   2. Basic Block Section
//   3. Subroutine Section
//   4. Request Section
//   5. Top-Level Entry Point
// =============================================================================
// Purpose: Renders a `Program` back to the §6 text format. Not part of the
//          external contract; it exists so `Parse(print(program)) = program`
//          (§8) is checkable against real `Program` values instead of
//          hand-written text fixtures only.
// =============================================================================

use crate::netqasm::{GateKind, NetQasmInstr};
use crate::program::*;
use crate::value::Template;
use std::fmt::Write as _;

fn gate_name(gate: GateKind) -> &'static str {
    match gate {
        GateKind::X => "x",
        GateKind::Y => "y",
        GateKind::Z => "z",
        GateKind::H => "h",
        GateKind::S => "s",
        GateKind::RotX => "rot_x",
        GateKind::RotY => "rot_y",
        GateKind::RotZ => "rot_z",
        GateKind::Cnot => "cnot",
        GateKind::Cphase => "cphase",
    }
}

fn print_template_u32(t: &Template<u32>) -> String {
    match t {
        Template::Literal(v) => v.to_string(),
        Template::Placeholder(name) => format!("{{{name}}}"),
    }
}

fn print_template_f64(t: &Template<f64>) -> String {
    match t {
        Template::Literal(v) => v.to_string(),
        Template::Placeholder(name) => format!("{{{name}}}"),
    }
}

fn print_return_var(rv: &ReturnVar) -> String {
    match &rv.size {
        None => rv.name.clone(),
        Some(size) => format!("{}<{}>", rv.name, print_template_u32(size)),
    }
}

// =============================================================================
// 1. Meta Section
// =============================================================================

fn print_meta(program: &Program, out: &mut String) {
    writeln!(out, "META_START").unwrap();
    writeln!(out, "name: {}", program.name).unwrap();
    writeln!(out, "parameters: {}", program.parameters.join(", ")).unwrap();

    let mut csockets: Vec<_> = program.csockets.iter().collect();
    csockets.sort_by_key(|(id, _)| **id);
    let csockets_str = csockets
        .iter()
        .map(|(id, peer)| format!("{id} -> {peer}"))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(out, "csockets: {csockets_str}").unwrap();

    let mut epr_sockets: Vec<_> = program.epr_sockets.iter().collect();
    epr_sockets.sort_by_key(|(id, _)| **id);
    let epr_str = epr_sockets
        .iter()
        .map(|(id, peer)| format!("{id} -> {peer}"))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(out, "epr_sockets: {epr_str}").unwrap();
    writeln!(out, "META_END").unwrap();
}

// =============================================================================
// 2. Basic Block Section
// =============================================================================

fn print_block_type(t: BlockType) -> &'static str {
    match t {
        BlockType::Cl => "CL",
        BlockType::Cc => "CC",
        BlockType::Ql => "QL",
        BlockType::Qc => "QC",
    }
}

fn print_instruction(op: &HostOp, out: &mut String) {
    match op {
        HostOp::AssignConst { dest, value } => {
            writeln!(out, "{dest} = assign_cval({value})").unwrap()
        }
        HostOp::Add { dest, lhs, rhs } => writeln!(out, "{dest} = add({lhs}, {rhs})").unwrap(),
        HostOp::Multiply { dest, lhs, rhs } => {
            writeln!(out, "{dest} = multiply({lhs}, {rhs})").unwrap()
        }
        HostOp::BitCondMultiply { dest, cond, factor } => {
            writeln!(out, "{dest} = bit_cond_mult({cond}, {factor})").unwrap()
        }
        HostOp::BranchEq { lhs, rhs, target } => {
            writeln!(out, "beq({lhs}, {rhs}) : {target}").unwrap()
        }
        HostOp::BranchNeq { lhs, rhs, target } => {
            writeln!(out, "bne({lhs}, {rhs}) : {target}").unwrap()
        }
        HostOp::BranchLt { lhs, rhs, target } => {
            writeln!(out, "blt({lhs}, {rhs}) : {target}").unwrap()
        }
        HostOp::BranchGt { lhs, rhs, target } => {
            writeln!(out, "bgt({lhs}, {rhs}) : {target}").unwrap()
        }
        HostOp::Jump { target } => writeln!(out, "jmp() : {target}").unwrap(),
        HostOp::SendCMsg { csocket, value } => {
            writeln!(out, "send_cmsg({csocket}, {value})").unwrap()
        }
        HostOp::ReceiveCMsg { csocket, dest } => {
            writeln!(out, "{dest} = recv_cmsg({csocket})").unwrap()
        }
        HostOp::RunLocalRoutine {
            routine_name,
            args,
            result_vars,
        } => writeln!(
            out,
            "{} = run_subroutine({}) : {routine_name}",
            result_vars.join(", "),
            args.join(", ")
        )
        .unwrap(),
        HostOp::RunRequestRoutine {
            request_name,
            args,
            result_vars,
        } => writeln!(
            out,
            "{} = run_request({}) : {request_name}",
            result_vars.join(", "),
            args.join(", ")
        )
        .unwrap(),
        HostOp::ReturnResult { var } => writeln!(out, "return_result({var})").unwrap(),
        HostOp::BusyWait { duration_ns } => writeln!(out, "busy_wait({duration_ns})").unwrap(),
    }
}

fn print_block(block: &BasicBlock, out: &mut String) {
    let mut deadlines: Vec<_> = block.deadlines.iter().collect();
    deadlines.sort_by_key(|(name, _)| (*name).clone());
    let header = if deadlines.is_empty() {
        format!("^{}{{type={}}}:", block.name, print_block_type(block.typ))
    } else {
        let list = deadlines
            .iter()
            .map(|(name, ns)| format!("{name}: {ns}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "^{}{{type={}, deadlines=[{list}]}}:",
            block.name,
            print_block_type(block.typ)
        )
    };
    writeln!(out, "{header}").unwrap();
    for instr in &block.instructions {
        print_instruction(instr, out);
    }
}

// =============================================================================
// 3. Subroutine Section
// =============================================================================

fn print_netqasm_instr(instr: &NetQasmInstr, out: &mut String) {
    match instr {
        NetQasmInstr::InitQubit { qubit } => writeln!(out, "init({qubit})").unwrap(),
        NetQasmInstr::ApplyGate {
            gate,
            qubit,
            angle_steps,
        } => match angle_steps {
            Some(steps) => writeln!(out, "{}({qubit}, {steps})", gate_name(*gate)).unwrap(),
            None => writeln!(out, "{}({qubit})", gate_name(*gate)).unwrap(),
        },
        NetQasmInstr::CtrlGate {
            gate,
            control,
            target,
        } => writeln!(out, "{}({control}, {target})", gate_name(*gate)).unwrap(),
        NetQasmInstr::Measure { qubit, into_var } => {
            writeln!(out, "meas({qubit}, {into_var})").unwrap()
        }
    }
}

fn print_subroutine(routine: &LocalRoutine, out: &mut String) {
    writeln!(out, "SUBROUTINE {}", routine.name).unwrap();
    writeln!(out, "params: {}", routine.params.join(", ")).unwrap();
    writeln!(
        out,
        "returns: {}",
        routine
            .return_vars
            .iter()
            .map(print_return_var)
            .collect::<Vec<_>>()
            .join(", ")
    )
    .unwrap();
    writeln!(
        out,
        "uses: {}",
        routine
            .qubit_use
            .used
            .iter()
            .map(|q| q.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
    .unwrap();
    writeln!(
        out,
        "keeps: {}",
        routine
            .qubit_use
            .kept
            .iter()
            .map(|q| q.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
    .unwrap();
    writeln!(out, "request: {}", routine.request_name.clone().unwrap_or_default()).unwrap();
    writeln!(out, "NETQASM_START").unwrap();
    for instr in &routine.subroutine {
        print_netqasm_instr(instr, out);
    }
    writeln!(out, "NETQASM_END").unwrap();
}

// =============================================================================
// 4. Request Section
// =============================================================================

fn print_virt_ids(v: &VirtIdMapping) -> String {
    match v {
        VirtIdMapping::All(k) => format!("all {k}"),
        VirtIdMapping::Increment(k) => format!("increment {k}"),
        VirtIdMapping::Custom(list) => format!(
            "custom [{}]",
            list.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn print_request(routine: &RequestRoutine, out: &mut String) {
    writeln!(out, "REQUEST {}", routine.name).unwrap();
    writeln!(
        out,
        "callback_type: {}",
        match routine.callback_type {
            CallbackType::Sequential => "SEQUENTIAL",
            CallbackType::WaitAll => "WAIT_ALL",
        }
    )
    .unwrap();
    writeln!(out, "callback: {}", routine.callback_routine.clone().unwrap_or_default()).unwrap();
    writeln!(
        out,
        "return_vars: {}",
        routine
            .return_vars
            .iter()
            .map(print_return_var)
            .collect::<Vec<_>>()
            .join(", ")
    )
    .unwrap();
    writeln!(out, "remote_id: {}", print_template_u32(&routine.request.remote_id)).unwrap();
    writeln!(out, "epr_socket_id: {}", routine.request.epr_socket_id).unwrap();
    writeln!(out, "num_pairs: {}", print_template_u32(&routine.request.num_pairs)).unwrap();
    writeln!(out, "virt_ids: {}", print_virt_ids(&routine.request.virt_ids)).unwrap();
    writeln!(out, "timeout: {}", routine.request.timeout).unwrap();
    writeln!(out, "fidelity: {}", print_template_f64(&routine.request.fidelity)).unwrap();
    writeln!(
        out,
        "typ: {}",
        match routine.request.typ {
            RequestType::CreateKeep => "CREATE_KEEP",
            RequestType::MeasureDirectly => "MEASURE_DIRECTLY",
            RequestType::RemoteStatePrep => "REMOTE_STATE_PREP",
        }
    )
    .unwrap();
    writeln!(
        out,
        "role: {}",
        match routine.request.role {
            Role::Create => "CREATE",
            Role::Receive => "RECEIVE",
        }
    )
    .unwrap();
}

// =============================================================================
// 5. Top-Level Entry Point
// =============================================================================

impl Program {
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        print_meta(self, &mut out);
        out.push('\n');

        for block in &self.blocks {
            print_block(block, &mut out);
            out.push('\n');
        }

        let mut routines: Vec<_> = self.local_routines.values().collect();
        routines.sort_by_key(|r| r.name.clone());
        for routine in routines {
            print_subroutine(routine, &mut out);
            out.push('\n');
        }

        let mut requests: Vec<_> = self.request_routines.values().collect();
        requests.sort_by_key(|r| r.name.clone());
        for routine in requests {
            print_request(routine, &mut out);
            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;
    use std::collections::HashMap;

    fn sample_program() -> Program {
        let mut local_routines = HashMap::new();
        local_routines.insert(
            "sub1".to_string(),
            LocalRoutine {
                name: "sub1".to_string(),
                params: vec![],
                subroutine: vec![
                    NetQasmInstr::InitQubit { qubit: 0 },
                    NetQasmInstr::ApplyGate {
                        gate: GateKind::H,
                        qubit: 0,
                        angle_steps: None,
                    },
                    NetQasmInstr::Measure { qubit: 0, into_var: 0 },
                ],
                return_vars: vec![ReturnVar {
                    name: "m".to_string(),
                    size: None,
                }],
                qubit_use: QubitUse {
                    used: vec![0],
                    kept: vec![],
                },
                request_name: None,
            },
        );

        let mut csockets = HashMap::new();
        csockets.insert(0, "bob".to_string());

        Program {
            name: "roundtrip".to_string(),
            parameters: vec!["n".to_string()],
            csockets,
            epr_sockets: HashMap::new(),
            blocks: vec![BasicBlock {
                name: "b1".to_string(),
                typ: BlockType::Cl,
                instructions: vec![
                    HostOp::AssignConst {
                        dest: "x".to_string(),
                        value: 5,
                    },
                    HostOp::SendCMsg {
                        csocket: 0,
                        value: "x".to_string(),
                    },
                ],
                deadlines: HashMap::new(),
            }],
            local_routines,
            request_routines: HashMap::new(),
        }
    }

    #[test]
    fn test_roundtrip_parse_print() {
        let program = sample_program();
        let text = program.to_text();
        let reparsed = parse_program(&text).expect("reparse should succeed");
        assert_eq!(reparsed, program);
    }
}
