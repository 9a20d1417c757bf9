// =============================================================================
// Qoala Node Runtime - Program Text Parser
// =============================================================================
// Table of Contents:
//   1. Line Cursor Helpers
//   2. Meta Section
//   3. Basic Block Section
//   4. Host Instruction Line
//   5. Subroutine Section
//   6. Request Section
//   7. Top-Level Entry Point
// =============================================================================
// Purpose: Parses the four order-sensitive sections of the program text
//          format (§6) into a `Program`. Comments are not supported; blank
//          lines are ignored between sections. Every failure surfaces as a
//          `ParseError{line, message}` carrying the 1-indexed source line.
// =============================================================================

use crate::error::ParseError;
use crate::netqasm::{GateKind, NetQasmInstr};
use crate::program::*;
use crate::value::Template;
use std::collections::HashMap;

// =============================================================================
// 1. Line Cursor Helpers
// =============================================================================

struct Line<'a> {
    no: usize,
    text: &'a str,
}

struct Cursor<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        let lines = src
            .lines()
            .enumerate()
            .map(|(i, text)| Line { no: i + 1, text })
            .collect();
        Cursor { lines, pos: 0 }
    }

    fn skip_blank(&mut self) {
        while let Some(l) = self.lines.get(self.pos) {
            if l.text.trim().is_empty() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn next(&mut self) -> Option<&Line<'a>> {
        self.skip_blank();
        let l = self.lines.get(self.pos);
        if l.is_some() {
            self.pos += 1;
        }
        l
    }

    fn peek_nonblank(&mut self) -> Option<&Line<'a>> {
        self.skip_blank();
        self.lines.get(self.pos)
    }

    fn err(&self, line_no: usize, msg: impl Into<String>) -> ParseError {
        ParseError::new(line_no, msg)
    }
}

fn split_ident_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_template_u32(s: &str) -> Result<Template<u32>, String> {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        Ok(Template::Placeholder(inner.trim().to_string()))
    } else {
        s.parse::<u32>()
            .map(Template::Literal)
            .map_err(|e| format!("expected integer or {{template}}, got '{s}': {e}"))
    }
}

fn parse_template_f64(s: &str) -> Result<Template<f64>, String> {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        Ok(Template::Placeholder(inner.trim().to_string()))
    } else {
        s.parse::<f64>()
            .map(Template::Literal)
            .map_err(|e| format!("expected float or {{template}}, got '{s}': {e}"))
    }
}

// =============================================================================
// 2. Meta Section
// =============================================================================

struct Meta {
    name: String,
    parameters: Vec<String>,
    csockets: HashMap<u32, String>,
    epr_sockets: HashMap<u32, String>,
}

fn parse_socket_map(value: &str) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if let Some((id, peer)) = entry.split_once("->") {
            if let Ok(id) = id.trim().parse::<u32>() {
                map.insert(id, peer.trim().to_string());
            }
        }
    }
    map
}

fn parse_meta(cur: &mut Cursor) -> Result<Meta, ParseError> {
    let start = cur
        .next()
        .ok_or_else(|| cur.err(1, "expected META_START"))?;
    if start.text.trim() != "META_START" {
        return Err(cur.err(start.no, "expected META_START"));
    }

    let mut name = None;
    let mut parameters = Vec::new();
    let mut csockets = HashMap::new();
    let mut epr_sockets = HashMap::new();

    loop {
        let line = cur
            .next()
            .ok_or_else(|| cur.err(start.no, "unterminated META section"))?;
        let trimmed = line.text.trim();
        if trimmed == "META_END" {
            break;
        }
        let (key, value) = trimmed
            .split_once(':')
            .ok_or_else(|| cur.err(line.no, format!("expected 'key: value', got '{trimmed}'")))?;
        match key.trim() {
            "name" => name = Some(value.trim().to_string()),
            "parameters" => parameters = split_ident_list(value),
            "csockets" => csockets = parse_socket_map(value),
            "epr_sockets" => epr_sockets = parse_socket_map(value),
            other => return Err(cur.err(line.no, format!("unknown meta key '{other}'"))),
        }
    }

    Ok(Meta {
        name: name.ok_or_else(|| cur.err(start.no, "meta section missing 'name'"))?,
        parameters,
        csockets,
        epr_sockets,
    })
}

// =============================================================================
// 3. Basic Block Section
// =============================================================================

fn parse_block_type(s: &str, line_no: usize) -> Result<BlockType, ParseError> {
    match s {
        "CL" => Ok(BlockType::Cl),
        "CC" => Ok(BlockType::Cc),
        "QL" => Ok(BlockType::Ql),
        "QC" => Ok(BlockType::Qc),
        other => Err(ParseError::new(line_no, format!("unknown block type '{other}'"))),
    }
}

/// Parses `^name{type=QL, deadlines=[b1: 100, b2: 200]}:` into its parts.
fn parse_block_header(
    text: &str,
    line_no: usize,
) -> Result<(String, BlockType, HashMap<String, u64>), ParseError> {
    let text = text.trim();
    let rest = text
        .strip_prefix('^')
        .ok_or_else(|| ParseError::new(line_no, "block header must start with '^'"))?;
    let rest = rest
        .strip_suffix(':')
        .ok_or_else(|| ParseError::new(line_no, "block header must end with ':'"))?;
    let brace_open = rest
        .find('{')
        .ok_or_else(|| ParseError::new(line_no, "block header missing '{...}'"))?;
    let brace_close = rest
        .rfind('}')
        .ok_or_else(|| ParseError::new(line_no, "block header missing closing '}'"))?;
    let name = rest[..brace_open].trim().to_string();
    if name.is_empty() {
        return Err(ParseError::new(line_no, "block name must not be empty"));
    }
    let attrs = &rest[brace_open + 1..brace_close];

    let mut typ = None;
    let mut deadlines = HashMap::new();

    for attr in split_top_level(attrs, ',') {
        let attr = attr.trim();
        let (key, value) = attr
            .split_once('=')
            .ok_or_else(|| ParseError::new(line_no, format!("malformed block attribute '{attr}'")))?;
        match key.trim() {
            "type" => typ = Some(parse_block_type(value.trim(), line_no)?),
            "deadlines" => {
                let value = value.trim();
                let inner = value
                    .strip_prefix('[')
                    .and_then(|v| v.strip_suffix(']'))
                    .ok_or_else(|| ParseError::new(line_no, "deadlines must be '[...]'"))?;
                for entry in split_top_level(inner, ',') {
                    let entry = entry.trim();
                    if entry.is_empty() {
                        continue;
                    }
                    let (succ, ns) = entry
                        .split_once(':')
                        .ok_or_else(|| ParseError::new(line_no, format!("malformed deadline entry '{entry}'")))?;
                    let ns: u64 = ns
                        .trim()
                        .parse()
                        .map_err(|_| ParseError::new(line_no, format!("bad deadline ns in '{entry}'")))?;
                    deadlines.insert(succ.trim().to_string(), ns);
                }
            }
            other => return Err(ParseError::new(line_no, format!("unknown block attribute '{other}'"))),
        }
    }

    let typ = typ.ok_or_else(|| ParseError::new(line_no, "block header missing 'type'"))?;
    Ok((name, typ, deadlines))
}

/// Splits `s` on `sep` but not inside `[...]` nesting, so `deadlines=[a: 1, b: 2]`
/// survives a top-level attribute split.
fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth -= 1;
                current.push(c);
            }
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current);
    }
    parts
}

// =============================================================================
// 4. Host Instruction Line
// =============================================================================

/// `[dest_list =] opname(args) [: attr]`
fn parse_instruction(text: &str, line_no: usize) -> Result<HostOp, ParseError> {
    let text = text.trim();
    let (dest_part, rest) = match text.split_once('=') {
        Some((d, r)) if !d.trim().is_empty() && r.contains('(') => (Some(d.trim()), r.trim()),
        _ => (None, text),
    };

    let (call, attr) = match rest.split_once(':') {
        Some((c, a)) => (c.trim(), Some(a.trim().to_string())),
        None => (rest, None),
    };

    let open = call
        .find('(')
        .ok_or_else(|| ParseError::new(line_no, format!("expected '(' in '{call}'")))?;
    let close = call
        .rfind(')')
        .ok_or_else(|| ParseError::new(line_no, format!("expected ')' in '{call}'")))?;
    let op_name = call[..open].trim();
    let args_str = &call[open + 1..close];
    let args = split_ident_list(args_str);

    let dests: Vec<String> = dest_part.map(split_ident_list).unwrap_or_default();
    let one_dest = || -> Result<String, ParseError> {
        dests
            .first()
            .cloned()
            .ok_or_else(|| ParseError::new(line_no, format!("'{op_name}' requires a destination variable")))
    };
    let arg_at = |i: usize| -> Result<&str, ParseError> {
        args.get(i)
            .map(|s| s.as_str())
            .ok_or_else(|| ParseError::new(line_no, format!("'{op_name}' missing argument {i}")))
    };
    let attr_req = |purpose: &str| -> Result<String, ParseError> {
        attr.clone()
            .ok_or_else(|| ParseError::new(line_no, format!("'{op_name}' requires a ': {purpose}' attribute")))
    };

    match op_name {
        "assign_cval" => Ok(HostOp::AssignConst {
            dest: one_dest()?,
            value: arg_at(0)?
                .parse()
                .map_err(|_| ParseError::new(line_no, "assign_cval value must be an integer"))?,
        }),
        "add" => Ok(HostOp::Add {
            dest: one_dest()?,
            lhs: arg_at(0)?.to_string(),
            rhs: arg_at(1)?.to_string(),
        }),
        "multiply" => Ok(HostOp::Multiply {
            dest: one_dest()?,
            lhs: arg_at(0)?.to_string(),
            rhs: arg_at(1)?.to_string(),
        }),
        "bit_cond_mult" => Ok(HostOp::BitCondMultiply {
            dest: one_dest()?,
            cond: arg_at(0)?.to_string(),
            factor: arg_at(1)?.to_string(),
        }),
        "beq" => Ok(HostOp::BranchEq {
            lhs: arg_at(0)?.to_string(),
            rhs: arg_at(1)?.to_string(),
            target: attr_req("target block")?,
        }),
        "bne" => Ok(HostOp::BranchNeq {
            lhs: arg_at(0)?.to_string(),
            rhs: arg_at(1)?.to_string(),
            target: attr_req("target block")?,
        }),
        "blt" => Ok(HostOp::BranchLt {
            lhs: arg_at(0)?.to_string(),
            rhs: arg_at(1)?.to_string(),
            target: attr_req("target block")?,
        }),
        "bgt" => Ok(HostOp::BranchGt {
            lhs: arg_at(0)?.to_string(),
            rhs: arg_at(1)?.to_string(),
            target: attr_req("target block")?,
        }),
        "jmp" => Ok(HostOp::Jump {
            target: attr_req("target block")?,
        }),
        "send_cmsg" => Ok(HostOp::SendCMsg {
            csocket: arg_at(0)?
                .parse()
                .map_err(|_| ParseError::new(line_no, "send_cmsg csocket id must be an integer"))?,
            value: arg_at(1)?.to_string(),
        }),
        "recv_cmsg" => Ok(HostOp::ReceiveCMsg {
            csocket: arg_at(0)?
                .parse()
                .map_err(|_| ParseError::new(line_no, "recv_cmsg csocket id must be an integer"))?,
            dest: one_dest()?,
        }),
        "run_subroutine" => Ok(HostOp::RunLocalRoutine {
            routine_name: attr_req("routine name")?,
            args,
            result_vars: dests,
        }),
        "run_request" => Ok(HostOp::RunRequestRoutine {
            request_name: attr_req("request name")?,
            args,
            result_vars: dests,
        }),
        "return_result" => Ok(HostOp::ReturnResult {
            var: arg_at(0)?.to_string(),
        }),
        "busy_wait" => Ok(HostOp::BusyWait {
            duration_ns: arg_at(0)?
                .parse()
                .map_err(|_| ParseError::new(line_no, "busy_wait duration must be an integer"))?,
        }),
        other => Err(ParseError::new(line_no, format!("unknown host operation '{other}'"))),
    }
}

fn is_section_start(text: &str) -> bool {
    let t = text.trim_start();
    t.starts_with('^') || t.starts_with("SUBROUTINE") || t.starts_with("REQUEST") || t == "META_START"
}

fn parse_block(cur: &mut Cursor) -> Result<BasicBlock, ParseError> {
    let header = cur.next().expect("caller checked peek");
    let (name, typ, deadlines) = parse_block_header(header.text, header.no)?;

    let mut instructions = Vec::new();
    while let Some(line) = cur.peek_nonblank() {
        if is_section_start(line.text) {
            break;
        }
        let line = cur.next().unwrap();
        instructions.push(parse_instruction(line.text, line.no)?);
    }

    let block = BasicBlock {
        name,
        typ,
        instructions,
        deadlines,
    };
    block
        .check_invariants()
        .map_err(|msg| ParseError::new(header.no, msg))?;
    Ok(block)
}

// =============================================================================
// 5. Subroutine Section
// =============================================================================

fn parse_return_var(spec: &str) -> ReturnVar {
    let spec = spec.trim();
    if let Some(open) = spec.find('<') {
        let name = spec[..open].trim().to_string();
        let size_spec = spec[open + 1..].trim_end_matches('>').trim();
        let size = if let Some(inner) = size_spec.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Template::Placeholder(inner.trim().to_string())
        } else {
            Template::Literal(size_spec.parse().unwrap_or(1))
        };
        ReturnVar { name, size: Some(size) }
    } else {
        ReturnVar {
            name: spec.to_string(),
            size: None,
        }
    }
}

fn parse_netqasm_instr(text: &str, line_no: usize) -> Result<NetQasmInstr, ParseError> {
    let text = text.trim();
    let open = text
        .find('(')
        .ok_or_else(|| ParseError::new(line_no, format!("expected '(' in netqasm instruction '{text}'")))?;
    let close = text
        .rfind(')')
        .ok_or_else(|| ParseError::new(line_no, format!("expected ')' in netqasm instruction '{text}'")))?;
    let name = text[..open].trim();
    let args = split_ident_list(&text[open + 1..close]);

    let parse_u32 = |s: &str| -> Result<u32, ParseError> {
        s.parse().map_err(|_| ParseError::new(line_no, format!("expected integer, got '{s}'")))
    };
    let gate = |s: &str| -> Result<GateKind, ParseError> {
        match s {
            "x" => Ok(GateKind::X),
            "y" => Ok(GateKind::Y),
            "z" => Ok(GateKind::Z),
            "h" => Ok(GateKind::H),
            "s" => Ok(GateKind::S),
            "rot_x" => Ok(GateKind::RotX),
            "rot_y" => Ok(GateKind::RotY),
            "rot_z" => Ok(GateKind::RotZ),
            "cnot" => Ok(GateKind::Cnot),
            "cphase" => Ok(GateKind::Cphase),
            other => Err(ParseError::new(line_no, format!("unknown gate '{other}'"))),
        }
    };

    match name {
        "init" => Ok(NetQasmInstr::InitQubit {
            qubit: parse_u32(args.first().map(|s| s.as_str()).unwrap_or(""))?,
        }),
        "meas" => Ok(NetQasmInstr::Measure {
            qubit: parse_u32(args.first().map(|s| s.as_str()).unwrap_or(""))?,
            into_var: args
                .get(1)
                .map(|s| s.parse())
                .transpose()
                .map_err(|_| ParseError::new(line_no, "meas result index must be an integer"))?
                .unwrap_or(0),
        }),
        gate_name if matches!(gate_name, "rot_x" | "rot_y" | "rot_z") && args.len() == 2 => {
            Ok(NetQasmInstr::ApplyGate {
                gate: gate(gate_name)?,
                qubit: parse_u32(&args[0])?,
                angle_steps: Some(
                    args[1]
                        .parse()
                        .map_err(|_| ParseError::new(line_no, "angle_steps must be an integer"))?,
                ),
            })
        }
        gate_name if args.len() == 2 => Ok(NetQasmInstr::CtrlGate {
            gate: gate(gate_name)?,
            control: parse_u32(&args[0])?,
            target: parse_u32(&args[1])?,
        }),
        gate_name if args.len() == 1 => Ok(NetQasmInstr::ApplyGate {
            gate: gate(gate_name)?,
            qubit: parse_u32(&args[0])?,
            angle_steps: None,
        }),
        other => Err(ParseError::new(line_no, format!("unrecognized netqasm instruction '{other}'"))),
    }
}

fn parse_int_list(value: &str) -> Vec<u32> {
    value
        .split(',')
        .filter_map(|p| p.trim().parse().ok())
        .collect()
}

fn parse_subroutine(cur: &mut Cursor) -> Result<LocalRoutine, ParseError> {
    let header = cur.next().expect("caller checked peek");
    let name = header
        .text
        .trim()
        .strip_prefix("SUBROUTINE")
        .map(|s| s.trim().to_string())
        .ok_or_else(|| cur.err(header.no, "expected SUBROUTINE header"))?;

    let mut params = Vec::new();
    let mut return_vars = Vec::new();
    let mut uses = Vec::new();
    let mut keeps = Vec::new();
    let mut request_name = None;

    loop {
        let line = cur
            .next()
            .ok_or_else(|| cur.err(header.no, "unterminated SUBROUTINE section"))?;
        let trimmed = line.text.trim();
        if trimmed == "NETQASM_START" {
            break;
        }
        let (key, value) = trimmed
            .split_once(':')
            .ok_or_else(|| ParseError::new(line.no, format!("expected 'key: value', got '{trimmed}'")))?;
        match key.trim() {
            "params" => params = split_ident_list(value),
            "returns" => return_vars = split_ident_list(value).iter().map(|s| parse_return_var(s)).collect(),
            "uses" => uses = parse_int_list(value),
            "keeps" => keeps = parse_int_list(value),
            "request" => {
                let v = value.trim();
                if !v.is_empty() {
                    request_name = Some(v.to_string());
                }
            }
            other => return Err(ParseError::new(line.no, format!("unknown subroutine key '{other}'"))),
        }
    }

    let mut subroutine = Vec::new();
    loop {
        let line = cur
            .next()
            .ok_or_else(|| cur.err(header.no, "unterminated NETQASM block"))?;
        if line.text.trim() == "NETQASM_END" {
            break;
        }
        subroutine.push(parse_netqasm_instr(line.text, line.no)?);
    }

    Ok(LocalRoutine {
        name,
        params,
        subroutine,
        return_vars,
        qubit_use: QubitUse { used: uses, kept: keeps },
        request_name,
    })
}

// =============================================================================
// 6. Request Section
// =============================================================================

fn parse_virt_ids(value: &str, line_no: usize) -> Result<VirtIdMapping, ParseError> {
    let value = value.trim();
    if let Some(rest) = value.strip_prefix("all ") {
        Ok(VirtIdMapping::All(rest.trim().parse().map_err(|_| {
            ParseError::new(line_no, format!("bad virt_ids 'all' argument in '{value}'"))
        })?))
    } else if let Some(rest) = value.strip_prefix("increment ") {
        Ok(VirtIdMapping::Increment(rest.trim().parse().map_err(|_| {
            ParseError::new(line_no, format!("bad virt_ids 'increment' argument in '{value}'"))
        })?))
    } else if let Some(rest) = value.strip_prefix("custom ") {
        let inner = rest.trim().trim_start_matches('[').trim_end_matches(']');
        Ok(VirtIdMapping::Custom(parse_int_list(inner)))
    } else {
        Err(ParseError::new(line_no, format!("unrecognized virt_ids strategy '{value}'")))
    }
}

fn parse_request(cur: &mut Cursor) -> Result<RequestRoutine, ParseError> {
    let header = cur.next().expect("caller checked peek");
    let name = header
        .text
        .trim()
        .strip_prefix("REQUEST")
        .map(|s| s.trim().to_string())
        .ok_or_else(|| cur.err(header.no, "expected REQUEST header"))?;

    let mut callback_type = None;
    let mut callback_routine = None;
    let mut return_vars = Vec::new();
    let mut remote_id = None;
    let mut epr_socket_id = None;
    let mut num_pairs = None;
    let mut virt_ids = None;
    let mut timeout = None;
    let mut fidelity = None;
    let mut typ = None;
    let mut role = None;

    while let Some(line) = cur.peek_nonblank() {
        if is_section_start(line.text) {
            break;
        }
        let line = cur.next().unwrap();
        let trimmed = line.text.trim();
        let (key, value) = trimmed
            .split_once(':')
            .ok_or_else(|| ParseError::new(line.no, format!("expected 'key: value', got '{trimmed}'")))?;
        let value = value.trim();
        match key.trim() {
            "callback_type" => {
                callback_type = Some(match value {
                    "SEQUENTIAL" => CallbackType::Sequential,
                    "WAIT_ALL" => CallbackType::WaitAll,
                    other => return Err(ParseError::new(line.no, format!("unknown callback_type '{other}'"))),
                })
            }
            "callback" => {
                if !value.is_empty() {
                    callback_routine = Some(value.to_string());
                }
            }
            "return_vars" => return_vars = split_ident_list(value).iter().map(|s| parse_return_var(s)).collect(),
            "remote_id" => {
                remote_id = Some(parse_template_u32(value).map_err(|m| ParseError::new(line.no, m))?)
            }
            "epr_socket_id" => {
                epr_socket_id = Some(
                    value
                        .parse()
                        .map_err(|_| ParseError::new(line.no, "epr_socket_id must be an integer"))?,
                )
            }
            "num_pairs" => {
                num_pairs = Some(parse_template_u32(value).map_err(|m| ParseError::new(line.no, m))?)
            }
            "virt_ids" => virt_ids = Some(parse_virt_ids(value, line.no)?),
            "timeout" => {
                timeout = Some(
                    value
                        .parse()
                        .map_err(|_| ParseError::new(line.no, "timeout must be an integer"))?,
                )
            }
            "fidelity" => fidelity = Some(parse_template_f64(value).map_err(|m| ParseError::new(line.no, m))?),
            "typ" => {
                typ = Some(match value {
                    "CREATE_KEEP" => RequestType::CreateKeep,
                    "MEASURE_DIRECTLY" => RequestType::MeasureDirectly,
                    "REMOTE_STATE_PREP" => RequestType::RemoteStatePrep,
                    other => return Err(ParseError::new(line.no, format!("unknown request typ '{other}'"))),
                })
            }
            "role" => {
                role = Some(match value {
                    "CREATE" => Role::Create,
                    "RECEIVE" => Role::Receive,
                    other => return Err(ParseError::new(line.no, format!("unknown request role '{other}'"))),
                })
            }
            other => return Err(ParseError::new(line.no, format!("unknown request key '{other}'"))),
        }
    }

    let missing = |field: &str| ParseError::new(header.no, format!("request '{name}' missing '{field}'"));
    let request = Request {
        remote_id: remote_id.ok_or_else(|| missing("remote_id"))?,
        epr_socket_id: epr_socket_id.ok_or_else(|| missing("epr_socket_id"))?,
        num_pairs: num_pairs.ok_or_else(|| missing("num_pairs"))?,
        virt_ids: virt_ids.ok_or_else(|| missing("virt_ids"))?,
        timeout: timeout.ok_or_else(|| missing("timeout"))?,
        fidelity: fidelity.ok_or_else(|| missing("fidelity"))?,
        typ: typ.ok_or_else(|| missing("typ"))?,
        role: role.ok_or_else(|| missing("role"))?,
    };

    Ok(RequestRoutine {
        name,
        request,
        return_vars,
        callback_type: callback_type.ok_or_else(|| missing("callback_type"))?,
        callback_routine,
    })
}

// =============================================================================
// 7. Top-Level Entry Point
// =============================================================================

pub fn parse_program(src: &str) -> Result<Program, ParseError> {
    let mut cur = Cursor::new(src);
    let meta = parse_meta(&mut cur)?;

    let mut blocks = Vec::new();
    let mut local_routines = HashMap::new();
    let mut request_routines = HashMap::new();

    while let Some(line) = cur.peek_nonblank() {
        let t = line.text.trim_start();
        if t.starts_with('^') {
            blocks.push(parse_block(&mut cur)?);
        } else if t.starts_with("SUBROUTINE") {
            let routine = parse_subroutine(&mut cur)?;
            local_routines.insert(routine.name.clone(), routine);
        } else if t.starts_with("REQUEST") {
            let routine = parse_request(&mut cur)?;
            request_routines.insert(routine.name.clone(), routine);
        } else {
            return Err(ParseError::new(line.no, format!("unexpected line '{}'", line.text)));
        }
    }

    Ok(Program {
        name: meta.name,
        parameters: meta.parameters,
        csockets: meta.csockets,
        epr_sockets: meta.epr_sockets,
        blocks,
        local_routines,
        request_routines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "META_START\nname: simple\nparameters: \ncsockets: \nepr_sockets: \nMETA_END\n\n^b1{type=CL}:\nx = assign_cval(5)\ny = add(x, x)\n";

    #[test]
    fn test_parse_simple_program_meta_and_block() {
        let program = parse_program(SIMPLE).unwrap();
        assert_eq!(program.name, "simple");
        assert_eq!(program.blocks.len(), 1);
        assert_eq!(program.blocks[0].instructions.len(), 2);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let bad = "META_START\nname simple\nMETA_END\n";
        let err = parse_program(bad).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_parse_block_with_deadlines() {
        let src = "META_START\nname: p\nMETA_END\n\n^b1{type=CL, deadlines=[b2: 100]}:\nx = assign_cval(1)\n\n^b2{type=CL}:\ny = assign_cval(2)\n";
        let program = parse_program(src).unwrap();
        assert_eq!(program.blocks[0].deadlines.get("b2"), Some(&100));
    }

    #[test]
    fn test_parse_request_section() {
        let src = "META_START\nname: p\nepr_sockets: 0 -> bob\nMETA_END\n\nREQUEST req1\ncallback_type: WAIT_ALL\ncallback: \nreturn_vars: m<2>\nremote_id: 1\nepr_socket_id: 0\nnum_pairs: 2\nvirt_ids: increment 0\ntimeout: 1000\nfidelity: 0.8\ntyp: MEASURE_DIRECTLY\nrole: CREATE\n";
        let program = parse_program(src).unwrap();
        let req = program.request_routine("req1").unwrap();
        assert_eq!(req.request.num_pairs, Template::Literal(2));
        assert_eq!(req.request.virt_ids, VirtIdMapping::Increment(0));
    }

    #[test]
    fn test_parse_subroutine_section() {
        let src = "META_START\nname: p\nMETA_END\n\nSUBROUTINE sub1\nparams: \nreturns: m\nuses: 0\nkeeps: \nrequest: \nNETQASM_START\ninit(0)\nh(0)\nmeas(0, 0)\nNETQASM_END\n";
        let program = parse_program(src).unwrap();
        let routine = program.local_routine("sub1").unwrap();
        assert_eq!(routine.subroutine.len(), 3);
        assert_eq!(routine.qubit_use.used, vec![0]);
    }
}
