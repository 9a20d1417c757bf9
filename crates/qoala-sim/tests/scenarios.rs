// =============================================================================
// Qoala Node Runtime - Concrete Scenario Tests
// =============================================================================
// Purpose: The six concrete scenarios from §8: single-pair CREATE_KEEP,
//          multi-pair MEASURE_DIRECTLY, request timeout, netschedule
//          mismatch, a shared-memory region guard, and QL task ordering
//          over a reused virtual qubit. Every scenario runs under a
//          paused, current-thread Tokio clock so simulated time advances
//          deterministically.
// =============================================================================

use qoala_device::ehi::{Ehi, QubitInfo, UnitModule};
use qoala_device::qdevice::{InMemoryQDevice, QubitCapability};
use qoala_device::shared_mem::SharedMemoryManager;
use qoala_entdist::link::LinkSampler;
use qoala_entdist::netschedule::{NetworkSchedule, Timeslot};
use qoala_lang::netqasm::{GateKind, NetQasmInstr};
use qoala_lang::program::{
    BasicBlock, BlockType, CallbackType, HostOp, LocalRoutine, Program, QubitUse, Request, RequestRoutine, RequestType, ReturnVar, Role,
    VirtIdMapping,
};
use qoala_lang::value::{Template, Value};
use qoala_runtime::process::ProcessStatus;
use qoala_sim::network::Network;
use qoala_sim::node::Node;
use std::collections::HashMap;
use std::sync::Arc;

fn comm_ehi(num_qubits: u32) -> Ehi {
    let mut ehi = Ehi::new();
    for phys_id in 0..num_qubits {
        ehi = ehi.with_qubit(QubitInfo {
            phys_id,
            capability: QubitCapability::Communication,
            single_gate_duration_ns: 10,
            two_qubit_gate_duration_ns: 20,
        });
    }
    ehi
}

fn epr_request_program(routine_name: &str, peer: &str, remote_id: u32, request: Request, return_vars: Vec<ReturnVar>, result_vars: Vec<String>) -> Arc<Program> {
    let mut instructions = vec![HostOp::RunRequestRoutine {
        request_name: routine_name.into(),
        args: vec![],
        result_vars: result_vars.clone(),
    }];
    for var in &result_vars {
        instructions.push(HostOp::ReturnResult { var: var.clone() });
    }

    let mut request_routines = HashMap::new();
    request_routines.insert(
        routine_name.to_string(),
        RequestRoutine {
            name: routine_name.to_string(),
            request,
            return_vars,
            callback_type: CallbackType::WaitAll,
            callback_routine: None,
        },
    );

    let mut epr_sockets = HashMap::new();
    epr_sockets.insert(0, peer.to_string());
    let _ = remote_id;

    Arc::new(Program {
        name: format!("{routine_name}_program"),
        parameters: vec![],
        csockets: HashMap::new(),
        epr_sockets,
        blocks: vec![BasicBlock {
            name: "b0".into(),
            typ: BlockType::Qc,
            instructions,
            deadlines: HashMap::new(),
        }],
        local_routines: HashMap::new(),
        request_routines,
    })
}

// =============================================================================
// 1. Single EPR pair, CREATE_KEEP, both nodes keep their half
// =============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_single_pair_create_keep_both_nodes_keep_qubit() {
    let mut network = Network::unrestricted();
    network.register_node_name("alice", 0);
    network.register_node_name("bob", 1);

    let ehi = comm_ehi(1);
    let alice = Node::new(0, Arc::new(InMemoryQDevice::new(1, 0)), ehi.clone(), &network, 0);
    let bob = Node::new(1, Arc::new(InMemoryQDevice::new(1, 0)), ehi, &network, 0);

    let request = Request {
        remote_id: Template::Literal(1),
        epr_socket_id: 0,
        num_pairs: Template::Literal(1),
        virt_ids: VirtIdMapping::All(0),
        timeout: 1_000,
        fidelity: Template::Literal(1.0),
        typ: RequestType::CreateKeep,
        role: Role::Create,
    };
    let alice_program = epr_request_program("req", "bob", 1, request.clone(), vec![ReturnVar { name: "out".into(), size: None }], vec!["out".into()]);

    let bob_request = Request { remote_id: Template::Literal(0), role: Role::Receive, ..request };
    let bob_program = epr_request_program("req", "alice", 0, bob_request, vec![ReturnVar { name: "out".into(), size: None }], vec!["out".into()]);

    let ((alice_pid, alice_result), (bob_pid, bob_result)) = tokio::join!(
        alice.run_once(alice_program, HashMap::new()),
        bob.run_once(bob_program, HashMap::new())
    );

    assert_eq!(alice_result.status, ProcessStatus::Ok);
    assert_eq!(bob_result.status, ProcessStatus::Ok);
    assert_eq!(alice_result.values.get("out"), Some(&Value::Int(0)));
    assert_eq!(bob_result.values.get("out"), Some(&Value::Int(0)));
    assert!(alice.memory.phys_id_for(alice_pid, 0).is_some());
    assert!(bob.memory.phys_id_for(bob_pid, 0).is_some());
}

// =============================================================================
// 2. Multi-pair MEASURE_DIRECTLY with incrementing virtual ids
// =============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_multi_pair_measure_directly_outcomes_agree() {
    let mut network = Network::unrestricted();
    network.register_node_name("alice", 0);
    network.register_node_name("bob", 1);

    let ehi = comm_ehi(2);
    let alice = Node::new(0, Arc::new(InMemoryQDevice::new(2, 0)), ehi.clone(), &network, 0);
    let bob = Node::new(1, Arc::new(InMemoryQDevice::new(2, 0)), ehi, &network, 0);

    let request = Request {
        remote_id: Template::Literal(1),
        epr_socket_id: 0,
        num_pairs: Template::Literal(2),
        virt_ids: VirtIdMapping::Increment(0),
        timeout: 1_000,
        fidelity: Template::Literal(1.0),
        typ: RequestType::MeasureDirectly,
        role: Role::Create,
    };
    let return_vars = vec![ReturnVar { name: "m0".into(), size: None }, ReturnVar { name: "m1".into(), size: None }];
    let result_vars = vec!["m0".to_string(), "m1".to_string()];
    let alice_program = epr_request_program("req", "bob", 1, request.clone(), return_vars.clone(), result_vars.clone());

    let bob_request = Request { remote_id: Template::Literal(0), role: Role::Receive, ..request };
    let bob_program = epr_request_program("req", "alice", 0, bob_request, return_vars, result_vars);

    let ((alice_pid, alice_result), (bob_pid, bob_result)) = tokio::join!(
        alice.run_once(alice_program, HashMap::new()),
        bob.run_once(bob_program, HashMap::new())
    );

    assert_eq!(alice_result.status, ProcessStatus::Ok);
    assert_eq!(bob_result.status, ProcessStatus::Ok);
    assert_eq!(alice_result.values.get("m0"), bob_result.values.get("m0"));
    assert_eq!(alice_result.values.get("m1"), bob_result.values.get("m1"));
    assert!(alice.memory.phys_id_for(alice_pid, 0).is_none());
    assert!(alice.memory.phys_id_for(alice_pid, 1).is_none());
    assert!(bob.memory.phys_id_for(bob_pid, 0).is_none());
    assert!(bob.memory.phys_id_for(bob_pid, 1).is_none());
}

// =============================================================================
// 3. Timeout - peer never submits a matching request
// =============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_request_times_out_without_failing_the_process() {
    let mut network = Network::unrestricted();
    network.register_node_name("alice", 0);
    network.register_node_name("bob", 1);

    let ehi = comm_ehi(1);
    let alice = Node::new(0, Arc::new(InMemoryQDevice::new(1, 0)), ehi, &network, 0);

    let request = Request {
        remote_id: Template::Literal(1),
        epr_socket_id: 0,
        num_pairs: Template::Literal(1),
        virt_ids: VirtIdMapping::All(0),
        timeout: 500,
        fidelity: Template::Literal(1.0),
        typ: RequestType::CreateKeep,
        role: Role::Create,
    };
    let alice_program = epr_request_program("req", "bob", 1, request, vec![ReturnVar { name: "out".into(), size: None }], vec!["out".into()]);

    let (alice_pid, alice_result) = alice.run_once(alice_program, HashMap::new()).await;

    assert_eq!(alice_result.status, ProcessStatus::Ok);
    assert_eq!(alice_result.values.get("out"), Some(&Value::Int(-1)));
    assert!(alice.memory.phys_id_for(alice_pid, 0).is_none());
}

// =============================================================================
// 4. Netschedule mismatch - neither side's pid is in the authorized slot
// =============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_netschedule_mismatch_fails_both_sides_without_terminating() {
    let schedule = NetworkSchedule::new(
        vec![Timeslot { node_a: 0, pid_a: 0, node_b: 1, pid_b: 0, start_ns: 0, length_ns: 100 }],
        1_000,
    );
    let mut network = Network::new(schedule, LinkSampler::perfect());
    network.register_node_name("alice", 0);
    network.register_node_name("bob", 1);

    let ehi = comm_ehi(1);
    let alice = Node::new(0, Arc::new(InMemoryQDevice::new(1, 0)), ehi.clone(), &network, 0);
    let bob = Node::new(1, Arc::new(InMemoryQDevice::new(1, 0)), ehi, &network, 0);

    // The scheduler mints pid 1 for each node's first process; the
    // authorized timeslot above names pid 0 on both sides, so these two
    // requests can never be matched no matter how long either waits.
    let request = Request {
        remote_id: Template::Literal(1),
        epr_socket_id: 0,
        num_pairs: Template::Literal(1),
        virt_ids: VirtIdMapping::All(0),
        timeout: 300,
        fidelity: Template::Literal(1.0),
        typ: RequestType::CreateKeep,
        role: Role::Create,
    };
    let alice_program = epr_request_program("req", "bob", 1, request.clone(), vec![ReturnVar { name: "out".into(), size: None }], vec!["out".into()]);
    let bob_request = Request { remote_id: Template::Literal(0), role: Role::Receive, ..request };
    let bob_program = epr_request_program("req", "alice", 0, bob_request, vec![ReturnVar { name: "out".into(), size: None }], vec!["out".into()]);

    let ((alice_pid, alice_result), (bob_pid, bob_result)) = tokio::join!(
        alice.run_once(alice_program, HashMap::new()),
        bob.run_once(bob_program, HashMap::new())
    );

    assert_eq!(alice_result.status, ProcessStatus::Ok);
    assert_eq!(bob_result.status, ProcessStatus::Ok);
    // -2 is the NoMatch sentinel (distinct from -1, Timeout): the netschedule
    // never authorized this pid pair, even though each side saw the other's
    // request sitting in the queue, which is a NoMatch per §4.6 step 4, not
    // a plain Timeout.
    assert_eq!(alice_result.values.get("out"), Some(&Value::Int(-2)));
    assert_eq!(bob_result.values.get("out"), Some(&Value::Int(-2)));
    assert!(alice.memory.phys_id_for(alice_pid, 0).is_none());
    assert!(bob.memory.phys_id_for(bob_pid, 0).is_none());
}

// =============================================================================
// 5. Shared-memory region guard
// =============================================================================

#[test]
fn test_reading_a_region_under_the_wrong_kind_is_illegal() {
    let mut mem = SharedMemoryManager::new();
    let addr = mem.allocate_local_routine_out(4);
    mem.write_local_routine_out(addr, &[1, 2, 3], 0).unwrap();

    let err = mem.read_request_out(addr, 1, 0).unwrap_err();
    assert_eq!(err, qoala_device::error::SharedMemError::IllegalRegion(addr));
}

// =============================================================================
// 6. Ordering: two QL blocks reusing the same virtual qubit
// =============================================================================

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_ql_blocks_reusing_a_qubit_run_in_program_order() {
    let mut network = Network::unrestricted();
    network.register_node_name("solo", 0);

    let mut ehi = Ehi::new();
    ehi = ehi.with_qubit(QubitInfo {
        phys_id: 0,
        capability: QubitCapability::MemoryOnly,
        single_gate_duration_ns: 10,
        two_qubit_gate_duration_ns: 20,
    });
    let node = Node::new(0, Arc::new(InMemoryQDevice::new(0, 1)), ehi, &network, 0);

    let mut local_routines = HashMap::new();
    local_routines.insert(
        "prepare".to_string(),
        LocalRoutine {
            name: "prepare".into(),
            params: vec![],
            subroutine: vec![
                NetQasmInstr::InitQubit { qubit: 0 },
                NetQasmInstr::ApplyGate { gate: GateKind::X, qubit: 0, angle_steps: None },
            ],
            return_vars: vec![],
            qubit_use: QubitUse { used: vec![0], kept: vec![0] },
            request_name: None,
        },
    );
    local_routines.insert(
        "measure".to_string(),
        LocalRoutine {
            name: "measure".into(),
            params: vec![],
            subroutine: vec![NetQasmInstr::Measure { qubit: 0, into_var: 0 }],
            return_vars: vec![ReturnVar { name: "m".into(), size: None }],
            qubit_use: QubitUse { used: vec![0], kept: vec![] },
            request_name: None,
        },
    );

    let program = Arc::new(Program {
        name: "reuse".into(),
        parameters: vec![],
        csockets: HashMap::new(),
        epr_sockets: HashMap::new(),
        blocks: vec![
            BasicBlock {
                name: "b0".into(),
                typ: BlockType::Ql,
                instructions: vec![HostOp::RunLocalRoutine { routine_name: "prepare".into(), args: vec![], result_vars: vec![] }],
                deadlines: HashMap::new(),
            },
            BasicBlock {
                name: "b1".into(),
                typ: BlockType::Ql,
                instructions: vec![
                    HostOp::RunLocalRoutine { routine_name: "measure".into(), args: vec![], result_vars: vec!["m".into()] },
                    HostOp::ReturnResult { var: "m".into() },
                ],
                deadlines: HashMap::new(),
            },
        ],
        local_routines,
        request_routines: HashMap::new(),
    });

    let (pid, result) = node.run_once(program, HashMap::new()).await;

    assert_eq!(result.status, ProcessStatus::Ok);
    // X on |0> measures to 1; b1 could only see this if it ran strictly
    // after b0 prepared the qubit.
    assert_eq!(result.values.get("m"), Some(&Value::Int(1)));
    // "measure" does not list virt qubit 0 in `kept`, but the process-level
    // mapping outlives a routine call regardless — only `MemoryManager::free`
    // releases it, and nothing in this program calls for that.
    assert!(node.memory.phys_id_for(pid, 0).is_some());

    // A fresh UnitModule declaring the same id on its own confirms the
    // capability escalation rule (`declare` takes the stricter of the two)
    // has no bearing here: a purely local qubit stays MemoryOnly.
    let um = UnitModule::new().declare(0, QubitCapability::MemoryOnly);
    assert_eq!(um.required_capability(0), QubitCapability::MemoryOnly);
}
