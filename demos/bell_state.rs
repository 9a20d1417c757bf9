// =============================================================================
// Qoala Node Runtime - Bell State Demo
// =============================================================================
// Table of Contents:
//   1. Program construction - one CREATE_KEEP request routine per node
//   2. Network wiring and execution
// =============================================================================
// Purpose: Two nodes, alice and bob, each run a one-block QC program that
//          requests a single CREATE_KEEP EPR pair over a perfect, unrestricted
//          link and return the physical outcome of keeping their half. Both
//          sides should see the same correlated bit.
// =============================================================================

use qoala_device::ehi::{Ehi, QubitInfo};
use qoala_device::qdevice::{InMemoryQDevice, QubitCapability};
use qoala_lang::program::{
    BasicBlock, BlockType, CallbackType, HostOp, Program, Request, RequestRoutine, RequestType, ReturnVar, Role, VirtIdMapping,
};
use qoala_lang::value::Template;
use qoala_sim::network::Network;
use qoala_sim::node::Node;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

// =============================================================================
// 1. Program construction - one CREATE_KEEP request routine per node
// =============================================================================

fn epr_program(peer: &str, remote_id: u32, role: Role) -> Arc<Program> {
    let request = Request {
        remote_id: Template::Literal(remote_id),
        epr_socket_id: 0,
        num_pairs: Template::Literal(1),
        virt_ids: VirtIdMapping::All(0),
        timeout: 1_000,
        fidelity: Template::Literal(1.0),
        typ: RequestType::CreateKeep,
        role,
    };

    let mut request_routines = HashMap::new();
    request_routines.insert(
        "epr".to_string(),
        RequestRoutine {
            name: "epr".into(),
            request,
            return_vars: vec![ReturnVar { name: "outcome".into(), size: None }],
            callback_type: CallbackType::WaitAll,
            callback_routine: None,
        },
    );

    let mut epr_sockets = HashMap::new();
    epr_sockets.insert(0, peer.to_string());

    Arc::new(Program {
        name: "bell_state".into(),
        parameters: vec![],
        csockets: HashMap::new(),
        epr_sockets,
        blocks: vec![BasicBlock {
            name: "b0".into(),
            typ: BlockType::Qc,
            instructions: vec![
                HostOp::RunRequestRoutine {
                    request_name: "epr".into(),
                    args: vec![],
                    result_vars: vec!["outcome".into()],
                },
                HostOp::ReturnResult { var: "outcome".into() },
            ],
            deadlines: HashMap::new(),
        }],
        local_routines: HashMap::new(),
        request_routines,
    })
}

// =============================================================================
// 2. Network wiring and execution
// =============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() {
    qoala_sim::init_tracing();

    let mut network = Network::unrestricted();
    network.register_node_name("alice", 0);
    network.register_node_name("bob", 1);

    let mut ehi = Ehi::new();
    ehi = ehi.with_qubit(QubitInfo {
        phys_id: 0,
        capability: QubitCapability::Communication,
        single_gate_duration_ns: 10,
        two_qubit_gate_duration_ns: 20,
    });

    let alice = Node::new(0, Arc::new(InMemoryQDevice::new(1, 0)), ehi.clone(), &network, 0);
    let bob = Node::new(1, Arc::new(InMemoryQDevice::new(1, 0)), ehi, &network, 0);

    let alice_program = epr_program("bob", 1, Role::Create);
    let bob_program = epr_program("alice", 0, Role::Receive);

    let ((_alice_pid, alice_result), (_bob_pid, bob_result)) = tokio::join!(
        alice.run_once(alice_program, HashMap::new()),
        bob.run_once(bob_program, HashMap::new())
    );

    info!(?alice_result.status, alice_outcome = ?alice_result.values.get("outcome"), "alice done");
    info!(?bob_result.status, bob_outcome = ?bob_result.values.get("outcome"), "bob done");
    println!("alice outcome: {:?}", alice_result.values.get("outcome"));
    println!("bob outcome:   {:?}", bob_result.values.get("outcome"));
}
