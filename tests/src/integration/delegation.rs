//! # Delegation Across Nodes
//!
//! Full request → data → result exchanges routed through [`SimNetwork`],
//! with every packet encoded and decoded on the way.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cn_03_job_exchange::wire::Packet;
    use cn_03_job_exchange::{
        Job, JobExchangeApi, JobExchangeConfig, JobExchangeEvent, JobResult, JobStage,
        NetworkEvent, Toolchain,
    };

    use crate::harness::SimNetwork;

    const ALICE: usize = 0;
    const BOB: usize = 1;
    const CAROL: usize = 2;

    // =========================================================================
    // FIXTURES
    // =========================================================================

    fn network() -> SimNetwork {
        let mut net = SimNetwork::new(&["alice", "bob", "carol"], JobExchangeConfig::for_testing());
        for executor in [BOB, CAROL] {
            net.node(executor).service.set_toolchains(vec![Toolchain::new(
                "x86_64-gcc-4.6.3",
                "/opt/gcc/bin/gcc",
            )]);
            net.node(executor).service.set_free_local_slots(2);
        }
        net
    }

    fn job() -> Job {
        Job::new(Toolchain::new("x86_64-gcc-4.6", "/usr/bin/gcc"), "c")
            .with_files(vec!["main.c".into()], vec!["main.o".into()])
            .with_working_dir("/src")
            .with_compiler_parameters(vec!["-O2".into()])
    }

    fn finished_jobs(net: &mut SimNetwork, i: usize) -> Vec<Job> {
        net.node(i)
            .events
            .take()
            .into_iter()
            .filter_map(|event| match event {
                JobExchangeEvent::LocalJobFinished(job) => Some(job),
                _ => None,
            })
            .collect()
    }

    /// Alice trusts and is linked to Bob and has one job delegated and
    /// acknowledged there.
    fn delegated_to_bob() -> SimNetwork {
        let mut net = network();
        net.trust_each_other(ALICE, BOB);
        net.link(ALICE, BOB).unwrap();
        net.node(ALICE).files.insert("/src/main.c", b"int main(void){return 0;}".to_vec());

        net.node(ALICE).service.submit_job(job()).unwrap();
        net.pump().unwrap();
        assert_eq!(net.finish_preprocessing(ALICE).unwrap(), 1);
        net.pump().unwrap();
        assert_eq!(net.node(ALICE).service.delegated_jobs(), 1);
        assert_eq!(net.node(BOB).service.incoming_jobs(), 1);
        net
    }

    // =========================================================================
    // TEST GROUP 1: HAPPY PATH
    // =========================================================================

    #[test]
    fn test_job_compiled_on_trusted_peer() {
        let mut net = delegated_to_bob();

        let executed = net.node(BOB).executor.take_executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].compiler_path, std::path::PathBuf::from("/opt/gcc/bin/gcc"));
        assert!(executed[0].parameters.contains(&"-O2".to_string()));
        // Input arrived intact after compression.
        assert_eq!(
            net.node(BOB).files.get(&executed[0].input_files[0]).unwrap(),
            b"int main(void){return 0;}"
        );

        net.node(BOB)
            .files
            .insert(executed[0].output_files[0].clone(), b"\x7fELF-object".to_vec());
        net.node(BOB)
            .service
            .handle(NetworkEvent::ExecutionFinished {
                job: executed[0].job,
                result: JobResult::success(),
            })
            .unwrap();
        net.pump().unwrap();

        let finished = finished_jobs(&mut net, ALICE);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].stage(), JobStage::Finished);
        assert_eq!(finished[0].result().unwrap().return_code, 0);
        assert_eq!(net.node(ALICE).files.get("/src/main.o").unwrap(), b"\x7fELF-object");

        assert_eq!(net.node(ALICE).service.delegated_jobs(), 0);
        assert_eq!(net.node(BOB).service.incoming_jobs(), 0);
        // Bob's scratch files are gone.
        assert!(!net.node(BOB).files.contains(&executed[0].input_files[0]));
    }

    #[test]
    fn test_compile_error_travels_back() {
        let mut net = delegated_to_bob();

        net.finish_execution(
            BOB,
            JobResult::failure(1, "main.c:1: error: expected ';'"),
            b"",
        )
        .unwrap();
        net.pump().unwrap();

        let finished = finished_jobs(&mut net, ALICE);
        let result = finished[0].result().unwrap();
        assert_eq!(result.return_code, 1);
        assert!(String::from_utf8_lossy(&result.stderr).contains("expected ';'"));
        assert!(!net.node(ALICE).files.contains("/src/main.o"));
    }

    #[test]
    fn test_untrusted_peer_gets_no_work() {
        let mut net = network();
        net.link(ALICE, BOB).unwrap();
        net.node(ALICE).files.insert("/src/main.c", b"x".to_vec());

        net.node(ALICE).service.submit_job(job()).unwrap();
        net.pump().unwrap();

        assert_eq!(net.node(ALICE).service.outstanding_requests(), 0);
        assert_eq!(net.node(ALICE).service.job_queue().len(), 1);
        assert_eq!(net.node(BOB).service.incoming_requests(), 0);
    }

    // =========================================================================
    // TEST GROUP 2: FAILURE RECOVERY
    // =========================================================================

    #[test]
    fn test_disconnect_requeues_and_fails_over() {
        let mut net = delegated_to_bob();
        net.trust_each_other(ALICE, CAROL);
        net.link(ALICE, CAROL).unwrap();

        net.unlink(ALICE, BOB).unwrap();
        assert_eq!(net.node(ALICE).service.delegated_jobs(), 0);
        assert_eq!(net.node(BOB).service.incoming_jobs(), 0);
        assert_eq!(net.node(BOB).executor.cancelled().len(), 1);

        net.pump().unwrap();

        // Already preprocessed: goes straight to Carol.
        assert!(net.node(ALICE).executor.take_preprocessed().is_empty());
        assert_eq!(net.node(CAROL).service.incoming_jobs(), 1);
        net.finish_execution(CAROL, JobResult::success(), b"obj").unwrap();
        net.pump().unwrap();

        assert_eq!(finished_jobs(&mut net, ALICE).len(), 1);
        assert_eq!(net.node(ALICE).files.get("/src/main.o").unwrap(), b"obj");
    }

    #[test]
    fn test_unanswered_acceptance_times_out_on_executor() {
        let mut net = network();
        net.trust_each_other(ALICE, BOB);
        net.link(ALICE, BOB).unwrap();
        net.node(ALICE).files.insert("/src/main.c", b"x".to_vec());
        net.node(ALICE).service.submit_job(job()).unwrap();
        net.pump().unwrap();
        assert_eq!(net.node(BOB).service.incoming_requests(), 1);

        // Alice never finishes preprocessing; Bob gives up on the data.
        net.node(BOB).tick_after(Duration::from_secs(61)).unwrap();
        assert_eq!(net.node(BOB).service.incoming_requests(), 0);

        let replies = net.node(BOB).transport.take_sent();
        assert!(replies.iter().any(|(peer, packet)| {
            *peer == SimNetwork::peer_id(ALICE)
                && matches!(packet, Packet::JobFinished(payload) if payload.outcome.is_none())
        }));
    }

    #[test]
    fn test_delegation_timeout_hands_job_back() {
        let mut net = delegated_to_bob();
        // Bob acknowledged; the compile budget applies.
        net.node(ALICE).tick_after(Duration::from_secs(61)).unwrap();
        assert_eq!(net.node(ALICE).service.delegated_jobs(), 1);

        net.node(ALICE).tick_after(Duration::from_secs(60)).unwrap();
        assert_eq!(net.node(ALICE).service.delegated_jobs(), 0);
        let cancelled: Vec<_> = net
            .node(ALICE)
            .events
            .take()
            .into_iter()
            .filter(|e| matches!(e, JobExchangeEvent::LocalJobCancelled(_)))
            .collect();
        assert_eq!(cancelled.len(), 1);

        net.pump().unwrap();
        assert_eq!(net.node(BOB).service.incoming_jobs(), 0);
    }
}
