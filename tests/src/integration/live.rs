//! # Live Nodes
//!
//! Two [`NodeRuntime`]s on loopback TCP delegating a real job. The
//! "compiler" is a shell script that copies its input to its `-o` output,
//! so the object file alice receives holds her source text.

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use cn_01_trust_store::{InMemoryTrustConfigStore, TrustConfig, TrustStore};
    use cn_03_job_exchange::{Job, JobExchangeEvent, Toolchain};
    use node_runtime::{NodeConfig, NodeHandle, NodeRuntime};
    use shared_crypto::{PrivateKey, PublicKey};
    use tokio::sync::mpsc;

    const FAKE_CC: &str = r#"#!/bin/sh
out=""
in=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -x) shift 2 ;;
    -*) shift ;;
    *) in="$1"; shift ;;
  esac
done
cat "$in" > "$out"
"#;

    struct Live {
        handle: NodeHandle,
        public_key: PublicKey,
        events: mpsc::UnboundedReceiver<JobExchangeEvent>,
    }

    fn fake_compiler(dir: &Path) -> PathBuf {
        let path = dir.join("fakecc");
        fs::write(&path, FAKE_CC).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn start(name: &str, seed: u8, scratch: &Path, extra_toml: &str) -> Live {
        let mut config = NodeConfig::parse(&format!(
            r#"
            [node]
            peer_name = "{name}"
            scratch_dir = "{}"

            [network]
            listen = "127.0.0.1:0"
            {extra_toml}
            "#,
            scratch.display()
        ))
        .unwrap();
        config.node.free_slots = 2;

        let private_key = PrivateKey::from_seed([seed; 32]);
        let public_key = private_key.public_key();
        let store = Arc::new(InMemoryTrustConfigStore::new(TrustConfig::default()));
        let mut runtime = NodeRuntime::start(&config, TrustStore::new(name, private_key), store)
            .await
            .unwrap();
        let events = runtime.subscribe();
        let handle = runtime.handle();
        tokio::spawn(runtime.run());
        Live {
            handle,
            public_key,
            events,
        }
    }

    #[tokio::test]
    async fn test_live_delegation_over_tcp() {
        let root = tempfile::tempdir().unwrap();
        let cc = fake_compiler(root.path());
        let src = root.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.c"), "int main(void) { return 0; }\n").unwrap();

        let mut alice = start("alice", 1, &root.path().join("alice"), "").await;
        let bob = start(
            "bob",
            2,
            &root.path().join("bob"),
            &format!(
                "[[toolchains]]\nversion = \"x86_64-gcc-12.2.0\"\ncompiler = \"{}\"",
                cc.display()
            ),
        )
        .await;

        alice.handle.add_trusted_peer("bob", bob.public_key).unwrap();
        alice.handle.connect(bob.handle.listen_addr()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let job = Job::new(Toolchain::new("x86_64-gcc-12.2", &cc), "c")
            .with_files(vec!["main.c".into()], vec!["main.o".into()])
            .with_working_dir(&src);
        let id = alice.handle.submit_job(job).await.unwrap();

        let finished = loop {
            let event = tokio::time::timeout(Duration::from_secs(20), alice.events.recv())
                .await
                .expect("job result in time")
                .expect("runtime alive");
            match event {
                JobExchangeEvent::LocalJobFinished(job) => break job,
                JobExchangeEvent::LocalJobCancelled(job) => panic!("job handed back: {job:?}"),
                _ => continue,
            }
        };

        assert_eq!(finished.id(), id);
        let result = finished.result().unwrap();
        assert_eq!(
            result.return_code,
            0,
            "stderr: {}",
            String::from_utf8_lossy(&result.stderr)
        );
        assert_eq!(
            fs::read_to_string(src.join("main.o")).unwrap(),
            "int main(void) { return 0; }\n"
        );

        alice.handle.shutdown();
        bob.handle.shutdown();
    }
}
