//! Wiring for the `anvil worker` subcommand (§4.5/§6): provisions a local
//! worker pool (via [`MockProvider`], since real cloud provisioning is a
//! plug-in concern per §1) and speaks the coordinator wire protocol over
//! one TCP connection, executing whatever the coordinator assigns through
//! the same [`HandlerExecutor`] the `build` subcommand uses.

use crate::build_executor::HandlerExecutor;
use anvil_cache::ActionCache;
use anvil_coordinator::{ActionRequest, MessageBody, WireMessage};
use anvil_handler::HandlerRegistry;
use anvil_sched::{Executor, LoadSample};
use anvil_types::worker::Capabilities;
use anvil_types::workspace::{WorkspaceConfig, WorkspaceOptions};
use anvil_worker_pool::{AutoscaleConfig, AutoscalePolicy, MockProvider, ProvisionSpec, WorkerPool};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const READ_CHUNK: usize = 64 * 1024;

/// Connect to `coordinator`, provision `min_workers` local (mock) worker
/// slots, and run the autoscaling loop in the background while the
/// foreground connection processes assignments forever.
///
/// # Errors
///
/// Returns an error if the coordinator connection can't be established.
pub async fn run(
    coordinator: &str,
    min_workers: usize,
    max_workers: Option<usize>,
) -> anyhow::Result<()> {
    let pool = Arc::new(WorkerPool::new(MockProvider::new(), ProvisionSpec::default()));
    pool.provision_initial(min_workers.max(1)).await?;

    if let Some(max) = max_workers {
        let pool_for_autoscale = pool.clone();
        let policy = AutoscalePolicy::new(AutoscaleConfig {
            min_workers,
            max_workers: max,
            ..AutoscaleConfig::default()
        });
        tokio::spawn(async move {
            pool_for_autoscale
                .run_autoscale_loop(policy, Duration::from_secs(10))
                .await;
        });
    }

    let cache = Arc::new(ActionCache::open(
        PathBuf::from(".anvil-worker-cache"),
        anvil_crypto::hash(coordinator.as_bytes()),
        None,
        None,
    )?);
    let handlers = Arc::new(HandlerRegistry::new());
    let workspace = WorkspaceConfig {
        root: std::env::current_dir()?,
        options: WorkspaceOptions::default(),
        targets: Vec::new(),
    };
    let executor = HandlerExecutor::new(cache, handlers, workspace, std::collections::BTreeMap::new());

    let mut socket = TcpStream::connect(coordinator).await?;
    info!(%coordinator, "connected to coordinator");
    register(&mut socket).await?;

    let mut buf = Vec::new();
    let mut chunk = vec![0_u8; READ_CHUNK];
    let mut last_heartbeat = Instant::now();

    loop {
        let n = tokio::time::timeout(HEARTBEAT_INTERVAL, socket.read(&mut chunk))
            .await
            .unwrap_or(Ok(0))?;
        if n > 0 {
            buf.extend_from_slice(&chunk[..n]);
            while let Some((message, consumed)) = WireMessage::from_stream(&buf)? {
                buf.drain(..consumed);
                handle_message(message, &mut socket, &executor).await?;
            }
        }

        if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
            send_heartbeat(&mut socket, pool.stats()).await?;
            last_heartbeat = Instant::now();
        }
    }
}

async fn register(socket: &mut TcpStream) -> anyhow::Result<()> {
    let message = WireMessage {
        seq: 0,
        body: MessageBody::Register {
            capabilities: Capabilities::default(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
        },
    };
    socket.write_all(&message.to_frame()?).await?;
    Ok(())
}

async fn send_heartbeat(socket: &mut TcpStream, stats: anvil_worker_pool::PoolStats) -> anyhow::Result<()> {
    let message = WireMessage {
        seq: 0,
        body: MessageBody::Heartbeat {
            load: LoadSample {
                queue_depth: 0,
                in_flight: stats.busy,
                steal_success_rate: 0.0,
            },
        },
    };
    socket.write_all(&message.to_frame()?).await?;
    Ok(())
}

async fn handle_message(
    message: WireMessage,
    socket: &mut TcpStream,
    executor: &HandlerExecutor,
) -> anyhow::Result<()> {
    match message.body {
        MessageBody::Assign { request } => {
            let ActionRequest { action, .. } = request;
            let started = Instant::now();
            let outcome = executor.execute(&action).await;
            let result = WireMessage {
                seq: 0,
                body: MessageBody::Result {
                    action_id: action.id,
                    outcome,
                    outputs: Vec::new(),
                    logs: String::new(),
                    duration: started.elapsed(),
                },
            };
            socket.write_all(&result.to_frame()?).await?;
        }
        MessageBody::Steal { action_id, .. } => {
            let ack = WireMessage {
                seq: 0,
                body: MessageBody::Ack { action_id },
            };
            socket.write_all(&ack.to_frame()?).await?;
        }
        MessageBody::Cancel { action_id } => {
            warn!(%action_id, "coordinator cancelled an in-flight action (not preempted)");
        }
        MessageBody::Register { .. } | MessageBody::Heartbeat { .. } | MessageBody::Ack { .. } => {
            // Worker -> coordinator only; a worker never receives these.
        }
    }
    Ok(())
}
