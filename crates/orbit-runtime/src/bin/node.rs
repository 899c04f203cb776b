//! Single-node development runner.
//!
//! Boots a one-member federation on the in-process transport with the HTTP
//! adapter on loopback. Useful for poking the client API end to end; real
//! deployments supply their own wiring and transport.

use orbit_node::{NodeConfig, NodeStateMachine};
use orbit_network_memory::MemoryTransport;
use orbit_runtime::rpc::{RpcServer, RpcServerConfig};
use orbit_runtime::{NodeLoop, TrackerConfig};
use orbit_storage_memory::{InMemoryBlockStore, InMemoryStateStore};
use orbit_types::{generate_keypair, Federation, TimestampNano, ValidatorId, VirtualChainId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let keys = generate_keypair();
        let federation = Federation::new(vec![keys.public]);
        let config = NodeConfig::new(ValidatorId(0), VirtualChainId(42), federation);

        let transport = Arc::new(MemoryTransport::new());
        transport.join(ValidatorId(0));

        let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
        let node = NodeStateMachine::new(
            config,
            keys.private,
            Arc::new(InMemoryBlockStore::new()),
            Arc::new(InMemoryStateStore::new()),
            TimestampNano::from_duration(now),
        );

        let handle = Arc::new(NodeLoop::spawn(
            node,
            transport,
            tokio::runtime::Handle::current(),
            TrackerConfig::default(),
        ));

        let rpc = RpcServer::new(
            RpcServerConfig {
                listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
                ..RpcServerConfig::default()
            },
            Arc::clone(&handle),
        )
        .start()
        .await?;

        info!("dev node up; ctrl-c to stop");
        tokio::signal::ctrl_c().await?;

        rpc.abort();
        handle.shutdown();
        Ok(())
    })
}
