//! Accept loop: one [`ClientConnection`] task per incoming socket.

use std::sync::Arc;

use hubfs_core::ServerContext;
use hubfs_proto::ClientConnection;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub async fn serve(addr: &str, ctx: Arc<ServerContext>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    let shutdown = ctx.shutdown_signal();

    loop {
        tokio::select! {
            () = shutdown.notified() => {
                info!("quit posted to ctl; shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(%err, "accept failed");
                        continue;
                    }
                };
                info!(%peer, "accepted connection");

                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    ClientConnection::new(ctx).run(socket).await;
                    info!(%peer, "connection closed");
                });
            }
        }
    }
}
