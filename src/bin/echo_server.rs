//! A minimal TCP server that proves [`FrameCodec`] composes with a real
//! transport: it decodes one RESP frame at a time and echoes it back
//! verbatim. There is no command interpretation layer here; this binary
//! only exercises the wire plumbing.

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Decoder;
use tracing::{error, info};

use resp_codec::aggregator::FrameCodec;

async fn process(stream: TcpStream) {
    let mut transport = FrameCodec::new().framed(stream);
    while let Some(frame) = transport.next().await {
        match frame {
            Ok(msg) => {
                info!(%msg, "echoing frame");
                if let Err(err) = transport.send(msg).await {
                    error!(%err, "failed to write frame");
                    break;
                }
            }
            Err(err) => {
                error!(%err, "failed to decode frame, closing connection");
                break;
            }
        }
    }
}

/// `RedisMessage` is built on `Rc`, not `Arc`, so the futures `process`
/// produces are `!Send` and cannot be handed to `tokio::spawn`. Each
/// connection is instead spawned onto a [`tokio::task::LocalSet`], which
/// accepts `!Send` tasks by running them all on the thread that drives it.
async fn accept_loop(listener: TcpListener) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!(%peer, "accepted connection");
        tokio::task::spawn_local(process(stream));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let addr = "127.0.0.1:6379";
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    let local = tokio::task::LocalSet::new();
    local.run_until(accept_loop(listener)).await
}
