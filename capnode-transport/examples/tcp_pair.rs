// Two capnodes over a loopback TCP connection: a calculator service and a
// client that passes a callback capability into one of its calls.

use anyhow::Result;
use capnode_core::{ApiValue, Capnode, RpcError};
use capnode_transport::{bind_io, FrameFormat};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

fn calculator() -> ApiValue {
    ApiValue::object([
        ("motd", ApiValue::from("capnode calculator")),
        (
            "add",
            ApiValue::function(|args: Vec<ApiValue>| async move {
                let mut sum = 0;
                for arg in &args {
                    sum += arg
                        .as_i64()
                        .ok_or_else(|| RpcError::method("add expects numbers"))?;
                }
                Ok(ApiValue::from(sum))
            }),
        ),
        (
            "report",
            ApiValue::function(|args: Vec<ApiValue>| async move {
                let callback = args
                    .first()
                    .and_then(ApiValue::as_function)
                    .ok_or(RpcError::NotCallable)?;
                callback.call(vec![ApiValue::from("calculator ready")]).await
            }),
        ),
    ])
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = Capnode::new();
    server.expose(calculator());
    let accept = tokio::spawn(async move {
        let (socket, peer) = listener.accept().await?;
        tracing::info!(%peer, "accepted");
        Ok::<_, anyhow::Error>(socket)
    });

    let client_socket = TcpStream::connect(addr).await?;
    let server_socket = accept.await??;
    bind_io(&server, server_socket, FrameFormat::NewlineDelimited);

    let client = Capnode::new();
    bind_io(&client, client_socket, FrameFormat::NewlineDelimited);

    let remote = client.remote_api().await?;
    println!(
        "motd: {}",
        remote.get("motd").and_then(|v| v.as_str()).unwrap_or("?")
    );

    let sum = remote
        .get("add")
        .expect("calculator exposes add")
        .invoke(vec![ApiValue::from(2i64), ApiValue::from(3i64)])
        .await?;
    println!("2 + 3 = {}", sum.as_i64().unwrap_or_default());

    let banner = ApiValue::function(|args: Vec<ApiValue>| async move {
        let s = args.first().and_then(|v| v.as_str()).unwrap_or_default();
        Ok(ApiValue::from(format!("<< {s} >>")))
    });
    let framed = remote
        .get("report")
        .expect("calculator exposes report")
        .invoke(vec![banner])
        .await?;
    println!("{}", framed.as_str().unwrap_or_default());

    Ok(())
}
