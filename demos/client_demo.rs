//! Linelog Client Example
//!
//! Starts a throwaway server, sends a few lines from concurrent clients,
//! prints every reply, then shuts the server down.

use linelog::client::LogClient;
use linelog::config::ServerConfig;
use linelog::server::LogServer;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting Linelog Client Example");

    let temp_dir = tempdir()?;
    let mut config = ServerConfig::default();
    config.server.bind_address = "127.0.0.1".to_string();
    config.server.port = 0;
    config.storage.data_file = temp_dir.path().join("linelog_example.data");
    config.annotator.interval_secs = 1;

    let server = LogServer::bind(config).await?;
    let address = server.local_addr()?.to_string();
    let shutdown = server.shutdown_handle();
    let server_handle = tokio::spawn(server.run());

    println!("Server listening on {}", address);

    let mut handles = vec![];
    for i in 0..3 {
        let address = address.clone();
        handles.push(tokio::spawn(async move {
            let client = LogClient::connect(&address).await?;
            client.send_line(&format!("message from client {}", i)).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let reply = handle.await??;
        println!("--- reply to client {} ---", i);
        print!("{}", String::from_utf8_lossy(&reply));
    }

    // let the annotator add a timestamp
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let reply = LogClient::connect(&address).await?.send_line("last").await?;
    println!("--- final log ---");
    print!("{}", String::from_utf8_lossy(&reply));

    shutdown.trigger();
    let report = server_handle.await??;
    println!(
        "Server stopped: {} connections, data file removed: {}",
        report.connections_accepted, report.data_file_removed
    );
    Ok(())
}
