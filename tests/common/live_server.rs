//! A real backend on an ephemeral port, for client tests

#![allow(dead_code)]

use cli_handoff::server::{AppState, ServerConfig, router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct LiveServer {
    pub addr: SocketAddr,
    pub state: AppState,
    task: JoinHandle<()>,
}

impl LiveServer {
    /// Start a server where every browser is signed in as `dev_user`
    pub async fn start(dev_user: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut config = ServerConfig::new(addr).unwrap();
        config.poll_interval = Duration::from_secs(1);
        config.dev_user = Some(dev_user.to_string());
        let state = AppState::from_config(config).unwrap();

        let app = router(state.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, task }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for LiveServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
