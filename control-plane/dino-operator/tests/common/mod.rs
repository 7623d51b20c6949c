#![allow(dead_code)]

use std::time::Duration;

use dino_operator::crd::{Beak, Bird};
use kube::{
    Client,
    api::{Api, DeleteParams},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// DNS-1123 safe numeric suffix for unique names
pub const DIGITS: [char; 10] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
pub fn uniq(prefix: &str) -> String {
    format!("{prefix}-{}", nanoid::nanoid!(6, &DIGITS))
}

/// Stops a background controller and removes test objects on drop.
pub struct ControllerGuard {
    ns: String,
    name: String,
    client: Client,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ControllerGuard {
    pub fn new(ns: &str, name: &str, client: Client) -> Self {
        Self {
            ns: ns.to_string(),
            name: name.to_string(),
            client,
            shutdown: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn with_controller(mut self, handle: JoinHandle<()>) -> Self {
        self.handle = Some(handle);
        self
    }
}

impl Drop for ControllerGuard {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(h) = self.handle.take() {
            h.abort();
        }
        let client = self.client.clone();
        let ns = self.ns.clone();
        let name = self.name.clone();
        // best-effort; the controller is gone, so nobody releases the finalizer
        tokio::spawn(async move { cleanup_k8s(&ns, &name, client).await });
    }
}

pub async fn cleanup_k8s(ns: &str, name: &str, client: Client) {
    let birds: Api<Bird> = Api::namespaced(client.clone(), ns);
    let beaks: Api<Beak> = Api::namespaced(client, ns);
    if let Ok(Some(mut bird)) = birds.get_opt(name).await {
        bird.metadata.finalizers = None;
        let _ = birds
            .replace(name, &Default::default(), &bird)
            .await;
    }
    let _ = birds.delete(name, &DeleteParams::default()).await;
    let _ = beaks.delete(name, &DeleteParams::default()).await;
}

pub async fn wait_for<T, F, Fut>(what: &str, mut probe: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    for _ in 0..30 {
        if let Some(v) = probe().await {
            return v;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    panic!("{what} not observed in time");
}
