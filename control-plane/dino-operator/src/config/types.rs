use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    #[envconfig(from = "HTTP_PORT", default = "8088")]
    pub http_port: u16,

    /// Restrict the watch to one namespace; all namespaces when unset.
    /// Env: DINO_WATCH_NAMESPACE
    #[envconfig(from = "DINO_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    #[envconfig(nested)]
    pub reconcile: ReconcileConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct ReconcileConfig {
    /// Periodic resync after a successful or absorbed pass (0 disables).
    /// Env: DINO_RESYNC_SECS
    #[envconfig(from = "DINO_RESYNC_SECS", default = "300")]
    pub resync_secs: u64,

    /// Requeue delay after a retryable error such as a status conflict.
    /// Env: DINO_CONFLICT_REQUEUE_SECS
    #[envconfig(from = "DINO_CONFLICT_REQUEUE_SECS", default = "5")]
    pub conflict_requeue_secs: u64,

    /// Deadline for a single reconcile pass (0 disables).
    /// Env: DINO_RECONCILE_TIMEOUT_SECS
    #[envconfig(from = "DINO_RECONCILE_TIMEOUT_SECS", default = "30")]
    pub timeout_secs: u64,

    /// Max concurrent reconciles across keys (0 = unbounded).
    /// Env: DINO_CONTROLLER_CONCURRENCY
    #[envconfig(from = "DINO_CONTROLLER_CONCURRENCY", default = "0")]
    pub concurrency: u16,
}

impl ReconcileConfig {
    pub fn resync(&self) -> Option<Duration> {
        (self.resync_secs > 0).then(|| Duration::from_secs(self.resync_secs))
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn conflict_requeue(&self) -> Duration {
        Duration::from_secs(self.conflict_requeue_secs)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            resync_secs: 300,
            conflict_requeue_secs: 5,
            timeout_secs: 30,
            concurrency: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_from_empty_env() {
        let cfg = OperatorConfig::init_from_hashmap(&HashMap::new()).unwrap();
        assert_eq!(cfg.http_port, 8088);
        assert_eq!(cfg.watch_namespace, None);
        assert_eq!(cfg.reconcile.resync(), Some(Duration::from_secs(300)));
        assert_eq!(cfg.reconcile.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.reconcile.conflict_requeue(), Duration::from_secs(5));
        assert_eq!(cfg.reconcile.concurrency, 0);
    }

    #[test]
    fn env_overrides_and_zero_disables() {
        let env: HashMap<String, String> = [
            ("HTTP_PORT", "9090"),
            ("DINO_WATCH_NAMESPACE", "aviary"),
            ("DINO_RESYNC_SECS", "0"),
            ("DINO_RECONCILE_TIMEOUT_SECS", "0"),
            ("DINO_CONFLICT_REQUEUE_SECS", "1"),
            ("DINO_CONTROLLER_CONCURRENCY", "4"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let cfg = OperatorConfig::init_from_hashmap(&env).unwrap();
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.watch_namespace.as_deref(), Some("aviary"));
        assert_eq!(cfg.reconcile.resync(), None);
        assert_eq!(cfg.reconcile.timeout(), None);
        assert_eq!(cfg.reconcile.conflict_requeue(), Duration::from_secs(1));
        assert_eq!(cfg.reconcile.concurrency, 4);
    }
}
