use std::time::Duration;

use clap::Parser;

/// CSV lifecycle controller config.
#[derive(Debug, Parser)]
#[non_exhaustive]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The namespace to watch; ignored when `cluster_wide` is set.
    #[arg(long, default_value = "default")]
    pub namespace: String,
    /// Watch every namespace, ignoring `namespace`.
    #[arg(long, default_value = "false")]
    pub cluster_wide: bool,
    /// Whether to create the CSV/OperatorGroup CRDs regardless of the
    /// version already installed on the cluster.
    #[arg(long, default_value = "false")]
    pub create_crd: bool,

    /// Certificate validity period, in days.
    #[arg(long, default_value = "730")]
    pub cert_valid_for_days: u64,
    /// Minimum remaining freshness before a certificate is rotated, in days.
    #[arg(long, default_value = "60")]
    pub cert_min_fresh_days: u64,
    /// How long to wait for `Installer::check_installed` to report healthy
    /// before failing the `Installing` phase.
    #[arg(long, default_value = "300")]
    pub install_timeout_secs: u64,

    /// Base delay for the per-queue exponential back-off, in milliseconds.
    #[arg(long, default_value = "1000")]
    pub backoff_base_millis: u64,
    /// Back-off ceiling, in seconds.
    #[arg(long, default_value = "600")]
    pub backoff_ceiling_secs: u64,

    /// Listen address for the `/healthz` and `/metrics` endpoints.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen_addr: String,
}

impl Config {
    #[must_use]
    pub fn cert_valid_for(&self) -> Duration {
        Duration::from_secs(self.cert_valid_for_days.saturating_mul(24 * 3600))
    }

    #[must_use]
    pub fn cert_min_fresh(&self) -> Duration {
        Duration::from_secs(self.cert_min_fresh_days.saturating_mul(24 * 3600))
    }

    #[must_use]
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_millis)
    }

    #[must_use]
    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_secs(self.backoff_ceiling_secs)
    }

    #[must_use]
    pub fn transition_config(&self) -> csv_core::TransitionConfig {
        csv_core::TransitionConfig {
            cert_valid_for: self.cert_valid_for(),
            cert_min_fresh: self.cert_min_fresh(),
            install_timeout: self.install_timeout(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn durations_convert_from_config_units() {
        let config = Config {
            namespace: "default".to_owned(),
            cluster_wide: false,
            create_crd: false,
            cert_valid_for_days: 730,
            cert_min_fresh_days: 60,
            install_timeout_secs: 300,
            backoff_base_millis: 1000,
            backoff_ceiling_secs: 600,
            listen_addr: "0.0.0.0:8080".to_owned(),
        };
        assert_eq!(config.cert_valid_for(), Duration::from_secs(730 * 24 * 3600));
        assert_eq!(config.install_timeout(), Duration::from_secs(300));
        assert_eq!(config.backoff_base(), Duration::from_millis(1000));
    }
}
