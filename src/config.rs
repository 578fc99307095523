use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::JobSignal;

/// Application name presented to the scheduler when opening a session.
pub const DEFAULT_APP_NAME: &str = "batchctl";

/// Delay between successive status checks in wait loops.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Locations of the LSF command-line tools used by [`crate::lsf::LsfClient`].
#[derive(Debug, Clone)]
pub struct LsfConfig {
    /// Directory holding the LSF binaries. When unset the tools are looked
    /// up on `PATH`.
    pub bin_dir: Option<PathBuf>,
    pub lsid: String,
    pub bsub: String,
    pub bjobs: String,
    pub bkill: String,
}

impl Default for LsfConfig {
    fn default() -> Self {
        Self {
            bin_dir: None,
            lsid: "lsid".to_string(),
            bsub: "bsub".to_string(),
            bjobs: "bjobs".to_string(),
            bkill: "bkill".to_string(),
        }
    }
}

impl LsfConfig {
    pub fn with_bin_dir(mut self, bin_dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = Some(bin_dir.into());
        self
    }

    /// Resolve a tool name against `bin_dir`.
    pub fn program(&self, tool: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub app_name: String,
    pub poll_interval: Duration,
    /// Signal sent by `kill` and `batch_kill`.
    pub kill_signal: JobSignal,
    pub lsf: LsfConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            kill_signal: JobSignal::Terminate,
            lsf: LsfConfig::default(),
        }
    }
}

impl ControlConfig {
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_kill_signal(mut self, signal: JobSignal) -> Self {
        self.kill_signal = signal;
        self
    }

    pub fn with_lsf(mut self, lsf: LsfConfig) -> Self {
        self.lsf = lsf;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_config_default() {
        let cfg = ControlConfig::default();
        assert_eq!(cfg.app_name, "batchctl");
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.kill_signal, JobSignal::Terminate);
        assert!(cfg.lsf.bin_dir.is_none());
    }

    #[test]
    fn control_config_builders() {
        let cfg = ControlConfig::default()
            .with_app_name("pipeline")
            .with_poll_interval(Duration::from_millis(250))
            .with_kill_signal(JobSignal::Kill);
        assert_eq!(cfg.app_name, "pipeline");
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.kill_signal, JobSignal::Kill);
    }

    #[test]
    fn lsf_program_uses_path_lookup_without_bin_dir() {
        let cfg = LsfConfig::default();
        assert_eq!(cfg.program("bsub"), PathBuf::from("bsub"));
    }

    #[test]
    fn lsf_program_joins_bin_dir() {
        let cfg = LsfConfig::default().with_bin_dir("/opt/lsf/bin");
        assert_eq!(cfg.program("bjobs"), PathBuf::from("/opt/lsf/bin/bjobs"));
    }
}
