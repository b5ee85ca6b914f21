//! Host memory and CPU sampling

use sysinfo::System;

/// Source of host utilization figures
///
/// `None` means the reading was unavailable; callers report it as zero.
#[cfg_attr(test, mockall::automock)]
pub trait HostProbe {
    /// Percentage of physical memory in use
    fn memory_used_pct(&mut self) -> Option<f64>;
    /// Percentage of CPU in use across all cores since the previous call
    fn cpu_used_pct(&mut self) -> Option<f64>;
}

/// `HostProbe` backed by sysinfo
///
/// The first CPU reading after construction is 0; later readings cover the
/// time since the previous call.
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn memory_used_pct(&mut self) -> Option<f64> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return None;
        }
        Some(self.system.used_memory() as f64 / total as f64 * 100.0)
    }

    fn cpu_used_pct(&mut self) -> Option<f64> {
        self.system.refresh_cpu_usage();
        let usage = f64::from(self.system.global_cpu_usage());
        usage.is_finite().then_some(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysinfo_readings_in_range() {
        let mut probe = SysinfoProbe::new();
        if let Some(mem) = probe.memory_used_pct() {
            assert!((0.0..=100.0).contains(&mem));
        }
        if let Some(cpu) = probe.cpu_used_pct() {
            assert!(cpu >= 0.0);
        }
    }
}
