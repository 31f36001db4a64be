/*!
 * Shard Count Selection
 *
 * CPU-topology-aware shard counts for the sharded map. A caller that does not
 * want to pick a fixed shard count describes its expected contention instead,
 * and the count is derived once from the host's available parallelism.
 *
 * Shard counts are always powers of two so shard routing is a bitwise AND.
 */

use std::sync::OnceLock;
use tracing::{info, warn};

/// Global singleton for hardware-aware shard selection
static SHARD_MANAGER: OnceLock<ShardManager> = OnceLock::new();

/// Lower bound for derived shard counts
pub const MIN_SHARDS: usize = 8;

/// Upper bound for derived shard counts
pub const MAX_SHARDS: usize = 512;

/// Hardware-aware shard count calculator
#[derive(Debug, Clone)]
pub struct ShardManager {
    cpu_count: usize,
}

impl ShardManager {
    fn instance() -> &'static Self {
        SHARD_MANAGER.get_or_init(|| {
            let cpu_count = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Failed to detect CPU count, defaulting to 8");
                    8
                });

            info!(cpu_count, "ShardManager initialized");
            Self { cpu_count }
        })
    }

    /// Shard count for a workload profile
    pub fn shards(profile: WorkloadProfile) -> usize {
        Self::shards_for(Self::instance().cpu_count, profile)
    }

    /// Shard count for an explicit CPU count
    ///
    /// Split out from [`ShardManager::shards`] so the rounding and clamping
    /// rules can be checked independently of the host.
    pub fn shards_for(cpu_count: usize, profile: WorkloadProfile) -> usize {
        let calculated = (cpu_count.max(1) * profile.multiplier()).next_power_of_two();
        calculated.clamp(MIN_SHARDS, MAX_SHARDS)
    }

    /// CPU count detected at initialization
    pub fn cpu_count() -> usize {
        Self::instance().cpu_count
    }
}

/// Expected contention on a sharded container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadProfile {
    /// Many threads hammering overlapping key ranges: 4x CPU shards
    HighContention,

    /// Mixed access: 2x CPU shards
    #[default]
    MediumContention,

    /// Mostly single-threaded or read-only access: 1x CPU shards
    LowContention,
}

impl WorkloadProfile {
    #[inline]
    const fn multiplier(self) -> usize {
        match self {
            WorkloadProfile::HighContention => 4,
            WorkloadProfile::MediumContention => 2,
            WorkloadProfile::LowContention => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_calculation() {
        for profile in [
            WorkloadProfile::HighContention,
            WorkloadProfile::MediumContention,
            WorkloadProfile::LowContention,
        ] {
            let shards = ShardManager::shards(profile);
            assert!(shards.is_power_of_two(), "Shards must be power of 2");
            assert!(shards >= MIN_SHARDS);
            assert!(shards <= MAX_SHARDS);
        }
    }

    #[test]
    fn test_contention_ordering() {
        let high = ShardManager::shards(WorkloadProfile::HighContention);
        let medium = ShardManager::shards(WorkloadProfile::MediumContention);
        let low = ShardManager::shards(WorkloadProfile::LowContention);

        assert!(high >= medium);
        assert!(medium >= low);
    }

    #[test]
    fn test_clamping() {
        assert_eq!(ShardManager::shards_for(1, WorkloadProfile::LowContention), 8);
        assert_eq!(ShardManager::shards_for(0, WorkloadProfile::LowContention), 8);
        assert_eq!(ShardManager::shards_for(12, WorkloadProfile::MediumContention), 32);
        assert_eq!(ShardManager::shards_for(1024, WorkloadProfile::HighContention), 512);
    }

    #[test]
    fn test_singleton_consistency() {
        assert_eq!(ShardManager::cpu_count(), ShardManager::cpu_count());
    }
}
