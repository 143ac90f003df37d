//! Migration engine settings.

/// Settings for a [`Migrator`](crate::Migrator).
///
/// The suffixes are part of the on-disk contract: changing them between
/// releases strands any export started by the previous version.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Appended to the main file name for the pending export set.
    pub pending_suffix: String,
    /// Appended to the main file name for the transient backup set.
    pub backup_suffix: String,
    /// Run a full integrity probe on the export before `start` returns.
    pub verify_export: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            pending_suffix: ".pending".to_string(),
            backup_suffix: ".backup".to_string(),
            verify_export: true,
        }
    }
}
