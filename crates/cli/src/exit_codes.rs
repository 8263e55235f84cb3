//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Domain    | Description                                        |
//! |------|-----------|----------------------------------------------------|
//! | 0    | Universal | Success (for `run`: no divergences)                |
//! | 1    | Universal | General error (unspecified)                        |
//! | 2    | Universal | CLI usage error (bad args, unreadable config file) |
//! | 3    | run       | Audit completed and found divergences              |
//! | 4    | config    | Config failed to parse or validate                 |
//! | 5    | sources   | A source table could not be read                   |
//! | 6    | export    | An export artifact could not be written            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` or the relevant command

use fuelaudit_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing config file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Audit (3-6)
// =============================================================================

/// The audit ran and found presence, date, type or value divergences.
/// Intra-source findings alone do not trigger it.
pub const EXIT_DIVERGENCES: u8 = 3;

/// Config TOML failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// A source file is missing, unreadable, or lacks the requested sheet.
pub const EXIT_SOURCE_UNAVAILABLE: u8 = 5;

/// Writing the JSON, XLSX or report output failed.
pub const EXIT_EXPORT_FAILED: u8 = 6;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        ReconError::SourceUnavailable { .. } => EXIT_SOURCE_UNAVAILABLE,
        ReconError::Export(_) => EXIT_EXPORT_FAILED,
        ReconError::DuplicateKey { .. } => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_DIVERGENCES,
            EXIT_INVALID_CONFIG,
            EXIT_SOURCE_UNAVAILABLE,
            EXIT_EXPORT_FAILED,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn engine_errors_map() {
        assert_eq!(recon_exit_code(&ReconError::ConfigParse("x".into())), EXIT_INVALID_CONFIG);
        assert_eq!(
            recon_exit_code(&ReconError::source_unavailable("PMM", "missing")),
            EXIT_SOURCE_UNAVAILABLE
        );
        assert_eq!(recon_exit_code(&ReconError::Export("disk full".into())), EXIT_EXPORT_FAILED);
        let duplicate = ReconError::DuplicateKey { source: "POSTO".into(), code: "0001".into(), count: 2 };
        assert_eq!(recon_exit_code(&duplicate), EXIT_ERROR);
    }
}
