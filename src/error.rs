/*!
Error types for loading cartridges and configuring the console.

Nothing in here is produced inside `Console::tick()`: a tick has no failure
path. Illegal opcodes surface through `ConsoleStatus::Jammed` instead.
*/

use std::path::PathBuf;

/// Problems detected while parsing an iNES image.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("invalid iNES magic (expected \"NES\\x1A\")")]
    BadMagic,

    #[error("image truncated: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("NES 2.0 headers are not supported")]
    Nes2Unsupported,

    #[error("image declares no PRG ROM")]
    NoPrgRom,

    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u16),
}

/// Crate-level error.
#[derive(thiserror::Error, Debug)]
pub enum EmuError {
    #[error("cartridge error: {0}")]
    Cartridge(#[from] CartridgeError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("console is not powered on")]
    NotPowered,
}

pub type Result<T> = std::result::Result<T, EmuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartridge_error_converts_into_emu_error() {
        let err: EmuError = CartridgeError::UnsupportedMapper(7).into();
        assert!(matches!(
            err,
            EmuError::Cartridge(CartridgeError::UnsupportedMapper(7))
        ));
        assert_eq!(err.to_string(), "cartridge error: unsupported mapper 7");
    }

    #[test]
    fn truncated_message_names_sizes() {
        let err = CartridgeError::Truncated {
            expected: 16400,
            actual: 16,
        };
        assert_eq!(err.to_string(), "image truncated: need 16400 bytes, got 16");
    }
}
