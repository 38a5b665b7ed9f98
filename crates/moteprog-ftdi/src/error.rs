use thiserror::Error;

pub type Result<T> = std::result::Result<T, FtdiBridgeError>;

#[derive(Debug, Error)]
pub enum FtdiBridgeError {
    #[error("could not open {board}: {reason}. Is the board plugged in and accessible?")]
    Open { board: &'static str, reason: String },

    #[error("FT232R configuration failed: {0}")]
    Config(String),
}
