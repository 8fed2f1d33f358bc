use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlayerError>;

#[derive(Error, Debug, Clone)]
pub enum PlayerError {
    // The engine does not answer, or could not be started
    #[error("Playback engine unreachable: {0}")]
    EngineUnreachable(String),
    #[error("Playback engine command failed: {0}")]
    EngineCommand(String),
    #[error("No sheep available to play")]
    NoSheep,
    #[error("Sequencing failed: {0}")]
    Sequence(String),
}

impl PlayerError {
    pub fn unreachable(context: &str, err: impl std::fmt::Display) -> Self {
        PlayerError::EngineUnreachable(format!("{context}: {err}"))
    }

    pub fn command(context: &str, err: impl std::fmt::Display) -> Self {
        PlayerError::EngineCommand(format!("{context}: {err}"))
    }
}

impl From<electricsheep::Error> for PlayerError {
    fn from(err: electricsheep::Error) -> Self {
        PlayerError::Sequence(err.to_string())
    }
}
