use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Charter {path} not found")]
    CharterFileNotFound { path: String, source: std::io::Error },

    #[error("Charter {path} contains invalid configuration")]
    InvalidCharter { path: String, source: serde_yaml::Error },

    #[error("Charter configuration is invalid - {reason}")]
    CharterValidationError { reason: String },

    #[error("Mapping file {path} cannot be read")]
    CannotReadMapping { path: String, source: std::io::Error },

    #[error("Mapping file {path} contains an invalid row")]
    InvalidMappingRow { path: String, source: csv::Error },

    #[error("Mapping file {path} cannot be created")]
    CannotCreateMapping { path: String, source: std::io::Error },
}
