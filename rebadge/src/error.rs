use thiserror::Error;

#[derive(Error, Debug)]
pub enum RebadgeError {

    #[error("Input directory {path} not found")]
    InputDirNotFound { path: String },

    #[error("Unable to create directory {path}")]
    CannotCreateDir { path: String, source: std::io::Error },

    #[error("Unable to copy file from {path} to {destination}")]
    CannotCopyFile { path: String, destination: String, source: std::io::Error },

    #[error("Unable to move file from {path} to {destination}")]
    CannotMoveFile { path: String, destination: String, source: std::io::Error },

    #[error("Charter failed to load")]
    CharterLoadError ( #[from] rbcore::error::Error ),

    #[error("Date format '{format}' produced an invalid pattern")]
    InvalidDateFormat { format: String, source: regex::Error },

    #[error("Date format '{format}' contains an unsupported token")]
    UnsupportedDateFormat { format: String },

    #[error(transparent)]
    WalkError(#[from] walkdir::Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    GeneralError(#[from] anyhow::Error),
}
