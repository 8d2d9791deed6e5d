use thiserror::Error;

pub type Result<T> = std::result::Result<T, CountriesError>;

#[derive(Debug, Error)]
pub enum CountriesError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unknown country: {0}")]
    UnknownCountry(String),
}
