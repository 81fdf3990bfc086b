use thiserror::Error;

/// Failure of a single request to the weather provider.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The provider answered but refused the lookup, e.g. an unknown place name.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request could not be completed.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with something we could not read.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response contained no {0}")]
    MissingData(&'static str),
}

/// Failure of the one-shot position lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    Unavailable(String),

    #[error("no location source configured")]
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_displays_provider_message_verbatim() {
        let err = WeatherError::Rejected {
            status: 404,
            message: "city not found".into(),
        };
        assert_eq!(err.to_string(), "city not found");
        assert_eq!(
            WeatherError::MissingData("samples").to_string(),
            "response contained no samples"
        );
    }
}
