//! API request/response types

use serde::Serialize;

/// Successful prediction response
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    /// Predicted species name
    pub prediction: String,
    /// Probability of the winning class as a percentage, two decimals
    pub confidence: f64,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Server status, always "ready" once startup completed
    pub status: String,
    /// Number of species in the label table
    pub labels: usize,
    /// Application version
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_response_shape() {
        let resp = PredictionResponse {
            prediction: "House Sparrow".to_string(),
            confidence: 97.42,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["prediction"], "House Sparrow");
        assert_eq!(json["confidence"], 97.42);
    }

    #[test]
    fn test_error_response_shape() {
        let resp = ErrorResponse {
            error: "No file provided".to_string(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"], "No file provided");
    }
}
