use serde::{Deserialize, Serialize};

use crate::types::Token;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserTokenRequest {
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetTopSubjectsRequest {
    pub subjects: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub id: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            id: token.id,
            is_admin: token.is_admin,
            user_id: token.user_id,
            created_at: token.created_at,
            expires_at: token.expires_at,
            last_used_at: token.last_used_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    pub token: String,
    pub metadata: TokenResponse,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Review body. The rating is checked by the handler so that fractional or
/// out-of-range values get a 400 with a useful message.
#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: RatingValue,
    #[serde(default)]
    pub comment: String,
}

/// A rating as sent by clients: a JSON number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RatingValue {
    Number(serde_json::Number),
    Text(String),
}

impl RatingValue {
    /// The whole-number value, if there is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(body: &str) -> Option<i64> {
        serde_json::from_str::<CreateReviewRequest>(body)
            .unwrap()
            .rating
            .as_integer()
    }

    #[test]
    fn test_rating_accepts_numbers_and_numeric_strings() {
        assert_eq!(rating(r#"{"rating": 4}"#), Some(4));
        assert_eq!(rating(r#"{"rating": "5"}"#), Some(5));
        assert_eq!(rating(r#"{"rating": " 3 "}"#), Some(3));
        assert_eq!(rating(r#"{"rating": -2}"#), Some(-2));
    }

    #[test]
    fn test_rating_rejects_fractions_and_words() {
        assert_eq!(rating(r#"{"rating": 4.5}"#), None);
        assert_eq!(rating(r#"{"rating": "4.5"}"#), None);
        assert_eq!(rating(r#"{"rating": "four"}"#), None);
        assert!(serde_json::from_str::<CreateReviewRequest>(r#"{"comment": "x"}"#).is_err());
        assert!(serde_json::from_str::<CreateReviewRequest>(r#"{"rating": true}"#).is_err());
    }
}
