use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::models::UserId;

/// Заголовок с id пользователя. Аутентификацию выполняет шлюз перед
/// сервисом, сюда приходит уже проверенный идентификатор.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, format!("{} header is required", USER_ID_HEADER)))?;

        let user_id: UserId = raw
            .trim()
            .parse()
            .map_err(|_| (StatusCode::BAD_REQUEST, format!("{} must be an integer", USER_ID_HEADER)))?;

        if user_id <= 0 {
            return Err((StatusCode::BAD_REQUEST, format!("{} must be > 0", USER_ID_HEADER)));
        }

        Ok(CallerId(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<CallerId, (StatusCode, String)> {
        let mut builder = Request::builder().uri("/api/bookings");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CallerId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_user_id_header() {
        assert_eq!(extract(Some("42")).await.unwrap(), CallerId(42));
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        assert_eq!(extract(None).await.unwrap_err().0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_positive_id_is_bad_request() {
        assert_eq!(extract(Some("0")).await.unwrap_err().0, StatusCode::BAD_REQUEST);
        assert_eq!(extract(Some("abc")).await.unwrap_err().0, StatusCode::BAD_REQUEST);
    }
}
