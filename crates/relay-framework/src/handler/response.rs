use serde_json::Value;

use relay_core::{BoxError, Reply, Response};

/// A trait for handler return values.
///
/// Errors returned by a handler propagate out of the dispatch; everything else
/// becomes the [`Response`] handed back to the transport.
pub trait IntoResponse {
    fn into_response(self) -> Result<Response, BoxError>;
}

/// `()` produces an empty response.
impl IntoResponse for () {
    fn into_response(self) -> Result<Response, BoxError> {
        Ok(Response::empty())
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> Result<Response, BoxError> {
        Ok(self)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Result<Response, BoxError> {
        Ok(self.into())
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Result<Response, BoxError> {
        Ok(Response::text(self))
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Result<Response, BoxError> {
        Ok(Response::text(self))
    }
}

impl IntoResponse for Value {
    fn into_response(self) -> Result<Response, BoxError> {
        Ok(Response::json(self))
    }
}

/// On `None`, an empty response is produced.
impl<T: IntoResponse> IntoResponse for Option<T> {
    fn into_response(self) -> Result<Response, BoxError> {
        match self {
            Some(t) => t.into_response(),
            None => Ok(Response::empty()),
        }
    }
}

/// On `Err`, the error is propagated to the dispatcher.
impl<T, E> IntoResponse for Result<T, E>
where
    T: IntoResponse,
    E: Into<BoxError>,
{
    fn into_response(self) -> Result<Response, BoxError> {
        self.map_err(Into::into)?.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_becomes_text() {
        let res = "hi".to_string().into_response().unwrap();
        assert_eq!(res.as_text(), Some("hi"));
    }

    #[test]
    fn test_none_is_empty() {
        let res = None::<String>.into_response().unwrap();
        assert!(res.is_empty());
    }

    #[test]
    fn test_err_propagates() {
        let res: Result<String, BoxError> = Err("boom".into());
        let err = res.into_response().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
