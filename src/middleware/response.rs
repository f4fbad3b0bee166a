use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{Map, Value};

/// Success envelope: `{status: "success", results?, token?, message?, data?}`
#[derive(Debug)]
pub struct ApiResponse {
    status_code: StatusCode,
    data: Option<Value>,
    results: Option<usize>,
    token: Option<String>,
    message: Option<String>,
    cookie: Option<HeaderValue>,
}

impl ApiResponse {
    fn with_status(status_code: StatusCode) -> Self {
        Self {
            status_code,
            data: None,
            results: None,
            token: None,
            message: None,
            cookie: None,
        }
    }

    /// Create a successful API response with default 200 status
    pub fn success(data: Value) -> Self {
        Self::with_status(StatusCode::OK).data(data)
    }

    /// Create a 201 Created response
    pub fn created(data: Value) -> Self {
        Self::with_status(StatusCode::CREATED).data(data)
    }

    /// 200 with a bare `{status: "success"}`
    pub fn ok() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// 204; nothing but the status line and headers is sent
    pub fn no_content() -> Self {
        Self::with_status(StatusCode::NO_CONTENT)
    }

    /// 200 carrying only a message
    pub fn message(message: impl Into<String>) -> Self {
        let mut response = Self::with_status(StatusCode::OK);
        response.message = Some(message.into());
        response
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn results(mut self, results: usize) -> Self {
        self.results = Some(results);
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Attach a `Set-Cookie` header
    pub fn cookie(mut self, cookie: Option<HeaderValue>) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn envelope(&self) -> Value {
        let mut body = Map::new();
        body.insert("status".to_string(), Value::String("success".to_string()));
        if let Some(results) = self.results {
            body.insert("results".to_string(), Value::from(results));
        }
        if let Some(token) = &self.token {
            body.insert("token".to_string(), Value::String(token.clone()));
        }
        if let Some(message) = &self.message {
            body.insert("message".to_string(), Value::String(message.clone()));
        }
        if let Some(data) = &self.data {
            body.insert("data".to_string(), data.clone());
        }
        Value::Object(body)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = if self.status_code == StatusCode::NO_CONTENT {
            self.status_code.into_response()
        } else {
            (self.status_code, Json(self.envelope())).into_response()
        };

        if let Some(cookie) = self.cookie {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        response
    }
}
