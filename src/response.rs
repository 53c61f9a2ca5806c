use serde::Serialize;

/// JSON envelope shared by every `/api` route.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), message: None, count: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn list(items: Vec<T>) -> Self {
        let count = items.len();
        Self { success: true, data: Some(items), message: None, count: Some(count) }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self { success: true, data: None, message: Some(message.into()), count: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { success: false, data: None, message: Some(message.into()), count: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_sets_count_and_omits_message() {
        let body = serde_json::to_value(ApiResponse::list(vec![1, 2, 3])).unwrap();
        assert_eq!(body, json!({ "success": true, "data": [1, 2, 3], "count": 3 }));
    }

    #[test]
    fn error_has_no_data() {
        let body = serde_json::to_value(ApiResponse::error("nope")).unwrap();
        assert_eq!(body, json!({ "success": false, "message": "nope" }));
    }
}
