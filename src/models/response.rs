use serde::Serialize;

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Payload for mutations that report a human-readable outcome alongside the record.
#[derive(Debug, Serialize)]
pub struct MessageResponse<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<T>,
}

impl<T> MessageResponse<T> {
    pub fn new(message: impl Into<String>, item: T) -> Self {
        Self {
            message: message.into(),
            item: Some(item),
        }
    }
}

impl MessageResponse<()> {
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            item: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_response_success_sets_flag() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, "ok");
    }

    #[test]
    fn message_only_omits_item() {
        let json = serde_json::to_value(MessageResponse::message_only("done")).unwrap();
        assert_eq!(json["message"], "done");
        assert!(json.get("item").is_none());
    }
}
