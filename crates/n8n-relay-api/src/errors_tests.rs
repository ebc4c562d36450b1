//! Tests for HTTP error mapping.

use super::*;
use axum::body::to_bytes;

async fn envelope_of(response: Response) -> ResultEnvelope {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

mod query_handler_error_tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_query_maps_to_400_with_legacy_message() {
        let err = QueryHandlerError::EmptyQuery(ValidationError::Required {
            field: "query".to_string(),
        });

        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let envelope = envelope_of(response).await;
        assert!(!envelope.success);
        assert_eq!(envelope.message, "查询问题不能为空！");
        assert_eq!(envelope.result, None);
    }

    #[tokio::test]
    async fn test_downstream_status_maps_to_500() {
        let err: QueryHandlerError = ForwardError::UnexpectedStatus {
            status: 404,
            body: "not registered".to_string(),
        }
        .into();

        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            envelope_of(response).await.message,
            "n8n服务调用失败，状态码: 404"
        );
    }

    #[tokio::test]
    async fn test_transport_error_maps_to_500_with_detail() {
        let err: QueryHandlerError = ForwardError::Transport {
            message: "connection refused".to_string(),
        }
        .into();

        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = envelope_of(response).await.message;
        assert!(message.starts_with("查询过程中发生异常: "));
        assert!(message.contains("connection refused"));
    }
}

mod dingtalk_handler_error_tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_message_maps_to_400() {
        let err = DingTalkHandlerError::InvalidMessage(ValidationError::Required {
            field: "text.content".to_string(),
        });

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_forward_failure_maps_to_500() {
        let err = DingTalkHandlerError::ForwardFailed(ForwardError::UnexpectedStatus {
            status: 500,
            body: String::new(),
        });

        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!envelope_of(response).await.success);
    }
}

#[test]
fn test_config_error_converts_into_service_error() {
    let err: ServiceError = ConfigError::Missing {
        key: "dingtalk.app_secret".to_string(),
    }
    .into();

    assert_eq!(
        err.to_string(),
        "Configuration error: Missing required configuration: dingtalk.app_secret"
    );
}
