//! Change reporting.

use serde_json::Value;

use crate::error::{ReconcileError, Result};
use crate::transport::HttpResponse;
use crate::types::{ChangeResult, RemoteItem};

/// Label of the read-only operation.
pub const READ_LABEL: &str = "get";

/// Whether a label never reports a change.
pub fn is_read_label(label: &str) -> bool {
    label == READ_LABEL || label == "list"
}

/// Build the result envelope for a normalized body.
///
/// `changed` is true only for a non-read label with a 2xx status. An `id`
/// attribute of an object body is copied up to the envelope.
pub fn report(value: Value, status: u16, operation: &str) -> ChangeResult {
    let changed = !is_read_label(operation) && (200..300).contains(&status);
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);

    ChangeResult {
        value,
        id,
        changed,
        status,
        operation: operation.to_string(),
    }
}

/// Build the result envelope for a remote item.
pub fn report_item(item: RemoteItem, status: u16, operation: &str) -> ChangeResult {
    let id = item.id.clone();
    report(item.into_value(), status, operation).with_id(id)
}

/// Fail on a 5xx answer, carrying its status and body text.
pub fn check_server_error(response: &HttpResponse) -> Result<()> {
    if response.is_server_error() {
        return Err(api_error(response));
    }
    Ok(())
}

/// An [`ReconcileError::Api`] for a response.
pub fn api_error(response: &HttpResponse) -> ReconcileError {
    ReconcileError::Api {
        status: response.status,
        body: response.text().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changed_flag() {
        assert!(report(json!({}), 201, "create").changed);
        assert!(report(json!({}), 204, "delete").changed);
        assert!(report(json!({}), 200, "connect").changed);
        assert!(!report(json!({}), 200, "get").changed);
        assert!(!report(json!([]), 200, "list").changed);
        assert!(!report(json!({}), 400, "update").changed);
        assert!(!report(json!({}), 404, "delete").changed);
    }

    #[test]
    fn test_id_copied_up() {
        let result = report(json!({"id": "lib-1", "name": "n"}), 200, "update");
        assert_eq!(result.id.as_deref(), Some("lib-1"));

        let result = report(json!("device-42"), 201, "create");
        assert_eq!(result.id, None);
    }

    #[test]
    fn test_report_item_prefers_item_id() {
        let item = RemoteItem::from_value(json!({"label": "Network adapter 1"}), Some("nic"));
        let item = RemoteItem::new(Some("4000".to_string()), item.attributes);
        let result = report_item(item, 200, "get");
        assert_eq!(result.id.as_deref(), Some("4000"));
        assert!(!result.changed);
    }

    #[test]
    fn test_check_server_error() {
        assert!(check_server_error(&HttpResponse::new(404)).is_ok());

        let mut response = HttpResponse::new(500);
        response.body = Some("{\"error_type\":\"INTERNAL\"}".to_string());
        let err = check_server_error(&response).unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(
            err.to_string(),
            "Request has failed: status=500, {\"error_type\":\"INTERNAL\"}"
        );
    }
}
