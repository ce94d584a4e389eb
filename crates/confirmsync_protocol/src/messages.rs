//! Remote store messages.
//!
//! Bodies are JSON. Annotation fields use snake_case names; the bulk update
//! count is sent as `updatedCount` and also accepted as `updated_count`.

use crate::annotation::FieldAnnotation;
use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};

/// Response to a fetch of all annotations of a site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// Every stored annotation of the site.
    #[serde(default)]
    pub annotations: Vec<FieldAnnotation>,
}

impl FetchResponse {
    /// Creates a new fetch response.
    pub fn new(annotations: Vec<FieldAnnotation>) -> Self {
        Self { annotations }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    ///
    /// A bare JSON array of annotations is accepted as well.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Body {
            Wrapped(FetchResponse),
            Bare(Vec<FieldAnnotation>),
        }

        Ok(match serde_json::from_slice::<Body>(bytes)? {
            Body::Wrapped(response) => response,
            Body::Bare(annotations) => Self { annotations },
        })
    }
}

/// Batch of annotation deltas for one site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateRequest {
    /// Deltas, at most one per field.
    pub annotations: Vec<FieldAnnotation>,
}

impl BulkUpdateRequest {
    /// Creates a new bulk update request.
    pub fn new(annotations: Vec<FieldAnnotation>) -> Self {
        Self { annotations }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Result of a bulk update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateResponse {
    /// Number of annotations the store wrote.
    #[serde(rename = "updatedCount", alias = "updated_count", default)]
    pub updated_count: u64,
    /// Stored state of every annotation the batch touched.
    #[serde(default)]
    pub annotations: Vec<FieldAnnotation>,
}

impl BulkUpdateResponse {
    /// Creates a response echoing the stored annotations.
    pub fn new(annotations: Vec<FieldAnnotation>) -> Self {
        Self {
            updated_count: annotations.len() as u64,
            annotations,
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::LastSelected;
    use crate::error::ProtocolError;

    #[test]
    fn fetch_response_accepts_bare_array() {
        let body = br#"[{"field_name":"website","is_pre_filled":true,"last_selected":"pre_filled"}]"#;
        let response = FetchResponse::decode(body).unwrap();

        assert_eq!(response.annotations.len(), 1);
        assert_eq!(response.annotations[0], FieldAnnotation::pre_filled("website"));
    }

    #[test]
    fn fetch_response_wrapped() {
        let response = FetchResponse::new(vec![FieldAnnotation::pre_filled("phone")]);
        let decoded = FetchResponse::decode(&response.encode().unwrap()).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn bulk_update_response_count_names() {
        let camel = br#"{"updatedCount":2,"annotations":[]}"#;
        assert_eq!(BulkUpdateResponse::decode(camel).unwrap().updated_count, 2);

        let snake = br#"{"updated_count":3}"#;
        let response = BulkUpdateResponse::decode(snake).unwrap();
        assert_eq!(response.updated_count, 3);
        assert!(response.annotations.is_empty());

        let encoded = BulkUpdateResponse::new(vec![]).encode().unwrap();
        assert!(String::from_utf8(encoded).unwrap().contains("updatedCount"));
    }

    #[test]
    fn bulk_update_request_wire_shape() {
        let mut a = FieldAnnotation::pre_filled("website");
        a.is_confirmed = true;
        a.last_selected = LastSelected::Confirmed;

        let json: serde_json::Value =
            serde_json::from_slice(&BulkUpdateRequest::new(vec![a]).encode().unwrap()).unwrap();
        let entry = &json["annotations"][0];
        assert_eq!(entry["field_name"], "website");
        assert_eq!(entry["is_confirmed"], true);
        assert_eq!(entry["last_selected"], "confirmed");
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = BulkUpdateRequest::decode(b"not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Json(_)));
    }
}
