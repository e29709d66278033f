use serde::{Deserialize, Serialize};

use crate::domain::EmployeeId;

/// Server-side description of one stored image. `path` is relative to the
/// server origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImageRecord {
    pub title: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeGallery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<EmployeeId>,
    pub images: Vec<StoredImageRecord>,
}

/// Body of a successful `POST /upload`: the employee document after the
/// upload, with the full image list nested inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub employee: EmployeeGallery,
}

/// Body of a successful `GET /images/{employeeId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub images: Vec<StoredImageRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_response_decodes_nested_employee_images() {
        let body = r#"{
            "employee": {
                "employeeId": "E123",
                "images": [
                    {"title": "Badge", "path": "uploads/badge.png"},
                    {"title": "Untitled", "path": "uploads/second.jpg"}
                ]
            }
        }"#;

        let decoded: UploadResponse = serde_json::from_str(body).expect("decode");
        assert_eq!(decoded.employee.employee_id, Some(EmployeeId::new("E123")));
        assert_eq!(decoded.employee.images.len(), 2);
        assert_eq!(decoded.employee.images[0].title, "Badge");
        assert_eq!(decoded.employee.images[1].path, "uploads/second.jpg");
    }

    #[test]
    fn images_response_tolerates_missing_employee_id() {
        let body = r#"{"images": []}"#;
        let decoded: ImagesResponse = serde_json::from_str(body).expect("decode");
        assert!(decoded.images.is_empty());
    }
}
