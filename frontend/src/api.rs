use gloo_file::File as GlooFile;
use gloo_net::http::Request;
use shared::{ErrorResponse, SegmentationResponse};

pub const SEGMENT_URL: &str = "/api/segment";

/// Posts one image as the `image` field of a multipart form.
pub async fn send_segmentation_request(file: &GlooFile) -> Result<SegmentationResponse, String> {
    let form_data =
        web_sys::FormData::new().map_err(|_| "Failed to create form data.".to_string())?;
    form_data
        .append_with_blob_and_filename("image", file.as_ref(), &file.name())
        .map_err(|_| "Failed to attach image to request.".to_string())?;

    let request = Request::post(SEGMENT_URL)
        .body(form_data)
        .map_err(|e| format!("Failed to build request: {}", e))?;

    let response = request
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;

    if response.ok() {
        return response
            .json::<SegmentationResponse>()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e));
    }

    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => Err(body.error),
        Err(_) => Err(format!("Server error: {}", status)),
    }
}
