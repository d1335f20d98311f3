// Inline binary artifacts (plots, screenshots) into `html`-formatted test output
use base64::{engine::general_purpose, Engine as _};

/// `<img>` tag carrying `bytes` as a `data:` URI of the given MIME type
pub fn bytes_to_html_img(bytes: &[u8], mime: &str) -> String {
    format!(r#"<img src="data:{};base64,{}" />"#, mime, general_purpose::STANDARD.encode(bytes))
}

/// `<img>` tag for an already JPEG-encoded image
pub fn image_to_html(jpeg: &[u8]) -> String {
    bytes_to_html_img(jpeg, "image/jpeg")
}
