//! Cloudinary signed-upload client.

use crate::config::CloudinaryConfig;
use anyhow::{anyhow, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::utils::signature::sha256_hex;

/// Largest accepted image, in bytes.
pub const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_FILES: usize = 10;
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "webp", "gif"];

#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// An image received from a client, ready to forward.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    /// Accept only images of an allowed type within the size limit.
    pub fn check(&self) -> Result<(), String> {
        let extension = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        let mime_subtype = self
            .content_type
            .strip_prefix("image/")
            .unwrap_or_default()
            .to_lowercase();

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str())
            || !ALLOWED_EXTENSIONS.contains(&mime_subtype.as_str())
        {
            return Err("Only image files are allowed (jpeg, jpg, png, webp, gif)".to_string());
        }
        if self.bytes.len() > MAX_FILE_BYTES {
            return Err("File too large. Maximum size is 5MB".to_string());
        }
        Ok(())
    }
}

/// Sign request parameters: sorted `key=value` pairs joined with `&`,
/// followed by the API secret, hashed with SHA-256.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    sha256_hex(format!("{}{}", joined, api_secret).as_bytes())
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.cloud_name.is_empty()
            && !self.config.api_key.is_empty()
            && !self.config.api_secret.expose_secret().is_empty()
    }

    pub fn default_folder(&self) -> &str {
        &self.config.default_folder
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            self.config.api_base_url, self.config.cloud_name, action
        )
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(anyhow!("Cloudinary credentials not configured"))
        }
    }

    pub async fn upload(&self, file: ImageFile, folder: &str) -> Result<UploadedImage> {
        self.ensure_configured()?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let params = [("folder", folder.to_string()), ("timestamp", timestamp.clone())];
        let signature = sign_params(&params, self.config.api_secret.expose_secret());

        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.content_type)?;
        let form = Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Cloudinary upload failed");
            return Err(anyhow!("Cloudinary upload failed: {}", body));
        }

        let uploaded: UploadResponse = serde_json::from_str(&body)?;
        tracing::info!(public_id = %uploaded.public_id, "Image uploaded");
        Ok(UploadedImage {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
            width: uploaded.width,
            height: uploaded.height,
        })
    }

    /// Delete an image. Returns Cloudinary's result string (`ok` or
    /// `not found`).
    pub async fn destroy(&self, public_id: &str) -> Result<String> {
        self.ensure_configured()?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let params = [
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp.clone()),
        ];
        let signature = sign_params(&params, self.config.api_secret.expose_secret());

        let form = [
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
            ("api_key", self.config.api_key.clone()),
            ("signature", signature),
            ("signature_algorithm", "sha256".to_string()),
        ];

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Cloudinary destroy failed");
            return Err(anyhow!("Cloudinary destroy failed: {}", body));
        }

        let destroyed: DestroyResponse = serde_json::from_str(&body)?;
        Ok(destroyed.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: "artisio".to_string(),
            api_key: "key_123".to_string(),
            api_secret: Secret::new("secret".to_string()),
            api_base_url: base_url.to_string(),
            default_folder: "artisio/products".to_string(),
        }
    }

    fn png(size: usize) -> ImageFile {
        ImageFile {
            file_name: "jar.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0u8; size],
        }
    }

    #[test]
    fn signature_sorts_params_and_appends_secret() {
        let signature = sign_params(
            &[("timestamp", "1700000000".into()), ("folder", "a/b".into())],
            "secret",
        );
        assert_eq!(
            signature,
            sha256_hex(b"folder=a/b&timestamp=1700000000secret")
        );
    }

    #[test]
    fn file_checks() {
        assert!(png(10).check().is_ok());
        assert!(png(MAX_FILE_BYTES + 1).check().is_err());

        let pdf = ImageFile {
            file_name: "menu.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: vec![1],
        };
        assert!(pdf.check().is_err());
    }

    #[tokio::test]
    async fn upload_returns_secure_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/artisio/image/upload"))
            .and(body_string_contains("key_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "secure_url": "https://res.cloudinary.com/artisio/image/upload/v1/artisio/products/jar.png",
                "public_id": "artisio/products/jar",
                "width": 800,
                "height": 600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CloudinaryClient::new(config(&server.uri()));
        let uploaded = client.upload(png(10), "artisio/products").await.unwrap();
        assert_eq!(uploaded.public_id, "artisio/products/jar");
        assert_eq!(uploaded.width, 800);
    }

    #[tokio::test]
    async fn destroy_reports_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/artisio/image/destroy"))
            .and(body_string_contains("public_id=artisio%2Fproducts%2Fjar"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "ok" })),
            )
            .mount(&server)
            .await;

        let client = CloudinaryClient::new(config(&server.uri()));
        assert_eq!(client.destroy("artisio/products/jar").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn unconfigured_client_errors() {
        let mut cfg = config("http://localhost:1");
        cfg.cloud_name = String::new();
        let client = CloudinaryClient::new(cfg);
        assert!(!client.is_configured());
        assert!(client.upload(png(1), "x").await.is_err());
    }
}
