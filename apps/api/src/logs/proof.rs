//! Proof-of-intake photos. They arrive inline as base64 data URLs and are moved
//! to the object store; the log keeps only the resulting URL.

use std::future::Future;
use std::time::Duration;

use aws_sdk_s3::primitives::ByteStream;
use base64::Engine;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adherence::slots::TimeSlot;

#[derive(Debug, Error)]
pub enum ProofUploadError {
    #[error("proof photo must be a data URL")]
    NotADataUrl,

    #[error("Base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("proof photo is empty")]
    Empty,

    #[error("S3 upload failed: {0}")]
    Upload(String),
}

/// A decoded photo and where it will be stored.
#[derive(Debug)]
pub struct ProofPhoto {
    pub bytes: Vec<u8>,
    pub key: String,
    pub content_type: &'static str,
}

impl ProofPhoto {
    pub fn from_data_url(
        data_url: &str,
        account_id: Uuid,
        medication_id: Uuid,
        slot: &TimeSlot,
        millis: i64,
    ) -> Result<Self, ProofUploadError> {
        let bytes = decode_data_url(data_url)?;
        if bytes.is_empty() {
            return Err(ProofUploadError::Empty);
        }
        let extension = detect_extension(&bytes);
        Ok(Self {
            key: proof_object_key(account_id, medication_id, slot, millis, extension),
            content_type: content_type(extension),
            bytes,
        })
    }
}

fn decode_data_url(data_url: &str) -> Result<Vec<u8>, ProofUploadError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or(ProofUploadError::NotADataUrl)?;
    let (_, payload) = rest.split_once(',').ok_or(ProofUploadError::NotADataUrl)?;
    Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
}

/// File extension from magic bytes; unrecognised data is treated as JPEG.
fn detect_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        "png"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "webp"
    } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        "heic"
    } else {
        "jpg"
    }
}

fn content_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

pub fn proof_object_key(
    account_id: Uuid,
    medication_id: Uuid,
    slot: &TimeSlot,
    millis: i64,
    extension: &str,
) -> String {
    let slot: String = slot
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("proof-photos/{account_id}/proof_{account_id}_{medication_id}_{slot}_{millis}.{extension}")
}

pub fn public_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/'))
}

pub async fn upload_proof(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    photo: ProofPhoto,
) -> Result<String, ProofUploadError> {
    s3.put_object()
        .bucket(bucket)
        .key(&photo.key)
        .body(ByteStream::from(photo.bytes))
        .content_type(photo.content_type)
        .send()
        .await
        .map_err(|e| ProofUploadError::Upload(e.to_string()))?;

    info!("Uploaded proof photo to s3://{}/{}", bucket, photo.key);
    Ok(photo.key)
}

/// Runs an upload with an upper bound; an elapsed bound counts as a failed upload.
async fn upload_within<F>(limit: Duration, upload: F) -> Result<String, ProofUploadError>
where
    F: Future<Output = Result<String, ProofUploadError>>,
{
    tokio::time::timeout(limit, upload).await.unwrap_or_else(|_| {
        Err(ProofUploadError::Upload(format!(
            "timed out after {}ms",
            limit.as_millis()
        )))
    })
}

fn recorded_url(
    uploaded: Result<String, ProofUploadError>,
    endpoint: &str,
    bucket: &str,
    data_url: &str,
) -> String {
    match uploaded {
        Ok(key) => public_url(endpoint, bucket, &key),
        Err(e) => {
            warn!("{e}; keeping the inline proof photo instead");
            data_url.to_string()
        }
    }
}

/// Stores the photo and returns the URL to record on the log. When the upload
/// fails or outlasts `limit` the data URL itself is recorded so the proof is not lost.
pub async fn store_proof_photo(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    endpoint: &str,
    photo: ProofPhoto,
    data_url: &str,
    limit: Duration,
) -> String {
    let uploaded = upload_within(limit, upload_proof(s3, bucket, photo)).await;
    recorded_url(uploaded, endpoint, bucket, data_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn data_url(bytes: &[u8], mime: &str) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        format!("data:{mime};base64,{encoded}")
    }

    #[test]
    fn test_decode_jpeg_data_url() {
        let bytes = decode_data_url("data:image/jpeg;base64,/9j/4AAQ").unwrap();
        assert_eq!(detect_extension(&bytes), "jpg");
    }

    #[test]
    fn test_raw_base64_rejected() {
        assert!(matches!(
            decode_data_url("/9j/4AAQ"),
            Err(ProofUploadError::NotADataUrl)
        ));
    }

    #[test]
    fn test_bad_base64_rejected() {
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@@"),
            Err(ProofUploadError::Decode(_))
        ));
    }

    #[test]
    fn test_photo_key_and_type() {
        let account = Uuid::new_v4();
        let medication = Uuid::new_v4();
        let photo = ProofPhoto::from_data_url(
            &data_url(&PNG_HEADER, "image/png"),
            account,
            medication,
            &TimeSlot::Evening,
            1_700_000_000_000,
        )
        .unwrap();

        assert_eq!(
            photo.key,
            format!("proof-photos/{account}/proof_{account}_{medication}_Evening_1700000000000.png")
        );
        assert_eq!(photo.content_type, "image/png");
    }

    #[test]
    fn test_custom_slot_is_sanitized_in_key() {
        let key = proof_object_key(
            Uuid::nil(),
            Uuid::nil(),
            &TimeSlot::from("after lunch/2"),
            1,
            "jpg",
        );
        assert!(key.ends_with("_after-lunch-2_1.jpg"));
    }

    #[test]
    fn test_empty_photo_rejected() {
        let result = ProofPhoto::from_data_url(
            "data:image/jpeg;base64,",
            Uuid::nil(),
            Uuid::nil(),
            &TimeSlot::Morning,
            0,
        );
        assert!(matches!(result, Err(ProofUploadError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_upload_keeps_inline_photo() {
        let inline = data_url(&PNG_HEADER, "image/png");
        let uploaded = upload_within(Duration::from_millis(8000), async {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok("proof-photos/a/b.png".to_string())
        })
        .await;

        assert!(matches!(&uploaded, Err(ProofUploadError::Upload(msg)) if msg.contains("8000ms")));
        assert_eq!(
            recorded_url(uploaded, "http://localhost:9000", "proofs", &inline),
            inline
        );
    }

    #[tokio::test]
    async fn test_finished_upload_records_public_url() {
        let uploaded =
            upload_within(Duration::from_millis(8000), async { Ok("proof-photos/a/b.png".into()) })
                .await;
        assert_eq!(
            recorded_url(uploaded, "http://localhost:9000", "proofs", "data:,"),
            "http://localhost:9000/proofs/proof-photos/a/b.png"
        );
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("http://localhost:9000/", "proofs", "proof-photos/a/b.jpg"),
            "http://localhost:9000/proofs/proof-photos/a/b.jpg"
        );
    }
}
