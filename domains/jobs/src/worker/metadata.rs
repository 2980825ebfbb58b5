//! Strips identifying metadata from provider output before it is persisted
//! (spec.md section 4.5 step 5: "strip identifying metadata from the
//! returned image, upload under ..."). Grounded on
//! `original_source/services/worker/openai_client.py::_strip_exif_data`,
//! which re-encodes JPEG output through Pillow and leaves anything else
//! untouched.

use bytes::Bytes;

/// Re-encodes JPEG output through the `image` crate, which does not carry
/// forward EXIF/APP1 metadata segments on encode. Any other content type
/// passes through unchanged, and a decode/encode failure falls back to the
/// original bytes rather than failing the job over a privacy nicety —
/// mirroring `_strip_exif_data`'s own try/except-and-return-original shape.
pub fn strip_identifying_metadata(bytes: Bytes, content_type: &str) -> Bytes {
    if content_type != "image/jpeg" {
        return bytes;
    }

    let image = match image::load_from_memory(&bytes) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!(error = %e, "failed to decode provider output for metadata strip, using raw bytes");
            return bytes;
        }
    };

    let mut buf = std::io::Cursor::new(Vec::new());
    match image.write_to(&mut buf, image::ImageFormat::Jpeg) {
        Ok(()) => Bytes::from(buf.into_inner()),
        Err(e) => {
            tracing::warn!(error = %e, "failed to re-encode provider output for metadata strip, using raw bytes");
            bytes
        }
    }
}
