use rand::{
    thread_rng, Rng,
    distributions,
};

use crate::error::{Error, Result};


const ALLOWED_IMAGE_EXTS: [&'static str; 5] = ["jpeg", "jpg", "png", "webp", "heic"];


pub fn generate_rand_id(length: usize) -> String {
    thread_rng()
        .sample_iter(&distributions::Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Splits a `data:image/<ext>;base64,<payload>` URI into its extension and
/// decoded bytes.
pub fn decode_image_data_uri(data_uri: &str) -> Result<(String, Vec<u8>)> {
    let mut parts = data_uri.trim().splitn(2, ',');
    let header = parts.next().unwrap_or_default();
    let payload = parts.next()
        .ok_or_else(|| Error::validation("Invalid uri"))?;

    let ext = header.split('/').nth(1)
        .and_then(|x| x.split(';').next())
        .map(|x| x.to_ascii_lowercase())
        .ok_or_else(|| Error::validation("Invalid uri"))?;

    if !ALLOWED_IMAGE_EXTS.iter().any(|&x| x == ext) {
        return Err(Error::validation("Invalid extension"));
    }

    let bytes = base64::decode(payload)
        .map_err(|err| Error::validation(err.to_string()))?;
    if bytes.is_empty() {
        return Err(Error::validation("Empty image"));
    }

    Ok((ext, bytes))
}
