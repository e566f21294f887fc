use crate::{data_structures::texture::TextureData, resources::AssetSource};

/// File extension used as decoding hint, if any.
pub fn extension(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.').map(|(_, ext)| ext)
}

/// Maps an image MIME type (`image/png`) to the extension the decoder knows.
pub fn mime_extension(mime_type: &str) -> Option<&str> {
    mime_type.split('/').next_back()
}

pub async fn load_texture<S: AssetSource>(path: &str, source: &S) -> anyhow::Result<TextureData> {
    let data = source.fetch(path).await?;
    TextureData::from_bytes(&data, path, extension(path))
}
