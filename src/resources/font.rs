use anyhow::Context;

use crate::{data_structures::text::Typeface, resources::AssetSource};

/// Loads a typeface JSON font (the format produced by facetype.js).
pub async fn load_typeface<S: AssetSource>(path: &str, source: &S) -> anyhow::Result<Typeface> {
    let data = source.fetch(path).await?;
    parse_typeface(&data).with_context(|| format!("{} is not a typeface font", path))
}

pub fn parse_typeface(data: &[u8]) -> anyhow::Result<Typeface> {
    let typeface: Typeface = serde_json::from_slice(data)?;
    if typeface.resolution <= 0.0 {
        anyhow::bail!("resolution must be positive, got {}", typeface.resolution);
    }
    Ok(typeface)
}
