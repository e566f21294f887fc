use std::{fmt, future::Future, sync::Arc};

use futures::future::try_join_all;

use crate::data_structures::{text::Typeface, texture::TextureData};

/**
 * This module contains all logic for loading meshes, textures and fonts from external files.
 *
 * Every request is turned into its own future; [`load_all`] drives them concurrently and
 * joins them at a single point. Bytes come from an [`AssetSource`] so that tests and other
 * hosts can provide their own storage.
 */
pub mod font;
pub mod mesh;
pub mod texture;

pub use mesh::{MeshData, MeshNodeData, MeshPrimitive};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Mesh,
    Texture,
    Font,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssetKind::Mesh => "mesh",
            AssetKind::Texture => "texture",
            AssetKind::Font => "font",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRequest {
    pub kind: AssetKind,
    pub path: String,
}

impl AssetRequest {
    pub fn new(kind: AssetKind, path: &str) -> Self {
        Self {
            kind,
            path: path.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Asset {
    Mesh(MeshData),
    Texture(Arc<TextureData>),
    Font(Arc<Typeface>),
}

impl Asset {
    pub fn kind(&self) -> AssetKind {
        match self {
            Asset::Mesh(_) => AssetKind::Mesh,
            Asset::Texture(_) => AssetKind::Texture,
            Asset::Font(_) => AssetKind::Font,
        }
    }
}

/// A decoded asset together with the path it was requested under.
#[derive(Clone, Debug)]
pub struct SceneResource {
    pub path: String,
    pub asset: Asset,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to load {kind} `{path}`")]
pub struct AssetLoadError {
    pub kind: AssetKind,
    pub path: String,
    #[source]
    pub source: anyhow::Error,
}

/// Where asset bytes come from.
pub trait AssetSource {
    fn fetch(&self, path: &str) -> impl Future<Output = anyhow::Result<Vec<u8>>>;
}

/// The `assets` directory next to the executable's working directory, or
/// `<origin>/assets/` when running in a browser.
#[derive(Clone, Debug)]
pub struct AssetDir {
    #[cfg(not(target_arch = "wasm32"))]
    root: std::path::PathBuf,
}

impl AssetDir {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            root: std::path::Path::new("./").join("assets"),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn with_root(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for AssetDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("window has no origin"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

impl AssetSource for AssetDir {
    async fn fetch(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = format_url(path)?;
            reqwest::get(url)
                .await?
                .error_for_status()?
                .bytes()
                .await?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = tokio::fs::read(self.root.join(path)).await?;

        Ok(data)
    }
}

/// Resolves `uri` against the directory of `base`, the way relative
/// references inside a glTF file are meant.
pub fn relative_to(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], uri),
        None => uri.to_string(),
    }
}

/// Loads and decodes one asset.
pub async fn load_resource<S: AssetSource>(
    request: &AssetRequest,
    source: &S,
) -> Result<SceneResource, AssetLoadError> {
    let wrap = |source: anyhow::Error| AssetLoadError {
        kind: request.kind,
        path: request.path.clone(),
        source,
    };
    let asset = match request.kind {
        AssetKind::Mesh => Asset::Mesh(mesh::load_gltf(&request.path, source).await.map_err(wrap)?),
        AssetKind::Texture => Asset::Texture(Arc::new(
            texture::load_texture(&request.path, source).await.map_err(wrap)?,
        )),
        AssetKind::Font => Asset::Font(Arc::new(
            font::load_typeface(&request.path, source).await.map_err(wrap)?,
        )),
    };
    log::debug!("Loaded {} {}", request.kind, request.path);
    Ok(SceneResource {
        path: request.path.clone(),
        asset,
    })
}

/// Loads all requests concurrently. The result keeps the order of `requests`;
/// the first failure aborts the whole batch.
pub async fn load_all<S: AssetSource>(
    requests: &[AssetRequest],
    source: &S,
) -> Result<Vec<SceneResource>, AssetLoadError> {
    try_join_all(requests.iter().map(|request| load_resource(request, source))).await
}
