use crate::domain::model::ObjectHandle;
use crate::domain::ports::ObjectStore;
use crate::utils::error::{CloudError, Result};
use std::path::{Component, Path, PathBuf};

/// Bucket-scoped convenience wrapper over an [`ObjectStore`] backend.
pub struct Bucket<S: ObjectStore> {
    store: S,
    scheme: String,
}

impl<S: ObjectStore> Bucket<S> {
    pub fn new(store: S, scheme: impl Into<String>) -> Self {
        Self {
            store,
            scheme: scheme.into(),
        }
    }

    pub fn name(&self) -> &str {
        self.store.bucket()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `scheme://bucket/key`
    pub fn uri(&self, key: &str) -> String {
        format!("{}{}", self.uri_prefix(), key)
    }

    fn uri_prefix(&self) -> String {
        format!("{}://{}/", self.scheme, self.store.bucket())
    }

    /// 取得物件參照，不做任何網路存取，也不確認物件是否存在
    pub fn get(&self, key: &str) -> ObjectHandle {
        ObjectHandle {
            bucket: self.store.bucket().to_string(),
            key: key.to_string(),
        }
    }

    /// 下載單一物件到 `local_path`，必要時建立上層目錄。
    /// 物件不存在時回傳 NotFound，且不會建立任何本地檔案。
    pub async fn download(&self, key: &str, local_path: impl AsRef<Path>) -> Result<()> {
        let local_path = local_path.as_ref();
        let data = self.store.read_object(key).await?;

        write_local(local_path, &data).await?;
        tracing::debug!("Downloaded {} -> {}", self.uri(key), local_path.display());
        Ok(())
    }

    /// 下載 prefix 底下的所有物件到 `local_dir`，保留相對路徑結構。
    /// 回傳寫入的檔案數；沒有符合的物件時回傳 0。
    pub async fn download_prefix(&self, prefix: &str, local_dir: impl AsRef<Path>) -> Result<usize> {
        let local_dir = local_dir.as_ref();
        let prefix = normalize_prefix(prefix);
        let objects = self.store.list_objects(&prefix).await?;
        tracing::debug!("Found {} objects under {}", objects.len(), self.uri(&prefix));

        let mut downloaded = 0;
        for object in objects {
            let Some(relative) = object.name.strip_prefix(prefix.as_str()) else {
                continue;
            };
            // 空字串或以 / 結尾的是目錄標記物件
            if relative.is_empty() || relative.ends_with('/') {
                continue;
            }

            let relative = safe_relative_path(relative)?;
            let data = self.store.read_object(&object.name).await?;
            write_local(&local_dir.join(relative), &data).await?;
            downloaded += 1;
        }

        tracing::info!(
            "Downloaded {} objects from {} to {}",
            downloaded,
            self.uri(&prefix),
            local_dir.display()
        );
        Ok(downloaded)
    }

    /// 上傳本地檔案，覆寫同名物件
    pub async fn upload(&self, local_path: impl AsRef<Path>, key: &str) -> Result<()> {
        let local_path = local_path.as_ref();
        let data = tokio::fs::read(local_path).await?;
        let content_type = guess_content_type(local_path);

        self.store.write_object(key, data, content_type).await?;
        tracing::debug!("Uploaded {} -> {}", local_path.display(), self.uri(key));
        Ok(())
    }

    pub async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> Result<()> {
        let size = data.len();
        self.store.write_object(key, data, content_type).await?;
        tracing::debug!("Uploaded {} bytes -> {}", size, self.uri(key));
        Ok(())
    }

    /// Strips `scheme://bucket/` from `uri`. URIs for other buckets or schemes
    /// are returned unchanged.
    pub fn extract_key(&self, uri: &str) -> String {
        self.try_extract_key(uri).unwrap_or(uri).to_string()
    }

    /// Like [`Bucket::extract_key`] but `None` when `uri` is not in this bucket.
    pub fn try_extract_key<'a>(&self, uri: &'a str) -> Option<&'a str> {
        uri.strip_prefix(self.uri_prefix().as_str())
    }
}

/// "a/b" 與 "a/b/" 視為相同；結果一定以 / 結尾，空字串會變成 "/"
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

/// Keeps a remote key from escaping the download directory.
fn safe_relative_path(relative: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(CloudError::validation(format!(
                    "Object path escapes the download directory: {}",
                    relative
                )));
            }
        }
    }
    Ok(path)
}

async fn write_local(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, data).await?;
    Ok(())
}

pub fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("json") => "application/json",
        Some("jsonl") => "application/jsonl",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
