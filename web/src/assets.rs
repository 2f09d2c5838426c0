//! Swappable static-asset slots.
//!
//! Each slot serves one directory of the active theme through `ServeDir`.
//! Theme activation re-roots the slot in place; the route itself never
//! changes, so the router does not need rebuilding on reload.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tower::ServiceExt;
use tower::util::BoxCloneService;
use tower_http::services::ServeDir;
use trellis_core::{AssetMount, AssetSlotKind};

#[derive(Debug, Clone)]
struct Mounted {
    root: PathBuf,
    cache_control: HeaderValue,
}

/// One asset slot, mounted at [`AssetSlotKind::prefix`].
#[derive(Debug)]
pub struct AssetSlot {
    kind: AssetSlotKind,
    mounted: RwLock<Option<Mounted>>,
}

impl AssetSlot {
    /// An unmounted slot; it answers 404 until the first remount.
    #[must_use]
    pub fn new(kind: AssetSlotKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            mounted: RwLock::new(None),
        })
    }

    /// Serve one request from the current root.
    pub async fn serve(&self, req: Request) -> Response {
        let Some(mounted) = self
            .mounted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            return StatusCode::NOT_FOUND.into_response();
        };

        let mut response = match ServeDir::new(&mounted.root).oneshot(req).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        };
        if response.status().is_success() {
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, mounted.cache_control);
        }
        response
    }

    /// A service to nest under [`AssetSlotKind::prefix`].
    #[must_use]
    pub fn service(self: &Arc<Self>) -> BoxCloneService<Request, Response, Infallible> {
        let slot = Arc::clone(self);
        BoxCloneService::new(tower::service_fn(move |req: Request| {
            let slot = Arc::clone(&slot);
            async move { Ok::<_, Infallible>(slot.serve(req).await) }
        }))
    }
}

impl AssetMount for AssetSlot {
    fn kind(&self) -> AssetSlotKind {
        self.kind
    }

    fn remount(&self, root: &Path, cache_ttl: u64) {
        let cache_control = HeaderValue::from_str(&format!("public, max-age={cache_ttl}"))
            .unwrap_or_else(|_| HeaderValue::from_static("no-cache"));
        tracing::info!(slot = %self.kind, root = %root.display(), cache_ttl, "Asset slot mounted");
        *self.mounted.write().unwrap_or_else(PoisonError::into_inner) = Some(Mounted {
            root: root.to_path_buf(),
            cache_control,
        });
    }

    fn root(&self) -> Option<PathBuf> {
        self.mounted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|m| m.root.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    fn get(path: &str) -> Request {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn unmounted_slot_answers_not_found() {
        let slot = AssetSlot::new(AssetSlotKind::Static);
        let response = slot.serve(get("/logo.png")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(slot.root(), None);
    }

    #[tokio::test]
    async fn serves_files_with_cache_headers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("site.css"), "body {}").unwrap();
        let slot = AssetSlot::new(AssetSlotKind::Styles);
        slot.remount(dir.path(), 300);

        let response = slot.serve(get("/site.css")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=300"
        );
    }

    #[tokio::test]
    async fn remount_switches_roots() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("a.txt"), "a").unwrap();
        std::fs::write(second.path().join("b.txt"), "b").unwrap();
        let slot = AssetSlot::new(AssetSlotKind::Static);

        slot.remount(first.path(), 0);
        assert_eq!(slot.serve(get("/a.txt")).await.status(), StatusCode::OK);

        slot.remount(second.path(), 0);
        assert_eq!(slot.serve(get("/a.txt")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(slot.serve(get("/b.txt")).await.status(), StatusCode::OK);
        assert_eq!(slot.root(), Some(second.path().to_path_buf()));
    }
}
