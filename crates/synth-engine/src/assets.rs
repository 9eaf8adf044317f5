//! Resolving frame URLs into drawable images.
//!
//! The primary strategy fetches the frame as a blob (CORS, no credentials)
//! and decodes it through a temporary object URL, which keeps cross-origin
//! frames drawable. When that fails the image is loaded directly with an
//! anonymous cross-origin attribute. Object URLs created along the way are
//! registered with the session's [`HandleRegistry`] and released by the
//! reclamation routine, never by the loader.

use lapse_common::cancel::CancellationToken;
use lapse_common::error::{LapseError, LapseResult};
use lapse_media_core::fetch::{CrossOrigin, FetchOptions, ObjectUrl};
use lapse_media_core::platform::Platform;
use lapse_media_core::surface::DecodedImage;

use crate::model::FrameSet;
use crate::registry::HandleRegistry;

/// A decoded frame, bound to the object URL it was decoded from (if any).
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub image: DecodedImage,
    pub handle: Option<ObjectUrl>,
}

/// Loads frames through the platform's fetcher and decoders.
#[derive(Debug)]
pub struct AssetLoader<'a> {
    platform: &'a Platform,
}

impl<'a> AssetLoader<'a> {
    pub fn new(platform: &'a Platform) -> Self {
        Self { platform }
    }

    /// Load one image, trying the blob strategy first.
    pub async fn load(&self, url: &str, registry: &mut HandleRegistry) -> LapseResult<LoadedAsset> {
        let primary = match self.load_via_blob(url, registry).await {
            Ok(asset) => return Ok(asset),
            Err(e) => e,
        };
        tracing::debug!(url, error = %primary, "Blob strategy failed, loading directly");

        match self
            .platform
            .direct_loader
            .load(url, CrossOrigin::Anonymous)
            .await
        {
            Ok(image) => Ok(LoadedAsset {
                image,
                handle: None,
            }),
            Err(secondary) => Err(LapseError::fetch(
                url,
                format!("blob strategy: {primary}; direct strategy: {secondary}"),
            )),
        }
    }

    async fn load_via_blob(
        &self,
        url: &str,
        registry: &mut HandleRegistry,
    ) -> LapseResult<LoadedAsset> {
        let blob = self
            .platform
            .fetcher
            .fetch(url, FetchOptions::ANONYMOUS_CORS)
            .await?;
        let handle = registry.register(blob);
        let blob = registry
            .resolve(&handle)
            .ok_or_else(|| LapseError::decode(format!("Object URL {handle} does not resolve")))?;
        let image = self.platform.image_decoder.decode(blob).await?;
        Ok(LoadedAsset {
            image,
            handle: Some(handle),
        })
    }

    /// Load every frame sequentially, in order.
    ///
    /// The first failure aborts the whole load with an error naming the
    /// frame's index and URL; no partial set is returned.
    pub async fn load_all(
        &self,
        frames: &FrameSet,
        registry: &mut HandleRegistry,
        cancel: &CancellationToken,
    ) -> LapseResult<Vec<LoadedAsset>> {
        let mut assets = Vec::with_capacity(frames.len());
        for (index, frame) in frames.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(LapseError::Cancelled);
            }
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LapseError::Cancelled),
                result = self.load(&frame.url, registry) => result,
            };
            match result {
                Ok(asset) => {
                    tracing::debug!(
                        index,
                        width = asset.image.width(),
                        height = asset.image.height(),
                        "Frame loaded"
                    );
                    assets.push(asset);
                }
                Err(e) => {
                    tracing::error!(index, url = %frame.url, error = %e, "Frame failed to load");
                    return Err(LapseError::asset_load(index, &frame.url, e.to_string()));
                }
            }
        }
        Ok(assets)
    }
}
