//! HLS master-playlist quality resolver.
//!
//! Labels variants by resolution height ("1080p", "720p", ...) and adds
//! "best"/"worst" aliases for the highest and lowest bandwidth entries,
//! so the engine's preference ladders always have anchors to land on.

use async_trait::async_trait;
use capture_engine::{QualityResolver, ResolutionError, StreamSource, VariantMap};
use m3u8_rs::{MasterPlaylist, Playlist};
use reqwest::Client;
use tracing::debug;
use url::Url;

pub struct HlsVariantResolver {
    client: Client,
}

impl HlsVariantResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QualityResolver for HlsVariantResolver {
    async fn resolve(&self, stream_id: &str) -> Result<VariantMap, ResolutionError> {
        let base_url = Url::parse(stream_id).map_err(|_| ResolutionError::InvalidStream {
            stream_id: stream_id.to_string(),
        })?;

        let response = self
            .client
            .get(base_url.clone())
            .send()
            .await
            .map_err(|e| ResolutionError::network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionError::network(format!("HTTP {status}")));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| ResolutionError::network(e.to_string()))?;

        let playlist = m3u8_rs::parse_playlist_res(&body)
            .map_err(|e| ResolutionError::playlist(e.to_string()))?;

        match playlist {
            // A media playlist is a single quality; expose it under both
            // anchor labels so every ladder can select it.
            Playlist::MediaPlaylist(_) => {
                let mut variants = VariantMap::default();
                variants.insert("best".to_string(), StreamSource::new(stream_id));
                variants.insert("worst".to_string(), StreamSource::new(stream_id));
                Ok(variants)
            }
            Playlist::MasterPlaylist(playlist) => {
                let variants = variants_from_master(&playlist, &base_url)?;
                debug!(
                    labels = ?variants.keys().collect::<Vec<_>>(),
                    "resolved HLS variants"
                );
                Ok(variants)
            }
        }
    }
}

fn variants_from_master(
    playlist: &MasterPlaylist,
    base_url: &Url,
) -> Result<VariantMap, ResolutionError> {
    let mut entries: Vec<(u64, String)> = Vec::new();
    let mut variants = VariantMap::default();

    for variant in &playlist.variants {
        let Ok(variant_url) = base_url.join(&variant.uri) else {
            continue;
        };
        let url = variant_url.to_string();
        if let Some(resolution) = variant.resolution {
            // First entry wins when heights collide; playlists list
            // their preferred rendition first.
            variants
                .entry(format!("{}p", resolution.height))
                .or_insert_with(|| StreamSource::new(&url));
        }
        entries.push((variant.bandwidth, url));
    }

    if entries.is_empty() {
        return Err(ResolutionError::NoVariants);
    }

    entries.sort_by_key(|(bandwidth, _)| *bandwidth);
    if let Some((_, worst_url)) = entries.first() {
        variants.insert("worst".to_string(), StreamSource::new(worst_url));
    }
    if let Some((_, best_url)) = entries.last() {
        variants.insert("best".to_string(), StreamSource::new(best_url));
    }

    Ok(variants)
}
