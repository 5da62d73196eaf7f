//! Offline replay of a recorded point file.
//!
//! Builds the exhibit exactly as it would be shown, optionally probes its
//! media, then follows every SubPath on the virtual clock.

use crate::context::SimContext;
use datapath_core::{
    load_points, BuildError, ConfigError, ExhibitConfig, ExhibitRuntime, FileMediaResolver, FollowState, Interaction,
    KinematicBody, PathBuilder, SubPathId,
};
use datapath_env::{EnvError, ExhibitContext, MediaProbe};
use nalgebra::Vector3;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Media validation failed: {0}")]
    Media(#[from] EnvError),
}

/// Outcome of replaying one SubPath.
#[derive(Debug, Clone, Serialize)]
pub struct SubPathReplay {
    pub sub_path: SubPathId,
    pub content: String,
    pub points: usize,
    pub duration_secs: f64,
    pub following: bool,
    pub state: FollowState,
    /// Virtual seconds the replay took
    pub replay_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReplayReport {
    pub name: String,
    pub points: usize,
    pub sub_paths: Vec<SubPathReplay>,
    pub media_dropped: usize,
}

impl FileReplayReport {
    /// True if every followable SubPath finished.
    pub fn passed(&self) -> bool {
        self.sub_paths
            .iter()
            .filter(|sp| sp.following)
            .all(|sp| sp.state == FollowState::Finished)
    }
}

/// Loads `input`, builds the exhibit and replays it.
pub async fn replay_file<P: MediaProbe>(
    input: &Path,
    config: ExhibitConfig,
    seed: u64,
    probe: Option<Arc<P>>,
) -> Result<FileReplayReport, ReplayError> {
    config.validate()?;
    let points = load_points(input, &config.import)?;

    let resolver = FileMediaResolver::new(config.media.clone());
    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.name.clone());
    let path = PathBuilder::new(&resolver)
        .with_settings(config.import.clone())
        .with_name(name.clone())
        .build(&points)?;

    let context = SimContext::shared(seed);
    let mut runtime = ExhibitRuntime::new(context.clone(), config, path);

    let media_dropped = match probe {
        Some(probe) => {
            let checks = runtime.validate_media(probe).await?;
            checks.iter().filter(|c| !c.reachable).count()
        }
        None => 0,
    };

    let mut sub_paths = Vec::new();
    for id in (0..runtime.path.sub_paths().len()).map(SubPathId) {
        let Some(sub_path) = runtime.path.sub_path(id) else { continue };
        debug!("{}", sub_path.summary());
        let (content, len, duration) = (sub_path.content.clone(), sub_path.len(), sub_path.duration_secs());
        let start = sub_path.points.first().map(|p| p.position).unwrap_or_else(Vector3::zeros);

        let started = context.now().as_secs_f64();
        let outcome = match runtime.interact(id, Interaction::Spot) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Cannot replay sub-path {}: {}", id, e);
                continue;
            }
        };
        runtime.video_prepared();

        let state = if outcome.following {
            let mut body = KinematicBody::new(runtime.path.origin() + start);
            let budget = ((duration * 2.0 + 5.0) * runtime.config.tick_rate_hz as f64).ceil() as u64;
            runtime.run(&mut body, budget).await
        } else {
            runtime.follower.state()
        };

        sub_paths.push(SubPathReplay {
            sub_path: id,
            content,
            points: len,
            duration_secs: duration,
            following: outcome.following,
            state,
            replay_secs: context.now().as_secs_f64() - started,
        });
    }

    info!(
        "Replayed {}: {} points, {} sub-paths, {} media dropped",
        name,
        points.len(),
        sub_paths.len(),
        media_dropped
    );
    Ok(FileReplayReport {
        name,
        points: points.len(),
        sub_paths,
        media_dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("datapath-replay-{}", nanos));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    const WALK: &str = r#"{"points": [
        {"id": 0, "location": {"x": 0.0, "y": 0.0, "z": 0.0}, "timestamp": "2024-01-01T00:00:00Z", "content": "a.mp4"},
        {"id": 1, "location": {"x": 1.0, "y": 0.0, "z": 0.0}, "timestamp": "2024-01-01T00:00:01Z", "content": "a.mp4"},
        {"id": 2, "location": {"x": 2.0, "y": 0.0, "z": 0.0}, "timestamp": "2024-01-01T00:00:02Z", "content": "b.mp4"},
        {"id": 3, "location": {"x": 3.0, "y": 0.0, "z": 0.0}, "timestamp": "garbage", "content": "b.mp4"}
    ]}"#;

    #[tokio::test]
    async fn test_replay_file() {
        let input = temp_file("walk.json", WALK);
        let mut config = ExhibitConfig::default();
        config.media.video_source = datapath_core::VideoSource::Url;

        let report = replay_file::<crate::SimProbe>(&input, config, 1, None).await.unwrap();

        assert_eq!(report.name, "walk");
        assert_eq!(report.points, 4);
        assert_eq!(report.sub_paths.len(), 2);
        assert!(report.sub_paths[0].following);
        assert_eq!(report.sub_paths[0].state, FollowState::Finished);
        assert!((report.sub_paths[0].replay_secs - 1.0).abs() < 0.1);
        assert!(!report.sub_paths[1].following);
        assert!(report.passed());
    }

    #[tokio::test]
    async fn test_replay_rejects_invalid_config() {
        let input = temp_file("walk.json", WALK);
        let mut config = ExhibitConfig::default();
        config.follower.speed_scale = 50.0;

        let result = replay_file::<crate::SimProbe>(&input, config, 1, None).await;
        assert!(matches!(result, Err(ReplayError::Config(_))));
    }
}
