use super::Constraints;
use crate::config::CameraConfig;

/// Fallback resolution tried after the preferred one
const FALLBACK_RESOLUTION: (u32, u32) = (640, 480);

/// Ordered constraint sets, most specific first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintLadder {
    levels: Vec<Constraints>,
}

impl ConstraintLadder {
    /// Ladder from explicit levels; repeated levels are dropped
    pub fn new(levels: impl IntoIterator<Item = Constraints>) -> Self {
        let mut out: Vec<Constraints> = Vec::new();
        for level in levels {
            if !out.contains(&level) {
                out.push(level);
            }
        }
        Self { levels: out }
    }

    /// Default ladder:
    /// `{device?, facing, preferred}` -> `{facing, preferred}` ->
    /// `{facing, 640x480}` -> `{facing}` -> `{}`
    pub fn from_config(config: &CameraConfig) -> Self {
        let facing = Constraints::any().with_facing(config.facing);
        let preferred = facing.clone().with_resolution(config.width, config.height);
        let mut levels = Vec::with_capacity(5);
        if let Some(id) = &config.device_id {
            levels.push(preferred.clone().with_device(id.clone()));
        }
        levels.push(preferred);
        levels.push(
            facing
                .clone()
                .with_resolution(FALLBACK_RESOLUTION.0, FALLBACK_RESOLUTION.1),
        );
        levels.push(facing);
        levels.push(Constraints::any());
        Self::new(levels)
    }

    pub fn levels(&self) -> &[Constraints] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraints> {
        self.levels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Facing;

    #[test]
    fn default_ladder_relaxes_step_by_step() {
        let ladder = ConstraintLadder::from_config(&CameraConfig::default());
        let rendered: Vec<String> = ladder.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "facing=environment,1280x720",
                "facing=environment,640x480",
                "facing=environment",
                "any",
            ]
        );
    }

    #[test]
    fn selected_device_heads_the_ladder() {
        let config = CameraConfig {
            device_id: Some("cam-7".into()),
            facing: Facing::User,
            ..CameraConfig::default()
        };
        let ladder = ConstraintLadder::from_config(&config);
        assert_eq!(ladder.len(), 5);
        assert_eq!(ladder.levels()[0].device_id.as_deref(), Some("cam-7"));
        assert!(ladder.levels()[1..].iter().all(|c| c.device_id.is_none()));
    }

    #[test]
    fn preferred_fallback_resolution_is_not_repeated() {
        let config = CameraConfig {
            width: 640,
            height: 480,
            ..CameraConfig::default()
        };
        assert_eq!(ConstraintLadder::from_config(&config).len(), 3);
    }
}
