//! Roadmap document types.
//!
//! A roadmap is an ordered list of steps. Every step carries an ordered list of
//! topic names and a parallel list of video reference lists: `videos[i]`
//! always belongs to `topics[i]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single illustrative video for a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VideoReference {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub channel: String,
    /// ISO-8601 duration as reported by the provider (e.g. `PT12M3S`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// One step of a learning roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RoadmapStep {
    /// 1-based position of the step in the roadmap.
    pub step_number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub topics: Vec<String>,
    /// Video lists aligned with `topics`.
    pub videos: Vec<Vec<VideoReference>>,
}

impl RoadmapStep {
    /// Create a step whose topics carry empty video lists.
    pub fn new(
        step_number: u32,
        title: impl Into<String>,
        description: Option<String>,
        topics: Vec<String>,
    ) -> Self {
        let videos = vec![Vec::new(); topics.len()];
        Self {
            step_number,
            title: title.into(),
            description,
            topics,
            videos,
        }
    }

    /// Replace the video lists, padding or truncating to the topic count so
    /// that the positional alignment always holds.
    pub fn with_videos(mut self, mut videos: Vec<Vec<VideoReference>>) -> Self {
        videos.resize_with(self.topics.len(), Vec::new);
        self.videos = videos;
        self
    }

    /// Iterate `(topic, videos)` pairs in topic order.
    pub fn topic_videos(&self) -> impl Iterator<Item = (&str, &[VideoReference])> {
        self.topics
            .iter()
            .map(String::as_str)
            .zip(self.videos.iter().map(Vec::as_slice))
    }

    /// Number of topics that have at least one video.
    pub fn enriched_topic_count(&self) -> usize {
        self.videos.iter().filter(|v| !v.is_empty()).count()
    }
}

/// The cached roadmap document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RoadmapPayload {
    pub program: String,
    pub steps: Vec<RoadmapStep>,
    pub generated_at: DateTime<Utc>,
}

impl RoadmapPayload {
    pub fn new(
        program: impl Into<String>,
        steps: Vec<RoadmapStep>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            program: program.into(),
            steps,
            generated_at,
        }
    }

    /// Look up a step by its 1-based number.
    pub fn step(&self, step_number: u32) -> Option<&RoadmapStep> {
        self.steps.iter().find(|s| s.step_number == step_number)
    }

    pub fn topic_count(&self) -> usize {
        self.steps.iter().map(|s| s.topics.len()).sum()
    }

    /// True when no topic in any step has videos.
    pub fn is_unenriched(&self) -> bool {
        self.steps.iter().all(|s| s.enriched_topic_count() == 0)
    }
}

/// A curriculum step as produced by the synthesizer, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CurriculumStep {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub topics: Vec<String>,
}

/// Ordered prerequisite layers for a program, shallowest prerequisites first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrerequisiteSkeleton {
    pub program: String,
    pub levels: Vec<Vec<String>>,
}

impl PrerequisiteSkeleton {
    /// A skeleton with no known prerequisites.
    pub fn empty(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            levels: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(Vec::is_empty)
    }

    pub fn course_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

/// Videos for one topic of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TopicVideos {
    pub topic: String,
    pub videos: Vec<VideoReference>,
}

/// Result of enriching a single requested step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StepVideos {
    pub program: String,
    pub step_number: u32,
    pub topics: Vec<TopicVideos>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str) -> VideoReference {
        VideoReference {
            video_id: id.to_string(),
            title: format!("Video {}", id),
            url: format!("https://www.youtube.com/watch?v={}", id),
            channel: "Channel".to_string(),
            duration: None,
            duration_seconds: None,
            view_count: None,
            thumbnail_url: None,
        }
    }

    #[test]
    fn test_new_step_aligns_empty_video_lists() {
        let step = RoadmapStep::new(
            1,
            "Foundations",
            None,
            vec!["Linear Algebra".to_string(), "Probability".to_string()],
        );
        assert_eq!(step.videos.len(), 2);
        assert_eq!(step.enriched_topic_count(), 0);
    }

    #[test]
    fn test_with_videos_pads_and_truncates() {
        let topics = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let step = RoadmapStep::new(1, "Step", None, topics.clone())
            .with_videos(vec![vec![video("a")]]);
        assert_eq!(step.videos.len(), 3);
        assert_eq!(step.enriched_topic_count(), 1);

        let step = RoadmapStep::new(1, "Step", None, topics).with_videos(vec![
            vec![video("a")],
            vec![],
            vec![video("c")],
            vec![video("extra")],
        ]);
        assert_eq!(step.videos.len(), 3);
        let pairs: Vec<_> = step.topic_videos().map(|(t, v)| (t, v.len())).collect();
        assert_eq!(pairs, vec![("A", 1), ("B", 0), ("C", 1)]);
    }

    #[test]
    fn test_payload_step_lookup_and_counts() {
        let payload = RoadmapPayload::new(
            "Data Science",
            vec![
                RoadmapStep::new(1, "One", None, vec!["x".to_string()]),
                RoadmapStep::new(2, "Two", None, vec!["y".to_string(), "z".to_string()]),
            ],
            Utc::now(),
        );
        assert_eq!(payload.step(2).map(|s| s.title.as_str()), Some("Two"));
        assert!(payload.step(3).is_none());
        assert_eq!(payload.topic_count(), 3);
        assert!(payload.is_unenriched());
    }

    #[test]
    fn test_payload_json_shape_is_stable() -> Result<(), serde_json::Error> {
        let step = RoadmapStep::new(1, "One", None, vec!["x".to_string()])
            .with_videos(vec![vec![video("v1")]]);
        let json = serde_json::to_value(&step)?;
        assert_eq!(json["topics"][0], "x");
        assert_eq!(json["videos"][0][0]["video_id"], "v1");
        assert!(json.get("description").is_none());
        Ok(())
    }
}
