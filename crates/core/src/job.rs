//! Job model: kinds, the status state machine and the job record itself.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::{JobId, OwnerId};

/// What a job produces.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Face-ID embedding for a talking-head avatar.
    FaceEmbedding,
    /// Generated talking-head video avatar.
    VideoAvatar,
    /// Lip-synced video from an existing video and an audio track.
    LipsyncVideo,
    /// Cloned voice.
    VoiceClone,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::FaceEmbedding,
        JobKind::VideoAvatar,
        JobKind::LipsyncVideo,
        JobKind::VoiceClone,
    ];

    /// Wire name used by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FaceEmbedding => "face_embedding",
            JobKind::VideoAvatar => "video_avatar",
            JobKind::LipsyncVideo => "lipsync_video",
            JobKind::VoiceClone => "voice_clone",
        }
    }

    /// Short name used in owner metadata keys (`<provider>_<slug>_status`).
    pub fn slug(&self) -> &'static str {
        match self {
            JobKind::FaceEmbedding => "face",
            JobKind::VideoAvatar => "video",
            JobKind::LipsyncVideo => "lipsync",
            JobKind::VoiceClone => "voice",
        }
    }

    /// Key fragments that mark a URL-valued field as this kind's result.
    pub fn result_hints(&self) -> &'static [&'static str] {
        match self {
            JobKind::FaceEmbedding => &["face"],
            JobKind::VideoAvatar => &["video", "avatar"],
            JobKind::LipsyncVideo => &["video", "lipsync", "output"],
            JobKind::VoiceClone => &["voice", "audio"],
        }
    }

    /// Normalized keys (lowercase, no separators) whose value *is* the result.
    ///
    /// Face and voice providers hand back an identifier rather than an artifact URL.
    pub fn result_id_keys(&self) -> &'static [&'static str] {
        match self {
            JobKind::FaceEmbedding => &["faceid"],
            JobKind::VoiceClone => &["voiceid"],
            JobKind::VideoAvatar | JobKind::LipsyncVideo => &[],
        }
    }
}

impl core::fmt::Display for JobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| DomainError::unknown_kind(s))
    }
}

/// Canonical job status.
///
/// `Queued → Processing → {Ready, Failed}`; `Ready` and `Failed` are terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Ready,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Ready | JobStatus::Failed => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
        }
    }

    /// Map a provider's status vocabulary onto the canonical states.
    ///
    /// Returns `None` for words we don't recognise; callers treat that as
    /// "no transition observed".
    pub fn from_provider(raw: &str) -> Option<Self> {
        let s = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let status = match s.as_str() {
            "queued" | "queue" | "pending" | "submitted" | "created" | "waiting" | "in_queue"
            | "new" => JobStatus::Queued,
            "processing" | "running" | "in_progress" | "started" | "generating" | "training"
            | "rendering" => JobStatus::Processing,
            "success" | "succeeded" | "successful" | "completed" | "complete" | "done"
            | "ready" | "finished" => JobStatus::Ready,
            "failed" | "failure" | "error" | "errored" | "cancelled" | "canceled"
            | "rejected" => JobStatus::Failed,
            _ => return None,
        };
        Some(status)
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One asynchronous unit of work submitted to an external provider.
///
/// A job is owned by whoever launched it (a request or a background task) and
/// is never polled concurrently. Status changes go through [`Job::observe`],
/// [`Job::mark_ready`] and [`Job::mark_failed`], which keep transitions monotonic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner_id: OwnerId,
    /// Provider that owns the job (e.g. `simli`).
    pub provider: String,
    pub kind: JobKind,
    /// Provider-assigned job/task/request id.
    pub external_id: Option<String>,
    pub status: JobStatus,
    /// Produced artifact (URL, storage path or provider id); only set once `Ready`.
    pub result_ref: Option<String>,
    /// Provider error text for `Failed` jobs, when available.
    pub failure_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Client-facing deadline governing the synchronous/background cutover.
    pub deadline: Option<DateTime<Utc>>,
    /// Number of status polls issued so far.
    pub attempts: u32,
}

impl Job {
    pub fn new(owner_id: OwnerId, provider: impl Into<String>, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            owner_id,
            provider: provider.into(),
            kind,
            external_id: None,
            status: JobStatus::Queued,
            result_ref: None,
            failure_reason: None,
            submitted_at: now,
            updated_at: now,
            deadline: None,
            attempts: 0,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Apply a non-terminal or terminal status observation.
    ///
    /// Returns `true` if the status changed. Observations that would move the job
    /// backwards, or out of a terminal state, are ignored.
    pub fn observe(&mut self, status: JobStatus) -> bool {
        if self.status.is_terminal() || status.rank() <= self.status.rank() {
            return false;
        }
        match status {
            JobStatus::Ready => self.mark_ready(None),
            JobStatus::Failed => self.mark_failed(None),
            other => {
                self.status = other;
                self.updated_at = Utc::now();
                true
            }
        }
    }

    /// Move to `Ready`, recording the result if one is known.
    pub fn mark_ready(&mut self, result_ref: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Ready;
        self.result_ref = result_ref;
        self.updated_at = Utc::now();
        true
    }

    /// Move to `Failed`, recording the provider's reason if one is known.
    pub fn mark_failed(&mut self, reason: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.failure_reason = reason;
        self.updated_at = Utc::now();
        true
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(OwnerId::new(), "simli", JobKind::FaceEmbedding)
    }

    #[test]
    fn kind_parses_wire_names() {
        assert_eq!("face_embedding".parse::<JobKind>().unwrap(), JobKind::FaceEmbedding);
        assert_eq!("Lipsync-Video".parse::<JobKind>().unwrap(), JobKind::LipsyncVideo);
        assert!(matches!(
            "hologram".parse::<JobKind>(),
            Err(DomainError::UnknownKind(_))
        ));
    }

    #[test]
    fn provider_vocabulary_maps_to_canonical_states() {
        assert_eq!(JobStatus::from_provider("PENDING"), Some(JobStatus::Queued));
        assert_eq!(JobStatus::from_provider("in progress"), Some(JobStatus::Processing));
        assert_eq!(JobStatus::from_provider("success"), Some(JobStatus::Ready));
        assert_eq!(JobStatus::from_provider("canceled"), Some(JobStatus::Failed));
        assert_eq!(JobStatus::from_provider("warming_up"), None);
    }

    #[test]
    fn observe_only_moves_forward() {
        let mut job = job();
        assert!(job.observe(JobStatus::Processing));
        assert!(!job.observe(JobStatus::Queued));
        assert_eq!(job.status, JobStatus::Processing);
        assert!(!job.observe(JobStatus::Processing));
    }

    #[test]
    fn terminal_states_never_revert() {
        let mut job = job();
        assert!(job.mark_ready(Some("f-9".to_string())));
        assert!(!job.observe(JobStatus::Processing));
        assert!(!job.mark_failed(Some("late failure".to_string())));
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(job.result_ref.as_deref(), Some("f-9"));
        assert!(job.failure_reason.is_none());
    }

    #[test]
    fn result_is_only_set_by_mark_ready() {
        let mut job = job();
        job.observe(JobStatus::Processing);
        assert!(job.result_ref.is_none());
        job.observe(JobStatus::Failed);
        assert!(job.result_ref.is_none());
        assert!(job.is_terminal());
    }
}
