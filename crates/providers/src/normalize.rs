//! Heuristic normalization of provider responses.
//!
//! Provider response shapes are unstable: ids show up as `id`, `task_id`,
//! `data.request_id` or `character_uid`, results as `video_url`, `face_id` or a
//! nested `output.url`. The normalizer walks the whole JSON value breadth-first
//! and picks the shallowest match for each field.
//!
//! It is pure and total: malformed or unrecognised input yields an empty
//! [`NormalizedResponse`], which callers treat as "try again".

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;

use personaforge_core::{JobKind, JobStatus};

/// Words that, followed by `id`, mark a provider job identifier.
const ID_WORDS: [&str; 8] = [
    "request",
    "task",
    "job",
    "queue",
    "character",
    "video",
    "generation",
    "prediction",
];

/// Hints that mark a URL field as a result regardless of kind.
const URL_HINTS: [&str; 2] = ["video", "face"];

const MESSAGE_KEYS: [&str; 6] = [
    "error",
    "message",
    "detail",
    "errormessage",
    "failurereason",
    "reason",
];

/// Canonical view of a provider response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedResponse {
    pub id: Option<String>,
    pub status: Option<String>,
    pub result_ref: Option<String>,
    /// Error/diagnostic text, if the provider sent any.
    pub message: Option<String>,
}

impl NormalizedResponse {
    /// Nothing usable was extracted.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.status.is_none() && self.result_ref.is_none()
    }

    /// An identifier or a direct result: enough to accept a creation response.
    pub fn has_handle(&self) -> bool {
        self.id.is_some() || self.result_ref.is_some()
    }

    pub fn job_status(&self) -> Option<JobStatus> {
        self.status.as_deref().and_then(JobStatus::from_provider)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Field {
    Result,
    Id,
    Status,
    Message,
}

pub struct ResponseNormalizer;

impl ResponseNormalizer {
    /// Normalize a raw response body; non-JSON bodies normalize to empty.
    pub fn normalize_body(kind: JobKind, body: &str) -> NormalizedResponse {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self::normalize(kind, &value),
            Err(_) => NormalizedResponse::default(),
        }
    }

    pub fn normalize(kind: JobKind, value: &Value) -> NormalizedResponse {
        let mut out = NormalizedResponse::default();
        if !value.is_object() {
            return out;
        }

        let mut level: VecDeque<&Value> = VecDeque::from([value]);
        while !level.is_empty() {
            let mut next = VecDeque::new();
            for node in level {
                match node {
                    Value::Object(map) => {
                        for (key, child) in map {
                            if let Some(field) = classify_key(kind, key) {
                                record(&mut out, field, child);
                            }
                            if child.is_object() || child.is_array() {
                                next.push_back(child);
                            }
                        }
                    }
                    Value::Array(items) => {
                        next.extend(items.iter().filter(|v| v.is_object() || v.is_array()));
                    }
                    _ => {}
                }
            }
            if is_complete(&out) {
                break;
            }
            level = next;
        }

        out
    }
}

fn is_complete(out: &NormalizedResponse) -> bool {
    out.id.is_some() && out.status.is_some() && out.result_ref.is_some() && out.message.is_some()
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' ' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn classify_key(kind: JobKind, key: &str) -> Option<Field> {
    let k = normalize_key(key);
    if k.is_empty() {
        return None;
    }

    // Result before id: for face jobs `face_id` is the artifact, not the job handle.
    if kind.result_id_keys().contains(&k.as_str()) {
        return Some(Field::Result);
    }
    if k.contains("url")
        && (URL_HINTS.iter().any(|h| k.contains(h))
            || kind.result_hints().iter().any(|h| k.contains(h)))
    {
        return Some(Field::Result);
    }

    if k == "id" || k == "uid" || (k.ends_with("id") && ID_WORDS.iter().any(|w| k.contains(w))) {
        return Some(Field::Id);
    }

    if k.ends_with("status") {
        return Some(Field::Status);
    }

    if MESSAGE_KEYS.contains(&k.as_str()) {
        return Some(Field::Message);
    }

    None
}

fn record(out: &mut NormalizedResponse, field: Field, value: &Value) {
    let slot = match field {
        Field::Result => &mut out.result_ref,
        Field::Id => &mut out.id,
        Field::Status => &mut out.status,
        Field::Message => &mut out.message,
    };
    if slot.is_some() {
        return;
    }
    *slot = match (field, value) {
        (_, Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        (Field::Id, Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn face(v: Value) -> NormalizedResponse {
        ResponseNormalizer::normalize(JobKind::FaceEmbedding, &v)
    }

    #[test]
    fn nested_status_and_face_id() {
        let n = face(json!({"data": {"status": "completed", "face_id": "f-1"}}));
        assert_eq!(n.status.as_deref(), Some("completed"));
        assert_eq!(n.result_ref.as_deref(), Some("f-1"));
        assert!(n.id.is_none());
        assert_eq!(n.job_status(), Some(JobStatus::Ready));
    }

    #[test]
    fn flat_status_and_id() {
        let n = ResponseNormalizer::normalize(
            JobKind::VideoAvatar,
            &json!({"status": "processing", "id": "vid-3"}),
        );
        assert_eq!(n.id.as_deref(), Some("vid-3"));
        assert_eq!(n.status.as_deref(), Some("processing"));
        assert!(n.result_ref.is_none());
    }

    #[test]
    fn character_uid_is_an_identifier() {
        let n = face(json!({"character_uid": "abc123"}));
        assert_eq!(n.id.as_deref(), Some("abc123"));
        assert!(n.has_handle());
    }

    #[test]
    fn shallow_match_wins_over_deeper_one() {
        let n = face(json!({
            "result": {"status": "failed", "job": {"status": "deep"}},
            "status": "queued",
        }));
        assert_eq!(n.status.as_deref(), Some("queued"));
    }

    #[test]
    fn deep_match_used_when_nothing_shallow() {
        let n = ResponseNormalizer::normalize(
            JobKind::LipsyncVideo,
            &json!({"data": {"items": [{"meta": {"task_id": 42, "output_url": "https://cdn/x.mp4"}}]}}),
        );
        assert_eq!(n.id.as_deref(), Some("42"));
        assert_eq!(n.result_ref.as_deref(), Some("https://cdn/x.mp4"));
    }

    #[test]
    fn video_url_is_a_result_and_video_id_an_identifier() {
        let n = ResponseNormalizer::normalize(
            JobKind::VideoAvatar,
            &json!({"code": 100, "data": {"video_id": "v-9", "status": "completed", "video_url": "https://cdn/v.mp4"}}),
        );
        assert_eq!(n.id.as_deref(), Some("v-9"));
        assert_eq!(n.result_ref.as_deref(), Some("https://cdn/v.mp4"));
    }

    #[test]
    fn keys_match_case_insensitively() {
        let n = ResponseNormalizer::normalize(
            JobKind::VideoAvatar,
            &json!({"RequestId": "r-1", "JobStatus": "RUNNING"}),
        );
        assert_eq!(n.id.as_deref(), Some("r-1"));
        assert_eq!(n.job_status(), Some(JobStatus::Processing));
    }

    #[test]
    fn error_text_is_captured() {
        let n = face(json!({"status": "failed", "error": {"message": "no face detected"}}));
        assert_eq!(n.job_status(), Some(JobStatus::Failed));
        assert_eq!(n.message.as_deref(), Some("no face detected"));
    }

    #[test]
    fn empty_object_and_non_objects_normalize_to_nothing() {
        assert_eq!(face(json!({})), NormalizedResponse::default());
        assert_eq!(face(json!([{"id": "x"}])), NormalizedResponse::default());
        assert_eq!(face(json!("id")), NormalizedResponse::default());
        assert_eq!(face(Value::Null), NormalizedResponse::default());
        assert_eq!(
            ResponseNormalizer::normalize_body(JobKind::FaceEmbedding, "<html>502</html>"),
            NormalizedResponse::default()
        );
    }

    #[test]
    fn blank_strings_do_not_match() {
        let n = face(json!({"id": "  ", "data": {"id": "real"}}));
        assert_eq!(n.id.as_deref(), Some("real"));
    }
}
