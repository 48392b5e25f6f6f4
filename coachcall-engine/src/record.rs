use chrono::{DateTime, Utc};
use thiserror::Error;

use coachcall_core::record::{CALL_STATUS_ENDED, CALL_TYPE_WEB_CALL, CallRecord};
use coachcall_core::text::render_transcript_text;
use coachcall_core::types::TranscriptEntry;

use crate::session::SessionContext;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error(
        "missing required call data (call_id={has_call_id}, agent_id={has_agent_id}, transcript_entries={transcript_len}, start_time={has_start_time})"
    )]
    Incomplete {
        has_call_id: bool,
        has_agent_id: bool,
        transcript_len: usize,
        has_start_time: bool,
    },
}

/// Builds the record submitted on call end.
///
/// All four of call id, agent id, a non-empty transcript and a start time must be present;
/// otherwise nothing is built and the caller logs the error instead of persisting.
pub fn build_call_record(
    ctx: &SessionContext,
    ended_at: DateTime<Utc>,
    duration_seconds: u64,
    transcript: &[TranscriptEntry],
    agent_display_name: &str,
) -> Result<CallRecord, RecordError> {
    let (Some(call_id), Some(agent_id), Some(started_at), false) = (
        ctx.call_id.as_ref(),
        ctx.agent_id.as_ref(),
        ctx.started_at,
        transcript.is_empty(),
    ) else {
        return Err(RecordError::Incomplete {
            has_call_id: ctx.call_id.is_some(),
            has_agent_id: ctx.agent_id.is_some(),
            transcript_len: transcript.len(),
            has_start_time: ctx.started_at.is_some(),
        });
    };

    Ok(CallRecord {
        user_id: ctx.user_id.clone(),
        call_id: call_id.clone(),
        agent_id: agent_id.clone(),
        call_status: CALL_STATUS_ENDED.into(),
        call_type: CALL_TYPE_WEB_CALL.into(),
        start_timestamp: started_at,
        end_timestamp: ended_at,
        call_duration: duration_seconds,
        transcript: render_transcript_text(transcript, agent_display_name),
        transcript_object: transcript.to_vec(),
        call_cost: None,
        disconnection_reason: None,
        recording_url: None,
        metadata: None,
    })
}
