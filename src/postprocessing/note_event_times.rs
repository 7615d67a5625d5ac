use super::note_event_frames::NoteEventFrame;

#[derive(Debug, Clone, PartialEq)]
pub struct NoteEventTime {
    pub start_time_seconds: f32,
    pub duration_seconds: f32,
    pub pitch_midi: u8,
    pub velocity: u8,
}

/// Convert note frames to time-based note events.
///
/// # Arguments
///
/// * `notes` - List of note events.
/// * `hop_sample` - Samples between two feature frames.
/// * `sample_rate` - Sample rate the features were computed at.
pub fn note_frames_to_time(notes: &[NoteEventFrame], hop_sample: usize, sample_rate: u32) -> Vec<NoteEventTime> {
    let seconds_per_frame = hop_sample as f32 / sample_rate as f32;
    notes
        .iter()
        .map(|note| NoteEventTime {
            start_time_seconds: note.start_frame as f32 * seconds_per_frame,
            duration_seconds: note.duration_frames as f32 * seconds_per_frame,
            pitch_midi: note.pitch_midi,
            velocity: note.velocity,
        })
        .collect()
}
