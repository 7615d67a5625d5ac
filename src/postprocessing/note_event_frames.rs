use crate::config::PostprocessConfig;
use crate::inference::FrameOutput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEventFrame {
    pub start_frame: usize,
    pub duration_frames: usize,
    pub pitch_midi: u8,
    pub velocity: u8,
}

/// Decode frame-level model output into note events.
///
/// # Arguments
///
/// * `output` - Onset, offset, frame and velocity streams (n_times, n_pitches).
/// * `note_min` - MIDI pitch of the first pitch column.
/// * `params` - Decoding thresholds.
///
/// # Returns
///
/// * Note events ordered by start frame, then pitch.
///
/// A note starts on an onset peak at or above `onset_threshold` and lasts
/// while the frame activation stays at or above `frame_threshold` and the
/// offset activation stays below `offset_threshold`. Notes shorter than
/// `min_note_frames` or with velocity class 0 are dropped.
pub fn output_to_notes(output: &FrameOutput, note_min: usize, params: &PostprocessConfig) -> Vec<NoteEventFrame> {
    let n_frames = output.num_frames();
    let n_pitches = output.frame.ncols();
    let mut note_events = vec![];

    for pitch_idx in 0..n_pitches {
        let onset = output.onset.column(pitch_idx);
        let offset = output.offset.column(pitch_idx);
        let frame = output.frame.column(pitch_idx);

        let mut t = 0;
        while t < n_frames {
            let value = onset[t];
            let is_peak = value >= params.onset_threshold
                && (t == 0 || value > onset[t - 1])
                && (t + 1 == n_frames || value >= onset[t + 1]);
            if !is_peak {
                t += 1;
                continue;
            }

            let mut end = t + 1;
            while end < n_frames
                && frame[end] >= params.frame_threshold
                && offset[end] < params.offset_threshold
            {
                end += 1;
            }

            let velocity = output.velocity[[t, pitch_idx]].clamp(0, 127) as u8;
            let duration_frames = end - t;
            if duration_frames >= params.min_note_frames && velocity > 0 {
                note_events.push(NoteEventFrame {
                    start_frame: t,
                    duration_frames,
                    pitch_midi: (pitch_idx + note_min) as u8,
                    velocity,
                });
            }

            t = end;
        }
    }

    note_events.sort_by_key(|note| (note.start_frame, note.pitch_midi));
    note_events
}
