/// Playback state of the looping background track. Output is left to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicChannel {
    track: String,
    volume: f32,
    playing: bool,
}

impl MusicChannel {
    pub fn new(track: impl Into<String>, volume: f32) -> Self {
        Self {
            track: track.into(),
            volume: clamp_volume(volume),
            playing: false,
        }
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_muted(&self) -> bool {
        self.volume <= 0.0
    }

    /// Returns `false` when already playing.
    pub fn play(&mut self) -> bool {
        !std::mem::replace(&mut self.playing, true)
    }

    /// Returns `false` when already stopped.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.playing, false)
    }

    /// Stores the clamped volume and returns it.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = clamp_volume(volume);
        self.volume
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}
