/// Remote tracks of the current connection and the callbacks interested in them.
///
/// A callback registered late is first handed every track already received. Tracks reported
/// by a connection other than the current generation are refused.
pub struct RemoteTracks<T> {
    generation: u64,
    tracks: Vec<T>,
    callbacks: Vec<Box<dyn Fn(T) + Send + Sync + 'static>>,
}

impl<T: Clone> RemoteTracks<T> {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            tracks: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    pub fn register(&mut self, callback: Box<dyn Fn(T) + Send + Sync + 'static>) {
        for track in &self.tracks {
            callback(track.clone());
        }
        self.callbacks.push(callback);
    }

    /// Returns `false` if `generation` is not the current connection.
    pub fn deliver(&mut self, generation: u64, track: T) -> bool {
        if generation != self.generation {
            return false;
        }
        for callback in &self.callbacks {
            callback(track.clone());
        }
        self.tracks.push(track);
        true
    }

    /// A new connection replaced the old one; its tracks are gone, callbacks stay.
    pub fn advance(&mut self, generation: u64) {
        self.generation = generation;
        self.tracks.clear();
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.callbacks.clear();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
