use rand::Rng;
use smartstring::alias::String as SmartString;
use std::fmt::Write;

const MAX_INCREMENT: u32 = 0xff_ffff;

/// Generates ids for new tracked changes and comments.
///
/// Ids look like mongo ObjectIds: 24 hex chars. The first 18 are a per-session seed (timestamp,
/// then 6 random "machine" chars, then 4 random "pid" chars) and the last 6 are an increment.
/// Peers applying the same ops with the same seed generate the same ids, which is why the seed can
/// be set from outside.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IdGenerator {
    seed: SmartString,
    increment: u32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_seed(&Self::generate_seed())
    }

    pub fn with_seed(seed: &str) -> Self {
        Self { seed: seed.into(), increment: 0 }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Setting the seed also restarts the increment.
    pub fn set_seed(&mut self, seed: &str) {
        self.seed = seed.into();
        self.increment = 0;
    }

    pub fn generate_seed() -> SmartString {
        let mut rng = rand::thread_rng();
        let pid: u32 = rng.gen_range(0..32767);
        let machine: u32 = rng.gen_range(0..16777216);
        let timestamp = chrono::Utc::now().timestamp() as u32;

        let mut seed = SmartString::new();
        // Writing to a string can't fail.
        let _ = write!(seed, "{:08x}{:06x}{:04x}", timestamp, machine, pid);
        seed
    }

    /// A one-off id, for when there's no tracker around to ask.
    pub fn generate_id() -> SmartString {
        let mut id = Self::generate_seed();
        id.push_str("000001");
        id
    }

    pub fn next_id(&mut self) -> SmartString {
        // The increment is 6 hex chars. Past that it wraps, same as an ObjectId counter.
        self.increment = (self.increment + 1) & MAX_INCREMENT;
        let mut id = self.seed.clone();
        let _ = write!(id, "{:06x}", self.increment);
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self { Self::new() }
}
