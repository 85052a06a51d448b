//! Environment abstraction for deterministic testing.
//!
//! Decouples key generation and package policy from system resources
//! (randomness, wall-clock time). Tests supply seeded or fixed environments;
//! production uses [`SystemEnv`].

/// Abstract source of randomness and wall-clock time.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `wall_clock_secs()` reports seconds since the Unix epoch
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Seconds since the Unix epoch.
    ///
    /// Used to decide whether a volatile key package has passed its expiry.
    fn wall_clock_secs(&self) -> u64;

    /// Generates a random `u32`.
    fn random_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    /// Generates a random `u128`.
    ///
    /// Useful for 16-byte identifiers.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_le_bytes(bytes)
    }
}

/// Production environment using the OS RNG and the system clock.
///
/// # Panics
///
/// Panics if the OS RNG fails. Key material generated without a working
/// entropy source cannot be trusted, so there is nothing sensible to fall
/// back to.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}
