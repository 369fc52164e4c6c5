//! FIPS 202 cycle benchmark.
//!
//! Hashes a fixed message with SHA3-256, SHA3-512, SHAKE128 and SHAKE256 at
//! several message lengths and reports the cycles each case took. The hash
//! functions come from the `sha3` crate; this module only drives them and
//! times the calls.

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Digest, Sha3_256, Sha3_512, Shake128, Shake256};

/// Size of the benchmark message buffer in bytes.
pub const MESSAGE_LEN: usize = 1024;

/// Message lengths each algorithm is run at.
pub const TEST_LENGTHS: [usize; 4] = [32, 64, 256, 1024];

/// Keccak permutation width in bits.
pub const KECCAK_WIDTH_BITS: u32 = 1600;

/// Source of a free-running cycle count.
pub trait CycleCounter {
    fn cycles(&self) -> u32;
}

/// The FIPS 202 instances exercised by the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Sha3_256,
    Sha3_512,
    Shake128,
    Shake256,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Sha3_256,
        Algorithm::Sha3_512,
        Algorithm::Shake128,
        Algorithm::Shake256,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Algorithm::Sha3_256 => "SHA3-256",
            Algorithm::Sha3_512 => "SHA3-512",
            Algorithm::Shake128 => "SHAKE128",
            Algorithm::Shake256 => "SHAKE256",
        }
    }

    /// Sponge rate in bits.
    pub const fn rate_bits(self) -> u32 {
        match self {
            Algorithm::Sha3_256 => 1088,
            Algorithm::Sha3_512 => 576,
            Algorithm::Shake128 => 1344,
            Algorithm::Shake256 => 1088,
        }
    }

    /// Sponge capacity in bits; rate and capacity fill the permutation.
    pub const fn capacity_bits(self) -> u32 {
        KECCAK_WIDTH_BITS - self.rate_bits()
    }

    /// Domain separation suffix appended before padding.
    pub const fn suffix(self) -> u8 {
        match self {
            Algorithm::Sha3_256 | Algorithm::Sha3_512 => 0x06,
            Algorithm::Shake128 | Algorithm::Shake256 => 0x1F,
        }
    }

    /// Whether the output length is chosen by the caller.
    pub const fn is_xof(self) -> bool {
        matches!(self, Algorithm::Shake128 | Algorithm::Shake256)
    }

    /// Output length used by the benchmark for a message of `message_len`
    /// bytes. Extendable-output functions squeeze as much as they absorbed.
    pub const fn output_len(self, message_len: usize) -> usize {
        match self {
            Algorithm::Sha3_256 => 32,
            Algorithm::Sha3_512 => 64,
            Algorithm::Shake128 | Algorithm::Shake256 => message_len,
        }
    }
}

/// Cycles taken by one benchmark case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub algorithm: Algorithm,
    pub message_len: usize,
    pub cycles: u32,
}

/// Fill `message` with the benchmark pattern: byte `i` is `i & 0xFF`.
pub fn fill_message(message: &mut [u8]) {
    for (i, byte) in message.iter_mut().enumerate() {
        *byte = (i & 0xFF) as u8;
    }
}

/// Hash `input` into the front of `output`.
///
/// Returns the number of bytes written, or `None` if `output` is too short
/// for the algorithm's output at this message length.
pub fn hash_into(algorithm: Algorithm, input: &[u8], output: &mut [u8]) -> Option<usize> {
    let len = algorithm.output_len(input.len());
    let out = output.get_mut(..len)?;

    match algorithm {
        Algorithm::Sha3_256 => out.copy_from_slice(&<Sha3_256 as Digest>::digest(input)),
        Algorithm::Sha3_512 => out.copy_from_slice(&<Sha3_512 as Digest>::digest(input)),
        Algorithm::Shake128 => squeeze::<Shake128>(input, out),
        Algorithm::Shake256 => squeeze::<Shake256>(input, out),
    }
    Some(len)
}

fn squeeze<X: Default + Update + ExtendableOutput>(input: &[u8], out: &mut [u8]) {
    let mut xof = X::default();
    xof.update(input);
    xof.finalize_xof().read(out);
}

/// Time one case.
pub fn measure<C: CycleCounter>(
    counter: &C,
    algorithm: Algorithm,
    message: &[u8],
    output: &mut [u8],
) -> Option<Measurement> {
    let start = counter.cycles();
    hash_into(algorithm, message, output)?;
    let end = counter.cycles();

    Some(Measurement {
        algorithm,
        message_len: message.len(),
        cycles: end.wrapping_sub(start),
    })
}

/// Run every algorithm at every length in [`TEST_LENGTHS`], handing each
/// measurement to `report`. Returns the cycles taken by the whole suite.
pub fn run_suite<C, F>(counter: &C, mut report: F) -> u32
where
    C: CycleCounter,
    F: FnMut(&Measurement),
{
    let mut message = [0u8; MESSAGE_LEN];
    let mut output = [0u8; MESSAGE_LEN];
    fill_message(&mut message);

    let start = counter.cycles();
    for algorithm in Algorithm::ALL {
        for len in TEST_LENGTHS {
            if let Some(measurement) = measure(counter, algorithm, &message[..len], &mut output) {
                report(&measurement);
            }
        }
    }
    counter.cycles().wrapping_sub(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use std::vec::Vec;

    fn hex(bytes: &[u8]) -> std::string::String {
        bytes.iter().map(|b| std::format!("{:02x}", b)).collect()
    }

    /// Advances by a fixed step on every read.
    struct SteppingCounter {
        now: Cell<u32>,
        step: u32,
    }

    impl CycleCounter for SteppingCounter {
        fn cycles(&self) -> u32 {
            let now = self.now.get();
            self.now.set(now.wrapping_add(self.step));
            now
        }
    }

    #[test]
    fn test_sha3_256_known_answers() {
        let mut out = [0u8; 32];
        assert_eq!(hash_into(Algorithm::Sha3_256, b"", &mut out), Some(32));
        assert_eq!(
            hex(&out),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );

        hash_into(Algorithm::Sha3_256, b"abc", &mut out).unwrap();
        assert_eq!(
            hex(&out),
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532"
        );
    }

    #[test]
    fn test_shake128_empty_message() {
        let mut out = [0u8; 32];
        let input: [u8; 0] = [];
        let len = Algorithm::Shake128.output_len(32);
        assert_eq!(len, 32);
        let out = &mut out[..len];
        super::squeeze::<Shake128>(&input, out);
        assert_eq!(
            hex(out),
            "7f9c2ba4e88f827d616045507605853ed73b8093f6efbc88eb1a6eacfa66ef26"
        );
    }

    #[test]
    fn test_output_too_short() {
        let mut out = [0u8; 16];
        assert_eq!(hash_into(Algorithm::Sha3_512, b"abc", &mut out), None);
        let message = [0u8; 64];
        assert_eq!(hash_into(Algorithm::Shake256, &message, &mut out), None);
    }

    #[test]
    fn test_sponge_parameters() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.rate_bits() + algorithm.capacity_bits(), 1600);
        }
        assert_eq!(Algorithm::Sha3_512.capacity_bits(), 1024);
        assert_eq!(Algorithm::Shake128.capacity_bits(), 256);
        assert_eq!(Algorithm::Sha3_256.suffix(), 0x06);
        assert_eq!(Algorithm::Shake256.suffix(), 0x1F);
        assert!(Algorithm::Shake128.is_xof());
        assert!(!Algorithm::Sha3_256.is_xof());
    }

    #[test]
    fn test_message_pattern() {
        let mut message = [0u8; 300];
        fill_message(&mut message);
        assert_eq!(message[0], 0);
        assert_eq!(message[255], 255);
        assert_eq!(message[256], 0);
        assert_eq!(message[299], 43);
    }

    #[test]
    fn test_suite_covers_every_case() {
        let counter = SteppingCounter {
            now: Cell::new(0),
            step: 100,
        };
        let mut seen = Vec::new();
        let total = run_suite(&counter, |m| seen.push(*m));

        assert_eq!(seen.len(), Algorithm::ALL.len() * TEST_LENGTHS.len());
        assert!(seen.iter().all(|m| m.cycles == 100));
        assert_eq!(seen[0].algorithm, Algorithm::Sha3_256);
        assert_eq!(seen[0].message_len, 32);
        assert_eq!(seen[15].algorithm, Algorithm::Shake256);
        assert_eq!(seen[15].message_len, 1024);
        // Two reads per case, then the closing read
        assert_eq!(total, 100 * (2 * 16 + 1));
    }

    #[test]
    fn test_measure_wraps() {
        let counter = SteppingCounter {
            now: Cell::new(u32::MAX - 10),
            step: 50,
        };
        let mut out = [0u8; 64];
        let m = measure(&counter, Algorithm::Sha3_256, b"abc", &mut out).unwrap();
        assert_eq!(m.cycles, 50);
    }
}
