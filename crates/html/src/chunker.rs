//! Chunk plans for streaming tests.
//!
//! Provides deterministic chunk plans plus seeded fuzz plans for reproducible
//! streaming coverage in CI.

/// How to cut an input into network chunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkPlan {
    /// Chunks of `n` bytes (the last one may be shorter).
    Fixed(usize),
    /// Cut at these byte offsets (sorted, deduplicated, interior only).
    Boundaries(Vec<usize>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// Every cut lands on a char boundary; chunks are `&str`.
    Utf8Aligned,
    /// Cuts may split a UTF-8 sequence; chunks are bytes.
    ByteStream,
}

#[derive(Clone, Debug)]
pub struct ChunkPlanCase {
    pub label: String,
    pub plan: ChunkPlan,
}

impl ChunkPlan {
    /// Interior cut offsets for an input of `len` bytes.
    fn cuts(&self, len: usize) -> Vec<usize> {
        match self {
            ChunkPlan::Fixed(size) => {
                let size = (*size).max(1);
                (1..)
                    .map(|i| i * size)
                    .take_while(|at| *at < len)
                    .collect()
            }
            ChunkPlan::Boundaries(cuts) => {
                cuts.iter().copied().filter(|at| *at > 0 && *at < len).collect()
            }
        }
    }

    /// Split text; cuts inside a char move forward to the next boundary.
    pub fn split_str<'a>(&self, input: &'a str) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut start = 0;
        for mut at in self.cuts(input.len()) {
            while !input.is_char_boundary(at) {
                at += 1;
            }
            if at > start && at < input.len() {
                out.push(&input[start..at]);
                start = at;
            }
        }
        if start < input.len() {
            out.push(&input[start..]);
        }
        out
    }

    pub fn split_bytes<'a>(&self, input: &'a [u8]) -> Vec<&'a [u8]> {
        let mut out = Vec::new();
        let mut start = 0;
        for at in self.cuts(input.len()) {
            if at > start {
                out.push(&input[start..at]);
                start = at;
            }
        }
        if start < input.len() {
            out.push(&input[start..]);
        }
        out
    }
}

/// Build deterministic + fuzz chunk plans for the given input.
///
/// - Deterministic includes fixed sizes and boundary-aware splits around
///   `<`, `</`, `>`, and quotes.
/// - Fuzz plans are seeded for CI reproducibility.
pub fn build_chunk_plans(
    input: &str,
    fuzz_runs: usize,
    fuzz_seed: u64,
    policy: BoundaryPolicy,
) -> Vec<ChunkPlanCase> {
    let mut plans = Vec::new();

    for size in [1usize, 2, 3, 4, 8, 16, 32, 64] {
        plans.push(ChunkPlanCase {
            label: format!("fixed size={size}"),
            plan: ChunkPlan::Fixed(size),
        });
    }

    let token_boundaries = token_boundary_indices(input, policy);
    if !token_boundaries.is_empty() {
        plans.push(ChunkPlanCase {
            label: format!("token-boundaries count={}", token_boundaries.len()),
            plan: ChunkPlan::Boundaries(token_boundaries.clone()),
        });
    }

    if fuzz_runs > 0 {
        let mut candidates = interior_boundaries(input, policy);
        candidates.extend(token_boundaries);
        candidates.sort_unstable();
        candidates.dedup();
        for i in 0..fuzz_runs {
            let seed = fuzz_seed.wrapping_add(i as u64);
            let mut rng = Lcg::new(seed);
            let plan = if !candidates.is_empty() {
                let max = candidates.len().clamp(1, 32);
                let mut picks = candidates.clone();
                rng.shuffle(&mut picks);
                let count = 1 + rng.gen_range(max);
                picks.truncate(count);
                picks.sort_unstable();
                picks.dedup();
                ChunkPlan::Boundaries(picks)
            } else {
                // Fallback for empty/1-byte inputs.
                ChunkPlan::Fixed(1)
            };
            plans.push(ChunkPlanCase {
                label: format!("fuzz boundaries seed=0x{seed:016x}"),
                plan,
            });
        }
    }

    plans
}

fn token_boundary_indices(input: &str, policy: BoundaryPolicy) -> Vec<usize> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut out = Vec::new();
    for (i, b) in bytes.iter().enumerate() {
        if matches!(b, b'<' | b'>' | b'"' | b'\'') {
            out.push(i);
            if i + 1 < len {
                out.push(i + 1);
            }
        }
        if *b == b'<' && bytes.get(i + 1) == Some(&b'/') && i + 2 < len {
            out.push(i + 2);
        }
    }
    out.retain(|at| *at > 0 && *at < len);
    out.sort_unstable();
    out.dedup();
    filter_by_policy(input, out, policy)
}

fn interior_boundaries(input: &str, policy: BoundaryPolicy) -> Vec<usize> {
    let out = (1..input.len()).collect();
    filter_by_policy(input, out, policy)
}

fn filter_by_policy(input: &str, mut cuts: Vec<usize>, policy: BoundaryPolicy) -> Vec<usize> {
    if policy == BoundaryPolicy::Utf8Aligned {
        cuts.retain(|at| input.is_char_boundary(*at));
    }
    cuts
}

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn gen_range(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.next_u64() >> 32) as usize % upper
    }

    fn shuffle<T>(&mut self, items: &mut [T]) {
        if items.len() < 2 {
            return;
        }
        for i in (1..items.len()).rev() {
            let j = self.gen_range(i + 1);
            items.swap(i, j);
        }
    }
}
