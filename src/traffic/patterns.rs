use crate::traffic::config::{TrafficConfig, TrafficPatternSpec};
use anyhow::{bail, Context};
use phf::phf_map;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternOp {
    Read,
    Write,
    Flush,
}

static OPS: phf::Map<&'static str, PatternOp> = phf_map! {
    "read" => PatternOp::Read,
    "r" => PatternOp::Read,
    "load" => PatternOp::Read,
    "write" => PatternOp::Write,
    "w" => PatternOp::Write,
    "store" => PatternOp::Write,
    "flush" => PatternOp::Flush,
    "f" => PatternOp::Flush,
};

impl PatternOp {
    pub fn parse(op: &str) -> anyhow::Result<Self> {
        let key = op.trim().to_ascii_lowercase();
        match OPS.get(key.as_str()) {
            Some(op) => Ok(*op),
            None => bail!("unsupported traffic op '{}'; expected read/write/flush", op),
        }
    }

    pub fn is_store(self) -> bool {
        matches!(self, Self::Write)
    }

    fn short(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::Flush => "f",
        }
    }
}

#[derive(Debug, Clone)]
enum PatternKind {
    Strided {
        stride: u64,
    },
    Tiled {
        tile_m: u64,
        tile_n: u64,
        transpose: bool,
    },
    Random {
        min: u64,
        max: u64,
        seed: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RandomStreamKey {
    min: u64,
    max: u64,
    seed: u64,
    req_bytes: u32,
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub name: String,
    pub op: PatternOp,
    pub req_bytes: u32,
    pub posted: bool,
    within_bytes: u64,
    kind: PatternKind,
}

impl CompiledPattern {
    fn offset_bytes(&self, req_idx: u32) -> u64 {
        let req_bytes = self.req_bytes as u64;
        let idx = req_idx as u64;
        match self.kind {
            PatternKind::Strided { stride } => idx * stride * req_bytes,
            PatternKind::Tiled {
                tile_m,
                tile_n,
                transpose,
            } => {
                let tile_elems = tile_m.saturating_mul(tile_n).max(1);
                let tile_idx = idx / tile_elems;
                let idx_in_tile = idx % tile_elems;
                let (row, col) = if transpose {
                    (idx_in_tile % tile_m, idx_in_tile / tile_m)
                } else {
                    (idx_in_tile / tile_n, idx_in_tile % tile_n)
                };
                (tile_idx * tile_elems + row * tile_n + col) * req_bytes
            }
            PatternKind::Random { min, .. } => min * req_bytes,
        }
    }

    fn random_stream_key(&self) -> Option<RandomStreamKey> {
        match self.kind {
            PatternKind::Random { min, max, seed } => Some(RandomStreamKey {
                min,
                max,
                seed,
                req_bytes: self.req_bytes,
            }),
            _ => None,
        }
    }
}

/// Turns pattern specs into request addresses.  Random patterns draw their offsets up front so
/// the address stream does not depend on issue timing.
#[derive(Debug, Clone, Default)]
pub struct PatternEngine {
    patterns: Vec<CompiledPattern>,
    reqs_per_pattern: usize,
    base: u64,
    random_tables: Vec<Option<Vec<u64>>>,
}

impl PatternEngine {
    pub fn new(config: &TrafficConfig) -> anyhow::Result<Self> {
        let reqs_per_pattern = config.reqs_per_pattern.max(1) as usize;
        let patterns = config
            .patterns
            .iter()
            .enumerate()
            .map(|(idx, spec)| {
                compile_pattern(spec, config).with_context(|| format!("traffic pattern {}", idx))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let random_tables = precompute_random_tables(&patterns, reqs_per_pattern);
        Ok(Self {
            patterns,
            reqs_per_pattern,
            base: config.address.base,
            random_tables,
        })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn reqs_per_pattern(&self) -> usize {
        self.reqs_per_pattern
    }

    pub fn pattern(&self, idx: usize) -> Option<&CompiledPattern> {
        self.patterns.get(idx)
    }

    pub fn pattern_name(&self, idx: usize) -> Option<&str> {
        self.patterns.get(idx).map(|p| p.name.as_str())
    }

    /// Address of request `req_idx` of pattern `pattern_idx`, always aligned to the request size
    /// and inside the pattern's window.
    pub fn addr(&self, pattern_idx: usize, req_idx: u32) -> Option<u64> {
        let pattern = self.patterns.get(pattern_idx)?;
        let offset = self
            .random_offset(pattern_idx, req_idx)
            .unwrap_or_else(|| pattern.offset_bytes(req_idx));
        Some(self.base.saturating_add(offset % pattern.within_bytes))
    }

    fn random_offset(&self, pattern_idx: usize, req_idx: u32) -> Option<u64> {
        let table = self.random_tables.get(pattern_idx)?.as_ref()?;
        table.get(req_idx as usize).copied()
    }
}

// Specs sharing (seed, bounds, size) draw from one stream, in pattern order.
fn precompute_random_tables(
    patterns: &[CompiledPattern],
    reqs_per_pattern: usize,
) -> Vec<Option<Vec<u64>>> {
    let mut tables: Vec<Option<Vec<u64>>> = vec![None; patterns.len()];
    let mut streams: HashMap<RandomStreamKey, StdRng> = HashMap::new();
    for (pattern_idx, pattern) in patterns.iter().enumerate() {
        let Some(key) = pattern.random_stream_key() else {
            continue;
        };
        let stream = streams
            .entry(key)
            .or_insert_with(|| StdRng::seed_from_u64(key.seed));
        let table = (0..reqs_per_pattern)
            .map(|_| stream.gen_range(key.min..key.max) * key.req_bytes as u64)
            .collect();
        tables[pattern_idx] = Some(table);
    }
    tables
}

fn compile_pattern(spec: &TrafficPatternSpec, config: &TrafficConfig) -> anyhow::Result<CompiledPattern> {
    let kind_key = spec.kind.trim().to_ascii_lowercase();
    let req_bytes = spec.req_bytes.max(1);
    let op = PatternOp::parse(&spec.op)?;
    if spec.posted && !op.is_store() {
        bail!("only writes can be posted (op '{}')", spec.op);
    }
    let window = spec
        .within_bytes
        .unwrap_or(config.address.size)
        .min(config.address.size);
    let within_bytes = (window - window % req_bytes as u64).max(req_bytes as u64);
    let slots = within_bytes / req_bytes as u64;

    let kind = match kind_key.as_str() {
        "strided" => PatternKind::Strided {
            stride: spec.stride as u64,
        },
        "tiled" => PatternKind::Tiled {
            tile_m: spec.tile_m.max(1) as u64,
            tile_n: spec.tile_n.max(1) as u64,
            transpose: spec.transpose,
        },
        "random" => {
            let min = spec.random_min as u64;
            let max = if spec.random_max == 0 {
                slots
            } else {
                spec.random_max as u64
            };
            PatternKind::Random {
                min,
                max: max.max(min + 1),
                seed: spec.seed,
            }
        }
        other => bail!(
            "unsupported traffic pattern kind '{}' (expected strided|tiled|random)",
            other
        ),
    };

    let name = if spec.name.is_empty() {
        default_pattern_name(&kind, req_bytes, op)
    } else {
        spec.name.clone()
    };

    Ok(CompiledPattern {
        name,
        op,
        req_bytes,
        posted: spec.posted,
        within_bytes,
        kind,
    })
}

fn default_pattern_name(kind: &PatternKind, req_bytes: u32, op: PatternOp) -> String {
    let base = match kind {
        PatternKind::Strided { stride } => format!("strided({})@{}", stride, req_bytes),
        PatternKind::Tiled {
            tile_m,
            tile_n,
            transpose,
        } => {
            let suffix = if *transpose { ".T" } else { "" };
            format!("tiled({}, {})@{}{}", tile_m, tile_n, req_bytes, suffix)
        }
        PatternKind::Random { seed, .. } => format!("random({})@{}", seed, req_bytes),
    };
    format!("{}_{}", base, op.short())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::config::TrafficAddressConfig;

    const BASE: u64 = 0x4000_0000;

    fn base_cfg(patterns: Vec<TrafficPatternSpec>, reqs: u32) -> TrafficConfig {
        TrafficConfig {
            enabled: true,
            reqs_per_pattern: reqs,
            address: TrafficAddressConfig {
                base: BASE,
                size: 64 << 10,
            },
            patterns,
            ..TrafficConfig::default()
        }
    }

    fn spec(kind: &str, op: &str) -> TrafficPatternSpec {
        TrafficPatternSpec {
            kind: kind.to_string(),
            op: op.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn op_aliases() {
        assert_eq!(PatternOp::Read, PatternOp::parse("READ").unwrap());
        assert_eq!(PatternOp::Write, PatternOp::parse(" store ").unwrap());
        assert_eq!(PatternOp::Flush, PatternOp::parse("flush").unwrap());
        assert!(PatternOp::parse("swap").is_err());
    }

    #[test]
    fn strided_addresses() {
        let mut p = spec("strided", "read");
        p.req_bytes = 4;
        p.stride = 3;
        let engine = PatternEngine::new(&base_cfg(vec![p], 8)).unwrap();
        assert_eq!(Some(BASE), engine.addr(0, 0));
        assert_eq!(Some(BASE + 24), engine.addr(0, 2));
        assert_eq!(None, engine.addr(1, 0));
        assert_eq!("strided(3)@4_r", engine.pattern_name(0).unwrap());
    }

    #[test]
    fn strided_wraps_inside_window() {
        let mut p = spec("strided", "write");
        p.req_bytes = 8;
        p.within_bytes = Some(20);
        let engine = PatternEngine::new(&base_cfg(vec![p], 8)).unwrap();
        // window rounds down to 16 bytes
        assert_eq!(Some(BASE), engine.addr(0, 2));
        assert_eq!(Some(BASE + 8), engine.addr(0, 3));
    }

    #[test]
    fn tiled_transpose_walks_columns() {
        let mut p = spec("tiled", "read");
        p.tile_m = 2;
        p.tile_n = 4;
        p.transpose = true;
        let engine = PatternEngine::new(&base_cfg(vec![p], 16)).unwrap();
        let offsets: Vec<u64> = (0..4).map(|i| engine.addr(0, i).unwrap() - BASE).collect();
        // (0,0) (1,0) (0,1) (1,1) in a 2x4 tile of 4-byte elements
        assert_eq!(vec![0, 16, 4, 20], offsets);
        assert_eq!(Some(BASE + 32), engine.addr(0, 8));
    }

    #[test]
    fn random_stream_is_deterministic_and_bounded() {
        let mut p0 = spec("random", "write");
        p0.req_bytes = 4;
        p0.random_max = 16;
        let mut p1 = spec("random", "read");
        p1.req_bytes = 4;
        p1.random_max = 16;

        let cfg = base_cfg(vec![p0, p1], 32);
        let a = PatternEngine::new(&cfg).unwrap();
        let b = PatternEngine::new(&cfg).unwrap();
        for t in 0..32 {
            for pattern in 0..2 {
                let addr = a.addr(pattern, t).unwrap();
                assert_eq!(Some(addr), b.addr(pattern, t));
                assert!((BASE..BASE + 64).contains(&addr));
                assert_eq!(0, addr % 4);
            }
        }
        // the two specs share a stream, so they do not repeat each other
        let first: Vec<_> = (0..32).map(|t| a.addr(0, t)).collect();
        let second: Vec<_> = (0..32).map(|t| a.addr(1, t)).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn bad_specs_are_errors() {
        let cfg = base_cfg(vec![spec("swizzled", "read")], 4);
        assert!(PatternEngine::new(&cfg).is_err());
        let mut posted_read = spec("strided", "read");
        posted_read.posted = true;
        assert!(PatternEngine::new(&base_cfg(vec![posted_read], 4)).is_err());
    }
}
