//! Per-pixel comparison policies.

use std::fmt::Display;
use std::str::FromStr;

use image::Rgba;

/// Default per-channel tolerance for [`ComparisonPolicy::Fuzzy`].
pub const DEFAULT_FUZZY_DELTA: u8 = 8;

/// Default threshold for [`ComparisonPolicy::Perceptual`].
pub const DEFAULT_PERCEPTUAL_THRESHOLD: f64 = 0.1;

/// Largest squared YIQ distance between two opaque colours.
const MAX_YIQ_DELTA: f64 = 35215.0;

/// How two pixels at the same position are judged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ComparisonPolicy {
    /// Any channel difference counts.
    #[default]
    Precise,
    /// Different when any RGBA channel moves by more than `max_channel_delta`.
    Fuzzy { max_channel_delta: u8 },
    /// Different when the YIQ distance exceeds `threshold` (0.0 = exact, 1.0 = anything goes).
    Perceptual { threshold: f64 },
}

impl ComparisonPolicy {
    pub fn fuzzy() -> Self {
        Self::Fuzzy {
            max_channel_delta: DEFAULT_FUZZY_DELTA,
        }
    }

    pub fn perceptual() -> Self {
        Self::Perceptual {
            threshold: DEFAULT_PERCEPTUAL_THRESHOLD,
        }
    }

    /// Whether `golden` and `candidate` count as different pixels.
    pub fn pixel_differs(&self, golden: &Rgba<u8>, candidate: &Rgba<u8>) -> bool {
        match *self {
            Self::Precise => golden != candidate,
            Self::Fuzzy { max_channel_delta } => golden
                .0
                .iter()
                .zip(candidate.0.iter())
                .any(|(a, b)| a.abs_diff(*b) > max_channel_delta),
            Self::Perceptual { threshold } => {
                if golden == candidate {
                    return false;
                }
                yiq_delta(golden, candidate) > MAX_YIQ_DELTA * threshold * threshold
            }
        }
    }

    /// Short name used in logs and remote upload keys.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Precise => "precise",
            Self::Fuzzy { .. } => "fuzzy",
            Self::Perceptual { .. } => "perceptual",
        }
    }
}

impl Display for ComparisonPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Precise => write!(f, "precise"),
            Self::Fuzzy { max_channel_delta } => write!(f, "fuzzy:{max_channel_delta}"),
            Self::Perceptual { threshold } => write!(f, "perceptual:{threshold}"),
        }
    }
}

/// Error returned when a policy string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid comparison policy '{0}': expected precise, fuzzy[:<0-255>] or perceptual[:<0.0-1.0>]")]
pub struct ParsePolicyError(String);

impl FromStr for ComparisonPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParsePolicyError(s.to_owned());
        let (kind, param) = match s.split_once(':') {
            Some((kind, param)) => (kind, Some(param)),
            None => (s, None),
        };

        match (kind.trim().to_lowercase().as_str(), param) {
            ("precise", None) => Ok(Self::Precise),
            ("fuzzy", None) => Ok(Self::fuzzy()),
            ("fuzzy", Some(p)) => {
                let max_channel_delta = p.trim().parse::<u8>().map_err(|_err| invalid())?;
                Ok(Self::Fuzzy { max_channel_delta })
            }
            ("perceptual", None) => Ok(Self::perceptual()),
            ("perceptual", Some(p)) => {
                let threshold = p.trim().parse::<f64>().map_err(|_err| invalid())?;
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(invalid());
                }
                Ok(Self::Perceptual { threshold })
            }
            _ => Err(invalid()),
        }
    }
}

/// Squared YIQ distance after blending both pixels onto white.
fn yiq_delta(a: &Rgba<u8>, b: &Rgba<u8>) -> f64 {
    let (y1, i1, q1) = to_yiq(a);
    let (y2, i2, q2) = to_yiq(b);
    let (dy, di, dq) = (y1 - y2, i1 - i2, q1 - q2);
    0.5053 * dy * dy + 0.299 * di * di + 0.1957 * dq * dq
}

fn to_yiq(px: &Rgba<u8>) -> (f64, f64, f64) {
    let alpha = f64::from(px[3]) / 255.0;
    let blend = |c: u8| 255.0 + (f64::from(c) - 255.0) * alpha;
    let (r, g, b) = (blend(px[0]), blend(px[1]), blend(px[2]));

    let y = r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23;
    let i = r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89;
    let q = r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94;
    (y, i, q)
}
