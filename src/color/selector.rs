use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::color::frame_seed;
use crate::color::palette::{FrameColorSet, Palette};
use crate::error::{PaletteError, PaletteResult};

/// How one representative color is picked from a frame's weighted colors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionMode {
    /// Always the heaviest color.
    Popular,
    /// A weighted random draw.
    #[default]
    Sample,
}

impl SelectionMode {
    /// `"popular"` selects [`SelectionMode::Popular`]; anything else samples.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("popular") {
            Self::Popular
        } else {
            Self::Sample
        }
    }
}

pub fn select<R: Rng + ?Sized>(
    set: &FrameColorSet,
    mode: SelectionMode,
    rng: &mut R,
) -> PaletteResult<String> {
    let colors = set.colors();
    match colors {
        [] => Err(PaletteError::EmptyColorSet),
        [only] => Ok(only.color.clone()),
        [first, ..] if mode == SelectionMode::Popular => Ok(first.color.clone()),
        _ => {
            let dist = WeightedIndex::new(colors.iter().map(|c| c.weight)).map_err(|e| {
                PaletteError::invalid_parameter(
                    "weights",
                    format!("frame at {}s: {e}", set.timestamp),
                )
            })?;
            Ok(colors[dist.sample(rng)].color.clone())
        }
    }
}

/// Pick one color per frame. Frame `i` draws from its own rng seeded with
/// `frame_seed(seed, i)`, so a fixed seed reproduces the whole sequence.
pub fn select_all(palette: &Palette, mode: SelectionMode, seed: u64) -> PaletteResult<Vec<String>> {
    palette
        .frames()
        .iter()
        .enumerate()
        .map(|(i, set)| {
            let mut rng = StdRng::seed_from_u64(frame_seed(seed, i));
            select(set, mode, &mut rng)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::palette::WeightedColor;

    fn two_colors() -> FrameColorSet {
        FrameColorSet::new(
            0.0,
            vec![
                WeightedColor::new("#111111", 0.8),
                WeightedColor::new("#222222", 0.2),
            ],
        )
    }

    #[test]
    fn popular_is_deterministic() {
        let set = two_colors();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..10 {
            assert_eq!(select(&set, SelectionMode::Popular, &mut rng).unwrap(), "#111111");
        }
    }

    #[test]
    fn sample_follows_weights() {
        let set = two_colors();
        let mut rng = StdRng::seed_from_u64(2024);
        let trials = 10_000;
        let hits = (0..trials)
            .filter(|_| select(&set, SelectionMode::Sample, &mut rng).unwrap() == "#111111")
            .count();
        let fraction = hits as f64 / trials as f64;
        assert!((fraction - 0.8).abs() < 0.05, "first color chosen {fraction}");
    }

    #[test]
    fn single_color_is_returned_in_every_mode() {
        let set = FrameColorSet::new(1.0, vec![WeightedColor::new("#abcdef", 1.0)]);
        let mut rng = StdRng::seed_from_u64(0);
        for mode in [SelectionMode::Popular, SelectionMode::Sample] {
            assert_eq!(select(&set, mode, &mut rng).unwrap(), "#abcdef");
        }
    }

    #[test]
    fn empty_set_is_an_error() {
        let set = FrameColorSet::new(1.0, Vec::new());
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            select(&set, SelectionMode::Sample, &mut rng),
            Err(PaletteError::EmptyColorSet)
        ));
    }

    #[test]
    fn zero_weights_are_rejected() {
        let set = FrameColorSet::new(
            0.0,
            vec![WeightedColor::new("#000000", 0.0), WeightedColor::new("#ffffff", 0.0)],
        );
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            select(&set, SelectionMode::Sample, &mut rng),
            Err(PaletteError::InvalidParameter { name: "weights", .. })
        ));
    }

    #[test]
    fn select_all_keeps_frame_order_and_is_reproducible() {
        let palette = Palette::new(vec![
            FrameColorSet::new(0.0, vec![WeightedColor::new("#000001", 1.0)]),
            two_colors(),
            FrameColorSet::new(2.0, vec![WeightedColor::new("#000003", 1.0)]),
        ]);

        let popular = select_all(&palette, SelectionMode::Popular, 0).unwrap();
        assert_eq!(popular, ["#000001", "#111111", "#000003"]);

        let a = select_all(&palette, SelectionMode::Sample, 77).unwrap();
        let b = select_all(&palette, SelectionMode::Sample, 77).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn mode_names() {
        assert_eq!(SelectionMode::from_name("popular"), SelectionMode::Popular);
        assert_eq!(SelectionMode::from_name("Popular"), SelectionMode::Popular);
        assert_eq!(SelectionMode::from_name("sample"), SelectionMode::Sample);
        assert_eq!(SelectionMode::from_name("whatever"), SelectionMode::Sample);
        assert_eq!(SelectionMode::default(), SelectionMode::Sample);
    }
}
